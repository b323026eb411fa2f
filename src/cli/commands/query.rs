//! Query command.

use crate::config::Settings;
use crate::pipeline::{QueryResult, RagPipeline};

/// Run query command.
pub async fn run(
    question: &str,
    top_k: Option<usize>,
    json: bool,
    settings: &Settings,
) -> anyhow::Result<()> {
    let pipeline = RagPipeline::from_settings(settings).await?;
    let result = pipeline.query(question, top_k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &QueryResult) {
    println!("{}\n", result.answer);
    println!("Sources:");
    for (i, source) in result.sources.iter().enumerate() {
        let meta = &source.metadata;
        println!(
            "\n{}. {} [chunk {}/{}] (distance: {:.3})",
            i + 1,
            meta.source_filename,
            meta.chunk_index + 1,
            meta.total_chunks,
            source.distance
        );
        println!("   {}", source.chunk_text.replace('\n', " "));
    }
}
