//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Document question answering with retrieval-augmented generation
#[derive(Parser, Debug)]
#[command(
    name = "ragqa",
    version = env!("CARGO_PKG_VERSION"),
    about = "Ask questions about your documents",
    long_about = "Upload PDF, DOCX and text files, then ask questions answered from their content.",
    styles = clap_cargo_style(),
    after_help = "Examples:\n  ragqa init\n  ragqa ingest ./docs report.pdf\n  ragqa query \"What does the report conclude?\" --top-k 5\n  ragqa serve --bind 0.0.0.0:8000"
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true, env = "RAGQA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .ragqa directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,

    /// Start the HTTP API
    #[command(about = "Start the HTTP API server")]
    Serve {
        /// Bind address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Ingest files or directories
    #[command(about = "Extract, chunk, embed and store documents")]
    Ingest {
        /// Files or directories (walked recursively)
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },

    /// Ask a question
    #[command(about = "Answer a question from the stored documents")]
    Query {
        /// The question to answer
        question: String,

        /// Number of chunks used as context (defaults to query.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop all stored documents
    #[command(about = "Delete every stored chunk")]
    Clear,

    /// Show store statistics
    #[command(about = "Show stored chunk count and status")]
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query() {
        let cli = Cli::parse_from(["ragqa", "query", "what is it?", "-k", "5", "--json"]);
        match cli.command {
            Commands::Query {
                question,
                top_k,
                json,
            } => {
                assert_eq!(question, "what is it?");
                assert_eq!(top_k, Some(5));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_ingest_requires_paths() {
        assert!(Cli::try_parse_from(["ragqa", "ingest"]).is_err());
    }
}
