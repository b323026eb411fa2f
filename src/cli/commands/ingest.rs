//! Ingest command.

use std::path::{Path, PathBuf};

use anyhow::Context;
use walkdir::WalkDir;

use crate::config::Settings;
use crate::documents::Document;
use crate::pipeline::RagPipeline;

/// Read every file under `paths`; directories are walked recursively.
///
/// Files inside a directory are named by their path relative to it. Hidden
/// entries below a directory are ignored.
pub fn collect_documents(paths: &[PathBuf]) -> anyhow::Result<Vec<Document>> {
    let mut documents = Vec::new();

    for path in paths {
        if path.is_dir() {
            let walker = WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));

            for entry in walker {
                let entry = entry.with_context(|| format!("failed to walk {}", path.display()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry
                    .path()
                    .strip_prefix(path)
                    .unwrap_or(entry.path())
                    .display()
                    .to_string();
                documents.push(read_document(entry.path(), name)?);
            }
        } else {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            documents.push(read_document(path, name)?);
        }
    }

    Ok(documents)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn read_document(path: &Path, name: String) -> anyhow::Result<Document> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Document::new(name, bytes))
}

/// Run ingest command.
pub async fn run(paths: &[PathBuf], settings: &Settings) -> anyhow::Result<()> {
    let documents = collect_documents(paths)?;
    if documents.is_empty() {
        anyhow::bail!("No files found under the given paths");
    }

    let pipeline = RagPipeline::from_settings(settings).await?;
    let report = pipeline.ingest(documents).await?;

    println!("Documents uploaded successfully");
    println!("  Files processed: {}", report.files_processed);
    println!("  Chunks created:  {}", report.chunks_created);
    if !report.skipped_files.is_empty() {
        println!("  Skipped ({}):", report.skipped_files.len());
        for name in &report.skipped_files {
            println!("    - {name}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_documents() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("docs");
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("a.txt"), "alpha").unwrap();
        std::fs::write(root.join("nested").join("b.md"), "beta").unwrap();
        std::fs::write(root.join(".git").join("HEAD"), "ref").unwrap();

        let single = temp_dir.path().join("single.txt");
        std::fs::write(&single, "gamma").unwrap();

        let documents = collect_documents(&[root, single]).unwrap();
        let names: Vec<&str> = documents.iter().map(|d| d.filename.as_str()).collect();

        let nested = Path::new("nested").join("b.md").display().to_string();
        assert_eq!(names, vec!["a.txt", nested.as_str(), "single.txt"]);
        assert_eq!(documents[2].bytes, b"gamma");
    }

    #[test]
    fn test_collect_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(collect_documents(&[temp_dir.path().join("missing.txt")]).is_err());
    }
}
