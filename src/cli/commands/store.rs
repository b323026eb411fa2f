//! Clear and Stats commands.
//!
//! Neither needs an embedding provider, so both work on the persisted store
//! directly.

use serde::Serialize;

use crate::config::Settings;
use crate::documents::VectorStore;

#[derive(Debug, Serialize)]
struct StoreStats {
    document_count: usize,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_id: Option<String>,
}

/// Run clear command.
pub fn run_clear(settings: &Settings) -> anyhow::Result<()> {
    let removed = VectorStore::purge(&settings.store.data_dir, &settings.store.collection)?;
    if removed {
        println!("Database cleared successfully");
    } else {
        println!("Nothing to clear");
    }
    Ok(())
}

/// Run stats command.
pub fn run_stats(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let store = VectorStore::open_persisted(&settings.store.data_dir, &settings.store.collection)?;

    let stats = match &store {
        Some(store) if store.count() > 0 => StoreStats {
            document_count: store.count(),
            status: "active",
            model_id: Some(store.model_id().to_string()),
        },
        _ => StoreStats {
            document_count: 0,
            status: "empty",
            model_id: None,
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Documents: {}", stats.document_count);
        println!("Status:    {}", stats.status);
        if let Some(model_id) = &stats.model_id {
            println!("Model:     {model_id}");
        }
    }
    Ok(())
}
