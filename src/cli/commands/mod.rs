//! Command implementations for the CLI.

pub mod ingest;
pub mod init;
pub mod query;
pub mod store;
