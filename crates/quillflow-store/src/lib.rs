//! # Quillflow Store
//!
//! `RecordStore` backends. `MemoryStore` keeps everything in process and
//! backs the test suites; `SqliteStore` persists entity JSON and the edit
//! audit trail in one SQLite file.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use quillflow_core::config::VenueConfig;
use quillflow_core::error::Result;
use quillflow_core::traits::RecordStore;

/// Open the store configured for the venue. An empty `db_path` or
/// `:memory:` selects the in-process store.
pub fn open_store(config: &VenueConfig) -> Result<Box<dyn RecordStore>> {
    let path = config.storage.db_path.trim();
    if path.is_empty() || path == ":memory:" {
        tracing::info!("🗂️ Using in-memory record store");
        return Ok(Box::new(MemoryStore::new()));
    }
    let expanded = std::path::PathBuf::from(shellexpand::tilde(path).into_owned());
    tracing::info!("🗂️ Opening SQLite record store at {}", expanded.display());
    Ok(Box::new(SqliteStore::open(&expanded)?))
}
