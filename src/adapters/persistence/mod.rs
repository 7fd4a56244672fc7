//! Persistence adapters. SQLite for records and cases, JSON for the import watermark.

pub mod memory;
pub mod sqlite_repo;
pub mod state_json;

pub use memory::MemoryStore;
pub use sqlite_repo::SqliteRepo;
pub use state_json::StateJson;
