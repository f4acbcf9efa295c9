//! Persistence collaborators.
//!
//! The crawler keeps two kinds of state outside the process: its routing
//! table, so a restart does not have to bootstrap from scratch, and the
//! catalog of observed info-hashes together with whatever metadata has been
//! fetched for them. Both are behind traits; [`MemoryStore`] implements
//! them in memory.
//!
//! Storage is best-effort: callers log failures and carry on.
//!
//! # Examples
//!
//! ```
//! use mlspider::storage::{MemoryStore, TorrentCatalog};
//!
//! let store = MemoryStore::new();
//! store.record_info_hash("0123456789abcdef0123456789abcdef01234567").unwrap();
//!
//! let pending = store.fetch_unindexed_info_hashes(10, 3).unwrap();
//! assert_eq!(pending.len(), 1);
//! ```

mod catalog;
mod error;
mod memory;

pub use catalog::{PersistedContact, PersistedTable, RoutingTableStore, TorrentCatalog};
pub use error::StorageError;
pub use memory::MemoryStore;
