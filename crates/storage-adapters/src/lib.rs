//! # storage-adapters
//!
//! Entity Store implementations behind the `domains` repository ports.
//!
//! - [`memory::InMemoryStore`]: always compiled, backed by `dashmap`.
//! - [`sqlite::SqliteStore`]: feature `db-sqlite`, backed by `sqlx`.

pub mod memory;
#[cfg(feature = "db-sqlite")]
pub mod sqlite;

pub use memory::InMemoryStore;
#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteStore;
