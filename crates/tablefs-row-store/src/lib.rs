//! TableFS Row Store - table persistence for directory entries and chunks
//!
//! The chunk engine talks to storage only through the [`RowStore`] trait.
//! Two backends are provided: [`MemoryRowStore`] for tests and embedded use,
//! and [`RedbRowStore`], a persistent store built on redb tables.

pub mod memory;
pub mod pattern;
pub mod redb_store;
pub mod store;
pub mod tables;

// Re-exports
pub use memory::MemoryRowStore;
pub use pattern::like_match;
pub use redb_store::RedbRowStore;
pub use store::{RowStore, RowStoreError, RowStoreResult};
