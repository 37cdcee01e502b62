//! TableFS - Chunked file storage on a row store
//!
//! This crate implements the chunk engine:
//! - Directory index (open/remove/exists/find/list)
//! - Parallel chunk writer with batched commits
//! - Parallel chunk reader that reassembles parts by number
//! - File handles with mode checks, cursor reads and truncation
//!
//! ```text
//! FileStore ──open──▶ FileHandle ──write──▶ ChunkWriter ──┐
//!                         │                               ├──▶ WorkerPool ──▶ RowStore
//!                         └────read──▶ fetch_all ─────────┘
//! ```

mod context;
pub mod directory;
pub mod handle;
pub mod pool;
pub mod reader;
pub mod writer;

#[cfg(test)]
mod testing;

// Re-exports
pub use directory::FileStore;
pub use handle::FileHandle;
pub use pool::{TaskGroup, WorkerPool};
pub use reader::ChunkStream;
pub use tablefs_common::{Config, Error, FileRecord, OpenMode, Result};
pub use writer::{WriteOptions, WriteSummary};
