//! Redb table definitions for persistent file storage.

use redb::TableDefinition;

// Directory
// Key: file id, Value: bincode-encoded FileRecord
pub const FILES: TableDefinition<u64, &[u8]> = TableDefinition::new("files");
// Unique index on filename
pub const FILE_NAMES: TableDefinition<&str, u64> = TableDefinition::new("file_names");

// Content
// Key: (file_id, part_no), Value: raw chunk payload
pub const FILE_PARTS: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("file_parts");

// Sequences
pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

/// Counter key for file id allocation
pub const FILE_ID_SEQ: &str = "file_id";
