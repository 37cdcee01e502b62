//! The row store contract consumed by the chunk engine.
//!
//! Calls are synchronous; the engine runs them on blocking worker threads.
//! Each method maps onto one table operation: insert, find by predicate,
//! ranged find ordered by part number, or delete-where.

use std::ops::RangeInclusive;

use tablefs_common::{ChunkRecord, Error, FileId, FileRecord, PartNo};

/// Error type for row store operations
#[derive(Debug, thiserror::Error)]
pub enum RowStoreError {
    #[error("duplicate key in {table}: {key}")]
    Duplicate { table: &'static str, key: String },
    #[error("no row in {table} for {key}")]
    MissingRow { table: &'static str, key: String },
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for RowStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl RowStoreError {
    pub(crate) fn duplicate(table: &'static str, key: impl ToString) -> Self {
        Self::Duplicate {
            table,
            key: key.to_string(),
        }
    }

    pub(crate) fn missing(table: &'static str, key: impl ToString) -> Self {
        Self::MissingRow {
            table,
            key: key.to_string(),
        }
    }
}

impl From<RowStoreError> for Error {
    fn from(e: RowStoreError) -> Self {
        match e {
            RowStoreError::Duplicate { .. } => Self::IntegrityViolation(e.to_string()),
            RowStoreError::MissingRow { key, .. } => Self::FileNotFound(key),
            other => Self::Storage(other.to_string()),
        }
    }
}

pub type RowStoreResult<T> = Result<T, RowStoreError>;

/// Typed access to the directory (`files`) and content (`file_parts`) tables.
pub trait RowStore: Send + Sync {
    // ---- Directory ----

    /// Insert an empty record, assigning the next id.
    /// Fails with `Duplicate` when the filename is taken.
    fn insert_file(&self, filename: &str) -> RowStoreResult<FileRecord>;

    /// Find a record by its unique filename
    fn find_file(&self, filename: &str) -> RowStoreResult<Option<FileRecord>>;

    /// Get a record by id
    fn get_file(&self, id: FileId) -> RowStoreResult<Option<FileRecord>>;

    /// Overwrite the stored record with the same id
    fn update_file(&self, record: &FileRecord) -> RowStoreResult<()>;

    /// Delete a record by id; deleting a missing id is a no-op
    fn delete_file(&self, id: FileId) -> RowStoreResult<()>;

    /// Records whose filename matches a SQL `LIKE` pattern, ordered by id
    fn find_files_like(&self, pattern: &str) -> RowStoreResult<Vec<FileRecord>>;

    // ---- Content ----

    /// Insert all parts in one transaction.
    /// Fails with `Duplicate` if any `(file_id, part_no)` already exists.
    fn insert_parts(&self, parts: &[ChunkRecord]) -> RowStoreResult<()>;

    /// Parts of `file_id` with `part_no` in `range`, ordered by part number
    fn find_parts(
        &self,
        file_id: FileId,
        range: RangeInclusive<PartNo>,
    ) -> RowStoreResult<Vec<ChunkRecord>>;

    /// A single part
    fn get_part(&self, file_id: FileId, part_no: PartNo) -> RowStoreResult<Option<ChunkRecord>>;

    /// Delete every part of `file_id` numbered `from` or higher, returning the count
    fn delete_parts(&self, file_id: FileId, from: PartNo) -> RowStoreResult<u64> {
        self.delete_part_range(file_id, from..=PartNo::MAX)
    }

    /// Delete the parts of `file_id` with `part_no` in `range`, returning the count
    fn delete_part_range(
        &self,
        file_id: FileId,
        range: RangeInclusive<PartNo>,
    ) -> RowStoreResult<u64>;

    /// Number of stored parts for `file_id`
    fn count_parts(&self, file_id: FileId) -> RowStoreResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err: Error = RowStoreError::duplicate("file_names", "a.bin").into();
        assert!(matches!(err, Error::IntegrityViolation(ref m) if m.contains("a.bin")));

        let err: Error = RowStoreError::missing("files", 7).into();
        assert!(err.is_not_found());

        let err: Error = RowStoreError::Io(std::io::Error::other("boom")).into();
        assert!(matches!(err, Error::Storage(_)));
    }
}
