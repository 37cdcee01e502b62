//! Persistent row store backed by redb.
//!
//! Directory rows are bincode-encoded and keyed by id, with a separate
//! unique index from filename to id. Chunk payloads are stored raw under a
//! `(file_id, part_no)` tuple key, so a range scan returns parts in order.
//! Every mutating call runs in a single write transaction.

use std::ops::RangeInclusive;
use std::path::Path;

use redb::{Database, ReadableTable};
use tablefs_common::{ChunkRecord, FileId, FileRecord, PartNo};
use tracing::{debug, error};

use crate::pattern::like_match;
use crate::store::{RowStore, RowStoreError, RowStoreResult};
use crate::tables;

/// Persistent row store backed by redb.
pub struct RedbRowStore {
    db: Database,
}

impl RedbRowStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> RowStoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create all tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::FILES)?;
            let _t = write_txn.open_table(tables::FILE_NAMES)?;
            let _t = write_txn.open_table(tables::FILE_PARTS)?;
            let _t = write_txn.open_table(tables::COUNTERS)?;
        }
        write_txn.commit()?;
        debug!("Opened row store at {}", path.display());

        Ok(Self { db })
    }

    fn decode_file(id: FileId, bytes: &[u8]) -> RowStoreResult<FileRecord> {
        bincode::deserialize(bytes).map_err(|e| {
            error!("Failed to decode file record {}: {}", id, e);
            RowStoreError::from(e)
        })
    }
}

impl RowStore for RedbRowStore {
    // ---- Directory ----

    fn insert_file(&self, filename: &str) -> RowStoreResult<FileRecord> {
        let write_txn = self.db.begin_write()?;
        let record = {
            let mut names = write_txn.open_table(tables::FILE_NAMES)?;
            if names.get(filename)?.is_some() {
                return Err(RowStoreError::duplicate("file_names", filename));
            }
            let mut counters = write_txn.open_table(tables::COUNTERS)?;
            let id = counters
                .get(tables::FILE_ID_SEQ)?
                .map_or(1, |v| v.value() + 1);
            counters.insert(tables::FILE_ID_SEQ, id)?;

            let record = FileRecord::new(id, filename);
            let bytes = bincode::serialize(&record)?;
            let mut files = write_txn.open_table(tables::FILES)?;
            files.insert(id, bytes.as_slice())?;
            names.insert(filename, id)?;
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    fn find_file(&self, filename: &str) -> RowStoreResult<Option<FileRecord>> {
        let read_txn = self.db.begin_read()?;
        let names = read_txn.open_table(tables::FILE_NAMES)?;
        let Some(id) = names.get(filename)?.map(|v| v.value()) else {
            return Ok(None);
        };
        let files = read_txn.open_table(tables::FILES)?;
        match files.get(id)? {
            Some(val) => Ok(Some(Self::decode_file(id, val.value())?)),
            None => Ok(None),
        }
    }

    fn get_file(&self, id: FileId) -> RowStoreResult<Option<FileRecord>> {
        let read_txn = self.db.begin_read()?;
        let files = read_txn.open_table(tables::FILES)?;
        match files.get(id)? {
            Some(val) => Ok(Some(Self::decode_file(id, val.value())?)),
            None => Ok(None),
        }
    }

    fn update_file(&self, record: &FileRecord) -> RowStoreResult<()> {
        let bytes = bincode::serialize(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut files = write_txn.open_table(tables::FILES)?;
            let current = match files.get(record.id)? {
                Some(val) => Self::decode_file(record.id, val.value())?,
                None => return Err(RowStoreError::missing("files", record.id)),
            };
            if current.filename != record.filename {
                let mut names = write_txn.open_table(tables::FILE_NAMES)?;
                if names.get(record.filename.as_str())?.is_some() {
                    return Err(RowStoreError::duplicate("file_names", &record.filename));
                }
                names.remove(current.filename.as_str())?;
                names.insert(record.filename.as_str(), record.id)?;
            }
            files.insert(record.id, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_file(&self, id: FileId) -> RowStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut files = write_txn.open_table(tables::FILES)?;
            let removed = files.remove(id)?.map(|v| v.value().to_vec());
            if let Some(bytes) = removed {
                let record = Self::decode_file(id, &bytes)?;
                let mut names = write_txn.open_table(tables::FILE_NAMES)?;
                names.remove(record.filename.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn find_files_like(&self, pattern: &str) -> RowStoreResult<Vec<FileRecord>> {
        let read_txn = self.db.begin_read()?;
        let files = read_txn.open_table(tables::FILES)?;
        let mut result = Vec::new();
        for entry in files.iter()? {
            let entry = entry?;
            let record = Self::decode_file(entry.0.value(), entry.1.value())?;
            if like_match(pattern, &record.filename) {
                result.push(record);
            }
        }
        Ok(result)
    }

    // ---- Content ----

    fn insert_parts(&self, parts: &[ChunkRecord]) -> RowStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::FILE_PARTS)?;
            for part in parts {
                let key = (part.file_id, part.part_no);
                // Uncommitted txn is aborted on drop
                if table.insert(key, &part.data[..])?.is_some() {
                    return Err(RowStoreError::duplicate(
                        "file_parts",
                        format!("{}:{}", part.file_id, part.part_no),
                    ));
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn find_parts(
        &self,
        file_id: FileId,
        range: RangeInclusive<PartNo>,
    ) -> RowStoreResult<Vec<ChunkRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::FILE_PARTS)?;
        let mut result = Vec::new();
        for entry in table.range((file_id, *range.start())..=(file_id, *range.end()))? {
            let entry = entry?;
            let (file_id, part_no) = entry.0.value();
            result.push(ChunkRecord::new(file_id, part_no, entry.1.value().to_vec()));
        }
        Ok(result)
    }

    fn get_part(&self, file_id: FileId, part_no: PartNo) -> RowStoreResult<Option<ChunkRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::FILE_PARTS)?;
        Ok(table
            .get((file_id, part_no))?
            .map(|v| ChunkRecord::new(file_id, part_no, v.value().to_vec())))
    }

    fn delete_part_range(
        &self,
        file_id: FileId,
        range: RangeInclusive<PartNo>,
    ) -> RowStoreResult<u64> {
        let write_txn = self.db.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(tables::FILE_PARTS)?;
            // Collect keys first, then delete
            let mut keys = Vec::new();
            for entry in table.range((file_id, *range.start())..=(file_id, *range.end()))? {
                keys.push(entry?.0.value());
            }
            for key in &keys {
                table.remove(key)?;
            }
            keys.len() as u64
        };
        write_txn.commit()?;
        Ok(deleted)
    }

    fn count_parts(&self, file_id: FileId) -> RowStoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::FILE_PARTS)?;
        let mut count = 0u64;
        for entry in table.range((file_id, 0)..=(file_id, PartNo::MAX))? {
            entry?;
            count += 1;
        }
        Ok(count)
    }
}
