//! In-memory row store.
//!
//! Ordered maps behind a single `RwLock`. Every method holds the lock for the
//! whole operation, so each call is atomic like a committed transaction.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;

use bytes::Bytes;
use parking_lot::RwLock;
use tablefs_common::{ChunkRecord, FileId, FileRecord, PartNo};

use crate::pattern::like_match;
use crate::store::{RowStore, RowStoreError, RowStoreResult};

#[derive(Default)]
struct Tables {
    next_id: FileId,
    files: BTreeMap<FileId, FileRecord>,
    names: HashMap<String, FileId>,
    parts: BTreeMap<(FileId, PartNo), Bytes>,
}

/// Row store kept entirely in process memory
#[derive(Default)]
pub struct MemoryRowStore {
    tables: RwLock<Tables>,
}

impl MemoryRowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RowStore for MemoryRowStore {
    fn insert_file(&self, filename: &str) -> RowStoreResult<FileRecord> {
        let mut tables = self.tables.write();
        if tables.names.contains_key(filename) {
            return Err(RowStoreError::duplicate("file_names", filename));
        }
        tables.next_id += 1;
        let record = FileRecord::new(tables.next_id, filename);
        tables.names.insert(filename.to_string(), record.id);
        tables.files.insert(record.id, record.clone());
        Ok(record)
    }

    fn find_file(&self, filename: &str) -> RowStoreResult<Option<FileRecord>> {
        let tables = self.tables.read();
        Ok(tables
            .names
            .get(filename)
            .and_then(|id| tables.files.get(id))
            .cloned())
    }

    fn get_file(&self, id: FileId) -> RowStoreResult<Option<FileRecord>> {
        Ok(self.tables.read().files.get(&id).cloned())
    }

    fn update_file(&self, record: &FileRecord) -> RowStoreResult<()> {
        let mut tables = self.tables.write();
        let Some(current) = tables.files.get(&record.id) else {
            return Err(RowStoreError::missing("files", record.id));
        };
        if current.filename != record.filename {
            if tables.names.contains_key(&record.filename) {
                return Err(RowStoreError::duplicate("file_names", &record.filename));
            }
            let old = current.filename.clone();
            tables.names.remove(&old);
            tables.names.insert(record.filename.clone(), record.id);
        }
        tables.files.insert(record.id, record.clone());
        Ok(())
    }

    fn delete_file(&self, id: FileId) -> RowStoreResult<()> {
        let mut tables = self.tables.write();
        if let Some(record) = tables.files.remove(&id) {
            tables.names.remove(&record.filename);
        }
        Ok(())
    }

    fn find_files_like(&self, pattern: &str) -> RowStoreResult<Vec<FileRecord>> {
        let tables = self.tables.read();
        Ok(tables
            .files
            .values()
            .filter(|r| like_match(pattern, &r.filename))
            .cloned()
            .collect())
    }

    fn insert_parts(&self, parts: &[ChunkRecord]) -> RowStoreResult<()> {
        let mut tables = self.tables.write();
        for part in parts {
            if tables.parts.contains_key(&(part.file_id, part.part_no)) {
                return Err(RowStoreError::duplicate(
                    "file_parts",
                    format!("{}:{}", part.file_id, part.part_no),
                ));
            }
        }
        for part in parts {
            tables
                .parts
                .insert((part.file_id, part.part_no), part.data.clone());
        }
        Ok(())
    }

    fn find_parts(
        &self,
        file_id: FileId,
        range: RangeInclusive<PartNo>,
    ) -> RowStoreResult<Vec<ChunkRecord>> {
        let tables = self.tables.read();
        Ok(tables
            .parts
            .range((file_id, *range.start())..=(file_id, *range.end()))
            .map(|(&(file_id, part_no), data)| ChunkRecord::new(file_id, part_no, data.clone()))
            .collect())
    }

    fn get_part(&self, file_id: FileId, part_no: PartNo) -> RowStoreResult<Option<ChunkRecord>> {
        Ok(self
            .tables
            .read()
            .parts
            .get(&(file_id, part_no))
            .map(|data| ChunkRecord::new(file_id, part_no, data.clone())))
    }

    fn delete_part_range(
        &self,
        file_id: FileId,
        range: RangeInclusive<PartNo>,
    ) -> RowStoreResult<u64> {
        let mut tables = self.tables.write();
        let keys: Vec<_> = tables
            .parts
            .range((file_id, *range.start())..=(file_id, *range.end()))
            .map(|(k, _)| *k)
            .collect();
        for key in &keys {
            tables.parts.remove(key);
        }
        Ok(keys.len() as u64)
    }

    fn count_parts(&self, file_id: FileId) -> RowStoreResult<u64> {
        Ok(self
            .tables
            .read()
            .parts
            .range((file_id, 0)..=(file_id, PartNo::MAX))
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(file_id: FileId, range: std::ops::Range<PartNo>) -> Vec<ChunkRecord> {
        range
            .map(|n| ChunkRecord::new(file_id, n, vec![n as u8; 4]))
            .collect()
    }

    #[test]
    fn test_insert_and_find_file() {
        let store = MemoryRowStore::new();
        let a = store.insert_file("a").unwrap();
        let b = store.insert_file("b").unwrap();
        assert!(b.id > a.id);
        assert_eq!(store.find_file("a").unwrap(), Some(a.clone()));
        assert_eq!(store.get_file(b.id).unwrap(), Some(b));
        assert!(store.find_file("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_filename() {
        let store = MemoryRowStore::new();
        store.insert_file("a").unwrap();
        let err = store.insert_file("a").unwrap_err();
        assert!(matches!(err, RowStoreError::Duplicate { .. }));
    }

    #[test]
    fn test_update_and_delete_file() {
        let store = MemoryRowStore::new();
        let mut record = store.insert_file("a").unwrap();
        record.size = 10;
        record.part_count = 2;
        store.update_file(&record).unwrap();
        assert_eq!(store.find_file("a").unwrap().unwrap().size, 10);

        store.delete_file(record.id).unwrap();
        assert!(store.find_file("a").unwrap().is_none());
        assert!(matches!(
            store.update_file(&record),
            Err(RowStoreError::MissingRow { .. })
        ));
        // Deleting twice is fine
        store.delete_file(record.id).unwrap();
    }

    #[test]
    fn test_find_like_ordered_by_id() {
        let store = MemoryRowStore::new();
        store.insert_file("testfile").unwrap();
        store.insert_file("otherfile").unwrap();
        store.insert_file("test2").unwrap();
        let names: Vec<_> = store
            .find_files_like("%")
            .unwrap()
            .into_iter()
            .map(|r| r.filename)
            .collect();
        assert_eq!(names, ["testfile", "otherfile", "test2"]);
        assert_eq!(store.find_files_like("test%").unwrap().len(), 2);
    }

    #[test]
    fn test_parts_range_and_delete() {
        let store = MemoryRowStore::new();
        store.insert_parts(&parts(1, 0..25)).unwrap();
        store.insert_parts(&parts(2, 0..3)).unwrap();

        let found = store.find_parts(1, 10..=19).unwrap();
        assert_eq!(found.len(), 10);
        assert_eq!(found[0].part_no, 10);
        assert_eq!(found[9].part_no, 19);
        assert!(found.iter().all(|p| p.file_id == 1));

        assert_eq!(store.find_parts(1, 20..=29).unwrap().len(), 5);
        assert_eq!(store.get_part(2, 2).unwrap().unwrap().data.as_ref(), &[2; 4]);

        assert_eq!(store.delete_parts(1, 20).unwrap(), 5);
        assert_eq!(store.count_parts(1).unwrap(), 20);
        assert_eq!(store.count_parts(2).unwrap(), 3);
        assert_eq!(store.delete_parts(1, 0).unwrap(), 20);
        assert_eq!(store.count_parts(1).unwrap(), 0);
    }

    #[test]
    fn test_delete_part_range_leaves_neighbours() {
        let store = MemoryRowStore::new();
        store.insert_parts(&parts(1, 0..8)).unwrap();
        assert_eq!(store.delete_part_range(1, 2..=3).unwrap(), 2);
        assert_eq!(store.delete_part_range(1, 2..=3).unwrap(), 0);
        assert!(store.get_part(1, 1).unwrap().is_some());
        assert!(store.get_part(1, 4).unwrap().is_some());
        assert_eq!(store.count_parts(1).unwrap(), 6);
    }

    #[test]
    fn test_duplicate_part_is_atomic() {
        let store = MemoryRowStore::new();
        store.insert_parts(&parts(1, 0..2)).unwrap();
        let err = store.insert_parts(&parts(1, 1..4)).unwrap_err();
        assert!(matches!(err, RowStoreError::Duplicate { .. }));
        // Nothing from the failed batch was written
        assert_eq!(store.count_parts(1).unwrap(), 2);
    }
}
