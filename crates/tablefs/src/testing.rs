//! Row store wrapper with injectable delays and failures for tests.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tablefs_common::{ChunkRecord, Config, FileId, FileRecord, PartNo};
use tablefs_row_store::{MemoryRowStore, RowStore, RowStoreError, RowStoreResult};

use crate::FileStore;

#[derive(Default)]
pub struct TestStore {
    inner: MemoryRowStore,
    /// Ranged fetches starting below `span` sleep `step * (span - start)`,
    /// so earlier batches finish last
    pub fetch_delay: Option<(PartNo, Duration)>,
    /// Insert batches containing a part at or above this number fail
    pub fail_inserts_from: Option<PartNo>,
    /// Starting part of each ranged fetch in completion order
    pub completions: Mutex<Vec<PartNo>>,
    pub insert_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl TestStore {
    pub fn delayed(span: PartNo, step: Duration) -> Self {
        Self {
            fetch_delay: Some((span, step)),
            ..Self::default()
        }
    }

    pub fn failing_from(part_no: PartNo) -> Self {
        Self {
            fail_inserts_from: Some(part_no),
            ..Self::default()
        }
    }

    pub fn completion_order(&self) -> Vec<PartNo> {
        self.completions.lock().clone()
    }
}

impl RowStore for TestStore {
    fn insert_file(&self, filename: &str) -> RowStoreResult<FileRecord> {
        self.inner.insert_file(filename)
    }

    fn find_file(&self, filename: &str) -> RowStoreResult<Option<FileRecord>> {
        self.inner.find_file(filename)
    }

    fn get_file(&self, id: FileId) -> RowStoreResult<Option<FileRecord>> {
        self.inner.get_file(id)
    }

    fn update_file(&self, record: &FileRecord) -> RowStoreResult<()> {
        self.inner.update_file(record)
    }

    fn delete_file(&self, id: FileId) -> RowStoreResult<()> {
        self.inner.delete_file(id)
    }

    fn find_files_like(&self, pattern: &str) -> RowStoreResult<Vec<FileRecord>> {
        self.inner.find_files_like(pattern)
    }

    fn insert_parts(&self, parts: &[ChunkRecord]) -> RowStoreResult<()> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_inserts_from
            && parts.iter().any(|p| p.part_no >= limit)
        {
            return Err(RowStoreError::Io(std::io::Error::other(
                "injected insert failure",
            )));
        }
        self.inner.insert_parts(parts)
    }

    fn find_parts(
        &self,
        file_id: FileId,
        range: RangeInclusive<PartNo>,
    ) -> RowStoreResult<Vec<ChunkRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let start = *range.start();
        if let Some((span, step)) = self.fetch_delay {
            let factor = u32::try_from(span.saturating_sub(start)).unwrap_or(u32::MAX);
            std::thread::sleep(step * factor);
        }
        let parts = self.inner.find_parts(file_id, range);
        self.completions.lock().push(start);
        parts
    }

    fn get_part(&self, file_id: FileId, part_no: PartNo) -> RowStoreResult<Option<ChunkRecord>> {
        self.inner.get_part(file_id, part_no)
    }

    fn delete_part_range(
        &self,
        file_id: FileId,
        range: RangeInclusive<PartNo>,
    ) -> RowStoreResult<u64> {
        self.inner.delete_part_range(file_id, range)
    }

    fn count_parts(&self, file_id: FileId) -> RowStoreResult<u64> {
        self.inner.count_parts(file_id)
    }
}

/// Config with small chunks so tests produce many parts
pub fn small_config(chunk_size: usize, write_batch: usize, read_batch: usize) -> Config {
    let mut config = Config::default();
    config.chunking.chunk_size = chunk_size;
    config.chunking.write_batch_size = write_batch;
    config.chunking.read_batch_size = read_batch;
    config.workers.max_workers = Some(16);
    config
}

pub fn file_store(store: Arc<TestStore>, config: &Config) -> FileStore {
    FileStore::new(store, config).unwrap()
}

/// Deterministic non-repeating payload
pub fn payload(len: usize) -> Vec<u8> {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(len as u64);
    (0..len).map(|_| rng.r#gen::<u8>()).collect()
}
