//! Chunk reader
//!
//! A full read splits `[0, part_count)` into ranges of `read_batch_size`
//! parts and fetches every range on the worker pool. Ranges complete in any
//! order; results are sorted by their first part number before the payloads
//! are concatenated. The assembled buffer is cached on the handle behind a
//! [`ReadCursor`].
//!
//! [`ChunkStream`] is the sequential alternative: one part per row store
//! call, nothing buffered beyond the current chunk.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tablefs_common::{Error, FileRecord, PartNo, Result};
use tracing::{debug, info, warn};

use crate::context::StoreContext;

/// Fetch and assemble every part of `record`
pub(crate) async fn fetch_all(
    ctx: &StoreContext,
    record: &FileRecord,
    batch_size: usize,
) -> Result<Bytes> {
    if batch_size == 0 {
        return Err(Error::invalid_argument("read batch size must be positive"));
    }
    if record.part_count == 0 {
        return Ok(Bytes::new());
    }

    let batch = batch_size as u64;
    let mut group = ctx.pool.group::<(PartNo, Vec<Bytes>)>("read");
    let mut start = 0;
    while start < record.part_count && !group.has_failed() {
        let end = (start + batch).min(record.part_count) - 1;
        let store = Arc::clone(&ctx.store);
        let file_id = record.id;
        let filename = record.filename.clone();
        debug!("Dispatching fetch of parts {}..={} of {}", start, end, filename);
        group
            .spawn(move || {
                let parts = store.find_parts(file_id, start..=end)?;
                let expected = end - start + 1;
                let found = parts.len() as u64;
                if found < expected {
                    return Err(Error::PartsNotFound {
                        filename,
                        start,
                        end,
                        expected,
                        found,
                    });
                }
                Ok((start, parts.into_iter().map(|p| p.data).collect()))
            })
            .await?;
        start = end + 1;
    }

    let mut batches = group.join().await?;
    // Completion order is arbitrary
    batches.sort_unstable_by_key(|(start, _)| *start);

    let capacity = usize::try_from(record.size).unwrap_or(0);
    let mut buffer = BytesMut::with_capacity(capacity);
    for (_, chunks) in &batches {
        for chunk in chunks {
            buffer.extend_from_slice(chunk);
        }
    }
    if buffer.len() as u64 != record.size {
        warn!(
            "Assembled {} bytes for {} but its record says {}",
            buffer.len(),
            record.filename,
            record.size
        );
    }
    info!(
        "Read {} parts ({} bytes) of {} in {} batches",
        record.part_count,
        buffer.len(),
        record.filename,
        batches.len()
    );
    Ok(buffer.freeze())
}

/// Position over a lazily materialized file buffer
#[derive(Debug, Default)]
pub(crate) struct ReadCursor {
    buffer: Option<Bytes>,
    pos: usize,
}

impl ReadCursor {
    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    /// Install a freshly fetched buffer, keeping the current position
    pub fn load(&mut self, data: Bytes) {
        self.buffer = Some(data);
    }

    /// Drop the buffer; the position survives for the next load
    pub fn clear(&mut self) {
        self.buffer = None;
    }

    fn remaining(&self) -> &[u8] {
        match &self.buffer {
            Some(buf) if self.pos < buf.len() => &buf[self.pos..],
            _ => &[],
        }
    }

    /// Take up to `size` bytes (all remaining for `None`)
    pub fn read(&mut self, size: Option<usize>) -> Bytes {
        let Some(buf) = &self.buffer else {
            return Bytes::new();
        };
        if self.pos >= buf.len() {
            return Bytes::new();
        }
        let available = buf.len() - self.pos;
        let n = size.map_or(available, |s| s.min(available));
        let out = buf.slice(self.pos..self.pos + n);
        self.pos += n;
        out
    }

    /// Take bytes up to and including the next `\n`, at most `limit` bytes
    pub fn readline(&mut self, limit: Option<usize>) -> Bytes {
        let rest = self.remaining();
        let window = limit.map_or(rest, |l| &rest[..l.min(rest.len())]);
        let n = window
            .iter()
            .position(|&b| b == b'\n')
            .map_or(window.len(), |i| i + 1);
        self.read(Some(n))
    }

    pub fn seek(&mut self, pos: u64) -> u64 {
        self.pos = usize::try_from(pos).unwrap_or(usize::MAX);
        pos
    }

    pub fn tell(&self) -> u64 {
        self.pos as u64
    }
}

/// Sequential, low-memory chunk iterator
///
/// Yields parts in order until the file ends or, when a limit is given,
/// until at least `limit` bytes have been yielded.
pub struct ChunkStream {
    ctx: Arc<StoreContext>,
    record: FileRecord,
    next_part: PartNo,
    limit: Option<u64>,
    yielded: u64,
}

impl ChunkStream {
    pub(crate) fn new(ctx: Arc<StoreContext>, record: FileRecord, limit: Option<u64>) -> Self {
        Self {
            ctx,
            record,
            next_part: 0,
            limit,
            yielded: 0,
        }
    }

    /// Bytes yielded so far
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.yielded
    }

    /// Fetch the next chunk, or `None` once done
    pub async fn next(&mut self) -> Result<Option<Bytes>> {
        if self.next_part >= self.record.part_count {
            return Ok(None);
        }
        if self.limit.is_some_and(|limit| self.yielded >= limit) {
            return Ok(None);
        }

        let file_id = self.record.id;
        let part_no = self.next_part;
        let part = self
            .ctx
            .blocking(move |store| Ok(store.get_part(file_id, part_no)?))
            .await?;
        let Some(part) = part else {
            return Err(Error::PartsNotFound {
                filename: self.record.filename.clone(),
                start: part_no,
                end: part_no,
                expected: 1,
                found: 0,
            });
        };
        self.next_part += 1;
        self.yielded += part.data.len() as u64;
        Ok(Some(part.data))
    }

    /// Collect the remaining chunks into one buffer
    pub async fn collect(mut self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.next().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out.freeze())
    }
}
