//! Chunk writer
//!
//! Splits a byte source into `chunk_size` parts, numbers them from the file's
//! current part count, and commits them in batches on the worker pool. File
//! metadata is updated only after every batch has committed; if any batch
//! fails, the batches this call did commit are deleted again and the record
//! is left as it was. Parts committed by other writers are never touched.
//!
//! ```text
//! source ──read chunk──▶ batch [n, n+1, ... n+batch-1] ──spawn──▶ insert_parts
//!                        batch [...]                   ──spawn──▶ insert_parts
//!                        ...                                         │
//!                                              join all ◀────────────┘
//!                                              update_file(size, part_count)
//! ```

use std::sync::Arc;

use bytes::Bytes;
use tablefs_common::{ChunkRecord, Error, FileRecord, PartNo, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info, warn};

use crate::context::StoreContext;
use crate::pool::TaskGroup;

/// Options for a low-level write
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Bytes per part; `None` uses the configured chunk size
    pub chunk_size: Option<usize>,
    /// Parts per insert batch; `None` uses the configured batch size
    pub batch_size: Option<usize>,
    /// Truncate the file before writing instead of appending
    pub replace: bool,
}

impl WriteOptions {
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    #[must_use]
    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }
}

/// Outcome of a completed write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteSummary {
    /// Part number assigned to the first new part
    pub first_part: PartNo,
    /// Number of parts committed
    pub parts_written: u64,
    /// Payload bytes committed
    pub bytes_written: u64,
    /// Number of insert batches
    pub batches: usize,
}

pub(crate) struct ChunkWriter<'a> {
    ctx: &'a StoreContext,
    chunk_size: usize,
    batch_size: usize,
}

impl<'a> ChunkWriter<'a> {
    pub fn new(ctx: &'a StoreContext, options: &WriteOptions) -> Result<Self> {
        let chunk_size = options.chunk_size.unwrap_or(ctx.chunking.chunk_size);
        let batch_size = options.batch_size.unwrap_or(ctx.chunking.write_batch_size);
        if chunk_size == 0 {
            return Err(Error::invalid_argument("chunk size must be positive"));
        }
        if batch_size == 0 {
            return Err(Error::invalid_argument("batch size must be positive"));
        }
        Ok(Self {
            ctx,
            chunk_size,
            batch_size,
        })
    }

    /// Append the whole of `source` to `record`
    ///
    /// On success `record` holds the committed size and part count.
    pub async fn write<R>(&self, record: &mut FileRecord, source: &mut R) -> Result<WriteSummary>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let first_part = record.part_count;
        let mut part_no = first_part;
        let start_size = record.size;
        let mut size = start_size;
        let mut group = self.ctx.pool.group::<(PartNo, u64)>("write");
        let mut batch = Vec::new();

        let mut fill = loop {
            if group.has_failed() {
                break Ok(());
            }
            let data = match read_chunk(source, self.chunk_size).await {
                Ok(Some(data)) => data,
                Ok(None) => break Ok(()),
                Err(e) => break Err(Error::Io(e)),
            };
            size += data.len() as u64;
            batch.push(ChunkRecord::new(record.id, part_no, data));
            part_no += 1;
            if batch.len() >= self.batch_size {
                let full = std::mem::take(&mut batch);
                if let Err(e) = self.dispatch(&mut group, full).await {
                    break Err(e);
                }
            }
        };
        // Flush the partial batch left at end of input
        if fill.is_ok() && !batch.is_empty() && !group.has_failed() {
            fill = self.dispatch(&mut group, batch).await;
        }

        let batches = group.dispatched();
        let (committed, join_error) = group.settle().await;
        let outcome = match (fill, join_error) {
            (Err(e), _) | (Ok(()), Some(e)) => Err(e),
            (Ok(()), None) => Ok(()),
        };
        let updated = match outcome {
            Ok(()) => {
                let mut updated = record.clone();
                updated.size = size;
                updated.part_count = part_no;
                self.ctx
                    .blocking(move |store| {
                        store.update_file(&updated)?;
                        Ok(updated)
                    })
                    .await
            }
            Err(e) => Err(e),
        };

        match updated {
            Ok(updated) => {
                *record = updated;
                let summary = WriteSummary {
                    first_part,
                    parts_written: part_no - first_part,
                    bytes_written: size - start_size,
                    batches,
                };
                info!(
                    "Wrote {} parts ({} bytes) to {} in {} batches",
                    summary.parts_written, summary.bytes_written, record.filename, batches
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Write to {} failed: {}", record.filename, e);
                self.rollback(record, committed).await;
                Err(e)
            }
        }
    }

    /// Commit one batch; the task yields the `(start, len)` part range it inserted
    async fn dispatch(
        &self,
        group: &mut TaskGroup<(PartNo, u64)>,
        parts: Vec<ChunkRecord>,
    ) -> Result<()> {
        let store = Arc::clone(&self.ctx.store);
        let start = parts.first().map_or(0, |p| p.part_no);
        debug!(
            "Dispatching batch of {} parts starting at part {}",
            parts.len(),
            start
        );
        group
            .spawn(move || {
                store.insert_parts(&parts)?;
                Ok((start, parts.len() as u64))
            })
            .await
    }

    /// Delete the batches a failed write committed, best effort
    async fn rollback(&self, record: &FileRecord, committed: Vec<(PartNo, u64)>) {
        if committed.is_empty() {
            return;
        }
        let file_id = record.id;
        let ranges = committed.len();
        match self
            .ctx
            .blocking(move |store| {
                let mut deleted = 0;
                for (start, len) in committed {
                    if len > 0 {
                        deleted += store.delete_part_range(file_id, start..=start + len - 1)?;
                    }
                }
                Ok(deleted)
            })
            .await
        {
            Ok(n) => warn!(
                "Rolled back {} parts of {} in {} batches",
                n, record.filename, ranges
            ),
            Err(e) => error!("Failed to roll back parts of {}: {}", record.filename, e),
        }
    }
}

/// Read up to `chunk_size` bytes, filling the chunk unless the source ends
async fn read_chunk<R>(source: &mut R, chunk_size: usize) -> std::io::Result<Option<Bytes>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; chunk_size];
    let mut filled = 0;
    while filled < chunk_size {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    if filled == 0 {
        return Ok(None);
    }
    buf.truncate(filled);
    Ok(Some(Bytes::from(buf)))
}
