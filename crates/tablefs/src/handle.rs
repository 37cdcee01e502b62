//! File handle bound to one directory entry and open mode.

use std::sync::Arc;

use bytes::Bytes;
use tablefs_common::{Error, FileId, FileRecord, OpenMode, PartNo, Result};
use tablefs_row_store::RowStore;
use tokio::io::AsyncRead;
use tracing::{debug, info};

use crate::context::StoreContext;
use crate::directory::FileStore;
use crate::reader::{ChunkStream, ReadCursor, fetch_all};
use crate::writer::{ChunkWriter, WriteOptions, WriteSummary};

/// File-like access to a stored file
///
/// A handle is created by [`FileStore::open`]. Writes require a mode with
/// `w` or `+`, reads a mode with `r`. The first read fetches every part in
/// parallel and keeps the assembled bytes until the handle is closed,
/// written to, or dropped; later reads only move the cursor.
///
/// Handles do not lock their file. The record is reloaded before each write
/// and before the first read, so a handle sees writes made through other
/// handles, but two concurrent writers to the same file race on the final
/// metadata update and the last one wins.
pub struct FileHandle {
    ctx: Arc<StoreContext>,
    record: FileRecord,
    mode: OpenMode,
    cursor: ReadCursor,
}

impl FileHandle {
    pub(crate) fn new(ctx: Arc<StoreContext>, record: FileRecord, mode: OpenMode) -> Self {
        Self {
            ctx,
            record,
            mode,
            cursor: ReadCursor::default(),
        }
    }

    // ---- Accessors ----

    #[must_use]
    pub fn name(&self) -> &str {
        &self.record.filename
    }

    /// Size in bytes as of the last write or reload
    #[must_use]
    pub fn size(&self) -> u64 {
        self.record.size
    }

    #[must_use]
    pub fn part_count(&self) -> PartNo {
        self.record.part_count
    }

    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    #[must_use]
    pub fn record(&self) -> &FileRecord {
        &self.record
    }

    // ---- Writing ----

    /// Append everything `source` yields
    pub async fn write<R>(&mut self, source: &mut R) -> Result<WriteSummary>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.write_with(source, WriteOptions::default()).await
    }

    /// Write with explicit chunking; `replace` truncates first
    pub async fn write_with<R>(&mut self, source: &mut R, options: WriteOptions) -> Result<WriteSummary>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.check_writable()?;
        let ctx = Arc::clone(&self.ctx);
        let writer = ChunkWriter::new(&ctx, &options)?;
        self.refresh().await?;
        if options.replace {
            self.truncate_record().await?;
        }
        self.cursor.clear();
        writer.write(&mut self.record, source).await
    }

    /// Append an in-memory payload
    pub async fn write_bytes(&mut self, data: impl Into<Bytes>) -> Result<WriteSummary> {
        let data: Bytes = data.into();
        let mut source = data.as_ref();
        self.write(&mut source).await
    }

    /// Delete all content, keeping the directory entry and its id
    pub async fn truncate(&mut self) -> Result<&mut Self> {
        self.check_writable()?;
        self.refresh().await?;
        self.truncate_record().await?;
        self.cursor.clear();
        self.cursor.seek(0);
        Ok(self)
    }

    async fn truncate_record(&mut self) -> Result<()> {
        let mut cleared = self.record.clone();
        cleared.clear();
        self.record = self
            .ctx
            .blocking(move |store| {
                let deleted = store.delete_parts(cleared.id, 0)?;
                store.update_file(&cleared)?;
                debug!("Truncated {}, {} parts deleted", cleared.filename, deleted);
                Ok(cleared)
            })
            .await?;
        Ok(())
    }

    // ---- Reading ----

    /// Read up to `size` bytes from the cursor, all remaining for `None`
    pub async fn read(&mut self, size: Option<usize>) -> Result<Bytes> {
        self.check_readable()?;
        self.ensure_loaded().await?;
        Ok(self.cursor.read(size))
    }

    /// Read everything from the cursor to the end of the file
    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        self.read(None).await
    }

    /// Read one line including its `\n`, at most `limit` bytes
    pub async fn readline(&mut self, limit: Option<usize>) -> Result<Bytes> {
        self.check_readable()?;
        self.ensure_loaded().await?;
        Ok(self.cursor.readline(limit))
    }

    /// Move the read cursor; takes effect on the next read
    pub fn seek(&mut self, pos: u64) -> u64 {
        self.cursor.seek(pos)
    }

    #[must_use]
    pub fn tell(&self) -> u64 {
        self.cursor.tell()
    }

    /// Stream chunks one at a time, stopping once `limit` bytes were yielded
    pub async fn readchunks(&mut self, limit: Option<u64>) -> Result<ChunkStream> {
        self.check_readable()?;
        self.refresh().await?;
        Ok(ChunkStream::new(
            Arc::clone(&self.ctx),
            self.record.clone(),
            limit,
        ))
    }

    async fn ensure_loaded(&mut self) -> Result<()> {
        if self.cursor.is_loaded() {
            return Ok(());
        }
        self.refresh().await?;
        let data = fetch_all(&self.ctx, &self.record, self.ctx.chunking.read_batch_size).await?;
        self.cursor.load(data);
        Ok(())
    }

    // ---- Lifecycle ----

    /// Delete the file and all of its parts
    ///
    /// Later reads and writes through this handle fail with
    /// [`Error::FileNotFound`].
    pub async fn remove(&mut self) -> Result<()> {
        self.cursor.clear();
        let id = self.record.id;
        self.ctx.blocking(move |store| remove_record(store, id)).await?;
        info!("Removed {}", self.record.filename);
        Ok(())
    }

    /// Release the cached read buffer
    pub fn close(&mut self) {
        self.cursor.clear();
    }

    /// Open the same filename again with another mode
    pub async fn reopen(&self, mode: &str) -> Result<Self> {
        FileStore::from_context(Arc::clone(&self.ctx))
            .open(&self.record.filename, mode)
            .await
    }

    /// Reload the record by id
    async fn refresh(&mut self) -> Result<()> {
        let id = self.record.id;
        let current = self
            .ctx
            .blocking(move |store| Ok(store.get_file(id)?))
            .await?;
        match current {
            Some(record) => {
                self.record = record;
                Ok(())
            }
            None => Err(Error::FileNotFound(self.record.filename.clone())),
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(Error::WriteNotAllowed {
                filename: self.record.filename.clone(),
                mode: self.mode,
            })
        }
    }

    fn check_readable(&self) -> Result<()> {
        if self.mode.is_readable() {
            Ok(())
        } else {
            Err(Error::ReadNotAllowed {
                filename: self.record.filename.clone(),
                mode: self.mode,
            })
        }
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("record", &self.record)
            .field("mode", &self.mode)
            .field("pos", &self.cursor.tell())
            .finish_non_exhaustive()
    }
}

/// Delete all parts of a file, then its directory entry
pub(crate) fn remove_record(store: &dyn RowStore, id: FileId) -> Result<()> {
    store.delete_parts(id, 0)?;
    store.delete_file(id)?;
    Ok(())
}
