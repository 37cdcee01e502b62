//! Directory index and the public entry point, [`FileStore`].
//!
//! Every filename maps to one directory entry holding its size and part
//! count. Per filename:
//!
//! ```text
//! Absent --open(writable)--> Present(size 0) --write--> Present(size N)
//! Present --open("w")--> Present(size 0)
//! Present --remove--> Absent
//! Absent --open("r")--> FileNotFound
//! ```

use std::sync::Arc;

use bytes::Bytes;
use tablefs_common::{Config, Error, FileRecord, OpenMode, Result, validate_filename};
use tablefs_row_store::{MemoryRowStore, RedbRowStore, RowStore};
use tokio::io::AsyncRead;
use tracing::{debug, info};

use crate::context::StoreContext;
use crate::handle::{FileHandle, remove_record};
use crate::pool::WorkerPool;

/// Chunked file storage over one row store
///
/// Cloning is cheap; clones share the row store and the worker pool.
#[derive(Clone)]
pub struct FileStore {
    ctx: Arc<StoreContext>,
}

impl FileStore {
    /// Bind to an explicit row store
    pub fn new(store: Arc<dyn RowStore>, config: &Config) -> Result<Self> {
        Ok(Self::from_context(Arc::new(StoreContext::new(store, config)?)))
    }

    /// Non-persistent store, mostly for tests and scratch use
    pub fn in_memory(config: &Config) -> Result<Self> {
        Self::new(Arc::new(MemoryRowStore::new()), config)
    }

    /// Open (or create) the redb database at `storage.path`
    pub fn open_redb(config: &Config) -> Result<Self> {
        let store = RedbRowStore::open(&config.storage.path)?;
        info!("Opened file store at {}", config.storage.path.display());
        Self::new(Arc::new(store), config)
    }

    pub(crate) fn from_context(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.ctx.pool
    }

    /// Open `filename` with a mode string (`"r"`, `"w"`, `"wb"`, `"w+"`, `"rw"`, ...)
    pub async fn open(&self, filename: &str, mode: &str) -> Result<FileHandle> {
        let parsed = OpenMode::parse(mode).map_err(|e| Error::invalid_mode(mode, e))?;
        self.open_with(filename, parsed).await
    }

    /// Open `filename` with a parsed mode
    ///
    /// A missing file is created when the mode is writable and reported as
    /// [`Error::FileNotFound`] otherwise. Pure write modes (`w`, `wb`) empty
    /// an existing file; all other modes bind to it unchanged.
    pub async fn open_with(&self, filename: &str, mode: OpenMode) -> Result<FileHandle> {
        validate_filename(filename)?;
        let name = filename.to_string();
        let record = self
            .ctx
            .blocking(move |store| match store.find_file(&name)? {
                Some(mut record) if mode.truncates_on_open() => {
                    let deleted = store.delete_parts(record.id, 0)?;
                    record.clear();
                    store.update_file(&record)?;
                    info!("Overwriting {} ({} parts deleted)", name, deleted);
                    Ok(record)
                }
                Some(record) => Ok(record),
                None if mode.creates_missing() => {
                    let record = store.insert_file(&name)?;
                    info!("Created {} with id {}", name, record.id);
                    Ok(record)
                }
                None => Err(Error::FileNotFound(name)),
            })
            .await?;
        debug!("Opened {} with mode {}", record.filename, mode);
        Ok(FileHandle::new(Arc::clone(&self.ctx), record, mode))
    }

    /// Delete a file and all of its parts
    ///
    /// With `errors` set a missing file is [`Error::FileNotFound`]; otherwise
    /// it is ignored. Returns whether a file was removed.
    pub async fn remove(&self, filename: &str, errors: bool) -> Result<bool> {
        let name = filename.to_string();
        let removed = self
            .ctx
            .blocking(move |store| match store.find_file(&name)? {
                Some(record) => remove_record(store, record.id).map(|()| true),
                None if errors => Err(Error::FileNotFound(name)),
                None => Ok(false),
            })
            .await?;
        if removed {
            info!("Removed {}", filename);
        }
        Ok(removed)
    }

    pub async fn exists(&self, filename: &str) -> Result<bool> {
        self.stat_opt(filename).await.map(|r| r.is_some())
    }

    /// Directory entry of `filename`
    pub async fn stat(&self, filename: &str) -> Result<FileRecord> {
        self.stat_opt(filename)
            .await?
            .ok_or_else(|| Error::FileNotFound(filename.to_string()))
    }

    async fn stat_opt(&self, filename: &str) -> Result<Option<FileRecord>> {
        let name = filename.to_string();
        self.ctx
            .blocking(move |store| Ok(store.find_file(&name)?))
            .await
    }

    /// Filenames matching `pattern`
    ///
    /// `*` and `%` match any run of characters, `_` exactly one.
    pub async fn find(&self, pattern: &str) -> Result<Vec<String>> {
        let like = pattern.replace('*', "%");
        let records = self
            .ctx
            .blocking(move |store| Ok(store.find_files_like(&like)?))
            .await?;
        Ok(records.into_iter().map(|r| r.filename).collect())
    }

    /// All filenames, same as `find("*")`
    pub async fn list(&self) -> Result<Vec<String>> {
        self.find("*").await
    }

    // ---- Convenience ----

    /// Open with `mode` and write `data`
    pub async fn write(
        &self,
        filename: &str,
        data: impl Into<Bytes>,
        mode: &str,
    ) -> Result<FileHandle> {
        let mut handle = self.open(filename, mode).await?;
        handle.write_bytes(data).await?;
        Ok(handle)
    }

    /// Open with `mode` and stream `source` into the file
    pub async fn write_from<R>(&self, filename: &str, source: &mut R, mode: &str) -> Result<FileHandle>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut handle = self.open(filename, mode).await?;
        handle.write(source).await?;
        Ok(handle)
    }

    /// Full contents of `filename`
    pub async fn read(&self, filename: &str) -> Result<Bytes> {
        self.open(filename, "r").await?.read_to_end().await
    }

    /// Write `data` under `filename`, or under a random name when `None`
    pub async fn put(
        &self,
        data: impl Into<Bytes>,
        filename: Option<&str>,
        mode: &str,
    ) -> Result<FileHandle> {
        let generated;
        let filename = match filename {
            Some(name) => name,
            None => {
                generated = uuid::Uuid::new_v4().simple().to_string();
                generated.as_str()
            }
        };
        self.write(filename, data, mode).await
    }

    /// Read handle for `filename`
    pub async fn get(&self, filename: &str) -> Result<FileHandle> {
        self.open(filename, "r").await
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("pool", &self.ctx.pool)
            .field("chunking", &self.ctx.chunking)
            .finish_non_exhaustive()
    }
}
