//! Shared state behind a [`FileStore`] and all of its handles.
//!
//! [`FileStore`]: crate::FileStore

use std::sync::Arc;

use tablefs_common::config::ChunkConfig;
use tablefs_common::{Config, Error, Result};
use tablefs_row_store::RowStore;

use crate::pool::WorkerPool;

pub(crate) struct StoreContext {
    pub store: Arc<dyn RowStore>,
    pub pool: WorkerPool,
    pub chunking: ChunkConfig,
}

impl StoreContext {
    pub fn new(store: Arc<dyn RowStore>, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            pool: WorkerPool::new(config.workers.resolved())?,
            chunking: config.chunking,
        })
    }

    /// Run a single row store call on the blocking thread pool
    pub async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RowStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| Error::TaskFailed(e.to_string()))?
    }
}
