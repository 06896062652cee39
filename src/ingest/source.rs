//! Injectable dataset source with lazy caching. The pipeline only sees
//! the trait, so tests and demos swap in an in-memory source.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

use crate::error::EngineError;
use crate::ingest::columnar::{self, DatasetMeta, NormalizedDataset};
use crate::ingest::IngestStats;
use crate::models::TickRecord;

#[async_trait]
pub trait TickSource: Send + Sync {
    /// Produce the full dataset, reading the backing store on first
    /// call only.
    async fn load(&self) -> Result<Arc<NormalizedDataset>, EngineError>;

    /// Drop cached state so the next `load` rereads the source.
    fn invalidate(&self);
}

/// File-backed source that parses the columnar dataset once and serves
/// the parsed copy afterwards.
pub struct DatasetCache {
    path: PathBuf,
    cached: RwLock<Option<Arc<NormalizedDataset>>>,
}

impl DatasetCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Invalidate and reread in one step.
    pub async fn reload(&self) -> Result<Arc<NormalizedDataset>, EngineError> {
        self.invalidate();
        self.load().await
    }
}

#[async_trait]
impl TickSource for DatasetCache {
    async fn load(&self) -> Result<Arc<NormalizedDataset>, EngineError> {
        if let Some(dataset) = self.cached.read().clone() {
            return Ok(dataset);
        }
        // Parse outside the lock; two racing loads just parse twice and
        // the second write wins.
        let dataset = Arc::new(columnar::load_dataset(&self.path)?);
        *self.cached.write() = Some(Arc::clone(&dataset));
        Ok(dataset)
    }

    fn invalidate(&self) {
        self.cached.write().take();
        info!(path = %self.path.display(), "dataset cache invalidated");
    }
}

/// Fixed in-memory source.
pub struct StaticSource {
    dataset: Arc<NormalizedDataset>,
}

impl StaticSource {
    pub fn new(dataset: NormalizedDataset) -> Self {
        Self {
            dataset: Arc::new(dataset),
        }
    }

    pub fn from_ticks(ticks: Vec<TickRecord>) -> Self {
        let stats = IngestStats {
            rows_seen: ticks.len() as u64,
            rows_skipped: 0,
        };
        Self::new(NormalizedDataset {
            meta: DatasetMeta::default(),
            ticks,
            stats,
        })
    }
}

#[async_trait]
impl TickSource for StaticSource {
    async fn load(&self) -> Result<Arc<NormalizedDataset>, EngineError> {
        Ok(Arc::clone(&self.dataset))
    }

    fn invalidate(&self) {}
}
