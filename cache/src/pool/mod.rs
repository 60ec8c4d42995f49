//! Resources shared by every [crate::MatrixObject].

use crate::{
    adapter::{Distributed, Kind, Local, Spill},
    soft::{Key, SoftCache},
    Config,
};
use prometheus_client::registry::Registry;
use std::sync::{Arc, Mutex};
use tessera_blob::Storage;
use tessera_matrix::MatrixBlock;
use tracing::{debug, trace};

mod metrics;
pub(crate) use metrics::Metrics;

/// Owns the configuration, storage adapters, soft cache, and metrics used by a set of objects.
///
/// `local` receives eviction files when [crate::EvictionConfig::backend] is [Kind::Local].
/// `distributed` holds every persisted matrix (and eviction files when the backend is
/// [Kind::Distributed]).
pub struct Pool<S: Storage> {
    cfg: Config,
    spill: Spill<S>,
    distributed: Distributed<S>,
    soft: Mutex<SoftCache>,
    pub(crate) metrics: Metrics,
}

impl<S: Storage> Pool<S> {
    /// Create a new pool and register its metrics in `registry`.
    pub fn new(local: S, distributed: S, cfg: Config, registry: &mut Registry) -> Arc<Self> {
        let spill = match cfg.eviction.backend {
            Kind::Local => Spill::Local(Local::new(local, cfg.compression)),
            Kind::Distributed => Spill::Distributed(Distributed::new(distributed.clone())),
        };
        debug!(
            backend = ?cfg.eviction.backend,
            threshold = cfg.caching_threshold,
            soft_capacity = cfg.soft_capacity,
            "initialized pool"
        );
        Arc::new(Self {
            soft: Mutex::new(SoftCache::new(cfg.soft_capacity)),
            spill,
            distributed: Distributed::new(distributed),
            metrics: Metrics::new(registry),
            cfg,
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub(crate) fn spill(&self) -> &Spill<S> {
        &self.spill
    }

    pub(crate) fn distributed(&self) -> &Distributed<S> {
        &self.distributed
    }

    /// Location of the eviction file for object `id`.
    pub fn spill_path(&self, id: u64) -> String {
        let eviction = &self.cfg.eviction;
        format!(
            "{}{}{:09}{}",
            eviction.root, eviction.prefix, id, eviction.extension
        )
    }

    pub(crate) fn soft_insert(&self, key: Key, block: Arc<MatrixBlock>) {
        let mut soft = self.soft.lock().unwrap();
        let dropped = soft.insert(key, block);
        if dropped > 0 {
            trace!(?key, dropped, "soft cache full");
        }
        self.metrics.soft_cells.set(soft.cells() as i64);
    }

    pub(crate) fn soft_take(&self, key: &Key) -> Option<Arc<MatrixBlock>> {
        let mut soft = self.soft.lock().unwrap();
        let block = soft.take(key);
        self.metrics.soft_cells.set(soft.cells() as i64);
        block
    }

    pub(crate) fn soft_get(&self, key: &Key) -> Option<Arc<MatrixBlock>> {
        self.soft.lock().unwrap().get(key)
    }

    pub(crate) fn soft_remove(&self, key: &Key) {
        let mut soft = self.soft.lock().unwrap();
        if soft.remove(key) {
            self.metrics.soft_cells.set(soft.cells() as i64);
        }
    }

    /// Returns true if the soft cache holds the released payload of object `id`.
    pub fn is_soft_cached(&self, id: u64) -> bool {
        self.soft.lock().unwrap().contains(&Key::Payload(id))
    }

    /// Number of cells currently held by the soft cache.
    pub fn soft_cells(&self) -> u64 {
        self.soft.lock().unwrap().cells()
    }

    /// Drop every soft cache entry, as would happen under memory pressure.
    ///
    /// Subsequent restores fall back to eviction files or sources.
    pub fn clear_soft(&self) {
        let mut soft = self.soft.lock().unwrap();
        debug!(entries = soft.len(), cells = soft.cells(), "clearing soft cache");
        soft.clear();
        self.metrics.soft_cells.set(0);
    }
}
