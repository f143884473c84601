//! The behavior clustering pipeline.
//!
//! ```text
//! ExperimentSet ─restrict─▶ RunIndex ─▶ attributes ─▶ FittingTable (parallel)
//!       │                                                  │
//!       │                                                  ▼
//!       └──────────── PartitionBuilder ◀── labels ◀── DistanceMatrix
//! ```
//!
//! Stages run strictly in sequence: distances start only after every
//! fitting has joined, and clustering only after the matrix is complete.
//! Results are cached per (experiment set, mode).

use crate::attribute;
use crate::cluster::DistanceClusterer;
use crate::clustering::Clustering;
use crate::data::ExperimentSet;
use crate::distance::DistanceBuilder;
use crate::error::{Error, Result};
use crate::fitting::FittingService;
use crate::logging::{milestone, Logger};
use crate::mode::ClusteringMode;
use crate::partition::PartitionBuilder;
use crate::schedule::{FittingScheduler, JoinMode};
use parking_lot::{Mutex, MutexGuard};
use rayon::ThreadPool;
use std::collections::HashMap;
use std::sync::Arc;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Worker threads for fitting and distances; `None` uses rayon's global pool.
    pub threads: Option<usize>,
    /// Join discipline of the fitting task tree.
    pub join: JoinMode,
    /// Restrict to instances shared by every experiment before indexing.
    pub restrict_to_shared: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: None,
            join: JoinMode::CollectAll,
            restrict_to_shared: true,
        }
    }
}

impl EngineConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a dedicated pool of `threads` workers.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Set the fitting join discipline.
    pub fn with_join(mut self, join: JoinMode) -> Self {
        self.join = join;
        self
    }

    /// Enable or disable the shared-instance restriction.
    pub fn with_restrict_to_shared(mut self, restrict: bool) -> Self {
        self.restrict_to_shared = restrict;
        self
    }
}

type Slot = Arc<Mutex<Option<Arc<Clustering>>>>;

/// Clusters experiments or instances by runtime behavior.
pub struct BehaviorClusteringEngine<S, C> {
    service: S,
    clusterer: C,
    config: EngineConfig,
    cache: Mutex<HashMap<(u64, ClusteringMode), Slot>>,
    pool: Mutex<Option<Arc<ThreadPool>>>,
}

impl<S, C> core::fmt::Debug for BehaviorClusteringEngine<S, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BehaviorClusteringEngine")
            .field("config", &self.config)
            .field("cached", &self.cache.lock().len())
            .finish_non_exhaustive()
    }
}

impl<S: FittingService, C: DistanceClusterer> BehaviorClusteringEngine<S, C> {
    /// Engine with default configuration.
    pub fn new(service: S, clusterer: C) -> Self {
        Self {
            service,
            clusterer,
            config: EngineConfig::default(),
            cache: Mutex::new(HashMap::new()),
            pool: Mutex::new(None),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self.pool = Mutex::new(None);
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The fitting service.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// The distance-matrix clusterer.
    pub fn clusterer(&self) -> &C {
        &self.clusterer
    }

    /// Clustering of `set` in `mode`, computed on first request only.
    ///
    /// Concurrent requests for the same key wait for one computation. A
    /// failed computation leaves no cache entry behind.
    ///
    /// Must be called from outside rayon's worker threads. A worker blocked
    /// on a key's lock may steal another job for that key and never wake, so
    /// such calls are rejected with [`Error::InvalidParameter`].
    pub fn compute(
        &self,
        set: &Arc<ExperimentSet>,
        mode: ClusteringMode,
        logger: Option<&dyn Logger>,
    ) -> Result<Arc<Clustering>> {
        reject_worker_thread()?;
        let key = (set.id(), mode);
        let slot = self.slot(key);
        let guard = slot.lock();
        if let Some(done) = guard.as_ref() {
            return Ok(Arc::clone(done));
        }
        let outcome = self.run(set, mode, logger);
        self.publish(key, &slot, guard, outcome)
    }

    /// Compute again and replace any cached result.
    ///
    /// On failure the previous result, if any, stays cached.
    pub fn recompute(
        &self,
        set: &Arc<ExperimentSet>,
        mode: ClusteringMode,
        logger: Option<&dyn Logger>,
    ) -> Result<Arc<Clustering>> {
        reject_worker_thread()?;
        let key = (set.id(), mode);
        let slot = self.slot(key);
        let guard = slot.lock();
        let outcome = self.run(set, mode, logger);
        self.publish(key, &slot, guard, outcome)
    }

    /// Cached result, if any.
    pub fn cached(&self, set: &ExperimentSet, mode: ClusteringMode) -> Option<Arc<Clustering>> {
        let slot = self.cache.lock().get(&(set.id(), mode)).cloned()?;
        let cached = slot.lock().as_ref().map(Arc::clone);
        cached
    }

    /// Forget both modes' results for `set`.
    pub fn evict(&self, set: &ExperimentSet) {
        self.cache.lock().retain(|(id, _), _| *id != set.id());
    }

    /// Forget everything.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    fn slot(&self, key: (u64, ClusteringMode)) -> Slot {
        Arc::clone(self.cache.lock().entry(key).or_default())
    }

    fn publish(
        &self,
        key: (u64, ClusteringMode),
        slot: &Slot,
        mut guard: MutexGuard<'_, Option<Arc<Clustering>>>,
        outcome: Result<Clustering>,
    ) -> Result<Arc<Clustering>> {
        match outcome {
            Ok(clustering) => {
                let clustering = Arc::new(clustering);
                *guard = Some(Arc::clone(&clustering));
                Ok(clustering)
            }
            Err(e) => {
                drop(guard);
                self.forget_if_empty(key, slot);
                Err(e)
            }
        }
    }

    /// Drop the map entry for `key` if it is still `slot` and holds nothing.
    /// A slot locked by another caller is left to that caller.
    fn forget_if_empty(&self, key: (u64, ClusteringMode), slot: &Slot) {
        let mut cache = self.cache.lock();
        let Some(current) = cache.get(&key) else {
            return;
        };
        if !Arc::ptr_eq(current, slot) {
            return;
        }
        let empty = current.try_lock().is_some_and(|value| value.is_none());
        if empty {
            cache.remove(&key);
        }
    }

    #[cfg(test)]
    fn cache_entries(&self) -> usize {
        self.cache.lock().len()
    }

    /// Dedicated pool, built on first use and kept for the engine's lifetime.
    fn pool(&self) -> Result<Option<Arc<ThreadPool>>> {
        let threads = match self.config.threads {
            None => return Ok(None),
            Some(0) => {
                return Err(Error::InvalidParameter {
                    name: "threads",
                    message: "must be at least 1",
                })
            }
            Some(n) => n,
        };
        let mut pool = self.pool.lock();
        if let Some(existing) = pool.as_ref() {
            return Ok(Some(Arc::clone(existing)));
        }
        let built = Arc::new(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?);
        *pool = Some(Arc::clone(&built));
        Ok(Some(built))
    }

    fn in_pool<R, F>(&self, f: F) -> Result<R>
    where
        R: Send,
        F: FnOnce() -> Result<R> + Send,
    {
        match self.pool()? {
            None => f(),
            Some(pool) => pool.install(f),
        }
    }

    fn run(
        &self,
        original: &Arc<ExperimentSet>,
        mode: ClusteringMode,
        logger: Option<&dyn Logger>,
    ) -> Result<Clustering> {
        let restricted;
        let working: &ExperimentSet = if self.config.restrict_to_shared {
            restricted = original.shared_instances();
            &restricted
        } else {
            original
        };

        let index = mode.index(working)?;
        milestone(logger, || {
            format!("clustering {mode} of {} elements", index.len())
        });
        let attributes = attribute::enumerate(working.dimensions());

        let distances = self.in_pool(|| {
            let table = FittingScheduler::new(&self.service)
                .with_join(self.config.join)
                .schedule(&index, &attributes)?;
            milestone(logger, || "modeling complete".to_owned());

            let distances = DistanceBuilder::new(&self.service).build(table)?;
            milestone(logger, || "distance matrix complete".to_owned());
            Ok(distances)
        })?;

        let labels = self.clusterer.cluster(&distances, logger)?;
        drop(distances);
        milestone(logger, || "clustering complete".to_owned());

        let clusters = PartitionBuilder::new(mode, original).build(&index.names(), &labels)?;
        let clustering = Clustering::new(Arc::clone(original), mode, clusters);
        milestone(logger, || {
            format!("finished, produced {} clusters", clustering.len())
        });
        Ok(clustering)
    }
}

fn reject_worker_thread() -> Result<()> {
    if rayon::current_thread_index().is_some() {
        return Err(Error::InvalidParameter {
            name: "caller",
            message: "compute must not be called from a rayon worker thread",
        });
    }
    Ok(())
}
