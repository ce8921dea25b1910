//! Bounded result cache in front of the inference pipeline.
//!
//! Completed forecasts are memoized by the exact request tuple with
//! least-recently-used eviction. A miss claims the key, so at most one
//! computation per fingerprint is in flight: concurrent identical
//! requests block on a condition variable until the winner publishes
//! or aborts. Clearing bumps an epoch, which keeps computations begun
//! against a discarded model generation from repopulating the cache.

use std::collections::{HashMap, HashSet};

use log::info;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::data::{PredictionRequest, PredictionResult};

/// Cache counters surfaced by the status operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

/// Outcome of [`PredictionCache::begin`].
#[derive(Debug)]
pub enum CacheLookup {
    /// Stored result; the caller is done.
    Hit(PredictionResult),
    /// The caller now owns the computation for this key and must call
    /// [`PredictionCache::complete`] or [`PredictionCache::abort`].
    Compute(ComputeTicket),
}

/// Proof of a claimed computation, bound to the cache epoch it started
/// under.
#[derive(Debug, Clone, Copy)]
pub struct ComputeTicket {
    epoch: u64,
}

struct Entry {
    result: PredictionResult,
    last_used: u64,
}

struct Inner {
    map: HashMap<PredictionRequest, Entry>,
    inflight: HashSet<PredictionRequest>,
    tick: u64,
    epoch: u64,
    hits: u64,
    misses: u64,
}

/// Memoizes completed 7-day forecasts by request fingerprint.
pub struct PredictionCache {
    capacity: usize,
    inner: Mutex<Inner>,
    published: Condvar,
}

impl PredictionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                inflight: HashSet::new(),
                tick: 0,
                epoch: 0,
                hits: 0,
                misses: 0,
            }),
            published: Condvar::new(),
        }
    }

    /// Look up a fingerprint, claiming the computation on a miss.
    /// Counts exactly one hit or one miss per call; a caller that waits
    /// out another request's computation and finds its result counts as
    /// a hit.
    pub fn begin(&self, key: &PredictionRequest) -> CacheLookup {
        let mut inner = self.inner.lock();
        loop {
            if inner.map.contains_key(key) {
                inner.tick += 1;
                inner.hits += 1;
                let tick = inner.tick;
                let entry = inner.map.get_mut(key).expect("presence checked above");
                entry.last_used = tick;
                return CacheLookup::Hit(entry.result.clone());
            }
            if !inner.inflight.contains(key) {
                inner.inflight.insert(key.clone());
                inner.misses += 1;
                return CacheLookup::Compute(ComputeTicket { epoch: inner.epoch });
            }
            self.published.wait(&mut inner);
        }
    }

    /// Publish a claimed computation's result and wake waiters. The
    /// write is dropped (the claim still released) when the cache was
    /// cleared since the ticket was issued.
    pub fn complete(
        &self,
        key: &PredictionRequest,
        result: PredictionResult,
        ticket: ComputeTicket,
    ) {
        let mut inner = self.inner.lock();
        inner.inflight.remove(key);
        if ticket.epoch == inner.epoch {
            Self::insert(&mut inner, self.capacity, key.clone(), result);
        }
        self.published.notify_all();
    }

    /// Release a claimed computation that failed, waking waiters so one
    /// of them can retry.
    pub fn abort(&self, key: &PredictionRequest) {
        let mut inner = self.inner.lock();
        inner.inflight.remove(key);
        self.published.notify_all();
    }

    /// Store a result outside the begin/complete protocol.
    pub fn put(&self, key: PredictionRequest, result: PredictionResult) {
        let mut inner = self.inner.lock();
        Self::insert(&mut inner, self.capacity, key, result);
    }

    pub fn get(&self, key: &PredictionRequest) -> Option<PredictionResult> {
        match self.begin(key) {
            CacheLookup::Hit(result) => Some(result),
            CacheLookup::Compute(_) => {
                self.abort(key);
                None
            }
        }
    }

    fn insert(inner: &mut Inner, capacity: usize, key: PredictionRequest, result: PredictionResult) {
        inner.tick += 1;
        let tick = inner.tick;
        if !inner.map.contains_key(&key) && inner.map.len() >= capacity {
            if let Some(victim) = inner
                .map
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.map.remove(&victim);
            }
        }
        inner.map.insert(
            key,
            Entry {
                result,
                last_used: tick,
            },
        );
    }

    /// Drop every entry and reset the counters; called after a retrain
    /// so no result from a discarded generation is ever served.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.map.len();
        inner.map.clear();
        inner.epoch += 1;
        inner.hits = 0;
        inner.misses = 0;
        info!("prediction cache cleared ({dropped} entries dropped)");
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.map.len(),
            capacity: self.capacity,
        }
    }
}
