//! Lookup-or-resume-or-compute for single sample points.
//!
//! Each resolved point leaves a [`CacheEntry`] behind. Later requests near
//! the same coordinate either reuse an entry at exactly the requested
//! iteration count, or resume from the entry with the most progress below it,
//! and only fall back to iterating from the origin when nothing usable is
//! cached. The recurrence is not reversible, so entries past the requested
//! count are never used.

use crate::recurrence::RecurrenceEvaluator;
use crate::spatial_index::SpatialIndex;
use mandelcache_core::{BoundingBox, CacheConfig, CacheEntry, SamplePoint, Viewport};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// How a point was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// An entry at exactly the requested iteration count was reused.
    Hit,
    /// Iteration resumed from an entry that had reached `from` steps.
    Resumed { from: u32 },
    /// Nothing usable was cached; iterated from the origin.
    Cold,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    pub value: f64,
    pub outcome: Outcome,
    /// `value` is the divergence sentinel.
    pub diverged: bool,
    /// Containment fired somewhere in the point's history, so `value` is
    /// finite but no longer follows the true recurrence.
    pub contained: bool,
}

/// Counters since construction or the last [`EvaluationCache::reset_stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub resumes: u64,
    pub cold: u64,
    /// Recurrence steps performed.
    pub steps: u64,
    /// Entries currently held by the index.
    pub entries: usize,
}

impl CacheStats {
    pub fn resolved(&self) -> u64 {
        self.hits + self.resumes + self.cold
    }
}

/// What to do for one point, decided under the read lock.
enum Plan {
    Hit {
        value: f64,
        diverged: bool,
        contained: bool,
    },
    Resume(CacheEntry),
    Cold,
}

/// Rank the entries found in a tolerance window.
///
/// An entry at exactly `target` wins outright. Otherwise the entry with the
/// largest `n` below `target` is chosen, the first one encountered on ties.
fn plan<'a>(candidates: impl IntoIterator<Item = &'a CacheEntry>, target: u32) -> Plan {
    let mut best: Option<&CacheEntry> = None;
    for entry in candidates {
        if entry.n == target {
            return Plan::Hit {
                value: entry.value,
                diverged: entry.diverged,
                contained: entry.contained,
            };
        }
        if entry.n < target && best.map_or(true, |b| entry.n > b.n) {
            best = Some(entry);
        }
    }
    match best {
        Some(entry) => Plan::Resume(*entry),
        None => Plan::Cold,
    }
}

/// Whether an entry at `n` steps can still serve a request for `target`.
fn is_useful(n: u32, target: u32, resume_window: u32) -> bool {
    n <= target && target - n <= resume_window
}

/// Incremental evaluation cache.
///
/// `resolve*` take `&self` and may run concurrently: the index is read under
/// a shared lock, the recurrence runs unlocked, and the new entry is inserted
/// under an exclusive lock. Two threads racing on the same coordinate may both
/// insert an entry; either one is a valid result. Eviction takes `&mut self`
/// and therefore never overlaps a resolve.
#[derive(Debug)]
pub struct EvaluationCache {
    index: RwLock<SpatialIndex>,
    evaluator: RecurrenceEvaluator,
    config: CacheConfig,
    recent_targets: Mutex<VecDeque<u32>>,
    hits: AtomicU64,
    resumes: AtomicU64,
    cold: AtomicU64,
}

impl EvaluationCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            index: RwLock::new(SpatialIndex::new()),
            evaluator: RecurrenceEvaluator::from_config(&config),
            config,
            recent_targets: Mutex::new(VecDeque::with_capacity(config.recent_targets + 1)),
            hits: AtomicU64::new(0),
            resumes: AtomicU64::new(0),
            cold: AtomicU64::new(0),
        }
    }

    /// Resolve `point` at `target` steps, matching cached entries inside
    /// `window`.
    pub fn resolve(&self, point: SamplePoint, target: u32, window: &BoundingBox) -> f64 {
        self.resolve_with_outcome(point, target, window).value
    }

    /// Resolve `point` matching only entries at exactly that coordinate.
    pub fn resolve_point(&self, point: SamplePoint, target: u32) -> f64 {
        self.resolve(point, target, &BoundingBox::from_point(point))
    }

    pub fn resolve_with_outcome(
        &self,
        point: SamplePoint,
        target: u32,
        window: &BoundingBox,
    ) -> Resolution {
        let decision = {
            let index = self.index.read();
            plan(index.query(window), target)
        };

        let (evaluation, outcome) = match decision {
            Plan::Hit {
                value,
                diverged,
                contained,
            } => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Resolution {
                    value,
                    outcome: Outcome::Hit,
                    diverged,
                    contained,
                };
            }
            Plan::Resume(from) => {
                self.resumes.fetch_add(1, Ordering::Relaxed);
                let mut evaluation = self.evaluator.resume(point, target - from.n, from.state);
                evaluation.contained |= from.contained;
                (evaluation, Outcome::Resumed { from: from.n })
            }
            Plan::Cold => {
                self.cold.fetch_add(1, Ordering::Relaxed);
                (self.evaluator.compute(point, target), Outcome::Cold)
            }
        };

        self.index
            .write()
            .insert(CacheEntry::new(point, target, &evaluation));

        Resolution {
            value: evaluation.value,
            outcome,
            diverged: evaluation.diverged,
            contained: evaluation.contained,
        }
    }

    /// Remember `target` as an iteration count in active use.
    pub fn note_target(&self, target: u32) {
        let mut recent = self.recent_targets.lock();
        if recent.back() == Some(&target) {
            return;
        }
        recent.retain(|&t| t != target);
        recent.push_back(target);
        while recent.len() > self.config.recent_targets.max(1) {
            recent.pop_front();
        }
    }

    /// Most recent distinct targets, oldest first.
    pub fn recent_targets(&self) -> Vec<u32> {
        self.recent_targets.lock().iter().copied().collect()
    }

    /// Evict every entry outside `retention` or not useful to any of
    /// `active_iterations`. Returns the number of entries removed.
    ///
    /// An entry is useful to target `t` when it sits at `t` exactly or at most
    /// `resume_window` steps below it. With no active targets everything goes.
    pub fn prune(&mut self, retention: &BoundingBox, active_iterations: &[u32]) -> usize {
        let resume_window = self.config.resume_window;
        let index = self.index.get_mut();
        let removed = index.retain(|entry| {
            retention.contains(&entry.point)
                && active_iterations
                    .iter()
                    .any(|&t| is_useful(entry.n, t, resume_window))
        });
        log::info!(
            "Pruned {} cache entries, {} remaining",
            removed,
            index.len()
        );
        removed
    }

    /// Evict with a retention rectangle around `viewport`.
    ///
    /// The viewport grows by `retention_margin` of its span on every side;
    /// active targets are its iteration count plus the recently noted ones.
    pub fn prune_for_viewport(&mut self, viewport: &Viewport) -> usize {
        let (span_x, span_y) = viewport.span();
        let margin = self.config.retention_margin;
        let retention = viewport.bounds().grow(span_x * margin, span_y * margin);

        let mut active = self.recent_targets();
        if !active.contains(&viewport.max_iterations) {
            active.push(viewport.max_iterations);
        }
        self.prune(&retention, &active)
    }

    /// Copies of the entries inside `window`, in index order.
    pub fn entries_in(&self, window: &BoundingBox) -> Vec<CacheEntry> {
        self.index.read().query(window).into_iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.index.get_mut().clear();
        self.recent_targets.get_mut().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            resumes: self.resumes.load(Ordering::Relaxed),
            cold: self.cold.load(Ordering::Relaxed),
            steps: self.evaluator.steps(),
            entries: self.len(),
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.resumes.store(0, Ordering::Relaxed);
        self.cold.store(0, Ordering::Relaxed);
        self.evaluator.reset_counters();
    }

    pub fn evaluator(&self) -> &RecurrenceEvaluator {
        &self.evaluator
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl Default for EvaluationCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
