use mandelcache_core::{
    CacheConfig, Containment, Evaluation, RecurrenceState, SamplePoint, DEFAULT_CACHE_CONFIG,
};
use std::sync::atomic::{AtomicU64, Ordering};

/// Advance `z' = z² + point` by `steps` iterations from `start`.
///
/// Both components are computed from the previous iterate before either is
/// written back. Containment, when enabled, is applied to each component after
/// every step.
///
/// `Evaluation::contained` covers only the steps taken by this call. `start`
/// carries no history, so a caller resuming from a cached state must OR in
/// that state's own flag.
pub fn advance(
    point: SamplePoint,
    steps: u32,
    start: RecurrenceState,
    containment: Containment,
    sentinel: f64,
) -> Evaluation {
    let (cr, ci) = point.into_parts();
    let mut zr = start.z_r;
    let mut zi = start.z_i;
    let mut contained = false;

    for _ in 0..steps {
        // z^2 + c
        let new_zr = zr * zr - zi * zi + cr;
        let new_zi = 2.0 * zr * zi + ci;

        let (new_zr, fired_r) = containment.apply(new_zr);
        let (new_zi, fired_i) = containment.apply(new_zi);
        contained |= fired_r | fired_i;

        zr = new_zr;
        zi = new_zi;
    }

    Evaluation::from_state(RecurrenceState::new(zr, zi), sentinel, contained)
}

/// Recurrence evaluator with a fixed containment policy.
///
/// Counts calls and steps so callers can observe how much work the cache saved.
#[derive(Debug)]
pub struct RecurrenceEvaluator {
    containment: Containment,
    sentinel: f64,
    calls: AtomicU64,
    steps: AtomicU64,
}

impl RecurrenceEvaluator {
    pub fn new(containment: Containment, sentinel: f64) -> Self {
        Self {
            containment,
            sentinel,
            calls: AtomicU64::new(0),
            steps: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.containment, config.divergence_sentinel)
    }

    /// Advance from the origin.
    pub fn compute(&self, point: SamplePoint, steps: u32) -> Evaluation {
        self.resume(point, steps, RecurrenceState::ORIGIN)
    }

    /// Advance from a previously reached state.
    pub fn resume(&self, point: SamplePoint, steps: u32, start: RecurrenceState) -> Evaluation {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.steps.fetch_add(u64::from(steps), Ordering::Relaxed);
        advance(point, steps, start, self.containment, self.sentinel)
    }

    pub fn containment(&self) -> Containment {
        self.containment
    }

    pub fn sentinel(&self) -> f64 {
        self.sentinel
    }

    /// Number of `compute`/`resume` calls so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Total recurrence steps performed so far.
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    pub fn reset_counters(&self) {
        self.calls.store(0, Ordering::Relaxed);
        self.steps.store(0, Ordering::Relaxed);
    }
}

impl Default for RecurrenceEvaluator {
    fn default() -> Self {
        Self::from_config(&DEFAULT_CACHE_CONFIG)
    }
}
