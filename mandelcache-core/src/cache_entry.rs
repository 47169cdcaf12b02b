// mandelcache-core/src/cache_entry.rs

use crate::points::{BoundingBox, SamplePoint};
use serde::{Deserialize, Serialize};

/// Current iterate `z = z_r + z_i·j` of the recurrence for one sample point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceState {
    pub z_r: f64,
    pub z_i: f64,
}

impl RecurrenceState {
    /// Initial condition of the recurrence.
    pub const ORIGIN: RecurrenceState = RecurrenceState { z_r: 0.0, z_i: 0.0 };

    pub fn new(z_r: f64, z_i: f64) -> Self {
        Self { z_r, z_i }
    }

    pub fn norm(&self) -> f64 {
        (self.z_i * self.z_i + self.z_r * self.z_r).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.z_r.is_finite() && self.z_i.is_finite()
    }
}

impl Default for RecurrenceState {
    fn default() -> Self {
        Self::ORIGIN
    }
}

/// Result of advancing the recurrence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// State reached after the requested steps.
    pub state: RecurrenceState,
    /// Display value derived from `state`, always finite.
    pub value: f64,
    /// The raw derived value was not finite and `value` holds the sentinel.
    pub diverged: bool,
    /// Containment fired at least once while advancing.
    pub contained: bool,
}

impl Evaluation {
    /// Derive the display value for `state`: `ln(|z| + 1)`.
    ///
    /// A non-finite result is replaced by `sentinel` and flagged, so
    /// consumers always receive an orderable scalar while strict callers can
    /// still tell the difference.
    pub fn from_state(state: RecurrenceState, sentinel: f64, contained: bool) -> Self {
        let raw = (state.norm() + 1.0).ln();
        let (value, diverged) = if raw.is_finite() {
            (raw, false)
        } else {
            (sentinel, true)
        };
        Self {
            state,
            value,
            diverged,
            contained,
        }
    }
}

/// One cached recurrence result.
///
/// Entries are immutable: a refined computation for the same coordinate
/// produces a new entry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub point: SamplePoint,
    pub state: RecurrenceState,
    /// Steps taken from the origin to reach `state`.
    pub n: u32,
    pub value: f64,
    #[serde(default)]
    pub diverged: bool,
    /// Containment fired somewhere along the `n` steps.
    #[serde(default)]
    pub contained: bool,
}

impl CacheEntry {
    pub fn new(point: SamplePoint, n: u32, evaluation: &Evaluation) -> Self {
        Self {
            point,
            state: evaluation.state,
            n,
            value: evaluation.value,
            diverged: evaluation.diverged,
            contained: evaluation.contained,
        }
    }

    /// Entries occupy a single coordinate, never a region.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_point(self.point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_is_default_state() {
        assert_eq!(RecurrenceState::default(), RecurrenceState::new(0.0, 0.0));
        assert_eq!(RecurrenceState::ORIGIN.norm(), 0.0);
    }

    #[test]
    fn derived_value_is_log_of_norm_plus_one() {
        let evaluation = Evaluation::from_state(RecurrenceState::new(3.0, 4.0), 1000.0, false);
        assert!((evaluation.value - 6.0_f64.ln()).abs() < 1e-12);
        assert!(!evaluation.diverged);
    }

    #[test]
    fn origin_derives_zero() {
        let evaluation = Evaluation::from_state(RecurrenceState::ORIGIN, 1000.0, false);
        assert_eq!(evaluation.value, 0.0);
    }

    #[test]
    fn non_finite_state_yields_flagged_sentinel() {
        for state in [
            RecurrenceState::new(f64::INFINITY, 0.0),
            RecurrenceState::new(f64::NAN, 1.0),
            RecurrenceState::new(1.0e200, 1.0e200),
        ] {
            let evaluation = Evaluation::from_state(state, 1000.0, false);
            assert_eq!(evaluation.value, 1000.0, "state {state:?}");
            assert!(evaluation.diverged);
        }
    }

    #[test]
    fn entry_copies_evaluation_fields() {
        let evaluation = Evaluation::from_state(RecurrenceState::new(0.5, -0.5), 1000.0, true);
        let entry = CacheEntry::new(SamplePoint::new(-1.0, 0.0), 7, &evaluation);
        assert_eq!(entry.n, 7);
        assert_eq!(entry.state, evaluation.state);
        assert_eq!(entry.value, evaluation.value);
        assert!(!entry.diverged);
        assert!(entry.contained);
        assert_eq!(entry.bbox().area(), 0.0);
        assert!(entry.bbox().contains(&SamplePoint::new(-1.0, 0.0)));
    }

    #[test]
    fn entry_deserializes_without_flags() {
        let json = r#"{"point":{"r":0.0,"i":0.0},"state":{"z_r":0.0,"z_i":0.0},"n":3,"value":0.0}"#;
        let entry: CacheEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.n, 3);
        assert!(!entry.diverged);
        assert!(!entry.contained);
    }
}
