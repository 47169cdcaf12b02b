pub mod error;
pub mod evaluation_cache;
pub mod grid;
pub mod recurrence;
pub mod spatial_index;

pub use error::EvaluateError;
pub use evaluation_cache::{CacheStats, EvaluationCache, Outcome, Resolution};
pub use grid::{GridEvaluator, ValueGrid};
pub use recurrence::{advance, RecurrenceEvaluator};
pub use spatial_index::SpatialIndex;

// Re-export core types for convenience
pub use mandelcache_core::*;
