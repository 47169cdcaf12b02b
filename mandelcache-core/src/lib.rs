pub mod cache_entry;
pub mod config;
pub mod error;
pub mod points;
pub mod viewport;

pub use cache_entry::{CacheEntry, Evaluation, RecurrenceState};
pub use config::{CacheConfig, Containment, DEFAULT_CACHE_CONFIG};
pub use error::{ConfigError, ViewportError};
pub use points::{BoundingBox, SamplePoint};
pub use viewport::{checked_iterations, PanDirection, Viewport, PAN_FRACTION};
