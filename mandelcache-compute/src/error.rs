//! Grid evaluation error types.

use mandelcache_core::{SamplePoint, ViewportError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvaluateError {
    #[error("Invalid viewport: {0}")]
    Viewport(#[from] ViewportError),

    #[error("Recurrence diverged at row {row}, column {col} ({point:?}) after {iterations} iterations")]
    Diverged {
        row: usize,
        col: usize,
        point: SamplePoint,
        iterations: u32,
    },

    #[error("Recurrence was clamped by containment at row {row}, column {col} ({point:?}) within {iterations} iterations")]
    Contained {
        row: usize,
        col: usize,
        point: SamplePoint,
        iterations: u32,
    },
}
