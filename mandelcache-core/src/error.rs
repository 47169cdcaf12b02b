//! Error types for viewport requests and cache configuration.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ViewportError {
    #[error("Iteration count must be a non-negative integer no larger than {max}, got {value}")]
    InvalidIterations { value: f64, max: u32 },

    #[error("Viewport bounds must be finite with x0 < x1 and y0 < y1, got x=[{x0}, {x1}] y=[{y0}, {y1}]")]
    InvalidBounds { x0: f64, x1: f64, y0: f64, y1: f64 },

    #[error("Grid resolution must be non-zero, got {height}x{width}")]
    EmptyResolution { height: usize, width: usize },

    #[error("Viewport span and cell size must be finite and positive, got span {span_x}x{span_y}, cell {dx}x{dy}")]
    DegenerateSpan {
        span_x: f64,
        span_y: f64,
        dx: f64,
        dy: f64,
    },

    #[error("Failed to parse {field}: {input:?}")]
    Parse { field: &'static str, input: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse cache config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid cache config: {0}")]
    Invalid(String),
}
