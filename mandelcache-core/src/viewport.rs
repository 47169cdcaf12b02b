use crate::error::ViewportError;
use crate::points::{BoundingBox, SamplePoint};
use serde::{Deserialize, Serialize};

/// Fraction of the visible span moved by a single pan step.
pub const PAN_FRACTION: f64 = 0.1;

/// Direction of a pan step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanDirection {
    Left,
    Right,
    Up,
    Down,
}

/// A single render request: a rectangle of the complex plane, the target
/// iteration count and the grid resolution.
///
/// - `x0..x1`: real-axis bounds, sampled by `width` columns
/// - `y0..y1`: imaginary-axis bounds, sampled by `height` rows
/// - `max_iterations`: recurrence steps evaluated per sample
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
    pub max_iterations: u32,
    pub height: usize,
    pub width: usize,
}

impl Viewport {
    /// Create a viewport and validate it.
    pub fn new(
        (x0, x1): (f64, f64),
        (y0, y1): (f64, f64),
        max_iterations: u32,
        (height, width): (usize, usize),
    ) -> Result<Self, ViewportError> {
        let viewport = Self {
            x0,
            x1,
            y0,
            y1,
            max_iterations,
            height,
            width,
        };
        viewport.validate()?;
        Ok(viewport)
    }

    /// Create a viewport from an untyped iteration count.
    ///
    /// Collaborators that read the count from a numeric input field hand it
    /// over as a float; negative, fractional or non-finite counts are rejected
    /// here, before any cache interaction.
    pub fn from_request(
        (x0, x1): (f64, f64),
        (y0, y1): (f64, f64),
        iterations: f64,
        (height, width): (usize, usize),
    ) -> Result<Self, ViewportError> {
        let max_iterations = checked_iterations(iterations)?;
        Self::new((x0, x1), (y0, y1), max_iterations, (height, width))
    }

    /// Create a viewport from string inputs.
    pub fn from_strings(
        (x0, x1): (&str, &str),
        (y0, y1): (&str, &str),
        iterations: &str,
        (height, width): (&str, &str),
    ) -> Result<Self, ViewportError> {
        Self::from_request(
            (parse_f64("x0", x0)?, parse_f64("x1", x1)?),
            (parse_f64("y0", y0)?, parse_f64("y1", y1)?),
            parse_f64("iterations", iterations)?,
            (parse_usize("height", height)?, parse_usize("width", width)?),
        )
    }

    /// Check bounds, resolution and the derived sampling geometry.
    ///
    /// Fields are public, so a viewport deserialized or built by hand may
    /// violate these; the grid evaluator calls this before touching the cache.
    /// Finite bounds can still overflow their span (`x1 - x0`) or round the
    /// cell size to zero, and either would turn sample points into NaN or
    /// collapse them.
    pub fn validate(&self) -> Result<(), ViewportError> {
        let finite = [self.x0, self.x1, self.y0, self.y1]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.x0 >= self.x1 || self.y0 >= self.y1 {
            return Err(ViewportError::InvalidBounds {
                x0: self.x0,
                x1: self.x1,
                y0: self.y0,
                y1: self.y1,
            });
        }
        if self.height == 0 || self.width == 0 {
            return Err(ViewportError::EmptyResolution {
                height: self.height,
                width: self.width,
            });
        }
        let (span_x, span_y) = self.span();
        let (dx, dy) = self.cell_size();
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if !(usable(span_x) && usable(span_y) && usable(dx) && usable(dy)) {
            return Err(ViewportError::DegenerateSpan {
                span_x,
                span_y,
                dx,
                dy,
            });
        }
        Ok(())
    }

    pub fn span(&self) -> (f64, f64) {
        (self.x1 - self.x0, self.y1 - self.y0)
    }

    /// Size of one grid cell: `(dx, dy)`.
    pub fn cell_size(&self) -> (f64, f64) {
        let (span_x, span_y) = self.span();
        (span_x / self.width as f64, span_y / self.height as f64)
    }

    /// Complex coordinate sampled by grid cell `(row, col)`.
    ///
    /// Rows advance along the imaginary axis from `y0`, columns along the real
    /// axis from `x0`.
    pub fn sample_point(&self, row: usize, col: usize) -> SamplePoint {
        let (dx, dy) = self.cell_size();
        SamplePoint::new(self.x0 + col as f64 * dx, self.y0 + row as f64 * dy)
    }

    /// Half a grid cell in each axis around `point`.
    pub fn tolerance_window(&self, point: SamplePoint) -> BoundingBox {
        let (dx, dy) = self.cell_size();
        BoundingBox::around(point, dx / 2.0, dy / 2.0)
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_bounds(self.x0, self.x1, self.y0, self.y1)
    }

    /// Scale the viewport around `target`.
    ///
    /// Every edge moves towards `target` by `factor`: a factor below 1 zooms
    /// in, above 1 zooms out, and `target` stays at the same place on screen.
    pub fn zoom_to(&self, target: SamplePoint, factor: f64) -> Self {
        Self {
            x0: target.r() - (target.r() - self.x0) * factor,
            x1: target.r() - (target.r() - self.x1) * factor,
            y0: target.i() - (target.i() - self.y0) * factor,
            y1: target.i() - (target.i() - self.y1) * factor,
            ..*self
        }
    }

    /// Shift the viewport by [`PAN_FRACTION`] of its span.
    pub fn pan(&self, direction: PanDirection) -> Self {
        let (span_x, span_y) = self.span();
        let (shift_x, shift_y) = match direction {
            PanDirection::Left => (-span_x * PAN_FRACTION, 0.0),
            PanDirection::Right => (span_x * PAN_FRACTION, 0.0),
            PanDirection::Up => (0.0, span_y * PAN_FRACTION),
            PanDirection::Down => (0.0, -span_y * PAN_FRACTION),
        };
        Self {
            x0: self.x0 + shift_x,
            x1: self.x1 + shift_x,
            y0: self.y0 + shift_y,
            y1: self.y1 + shift_y,
            ..*self
        }
    }

    /// Complex coordinate at a fractional position of the view, where
    /// `(0, 0)` is `(x0, y0)` and `(1, 1)` is `(x1, y1)`.
    pub fn location_at(&self, fraction_x: f64, fraction_y: f64) -> SamplePoint {
        let (span_x, span_y) = self.span();
        SamplePoint::new(self.x0 + fraction_x * span_x, self.y0 + fraction_y * span_y)
    }

    /// Rescale the imaginary span so the view matches a `height x width`
    /// display without distortion. The center is preserved.
    pub fn fit_to_aspect(&self, height: usize, width: usize) -> Self {
        if height == 0 || width == 0 {
            return *self;
        }
        let (span_x, _) = self.span();
        let center_y = (self.y0 + self.y1) / 2.0;
        let half_y = span_x * height as f64 / width as f64 / 2.0;
        Self {
            y0: center_y - half_y,
            y1: center_y + half_y,
            ..*self
        }
    }

    /// Same view at a different iteration count.
    pub fn with_iterations(&self, max_iterations: u32) -> Self {
        Self {
            max_iterations,
            ..*self
        }
    }

    /// Same view at a different grid resolution.
    pub fn with_resolution(&self, height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            ..*self
        }
    }
}

/// Convert an untyped iteration count into a step count.
pub fn checked_iterations(value: f64) -> Result<u32, ViewportError> {
    let invalid = ViewportError::InvalidIterations {
        value,
        max: u32::MAX,
    };
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(invalid);
    }
    Ok(value as u32)
}

fn parse_f64(field: &'static str, input: &str) -> Result<f64, ViewportError> {
    input.trim().parse::<f64>().map_err(|_| ViewportError::Parse {
        field,
        input: input.to_string(),
    })
}

fn parse_usize(field: &'static str, input: &str) -> Result<usize, ViewportError> {
    input.trim().parse::<usize>().map_err(|_| ViewportError::Parse {
        field,
        input: input.to_string(),
    })
}
