//! Drives the evaluation cache across a viewport grid.

use crate::error::EvaluateError;
use crate::evaluation_cache::{EvaluationCache, Outcome, Resolution};
use mandelcache_core::Viewport;
use rayon::prelude::*;
use std::time::Instant;

/// Row-major `height x width` matrix of display values.
///
/// Row `h` holds the samples at imaginary coordinate `y0 + h·dy`, column `w`
/// the samples at real coordinate `x0 + w·dx`.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueGrid {
    height: usize,
    width: usize,
    values: Vec<f64>,
}

impl ValueGrid {
    /// # Panics
    ///
    /// Panics if `values` does not hold exactly `height * width` entries.
    pub fn new(height: usize, width: usize, values: Vec<f64>) -> Self {
        assert_eq!(
            values.len(),
            height * width,
            "value count does not match a {height}x{width} grid"
        );
        Self {
            height,
            width,
            values,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.values.get(row * self.width + col).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.height {
            return None;
        }
        self.values.get(row * self.width..(row + 1) * self.width)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.width.max(1))
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Smallest and largest value, or `None` for an empty grid.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.values.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows().map(<[f64]>::to_vec).collect()
    }
}

/// Evaluates viewports against a borrowed [`EvaluationCache`].
pub struct GridEvaluator<'a> {
    cache: &'a EvaluationCache,
    parallel: bool,
}

impl<'a> GridEvaluator<'a> {
    /// Sequential or parallel according to the cache's config.
    pub fn new(cache: &'a EvaluationCache) -> Self {
        Self {
            cache,
            parallel: cache.config().parallel,
        }
    }

    pub fn with_parallel(self, parallel: bool) -> Self {
        Self { parallel, ..self }
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Evaluate every grid cell of `viewport`.
    ///
    /// Diverged cells carry the divergence sentinel.
    pub fn evaluate(&self, viewport: &Viewport) -> Result<ValueGrid, EvaluateError> {
        let resolutions = self.resolve_all(viewport)?;
        Ok(to_grid(viewport, &resolutions))
    }

    /// Like [`GridEvaluator::evaluate`], but fails on the first cell in
    /// row-major order whose value is the divergence sentinel or was produced
    /// by a clamped recurrence.
    pub fn evaluate_strict(&self, viewport: &Viewport) -> Result<ValueGrid, EvaluateError> {
        let resolutions = self.resolve_all(viewport)?;
        let flagged = resolutions
            .iter()
            .position(|r| r.diverged || r.contained);
        if let Some(index) = flagged {
            let (row, col) = (index / viewport.width, index % viewport.width);
            let point = viewport.sample_point(row, col);
            let iterations = viewport.max_iterations;
            if resolutions[index].diverged {
                log::warn!("Diverged sample at row {}, column {} ({:?})", row, col, point);
                return Err(EvaluateError::Diverged {
                    row,
                    col,
                    point,
                    iterations,
                });
            }
            log::warn!("Contained sample at row {}, column {} ({:?})", row, col, point);
            return Err(EvaluateError::Contained {
                row,
                col,
                point,
                iterations,
            });
        }
        Ok(to_grid(viewport, &resolutions))
    }

    fn resolve_all(&self, viewport: &Viewport) -> Result<Vec<Resolution>, EvaluateError> {
        viewport.validate()?;
        self.cache.note_target(viewport.max_iterations);

        let start = Instant::now();
        let rows: Vec<Vec<Resolution>> = if self.parallel {
            (0..viewport.height)
                .into_par_iter()
                .map(|row| self.resolve_row(viewport, row))
                .collect()
        } else {
            (0..viewport.height)
                .map(|row| self.resolve_row(viewport, row))
                .collect()
        };
        let resolutions: Vec<Resolution> = rows.into_iter().flatten().collect();

        let (mut hits, mut resumes, mut cold) = (0usize, 0usize, 0usize);
        for resolution in &resolutions {
            match resolution.outcome {
                Outcome::Hit => hits += 1,
                Outcome::Resumed { .. } => resumes += 1,
                Outcome::Cold => cold += 1,
            }
        }
        log::debug!(
            "Evaluated {}x{} grid at {} iterations in {:.1}ms: {} hits, {} resumed, {} cold, {} cached",
            viewport.height,
            viewport.width,
            viewport.max_iterations,
            start.elapsed().as_secs_f64() * 1000.0,
            hits,
            resumes,
            cold,
            self.cache.len()
        );

        Ok(resolutions)
    }

    fn resolve_row(&self, viewport: &Viewport, row: usize) -> Vec<Resolution> {
        (0..viewport.width)
            .map(|col| {
                let point = viewport.sample_point(row, col);
                let window = viewport.tolerance_window(point);
                self.cache
                    .resolve_with_outcome(point, viewport.max_iterations, &window)
            })
            .collect()
    }
}

fn to_grid(viewport: &Viewport, resolutions: &[Resolution]) -> ValueGrid {
    ValueGrid::new(
        viewport.height,
        viewport.width,
        resolutions.iter().map(|r| r.value).collect(),
    )
}
