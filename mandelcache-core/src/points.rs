use serde::{Deserialize, Serialize};

/// A point in the complex plane, `r + i·j`.
///
/// Sample points are the keys of the evaluation cache; once created they
/// never change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    r: f64,
    i: f64,
}

impl SamplePoint {
    pub fn new(r: f64, i: f64) -> Self {
        Self { r, i }
    }

    /// Real part (horizontal axis).
    pub fn r(&self) -> f64 {
        self.r
    }

    /// Imaginary part (vertical axis).
    pub fn i(&self) -> f64 {
        self.i
    }

    pub fn into_parts(self) -> (f64, f64) {
        (self.r, self.i)
    }

    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.i.is_finite()
    }
}

impl From<(f64, f64)> for SamplePoint {
    fn from((r, i): (f64, f64)) -> Self {
        Self::new(r, i)
    }
}

/// Axis-aligned rectangle in the complex plane.
///
/// All four edges are inclusive, so a box whose `min == max` contains exactly
/// one point. The empty box has `min = +inf` and `max = -inf` and is the
/// identity for [`BoundingBox::union`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: SamplePoint,
    pub max: SamplePoint,
}

impl BoundingBox {
    pub fn new(min: SamplePoint, max: SamplePoint) -> Self {
        Self { min, max }
    }

    /// Build a box from raw bounds, normalizing swapped edges.
    pub fn from_bounds(r0: f64, r1: f64, i0: f64, i1: f64) -> Self {
        Self {
            min: SamplePoint::new(r0.min(r1), i0.min(i1)),
            max: SamplePoint::new(r0.max(r1), i0.max(i1)),
        }
    }

    /// Degenerate box covering a single point.
    pub fn from_point(point: SamplePoint) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Tolerance window centered on `center`, extending `half_r` and `half_i`
    /// in each direction.
    pub fn around(center: SamplePoint, half_r: f64, half_i: f64) -> Self {
        let half_r = half_r.abs();
        let half_i = half_i.abs();
        Self {
            min: SamplePoint::new(center.r() - half_r, center.i() - half_i),
            max: SamplePoint::new(center.r() + half_r, center.i() + half_i),
        }
    }

    pub fn empty() -> Self {
        Self {
            min: SamplePoint::new(f64::INFINITY, f64::INFINITY),
            max: SamplePoint::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.min.r() <= self.max.r() && self.min.i() <= self.max.i())
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.max.r() - self.min.r()
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.max.i() - self.min.i()
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Half perimeter; used as a tie-breaker where degenerate boxes all have
    /// zero area.
    pub fn margin(&self) -> f64 {
        self.width() + self.height()
    }

    pub fn center(&self) -> SamplePoint {
        SamplePoint::new(
            (self.min.r() + self.max.r()) / 2.0,
            (self.min.i() + self.max.i()) / 2.0,
        )
    }

    pub fn contains(&self, point: &SamplePoint) -> bool {
        point.r() >= self.min.r()
            && point.r() <= self.max.r()
            && point.i() >= self.min.i()
            && point.i() <= self.max.i()
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        !other.is_empty()
            && other.min.r() >= self.min.r()
            && other.max.r() <= self.max.r()
            && other.min.i() >= self.min.i()
            && other.max.i() <= self.max.i()
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        other.min.r() <= self.max.r()
            && other.max.r() >= self.min.r()
            && other.min.i() <= self.max.i()
            && other.max.i() >= self.min.i()
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> Self {
        Self {
            min: SamplePoint::new(
                self.min.r().min(other.min.r()),
                self.min.i().min(other.min.i()),
            ),
            max: SamplePoint::new(
                self.max.r().max(other.max.r()),
                self.max.i().max(other.max.i()),
            ),
        }
    }

    pub fn extend_point(&mut self, point: &SamplePoint) {
        *self = self.union(&BoundingBox::from_point(*point));
    }

    /// Area and margin growth needed for `self` to also cover `other`.
    pub fn enlargement(&self, other: &BoundingBox) -> (f64, f64) {
        let merged = self.union(other);
        (
            merged.area() - self.area(),
            merged.margin() - self.margin(),
        )
    }

    /// Grow the box by `margin_r` on the left and right and `margin_i` on the
    /// top and bottom.
    pub fn grow(&self, margin_r: f64, margin_i: f64) -> Self {
        Self {
            min: SamplePoint::new(self.min.r() - margin_r, self.min.i() - margin_i),
            max: SamplePoint::new(self.max.r() + margin_r, self.max.i() + margin_i),
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}
