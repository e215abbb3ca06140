//! Plane in Hessian normal form.

use nalgebra::{Point3, Vector3};

/// Relative tolerance below which three points are treated as collinear.
const COLLINEAR_EPSILON: f64 = 1e-10;

/// A plane `normal · p + offset = 0` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "pipeline-config", derive(serde::Serialize))]
pub struct Plane {
    /// Unit normal.
    pub normal: Vector3<f64>,
    /// Signed offset of the plane along the normal.
    pub offset: f64,
}

impl Plane {
    /// Create a plane from a normal and signed offset. The normal is normalized
    /// and the offset rescaled to match.
    ///
    /// Returns `None` if the normal is zero or not finite.
    #[must_use]
    pub fn new(normal: Vector3<f64>, offset: f64) -> Option<Self> {
        let norm = normal.norm();
        if !(norm > f64::EPSILON) || !norm.is_finite() || !offset.is_finite() {
            return None;
        }
        Some(Self {
            normal: normal / norm,
            offset: offset / norm,
        })
    }

    /// Create the plane through `point` with the given normal.
    #[must_use]
    pub fn from_point_normal(point: &Point3<f64>, normal: Vector3<f64>) -> Option<Self> {
        let norm = normal.norm();
        if !(norm > f64::EPSILON) {
            return None;
        }
        let unit = normal / norm;
        Self::new(unit, -unit.dot(&point.coords))
    }

    /// Create a plane from three points, oriented by the right-hand rule.
    ///
    /// Returns `None` for duplicate or collinear points.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_clean::Plane;
    /// use nalgebra::Point3;
    ///
    /// let plane = Plane::from_points(
    ///     &Point3::new(0.0, 0.0, 1.0),
    ///     &Point3::new(1.0, 0.0, 1.0),
    ///     &Point3::new(0.0, 1.0, 1.0),
    /// )
    /// .unwrap();
    /// assert!((plane.normal.z - 1.0).abs() < 1e-12);
    /// assert!((plane.offset + 1.0).abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn from_points(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Option<Self> {
        let e1 = p1 - p0;
        let e2 = p2 - p0;
        let cross = e1.cross(&e2);
        let scale = e1.norm() * e2.norm();
        if !(scale > 0.0) || cross.norm() <= COLLINEAR_EPSILON * scale {
            return None;
        }
        Self::from_point_normal(p0, cross)
    }

    /// Signed distance: positive on the side the normal points to.
    #[inline]
    #[must_use]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) + self.offset
    }

    /// Perpendicular distance.
    #[inline]
    #[must_use]
    pub fn distance(&self, point: &Point3<f64>) -> f64 {
        self.signed_distance(point).abs()
    }

    /// Whether the point lies within `threshold` of the plane.
    #[inline]
    #[must_use]
    pub fn is_inlier(&self, point: &Point3<f64>, threshold: f64) -> bool {
        self.distance(point) <= threshold
    }

    /// Orthogonal projection of a point onto the plane.
    #[must_use]
    pub fn project(&self, point: &Point3<f64>) -> Point3<f64> {
        point - self.normal * self.signed_distance(point)
    }

    /// The point of the plane closest to the origin.
    #[must_use]
    pub fn point(&self) -> Point3<f64> {
        Point3::from(-self.normal * self.offset)
    }

    /// Same plane with the opposite orientation.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }
}
