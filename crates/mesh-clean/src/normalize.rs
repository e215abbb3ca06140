//! Unit-cube normalization.

use nalgebra::Vector3;
use tracing::debug;

use crate::Mesh;
use crate::error::{MeshError, MeshResult};

/// A uniform scale and translation: `p' = (p + translation) * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "pipeline-config", derive(serde::Serialize))]
pub struct NormalizeTransform {
    /// Offset added before scaling (minus the old bounding-box center).
    pub translation: Vector3<f64>,
    /// Uniform scale factor (one over the old largest extent).
    pub scale: f64,
}

impl NormalizeTransform {
    /// The transform that changes nothing.
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            scale: 1.0,
        }
    }

    /// Bounding-box normalization for `mesh` without applying it.
    ///
    /// # Errors
    ///
    /// [`MeshError::DegenerateMesh`] for an empty mesh or a zero largest extent.
    pub fn for_mesh(mesh: &Mesh) -> MeshResult<Self> {
        let Some((min, max)) = mesh.bounds() else {
            return Err(MeshError::degenerate_mesh("cannot normalize an empty mesh"));
        };
        let extent = (max - min).max();
        if !(extent > 0.0) || !extent.is_finite() {
            return Err(MeshError::degenerate_mesh(format!(
                "cannot normalize a mesh with largest extent {}",
                extent
            )));
        }
        Ok(Self {
            translation: -nalgebra::center(&min, &max).coords,
            scale: 1.0 / extent,
        })
    }

    /// Apply to every vertex of `mesh`.
    pub fn apply(&self, mesh: &mut Mesh) {
        mesh.translate(self.translation);
        mesh.scale(self.scale);
    }

    /// Undo a previous [`apply`](Self::apply).
    pub fn invert(&self, mesh: &mut Mesh) {
        mesh.scale(1.0 / self.scale);
        mesh.translate(-self.translation);
    }
}

/// Center the bounding box on the origin and scale so the largest extent is 1.
///
/// Aspect ratio is preserved. Normalizing an already normalized mesh is a
/// no-op up to floating-point error.
///
/// # Errors
///
/// [`MeshError::DegenerateMesh`] for an empty mesh or a zero largest extent.
///
/// # Example
///
/// ```
/// use mesh_clean::{Mesh, normalize_mesh};
///
/// let mut mesh = Mesh::from_parts(
///     &[[10.0, 0.0, 0.0], [14.0, 0.0, 0.0], [10.0, 2.0, 1.0]],
///     &[[0, 1, 2]],
/// );
/// let transform = normalize_mesh(&mut mesh).unwrap();
///
/// assert_eq!(transform.scale, 0.25);
/// let (min, max) = mesh.bounds().unwrap();
/// assert_eq!(max.x - min.x, 1.0);
/// assert_eq!(min.x + max.x, 0.0);
/// ```
pub fn normalize_mesh(mesh: &mut Mesh) -> MeshResult<NormalizeTransform> {
    let transform = NormalizeTransform::for_mesh(mesh)?;
    transform.apply(mesh);
    debug!(
        translation = ?transform.translation,
        scale = transform.scale,
        "Normalized mesh to unit cube"
    );
    Ok(transform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn skewed_mesh() -> Mesh {
        Mesh::from_parts(
            &[
                [3.0, -7.0, 100.0],
                [9.0, -7.0, 100.0],
                [3.0, -4.0, 101.5],
                [5.0, -5.0, 100.5],
            ],
            &[[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_largest_extent_is_one() {
        let mut mesh = skewed_mesh();
        normalize_mesh(&mut mesh).unwrap();
        let (min, max) = mesh.bounds().unwrap();
        let d = max - min;
        assert_relative_eq!(d.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(d.y, 0.5, epsilon = 1e-12);
        assert_relative_eq!(d.z, 0.25, epsilon = 1e-12);
        assert_relative_eq!(nalgebra::center(&min, &max).coords.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_idempotent() {
        let mut once = skewed_mesh();
        normalize_mesh(&mut once).unwrap();
        let mut twice = once.clone();
        let second = normalize_mesh(&mut twice).unwrap();

        assert_relative_eq!(second.scale, 1.0, epsilon = 1e-12);
        for (a, b) in once.vertices.iter().zip(&twice.vertices) {
            assert_relative_eq!(a.position, b.position, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_invert_restores() {
        let original = skewed_mesh();
        let mut mesh = original.clone();
        let transform = normalize_mesh(&mut mesh).unwrap();
        transform.invert(&mut mesh);
        for (a, b) in original.vertices.iter().zip(&mesh.vertices) {
            assert_relative_eq!(a.position, b.position, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(matches!(
            normalize_mesh(&mut Mesh::new()),
            Err(MeshError::DegenerateMesh { .. })
        ));
        let mut point = Mesh::from_parts(&[[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]], &[]);
        assert!(matches!(
            normalize_mesh(&mut point),
            Err(MeshError::DegenerateMesh { .. })
        ));
    }
}
