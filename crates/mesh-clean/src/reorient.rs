//! Ground-plane reorientation.
//!
//! Rigidly moves the scan so the fitted ground plane becomes the coordinate
//! plane orthogonal to the chosen up axis, with the bulk of the scan on the
//! positive side.

use nalgebra::{Point3, Rotation3, Unit, Vector3};
use tracing::{debug, info};

use crate::Mesh;
use crate::error::{MeshError, MeshResult};
use crate::plane::Plane;
use crate::tracing_ext::OperationTimer;

/// Relative tolerance for "centroid lies on the plane".
const ON_PLANE_EPSILON: f64 = 1e-9;

/// Canonical up direction of the output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "pipeline-config",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "pipeline-config", serde(rename_all = "lowercase"))]
pub enum UpAxis {
    /// Ground is the XY plane.
    #[default]
    Z,
    /// Ground is the XZ plane.
    Y,
}

impl UpAxis {
    /// Unit vector of the axis.
    pub fn vector(self) -> Vector3<f64> {
        match self {
            UpAxis::Z => Vector3::z(),
            UpAxis::Y => Vector3::y(),
        }
    }

    /// Height of a point along the axis.
    #[inline]
    pub fn height(self, point: &Point3<f64>) -> f64 {
        match self {
            UpAxis::Z => point.z,
            UpAxis::Y => point.y,
        }
    }
}

impl std::str::FromStr for UpAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "z" => Ok(UpAxis::Z),
            "y" => Ok(UpAxis::Y),
            other => Err(format!("unknown up axis '{}', expected 'z' or 'y'", other)),
        }
    }
}

/// The rigid motion applied by [`reorient`]: `p' = rotation * p + translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reorientation {
    /// Rotation taking the (oriented) plane normal onto the up axis.
    pub rotation: Rotation3<f64>,
    /// Translation applied after the rotation.
    pub translation: Vector3<f64>,
    /// The ground plane in the input frame, oriented towards the scan.
    pub plane: Plane,
    /// Whether the fitted normal was reversed to face the scan.
    pub flipped: bool,
}

impl Reorientation {
    /// Map a point of the input frame into the output frame.
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        self.rotation * point + self.translation
    }
}

/// Orient `plane` so the scan lies on its positive side.
///
/// The centroid decides. If it lies on the plane, the side holding more
/// vertices decides, and a tie keeps the fitted orientation.
pub fn orient_towards_mass(mesh: &Mesh, plane: &Plane) -> (Plane, bool) {
    let Some(centroid) = mesh.centroid() else {
        return (*plane, false);
    };

    let extent = mesh
        .bounds()
        .map(|(min, max)| (max - min).norm())
        .unwrap_or(0.0);
    let tolerance = ON_PLANE_EPSILON * extent.max(1.0);
    let distance = plane.signed_distance(&centroid);

    let flip = if distance.abs() > tolerance {
        distance < 0.0
    } else {
        let (above, below) = mesh.vertices.iter().fold((0usize, 0usize), |(a, b), v| {
            let d = plane.signed_distance(&v.position);
            if d > tolerance {
                (a + 1, b)
            } else if d < -tolerance {
                (a, b + 1)
            } else {
                (a, b)
            }
        });
        debug!(above, below, "Centroid on plane, deciding by vertex majority");
        below > above
    };

    if flip {
        (plane.flipped(), true)
    } else {
        (*plane, false)
    }
}

/// Rotation taking unit vector `from` onto unit vector `to`.
fn rotation_onto(from: &Vector3<f64>, to: &Vector3<f64>) -> Rotation3<f64> {
    if let Some(rotation) = Rotation3::rotation_between(from, to) {
        return rotation;
    }
    // Anti-parallel: half turn about any axis perpendicular to `from`.
    let helper = if from.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let axis = Unit::new_normalize(helper.cross(from));
    Rotation3::from_axis_angle(&axis, std::f64::consts::PI)
}

/// Move the mesh so `plane` becomes the ground plane for `up`.
///
/// The projection of the bounding-box center onto the plane lands on the
/// origin and the plane normal, oriented towards the scan, lands on `up`.
///
/// # Errors
///
/// [`MeshError::DegenerateMesh`] if the mesh has no vertices.
pub fn reorient(mesh: &mut Mesh, plane: &Plane, up: UpAxis) -> MeshResult<Reorientation> {
    let _timer = OperationTimer::with_context("reorient", mesh.face_count(), mesh.vertex_count());

    let Some(center) = mesh.bounds_center() else {
        return Err(MeshError::degenerate_mesh("cannot reorient a mesh with no vertices"));
    };

    let (oriented, flipped) = orient_towards_mass(mesh, plane);
    let anchor = oriented.project(&center);

    let rotation = rotation_onto(&oriented.normal, &up.vector());
    let translation = -(rotation * anchor.coords);

    mesh.rotate(&rotation);
    mesh.translate(translation);

    info!(
        flipped,
        normal = ?oriented.normal,
        anchor = ?anchor,
        "Reoriented mesh onto ground plane"
    );

    Ok(Reorientation {
        rotation,
        translation,
        plane: oriented,
        flipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Square slab on a tilted plane with a tall spike above it.
    fn tilted_scene(normal: Vector3<f64>) -> (Mesh, Plane) {
        let normal = normal.normalize();
        let plane = Plane::from_point_normal(&Point3::new(1.0, 2.0, 3.0), normal).unwrap();
        let u = normal.cross(&Vector3::new(0.3, 0.5, 0.7)).normalize();
        let v = normal.cross(&u);
        let base = plane.point();

        let mut positions = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                let p = base + u * (i as f64) + v * (j as f64);
                positions.push([p.x, p.y, p.z]);
            }
        }
        let spike = base + u * 1.5 + v * 1.5 + normal * 2.0;
        positions.push([spike.x, spike.y, spike.z]);

        (Mesh::from_parts(&positions, &[[0, 1, 16], [1, 5, 16]]), plane)
    }

    #[test]
    fn plane_lands_on_xy() {
        let (mut mesh, plane) = tilted_scene(Vector3::new(0.2, -0.4, 1.0));
        let result = reorient(&mut mesh, &plane, UpAxis::Z).unwrap();

        assert!(!result.flipped);
        for vertex in &mesh.vertices[..16] {
            assert_relative_eq!(vertex.position.z, 0.0, epsilon = 1e-9);
        }
        assert_relative_eq!(mesh.vertices[16].position.z, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn reversed_normal_is_flipped() {
        let (mut mesh, plane) = tilted_scene(Vector3::new(0.5, 0.1, 1.0));
        let result = reorient(&mut mesh, &plane.flipped(), UpAxis::Z).unwrap();

        assert!(result.flipped);
        assert_relative_eq!(mesh.vertices[16].position.z, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn anchor_is_projected_bbox_center() {
        let (mut mesh, plane) = tilted_scene(Vector3::new(-0.3, 0.3, 1.0));
        let before = mesh.clone();
        let result = reorient(&mut mesh, &plane, UpAxis::Z).unwrap();

        let center = before.bounds_center().unwrap();
        let anchor = result.plane.project(&center);
        assert_relative_eq!(result.apply(&anchor), Point3::origin(), epsilon = 1e-9);
    }

    #[test]
    fn anti_parallel_normal() {
        let (mut mesh, plane) = tilted_scene(Vector3::new(0.0, 0.0, -1.0));
        let result = reorient(&mut mesh, &plane.flipped(), UpAxis::Z);
        // the flipped plane has +Z pointing away from the spike
        let result = result.unwrap();
        assert!(result.flipped);
        assert_relative_eq!(mesh.vertices[16].position.z, 2.0, epsilon = 1e-9);
        assert_relative_eq!(
            rotation_onto(&-Vector3::z(), &Vector3::z()) * -Vector3::z(),
            Vector3::z(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn y_up_axis() {
        let (mut mesh, plane) = tilted_scene(Vector3::new(0.1, 1.0, 0.2));
        reorient(&mut mesh, &plane, UpAxis::Y).unwrap();
        for vertex in &mesh.vertices[..16] {
            assert_relative_eq!(vertex.position.y, 0.0, epsilon = 1e-9);
        }
        assert_relative_eq!(mesh.vertices[16].position.y, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn majority_decides_when_centroid_on_plane() {
        // two above, four below, centroid exactly on z = 0
        let mesh = Mesh::from_parts(
            &[
                [0.0, 0.0, 2.0],
                [1.0, 0.0, 2.0],
                [0.0, 1.0, -1.0],
                [1.0, 1.0, -1.0],
                [2.0, 0.0, -1.0],
                [2.0, 1.0, -1.0],
            ],
            &[[0, 1, 2]],
        );
        let plane = Plane::new(Vector3::z(), 0.0).unwrap();
        let (oriented, flipped) = orient_towards_mass(&mesh, &plane);
        assert!(flipped);
        assert_relative_eq!(oriented.normal, -Vector3::z());
    }

    #[test]
    fn empty_mesh_rejected() {
        let plane = Plane::new(Vector3::z(), 0.0).unwrap();
        let err = reorient(&mut Mesh::new(), &plane, UpAxis::Z).unwrap_err();
        assert!(matches!(err, MeshError::DegenerateMesh { .. }));
    }

    #[test]
    fn parse_up_axis() {
        assert_eq!("Z".parse::<UpAxis>().unwrap(), UpAxis::Z);
        assert_eq!("y".parse::<UpAxis>().unwrap(), UpAxis::Y);
        assert!("x".parse::<UpAxis>().is_err());
    }
}
