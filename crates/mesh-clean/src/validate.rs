//! Input validation and mesh quality reporting.

use nalgebra::Point3;
use tracing::{debug, info, warn};

use crate::Mesh;
use crate::adjacency::{MeshAdjacency, edge_direction_in_face};
use crate::error::{MeshError, MeshResult};

/// Quality report for a mesh.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "pipeline-config", derive(serde::Serialize))]
pub struct MeshReport {
    /// Whether the mesh has no boundary edges.
    pub is_watertight: bool,

    /// Whether all edges have at most 2 adjacent faces.
    pub is_manifold: bool,

    /// Number of boundary edges (edges with 1 adjacent face).
    pub boundary_edge_count: usize,

    /// Number of non-manifold edges (edges with >2 adjacent faces).
    pub non_manifold_edge_count: usize,

    /// Manifold edges whose two faces traverse it in the same direction.
    pub inconsistent_edge_count: usize,

    /// Total vertex count.
    pub vertex_count: usize,

    /// Total face count.
    pub face_count: usize,

    /// Bounding box as (min_corner, max_corner).
    #[cfg_attr(feature = "pipeline-config", serde(skip))]
    pub bounds: Option<(Point3<f64>, Point3<f64>)>,

    /// Dimensions (x, y, z).
    pub dimensions: Option<[f64; 3]>,

    /// Signed volume. Only meaningful for closed meshes.
    pub signed_volume: f64,

    /// Total surface area of the mesh.
    pub surface_area: f64,

    /// Number of connected components.
    pub component_count: usize,
}

impl MeshReport {
    /// True when every manifold edge is traversed in opposite directions.
    pub fn is_consistently_wound(&self) -> bool {
        self.inconsistent_edge_count == 0
    }

    /// Watertight, manifold, consistently wound.
    pub fn is_clean(&self) -> bool {
        self.is_watertight && self.is_manifold && self.is_consistently_wound()
    }
}

impl std::fmt::Display for MeshReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Mesh Report:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Faces: {}", self.face_count)?;
        writeln!(f, "  Components: {}", self.component_count)?;

        if let Some([dx, dy, dz]) = &self.dimensions {
            writeln!(f, "  Dimensions: {:.4} x {:.4} x {:.4}", dx, dy, dz)?;
        }

        writeln!(f, "  Surface Area: {:.4}", self.surface_area)?;
        writeln!(
            f,
            "  Watertight: {} (boundary edges: {})",
            if self.is_watertight { "yes" } else { "NO" },
            self.boundary_edge_count
        )?;
        writeln!(
            f,
            "  Manifold: {} (non-manifold edges: {})",
            if self.is_manifold { "yes" } else { "NO" },
            self.non_manifold_edge_count
        )?;
        writeln!(
            f,
            "  Winding: {} (inconsistent edges: {})",
            if self.is_consistently_wound() {
                "consistent"
            } else {
                "INCONSISTENT"
            },
            self.inconsistent_edge_count
        )?;

        Ok(())
    }
}

/// Inspect a mesh and return a report.
pub fn validate_mesh(mesh: &Mesh) -> MeshReport {
    let adjacency = MeshAdjacency::build(&mesh.faces);

    let boundary_edge_count = adjacency.boundary_edge_count();
    let non_manifold_edge_count = adjacency.non_manifold_edge_count();
    let inconsistent_edge_count = count_inconsistent_edges(mesh, &adjacency);

    let bounds = mesh.bounds();
    let dimensions = bounds.map(|(min, max)| {
        let d = max - min;
        [d.x, d.y, d.z]
    });

    let component_count = crate::components::find_connected_components(mesh).component_count;

    let report = MeshReport {
        is_watertight: boundary_edge_count == 0,
        is_manifold: non_manifold_edge_count == 0,
        boundary_edge_count,
        non_manifold_edge_count,
        inconsistent_edge_count,
        vertex_count: mesh.vertex_count(),
        face_count: mesh.face_count(),
        bounds,
        dimensions,
        signed_volume: mesh.signed_volume(),
        surface_area: mesh.surface_area(),
        component_count,
    };

    debug!("{}", report);
    report
}

fn count_inconsistent_edges(mesh: &Mesh, adjacency: &MeshAdjacency) -> usize {
    adjacency
        .edge_to_faces
        .iter()
        .filter(|(_, faces)| faces.len() == 2)
        .filter(|&(&(a, b), faces)| {
            let first = edge_direction_in_face(&mesh.faces[faces[0]], a, b);
            let second = edge_direction_in_face(&mesh.faces[faces[1]], a, b);
            first == second
        })
        .count()
}

/// Log a summary of a report.
pub fn log_validation(report: &MeshReport) {
    info!(
        vertices = report.vertex_count,
        faces = report.face_count,
        components = report.component_count,
        "Mesh summary"
    );

    if report.is_clean() {
        info!("Mesh is watertight, manifold and consistently wound");
        return;
    }
    if !report.is_watertight {
        warn!(
            "Not watertight: {} boundary edges",
            report.boundary_edge_count
        );
    }
    if !report.is_manifold {
        warn!(
            "Not manifold: {} non-manifold edges",
            report.non_manifold_edge_count
        );
    }
    if !report.is_consistently_wound() {
        warn!(
            "Inconsistent winding on {} edges",
            report.inconsistent_edge_count
        );
    }
}

/// Reject malformed input before any cleaning stage runs.
///
/// Checks:
/// - every coordinate is finite
/// - every face index is in range
/// - every face references three distinct vertices
///
/// # Example
/// ```
/// use mesh_clean::{Mesh, validate::validate_mesh_data};
///
/// let mesh = Mesh::from_parts(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]], &[[0, 1, 1]]);
/// let err = validate_mesh_data(&mesh).unwrap_err();
/// assert!(err.is_input_error());
/// ```
pub fn validate_mesh_data(mesh: &Mesh) -> MeshResult<()> {
    for (vertex_idx, vertex) in mesh.vertices.iter().enumerate() {
        let coords = [
            ("x", vertex.position.x),
            ("y", vertex.position.y),
            ("z", vertex.position.z),
        ];
        for (coord_name, value) in coords {
            if !value.is_finite() {
                warn!(vertex = vertex_idx, coord = coord_name, "Non-finite coordinate");
                return Err(MeshError::invalid_coordinate(vertex_idx, coord_name, value));
            }
        }
    }

    let vertex_count = mesh.vertices.len();
    for (face_idx, face) in mesh.faces.iter().enumerate() {
        if let Some(&bad) = face.iter().find(|&&v| v as usize >= vertex_count) {
            warn!(face = face_idx, vertex = bad, "Face index out of range");
            return Err(MeshError::invalid_vertex_index(face_idx, bad, vertex_count));
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            warn!(face = face_idx, "Face repeats a vertex");
            return Err(MeshError::invalid_input(format!(
                "face {} repeats a vertex: [{}, {}, {}]",
                face_idx, face[0], face[1], face[2]
            )));
        }
    }

    debug!("Mesh data validation passed");
    Ok(())
}
