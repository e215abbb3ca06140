//! Cleaning pipeline for raw 3D scan meshes.
//!
//! Scans arrive with the floor they were standing on, floating debris,
//! inconsistent triangle winding and holes where the scanner could not see.
//! This crate turns such a scan into a single, consistently wound, closed
//! surface standing upright on the origin.
//!
//! # Features
//!
//! - **File I/O**: Load and save STL, OBJ and PLY
//! - **Ground plane**: Seeded RANSAC plane fit with least-squares refinement
//! - **Reorientation**: Rotate the ground onto the up axis, anchor it at the origin
//! - **Filtering**: Offset plane, trim cube and dominant connected component
//! - **Repair**: Consistent winding, outward orientation, hole closing
//! - **Normalization**: Optional unit-cube output
//!
//! # Units and Scale
//!
//! By default the pipeline works in a **unit working frame**: the scan is
//! scaled so its largest extent is 1 before any threshold is applied, and
//! scaled back at the end. `ransac_threshold = 0.01` therefore means 1% of
//! the scan size whatever the file units are. Set `unit_frame = false` to
//! interpret thresholds in file units.
//!
//! # Coordinate System
//!
//! Right-handed. The ground normal is rotated onto **+Z** by default
//! ([`UpAxis::Y`] is available for Y-up tools). Face winding is
//! counter-clockwise when viewed from outside, so normals point outward by
//! the right-hand rule.
//!
//! # Quick Start
//!
//! ```no_run
//! use mesh_clean::{CleanParams, Mesh, clean_mesh};
//!
//! let mesh = Mesh::load("scan.ply").unwrap();
//!
//! let result = clean_mesh(mesh, &CleanParams::for_scans()).unwrap();
//! println!("{}", result.report.final_report);
//! for warning in &result.report.warnings {
//!     println!("{}", warning);
//! }
//!
//! result.mesh.save("clean.stl").unwrap();
//! ```
//!
//! ## Running Individual Stages
//!
//! ```no_run
//! use mesh_clean::{Pipeline, CleanParams};
//!
//! let result = Pipeline::load("scan.obj")?
//!     .with_params(CleanParams::default().with_trim(Some(0.4)))
//!     .validate_input()?
//!     .enter_unit_frame()?
//!     .reorient()?
//!     .filter_spatial()?
//!     .keep_largest_component()
//!     .finish();
//!
//! println!("{:?}", result.report.ground_plane);
//! # Ok::<(), mesh_clean::MeshError>(())
//! ```
//!
//! # Error Handling
//!
//! Fatal problems are [`MeshError`]s; every stage stops the pipeline on the
//! first one. Recoverable anomalies (non-manifold edges, skipped holes, ...)
//! are collected as [`CleanWarning`]s in the report instead.
//!
//! ```
//! use mesh_clean::{CleanParams, Mesh, MeshError, clean_mesh};
//!
//! // three collinear points: no plane to fit
//! let mesh = Mesh::from_parts(
//!     &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
//!     &[[0, 1, 2]],
//! );
//! match clean_mesh(mesh, &CleanParams::default()) {
//!     Err(MeshError::DegeneratePlane { details }) => println!("no ground: {}", details),
//!     other => panic!("unexpected: {:?}", other.map(|r| r.report)),
//! }
//! ```
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Index Preservation | Notes |
//! |--------|-----------|------|------|-------------------|-------|
//! | STL    | `.stl`    | ✓    | ✓    | ✗                 | Binary & ASCII |
//! | OBJ    | `.obj`    | ✓    | ✓    | ✓                 | Polygons triangulated, normals kept |
//! | PLY    | `.ply`    | ✓    | ✓    | ✓                 | ASCII & binary, colors and normals kept |

mod error;
mod pipeline;
pub mod tracing_ext;
mod types;

pub mod adjacency;
pub mod components;
pub mod holes;
pub mod io;
pub mod normalize;
pub mod plane;
pub mod ransac;
pub mod reorient;
pub mod spatial;
pub mod validate;
pub mod winding;

// Re-export core types at crate root
pub use error::{
    CleanWarning, ErrorCode, IssueSeverity, MeshError, MeshLocation, MeshResult,
    RecoverySuggestion,
};
pub use types::{Mesh, Triangle, Vertex, VertexColor};

pub use adjacency::MeshAdjacency;

pub use io::{MeshFormat, load_mesh, save_mesh};

pub use pipeline::{
    CleanParams, CleanReport, CleanResult, GroundPlane, IntoPipeline, Pipeline, clean_mesh,
};

#[cfg(feature = "pipeline-config")]
pub use pipeline::PipelineConfigError;

pub use components::{
    ComponentAnalysis, ComponentFilterResult, find_connected_components, keep_largest_component,
};
pub use holes::{BoundaryLoop, HoleFillResult, close_holes, detect_holes};
pub use normalize::{NormalizeTransform, normalize_mesh};
pub use plane::Plane;
pub use ransac::{RansacConfig, RansacResult, fit_plane, fit_plane_to_points};
pub use reorient::{Reorientation, UpAxis, reorient};
pub use spatial::{SpatialFilterParams, SpatialFilterResult, filter_spatial};
pub use validate::{MeshReport, validate_mesh, validate_mesh_data};
pub use winding::{WindingResult, fix_winding};

pub use tracing_ext::{OperationTimer, log_mesh_stats};

// Convenience methods on Mesh
impl Mesh {
    /// Load a mesh from a file, auto-detecting format from extension.
    pub fn load(path: impl AsRef<std::path::Path>) -> MeshResult<Self> {
        io::load_mesh(path.as_ref())
    }

    /// Save the mesh to a file, auto-detecting format from extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> MeshResult<()> {
        io::save_mesh(self, path.as_ref())
    }

    /// Validate the mesh and return a quality report.
    pub fn validate(&self) -> MeshReport {
        validate::validate_mesh(self)
    }

    /// Run the cleaning pipeline on this mesh.
    pub fn clean(self, params: &CleanParams) -> MeshResult<CleanResult> {
        pipeline::clean_mesh(self, params)
    }
}
