//! Error and warning types for the cleaning pipeline.
//!
//! Fatal conditions are reported as [`MeshError`] and abort the pipeline.
//! Everything a stage can work around (non-manifold edges, unclosed boundary
//! loops, winding conflicts) is collected as a [`CleanWarning`] instead and
//! handed back with the cleaned mesh.
//!
//! # Error Codes
//!
//! Each error has a unique code in the format `MESH-XXXX`:
//! - `MESH-1xxx`: I/O errors (file reading, writing, parsing)
//! - `MESH-2xxx`: Input validation errors (coordinates, indices)
//! - `MESH-3xxx`: Stage failures (plane fitting, degenerate geometry)
//! - `MESH-4xxx`: Format errors
//! - `MESH-5xxx`: Non-fatal warnings collected during cleaning
//!
//! # Example
//!
//! ```
//! use mesh_clean::{ErrorCode, MeshError};
//!
//! let err = MeshError::degenerate_plane("mesh has only 2 vertices");
//! assert_eq!(err.code(), ErrorCode::DegeneratePlane);
//! assert_eq!(err.code().as_str(), "MESH-3001");
//! ```

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // I/O errors (1xxx)
    /// MESH-1001: Failed to read file
    IoRead = 1001,
    /// MESH-1002: Failed to write file
    IoWrite = 1002,
    /// MESH-1003: Failed to parse file format
    ParseError = 1003,

    // Validation errors (2xxx)
    /// MESH-2000: Input mesh is malformed
    InvalidInput = 2000,
    /// MESH-2001: Face references invalid vertex index
    InvalidVertexIndex = 2001,
    /// MESH-2002: Vertex has NaN or Infinity coordinate
    InvalidCoordinate = 2002,
    /// MESH-2003: Mesh has no vertices or faces
    EmptyMesh = 2003,

    // Stage failures (3xxx)
    /// MESH-3001: No plane could be fitted
    DegeneratePlane = 3001,
    /// MESH-3002: Geometry collapsed to nothing or zero extent
    DegenerateMesh = 3002,

    // Format errors (4xxx)
    /// MESH-4001: Unsupported file format
    UnsupportedFormat = 4001,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `MESH-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IoRead => "MESH-1001",
            ErrorCode::IoWrite => "MESH-1002",
            ErrorCode::ParseError => "MESH-1003",
            ErrorCode::InvalidInput => "MESH-2000",
            ErrorCode::InvalidVertexIndex => "MESH-2001",
            ErrorCode::InvalidCoordinate => "MESH-2002",
            ErrorCode::EmptyMesh => "MESH-2003",
            ErrorCode::DegeneratePlane => "MESH-3001",
            ErrorCode::DegenerateMesh => "MESH-3002",
            ErrorCode::UnsupportedFormat => "MESH-4001",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions for mesh errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Re-export the scan from the capture software.
    ReexportFile { format: Option<String> },
    /// Disable one or more pipeline stages.
    DisableStage { flags: Vec<String> },
    /// Use a different file format.
    UseDifferentFormat { suggested: Vec<String> },
    /// Check the source scan.
    CheckSourceMesh { checks: Vec<String> },
    /// Adjust parameters for the operation.
    AdjustParameters { parameters: Vec<(String, String)> },
    /// No automatic recovery available.
    None,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::ReexportFile { format } => {
                if let Some(fmt) = format {
                    write!(f, "Try re-exporting the scan as {}", fmt)
                } else {
                    write!(f, "Try re-exporting the scan from the capture software")
                }
            }
            RecoverySuggestion::DisableStage { flags } => {
                write!(f, "Try re-running with {}", flags.join(" or "))
            }
            RecoverySuggestion::UseDifferentFormat { suggested } => {
                write!(f, "Try using a different format: {}", suggested.join(", "))
            }
            RecoverySuggestion::CheckSourceMesh { checks } => {
                write!(f, "Check the source mesh for: {}", checks.join(", "))
            }
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Try adjusting: {}", params.join(", "))
            }
            RecoverySuggestion::None => write!(f, "No automatic recovery available"),
        }
    }
}

/// Location information for mesh errors and warnings.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshLocation {
    /// A specific vertex.
    Vertex {
        index: usize,
        position: Option<[f64; 3]>,
    },
    /// A specific face.
    Face {
        index: usize,
        vertices: Option<[u32; 3]>,
    },
    /// An undirected edge.
    Edge { vertex_a: usize, vertex_b: usize },
    /// A location inside a file.
    File { path: PathBuf, line: Option<usize> },
    /// No specific location.
    Unknown,
}

impl std::fmt::Display for MeshLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshLocation::Vertex { index, position } => {
                if let Some([x, y, z]) = position {
                    write!(f, "vertex {} at ({:.3}, {:.3}, {:.3})", index, x, y, z)
                } else {
                    write!(f, "vertex {}", index)
                }
            }
            MeshLocation::Face { index, vertices } => {
                if let Some([a, b, c]) = vertices {
                    write!(f, "face {} with vertices [{}, {}, {}]", index, a, b, c)
                } else {
                    write!(f, "face {}", index)
                }
            }
            MeshLocation::Edge { vertex_a, vertex_b } => {
                write!(f, "edge between vertices {} and {}", vertex_a, vertex_b)
            }
            MeshLocation::File { path, line } => match line {
                Some(l) => write!(f, "{}:{}", path.display(), l),
                None => write!(f, "{}", path.display()),
            },
            MeshLocation::Unknown => write!(f, "unknown location"),
        }
    }
}

/// Fatal errors raised while loading, cleaning or saving a scan.
#[derive(Debug, Error, Diagnostic)]
pub enum MeshError {
    /// Error reading from a file.
    #[error("failed to read mesh from {path}")]
    #[diagnostic(
        code(mesh::io::read),
        help("Check that the file exists and is readable. Try: ls -la {}", path.display())
    )]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write mesh to {path}")]
    #[diagnostic(
        code(mesh::io::write),
        help("Check that the directory exists and is writable")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing mesh file format.
    #[error("failed to parse mesh from {path}: {details}")]
    #[diagnostic(
        code(mesh::parse::error),
        help("The file may be corrupted or use an unsupported variant of the format.")
    )]
    ParseError { path: PathBuf, details: String },

    /// Unsupported file format.
    #[error("unsupported mesh format: {extension:?}")]
    #[diagnostic(code(mesh::format::unsupported), help("Supported formats: STL, OBJ, PLY"))]
    UnsupportedFormat { extension: Option<String> },

    /// Malformed input mesh, surfaced before any stage runs.
    #[error("invalid input mesh: {details}")]
    #[diagnostic(
        code(mesh::validation::input),
        help("The scan contains malformed data. Re-export it or run a validator on the file.")
    )]
    InvalidInput { details: String },

    /// Empty mesh (no vertices or faces).
    #[error("mesh is empty: {details}")]
    #[diagnostic(
        code(mesh::validation::empty),
        help("The mesh must have at least one vertex and one face.")
    )]
    EmptyMesh { details: String },

    /// Invalid vertex index in face data.
    #[error(
        "invalid vertex index: face {face_index} references vertex {vertex_index}, but mesh only has {vertex_count} vertices"
    )]
    #[diagnostic(
        code(mesh::validation::vertex_index),
        help("Check the mesh export settings.")
    )]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    /// Invalid coordinate value (NaN or Infinity).
    #[error("invalid coordinate at vertex {vertex_index}: {coordinate} is {value}")]
    #[diagnostic(
        code(mesh::validation::coordinate),
        help("Check for numerical issues in the source data.")
    )]
    InvalidCoordinate {
        vertex_index: usize,
        coordinate: &'static str,
        value: f64,
    },

    /// RANSAC could not produce a plane.
    #[error("could not fit a ground plane: {details}")]
    #[diagnostic(
        code(mesh::ransac::degenerate),
        help("The scan may be too small or all points collinear. Try --no_reorient.")
    )]
    DegeneratePlane { details: String },

    /// Geometry is empty or has zero extent where a stage needs volume.
    #[error("degenerate mesh: {details}")]
    #[diagnostic(
        code(mesh::stage::degenerate),
        help("Filtering may have removed everything. Try a larger --trim or a smaller --plane_offset.")
    )]
    DegenerateMesh { details: String },
}

impl MeshError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MeshError::IoRead { .. } => ErrorCode::IoRead,
            MeshError::IoWrite { .. } => ErrorCode::IoWrite,
            MeshError::ParseError { .. } => ErrorCode::ParseError,
            MeshError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            MeshError::InvalidInput { .. } => ErrorCode::InvalidInput,
            MeshError::EmptyMesh { .. } => ErrorCode::EmptyMesh,
            MeshError::InvalidVertexIndex { .. } => ErrorCode::InvalidVertexIndex,
            MeshError::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            MeshError::DegeneratePlane { .. } => ErrorCode::DegeneratePlane,
            MeshError::DegenerateMesh { .. } => ErrorCode::DegenerateMesh,
        }
    }

    /// True for errors caused by malformed input data.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            MeshError::InvalidInput { .. }
                | MeshError::EmptyMesh { .. }
                | MeshError::InvalidVertexIndex { .. }
                | MeshError::InvalidCoordinate { .. }
        )
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            MeshError::IoRead { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["file exists".into(), "file permissions".into()],
            },
            MeshError::IoWrite { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["directory exists".into(), "write permissions".into()],
            },
            MeshError::ParseError { .. } => RecoverySuggestion::ReexportFile {
                format: Some("binary STL or PLY".into()),
            },
            MeshError::UnsupportedFormat { .. } => RecoverySuggestion::UseDifferentFormat {
                suggested: vec!["STL".into(), "OBJ".into(), "PLY".into()],
            },
            MeshError::InvalidInput { .. } | MeshError::EmptyMesh { .. } => {
                RecoverySuggestion::ReexportFile { format: None }
            }
            MeshError::InvalidVertexIndex { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["face indices".into(), "export settings".into()],
            },
            MeshError::InvalidCoordinate { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["coordinate values".into(), "export precision".into()],
            },
            MeshError::DegeneratePlane { .. } => RecoverySuggestion::DisableStage {
                flags: vec!["--no_reorient".into()],
            },
            MeshError::DegenerateMesh { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![
                    ("trim".into(), "a larger cube or none".into()),
                    ("plane_offset".into(), "a smaller value".into()),
                ],
            },
        }
    }

    /// Returns location information if available.
    pub fn location(&self) -> Option<MeshLocation> {
        match self {
            MeshError::InvalidVertexIndex { face_index, .. } => Some(MeshLocation::Face {
                index: *face_index,
                vertices: None,
            }),
            MeshError::InvalidCoordinate { vertex_index, .. } => Some(MeshLocation::Vertex {
                index: *vertex_index,
                position: None,
            }),
            MeshError::ParseError { path, .. }
            | MeshError::IoRead { path, .. }
            | MeshError::IoWrite { path, .. } => Some(MeshLocation::File {
                path: path.clone(),
                line: None,
            }),
            _ => None,
        }
    }

    // Constructor helpers for common error patterns

    /// Create an IoRead error.
    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoRead {
            path: path.into(),
            source,
        }
    }

    /// Create an IoWrite error.
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a ParseError.
    pub fn parse_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        MeshError::ParseError {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(details: impl Into<String>) -> Self {
        MeshError::InvalidInput {
            details: details.into(),
        }
    }

    /// Create an InvalidVertexIndex error.
    pub fn invalid_vertex_index(face_index: usize, vertex_index: u32, vertex_count: usize) -> Self {
        MeshError::InvalidVertexIndex {
            face_index,
            vertex_index,
            vertex_count,
        }
    }

    /// Create an InvalidCoordinate error.
    pub fn invalid_coordinate(vertex_index: usize, coordinate: &'static str, value: f64) -> Self {
        MeshError::InvalidCoordinate {
            vertex_index,
            coordinate,
            value,
        }
    }

    /// Create an EmptyMesh error.
    pub fn empty_mesh(details: impl Into<String>) -> Self {
        MeshError::EmptyMesh {
            details: details.into(),
        }
    }

    /// Create a DegeneratePlane error.
    pub fn degenerate_plane(details: impl Into<String>) -> Self {
        MeshError::DegeneratePlane {
            details: details.into(),
        }
    }

    /// Create a DegenerateMesh error.
    pub fn degenerate_mesh(details: impl Into<String>) -> Self {
        MeshError::DegenerateMesh {
            details: details.into(),
        }
    }

    /// Create an UnsupportedFormat error.
    pub fn unsupported_format(extension: Option<String>) -> Self {
        MeshError::UnsupportedFormat { extension }
    }
}

/// Non-fatal anomalies reported by the cleaning stages.
///
/// Unlike [`MeshError`], a warning never stops the pipeline. Stages push
/// them into the report and carry on with a best-effort result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "pipeline-config", derive(serde::Serialize))]
#[cfg_attr(feature = "pipeline-config", serde(tag = "kind", rename_all = "snake_case"))]
pub enum CleanWarning {
    /// Edge shared by more than two faces; winding does not propagate across it.
    NonManifoldEdge {
        vertex_a: u32,
        vertex_b: u32,
        face_count: usize,
    },
    /// Two faces still disagree on a shared edge after propagation.
    UnresolvedWinding { face_index: usize, neighbor_index: usize },
    /// Boundary vertex with more than two boundary edges.
    NonSimpleBoundary { vertex_index: u32, boundary_degree: usize },
    /// Boundary walk dead-ended before returning to its start.
    UnclosedLoop { start_vertex: u32, length: usize },
    /// Loop was found but not filled.
    SkippedHole { edge_count: usize, reason: String },
    /// Ear clipping found no ear; the loop was fan-triangulated.
    TriangulationFallback { edge_count: usize },
}

impl CleanWarning {
    /// Returns a severity level for the warning.
    pub fn severity(&self) -> IssueSeverity {
        match self {
            CleanWarning::TriangulationFallback { .. } => IssueSeverity::Info,
            CleanWarning::NonSimpleBoundary { .. } => IssueSeverity::Info,
            _ => IssueSeverity::Warning,
        }
    }

    /// Returns a code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            CleanWarning::NonManifoldEdge { .. } => "MESH-5001",
            CleanWarning::UnresolvedWinding { .. } => "MESH-5002",
            CleanWarning::NonSimpleBoundary { .. } => "MESH-5003",
            CleanWarning::UnclosedLoop { .. } => "MESH-5004",
            CleanWarning::SkippedHole { .. } => "MESH-5005",
            CleanWarning::TriangulationFallback { .. } => "MESH-5006",
        }
    }

    /// Where in the mesh the anomaly was seen.
    pub fn location(&self) -> MeshLocation {
        match self {
            CleanWarning::NonManifoldEdge {
                vertex_a, vertex_b, ..
            } => MeshLocation::Edge {
                vertex_a: *vertex_a as usize,
                vertex_b: *vertex_b as usize,
            },
            CleanWarning::UnresolvedWinding { face_index, .. } => MeshLocation::Face {
                index: *face_index,
                vertices: None,
            },
            CleanWarning::NonSimpleBoundary { vertex_index, .. } => MeshLocation::Vertex {
                index: *vertex_index as usize,
                position: None,
            },
            CleanWarning::UnclosedLoop { start_vertex, .. } => MeshLocation::Vertex {
                index: *start_vertex as usize,
                position: None,
            },
            _ => MeshLocation::Unknown,
        }
    }
}

/// Severity levels for warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueSeverity {
    /// Informational, no action needed.
    Info,
    /// The output may not be what was asked for.
    Warning,
}

impl std::fmt::Display for CleanWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanWarning::NonManifoldEdge {
                vertex_a,
                vertex_b,
                face_count,
            } => write!(
                f,
                "edge ({}, {}) is non-manifold (shared by {} faces)",
                vertex_a, vertex_b, face_count
            ),
            CleanWarning::UnresolvedWinding {
                face_index,
                neighbor_index,
            } => write!(
                f,
                "face {} still disagrees with neighbor {} after winding propagation",
                face_index, neighbor_index
            ),
            CleanWarning::NonSimpleBoundary {
                vertex_index,
                boundary_degree,
            } => write!(
                f,
                "boundary vertex {} touches {} boundary edges",
                vertex_index, boundary_degree
            ),
            CleanWarning::UnclosedLoop {
                start_vertex,
                length,
            } => write!(
                f,
                "boundary walk from vertex {} stopped after {} edges without closing",
                start_vertex, length
            ),
            CleanWarning::SkippedHole { edge_count, reason } => {
                write!(f, "hole with {} edges not filled: {}", edge_count, reason)
            }
            CleanWarning::TriangulationFallback { edge_count } => write!(
                f,
                "hole with {} edges fan-triangulated (no ear found)",
                edge_count
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = MeshError::invalid_vertex_index(5, 100, 50);
        assert_eq!(err.code(), ErrorCode::InvalidVertexIndex);
        assert_eq!(err.code().as_str(), "MESH-2001");

        assert_eq!(
            MeshError::degenerate_mesh("empty").code().as_str(),
            "MESH-3002"
        );
    }

    #[test]
    fn test_plane_failure_suggests_skipping_reorientation() {
        let err = MeshError::degenerate_plane("collinear");
        match err.recovery_suggestion() {
            RecoverySuggestion::DisableStage { flags } => {
                assert_eq!(flags, vec!["--no_reorient".to_string()]);
            }
            other => panic!("Expected DisableStage suggestion, got {:?}", other),
        }
    }

    #[test]
    fn test_location_info() {
        let err = MeshError::invalid_vertex_index(5, 100, 50);
        match err.location() {
            Some(MeshLocation::Face { index, .. }) => assert_eq!(index, 5),
            other => panic!("Expected Face location, got {:?}", other),
        }
        assert!(MeshError::degenerate_plane("x").location().is_none());
    }

    #[test]
    fn test_input_errors() {
        assert!(MeshError::invalid_input("bad").is_input_error());
        assert!(MeshError::invalid_coordinate(0, "x", f64::NAN).is_input_error());
        assert!(!MeshError::degenerate_plane("bad").is_input_error());
    }

    #[test]
    fn test_warning_severity_and_display() {
        let w = CleanWarning::NonManifoldEdge {
            vertex_a: 1,
            vertex_b: 2,
            face_count: 3,
        };
        assert_eq!(w.severity(), IssueSeverity::Warning);
        assert_eq!(w.code(), "MESH-5001");
        assert!(w.to_string().contains("shared by 3 faces"));

        let fallback = CleanWarning::TriangulationFallback { edge_count: 7 };
        assert_eq!(fallback.severity(), IssueSeverity::Info);
    }

    #[test]
    fn test_error_display() {
        let err = MeshError::invalid_vertex_index(5, 100, 50);
        let display = format!("{}", err);
        assert!(display.contains("face 5"));
        assert!(display.contains("vertex 100"));
        assert!(display.contains("50 vertices"));
    }
}
