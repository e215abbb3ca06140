//! The scan cleaning pipeline.
//!
//! [`clean_mesh`] runs every stage selected by [`CleanParams`] in a fixed
//! order:
//!
//! 1. input validation
//! 2. working frame (unit-cube normalization, when `unit_frame` is set)
//! 3. ground plane fit and reorientation
//! 4. spatial filter (offset plane and trim cube)
//! 5. dominant component
//! 6. winding correction
//! 7. hole closing
//! 8. final normalization, or restoring the original scale
//!
//! [`Pipeline`] exposes the same stages as a fluent API for callers that
//! want to run a subset or inspect the mesh in between.
//!
//! # Example
//!
//! ```
//! use mesh_clean::{CleanParams, Mesh, clean_mesh};
//!
//! // open tetrahedron: three sides, no base
//! let mesh = Mesh::from_parts(
//!     &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
//!     &[[0, 1, 3], [1, 2, 3], [2, 0, 3]],
//! );
//!
//! let params = CleanParams::default().with_reorient(false);
//! let result = clean_mesh(mesh, &params).unwrap();
//!
//! assert_eq!(result.mesh.face_count(), 4);
//! assert!(result.report.final_report.is_watertight);
//! ```

use tracing::{debug, info};

use crate::components::{ComponentFilterResult, keep_largest_component};
use crate::error::{CleanWarning, MeshResult};
use crate::holes::{HoleFillResult, close_holes};
use crate::normalize::{NormalizeTransform, normalize_mesh};
use crate::plane::Plane;
use crate::ransac::{RansacConfig, fit_plane};
use crate::reorient::{UpAxis, reorient};
use crate::spatial::{SpatialFilterParams, SpatialFilterResult, filter_spatial};
use crate::tracing_ext::log_mesh_stats;
use crate::validate::{MeshReport, log_validation, validate_mesh, validate_mesh_data};
use crate::winding::{WindingResult, fix_winding};
use crate::Mesh;

// ============================================================================
// Parameters
// ============================================================================

/// Stage toggles and thresholds for [`clean_mesh`].
///
/// All toggles are independent. Distances (`ransac_threshold`,
/// `plane_offset`, `trim`) are measured in the working frame: relative to a
/// unit-sized scan when `unit_frame` is set, in file units otherwise.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "pipeline-config",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "pipeline-config", serde(default))]
pub struct CleanParams {
    /// Scale the result into the unit cube centered at the origin.
    pub normalize: bool,
    /// Fit the ground plane and rotate it onto the up axis.
    pub reorient: bool,
    /// Triangulate boundary loops.
    pub close_holes: bool,
    /// Make face winding consistent.
    pub fix_winding: bool,
    /// Skip the component filter.
    pub keep_all_components: bool,
    /// RANSAC inlier distance.
    pub ransac_threshold: f64,
    /// Minimum height above the ground plane. Only used after reorientation.
    pub plane_offset: f64,
    /// Half-size of the keep cube around the origin.
    ///
    /// Measured in the working frame like the other distances. With
    /// `unit_frame` the scan is first centered and scaled so its largest
    /// extent is 1, which puts every vertex within 0.5 of the origin on each
    /// axis and within `sqrt(3) / 2` (about 0.87) after reorientation. A trim
    /// of 0.5 or more therefore keeps everything unless the mesh was
    /// reoriented, and 0.87 or more keeps everything in any case. Without
    /// `unit_frame` the half-size is in file units.
    pub trim: Option<f64>,
    /// RANSAC seed.
    pub seed: u64,
    /// RANSAC iteration cap.
    pub max_iterations: usize,
    /// Axis the ground normal is rotated onto.
    pub up_axis: UpAxis,
    /// Run the geometric stages in a unit-sized working frame.
    pub unit_frame: bool,
    /// Largest boundary loop (in edges) that is still closed.
    pub max_hole_edges: Option<usize>,
    /// Reverse patches that enclose negative volume.
    pub orient_outward: bool,
}

impl Default for CleanParams {
    fn default() -> Self {
        Self {
            normalize: false,
            reorient: true,
            close_holes: true,
            fix_winding: true,
            keep_all_components: false,
            ransac_threshold: 0.01,
            plane_offset: 0.005,
            trim: None,
            seed: 0,
            max_iterations: 1000,
            up_axis: UpAxis::Z,
            unit_frame: true,
            max_hole_edges: None,
            orient_outward: true,
        }
    }
}

impl CleanParams {
    /// Create params with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Full cleanup for a turntable or handheld scan. Same as the defaults.
    pub fn for_scans() -> Self {
        Self::default()
    }

    /// Validation only: every geometric stage is disabled.
    pub fn minimal() -> Self {
        Self {
            reorient: false,
            close_holes: false,
            fix_winding: false,
            keep_all_components: true,
            unit_frame: false,
            ..Self::default()
        }
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_reorient(mut self, reorient: bool) -> Self {
        self.reorient = reorient;
        self
    }

    pub fn with_close_holes(mut self, close_holes: bool) -> Self {
        self.close_holes = close_holes;
        self
    }

    pub fn with_fix_winding(mut self, fix_winding: bool) -> Self {
        self.fix_winding = fix_winding;
        self
    }

    pub fn with_keep_all_components(mut self, keep_all: bool) -> Self {
        self.keep_all_components = keep_all;
        self
    }

    pub fn with_ransac_threshold(mut self, threshold: f64) -> Self {
        self.ransac_threshold = threshold;
        self
    }

    pub fn with_plane_offset(mut self, offset: f64) -> Self {
        self.plane_offset = offset;
        self
    }

    pub fn with_trim(mut self, trim: Option<f64>) -> Self {
        self.trim = trim;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_up_axis(mut self, up_axis: UpAxis) -> Self {
        self.up_axis = up_axis;
        self
    }

    pub fn with_unit_frame(mut self, unit_frame: bool) -> Self {
        self.unit_frame = unit_frame;
        self
    }

    pub fn with_max_hole_edges(mut self, max_hole_edges: Option<usize>) -> Self {
        self.max_hole_edges = max_hole_edges;
        self
    }

    pub fn with_orient_outward(mut self, orient_outward: bool) -> Self {
        self.orient_outward = orient_outward;
        self
    }

    /// The RANSAC configuration these params select.
    pub fn ransac_config(&self) -> RansacConfig {
        RansacConfig::new()
            .with_inlier_threshold(self.ransac_threshold)
            .with_max_iterations(self.max_iterations)
            .with_seed(self.seed)
    }
}

#[cfg(feature = "pipeline-config")]
impl CleanParams {
    /// Load params from a TOML string. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or doesn't match the schema.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Load params from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or the TOML is invalid.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, PipelineConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&contents)?)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Save params to a TOML file.
    pub fn save_toml(&self, path: impl AsRef<std::path::Path>) -> Result<(), PipelineConfigError> {
        let toml_str = self.to_toml()?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Load params from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Errors that can occur when loading or saving params files.
#[cfg(feature = "pipeline-config")]
#[derive(Debug)]
pub enum PipelineConfigError {
    /// I/O error reading or writing file.
    Io(std::io::Error),
    /// TOML parsing error.
    TomlParse(toml::de::Error),
    /// TOML serialization error.
    TomlSerialize(toml::ser::Error),
}

#[cfg(feature = "pipeline-config")]
impl std::fmt::Display for PipelineConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::TomlParse(e) => write!(f, "TOML parse error: {}", e),
            Self::TomlSerialize(e) => write!(f, "TOML serialize error: {}", e),
        }
    }
}

#[cfg(feature = "pipeline-config")]
impl std::error::Error for PipelineConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::TomlParse(e) => Some(e),
            Self::TomlSerialize(e) => Some(e),
        }
    }
}

#[cfg(feature = "pipeline-config")]
impl From<std::io::Error> for PipelineConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(feature = "pipeline-config")]
impl From<toml::de::Error> for PipelineConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::TomlParse(e)
    }
}

#[cfg(feature = "pipeline-config")]
impl From<toml::ser::Error> for PipelineConfigError {
    fn from(e: toml::ser::Error) -> Self {
        Self::TomlSerialize(e)
    }
}

// ============================================================================
// Report
// ============================================================================

/// Ground plane found by the reorientation stage.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "pipeline-config", derive(serde::Serialize))]
pub struct GroundPlane {
    /// The plane before reorientation, oriented towards the scan, in the
    /// working frame.
    pub plane: Plane,
    /// Vertices within `ransac_threshold` of the plane.
    pub inlier_count: usize,
    /// Inliers over all vertices.
    pub inlier_ratio: f64,
    /// RANSAC iterations performed.
    pub iterations: usize,
    /// Whether the fitted normal was flipped to point at the scan.
    pub normal_flipped: bool,
}

/// What each stage did. Stages that did not run are `None`.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "pipeline-config", derive(serde::Serialize))]
pub struct CleanReport {
    /// Vertices in the input mesh.
    pub input_vertices: usize,
    /// Faces in the input mesh.
    pub input_faces: usize,
    /// Transform into the working frame.
    pub working_frame: Option<NormalizeTransform>,
    pub ground_plane: Option<GroundPlane>,
    pub spatial: Option<SpatialFilterResult>,
    pub components: Option<ComponentFilterResult>,
    pub winding: Option<WindingResult>,
    pub holes: Option<HoleFillResult>,
    /// Final unit-cube normalization.
    pub normalization: Option<NormalizeTransform>,
    /// Non-fatal anomalies from every stage, in stage order.
    pub warnings: Vec<CleanWarning>,
    /// Human-readable log of the stages that ran.
    pub operation_log: Vec<String>,
    /// Quality report of the output mesh.
    pub final_report: MeshReport,
}

impl CleanReport {
    /// Whether any stage reported a warning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Output of a pipeline run.
#[derive(Debug, Clone)]
pub struct CleanResult {
    /// The cleaned mesh.
    pub mesh: Mesh,
    /// What the pipeline did.
    pub report: CleanReport,
}

/// Clean a mesh with every stage `params` enables.
///
/// # Errors
///
/// Fails on the first fatal error: invalid input, a degenerate ground plane,
/// or a stage that leaves no faces.
pub fn clean_mesh(mesh: Mesh, params: &CleanParams) -> MeshResult<CleanResult> {
    Ok(Pipeline::new(mesh)
        .with_params(params.clone())
        .run()?
        .finish())
}

// ============================================================================
// Pipeline
// ============================================================================

/// A mesh cleaning pipeline.
///
/// Each stage consumes the pipeline and returns it, so stages can be chained.
/// Stages that can fail return [`MeshResult`].
///
/// # Example
///
/// ```no_run
/// use mesh_clean::Pipeline;
///
/// let result = Pipeline::load("scan.ply")?
///     .validate_input()?
///     .enter_unit_frame()?
///     .reorient()?
///     .filter_spatial()?
///     .keep_largest_component()
///     .save("clean.stl")?;
/// # Ok::<(), mesh_clean::MeshError>(())
/// ```
pub struct Pipeline {
    mesh: Mesh,
    params: CleanParams,
    report: CleanReport,
    frame: Option<NormalizeTransform>,
    reoriented: bool,
    stages_executed: usize,
}

impl Pipeline {
    /// Start a pipeline with an existing mesh and default params.
    pub fn new(mesh: Mesh) -> Self {
        let report = CleanReport {
            input_vertices: mesh.vertex_count(),
            input_faces: mesh.face_count(),
            ..Default::default()
        };
        Self {
            mesh,
            params: CleanParams::default(),
            report,
            frame: None,
            reoriented: false,
            stages_executed: 0,
        }
    }

    /// Start a pipeline by loading a mesh from a file.
    ///
    /// Supports STL, OBJ and PLY based on file extension.
    pub fn load(path: impl AsRef<std::path::Path>) -> MeshResult<Self> {
        let path = path.as_ref();
        let mesh = crate::io::load_mesh(path)?;
        let mut pipeline = Self::new(mesh);
        pipeline.log(format!(
            "Loaded {} vertices, {} faces from {}",
            pipeline.mesh.vertex_count(),
            pipeline.mesh.face_count(),
            path.display()
        ));
        Ok(pipeline)
    }

    /// Replace the params used by the following stages.
    pub fn with_params(mut self, params: CleanParams) -> Self {
        self.params = params;
        self
    }

    /// Run every stage the params enable.
    pub fn run(self) -> MeshResult<Self> {
        let mut pipeline = self.validate_input()?;
        if pipeline.params.unit_frame {
            pipeline = pipeline.enter_unit_frame()?;
        }
        if pipeline.params.reorient {
            pipeline = pipeline.reorient()?;
        }
        pipeline = pipeline.filter_spatial()?;
        if !pipeline.params.keep_all_components {
            pipeline = pipeline.keep_largest_component();
        }
        if pipeline.params.fix_winding {
            pipeline = pipeline.fix_winding();
        }
        if pipeline.params.close_holes {
            pipeline = pipeline.close_holes();
        }
        if pipeline.params.normalize {
            pipeline = pipeline.normalize()?;
        }
        Ok(pipeline)
    }

    // =========================================================================
    // Stages
    // =========================================================================

    /// Reject non-finite coordinates and bad face indices.
    pub fn validate_input(mut self) -> MeshResult<Self> {
        validate_mesh_data(&self.mesh)?;
        log_mesh_stats(&self.mesh, "input");
        self.log(format!(
            "Validated input: {} vertices, {} faces",
            self.mesh.vertex_count(),
            self.mesh.face_count()
        ));
        self.stages_executed += 1;
        Ok(self)
    }

    /// Move the mesh into the unit working frame.
    ///
    /// [`finish`](Self::finish) restores the original scale unless the mesh
    /// is normalized afterwards. Entering twice is a no-op.
    pub fn enter_unit_frame(mut self) -> MeshResult<Self> {
        if self.frame.is_some() {
            return Ok(self);
        }
        let transform = normalize_mesh(&mut self.mesh)?;
        self.log(format!(
            "Entered unit working frame (scale {:.6})",
            transform.scale
        ));
        self.frame = Some(transform);
        self.report.working_frame = Some(transform);
        self.stages_executed += 1;
        Ok(self)
    }

    /// Fit the ground plane and rotate it onto the up axis.
    pub fn reorient(mut self) -> MeshResult<Self> {
        let fit = fit_plane(&self.mesh, &self.params.ransac_config())?;
        let reorientation = reorient(&mut self.mesh, &fit.plane, self.params.up_axis)?;

        self.log(format!(
            "Reoriented ground plane ({} inliers, {:.1}%) onto {:?}",
            fit.inliers.len(),
            fit.inlier_ratio * 100.0,
            self.params.up_axis
        ));
        self.report.ground_plane = Some(GroundPlane {
            plane: reorientation.plane,
            inlier_count: fit.inliers.len(),
            inlier_ratio: fit.inlier_ratio,
            iterations: fit.iterations,
            normal_flipped: reorientation.flipped,
        });
        self.reoriented = true;
        self.stages_executed += 1;
        Ok(self)
    }

    /// Drop geometry below the offset plane and outside the trim cube.
    ///
    /// The offset plane only applies once the mesh has been reoriented. With
    /// neither filter active the stage is skipped.
    pub fn filter_spatial(mut self) -> MeshResult<Self> {
        let params = SpatialFilterParams {
            plane_offset: self.reoriented.then_some(self.params.plane_offset),
            up: self.params.up_axis,
            trim: self.params.trim,
        };
        if params.plane_offset.is_none() && params.trim.is_none() {
            debug!("Spatial filter skipped");
            return Ok(self);
        }

        let result = filter_spatial(&mut self.mesh, &params)?;
        self.log(format!(
            "Spatial filter removed {} vertices ({} below plane, {} outside trim), {} faces",
            result.vertices_removed(),
            result.below_plane,
            result.outside_trim,
            result.faces_removed
        ));
        self.report.spatial = Some(result);
        self.stages_executed += 1;
        Ok(self)
    }

    /// Keep only the dominant connected component.
    pub fn keep_largest_component(mut self) -> Self {
        let result = keep_largest_component(&mut self.mesh);
        self.log(format!(
            "Kept 1 of {} component(s), removed {} faces",
            result.components_found, result.faces_removed
        ));
        self.report.components = Some(result);
        self.stages_executed += 1;
        self
    }

    /// Make face winding consistent (and outward, if configured).
    pub fn fix_winding(mut self) -> Self {
        let mut result = fix_winding(&mut self.mesh, self.params.orient_outward);
        self.log(format!(
            "Fixed winding: {} faces flipped across {} patch(es)",
            result.faces_flipped, result.patch_count
        ));
        self.report.warnings.append(&mut result.warnings);
        self.report.winding = Some(result);
        self.stages_executed += 1;
        self
    }

    /// Triangulate boundary loops.
    pub fn close_holes(mut self) -> Self {
        let mut result = close_holes(&mut self.mesh, self.params.max_hole_edges);
        self.log(format!(
            "Closed {} of {} hole(s) with {} triangles",
            result.holes_filled, result.holes_found, result.triangles_added
        ));
        self.report.warnings.append(&mut result.warnings);
        self.report.holes = Some(result);
        self.stages_executed += 1;
        self
    }

    /// Scale into the unit cube centered at the origin. Leaves the working
    /// frame, if any, for good.
    pub fn normalize(mut self) -> MeshResult<Self> {
        self.frame = None;
        let transform = normalize_mesh(&mut self.mesh)?;
        self.log(format!("Normalized to unit cube (scale {:.6})", transform.scale));
        self.report.normalization = Some(transform);
        self.stages_executed += 1;
        Ok(self)
    }

    // =========================================================================
    // Output Operations
    // =========================================================================

    /// Save the mesh to a file.
    ///
    /// Format is determined by file extension.
    pub fn save(self, path: impl AsRef<std::path::Path>) -> MeshResult<CleanResult> {
        let path = path.as_ref();
        let mut result = self.finish();
        crate::io::save_mesh(&result.mesh, path)?;
        result
            .report
            .operation_log
            .push(format!("Saved mesh to {}", path.display()));
        Ok(result)
    }

    /// Finish the pipeline and return the result without saving.
    ///
    /// Leaves the working frame: a reoriented mesh keeps its new placement
    /// and only gets its original scale back, any other mesh is moved back
    /// to where it was.
    pub fn finish(mut self) -> CleanResult {
        if let Some(frame) = self.frame.take() {
            if self.reoriented {
                self.mesh.scale(1.0 / frame.scale);
                self.log("Restored original scale".to_string());
            } else {
                frame.invert(&mut self.mesh);
                self.log("Restored original placement".to_string());
            }
        }

        let final_report = validate_mesh(&self.mesh);
        log_validation(&final_report);
        info!(
            stages = self.stages_executed,
            vertices = final_report.vertex_count,
            faces = final_report.face_count,
            warnings = self.report.warnings.len(),
            "Cleaning finished"
        );

        let mut report = self.report;
        report.final_report = final_report;
        CleanResult {
            mesh: self.mesh,
            report,
        }
    }

    /// Get a reference to the current mesh state.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// The params used by the stages.
    pub fn params(&self) -> &CleanParams {
        &self.params
    }

    /// Get the operation log.
    pub fn log_entries(&self) -> &[String] {
        &self.report.operation_log
    }

    /// Get the number of stages executed.
    pub fn stages_executed(&self) -> usize {
        self.stages_executed
    }

    fn log(&mut self, message: String) {
        debug!("{}", message);
        self.report.operation_log.push(message);
    }
}

/// Trait for types that can be converted into a Pipeline.
pub trait IntoPipeline {
    /// Convert into a Pipeline.
    fn into_pipeline(self) -> Pipeline;
}

impl IntoPipeline for Mesh {
    fn into_pipeline(self) -> Pipeline {
        Pipeline::new(self)
    }
}

impl IntoPipeline for CleanResult {
    fn into_pipeline(self) -> Pipeline {
        Pipeline::new(self.mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vertex;
    use approx::assert_relative_eq;

    /// Closed box with outward winding.
    fn create_test_cube(size: f64) -> Mesh {
        let mut mesh = Mesh::new();
        for k in 0..8 {
            let x = if k & 1 != 0 { size } else { 0.0 };
            let y = if k & 2 != 0 { size } else { 0.0 };
            let z = if k & 4 != 0 { size } else { 0.0 };
            mesh.vertices.push(Vertex::from_coords(x, y, z));
        }
        for [a, b, c, d] in [
            [0, 2, 3, 1],
            [4, 5, 7, 6],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
            [0, 4, 6, 2],
            [1, 3, 7, 5],
        ] {
            mesh.faces.push([a, b, c]);
            mesh.faces.push([a, c, d]);
        }
        mesh
    }

    #[test]
    fn test_default_params() {
        let params = CleanParams::default();
        assert!(params.reorient);
        assert!(params.close_holes);
        assert!(params.fix_winding);
        assert!(!params.normalize);
        assert!(!params.keep_all_components);
        assert_eq!(params.ransac_threshold, 0.01);
        assert_eq!(params.plane_offset, 0.005);
        assert_eq!(params.trim, None);
        assert_eq!(params, CleanParams::for_scans());
    }

    #[test]
    fn test_builder_chain() {
        let params = CleanParams::new()
            .with_trim(Some(0.4))
            .with_seed(7)
            .with_up_axis(UpAxis::Y)
            .with_keep_all_components(true);
        assert_eq!(params.trim, Some(0.4));
        assert_eq!(params.up_axis, UpAxis::Y);
        let ransac = params.ransac_config();
        assert_eq!(ransac.seed, 7);
        assert_eq!(ransac.inlier_threshold, 0.01);
    }

    #[test]
    fn test_minimal_leaves_geometry_alone() {
        let mut mesh = create_test_cube(2.0);
        mesh.faces.pop();
        mesh.flip_face(0);
        let before = mesh.clone();

        let result = clean_mesh(mesh, &CleanParams::minimal()).unwrap();
        assert_eq!(result.mesh, before);
        assert!(!result.report.final_report.is_watertight);
        assert_eq!(result.report.operation_log.len(), 1);
    }

    #[test]
    fn test_invalid_input_rejected_before_stages() {
        let mut mesh = create_test_cube(1.0);
        mesh.faces[3] = [0, 1, 99];
        let err = clean_mesh(mesh, &CleanParams::default()).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_unit_frame_restores_placement_without_reorient() {
        let mut mesh = create_test_cube(20.0);
        mesh.translate(nalgebra::Vector3::new(100.0, -5.0, 3.0));
        let before = mesh.clone();

        let params = CleanParams::default().with_reorient(false);
        let result = clean_mesh(mesh, &params).unwrap();

        assert!(result.report.working_frame.is_some());
        for (a, b) in before.vertices.iter().zip(&result.mesh.vertices) {
            assert_relative_eq!(a.position, b.position, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_trim_measured_in_working_frame() {
        let mut mesh = create_test_cube(20.0);
        mesh.translate(nalgebra::Vector3::new(1000.0, 0.0, 0.0));
        let params = CleanParams::default()
            .with_reorient(false)
            .with_trim(Some(0.51));

        // the unit frame puts every corner at 0.5 from the origin
        let result = clean_mesh(mesh.clone(), &params).unwrap();
        assert_eq!(result.report.spatial.as_ref().unwrap().outside_trim, 0);
        assert_eq!(result.mesh.vertex_count(), 8);

        // the same half-size in file units keeps nothing
        let err = clean_mesh(mesh, &params.with_unit_frame(false)).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::DegenerateMesh);
    }

    #[test]
    fn test_normalize_stage() {
        let mesh = create_test_cube(20.0);
        let params = CleanParams::default().with_reorient(false).with_normalize(true);
        let result = clean_mesh(mesh, &params).unwrap();

        let (min, max) = result.mesh.bounds().unwrap();
        assert_relative_eq!((max - min).max(), 1.0, epsilon = 1e-12);
        assert!(result.report.normalization.is_some());
    }

    #[test]
    fn test_holes_and_winding_warnings_collected() {
        let mut mesh = create_test_cube(1.0);
        mesh.faces.truncate(10);
        mesh.flip_face(4);

        let params = CleanParams::default()
            .with_reorient(false)
            .with_max_hole_edges(Some(3));
        let result = clean_mesh(mesh, &params).unwrap();

        let holes = result.report.holes.as_ref().unwrap();
        assert_eq!(holes.holes_found, 1);
        assert_eq!(holes.holes_filled, 0);
        assert!(result.report.has_warnings());
        assert!(matches!(
            result.report.warnings[0],
            CleanWarning::SkippedHole { edge_count: 4, .. }
        ));
        assert_eq!(result.report.final_report.inconsistent_edge_count, 0);
    }

    #[test]
    fn test_fluent_stages() {
        let mut mesh = create_test_cube(1.0);
        let mut fragment = create_test_cube(0.1);
        fragment.translate(nalgebra::Vector3::new(5.0, 5.0, 5.0));
        fragment.faces.truncate(4);
        let base = mesh.vertex_count() as u32;
        mesh.vertices.extend(fragment.vertices);
        mesh.faces
            .extend(fragment.faces.iter().map(|f| [f[0] + base, f[1] + base, f[2] + base]));

        let pipeline = mesh
            .into_pipeline()
            .validate_input()
            .unwrap()
            .keep_largest_component();
        assert_eq!(pipeline.stages_executed(), 2);
        assert_eq!(pipeline.mesh().face_count(), 12);
        assert_eq!(pipeline.log_entries().len(), 2);

        let result = pipeline.finish();
        assert_eq!(result.report.components.unwrap().faces_removed, 4);
        assert!(result.report.final_report.is_clean());
    }

    #[test]
    fn test_spatial_skipped_without_filters() {
        let pipeline = Pipeline::new(create_test_cube(1.0))
            .with_params(CleanParams::minimal())
            .filter_spatial()
            .unwrap();
        assert_eq!(pipeline.stages_executed(), 0);
    }
}
