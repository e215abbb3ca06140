//! Spatial filtering of extraneous geometry.
//!
//! Two independent filters, both evaluated in the reoriented frame:
//!
//! - **Offset plane**: drops everything closer to the ground than
//!   `plane_offset`, which removes the floor the scan was standing on.
//! - **Trim cube**: drops everything outside the axis-aligned cube of
//!   half-size `trim` centered at the origin.
//!
//! A vertex failing either filter is removed together with every face that
//! references it.

use tracing::{debug, info};

use crate::Mesh;
use crate::error::{MeshError, MeshResult};
use crate::reorient::UpAxis;
use crate::tracing_ext::OperationTimer;

/// Parameters for [`filter_spatial`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpatialFilterParams {
    /// Minimum height above the ground plane, or `None` to keep everything.
    pub plane_offset: Option<f64>,
    /// Up axis defining "height".
    pub up: UpAxis,
    /// Half-size of the keep cube, or `None` to disable trimming.
    pub trim: Option<f64>,
}

/// What [`filter_spatial`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "pipeline-config", derive(serde::Serialize))]
pub struct SpatialFilterResult {
    /// Vertices below the offset plane.
    pub below_plane: usize,
    /// Vertices outside the trim cube (and not already below the plane).
    pub outside_trim: usize,
    /// Faces dropped because they lost a vertex.
    pub faces_removed: usize,
    /// Old-to-new vertex index mapping.
    #[cfg_attr(feature = "pipeline-config", serde(skip))]
    pub remap: Vec<Option<u32>>,
}

impl SpatialFilterResult {
    /// Total vertices removed.
    pub fn vertices_removed(&self) -> usize {
        self.below_plane + self.outside_trim
    }
}

/// Remove vertices below the offset plane and/or outside the trim cube.
///
/// With both filters disabled the mesh is left untouched and the remap is
/// the identity.
///
/// # Errors
///
/// [`MeshError::DegenerateMesh`] if the mesh is empty, or if filtering
/// leaves no faces.
///
/// # Example
///
/// ```
/// use mesh_clean::{Mesh, SpatialFilterParams, filter_spatial};
///
/// let mut mesh = Mesh::from_parts(
///     &[[0.0, 0.0, 0.1], [0.2, 0.0, 0.1], [0.0, 0.2, 0.1], [90.0, 0.0, 0.1]],
///     &[[0, 1, 2], [1, 3, 2]],
/// );
/// let params = SpatialFilterParams { trim: Some(1.0), ..Default::default() };
/// let result = filter_spatial(&mut mesh, &params).unwrap();
///
/// assert_eq!(result.outside_trim, 1);
/// assert_eq!(mesh.faces, vec![[0, 1, 2]]);
/// ```
pub fn filter_spatial(
    mesh: &mut Mesh,
    params: &SpatialFilterParams,
) -> MeshResult<SpatialFilterResult> {
    let _timer =
        OperationTimer::with_context("filter_spatial", mesh.face_count(), mesh.vertex_count());

    if mesh.is_empty() {
        return Err(MeshError::degenerate_mesh("spatial filter received an empty mesh"));
    }

    if params.plane_offset.is_none() && params.trim.is_none() {
        debug!("No spatial filter configured");
        return Ok(SpatialFilterResult {
            remap: (0..mesh.vertex_count() as u32).map(Some).collect(),
            ..Default::default()
        });
    }

    let mut below_plane = 0;
    let mut outside_trim = 0;
    let keep: Vec<bool> = mesh
        .vertices
        .iter()
        .map(|v| {
            if let Some(offset) = params.plane_offset {
                if params.up.height(&v.position) < offset {
                    below_plane += 1;
                    return false;
                }
            }
            if let Some(half) = params.trim {
                let p = v.position;
                if p.x.abs() > half || p.y.abs() > half || p.z.abs() > half {
                    outside_trim += 1;
                    return false;
                }
            }
            true
        })
        .collect();

    let faces_before = mesh.face_count();
    let remap = mesh.apply_vertex_mask(&keep);
    let faces_removed = faces_before - mesh.face_count();

    if mesh.faces.is_empty() {
        return Err(MeshError::degenerate_mesh(format!(
            "spatial filter removed all {} faces (plane_offset {:?}, trim {:?})",
            faces_before, params.plane_offset, params.trim
        )));
    }

    info!(
        below_plane,
        outside_trim,
        faces_removed,
        "Spatial filter applied"
    );

    Ok(SpatialFilterResult {
        below_plane,
        outside_trim,
        faces_removed,
        remap,
    })
}
