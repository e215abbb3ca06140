//! Winding order correction.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::Mesh;
use crate::adjacency::{MeshAdjacency, edge_direction_in_face};
use crate::error::CleanWarning;
use crate::tracing_ext::OperationTimer;
use crate::types::signed_volume_of;

/// Outcome of [`fix_winding`].
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "pipeline-config", derive(serde::Serialize))]
pub struct WindingResult {
    /// Faces whose winding ended up reversed (each face counted once).
    pub faces_flipped: usize,
    /// Orientation patches: faces reachable from each other over manifold edges.
    pub patch_count: usize,
    /// Patches reversed as a whole to face outward.
    pub patches_reversed: usize,
    /// Non-manifold edges and unresolved conflicts.
    pub warnings: Vec<CleanWarning>,
}

/// Make winding consistent so every manifold edge is traversed in opposite
/// directions by its two faces.
///
/// Breadth-first from the lowest unvisited face of each patch: a neighbor
/// that runs the shared edge in the same direction as the current face is
/// flipped before it is queued. Edges shared by more than two faces do not
/// propagate and are reported. A visited neighbor that still disagrees (a
/// non-orientable patch) is reported and left alone.
///
/// With `orient_outward`, each patch whose signed volume about its own
/// centroid is negative is then reversed as a whole.
///
/// # Example
/// ```
/// use mesh_clean::Mesh;
/// use mesh_clean::winding::fix_winding;
///
/// // two triangles of a quad, the second wound the wrong way
/// let mut mesh = Mesh::from_parts(
///     &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
///     &[[0, 1, 2], [0, 3, 2]],
/// );
/// let result = fix_winding(&mut mesh, false);
/// assert_eq!(result.faces_flipped, 1);
/// assert_eq!(mesh.faces[1], [0, 2, 3]);
/// ```
pub fn fix_winding(mesh: &mut Mesh, orient_outward: bool) -> WindingResult {
    let _timer = OperationTimer::with_context("fix_winding", mesh.face_count(), mesh.vertex_count());

    let mut result = WindingResult::default();
    if mesh.faces.is_empty() {
        return result;
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    let face_count = mesh.faces.len();

    for ((a, b), face_count) in adjacency.non_manifold_edges() {
        warn!(a, b, face_count, "Non-manifold edge blocks winding propagation");
        result.warnings.push(CleanWarning::NonManifoldEdge {
            vertex_a: a,
            vertex_b: b,
            face_count,
        });
    }

    let mut visited = vec![false; face_count];
    let mut flipped = vec![false; face_count];
    let mut patches: Vec<Vec<usize>> = Vec::new();
    let mut queue: VecDeque<usize> = VecDeque::new();

    for start_face in 0..face_count {
        if visited[start_face] {
            continue;
        }

        let mut patch = Vec::new();
        visited[start_face] = true;
        queue.push_back(start_face);

        while let Some(face_idx) = queue.pop_front() {
            patch.push(face_idx);
            let neighbors: Vec<(usize, (u32, u32))> = adjacency
                .manifold_neighbors(&mesh.faces, face_idx)
                .collect();

            for (neighbor, (a, b)) in neighbors {
                if visited[neighbor] {
                    continue;
                }
                visited[neighbor] = true;

                // The current face runs a -> b; a consistent neighbor runs b -> a.
                if edge_direction_in_face(&mesh.faces[neighbor], a, b) == Some(true) {
                    mesh.flip_face(neighbor);
                    flipped[neighbor] = !flipped[neighbor];
                }
                queue.push_back(neighbor);
            }
        }

        patches.push(patch);
    }

    result.patch_count = patches.len();

    if orient_outward {
        for patch in &patches {
            if patch_is_inward(mesh, patch) {
                for &face_idx in patch {
                    mesh.flip_face(face_idx);
                    flipped[face_idx] = !flipped[face_idx];
                }
                result.patches_reversed += 1;
            }
        }
    }

    let mut conflicts: Vec<(usize, usize)> = adjacency
        .edge_to_faces
        .iter()
        .filter(|(_, faces)| faces.len() == 2)
        .filter(|&(&(a, b), faces)| {
            edge_direction_in_face(&mesh.faces[faces[0]], a, b)
                == edge_direction_in_face(&mesh.faces[faces[1]], a, b)
        })
        .map(|(_, faces)| (faces[0], faces[1]))
        .collect();
    conflicts.sort_unstable();
    for (face_index, neighbor_index) in conflicts {
        warn!(face_index, neighbor_index, "Winding conflict could not be resolved");
        result.warnings.push(CleanWarning::UnresolvedWinding {
            face_index,
            neighbor_index,
        });
    }

    result.faces_flipped = flipped.iter().filter(|&&f| f).count();

    if result.faces_flipped > 0 {
        info!(
            faces_flipped = result.faces_flipped,
            patches = result.patch_count,
            patches_reversed = result.patches_reversed,
            "Fixed winding order"
        );
    } else {
        debug!(
            "Winding order already consistent across {} patch(es)",
            result.patch_count
        );
    }

    result
}

/// True if the patch encloses clearly negative volume about its centroid.
fn patch_is_inward(mesh: &Mesh, patch: &[usize]) -> bool {
    let mut sum = nalgebra::Vector3::zeros();
    let mut count = 0usize;
    let mut lo = nalgebra::Point3::new(f64::MAX, f64::MAX, f64::MAX);
    let mut hi = nalgebra::Point3::new(f64::MIN, f64::MIN, f64::MIN);
    for &f in patch {
        for v in mesh.faces[f] {
            let p = mesh.vertices[v as usize].position;
            sum += p.coords;
            count += 1;
            lo = lo.inf(&p);
            hi = hi.sup(&p);
        }
    }
    if count == 0 {
        return false;
    }
    let centroid = nalgebra::Point3::from(sum / count as f64);
    let diagonal = (hi - lo).norm();

    let volume = signed_volume_of(mesh, patch.iter().map(|&f| mesh.faces[f]), centroid);
    volume < -1e-9 * diagonal.powi(3)
}
