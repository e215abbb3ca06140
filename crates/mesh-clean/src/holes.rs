//! Hole detection and closing.
//!
//! A hole is a closed loop of boundary edges (edges with exactly one face).
//! Loops are traced per connected component, oriented against the faces
//! already bordering them and triangulated by ear clipping.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::adjacency::{MeshAdjacency, edge_direction_in_face, normalize_edge};
use crate::components::find_connected_components;
use crate::error::CleanWarning;
use crate::tracing_ext::OperationTimer;
use crate::{Mesh, Triangle};

/// A closed boundary loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    /// Loop vertices in fill order: triangles built over consecutive
    /// vertices traverse each boundary edge opposite to its existing face.
    pub vertices: Vec<u32>,
    /// Component the bordering faces belong to.
    pub component: usize,
}

impl BoundaryLoop {
    /// Number of edges (and vertices) in the loop.
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Boundary loops of a mesh plus anything odd found while tracing them.
#[derive(Debug, Clone, Default)]
pub struct HoleDetection {
    /// Closed loops, in order of their lowest boundary edge.
    pub loops: Vec<BoundaryLoop>,
    /// Non-simple boundary vertices and unclosed walks.
    pub warnings: Vec<CleanWarning>,
}

/// Detect all boundary loops in the mesh.
///
/// Boundary edges are grouped by the component of their face. Within a
/// group the boundary graph is walked edge by edge; a vertex touching more
/// than two boundary edges is reported and resolved greedily, splitting off
/// a separate loop whenever the walk comes back to a vertex it already
/// passed. Walks that dead-end are reported as unclosed and dropped.
pub fn detect_holes(mesh: &Mesh, adjacency: &MeshAdjacency) -> HoleDetection {
    let mut detection = HoleDetection::default();
    let boundary_edges = adjacency.boundary_edges();
    if boundary_edges.is_empty() {
        return detection;
    }
    debug!("Found {} boundary edges", boundary_edges.len());

    let face_component = find_connected_components(mesh).face_component;

    let mut groups: BTreeMap<usize, Vec<(u32, u32)>> = BTreeMap::new();
    for &(a, b) in &boundary_edges {
        let face = adjacency.faces_for_edge(a, b).map_or(0, |faces| faces[0]);
        groups.entry(face_component[face]).or_default().push((a, b));
    }

    for (component, edges) in groups {
        trace_component_loops(mesh, adjacency, component, &edges, &mut detection);
    }

    debug!(
        "Detected {} boundary loop(s), sizes: {:?}",
        detection.loops.len(),
        detection
            .loops
            .iter()
            .map(|l| l.edge_count())
            .collect::<Vec<_>>()
    );

    detection
}

fn trace_component_loops(
    mesh: &Mesh,
    adjacency: &MeshAdjacency,
    component: usize,
    edges: &[(u32, u32)],
    detection: &mut HoleDetection,
) {
    // vertex -> (neighbor, edge id), sorted for reproducible walks
    let mut neighbors: HashMap<u32, Vec<(u32, usize)>> = HashMap::new();
    for (id, &(a, b)) in edges.iter().enumerate() {
        neighbors.entry(a).or_default().push((b, id));
        neighbors.entry(b).or_default().push((a, id));
    }
    let mut odd: Vec<(u32, usize)> = Vec::new();
    for (&v, list) in neighbors.iter_mut() {
        list.sort_unstable();
        if list.len() != 2 {
            odd.push((v, list.len()));
        }
    }
    odd.sort_unstable();
    for (vertex_index, boundary_degree) in odd {
        debug!(vertex_index, boundary_degree, "Non-simple boundary vertex");
        detection.warnings.push(CleanWarning::NonSimpleBoundary {
            vertex_index,
            boundary_degree,
        });
    }

    let mut used = vec![false; edges.len()];
    let step_ceiling = edges.len();

    for (first, &(start, second)) in edges.iter().enumerate() {
        if used[first] {
            continue;
        }
        used[first] = true;

        let mut path: Vec<u32> = vec![start];
        let mut on_path: HashMap<u32, usize> = HashMap::new();
        on_path.insert(start, 0);
        let mut current = second;
        let mut closed = false;

        for _ in 0..step_ceiling {
            if current == start {
                closed = true;
                break;
            }
            if let Some(&k) = on_path.get(&current) {
                // Came back to a pinch vertex: split off the inner loop.
                let inner = path.split_off(k);
                for v in &inner[1..] {
                    on_path.remove(v);
                }
                push_loop(mesh, adjacency, component, inner, detection);
            }
            on_path.insert(current, path.len());
            path.push(current);

            let candidates = neighbors.get(&current).map_or(&[][..], Vec::as_slice);
            let next = candidates
                .iter()
                .find(|&&(n, id)| !used[id] && n == start)
                .or_else(|| candidates.iter().find(|&&(_, id)| !used[id]));
            match next {
                Some(&(n, id)) => {
                    used[id] = true;
                    current = n;
                }
                None => break,
            }
        }

        if closed {
            push_loop(mesh, adjacency, component, path, detection);
        } else {
            warn!(
                start_vertex = start,
                length = path.len(),
                "Boundary loop is not closed"
            );
            detection.warnings.push(CleanWarning::UnclosedLoop {
                start_vertex: start,
                length: path.len(),
            });
        }
    }
}

/// Orient a traced loop against its bordering faces and record it.
fn push_loop(
    mesh: &Mesh,
    adjacency: &MeshAdjacency,
    component: usize,
    mut vertices: Vec<u32>,
    detection: &mut HoleDetection,
) {
    let n = vertices.len();
    let mut keep = 0usize;
    let mut reverse = 0usize;
    for i in 0..n {
        let (a, b) = (vertices[i], vertices[(i + 1) % n]);
        let Some(&[face]) = adjacency.faces_for_edge(a, b) else {
            continue;
        };
        match edge_direction_in_face(&mesh.faces[face], a, b) {
            // existing face runs a -> b, so the fill must run b -> a
            Some(true) => reverse += 1,
            Some(false) => keep += 1,
            None => {}
        }
    }
    if reverse > keep {
        vertices.reverse();
    }
    detection.loops.push(BoundaryLoop {
        vertices,
        component,
    });
}

/// Triangulate a loop by ear clipping in the plane of its Newell normal.
///
/// An ear is only clipped when its diagonal is not already an edge of the
/// mesh or of an earlier ear, so the fill never repeats an existing face.
/// Returns the triangles and whether the fan fallback was needed.
pub fn triangulate_loop(
    mesh: &Mesh,
    adjacency: &MeshAdjacency,
    boundary: &BoundaryLoop,
) -> (Vec<[u32; 3]>, bool) {
    let n = boundary.vertices.len();
    if n < 3 {
        return (Vec::new(), false);
    }
    if n == 3 {
        let v = &boundary.vertices;
        return (vec![[v[0], v[1], v[2]]], false);
    }

    let positions: Vec<Point3<f64>> = boundary
        .vertices
        .iter()
        .map(|&idx| mesh.vertices[idx as usize].position)
        .collect();
    let hole_normal = newell_normal(&positions);

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);
    let mut fallback = false;
    let mut diagonals: HashSet<(u32, u32)> = HashSet::new();
    let edge_exists = |diagonals: &HashSet<(u32, u32)>, a: u32, b: u32| {
        adjacency.faces_for_edge(a, b).is_some() || diagonals.contains(&normalize_edge(a, b))
    };

    while remaining.len() > 3 {
        let len = remaining.len();
        let ear = (0..len).find(|&i| {
            let prev = remaining[(i + len - 1) % len];
            let next = remaining[(i + 1) % len];
            !edge_exists(&diagonals, boundary.vertices[prev], boundary.vertices[next])
                && is_ear(&positions, &remaining, prev, remaining[i], next, &hole_normal)
        });

        let Some(i) = ear else {
            fallback = true;
            break;
        };
        let prev = remaining[(i + len - 1) % len];
        let next = remaining[(i + 1) % len];
        let (a, b) = (boundary.vertices[prev], boundary.vertices[next]);
        diagonals.insert(normalize_edge(a, b));
        triangles.push([a, boundary.vertices[remaining[i]], b]);
        remaining.remove(i);
    }

    // Whatever is left is a convex-enough remainder or the fan fallback.
    let center = remaining[0];
    for w in remaining[1..].windows(2) {
        triangles.push([
            boundary.vertices[center],
            boundary.vertices[w[0]],
            boundary.vertices[w[1]],
        ]);
    }

    (triangles, fallback)
}

/// Area-weighted normal of a closed polygon.
fn newell_normal(positions: &[Point3<f64>]) -> Vector3<f64> {
    let n = positions.len();
    let mut normal: Vector3<f64> = Vector3::zeros();
    for i in 0..n {
        let p = positions[i];
        let q = positions[(i + 1) % n];
        normal.x += (p.y - q.y) * (p.z + q.z);
        normal.y += (p.z - q.z) * (p.x + q.x);
        normal.z += (p.x - q.x) * (p.y + q.y);
    }
    let len = normal.norm();
    if len > f64::EPSILON {
        normal / len
    } else {
        Vector3::z()
    }
}

fn is_ear(
    positions: &[Point3<f64>],
    remaining: &[usize],
    prev: usize,
    curr: usize,
    next: usize,
    hole_normal: &Vector3<f64>,
) -> bool {
    let p_prev = positions[prev];
    let p_curr = positions[curr];
    let p_next = positions[next];

    let Some(tri_normal) = Triangle::new(p_prev, p_curr, p_next).normal() else {
        return false;
    };
    if tri_normal.dot(hole_normal) <= 0.0 {
        return false;
    }

    !remaining
        .iter()
        .filter(|&&idx| idx != prev && idx != curr && idx != next)
        .any(|&idx| point_in_triangle_2d(&positions[idx], &p_prev, &p_curr, &p_next, hole_normal))
}

/// Point-in-triangle test after dropping the axis most aligned with `normal`.
fn point_in_triangle_2d(
    p: &Point3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
    normal: &Vector3<f64>,
) -> bool {
    let (ax, ay, az) = (normal.x.abs(), normal.y.abs(), normal.z.abs());
    let project = |q: &Point3<f64>| -> (f64, f64) {
        if az >= ax && az >= ay {
            (q.x, q.y)
        } else if ay >= ax {
            (q.x, q.z)
        } else {
            (q.y, q.z)
        }
    };
    let (p, a, b, c) = (project(p), project(v0), project(v1), project(v2));

    let sign = |p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)| -> f64 {
        (p1.0 - p3.0) * (p2.1 - p3.1) - (p2.0 - p3.0) * (p1.1 - p3.1)
    };
    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Outcome of [`close_holes`].
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "pipeline-config", derive(serde::Serialize))]
pub struct HoleFillResult {
    /// Closed loops found.
    pub holes_found: usize,
    /// Loops triangulated.
    pub holes_filled: usize,
    /// Faces appended to the mesh.
    pub triangles_added: usize,
    /// Skipped loops, fallbacks and boundary anomalies.
    pub warnings: Vec<CleanWarning>,
}

/// Close every boundary loop of at most `max_hole_edges` edges.
///
/// New faces only reference existing boundary vertices and are appended
/// after the existing faces. Loops are triangulated in parallel and
/// appended in detection order.
///
/// # Example
/// ```
/// use mesh_clean::Mesh;
/// use mesh_clean::holes::close_holes;
///
/// // tetrahedron missing its base
/// let mut mesh = Mesh::from_parts(
///     &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
///     &[[0, 1, 3], [1, 2, 3], [2, 0, 3]],
/// );
/// let result = close_holes(&mut mesh, None);
/// assert_eq!(result.triangles_added, 1);
/// assert_eq!(mesh.faces[3], [2, 1, 0]);
/// ```
pub fn close_holes(mesh: &mut Mesh, max_hole_edges: Option<usize>) -> HoleFillResult {
    let _timer = OperationTimer::with_context("close_holes", mesh.face_count(), mesh.vertex_count());

    let adjacency = MeshAdjacency::build(&mesh.faces);
    let detection = detect_holes(mesh, &adjacency);

    let mut result = HoleFillResult {
        holes_found: detection.loops.len(),
        warnings: detection.warnings,
        ..Default::default()
    };

    let mut fillable = Vec::with_capacity(detection.loops.len());
    for hole in detection.loops {
        let edge_count = hole.edge_count();
        let reason = if edge_count < 3 {
            Some("fewer than 3 vertices".to_string())
        } else {
            max_hole_edges
                .filter(|&max| edge_count > max)
                .map(|max| format!("larger than max_hole_edges = {}", max))
        };
        match reason {
            Some(reason) => {
                warn!(edge_count, %reason, "Skipping hole");
                result
                    .warnings
                    .push(CleanWarning::SkippedHole { edge_count, reason });
            }
            None => fillable.push(hole),
        }
    }

    let snapshot: &Mesh = mesh;
    let filled: Vec<(usize, Vec<[u32; 3]>, bool)> = fillable
        .par_iter()
        .map(|hole| {
            let (triangles, fallback) = triangulate_loop(snapshot, &adjacency, hole);
            (hole.edge_count(), triangles, fallback)
        })
        .collect();

    for (edge_count, triangles, fallback) in filled {
        if fallback {
            warn!(edge_count, "No ear found, hole fan-triangulated");
            result
                .warnings
                .push(CleanWarning::TriangulationFallback { edge_count });
        }
        if !triangles.is_empty() {
            result.holes_filled += 1;
            result.triangles_added += triangles.len();
            mesh.faces.extend(triangles);
        }
    }

    if result.holes_found > 0 {
        info!(
            holes_found = result.holes_found,
            holes_filled = result.holes_filled,
            triangles_added = result.triangles_added,
            "Closed holes"
        );
    } else {
        debug!("No holes found");
    }

    result
}
