//! Connected component analysis and filtering.
//!
//! Two faces belong to the same component when they share an edge. Scans
//! usually consist of one large body plus floating fragments (dust, parts
//! of the turntable, neighbouring objects); keeping the largest component
//! removes the fragments.

use std::cmp::Ordering;

use tracing::{debug, info};

use crate::adjacency::MeshAdjacency;
use crate::types::Mesh;
use crate::tracing_ext::OperationTimer;

/// Result of connected component analysis.
#[derive(Debug, Clone)]
pub struct ComponentAnalysis {
    /// Number of connected components found.
    pub component_count: usize,
    /// Face indices of each component in ascending order. Components are
    /// listed in discovery order (by their lowest face index).
    pub components: Vec<Vec<u32>>,
    /// Component id of every face.
    pub face_component: Vec<usize>,
}

impl ComponentAnalysis {
    /// Check if the mesh is fully connected (single component).
    pub fn is_connected(&self) -> bool {
        self.component_count == 1
    }

    /// Index of the component to keep: most faces, then largest bounding-box
    /// volume, then first discovered.
    pub fn dominant_component(&self, mesh: &Mesh) -> Option<usize> {
        let volumes: Vec<f64> = self
            .components
            .iter()
            .map(|faces| component_bbox_volume(mesh, faces))
            .collect();

        (0..self.components.len()).reduce(|best, candidate| {
            let by_size = self.components[candidate]
                .len()
                .cmp(&self.components[best].len());
            let ordering = by_size.then_with(|| {
                volumes[candidate]
                    .partial_cmp(&volumes[best])
                    .unwrap_or(Ordering::Equal)
            });
            if ordering == Ordering::Greater {
                candidate
            } else {
                best
            }
        })
    }
}

impl std::fmt::Display for ComponentAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Component Analysis:")?;
        writeln!(f, "  Connected components: {}", self.component_count)?;
        if self.component_count > 1 {
            writeln!(f, "  Component sizes:")?;
            for (i, comp) in self.components.iter().enumerate() {
                writeln!(f, "    Component {}: {} faces", i + 1, comp.len())?;
            }
        }
        Ok(())
    }
}

fn component_bbox_volume(mesh: &Mesh, faces: &[u32]) -> f64 {
    let mut iter = faces
        .iter()
        .flat_map(|&f| mesh.faces[f as usize])
        .map(|v| mesh.vertices[v as usize].position);
    let Some(first) = iter.next() else {
        return 0.0;
    };
    let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.inf(&p), hi.sup(&p)));
    let d = max - min;
    d.x * d.y * d.z
}

/// Find all connected components in a mesh.
///
/// Uses a flood fill with an explicit stack starting from each unvisited
/// face. Every edge connects all faces incident to it, including edges shared
/// by more than two faces.
///
/// # Example
/// ```
/// use mesh_clean::Mesh;
/// use mesh_clean::components::find_connected_components;
///
/// let mesh = Mesh::from_parts(
///     &[
///         [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0],
///         [10.0, 0.0, 0.0], [11.0, 0.0, 0.0], [10.0, 1.0, 0.0],
///     ],
///     &[[0, 1, 2], [3, 4, 5]],
/// );
///
/// let analysis = find_connected_components(&mesh);
/// assert_eq!(analysis.component_count, 2);
/// ```
pub fn find_connected_components(mesh: &Mesh) -> ComponentAnalysis {
    let face_count = mesh.faces.len();
    if face_count == 0 {
        return ComponentAnalysis {
            component_count: 0,
            components: Vec::new(),
            face_component: Vec::new(),
        };
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);

    let mut face_neighbors: Vec<Vec<usize>> = vec![Vec::new(); face_count];
    for faces in adjacency.edge_to_faces.values() {
        for (i, &fa) in faces.iter().enumerate() {
            for &fb in &faces[i + 1..] {
                face_neighbors[fa].push(fb);
                face_neighbors[fb].push(fa);
            }
        }
    }

    const UNVISITED: usize = usize::MAX;
    let mut face_component = vec![UNVISITED; face_count];
    let mut components: Vec<Vec<u32>> = Vec::new();

    for start_face in 0..face_count {
        if face_component[start_face] != UNVISITED {
            continue;
        }

        let id = components.len();
        let mut component = Vec::new();
        let mut stack = vec![start_face];
        face_component[start_face] = id;

        while let Some(face_idx) = stack.pop() {
            component.push(face_idx as u32);
            for &neighbor in &face_neighbors[face_idx] {
                if face_component[neighbor] == UNVISITED {
                    face_component[neighbor] = id;
                    stack.push(neighbor);
                }
            }
        }

        component.sort_unstable();
        components.push(component);
    }

    let component_count = components.len();
    debug!(
        "Found {} connected component(s) in mesh with {} faces",
        component_count, face_count
    );
    if component_count > 1 {
        debug!(
            "Component sizes: {:?}",
            components.iter().map(|c| c.len()).collect::<Vec<_>>()
        );
    }

    ComponentAnalysis {
        component_count,
        components,
        face_component,
    }
}

/// What [`keep_largest_component`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "pipeline-config", derive(serde::Serialize))]
pub struct ComponentFilterResult {
    /// Components present before filtering.
    pub components_found: usize,
    /// Components discarded.
    pub components_removed: usize,
    /// Faces discarded.
    pub faces_removed: usize,
    /// Vertices no longer referenced and compacted away.
    pub vertices_removed: usize,
}

/// Keep only the dominant component and compact away unused vertices.
///
/// The dominant component has the most faces; ties go to the larger
/// bounding-box volume and then to the component discovered first.
/// Vertices not referenced by any kept face are removed, including
/// vertices that were isolated in the input.
///
/// # Example
/// ```
/// use mesh_clean::Mesh;
/// use mesh_clean::components::keep_largest_component;
///
/// let mesh_positions = [
///     [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0],
///     [10.0, 0.0, 0.0], [11.0, 0.0, 0.0], [10.0, 1.0, 0.0],
/// ];
/// let mut mesh = Mesh::from_parts(&mesh_positions, &[[0, 1, 2], [1, 3, 2], [4, 5, 6]]);
///
/// let result = keep_largest_component(&mut mesh);
/// assert_eq!(result.components_removed, 1);
/// assert_eq!(mesh.face_count(), 2);
/// assert_eq!(mesh.vertex_count(), 4);
/// ```
pub fn keep_largest_component(mesh: &mut Mesh) -> ComponentFilterResult {
    let _timer = OperationTimer::with_context(
        "keep_largest_component",
        mesh.face_count(),
        mesh.vertex_count(),
    );

    let analysis = find_connected_components(mesh);
    let Some(dominant) = analysis.dominant_component(mesh) else {
        return ComponentFilterResult::default();
    };

    let keep: Vec<bool> = analysis
        .face_component
        .iter()
        .map(|&c| c == dominant)
        .collect();

    let faces_before = mesh.face_count();
    let vertices_before = mesh.vertex_count();
    mesh.retain_faces(&keep);

    let result = ComponentFilterResult {
        components_found: analysis.component_count,
        components_removed: analysis.component_count - 1,
        faces_removed: faces_before - mesh.face_count(),
        vertices_removed: vertices_before - mesh.vertex_count(),
    };

    info!(
        components = result.components_found,
        kept_faces = mesh.face_count(),
        faces_removed = result.faces_removed,
        vertices_removed = result.vertices_removed,
        "Kept dominant component"
    );

    result
}
