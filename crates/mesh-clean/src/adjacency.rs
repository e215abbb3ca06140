//! Edge and vertex adjacency derived from a face list.
//!
//! Adjacency is index based: every undirected edge, keyed as `(min, max)`,
//! maps to the faces that contain it. It is rebuilt by each stage that needs
//! it and never stored inside a [`Mesh`](crate::Mesh).

use hashbrown::HashMap;

/// Adjacency information for a mesh.
///
/// An edge with one face is a boundary edge, two faces is a manifold edge,
/// and more than two marks a non-manifold edge.
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    /// Maps edge (v0, v1) with v0 < v1 to face indices, in face order.
    pub edge_to_faces: HashMap<(u32, u32), Vec<usize>>,
    /// Maps vertex index to face indices, in face order.
    pub vertex_to_faces: HashMap<u32, Vec<usize>>,
}

impl MeshAdjacency {
    /// Build adjacency information from a list of faces.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_clean::MeshAdjacency;
    ///
    /// let faces = vec![[0, 1, 2], [1, 3, 2]];
    /// let adj = MeshAdjacency::build(&faces);
    ///
    /// assert_eq!(adj.boundary_edge_count(), 4);
    /// ```
    #[must_use]
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<usize>> =
            HashMap::with_capacity(faces.len() * 3 / 2);
        let mut vertex_to_faces: HashMap<u32, Vec<usize>> = HashMap::new();

        for (face_idx, face) in faces.iter().enumerate() {
            for &v in face {
                vertex_to_faces.entry(v).or_default().push(face_idx);
            }
            for (a, b) in face_edges(face) {
                edge_to_faces
                    .entry(normalize_edge(a, b))
                    .or_default()
                    .push(face_idx);
            }
        }

        Self {
            edge_to_faces,
            vertex_to_faces,
        }
    }

    /// Get faces adjacent to an edge, in either direction.
    #[must_use]
    pub fn faces_for_edge(&self, v0: u32, v1: u32) -> Option<&[usize]> {
        self.edge_to_faces
            .get(&normalize_edge(v0, v1))
            .map(Vec::as_slice)
    }

    /// Get faces adjacent to a vertex.
    #[must_use]
    pub fn faces_for_vertex(&self, v: u32) -> &[usize] {
        self.vertex_to_faces.get(&v).map_or(&[], Vec::as_slice)
    }

    /// Boundary edges (exactly one face), sorted so walks are reproducible.
    #[must_use]
    pub fn boundary_edges(&self) -> Vec<(u32, u32)> {
        let mut edges: Vec<(u32, u32)> = self
            .edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(&edge, _)| edge)
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Count the number of boundary edges.
    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() == 1)
            .count()
    }

    /// Non-manifold edges with their face counts, sorted by edge.
    #[must_use]
    pub fn non_manifold_edges(&self) -> Vec<((u32, u32), usize)> {
        let mut edges: Vec<((u32, u32), usize)> = self
            .edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() > 2)
            .map(|(&edge, faces)| (edge, faces.len()))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Count the number of non-manifold edges.
    #[must_use]
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() > 2)
            .count()
    }

    /// Check if the mesh is manifold (all edges have at most 2 adjacent faces).
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.edge_to_faces.values().all(|faces| faces.len() <= 2)
    }

    /// Check if the mesh is watertight (no boundary edges).
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.edge_to_faces.values().all(|faces| faces.len() >= 2)
    }

    /// Get the total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_to_faces.len()
    }

    /// Faces sharing a manifold edge with `face_idx`, paired with that edge.
    ///
    /// Non-manifold edges are skipped: they never connect two faces for the
    /// purpose of orientation.
    pub fn manifold_neighbors<'a>(
        &'a self,
        faces: &'a [[u32; 3]],
        face_idx: usize,
    ) -> impl Iterator<Item = (usize, (u32, u32))> + 'a {
        face_edges(&faces[face_idx]).into_iter().filter_map(move |(a, b)| {
            let adjacent = self.edge_to_faces.get(&normalize_edge(a, b))?;
            if adjacent.len() != 2 {
                return None;
            }
            let other = if adjacent[0] == face_idx {
                adjacent[1]
            } else {
                adjacent[0]
            };
            Some((other, (a, b)))
        })
    }
}

/// The three directed edges of a face, in winding order.
#[inline]
pub fn face_edges(face: &[u32; 3]) -> [(u32, u32); 3] {
    [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])]
}

/// Normalize edge direction so v0 < v1.
#[inline]
pub fn normalize_edge(v0: u32, v1: u32) -> (u32, u32) {
    if v0 < v1 { (v0, v1) } else { (v1, v0) }
}

/// Whether `face` traverses the edge as `a -> b` (`Some(true)`), `b -> a`
/// (`Some(false)`), or does not contain it at all.
#[inline]
pub fn edge_direction_in_face(face: &[u32; 3], a: u32, b: u32) -> Option<bool> {
    for (from, to) in face_edges(face) {
        if from == a && to == b {
            return Some(true);
        }
        if from == b && to == a {
            return Some(false);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_single_triangle() {
        let adj = MeshAdjacency::build(&[[0, 1, 2]]);
        assert_eq!(adj.edge_count(), 3);
        assert_eq!(adj.boundary_edges(), vec![(0, 1), (0, 2), (1, 2)]);
        assert!(adj.is_manifold());
        assert!(!adj.is_watertight());
    }

    #[test]
    fn faces_for_edge_either_direction() {
        let adj = MeshAdjacency::build(&[[0, 1, 2], [1, 3, 2]]);
        assert_eq!(adj.faces_for_edge(2, 1), Some(&[0, 1][..]));
        assert_eq!(adj.faces_for_edge(0, 1), Some(&[0][..]));
        assert!(adj.faces_for_edge(0, 3).is_none());
        assert_eq!(adj.faces_for_vertex(2), &[0, 1]);
        assert!(adj.faces_for_vertex(9).is_empty());
    }

    #[test]
    fn non_manifold_edge_detected() {
        let faces = [[0, 1, 2], [0, 1, 3], [1, 0, 4]];
        let adj = MeshAdjacency::build(&faces);
        assert!(!adj.is_manifold());
        assert_eq!(adj.non_manifold_edges(), vec![((0, 1), 3)]);
        assert_eq!(adj.manifold_neighbors(&faces, 0).count(), 0);
    }

    #[test]
    fn manifold_neighbors_report_shared_edge() {
        let faces = [[0, 1, 2], [1, 3, 2]];
        let adj = MeshAdjacency::build(&faces);
        let neighbors: Vec<_> = adj.manifold_neighbors(&faces, 0).collect();
        assert_eq!(neighbors, vec![(1, (1, 2))]);
    }

    #[test]
    fn edge_direction() {
        let face = [4, 7, 9];
        assert_eq!(edge_direction_in_face(&face, 7, 9), Some(true));
        assert_eq!(edge_direction_in_face(&face, 4, 9), Some(false));
        assert_eq!(edge_direction_in_face(&face, 4, 5), None);
    }
}
