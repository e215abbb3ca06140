//! Core mesh data types.

use nalgebra::{Point3, Rotation3, Vector3};

/// RGB color with 8-bit components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl VertexColor {
    /// Create a new color from RGB components.
    #[inline]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A scan vertex.
///
/// Only the position takes part in cleaning. Normal and color are carried
/// through from the input file untouched (normals are rotated along with the
/// mesh when it is reoriented).
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// 3D position.
    pub position: Point3<f64>,

    /// Normal read from the input file, if any.
    pub normal: Option<Vector3<f64>>,

    /// Vertex color (RGB) read from the input file, if any.
    pub color: Option<VertexColor>,
}

impl Vertex {
    /// Create a new vertex with only position set.
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
            color: None,
        }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }
}

/// A triangle mesh with indexed vertices and faces.
///
/// Every face holds three distinct, in-range vertex indices. Manifoldness is
/// not required; the cleaning stages work towards it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    /// The normal follows the right-hand rule over `[v0, v1, v2]`.
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Build a mesh from raw positions and faces.
    pub fn from_parts(positions: &[[f64; 3]], faces: &[[u32; 3]]) -> Self {
        Self {
            vertices: positions
                .iter()
                .map(|&[x, y, z]| Vertex::from_coords(x, y, z))
                .collect(),
            faces: faces.to_vec(),
        }
    }

    /// Number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces (triangles) in the mesh.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh is empty (no vertices or faces).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Compute the axis-aligned bounding box.
    /// Returns (min_corner, max_corner) or None if mesh has no vertices.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?.position;
        let mut min = first;
        let mut max = first;

        for vertex in &self.vertices[1..] {
            let p = &vertex.position;
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Some((min, max))
    }

    /// Center of the axis-aligned bounding box.
    pub fn bounds_center(&self) -> Option<Point3<f64>> {
        self.bounds().map(|(min, max)| nalgebra::center(&min, &max))
    }

    /// Arithmetic mean of all vertex positions.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.vertices.is_empty() {
            return None;
        }
        let sum = self
            .vertices
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + v.position.coords);
        Some(Point3::from(sum / self.vertices.len() as f64))
    }

    /// Iterate over triangles, yielding Triangle structs with actual vertex data.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces.iter().map(|&[i0, i1, i2]| Triangle {
            v0: self.vertices[i0 as usize].position,
            v1: self.vertices[i1 as usize].position,
            v2: self.vertices[i2 as usize].position,
        })
    }

    /// Get a specific triangle by face index.
    pub fn triangle(&self, face_idx: usize) -> Option<Triangle> {
        self.faces.get(face_idx).map(|&[i0, i1, i2]| Triangle {
            v0: self.vertices[i0 as usize].position,
            v1: self.vertices[i1 as usize].position,
            v2: self.vertices[i2 as usize].position,
        })
    }

    /// Translate mesh by the given vector.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Scale mesh uniformly around the origin.
    pub fn scale(&mut self, factor: f64) {
        for vertex in &mut self.vertices {
            vertex.position.coords *= factor;
        }
    }

    /// Apply a rotation about the origin to positions and carried normals.
    pub fn rotate(&mut self, rotation: &Rotation3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position = rotation * vertex.position;
            if let Some(normal) = vertex.normal.as_mut() {
                *normal = rotation * *normal;
            }
        }
    }

    /// Reverse the winding of one face.
    #[inline]
    pub fn flip_face(&mut self, face_idx: usize) {
        self.faces[face_idx].swap(1, 2);
    }

    /// Compute the signed volume enclosed by the faces, relative to the origin.
    ///
    /// Positive for a closed mesh with outward-facing normals, negative if it is
    /// inside-out. Meaningless for open meshes.
    pub fn signed_volume(&self) -> f64 {
        signed_volume_of(self, self.faces.iter().copied(), Point3::origin())
    }

    /// Compute the total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|tri| tri.area()).sum()
    }

    /// Keep only the given faces and drop vertices no longer referenced.
    ///
    /// Returns the old-to-new vertex remap. Faces keep their relative order.
    pub fn retain_faces(&mut self, keep: &[bool]) -> Vec<Option<u32>> {
        let mut used = vec![false; self.vertices.len()];
        let faces: Vec<[u32; 3]> = self
            .faces
            .iter()
            .zip(keep)
            .filter(|(_, k)| **k)
            .map(|(f, _)| *f)
            .collect();
        for face in &faces {
            for &v in face {
                used[v as usize] = true;
            }
        }
        self.faces = faces;
        self.apply_vertex_mask(&used)
    }

    /// Drop every vertex whose mask entry is false and every face that touches one.
    ///
    /// Returns the old-to-new vertex remap. A face is either kept whole with all
    /// three indices remapped, or dropped.
    pub fn apply_vertex_mask(&mut self, keep: &[bool]) -> Vec<Option<u32>> {
        let mut remap = vec![None; self.vertices.len()];
        let mut vertices = Vec::with_capacity(self.vertices.len());
        for (old, vertex) in self.vertices.drain(..).enumerate() {
            if keep[old] {
                remap[old] = Some(vertices.len() as u32);
                vertices.push(vertex);
            }
        }
        self.vertices = vertices;

        self.faces = self
            .faces
            .iter()
            .filter_map(|&[a, b, c]| {
                Some([
                    remap[a as usize]?,
                    remap[b as usize]?,
                    remap[c as usize]?,
                ])
            })
            .collect();

        remap
    }
}

/// Signed volume of a subset of faces measured from `reference`.
///
/// Measuring from a point near the faces keeps the sum well conditioned for
/// meshes far from the origin.
pub(crate) fn signed_volume_of(
    mesh: &Mesh,
    faces: impl Iterator<Item = [u32; 3]>,
    reference: Point3<f64>,
) -> f64 {
    let mut volume = 0.0;
    for [i0, i1, i2] in faces {
        let v0 = mesh.vertices[i0 as usize].position - reference;
        let v1 = mesh.vertices[i1 as usize].position - reference;
        let v2 = mesh.vertices[i2 as usize].position - reference;
        volume += v0.dot(&v1.cross(&v2));
    }
    volume / 6.0
}

/// A triangle with concrete vertex positions.
///
/// Utility type for geometric calculations. Winding is counter-clockwise
/// when viewed from the front (normal points toward viewer).
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    /// Create a new triangle from three points.
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Compute the (unnormalized) face normal via cross product.
    #[inline]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        e1.cross(&e2)
    }

    /// Compute the unit face normal.
    /// Returns None for degenerate triangles (zero area).
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.normal_unnormalized();
        let len_sq = n.norm_squared();
        if len_sq > f64::EPSILON * f64::EPSILON {
            Some(n / len_sq.sqrt())
        } else {
            None
        }
    }

    /// Compute the area of the triangle.
    #[inline]
    pub fn area(&self) -> f64 {
        self.normal_unnormalized().norm() * 0.5
    }

    /// Compute the centroid (center of mass).
    #[inline]
    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }
}
