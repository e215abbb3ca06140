//! Mesh file I/O for STL, OBJ, and PLY formats.
//!
//! Writers never leave a partial file behind: output goes to a hidden
//! sibling file which is renamed over the destination once it is complete.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{MeshError, MeshResult};
use crate::validate::validate_mesh_data;
use crate::{Mesh, Vertex, VertexColor};

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Stl,
    Obj,
    Ply,
}

impl MeshFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .and_then(|ext| match ext.as_str() {
                "stl" => Some(MeshFormat::Stl),
                "obj" => Some(MeshFormat::Obj),
                "ply" => Some(MeshFormat::Ply),
                _ => None,
            })
    }

    fn require(path: &Path) -> MeshResult<Self> {
        Self::from_path(path).ok_or_else(|| {
            MeshError::unsupported_format(path.extension().and_then(|e| e.to_str()).map(String::from))
        })
    }
}

/// Load a mesh from file, auto-detecting format from extension.
///
/// The loaded mesh is validated before it is returned.
///
/// # Errors
///
/// - [`MeshError::UnsupportedFormat`] for an unknown extension
/// - [`MeshError::IoRead`] / [`MeshError::ParseError`] if the file can't be read
/// - [`MeshError::EmptyMesh`] if the file holds no faces
/// - [`MeshError::InvalidCoordinate`], [`MeshError::InvalidVertexIndex`] or
///   [`MeshError::InvalidInput`] for malformed geometry
pub fn load_mesh(path: &Path) -> MeshResult<Mesh> {
    let format = MeshFormat::require(path)?;

    info!("Loading mesh from {:?} (format: {:?})", path, format);

    let mesh = match format {
        MeshFormat::Stl => load_stl(path)?,
        MeshFormat::Obj => load_obj(path)?,
        MeshFormat::Ply => load_ply(path)?,
    };

    if mesh.vertices.is_empty() || mesh.faces.is_empty() {
        return Err(MeshError::empty_mesh(format!(
            "{} has {} vertices and {} faces",
            path.display(),
            mesh.vertex_count(),
            mesh.face_count()
        )));
    }

    validate_mesh_data(&mesh)?;

    if let Some((min, max)) = mesh.bounds() {
        let dims = max - min;
        info!(
            "Loaded mesh: {} vertices, {} faces",
            mesh.vertex_count(),
            mesh.face_count()
        );
        debug!(
            "Dimensions: {:.3} x {:.3} x {:.3}",
            dims.x, dims.y, dims.z
        );
    }

    Ok(mesh)
}

/// Load mesh from STL file (binary or ASCII).
fn load_stl(path: &Path) -> MeshResult<Mesh> {
    let file = File::open(path).map_err(|e| MeshError::io_read(path, e))?;
    let mut reader = BufReader::new(file);

    // stl_io merges coincident corners into an indexed mesh
    let stl = stl_io::read_stl(&mut reader)
        .map_err(|e| MeshError::parse_error(path, e.to_string()))?;

    let mut mesh = Mesh::with_capacity(stl.vertices.len(), stl.faces.len());
    for v in &stl.vertices {
        mesh.vertices.push(Vertex::from_coords(
            v.0[0] as f64,
            v.0[1] as f64,
            v.0[2] as f64,
        ));
    }

    let mut collapsed = 0usize;
    for face in &stl.faces {
        let [a, b, c] = face.vertices.map(|i| i as u32);
        // zero-area facets collapse onto a repeated index after merging
        if a == b || b == c || a == c {
            collapsed += 1;
            continue;
        }
        mesh.faces.push([a, b, c]);
    }
    if collapsed > 0 {
        warn!(collapsed, "Dropped STL facets with coincident corners");
    }

    debug!(
        "STL loaded: {} vertices, {} faces",
        mesh.vertices.len(),
        mesh.faces.len()
    );

    Ok(mesh)
}

/// Load mesh from OBJ file. Polygons are triangulated and all objects are
/// merged into one mesh.
fn load_obj(path: &Path) -> MeshResult<Mesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|e| MeshError::parse_error(path, e.to_string()))?;

    let mut mesh = Mesh::new();
    let mut vertex_offset = 0u32;

    for model in &models {
        let obj_mesh = &model.mesh;
        let has_normals = obj_mesh.normals.len() == obj_mesh.positions.len();

        for (i, chunk) in obj_mesh.positions.chunks_exact(3).enumerate() {
            let mut vertex =
                Vertex::from_coords(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64);
            if has_normals {
                let n = &obj_mesh.normals[3 * i..3 * i + 3];
                vertex.normal = Some(nalgebra::Vector3::new(n[0] as f64, n[1] as f64, n[2] as f64));
            }
            mesh.vertices.push(vertex);
        }

        for chunk in obj_mesh.indices.chunks_exact(3) {
            mesh.faces.push([
                chunk[0] + vertex_offset,
                chunk[1] + vertex_offset,
                chunk[2] + vertex_offset,
            ]);
        }

        vertex_offset = mesh.vertices.len() as u32;
    }

    debug!(
        "OBJ loaded: {} vertices, {} faces from {} models",
        mesh.vertices.len(),
        mesh.faces.len(),
        models.len()
    );

    Ok(mesh)
}

/// Load mesh from PLY file (ASCII or binary).
///
/// Expects `vertex` elements with `x`, `y`, `z` and `face` elements with a
/// `vertex_indices` (or `vertex_index`) list. Normals (`nx`, `ny`, `nz`) and
/// colors (`red`, `green`, `blue`) are carried through when present.
fn load_ply(path: &Path) -> MeshResult<Mesh> {
    use ply_rs::parser::Parser;
    use ply_rs::ply::Property;

    let file = File::open(path).map_err(|e| MeshError::io_read(path, e))?;
    let mut reader = BufReader::new(file);

    let parser = Parser::<ply_rs::ply::DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| MeshError::parse_error(path, format!("PLY parse error: {:?}", e)))?;

    let mut mesh = Mesh::new();

    if let Some(vertices) = ply.payload.get("vertex") {
        mesh.vertices.reserve(vertices.len());
        for element in vertices {
            let x = get_ply_float(element.get("x"), "x", path)?;
            let y = get_ply_float(element.get("y"), "y", path)?;
            let z = get_ply_float(element.get("z"), "z", path)?;
            let mut vertex = Vertex::from_coords(x, y, z);

            if let (Some(nx), Some(ny), Some(nz)) =
                (element.get("nx"), element.get("ny"), element.get("nz"))
            {
                if let (Ok(nx), Ok(ny), Ok(nz)) = (
                    get_ply_float(Some(nx), "nx", path),
                    get_ply_float(Some(ny), "ny", path),
                    get_ply_float(Some(nz), "nz", path),
                ) {
                    vertex.normal = Some(nalgebra::Vector3::new(nx, ny, nz));
                }
            }

            if let (Some(r), Some(g), Some(b)) = (
                get_ply_u8(element.get("red")),
                get_ply_u8(element.get("green")),
                get_ply_u8(element.get("blue")),
            ) {
                vertex.color = Some(VertexColor::new(r, g, b));
            }

            mesh.vertices.push(vertex);
        }
    }

    if let Some(faces) = ply.payload.get("face") {
        for element in faces {
            let indices: Option<Vec<u32>> = match element
                .get("vertex_indices")
                .or_else(|| element.get("vertex_index"))
            {
                Some(Property::ListInt(l)) => Some(l.iter().map(|&i| i as u32).collect()),
                Some(Property::ListUInt(l)) => Some(l.clone()),
                Some(Property::ListUShort(l)) => Some(l.iter().map(|&i| i as u32).collect()),
                Some(Property::ListUChar(l)) => Some(l.iter().map(|&i| i as u32).collect()),
                _ => None,
            };
            let Some(indices) = indices else {
                return Err(MeshError::parse_error(path, "PLY face without vertex index list"));
            };
            // fan-triangulate polygons
            for i in 1..indices.len().saturating_sub(1) {
                mesh.faces.push([indices[0], indices[i], indices[i + 1]]);
            }
        }
    }

    debug!(
        "PLY loaded: {} vertices, {} faces",
        mesh.vertices.len(),
        mesh.faces.len()
    );

    Ok(mesh)
}

/// Helper to extract a float value from a PLY property.
fn get_ply_float(
    prop: Option<&ply_rs::ply::Property>,
    name: &str,
    path: &Path,
) -> MeshResult<f64> {
    use ply_rs::ply::Property;

    match prop {
        Some(Property::Float(v)) => Ok(*v as f64),
        Some(Property::Double(v)) => Ok(*v),
        Some(Property::Int(v)) => Ok(*v as f64),
        Some(Property::UInt(v)) => Ok(*v as f64),
        Some(Property::Short(v)) => Ok(*v as f64),
        Some(Property::UShort(v)) => Ok(*v as f64),
        Some(Property::Char(v)) => Ok(*v as f64),
        Some(Property::UChar(v)) => Ok(*v as f64),
        _ => Err(MeshError::parse_error(
            path,
            format!("missing or invalid PLY property: {}", name),
        )),
    }
}

/// Helper to extract a color channel from a PLY property.
fn get_ply_u8(prop: Option<&ply_rs::ply::Property>) -> Option<u8> {
    use ply_rs::ply::Property;

    match prop? {
        Property::UChar(v) => Some(*v),
        Property::Char(v) => Some((*v).max(0) as u8),
        Property::UShort(v) => Some((*v).min(255) as u8),
        Property::UInt(v) => Some((*v).min(255) as u8),
        Property::Int(v) => Some((*v).clamp(0, 255) as u8),
        Property::Float(v) => Some((v * 255.0).clamp(0.0, 255.0) as u8),
        Property::Double(v) => Some((v * 255.0).clamp(0.0, 255.0) as u8),
        _ => None,
    }
}

/// Save mesh to file, auto-detecting format from extension.
///
/// # Errors
///
/// [`MeshError::UnsupportedFormat`] for an unknown extension, or
/// [`MeshError::IoWrite`] if the file can't be written. The destination is
/// untouched when writing fails.
pub fn save_mesh(mesh: &Mesh, path: &Path) -> MeshResult<()> {
    match MeshFormat::require(path)? {
        MeshFormat::Stl => save_stl(mesh, path),
        MeshFormat::Obj => save_obj(mesh, path),
        MeshFormat::Ply => save_ply(mesh, path),
    }
}

/// Save mesh to STL file (binary format).
pub fn save_stl(mesh: &Mesh, path: &Path) -> MeshResult<()> {
    info!("Saving mesh to {:?}", path);

    let triangles: Vec<stl_io::Triangle> = mesh
        .triangles()
        .map(|tri| {
            let n = tri.normal().unwrap_or_else(nalgebra::Vector3::zeros);
            let vertex = |p: nalgebra::Point3<f64>| {
                stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32])
            };
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [vertex(tri.v0), vertex(tri.v1), vertex(tri.v2)],
            }
        })
        .collect();

    write_atomically(path, |writer| stl_io::write_stl(writer, triangles.iter()))?;

    info!("Saved {} triangles to {:?}", mesh.face_count(), path);
    Ok(())
}

/// Save mesh to OBJ file (ASCII format).
///
/// OBJ preserves vertex indices exactly. Vertex normals are written as
/// `vn` lines and referenced from the faces when any vertex has one.
pub fn save_obj(mesh: &Mesh, path: &Path) -> MeshResult<()> {
    info!("Saving mesh to {:?} (OBJ format)", path);

    write_atomically(path, |writer| write_obj(mesh, writer))?;

    info!(
        "Saved {} vertices and {} faces to {:?}",
        mesh.vertices.len(),
        mesh.faces.len(),
        path
    );
    Ok(())
}

fn write_obj<W: Write>(mesh: &Mesh, writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "# OBJ file exported by mesh-clean")?;
    writeln!(writer, "# Vertices: {}", mesh.vertices.len())?;
    writeln!(writer, "# Faces: {}", mesh.faces.len())?;
    writeln!(writer)?;

    for v in &mesh.vertices {
        writeln!(writer, "v {:.9} {:.9} {:.9}", v.position.x, v.position.y, v.position.z)?;
    }

    let has_normals = mesh.vertices.iter().any(|v| v.normal.is_some());
    if has_normals {
        writeln!(writer)?;
        for v in &mesh.vertices {
            // zero placeholder keeps vn indices aligned with v indices
            let n = v.normal.unwrap_or_else(nalgebra::Vector3::zeros);
            writeln!(writer, "vn {:.6} {:.6} {:.6}", n.x, n.y, n.z)?;
        }
    }

    writeln!(writer)?;
    for face in &mesh.faces {
        // OBJ uses 1-based indexing
        let [i0, i1, i2] = face.map(|i| i + 1);
        if has_normals {
            writeln!(writer, "f {}//{} {}//{} {}//{}", i0, i0, i1, i1, i2, i2)?;
        } else {
            writeln!(writer, "f {} {} {}", i0, i1, i2)?;
        }
    }
    Ok(())
}

/// Save mesh to PLY file (ASCII format).
pub fn save_ply(mesh: &Mesh, path: &Path) -> MeshResult<()> {
    save_ply_with_encoding(mesh, path, ply_rs::ply::Encoding::Ascii)
}

/// Save mesh to PLY file (binary little-endian format).
pub fn save_ply_binary(mesh: &Mesh, path: &Path) -> MeshResult<()> {
    save_ply_with_encoding(mesh, path, ply_rs::ply::Encoding::BinaryLittleEndian)
}

fn save_ply_with_encoding(
    mesh: &Mesh,
    path: &Path,
    encoding: ply_rs::ply::Encoding,
) -> MeshResult<()> {
    use ply_rs::ply::{DefaultElement, Encoding, Ply};
    use ply_rs::writer::Writer;

    info!("Saving mesh to {:?} (PLY {:?})", path, encoding);

    let layout = PlyLayout::of(mesh);
    let mut ply = Ply::<DefaultElement>::new();
    ply.header = layout.header(mesh, encoding);

    match encoding {
        Encoding::Ascii => {
            ply.payload
                .insert("vertex".to_string(), layout.vertex_elements(mesh));
            ply.payload
                .insert("face".to_string(), layout.face_elements(mesh));

            // header counts must match the payload
            ply.make_consistent().map_err(|e| {
                MeshError::io_write(
                    path,
                    std::io::Error::other(format!("PLY consistency error: {:?}", e)),
                )
            })?;

            write_atomically(path, |writer| {
                Writer::new().write_ply(writer, &mut ply).map(|_| ())
            })?;
        }
        Encoding::BinaryLittleEndian | Encoding::BinaryBigEndian => {
            let big_endian = matches!(encoding, Encoding::BinaryBigEndian);
            // ply-rs only writes the header; the body is laid out by hand
            write_atomically(path, |writer| {
                Writer::<DefaultElement>::new().write_header(writer, &ply.header)?;
                layout.write_binary_body(mesh, big_endian, writer)
            })?;
        }
    }

    info!(
        "Saved {} vertices and {} faces to {:?}",
        mesh.vertices.len(),
        mesh.faces.len(),
        path
    );
    Ok(())
}

/// Which optional vertex properties a PLY file carries.
#[derive(Debug, Clone, Copy)]
struct PlyLayout {
    normals: bool,
    colors: bool,
}

impl PlyLayout {
    fn of(mesh: &Mesh) -> Self {
        Self {
            normals: mesh.vertices.iter().any(|v| v.normal.is_some()),
            colors: mesh.vertices.iter().any(|v| v.color.is_some()),
        }
    }

    fn header(&self, mesh: &Mesh, encoding: ply_rs::ply::Encoding) -> ply_rs::ply::Header {
        use ply_rs::ply::{Addable, ElementDef, Header, PropertyDef, PropertyType, ScalarType};

        let scalar = |name: &str, ty: ScalarType| {
            PropertyDef::new(name.to_string(), PropertyType::Scalar(ty))
        };

        let mut header = Header::new();
        header.encoding = encoding;

        let mut vertex_def = ElementDef::new("vertex".to_string());
        for name in ["x", "y", "z"] {
            vertex_def.properties.add(scalar(name, ScalarType::Float));
        }
        if self.normals {
            for name in ["nx", "ny", "nz"] {
                vertex_def.properties.add(scalar(name, ScalarType::Float));
            }
        }
        if self.colors {
            for name in ["red", "green", "blue"] {
                vertex_def.properties.add(scalar(name, ScalarType::UChar));
            }
        }
        vertex_def.count = mesh.vertices.len();
        header.elements.add(vertex_def);

        let mut face_def = ElementDef::new("face".to_string());
        face_def.properties.add(PropertyDef::new(
            "vertex_indices".to_string(),
            PropertyType::List(ScalarType::UChar, ScalarType::Int),
        ));
        face_def.count = mesh.faces.len();
        header.elements.add(face_def);

        header
    }

    fn normal(v: &Vertex) -> nalgebra::Vector3<f64> {
        v.normal.unwrap_or_else(nalgebra::Vector3::zeros)
    }

    fn color(v: &Vertex) -> VertexColor {
        v.color.unwrap_or(VertexColor::new(255, 255, 255))
    }

    fn vertex_elements(&self, mesh: &Mesh) -> Vec<ply_rs::ply::DefaultElement> {
        use ply_rs::ply::{DefaultElement, Property};

        mesh.vertices
            .iter()
            .map(|v| {
                let mut element = DefaultElement::new();
                element.insert("x".to_string(), Property::Float(v.position.x as f32));
                element.insert("y".to_string(), Property::Float(v.position.y as f32));
                element.insert("z".to_string(), Property::Float(v.position.z as f32));
                if self.normals {
                    let n = Self::normal(v);
                    element.insert("nx".to_string(), Property::Float(n.x as f32));
                    element.insert("ny".to_string(), Property::Float(n.y as f32));
                    element.insert("nz".to_string(), Property::Float(n.z as f32));
                }
                if self.colors {
                    let c = Self::color(v);
                    element.insert("red".to_string(), Property::UChar(c.r));
                    element.insert("green".to_string(), Property::UChar(c.g));
                    element.insert("blue".to_string(), Property::UChar(c.b));
                }
                element
            })
            .collect()
    }

    fn face_elements(&self, mesh: &Mesh) -> Vec<ply_rs::ply::DefaultElement> {
        use ply_rs::ply::{DefaultElement, Property};

        mesh.faces
            .iter()
            .map(|face| {
                let mut element = DefaultElement::new();
                element.insert(
                    "vertex_indices".to_string(),
                    Property::ListInt(face.iter().map(|&i| i as i32).collect()),
                );
                element
            })
            .collect()
    }

    /// Binary body matching [`header`](Self::header), property by property
    /// in declaration order.
    fn write_binary_body<W: Write>(
        &self,
        mesh: &Mesh,
        big_endian: bool,
        out: &mut W,
    ) -> std::io::Result<()> {
        let float = |v: f64| {
            let v = v as f32;
            if big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
        };
        let index = |i: u32| {
            let i = i as i32;
            if big_endian { i.to_be_bytes() } else { i.to_le_bytes() }
        };

        for v in &mesh.vertices {
            for &c in v.position.iter() {
                out.write_all(&float(c))?;
            }
            if self.normals {
                for &c in Self::normal(v).iter() {
                    out.write_all(&float(c))?;
                }
            }
            if self.colors {
                let c = Self::color(v);
                out.write_all(&[c.r, c.g, c.b])?;
            }
        }
        for face in &mesh.faces {
            out.write_all(&[3u8])?;
            for &i in face {
                out.write_all(&index(i))?;
            }
        }
        Ok(())
    }
}

/// Hidden file next to `path` that output is staged in.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

/// Run `write` against a staging file and rename it over `path` on success.
fn write_atomically<F>(path: &Path, write: F) -> MeshResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let staging = staging_path(path);

    let result = File::create(&staging)
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            write(&mut writer)?;
            writer.flush()?;
            writer.get_ref().sync_all()
        })
        .and_then(|()| std::fs::rename(&staging, path));

    if let Err(e) = result {
        // the staging file may not exist if creating it failed
        let _ = std::fs::remove_file(&staging);
        return Err(MeshError::io_write(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn create_test_stl() -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".stl").unwrap();

        // ASCII STL with a single triangle
        writeln!(file, "solid test").unwrap();
        writeln!(file, "  facet normal 0 0 1").unwrap();
        writeln!(file, "    outer loop").unwrap();
        writeln!(file, "      vertex 0 0 0").unwrap();
        writeln!(file, "      vertex 100 0 0").unwrap();
        writeln!(file, "      vertex 0 100 0").unwrap();
        writeln!(file, "    endloop").unwrap();
        writeln!(file, "  endfacet").unwrap();
        writeln!(file, "endsolid test").unwrap();

        file
    }

    fn create_test_ply(face_line: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".ply").unwrap();
        writeln!(file, "ply").unwrap();
        writeln!(file, "format ascii 1.0").unwrap();
        writeln!(file, "element vertex 4").unwrap();
        writeln!(file, "property float x").unwrap();
        writeln!(file, "property float y").unwrap();
        writeln!(file, "property float z").unwrap();
        writeln!(file, "element face 1").unwrap();
        writeln!(file, "property list uchar int vertex_indices").unwrap();
        writeln!(file, "end_header").unwrap();
        writeln!(file, "0 0 0").unwrap();
        writeln!(file, "1 0 0").unwrap();
        writeln!(file, "1 1 0").unwrap();
        writeln!(file, "0 1 0").unwrap();
        writeln!(file, "{}", face_line).unwrap();
        file
    }

    fn tetrahedron() -> Mesh {
        Mesh::from_parts(
            &[
                [0.0, 0.0, 0.0],
                [10.0, 0.0, 0.0],
                [0.0, 10.0, 0.0],
                [0.0, 0.0, 10.0],
            ],
            // vertices first appear in index order
            &[[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]],
        )
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            MeshFormat::from_path(Path::new("test.stl")),
            Some(MeshFormat::Stl)
        );
        assert_eq!(
            MeshFormat::from_path(Path::new("test.STL")),
            Some(MeshFormat::Stl)
        );
        assert_eq!(
            MeshFormat::from_path(Path::new("test.obj")),
            Some(MeshFormat::Obj)
        );
        assert_eq!(
            MeshFormat::from_path(Path::new("test.PLY")),
            Some(MeshFormat::Ply)
        );
        assert_eq!(MeshFormat::from_path(Path::new("test.3mf")), None);
        assert_eq!(MeshFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_unsupported_format() {
        let err = load_mesh(Path::new("scan.xyz")).unwrap_err();
        assert!(matches!(
            err,
            MeshError::UnsupportedFormat { extension: Some(ref e) } if e == "xyz"
        ));
        let err = save_mesh(&tetrahedron(), Path::new("out.gltf")).unwrap_err();
        assert!(matches!(err, MeshError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_load_stl() {
        let file = create_test_stl();
        let mesh = load_mesh(file.path()).expect("should load");

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.face_count(), 1);

        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(max, Point3::new(100.0, 100.0, 0.0));
    }

    #[test]
    fn test_save_and_reload_stl() {
        let mesh = tetrahedron();
        let file = NamedTempFile::with_suffix(".stl").unwrap();
        save_stl(&mesh, file.path()).expect("should save");

        let reloaded = load_mesh(file.path()).expect("should reload");
        assert_eq!(reloaded.vertex_count(), 4);
        assert_eq!(reloaded.face_count(), 4);
        assert!((reloaded.signed_volume() - mesh.signed_volume()).abs() < 1e-3);
    }

    #[test]
    fn test_save_and_reload_obj_preserves_indices_and_normals() {
        let mut mesh = tetrahedron();
        mesh.vertices[0].normal = Some(Vector3::new(0.0, 0.0, -1.0));
        mesh.vertices[3].normal = Some(Vector3::new(0.0, 0.0, 1.0));

        let file = NamedTempFile::with_suffix(".obj").unwrap();
        save_obj(&mesh, file.path()).expect("should save OBJ");
        let reloaded = load_mesh(file.path()).expect("should reload OBJ");

        assert_eq!(reloaded.faces, mesh.faces);
        for (orig, loaded) in mesh.vertices.iter().zip(&reloaded.vertices) {
            assert!((orig.position - loaded.position).norm() < 1e-6);
        }
        let n = reloaded.vertices[3].normal.expect("normal should survive");
        assert!((n - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_save_and_reload_ply_with_colors_and_normals() {
        let mut mesh = tetrahedron();
        for (i, v) in mesh.vertices.iter_mut().enumerate() {
            v.color = Some(VertexColor::new(10 * i as u8, 128, 255));
            v.normal = Some(Vector3::new(0.0, 1.0, 0.0));
        }

        for binary in [false, true] {
            let file = NamedTempFile::with_suffix(".ply").unwrap();
            if binary {
                save_ply_binary(&mesh, file.path()).expect("should save binary PLY");
            } else {
                save_ply(&mesh, file.path()).expect("should save PLY");
            }
            let reloaded = load_mesh(file.path()).expect("should reload PLY");

            assert_eq!(reloaded.faces, mesh.faces);
            assert_eq!(reloaded.vertices[2].color, Some(VertexColor::new(20, 128, 255)));
            let n = reloaded.vertices[1].normal.expect("normal should survive");
            assert!((n - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-6);
        }
    }

    #[test]
    fn test_binary_ply_roundtrip_with_any_attributes() {
        for (normals, colors) in [(false, false), (false, true), (true, false), (true, true)] {
            let mut mesh = tetrahedron();
            for v in &mut mesh.vertices {
                if normals {
                    v.normal = Some(Vector3::new(1.0, 0.0, 0.0));
                }
                if colors {
                    v.color = Some(VertexColor::new(1, 2, 3));
                }
            }

            let file = NamedTempFile::with_suffix(".ply").unwrap();
            save_ply_binary(&mesh, file.path()).expect("should save binary PLY");
            let reloaded = load_mesh(file.path()).expect("should reload binary PLY");

            assert_eq!(reloaded.faces, mesh.faces, "normals={normals} colors={colors}");
            for (orig, loaded) in mesh.vertices.iter().zip(&reloaded.vertices) {
                assert!((orig.position - loaded.position).norm() < 1e-6);
                assert_eq!(loaded.color, orig.color);
                assert_eq!(loaded.normal.is_some(), normals);
            }
        }
    }

    #[test]
    fn test_binary_ply_body_length() {
        let mut mesh = tetrahedron();
        mesh.vertices[0].color = Some(VertexColor::new(9, 9, 9));
        let file = NamedTempFile::with_suffix(".ply").unwrap();
        save_ply_binary(&mesh, file.path()).unwrap();

        let bytes = std::fs::read(file.path()).unwrap();
        let marker = b"end_header\n";
        let body_start = bytes
            .windows(marker.len())
            .position(|w| w == marker)
            .expect("header terminator")
            + marker.len();
        // 3 floats + 3 color bytes per vertex, count byte + 3 ints per face
        assert_eq!(bytes.len() - body_start, 4 * (12 + 3) + 4 * (1 + 12));
    }

    #[test]
    fn test_load_ply_fan_triangulates_polygons() {
        let file = create_test_ply("4 0 1 2 3");
        let mesh = load_mesh(file.path()).expect("should load quad");
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_load_rejects_out_of_range_index() {
        let file = create_test_ply("3 0 1 7");
        let err = load_mesh(file.path()).unwrap_err();
        assert!(matches!(
            err,
            MeshError::InvalidVertexIndex { vertex_index: 7, .. }
        ));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_load_rejects_repeated_index() {
        let file = create_test_ply("3 0 1 1");
        let err = load_mesh(file.path()).unwrap_err();
        assert!(matches!(err, MeshError::InvalidInput { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_mesh(Path::new("/nonexistent/dir/scan.stl")).unwrap_err();
        assert!(matches!(err, MeshError::IoRead { .. }));
    }

    #[test]
    fn test_save_leaves_no_staging_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.stl");
        save_mesh(&tetrahedron(), &path).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("out.stl")]);
    }

    #[test]
    fn test_failed_save_leaves_destination_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out.obj");
        let err = save_mesh(&tetrahedron(), &path).unwrap_err();
        assert!(matches!(err, MeshError::IoWrite { .. }));
        assert!(!path.exists());
    }
}
