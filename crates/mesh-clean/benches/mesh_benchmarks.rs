//! Benchmarks for mesh-clean stages.
//!
//! Run with: cargo bench -p mesh-clean
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-clean -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-clean -- --baseline main

use std::collections::HashMap;

use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use mesh_clean::{
    CleanParams, Mesh, RansacConfig, Vertex, clean_mesh, close_holes, fit_plane, fix_winding,
    keep_largest_component, validate_mesh,
};

// =============================================================================
// Test Mesh Generation
// =============================================================================

/// Create an icosphere of radius 1 with the given subdivision level.
fn create_sphere(subdivisions: u32) -> Mesh {
    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let a = 1.0;
    let b = 1.0 / phi;

    let ico_verts = [
        [0.0, b, -a],
        [b, a, 0.0],
        [-b, a, 0.0],
        [0.0, b, a],
        [0.0, -b, a],
        [-a, 0.0, b],
        [0.0, -b, -a],
        [a, 0.0, -b],
        [a, 0.0, b],
        [-a, 0.0, -b],
        [b, -a, 0.0],
        [-b, -a, 0.0],
    ];
    let ico_faces: [[u32; 3]; 20] = [
        [0, 1, 2],
        [3, 2, 1],
        [3, 4, 5],
        [3, 8, 4],
        [0, 6, 7],
        [0, 9, 6],
        [4, 10, 11],
        [6, 11, 10],
        [2, 5, 9],
        [11, 9, 5],
        [1, 7, 8],
        [10, 8, 7],
        [3, 5, 2],
        [3, 1, 8],
        [0, 2, 9],
        [0, 7, 1],
        [6, 9, 11],
        [6, 10, 7],
        [4, 11, 5],
        [4, 8, 10],
    ];

    let mut mesh = Mesh::new();
    for v in &ico_verts {
        let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        mesh.vertices
            .push(Vertex::from_coords(v[0] / len, v[1] / len, v[2] / len));
    }
    mesh.faces.extend_from_slice(&ico_faces);

    for _ in 0..subdivisions {
        mesh = subdivide_sphere(&mesh);
    }
    mesh
}

fn subdivide_sphere(mesh: &Mesh) -> Mesh {
    let mut new_mesh = Mesh::new();
    new_mesh.vertices = mesh.vertices.clone();

    let mut edge_midpoints: HashMap<(u32, u32), u32> = HashMap::new();
    let mut midpoint = |v1: u32, v2: u32, vertices: &mut Vec<Vertex>| -> u32 {
        let key = if v1 < v2 { (v1, v2) } else { (v2, v1) };
        if let Some(&idx) = edge_midpoints.get(&key) {
            return idx;
        }
        let m = nalgebra::center(
            &vertices[v1 as usize].position,
            &vertices[v2 as usize].position,
        );
        let m = m.coords.normalize();
        let idx = vertices.len() as u32;
        vertices.push(Vertex::from_coords(m.x, m.y, m.z));
        edge_midpoints.insert(key, idx);
        idx
    };

    for &[v0, v1, v2] in &mesh.faces {
        let m01 = midpoint(v0, v1, &mut new_mesh.vertices);
        let m12 = midpoint(v1, v2, &mut new_mesh.vertices);
        let m20 = midpoint(v2, v0, &mut new_mesh.vertices);

        new_mesh.faces.push([v0, m01, m20]);
        new_mesh.faces.push([v1, m12, m01]);
        new_mesh.faces.push([v2, m20, m12]);
        new_mesh.faces.push([m01, m12, m20]);
    }
    new_mesh
}

/// A sphere resting above a ground grid, plus some debris: a typical
/// turntable scan.
fn create_scan(subdivisions: u32, grid: u32) -> Mesh {
    let mut mesh = create_sphere(subdivisions);
    mesh.translate(nalgebra::Vector3::new(0.0, 0.0, 1.1));

    let base = mesh.vertices.len() as u32;
    let step = 6.0 / (grid - 1) as f64;
    for j in 0..grid {
        for i in 0..grid {
            mesh.vertices.push(Vertex::from_coords(
                -3.0 + i as f64 * step,
                -3.0 + j as f64 * step,
                0.0,
            ));
        }
    }
    for j in 0..grid - 1 {
        for i in 0..grid - 1 {
            let a = base + j * grid + i;
            mesh.faces.push([a, a + 1, a + grid + 1]);
            mesh.faces.push([a, a + grid + 1, a + grid]);
        }
    }

    let debris = mesh.vertices.len() as u32;
    for p in [[2.0, 2.0, 1.0], [2.1, 2.0, 1.0], [2.0, 2.1, 1.05]] {
        mesh.vertices.push(Vertex::from_coords(p[0], p[1], p[2]));
    }
    mesh.faces.push([debris, debris + 1, debris + 2]);
    mesh
}

/// Sphere with every 7th face reversed.
fn create_scrambled_sphere(subdivisions: u32) -> Mesh {
    let mut mesh = create_sphere(subdivisions);
    for i in (0..mesh.face_count()).step_by(7) {
        mesh.flip_face(i);
    }
    mesh
}

/// Sphere with every 25th face removed.
fn create_holed_sphere(subdivisions: u32) -> Mesh {
    let mut mesh = create_sphere(subdivisions);
    let mut index = 0;
    mesh.faces.retain(|_| {
        index += 1;
        index % 25 != 0
    });
    mesh
}

// =============================================================================
// Plane Fitting Benchmarks
// =============================================================================

fn bench_plane_fitting(c: &mut Criterion) {
    let mut group = c.benchmark_group("PlaneFitting");

    let test_cases = [
        ("scan_20x20", create_scan(2, 20)),
        ("scan_60x60", create_scan(3, 60)),
        ("scan_120x120", create_scan(4, 120)),
    ];

    for (name, mesh) in &test_cases {
        group.throughput(Throughput::Elements(mesh.vertices.len() as u64));

        group.bench_with_input(BenchmarkId::new("ransac", name), mesh, |b, mesh| {
            let config = RansacConfig::new().with_inlier_threshold(0.01);
            b.iter(|| fit_plane(black_box(mesh), black_box(&config)))
        });
    }

    group.finish();
}

// =============================================================================
// Stage Benchmarks
// =============================================================================

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("Stages");

    for subdivisions in [2, 3, 4] {
        let scrambled = create_scrambled_sphere(subdivisions);
        let holed = create_holed_sphere(subdivisions);
        let name = format!("sphere_{}tri", scrambled.face_count());

        group.throughput(Throughput::Elements(scrambled.face_count() as u64));

        group.bench_with_input(BenchmarkId::new("validate", &name), &scrambled, |b, mesh| {
            b.iter(|| validate_mesh(black_box(mesh)))
        });

        group.bench_with_input(
            BenchmarkId::new("fix_winding", &name),
            &scrambled,
            |b, mesh| {
                b.iter_batched(
                    || mesh.clone(),
                    |mut m| fix_winding(&mut m, true),
                    BatchSize::SmallInput,
                )
            },
        );

        group.bench_with_input(BenchmarkId::new("close_holes", &name), &holed, |b, mesh| {
            b.iter_batched(
                || mesh.clone(),
                |mut m| close_holes(&mut m, None),
                BatchSize::SmallInput,
            )
        });

        group.bench_with_input(
            BenchmarkId::new("keep_largest_component", &name),
            &scrambled,
            |b, mesh| {
                b.iter_batched(
                    || mesh.clone(),
                    |mut m| keep_largest_component(&mut m),
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

// =============================================================================
// Full Pipeline Benchmarks
// =============================================================================

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pipeline");
    group.sample_size(20);

    let test_cases = [
        ("scan_20x20", create_scan(2, 20)),
        ("scan_60x60", create_scan(3, 60)),
        ("scan_120x120", create_scan(4, 120)),
    ];

    for (name, mesh) in &test_cases {
        group.throughput(Throughput::Elements(mesh.face_count() as u64));

        group.bench_with_input(BenchmarkId::new("clean_mesh", name), mesh, |b, mesh| {
            let params = CleanParams::default();
            b.iter_batched(
                || mesh.clone(),
                |m| clean_mesh(m, black_box(&params)),
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

// =============================================================================
// I/O Benchmarks
// =============================================================================

fn bench_io(c: &mut Criterion) {
    let mut group = c.benchmark_group("IO");

    let scan = create_scan(4, 120);

    let temp_dir = std::env::temp_dir();
    let stl_path = temp_dir.join("bench_scan.stl");
    let obj_path = temp_dir.join("bench_scan.obj");
    let ply_path = temp_dir.join("bench_scan.ply");

    let _ = mesh_clean::save_mesh(&scan, &stl_path);
    let _ = mesh_clean::save_mesh(&scan, &obj_path);
    let _ = mesh_clean::save_mesh(&scan, &ply_path);

    group.throughput(Throughput::Elements(scan.faces.len() as u64));

    group.bench_function("load_stl", |b| {
        b.iter(|| mesh_clean::load_mesh(black_box(&stl_path)))
    });

    group.bench_function("load_obj", |b| {
        b.iter(|| mesh_clean::load_mesh(black_box(&obj_path)))
    });

    group.bench_function("load_ply", |b| {
        b.iter(|| mesh_clean::load_mesh(black_box(&ply_path)))
    });

    group.bench_function("save_ply", |b| {
        let out_path = temp_dir.join("bench_out.ply");
        b.iter(|| mesh_clean::save_mesh(black_box(&scan), black_box(&out_path)))
    });

    group.finish();

    let _ = std::fs::remove_file(&stl_path);
    let _ = std::fs::remove_file(&obj_path);
    let _ = std::fs::remove_file(&ply_path);
    let _ = std::fs::remove_file(temp_dir.join("bench_out.ply"));
}

criterion_group!(
    benches,
    bench_plane_fitting,
    bench_stages,
    bench_pipeline,
    bench_io,
);
criterion_main!(benches);
