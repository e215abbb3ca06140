//! RANSAC ground-plane estimation.
//!
//! Fits the dominant plane of a scan by repeatedly sampling three vertices,
//! building the plane through them and counting the vertices within a
//! distance threshold. The candidate with the most inliers wins and is then
//! refined by least squares over its inlier set.
//!
//! Sampling is driven by a single seeded [`StdRng`] and draws happen on the
//! calling thread, so the same mesh, seed and threshold always produce the
//! same plane. Only the inlier counting runs on the rayon pool.

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::Mesh;
use crate::error::{MeshError, MeshResult};
use crate::plane::Plane;
use crate::tracing_ext::OperationTimer;

/// Candidates scored per parallel batch. Fixed so that results do not depend
/// on the size of the thread pool.
const BATCH_SIZE: usize = 32;

/// Configuration for RANSAC plane fitting.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "pipeline-config",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "pipeline-config", serde(default))]
pub struct RansacConfig {
    /// Upper bound on sampling iterations.
    pub max_iterations: usize,
    /// Perpendicular distance at or below which a vertex is an inlier.
    pub inlier_threshold: f64,
    /// Stop early once an all-inlier sample has been drawn with this probability.
    pub confidence: f64,
    /// Degenerate triples redrawn per iteration before giving up on it.
    pub max_sample_retries: usize,
    /// RNG seed.
    pub seed: u64,
    /// Refit the winning plane to its inliers by least squares.
    pub refine: bool,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            inlier_threshold: 0.01,
            confidence: 0.999,
            max_sample_retries: 100,
            seed: 0,
            refine: true,
        }
    }
}

impl RansacConfig {
    /// Create a new RANSAC configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of iterations.
    #[must_use]
    pub const fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the inlier distance threshold.
    #[must_use]
    pub const fn with_inlier_threshold(mut self, threshold: f64) -> Self {
        self.inlier_threshold = threshold;
        self
    }

    /// Set the early-stop confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable least-squares refinement.
    #[must_use]
    pub const fn with_refine(mut self, refine: bool) -> Self {
        self.refine = refine;
        self
    }
}

/// Result of RANSAC plane fitting.
#[derive(Debug, Clone)]
pub struct RansacResult {
    /// The fitted plane.
    pub plane: Plane,
    /// Indices of the vertices supporting the winning candidate.
    pub inliers: Vec<usize>,
    /// Iterations performed.
    pub iterations: usize,
    /// Inlier count over total point count.
    pub inlier_ratio: f64,
}

/// Fit the dominant plane to the vertices of a mesh.
///
/// # Errors
///
/// [`MeshError::DegeneratePlane`] if the mesh has fewer than 3 vertices or
/// no non-collinear triple is found within the retry ceiling.
///
/// # Example
///
/// ```
/// use mesh_clean::{Mesh, RansacConfig, fit_plane};
///
/// let mut positions = Vec::new();
/// for i in 0..10 {
///     for j in 0..10 {
///         positions.push([i as f64, j as f64, 0.0]);
///     }
/// }
/// let mesh = Mesh::from_parts(&positions, &[[0, 1, 10]]);
///
/// let fitted = fit_plane(&mesh, &RansacConfig::new().with_inlier_threshold(0.1)).unwrap();
/// assert!(fitted.plane.normal.z.abs() > 0.99);
/// assert_eq!(fitted.inliers.len(), 100);
/// ```
pub fn fit_plane(mesh: &Mesh, config: &RansacConfig) -> MeshResult<RansacResult> {
    let points: Vec<Point3<f64>> = mesh.vertices.iter().map(|v| v.position).collect();
    fit_plane_to_points(&points, config)
}

/// Fit the dominant plane to a slice of points.
///
/// # Errors
///
/// See [`fit_plane`].
pub fn fit_plane_to_points(points: &[Point3<f64>], config: &RansacConfig) -> MeshResult<RansacResult> {
    let _timer = OperationTimer::new("fit_plane");
    let n = points.len();

    if n < 3 {
        return Err(MeshError::degenerate_plane(format!(
            "need at least 3 vertices, got {}",
            n
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let threshold = config.inlier_threshold;

    // (inlier count, candidate index, plane); earlier index wins ties
    let mut best: Option<(usize, usize, Plane)> = None;
    let mut iterations = 0;
    let mut required = config.max_iterations;

    while iterations < required {
        let batch_len = BATCH_SIZE.min(required - iterations);
        let mut batch: Vec<(usize, Plane)> = Vec::with_capacity(batch_len);

        for _ in 0..batch_len {
            let iteration = iterations;
            iterations += 1;
            match sample_plane(points, &mut rng, config.max_sample_retries) {
                Some(plane) => batch.push((iteration, plane)),
                None if best.is_none() && batch.is_empty() => {
                    return Err(MeshError::degenerate_plane(format!(
                        "no non-collinear vertex triple found in {} draws",
                        config.max_sample_retries
                    )));
                }
                None => {}
            }
        }

        let batch_best = batch
            .par_iter()
            .map(|&(iteration, plane)| {
                let count = points
                    .iter()
                    .filter(|p| plane.is_inlier(p, threshold))
                    .count();
                (count, iteration, plane)
            })
            .reduce_with(|a, b| {
                if b.0 > a.0 || (b.0 == a.0 && b.1 < a.1) {
                    b
                } else {
                    a
                }
            });

        if let Some(candidate) = batch_best {
            if best.is_none_or(|(count, _, _)| candidate.0 > count) {
                debug!(
                    iteration = candidate.1,
                    inliers = candidate.0,
                    "New best plane candidate"
                );
                best = Some(candidate);
            }
        }

        if let Some((count, _, _)) = best {
            required = required.min(adaptive_iterations(
                count,
                n,
                config.confidence,
                config.max_iterations,
            ));
        }
    }

    let Some((_, _, consensus)) = best else {
        return Err(MeshError::degenerate_plane(format!(
            "no plane candidate after {} iterations",
            iterations
        )));
    };

    let inliers: Vec<usize> = (0..n)
        .filter(|&i| consensus.is_inlier(&points[i], threshold))
        .collect();

    let plane = if config.refine {
        refine_plane(points, &inliers, &consensus).unwrap_or(consensus)
    } else {
        consensus
    };

    let inlier_ratio = inliers.len() as f64 / n as f64;
    info!(
        iterations,
        inliers = inliers.len(),
        inlier_ratio = format!("{:.3}", inlier_ratio),
        normal = ?plane.normal,
        offset = plane.offset,
        "Fitted ground plane"
    );

    Ok(RansacResult {
        plane,
        inliers,
        iterations,
        inlier_ratio,
    })
}

/// Draw three distinct vertices and build the plane through them, redrawing
/// collinear triples up to `retries` times.
fn sample_plane(points: &[Point3<f64>], rng: &mut StdRng, retries: usize) -> Option<Plane> {
    for _ in 0..retries.max(1) {
        let picks = index::sample(rng, points.len(), 3);
        let plane = Plane::from_points(
            &points[picks.index(0)],
            &points[picks.index(1)],
            &points[picks.index(2)],
        );
        if plane.is_some() {
            return plane;
        }
    }
    None
}

/// Iterations needed to draw one all-inlier triple with probability
/// `confidence`, given the best inlier count so far.
fn adaptive_iterations(inliers: usize, total: usize, confidence: f64, cap: usize) -> usize {
    let ratio = inliers as f64 / total as f64;
    let all_inlier = ratio.powi(3);
    if all_inlier >= 1.0 - f64::EPSILON {
        return 0;
    }
    if all_inlier <= f64::EPSILON {
        return cap;
    }
    let needed = (1.0 - confidence.clamp(0.0, 1.0 - 1e-12)).ln() / (1.0 - all_inlier).ln();
    if needed.is_finite() {
        (needed.ceil().max(0.0) as usize).min(cap)
    } else {
        cap
    }
}

/// Least-squares plane through the inliers, oriented like `reference`.
fn refine_plane(points: &[Point3<f64>], inliers: &[usize], reference: &Plane) -> Option<Plane> {
    if inliers.len() < 3 {
        return None;
    }

    let centroid = inliers
        .iter()
        .fold(Vector3::zeros(), |acc, &i| acc + points[i].coords)
        / inliers.len() as f64;

    let covariance = inliers.iter().fold(Matrix3::zeros(), |acc, &i| {
        let d = points[i].coords - centroid;
        acc + d * d.transpose()
    });

    let eigen = SymmetricEigen::new(covariance);
    let (smallest, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let mut normal: Vector3<f64> = eigen.eigenvectors.column(smallest).into_owned();
    if normal.dot(&reference.normal) < 0.0 {
        normal = -normal;
    }

    Plane::from_point_normal(&Point3::from(centroid), normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(n: usize, z: impl Fn(f64, f64) -> f64) -> Vec<Point3<f64>> {
        let mut points = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let (x, y) = (i as f64 / n as f64, j as f64 / n as f64);
                points.push(Point3::new(x, y, z(x, y)));
            }
        }
        points
    }

    #[test]
    fn perfect_plane_all_inliers() {
        let points = grid(10, |_, _| 0.25);
        let result = fit_plane_to_points(&points, &RansacConfig::new().with_seed(7)).unwrap();

        assert_relative_eq!(result.plane.normal.z.abs(), 1.0, epsilon = 1e-9);
        assert_eq!(result.inliers.len(), 100);
        assert_relative_eq!(result.inlier_ratio, 1.0);
        assert_relative_eq!(result.plane.distance(&Point3::new(0.3, 0.3, 0.25)), 0.0, epsilon = 1e-9);
        assert!(result.iterations < 1000);
    }

    #[test]
    fn plane_found_despite_outliers() {
        let mut points = grid(12, |x, y| 0.1 * x - 0.05 * y);
        for k in 0..30 {
            let t = k as f64 / 30.0;
            points.push(Point3::new(t, 1.0 - t, 0.4 + 0.3 * t));
        }

        let result = fit_plane_to_points(&points, &RansacConfig::new().with_seed(1)).unwrap();
        assert_eq!(result.inliers.len(), 144);
        let expected = Vector3::new(-0.1, 0.05, 1.0).normalize();
        assert_relative_eq!(result.plane.normal.dot(&expected).abs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn same_seed_same_plane() {
        let mut points = grid(15, |x, _| 0.02 * (x * 40.0).sin());
        points.push(Point3::new(0.5, 0.5, 3.0));
        let config = RansacConfig::new().with_seed(99).with_inlier_threshold(0.015);

        let a = fit_plane_to_points(&points, &config).unwrap();
        let b = fit_plane_to_points(&points, &config).unwrap();
        assert_eq!(a.plane, b.plane);
        assert_eq!(a.inliers, b.inliers);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn too_few_points() {
        let points = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        let err = fit_plane_to_points(&points, &RansacConfig::default()).unwrap_err();
        assert!(matches!(err, MeshError::DegeneratePlane { .. }));
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let points: Vec<_> = (0..20).map(|i| Point3::new(i as f64, 2.0 * i as f64, 0.0)).collect();
        let err = fit_plane_to_points(&points, &RansacConfig::default()).unwrap_err();
        assert!(matches!(err, MeshError::DegeneratePlane { .. }));
    }

    #[test]
    fn adaptive_stop_bounds() {
        assert_eq!(adaptive_iterations(100, 100, 0.999, 1000), 0);
        assert_eq!(adaptive_iterations(0, 100, 0.999, 1000), 1000);
        // w = 0.5: ln(0.001) / ln(1 - 0.125) ~= 51.7
        assert_eq!(adaptive_iterations(50, 100, 0.999, 1000), 52);
    }

    #[test]
    fn refinement_keeps_orientation() {
        let points = grid(8, |_, _| 0.0);
        let reference = Plane::new(-Vector3::z(), 0.0).unwrap();
        let all: Vec<usize> = (0..points.len()).collect();
        let refined = refine_plane(&points, &all, &reference).unwrap();
        assert_relative_eq!(refined.normal, -Vector3::z(), epsilon = 1e-9);
    }
}
