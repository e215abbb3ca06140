//! Tracing helpers shared by the cleaning stages.
//!
//! Stages emit structured events through `tracing`; nothing here installs a
//! subscriber. Useful targets:
//!
//! - `mesh_clean::timing`: per-stage durations
//! - `mesh_clean::mesh_state`: vertex/face counts between stages
//!
//! Set `RUST_LOG=mesh_clean=debug` for stage-level detail.

use std::time::Instant;
use tracing::{Span, debug, info, trace};

/// A stage timer that logs its duration on drop.
///
/// ```rust,ignore
/// use mesh_clean::tracing_ext::OperationTimer;
///
/// fn close_holes() {
///     let _timer = OperationTimer::new("close_holes");
///     // ... do work ...
/// } // duration logged here
/// ```
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    span: Span,
}

impl OperationTimer {
    /// Create a new operation timer.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::debug_span!("clean_stage", stage = name);
        debug!(target: "mesh_clean::timing", stage = name, "Starting stage");
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Create a timer that also records the size of the mesh it works on.
    pub fn with_context(name: &'static str, face_count: usize, vertex_count: usize) -> Self {
        let span = tracing::debug_span!(
            "clean_stage",
            stage = name,
            faces = face_count,
            vertices = vertex_count
        );
        debug!(
            target: "mesh_clean::timing",
            stage = name,
            faces = face_count,
            vertices = vertex_count,
            "Starting stage"
        );
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Get the elapsed time.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Get the span for this timer.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        info!(
            target: "mesh_clean::timing",
            stage = self.name,
            elapsed_ms = format!("{:.2}", self.elapsed_ms()),
            "Stage completed"
        );
    }
}

/// Log mesh statistics at debug level.
pub fn log_mesh_stats(mesh: &crate::Mesh, context: &str) {
    let (min_bounds, max_bounds) = mesh.bounds().unwrap_or_default();
    let dims = max_bounds - min_bounds;

    debug!(
        target: "mesh_clean::mesh_state",
        context = context,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        dimensions = format!("{:.4} x {:.4} x {:.4}", dims.x, dims.y, dims.z),
        "Mesh state"
    );
    trace!(
        target: "mesh_clean::mesh_state",
        context = context,
        min = ?min_bounds,
        max = ?max_bounds,
        has_normals = mesh.vertices.iter().any(|v| v.normal.is_some()),
        has_colors = mesh.vertices.iter().any(|v| v.color.is_some()),
        "Mesh bounds"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mesh;

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::with_context("test_stage", 0, 0);
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
    }

    #[test]
    fn test_log_empty_mesh_stats() {
        log_mesh_stats(&Mesh::new(), "empty");
    }
}
