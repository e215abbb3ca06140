//! The clean command: load, run the pipeline, save, report.

use anyhow::{Context, Result};
use mesh_clean::{CleanParams, CleanReport, Pipeline};
use serde::Serialize;
use tracing::info;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct CleanOutput<'a> {
    input: String,
    output: String,
    success: bool,
    params: &'a CleanParams,
    report: &'a CleanReport,
}

/// Params from `--config` (or the defaults) with command-line flags applied.
pub fn resolve_params(cli: &Cli) -> Result<CleanParams> {
    let mut params = match &cli.config {
        Some(path) => CleanParams::from_toml_file(path)
            .with_context(|| format!("Failed to read params from {:?}", path))?,
        None => CleanParams::default(),
    };

    if cli.normalize {
        params.normalize = true;
    }
    if cli.no_reorient {
        params.reorient = false;
    }
    if cli.no_close_holes {
        params.close_holes = false;
    }
    if cli.no_fix_winding {
        params.fix_winding = false;
    }
    if cli.keep_all {
        params.keep_all_components = true;
    }
    if cli.absolute_units {
        params.unit_frame = false;
    }
    if let Some(threshold) = cli.ransac_threshold {
        params.ransac_threshold = threshold;
    }
    if let Some(offset) = cli.plane_offset {
        params.plane_offset = offset;
    }
    if cli.trim.is_some() {
        params.trim = cli.trim;
    }
    if let Some(seed) = cli.seed {
        params.seed = seed;
    }
    if let Some(axis) = cli.up_axis {
        params.up_axis = axis.into();
    }
    if cli.max_hole_edges.is_some() {
        params.max_hole_edges = cli.max_hole_edges;
    }

    Ok(params)
}

pub fn run(cli: &Cli) -> Result<()> {
    let params = resolve_params(cli)?;

    info!(
        normalize = params.normalize,
        reorient = params.reorient,
        close_holes = params.close_holes,
        fix_winding = params.fix_winding,
        keep_all = params.keep_all_components,
        ransac_threshold = params.ransac_threshold,
        plane_offset = params.plane_offset,
        trim = ?params.trim,
        unit_frame = params.unit_frame,
        "Cleaning {}",
        cli.input.display()
    );

    let result = Pipeline::load(&cli.input)
        .with_context(|| format!("Failed to load mesh from {:?}", cli.input))?
        .with_params(params.clone())
        .run()
        .context("Cleaning failed")?
        .save(&cli.output)
        .with_context(|| format!("Failed to save cleaned mesh to {:?}", cli.output))?;

    let report = &result.report;
    match cli.format {
        OutputFormat::Json => {
            let out = CleanOutput {
                input: cli.input.display().to_string(),
                output: cli.output.display().to_string(),
                success: true,
                params: &params,
                report,
            };
            output::print(&out, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                print_text(cli, report);
            }
        }
    }

    Ok(())
}

fn print_text(cli: &Cli, report: &CleanReport) {
    output::success(
        &format!("Cleaned mesh saved to {}", cli.output.display()),
        cli.format,
        cli.quiet,
    );
    let final_report = &report.final_report;
    output::field(
        "Vertices",
        format!("{} → {}", report.input_vertices, final_report.vertex_count),
    );
    output::field(
        "Faces",
        format!("{} → {}", report.input_faces, final_report.face_count),
    );

    if let Some(ground) = &report.ground_plane {
        output::field(
            "Ground plane",
            format!(
                "{} inliers ({:.1}%){}",
                ground.inlier_count,
                ground.inlier_ratio * 100.0,
                if ground.normal_flipped { ", normal flipped" } else { "" }
            ),
        );
    }
    if let Some(spatial) = &report.spatial {
        output::field(
            "Spatial filter",
            format!(
                "{} below plane, {} outside trim",
                spatial.below_plane, spatial.outside_trim
            ),
        );
    }
    if let Some(components) = &report.components {
        if components.components_removed > 0 {
            output::field(
                "Components",
                format!(
                    "kept 1 of {} ({} faces removed)",
                    components.components_found, components.faces_removed
                ),
            );
        }
    }
    if let Some(winding) = &report.winding {
        if winding.faces_flipped > 0 {
            output::field("Winding", format!("{} faces flipped", winding.faces_flipped));
        }
    }
    if let Some(holes) = &report.holes {
        if holes.holes_found > 0 {
            output::field(
                "Holes",
                format!(
                    "{} of {} closed with {} triangles",
                    holes.holes_filled, holes.holes_found, holes.triangles_added
                ),
            );
        }
    }
    output::field(
        "Watertight",
        if final_report.is_watertight { "yes" } else { "no" },
    );

    for warning in &report.warnings {
        output::warning(
            &format!("[{}] {}", warning.code(), warning),
            cli.format,
            cli.quiet,
        );
    }
}
