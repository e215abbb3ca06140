//! mesh-clean: clean up a raw 3D scan from the command line.
//!
//! Removes the ground plane and floating debris, fixes winding, closes holes
//! and optionally normalizes the result into the unit cube.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=mesh_clean=info` - One line per stage
//! - `RUST_LOG=mesh_clean=debug` - Detailed stage logging
//! - `RUST_LOG=mesh_clean::timing=debug` - Per-stage timing
//!
//! Without `RUST_LOG`, `-v`/`-vv`/`-vvv` select info/debug/trace.
//!
//! # Example
//!
//! ```bash
//! # Default cleanup
//! mesh-clean scan.ply clean.stl
//!
//! # Keep every component, trim to the central 80%, JSON report
//! mesh-clean scan.obj clean.obj --keep_all --trim 0.4 --format json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod clean;
mod output;

/// mesh-clean - Clean up raw 3D scan meshes.
///
/// Fits and removes the ground plane, drops debris, makes winding
/// consistent and closes holes.
#[derive(Parser)]
#[command(name = "mesh-clean")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input mesh file (STL, OBJ or PLY)
    pub input: PathBuf,

    /// Output mesh file, format chosen by extension
    pub output: PathBuf,

    /// Scale the result into the unit cube centered at the origin
    #[arg(long)]
    pub normalize: bool,

    /// Do not fit and remove the ground plane
    #[arg(long = "no_reorient", alias = "no-reorient")]
    pub no_reorient: bool,

    /// Do not close holes
    #[arg(long = "no_close_holes", alias = "no-close-holes")]
    pub no_close_holes: bool,

    /// Do not fix face winding
    #[arg(long = "no_fix_winding", alias = "no-fix-winding")]
    pub no_fix_winding: bool,

    /// Keep every connected component instead of only the largest
    #[arg(long = "keep_all", alias = "keep-all")]
    pub keep_all: bool,

    /// RANSAC inlier distance
    #[arg(long = "ransac_threshold", alias = "ransac-threshold")]
    pub ransac_threshold: Option<f64>,

    /// Minimum height above the ground plane
    #[arg(long = "plane_offset", alias = "plane-offset")]
    pub plane_offset: Option<f64>,

    /// Keep only geometry inside the cube of this half-size around the origin.
    ///
    /// Relative to the unit working frame (largest extent 1, centered), so
    /// values of about 0.87 or more remove nothing; in file units with
    /// --absolute-units
    #[arg(long)]
    pub trim: Option<f64>,

    /// RANSAC seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Axis the ground normal is rotated onto
    #[arg(long)]
    pub up_axis: Option<UpAxisArg>,

    /// Interpret distances in file units instead of the unit working frame
    #[arg(long)]
    pub absolute_units: bool,

    /// Largest hole (in boundary edges) that is still closed
    #[arg(long)]
    pub max_hole_edges: Option<usize>,

    /// Read params from a TOML file; flags given on the command line win
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format for the report
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short)]
    pub quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum UpAxisArg {
    /// Ground becomes the XY plane
    Z,
    /// Ground becomes the XZ plane
    Y,
}

impl From<UpAxisArg> for mesh_clean::UpAxis {
    fn from(arg: UpAxisArg) -> Self {
        match arg {
            UpAxisArg::Z => mesh_clean::UpAxis::Z,
            UpAxisArg::Y => mesh_clean::UpAxis::Y,
        }
    }
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG takes precedence over -v
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let result = clean::run(&cli);

    if let Err(e) = &result {
        if !cli.quiet {
            if let Some(mesh_err) = e.downcast_ref::<mesh_clean::MeshError>() {
                eprintln!("{}: {}: {}", "Error".red().bold(), e, mesh_err);
                eprintln!("  {}: {}", "Code".cyan(), mesh_err.code());
                eprintln!(
                    "  {}: {}",
                    "Suggestion".green(),
                    mesh_err.recovery_suggestion()
                );
                if let Some(location) = mesh_err.location() {
                    eprintln!("  {}: {}", "Location".yellow(), location);
                }
            } else {
                eprintln!("{}: {}", "Error".red().bold(), e);
                for cause in e.chain().skip(1) {
                    eprintln!("  {}: {}", "Caused by".yellow(), cause);
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
