//! IFS cube builder.
//!
//! Reads a YAML job naming RSS exposures (JSON) and a target grid, combines
//! the exposures into a calibrated data cube and writes it as a Zarr store.

mod job;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cubing::{CubeBuilder, CubingConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use job::CubeJob;

#[derive(Parser, Debug)]
#[command(name = "cube-builder")]
#[command(about = "Build IFS data cubes from RSS exposures")]
struct Args {
    /// Job file path
    #[arg(short, long, env = "CUBE_JOB")]
    job: PathBuf,

    /// Write the cube here instead of the job's output path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Process fibres in parallel regardless of configuration
    #[arg(long)]
    parallel: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.json)?;

    let job = CubeJob::load(&args.job)?;
    let mut config = job.cubing_config(CubingConfig::from_env());
    if args.parallel {
        config.parallel = true;
    }
    info!(
        job = %job.name,
        exposures = job.exposures.len(),
        kernel = %config.kernel,
        kernel_size_arcsec = config.kernel_size_arcsec,
        parallel = config.parallel,
        "Loaded job"
    );

    let inputs = job.load_inputs()?;
    let cube = CubeBuilder::new(config.clone())
        .grid(job.grid.clone())
        .info(job.cube_info())
        .build(&inputs.exposures, inputs.adr.as_deref())
        .with_context(|| format!("Failed to build cube {}", job.name))?;

    let covered = cube.intensity().iter().filter(|v| v.is_finite()).count();
    info!(
        shape = ?cube.shape().as_array(),
        covered_voxels = covered,
        total_voxels = cube.shape().len(),
        "Cube built"
    );

    let output = args.output.unwrap_or_else(|| job.output.clone());
    cube.save_zarr(&output, &config)
        .with_context(|| format!("Failed to write cube to {:?}", output))?;

    info!(path = %output.display(), "Done");
    Ok(())
}
