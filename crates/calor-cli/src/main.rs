//! Calor command-line interface.
//!
//! ```sh
//! calor run -n 200 -i 5000 -w 8 -t
//! calor run --config job.toml -o
//! calor shared plate.pgm -i 1000 -o
//! calor render heat.bin --every 10
//! calor plan -n 100 -w 7 --json
//! ```

mod config;
mod frames;
mod runner;

use std::path::PathBuf;
use std::time::Instant;

use calor_core::heatmap::Palette;
use clap::{Args, Parser, Subcommand};

use config::{BackendKind, JobConfig, Overrides};

#[derive(Parser)]
#[command(name = "calor")]
#[command(about = "Calor: 2-D heat diffusion on a plate, split across workers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a square plate and write the snapshot stream.
    Run(RunArgs),
    /// Solve from an initial-condition grid file with shared-memory threads.
    Shared {
        /// Grid file (P2 width height maxvalue, then the samples).
        file: PathBuf,
        /// Number of iterations.
        #[arg(short, long, default_value_t = 1000)]
        iterations: usize,
        /// Spacestep. Default: 1 / (max(width, height) + 2).
        #[arg(short = 'p', long)]
        spacestep: Option<f64>,
        /// Timestep. Default: spacestep² / (4 diffusivity).
        #[arg(short = 's', long)]
        timestep: Option<f64>,
        /// Thermal diffusivity.
        #[arg(short, long, default_value_t = calor_core::types::DEFAULT_DIFFUSIVITY)]
        diffusivity: f64,
        /// Print the elapsed time.
        #[arg(short = 't', long)]
        time: bool,
        /// Write an itK.ppm frame for every iteration.
        #[arg(short = 'o', long)]
        output: bool,
        /// Worker threads (default: one per core).
        #[arg(long)]
        threads: Option<usize>,
        /// Directory for frames.
        #[arg(long, default_value = ".")]
        frames: PathBuf,
        /// Two-colour palette instead of five.
        #[arg(long)]
        simple: bool,
    },
    /// Render a snapshot stream to itK.ppm frames.
    Render {
        /// Snapshot stream written by `run`.
        stream: PathBuf,
        /// Plate resolution (default: read from the run summary).
        #[arg(short = 'n', long)]
        resolution: Option<usize>,
        /// Two-colour palette instead of five.
        #[arg(long)]
        simple: bool,
        /// Directory for frames.
        #[arg(long, default_value = ".")]
        frames: PathBuf,
        /// Render every K-th snapshot.
        #[arg(long, default_value_t = 1)]
        every: usize,
    },
    /// Show how the rows would be split without running anything.
    Plan {
        #[arg(short = 'n', long, default_value_t = calor_core::types::DEFAULT_RESOLUTION)]
        resolution: usize,
        #[arg(short, long)]
        workers: usize,
        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Cells per side of the plate, boundary included.
    #[arg(short = 'n', long)]
    resolution: Option<usize>,
    /// Number of iterations.
    #[arg(short, long)]
    iterations: Option<usize>,
    /// Spacestep. Default: 1 / (n + 2).
    #[arg(short = 'p', long)]
    spacestep: Option<f64>,
    /// Timestep. Default: spacestep² / (4 diffusivity).
    #[arg(short = 's', long)]
    timestep: Option<f64>,
    /// Thermal diffusivity.
    #[arg(short, long)]
    diffusivity: Option<f64>,
    /// Number of workers.
    #[arg(short, long)]
    workers: Option<usize>,
    /// Temperature of the outer ring.
    #[arg(long, allow_hyphen_values = true)]
    boundary: Option<f64>,
    /// Initial interior temperature.
    #[arg(long, allow_hyphen_values = true)]
    initial: Option<f64>,
    /// Print the elapsed time.
    #[arg(short = 't', long)]
    time: bool,
    /// Render itK.ppm frames from the stream after the run.
    #[arg(short = 'o', long)]
    output: bool,
    /// TOML job file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Snapshot stream path.
    #[arg(long)]
    snapshots: Option<PathBuf>,
    /// Directory for frames.
    #[arg(long)]
    frames: Option<PathBuf>,
    /// Two-colour palette instead of five.
    #[arg(long)]
    simple: bool,
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,
}

impl RunArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            resolution: self.resolution,
            iterations: self.iterations,
            diffusivity: self.diffusivity,
            spacestep: self.spacestep,
            timestep: self.timestep,
            boundary: self.boundary,
            initial: self.initial,
            workers: self.workers,
            backend: self.backend,
            snapshots: self.snapshots.clone(),
            frames: self.frames.clone(),
            simple: self.simple,
        }
    }
}

fn palette(simple: bool) -> Palette {
    if simple {
        Palette::Two
    } else {
        Palette::Five
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            println!("Calor Heat Solver");
            println!("=================");
            let mut job = match &args.config {
                Some(path) => {
                    let job = config::load_config(path)?;
                    println!("Configuration: {}", path.display());
                    job
                }
                None => JobConfig::default(),
            };
            job.apply(args.overrides());

            let start = Instant::now();
            let summary = runner::run_job(&job)?;
            if args.time {
                println!("{}", runner::format_elapsed(start.elapsed()));
            }
            if args.output {
                runner::render_stream(
                    &job.output.snapshots,
                    Some(summary.params.resolution),
                    job.output.palette,
                    &job.output.frames,
                    1,
                )?;
            }
            println!("Simulation complete.");
            Ok(())
        }
        Commands::Shared {
            file,
            iterations,
            spacestep,
            timestep,
            diffusivity,
            time,
            output,
            threads,
            frames,
            simple,
        } => {
            let job = runner::SharedJob {
                input: file,
                iterations,
                diffusivity,
                spacestep,
                timestep,
                threads,
                frames: output.then_some(frames),
                palette: palette(simple),
            };
            let report = runner::run_shared(&job)?;
            if time {
                println!("{}", runner::format_elapsed(report.elapsed));
            }
            Ok(())
        }
        Commands::Render {
            stream,
            resolution,
            simple,
            frames,
            every,
        } => {
            runner::render_stream(&stream, resolution, palette(simple), &frames, every)?;
            Ok(())
        }
        Commands::Plan {
            resolution,
            workers,
            json,
        } => runner::print_plan(resolution, workers, json),
    }
}
