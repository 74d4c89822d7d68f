//! Job runner: ties together configuration, backends, and output files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use calor_compute::{DistributedBackend, HeatBackend, RunReport, SequentialBackend, SharedBackend};
use calor_core::heatmap::Palette;
use calor_core::input::read_grid;
use calor_core::types::{default_spacestep, default_timestep, HeatParams};
use calor_core::{PartitionPlan, SnapshotReader, SnapshotSink, SnapshotWriter};

use crate::config::{BackendKind, JobConfig};
use crate::frames::{FrameSink, SurfaceFrames};

/// Metadata written next to a snapshot stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub width: usize,
    pub height: usize,
    pub alpha: f64,
    /// Size of one snapshot in the stream.
    pub snapshot_bytes: u64,
    pub params: HeatParams,
    pub workers: usize,
    pub backend: String,
    pub elapsed_seconds: f64,
}

/// Path of the summary belonging to `stream`: the stream path plus `.json`.
pub fn summary_path(stream: &Path) -> PathBuf {
    let mut name = stream.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

fn create_backend(kind: BackendKind, workers: usize) -> Box<dyn HeatBackend> {
    match kind {
        BackendKind::Distributed => Box::new(DistributedBackend::new(workers)),
        BackendKind::Sequential => Box::new(SequentialBackend),
        BackendKind::Shared => Box::new(SharedBackend::new()),
    }
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Run a square-plate job and write its snapshot stream and summary.
pub fn run_job(job: &JobConfig) -> Result<RunSummary> {
    let params = job.params();
    params.validate().context("Invalid solver parameters")?;
    if job.solver.backend == BackendKind::Distributed {
        PartitionPlan::new(params.resolution, job.solver.workers).context("Invalid worker count")?;
    }
    if !params.is_stable() {
        warn!(
            "alpha = {:.4} exceeds 0.25; the explicit scheme will likely diverge",
            params.alpha()
        );
    }

    let backend = create_backend(job.solver.backend, job.solver.workers);
    let device = backend.device_info();
    println!("Backend: {}", device.name);
    println!(
        "Plate: {0}x{0}, {1} iterations, alpha = {2:.4}",
        params.resolution,
        params.iterations,
        params.alpha()
    );

    let stream = &job.output.snapshots;
    create_parent(stream)?;
    let n = params.resolution;
    let mut writer = SnapshotWriter::create(stream, n, n)
        .with_context(|| format!("Failed to open snapshot stream {}", stream.display()))?;
    let report = backend
        .run(&params, &mut writer)
        .with_context(|| format!("{} run failed", job.solver.backend.name()))?;
    let written = writer
        .close()
        .with_context(|| format!("Failed to close snapshot stream {}", stream.display()))?;
    info!("{} snapshots in {:.3?}", written, report.elapsed);
    println!("Snapshots written to: {}", stream.display());

    let summary = RunSummary {
        width: n,
        height: n,
        alpha: params.alpha(),
        snapshot_bytes: params.snapshot_bytes(),
        params,
        workers: report.workers,
        backend: job.solver.backend.name().to_string(),
        elapsed_seconds: report.elapsed.as_secs_f64(),
    };
    write_summary(&summary, &summary_path(stream))?;
    Ok(summary)
}

/// Write a run summary as pretty JSON.
pub fn write_summary(summary: &RunSummary, path: &Path) -> Result<()> {
    create_parent(path)?;
    let json = serde_json::to_string_pretty(summary).context("JSON serialisation error")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Summary written to: {}", path.display());
    Ok(())
}

pub fn read_summary(path: &Path) -> Result<RunSummary> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Options of the shared-memory variant.
#[derive(Debug, Clone)]
pub struct SharedJob {
    pub input: PathBuf,
    pub iterations: usize,
    pub diffusivity: f64,
    pub spacestep: Option<f64>,
    pub timestep: Option<f64>,
    pub threads: Option<usize>,
    pub frames: Option<PathBuf>,
    pub palette: Palette,
}

/// Iterate an initial-condition grid file with the shared-memory backend.
///
/// When `job.frames` is set, the surface is rendered before every step, so
/// `it0.ppm` shows the initial grid and the final state is not drawn.
pub fn run_shared(job: &SharedJob) -> Result<RunReport> {
    let grid = read_grid(&job.input)
        .with_context(|| format!("Failed to load initial grid {}", job.input.display()))?;
    let (height, width) = grid.dim();
    if width != height {
        warn!(
            "{}x{} grid is not square; the default spacestep uses the larger side",
            width, height
        );
    }

    let spacestep = job.spacestep.unwrap_or_else(|| default_spacestep(width.max(height)));
    let timestep = job
        .timestep
        .unwrap_or_else(|| default_timestep(spacestep, job.diffusivity));
    for (name, value) in [
        ("diffusivity", job.diffusivity),
        ("spacestep", spacestep),
        ("timestep", timestep),
    ] {
        if !(value.is_finite() && value > 0.0) {
            anyhow::bail!("{} must be a positive finite number (got {})", name, value);
        }
    }
    let alpha = job.diffusivity * (timestep / (spacestep * spacestep));
    if alpha > calor_core::types::STABLE_ALPHA {
        warn!("alpha = {:.4} exceeds 0.25; the explicit scheme will likely diverge", alpha);
    }

    let backend = match job.threads {
        Some(threads) => SharedBackend::with_threads(threads)?,
        None => SharedBackend::new(),
    };
    println!("Backend: {}", backend.device_info().name);
    println!("Grid: {}x{}, {} iterations, alpha = {:.4}", width, height, job.iterations, alpha);

    let mut discard = Discard;
    let mut frames;
    let sink: &mut dyn SnapshotSink = match &job.frames {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
            let sink = FrameSink::new(dir, job.palette, 1);
            frames = SurfaceFrames::begin(sink, grid.view(), job.iterations)?;
            &mut frames
        }
        None => &mut discard,
    };
    let report = backend
        .run_grid(grid, alpha, job.iterations, sink)
        .context("shared-memory run failed")?;
    if let Some(dir) = &job.frames {
        println!("Frames written to: {}", dir.display());
    }
    Ok(report)
}

/// Sink for runs whose snapshots are not kept.
struct Discard;

impl SnapshotSink for Discard {
    fn write_snapshot(
        &mut self,
        _iteration: usize,
        _grid: ndarray::ArrayView2<'_, f64>,
    ) -> Result<(), calor_core::SnapshotError> {
        Ok(())
    }
}

/// Render every `every`-th snapshot of `stream` as `itK.ppm` in `dir`.
///
/// The grid shape comes from `resolution` when given, otherwise from the
/// run summary written next to the stream.
pub fn render_stream(
    stream: &Path,
    resolution: Option<usize>,
    palette: Palette,
    dir: &Path,
    every: usize,
) -> Result<usize> {
    let (height, width) = match resolution {
        Some(n) => (n, n),
        None => {
            let summary = read_summary(&summary_path(stream))
                .context("Grid shape unknown: pass --resolution or keep the run summary")?;
            (summary.height, summary.width)
        }
    };
    let mut reader = SnapshotReader::open(stream, height, width)
        .with_context(|| format!("Failed to open snapshot stream {}", stream.display()))?;

    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {}", dir.display()))?;
    let mut frames = FrameSink::new(dir, palette, every);
    for index in 0..reader.len() {
        if index % every.max(1) != 0 {
            continue;
        }
        let grid = reader.read(index)?;
        frames.write_snapshot(index, grid.view())?;
    }
    println!("{} frames written to: {}", frames.written(), dir.display());
    Ok(frames.written())
}

/// Print the row assignment for `resolution` and `workers`, as a table or
/// as JSON.
pub fn print_plan(resolution: usize, workers: usize, json: bool) -> Result<()> {
    let plan = PartitionPlan::new(resolution, workers)?;
    if json {
        println!("{}", plan_json(&plan)?);
        return Ok(());
    }
    println!(
        "{0}x{0} plate, {1} workers: {2} rows per worker, {3} remainder rows",
        resolution,
        workers,
        plan.rows_per_worker(),
        plan.remainder()
    );
    for block in plan.blocks() {
        let rows = block.global_rows();
        println!(
            "  {:<16} rank {:<4} rows {:>5}..{:<5} north: {:<16} south: {}",
            block.id.to_string(),
            block.owner,
            rows.start,
            rows.end,
            describe(block.north.peer()),
            describe(block.south.peer()),
        );
    }
    Ok(())
}

fn plan_json(plan: &PartitionPlan) -> Result<String> {
    serde_json::to_string_pretty(plan).context("JSON serialisation error")
}

fn describe(peer: Option<calor_core::BlockId>) -> String {
    match peer {
        Some(id) => id.to_string(),
        None => "boundary".into(),
    }
}

/// Format an elapsed duration for `-t`.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("Elapsed: {:.6} s", elapsed.as_secs_f64())
}
