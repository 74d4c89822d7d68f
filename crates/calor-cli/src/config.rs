//! TOML configuration deserialisation for solver jobs.

use std::path::{Path, PathBuf};

use anyhow::Context;
use calor_core::heatmap::Palette;
use calor_core::types::{
    default_spacestep, default_timestep, DEFAULT_BOUNDARY, DEFAULT_DIFFUSIVITY, DEFAULT_INITIAL,
    DEFAULT_ITERATIONS, DEFAULT_RESOLUTION,
};
use calor_core::HeatParams;
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Default, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Which backend executes the iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Row blocks on cooperating workers (default).
    #[default]
    Distributed,
    /// Single-threaded whole-grid solver.
    Sequential,
    /// Rayon threads over one shared grid.
    Shared,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Distributed => "distributed",
            BackendKind::Sequential => "sequential",
            BackendKind::Shared => "shared",
        }
    }
}

/// Solver parameters from TOML.
#[derive(Debug, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_resolution")]
    pub resolution: usize,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default = "default_diffusivity")]
    pub diffusivity: f64,
    /// Default: `1 / (resolution + 2)`.
    pub spacestep: Option<f64>,
    /// Default: `spacestep² / (4 diffusivity)`.
    pub timestep: Option<f64>,
    #[serde(default = "default_boundary")]
    pub boundary: f64,
    #[serde(default = "default_initial")]
    pub initial: f64,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub backend: BackendKind,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            iterations: default_iterations(),
            diffusivity: default_diffusivity(),
            spacestep: None,
            timestep: None,
            boundary: default_boundary(),
            initial: default_initial(),
            workers: default_workers(),
            backend: BackendKind::default(),
        }
    }
}

fn default_resolution() -> usize {
    DEFAULT_RESOLUTION
}
fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}
fn default_diffusivity() -> f64 {
    DEFAULT_DIFFUSIVITY
}
fn default_boundary() -> f64 {
    DEFAULT_BOUNDARY
}
fn default_initial() -> f64 {
    DEFAULT_INITIAL
}
fn default_workers() -> usize {
    4
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Snapshot stream path (default: "heat.bin").
    #[serde(default = "default_snapshots")]
    pub snapshots: PathBuf,
    /// Directory for rendered `itK.ppm` frames (default: ".").
    #[serde(default = "default_frames")]
    pub frames: PathBuf,
    #[serde(default)]
    pub palette: Palette,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshots: default_snapshots(),
            frames: default_frames(),
            palette: Palette::default(),
        }
    }
}

fn default_snapshots() -> PathBuf {
    PathBuf::from("heat.bin")
}
fn default_frames() -> PathBuf {
    PathBuf::from(".")
}

/// Values given on the command line, which win over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub resolution: Option<usize>,
    pub iterations: Option<usize>,
    pub diffusivity: Option<f64>,
    pub spacestep: Option<f64>,
    pub timestep: Option<f64>,
    pub boundary: Option<f64>,
    pub initial: Option<f64>,
    pub workers: Option<usize>,
    pub backend: Option<BackendKind>,
    pub snapshots: Option<PathBuf>,
    pub frames: Option<PathBuf>,
    pub simple: bool,
}

impl JobConfig {
    /// Apply command-line values on top of the file (or the defaults).
    pub fn apply(&mut self, o: Overrides) {
        let s = &mut self.solver;
        if let Some(v) = o.resolution {
            s.resolution = v;
        }
        if let Some(v) = o.iterations {
            s.iterations = v;
        }
        if let Some(v) = o.diffusivity {
            s.diffusivity = v;
        }
        if o.spacestep.is_some() {
            s.spacestep = o.spacestep;
        }
        if o.timestep.is_some() {
            s.timestep = o.timestep;
        }
        if let Some(v) = o.boundary {
            s.boundary = v;
        }
        if let Some(v) = o.initial {
            s.initial = v;
        }
        if let Some(v) = o.workers {
            s.workers = v;
        }
        if let Some(v) = o.backend {
            s.backend = v;
        }
        if let Some(v) = o.snapshots {
            self.output.snapshots = v;
        }
        if let Some(v) = o.frames {
            self.output.frames = v;
        }
        if o.simple {
            self.output.palette = Palette::Two;
        }
    }

    /// Resolve derived defaults into the parameters of a run.
    pub fn params(&self) -> HeatParams {
        let s = &self.solver;
        let spacestep = s.spacestep.unwrap_or_else(|| default_spacestep(s.resolution));
        HeatParams {
            resolution: s.resolution,
            iterations: s.iterations,
            diffusivity: s.diffusivity,
            spacestep,
            timestep: s
                .timestep
                .unwrap_or_else(|| default_timestep(spacestep, s.diffusivity)),
            boundary: s.boundary,
            initial: s.initial,
        }
    }
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: JobConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: JobConfig = toml::from_str("").unwrap();
        assert_eq!(config.solver.resolution, 100);
        assert_eq!(config.solver.iterations, 3000);
        assert_eq!(config.solver.backend, BackendKind::Distributed);
        assert_eq!(config.output.snapshots, PathBuf::from("heat.bin"));
        assert_eq!(config.output.palette, Palette::Five);

        let params = config.params();
        assert_eq!(params, HeatParams::with_resolution(100));
    }

    #[test]
    fn test_full_file() {
        let config: JobConfig = toml::from_str(
            r#"
            [solver]
            resolution = 50
            iterations = 10
            diffusivity = 0.2
            spacestep = 0.5
            boundary = 1.0
            initial = -1.0
            workers = 7
            backend = "shared"

            [output]
            snapshots = "out/run.bin"
            frames = "out/frames"
            palette = "two"
            "#,
        )
        .unwrap();
        assert_eq!(config.solver.workers, 7);
        assert_eq!(config.solver.backend, BackendKind::Shared);
        assert_eq!(config.output.palette, Palette::Two);

        let params = config.params();
        assert_eq!(params.spacestep, 0.5);
        // Timestep derived from the configured spacestep.
        assert!((params.alpha() - 0.25).abs() < 1e-12);
        assert_eq!(params.initial, -1.0);
    }

    #[test]
    fn test_flags_override_file() {
        let mut config: JobConfig = toml::from_str("[solver]\nresolution = 50\nworkers = 2\n").unwrap();
        config.apply(Overrides {
            resolution: Some(20),
            timestep: Some(1e-3),
            backend: Some(BackendKind::Sequential),
            simple: true,
            ..Overrides::default()
        });
        assert_eq!(config.solver.resolution, 20);
        assert_eq!(config.solver.workers, 2);
        assert_eq!(config.solver.backend, BackendKind::Sequential);
        assert_eq!(config.output.palette, Palette::Two);

        let params = config.params();
        assert_eq!(params.timestep, 1e-3);
        assert_eq!(params.spacestep, default_spacestep(20));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result: Result<JobConfig, _> = toml::from_str("[solver]\nbackend = \"gpu\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = load_config(Path::new("/nonexistent/job.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/job.toml"));
    }
}
