//! Core types shared across the Calor workspace.
//!
//! [`HeatParams`] describes one simulation run: the plate resolution, how
//! many timesteps to take, the physical constants that determine the
//! stencil coefficient, and the Dirichlet boundary / uniform initial
//! temperatures.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default plate resolution (cells per side).
pub const DEFAULT_RESOLUTION: usize = 100;
/// Default number of timesteps.
pub const DEFAULT_ITERATIONS: usize = 3000;
/// Default thermal diffusivity.
pub const DEFAULT_DIFFUSIVITY: f64 = 0.1;
/// Default temperature of the outermost ring.
pub const DEFAULT_BOUNDARY: f64 = 10.0;
/// Default temperature of every interior cell at t = 0.
pub const DEFAULT_INITIAL: f64 = 0.0;

/// Largest stencil coefficient for which the explicit scheme is stable.
pub const STABLE_ALPHA: f64 = 0.25;

/// Errors in a run configuration, detected before anything executes.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Grid resolution must be at least 3 (got {0})")]
    ResolutionTooSmall(usize),

    #[error("{name} must be a positive finite number (got {value})")]
    NotPositive { name: &'static str, value: f64 },

    #[error("{name} must be finite (got {value})")]
    NotFinite { name: &'static str, value: f64 },
}

/// Parameters defining a heat diffusion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatParams {
    /// Number of cells per side of the square plate (including the boundary ring).
    pub resolution: usize,
    /// Number of timesteps; one snapshot is produced per timestep.
    pub iterations: usize,
    /// Thermal diffusivity.
    pub diffusivity: f64,
    /// Distance between neighbouring cells.
    pub spacestep: f64,
    /// Length of one timestep.
    pub timestep: f64,
    /// Fixed temperature of the outermost ring.
    pub boundary: f64,
    /// Uniform temperature of the interior at t = 0.
    pub initial: f64,
}

impl Default for HeatParams {
    fn default() -> Self {
        Self::with_resolution(DEFAULT_RESOLUTION)
    }
}

impl HeatParams {
    /// Parameters for an `n`×`n` plate with every other value at its default.
    pub fn with_resolution(resolution: usize) -> Self {
        let spacestep = default_spacestep(resolution);
        Self {
            resolution,
            iterations: DEFAULT_ITERATIONS,
            diffusivity: DEFAULT_DIFFUSIVITY,
            spacestep,
            timestep: default_timestep(spacestep, DEFAULT_DIFFUSIVITY),
            boundary: DEFAULT_BOUNDARY,
            initial: DEFAULT_INITIAL,
        }
    }

    /// Stencil coefficient $\alpha = D \Delta t / \Delta x^2$.
    pub fn alpha(&self) -> f64 {
        self.diffusivity * (self.timestep / (self.spacestep * self.spacestep))
    }

    /// Whether the coefficient stays within the explicit-scheme stability bound.
    ///
    /// Only advisory: overridden timesteps are never rejected.
    pub fn is_stable(&self) -> bool {
        self.alpha() <= STABLE_ALPHA
    }

    /// Check that the parameters describe a runnable simulation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution < 3 {
            return Err(ConfigError::ResolutionTooSmall(self.resolution));
        }
        positive("diffusivity", self.diffusivity)?;
        positive("spacestep", self.spacestep)?;
        positive("timestep", self.timestep)?;
        finite("boundary", self.boundary)?;
        finite("initial", self.initial)?;
        Ok(())
    }

    /// Size in bytes of one persisted snapshot.
    pub fn snapshot_bytes(&self) -> u64 {
        (self.resolution * self.resolution * std::mem::size_of::<f64>()) as u64
    }

    /// The `n`×`n` plate at t = 0: `boundary` on the outer ring, `initial` inside.
    pub fn initial_grid(&self) -> Array2<f64> {
        plate(self.resolution, self.resolution, self.boundary, self.initial)
    }
}

/// Default spacestep for a plate with `cells` cells per side: `1 / (cells + 2)`.
pub fn default_spacestep(cells: usize) -> f64 {
    1.0 / (cells as f64 + 2.0)
}

/// Default timestep: the stability limit $\Delta x^2 / (4 D)$.
pub fn default_timestep(spacestep: f64, diffusivity: f64) -> f64 {
    (spacestep * spacestep) / (4.0 * diffusivity)
}

/// A `height`×`width` grid with `boundary` on its outer ring and `initial` inside.
pub fn plate(height: usize, width: usize, boundary: f64, initial: f64) -> Array2<f64> {
    Array2::from_shape_fn((height, width), |(i, j)| {
        if i == 0 || j == 0 || i + 1 == height || j + 1 == width {
            boundary
        } else {
            initial
        }
    })
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

fn finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { name, value })
    }
}
