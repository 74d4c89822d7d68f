//! Single-process Jacobi solver over the whole grid.
//!
//! Performs exactly the same stencil update as the partitioned solvers,
//! without any partitioning, and serves as their correctness oracle.

use ndarray::Array2;

use crate::snapshot::{SnapshotError, SnapshotSink};
use crate::stencil;
use crate::types::HeatParams;

/// Whole-grid Jacobi iteration with an owned buffer pair.
#[derive(Debug, Clone)]
pub struct ReferenceSolver {
    previous: Array2<f64>,
    current: Array2<f64>,
    alpha: f64,
    steps: usize,
}

impl ReferenceSolver {
    /// Start from an arbitrary grid. Its outer ring is kept fixed.
    pub fn new(initial: Array2<f64>, alpha: f64) -> Self {
        Self {
            current: initial.clone(),
            previous: initial,
            alpha,
            steps: 0,
        }
    }

    /// Start from the uniform plate described by `params`.
    pub fn from_params(params: &HeatParams) -> Self {
        Self::new(params.initial_grid(), params.alpha())
    }

    /// Advance one timestep.
    pub fn step(&mut self) {
        let height = self.previous.nrows();
        if height >= 3 {
            stencil::update_rows(&self.previous, &mut self.current, 1..height - 1, self.alpha);
        }
        std::mem::swap(&mut self.previous, &mut self.current);
        self.steps += 1;
    }

    /// The most recently computed state.
    pub fn state(&self) -> &Array2<f64> {
        &self.previous
    }

    /// Take `iterations` steps, handing every new state to `sink`.
    pub fn run(&mut self, iterations: usize, sink: &mut dyn SnapshotSink) -> Result<(), SnapshotError> {
        for _ in 0..iterations {
            self.step();
            sink.write_snapshot(self.steps - 1, self.state().view())?;
        }
        sink.finish()
    }
}
