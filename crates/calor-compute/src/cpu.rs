//! Shared-memory backend using Rayon to update rows in parallel.
//!
//! All threads read the same "previous" grid and each writes a disjoint row
//! of the "current" grid, so no messaging is needed. Unlike the other
//! backends it also accepts arbitrary `height`×`width` initial grids.

use std::time::Instant;

use calor_core::{stencil, HeatParams, SnapshotSink};
use log::debug;
use ndarray::parallel::prelude::*;
use ndarray::{s, Array2, Axis};

use crate::backend::{BackendType, ComputeError, DeviceInfo, HeatBackend, RunReport};

/// CPU backend that parallelises each timestep across threads via Rayon.
pub struct SharedBackend {
    pool: Option<rayon::ThreadPool>,
    num_threads: usize,
}

impl SharedBackend {
    /// Use the global Rayon pool.
    pub fn new() -> Self {
        Self {
            pool: None,
            num_threads: rayon::current_num_threads(),
        }
    }

    /// Use a dedicated pool with `num_threads` threads.
    pub fn with_threads(num_threads: usize) -> Result<Self, ComputeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("calor-shared-{}", i))
            .build()
            .map_err(|e| ComputeError::Unavailable(e.to_string()))?;
        Ok(Self {
            num_threads: pool.current_num_threads(),
            pool: Some(pool),
        })
    }

    /// Iterate from an arbitrary initial grid whose outer ring is the boundary.
    pub fn run_grid(
        &self,
        initial: Array2<f64>,
        alpha: f64,
        iterations: usize,
        sink: &mut dyn SnapshotSink,
    ) -> Result<RunReport, ComputeError> {
        let (height, width) = initial.dim();
        if height < 3 || width < 3 {
            return Err(ComputeError::Unavailable(format!(
                "a {}x{} grid has no interior cells",
                height, width
            )));
        }
        debug!(
            "shared-memory run: {}x{} grid, {} iterations, {} threads",
            height, width, iterations, self.num_threads
        );

        let start = Instant::now();
        let mut previous = initial.clone();
        let mut current = initial;
        for iteration in 0..iterations {
            self.install(|| step(&previous, &mut current, alpha));
            std::mem::swap(&mut previous, &mut current);
            sink.write_snapshot(iteration, previous.view())?;
        }
        sink.finish()?;

        Ok(RunReport {
            iterations,
            snapshots: iterations,
            workers: self.num_threads,
            elapsed: start.elapsed(),
        })
    }

    fn install<F: FnOnce() + Send>(&self, f: F) {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

impl Default for SharedBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn step(previous: &Array2<f64>, current: &mut Array2<f64>, alpha: f64) {
    let height = previous.nrows();
    current
        .slice_mut(s![1..height - 1, ..])
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(k, row)| stencil::update_row(previous.view(), k + 1, row, alpha));
}

impl HeatBackend for SharedBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("CPU ({} threads)", self.num_threads),
            backend_type: BackendType::SharedMemory,
            workers: self.num_threads,
        }
    }

    fn run(&self, params: &HeatParams, sink: &mut dyn SnapshotSink) -> Result<RunReport, ComputeError> {
        params.validate()?;
        self.run_grid(params.initial_grid(), params.alpha(), params.iterations, sink)
    }
}
