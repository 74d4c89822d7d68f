//! Single-threaded backend around the whole-grid reference solver.

use std::time::Instant;

use calor_core::reference::ReferenceSolver;
use calor_core::{HeatParams, SnapshotSink};

use crate::backend::{BackendType, ComputeError, DeviceInfo, HeatBackend, RunReport};

/// Runs the reference solver on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialBackend;

impl HeatBackend for SequentialBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "CPU (sequential)".into(),
            backend_type: BackendType::Sequential,
            workers: 1,
        }
    }

    fn run(&self, params: &HeatParams, sink: &mut dyn SnapshotSink) -> Result<RunReport, ComputeError> {
        params.validate()?;
        let start = Instant::now();
        let mut solver = ReferenceSolver::from_params(params);
        solver.run(params.iterations, sink)?;
        Ok(RunReport {
            iterations: params.iterations,
            snapshots: params.iterations,
            workers: 1,
            elapsed: start.elapsed(),
        })
    }
}
