//! Solver backend trait and execution-environment description.
//!
//! The [`HeatBackend`] trait abstracts over how the stencil iterations are
//! executed (one thread, a rayon pool, or message-passing workers) so that
//! the CLI can drive any of them against the same [`SnapshotSink`].

use std::time::Duration;

use calor_core::{BlockId, ConfigError, GridError, PartitionError, SnapshotError};
use calor_core::{HeatParams, SnapshotSink};
use thiserror::Error;

/// Errors originating from solver backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid partition: {0}")]
    Partition(#[from] PartitionError),

    #[error("Worker {worker}: {source}")]
    Grid {
        worker: usize,
        #[source]
        source: GridError,
    },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("Worker {worker}: {block} lost its link to {peer}")]
    PeerDisconnected {
        worker: usize,
        block: BlockId,
        peer: BlockId,
    },

    #[error("Worker {worker}: coordinator is gone")]
    CoordinatorDisconnected { worker: usize },

    #[error("Coordinator: worker {worker} is gone")]
    WorkerDisconnected { worker: usize },

    #[error("Protocol violation at iteration {iteration}: {message}")]
    Protocol { iteration: usize, message: String },

    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("Failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Backend not available: {0}")]
    Unavailable(String),
}

impl ComputeError {
    /// Whether this error is only the echo of a failure elsewhere in the run.
    ///
    /// When one worker fails its channels close, and every peer waiting on it
    /// fails with a disconnection. Those are not the cause worth reporting.
    pub fn is_secondary(&self) -> bool {
        matches!(
            self,
            ComputeError::PeerDisconnected { .. }
                | ComputeError::CoordinatorDisconnected { .. }
                | ComputeError::WorkerDisconnected { .. }
        )
    }
}

/// The kind of execution environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Sequential,
    SharedMemory,
    Distributed,
}

/// Describes the capabilities of a backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub backend_type: BackendType,
    /// Number of threads or workers the backend will use.
    pub workers: usize,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub iterations: usize,
    pub snapshots: usize,
    pub workers: usize,
    pub elapsed: Duration,
}

/// Abstraction over heat solver backends.
pub trait HeatBackend: Send + Sync {
    /// Return information about the execution environment.
    fn device_info(&self) -> DeviceInfo;

    /// Run `params.iterations` timesteps from the uniform plate described by
    /// `params`, handing every new grid to `sink`.
    fn run(&self, params: &HeatParams, sink: &mut dyn SnapshotSink) -> Result<RunReport, ComputeError>;
}
