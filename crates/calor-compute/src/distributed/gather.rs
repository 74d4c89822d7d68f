//! Assembly of the global grid on the coordinator.

use calor_core::grid::try_filled;
use calor_core::{BlockId, HeatParams, PartitionPlan, SnapshotSink, COORDINATOR};
use crossbeam_channel::Receiver;
use log::debug;
use ndarray::{s, Array2, ArrayView2};

use super::link::WorkerLinks;
use super::worker::{Block, Worker};
use crate::backend::ComputeError;

/// The true rows of one block after an iteration.
#[derive(Debug, Clone)]
pub(crate) struct BlockRows {
    pub iteration: usize,
    pub block: BlockId,
    pub rows: Array2<f64>,
}

/// Collects every block into a reused full-size frame.
pub(crate) struct Coordinator {
    plan: PartitionPlan,
    frame: Array2<f64>,
    inbound: Vec<(usize, Receiver<BlockRows>)>,
}

impl Coordinator {
    /// The frame starts as all boundary; its first and last rows never change.
    pub fn new(
        plan: PartitionPlan,
        boundary: f64,
        inbound: Vec<(usize, Receiver<BlockRows>)>,
    ) -> Result<Self, ComputeError> {
        let n = plan.resolution();
        let frame = try_filled(n, n, boundary).map_err(|source| ComputeError::Grid {
            worker: COORDINATOR,
            source,
        })?;
        Ok(Self {
            plan,
            frame,
            inbound,
        })
    }

    /// Build the global grid for `iteration` from the coordinator's own blocks
    /// and one message per remote block.
    pub fn collect(&mut self, iteration: usize, own: &[Block]) -> Result<ArrayView2<'_, f64>, ComputeError> {
        for block in own {
            let spec = block.spec();
            self.frame
                .slice_mut(s![spec.global_rows(), ..])
                .assign(&block.grid().true_rows());
        }

        for (rank, rx) in &self.inbound {
            for spec in self.plan.blocks_owned_by(*rank) {
                let message = rx
                    .recv()
                    .map_err(|_| ComputeError::WorkerDisconnected { worker: *rank })?;
                if message.iteration != iteration || message.block != spec.id {
                    return Err(ComputeError::Protocol {
                        iteration,
                        message: format!(
                            "worker {} sent {} for iteration {}, expected {}",
                            rank, message.block, message.iteration, spec.id
                        ),
                    });
                }
                if message.rows.dim() != (spec.rows, self.plan.resolution()) {
                    return Err(ComputeError::Protocol {
                        iteration,
                        message: format!(
                            "{} arrived as {:?}, expected {}x{}",
                            spec.id,
                            message.rows.dim(),
                            spec.rows,
                            self.plan.resolution()
                        ),
                    });
                }
                self.frame.slice_mut(s![spec.global_rows(), ..]).assign(&message.rows);
            }
        }
        Ok(self.frame.view())
    }
}

/// Body of the coordinating worker: compute its own blocks, gather, persist.
pub(crate) fn run_coordinator(
    plan: &PartitionPlan,
    links: WorkerLinks,
    inbound: Vec<(usize, Receiver<BlockRows>)>,
    params: &HeatParams,
    sink: &mut dyn SnapshotSink,
) -> Result<(), ComputeError> {
    let mut worker = Worker::new(links, params)?;
    let mut coordinator = Coordinator::new(plan.clone(), params.boundary, inbound)?;

    for iteration in 0..params.iterations {
        worker.step(iteration)?;
        let frame = coordinator.collect(iteration, worker.blocks())?;
        sink.write_snapshot(iteration, frame)?;
        worker.swap();
    }
    sink.finish()?;
    debug!("coordinator: wrote {} snapshots", params.iterations);
    Ok(())
}
