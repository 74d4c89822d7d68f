//! Message-passing backend: one thread per worker, halo exchange over channels.
//!
//! The strategy follows the classic row-block decomposition:
//!
//! - **Row blocks**: each worker owns a contiguous block of interior rows, as
//!   laid out by [`PartitionPlan`]. The coordinator (rank 0) also owns the
//!   remainder block at the bottom of the plate.
//! - **Halo exchange**: before each update a block sends its edge rows to its
//!   neighbours and receives theirs into its ghost rows.
//! - **Gather**: after each update every worker ships its true rows to the
//!   coordinator, which assembles the full grid and hands it to the sink.
//!
//! Workers share no state. If any of them fails, its channels close and the
//! failure spreads to every peer as a disconnection, so the run always ends.
//! The error reported is the first one that is not such an echo.

mod gather;
mod link;
mod worker;

use std::thread;
use std::time::Instant;

use calor_core::{HeatParams, PartitionPlan, SnapshotSink, COORDINATOR};
use log::{debug, info};

use crate::backend::{BackendType, ComputeError, DeviceInfo, HeatBackend, RunReport};

/// Backend that runs `workers` cooperating workers inside this process.
#[derive(Debug, Clone, Copy)]
pub struct DistributedBackend {
    workers: usize,
}

impl DistributedBackend {
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }
}

impl HeatBackend for DistributedBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("{} workers (message passing)", self.workers),
            backend_type: BackendType::Distributed,
            workers: self.workers,
        }
    }

    fn run(&self, params: &HeatParams, sink: &mut dyn SnapshotSink) -> Result<RunReport, ComputeError> {
        params.validate()?;
        let plan = PartitionPlan::new(params.resolution, self.workers)?;
        info!(
            "{} workers, {} rows each, {} remainder rows on the coordinator",
            plan.workers(),
            plan.rows_per_worker(),
            plan.remainder()
        );

        let start = Instant::now();
        let wiring = link::wire(&plan);
        let plan_ref = &plan;

        let outcomes = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(wiring.workers.len());
            let mut spawn_error = None;
            for (links, gather) in wiring.workers {
                let rank = links.rank;
                let spawned = thread::Builder::new()
                    .name(format!("calor-worker-{}", rank))
                    .spawn_scoped(scope, move || worker::run_worker(links, gather, params));
                match spawned {
                    Ok(handle) => handles.push((rank, handle)),
                    Err(source) => {
                        spawn_error = Some(ComputeError::Spawn { worker: rank, source });
                        break;
                    }
                }
            }

            let coordinator = match spawn_error {
                Some(err) => {
                    drop(wiring.coordinator);
                    drop(wiring.gather);
                    Err(err)
                }
                None => gather::run_coordinator(plan_ref, wiring.coordinator, wiring.gather, params, sink),
            };

            let mut outcomes = vec![(COORDINATOR, coordinator)];
            for (rank, handle) in handles {
                let outcome = handle
                    .join()
                    .unwrap_or(Err(ComputeError::WorkerPanicked(rank)));
                outcomes.push((rank, outcome));
            }
            outcomes
        });

        root_cause(outcomes)?;
        let elapsed = start.elapsed();
        debug!("distributed run finished in {:.3?}", elapsed);

        Ok(RunReport {
            iterations: params.iterations,
            snapshots: params.iterations,
            workers: plan.workers(),
            elapsed,
        })
    }
}

/// Pick the error to report from every worker's outcome.
fn root_cause(outcomes: Vec<(usize, Result<(), ComputeError>)>) -> Result<(), ComputeError> {
    let mut primary = None;
    let mut echo = None;
    for (rank, outcome) in outcomes {
        let Err(err) = outcome else { continue };
        if err.is_secondary() {
            debug!("worker {} stopped: {}", rank, err);
            echo.get_or_insert(err);
        } else if primary.is_none() {
            primary = Some(err);
        } else {
            debug!("worker {} also failed: {}", rank, err);
        }
    }
    match primary.or(echo) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
