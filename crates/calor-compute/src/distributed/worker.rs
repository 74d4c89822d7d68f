//! One worker's blocks and the per-iteration halo exchange.
//!
//! Each iteration a worker posts the edge rows of every block it owns, updates
//! the rows that do not depend on a neighbour, then services incoming ghost
//! rows in whatever order they arrive. Sends never block, so a worker never
//! waits on a neighbour that is itself waiting to send.

use calor_core::{BlockSpec, HeatParams, LocalSubgrid, Side};
use crossbeam_channel::{Select, Sender};
use log::{debug, trace};

use super::gather::BlockRows;
use super::link::{BlockLinks, HaloLink, HaloRow, WorkerLinks};
use crate::backend::ComputeError;

const SIDES: [Side; 2] = [Side::North, Side::South];

fn slot(side: Side) -> usize {
    match side {
        Side::North => 0,
        Side::South => 1,
    }
}

/// A block's state together with its links.
pub(crate) struct Block {
    spec: BlockSpec,
    grid: LocalSubgrid,
    north: Option<HaloLink>,
    south: Option<HaloLink>,
}

impl Block {
    fn new(rank: usize, links: BlockLinks, params: &HeatParams) -> Result<Self, ComputeError> {
        let BlockLinks { spec, north, south } = links;
        let mut grid = LocalSubgrid::new(spec.rows, params.resolution)
            .map_err(|source| ComputeError::Grid { worker: rank, source })?;
        grid.initialize(params.boundary, params.initial, spec.is_topmost(), spec.is_bottommost());
        Ok(Self {
            spec,
            grid,
            north,
            south,
        })
    }

    pub fn spec(&self) -> &BlockSpec {
        &self.spec
    }

    pub fn grid(&self) -> &LocalSubgrid {
        &self.grid
    }

    fn link(&self, side: Side) -> Option<&HaloLink> {
        match side {
            Side::North => self.north.as_ref(),
            Side::South => self.south.as_ref(),
        }
    }

    /// Update the single row next to `side` once its ghost row is in place.
    ///
    /// A one-row block depends on both ghosts, so it waits for the second.
    fn update_edge(&mut self, side: Side, other_pending: bool, alpha: f64) {
        if self.grid.rows() == 1 {
            if !other_pending {
                self.grid.update_rows(1..2, alpha);
            }
        } else {
            let row = self.grid.edge_row(side);
            self.grid.update_rows(row..row + 1, alpha);
        }
    }
}

/// Ghost rows not yet received this iteration, per block and side.
#[derive(Debug)]
pub(crate) struct Pending(Vec<[bool; 2]>);

impl Pending {
    fn any(&self) -> bool {
        self.0.iter().any(|p| p[0] || p[1])
    }
}

/// The blocks owned by one rank.
pub(crate) struct Worker {
    rank: usize,
    alpha: f64,
    blocks: Vec<Block>,
}

impl Worker {
    /// Allocate and initialise every block in `links`.
    pub fn new(links: WorkerLinks, params: &HeatParams) -> Result<Self, ComputeError> {
        let rank = links.rank;
        let blocks = links
            .blocks
            .into_iter()
            .map(|block| Block::new(rank, block, params))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "worker {}: {} block(s), {} rows",
            rank,
            blocks.len(),
            blocks.iter().map(|b| b.spec.rows).sum::<usize>()
        );
        Ok(Self {
            rank,
            alpha: params.alpha(),
            blocks,
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Compute iteration `iteration` into every block's current buffer.
    pub fn step(&mut self, iteration: usize) -> Result<(), ComputeError> {
        let mut pending = self.begin(iteration)?;
        while pending.any() {
            self.receive(iteration, &mut pending)?;
        }
        Ok(())
    }

    /// Post this iteration's halos and update every row that does not wait
    /// on a ghost. Returns the ghosts still outstanding.
    pub fn begin(&mut self, iteration: usize) -> Result<Pending, ComputeError> {
        self.post_halos(iteration)?;

        let pending = Pending(
            self.blocks
                .iter()
                .map(|b| [b.north.is_some(), b.south.is_some()])
                .collect(),
        );

        for (block, waiting) in self.blocks.iter_mut().zip(&pending.0) {
            let rows = block.grid.rows();
            let first = if waiting[0] { 2 } else { 1 };
            let end = if waiting[1] { rows } else { rows + 1 };
            if first < end {
                block.grid.update_rows(first..end, self.alpha);
            }
        }
        Ok(pending)
    }

    /// Wait for whichever outstanding ghost row arrives first, store it and
    /// update the row that depends on it.
    pub fn receive(&mut self, iteration: usize, pending: &mut Pending) -> Result<(), ComputeError> {
        let (index, side, peer, received) = {
            let mut select = Select::new();
            let mut slots: Vec<(usize, Side, &HaloLink)> = Vec::new();
            for (index, block) in self.blocks.iter().enumerate() {
                for side in SIDES {
                    if let (true, Some(link)) = (pending.0[index][slot(side)], block.link(side)) {
                        select.recv(&link.rx);
                        slots.push((index, side, link));
                    }
                }
            }
            let operation = select.select();
            let (index, side, link) = slots[operation.index()];
            (index, side, link.peer, operation.recv(&link.rx))
        };

        let block = &mut self.blocks[index];
        let row = received.map_err(|_| ComputeError::PeerDisconnected {
            worker: self.rank,
            block: block.spec.id,
            peer,
        })?;
        if row.iteration != iteration {
            return Err(ComputeError::Protocol {
                iteration,
                message: format!(
                    "{} received a ghost row for iteration {}",
                    block.spec.id, row.iteration
                ),
            });
        }
        block
            .grid
            .set_ghost(side, &row.values)
            .map_err(|source| ComputeError::Grid {
                worker: self.rank,
                source,
            })?;
        trace!("worker {}: {} got {:?} ghost for iteration {}", self.rank, block.spec.id, side, iteration);

        pending.0[index][slot(side)] = false;
        let other_pending = pending.0[index][1 - slot(side)];
        block.update_edge(side, other_pending, self.alpha);
        Ok(())
    }

    /// Make this iteration's result the input of the next.
    pub fn swap(&mut self) {
        for block in &mut self.blocks {
            block.grid.swap();
        }
    }

    fn post_halos(&self, iteration: usize) -> Result<(), ComputeError> {
        for block in &self.blocks {
            for side in SIDES {
                if let Some(link) = block.link(side) {
                    let row = HaloRow {
                        iteration,
                        values: block.grid.send_row(side),
                    };
                    link.tx.send(row).map_err(|_| ComputeError::PeerDisconnected {
                        worker: self.rank,
                        block: block.spec.id,
                        peer: link.peer,
                    })?;
                }
            }
        }
        Ok(())
    }
}

/// Body of every non-coordinating worker thread.
pub(crate) fn run_worker(
    links: WorkerLinks,
    gather: Sender<BlockRows>,
    params: &HeatParams,
) -> Result<(), ComputeError> {
    let rank = links.rank;
    let mut worker = Worker::new(links, params)?;
    for iteration in 0..params.iterations {
        worker.step(iteration)?;
        for block in worker.blocks() {
            let rows = BlockRows {
                iteration,
                block: block.spec.id,
                rows: block.grid.true_rows().to_owned(),
            };
            gather
                .send(rows)
                .map_err(|_| ComputeError::CoordinatorDisconnected { worker: rank })?;
        }
        worker.swap();
    }
    debug!("worker {}: finished {} iterations", rank, params.iterations);
    Ok(())
}
