//! Channel wiring between neighbouring blocks.
//!
//! Every pair of vertically adjacent blocks is joined by two unbounded
//! channels, one per direction. Each worker also gets its own channel to the
//! coordinator for gathering, so blocks from different iterations never
//! interleave on a shared queue.

use calor_core::{BlockId, BlockSpec, PartitionPlan, COORDINATOR};
use crossbeam_channel::{unbounded, Receiver, Sender};

use super::gather::BlockRows;

/// One boundary row travelling between neighbouring blocks.
#[derive(Debug, Clone)]
pub(crate) struct HaloRow {
    pub iteration: usize,
    pub values: Vec<f64>,
}

/// Both directions of the connection to one neighbouring block.
#[derive(Debug)]
pub(crate) struct HaloLink {
    pub peer: BlockId,
    pub tx: Sender<HaloRow>,
    pub rx: Receiver<HaloRow>,
}

/// A block and the links on its two edges (`None` at the plate boundary).
#[derive(Debug)]
pub(crate) struct BlockLinks {
    pub spec: BlockSpec,
    pub north: Option<HaloLink>,
    pub south: Option<HaloLink>,
}

/// Everything one worker needs to talk to its neighbours.
#[derive(Debug)]
pub(crate) struct WorkerLinks {
    pub rank: usize,
    pub blocks: Vec<BlockLinks>,
}

impl WorkerLinks {
    fn new(rank: usize) -> Self {
        Self {
            rank,
            blocks: Vec::new(),
        }
    }
}

/// All endpoints of a run, split by who will hold them.
pub(crate) struct Wiring {
    pub coordinator: WorkerLinks,
    /// Ranks `1..P` with the sending half of their gather channel.
    pub workers: Vec<(WorkerLinks, Sender<BlockRows>)>,
    /// Receiving halves of the gather channels, in rank order.
    pub gather: Vec<(usize, Receiver<BlockRows>)>,
}

/// Create the channels for `plan`.
pub(crate) fn wire(plan: &PartitionPlan) -> Wiring {
    let specs = plan.blocks();
    let mut blocks: Vec<BlockLinks> = specs
        .iter()
        .map(|spec| BlockLinks {
            spec: spec.clone(),
            north: None,
            south: None,
        })
        .collect();

    for pos in 1..blocks.len() {
        let (upper, lower) = (&specs[pos - 1], &specs[pos]);
        debug_assert_eq!(upper.south.peer(), Some(lower.id));
        debug_assert_eq!(lower.north.peer(), Some(upper.id));

        let (down_tx, down_rx) = unbounded();
        let (up_tx, up_rx) = unbounded();
        blocks[pos - 1].south = Some(HaloLink {
            peer: lower.id,
            tx: down_tx,
            rx: up_rx,
        });
        blocks[pos].north = Some(HaloLink {
            peer: upper.id,
            tx: up_tx,
            rx: down_rx,
        });
    }

    let mut coordinator = WorkerLinks::new(COORDINATOR);
    let mut others: Vec<WorkerLinks> = (1..plan.workers()).map(WorkerLinks::new).collect();
    for block in blocks {
        match block.spec.owner {
            COORDINATOR => coordinator.blocks.push(block),
            owner => others[owner - 1].blocks.push(block),
        }
    }

    let mut workers = Vec::with_capacity(others.len());
    let mut gather = Vec::with_capacity(others.len());
    for links in others {
        let (tx, rx) = unbounded();
        gather.push((links.rank, rx));
        workers.push((links, tx));
    }

    Wiring {
        coordinator,
        workers,
        gather,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_hosts_remainder_link() {
        let plan = PartitionPlan::new(5, 2).unwrap();
        let wiring = wire(&plan);

        let ids: Vec<BlockId> = wiring.coordinator.blocks.iter().map(|b| b.spec.id).collect();
        assert_eq!(ids, vec![BlockId::Main(0), BlockId::Remainder]);
        assert_eq!(wiring.workers.len(), 1);
        assert_eq!(wiring.gather.len(), 1);
        assert_eq!(wiring.gather[0].0, 1);

        let (rank1, _) = &wiring.workers[0];
        let main1 = &rank1.blocks[0];
        let remainder = &wiring.coordinator.blocks[1];

        let south = main1.south.as_ref().unwrap();
        assert_eq!(south.peer, BlockId::Remainder);
        south
            .tx
            .send(HaloRow {
                iteration: 7,
                values: vec![1.0, 2.0],
            })
            .unwrap();

        let north = remainder.north.as_ref().unwrap();
        let got = north.rx.try_recv().unwrap();
        assert_eq!(got.iteration, 7);
        assert_eq!(got.values, vec![1.0, 2.0]);
        assert!(remainder.south.is_none());
    }

    #[test]
    fn test_edge_blocks_have_no_outer_links() {
        let plan = PartitionPlan::new(12, 5).unwrap();
        let wiring = wire(&plan);
        let top = &wiring.coordinator.blocks[0];
        assert!(top.north.is_none());
        assert!(top.south.is_some());

        let (last, _) = wiring.workers.last().unwrap();
        assert_eq!(last.rank, 4);
        assert!(last.blocks[0].north.is_some());
        assert!(last.blocks[0].south.is_none());
    }

    #[test]
    fn test_single_worker_has_no_channels() {
        let plan = PartitionPlan::new(6, 1).unwrap();
        let wiring = wire(&plan);
        assert!(wiring.workers.is_empty());
        assert!(wiring.gather.is_empty());
        let only = &wiring.coordinator.blocks[0];
        assert!(only.north.is_none() && only.south.is_none());
    }
}
