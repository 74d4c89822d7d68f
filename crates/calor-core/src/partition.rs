//! Static row partitioning of the plate across workers.
//!
//! The `n - 2` interior rows are split into `workers` contiguous main blocks
//! of `floor((n - 2) / workers)` rows each. Rows left over by the division
//! form a single remainder block at the bottom of the plate, owned by the
//! coordinating worker (rank 0). The highest-ordinal worker's southern
//! neighbour is therefore hosted back on rank 0, closing the chain of ranks
//! into a ring.
//!
//! ```text
//!  row 0        boundary
//!  rows 1..     Main(0)      rank 0
//!               Main(1)      rank 1
//!               ...
//!               Main(P-1)    rank P-1
//!               Remainder    rank 0   (only if remainder > 0)
//!  row n-1      boundary
//! ```

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The worker that assembles and persists the global grid.
pub const COORDINATOR: usize = 0;

/// Configuration errors detected while planning a partition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("A {0}x{0} grid has no interior rows to partition")]
    NoInteriorRows(usize),

    #[error("At least one worker is required")]
    NoWorkers,

    #[error("{workers} workers cannot share {rows} interior rows: every worker needs at least one row")]
    TooManyWorkers { workers: usize, rows: usize },
}

/// Identifies a block of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockId {
    /// The main block of the worker with this ordinal.
    Main(usize),
    /// The left-over rows, owned by the coordinator.
    Remainder,
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Main(rank) => write!(f, "main block {}", rank),
            BlockId::Remainder => write!(f, "remainder block"),
        }
    }
}

/// What lies beyond one edge of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Link {
    /// The physical domain boundary: the ghost row holds the boundary constant.
    Boundary,
    /// Another block: the ghost row is refreshed by halo exchange every iteration.
    Block(BlockId),
}

impl Link {
    pub fn is_boundary(&self) -> bool {
        matches!(self, Link::Boundary)
    }

    pub fn peer(&self) -> Option<BlockId> {
        match self {
            Link::Boundary => None,
            Link::Block(id) => Some(*id),
        }
    }
}

/// One contiguous block of interior rows and its neighbours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub id: BlockId,
    /// Rank of the worker that owns the block.
    pub owner: usize,
    /// Global index of the block's first true row.
    pub first_row: usize,
    /// Number of true rows (ghost rows excluded).
    pub rows: usize,
    pub north: Link,
    pub south: Link,
}

impl BlockSpec {
    /// Global row indices covered by the block.
    pub fn global_rows(&self) -> Range<usize> {
        self.first_row..self.first_row + self.rows
    }

    /// The block touches the top edge of the plate.
    pub fn is_topmost(&self) -> bool {
        self.north.is_boundary()
    }

    /// The block touches the bottom edge of the plate.
    pub fn is_bottommost(&self) -> bool {
        self.south.is_boundary()
    }

    /// The link between the highest-ordinal worker and the remainder block,
    /// which wraps from the last rank back to the coordinator.
    pub fn has_ring_wrap(&self, workers: usize) -> bool {
        match self.id {
            BlockId::Remainder => !self.north.is_boundary(),
            BlockId::Main(rank) => {
                rank + 1 == workers && self.south == Link::Block(BlockId::Remainder)
            }
        }
    }
}

/// The row assignment for a given grid size and worker count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPlan {
    resolution: usize,
    workers: usize,
    rows_per_worker: usize,
    remainder: usize,
    /// Blocks in top-to-bottom order.
    blocks: Vec<BlockSpec>,
}

impl PartitionPlan {
    /// Plan the partition of an `resolution`×`resolution` grid across `workers`.
    pub fn new(resolution: usize, workers: usize) -> Result<Self, PartitionError> {
        if resolution < 3 {
            return Err(PartitionError::NoInteriorRows(resolution));
        }
        if workers == 0 {
            return Err(PartitionError::NoWorkers);
        }
        let interior = resolution - 2;
        if workers > interior {
            return Err(PartitionError::TooManyWorkers {
                workers,
                rows: interior,
            });
        }

        let rows_per_worker = interior / workers;
        let remainder = interior - rows_per_worker * workers;

        let mut ids: Vec<BlockId> = (0..workers).map(BlockId::Main).collect();
        if remainder > 0 {
            ids.push(BlockId::Remainder);
        }

        let mut blocks = Vec::with_capacity(ids.len());
        let mut cursor = 1;
        for (pos, &id) in ids.iter().enumerate() {
            let (owner, rows) = match id {
                BlockId::Main(rank) => (rank, rows_per_worker),
                BlockId::Remainder => (COORDINATOR, remainder),
            };
            let north = match pos {
                0 => Link::Boundary,
                _ => Link::Block(ids[pos - 1]),
            };
            let south = match ids.get(pos + 1) {
                Some(&next) => Link::Block(next),
                None => Link::Boundary,
            };
            blocks.push(BlockSpec {
                id,
                owner,
                first_row: cursor,
                rows,
                north,
                south,
            });
            cursor += rows;
        }

        Ok(Self {
            resolution,
            workers,
            rows_per_worker,
            remainder,
            blocks,
        })
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Rows in each main block: `floor((n - 2) / workers)`.
    pub fn rows_per_worker(&self) -> usize {
        self.rows_per_worker
    }

    /// Rows in the remainder block (0 when the division is exact).
    pub fn remainder(&self) -> usize {
        self.remainder
    }

    pub fn has_remainder(&self) -> bool {
        self.remainder > 0
    }

    /// All blocks in top-to-bottom order.
    pub fn blocks(&self) -> &[BlockSpec] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&BlockSpec> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Blocks owned by `rank`: its main block, followed by the remainder block
    /// for the coordinator.
    pub fn blocks_owned_by(&self, rank: usize) -> impl Iterator<Item = &BlockSpec> + '_ {
        self.blocks.iter().filter(move |b| b.owner == rank)
    }

    /// The block holding a global row, or `None` for the two boundary rows.
    pub fn block_of_row(&self, row: usize) -> Option<&BlockSpec> {
        self.blocks.iter().find(|b| b.global_rows().contains(&row))
    }
}
