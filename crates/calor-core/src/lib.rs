//! # Calor Core
//!
//! The numerical backbone of the Calor heat solver: explicit Jacobi
//! iteration of the 2-D heat equation on a square plate with a fixed
//! boundary temperature.
//!
//! ## Architecture
//!
//! Solvers in `calor-compute` are built from the pieces here. The
//! [`partition::PartitionPlan`] splits the plate's interior rows into
//! blocks, each block keeps its state in a [`grid::LocalSubgrid`], and every
//! solver advances rows through the single [`stencil::update_row`] function.
//! Results leave through a [`snapshot::SnapshotSink`].
//!
//! ## Modules
//!
//! - [`types`]: Run parameters and their defaults.
//! - [`partition`]: Static row partitioning across workers.
//! - [`grid`]: Per-block buffer pair with ghost rows.
//! - [`stencil`]: Five-point Jacobi update.
//! - [`reference`]: Whole-grid single-process solver (correctness oracle).
//! - [`snapshot`]: Binary snapshot stream writer and reader.
//! - [`input`]: Plain-text initial-condition grid parser.
//! - [`heatmap`]: Colour palettes and PPM frames for replay.

pub mod grid;
pub mod heatmap;
pub mod input;
pub mod partition;
pub mod reference;
pub mod snapshot;
pub mod stencil;
pub mod types;

pub use grid::{GridError, LocalSubgrid, Side};
pub use partition::{BlockId, BlockSpec, Link, PartitionError, PartitionPlan, COORDINATOR};
pub use snapshot::{SnapshotError, SnapshotReader, SnapshotSink, SnapshotWriter};
pub use types::{ConfigError, HeatParams};
