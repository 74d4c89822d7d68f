//! # Calor Compute
//!
//! Execution backends for the Calor heat solver. This crate provides a
//! [`HeatBackend`](backend::HeatBackend) trait that isolates how the Jacobi
//! iterations are scheduled from how their results are consumed.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Notes |
//! |---------|-------------|-------|
//! | Sequential | always | Whole-grid reference solver |
//! | Shared memory (Rayon) | `cpu` (default) | Row-parallel update of one grid |
//! | Distributed (channels) | `distributed` (default) | Row blocks, halo exchange, gather |

pub mod backend;
pub mod sequential;

#[cfg(feature = "cpu")]
pub mod cpu;

#[cfg(feature = "distributed")]
pub mod distributed;

pub use backend::{BackendType, ComputeError, DeviceInfo, HeatBackend, RunReport};
pub use sequential::SequentialBackend;

#[cfg(feature = "cpu")]
pub use cpu::SharedBackend;

#[cfg(feature = "distributed")]
pub use distributed::DistributedBackend;
