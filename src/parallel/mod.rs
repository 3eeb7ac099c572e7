//! Process-level communication and the ownership/ghost abstraction.
//!
//! [`Comm`] is the raw collective layer (serial, or MPI behind the `mpi`
//! feature). [`CommPattern`] is what the matrix layer actually depends on: it
//! tells whether a local block index is owned by this process or is a ghost
//! of another one, and refreshes ghost values from their owners.

pub mod pattern;
pub use pattern::{CommPattern, Ownership, PartitionedPattern, SerialPattern};

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);
    /// Sum of `x` over all processes.
    fn all_reduce(&self, x: f64) -> f64;
    /// Element-wise sum of `buf` over all processes, result in place on every process.
    fn all_reduce_sum(&self, buf: &mut [f64]);
}

/// Single-process communicator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialComm;

impl Comm for SerialComm {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn barrier(&self) {}
    fn all_reduce(&self, x: f64) -> f64 {
        x
    }
    fn all_reduce_sum(&self, _buf: &mut [f64]) {}
}
