//! Configuration of solve backends.

pub mod options;
pub use options::{PcKind, SolverKind, SolverOptions};
