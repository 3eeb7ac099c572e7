//! lssys: distributed block-sparse linear systems with a PETSc-style KSP/PC backend over Faer
//!
//! The crate assembles the linear systems of a node-based PDE discretization:
//! a block-sparse matrix with one dense `neq×neq` block per coupled node pair,
//! right-hand side and solution vectors partitioned the same way, element
//! batches through [`BlockAccumulator`], Dirichlet and periodic boundary
//! treatment, and a solve dispatched to preconditioned Krylov or direct
//! backends. A [`UnifiedIndexSpace`] gives one contiguous index range over
//! several same-typed collections.

pub mod parallel;

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod index;
pub mod matrix;
pub mod preconditioner;
pub mod solver;
pub mod system;
pub mod utils;

// Re-exports for convenience
pub use crate::core::{BlockDiagonal, Indexing, InnerProduct, MatVec, ToDense};
pub use config::{PcKind, SolverKind, SolverOptions};
pub use context::KspContext;
pub use error::LssError;
pub use index::{CollectionLink, Handle, IndexedCollection, UnifiedIndexSpace};
pub use matrix::{
    BlockAccumulator, BlockSparsity, DistributedMatrix, DistributedOperator, DistributedVector, RowConstraint,
};
pub use parallel::{Comm, CommPattern, Ownership, PartitionedPattern, SerialComm, SerialPattern};
pub use preconditioner::{BlockJacobi, Jacobi, Preconditioner};
pub use solver::{BiCgStabSolver, GmresSolver, LinearSolver, LuSolver, PcgSolver};
pub use system::LinearSystem;

// Re-export SolveStats at the crate root for convenience
pub use utils::convergence::SolveStats;
