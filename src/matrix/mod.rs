//! Block-sparse matrix, distributed vectors and element accumulation.

pub mod accumulator;
pub mod block;
pub mod operator;
pub mod sparsity;
pub mod vector;

pub use accumulator::BlockAccumulator;
pub use block::{DistributedMatrix, RowConstraint};
pub use operator::DistributedOperator;
pub use sparsity::BlockSparsity;
pub use vector::DistributedVector;
