//! Core traits and their implementations for plain dense operators.

pub mod traits;
pub mod wrappers;

pub use traits::{BlockDiagonal, Indexing, InnerProduct, MatVec, ToDense};
