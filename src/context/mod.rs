//! Context module: turns solver options into a configured solve.
//!
//! - [`ksp_context`]: the `KspContext` dispatcher over the Krylov and direct backends.
//!
//! # Example
//! ```rust,ignore
//! use lssys::{KspContext, SolverKind, SolverOptions};
//! let ksp = KspContext::new(SolverOptions::default().with_kind(SolverKind::Cg));
//! let stats = ksp.solve(&a, &b, &mut x)?;
//! ```

pub mod ksp_context;
pub use ksp_context::KspContext;
