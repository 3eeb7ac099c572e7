//! Solver backend selection and parameters.
//!
//! This module provides the `SolverOptions` struct, which selects the solve
//! backend of a matrix before it is created: the Krylov method (or direct LU),
//! the preconditioner, the relative tolerance, the iteration cap and the GMRES
//! restart length. Options can be built in code or parsed from PETSc-style
//! arguments such as `-ksp_type gmres -pc_type bjacobi -ksp_rtol 1e-8`.

use std::fmt;
use std::str::FromStr;

use crate::error::LssError;

/// Solve backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    /// Preconditioned Conjugate Gradient (SPD systems)
    Cg,
    /// BiConjugate Gradient Stabilized
    Bicgstab,
    /// Restarted GMRES, right preconditioned
    Gmres,
    /// Dense LU factorization, single partition only
    DirectLu,
}

impl SolverKind {
    pub fn name(&self) -> &'static str {
        match self {
            SolverKind::Cg => "cg",
            SolverKind::Bicgstab => "bicgstab",
            SolverKind::Gmres => "gmres",
            SolverKind::DirectLu => "lu",
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolverKind {
    type Err = LssError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cg" | "pcg" => Ok(SolverKind::Cg),
            "bicgstab" | "bcgs" => Ok(SolverKind::Bicgstab),
            "gmres" => Ok(SolverKind::Gmres),
            "lu" | "direct" | "preonly" => Ok(SolverKind::DirectLu),
            _ => Err(LssError::InvalidOption(format!("unknown solver type `{s}`"))),
        }
    }
}

/// Preconditioners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcKind {
    None,
    /// Scalar diagonal scaling.
    Jacobi,
    /// Exact inverse of each `neq×neq` diagonal block.
    BlockJacobi,
}

impl PcKind {
    pub fn name(&self) -> &'static str {
        match self {
            PcKind::None => "none",
            PcKind::Jacobi => "jacobi",
            PcKind::BlockJacobi => "bjacobi",
        }
    }
}

impl fmt::Display for PcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PcKind {
    type Err = LssError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(PcKind::None),
            "jacobi" => Ok(PcKind::Jacobi),
            "bjacobi" | "pbjacobi" | "block_jacobi" => Ok(PcKind::BlockJacobi),
            _ => Err(LssError::InvalidOption(format!("unknown preconditioner `{s}`"))),
        }
    }
}

/// Backend type & parameters.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    pub kind: SolverKind,
    pub pc: PcKind,
    /// Relative residual reduction required for convergence.
    pub rtol: f64,
    pub max_iters: usize,
    /// Krylov vectors kept between GMRES restarts.
    pub restart: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            kind: SolverKind::Gmres,
            pc: PcKind::BlockJacobi,
            rtol: 1e-8,
            max_iters: 1000,
            restart: 30,
        }
    }
}

impl SolverOptions {
    pub fn with_kind(mut self, kind: SolverKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_pc(mut self, pc: PcKind) -> Self {
        self.pc = pc;
        self
    }

    pub fn with_rtol(mut self, rtol: f64) -> Self {
        self.rtol = rtol;
        self
    }

    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn with_restart(mut self, restart: usize) -> Self {
        self.restart = restart;
        self
    }

    /// Parse `-key value` pairs on top of the defaults.
    ///
    /// Recognized keys: `-ksp_type`, `-pc_type`, `-ksp_rtol`, `-ksp_max_it`,
    /// `-ksp_gmres_restart`.
    pub fn from_args<I, S>(args: I) -> Result<Self, LssError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut opts = Self::default();
        let mut args = args.into_iter();
        while let Some(key) = args.next() {
            let key = key.as_ref();
            let value = args
                .next()
                .ok_or_else(|| LssError::InvalidOption(format!("missing value for `{key}`")))?;
            let value = value.as_ref();
            match key {
                "-ksp_type" => opts.kind = value.parse()?,
                "-pc_type" => opts.pc = value.parse()?,
                "-ksp_rtol" => opts.rtol = parse_number(key, value)?,
                "-ksp_max_it" => opts.max_iters = parse_number(key, value)?,
                "-ksp_gmres_restart" => opts.restart = parse_number(key, value)?,
                _ => return Err(LssError::InvalidOption(format!("unknown option `{key}`"))),
            }
        }
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<(), LssError> {
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            return Err(LssError::InvalidOption(format!("rtol must be positive, got {}", self.rtol)));
        }
        if self.max_iters == 0 {
            return Err(LssError::InvalidOption("max_iters must be positive".into()));
        }
        if self.restart == 0 {
            return Err(LssError::InvalidOption("restart must be positive".into()));
        }
        Ok(())
    }
}

fn parse_number<N: FromStr>(key: &str, value: &str) -> Result<N, LssError> {
    value
        .parse()
        .map_err(|_| LssError::InvalidOption(format!("bad value `{value}` for `{key}`")))
}
