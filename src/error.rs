use thiserror::Error;

// Unified error type for lssys

#[derive(Error, Debug)]
pub enum LssError {
    #[error("index out of range: {0}")]
    IndexOutOfRange(String),
    #[error("{0} has not been created")]
    NotCreated(&'static str),
    #[error("{0} has already been created")]
    AlreadyCreated(&'static str),
    #[error("invalid collection type: expected {expected}, found {found}")]
    InvalidCollectionType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("solver backend `{backend}` failed: {reason}")]
    BackendSolveFailure { backend: String, reason: String },
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("partition mismatch: {0}")]
    PartitionMismatch(String),
    #[error("communication error: {0}")]
    Comm(String),
    #[error("invalid connectivity: {0}")]
    InvalidConnectivity(String),
    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error("factorization error: {0}")]
    FactorError(String),
    #[error("indefinite matrix detected (p^T A p <= 0)")]
    IndefiniteMatrix,
    #[error("zero pivot at row {0}")]
    ZeroPivot(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
