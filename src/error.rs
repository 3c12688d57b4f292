//! Error type shared by all modules of the crate.

/// Errors reported by set operations, region growing and graph solves.
///
/// Every failure surfaces to the immediate caller; no operation degrades
/// silently into an empty or partial answer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input: mismatched matrix shapes, negative radii, a seed
    /// point inside an obstacle, unknown graph ids and the like.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation is not supported by this set variant.
    #[error("{0}")]
    NotImplemented(String),
    /// The delegated convex or mixed-integer solve reported infeasibility,
    /// unboundedness or a numerical failure.
    #[error("solver failure: {0}")]
    SolverFailure(String),
    /// Operands of a combinator or an operation disagree in ambient
    /// dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected : usize, actual : usize },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T,Error>;

impl Error {
    pub(crate) fn invalid<S : Into<String>>(msg : S) -> Error { Error::InvalidArgument(msg.into()) }
    pub(crate) fn solver<S : Into<String>>(msg : S) -> Error { Error::SolverFailure(msg.into()) }
    pub(crate) fn not_implemented<S : Into<String>>(msg : S) -> Error { Error::NotImplemented(msg.into()) }
}

/// Fail with [Error::DimensionMismatch] unless `actual == expected`.
pub(crate) fn check_dimension(expected : usize, actual : usize) -> Result<()> {
    if expected != actual {
        Err(Error::DimensionMismatch { expected, actual })
    }
    else {
        Ok(())
    }
}
