//! Error types for the dcafit library.
//!
//! All errors use the `thiserror` crate for automatic trait implementations.
//! Candidate-level numerical failures (singular weight matrix, singular
//! Hessian) are not errors: they discard the affected candidate and are
//! reported through the candidate count. Only malformed input reaches the
//! caller as an `Err`.

use thiserror::Error;

/// Result type used throughout the dcafit library.
pub type DcaFitResult<T> = Result<T, DcaFitError>;

/// Main error type for the dcafit library.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DcaFitError {
    /// A track planar covariance block is not positive definite.
    /// Continuing the fit would produce meaningless numbers, so the whole
    /// `process` call is aborted.
    #[error("invalid track covariance: planar determinant {det:.3e} is not positive")]
    InvalidCovariance { det: f64 },

    /// A candidate rank outside the number of live candidates was queried
    /// through a `Result`-returning accessor.
    #[error("candidate {rank} is not available ({count} candidate(s) live)")]
    InvalidCandidate { rank: usize, count: usize },

    /// Per-prong tracks at the vertex were queried before propagation.
    #[error("tracks were not propagated to the vertex yet; call propagate_to_vertex first")]
    NotPropagated,

    /// A result query was made before any successful `process` call, or
    /// after a call that failed and cleared the fitter state.
    #[error("no input tracks are attached to the fitter")]
    NoInput,
}
