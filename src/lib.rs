//! # dcafit
//!
//! N-prong secondary-vertex fitting for forward (z-parametrized) tracks.
//!
//! Given N trajectories assumed to share a common origin, the fitter
//! locates the point of closest approach (PCA) that best represents their
//! decay vertex, together with its covariance and a combined parent
//! track. Candidate vertices are seeded from the transverse crossing
//! geometry of the first two prongs and refined by Newton-Raphson
//! iteration with analytic first and second derivatives.
//!
//! ## Features
//!
//! - **Two minimization modes**: covariance-weighted chi-square and
//!   unweighted absolute distance, sharing one solver core
//! - **Multi-candidate bookkeeping**: ambiguous crossings yield up to two
//!   hypotheses, merged when close and ranked by chi-square
//! - **Trait-based track interface**: the trajectory model is supplied by
//!   the caller through [`VertexTrack`], never implemented here
//! - **Batch parallelism**: independent prong sets fan out across a rayon
//!   pool with one fitter per worker
//!
//! ## Outcome model
//!
//! `process` returns the number of surviving candidates (0 to 2). A
//! geometric miss or a numerically abandoned candidate is a normal
//! zero-or-fewer-candidates outcome, not an error; only a malformed input
//! covariance fails the call.

pub mod batch;
pub mod error;
pub mod fitter;
pub mod logger;
pub mod track;

pub use error::{DcaFitError, DcaFitResult};
pub use fitter::config::{FitterConfig, MinimizationMode};
pub use fitter::{DcaFitter, DcaFitter2, DcaFitter3};
pub use logger::{init_logger, init_logger_with_level};
pub use track::{ParentTrack, TrackDerivatives, VertexTrack};
