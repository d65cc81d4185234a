//! Parallel fitting of independent prong sets.
//!
//! A [`DcaFitter`](crate::fitter::DcaFitter) is mutable scratch state and
//! must not be shared between threads; the batch entry point instead gives
//! every rayon worker its own fitter and fans the input sets across the
//! pool. There is no shared mutable state and no locking.

use nalgebra::{Const, DimMin, Vector3};
use rayon::prelude::*;

use crate::error::DcaFitResult;
use crate::fitter::config::FitterConfig;
use crate::fitter::DcaFitter;
use crate::track::VertexTrack;

/// Best-candidate summary of one fit in a batch.
#[derive(Debug, Clone)]
pub struct FitSummary {
    /// Live candidates found for this set (1 or 2).
    pub n_candidates: usize,
    /// Vertex of the best candidate.
    pub vertex: Vector3<f64>,
    /// Chi-square per prong of the best candidate.
    pub chi2: f64,
    /// Newton passes spent on the best candidate.
    pub iterations: usize,
}

/// Fit every prong set with a per-worker fitter, preserving input order.
///
/// Sets without a viable candidate yield `Ok(None)`; a malformed input
/// covariance yields `Err` for its own set only.
pub fn process_batch<T, const N: usize>(
    config: &FitterConfig,
    sets: &[[T; N]],
) -> Vec<DcaFitResult<Option<FitSummary>>>
where
    T: VertexTrack + Send + Sync,
    Const<N>: DimMin<Const<N>, Output = Const<N>>,
{
    sets.par_iter()
        .map_init(
            || DcaFitter::<T, N>::new(config.clone()),
            |fitter, set| -> DcaFitResult<Option<FitSummary>> {
                let n = fitter.process(set)?;
                let summary = match (fitter.vertex(0), fitter.chi2(0), fitter.iterations(0)) {
                    (Some(vertex), Some(chi2), Some(iterations)) => Some(FitSummary {
                        n_candidates: n,
                        vertex,
                        chi2,
                        iterations,
                    }),
                    _ => None,
                };
                Ok(summary)
            },
        )
        .collect()
}
