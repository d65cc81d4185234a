//! Candidate-vertex bookkeeping.
//!
//! Each crossing seed that enters minimization owns one [`Hypothesis`]
//! slot holding the per-prong working state and the fit outcome. At most
//! [`MAX_HYP`] slots are live at a time; accepted slots are ranked by
//! ascending chi-square.

use nalgebra::{Matrix3, Vector3};

use crate::fitter::weights::InverseTrackCov;
use crate::track::{TrackDerivatives, VertexTrack};

/// Maximum number of concurrently tracked candidate vertices.
pub(crate) const MAX_HYP: usize = 2;

/// Working state and outcome of one candidate vertex.
#[derive(Debug, Clone)]
pub(crate) struct Hypothesis<T, const N: usize> {
    /// Working copies of the prongs, propagated to the seed z.
    pub tracks: [T; N],
    /// Augmented inverse covariances at the seed point (weighted mode).
    pub inv_covs: [InverseTrackCov; N],
    /// Per-prong share of the weighted vertex; identity until computed.
    pub coefs: [Matrix3<f64>; N],
    /// Transverse derivatives of each prong over its z parameter.
    pub derivs: [TrackDerivatives; N],
    /// Cached prong positions, moved by the Newton corrections.
    pub positions: [Vector3<f64>; N],
    /// Residuals of each prong to the current vertex estimate.
    pub residuals: [Vector3<f64>; N],
    /// Current vertex estimate.
    pub vertex: Vector3<f64>,
    /// Chi-square per prong; meaningful once the slot is accepted.
    pub chi2: f64,
    /// Newton passes spent on this candidate.
    pub iterations: usize,
    /// Whether the prong copies were propagated to the fitted vertex.
    pub propagated: bool,
}

impl<T: VertexTrack, const N: usize> Hypothesis<T, N> {
    /// Fresh slot seeded at `seed`, with prong copies taken from `input`.
    pub fn seeded(input: &[T; N], seed: Vector3<f64>) -> Self {
        Self {
            tracks: input.clone(),
            inv_covs: [InverseTrackCov::default(); N],
            coefs: [Matrix3::identity(); N],
            derivs: [TrackDerivatives::default(); N],
            positions: [Vector3::zeros(); N],
            residuals: [Vector3::zeros(); N],
            vertex: seed,
            chi2: -1.0,
            iterations: 0,
            propagated: false,
        }
    }

    /// Recompute residuals res_i = P_i - V against the current vertex.
    pub fn update_residuals(&mut self) {
        for (res, pos) in self.residuals.iter_mut().zip(self.positions.iter()) {
            *res = pos - self.vertex;
        }
    }
}

/// Stable ranking of the live slots by ascending chi-square.
pub(crate) fn rank_by_chi2(chi2s: &[f64], order: &mut [usize]) {
    order.sort_by(|&a, &b| {
        chi2s[a]
            .partial_cmp(&chi2s[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
