//! Newton-Raphson minimization around one crossing seed.
//!
//! Corrections are computed as -dchi2/d{z_0..z_N} * [d2chi2/d{z_0..z_N}^2]^-1
//! and applied to the cached prong positions through their second-order
//! Taylor expansion; the working track copies themselves stay at the seed z
//! until the candidate is accepted and propagated.

use nalgebra::{Const, DimMin, SVector, Vector3};
use tracing::{debug, error, warn};

use crate::error::DcaFitResult;
use crate::fitter::candidate::Hypothesis;
use crate::fitter::config::FitterConfig;
use crate::fitter::residuals::{DcaKernel, DerivativeScratch};
use crate::fitter::seeds::Crossings;
use crate::fitter::weights::{vertex_coefficients, InverseTrackCov};
use crate::track::VertexTrack;

/// Terminal state of one seed's minimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeedOutcome {
    /// Candidate kept: the stop criteria were met or the iteration cap was
    /// reached with an acceptable chi-square.
    Accepted,
    /// Initial geometry failed the rough pre-cuts.
    RejectedGeometry,
    /// A required matrix inversion was singular.
    RejectedNumerics,
    /// Final chi-square at or above the acceptance ceiling.
    RejectedChi2,
    /// The iteration escaped toward the alternate crossing seed.
    DivergedToAlternate,
}

/// Propagate with the quadratic model when a field is present.
pub(crate) fn propagate_track<T: VertexTrack>(trc: &mut T, z: f64, cfg: &FitterConfig) {
    if cfg.bz != 0.0 {
        trc.propagate_to_z_quadratic(z, cfg.bz);
    } else {
        trc.propagate_to_z_linear(z);
    }
}

fn abs_max<const N: usize>(v: &SVector<f64, N>) -> f64 {
    v.iter().fold(0.0_f64, |m, x| m.max(x.abs()))
}

/// Rough cut on pairwise transverse-x spread at the seed point.
fn rough_dx_cut<T: VertexTrack, const N: usize>(hyp: &Hypothesis<T, N>, max_dx: f64) -> bool {
    for i in 0..N {
        for j in 0..i {
            if (hyp.positions[i].x - hyp.positions[j].x).abs() > max_dx {
                return false;
            }
        }
    }
    true
}

/// Whether the current vertex estimate sits strictly closer to the
/// alternate seed than to its own.
fn closer_to_alternative(vertex: &Vector3<f64>, cr: &Crossings, cur: usize, alt: usize) -> bool {
    let dx_cur = vertex.x - cr.x[cur];
    let dy_cur = vertex.y - cr.y[cur];
    let dx_alt = vertex.x - cr.x[alt];
    let dy_alt = vertex.y - cr.y[alt];
    dx_cur * dx_cur + dy_cur * dy_cur > dx_alt * dx_alt + dy_alt * dy_alt
}

/// Move the cached prong positions along their local expansions.
fn correct_positions<T: VertexTrack, const N: usize>(
    hyp: &mut Hypothesis<T, N>,
    corr: &SVector<f64, N>,
) {
    for i in 0..N {
        let dz = corr[i];
        let d = hyp.derivs[i];
        let dz2h = 0.5 * dz * dz;
        hyp.positions[i].x -= d.dxdz * dz - dz2h * d.d2xdz2;
        hyp.positions[i].y -= d.dydz * dz - dz2h * d.d2ydz2;
        hyp.positions[i].z -= dz;
    }
}

/// Run the full seeded -> iterating -> outcome machine for one candidate.
///
/// `hyp.vertex` must hold the seed position on entry. Only a malformed
/// input covariance escalates as an error; every other failure is a
/// candidate-local outcome.
pub(crate) fn minimize_seed<T, K, const N: usize>(
    cfg: &FitterConfig,
    input: &[T; N],
    crossings: &Crossings,
    cross_cur: usize,
    cross_alt: Option<usize>,
    hyp: &mut Hypothesis<T, N>,
    scratch: &mut DerivativeScratch<N>,
) -> DcaFitResult<SeedOutcome>
where
    T: VertexTrack,
    K: DcaKernel<N>,
    Const<N>: DimMin<Const<N>, Output = Const<N>>,
{
    let seed_z = hyp.vertex.z;
    for i in 0..N {
        hyp.tracks[i] = input[i].clone();
        propagate_track(&mut hyp.tracks[i], seed_z, cfg);
        hyp.positions[i] = hyp.tracks[i].position();
        if K::WEIGHTED {
            hyp.inv_covs[i] = InverseTrackCov::from_track(&hyp.tracks[i], cfg.zerr_factor)?;
        }
    }

    if cfg.max_start_dx > 0.0 && !rough_dx_cut(hyp, cfg.max_start_dx) {
        debug!("seed rejected: initial transverse spread above {}", cfg.max_start_dx);
        return Ok(SeedOutcome::RejectedGeometry);
    }

    if K::WEIGHTED && !vertex_coefficients(&hyp.inv_covs, &mut hyp.coefs) {
        warn!("global weight matrix is singular, abandoning candidate");
        return Ok(SeedOutcome::RejectedNumerics);
    }

    hyp.vertex = K::vertex(hyp);
    hyp.update_residuals();
    let mut chi2 = K::chi2(hyp);

    loop {
        for i in 0..N {
            hyp.derivs[i] = hyp.tracks[i].derivatives(cfg.bz);
        }
        K::residual_derivatives(hyp, scratch);
        K::chi2_derivatives(hyp, scratch);

        let hess_inv = match scratch.hessian.try_inverse() {
            Some(m) => m,
            None => {
                error!("chi2 Hessian inversion failed, abandoning candidate");
                return Ok(SeedOutcome::RejectedNumerics);
            }
        };
        let corr: SVector<f64, N> = hess_inv * scratch.grad;

        correct_positions(hyp, &corr);
        hyp.vertex = K::vertex(hyp);

        if let Some(alt) = cross_alt {
            if closer_to_alternative(&hyp.vertex, crossings, cross_cur, alt) {
                debug!("candidate drifted to the alternate seed, abandoning");
                return Ok(SeedOutcome::DivergedToAlternate);
            }
        }

        hyp.update_residuals();
        let chi2_new = K::chi2(hyp);
        hyp.iterations += 1;

        if abs_max(&corr) < cfg.min_param_change || chi2_new > chi2 * cfg.min_rel_chi2_change {
            chi2 = chi2_new;
            break;
        }
        chi2 = chi2_new;
        if hyp.iterations >= cfg.max_iterations {
            break;
        }
    }

    hyp.chi2 = chi2 / N as f64;
    if hyp.chi2 < cfg.max_chi2 {
        Ok(SeedOutcome::Accepted)
    } else {
        debug!(chi2 = hyp.chi2, "candidate rejected on chi2 ceiling");
        Ok(SeedOutcome::RejectedChi2)
    }
}
