//! Residual derivatives and chi-square assembly for both minimization
//! modes.
//!
//! The two modes share the whole Newton loop and differ only in how the
//! vertex, the chi-square and the derivatives are computed; each is a
//! zero-size strategy type implementing [`DcaKernel`], selected once per
//! `process` call.
//!
//! # Derivative structure
//!
//! With res_i = P_i - V and V = sum_j T_j P_j, moving prong j along its z
//! parameter shifts both its own position and the weighted vertex:
//!
//! ```text
//! d res_i / d z_j = delta_ij * v_i - T_j * v_j,   v = (dx/dz, dy/dz, 1)
//! ```
//!
//! Second derivatives follow the same shape with w = (d2x/dz2, d2y/dz2, 0);
//! cross second derivatives between different prongs vanish, so the
//! residual Hessian is diagonal in the prong index. In absolute mode every
//! T_j degenerates to I/N and no matrix inversion is involved.

use nalgebra::{SMatrix, SVector, Vector3};

use crate::fitter::candidate::Hypothesis;
use crate::track::{TrackDerivatives, VertexTrack};

#[inline]
fn slope_vec(d: &TrackDerivatives) -> Vector3<f64> {
    Vector3::new(d.dxdz, d.dydz, 1.0)
}

#[inline]
fn curvature_vec(d: &TrackDerivatives) -> Vector3<f64> {
    Vector3::new(d.d2xdz2, d.d2ydz2, 0.0)
}

/// Per-pass derivative workspace, reused across iterations.
#[derive(Debug, Clone)]
pub(crate) struct DerivativeScratch<const N: usize> {
    /// dres[i][j] = d res_i / d z_j.
    pub dres: [[Vector3<f64>; N]; N],
    /// d2res[i][j] = d2 res_i / d z_j^2.
    pub d2res: [[Vector3<f64>; N]; N],
    /// First derivatives of chi-square over the prong z parameters.
    pub grad: SVector<f64, N>,
    /// Second derivatives of chi-square (symmetric).
    pub hessian: SMatrix<f64, N, N>,
}

impl<const N: usize> DerivativeScratch<N> {
    pub fn new() -> Self {
        Self {
            dres: [[Vector3::zeros(); N]; N],
            d2res: [[Vector3::zeros(); N]; N],
            grad: SVector::zeros(),
            hessian: SMatrix::zeros(),
        }
    }
}

/// Mode-specific pieces of the Newton iteration.
pub(crate) trait DcaKernel<const N: usize> {
    /// Whether inverse covariances and coefficient matrices are in play.
    const WEIGHTED: bool;

    /// Vertex estimate from the cached prong positions.
    fn vertex<T: VertexTrack>(hyp: &Hypothesis<T, N>) -> Vector3<f64>;

    /// Distance figure minimized by this mode (summed over prongs).
    fn chi2<T: VertexTrack>(hyp: &Hypothesis<T, N>) -> f64;

    /// Fill the residual first/second derivative tables.
    fn residual_derivatives<T: VertexTrack>(
        hyp: &Hypothesis<T, N>,
        scratch: &mut DerivativeScratch<N>,
    );

    /// Assemble the chi-square gradient and Hessian from the residual
    /// derivative tables.
    fn chi2_derivatives<T: VertexTrack>(
        hyp: &Hypothesis<T, N>,
        scratch: &mut DerivativeScratch<N>,
    );
}

/// Covariance-weighted chi-square minimization.
pub(crate) struct Weighted;

impl<const N: usize> DcaKernel<N> for Weighted {
    const WEIGHTED: bool = true;

    fn vertex<T: VertexTrack>(hyp: &Hypothesis<T, N>) -> Vector3<f64> {
        let mut v = Vector3::zeros();
        for (coef, pos) in hyp.coefs.iter().zip(hyp.positions.iter()) {
            v += coef * pos;
        }
        v
    }

    fn chi2<T: VertexTrack>(hyp: &Hypothesis<T, N>) -> f64 {
        let mut chi2 = 0.0;
        for (res, cov) in hyp.residuals.iter().zip(hyp.inv_covs.iter()) {
            chi2 += res.dot(&cov.apply(res));
        }
        chi2
    }

    fn residual_derivatives<T: VertexTrack>(
        hyp: &Hypothesis<T, N>,
        scratch: &mut DerivativeScratch<N>,
    ) {
        for i in 0..N {
            for j in 0..N {
                let v = slope_vec(&hyp.derivs[j]);
                let w = curvature_vec(&hyp.derivs[j]);
                let mut dr1 = -(hyp.coefs[j] * v);
                let mut dr2 = -(hyp.coefs[j] * w);
                if i == j {
                    dr1 += v;
                    dr2 += w;
                }
                scratch.dres[i][j] = dr1;
                scratch.d2res[i][j] = dr2;
            }
        }
    }

    fn chi2_derivatives<T: VertexTrack>(
        hyp: &Hypothesis<T, N>,
        scratch: &mut DerivativeScratch<N>,
    ) {
        // covi_dr[i][j] = E_j * dres_j/dz_i, kept for the Hessian pass
        let mut covi_dr = [[Vector3::zeros(); N]; N];
        for i in 0..N {
            let mut g = 0.0;
            for j in 0..N {
                let cidr = hyp.inv_covs[j].apply(&scratch.dres[j][i]);
                g += hyp.residuals[j].dot(&cidr);
                covi_dr[i][j] = cidr;
            }
            scratch.grad[i] = g;
        }
        for i in 0..N {
            for j in 0..=i {
                let mut h = 0.0;
                for k in 0..N {
                    h += scratch.dres[k][j].dot(&covi_dr[i][k]);
                    if k == j {
                        let c2 = hyp.inv_covs[k].apply(&scratch.d2res[k][j]);
                        h += hyp.residuals[k].dot(&c2);
                    }
                }
                scratch.hessian[(i, j)] = h;
                scratch.hessian[(j, i)] = h;
            }
        }
    }
}

/// Unweighted absolute-distance minimization.
pub(crate) struct Absolute;

impl<const N: usize> DcaKernel<N> for Absolute {
    const WEIGHTED: bool = false;

    fn vertex<T: VertexTrack>(hyp: &Hypothesis<T, N>) -> Vector3<f64> {
        let mut v = Vector3::zeros();
        for pos in hyp.positions.iter() {
            v += pos;
        }
        v / N as f64
    }

    fn chi2<T: VertexTrack>(hyp: &Hypothesis<T, N>) -> f64 {
        hyp.residuals.iter().map(|r| r.norm_squared()).sum()
    }

    fn residual_derivatives<T: VertexTrack>(
        hyp: &Hypothesis<T, N>,
        scratch: &mut DerivativeScratch<N>,
    ) {
        let n_inv = 1.0 / N as f64;
        let n_inv1 = 1.0 - n_inv;
        for i in 0..N {
            let vi = slope_vec(&hyp.derivs[i]);
            let wi = curvature_vec(&hyp.derivs[i]);
            scratch.dres[i][i] = n_inv1 * vi;
            scratch.d2res[i][i] = n_inv1 * wi;
            for j in 0..i {
                let vj = slope_vec(&hyp.derivs[j]);
                let wj = curvature_vec(&hyp.derivs[j]);
                scratch.dres[i][j] = -n_inv * vj;
                scratch.dres[j][i] = -n_inv * vi;
                scratch.d2res[i][j] = -n_inv * wj;
                scratch.d2res[j][i] = -n_inv * wi;
            }
        }
    }

    fn chi2_derivatives<T: VertexTrack>(
        hyp: &Hypothesis<T, N>,
        scratch: &mut DerivativeScratch<N>,
    ) {
        for i in 0..N {
            let mut g = 0.0;
            for j in 0..N {
                g += hyp.residuals[j].dot(&scratch.dres[j][i]);
            }
            scratch.grad[i] = g;
            for j in 0..=i {
                let mut h = hyp.residuals[i].dot(&scratch.d2res[i][j]);
                for k in 0..N {
                    h += scratch.dres[k][i].dot(&scratch.dres[k][j]);
                }
                scratch.hessian[(i, j)] = h;
                scratch.hessian[(j, i)] = h;
            }
        }
    }
}
