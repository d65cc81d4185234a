//! Per-prong inverse covariances and their aggregation into the global
//! vertex weight.
//!
//! In weighted mode the vertex decomposes as V = sum_i T_i * P_i where
//! T_i = W^-1 * E_i, E_i is prong i's augmented 3x3 inverse covariance and
//! W = sum_j E_j. The z row of E_i is synthesized from the scaled y
//! variance since the planar track covariance carries no native z term.

use nalgebra::{Matrix3, Vector3};

use crate::error::{DcaFitError, DcaFitResult};
use crate::track::VertexTrack;

/// Inverse covariance of the point defined by a track, augmented by the
/// synthesized z error.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct InverseTrackCov {
    pub sxx: f64,
    pub syy: f64,
    pub sxy: f64,
    pub szz: f64,
}

impl InverseTrackCov {
    /// Invert the planar 2x2 block analytically and attach the synthesized
    /// z term. A non-positive planar determinant means the input track is
    /// malformed and fails the whole fit.
    pub fn from_track<T: VertexTrack>(trc: &T, zerr_factor: f64) -> DcaFitResult<Self> {
        let cxx = trc.sigma2_x();
        let cyy = trc.sigma2_y();
        let cxy = trc.sigma_xy();
        let czz = cyy * zerr_factor;
        let det = cxx * cyy - cxy * cxy;
        if det <= 0.0 {
            return Err(DcaFitError::InvalidCovariance { det });
        }
        let det_inv = 1.0 / det;
        Ok(Self {
            sxx: cyy * det_inv,
            syy: cxx * det_inv,
            sxy: -cxy * det_inv,
            szz: 1.0 / czz,
        })
    }

    /// Augmented 3x3 matrix form.
    pub fn to_matrix(self) -> Matrix3<f64> {
        Matrix3::new(
            self.sxx, self.sxy, 0.0, //
            self.sxy, self.syy, 0.0, //
            0.0, 0.0, self.szz,
        )
    }

    /// Apply the augmented inverse covariance to a residual vector.
    pub fn apply(&self, v: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(
            self.sxx * v.x + self.sxy * v.y,
            self.sxy * v.x + self.syy * v.y,
            self.szz * v.z,
        )
    }
}

/// Invert the summed weight W = sum_i E_i. `None` when the sum is
/// singular, which abandons the candidate but not the fit.
pub(crate) fn inverse_weight<const N: usize>(covs: &[InverseTrackCov; N]) -> Option<Matrix3<f64>> {
    let mut w = Matrix3::zeros();
    for cov in covs {
        w[(0, 0)] += cov.sxx;
        w[(0, 1)] += cov.sxy;
        w[(1, 0)] += cov.sxy;
        w[(1, 1)] += cov.syy;
        w[(2, 2)] += cov.szz;
    }
    w.try_inverse()
}

/// Compute every prong's share T_i = W^-1 * E_i of the weighted vertex.
pub(crate) fn vertex_coefficients<const N: usize>(
    covs: &[InverseTrackCov; N],
    coefs: &mut [Matrix3<f64>; N],
) -> bool {
    let weight_inv = match inverse_weight(covs) {
        Some(w) => w,
        None => return false,
    };
    for (coef, cov) in coefs.iter_mut().zip(covs.iter()) {
        *coef = weight_inv * cov.to_matrix();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitter::tests::StubTrack;

    #[test]
    fn test_planar_inversion() {
        let trc = StubTrack::with_cov(0.04, 0.09, 0.01);
        let inv = InverseTrackCov::from_track(&trc, 5.0).unwrap();
        // multiply the planar blocks back together
        let xx = 0.04 * inv.sxx + 0.01 * inv.sxy;
        let xy = 0.04 * inv.sxy + 0.01 * inv.syy;
        let yy = 0.01 * inv.sxy + 0.09 * inv.syy;
        assert!((xx - 1.0).abs() < 1e-12);
        assert!(xy.abs() < 1e-12);
        assert!((yy - 1.0).abs() < 1e-12);
        assert!((inv.szz - 1.0 / (0.09 * 5.0)).abs() < 1e-12);
    }

    #[test]
    fn test_non_positive_definite_rejected() {
        let trc = StubTrack::with_cov(0.01, 0.01, 0.02);
        let err = InverseTrackCov::from_track(&trc, 5.0).unwrap_err();
        assert!(matches!(err, DcaFitError::InvalidCovariance { .. }));
    }

    #[test]
    fn test_coefficients_sum_to_identity() {
        // T_1 + T_2 = W^-1 (E_1 + E_2) = I whatever the inputs
        let covs = [
            InverseTrackCov::from_track(&StubTrack::with_cov(0.04, 0.09, 0.01), 5.0).unwrap(),
            InverseTrackCov::from_track(&StubTrack::with_cov(0.25, 0.16, -0.05), 5.0).unwrap(),
        ];
        let mut coefs = [Matrix3::zeros(); 2];
        assert!(vertex_coefficients(&covs, &mut coefs));
        let sum = coefs[0] + coefs[1];
        assert!((sum - Matrix3::identity()).norm() < 1e-10);
    }

    #[test]
    fn test_equal_weights_halve() {
        let covs = [
            InverseTrackCov::from_track(&StubTrack::with_cov(1.0, 1.0, 0.0), 1.0).unwrap(),
            InverseTrackCov::from_track(&StubTrack::with_cov(1.0, 1.0, 0.0), 1.0).unwrap(),
        ];
        let mut coefs = [Matrix3::zeros(); 2];
        assert!(vertex_coefficients(&covs, &mut coefs));
        assert!((coefs[0] - Matrix3::identity() * 0.5).norm() < 1e-12);
    }
}
