//! Vertex covariance and parent-track assembly for accepted candidates.

use nalgebra::{Const, DimMin, Matrix3, Matrix6, Vector3};

use crate::error::DcaFitResult;
use crate::fitter::config::MinimizationMode;
use crate::fitter::DcaFitter;
use crate::track::{ParentTrack, VertexTrack};

/// Position covariance of a track, with the synthesized z term.
fn track_position_cov<T: VertexTrack>(trc: &T, zerr_factor: f64) -> Matrix3<f64> {
    let mut m = Matrix3::zeros();
    m[(0, 0)] = trc.sigma2_x();
    m[(1, 1)] = trc.sigma2_y();
    m[(0, 1)] = trc.sigma_xy();
    m[(1, 0)] = trc.sigma_xy();
    m[(2, 2)] = trc.sigma2_y() * zerr_factor;
    m
}

impl<T: VertexTrack, const N: usize> DcaFitter<T, N>
where
    Const<N>: DimMin<Const<N>, Output = Const<N>>,
{
    /// Covariance of the fitted vertex at `rank`: the sum over prongs of
    /// each position covariance pushed through the prong's share of the
    /// vertex (its coefficient matrix in weighted mode, identity in
    /// absolute mode).
    pub fn vertex_covariance(&self, rank: usize) -> Option<Matrix3<f64>> {
        let hyp = self.slot(rank)?;
        let mut cov = Matrix3::zeros();
        for i in 0..N {
            let c = track_position_cov(&hyp.tracks[i], self.config().zerr_factor);
            match self.config().mode {
                MinimizationMode::Weighted => {
                    let m = hyp.coefs[i];
                    cov += m * c * m.transpose();
                }
                MinimizationMode::Absolute => cov += c,
            }
        }
        Some(cov)
    }

    /// Vertex covariance at `rank` in lower-triangular order
    /// (xx, yx, yy, zx, zy, zz).
    pub fn vertex_covariance_flat(&self, rank: usize) -> Option<[f64; 6]> {
        self.vertex_covariance(rank).map(|m| {
            [
                m[(0, 0)],
                m[(1, 0)],
                m[(1, 1)],
                m[(2, 0)],
                m[(2, 1)],
                m[(2, 2)],
            ]
        })
    }

    /// Parent track of the candidate at `rank`, without covariance:
    /// vertex position, summed prong momenta and summed charges.
    /// Requires the prongs to be propagated to the vertex.
    pub fn parent_track(&self, rank: usize) -> DcaFitResult<ParentTrack> {
        let (position, momentum, charge) = self.sum_prongs(rank)?;
        Ok(ParentTrack {
            position,
            momentum,
            charge,
            covariance: None,
        })
    }

    /// Parent track of the candidate at `rank`, with covariance: each
    /// prong contributes its momentum block, and the assembled vertex
    /// covariance replaces the position block. Requires the prongs to be
    /// propagated to the vertex.
    pub fn parent_track_with_cov(&self, rank: usize) -> DcaFitResult<ParentTrack> {
        let (position, momentum, charge) = self.sum_prongs(rank)?;
        let mut cov = Matrix6::zeros();
        for i in 0..N {
            let trc = self.track_at_vertex(i, rank)?;
            let pc = trc.position_momentum_covariance();
            for r in 3..6 {
                for c in 3..6 {
                    cov[(r, c)] += pc[(r, c)];
                }
            }
        }
        if let Some(vc) = self.vertex_covariance(rank) {
            for r in 0..3 {
                for c in 0..3 {
                    cov[(r, c)] = vc[(r, c)];
                }
            }
        }
        Ok(ParentTrack {
            position,
            momentum,
            charge,
            covariance: Some(cov),
        })
    }

    fn sum_prongs(&self, rank: usize) -> DcaFitResult<(Vector3<f64>, Vector3<f64>, i32)> {
        let hyp = self.require_slot(rank)?;
        let mut momentum = Vector3::zeros();
        let mut charge = 0;
        for i in 0..N {
            let trc = self.track_at_vertex(i, rank)?;
            momentum += trc.momentum();
            charge += trc.charge();
        }
        Ok((hyp.vertex, momentum, charge))
    }
}
