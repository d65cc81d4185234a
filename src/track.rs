//! Track-side interface consumed by the vertex fitter.
//!
//! The fitter never implements a trajectory model of its own: every prong
//! is supplied by the caller as a type implementing [`VertexTrack`], which
//! exposes the forward-track parametrization (position and covariance as a
//! function of the longitudinal coordinate z) and in-place propagation.
//!
//! Propagation is assumed geometrically valid: a forward track can always
//! be transported to any z, so the propagation methods have no failure
//! path.

use nalgebra::{Matrix6, Vector3};

/// First and second derivatives of the transverse position of a track with
/// respect to its longitudinal coordinate z, evaluated at the track's
/// current reference point.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackDerivatives {
    pub dxdz: f64,
    pub dydz: f64,
    pub d2xdz2: f64,
    pub d2ydz2: f64,
}

/// Trajectory capability consumed by the fitter, one instance per prong.
///
/// Implementations are cloned into the fitter's hypothesis slots at the
/// start of each fit; the caller-owned originals are only borrowed for the
/// duration of the `process` call.
///
/// Units follow the track model: lengths and covariances in the same
/// length unit, momenta in the model's momentum unit, the magnetic field
/// in whatever unit the model's curvature expects.
pub trait VertexTrack: Clone {
    /// Transverse x position at the current reference z.
    fn x(&self) -> f64;
    /// Transverse y position at the current reference z.
    fn y(&self) -> f64;
    /// Current reference z.
    fn z(&self) -> f64;
    /// Electric charge sign.
    fn charge(&self) -> i32;

    /// Variance of the x coordinate at the current reference z.
    fn sigma2_x(&self) -> f64;
    /// Variance of the y coordinate at the current reference z.
    fn sigma2_y(&self) -> f64;
    /// x-y covariance at the current reference z.
    fn sigma_xy(&self) -> f64;

    /// Momentum vector (px, py, pz) at the current reference z.
    fn momentum(&self) -> Vector3<f64>;

    /// Full 6x6 covariance of (x, y, z, px, py, pz) at the current
    /// reference z.
    fn position_momentum_covariance(&self) -> Matrix6<f64>;

    /// Local transverse derivatives with respect to z for the given
    /// magnetic field.
    fn derivatives(&self, bz: f64) -> TrackDerivatives;

    /// Propagate in place to `z` with the linear (straight-line) model.
    fn propagate_to_z_linear(&mut self, z: f64);

    /// Propagate in place to `z` with the quadratic (curved) model.
    fn propagate_to_z_quadratic(&mut self, z: f64, bz: f64);

    /// Position 3-vector at the current reference z.
    fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x(), self.y(), self.z())
    }
}

/// Combined track built from all prongs of a fitted vertex.
///
/// The position is the fitted vertex; momentum and charge are the sums
/// over the prongs. When assembled with errors, `covariance` carries each
/// prong's momentum block and the fitted vertex covariance in the
/// position block (cross terms are not propagated).
#[derive(Debug, Clone)]
pub struct ParentTrack {
    pub position: Vector3<f64>,
    pub momentum: Vector3<f64>,
    pub charge: i32,
    pub covariance: Option<Matrix6<f64>>,
}
