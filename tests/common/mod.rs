//! Shared utilities for the fitter integration tests.
//!
//! `TestTrack` is a self-contained forward-track model in the usual
//! (x, y, phi, tanl, q/pt) parametrization at a reference z, with the
//! transverse derivatives and propagation the fitter consumes.

use dcafit::{TrackDerivatives, VertexTrack};
use nalgebra::{Matrix6, Vector3};

#[derive(Debug, Clone)]
pub struct TestTrack {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Azimuth of the transverse momentum.
    pub phi: f64,
    /// dz/ds_t, the longitudinal over transverse slope.
    pub tanl: f64,
    /// Signed inverse transverse momentum, zero for a straight track.
    pub inv_qpt: f64,
    pub cxx: f64,
    pub cyy: f64,
    pub cxy: f64,
}

impl TestTrack {
    pub fn new(x: f64, y: f64, z: f64, phi: f64, tanl: f64, inv_qpt: f64) -> Self {
        Self {
            x,
            y,
            z,
            phi,
            tanl,
            inv_qpt,
            cxx: 0.01,
            cyy: 0.01,
            cxy: 0.0,
        }
    }

    /// Straight track through `vertex` with the given transverse slopes,
    /// referenced at z = 0.
    pub fn line_through(vertex: Vector3<f64>, sx: f64, sy: f64) -> Self {
        let slope_t = (sx * sx + sy * sy).sqrt();
        let phi = sy.atan2(sx);
        Self::new(
            vertex.x - vertex.z * sx,
            vertex.y - vertex.z * sy,
            0.0,
            phi,
            1.0 / slope_t,
            0.0,
        )
    }

    pub fn with_planar_cov(mut self, cxx: f64, cyy: f64, cxy: f64) -> Self {
        self.cxx = cxx;
        self.cyy = cyy;
        self.cxy = cxy;
        self
    }

    pub fn scale_cov(mut self, f: f64) -> Self {
        self.cxx *= f;
        self.cyy *= f;
        self.cxy *= f;
        self
    }

    fn curvature(&self, bz: f64) -> f64 {
        bz * self.inv_qpt
    }

    fn pt(&self) -> f64 {
        if self.inv_qpt.abs() > 1e-12 {
            self.inv_qpt.abs().recip()
        } else {
            1.0
        }
    }
}

impl VertexTrack for TestTrack {
    fn x(&self) -> f64 {
        self.x
    }
    fn y(&self) -> f64 {
        self.y
    }
    fn z(&self) -> f64 {
        self.z
    }
    fn charge(&self) -> i32 {
        if self.inv_qpt < 0.0 {
            -1
        } else {
            1
        }
    }
    fn sigma2_x(&self) -> f64 {
        self.cxx
    }
    fn sigma2_y(&self) -> f64 {
        self.cyy
    }
    fn sigma_xy(&self) -> f64 {
        self.cxy
    }
    fn momentum(&self) -> Vector3<f64> {
        let pt = self.pt();
        Vector3::new(pt * self.phi.cos(), pt * self.phi.sin(), pt * self.tanl)
    }
    fn position_momentum_covariance(&self) -> Matrix6<f64> {
        let mut m = Matrix6::zeros();
        m[(0, 0)] = self.cxx;
        m[(1, 1)] = self.cyy;
        m[(0, 1)] = self.cxy;
        m[(1, 0)] = self.cxy;
        m[(2, 2)] = self.cyy;
        for i in 3..6 {
            m[(i, i)] = 0.04;
        }
        m
    }
    fn derivatives(&self, bz: f64) -> TrackDerivatives {
        let snp = self.phi.sin();
        let csp = self.phi.cos();
        let tgl_inv = 1.0 / self.tanl;
        let crv = self.curvature(bz);
        TrackDerivatives {
            dxdz: csp * tgl_inv,
            dydz: snp * tgl_inv,
            d2xdz2: crv * snp * tgl_inv * tgl_inv,
            d2ydz2: -crv * csp * tgl_inv * tgl_inv,
        }
    }
    fn propagate_to_z_linear(&mut self, z: f64) {
        let dz = z - self.z;
        let tgl_inv = 1.0 / self.tanl;
        self.x += self.phi.cos() * tgl_inv * dz;
        self.y += self.phi.sin() * tgl_inv * dz;
        self.z = z;
    }
    fn propagate_to_z_quadratic(&mut self, z: f64, bz: f64) {
        let dz = z - self.z;
        let d = self.derivatives(bz);
        self.x += d.dxdz * dz + 0.5 * d.d2xdz2 * dz * dz;
        self.y += d.dydz * dz + 0.5 * d.d2ydz2 * dz * dz;
        self.phi -= self.curvature(bz) / self.tanl * dz;
        self.z = z;
    }
}

/// Deterministic pseudo-Gaussian noise (Box-Muller over a hashed index),
/// so the perturbation tests stay reproducible without a rng dependency.
pub fn gaussian(mean: f64, std_dev: f64, index: usize) -> f64 {
    let u1 = ((index.wrapping_mul(127_381) + 91_724) % 99_991) as f64 / 99_991.0;
    let u2 = ((index.wrapping_mul(54_321) + 13_579) % 99_991) as f64 / 99_991.0;
    let u1 = u1.max(1e-9);
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z0
}
