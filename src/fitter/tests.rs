//! Shared in-crate test track model plus whole-fitter tests.

use nalgebra::{Matrix6, Vector3};

use crate::error::DcaFitError;
use crate::fitter::config::{FitterConfig, MinimizationMode};
use crate::fitter::{DcaFitter, DcaFitter2};
use crate::track::{TrackDerivatives, VertexTrack};

/// Minimal forward-track model: transverse position and slope as an
/// explicit function of z, plus a fixed planar covariance.
#[derive(Debug, Clone)]
pub(crate) struct StubTrack {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub dxdz: f64,
    pub dydz: f64,
    pub d2xdz2: f64,
    pub d2ydz2: f64,
    pub cxx: f64,
    pub cyy: f64,
    pub cxy: f64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub q: i32,
}

impl StubTrack {
    pub fn line(x: f64, y: f64, z: f64, dxdz: f64, dydz: f64) -> Self {
        Self {
            x,
            y,
            z,
            dxdz,
            dydz,
            d2xdz2: 0.0,
            d2ydz2: 0.0,
            cxx: 0.01,
            cyy: 0.01,
            cxy: 0.0,
            px: dxdz,
            py: dydz,
            pz: 1.0,
            q: 1,
        }
    }

    pub fn arc(
        x: f64,
        y: f64,
        z: f64,
        dxdz: f64,
        dydz: f64,
        d2xdz2: f64,
        d2ydz2: f64,
    ) -> Self {
        let mut trc = Self::line(x, y, z, dxdz, dydz);
        trc.d2xdz2 = d2xdz2;
        trc.d2ydz2 = d2ydz2;
        trc
    }

    pub fn with_cov(cxx: f64, cyy: f64, cxy: f64) -> Self {
        let mut trc = Self::line(0.0, 0.0, 0.0, 0.1, 0.1);
        trc.cxx = cxx;
        trc.cyy = cyy;
        trc.cxy = cxy;
        trc
    }

    pub fn scale_cov(mut self, f: f64) -> Self {
        self.cxx *= f;
        self.cyy *= f;
        self.cxy *= f;
        self
    }
}

impl VertexTrack for StubTrack {
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
        self.q
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
        Vector3::new(self.px, self.py, self.pz)
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
    fn derivatives(&self, _bz: f64) -> TrackDerivatives {
        TrackDerivatives {
            dxdz: self.dxdz,
            dydz: self.dydz,
            d2xdz2: self.d2xdz2,
            d2ydz2: self.d2ydz2,
        }
    }
    fn propagate_to_z_linear(&mut self, z: f64) {
        let dz = z - self.z;
        self.x += self.dxdz * dz;
        self.y += self.dydz * dz;
        self.z = z;
    }
    fn propagate_to_z_quadratic(&mut self, z: f64, _bz: f64) {
        let dz = z - self.z;
        self.x += self.dxdz * dz + 0.5 * self.d2xdz2 * dz * dz;
        self.y += self.dydz * dz + 0.5 * self.d2ydz2 * dz * dz;
        self.dxdz += self.d2xdz2 * dz;
        self.dydz += self.d2ydz2 * dz;
        self.z = z;
    }
}

/// Two straight prongs through `vertex` with the given transverse slopes,
/// referenced at z = 0.
pub(crate) fn prongs_through(
    vertex: Vector3<f64>,
    slopes: [(f64, f64); 2],
) -> [StubTrack; 2] {
    let mk = |(sx, sy): (f64, f64)| {
        StubTrack::line(
            vertex.x - vertex.z * sx,
            vertex.y - vertex.z * sy,
            0.0,
            sx,
            sy,
        )
    };
    [mk(slopes[0]), mk(slopes[1])]
}

#[test]
fn test_two_prong_exact_crossing() {
    let vertex = Vector3::new(1.0, 2.0, 5.0);
    let tracks = prongs_through(vertex, [(0.2, 0.1), (-0.1, 0.3)]);
    let mut fitter = DcaFitter2::new(FitterConfig::default().with_seed_z_range(-20.0, 20.0));
    let n = fitter.process(&tracks).unwrap();
    assert_eq!(n, 1);
    assert!((fitter.vertex(0).unwrap() - vertex).norm() < 1e-6);
    assert!(fitter.chi2(0).unwrap() < 1e-10);
    assert!(fitter.chi2(0).unwrap() >= 0.0);
}

#[test]
fn test_parallel_prongs_yield_nothing() {
    let tracks = [
        StubTrack::line(0.0, 0.0, 0.0, 0.2, 0.1),
        StubTrack::line(1.0, -1.0, 0.0, 0.2, 0.1),
    ];
    let mut fitter = DcaFitter2::<StubTrack>::default();
    assert_eq!(fitter.process(&tracks).unwrap(), 0);
    assert!(fitter.vertex(0).is_none());
    assert!(fitter.chi2(0).is_none());
}

#[test]
fn test_absolute_mode_recovers_exact_crossing() {
    let vertex = Vector3::new(-0.5, 0.8, 7.0);
    let tracks = prongs_through(vertex, [(0.15, -0.1), (-0.2, 0.25)]);
    let cfg = FitterConfig::default()
        .with_mode(MinimizationMode::Absolute)
        .with_seed_z_range(-20.0, 20.0);
    let mut fitter = DcaFitter2::new(cfg);
    assert_eq!(fitter.process(&tracks).unwrap(), 1);
    assert!((fitter.vertex(0).unwrap() - vertex).norm() < 1e-6);
    assert!(fitter.chi2(0).unwrap() >= 0.0);
}

#[test]
fn test_invalid_covariance_clears_state() {
    let vertex = Vector3::new(0.5, 0.5, 4.0);
    let mut tracks = prongs_through(vertex, [(0.2, 0.0), (-0.2, 0.1)]);
    // run a good fit first so there is state to lose
    let mut fitter = DcaFitter2::new(FitterConfig::default().with_seed_z_range(-20.0, 20.0));
    assert_eq!(fitter.process(&tracks).unwrap(), 1);

    tracks[1].cxy = 1.0;
    let err = fitter.process(&tracks).unwrap_err();
    assert!(matches!(err, DcaFitError::InvalidCovariance { .. }));
    assert_eq!(fitter.n_candidates(), 0);
    assert!(fitter.vertex(0).is_none());
}

#[test]
fn test_rank_accessors_out_of_range() {
    let vertex = Vector3::new(0.0, 0.0, 3.0);
    let tracks = prongs_through(vertex, [(0.1, 0.0), (-0.1, 0.05)]);
    let mut fitter = DcaFitter2::new(FitterConfig::default().with_seed_z_range(-20.0, 20.0));
    assert_eq!(fitter.process(&tracks).unwrap(), 1);
    assert!(fitter.vertex(1).is_none());
    assert!(matches!(
        fitter.track_at_vertex(0, 1),
        Err(DcaFitError::InvalidCandidate { rank: 1, count: 1 })
    ));
}

#[test]
fn test_propagation_is_idempotent() {
    let vertex = Vector3::new(0.4, -0.3, 6.0);
    let tracks = prongs_through(vertex, [(0.25, 0.0), (-0.15, 0.2)]);
    let cfg = FitterConfig::default()
        .with_propagate_to_vertex(false)
        .with_seed_z_range(-20.0, 20.0);
    let mut fitter = DcaFitter2::new(cfg);
    assert_eq!(fitter.process(&tracks).unwrap(), 1);
    assert!(!fitter.is_propagated(0));
    assert!(matches!(
        fitter.track_at_vertex(0, 0),
        Err(DcaFitError::NotPropagated)
    ));

    fitter.propagate_to_vertex(0).unwrap();
    assert!(fitter.is_propagated(0));
    let first: Vec<Vector3<f64>> = (0..2)
        .map(|i| fitter.track_at_vertex(i, 0).unwrap().position())
        .collect();
    fitter.propagate_to_vertex(0).unwrap();
    for (i, pos) in first.iter().enumerate() {
        let again = fitter.track_at_vertex(i, 0).unwrap().position();
        assert_eq!(*pos, again);
    }
}

#[test]
fn test_track_param_at_vertex_matches_propagated_track() {
    let vertex = Vector3::new(0.0, 1.0, 8.0);
    let tracks = prongs_through(vertex, [(0.1, -0.05), (-0.3, 0.1)]);
    let cfg = FitterConfig::default()
        .with_propagate_to_vertex(false)
        .with_seed_z_range(-20.0, 20.0);
    let mut fitter = DcaFitter2::new(cfg);
    assert_eq!(fitter.process(&tracks).unwrap(), 1);
    let on_the_fly = fitter.track_param_at_vertex(0, 0).unwrap();
    fitter.propagate_to_vertex(0).unwrap();
    let stored = fitter.track_at_vertex(0, 0).unwrap();
    assert!((on_the_fly.position() - stored.position()).norm() < 1e-9);
}

#[test]
fn test_parent_track_sums_prongs() {
    let vertex = Vector3::new(0.2, 0.3, 5.0);
    let tracks = prongs_through(vertex, [(0.2, 0.1), (-0.1, 0.3)]);
    let mut fitter = DcaFitter2::new(FitterConfig::default().with_seed_z_range(-20.0, 20.0));
    assert_eq!(fitter.process(&tracks).unwrap(), 1);

    let parent = fitter.parent_track(0).unwrap();
    assert_eq!(parent.charge, 2);
    assert!(parent.covariance.is_none());
    let expect_p = fitter.track_at_vertex(0, 0).unwrap().momentum()
        + fitter.track_at_vertex(1, 0).unwrap().momentum();
    assert!((parent.momentum - expect_p).norm() < 1e-12);
    assert!((parent.position - fitter.vertex(0).unwrap()).norm() < 1e-12);

    let with_cov = fitter.parent_track_with_cov(0).unwrap();
    let cov = with_cov.covariance.unwrap();
    // momentum block is the plain sum of the prong momentum blocks
    assert!((cov[(3, 3)] - 0.08).abs() < 1e-12);
    // position block is the assembled vertex covariance
    let vc = fitter.vertex_covariance(0).unwrap();
    assert!((cov[(0, 0)] - vc[(0, 0)]).abs() < 1e-15);
}

#[test]
fn test_vertex_covariance_flat_layout() {
    let vertex = Vector3::new(0.0, 0.0, 4.0);
    let tracks = prongs_through(vertex, [(0.2, 0.0), (-0.2, 0.15)]);
    let mut fitter = DcaFitter2::new(FitterConfig::default().with_seed_z_range(-20.0, 20.0));
    assert_eq!(fitter.process(&tracks).unwrap(), 1);
    let m = fitter.vertex_covariance(0).unwrap();
    let flat = fitter.vertex_covariance_flat(0).unwrap();
    assert_eq!(flat[0], m[(0, 0)]);
    assert_eq!(flat[1], m[(1, 0)]);
    assert_eq!(flat[2], m[(1, 1)]);
    assert_eq!(flat[5], m[(2, 2)]);
}

#[test]
fn test_covariance_inflation_keeps_weighted_vertex() {
    // small offsets off a common point keep the residuals non-trivial
    let mut base = prongs_through(Vector3::new(1.0, 2.0, 5.0), [(0.2, 0.1), (-0.1, 0.3)]);
    base[0].y -= 0.03;
    base[1].x += 0.05;
    let inflated = [
        base[0].clone().scale_cov(4.0),
        base[1].clone().scale_cov(4.0),
    ];
    let cfg = FitterConfig::default().with_seed_z_range(-20.0, 20.0);
    let mut fitter = DcaFitter2::new(cfg);

    assert_eq!(fitter.process(&base).unwrap(), 1);
    let v0 = fitter.vertex(0).unwrap();
    let chi0 = fitter.chi2(0).unwrap();
    let cov0 = fitter.vertex_covariance(0).unwrap();

    assert_eq!(fitter.process(&inflated).unwrap(), 1);
    let v1 = fitter.vertex(0).unwrap();
    let chi1 = fitter.chi2(0).unwrap();
    let cov1 = fitter.vertex_covariance(0).unwrap();

    assert!((v0 - v1).norm() < 1e-8);
    assert!(chi1 < chi0);
    assert!(cov1[(0, 0)] > cov0[(0, 0)]);
}

#[test]
fn test_three_prong_fitter_compiles_and_fits() {
    let vertex = Vector3::new(0.5, -0.5, 6.0);
    let slopes = [(0.2, 0.05), (-0.1, 0.2), (0.05, -0.25)];
    let tracks: [StubTrack; 3] = std::array::from_fn(|i| {
        let (sx, sy) = slopes[i];
        StubTrack::line(
            vertex.x - vertex.z * sx,
            vertex.y - vertex.z * sy,
            0.0,
            sx,
            sy,
        )
    });
    let mut fitter: DcaFitter<StubTrack, 3> =
        DcaFitter::new(FitterConfig::default().with_seed_z_range(-20.0, 20.0));
    assert_eq!(fitter.process(&tracks).unwrap(), 1);
    assert!((fitter.vertex(0).unwrap() - vertex).norm() < 1e-6);
}
