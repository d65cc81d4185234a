//! Fit configuration.

use std::fmt;

/// Distance metric minimized by the Newton iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MinimizationMode {
    /// Chi-square with each prong weighted by its inverse covariance.
    #[default]
    Weighted,
    /// Plain squared distance, all prongs weighted equally.
    Absolute,
}

impl fmt::Display for MinimizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinimizationMode::Weighted => write!(f, "weighted"),
            MinimizationMode::Absolute => write!(f, "absolute"),
        }
    }
}

/// Configuration parameters for a vertex fit.
///
/// A fitter keeps one configuration for its whole lifetime; all fields are
/// plain data and the `with_*` builders apply the same floors the fitter
/// relies on internally.
#[derive(Debug, Clone)]
pub struct FitterConfig {
    /// Distance metric minimized per candidate.
    pub mode: MinimizationMode,
    /// Propagate all prong copies to the fitted vertex right after a
    /// candidate is accepted.
    pub propagate_to_vertex: bool,
    /// Maximum Newton passes per candidate.
    pub max_iterations: usize,
    /// Candidate seeds beyond this transverse radius are discarded.
    pub max_radius: f64,
    /// Reject a seed when any two prongs differ by more than this in x at
    /// the seed z. Disabled when not positive.
    pub max_start_dx: f64,
    /// Accept a converged candidate only below this chi-square per prong.
    pub max_chi2: f64,
    /// Stop iterating once the largest z correction falls below this.
    pub min_param_change: f64,
    /// Stop iterating once chi2_new > chi2_old * this ratio.
    pub min_rel_chi2_change: f64,
    /// Magnetic field along z, forwarded to the track model.
    pub bz: f64,
    /// Merge two crossing seeds closer (squared) than this into one.
    pub merge_dist2: f64,
    /// Scale applied to the y variance when synthesizing the z variance of
    /// a prong. The track covariance has no native z term; reusing the
    /// scaled y variance keeps the augmented inverse well conditioned for
    /// near-collinear prongs.
    pub zerr_factor: f64,
    /// Window scanned for the longitudinal seed position.
    pub seed_z_range: (f64, f64),
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            mode: MinimizationMode::default(),
            propagate_to_vertex: true,
            max_iterations: 20,
            max_radius: 200.0,
            max_start_dx: 4.0,
            max_chi2: 100.0,
            min_param_change: 1e-3,
            min_rel_chi2_change: 0.9,
            bz: 0.0,
            merge_dist2: 1.0,
            zerr_factor: 5.0,
            seed_z_range: (-200.0, 200.0),
        }
    }
}

impl FitterConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimization mode.
    pub fn with_mode(mut self, mode: MinimizationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable or disable automatic propagation to the fitted vertex.
    pub fn with_propagate_to_vertex(mut self, v: bool) -> Self {
        self.propagate_to_vertex = v;
        self
    }

    /// Set the iteration cap (floor of 2).
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n.max(2);
        self
    }

    /// Set the transverse acceptance radius for seeds.
    pub fn with_max_radius(mut self, r: f64) -> Self {
        self.max_radius = r;
        self
    }

    /// Set the initial x-spread cut; values <= 0 disable it.
    pub fn with_max_start_dx(mut self, d: f64) -> Self {
        self.max_start_dx = d;
        self
    }

    /// Set the chi-square acceptance ceiling.
    pub fn with_max_chi2(mut self, chi2: f64) -> Self {
        self.max_chi2 = chi2;
        self
    }

    /// Set the minimum parameter-change stop threshold (floor of 1e-4).
    pub fn with_min_param_change(mut self, x: f64) -> Self {
        self.min_param_change = x.max(1e-4);
        self
    }

    /// Set the relative chi-square improvement threshold. Values <= 0.1
    /// mean "never stop early on chi-square" and are stored as 999.
    pub fn with_min_rel_chi2_change(mut self, r: f64) -> Self {
        self.min_rel_chi2_change = if r > 0.1 { r } else { 999.0 };
        self
    }

    /// Set the magnetic field; negligible magnitudes clamp to zero.
    pub fn with_bz(mut self, bz: f64) -> Self {
        self.bz = if bz.abs() > 1e-9 { bz } else { 0.0 };
        self
    }

    /// Set the squared seed-merge distance.
    pub fn with_merge_dist2(mut self, d2: f64) -> Self {
        self.merge_dist2 = d2;
        self
    }

    /// Set the synthesized z-variance scale factor.
    pub fn with_zerr_factor(mut self, f: f64) -> Self {
        self.zerr_factor = f;
        self
    }

    /// Set the window scanned for the longitudinal seed.
    pub fn with_seed_z_range(mut self, lo: f64, hi: f64) -> Self {
        self.seed_z_range = if lo <= hi { (lo, hi) } else { (hi, lo) };
        self
    }
}
