//! N-prong secondary-vertex fitter.
//!
//! The fitter finds the point of closest approach (PCA) of N forward
//! tracks assumed to share a common origin. Crossing seeds are built from
//! the transverse geometry of the first two prongs, each seed is refined
//! by Newton-Raphson iteration in the selected minimization mode, and up
//! to two surviving candidates are kept, ranked by ascending chi-square.
//!
//! A fitter instance is mutable scratch state: configure it once, then
//! call [`DcaFitter::process`] for every prong set. Instances are not
//! meant to be shared across threads; run one fitter per worker instead
//! (see [`crate::batch`]).

pub mod config;

mod assembler;
mod candidate;
mod residuals;
mod seeds;
mod solver;
mod weights;

#[cfg(test)]
pub(crate) mod tests;

use nalgebra::{Const, DimMin, Vector2, Vector3};
use tracing::{debug, info};

use crate::error::{DcaFitError, DcaFitResult};
use crate::track::VertexTrack;
use self::candidate::{rank_by_chi2, Hypothesis, MAX_HYP};
use self::config::{FitterConfig, MinimizationMode};
use self::residuals::{Absolute, DerivativeScratch, Weighted};
use self::seeds::{seed_z, transverse_crossings, Crossings};
use self::solver::{minimize_seed, propagate_track, SeedOutcome};

/// N-prong point-of-closest-approach fitter for forward tracks.
///
/// `N` is the prong count, supported in the range 2..=4 and checked at
/// compile time. Input tracks are borrowed for the duration of each
/// [`process`](DcaFitter::process) call; the fitter keeps its own copies
/// for later result queries.
pub struct DcaFitter<T: VertexTrack, const N: usize> {
    config: FitterConfig,
    input: Option<[T; N]>,
    crossings: Crossings,
    slots: [Option<Hypothesis<T, N>>; MAX_HYP],
    order: [usize; MAX_HYP],
    n_candidates: usize,
    allow_alt_preference: bool,
}

/// Two-prong fitter.
pub type DcaFitter2<T> = DcaFitter<T, 2>;
/// Three-prong fitter.
pub type DcaFitter3<T> = DcaFitter<T, 3>;

impl<T: VertexTrack, const N: usize> DcaFitter<T, N>
where
    Const<N>: DimMin<Const<N>, Output = Const<N>>,
{
    /// Create a fitter with the given configuration.
    pub fn new(config: FitterConfig) -> Self {
        const {
            assert!(N >= 2 && N <= 4, "prong count outside the supported range 2..=4");
        }
        Self {
            config,
            input: None,
            crossings: Crossings::default(),
            slots: [None, None],
            order: [0, 1],
            n_candidates: 0,
            allow_alt_preference: true,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &FitterConfig {
        &self.config
    }

    /// Fit the PCA of `tracks`. Returns the number of live candidates
    /// (0 to 2); only a malformed input covariance is an error, and it
    /// clears any previous results.
    pub fn process(&mut self, tracks: &[T; N]) -> DcaFitResult<usize> {
        self.clear();
        let result = self.run(tracks);
        if result.is_err() {
            self.clear();
        }
        result
    }

    fn clear(&mut self) {
        self.input = None;
        self.crossings = Crossings::default();
        self.slots = [None, None];
        self.order = [0, 1];
        self.n_candidates = 0;
        self.allow_alt_preference = true;
    }

    fn run(&mut self, tracks: &[T; N]) -> DcaFitResult<usize> {
        self.input = Some(tracks.clone());

        let mut crossings = transverse_crossings(&tracks[0], &tracks[1], self.config.bz);
        if crossings.count == 0 {
            debug!("no transverse crossing, nothing to fit");
            return Ok(0);
        }
        crossings.merge_if_close(self.config.merge_dist2);
        self.crossings = crossings;

        let max_r2 = self.config.max_radius * self.config.max_radius;
        let mut scratch = DerivativeScratch::new();

        for ic in 0..self.crossings.count {
            let (sx, sy) = (self.crossings.x[ic], self.crossings.y[ic]);
            if sx * sx + sy * sy > max_r2 {
                debug!("seed outside acceptance radius");
                continue;
            }
            let alt = if self.crossings.count == MAX_HYP && self.allow_alt_preference {
                Some(1 - ic)
            } else {
                None
            };

            let start_z = seed_z(
                &tracks[0],
                &tracks[1],
                Vector2::new(sx, sy),
                self.config.seed_z_range,
            );
            let mut hyp = Hypothesis::seeded(tracks, Vector3::new(sx, sy, start_z));
            let outcome = match self.config.mode {
                MinimizationMode::Weighted => minimize_seed::<T, Weighted, N>(
                    &self.config,
                    tracks,
                    &self.crossings,
                    ic,
                    alt,
                    &mut hyp,
                    &mut scratch,
                )?,
                MinimizationMode::Absolute => minimize_seed::<T, Absolute, N>(
                    &self.config,
                    tracks,
                    &self.crossings,
                    ic,
                    alt,
                    &mut hyp,
                    &mut scratch,
                )?,
            };

            match outcome {
                SeedOutcome::Accepted => {
                    if self.config.propagate_to_vertex {
                        propagate_hypothesis(&mut hyp, tracks, &self.config);
                    }
                    self.order[self.n_candidates] = self.n_candidates;
                    self.slots[self.n_candidates] = Some(hyp);
                    self.n_candidates += 1;
                }
                SeedOutcome::DivergedToAlternate => {
                    self.allow_alt_preference = false;
                }
                SeedOutcome::RejectedGeometry
                | SeedOutcome::RejectedNumerics
                | SeedOutcome::RejectedChi2 => {}
            }
        }

        let mut chi2s = [f64::INFINITY; MAX_HYP];
        for (slot, chi2) in self.slots.iter().zip(chi2s.iter_mut()) {
            if let Some(h) = slot {
                *chi2 = h.chi2;
            }
        }
        rank_by_chi2(&chi2s, &mut self.order[..self.n_candidates]);

        Ok(self.n_candidates)
    }

    /// Number of live candidates from the last `process` call.
    pub fn n_candidates(&self) -> usize {
        self.n_candidates
    }

    fn slot(&self, rank: usize) -> Option<&Hypothesis<T, N>> {
        if rank >= self.n_candidates {
            return None;
        }
        self.slots[self.order[rank]].as_ref()
    }

    fn require_slot(&self, rank: usize) -> DcaFitResult<&Hypothesis<T, N>> {
        self.slot(rank).ok_or(DcaFitError::InvalidCandidate {
            rank,
            count: self.n_candidates,
        })
    }

    /// Fitted vertex position of the candidate at `rank` (0 = best).
    pub fn vertex(&self, rank: usize) -> Option<Vector3<f64>> {
        self.slot(rank).map(|h| h.vertex)
    }

    /// Chi-square per prong of the candidate at `rank`.
    pub fn chi2(&self, rank: usize) -> Option<f64> {
        self.slot(rank).map(|h| h.chi2)
    }

    /// Newton passes spent on the candidate at `rank`.
    pub fn iterations(&self, rank: usize) -> Option<usize> {
        self.slot(rank).map(|h| h.iterations)
    }

    /// Whether the prong copies of the candidate at `rank` were propagated
    /// to the fitted vertex.
    pub fn is_propagated(&self, rank: usize) -> bool {
        self.slot(rank).map_or(false, |h| h.propagated)
    }

    /// Propagate all prong copies of the candidate at `rank` to its fitted
    /// vertex. Idempotent: repeated calls do no further work.
    pub fn propagate_to_vertex(&mut self, rank: usize) -> DcaFitResult<()> {
        if rank >= self.n_candidates {
            return Err(DcaFitError::InvalidCandidate {
                rank,
                count: self.n_candidates,
            });
        }
        let idx = self.order[rank];
        let input = self.input.as_ref().ok_or(DcaFitError::NoInput)?;
        match self.slots[idx].as_mut() {
            Some(hyp) => {
                propagate_hypothesis(hyp, input, &self.config);
                Ok(())
            }
            None => Err(DcaFitError::InvalidCandidate {
                rank,
                count: self.n_candidates,
            }),
        }
    }

    /// Prong `i` of the candidate at `rank`, propagated to the vertex.
    /// Fails with [`DcaFitError::NotPropagated`] until
    /// [`propagate_to_vertex`](DcaFitter::propagate_to_vertex) ran (or the
    /// fit was configured to propagate automatically). `i` must be below N.
    pub fn track_at_vertex(&self, i: usize, rank: usize) -> DcaFitResult<&T> {
        let hyp = self.require_slot(rank)?;
        if !hyp.propagated {
            return Err(DcaFitError::NotPropagated);
        }
        Ok(&hyp.tracks[i])
    }

    /// On-the-fly copy of prong `i` of the candidate at `rank`, propagated
    /// to the vertex without touching the stored state. `i` must be below N.
    pub fn track_param_at_vertex(&self, i: usize, rank: usize) -> DcaFitResult<T> {
        let hyp = self.require_slot(rank)?;
        let mut trc = hyp.tracks[i].clone();
        if !hyp.propagated {
            propagate_track(&mut trc, hyp.vertex.z, &self.config);
        }
        Ok(trc)
    }

    /// Report the fitter setup through `tracing`.
    pub fn log_configuration(&self) {
        let cfg = &self.config;
        info!(
            "{}-prong vertex fitter in {} distance minimization mode",
            N, cfg.mode
        );
        info!(
            "bz: {} max iterations: {} max chi2: {}",
            cfg.bz, cfg.max_iterations, cfg.max_chi2
        );
        info!(
            "stopping when max param change < {} or rel chi2 change > {}",
            cfg.min_param_change, cfg.min_rel_chi2_change
        );
        info!(
            "discarding candidates for radius > {} or initial x spread > {}",
            cfg.max_radius, cfg.max_start_dx
        );
    }
}

impl<T: VertexTrack, const N: usize> Default for DcaFitter<T, N>
where
    Const<N>: DimMin<Const<N>, Output = Const<N>>,
{
    fn default() -> Self {
        Self::new(FitterConfig::default())
    }
}

/// Replace the working copies by freshly propagated ones at the fitted
/// vertex, once.
fn propagate_hypothesis<T: VertexTrack, const N: usize>(
    hyp: &mut Hypothesis<T, N>,
    input: &[T; N],
    cfg: &FitterConfig,
) {
    if hyp.propagated {
        return;
    }
    let z = hyp.vertex.z;
    for (work, orig) in hyp.tracks.iter_mut().zip(input.iter()) {
        *work = orig.clone();
        propagate_track(work, z, cfg);
    }
    hyp.propagated = true;
}
