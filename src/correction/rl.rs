//! Richardson-Lucy (RL) partial volume correction
//!
//! Iterative deconvolution of the image with the Gaussian PSF. Each step
//! re-blurs the current estimate, compares it against the observation and
//! applies a multiplicative correction, so a non-negative observation yields
//! a non-negative estimate at every iteration.
//!
//! Reference:
//! Tohka, J., Reilhac, A. (2008). "Deconvolution-based partial volume
//! correction in Raclopride-PET and Monte Carlo comparison to MR-based
//! method." NeuroImage, 39(4):1570-1584.
//! https://doi.org/10.1016/j.neuroimage.2007.10.038

use log::{debug, info, trace, warn};

use crate::blur::{log_psf, Blur, GaussianBlur};
use crate::error::{PvcError, RecoveredCondition, Result};
use crate::psf::PsfVariance;
use crate::utils::simd_ops::{guarded_ratio_f64, multiply_in_place_f64};
use crate::volume::Volume;

/// Default number of RL iterations
pub const DEFAULT_ITERATIONS: usize = 10;

/// Re-blurred values below this are treated as zero in the ratio step
pub const DEFAULT_EPSILON: f64 = 1e-10;

/// Parameters for Richardson-Lucy deconvolution
#[derive(Clone, Debug)]
pub struct RichardsonLucyParams {
    /// Number of update steps (default 10)
    pub iterations: usize,
    /// Denominator threshold for the ratio step
    pub epsilon: f64,
    /// Objective value at which iteration may stop early
    ///
    /// Accepted and validated but not yet acted upon: the fixed iteration
    /// count always governs termination.
    pub stopping_threshold: Option<f64>,
}

impl Default for RichardsonLucyParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            epsilon: DEFAULT_EPSILON,
            stopping_threshold: None,
        }
    }
}

impl RichardsonLucyParams {
    pub fn with_iterations(iterations: usize) -> Self {
        Self {
            iterations,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(PvcError::parameter("iterations", "must be a positive integer, got 0"));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(PvcError::parameter(
                "epsilon",
                format!("must be a positive real, got {}", self.epsilon),
            ));
        }
        if let Some(t) = self.stopping_threshold {
            if !t.is_finite() {
                return Err(PvcError::parameter(
                    "stopping_threshold",
                    format!("must be finite, got {}", t),
                ));
            }
        }
        Ok(())
    }
}

/// Output of a Richardson-Lucy run
#[derive(Clone, Debug)]
pub struct RichardsonLucyResult {
    /// Final estimate
    pub estimate: Volume,
    /// Number of update steps performed
    pub iterations: usize,
    /// Numeric guards hit in the ratio step, summed over all iterations
    pub recovered: Vec<RecoveredCondition>,
}

fn validate_observed(observed: &Volume) -> Result<()> {
    if let Some((pos, &v)) = observed
        .data()
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(PvcError::input(
            "observed",
            format!("voxel {} has value {}; intensities must be non-negative", pos, v),
        ));
    }
    Ok(())
}

/// Richardson-Lucy partial volume correction
///
/// # Arguments
/// * `observed` - Blurred input image (non-negative)
/// * `variance` - PSF variance per axis in mm²
/// * `iterations` - Number of RL iterations (must be > 0)
///
/// # Returns
/// Deconvolved image with the same geometry as `observed`
pub fn richardson_lucy(observed: &Volume, variance: &PsfVariance, iterations: usize) -> Result<Volume> {
    let params = RichardsonLucyParams::with_iterations(iterations);
    richardson_lucy_with(&GaussianBlur::default(), observed, variance, &params)
        .map(|r| r.estimate)
}

/// Richardson-Lucy with default parameters (10 iterations)
pub fn richardson_lucy_default(observed: &Volume, variance: &PsfVariance) -> Result<Volume> {
    richardson_lucy(observed, variance, DEFAULT_ITERATIONS)
}

/// Richardson-Lucy with an explicit blur operator and parameters
pub fn richardson_lucy_with<B: Blur + ?Sized>(
    blur: &B,
    observed: &Volume,
    variance: &PsfVariance,
    params: &RichardsonLucyParams,
) -> Result<RichardsonLucyResult> {
    richardson_lucy_with_progress(blur, observed, variance, params, |_, _| {})
}

/// Richardson-Lucy with progress callback
///
/// The callback receives `(completed_iterations, total_iterations)` before
/// each iteration and once more when finished.
pub fn richardson_lucy_with_progress<B, F>(
    blur: &B,
    observed: &Volume,
    variance: &PsfVariance,
    params: &RichardsonLucyParams,
    mut progress_callback: F,
) -> Result<RichardsonLucyResult>
where
    B: Blur + ?Sized,
    F: FnMut(usize, usize),
{
    params.validate()?;
    validate_observed(observed)?;

    log_psf(observed, variance);
    debug!("RL: {} iterations, epsilon {:e}", params.iterations, params.epsilon);
    if let Some(t) = params.stopping_threshold {
        // TODO: evaluate the Poisson log-likelihood each iteration and stop once it crosses this value
        warn!(
            "RL: stopping threshold {} is not enforced; running all {} iterations",
            t, params.iterations
        );
    }

    let n_total = observed.len();
    let obs = observed.data();
    let mut estimate = observed.clone();
    let mut ratio = vec![0.0f64; n_total];
    let mut guarded_total = 0usize;

    for iter in 0..params.iterations {
        progress_callback(iter, params.iterations);

        // ratio = observed / blur(estimate)
        let reblurred = blur.blur(&estimate, variance);
        let guarded = guarded_ratio_f64(&mut ratio, obs, reblurred.data(), params.epsilon);
        guarded_total += guarded;

        // estimate *= blur(ratio); the Gaussian PSF is its own adjoint
        let correction = blur.blur(&observed.with_data(std::mem::take(&mut ratio)), variance);
        multiply_in_place_f64(estimate.data_mut(), correction.data());
        ratio = reblurred.into_data();

        trace!("RL: iteration {}/{} ({} voxels guarded)", iter + 1, params.iterations, guarded);
    }

    progress_callback(params.iterations, params.iterations);

    let mut recovered = Vec::new();
    if guarded_total > 0 {
        debug!("RL: {} near-zero denominators replaced by 0", guarded_total);
        recovered.push(RecoveredCondition::NumericGuard { voxels: guarded_total });
    }
    info!(
        "RL: finished {} iterations, total intensity {:.6e} -> {:.6e}",
        params.iterations,
        observed.sum(),
        estimate.sum()
    );

    Ok(RichardsonLucyResult {
        estimate,
        iterations: params.iterations,
        recovered,
    })
}
