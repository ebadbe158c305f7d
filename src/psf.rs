//! Gaussian point-spread function model
//!
//! The scanner PSF is modelled as a separable, anisotropic Gaussian given by
//! its full width at half maximum (FWHM) along each axis in mm. All
//! correction methods consume it as a per-axis variance in mm².

use crate::error::{PvcError, Result};

/// FWHM / sigma ratio of a Gaussian: 2·sqrt(2·ln 2)
pub const FWHM_TO_SIGMA: f64 = 2.354_820_045_030_949_4;

const AXES: [&str; 3] = ["x", "y", "z"];

/// Standard deviation (mm) of a Gaussian with the given FWHM (mm)
#[inline]
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / FWHM_TO_SIGMA
}

/// Variance (mm²) of a Gaussian with the given FWHM (mm)
#[inline]
pub fn fwhm_to_variance(fwhm: f64) -> f64 {
    let sigma = fwhm_to_sigma(fwhm);
    sigma * sigma
}

/// Per-axis PSF variance in mm²
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PsfVariance([f64; 3]);

impl PsfVariance {
    /// Wrap per-axis variances, rejecting negative or non-finite values
    pub fn new(variance: [f64; 3]) -> Result<Self> {
        for (axis, v) in variance.iter().enumerate() {
            if !v.is_finite() || *v < 0.0 {
                return Err(PvcError::parameter(
                    "variance",
                    format!("must be a non-negative real along {}, got {}", AXES[axis], v),
                ));
            }
        }
        Ok(Self(variance))
    }

    /// Derive the variance from FWHM values in mm
    ///
    /// Zero FWHM is allowed and disables blurring along that axis.
    pub fn from_fwhm(fwhm: [f64; 3]) -> Result<Self> {
        let mut variance = [0.0; 3];
        for (axis, &f) in fwhm.iter().enumerate() {
            if !f.is_finite() || f < 0.0 {
                return Err(PvcError::parameter(
                    "fwhm",
                    format!("must be a non-negative real along {}, got {}", AXES[axis], f),
                ));
            }
            variance[axis] = fwhm_to_variance(f);
        }
        Ok(Self(variance))
    }

    /// No blurring along any axis
    pub fn zero() -> Self {
        Self([0.0; 3])
    }

    pub fn as_array(&self) -> [f64; 3] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }

    /// Standard deviation per axis in mm
    pub fn sigma_mm(&self) -> [f64; 3] {
        [self.0[0].sqrt(), self.0[1].sqrt(), self.0[2].sqrt()]
    }

    /// Standard deviation per axis in voxels for the given voxel size (mm)
    pub fn sigma_voxels(&self, voxel_size: (f64, f64, f64)) -> [f64; 3] {
        let s = self.sigma_mm();
        [s[0] / voxel_size.0, s[1] / voxel_size.1, s[2] / voxel_size.2]
    }

    /// FWHM per axis in mm
    pub fn to_fwhm(&self) -> [f64; 3] {
        let s = self.sigma_mm();
        [s[0] * FWHM_TO_SIGMA, s[1] * FWHM_TO_SIGMA, s[2] * FWHM_TO_SIGMA]
    }
}
