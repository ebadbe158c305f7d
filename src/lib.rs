//! PVC-Core: Partial volume correction for PET images
//!
//! This crate compensates for the blurring introduced by a scanner's
//! point-spread function so that voxel intensities better reflect the true
//! underlying activity.
//!
//! # Modules
//! - `psf`: FWHM to Gaussian variance conversion
//! - `kernels`: Discrete Gaussian kernel
//! - `blur`: Separable anisotropic Gaussian blur (`Blur` trait)
//! - `correction`: Richardson-Lucy and region-based voxel-wise (RBV) correction
//! - `simulate`: Partial volume effect simulation
//! - `volume`: Image volumes and region mask stacks
//! - `utils`: Mask construction, SIMD voxel operations

// Core modules
pub mod error;
pub mod volume;
pub mod psf;
pub mod kernels;
pub mod blur;

// Algorithm modules
pub mod correction;
pub mod simulate;
pub mod utils;

pub use blur::{gaussian_blur_3d, Blur, GaussianBlur};
pub use correction::{rbv_correct, richardson_lucy};
pub use error::{PvcError, RecoveredCondition, Result};
pub use psf::PsfVariance;
pub use simulate::simulate_pve;
pub use volume::{RegionMasks, Volume};
