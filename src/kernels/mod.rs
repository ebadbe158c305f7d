//! Convolution kernels
//!
//! - Gaussian kernel for the separable PSF model

pub mod gaussian;

pub use gaussian::*;
