//! Discrete 1D Gaussian kernel
//!
//! Sampled Gaussian normalised to unit sum, used by the separable 3D blur.

/// Default truncation radius in multiples of sigma (keeps > 99.99% of the mass)
pub const DEFAULT_TRUNCATION: f64 = 4.0;

/// Voxel-space sigma below which an axis pass is skipped entirely
pub const DEFAULT_MIN_SIGMA: f64 = 0.05;

/// Largest kernel half-width handed out, in voxels
pub const MAX_KERNEL_RADIUS: usize = 1 << 20;

/// Kernel half-width in voxels for the given sigma
///
/// At least 1 voxel so that any axis that is blurred at all uses 3 taps,
/// and never more than `MAX_KERNEL_RADIUS`.
#[inline]
pub fn gaussian_kernel_radius(sigma: f64, truncation: f64) -> usize {
    let r = (truncation * sigma).ceil();
    if r >= MAX_KERNEL_RADIUS as f64 {
        MAX_KERNEL_RADIUS
    } else {
        (r as usize).max(1)
    }
}

/// Create a normalised 1D Gaussian kernel
///
/// # Arguments
/// * `sigma` - Standard deviation in voxels (must be > 0)
/// * `truncation` - Half-width in multiples of sigma
///
/// # Returns
/// Kernel of length 2*radius + 1, centred at index `radius`, summing to 1
pub fn gaussian_kernel_1d(sigma: f64, truncation: f64) -> Vec<f64> {
    let radius = gaussian_kernel_radius(sigma, truncation);
    let kernel_size = 2 * radius + 1;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }

    kernel
}
