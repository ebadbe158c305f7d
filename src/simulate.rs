//! Partial volume effect simulation
//!
//! Blurs a ground-truth image with the PSF to produce a partial-volume
//! affected image, useful for validating correction methods against a known
//! truth.
//!
//! Reference:
//! Erlandsson, K., Buvat, I., Pretorius, P.H., Thomas, B.A., Hutton, B.F.
//! (2012). "A review of partial volume correction techniques for emission
//! tomography and their applications in neurology, cardiology and oncology."
//! Physics in Medicine and Biology, 57(21):R119-R159.

use log::debug;

use crate::blur::{log_psf, Blur, GaussianBlur};
use crate::error::Result;
use crate::psf::PsfVariance;
use crate::volume::Volume;

/// Simulate the partial volume effect with the default Gaussian PSF
pub fn simulate_pve(ground_truth: &Volume, variance: &PsfVariance) -> Volume {
    simulate_pve_with(&GaussianBlur::default(), ground_truth, variance)
}

/// Simulate the partial volume effect with an explicit blur operator
pub fn simulate_pve_with<B: Blur + ?Sized>(blur: &B, ground_truth: &Volume, variance: &PsfVariance) -> Volume {
    log_psf(ground_truth, variance);
    let blurred = blur.blur(ground_truth, variance);
    debug!(
        "PVE simulation: total intensity {:.6e} -> {:.6e}",
        ground_truth.sum(),
        blurred.sum()
    );
    blurred
}

/// Simulate the partial volume effect for a PSF given as FWHM in mm
pub fn simulate_pve_from_fwhm(ground_truth: &Volume, fwhm: [f64; 3]) -> Result<Volume> {
    let variance = PsfVariance::from_fwhm(fwhm)?;
    Ok(simulate_pve(ground_truth, &variance))
}
