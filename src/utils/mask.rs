//! Region mask construction utilities
//!
//! Helpers for building region weight maps and piecewise-constant phantoms,
//! e.g. to synthesise ground truth for the partial volume simulator.

/// Create a binary sphere weight map on a 3D volume
///
/// Voxels within the specified radius of the center get weight 1, all
/// others 0. Uses Fortran (column-major) ordering to match NIfTI convention:
/// index = x + y*nx + z*nx*ny.
///
/// # Arguments
/// * `nx`, `ny`, `nz` - Volume dimensions
/// * `center_x`, `center_y`, `center_z` - Sphere center in voxel coordinates
/// * `radius` - Sphere radius in voxels
///
/// # Returns
/// Flattened weight map of length nx*ny*nz
pub fn create_sphere_mask(
    nx: usize, ny: usize, nz: usize,
    center_x: f64, center_y: f64, center_z: f64,
    radius: f64,
) -> Vec<f64> {
    let mut mask = vec![0.0; nx * ny * nz];
    let r2 = radius * radius;

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let dx = i as f64 - center_x;
                let dy = j as f64 - center_y;
                let dz = k as f64 - center_z;
                if dx * dx + dy * dy + dz * dz <= r2 {
                    mask[i + j * nx + k * nx * ny] = 1.0;
                }
            }
        }
    }

    mask
}

/// Create a binary slab weight map spanning `z_start..z_end` (exclusive)
pub fn create_slab_mask(nx: usize, ny: usize, nz: usize, z_start: usize, z_end: usize) -> Vec<f64> {
    let slab = nx * ny;
    let mut mask = vec![0.0; slab * nz];
    for k in z_start.min(nz)..z_end.min(nz) {
        mask[k * slab..(k + 1) * slab].fill(1.0);
    }
    mask
}

/// Weight left over once the given layers are accounted for: max(0, 1 - sum)
///
/// Appending this layer to a stack of non-overlapping regions yields a
/// partition of unity (weights sum to 1 at every voxel).
pub fn remainder_mask(layers: &[Vec<f64>], n_total: usize) -> Vec<f64> {
    let mut rest = vec![1.0; n_total];
    for layer in layers {
        for (r, &w) in rest.iter_mut().zip(layer.iter()) {
            *r -= w;
        }
    }
    for r in rest.iter_mut() {
        *r = r.max(0.0);
    }
    rest
}

/// Build a piecewise-constant image: sum over regions of value[r] * layer[r]
pub fn piecewise_constant(layers: &[Vec<f64>], values: &[f64], n_total: usize) -> Vec<f64> {
    debug_assert_eq!(layers.len(), values.len());
    let mut image = vec![0.0; n_total];
    for (layer, &value) in layers.iter().zip(values) {
        for (v, &w) in image.iter_mut().zip(layer.iter()) {
            *v += value * w;
        }
    }
    image
}
