//! Common test utilities for PVC-core integration tests

#![allow(dead_code)]

use pvc_core::utils::mask::{create_slab_mask, create_sphere_mask, piecewise_constant, remainder_mask};
use pvc_core::{RegionMasks, Volume};

/// Compute RMSE between two arrays, only within mask (non-zero weights)
pub fn rmse(a: &[f64], b: &[f64], mask: &[f64]) -> f64 {
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for i in 0..a.len() {
        if mask[i] > 0.0 {
            let diff = a[i] - b[i];
            sum_sq += diff * diff;
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    (sum_sq / count as f64).sqrt()
}

/// Mean squared error over the whole volume
pub fn mse(a: &[f64], b: &[f64]) -> f64 {
    let sum_sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    sum_sq / a.len() as f64
}

/// Compute NRMSE (normalized by range of ground truth within mask)
pub fn nrmse(a: &[f64], b: &[f64], mask: &[f64]) -> f64 {
    let rmse_val = rmse(a, b, mask);

    let mut min_b = f64::INFINITY;
    let mut max_b = f64::NEG_INFINITY;
    for i in 0..b.len() {
        if mask[i] > 0.0 {
            if b[i] < min_b { min_b = b[i]; }
            if b[i] > max_b { max_b = b[i]; }
        }
    }

    let range = max_b - min_b;
    if range == 0.0 {
        return 0.0;
    }
    rmse_val / range
}

/// Mean value within mask
pub fn masked_mean(a: &[f64], mask: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut weight = 0.0;
    for i in 0..a.len() {
        sum += a[i] * mask[i];
        weight += mask[i];
    }
    if weight == 0.0 {
        return 0.0;
    }
    sum / weight
}

/// Two-region phantom: hot sphere in a warm background, as a partition of unity
pub struct SpherePhantom {
    pub truth: Volume,
    pub masks: RegionMasks,
    pub hot: Vec<f64>,
    pub background: Vec<f64>,
}

impl SpherePhantom {
    pub fn new(n: usize, radius: f64, hot_value: f64, background_value: f64, voxel_mm: f64) -> Self {
        let dims = (n, n, n);
        let voxel_size = (voxel_mm, voxel_mm, voxel_mm);
        let c = (n as f64 - 1.0) / 2.0;
        let hot = create_sphere_mask(n, n, n, c, c, c, radius);
        let background = remainder_mask(&[hot.clone()], n * n * n);
        let layers = vec![hot.clone(), background.clone()];
        let data = piecewise_constant(&layers, &[hot_value, background_value], n * n * n);

        SpherePhantom {
            truth: Volume::new(data, dims, voxel_size).expect("valid phantom geometry"),
            masks: RegionMasks::from_layers(layers, dims, voxel_size).expect("valid phantom masks"),
            hot,
            background,
        }
    }
}

/// One-voxel-thick hot plane in a zero background
pub struct SlabPhantom {
    pub truth: Volume,
    pub masks: RegionMasks,
    pub hot: Vec<f64>,
    pub background: Vec<f64>,
}

impl SlabPhantom {
    pub fn new(nx: usize, ny: usize, nz: usize, z: usize, hot_value: f64, voxel_mm: f64) -> Self {
        let dims = (nx, ny, nz);
        let voxel_size = (voxel_mm, voxel_mm, voxel_mm);
        let n_total = nx * ny * nz;
        let hot = create_slab_mask(nx, ny, nz, z, z + 1);
        let background = remainder_mask(&[hot.clone()], n_total);
        let layers = vec![hot.clone(), background.clone()];
        let data = piecewise_constant(&layers, &[hot_value, 0.0], n_total);

        SlabPhantom {
            truth: Volume::new(data, dims, voxel_size).expect("valid phantom geometry"),
            masks: RegionMasks::from_layers(layers, dims, voxel_size).expect("valid phantom masks"),
            hot,
            background,
        }
    }
}
