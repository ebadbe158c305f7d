//! In-memory image volumes
//!
//! Voxel data is stored flat in Fortran (column-major) order to match the
//! NIfTI convention: `index = x + y*nx + z*nx*ny`. Geometry (dimensions and
//! voxel size in mm) is fixed when a volume is created.

use crate::error::{PvcError, Result};

/// Relative tolerance used when comparing voxel sizes of two operands
const SPACING_TOLERANCE: f64 = 1e-6;

/// Index into 3D array (Fortran/column-major order)
#[inline(always)]
pub fn idx3d(i: usize, j: usize, k: usize, nx: usize, ny: usize) -> usize {
    i + j * nx + k * nx * ny
}

fn check_geometry(dims: (usize, usize, usize), voxel_size: (f64, f64, f64)) -> Result<()> {
    let (nx, ny, nz) = dims;
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(PvcError::input(
            "dims",
            format!("all dimensions must be non-zero, got {}x{}x{}", nx, ny, nz),
        ));
    }
    let (vsx, vsy, vsz) = voxel_size;
    for (axis, vs) in [vsx, vsy, vsz].into_iter().enumerate() {
        if !vs.is_finite() || vs <= 0.0 {
            return Err(PvcError::input(
                "voxel_size",
                format!("spacing along axis {} must be a positive real, got {}", axis, vs),
            ));
        }
    }
    Ok(())
}

fn same_spacing(a: f64, b: f64) -> bool {
    (a - b).abs() <= SPACING_TOLERANCE * a.abs().max(b.abs())
}

/// Compare the geometry of `operand` against a reference, naming the first axis that differs
pub(crate) fn ensure_geometry(
    operand: &str,
    expected: ((usize, usize, usize), (f64, f64, f64)),
    found: ((usize, usize, usize), (f64, f64, f64)),
) -> Result<()> {
    let (ed, ev) = expected;
    let (fd, fv) = found;
    let dims_e = [ed.0, ed.1, ed.2];
    let dims_f = [fd.0, fd.1, fd.2];
    for axis in 0..3 {
        if dims_e[axis] != dims_f[axis] {
            return Err(PvcError::ShapeMismatch {
                operand: operand.to_string(),
                axis,
                expected: format!("{} voxels", dims_e[axis]),
                found: format!("{} voxels", dims_f[axis]),
            });
        }
    }
    let vs_e = [ev.0, ev.1, ev.2];
    let vs_f = [fv.0, fv.1, fv.2];
    for axis in 0..3 {
        if !same_spacing(vs_e[axis], vs_f[axis]) {
            return Err(PvcError::ShapeMismatch {
                operand: operand.to_string(),
                axis,
                expected: format!("{} mm spacing", vs_e[axis]),
                found: format!("{} mm spacing", vs_f[axis]),
            });
        }
    }
    Ok(())
}

/// A 3D scalar image with voxel spacing
#[derive(Clone, Debug, PartialEq)]
pub struct Volume {
    data: Vec<f64>,
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
}

impl Volume {
    /// Wrap a flat voxel buffer
    ///
    /// # Arguments
    /// * `data` - Voxel intensities, length nx*ny*nz, Fortran order
    /// * `dims` - Volume dimensions (nx, ny, nz)
    /// * `voxel_size` - Voxel sizes in mm
    pub fn new(data: Vec<f64>, dims: (usize, usize, usize), voxel_size: (f64, f64, f64)) -> Result<Self> {
        check_geometry(dims, voxel_size)?;
        let expected = dims.0 * dims.1 * dims.2;
        if data.len() != expected {
            return Err(PvcError::input(
                "data",
                format!(
                    "buffer holds {} voxels but {}x{}x{} needs {}",
                    data.len(), dims.0, dims.1, dims.2, expected
                ),
            ));
        }
        Ok(Self { data, dims, voxel_size })
    }

    /// Volume filled with a constant value
    pub fn filled(value: f64, dims: (usize, usize, usize), voxel_size: (f64, f64, f64)) -> Result<Self> {
        check_geometry(dims, voxel_size)?;
        Ok(Self {
            data: vec![value; dims.0 * dims.1 * dims.2],
            dims,
            voxel_size,
        })
    }

    pub fn zeros(dims: (usize, usize, usize), voxel_size: (f64, f64, f64)) -> Result<Self> {
        Self::filled(0.0, dims, voxel_size)
    }

    /// New volume with this volume's geometry and a buffer of the same length
    pub(crate) fn with_data(&self, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            data,
            dims: self.dims,
            voxel_size: self.voxel_size,
        }
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    pub fn voxel_size(&self) -> (f64, f64, f64) {
        self.voxel_size
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Voxel value at (i, j, k)
    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<f64> {
        let (nx, ny, nz) = self.dims;
        if i >= nx || j >= ny || k >= nz {
            return None;
        }
        Some(self.data[idx3d(i, j, k, nx, ny)])
    }

    /// Sum of all voxel values
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Fail with `ShapeMismatch` unless `other` has the same dims and spacing
    pub fn ensure_same_geometry(&self, other: &Volume, operand: &str) -> Result<()> {
        ensure_geometry(
            operand,
            (self.dims, self.voxel_size),
            (other.dims, other.voxel_size),
        )
    }
}

/// Ordered stack of region membership maps
///
/// Each layer holds one region's (possibly fractional) weight per voxel.
/// Layers are independent: a voxel may belong to several regions.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionMasks {
    layers: Vec<Vec<f64>>,
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
}

impl RegionMasks {
    /// Build a stack from individual weight layers sharing one geometry
    pub fn from_layers(
        layers: Vec<Vec<f64>>,
        dims: (usize, usize, usize),
        voxel_size: (f64, f64, f64),
    ) -> Result<Self> {
        check_geometry(dims, voxel_size)?;
        let n_total = dims.0 * dims.1 * dims.2;
        for (r, layer) in layers.iter().enumerate() {
            if layer.len() != n_total {
                return Err(PvcError::input(
                    format!("mask[{}]", r),
                    format!("layer holds {} voxels, expected {}", layer.len(), n_total),
                ));
            }
            if let Some(pos) = layer.iter().position(|w| !w.is_finite() || *w < 0.0) {
                return Err(PvcError::input(
                    format!("mask[{}]", r),
                    format!("weight {} at voxel {} is not a non-negative real", layer[pos], pos),
                ));
            }
        }
        Ok(Self { layers, dims, voxel_size })
    }

    /// Build a stack from volumes, checking every layer against the first
    pub fn from_volumes(volumes: Vec<Volume>) -> Result<Self> {
        let first = volumes
            .first()
            .ok_or_else(|| PvcError::input("masks", "at least one region layer is required"))?;
        let dims = first.dims();
        let voxel_size = first.voxel_size();
        for (r, v) in volumes.iter().enumerate().skip(1) {
            first.ensure_same_geometry(v, &format!("mask[{}]", r))?;
        }
        let layers = volumes.into_iter().map(Volume::into_data).collect();
        Self::from_layers(layers, dims, voxel_size)
    }

    /// Split a flat 4D buffer (x fastest, region index slowest) into layers
    pub fn from_4d(
        data: &[f64],
        dims: (usize, usize, usize),
        n_regions: usize,
        voxel_size: (f64, f64, f64),
    ) -> Result<Self> {
        let n_total = dims.0 * dims.1 * dims.2;
        if data.len() != n_total * n_regions {
            return Err(PvcError::input(
                "masks",
                format!(
                    "4D buffer holds {} values, expected {} regions of {} voxels",
                    data.len(), n_regions, n_total
                ),
            ));
        }
        let layers = data.chunks(n_total.max(1)).map(|c| c.to_vec()).collect();
        Self::from_layers(layers, dims, voxel_size)
    }

    /// One binary layer per distinct non-zero label, in ascending label order
    ///
    /// Returns the stack together with the label each layer came from.
    pub fn from_labels(
        labels: &[u32],
        dims: (usize, usize, usize),
        voxel_size: (f64, f64, f64),
    ) -> Result<(Self, Vec<u32>)> {
        let n_total = dims.0 * dims.1 * dims.2;
        if labels.len() != n_total {
            return Err(PvcError::input(
                "labels",
                format!("label map holds {} voxels, expected {}", labels.len(), n_total),
            ));
        }
        let mut ids: Vec<u32> = labels.iter().copied().filter(|&l| l != 0).collect();
        ids.sort_unstable();
        ids.dedup();

        let layers = ids
            .iter()
            .map(|&id| {
                labels
                    .iter()
                    .map(|&l| if l == id { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect();
        Ok((Self::from_layers(layers, dims, voxel_size)?, ids))
    }

    pub fn n_regions(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, r: usize) -> Option<&[f64]> {
        self.layers.get(r).map(|l| l.as_slice())
    }

    pub fn layers(&self) -> &[Vec<f64>] {
        &self.layers
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    pub fn voxel_size(&self) -> (f64, f64, f64) {
        self.voxel_size
    }

    /// Layer `r` as a standalone volume
    pub fn layer_volume(&self, r: usize) -> Option<Volume> {
        self.layers.get(r).map(|l| Volume {
            data: l.clone(),
            dims: self.dims,
            voxel_size: self.voxel_size,
        })
    }

    /// Total weight per voxel summed over all regions
    pub fn coverage(&self) -> Vec<f64> {
        let n_total = self.dims.0 * self.dims.1 * self.dims.2;
        let mut cover = vec![0.0; n_total];
        for layer in &self.layers {
            for (c, &w) in cover.iter_mut().zip(layer.iter()) {
                *c += w;
            }
        }
        cover
    }

    /// Fail with `ShapeMismatch` unless the stack matches `volume`'s geometry
    pub fn ensure_matches(&self, volume: &Volume) -> Result<()> {
        ensure_geometry(
            "masks",
            (volume.dims(), volume.voxel_size()),
            (self.dims, self.voxel_size),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_rejects_bad_length() {
        let err = Volume::new(vec![0.0; 7], (2, 2, 2), (1.0, 1.0, 1.0)).unwrap_err();
        assert!(matches!(err, PvcError::InvalidInput { .. }));
    }

    #[test]
    fn test_volume_rejects_bad_spacing() {
        assert!(Volume::zeros((2, 2, 2), (1.0, 0.0, 1.0)).is_err());
        assert!(Volume::zeros((2, 2, 2), (1.0, 1.0, f64::NAN)).is_err());
        assert!(Volume::zeros((0, 2, 2), (1.0, 1.0, 1.0)).is_err());
    }

    #[test]
    fn test_volume_indexing_fortran_order() {
        let data: Vec<f64> = (0..24).map(|i| i as f64).collect();
        let vol = Volume::new(data, (2, 3, 4), (1.0, 1.0, 1.0)).unwrap();
        assert_eq!(vol.get(1, 0, 0), Some(1.0));
        assert_eq!(vol.get(0, 1, 0), Some(2.0));
        assert_eq!(vol.get(0, 0, 1), Some(6.0));
        assert_eq!(vol.get(1, 2, 3), Some(23.0));
        assert_eq!(vol.get(2, 0, 0), None);
    }

    #[test]
    fn test_geometry_mismatch_reports_axis() {
        let a = Volume::zeros((4, 4, 4), (2.0, 2.0, 2.0)).unwrap();
        let b = Volume::zeros((4, 5, 4), (2.0, 2.0, 2.0)).unwrap();
        match a.ensure_same_geometry(&b, "other").unwrap_err() {
            PvcError::ShapeMismatch { operand, axis, .. } => {
                assert_eq!(operand, "other");
                assert_eq!(axis, 1);
            }
            e => panic!("unexpected error {:?}", e),
        }

        let c = Volume::zeros((4, 4, 4), (2.0, 2.0, 2.5)).unwrap();
        match a.ensure_same_geometry(&c, "other").unwrap_err() {
            PvcError::ShapeMismatch { axis, .. } => assert_eq!(axis, 2),
            e => panic!("unexpected error {:?}", e),
        }

        // Tiny spacing differences from header rounding are accepted
        let d = Volume::zeros((4, 4, 4), (2.0 + 1e-9, 2.0, 2.0)).unwrap();
        assert!(a.ensure_same_geometry(&d, "other").is_ok());
    }

    #[test]
    fn test_masks_from_4d_splits_layers() {
        let dims = (2, 2, 1);
        let data = vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0];
        let masks = RegionMasks::from_4d(&data, dims, 2, (1.0, 1.0, 1.0)).unwrap();
        assert_eq!(masks.n_regions(), 2);
        assert_eq!(masks.layer(0).unwrap(), &[1.0, 1.0, 0.0, 0.0]);
        assert_eq!(masks.layer(1).unwrap(), &[0.0, 0.0, 1.0, 1.0]);
        assert_eq!(masks.coverage(), vec![1.0; 4]);
    }

    #[test]
    fn test_masks_reject_negative_weight() {
        let err = RegionMasks::from_layers(vec![vec![0.5, -0.1]], (2, 1, 1), (1.0, 1.0, 1.0)).unwrap_err();
        match err {
            PvcError::InvalidInput { operand, .. } => assert_eq!(operand, "mask[0]"),
            e => panic!("unexpected error {:?}", e),
        }
    }

    #[test]
    fn test_masks_from_labels() {
        let labels = vec![0, 3, 3, 1, 0, 1];
        let (masks, ids) = RegionMasks::from_labels(&labels, (3, 2, 1), (1.0, 1.0, 1.0)).unwrap();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(masks.layer(0).unwrap(), &[0.0, 0.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(masks.layer(1).unwrap(), &[0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_masks_from_volumes_checks_geometry() {
        let a = Volume::zeros((3, 3, 3), (1.0, 1.0, 1.0)).unwrap();
        let b = Volume::zeros((3, 3, 3), (1.0, 2.0, 1.0)).unwrap();
        let err = RegionMasks::from_volumes(vec![a, b]).unwrap_err();
        match err {
            PvcError::ShapeMismatch { operand, axis, .. } => {
                assert_eq!(operand, "mask[1]");
                assert_eq!(axis, 1);
            }
            e => panic!("unexpected error {:?}", e),
        }
        assert!(RegionMasks::from_volumes(Vec::new()).is_err());
    }
}
