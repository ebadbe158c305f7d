//! SIMD-accelerated voxel-wise operations
//!
//! Vectorized versions of the per-voxel steps shared by the Richardson-Lucy
//! and RBV corrections. When the `simd` feature is enabled these use 256-bit
//! SIMD (f64x4); otherwise the scalar fallbacks are compiled.

#[cfg(feature = "simd")]
use wide::{f64x4, CmpLt};

/// SIMD lane width (4 for f64x4)
#[cfg(feature = "simd")]
pub const SIMD_WIDTH: usize = 4;

#[cfg(not(feature = "simd"))]
pub const SIMD_WIDTH: usize = 1;

#[cfg(feature = "simd")]
#[inline(always)]
fn load4(a: &[f64], idx: usize) -> f64x4 {
    f64x4::new([a[idx], a[idx + 1], a[idx + 2], a[idx + 3]])
}

// ============================================================================
// Guarded division
// ============================================================================

/// Compute out[i] = num[i] / den[i], or 0 where den[i] < eps
///
/// Returns the number of guarded voxels.
#[cfg(feature = "simd")]
pub fn guarded_ratio_f64(out: &mut [f64], num: &[f64], den: &[f64], eps: f64) -> usize {
    debug_assert!(out.len() == num.len() && num.len() == den.len());
    let n = out.len();
    let chunks = n / SIMD_WIDTH;

    let veps = f64x4::splat(eps);
    let mut guarded = 0usize;

    for c in 0..chunks {
        let idx = c * SIMD_WIDTH;
        let vn = load4(num, idx);
        let vd = load4(den, idx);
        let small = vd.cmp_lt(veps);
        // Divide by 1 in guarded lanes so no Inf/NaN is ever formed
        let safe_den = small.blend(f64x4::ONE, vd);
        let result = small.blend(f64x4::ZERO, vn / safe_den);
        out[idx..idx + SIMD_WIDTH].copy_from_slice(&result.to_array());
        guarded += small.move_mask().count_ones() as usize;
    }

    for i in chunks * SIMD_WIDTH..n {
        if den[i] < eps {
            out[i] = 0.0;
            guarded += 1;
        } else {
            out[i] = num[i] / den[i];
        }
    }

    guarded
}

#[cfg(not(feature = "simd"))]
pub fn guarded_ratio_f64(out: &mut [f64], num: &[f64], den: &[f64], eps: f64) -> usize {
    debug_assert!(out.len() == num.len() && num.len() == den.len());
    let mut guarded = 0usize;
    for ((o, &n), &d) in out.iter_mut().zip(num).zip(den) {
        if d < eps {
            *o = 0.0;
            guarded += 1;
        } else {
            *o = n / d;
        }
    }
    guarded
}

// ============================================================================
// Element-wise products
// ============================================================================

/// Compute a[i] = a[i] * b[i]
#[cfg(feature = "simd")]
#[inline]
pub fn multiply_in_place_f64(a: &mut [f64], b: &[f64]) {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    let chunks = n / SIMD_WIDTH;

    for c in 0..chunks {
        let idx = c * SIMD_WIDTH;
        let result = load4(a, idx) * load4(b, idx);
        a[idx..idx + SIMD_WIDTH].copy_from_slice(&result.to_array());
    }

    for i in chunks * SIMD_WIDTH..n {
        a[i] *= b[i];
    }
}

#[cfg(not(feature = "simd"))]
#[inline]
pub fn multiply_in_place_f64(a: &mut [f64], b: &[f64]) {
    debug_assert_eq!(a.len(), b.len());
    for (ai, &bi) in a.iter_mut().zip(b) {
        *ai *= bi;
    }
}

/// Compute a[i] = a[i] + alpha * b[i] (axpy operation)
#[cfg(feature = "simd")]
#[inline]
pub fn axpy_f64(a: &mut [f64], alpha: f64, b: &[f64]) {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    let chunks = n / SIMD_WIDTH;
    let valpha = f64x4::splat(alpha);

    for c in 0..chunks {
        let idx = c * SIMD_WIDTH;
        let result = load4(a, idx) + valpha * load4(b, idx);
        a[idx..idx + SIMD_WIDTH].copy_from_slice(&result.to_array());
    }

    for i in chunks * SIMD_WIDTH..n {
        a[i] += alpha * b[i];
    }
}

#[cfg(not(feature = "simd"))]
#[inline]
pub fn axpy_f64(a: &mut [f64], alpha: f64, b: &[f64]) {
    debug_assert_eq!(a.len(), b.len());
    for (ai, &bi) in a.iter_mut().zip(b) {
        *ai += alpha * bi;
    }
}

// ============================================================================
// Reductions
// ============================================================================

/// Compute dot product: sum(a[i] * b[i])
#[cfg(feature = "simd")]
#[inline]
pub fn dot_product_f64(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    let chunks = n / SIMD_WIDTH;

    let mut sum = f64x4::ZERO;
    for c in 0..chunks {
        let idx = c * SIMD_WIDTH;
        sum += load4(a, idx) * load4(b, idx);
    }

    let mut result = sum.reduce_add();
    for i in chunks * SIMD_WIDTH..n {
        result += a[i] * b[i];
    }
    result
}

#[cfg(not(feature = "simd"))]
#[inline]
pub fn dot_product_f64(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(&ai, &bi)| ai * bi).sum()
}

/// Sum of all elements
#[inline]
pub fn sum_f64(a: &[f64]) -> f64 {
    a.iter().sum()
}
