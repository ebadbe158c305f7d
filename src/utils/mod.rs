//! Utility functions for partial volume correction
//!
//! - Region mask and phantom construction
//! - SIMD-accelerated voxel-wise operations (optional, with `simd` feature)

pub mod mask;
pub mod simd_ops;

pub use mask::*;
pub use simd_ops::*;
