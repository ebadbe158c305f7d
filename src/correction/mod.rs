//! Partial volume correction methods
//!
//! - RL: Richardson-Lucy iterative deconvolution
//! - RBV: Region-based voxel-wise correction using anatomical region masks

pub mod rl;
pub mod rbv;

pub use rl::{
    richardson_lucy, richardson_lucy_default, richardson_lucy_with, richardson_lucy_with_progress,
    RichardsonLucyParams, RichardsonLucyResult, DEFAULT_ITERATIONS,
};
pub use rbv::{masked_region_means, rbv_correct, rbv_correct_with, RbvParams, RbvResult, RegionMeanMethod};
