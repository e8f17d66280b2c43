//! Common algorithms and utilities.

mod autocorr;
mod f32_array_ext;
mod smoothing;

pub use autocorr::normalized_autocorr;
pub use f32_array_ext::F32ArrayExt;
pub use smoothing::{block_average, centered_moving_average, convolve_normalized, gaussian_kernel};
