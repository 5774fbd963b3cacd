//! Sharpening module
//!
//! Numerical stages of the pansharpening pipeline: resampling onto the
//! panchromatic grid, shift refinement, normalization, Brovey fusion and
//! contrast enhancement.

pub mod brovey;
pub mod clahe;
pub mod interpolation;
pub mod normalize;
pub mod phase_correlation;
pub mod resample;
pub mod shift;

pub use brovey::{BroveyOutput, brovey_transform};
pub use clahe::{HistEqMethod, apply_histeq, equalize_clahe, equalize_histogram};
pub use interpolation::ResamplingKernel;
pub use normalize::{Normalized, min_max_normalize, to_u8};
pub use phase_correlation::{PhaseCorrelator, ShiftEstimate};
pub use resample::{AffineReprojector, Reprojector};
pub use shift::{ShiftRefiner, translate};
