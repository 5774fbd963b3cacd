use ndarray::{Array2, Zip};
use tracing::{debug, instrument};

use crate::image_pipeline::common::error::{PansharpenError, Result};
use crate::image_pipeline::raster::MultispectralStack;

pub const DEFAULT_BANDS_FACTOR: f32 = 3.0;
pub const DEFAULT_BROVEY_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone)]
pub struct BroveyOutput {
    pub stack: MultispectralStack,
    /// Pixels whose multispectral sum fell below epsilon and were set to 0.
    pub zeroed_pixels: usize,
}

/// Brovey ratio fusion.
///
/// For every pixel `scale = bands_factor * pan / max(r + g + b, epsilon)` and
/// each channel becomes `band * scale`. Where `r + g + b < epsilon` all three
/// outputs are exactly 0 whatever the panchromatic value.
#[instrument(skip(stack, pan))]
pub fn brovey_transform(
    stack: &MultispectralStack,
    pan: &Array2<f32>,
    bands_factor: f32,
    epsilon: f32,
) -> Result<BroveyOutput> {
    if stack.shape() != pan.dim() {
        return Err(PansharpenError::ShapeMismatch {
            expected: pan.dim(),
            actual: stack.shape(),
        });
    }

    let [red, green, blue] = stack.bands();
    let scale = Zip::from(red)
        .and(green)
        .and(blue)
        .and(pan)
        .par_map_collect(|&r, &g, &b, &p| {
            let sum = r + g + b;
            if sum < epsilon {
                0.0
            } else {
                bands_factor * p / sum
            }
        });

    let zeroed_pixels = Zip::from(red)
        .and(green)
        .and(blue)
        .fold(0usize, |n, &r, &g, &b| n + usize::from(r + g + b < epsilon));

    let sharpened = [red * &scale, green * &scale, blue * &scale];
    debug!(zeroed_pixels, "Brovey fusion complete");

    Ok(BroveyOutput {
        stack: MultispectralStack::new(sharpened)?,
        zeroed_pixels,
    })
}
