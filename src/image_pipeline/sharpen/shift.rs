//! Registration of multispectral bands against the panchromatic band.

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::image_pipeline::common::error::{PansharpenError, Result};
use crate::image_pipeline::sharpen::interpolation::{Boundary, OPENCV_CUBIC_A, sample_cubic};
use crate::image_pipeline::sharpen::phase_correlation::{PhaseCorrelator, ShiftEstimate};

/// Moves the content of `image` by `offset` (Δrow, Δcol):
/// `out(r, c) = image(r - Δrow, c - Δcol)`, OpenCV cubic interpolation
/// (a = -0.75), zero outside.
pub fn translate(image: &ArrayView2<f32>, offset: (f64, f64)) -> Array2<f32> {
    let (dr, dc) = offset;
    let mut out = Array2::<f32>::zeros(image.dim());
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(r, mut out_row)| {
            for (c, px) in out_row.iter_mut().enumerate() {
                *px = sample_cubic(
                    image,
                    r as f64 - dr,
                    c as f64 - dc,
                    OPENCV_CUBIC_A,
                    Boundary::Zero,
                );
            }
        });
    out
}

/// Estimates and removes the translation between a band and the reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftRefiner {
    correlator: PhaseCorrelator,
    min_confidence: Option<f64>,
}

impl ShiftRefiner {
    pub fn new(upsample_factor: usize, min_confidence: Option<f64>) -> Self {
        Self {
            correlator: PhaseCorrelator::new(upsample_factor),
            min_confidence,
        }
    }

    /// Returns `target` registered onto `reference` together with the
    /// displacement that was removed.
    #[instrument(skip(self, reference, target))]
    pub fn refine(
        &self,
        band: &str,
        reference: &ArrayView2<f32>,
        target: &ArrayView2<f32>,
    ) -> Result<(Array2<f32>, ShiftEstimate)> {
        let estimate = self.correlator.estimate(reference, target)?;
        let (dr, dc) = estimate.shift;

        info!(
            band,
            shift_row = dr,
            shift_col = dc,
            confidence = estimate.confidence,
            "Estimated band shift"
        );

        if let Some(threshold) = self.min_confidence {
            if estimate.confidence < threshold {
                warn!(band, confidence = estimate.confidence, threshold, "Alignment rejected");
                return Err(PansharpenError::AlignmentError {
                    band: band.to_string(),
                    confidence: estimate.confidence,
                    threshold,
                });
            }
        }

        Ok((translate(target, (-dr, -dc)), estimate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn textured(dr: f64, dc: f64) -> Array2<f32> {
        Array2::from_shape_fn((64, 64), |(r, c)| {
            let y = r as f64 - dr;
            let x = c as f64 - dc;
            let a = (-((y - 22.0).powi(2) + (x - 26.0).powi(2)) / 18.0).exp();
            let b = 0.7 * (-((y - 40.0).powi(2) + (x - 38.0).powi(2)) / 32.0).exp();
            let d = 0.5 * (-((y - 30.0).powi(2) + (x - 14.0).powi(2)) / 12.0).exp();
            (a + b + d) as f32
        })
    }

    fn mean_abs_error(a: &Array2<f32>, b: &Array2<f32>) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum::<f32>() / a.len() as f32
    }

    #[test]
    fn test_translate_integer_offset() {
        let image = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let out = translate(&image.view(), (1.0, 0.0));
        assert_eq!(out.row(0).to_vec(), vec![0.0, 0.0, 0.0]);
        for c in 0..3 {
            assert!((out[[1, c]] - image[[0, c]]).abs() < 1e-6);
            assert!((out[[2, c]] - image[[1, c]]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_translate_half_pixel_uses_opencv_kernel() {
        let mut image = Array2::<f32>::zeros((4, 8));
        image.column_mut(2).fill(1.0);
        let out = translate(&image.view(), (0.0, 0.5));
        for r in 0..4 {
            assert!((out[[r, 2]] - 0.59375).abs() < 1e-6, "{}", out[[r, 2]]);
            assert!((out[[r, 3]] - 0.59375).abs() < 1e-6);
            assert!((out[[r, 4]] + 0.09375).abs() < 1e-6);
        }
    }

    #[test]
    fn test_translate_preserves_shape() {
        let image = Array2::<f32>::ones((7, 11));
        assert_eq!(translate(&image.view(), (0.4, -2.6)).dim(), (7, 11));
    }

    #[test]
    fn test_refine_registers_shifted_band() {
        let reference = textured(0.0, 0.0);
        let target = textured(2.3, -1.7);

        let before = mean_abs_error(&reference, &target);
        let (corrected, estimate) = ShiftRefiner::new(10, None)
            .refine("red", &reference.view(), &target.view())
            .unwrap();
        let after = mean_abs_error(&reference, &corrected);

        assert!((estimate.shift.0 - 2.3).abs() <= 0.1);
        assert!((estimate.shift.1 + 1.7).abs() <= 0.1);
        assert!(after < before / 5.0, "before {before}, after {after}");
    }

    #[test]
    fn test_confidence_gate_rejects() {
        let flat = Array2::from_elem((16, 16), 1.0f32);
        let err = ShiftRefiner::new(10, Some(0.5))
            .refine("green", &flat.view(), &flat.view())
            .unwrap_err();
        match err {
            PansharpenError::AlignmentError { band, threshold, .. } => {
                assert_eq!(band, "green");
                assert_eq!(threshold, 0.5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_gate_accepts_flat_input() {
        let flat = Array2::from_elem((16, 16), 1.0f32);
        let (out, estimate) = ShiftRefiner::default()
            .refine("blue", &flat.view(), &flat.view())
            .unwrap();
        assert_eq!(estimate.shift, (0.0, 0.0));
        assert_eq!(out, flat);
    }
}
