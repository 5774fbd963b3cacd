//! Sub-pixel translation estimation by phase correlation.
//!
//! 1. 2-D FFT of both images (row FFTs, transpose, column FFTs).
//! 2. Normalized cross-power spectrum `conj(F_ref) * F_tgt / |...|`.
//! 3. Inverse FFT; the integer peak gives the whole-pixel shift.
//! 4. A matrix-multiply DFT evaluates the correlation on a `1 / factor`
//!    grid around that peak to refine it.

use std::sync::Arc;

use ndarray::ArrayView2;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::image_pipeline::common::error::{PansharpenError, Result};

/// Default upsampling factor: shifts are resolved to 0.1 pixel.
pub const DEFAULT_UPSAMPLE_FACTOR: usize = 10;

// Cross-power bins with a smaller magnitude are not amplified to unit length.
// Inputs are f32, so bins below this hold only single-precision rounding.
const MAGNITUDE_FLOOR: f64 = 100.0 * f32::EPSILON as f64;

/// Estimated displacement of a target image relative to a reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftEstimate {
    /// (Δrow, Δcol) such that `target(p) ≈ reference(p - shift)`.
    pub shift: (f64, f64),
    /// Height of the integer correlation peak, in [0, 1].
    pub peak_value: f64,
    /// Primary-to-secondary peak ratio mapped to [0, 1].
    pub confidence: f64,
}

impl ShiftEstimate {
    pub fn zero() -> Self {
        Self {
            shift: (0.0, 0.0),
            peak_value: 0.0,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PhaseCorrelator {
    upsample_factor: usize,
}

impl Default for PhaseCorrelator {
    fn default() -> Self {
        Self::new(DEFAULT_UPSAMPLE_FACTOR)
    }
}

struct Plans {
    row_forward: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
}

impl PhaseCorrelator {
    /// `upsample_factor` of 0 or 1 reports whole-pixel shifts.
    pub fn new(upsample_factor: usize) -> Self {
        Self {
            upsample_factor: upsample_factor.max(1),
        }
    }

    pub fn upsample_factor(&self) -> usize {
        self.upsample_factor
    }

    pub fn estimate(
        &self,
        reference: &ArrayView2<f32>,
        target: &ArrayView2<f32>,
    ) -> Result<ShiftEstimate> {
        if reference.dim() != target.dim() {
            return Err(PansharpenError::ShapeMismatch {
                expected: reference.dim(),
                actual: target.dim(),
            });
        }
        let (rows, cols) = reference.dim();
        if rows == 0 || cols == 0 {
            return Err(PansharpenError::InvalidDimensions(cols, rows));
        }

        let mut planner = FftPlanner::<f64>::new();
        let plans = Plans {
            row_forward: planner.plan_fft_forward(cols),
            col_forward: planner.plan_fft_forward(rows),
            row_inverse: planner.plan_fft_inverse(cols),
            col_inverse: planner.plan_fft_inverse(rows),
        };

        let ref_fft = fft_2d(to_complex(reference), rows, cols, &plans.row_forward, &plans.col_forward);
        let tar_fft = fft_2d(to_complex(target), rows, cols, &plans.row_forward, &plans.col_forward);
        let cross_power = cross_power_spectrum(&ref_fft, &tar_fft);

        let correlation = fft_2d(cross_power.clone(), rows, cols, &plans.row_inverse, &plans.col_inverse);
        let norm = 1.0 / (rows * cols) as f64;
        let magnitude: Vec<f64> = correlation.iter().map(|c| c.norm() * norm).collect();

        let (peak_index, peak_value) = argmax(&magnitude);
        let floor_value = magnitude.iter().copied().fold(f64::INFINITY, f64::min);
        if peak_value < 1e-12 || peak_value - floor_value < 1e-12 {
            return Ok(ShiftEstimate::zero());
        }

        let (peak_r, peak_c) = (peak_index / cols, peak_index % cols);
        let confidence = compute_confidence(&magnitude, rows, cols, peak_r, peak_c, peak_value);

        let mut shift = (wrap(peak_r, rows), wrap(peak_c, cols));
        if self.upsample_factor > 1 {
            shift = self.refine(&cross_power, rows, cols, shift);
        }

        Ok(ShiftEstimate {
            shift,
            peak_value,
            confidence,
        })
    }

    /// Evaluates the correlation on a `ceil(1.5 * factor)` square grid with
    /// `1 / factor` spacing centred on `initial` and moves to its maximum.
    fn refine(
        &self,
        cross_power: &[Complex<f64>],
        rows: usize,
        cols: usize,
        initial: (f64, f64),
    ) -> (f64, f64) {
        let factor = self.upsample_factor as f64;
        let initial = (
            (initial.0 * factor).round() / factor,
            (initial.1 * factor).round() / factor,
        );
        let region = (factor * 1.5).ceil() as usize;
        let dftshift = (region / 2) as f64;

        let row_coords: Vec<f64> = (0..region)
            .map(|j| initial.0 + (j as f64 - dftshift) / factor)
            .collect();
        let col_coords: Vec<f64> = (0..region)
            .map(|j| initial.1 + (j as f64 - dftshift) / factor)
            .collect();

        let upsampled = upsampled_dft(cross_power, rows, cols, &row_coords, &col_coords);
        let magnitude: Vec<f64> = upsampled.iter().map(|c| c.norm()).collect();

        let floor_value = magnitude.iter().copied().fold(f64::INFINITY, f64::min);
        let (index, peak) = argmax(&magnitude);
        if peak - floor_value <= 1e-12 * peak.max(1.0) {
            return initial;
        }

        (row_coords[index / region], col_coords[index % region])
    }
}

fn to_complex(image: &ArrayView2<f32>) -> Vec<Complex<f64>> {
    image.iter().map(|&v| Complex::new(f64::from(v), 0.0)).collect()
}

/// 2-D transform of a row-major `rows x cols` buffer.
fn fft_2d(
    mut data: Vec<Complex<f64>>,
    rows: usize,
    cols: usize,
    row_fft: &Arc<dyn Fft<f64>>,
    col_fft: &Arc<dyn Fft<f64>>,
) -> Vec<Complex<f64>> {
    // A buffer holding several rows is transformed row by row
    row_fft.process(&mut data);
    let mut transposed = transpose(&data, rows, cols);
    col_fft.process(&mut transposed);
    transpose(&transposed, cols, rows)
}

fn transpose(data: &[Complex<f64>], rows: usize, cols: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); data.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = data[r * cols + c];
        }
    }
    out
}

fn cross_power_spectrum(ref_fft: &[Complex<f64>], tar_fft: &[Complex<f64>]) -> Vec<Complex<f64>> {
    ref_fft
        .iter()
        .zip(tar_fft.iter())
        .map(|(&a, &b)| {
            let product = a.conj() * b;
            product / product.norm().max(MAGNITUDE_FLOOR)
        })
        .collect()
}

/// Signed frequency of FFT bin `k` in cycles per sample.
fn frequency(k: usize, n: usize) -> f64 {
    if k < n.div_ceil(2) {
        k as f64 / n as f64
    } else {
        (k as f64 - n as f64) / n as f64
    }
}

/// Inverse DFT of `spectrum` evaluated at arbitrary (row, col) positions.
fn upsampled_dft(
    spectrum: &[Complex<f64>],
    rows: usize,
    cols: usize,
    row_coords: &[f64],
    col_coords: &[f64],
) -> Vec<Complex<f64>> {
    use std::f64::consts::TAU;

    let col_kernel: Vec<Complex<f64>> = (0..cols)
        .flat_map(|l| {
            let f = frequency(l, cols);
            col_coords
                .iter()
                .map(move |&x| Complex::from_polar(1.0, TAU * f * x))
        })
        .collect();

    // partial[k][x] = sum_l spectrum[k][l] * col_kernel[l][x]
    let nx = col_coords.len();
    let mut partial = vec![Complex::new(0.0, 0.0); rows * nx];
    for k in 0..rows {
        let spectrum_row = &spectrum[k * cols..(k + 1) * cols];
        let out_row = &mut partial[k * nx..(k + 1) * nx];
        for (l, &s) in spectrum_row.iter().enumerate() {
            let kernel_row = &col_kernel[l * nx..(l + 1) * nx];
            for (o, &w) in out_row.iter_mut().zip(kernel_row) {
                *o += s * w;
            }
        }
    }

    let ny = row_coords.len();
    let mut out = vec![Complex::new(0.0, 0.0); ny * nx];
    for (j, &y) in row_coords.iter().enumerate() {
        let out_row = &mut out[j * nx..(j + 1) * nx];
        for k in 0..rows {
            let w = Complex::from_polar(1.0, TAU * frequency(k, rows) * y);
            let partial_row = &partial[k * nx..(k + 1) * nx];
            for (o, &p) in out_row.iter_mut().zip(partial_row) {
                *o += w * p;
            }
        }
    }
    out
}

fn argmax(values: &[f64]) -> (usize, f64) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best })
}

/// Peak index to a signed shift; indices past the midpoint wrap negative.
fn wrap(index: usize, size: usize) -> f64 {
    if index > size / 2 {
        index as f64 - size as f64
    } else {
        index as f64
    }
}

/// `clamp(peak / second_peak - 1, 0, 9) / 9`, the second peak searched at
/// least `max(rows, cols) / 8` pixels away from the primary one.
fn compute_confidence(
    magnitude: &[f64],
    rows: usize,
    cols: usize,
    peak_r: usize,
    peak_c: usize,
    peak_value: f64,
) -> f64 {
    let min_dist = (rows.max(cols) / 8).max(1);
    let mut second_peak = 0.0f64;

    for r in 0..rows {
        let dr = r.abs_diff(peak_r);
        let dr = dr.min(rows - dr);
        for c in 0..cols {
            let dc = c.abs_diff(peak_c);
            let dc = dc.min(cols - dc);
            if dr >= min_dist || dc >= min_dist {
                second_peak = second_peak.max(magnitude[r * cols + c]);
            }
        }
    }

    if second_peak > 1e-10 {
        ((peak_value / second_peak - 1.0).clamp(0.0, 9.0)) / 9.0
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Gaussian blobs well inside a 64x64 frame, displaced by (dr, dc).
    fn blob_image(dr: f64, dc: f64) -> Array2<f32> {
        const BLOBS: [(f64, f64, f64, f64); 5] = [
            (20.0, 18.0, 3.0, 1.0),
            (40.0, 44.0, 4.0, 0.8),
            (30.0, 30.0, 2.5, 0.6),
            (12.0, 46.0, 2.0, 0.7),
            (48.0, 16.0, 3.0, 0.9),
        ];
        Array2::from_shape_fn((64, 64), |(r, c)| {
            BLOBS
                .iter()
                .map(|&(br, bc, sigma, amp)| {
                    let y = r as f64 - dr - br;
                    let x = c as f64 - dc - bc;
                    amp * (-(x * x + y * y) / (2.0 * sigma * sigma)).exp()
                })
                .sum::<f64>() as f32
        })
    }

    #[test]
    fn test_identical_images() {
        let image = blob_image(0.0, 0.0);
        let est = PhaseCorrelator::default()
            .estimate(&image.view(), &image.view())
            .unwrap();
        assert!(est.shift.0.abs() < 1e-9 && est.shift.1.abs() < 1e-9, "{:?}", est.shift);
        assert!(est.peak_value > 0.2);
        assert!(est.confidence > 0.5);
    }

    #[test]
    fn test_integer_shift_with_wraparound() {
        let reference = blob_image(0.0, 0.0);
        let target = blob_image(-5.0, 3.0);
        let est = PhaseCorrelator::new(1)
            .estimate(&reference.view(), &target.view())
            .unwrap();
        assert_eq!(est.shift, (-5.0, 3.0));
    }

    #[test]
    fn test_subpixel_shift() {
        let reference = blob_image(0.0, 0.0);
        let target = blob_image(2.3, -1.7);
        let est = PhaseCorrelator::new(10)
            .estimate(&reference.view(), &target.view())
            .unwrap();
        assert!((est.shift.0 - 2.3).abs() <= 0.1, "row shift {}", est.shift.0);
        assert!((est.shift.1 + 1.7).abs() <= 0.1, "col shift {}", est.shift.1);
    }

    /// Sensor-count scene: background of 100 with blobs of 90 to 200 counts.
    fn counts_image(dr: f64, dc: f64) -> Array2<f32> {
        const BLOBS: [(f64, f64, f64, f64); 4] = [
            (41.0, 41.0, 3.5, 200.0),
            (22.0, 46.0, 3.5, 90.0),
            (28.0, 20.0, 2.5, 200.0),
            (26.0, 23.0, 3.0, 90.0),
        ];
        Array2::from_shape_fn((64, 64), |(r, c)| {
            let blobs: f64 = BLOBS
                .iter()
                .map(|&(br, bc, sigma, amp)| {
                    let y = r as f64 - dr - br;
                    let x = c as f64 - dc - bc;
                    amp * (-(x * x + y * y) / (2.0 * sigma * sigma)).exp()
                })
                .sum();
            (100.0 + blobs) as f32
        })
    }

    #[test]
    fn test_subpixel_shift_on_sensor_counts() {
        let reference = counts_image(0.0, 0.0);
        for (dr, dc) in [(1.4, -0.8), (-0.6, 1.2)] {
            let target = counts_image(dr, dc);
            let est = PhaseCorrelator::new(10)
                .estimate(&reference.view(), &target.view())
                .unwrap();
            assert!((est.shift.0 - dr).abs() <= 0.1 + 1e-9, "row shift {} for {dr}", est.shift.0);
            assert!((est.shift.1 - dc).abs() <= 0.1 + 1e-9, "col shift {} for {dc}", est.shift.1);
        }
    }

    #[test]
    fn test_flat_images_report_zero() {
        let flat = Array2::from_elem((16, 16), 3.0f32);
        let est = PhaseCorrelator::default()
            .estimate(&flat.view(), &flat.view())
            .unwrap();
        assert_eq!(est, ShiftEstimate::zero());

        let zeros = Array2::<f32>::zeros((16, 16));
        let est = PhaseCorrelator::default()
            .estimate(&zeros.view(), &zeros.view())
            .unwrap();
        assert_eq!(est.shift, (0.0, 0.0));
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Array2::<f32>::zeros((8, 8));
        let b = Array2::<f32>::zeros((8, 9));
        let err = PhaseCorrelator::default().estimate(&a.view(), &b.view()).unwrap_err();
        assert!(matches!(err, PansharpenError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_non_square_transpose() {
        let data: Vec<Complex<f64>> = (0..6).map(|i| Complex::new(i as f64, 0.0)).collect();
        let t = transpose(&data, 2, 3);
        let re: Vec<f64> = t.iter().map(|c| c.re).collect();
        assert_eq!(re, [0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_frequency_layout() {
        let f: Vec<f64> = (0..5).map(|k| frequency(k, 5)).collect();
        assert_eq!(f, [0.0, 0.2, 0.4, -0.4, -0.2]);
        let f: Vec<f64> = (0..4).map(|k| frequency(k, 4)).collect();
        assert_eq!(f, [0.0, 0.25, -0.5, -0.25]);
    }
}
