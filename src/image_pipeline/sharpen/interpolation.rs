//! Interpolation kernels for sub-pixel sampling.
//!
//! Positions are in array coordinates: sample `(r, c)` sits at `(r as f64, c as f64)`.

use ndarray::ArrayView2;

/// Interpolation kernel used when resampling onto another grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResamplingKernel {
    Nearest,
    Bilinear,
    /// Catmull-Rom cubic convolution.
    #[default]
    Cubic,
}

/// What a tap outside the image reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Repeat the nearest edge sample.
    Clamp,
    /// Read zero.
    Zero,
}

/// Catmull-Rom, as used by GDAL cubic resampling.
pub const CATMULL_ROM_A: f64 = -0.5;
/// OpenCV `INTER_CUBIC`.
pub const OPENCV_CUBIC_A: f64 = -0.75;

/// Keys cubic convolution kernel with free parameter `a`.
#[inline]
pub fn cubic_kernel(x: f64, a: f64) -> f64 {
    let abs_x = x.abs();
    if abs_x <= 1.0 {
        ((a + 2.0) * abs_x - (a + 3.0)) * abs_x * abs_x + 1.0
    } else if abs_x < 2.0 {
        ((a * abs_x - 5.0 * a) * abs_x + 8.0 * a) * abs_x - 4.0 * a
    } else {
        0.0
    }
}

#[inline]
fn tap(data: &ArrayView2<f32>, row: isize, col: isize, boundary: Boundary) -> f64 {
    let (rows, cols) = data.dim();
    let inside = row >= 0 && col >= 0 && (row as usize) < rows && (col as usize) < cols;
    if inside {
        return f64::from(data[[row as usize, col as usize]]);
    }
    match boundary {
        Boundary::Zero => 0.0,
        Boundary::Clamp => {
            let r = row.clamp(0, rows as isize - 1) as usize;
            let c = col.clamp(0, cols as isize - 1) as usize;
            f64::from(data[[r, c]])
        }
    }
}

/// Samples `data` at a fractional position.
pub fn sample(
    data: &ArrayView2<f32>,
    row: f64,
    col: f64,
    kernel: ResamplingKernel,
    boundary: Boundary,
) -> f32 {
    let value = match kernel {
        ResamplingKernel::Nearest => {
            tap(data, row.round() as isize, col.round() as isize, boundary)
        }
        ResamplingKernel::Bilinear => {
            let r0 = row.floor();
            let c0 = col.floor();
            let fr = row - r0;
            let fc = col - c0;
            let (r0, c0) = (r0 as isize, c0 as isize);

            let top = tap(data, r0, c0, boundary) * (1.0 - fc) + tap(data, r0, c0 + 1, boundary) * fc;
            let bottom =
                tap(data, r0 + 1, c0, boundary) * (1.0 - fc) + tap(data, r0 + 1, c0 + 1, boundary) * fc;
            top * (1.0 - fr) + bottom * fr
        }
        ResamplingKernel::Cubic => cubic(data, row, col, CATMULL_ROM_A, boundary),
    };
    value as f32
}

/// 4x4 cubic convolution at a fractional position with kernel parameter `a`.
pub fn sample_cubic(data: &ArrayView2<f32>, row: f64, col: f64, a: f64, boundary: Boundary) -> f32 {
    cubic(data, row, col, a, boundary) as f32
}

fn cubic(data: &ArrayView2<f32>, row: f64, col: f64, a: f64, boundary: Boundary) -> f64 {
    let r0 = row.floor();
    let c0 = col.floor();
    let fr = row - r0;
    let fc = col - c0;
    let (r0, c0) = (r0 as isize, c0 as isize);

    let weights = |f: f64| {
        [
            cubic_kernel(f + 1.0, a),
            cubic_kernel(f, a),
            cubic_kernel(f - 1.0, a),
            cubic_kernel(f - 2.0, a),
        ]
    };
    let wr = weights(fr);
    let wc = weights(fc);

    let mut sum = 0.0;
    for (i, &w_row) in wr.iter().enumerate() {
        let r = r0 - 1 + i as isize;
        let mut row_sum = 0.0;
        for (j, &w_col) in wc.iter().enumerate() {
            row_sum += w_col * tap(data, r, c0 - 1 + j as isize, boundary);
        }
        sum += w_row * row_sum;
    }
    sum
}
