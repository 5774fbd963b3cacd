use ndarray::Array2;

/// Range threshold and denominator guard used by [`min_max_normalize`].
pub const DEFAULT_NORMALIZE_EPSILON: f32 = 1e-6;

// Largest f32 below 1.0; epsilon vanishes in f32 once the range exceeds ~16.
const BELOW_ONE: f32 = 1.0 - f32::EPSILON / 2.0;

/// Result of a min-max normalization.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub data: Array2<f32>,
    /// The input was numerically constant and `data` is all zeros.
    pub degenerate: bool,
}

/// Rescales `band` to `[0, 1)`.
///
/// Computes `(x - min) / (max - min + epsilon)`. When `max - min < epsilon`
/// the band is treated as constant and an all-zero array is returned.
/// Non-finite samples are ignored for the range and map to 0.
pub fn min_max_normalize(band: &Array2<f32>, epsilon: f32) -> Normalized {
    let (min, max) = band
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    if max - min < epsilon {
        return Normalized {
            data: Array2::zeros(band.dim()),
            degenerate: true,
        };
    }

    let scale = f64::from(max - min) + f64::from(epsilon);
    let data = band.mapv(|v| {
        if v.is_finite() {
            ((f64::from(v - min) / scale) as f32).min(BELOW_ONE)
        } else {
            0.0
        }
    });
    Normalized {
        data,
        degenerate: false,
    }
}

/// Maps a normalized band to 8 bits by truncating `v * 255`.
pub fn to_u8(band: &Array2<f32>) -> Array2<u8> {
    band.mapv(|v| (v * 255.0) as u8)
}
