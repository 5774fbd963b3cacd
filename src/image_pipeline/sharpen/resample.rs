//! Resampling a band onto another band's grid.

use ndarray::{Array2, Axis};
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::image_pipeline::common::error::{PansharpenError, Result};
use crate::image_pipeline::raster::crs;
use crate::image_pipeline::raster::types::{GeoProfile, RasterBand};
use crate::image_pipeline::sharpen::interpolation::{Boundary, ResamplingKernel, sample};

pub trait Reprojector: Sync {
    /// Resamples `source` onto the grid described by `destination`.
    fn reproject(&self, source: &RasterBand, destination: &GeoProfile) -> Result<Array2<f32>>;
}

/// Reprojector that chains the destination and inverse source affine
/// transforms, converting between WGS84 and UTM zones when the CRS differ.
///
/// Destination pixels whose centre maps outside the source footprint stay 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct AffineReprojector {
    pub kernel: ResamplingKernel,
}

impl AffineReprojector {
    pub fn new(kernel: ResamplingKernel) -> Self {
        Self { kernel }
    }
}

impl Reprojector for AffineReprojector {
    #[instrument(skip_all, fields(kernel = ?self.kernel, dst_width = destination.width, dst_height = destination.height))]
    fn reproject(&self, source: &RasterBand, destination: &GeoProfile) -> Result<Array2<f32>> {
        let src_profile = source.profile();
        if !src_profile.transform.is_invertible() {
            return Err(PansharpenError::InputReadError(
                "source geotransform is not invertible".to_string(),
            ));
        }
        if destination.width == 0 || destination.height == 0 {
            return Err(PansharpenError::InvalidDimensions(destination.width, destination.height));
        }
        crs::ensure_convertible(&destination.crs, &src_profile.crs)?;

        let (src_rows, src_cols) = source.shape();
        let src_view = source.data().view();
        let dst_transform = destination.transform;
        let src_transform = src_profile.transform;
        let same_crs = destination.crs.is_compatible(&src_profile.crs);

        debug!(
            src_width = src_cols,
            src_height = src_rows,
            same_crs,
            "Resampling band"
        );

        let mut out = Array2::<f32>::zeros(destination.shape());
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row, mut out_row)| {
                for (col, out_px) in out_row.iter_mut().enumerate() {
                    let (x, y) = dst_transform.pixel_to_geo(col, row);
                    let (x, y) = if same_crs {
                        (x, y)
                    } else {
                        // ensure_convertible above guarantees the pair is supported
                        match crs::transform_point(&destination.crs, &src_profile.crs, x, y) {
                            Ok(p) => p,
                            Err(_) => continue,
                        }
                    };

                    let (src_col, src_row) = src_transform.geo_to_pixel(x, y);
                    let (r, c) = (src_row - 0.5, src_col - 0.5);
                    let covered = r >= -0.5
                        && c >= -0.5
                        && r < src_rows as f64 - 0.5
                        && c < src_cols as f64 - 0.5;
                    if covered {
                        *out_px = sample(&src_view, r, c, self.kernel, Boundary::Clamp);
                    }
                }
            });

        Ok(out)
    }
}
