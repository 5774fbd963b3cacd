//! Raster data model

use ndarray::{Array2, Array3};

use crate::image_pipeline::common::error::{PansharpenError, Result};
use crate::image_pipeline::raster::crs::Crs;
use crate::image_pipeline::raster::geo_transform::GeoTransform;

/// Georeferencing descriptor of a raster grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoProfile {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: Crs,
}

impl GeoProfile {
    pub fn new(width: usize, height: usize, transform: GeoTransform, crs: Crs) -> Self {
        Self {
            width,
            height,
            transform,
            crs,
        }
    }

    /// Grid shape as (rows, cols).
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}

/// A single-band raster: float samples in (row, col) order plus their profile.
#[derive(Debug, Clone)]
pub struct RasterBand {
    data: Array2<f32>,
    profile: GeoProfile,
}

impl RasterBand {
    pub fn new(data: Array2<f32>, profile: GeoProfile) -> Result<Self> {
        let (rows, cols) = data.dim();
        if rows == 0 || cols == 0 {
            return Err(PansharpenError::InvalidDimensions(cols, rows));
        }
        if profile.shape() != (rows, cols) {
            return Err(PansharpenError::ShapeMismatch {
                expected: profile.shape(),
                actual: (rows, cols),
            });
        }
        Ok(Self { data, profile })
    }

    /// Band on a default north-up unit grid with no CRS.
    pub fn from_array(data: Array2<f32>) -> Result<Self> {
        let (rows, cols) = data.dim();
        let profile = GeoProfile::new(cols, rows, GeoTransform::default(), Crs::Unspecified);
        Self::new(data, profile)
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn profile(&self) -> &GeoProfile {
        &self.profile
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn into_parts(self) -> (Array2<f32>, GeoProfile) {
        (self.data, self.profile)
    }
}

/// Three co-registered bands in output channel order (red, green, blue).
#[derive(Debug, Clone)]
pub struct MultispectralStack {
    bands: [Array2<f32>; 3],
}

impl MultispectralStack {
    pub fn new(bands: [Array2<f32>; 3]) -> Result<Self> {
        let expected = bands[0].dim();
        for band in &bands[1..] {
            if band.dim() != expected {
                return Err(PansharpenError::ShapeMismatch {
                    expected,
                    actual: band.dim(),
                });
            }
        }
        Ok(Self { bands })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].dim()
    }

    pub fn bands(&self) -> &[Array2<f32>; 3] {
        &self.bands
    }

    pub fn into_bands(self) -> [Array2<f32>; 3] {
        self.bands
    }
}

/// Interleaved 8-bit RGB, shape (rows, cols, 3).
pub type RgbImage = Array3<u8>;
