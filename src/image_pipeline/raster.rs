//! Raster data model and reading module
//!
//! Georeferenced single-band rasters, their affine transforms and CRS, and
//! the GeoTIFF reader that produces them.

pub mod crs;
mod geo_transform;
mod geotiff_reader;
mod reader;
pub mod types;

pub use crs::Crs;
pub use geo_transform::GeoTransform;
pub use geotiff_reader::GeoTiffReader;
pub(crate) use geotiff_reader::{
    GEO_KEY_DIRECTORY_TAG, GEOGRAPHIC_TYPE_GEO_KEY, GT_RASTER_TYPE_GEO_KEY, geo_tag,
    MODEL_PIXEL_SCALE_TAG, MODEL_TIEPOINT_TAG, MODEL_TRANSFORMATION_TAG, PROJECTED_CS_TYPE_GEO_KEY,
    RASTER_PIXEL_IS_AREA,
};
pub use reader::RasterReader;
pub use types::{GeoProfile, MultispectralStack, RasterBand, RgbImage};
