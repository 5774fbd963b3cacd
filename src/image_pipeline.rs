//! Image processing pipeline module
//!
//! This module provides a structured approach to Brovey pansharpening, with
//! separate modules for raster reading, the numerical sharpening stages, TIFF
//! writing and pipeline orchestration.

pub mod common;
pub mod conversions;
pub mod preview;
pub mod raster;
pub mod sharpen;
pub mod tiff;

pub use common::{PansharpenError, Result};

pub use raster::{
    Crs,
    GeoProfile,
    GeoTiffReader,
    GeoTransform,
    MultispectralStack,
    RasterBand,
    RasterReader,
    RgbImage,
};

pub use sharpen::{
    HistEqMethod,
    ResamplingKernel,
    ShiftEstimate,
};

pub use tiff::{
    GeoTiffRgbWriter,
    RgbTiffWriter,
    TiffCompression,
    TiffOptions,
};

pub use preview::{NoPreview, PngPreview, Previewer};

pub use conversions::{
    BandSources,
    PansharpenConfig,
    PansharpenConfigBuilder,
    PansharpenPipeline,
    PansharpenReport,
};
