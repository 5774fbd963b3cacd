//! TIFF writing module
//!
//! This module provides GeoTIFF writing capabilities with various compression options.

mod geotiff_writer;
pub mod types;
mod writer;

pub use geotiff_writer::GeoTiffRgbWriter;
pub use types::{TiffCompression, TiffOptions};
pub use writer::RgbTiffWriter;
