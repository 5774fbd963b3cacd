use std::io::Write;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::{GeoProfile, RgbImage};
use crate::image_pipeline::tiff::types::TiffOptions;

pub trait RgbTiffWriter {
    /// Encodes an interleaved 8-bit RGB image georeferenced by `profile`.
    fn write_rgb_tiff(
        &self,
        image: &RgbImage,
        profile: &GeoProfile,
        output: &mut dyn Write,
        options: &TiffOptions,
    ) -> Result<()>;
}
