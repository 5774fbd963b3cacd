//! Optional visualization of the sharpened result.

use std::path::PathBuf;

use image::{ImageBuffer, ImageFormat, Rgb};
use tracing::info;

use crate::image_pipeline::common::error::{PansharpenError, Result};
use crate::image_pipeline::raster::RgbImage;

pub trait Previewer {
    fn preview(&self, image: &RgbImage) -> Result<()>;
}

/// Headless runs.
pub struct NoPreview;

impl Previewer for NoPreview {
    fn preview(&self, _image: &RgbImage) -> Result<()> {
        Ok(())
    }
}

/// Saves the image as an 8-bit PNG for quick inspection.
pub struct PngPreview {
    path: PathBuf,
}

impl PngPreview {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Previewer for PngPreview {
    fn preview(&self, image: &RgbImage) -> Result<()> {
        let (rows, cols, _) = image.dim();
        let data = image.as_standard_layout().into_owned().into_raw_vec_and_offset().0;
        let buffer = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(cols as u32, rows as u32, data)
            .ok_or_else(|| PansharpenError::PreviewError("buffer does not match image size".to_string()))?;

        buffer
            .save_with_format(&self.path, ImageFormat::Png)
            .map_err(|e| PansharpenError::PreviewError(e.to_string()))?;

        info!("Preview written to {}", self.path.display());
        Ok(())
    }
}
