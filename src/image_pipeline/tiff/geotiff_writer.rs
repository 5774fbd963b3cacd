use std::io::{Cursor, Write};

use tiff::encoder::TiffEncoder;
use tiff::encoder::colortype::RGB8;
use tracing::{debug, warn};

use crate::image_pipeline::common::error::{PansharpenError, Result};
use crate::image_pipeline::raster::{
    Crs, GEO_KEY_DIRECTORY_TAG, GEOGRAPHIC_TYPE_GEO_KEY, GT_RASTER_TYPE_GEO_KEY, GeoProfile,
    MODEL_PIXEL_SCALE_TAG, MODEL_TIEPOINT_TAG, MODEL_TRANSFORMATION_TAG, PROJECTED_CS_TYPE_GEO_KEY,
    RASTER_PIXEL_IS_AREA, RgbImage, geo_tag,
};
use crate::image_pipeline::tiff::types::TiffOptions;
use crate::image_pipeline::tiff::writer::RgbTiffWriter;

const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;

/// Writes RGB8 GeoTIFFs carrying the georeferencing of a reference profile.
pub struct GeoTiffRgbWriter;

impl RgbTiffWriter for GeoTiffRgbWriter {
    fn write_rgb_tiff(
        &self,
        image: &RgbImage,
        profile: &GeoProfile,
        output: &mut dyn Write,
        options: &TiffOptions,
    ) -> Result<()> {
        let (rows, cols, channels) = image.dim();
        if channels != 3 || (rows, cols) != profile.shape() {
            return Err(PansharpenError::ProfileMismatch(format!(
                "image is {}x{}x{}, profile expects {}x{}x3",
                rows, cols, channels, profile.height, profile.width
            )));
        }

        debug!("Encoding RGB GeoTIFF: {}x{}", cols, rows);

        let mut buffer = Vec::new();
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
            .map_err(|e| PansharpenError::EncodeError(e.to_string()))?
            .with_compression(options.compression.to_encoder());
        if let Some(predictor) = options.encoder_predictor() {
            encoder = encoder.with_predictor(predictor);
        }

        let mut tiff_image = encoder
            .new_image::<RGB8>(cols as u32, rows as u32)
            .map_err(|e| PansharpenError::EncodeError(e.to_string()))?;
        write_georeferencing(tiff_image.encoder(), profile)
            .map_err(|e| PansharpenError::EncodeError(e.to_string()))?;

        let data = image.as_standard_layout();
        let samples = data
            .as_slice()
            .ok_or_else(|| PansharpenError::EncodeError("image is not contiguous".to_string()))?;
        tiff_image
            .write_data(samples)
            .map_err(|e| PansharpenError::EncodeError(e.to_string()))?;

        output.write_all(&buffer)?;

        debug!("TIFF encoding complete, {} bytes", buffer.len());
        Ok(())
    }
}

fn write_georeferencing<W: Write + std::io::Seek, K: tiff::encoder::TiffKind>(
    dir: &mut tiff::encoder::DirectoryEncoder<'_, W, K>,
    profile: &GeoProfile,
) -> tiff::TiffResult<()> {
    let t = &profile.transform;
    if t.has_rotation() {
        let matrix = [
            t.pixel_width, t.row_rotation, 0.0, t.origin_x,
            t.col_rotation, t.pixel_height, 0.0, t.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(geo_tag(MODEL_TRANSFORMATION_TAG), &matrix[..])?;
    } else {
        dir.write_tag(geo_tag(MODEL_PIXEL_SCALE_TAG), &[t.pixel_width, -t.pixel_height, 0.0][..])?;
        dir.write_tag(
            geo_tag(MODEL_TIEPOINT_TAG),
            &[0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0][..],
        )?;
    }

    if let Some(keys) = geo_key_directory(&profile.crs) {
        dir.write_tag(geo_tag(GEO_KEY_DIRECTORY_TAG), &keys[..])?;
    }
    Ok(())
}

/// GeoKeyDirectory for an EPSG code, keys in ascending id order.
fn geo_key_directory(crs: &Crs) -> Option<Vec<u16>> {
    let code = crs.epsg()?;
    let Ok(code) = u16::try_from(code) else {
        warn!(%crs, "EPSG code does not fit a GeoKey value, CRS not written");
        return None;
    };

    let (model_type, cs_key) = if crs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_GEO_KEY)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_GEO_KEY)
    };

    Some(vec![
        1, 1, 0, 3,
        GT_MODEL_TYPE_GEO_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA,
        cs_key, 0, 1, code,
    ])
}
