//! Single-band GeoTIFF reader built on the `tiff` crate.
//!
//! Georeferencing is taken from ModelPixelScale (33550) + ModelTiepoint
//! (33922), falling back to ModelTransformation (34264). The CRS comes from
//! the EPSG code in GeoKeyDirectory (34735). A PixelIsPoint raster type has
//! its tiepoint on the pixel centre, so the origin is moved back half a pixel.
//! Rasters without these tags get the default unit transform and an
//! unspecified CRS.

use std::io::{Cursor, Read, Seek};

use ndarray::Array2;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::{debug, warn};

use crate::image_pipeline::common::error::{PansharpenError, Result};
use crate::image_pipeline::raster::crs::Crs;
use crate::image_pipeline::raster::geo_transform::GeoTransform;
use crate::image_pipeline::raster::reader::RasterReader;
use crate::image_pipeline::raster::types::{GeoProfile, RasterBand};

pub(crate) const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
pub(crate) const MODEL_TIEPOINT_TAG: u16 = 33922;
pub(crate) const MODEL_TRANSFORMATION_TAG: u16 = 34264;
pub(crate) const GEO_KEY_DIRECTORY_TAG: u16 = 34735;

pub(crate) const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
pub(crate) const RASTER_PIXEL_IS_AREA: u16 = 1;
pub(crate) const RASTER_PIXEL_IS_POINT: u16 = 2;
pub(crate) const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
pub(crate) const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Known codes resolve to their named variant, which is how the decoder keys them.
pub(crate) fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

pub struct GeoTiffReader;

impl RasterReader for GeoTiffReader {
    fn read_band(&self, data: &[u8]) -> Result<RasterBand> {
        debug!("Decoding GeoTIFF, {} bytes", data.len());

        let mut decoder =
            Decoder::new(Cursor::new(data)).map_err(|e| PansharpenError::DecodeError(e.to_string()))?;

        let (width, height) = decoder
            .dimensions()
            .map_err(|e| PansharpenError::DecodeError(e.to_string()))?;
        let (cols, rows) = (width as usize, height as usize);
        if rows == 0 || cols == 0 {
            return Err(PansharpenError::InvalidDimensions(cols, rows));
        }

        let samples = decoder
            .read_image()
            .map_err(|e| PansharpenError::DecodeError(e.to_string()))?;
        let values = decoding_result_to_f32(samples)?;

        let pixels = rows * cols;
        if values.len() < pixels || values.len() % pixels != 0 {
            return Err(PansharpenError::DecodeError(format!(
                "{} samples do not fill a {}x{} grid",
                values.len(),
                cols,
                rows
            )));
        }
        let samples_per_pixel = values.len() / pixels;
        if samples_per_pixel > 1 {
            debug!("{} samples per pixel, keeping band 1", samples_per_pixel);
        }
        let band: Vec<f32> = values.into_iter().step_by(samples_per_pixel).collect();

        let geokeys = decoder.get_tag_u16_vec(geo_tag(GEO_KEY_DIRECTORY_TAG)).ok();
        let crs = geokeys.as_deref().map_or(Crs::Unspecified, crs_from_geokeys);

        let transform = match read_geotransform(&mut decoder) {
            Some(transform) => {
                let raster_type = geokeys
                    .as_deref()
                    .and_then(|keys| geo_key_value(keys, GT_RASTER_TYPE_GEO_KEY));
                if raster_type == Some(RASTER_PIXEL_IS_POINT) {
                    debug!("PixelIsPoint raster, moving origin to the pixel corner");
                    transform.point_to_area()
                } else {
                    transform
                }
            }
            None => {
                warn!("No georeferencing tags found, using unit pixel grid");
                GeoTransform::default()
            }
        };

        debug!(width = cols, height = rows, %crs, "Decoded raster band");

        let array = Array2::from_shape_vec((rows, cols), band)
            .map_err(|e| PansharpenError::DecodeError(e.to_string()))?;
        RasterBand::new(array, GeoProfile::new(cols, rows, transform, crs))
    }
}

fn decoding_result_to_f32(result: DecodingResult) -> Result<Vec<f32>> {
    let values = match result {
        DecodingResult::U8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(PansharpenError::UnsupportedFormat(
                "unsupported TIFF sample type".to_string(),
            ));
        }
    };
    Ok(values)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(geo_tag(MODEL_PIXEL_SCALE_TAG)).ok();
    let tiepoint = decoder.get_tag_f64_vec(geo_tag(MODEL_TIEPOINT_TAG)).ok();

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // Row-major 4x4 matrix
    let matrix = decoder
        .get_tag_f64_vec(geo_tag(MODEL_TRANSFORMATION_TAG))
        .ok()?;
    if matrix.len() < 16 {
        return None;
    }
    Some(GeoTransform {
        origin_x: matrix[3],
        origin_y: matrix[7],
        pixel_width: matrix[0],
        pixel_height: matrix[5],
        row_rotation: matrix[1],
        col_rotation: matrix[4],
    })
}

/// Short-valued keys of a GeoKeyDirectory:
/// `[version, revision, minor, count, (key_id, location, count, value)*]`.
fn short_geo_keys(directory: &[u16]) -> impl Iterator<Item = (u16, u16)> + '_ {
    let num_keys = directory.get(3).map_or(0, |&n| n as usize);
    directory
        .get(4..)
        .unwrap_or_default()
        .chunks_exact(4)
        .take(num_keys)
        // location != 0 means the value lives in another tag
        .filter(|entry| entry[1] == 0)
        .map(|entry| (entry[0], entry[3]))
}

pub(crate) fn geo_key_value(directory: &[u16], key: u16) -> Option<u16> {
    short_geo_keys(directory).find(|&(id, _)| id == key).map(|(_, value)| value)
}

/// Extracts the EPSG code, preferring the projected CS key.
pub(crate) fn crs_from_geokeys(directory: &[u16]) -> Crs {
    let mut geographic = None;
    for (key_id, value) in short_geo_keys(directory) {
        if value == 0 || value == USER_DEFINED {
            continue;
        }
        match key_id {
            PROJECTED_CS_TYPE_GEO_KEY => return Crs::Epsg(u32::from(value)),
            GEOGRAPHIC_TYPE_GEO_KEY => geographic = Some(u32::from(value)),
            _ => {}
        }
    }

    geographic.map_or(Crs::Unspecified, Crs::Epsg)
}
