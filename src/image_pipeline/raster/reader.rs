use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::types::RasterBand;

pub trait RasterReader {
    /// Decodes band 1 of an encoded raster together with its georeferencing.
    fn read_band(&self, data: &[u8]) -> Result<RasterBand>;
}
