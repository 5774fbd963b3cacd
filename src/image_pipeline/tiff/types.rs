//! TIFF output encoding options

use tiff::encoder::Compression;
use tiff::encoder::compression::DeflateLevel;
use tiff::tags::Predictor;

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    #[default]
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level (good speed/size balance)
    DeflateFast,
    /// Deflate compression - balanced
    DeflateBalanced,
    /// Deflate compression - best compression (slower)
    DeflateBest,
}

impl TiffCompression {
    pub(crate) fn to_encoder(self) -> Compression {
        match self {
            TiffCompression::None => Compression::Uncompressed,
            TiffCompression::Lzw => Compression::Lzw,
            TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
            TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
        }
    }
}

/// Encoder settings shared by every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffOptions {
    pub compression: TiffCompression,
    /// Predictor tag value; 2 selects horizontal differencing, anything else none.
    /// Adds processing time, leave unset for maximum speed.
    pub predictor: Option<u16>,
}

impl TiffOptions {
    pub(crate) fn encoder_predictor(&self) -> Option<Predictor> {
        self.predictor.map(|value| match value {
            2 => Predictor::Horizontal,
            _ => Predictor::None,
        })
    }
}
