use thiserror::Error;

#[derive(Error, Debug)]
pub enum PansharpenError {
    #[error("Failed to read input raster: {0}")]
    InputReadError(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("Failed to decode GeoTIFF: {0}")]
    DecodeError(String),

    #[error("Failed to encode TIFF image: {0}")]
    EncodeError(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Cannot reproject between {0} and {1}")]
    CrsMismatch(String, String),

    #[error("Output profile does not match image: {0}")]
    ProfileMismatch(String),

    #[error("Alignment rejected for {band}: confidence {confidence:.3} below {threshold:.3}")]
    AlignmentError {
        band: String,
        confidence: f64,
        threshold: f64,
    },

    #[error("Preview failed: {0}")]
    PreviewError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PansharpenError {
    /// Whether this error belongs to the input side of the run (unreadable,
    /// empty or inconsistent rasters) rather than the output side.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InputReadError(_)
                | Self::DecodeError(_)
                | Self::InvalidDimensions(..)
                | Self::ShapeMismatch { .. }
                | Self::UnsupportedFormat(_)
                | Self::CrsMismatch(..)
        )
    }
}

pub type Result<T> = std::result::Result<T, PansharpenError>;
