//! Pansharpening configuration and run report types

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::image_pipeline::common::timing::PipelineTimings;
use crate::image_pipeline::sharpen::brovey::{DEFAULT_BANDS_FACTOR, DEFAULT_BROVEY_EPSILON};
use crate::image_pipeline::sharpen::clahe::HistEqMethod;
use crate::image_pipeline::sharpen::interpolation::ResamplingKernel;
use crate::image_pipeline::sharpen::normalize::DEFAULT_NORMALIZE_EPSILON;
use crate::image_pipeline::sharpen::phase_correlation::{DEFAULT_UPSAMPLE_FACTOR, ShiftEstimate};
use crate::image_pipeline::tiff::types::{TiffCompression, TiffOptions};

/// Channel names of the multispectral inputs, in output order.
pub const BAND_NAMES: [&str; 3] = ["red", "green", "blue"];

const SCENE_IMAGE_NAME: &str = "image.tif";
const SCENE_OUTPUT_NAME: &str = "brovey_rgb.tif";

/// Input rasters and output destination of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandSources {
    pub panchromatic: PathBuf,
    /// Red, green and blue sources.
    pub multispectral: [PathBuf; 3],
    pub output: PathBuf,
}

impl BandSources {
    pub fn new(
        panchromatic: impl Into<PathBuf>,
        multispectral: [PathBuf; 3],
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            panchromatic: panchromatic.into(),
            multispectral,
            output: output.into(),
        }
    }

    /// Scene layout with one folder per band: `0/image.tif` is panchromatic,
    /// `1..=3/image.tif` are red, green and blue, output is `brovey_rgb.tif`.
    pub fn from_scene_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let band = |index: u8| dir.join(index.to_string()).join(SCENE_IMAGE_NAME);
        Self {
            panchromatic: band(0),
            multispectral: [band(1), band(2), band(3)],
            output: dir.join(SCENE_OUTPUT_NAME),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PansharpenConfig {
    pub sources: BandSources,
    /// Kernel used to bring multispectral bands onto the panchromatic grid
    pub resampling: ResamplingKernel,
    /// Brovey band-count factor
    pub bands_factor: f32,
    /// Contrast enhancement of each output channel
    pub histeq: HistEqMethod,
    /// Phase correlation resolves shifts to `1 / upsample_factor` pixel
    pub upsample_factor: usize,
    pub normalize_epsilon: f32,
    pub brovey_epsilon: f32,
    /// Abort when a band's alignment confidence is below this value
    pub min_alignment_confidence: Option<f64>,
    /// Run the three multispectral sub-pipelines concurrently
    pub parallel_bands: bool,
    /// Whether to validate raster dimensions before processing
    pub validate_dimensions: bool,
    pub compression: TiffCompression,
    /// Predictor value for compression (typically 2 for horizontal differencing)
    pub predictor: Option<u16>,
}

impl Default for PansharpenConfig {
    fn default() -> Self {
        Self {
            sources: BandSources::default(),
            resampling: ResamplingKernel::Cubic,
            bands_factor: DEFAULT_BANDS_FACTOR,
            histeq: HistEqMethod::default(),
            upsample_factor: DEFAULT_UPSAMPLE_FACTOR,
            normalize_epsilon: DEFAULT_NORMALIZE_EPSILON,
            brovey_epsilon: DEFAULT_BROVEY_EPSILON,
            min_alignment_confidence: None,
            parallel_bands: true,
            validate_dimensions: true,
            compression: TiffCompression::None,
            predictor: None,
        }
    }
}

impl PansharpenConfig {
    pub fn builder() -> PansharpenConfigBuilder {
        PansharpenConfigBuilder::default()
    }

    pub fn tiff_options(&self) -> TiffOptions {
        TiffOptions {
            compression: self.compression,
            predictor: self.predictor,
        }
    }
}

/// Builder for PansharpenConfig
#[derive(Default)]
pub struct PansharpenConfigBuilder {
    sources: Option<BandSources>,
    resampling: Option<ResamplingKernel>,
    bands_factor: Option<f32>,
    histeq: Option<HistEqMethod>,
    upsample_factor: Option<usize>,
    normalize_epsilon: Option<f32>,
    brovey_epsilon: Option<f32>,
    min_alignment_confidence: Option<Option<f64>>,
    parallel_bands: Option<bool>,
    validate_dimensions: Option<bool>,
    compression: Option<TiffCompression>,
    predictor: Option<Option<u16>>,
}

impl PansharpenConfigBuilder {
    pub fn sources(mut self, sources: BandSources) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn resampling(mut self, kernel: ResamplingKernel) -> Self {
        self.resampling = Some(kernel);
        self
    }

    pub fn bands_factor(mut self, factor: f32) -> Self {
        self.bands_factor = Some(factor);
        self
    }

    pub fn histeq(mut self, method: HistEqMethod) -> Self {
        self.histeq = Some(method);
        self
    }

    pub fn upsample_factor(mut self, factor: usize) -> Self {
        self.upsample_factor = Some(factor);
        self
    }

    pub fn normalize_epsilon(mut self, epsilon: f32) -> Self {
        self.normalize_epsilon = Some(epsilon);
        self
    }

    pub fn brovey_epsilon(mut self, epsilon: f32) -> Self {
        self.brovey_epsilon = Some(epsilon);
        self
    }

    pub fn min_alignment_confidence(mut self, threshold: Option<f64>) -> Self {
        self.min_alignment_confidence = Some(threshold);
        self
    }

    pub fn parallel_bands(mut self, enable: bool) -> Self {
        self.parallel_bands = Some(enable);
        self
    }

    pub fn validate_dimensions(mut self, validate: bool) -> Self {
        self.validate_dimensions = Some(validate);
        self
    }

    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn build(self) -> PansharpenConfig {
        let default = PansharpenConfig::default();
        PansharpenConfig {
            sources: self.sources.unwrap_or(default.sources),
            resampling: self.resampling.unwrap_or(default.resampling),
            bands_factor: self.bands_factor.unwrap_or(default.bands_factor),
            histeq: self.histeq.unwrap_or(default.histeq),
            upsample_factor: self.upsample_factor.unwrap_or(default.upsample_factor),
            normalize_epsilon: self.normalize_epsilon.unwrap_or(default.normalize_epsilon),
            brovey_epsilon: self.brovey_epsilon.unwrap_or(default.brovey_epsilon),
            min_alignment_confidence: self
                .min_alignment_confidence
                .unwrap_or(default.min_alignment_confidence),
            parallel_bands: self.parallel_bands.unwrap_or(default.parallel_bands),
            validate_dimensions: self.validate_dimensions.unwrap_or(default.validate_dimensions),
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
        }
    }
}

/// Outcome of one multispectral sub-pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct BandReport {
    pub name: &'static str,
    pub shift: ShiftEstimate,
    /// The band was constant after alignment and normalized to zeros.
    pub degenerate: bool,
}

/// Summary of a pansharpening run.
#[derive(Debug, Clone)]
pub struct PansharpenReport {
    pub width: usize,
    pub height: usize,
    pub bands: Vec<BandReport>,
    /// Constant bands normalized to zeros, panchromatic and output channels included
    pub degenerate_bands: usize,
    /// Pixels with no multispectral signal, forced to 0 by the Brovey step
    pub zeroed_pixels: usize,
    pub timings: PipelineTimings,
}

impl PansharpenReport {
    pub fn total_duration(&self) -> Duration {
        self.timings.total_duration()
    }
}
