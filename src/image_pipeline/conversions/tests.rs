use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ndarray::Array2;

use crate::image_pipeline::common::error::{PansharpenError, Result};
use crate::image_pipeline::conversions::pansharpen::PansharpenPipeline;
use crate::image_pipeline::conversions::types::PansharpenConfig;
use crate::image_pipeline::preview::Previewer;
use crate::image_pipeline::raster::{Crs, GeoProfile, GeoTransform, RasterBand, RasterReader, RgbImage};
use crate::image_pipeline::sharpen::{HistEqMethod, Reprojector};
use crate::image_pipeline::tiff::{RgbTiffWriter, TiffOptions};

const INPUTS: [&[u8]; 4] = [b"pan", b"red", b"green", b"blue"];

fn profile() -> GeoProfile {
    GeoProfile::new(32, 32, GeoTransform::new(440_000.0, 4_470_000.0, 2.0, -2.0), Crs::Epsg(32630))
}

fn pan_data() -> Array2<f32> {
    Array2::from_shape_fn((32, 32), |(r, c)| {
        let (y, x) = (r as f32, c as f32);
        100.0 + 50.0 * (y / 5.0).sin() * (x / 7.0).cos() + x
    })
}

fn band(data: Array2<f32>) -> RasterBand {
    RasterBand::new(data, profile()).unwrap()
}

struct MockReader {
    should_fail: bool,
    bands: Vec<(&'static [u8], RasterBand)>,
}

impl MockReader {
    fn with_bands(red: Array2<f32>, green: Array2<f32>, blue: Array2<f32>) -> Self {
        Self {
            should_fail: false,
            bands: vec![
                (INPUTS[0], band(pan_data())),
                (INPUTS[1], band(red)),
                (INPUTS[2], band(green)),
                (INPUTS[3], band(blue)),
            ],
        }
    }

    fn scaled() -> Self {
        let pan = pan_data();
        Self::with_bands(
            pan.mapv(|v| 0.8 * v + 10.0),
            pan.mapv(|v| 0.5 * v + 40.0),
            pan.mapv(|v| 300.0 - v),
        )
    }
}

impl RasterReader for MockReader {
    fn read_band(&self, data: &[u8]) -> Result<RasterBand> {
        if self.should_fail {
            return Err(PansharpenError::DecodeError("Mock decode error".to_string()));
        }
        self.bands
            .iter()
            .find(|(key, _)| *key == data)
            .map(|(_, band)| band.clone())
            .ok_or_else(|| PansharpenError::DecodeError("unknown input".to_string()))
    }
}

struct MockWriter {
    should_fail: bool,
    written: Arc<Mutex<Vec<(RgbImage, GeoProfile)>>>,
}

impl RgbTiffWriter for MockWriter {
    fn write_rgb_tiff(
        &self,
        image: &RgbImage,
        profile: &GeoProfile,
        _output: &mut dyn Write,
        _options: &TiffOptions,
    ) -> Result<()> {
        if self.should_fail {
            return Err(PansharpenError::EncodeError("Mock encode error".to_string()));
        }
        self.written.lock().unwrap().push((image.clone(), profile.clone()));
        Ok(())
    }
}

fn build_pipeline(
    reader: MockReader,
    config: PansharpenConfig,
) -> (PansharpenPipeline<MockReader, MockWriter>, Arc<Mutex<Vec<(RgbImage, GeoProfile)>>>) {
    let written = Arc::new(Mutex::new(Vec::new()));
    let writer = MockWriter {
        should_fail: false,
        written: written.clone(),
    };
    (PansharpenPipeline::with_custom(reader, writer, config), written)
}

fn channel_variance(image: &RgbImage, channel: usize) -> f64 {
    let values: Vec<f64> = image.iter().skip(channel).step_by(3).map(|&v| f64::from(v)).collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

#[test]
fn test_successful_conversion() {
    let (pipeline, written) = build_pipeline(MockReader::scaled(), PansharpenConfig::default());

    let mut output = Cursor::new(Vec::new());
    let report = pipeline.convert(INPUTS, &mut output).unwrap();

    let written = written.lock().unwrap();
    assert_eq!(written.len(), 1);
    let (image, written_profile) = &written[0];
    assert_eq!(image.dim(), (32, 32, 3));
    assert_eq!(written_profile, &profile());
    for channel in 0..3 {
        assert!(channel_variance(image, channel) > 0.0);
    }

    assert_eq!((report.width, report.height), (32, 32));
    let names: Vec<&str> = report.bands.iter().map(|b| b.name).collect();
    assert_eq!(names, ["red", "green", "blue"]);
    for band in &report.bands {
        assert!(band.shift.shift.0.abs() < 0.05 && band.shift.shift.1.abs() < 0.05);
    }
    assert_eq!(report.degenerate_bands, 0);
    assert_eq!(report.zeroed_pixels, 0);
    assert!(report.timings.get_step("brovey").is_some());
    assert!(report.timings.get_step("encode").is_some());
}

#[test]
fn test_reader_failure() {
    let reader = MockReader {
        should_fail: true,
        bands: Vec::new(),
    };
    let (pipeline, written) = build_pipeline(reader, PansharpenConfig::default());

    let mut output = Cursor::new(Vec::new());
    let result = pipeline.convert(INPUTS, &mut output);

    assert!(matches!(result.unwrap_err(), PansharpenError::DecodeError(_)));
    assert!(written.lock().unwrap().is_empty());
}

#[test]
fn test_writer_failure() {
    let writer = MockWriter {
        should_fail: true,
        written: Arc::new(Mutex::new(Vec::new())),
    };
    let pipeline = PansharpenPipeline::with_custom(MockReader::scaled(), writer, PansharpenConfig::default());

    let mut output = Cursor::new(Vec::new());
    let result = pipeline.convert(INPUTS, &mut output);

    assert!(matches!(result.unwrap_err(), PansharpenError::EncodeError(_)));
}

#[test]
fn test_zero_band_is_reported_degenerate() {
    let pan = pan_data();
    let reader = MockReader::with_bands(
        Array2::zeros((32, 32)),
        pan.mapv(|v| 0.5 * v + 40.0),
        pan.mapv(|v| 1.2 * v - 20.0),
    );
    let config = PansharpenConfig::builder().histeq(HistEqMethod::None).build();
    let (pipeline, written) = build_pipeline(reader, config);

    let mut output = Cursor::new(Vec::new());
    let report = pipeline.convert(INPUTS, &mut output).unwrap();

    assert!(report.bands[0].degenerate);
    assert_eq!(report.bands[0].shift.shift, (0.0, 0.0));
    // The aligned red band and the red output channel
    assert_eq!(report.degenerate_bands, 2);

    let written = written.lock().unwrap();
    let (image, _) = &written[0];
    assert!(image.iter().step_by(3).all(|&v| v == 0));
}

#[test]
fn test_alignment_gate() {
    let pan = pan_data();
    let reader = MockReader::with_bands(
        pan.mapv(|v| 0.8 * v + 10.0),
        Array2::zeros((32, 32)),
        pan.mapv(|v| 1.2 * v - 20.0),
    );
    let config = PansharpenConfig::builder()
        .min_alignment_confidence(Some(0.5))
        .build();
    let (pipeline, written) = build_pipeline(reader, config);

    let mut output = Cursor::new(Vec::new());
    let err = pipeline.convert(INPUTS, &mut output).unwrap_err();

    match err {
        PansharpenError::AlignmentError { band, .. } => assert_eq!(band, "green"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(written.lock().unwrap().is_empty());
}

#[test]
fn test_parallel_and_sequential_agree() {
    let run = |parallel: bool| {
        let config = PansharpenConfig::builder().parallel_bands(parallel).build();
        let (pipeline, written) = build_pipeline(MockReader::scaled(), config);
        pipeline.convert(INPUTS, &mut Cursor::new(Vec::new())).unwrap();
        let image = written.lock().unwrap()[0].0.clone();
        image
    };

    assert_eq!(run(true), run(false));
}

struct CountingReprojector {
    calls: Arc<AtomicUsize>,
}

impl Reprojector for CountingReprojector {
    fn reproject(&self, source: &RasterBand, destination: &GeoProfile) -> Result<Array2<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(source.shape(), destination.shape());
        Ok(source.data().clone())
    }
}

#[test]
fn test_custom_reprojector() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (pipeline, written) = build_pipeline(MockReader::scaled(), PansharpenConfig::default());
    let pipeline = pipeline.with_reprojector(CountingReprojector { calls: calls.clone() });

    pipeline.convert(INPUTS, &mut Cursor::new(Vec::new())).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(written.lock().unwrap().len(), 1);
}

#[test]
fn test_dimension_validation_failure() {
    let mut reader = MockReader::scaled();
    let degenerate = GeoProfile::new(32, 32, GeoTransform::new(0.0, 0.0, 0.0, 0.0), Crs::Unspecified);
    reader.bands[0].1 = RasterBand::new(pan_data(), degenerate).unwrap();
    let (pipeline, _) = build_pipeline(reader, PansharpenConfig::default());

    let mut output = Cursor::new(Vec::new());
    let err = pipeline.convert(INPUTS, &mut output).unwrap_err();
    assert!(matches!(err, PansharpenError::InputReadError(_)));
    assert!(err.is_input_error());
}

/// Records the image it is shown and how many images the writer had
/// received at that point.
struct RecordingPreview {
    should_fail: bool,
    written: Arc<Mutex<Vec<(RgbImage, GeoProfile)>>>,
    seen: Arc<Mutex<Vec<(RgbImage, usize)>>>,
}

impl Previewer for RecordingPreview {
    fn preview(&self, image: &RgbImage) -> Result<()> {
        if self.should_fail {
            return Err(PansharpenError::PreviewError("Mock display error".to_string()));
        }
        let already_written = self.written.lock().unwrap().len();
        self.seen.lock().unwrap().push((image.clone(), already_written));
        Ok(())
    }
}

#[test]
fn test_preview_runs_before_write() {
    let (pipeline, written) = build_pipeline(MockReader::scaled(), PansharpenConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline.with_previewer(RecordingPreview {
        should_fail: false,
        written: written.clone(),
        seen: seen.clone(),
    });

    let report = pipeline.convert(INPUTS, &mut Cursor::new(Vec::new())).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (previewed, written_before) = &seen[0];
    assert_eq!(*written_before, 0);
    assert_eq!(previewed, &written.lock().unwrap()[0].0);
    assert!(report.timings.get_step("preview").is_some());
}

#[test]
fn test_preview_failure_skips_write() {
    let (pipeline, written) = build_pipeline(MockReader::scaled(), PansharpenConfig::default());
    let pipeline = pipeline.with_previewer(RecordingPreview {
        should_fail: true,
        written: written.clone(),
        seen: Arc::new(Mutex::new(Vec::new())),
    });

    let err = pipeline.convert(INPUTS, &mut Cursor::new(Vec::new())).unwrap_err();

    assert!(matches!(err, PansharpenError::PreviewError(_)));
    assert!(written.lock().unwrap().is_empty());
}
