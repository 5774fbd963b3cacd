use std::io::Write;
use std::path::Path;

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use tracing::{Span, info, info_span, instrument, warn};

use crate::image_pipeline::{
    common::{
        error::{PansharpenError, Result},
        timing::{PipelineTimings, Timer},
    },
    conversions::types::{BAND_NAMES, BandReport, PansharpenConfig, PansharpenReport},
    preview::{NoPreview, Previewer},
    raster::{GeoProfile, GeoTiffReader, MultispectralStack, RasterBand, RasterReader, RgbImage},
    sharpen::{
        AffineReprojector, Reprojector, ShiftRefiner, apply_histeq, brovey_transform,
        min_max_normalize, to_u8,
    },
    tiff::{GeoTiffRgbWriter, RgbTiffWriter},
};

/// A multispectral band on the panchromatic grid, registered and normalized.
struct AlignedBand {
    data: Array2<f32>,
    report: BandReport,
    timings: PipelineTimings,
}

pub struct PansharpenPipeline<R: RasterReader, W: RgbTiffWriter> {
    reader: R,
    writer: W,
    reprojector: Option<Box<dyn Reprojector>>,
    previewer: Box<dyn Previewer>,
    config: PansharpenConfig,
}

impl PansharpenPipeline<GeoTiffReader, GeoTiffRgbWriter> {
    pub fn new(config: PansharpenConfig) -> Self {
        Self {
            reader: GeoTiffReader,
            writer: GeoTiffRgbWriter,
            reprojector: None,
            previewer: Box::new(NoPreview),
            config,
        }
    }
}

impl<R: RasterReader, W: RgbTiffWriter> PansharpenPipeline<R, W> {
    pub fn with_custom(reader: R, writer: W, config: PansharpenConfig) -> Self {
        Self {
            reader,
            writer,
            reprojector: None,
            previewer: Box::new(NoPreview),
            config,
        }
    }

    /// Replaces the affine reprojector derived from `config.resampling`.
    pub fn with_reprojector(mut self, reprojector: impl Reprojector + 'static) -> Self {
        self.reprojector = Some(Box::new(reprojector));
        self
    }

    /// Shows the assembled image before it is encoded and written.
    pub fn with_previewer(mut self, previewer: impl Previewer + 'static) -> Self {
        self.previewer = Box::new(previewer);
        self
    }

    fn validate_dimensions(&self, band: &RasterBand, name: &str) -> Result<()> {
        if !self.config.validate_dimensions {
            return Ok(());
        }

        let profile = band.profile();
        if profile.width == 0 || profile.height == 0 {
            return Err(PansharpenError::InvalidDimensions(profile.width, profile.height));
        }
        if !profile.transform.is_invertible() {
            return Err(PansharpenError::InputReadError(format!(
                "{name} band has a degenerate geotransform"
            )));
        }

        Ok(())
    }

    /// Fuses a panchromatic band with red, green and blue bands into an 8-bit
    /// RGB image on the panchromatic grid.
    #[instrument(skip_all, fields(width = pan.profile().width, height = pan.profile().height))]
    pub fn sharpen(
        &self,
        pan: &RasterBand,
        multispectral: [&RasterBand; 3],
    ) -> Result<(RgbImage, PansharpenReport)> {
        info!("Starting pansharpening");
        let mut timings = PipelineTimings::new();

        {
            let _span = info_span!("validate_dimensions").entered();
            self.validate_dimensions(pan, "panchromatic")?;
            for (band, name) in multispectral.iter().zip(BAND_NAMES) {
                self.validate_dimensions(band, name)?;
            }
        }

        let aligned = {
            let _span = info_span!("align_bands", parallel = self.config.parallel_bands).entered();
            self.align_bands(pan, multispectral)?
        };

        let mut degenerate_bands = 0;
        let mut band_reports = Vec::with_capacity(3);
        let mut aligned_data = Vec::with_capacity(3);
        for band in aligned {
            degenerate_bands += usize::from(band.report.degenerate);
            timings.merge(band.timings);
            band_reports.push(band.report);
            aligned_data.push(band.data);
        }

        let pan_norm = {
            let _span = info_span!("normalize_pan").entered();
            let timer = Timer::start("normalize_pan");
            let normalized = min_max_normalize(pan.data(), self.config.normalize_epsilon);
            timings.record(timer);
            if normalized.degenerate {
                warn!("Panchromatic band is constant, normalized to zeros");
                degenerate_bands += 1;
            }
            normalized.data
        };

        let fused = {
            let _span = info_span!("brovey").entered();
            let timer = Timer::start("brovey");
            let stack = MultispectralStack::new(into_array3(aligned_data)?)?;
            let fused = brovey_transform(
                &stack,
                &pan_norm,
                self.config.bands_factor,
                self.config.brovey_epsilon,
            )?;
            timings.record(timer);
            if fused.zeroed_pixels > 0 {
                warn!(pixels = fused.zeroed_pixels, "Pixels without multispectral signal set to 0");
            }
            fused
        };

        let (rgb, degenerate_channels) = {
            let _span = info_span!("enhance", method = ?self.config.histeq).entered();
            let timer = Timer::start("enhance");
            let result = self.enhance(fused.stack)?;
            timings.record(timer);
            result
        };
        degenerate_bands += degenerate_channels;

        let (height, width) = pan.shape();
        info!(width, height, degenerate_bands, "Pansharpening complete");

        Ok((
            rgb,
            PansharpenReport {
                width,
                height,
                bands: band_reports,
                degenerate_bands,
                zeroed_pixels: fused.zeroed_pixels,
                timings,
            },
        ))
    }

    fn align_bands(&self, pan: &RasterBand, multispectral: [&RasterBand; 3]) -> Result<Vec<AlignedBand>> {
        let default_reprojector = AffineReprojector::new(self.config.resampling);
        let reprojector: &dyn Reprojector = match &self.reprojector {
            Some(custom) => custom.as_ref(),
            None => &default_reprojector,
        };
        let refiner = ShiftRefiner::new(
            self.config.upsample_factor,
            self.config.min_alignment_confidence,
        );
        let epsilon = self.config.normalize_epsilon;
        let parent = Span::current();

        let run = |index: usize| {
            let _span = info_span!(parent: &parent, "band", name = BAND_NAMES[index]).entered();
            align_band(
                BAND_NAMES[index],
                multispectral[index],
                pan,
                reprojector,
                &refiner,
                epsilon,
            )
        };

        if self.config.parallel_bands {
            (0..3).into_par_iter().map(run).collect()
        } else {
            (0..3).map(run).collect()
        }
    }

    /// Per-channel normalize, 8-bit scaling and contrast enhancement.
    fn enhance(&self, stack: MultispectralStack) -> Result<(RgbImage, usize)> {
        let epsilon = self.config.normalize_epsilon;
        let method = self.config.histeq;

        let channels: Vec<(Array2<u8>, bool)> = stack
            .into_bands()
            .into_par_iter()
            .map(|band| {
                let normalized = min_max_normalize(&band, epsilon);
                let enhanced = apply_histeq(&to_u8(&normalized.data), method);
                (enhanced, normalized.degenerate)
            })
            .collect();

        let degenerate = channels.iter().filter(|(_, d)| *d).count();
        if degenerate > 0 {
            warn!(channels = degenerate, "Constant output channels normalized to zeros");
        }

        let views: Vec<ArrayView2<u8>> = channels.iter().map(|(c, _)| c.view()).collect();
        let rgb = ndarray::stack(Axis(2), &views)
            .map_err(|e| PansharpenError::EncodeError(e.to_string()))?;
        Ok((rgb, degenerate))
    }

    #[instrument(skip(self, inputs))]
    fn decode_inputs(&self, inputs: [&[u8]; 4]) -> Result<[RasterBand; 4]> {
        let [pan, red, green, blue] = inputs;
        Ok([
            self.reader.read_band(pan)?,
            self.reader.read_band(red)?,
            self.reader.read_band(green)?,
            self.reader.read_band(blue)?,
        ])
    }

    fn run(&self, inputs: [&[u8]; 4]) -> Result<(RgbImage, GeoProfile, PansharpenReport)> {
        let mut decode_timings = PipelineTimings::new();
        let [pan, red, green, blue] = {
            let _span = info_span!("decode_rasters").entered();
            let timer = Timer::start("decode");
            let bands = self.decode_inputs(inputs)?;
            decode_timings.record(timer);
            bands
        };

        let (rgb, mut report) = self.sharpen(&pan, [&red, &green, &blue])?;

        let mut timings = decode_timings;
        timings.merge(report.timings);
        report.timings = timings;

        {
            let _span = info_span!("preview").entered();
            let timer = Timer::start("preview");
            self.previewer.preview(&rgb)?;
            report.timings.record(timer);
        }

        let (_, profile) = pan.into_parts();
        Ok((rgb, profile, report))
    }

    /// Decodes the panchromatic, red, green and blue rasters (in that order),
    /// sharpens them, previews the result and writes the RGB GeoTIFF with the
    /// panchromatic profile.
    #[instrument(skip(self, inputs, output), fields(input_size = inputs.iter().map(|i| i.len()).sum::<usize>()))]
    pub fn convert(&self, inputs: [&[u8]; 4], output: &mut dyn Write) -> Result<PansharpenReport> {
        let (rgb, profile, mut report) = self.run(inputs)?;

        {
            let _span = info_span!("encode_tiff").entered();
            let timer = Timer::start("encode");
            self.writer
                .write_rgb_tiff(&rgb, &profile, output, &self.config.tiff_options())?;
            report.timings.record(timer);
        }

        report.timings.log_summary();
        Ok(report)
    }

    /// Runs the configured sources end to end. The output is fully encoded
    /// before the file is created, so a failed run leaves no partial file.
    #[instrument(skip(self))]
    pub fn convert_files(&self) -> Result<(RgbImage, PansharpenReport)> {
        let sources = &self.config.sources;
        info!(
            pan = %sources.panchromatic.display(),
            output = %sources.output.display(),
            "Converting scene"
        );

        let inputs = {
            let _span = info_span!("read_input_files").entered();
            [
                read_input(&sources.panchromatic)?,
                read_input(&sources.multispectral[0])?,
                read_input(&sources.multispectral[1])?,
                read_input(&sources.multispectral[2])?,
            ]
        };
        let [pan, red, green, blue] = &inputs;

        let (rgb, profile, mut report) = self.run([pan.as_slice(), red.as_slice(), green.as_slice(), blue.as_slice()])?;

        let mut encoded = Vec::new();
        {
            let _span = info_span!("encode_tiff").entered();
            let timer = Timer::start("encode");
            self.writer
                .write_rgb_tiff(&rgb, &profile, &mut encoded, &self.config.tiff_options())?;
            report.timings.record(timer);
        }

        {
            let _span = info_span!("write_output_file").entered();
            let output_path = &sources.output;
            let mut file = std::fs::File::create(output_path).map_err(|e| {
                PansharpenError::OutputWriteError(format!("{}: {}", output_path.display(), e))
            })?;
            file.write_all(&encoded).map_err(|e| {
                PansharpenError::OutputWriteError(format!("{}: {}", output_path.display(), e))
            })?;
        }

        report.timings.log_summary();
        Ok((rgb, report))
    }

    pub fn config(&self) -> &PansharpenConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PansharpenConfig) {
        self.config = config;
    }
}

/// The per-band sub-pipeline: resample onto the panchromatic grid, remove
/// the residual shift, normalize.
fn align_band(
    name: &'static str,
    band: &RasterBand,
    pan: &RasterBand,
    reprojector: &dyn Reprojector,
    refiner: &ShiftRefiner,
    epsilon: f32,
) -> Result<AlignedBand> {
    let mut timings = PipelineTimings::new();

    let timer = Timer::start(format!("resample_{name}"));
    let resampled = reprojector.reproject(band, pan.profile())?;
    timings.record(timer);

    let timer = Timer::start(format!("refine_shift_{name}"));
    let (corrected, shift) = refiner.refine(name, &pan.data().view(), &resampled.view())?;
    timings.record(timer);

    let timer = Timer::start(format!("normalize_{name}"));
    let normalized = min_max_normalize(&corrected, epsilon);
    timings.record(timer);
    if normalized.degenerate {
        warn!(band = name, "Band is constant after alignment, normalized to zeros");
    }

    Ok(AlignedBand {
        data: normalized.data,
        report: BandReport {
            name,
            shift,
            degenerate: normalized.degenerate,
        },
        timings,
    })
}

fn into_array3(bands: Vec<Array2<f32>>) -> Result<[Array2<f32>; 3]> {
    bands.try_into().map_err(|bands: Vec<Array2<f32>>| {
        PansharpenError::InputReadError(format!("expected 3 multispectral bands, got {}", bands.len()))
    })
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| PansharpenError::InputReadError(format!("{}: {}", path.display(), e)))
}
