use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use tracing::info;

use brovey_pansharp_rs::image_pipeline::{
    BandSources, HistEqMethod, PansharpenConfig, PansharpenPipeline, PngPreview, ResamplingKernel,
    TiffCompression,
};
use brovey_pansharp_rs::logger;

#[derive(Parser)]
#[command(name = "brovey-pansharp")]
#[command(author, version, about = "Brovey pansharpening of a panchromatic band with red, green and blue bands")]
struct Cli {
    /// Scene folder holding 0/image.tif (panchromatic) and 1..3/image.tif (red, green, blue)
    #[arg(long, conflicts_with_all = ["pan", "red", "green", "blue"])]
    scene_dir: Option<PathBuf>,

    /// Panchromatic raster
    #[arg(long)]
    pan: Option<PathBuf>,
    /// Red band raster
    #[arg(long)]
    red: Option<PathBuf>,
    /// Green band raster
    #[arg(long)]
    green: Option<PathBuf>,
    /// Blue band raster
    #[arg(long)]
    blue: Option<PathBuf>,
    /// Output RGB GeoTIFF (defaults to <scene-dir>/brovey_rgb.tif)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Kernel used to resample multispectral bands onto the panchromatic grid
    #[arg(long, value_enum, default_value_t = Resampling::Cubic)]
    resampling: Resampling,

    /// Brovey band-count factor
    #[arg(long, default_value_t = 3.0)]
    bands_factor: f32,

    /// Contrast enhancement applied to each output channel
    #[arg(long, value_enum, default_value_t = Enhancement::Clahe)]
    histeq: Enhancement,

    /// CLAHE clip limit
    #[arg(long, default_value_t = 3.0)]
    clip_limit: f32,

    /// CLAHE tile grid as ROWSxCOLS
    #[arg(long, default_value = "8x8", value_parser = parse_tile_grid)]
    tile_grid: (usize, usize),

    /// Shifts are estimated to 1/N pixel
    #[arg(long, default_value_t = 10)]
    upsample_factor: usize,

    /// Fail when a band aligns with a confidence below this value (0..1)
    #[arg(long)]
    min_alignment_confidence: Option<f64>,

    #[arg(long, value_enum, default_value_t = Compression::None)]
    compression: Compression,

    /// TIFF predictor (2 = horizontal differencing)
    #[arg(long)]
    predictor: Option<u16>,

    /// Process the three multispectral bands one after another
    #[arg(long)]
    sequential: bool,

    /// Also save the result as a PNG preview
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Resampling {
    Nearest,
    Bilinear,
    Cubic,
}

impl From<Resampling> for ResamplingKernel {
    fn from(value: Resampling) -> Self {
        match value {
            Resampling::Nearest => ResamplingKernel::Nearest,
            Resampling::Bilinear => ResamplingKernel::Bilinear,
            Resampling::Cubic => ResamplingKernel::Cubic,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Enhancement {
    None,
    Global,
    Clahe,
}

#[derive(Clone, Copy, ValueEnum)]
enum Compression {
    None,
    Lzw,
    DeflateFast,
    Deflate,
    DeflateBest,
}

impl From<Compression> for TiffCompression {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => TiffCompression::None,
            Compression::Lzw => TiffCompression::Lzw,
            Compression::DeflateFast => TiffCompression::DeflateFast,
            Compression::Deflate => TiffCompression::DeflateBalanced,
            Compression::DeflateBest => TiffCompression::DeflateBest,
        }
    }
}

fn parse_tile_grid(value: &str) -> std::result::Result<(usize, usize), String> {
    let (rows, cols) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected ROWSxCOLS, got '{value}'"))?;
    let rows = rows.trim().parse().map_err(|e| format!("rows: {e}"))?;
    let cols = cols.trim().parse().map_err(|e| format!("cols: {e}"))?;
    Ok((rows, cols))
}

impl Cli {
    fn sources(&self) -> Result<BandSources> {
        if let Some(dir) = &self.scene_dir {
            let mut sources = BandSources::from_scene_dir(dir);
            if let Some(output) = &self.output {
                sources.output = output.clone();
            }
            return Ok(sources);
        }

        match (&self.pan, &self.red, &self.green, &self.blue, &self.output) {
            (Some(pan), Some(red), Some(green), Some(blue), Some(output)) => Ok(BandSources::new(
                pan,
                [red.clone(), green.clone(), blue.clone()],
                output,
            )),
            _ => bail!("either --scene-dir or all of --pan, --red, --green, --blue and --output are required"),
        }
    }

    fn histeq(&self) -> HistEqMethod {
        match self.histeq {
            Enhancement::None => HistEqMethod::None,
            Enhancement::Global => HistEqMethod::Global,
            Enhancement::Clahe => HistEqMethod::Clahe {
                clip_limit: self.clip_limit,
                tile_grid: self.tile_grid,
            },
        }
    }

    fn config(&self) -> Result<PansharpenConfig> {
        Ok(PansharpenConfig::builder()
            .sources(self.sources()?)
            .resampling(self.resampling.into())
            .bands_factor(self.bands_factor)
            .histeq(self.histeq())
            .upsample_factor(self.upsample_factor)
            .min_alignment_confidence(self.min_alignment_confidence)
            .parallel_bands(!self.sequential)
            .compression(self.compression.into())
            .predictor(self.predictor)
            .build())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_with_default(if cli.verbose { "debug" } else { "info" });

    let config = cli.config()?;
    info!("Starting Brovey pansharpening");
    info!("Resampling: {:?}", config.resampling);
    info!("Contrast enhancement: {:?}", config.histeq);
    info!("Compression: {:?}", config.compression);

    let output = config.sources.output.clone();
    let mut pipeline = PansharpenPipeline::new(config);
    if let Some(path) = &cli.preview {
        pipeline = pipeline.with_previewer(PngPreview::new(path));
    }
    let (_, report) = pipeline
        .convert_files()
        .with_context(|| format!("pansharpening into {} failed", output.display()))?;

    for band in &report.bands {
        info!(
            band = band.name,
            shift_row = band.shift.shift.0,
            shift_col = band.shift.shift.1,
            confidence = band.shift.confidence,
            "Band aligned"
        );
    }
    info!(
        output = %output.display(),
        width = report.width,
        height = report.height,
        elapsed_ms = report.total_duration().as_millis() as u64,
        "Conversion successful"
    );

    Ok(())
}
