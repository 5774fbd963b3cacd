//! Histogram equalization of 8-bit channels.
//!
//! CLAHE follows the OpenCV tile-grid formulation. The grid counts tiles.
//! Unless both dimensions divide evenly, the image is reflect-101 padded by
//! `tiles - dim % tiles` along each axis (a whole extra row of tiles on an axis
//! that already divides) when computing tile histograms. Each histogram is
//! clipped and its excess redistributed, and the output blends the LUTs of the
//! four nearest tile centres.

use ndarray::{Array2, Axis};
use rayon::prelude::*;

const HIST_SIZE: usize = 256;

pub const DEFAULT_CLIP_LIMIT: f32 = 3.0;
pub const DEFAULT_TILE_GRID: (usize, usize) = (8, 8);

/// Contrast enhancement applied to each output channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistEqMethod {
    None,
    Global,
    Clahe {
        /// Multiplier on the uniform bin count; `<= 0` disables clipping.
        clip_limit: f32,
        /// Number of tiles as (rows, cols).
        tile_grid: (usize, usize),
    },
}

impl Default for HistEqMethod {
    fn default() -> Self {
        HistEqMethod::Clahe {
            clip_limit: DEFAULT_CLIP_LIMIT,
            tile_grid: DEFAULT_TILE_GRID,
        }
    }
}

pub fn apply_histeq(image: &Array2<u8>, method: HistEqMethod) -> Array2<u8> {
    match method {
        HistEqMethod::None => image.clone(),
        HistEqMethod::Global => equalize_histogram(image),
        HistEqMethod::Clahe {
            clip_limit,
            tile_grid,
        } => equalize_clahe(image, clip_limit, tile_grid),
    }
}

/// Global equalization through the image CDF.
pub fn equalize_histogram(image: &Array2<u8>) -> Array2<u8> {
    if image.is_empty() {
        return image.clone();
    }

    let mut hist = [0u32; HIST_SIZE];
    for &v in image.iter() {
        hist[v as usize] += 1;
    }

    let mut cdf = [0u32; HIST_SIZE];
    let mut acc = 0;
    for (c, &h) in cdf.iter_mut().zip(hist.iter()) {
        acc += h;
        *c = acc;
    }

    // Skip the empty bins below the darkest value
    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    let denom = image.len() as f32 - cdf_min as f32;
    if denom <= 0.0 {
        return image.clone();
    }

    let mut lut = [0u8; HIST_SIZE];
    for (l, &c) in lut.iter_mut().zip(cdf.iter()) {
        *l = ((c as f32 - cdf_min as f32) / denom * 255.0)
            .round()
            .clamp(0.0, 255.0) as u8;
    }
    image.mapv(|v| lut[v as usize])
}

/// Mirror index without repeating the edge sample (`dcb|abcd|cba`).
fn reflect_101(index: usize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let i = index % period;
    if i < len { i } else { period - i }
}

fn clip_histogram(hist: &mut [u32; HIST_SIZE], clip: u32) {
    let mut clipped = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            clipped += *bin - clip;
            *bin = clip;
        }
    }

    let batch = clipped / HIST_SIZE as u32;
    let mut residual = (clipped % HIST_SIZE as u32) as usize;
    for bin in hist.iter_mut() {
        *bin += batch;
    }
    if residual > 0 {
        let step = (HIST_SIZE / residual).max(1);
        let mut i = 0;
        while i < HIST_SIZE && residual > 0 {
            hist[i] += 1;
            i += step;
            residual -= 1;
        }
    }
}

/// Tile (height, width) for a `tiles` grid over a `dim` image.
fn tile_size(dim: (usize, usize), tiles: (usize, usize)) -> (usize, usize) {
    let (height, width) = dim;
    let (tiles_y, tiles_x) = tiles;
    if height % tiles_y == 0 && width % tiles_x == 0 {
        (height / tiles_y, width / tiles_x)
    } else {
        // (dim + tiles - dim % tiles) / tiles on both axes
        (height / tiles_y + 1, width / tiles_x + 1)
    }
}

/// Contrast limited adaptive histogram equalization.
///
/// `tile_grid` is (rows, cols) of tiles. An empty image or a zero grid
/// returns the input unchanged.
pub fn equalize_clahe(image: &Array2<u8>, clip_limit: f32, tile_grid: (usize, usize)) -> Array2<u8> {
    let (height, width) = image.dim();
    let (tiles_y, tiles_x) = tile_grid;
    if height == 0 || width == 0 || tiles_y == 0 || tiles_x == 0 {
        return image.clone();
    }

    let (tile_h, tile_w) = tile_size((height, width), tile_grid);
    let tile_area = tile_h * tile_w;

    let clip = if clip_limit > 0.0 {
        ((clip_limit * tile_area as f32 / HIST_SIZE as f32) as u32).max(1)
    } else {
        0
    };
    let lut_scale = (HIST_SIZE - 1) as f32 / tile_area as f32;

    let luts: Vec<[u8; HIST_SIZE]> = (0..tiles_y * tiles_x)
        .into_par_iter()
        .map(|t| {
            let (ty, tx) = (t / tiles_x, t % tiles_x);
            let mut hist = [0u32; HIST_SIZE];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let row = image.row(reflect_101(y, height));
                for x in tx * tile_w..(tx + 1) * tile_w {
                    hist[row[reflect_101(x, width)] as usize] += 1;
                }
            }

            if clip > 0 {
                clip_histogram(&mut hist, clip);
            }

            let mut lut = [0u8; HIST_SIZE];
            let mut sum = 0u32;
            for (l, &h) in lut.iter_mut().zip(hist.iter()) {
                sum += h;
                *l = (sum as f32 * lut_scale).round_ties_even().clamp(0.0, 255.0) as u8;
            }
            lut
        })
        .collect();

    // Neighbouring tile indices and the weight of the second one
    let neighbours = |pos: usize, tile: usize, tiles: usize| {
        let f = pos as f32 / tile as f32 - 0.5;
        let lo = f.floor();
        let weight = f - lo;
        let lo = lo as isize;
        let first = lo.max(0) as usize;
        let second = ((lo + 1) as usize).min(tiles - 1);
        (first, second, weight)
    };
    let columns: Vec<(usize, usize, f32)> = (0..width).map(|x| neighbours(x, tile_w, tiles_x)).collect();

    let mut out = Array2::<u8>::zeros((height, width));
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(y, mut out_row)| {
            let (ty1, ty2, ya) = neighbours(y, tile_h, tiles_y);
            let top = &luts[ty1 * tiles_x..(ty1 + 1) * tiles_x];
            let bottom = &luts[ty2 * tiles_x..(ty2 + 1) * tiles_x];
            let in_row = image.row(y);

            for ((px, &v), &(tx1, tx2, xa)) in out_row.iter_mut().zip(in_row.iter()).zip(columns.iter()) {
                let v = v as usize;
                let upper = top[tx1][v] as f32 * (1.0 - xa) + top[tx2][v] as f32 * xa;
                let lower = bottom[tx1][v] as f32 * (1.0 - xa) + bottom[tx2][v] as f32 * xa;
                let res = upper * (1.0 - ya) + lower * ya;
                *px = res.round_ties_even().clamp(0.0, 255.0) as u8;
            }
        });

    out
}
