//! Pipeline conversions module
//!
//! Orchestration of the pansharpening stages and its configuration.

mod pansharpen;
pub mod types;

#[cfg(test)]
mod tests;

pub use pansharpen::PansharpenPipeline;
pub use types::{BAND_NAMES, BandReport, BandSources, PansharpenConfig, PansharpenConfigBuilder, PansharpenReport};
