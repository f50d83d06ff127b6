//! Band descriptive statistics
//!
//! Combines the statistics GDAL stores in band metadata (`STATISTICS_MEAN`,
//! `STATISTICS_MINIMUM`, `STATISTICS_MAXIMUM`, `STATISTICS_STDDEV`) with a
//! median taken from the pixel data. Tiles that were never passed through
//! `gdalinfo -stats` fall back to pixel-derived moments.

use std::path::Path;

use serde::Serialize;
use tilestats_core::io::read_geotiff;
use tilestats_core::raster::{keys, Raster, RasterElement, RasterStatistics};
use tilestats_core::{Algorithm, Error, Result};
use tracing::debug;

use crate::landcover::round_to;

/// Parameters for band statistics
#[derive(Debug, Clone)]
pub struct BandStatisticsParams {
    /// Compute missing `STATISTICS_*` items from pixels instead of failing
    pub fallback_to_pixels: bool,
}

impl Default for BandStatisticsParams {
    fn default() -> Self {
        Self {
            fallback_to_pixels: true,
        }
    }
}

/// Where the base moments came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatisticsSource {
    Tags,
    Pixels,
    Mixed,
}

/// Descriptive statistics of one band
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandSummary {
    /// Mean, 2 decimals
    pub mean: f64,
    /// Median of the valid pixels strictly above `minimum`
    pub median: Option<f64>,
    /// `|maximum - minimum|`
    pub range: f64,
    pub maximum: f64,
    /// Minimum, 1 decimal
    pub minimum: f64,
    /// Standard deviation over mean, in percent, 2 decimals; `None` for a zero mean
    pub coefficient_of_variation: Option<f64>,
    pub source: StatisticsSource,
    pub valid_count: usize,
}

/// Band statistics algorithm
#[derive(Debug, Clone, Default)]
pub struct BandStatistics;

impl Algorithm for BandStatistics {
    type Input = Raster<f64>;
    type Output = BandSummary;
    type Params = BandStatisticsParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "BandStatistics"
    }

    fn description(&self) -> &'static str {
        "Mean, median, range, extremes and coefficient of variation of a band"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        band_statistics(&input, params)
    }
}

/// Resolves each moment from band tags, falling back to pixel statistics
struct Moments<'a, T: RasterElement> {
    raster: &'a Raster<T>,
    fallback: bool,
    pixels: Option<RasterStatistics>,
    from_tags: usize,
    from_pixels: usize,
}

impl<'a, T: RasterElement> Moments<'a, T> {
    fn new(raster: &'a Raster<T>, fallback: bool) -> Self {
        Self {
            raster,
            fallback,
            pixels: None,
            from_tags: 0,
            from_pixels: 0,
        }
    }

    fn get(&mut self, key: &str, pick: fn(&RasterStatistics) -> Option<f64>) -> Result<f64> {
        if let Some(v) = self.raster.tags().get_f64(key)? {
            self.from_tags += 1;
            return Ok(v);
        }

        if !self.fallback {
            return Err(Error::MissingMetadata {
                key: key.to_string(),
            });
        }

        debug!("{} not tagged, computing from pixels", key);
        let raster = self.raster;
        let stats = self.pixels.get_or_insert_with(|| raster.statistics());
        let value = pick(stats).ok_or(Error::NoValidPixels {
            total: raster.len(),
        })?;
        self.from_pixels += 1;
        Ok(value)
    }

    fn source(&self) -> StatisticsSource {
        match (self.from_tags, self.from_pixels) {
            (_, 0) => StatisticsSource::Tags,
            (0, _) => StatisticsSource::Pixels,
            _ => StatisticsSource::Mixed,
        }
    }
}

/// Compute descriptive statistics of a band.
///
/// - `mean` = `STATISTICS_MEAN` rounded to 2 decimals
/// - `minimum` = `STATISTICS_MINIMUM` rounded to 1 decimal
/// - `maximum` = `STATISTICS_MAXIMUM`
/// - `range` = `|maximum - minimum|`
/// - `median` of valid pixels strictly greater than `minimum`
/// - `coefficient_of_variation` = `STATISTICS_STDDEV / STATISTICS_MEAN * 100`, 2 decimals
///
/// # Errors
/// - `InvalidMetadata` when a statistics item does not parse as a number
/// - `MissingMetadata` when an item is absent and fallback is disabled
/// - `NoValidPixels` when falling back on a band without valid pixels
pub fn band_statistics<T: RasterElement>(
    raster: &Raster<T>,
    params: BandStatisticsParams,
) -> Result<BandSummary> {
    let mut moments = Moments::new(raster, params.fallback_to_pixels);

    let mean_raw = moments.get(keys::STATISTICS_MEAN, |s| s.mean)?;
    let min_raw = moments.get(keys::STATISTICS_MINIMUM, |s| s.min)?;
    let maximum = moments.get(keys::STATISTICS_MAXIMUM, |s| s.max)?;
    let std_dev = moments.get(keys::STATISTICS_STDDEV, |s| s.std_dev)?;

    let mean = round_decimal(mean_raw, 2);
    let minimum = round_decimal(min_raw, 1);
    let range = (maximum - minimum).abs();

    let mut above_min: Vec<f64> = raster
        .valid_values()
        .filter_map(<T as RasterElement>::to_f64)
        .filter(|&v| v > minimum)
        .collect();
    let median = median(&mut above_min);

    let coefficient_of_variation = if mean_raw == 0.0 {
        None
    } else {
        Some(round_to(std_dev / mean_raw * 100.0, Some(2)))
    };

    Ok(BandSummary {
        mean,
        median,
        range,
        maximum,
        minimum,
        coefficient_of_variation,
        source: moments.source(),
        valid_count: raster.valid_values().count(),
    })
}

/// Read a band from disk and compute its statistics
pub fn band_statistics_from_file<P: AsRef<Path>>(
    tile: P,
    band: usize,
    params: BandStatisticsParams,
) -> Result<BandSummary> {
    let raster: Raster<f64> = read_geotiff(tile, Some(band))?;
    band_statistics(&raster, params)
}

/// Round the exact binary value to `decimals` places, so `0.065` becomes `0.07`
fn round_decimal(value: f64, decimals: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

/// Median with the two middle values averaged for even lengths
fn median(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }

    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        return Some(upper);
    }

    let lower_max = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((lower_max + upper) / 2.0)
}
