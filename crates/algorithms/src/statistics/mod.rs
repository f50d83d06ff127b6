//! Statistical summaries of raster bands
//!
//! - **band**: descriptive statistics from band metadata tags and pixel data

mod band;

pub use band::{
    band_statistics, band_statistics_from_file, BandStatistics, BandStatisticsParams,
    BandSummary, StatisticsSource,
};
