//! # tilestats algorithms
//!
//! Summary statistics over land-cover tiles.
//!
//! ## Available Algorithm Categories
//!
//! - **landcover**: per-class pixel proportions using a lookup table
//! - **statistics**: band descriptive statistics (mean, median, range, extremes, CV)

pub(crate) mod maybe_rayon;

pub mod landcover;
pub mod statistics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::landcover::{
        class_proportions, class_proportions_from_file, ClassProportions, ClassProportionsParams,
        ClassShare, ProportionHistogram,
    };
    pub use crate::statistics::{
        band_statistics, band_statistics_from_file, BandStatistics, BandStatisticsParams,
        BandSummary, StatisticsSource,
    };
    pub use tilestats_core::prelude::*;
}
