//! # tilestats core
//!
//! Core types and I/O for land-cover tile statistics.
//!
//! This crate provides:
//! - `Raster<T>`: one band of a tile, with georeferencing, nodata and band tags
//! - `BandTags`: GDAL band metadata items (`STATISTICS_MEAN`, ...)
//! - `LookupTable`: class code to land-use class mapping
//! - GeoTIFF reading/writing (native `tiff` backend, or GDAL behind the `gdal` feature)

pub mod error;
pub mod io;
pub mod lut;
pub mod raster;

pub use error::{Error, Result};
pub use lut::{LandUseClass, LookupTable};
pub use raster::{BandTags, GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::lut::{LandUseClass, LookupTable};
    pub use crate::raster::{BandTags, GeoTransform, Raster, RasterElement};
    pub use crate::Algorithm;
}

/// Core trait for tile algorithms.
///
/// Algorithms are pure functions from a band (plus parameters) to a summary.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
