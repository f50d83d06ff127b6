//! Raster data structures

mod element;
mod geotransform;
mod grid;
mod tags;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use tags::{keys, BandTags};
