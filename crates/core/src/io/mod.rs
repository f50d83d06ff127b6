//! Reading and writing tiles and lookup tables

#[cfg(feature = "gdal")]
mod gdal_io;
mod gdal_metadata;
mod native;

#[cfg(feature = "gdal")]
pub use gdal_io::{band_count, read_geotiff, write_geotiff, write_geotiff_bands, GeoTiffOptions};

#[cfg(not(feature = "gdal"))]
pub use native::{band_count, read_geotiff, write_geotiff, write_geotiff_bands, GeoTiffOptions};

// Buffer-based I/O (always available, no filesystem dependency)
pub use native::{read_geotiff_from_buffer, write_geotiff_to_buffer};

pub use crate::lut::read_lookup_table;
pub use gdal_metadata::{GDAL_METADATA_TAG, GDAL_NODATA_TAG};
