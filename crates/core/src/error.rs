//! Error types for tilestats

use thiserror::Error;

/// Main error type for tilestats operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Band {band} out of range: tile has {count} band(s)")]
    BandOutOfRange { band: usize, count: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Missing band metadata item {key}")]
    MissingMetadata { key: String },

    #[error("Invalid metadata item {key} = {value:?}")]
    InvalidMetadata { key: String, value: String },

    #[error("Lookup table line {line}: {reason}")]
    LookupTable { line: usize, reason: String },

    #[error("Tile has no valid pixels ({total} cells, all NoData)")]
    NoValidPixels { total: usize },

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

/// Result type alias for tilestats operations
pub type Result<T> = std::result::Result<T, Error>;
