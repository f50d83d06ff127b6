//! GeoTIFF reading and writing using GDAL

use crate::error::{Error, Result};
use crate::raster::{BandTags, GeoTransform, Raster, RasterElement};
use gdal::raster::{GdalDataType, GdalType};
use gdal::{Dataset, DriverManager, Metadata};
use std::path::Path;
use tracing::debug;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Compression type: "DEFLATE", "LZW", "ZSTD", "NONE"
    pub compression: String,
    /// Tile size for tiled TIFFs (0 for strips)
    pub tile_size: usize,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            compression: "DEFLATE".to_string(),
            tile_size: 256,
        }
    }
}

/// Read one band of a GeoTIFF file into a Raster
///
/// # Arguments
/// * `path` - Path to the tile
/// * `band` - Band number (1-indexed), defaults to 1
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement + GdalType,
    P: AsRef<Path>,
{
    let dataset = Dataset::open(path.as_ref())?;
    let band_idx = band.unwrap_or(1);
    let count = dataset.raster_count() as usize;
    if band_idx == 0 || band_idx > count {
        return Err(Error::BandOutOfRange { band: band_idx, count });
    }
    debug!("Reading {} (band {})", path.as_ref().display(), band_idx);

    let rasterband = dataset.rasterband(band_idx)?;
    let (cols, rows) = dataset.raster_size();

    let buffer = rasterband.read_as::<T>((0, 0), (cols, rows), (cols, rows), None)?;
    let mut raster = Raster::from_vec(buffer.data().to_vec(), rows, cols)?;

    if let Ok(gt) = dataset.geo_transform() {
        raster.set_transform(GeoTransform::from_gdal(gt));
    }

    if let Some(nodata) = rasterband.no_data_value() {
        // Cells of Float32 bands only carry f32 precision
        let nodata = if rasterband.band_type() == GdalDataType::Float32 {
            nodata as f32 as f64
        } else {
            nodata
        };
        raster.set_nodata(num_traits::cast(nodata));
    }

    // Default-domain items come back as "KEY=VALUE"
    let tags: BandTags = rasterband
        .metadata_domain("")
        .unwrap_or_default()
        .iter()
        .filter_map(|item| item.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    raster.set_tags(tags);

    Ok(raster)
}

/// Number of bands in a raster file
pub fn band_count<P: AsRef<Path>>(path: P) -> Result<usize> {
    let dataset = Dataset::open(path.as_ref())?;
    Ok(dataset.raster_count() as usize)
}

/// Write a single-band Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement + GdalType,
    P: AsRef<Path>,
{
    write_geotiff_bands(&[raster], path, options)
}

/// Write bands of equal shape to a GeoTIFF file
///
/// Georeferencing and nodata are taken from the first band; each band keeps its tags.
pub fn write_geotiff_bands<T, P>(
    bands: &[&Raster<T>],
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement + GdalType,
    P: AsRef<Path>,
{
    let first = bands
        .first()
        .ok_or_else(|| Error::Other("No bands to write".to_string()))?;
    let (rows, cols) = first.shape();
    if let Some(other) = bands.iter().find(|b| b.shape() != (rows, cols)) {
        return Err(Error::InvalidDimensions {
            width: other.cols(),
            height: other.rows(),
        });
    }

    let opts = options.unwrap_or_default();
    let driver = DriverManager::get_driver_by_name("GTiff")?;

    let mut create_options = vec![format!("COMPRESS={}", opts.compression)];
    if opts.tile_size > 0 {
        create_options.push("TILED=YES".to_string());
        create_options.push(format!("BLOCKXSIZE={}", opts.tile_size));
        create_options.push(format!("BLOCKYSIZE={}", opts.tile_size));
    }
    let create_options_refs: Vec<&str> = create_options.iter().map(|s| s.as_str()).collect();

    let mut dataset = driver.create_with_band_type_with_options::<T, _>(
        path.as_ref(),
        cols as isize,
        rows as isize,
        bands.len() as isize,
        &create_options_refs,
    )?;

    dataset.set_geo_transform(&first.transform().to_gdal())?;

    for (idx, raster) in bands.iter().enumerate() {
        let mut band = dataset.rasterband(idx + 1)?;

        if let Some(nodata) = first.nodata().and_then(|v| v.to_f64()) {
            band.set_no_data_value(Some(nodata))?;
        }

        for (key, value) in raster.tags().iter() {
            band.set_metadata_item(key, value, "")?;
        }

        let data: Vec<T> = raster.data().iter().copied().collect();
        band.write((0, 0), (cols, rows), &data)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::keys;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_read_tags() {
        let mut raster: Raster<f32> = Raster::filled(20, 20, 7.0);
        raster.set_transform(GeoTransform::new(0.0, 20.0, 1.0, -1.0));
        raster.set_nodata(Some(-9999.0));
        raster.tags_mut().insert(keys::STATISTICS_MEAN, "7");

        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&raster, tmp.path(), None).unwrap();

        let loaded: Raster<f32> = read_geotiff(tmp.path(), None).unwrap();
        assert_eq!(loaded.shape(), raster.shape());
        assert_eq!(loaded.get(5, 5).unwrap(), 7.0);
        assert_eq!(loaded.tags().get(keys::STATISTICS_MEAN), Some("7"));
        assert!(matches!(
            read_geotiff::<f32, _>(tmp.path(), Some(2)),
            Err(Error::BandOutOfRange { band: 2, count: 1 })
        ));
    }
}
