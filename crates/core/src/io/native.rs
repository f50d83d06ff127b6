//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate. Band metadata comes from the GDAL_METADATA tag and
//! nodata from GDAL_NODATA, so tiles produced by GDAL keep their statistics
//! items. For planar-separate or exotic layouts, enable the `gdal` feature.

use crate::error::{Error, Result};
use crate::io::gdal_metadata::{band_tags_from_xml, gdal_metadata_xml, GDAL_METADATA_TAG, GDAL_NODATA_TAG};
use crate::raster::{GeoTransform, Raster, RasterElement};
use num_traits::NumCast;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray32Float, RGB32Float, RGBA32Float};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::debug;

const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
const MODEL_TIEPOINT_TAG: u16 = 33922;
const GEO_KEY_DIRECTORY_TAG: u16 = 34735;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Compression (not supported in native mode, always written uncompressed)
    pub compression: String,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            compression: "NONE".to_string(),
        }
    }
}

/// Read one band of a GeoTIFF file into a Raster
///
/// `band` is 1-based and defaults to the first band.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    debug!("Reading {} (band {})", path.as_ref().display(), band.unwrap_or(1));
    decode_geotiff(file, band)
}

/// Read one band of a GeoTIFF held in memory
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), band)
}

/// Number of bands (samples per pixel) in a GeoTIFF file
pub fn band_count<P: AsRef<Path>>(path: P) -> Result<usize> {
    let file = File::open(path.as_ref())?;
    let mut decoder = Decoder::new(file).map_err(tiff_err("TIFF decode error"))?;
    Ok(samples_per_pixel(&mut decoder))
}

fn tiff_err(context: &'static str) -> impl Fn(tiff::TiffError) -> Error {
    move |e| Error::Other(format!("{}: {}", context, e))
}

fn samples_per_pixel<R: Read + Seek>(decoder: &mut Decoder<R>) -> usize {
    decoder
        .get_tag_u32(Tag::SamplesPerPixel)
        .map(|n| n as usize)
        .unwrap_or(1)
}

/// Pick every `samples`-th value starting at the band's offset
fn extract_band<S, T>(buf: &[S], band: usize, samples: usize) -> Vec<T>
where
    S: NumCast + Copy,
    T: RasterElement,
{
    buf.iter()
        .skip(band - 1)
        .step_by(samples)
        .map(|&v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

fn decode_geotiff<T, R>(reader: R, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(tiff_err("TIFF decode error"))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(tiff_err("Cannot read dimensions"))?;
    let rows = height as usize;
    let cols = width as usize;

    let samples = samples_per_pixel(&mut decoder);
    let band = band.unwrap_or(1);
    if band == 0 || band > samples {
        return Err(Error::BandOutOfRange { band, count: samples });
    }

    if samples > 1 && decoder.get_tag_u32(Tag::PlanarConfiguration).unwrap_or(1) == 2 {
        return Err(Error::UnsupportedDataType(
            "planar-separate multi-band TIFF (enable the gdal feature)".to_string(),
        ));
    }

    let result = decoder
        .read_image()
        .map_err(tiff_err("Cannot read image data"))?;

    let f32_samples = matches!(result, DecodingResult::F32(_));
    let data: Vec<T> = match result {
        DecodingResult::U8(buf) => extract_band(&buf, band, samples),
        DecodingResult::U16(buf) => extract_band(&buf, band, samples),
        DecodingResult::U32(buf) => extract_band(&buf, band, samples),
        DecodingResult::U64(buf) => extract_band(&buf, band, samples),
        DecodingResult::I8(buf) => extract_band(&buf, band, samples),
        DecodingResult::I16(buf) => extract_band(&buf, band, samples),
        DecodingResult::I32(buf) => extract_band(&buf, band, samples),
        DecodingResult::I64(buf) => extract_band(&buf, band, samples),
        DecodingResult::F32(buf) => extract_band(&buf, band, samples),
        DecodingResult::F64(buf) => extract_band(&buf, band, samples),
        #[allow(unreachable_patterns)]
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }

    if let Ok(nodata) = decoder.get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA_TAG)) {
        let nodata = nodata.trim_end_matches('\0').trim();
        match nodata.parse::<f64>() {
            Ok(v) => {
                // Cells decoded from f32 samples only carry f32 precision
                let v = if f32_samples { v as f32 as f64 } else { v };
                raster.set_nodata(num_traits::cast(v))
            }
            Err(_) => debug!("Ignoring unparsable GDAL_NODATA value {:?}", nodata),
        }
    }

    if let Ok(xml) = decoder.get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_METADATA_TAG)) {
        raster.set_tags(band_tags_from_xml(&xml, band));
    }

    Ok(raster)
}

/// Read the GeoTransform from ModelPixelScaleTag + ModelTiepointTag
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE_TAG))
        .ok()?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT_TAG))
        .ok()?;
    GeoTransform::from_tiepoint(&tiepoint, &scale)
}

/// Write a single-band Raster to a GeoTIFF file
///
/// Native writer: data is stored as 32-bit float. Band tags go to
/// GDAL_METADATA and nodata to GDAL_NODATA.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    write_geotiff_bands(&[raster], path, options)
}

/// Write 1, 3 or 4 bands of equal shape as a pixel-interleaved GeoTIFF file
///
/// Georeferencing and nodata are taken from the first band.
pub fn write_geotiff_bands<T, P>(
    bands: &[&Raster<T>],
    path: P,
    _options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(bands, file)
}

/// Write a single-band Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, _options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(&[raster], Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(bands: &[&Raster<T>], writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
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

    // Pixel-interleaved f32 samples
    let mut data: Vec<f32> = Vec::with_capacity(rows * cols * bands.len());
    for idx in 0..rows * cols {
        let (row, col) = (idx / cols, idx % cols);
        for band in bands {
            let v = band.data()[(row, col)];
            data.push(num_traits::cast(v).unwrap_or(f32::NAN));
        }
    }

    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("TIFF encoder error"))?;

    match bands.len() {
        1 => write_image::<Gray32Float, _, _>(&mut encoder, bands, cols, rows, &data),
        3 => write_image::<RGB32Float, _, _>(&mut encoder, bands, cols, rows, &data),
        4 => write_image::<RGBA32Float, _, _>(&mut encoder, bands, cols, rows, &data),
        n => Err(Error::UnsupportedDataType(format!(
            "native writer supports 1, 3 or 4 bands, got {}",
            n
        ))),
    }
}

fn write_image<C, T, W>(
    encoder: &mut TiffEncoder<W>,
    bands: &[&Raster<T>],
    cols: usize,
    rows: usize,
    data: &[f32],
) -> Result<()>
where
    C: ColorType<Inner = f32>,
    [f32]: tiff::encoder::TiffValue,
    T: RasterElement,
    W: Write + Seek,
{
    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(tiff_err("Cannot create TIFF image"))?;

    let first = bands[0];
    let gt = first.transform();

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE_TAG), &scale[..])
        .map_err(tiff_err("Cannot write scale tag"))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT_TAG), &tiepoint[..])
        .map_err(tiff_err("Cannot write tiepoint tag"))?;

    // Minimal GeoKey directory: GTModelType=Projected, GTRasterType=PixelIsArea
    let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY_TAG), &geokeys[..])
        .map_err(tiff_err("Cannot write geokey tag"))?;

    let tag_sets: Vec<_> = bands.iter().map(|b| b.tags()).collect();
    if let Some(xml) = gdal_metadata_xml(&tag_sets) {
        image
            .encoder()
            .write_tag(Tag::Unknown(GDAL_METADATA_TAG), xml.as_str())
            .map_err(tiff_err("Cannot write GDAL metadata tag"))?;
    }

    if let Some(nodata) = first.nodata().and_then(|v| num_traits::cast::<T, f32>(v)) {
        let text = format!("{}", nodata);
        image
            .encoder()
            .write_tag(Tag::Unknown(GDAL_NODATA_TAG), text.as_str())
            .map_err(tiff_err("Cannot write nodata tag"))?;
    }

    image
        .write_data(data)
        .map_err(tiff_err("Cannot write image data"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::keys;

    fn sample_band(offset: f32) -> Raster<f32> {
        let data: Vec<f32> = (0..12).map(|v| v as f32 + offset).collect();
        let mut raster = Raster::from_vec(data, 3, 4).unwrap();
        raster.set_transform(GeoTransform::new(500_000.0, 4_100_000.0, 10.0, -10.0));
        raster
    }

    #[test]
    fn test_buffer_roundtrip_with_tags() {
        let mut raster = sample_band(0.0);
        raster.set_nodata(Some(-9999.0));
        raster.tags_mut().insert(keys::STATISTICS_MEAN, "5.5");

        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let loaded: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();

        assert_eq!(loaded.shape(), (3, 4));
        assert_eq!(loaded.get(2, 3).unwrap(), 11.0);
        assert_eq!(loaded.nodata(), Some(-9999.0));
        assert_eq!(loaded.tags().get(keys::STATISTICS_MEAN), Some("5.5"));
        assert_eq!(loaded.transform().origin_x, 500_000.0);
        assert_eq!(loaded.transform().pixel_height, -10.0);
    }

    #[test]
    fn test_multiband_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");

        let mut b1 = sample_band(0.0);
        let b2 = sample_band(100.0);
        let mut b3 = sample_band(200.0);
        b1.tags_mut().insert(keys::STATISTICS_MEAN, "5.5");
        b3.tags_mut().insert(keys::STATISTICS_MEAN, "205.5");
        write_geotiff_bands(&[&b1, &b2, &b3], &path, None).unwrap();

        assert_eq!(band_count(&path).unwrap(), 3);

        let third: Raster<f64> = read_geotiff(&path, Some(3)).unwrap();
        assert_eq!(third.get(0, 0).unwrap(), 200.0);
        assert_eq!(third.get(2, 3).unwrap(), 211.0);
        assert_eq!(third.tags().get(keys::STATISTICS_MEAN), Some("205.5"));

        let second: Raster<f64> = read_geotiff(&path, Some(2)).unwrap();
        assert_eq!(second.get(1, 1).unwrap(), 105.0);
        assert!(second.tags().is_empty());
    }

    #[test]
    fn test_band_out_of_range() {
        let buf = write_geotiff_to_buffer(&sample_band(0.0), None).unwrap();

        let err = read_geotiff_from_buffer::<f64>(&buf, Some(2)).unwrap_err();
        assert!(matches!(err, Error::BandOutOfRange { band: 2, count: 1 }));

        let err = read_geotiff_from_buffer::<f64>(&buf, Some(0)).unwrap_err();
        assert!(matches!(err, Error::BandOutOfRange { band: 0, .. }));
    }

    fn float_tile_with_nodata_text(data: &[f32], cols: u32, rows: u32, nodata: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut encoder = TiffEncoder::new(Cursor::new(&mut buf)).unwrap();
            let mut image = encoder.new_image::<Gray32Float>(cols, rows).unwrap();
            image
                .encoder()
                .write_tag(Tag::Unknown(GDAL_NODATA_TAG), nodata)
                .unwrap();
            image.write_data(data).unwrap();
        }
        buf
    }

    #[test]
    fn test_gdal_float32_fill_nodata() {
        let buf = float_tile_with_nodata_text(&[-3.4e38, 1.0, 2.0, 2.0], 2, 2, "-3.4e+38");

        let loaded: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert_eq!(loaded.nodata(), Some(-3.4e38_f32 as f64));
        assert!(loaded.is_nodata(loaded.get(0, 0).unwrap()));
        assert_eq!(loaded.valid_values().count(), 3);

        let single: Raster<f32> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert!(single.is_nodata(single.get(0, 0).unwrap()));
    }

    #[test]
    fn test_f64_fill_nodata_roundtrip() {
        let mut raster = Raster::from_vec(vec![-3.4e38_f64, 10.0, 20.0, 30.0], 2, 2).unwrap();
        raster.set_nodata(Some(-3.4e38));

        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let loaded: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert_eq!(loaded.valid_values().count(), 3);
        assert_eq!(loaded.statistics().min, Some(10.0));
    }

    #[test]
    fn test_two_bands_unsupported() {
        let b = sample_band(0.0);
        let dir = tempfile::tempdir().unwrap();
        let result = write_geotiff_bands(&[&b, &b], dir.path().join("x.tif"), None);
        assert!(matches!(result, Err(Error::UnsupportedDataType(_))));
    }
}
