//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::{BandTags, GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2};

/// One band of a georeferenced tile.
///
/// `Raster<T>` stores values of type `T` in a 2D grid together with the
/// georeferencing, nodata value and metadata items of the band it was read from.
///
/// # Example
///
/// ```ignore
/// use tilestats_core::Raster;
///
/// let mut raster: Raster<u8> = Raster::new(100, 100);
/// raster.set(10, 20, 3)?;
/// let value = raster.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    transform: GeoTransform,
    nodata: Option<T>,
    /// Metadata items of the source band
    tags: BandTags,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            nodata: None,
            tags: BandTags::default(),
        }
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells (height × width)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds { row, col, rows, cols }),
        }
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Metadata items of the band
    pub fn tags(&self) -> &BandTags {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut BandTags {
        &mut self.tags
    }

    pub fn set_tags(&mut self, tags: BandTags) {
        self.tags = tags;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Iterate over the cells that are not no-data, in row-major order
    pub fn valid_values(&self) -> impl Iterator<Item = T> + '_ {
        self.data.iter().copied().filter(move |&v| !self.is_nodata(v))
    }

    // Statistics

    /// Moments of the valid cells, computed from pixel data.
    ///
    /// `std_dev` is the population standard deviation, matching what GDAL
    /// stores in `STATISTICS_STDDEV`.
    pub fn statistics(&self) -> RasterStatistics {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut count: usize = 0;

        for v in self.valid_values().filter_map(<T as RasterElement>::to_f64) {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            sum_sq += v * v;
            count += 1;
        }

        if count == 0 {
            return RasterStatistics {
                min: None,
                max: None,
                mean: None,
                std_dev: None,
                valid_count: 0,
                nodata_count: self.len(),
            };
        }

        let n = count as f64;
        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);

        RasterStatistics {
            min: Some(min),
            max: Some(max),
            mean: Some(mean),
            std_dev: Some(variance.sqrt()),
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Pixel-derived statistics for a band
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.len(), 20_000);
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        let result = Raster::<u8>::from_vec(vec![1, 2, 3], 2, 2);
        assert!(matches!(result, Err(Error::InvalidDimensions { .. })));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<u8> = Raster::new(10, 10);
        raster.set(5, 5, 4).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 4);
        assert!(raster.set(10, 0, 1).is_err());
        assert!(matches!(
            raster.get(0, 10),
            Err(Error::IndexOutOfBounds { rows: 10, cols: 10, .. })
        ));
    }

    #[test]
    fn test_valid_values_skip_nodata() {
        let mut raster = Raster::from_vec(vec![1.0, -9999.0, f64::NAN, 4.0], 2, 2).unwrap();
        raster.set_nodata(Some(-9999.0));
        let valid: Vec<f64> = raster.valid_values().collect();
        assert_eq!(valid, vec![1.0, 4.0]);
    }

    #[test]
    fn test_raster_statistics() {
        let data: Vec<f64> = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0, -1.0];
        let mut raster = Raster::from_vec(data, 3, 3).unwrap();
        raster.set_nodata(Some(-1.0));

        let stats = raster.statistics();
        assert_eq!(stats.valid_count, 8);
        assert_eq!(stats.nodata_count, 1);
        assert_eq!(stats.min, Some(2.0));
        assert_eq!(stats.max, Some(9.0));
        assert_relative_eq!(stats.mean.unwrap(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(stats.std_dev.unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_statistics_all_nodata() {
        let raster = Raster::filled(2, 2, f32::NAN);
        let stats = raster.statistics();
        assert_eq!(stats.valid_count, 0);
        assert_eq!(stats.nodata_count, 4);
        assert!(stats.mean.is_none());
    }
}
