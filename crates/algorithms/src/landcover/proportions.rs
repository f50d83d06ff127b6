//! Land-cover class proportions
//!
//! Counts the pixels of each class code in a categorical band and expresses
//! them as a share of the valid (non-NoData) pixels of the tile.
//!
//! Class code `0` is NoData/cloud and never appears in the output; it only
//! shrinks the denominator. Cells matching the band's declared nodata value
//! are treated the same way.

use std::path::Path;

use crate::maybe_rayon::*;
use serde::Serialize;
use tilestats_core::io::{read_geotiff, read_lookup_table};
use tilestats_core::raster::{Raster, RasterElement};
use tilestats_core::{Algorithm, Error, LookupTable, Result};
use tracing::debug;

/// Largest class code accepted in a land-cover band
pub const MAX_CLASS_CODE: u32 = u16::MAX as u32;

/// Parameters for class proportion counting
#[derive(Debug, Clone)]
pub struct ClassProportionsParams {
    /// Decimal places to round proportions to (round half to even); `None` keeps full precision
    pub decimals: Option<u32>,
}

impl Default for ClassProportionsParams {
    fn default() -> Self {
        Self { decimals: Some(2) }
    }
}

/// Pixel count and share of one class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassShare {
    pub code: u32,
    /// Class name from the lookup table, `None` for codes the table lacks
    pub name: Option<String>,
    pub count: usize,
    pub proportion: f64,
}

/// Per-class histogram of a tile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProportionHistogram {
    /// Height × width
    pub total_pixels: usize,
    /// Pixels with code 0 or the declared nodata value
    pub nodata_pixels: usize,
    pub valid_pixels: usize,
    /// Codes `1..=N` in ascending order
    pub classes: Vec<ClassShare>,
}

impl ProportionHistogram {
    /// Share of one class code
    pub fn proportion(&self, code: u32) -> Option<f64> {
        self.classes
            .iter()
            .find(|c| c.code == code)
            .map(|c| c.proportion)
    }

    /// Shares of codes `1..=N`, in order
    pub fn proportions(&self) -> Vec<f64> {
        self.classes.iter().map(|c| c.proportion).collect()
    }
}

/// Class proportion algorithm
#[derive(Debug, Clone, Default)]
pub struct ClassProportions;

impl Algorithm for ClassProportions {
    type Input = (Raster<f64>, LookupTable);
    type Output = ProportionHistogram;
    type Params = ClassProportionsParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ClassProportions"
    }

    fn description(&self) -> &'static str {
        "Per-class pixel proportions of a land-cover band, excluding NoData"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (raster, lut) = input;
        class_proportions(&raster, &lut, params)
    }
}

/// Compute per-class pixel proportions of a land-cover band.
///
/// The histogram covers codes `1..=N` where `N` is the largest of the table
/// size, the table's highest code and the highest code found in the band, so
/// classes absent from the tile still get a 0 entry.
///
/// # Errors
/// - `InvalidParameter` when a valid cell is negative, fractional or above [`MAX_CLASS_CODE`]
/// - `NoValidPixels` when every cell is NoData
pub fn class_proportions<T: RasterElement>(
    raster: &Raster<T>,
    lut: &LookupTable,
    params: ClassProportionsParams,
) -> Result<ProportionHistogram> {
    let (rows, _cols) = raster.shape();
    let view = raster.view();

    let row_histograms: Vec<Vec<usize>> = (0..rows)
        .into_par_iter()
        .map(|row| count_row(raster, view.row(row).iter().copied()))
        .collect::<Result<Vec<_>>>()?;

    let min_len = (lut.len() as u32).max(lut.max_code()) as usize + 1;
    let mut counts = vec![0usize; min_len];
    for hist in row_histograms {
        if hist.len() > counts.len() {
            counts.resize(hist.len(), 0);
        }
        for (total, n) in counts.iter_mut().zip(hist) {
            *total += n;
        }
    }

    let total_pixels = raster.len();
    let nodata_pixels = counts[0];
    let valid_pixels = total_pixels - nodata_pixels;
    debug!("Pixel counts: {:?}", counts);

    if valid_pixels == 0 {
        return Err(Error::NoValidPixels { total: total_pixels });
    }

    let classes = counts
        .iter()
        .enumerate()
        .skip(1)
        .map(|(code, &count)| {
            let code = code as u32;
            ClassShare {
                code,
                name: lut.name(code).map(str::to_string),
                count,
                proportion: round_to(count as f64 / valid_pixels as f64, params.decimals),
            }
        })
        .collect();

    Ok(ProportionHistogram {
        total_pixels,
        nodata_pixels,
        valid_pixels,
        classes,
    })
}

/// Read a band and a lookup table from disk and compute class proportions
pub fn class_proportions_from_file<P, Q>(
    tile: P,
    lut: Q,
    band: usize,
    params: ClassProportionsParams,
) -> Result<ProportionHistogram>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let raster: Raster<f64> = read_geotiff(tile, Some(band))?;
    let lut = read_lookup_table(lut)?;
    class_proportions(&raster, &lut, params)
}

fn count_row<T, I>(raster: &Raster<T>, values: I) -> Result<Vec<usize>>
where
    T: RasterElement,
    I: Iterator<Item = T>,
{
    let mut hist = vec![0usize; 1];

    for v in values {
        if raster.is_nodata(v) {
            hist[0] += 1;
            continue;
        }

        let code = v
            .class_code()
            .filter(|&c| c <= MAX_CLASS_CODE)
            .ok_or_else(|| Error::InvalidParameter {
                name: "class code",
                value: format!("{:?}", v),
                reason: format!("expected an integer in 0..={}", MAX_CLASS_CODE),
            })? as usize;

        if code >= hist.len() {
            hist.resize(code + 1, 0);
        }
        hist[code] += 1;
    }

    Ok(hist)
}

/// Round to `decimals` places with ties going to the even neighbour
pub(crate) fn round_to(value: f64, decimals: Option<u32>) -> f64 {
    match decimals {
        Some(d) => {
            let factor = 10f64.powi(d as i32);
            (value * factor).round_ties_even() / factor
        }
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn lut3() -> LookupTable {
        LookupTable::parse("1 Urban\n2 Forest\n3 Water\n").unwrap()
    }

    #[test]
    fn test_basic_proportions() {
        // 2 nodata, 4 urban, 2 forest, 0 water over 8 cells
        let raster = Raster::from_vec(vec![0u8, 1, 1, 2, 0, 1, 1, 2], 2, 4).unwrap();
        let result = class_proportions(&raster, &lut3(), ClassProportionsParams::default()).unwrap();

        assert_eq!(result.total_pixels, 8);
        assert_eq!(result.nodata_pixels, 2);
        assert_eq!(result.valid_pixels, 6);
        assert_eq!(result.classes.len(), 3);
        assert_eq!(result.proportions(), vec![0.67, 0.33, 0.0]);
        assert_eq!(result.classes[0].name.as_deref(), Some("Urban"));
        assert_eq!(result.classes[2].count, 0);
    }

    #[test]
    fn test_codes_beyond_table_extend_histogram() {
        let raster = Raster::from_vec(vec![1.0_f64, 5.0, 5.0, 2.0], 2, 2).unwrap();
        let result = class_proportions(&raster, &lut3(), ClassProportionsParams::default()).unwrap();

        assert_eq!(result.classes.len(), 5);
        assert_eq!(result.proportion(5), Some(0.5));
        assert_eq!(result.classes[4].name, None);
        assert_eq!(result.proportion(4), Some(0.0));
    }

    #[test]
    fn test_declared_nodata_excluded() {
        let mut raster = Raster::from_vec(vec![1u8, 255, 255, 2], 2, 2).unwrap();
        raster.set_nodata(Some(255));
        let result = class_proportions(&raster, &lut3(), ClassProportionsParams::default()).unwrap();

        assert_eq!(result.nodata_pixels, 2);
        assert_eq!(result.proportion(1), Some(0.5));
        assert_eq!(result.classes.len(), 3);
    }

    #[test]
    fn test_unrounded_sum_to_one() {
        let data: Vec<u16> = (0..99).map(|i| (i % 7) as u16).collect();
        let raster = Raster::from_vec(data, 9, 11).unwrap();
        let lut = LookupTable::parse("1 a\n2 b\n3 c\n4 d\n5 e\n6 f").unwrap();
        let result = class_proportions(&raster, &lut, ClassProportionsParams { decimals: None }).unwrap();

        let sum: f64 = result.proportions().iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_all_nodata_is_error() {
        let raster: Raster<u8> = Raster::new(3, 3);
        let err = class_proportions(&raster, &lut3(), ClassProportionsParams::default()).unwrap_err();
        assert!(matches!(err, Error::NoValidPixels { total: 9 }));
    }

    #[test]
    fn test_fractional_code_rejected() {
        let raster = Raster::from_vec(vec![1.0_f32, 2.5], 1, 2).unwrap();
        let err = class_proportions(&raster, &lut3(), ClassProportionsParams::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "class code", .. }));
    }

    #[test]
    fn test_negative_code_rejected() {
        let raster = Raster::from_vec(vec![1.0_f64, -1.0], 1, 2).unwrap();
        let err = class_proportions(&raster, &lut3(), ClassProportionsParams::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "class code", .. }));
    }

    #[test]
    fn test_code_above_limit_rejected() {
        let raster = Raster::from_vec(vec![2.0_f64, 70_000.0], 1, 2).unwrap();
        let err = class_proportions(&raster, &lut3(), ClassProportionsParams::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "class code", .. }));

        let raster = Raster::from_vec(vec![2.0_f64, 65_535.0], 1, 2).unwrap();
        let result = class_proportions(&raster, &lut3(), ClassProportionsParams::default()).unwrap();
        assert_eq!(result.classes.len(), 65_535);
        assert_eq!(result.proportion(65_535), Some(0.5));
    }

    #[test]
    fn test_float32_fill_counts_as_nodata() {
        let mut raster = Raster::from_vec(vec![-3.4e38_f32, 1.0, 2.0, 2.0], 2, 2).unwrap();
        raster.set_nodata(Some(-3.4e38));
        let result = class_proportions(&raster, &lut3(), ClassProportionsParams::default()).unwrap();
        assert_eq!(result.nodata_pixels, 1);
        assert_eq!(result.proportions(), vec![0.33, 0.67, 0.0]);
    }

    #[test]
    fn test_nan_counts_as_nodata() {
        let raster = Raster::from_vec(vec![f64::NAN, 3.0], 1, 2).unwrap();
        let result = class_proportions(&raster, &lut3(), ClassProportionsParams::default()).unwrap();
        assert_eq!(result.nodata_pixels, 1);
        assert_eq!(result.proportion(3), Some(1.0));
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_to(0.125, Some(2)), 0.12);
        assert_eq!(round_to(0.375, Some(2)), 0.38);
        assert_eq!(round_to(0.3333, None), 0.3333);
    }

    #[test]
    fn test_algorithm_trait() {
        let raster = Raster::from_vec(vec![1.0, 2.0, 2.0, 2.0], 2, 2).unwrap();
        let result = ClassProportions.execute_default((raster, lut3())).unwrap();
        assert_eq!(result.proportion(2), Some(0.75));
    }
}
