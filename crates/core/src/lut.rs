//! Land-use lookup tables
//!
//! A lookup table (LUT) maps the integer class codes stored in a land-cover
//! tile to human-readable class names. Accepted line layouts:
//!
//! ```text
//! # comment
//! 1 Urban fabric
//! 2,Arable land
//! 3: Forest
//! 4,0,128,0,255,Grassland      (QGIS colour map: code,R,G,B,A,label)
//! 5 64 64 255 Water bodies     (code R G B label)
//! ```
//!
//! Code `0` is reserved for NoData/cloud and may not appear in the table.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// One land-use class of a lookup table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LandUseClass {
    pub code: u32,
    pub name: String,
    /// Display colour, when the table carries one
    pub color: Option<[u8; 3]>,
}

/// Class code → land-use class mapping, ordered by code
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LookupTable {
    classes: BTreeMap<u32, LandUseClass>,
}

impl LookupTable {
    /// Parse a lookup table from text
    pub fn parse(text: &str) -> Result<Self> {
        let mut classes = BTreeMap::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim().trim_start_matches('\u{feff}');

            if line.is_empty() || line.starts_with('#') || is_header(line) {
                continue;
            }

            let class = parse_line(line, line_no)?;
            if classes.contains_key(&class.code) {
                return Err(Error::LookupTable {
                    line: line_no,
                    reason: format!("duplicate class code {}", class.code),
                });
            }
            classes.insert(class.code, class);
        }

        Ok(Self { classes })
    }

    /// Build a table from already-parsed classes
    pub fn from_classes(classes: impl IntoIterator<Item = LandUseClass>) -> Self {
        Self {
            classes: classes.into_iter().map(|c| (c.code, c)).collect(),
        }
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get(&self, code: u32) -> Option<&LandUseClass> {
        self.classes.get(&code)
    }

    /// Class name for a code
    pub fn name(&self, code: u32) -> Option<&str> {
        self.classes.get(&code).map(|c| c.name.as_str())
    }

    /// Largest class code in the table (0 when empty)
    pub fn max_code(&self) -> u32 {
        self.classes.keys().next_back().copied().unwrap_or(0)
    }

    /// Classes in ascending code order
    pub fn iter(&self) -> impl Iterator<Item = &LandUseClass> {
        self.classes.values()
    }
}

/// Read a lookup table from a text file
pub fn read_lookup_table<P: AsRef<Path>>(path: P) -> Result<LookupTable> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let lut = LookupTable::parse(&text)?;
    debug!("Loaded {} land-use classes from {}", lut.len(), path.as_ref().display());
    Ok(lut)
}

/// QGIS colour map exports start with an `INTERPOLATION:` line
fn is_header(line: &str) -> bool {
    line.to_ascii_uppercase().starts_with("INTERPOLATION")
}

fn parse_line(line: &str, line_no: usize) -> Result<LandUseClass> {
    let split_at = line
        .find(|c: char| c == ',' || c == ':' || c == '=' || c.is_whitespace())
        .unwrap_or(line.len());
    let (code_str, rest) = line.split_at(split_at);

    let code: u32 = code_str.trim().parse().map_err(|_| Error::LookupTable {
        line: line_no,
        reason: format!("invalid class code {:?}", code_str.trim()),
    })?;

    if code == 0 {
        return Err(Error::LookupTable {
            line: line_no,
            reason: "class code 0 is reserved for NoData".to_string(),
        });
    }

    let rest = rest.trim_start_matches(|c: char| c == ',' || c == ':' || c == '=' || c.is_whitespace());
    let (fields, separator): (Vec<&str>, &str) = if rest.contains(',') {
        (rest.split(',').map(str::trim).collect(), ", ")
    } else {
        (rest.split_whitespace().collect(), " ")
    };

    let mut color = None;
    let mut name_start = 0;
    let channels: Vec<u8> = fields
        .iter()
        .take(4)
        .map_while(|f| f.parse::<u8>().ok())
        .collect();
    if channels.len() >= 3 {
        color = Some([channels[0], channels[1], channels[2]]);
        // Alpha is accepted but not kept
        name_start = channels.len();
    }

    let name = fields[name_start..]
        .iter()
        .filter(|f| !f.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(separator);
    let name = if name.is_empty() {
        format!("class {}", code)
    } else {
        name
    };

    Ok(LandUseClass { code, name, color })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let lut = LookupTable::parse("# Land use\n1 Urban fabric\n2\tArable land\n\n3: Forest\n").unwrap();
        assert_eq!(lut.len(), 3);
        assert_eq!(lut.name(1), Some("Urban fabric"));
        assert_eq!(lut.name(2), Some("Arable land"));
        assert_eq!(lut.name(3), Some("Forest"));
        assert_eq!(lut.max_code(), 3);
    }

    #[test]
    fn test_parse_qgis_colormap() {
        let text = "INTERPOLATION:EXACT\n4,0,128,0,255,Grassland\n5,64,64,255,255,Water bodies\n";
        let lut = LookupTable::parse(text).unwrap();
        let grass = lut.get(4).unwrap();
        assert_eq!(grass.name, "Grassland");
        assert_eq!(grass.color, Some([0, 128, 0]));
        assert_eq!(lut.name(5), Some("Water bodies"));
    }

    #[test]
    fn test_comma_inside_name_kept() {
        let lut = LookupTable::parse("3,Forest, mixed\n8,34,139,34,Shrub, sparse").unwrap();
        assert_eq!(lut.name(3), Some("Forest, mixed"));
        assert_eq!(lut.name(8), Some("Shrub, sparse"));
        assert_eq!(lut.get(8).unwrap().color, Some([34, 139, 34]));
    }

    #[test]
    fn test_parse_rgb_whitespace() {
        let lut = LookupTable::parse("7 10 20 30 Wetlands").unwrap();
        let class = lut.get(7).unwrap();
        assert_eq!(class.color, Some([10, 20, 30]));
        assert_eq!(class.name, "Wetlands");
    }

    #[test]
    fn test_numeric_name_is_not_colour() {
        let lut = LookupTable::parse("6 Zone 2").unwrap();
        assert_eq!(lut.name(6), Some("Zone 2"));
        assert_eq!(lut.get(6).unwrap().color, None);
    }

    #[test]
    fn test_missing_name_defaults() {
        let lut = LookupTable::parse("9").unwrap();
        assert_eq!(lut.name(9), Some("class 9"));
    }

    #[test]
    fn test_rejects_bad_code() {
        let err = LookupTable::parse("1 Urban\nx Forest").unwrap_err();
        assert!(matches!(err, Error::LookupTable { line: 2, .. }));
    }

    #[test]
    fn test_rejects_duplicate_and_zero() {
        assert!(matches!(
            LookupTable::parse("1 A\n1 B"),
            Err(Error::LookupTable { line: 2, .. })
        ));
        assert!(matches!(
            LookupTable::parse("0 Clouds"),
            Err(Error::LookupTable { line: 1, .. })
        ));
    }

    #[test]
    fn test_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lut.txt");
        std::fs::write(&path, "1 Urban\n2 Forest\n").unwrap();

        let lut = read_lookup_table(&path).unwrap();
        let codes: Vec<u32> = lut.iter().map(|c| c.code).collect();
        assert_eq!(codes, vec![1, 2]);
    }
}
