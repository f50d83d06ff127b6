//! Band-level metadata items

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Well-known GDAL statistics item names
pub mod keys {
    pub const STATISTICS_MEAN: &str = "STATISTICS_MEAN";
    pub const STATISTICS_MINIMUM: &str = "STATISTICS_MINIMUM";
    pub const STATISTICS_MAXIMUM: &str = "STATISTICS_MAXIMUM";
    pub const STATISTICS_STDDEV: &str = "STATISTICS_STDDEV";
}

/// Metadata items attached to one band of a tile.
///
/// Mirrors the GDAL band metadata domain: string keys, string values,
/// iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BandTags {
    items: BTreeMap<String, String>,
}

impl BandTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.insert(key.into(), value.into());
    }

    /// Raw string value of an item
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    /// Numeric value of an item.
    ///
    /// `Ok(None)` when the item is absent, `InvalidMetadata` when it does not parse.
    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.items.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| Error::InvalidMetadata {
                    key: key.to_string(),
                    value: raw.clone(),
                }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BandTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = BandTags::new();
        for (k, v) in iter {
            tags.insert(k, v);
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_f64() {
        let tags: BandTags = [(keys::STATISTICS_MEAN, " 41.237 "), ("NOTE", "abc")]
            .into_iter()
            .collect();

        assert_eq!(tags.get_f64(keys::STATISTICS_MEAN).unwrap(), Some(41.237));
        assert_eq!(tags.get_f64(keys::STATISTICS_MAXIMUM).unwrap(), None);
        assert!(matches!(
            tags.get_f64("NOTE"),
            Err(Error::InvalidMetadata { .. })
        ));
    }

    #[test]
    fn test_iter_sorted() {
        let mut tags = BandTags::new();
        tags.insert("B", "2");
        tags.insert("A", "1");
        let keys: Vec<&str> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(tags.len(), 2);
    }
}
