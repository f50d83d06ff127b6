//! GDAL_METADATA (TIFF tag 42112) encoding
//!
//! GDAL persists band metadata, including the `STATISTICS_*` items written by
//! `gdalinfo -stats`, as a small XML document:
//!
//! ```text
//! <GDALMetadata>
//!   <Item name="STATISTICS_MEAN" sample="0">41.2</Item>
//! </GDALMetadata>
//! ```
//!
//! `sample` is the 0-based band index. Items without it are dataset-level.
//! Items carrying a `role` (offset, scale, description) or a non-default
//! `domain` are not band metadata items and are skipped.

use crate::raster::BandTags;
use regex::Regex;
use std::sync::OnceLock;

/// TIFF tag holding the GDAL metadata XML
pub const GDAL_METADATA_TAG: u16 = 42112;
/// TIFF tag holding the GDAL nodata value as ASCII
pub const GDAL_NODATA_TAG: u16 = 42113;

fn item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<Item\s+([^>]*)>(.*?)</Item>").expect("valid item regex"))
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(\w+)\s*=\s*"([^"]*)""#).expect("valid attribute regex"))
}

/// Extract the metadata items of one band (1-based) from a GDAL_METADATA document
pub fn band_tags_from_xml(xml: &str, band: usize) -> BandTags {
    let mut tags = BandTags::new();

    for item in item_regex().captures_iter(xml) {
        let mut name = None;
        let mut sample = None;
        let mut band_item = true;

        for attr in attr_regex().captures_iter(&item[1]) {
            match &attr[1] {
                "name" => name = Some(unescape(&attr[2])),
                "sample" => sample = attr[2].trim().parse::<usize>().ok(),
                "role" => band_item = false,
                "domain" if !attr[2].is_empty() => band_item = false,
                _ => {}
            }
        }

        if let (Some(name), Some(sample), true) = (name, sample, band_item) {
            if sample + 1 == band {
                tags.insert(name, unescape(item[2].trim()));
            }
        }
    }

    tags
}

/// Build a GDAL_METADATA document for a set of bands, `None` if there is nothing to write
pub fn gdal_metadata_xml(bands: &[&BandTags]) -> Option<String> {
    if bands.iter().all(|t| t.is_empty()) {
        return None;
    }

    let mut xml = String::from("<GDALMetadata>\n");
    for (sample, tags) in bands.iter().enumerate() {
        for (key, value) in tags.iter() {
            xml.push_str(&format!(
                "  <Item name=\"{}\" sample=\"{}\">{}</Item>\n",
                escape(key),
                sample,
                escape(value)
            ));
        }
    }
    xml.push_str("</GDALMetadata>\n");
    Some(xml)
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<GDALMetadata>
  <Item name="AREA_OR_POINT">Area</Item>
  <Item name="STATISTICS_MAXIMUM" sample="0">812.5</Item>
  <Item name="STATISTICS_MEAN" sample="0">
     301.25
  </Item>
  <Item name="STATISTICS_MEAN" sample="1">17</Item>
  <Item name="OFFSET" sample="0" role="offset">0</Item>
  <Item name="NOTE" sample="0">a &amp; b</Item>
</GDALMetadata>"#;

    #[test]
    fn test_band_tags_first_band() {
        let tags = band_tags_from_xml(SAMPLE, 1);
        assert_eq!(tags.get("STATISTICS_MEAN"), Some("301.25"));
        assert_eq!(tags.get("STATISTICS_MAXIMUM"), Some("812.5"));
        assert_eq!(tags.get("NOTE"), Some("a & b"));
        assert_eq!(tags.get("AREA_OR_POINT"), None);
        assert_eq!(tags.get("OFFSET"), None);
    }

    #[test]
    fn test_band_tags_second_band() {
        let tags = band_tags_from_xml(SAMPLE, 2);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("STATISTICS_MEAN"), Some("17"));
    }

    #[test]
    fn test_metadata_xml_readable_back() {
        let mut first = BandTags::new();
        first.insert("STATISTICS_MEAN", "2.5");
        first.insert("LABEL", "<forest>");
        let second = BandTags::new();

        let xml = gdal_metadata_xml(&[&first, &second]).unwrap();
        assert_eq!(band_tags_from_xml(&xml, 1), first);
        assert!(band_tags_from_xml(&xml, 2).is_empty());
    }

    #[test]
    fn test_empty_tags_write_nothing() {
        assert!(gdal_metadata_xml(&[&BandTags::new()]).is_none());
    }
}
