//! Search and download against the CMR (Common Metadata Repository) catalog.

use std::fmt::Display;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use crate::earthdata::Credentials;
use crate::error::CmrError;

pub const CMR_SEARCH_URL: &str = "https://cmr.earthdata.nasa.gov/search";

/// A geographic search area, rendered in CMR's `W,S,E,N` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

impl std::str::FromStr for BoundingBox {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("bounding box components must be numbers: {e}"))?;
        if let [west, south, east, north] = parts[..] {
            Ok(Self { west, south, east, north })
        } else {
            Err(format!(
                "expected 4 comma-separated values (W,S,E,N), got {}",
                parts.len()
            ))
        }
    }
}

/// One dataset collection from a `collections.json` search.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionEntry {
    pub id: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl CollectionEntry {
    /// One-line description for interactive listings.
    pub fn describe(&self) -> String {
        let name = self.short_name.as_deref().unwrap_or(&self.id);
        match self.summary.as_deref() {
            // Truncate per character, not per byte; summaries often carry
            // non-ASCII (units, accented site names).
            Some(s) if s.chars().count() > 80 => {
                let truncated: String = s.chars().take(80).collect();
                format!("{name} - {truncated}...")
            }
            Some(s) => format!("{name} - {s}"),
            None => name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GranuleLink {
    #[serde(default)]
    pub rel: String,
    pub href: String,
    #[serde(default)]
    pub inherited: Option<bool>,
}

/// One granule from a `granules.json` search.
#[derive(Debug, Clone, Deserialize)]
pub struct GranuleEntry {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub links: Vec<GranuleLink>,
}

impl GranuleEntry {
    /// The direct data-download links for this granule. CMR marks them with a
    /// rel ending in `/data#`; inherited links point at collection-level
    /// resources, not this file.
    pub fn data_links(&self) -> Vec<&str> {
        self.links
            .iter()
            .filter(|l| l.rel.ends_with("/data#") && !l.inherited.unwrap_or(false))
            .map(|l| l.href.as_str())
            .collect()
    }
}

// Without the explicit bound, serde infers T: Default from the defaulted field.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
struct Feed<T> {
    #[serde(default)]
    entry: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct FeedResponse<T> {
    feed: Feed<T>,
}

/// Blocking client for CMR searches and authenticated granule downloads.
pub struct CmrClient {
    client: reqwest::blocking::Client,
    search_url: String,
}

impl CmrClient {
    pub fn new() -> Result<Self, CmrError> {
        Self::with_search_url(CMR_SEARCH_URL)
    }

    pub fn with_search_url(search_url: &str) -> Result<Self, CmrError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| CmrError::Request {
                url: search_url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            search_url: search_url.trim_end_matches('/').to_string(),
        })
    }

    /// Search dataset collections by keyword within a bounding box.
    pub fn search_collections(
        &self,
        keyword: &str,
        bbox: BoundingBox,
        page_size: usize,
    ) -> Result<Vec<CollectionEntry>, CmrError> {
        let url = format!("{}/collections.json", self.search_url);
        self.search_feed(
            &url,
            &[
                ("keyword", keyword.to_string()),
                ("bounding_box", bbox.to_string()),
                ("page_size", page_size.to_string()),
            ],
        )
    }

    /// Search granules of one collection within a bounding box.
    pub fn search_granules(
        &self,
        collection_concept_id: &str,
        bbox: BoundingBox,
        page_size: usize,
    ) -> Result<Vec<GranuleEntry>, CmrError> {
        let url = format!("{}/granules.json", self.search_url);
        self.search_feed(
            &url,
            &[
                ("collection_concept_id", collection_concept_id.to_string()),
                ("bounding_box", bbox.to_string()),
                ("page_size", page_size.to_string()),
            ],
        )
    }

    fn search_feed<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, CmrError> {
        log::debug!("Searching {url}");
        let resp = self
            .client
            .get(url)
            .query(params)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| CmrError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let body: FeedResponse<T> = resp.json().map_err(|e| CmrError::InvalidJson {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(body.feed.entry)
    }

    /// Stream an authenticated download of `url` to `dest`.
    ///
    /// Uses HTTP basic auth with the Earthdata credentials and fails on any
    /// non-2xx status. Shows a progress bar when the server reports a length.
    pub fn download(
        &self,
        url: &str,
        dest: &Path,
        creds: &Credentials,
    ) -> Result<(), CmrError> {
        let request_err = |reason: String| CmrError::Download {
            url: url.to_string(),
            reason,
        };
        let write_err = |e: std::io::Error| CmrError::Write {
            path: dest.to_path_buf(),
            reason: e.to_string(),
        };

        let mut resp = self
            .client
            .get(url)
            .basic_auth(&creds.username, Some(&creds.password))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| request_err(e.to_string()))?;

        let bar = match resp.content_length() {
            Some(len) => ProgressBar::new(len).with_style(
                ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} ({eta})")
                    .expect("progress template is valid"),
            ),
            None => ProgressBar::new_spinner(),
        };

        let mut file = std::fs::File::create(dest).map_err(write_err)?;
        let mut buf = [0u8; 8192];
        loop {
            let n = resp
                .read(&mut buf)
                .map_err(|e| request_err(e.to_string()))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).map_err(write_err)?;
            bar.inc(n as u64);
        }
        bar.finish_and_clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bounding_box_display() {
        let bbox = BoundingBox {
            west: -117.25,
            south: 32.3,
            east: -116.8,
            north: 32.7,
        };
        assert_eq!(bbox.to_string(), "-117.25,32.3,-116.8,32.7");
    }

    #[test]
    fn test_bounding_box_from_str() {
        let bbox: BoundingBox = "-117.25, 32.3, -116.8, 32.7".parse().unwrap();
        assert_eq!(bbox.west, -117.25);
        assert_eq!(bbox.north, 32.7);
        assert!("1,2,3".parse::<BoundingBox>().is_err());
        assert!("a,b,c,d".parse::<BoundingBox>().is_err());
    }

    #[test]
    fn test_parse_collection_feed() {
        let body = json!({
            "feed": {
                "entry": [
                    {"id": "C123-PROV", "short_name": "TEMPO_NO2_L3", "summary": "Hourly NO2"},
                    {"id": "C456-PROV"}
                ]
            }
        });
        let resp: FeedResponse<CollectionEntry> = serde_json::from_value(body).unwrap();
        assert_eq!(resp.feed.entry.len(), 2);
        assert_eq!(resp.feed.entry[0].describe(), "TEMPO_NO2_L3 - Hourly NO2");
        assert_eq!(resp.feed.entry[1].describe(), "C456-PROV");
    }

    #[test]
    fn test_describe_truncates_multibyte_summary_per_char() {
        // 'µ' is two bytes, so byte 80 falls inside a character here.
        let entry = CollectionEntry {
            id: "C1-PROV".to_string(),
            short_name: Some("TEMPO_NO2_L3".to_string()),
            summary: Some(format!("a{}", "\u{b5}".repeat(100))),
        };
        let line = entry.describe();
        assert!(line.ends_with("..."));
        let summary_part = line
            .strip_prefix("TEMPO_NO2_L3 - ")
            .unwrap()
            .strip_suffix("...")
            .unwrap();
        assert_eq!(summary_part.chars().count(), 80);
    }

    #[test]
    fn test_empty_feed_entry() {
        let resp: FeedResponse<GranuleEntry> =
            serde_json::from_value(json!({"feed": {}})).unwrap();
        assert!(resp.feed.entry.is_empty());
    }

    #[test]
    fn test_granule_data_links() {
        let body = json!({
            "id": "G1-PROV",
            "title": "granule one",
            "links": [
                {"rel": "http://esipfed.org/ns/fedsearch/1.1/data#", "href": "https://daac/g1.nc"},
                {"rel": "http://esipfed.org/ns/fedsearch/1.1/data#", "href": "https://daac/coll.nc", "inherited": true},
                {"rel": "http://esipfed.org/ns/fedsearch/1.1/browse#", "href": "https://daac/g1.png"}
            ]
        });
        let granule: GranuleEntry = serde_json::from_value(body).unwrap();
        assert_eq!(granule.data_links(), vec!["https://daac/g1.nc"]);
    }
}
