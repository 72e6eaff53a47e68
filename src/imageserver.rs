//! Client for NASA Earthdata ArcGIS image services.
//!
//! The TEMPO L3 hourly products are published as multidimensional image
//! services; this module wraps the two REST operations the sampling tools
//! need: listing the available acquisition times and sampling the raster at
//! a point for one or more of those times.

use std::fmt::Display;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ImageServiceError;

/// Selects which acquisition instant(s) a sample request covers.
///
/// Times are epoch milliseconds, as the image services report them in the
/// `StdTime` dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSelector {
    /// One acquisition instant.
    Single(i64),
    /// A closed range of instants; every acquisition between `start` and
    /// `end` inclusive is sampled.
    Range { start: i64, end: i64 },
}

impl TimeSelector {
    /// Build the range covering a slice of timestamps, regardless of their order.
    ///
    /// Returns `None` for an empty slice.
    pub fn covering(times: &[i64]) -> Option<Self> {
        let start = *times.iter().min()?;
        let end = *times.iter().max()?;
        Some(Self::Range { start, end })
    }
}

impl Display for TimeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(t) => write!(f, "{t}"),
            Self::Range { start, end } => write!(f, "{start},{end}"),
        }
    }
}

/// A sampling point in the service's spatial reference (lon/lat degrees
/// for the TEMPO services).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointGeometry {
    pub longitude: f64,
    pub latitude: f64,
}

impl Display for PointGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.longitude, self.latitude)
    }
}

/// The mosaic rule restricting a request to one named variable.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MosaicRule<'a> {
    multidimensional_definition: [MultidimensionalDefinition<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MultidimensionalDefinition<'a> {
    variable_name: &'a str,
}

fn mosaic_rule_json(variable: &str) -> String {
    let rule = MosaicRule {
        multidimensional_definition: [MultidimensionalDefinition {
            variable_name: variable,
        }],
    };
    serde_json::to_string(&rule).expect("mosaic rule serialization cannot fail")
}

#[derive(Debug, Deserialize)]
struct MultidimensionalInfoResponse {
    #[serde(rename = "multidimensionalInfo")]
    multidimensional_info: MultidimensionalInfo,
}

#[derive(Debug, Deserialize)]
struct MultidimensionalInfo {
    variables: Vec<VariableInfo>,
}

#[derive(Debug, Deserialize)]
struct VariableInfo {
    dimensions: Vec<DimensionInfo>,
}

#[derive(Debug, Deserialize)]
struct DimensionInfo {
    values: Vec<i64>,
}

/// One element of the `samples` array returned by `getSamples`.
///
/// The attribute values are kept as JSON values: the services return a mix of
/// numbers and strings (including sentinels like `"NoData"`), and the
/// filtering policy lives in [`crate::samples`], not here.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSample {
    #[serde(default)]
    pub attributes: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GetSamplesResponse {
    // An absent samples key means "no data", not a protocol error.
    #[serde(default)]
    samples: Vec<RawSample>,
}

/// Blocking client bound to one image service.
pub struct ImageServiceClient {
    client: reqwest::blocking::Client,
    service_url: String,
}

impl ImageServiceClient {
    pub fn new(service_url: &str) -> Result<Self, ImageServiceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ImageServiceError::request(service_url, e))?;
        Ok(Self {
            client,
            service_url: service_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the available acquisition timestamps for this service, most
    /// recent first.
    ///
    /// The times come from the first dimension of the first variable in the
    /// service's multidimensional info; the TEMPO services declare exactly
    /// one variable with `StdTime` as its one dimension.
    pub fn fetch_available_times(&self) -> Result<Vec<i64>, ImageServiceError> {
        let url = format!("{}/multidimensionalInfo", self.service_url);
        log::debug!("Requesting multidimensional info from {url}");
        let resp = self
            .client
            .get(&url)
            .query(&[("f", "json")])
            .send()
            .map_err(|e| ImageServiceError::request(&url, e))?
            .error_for_status()
            .map_err(|e| ImageServiceError::request(&url, e))?;
        let body: serde_json::Value = resp
            .json()
            .map_err(|e| ImageServiceError::invalid_json(&url, e))?;
        extract_times(&url, body)
    }

    /// Request point samples of `variable` at `point` for the selected time(s).
    ///
    /// Returns the raw `samples` records; an empty vector means the service
    /// had no data there, which callers report rather than treat as failure.
    pub fn fetch_samples(
        &self,
        variable: &str,
        point: PointGeometry,
        time: TimeSelector,
    ) -> Result<Vec<RawSample>, ImageServiceError> {
        let url = format!("{}/getSamples/", self.service_url);
        log::debug!("Requesting samples of {variable} at ({point}) for time {time} from {url}");
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("geometry", point.to_string().as_str()),
                ("geometryType", "esriGeometryPoint"),
                ("returnFirstValueOnly", "false"),
                ("mosaicRule", mosaic_rule_json(variable).as_str()),
                ("time", time.to_string().as_str()),
                ("f", "pjson"),
            ])
            .send()
            .map_err(|e| ImageServiceError::request(&url, e))?
            .error_for_status()
            .map_err(|e| ImageServiceError::request(&url, e))?;
        let body: GetSamplesResponse = resp
            .json()
            .map_err(|e| ImageServiceError::invalid_json(&url, e))?;
        Ok(body.samples)
    }
}

/// Pull the timestamp list out of a `multidimensionalInfo` response body and
/// sort it newest first. Separated from the HTTP call so the structural
/// checks can be tested on canned responses.
fn extract_times(url: &str, body: serde_json::Value) -> Result<Vec<i64>, ImageServiceError> {
    let info: MultidimensionalInfoResponse =
        serde_json::from_value(body).map_err(|e| ImageServiceError::malformed(url, e))?;
    let variable = info
        .multidimensional_info
        .variables
        .into_iter()
        .next()
        .ok_or_else(|| ImageServiceError::malformed(url, "no variables declared"))?;
    let dimension = variable
        .dimensions
        .into_iter()
        .next()
        .ok_or_else(|| ImageServiceError::malformed(url, "variable has no dimensions"))?;
    let mut times = dimension.values;
    times.sort_unstable_by(|a, b| b.cmp(a));
    Ok(times)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_times_sorts_descending() {
        let body = json!({
            "multidimensionalInfo": {
                "variables": [{
                    "name": "NO2_Troposphere",
                    "dimensions": [{"name": "StdTime", "values": [500, 100, 900, 300]}]
                }]
            }
        });
        let times = extract_times("test://svc", body).unwrap();
        assert_eq!(times, vec![900, 500, 300, 100]);
    }

    #[test]
    fn test_extract_times_malformed() {
        let body = json!({"error": {"code": 500}});
        let err = extract_times("test://svc", body).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ImageServiceError::MalformedResponse { .. }
        ));

        let no_vars = json!({"multidimensionalInfo": {"variables": []}});
        let err = extract_times("test://svc", no_vars).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ImageServiceError::MalformedResponse { .. }
        ));
    }

    #[test]
    fn test_time_selector_display() {
        assert_eq!(TimeSelector::Single(1234).to_string(), "1234");
        assert_eq!(
            TimeSelector::Range { start: 100, end: 900 }.to_string(),
            "100,900"
        );
    }

    #[test]
    fn test_time_selector_covering() {
        let sel = TimeSelector::covering(&[500, 100, 900, 300]).unwrap();
        assert_eq!(sel.to_string(), "100,900");
        assert!(TimeSelector::covering(&[]).is_none());
    }

    #[test]
    fn test_mosaic_rule_json() {
        assert_eq!(
            mosaic_rule_json("NO2_Troposphere"),
            r#"{"multidimensionalDefinition":[{"variableName":"NO2_Troposphere"}]}"#
        );
    }

    #[test]
    fn test_point_geometry_display() {
        let p = PointGeometry {
            longitude: -117.0283,
            latitude: 32.5426,
        };
        assert_eq!(p.to_string(), "-117.0283, 32.5426");
    }

    #[test]
    fn test_empty_samples_key_is_empty_vec() {
        let body: GetSamplesResponse = serde_json::from_value(json!({})).unwrap();
        assert!(body.samples.is_empty());
    }
}
