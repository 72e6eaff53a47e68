//! Parsing, filtering, and tabulation of point samples.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::imageserver::RawSample;
use crate::units::column_to_ug_m3;

/// One valid reading of a variable at the sampling point.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Acquisition time, epoch milliseconds (the service's `StdTime`).
    pub std_time_ms: i64,
    /// Column density in molecules/cm2.
    pub column_density: f64,
}

impl Sample {
    /// Interpret one raw attribute record from the image service.
    ///
    /// Returns `None` when the record is unusable: no integer `StdTime`, the
    /// variable attribute absent, or its value not a finite number (the
    /// services report gaps as nulls or sentinel strings like `"NoData"`).
    pub fn from_raw(raw: &RawSample, variable: &str) -> Option<Self> {
        let std_time_ms = raw.attributes.get("StdTime")?.as_i64()?;
        let column_density = parse_numeric_value(raw.attributes.get(variable)?)?;
        Some(Self {
            std_time_ms,
            column_density,
        })
    }

    /// The acquisition time as a UTC datetime.
    pub fn time(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.std_time_ms)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

fn parse_numeric_value(value: &serde_json::Value) -> Option<f64> {
    let v = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Presentation order for sample tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first.
    Ascending,
    /// Newest first.
    Descending,
}

/// Parse every raw record, dropping the invalid ones before any sorting.
///
/// The drop count is logged so a mostly-cloudy request is still explainable
/// from the output.
pub fn collect_valid_samples(raws: &[RawSample], variable: &str) -> Vec<Sample> {
    let mut skipped = 0usize;
    let samples: Vec<Sample> = raws
        .iter()
        .filter_map(|raw| {
            let s = Sample::from_raw(raw, variable);
            if s.is_none() {
                skipped += 1;
            }
            s
        })
        .collect();
    if skipped > 0 {
        log::debug!("Skipped {skipped} of {} records with missing or non-numeric values", raws.len());
    }
    samples
}

/// Sort samples by acquisition time in the requested order.
pub fn sort_samples(samples: &mut [Sample], order: SortOrder) {
    match order {
        SortOrder::Ascending => samples.sort_by_key(|s| s.std_time_ms),
        SortOrder::Descending => samples.sort_by_key(|s| std::cmp::Reverse(s.std_time_ms)),
    }
}

/// The most recent valid sample: ascending time sort, last row.
pub fn latest_sample(samples: &[Sample]) -> Option<&Sample> {
    samples
        .iter()
        .sorted_by_key(|s| s.std_time_ms)
        .last()
}

/// Render samples as a text table with the derived concentration column.
///
/// `molar_mass` feeds the column-to-concentration conversion per row.
pub fn sample_table(samples: &[Sample], molar_mass: f64, order: SortOrder) -> tabled::Table {
    let mut sorted: Vec<Sample> = samples.to_vec();
    sort_samples(&mut sorted, order);

    let mut builder = tabled::builder::Builder::new();
    builder.push_record(["StdTime (UTC)", "Column (molec/cm2)", "Concentration (ug/m3)"]);
    for sample in &sorted {
        let conc = column_to_ug_m3(Some(sample.column_density), molar_mass);
        builder.push_record([
            sample.time().format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{:.4e}", sample.column_density),
            conc.map(|c| format!("{c:.2}")).unwrap_or_default(),
        ]);
    }

    let mut table = builder.build();
    table
        .with(tabled::settings::style::Style::blank())
        .with(tabled::settings::Alignment::left());
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;

    fn raw(attributes: serde_json::Value) -> RawSample {
        serde_json::from_value(json!({ "attributes": attributes })).unwrap()
    }

    #[fixture]
    fn mixed_raws() -> Vec<RawSample> {
        vec![
            raw(json!({"StdTime": 1000, "NO2_Troposphere": "5.2e14"})),
            raw(json!({"StdTime": 2000, "NO2_Troposphere": "NoData"})),
            raw(json!({"StdTime": 3000, "NO2_Troposphere": null})),
            raw(json!({"StdTime": 4000})),
            raw(json!({"StdTime": 5000, "NO2_Troposphere": 6.1e14})),
        ]
    }

    #[rstest]
    fn test_filtering_drops_invalid_records(mixed_raws: Vec<RawSample>) {
        let samples = collect_valid_samples(&mixed_raws, "NO2_Troposphere");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].std_time_ms, 1000);
        approx::assert_relative_eq!(samples[0].column_density, 5.2e14);
        assert_eq!(samples[1].std_time_ms, 5000);
    }

    #[test]
    fn test_missing_std_time_dropped() {
        let raws = vec![raw(json!({"NO2_Troposphere": "5.2e14"}))];
        assert!(collect_valid_samples(&raws, "NO2_Troposphere").is_empty());
    }

    fn samples_from(times_and_values: &[(i64, f64)]) -> Vec<Sample> {
        times_and_values
            .iter()
            .map(|&(t, v)| Sample {
                std_time_ms: t,
                column_density: v,
            })
            .collect()
    }

    #[test]
    fn test_sort_orders() {
        let mut s = samples_from(&[(500, 1.0), (100, 2.0), (900, 3.0), (300, 4.0)]);
        sort_samples(&mut s, SortOrder::Descending);
        let times: Vec<i64> = s.iter().map(|x| x.std_time_ms).collect();
        assert_eq!(times, vec![900, 500, 300, 100]);

        sort_samples(&mut s, SortOrder::Ascending);
        let times: Vec<i64> = s.iter().map(|x| x.std_time_ms).collect();
        assert_eq!(times, vec![100, 300, 500, 900]);
    }

    #[test]
    fn test_latest_sample() {
        let s = samples_from(&[(100, 1.0), (300, 3.0), (200, 2.0)]);
        let latest = latest_sample(&s).unwrap();
        assert_eq!(latest.std_time_ms, 300);
        approx::assert_relative_eq!(latest.column_density, 3.0);

        assert!(latest_sample(&[]).is_none());
    }

    #[test]
    fn test_table_has_header_and_rows() {
        let s = samples_from(&[(0, 1e15)]);
        let table = sample_table(&s, 46.0055, SortOrder::Ascending).to_string();
        let first_line = table.lines().next().unwrap();
        assert!(first_line.contains("StdTime (UTC)"));
        assert!(table.contains("1970-01-01 00:00:00"));
        assert!(table.contains("0.38"));
    }
}
