//! Sampling configuration.
//!
//! The original workflow hardcoded the service URL, variable, and point as
//! module constants; here they are one immutable config value loaded from an
//! optional TOML file with `TEMPO_*` environment overrides, so the same
//! binaries cover different species and locations.

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::imageserver::PointGeometry;
use crate::samples::SortOrder;
use crate::units::GasSpecies;

pub const DEFAULT_SERVICE_URL: &str = "https://gis.earthdata.nasa.gov/image/rest/services/C2930763263-LARC_CLOUD/TEMPO_NO2_L3_V03_HOURLY_TROPOSPHERIC_VERTICAL_COLUMN/ImageServer";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Base URL of the ArcGIS image service to sample.
    pub service_url: String,
    /// Gas species; sets the molar mass and the default variable name.
    pub species: GasSpecies,
    /// Override for the image-service variable name. Defaults to the
    /// species' standard TEMPO variable.
    pub variable: Option<String>,
    /// Sampling point longitude in degrees.
    pub longitude: f64,
    /// Sampling point latitude in degrees.
    pub latitude: f64,
    /// How many recent acquisitions a history request covers.
    pub num_records: usize,
    /// Presentation order for history tables.
    pub sort: SortOrder,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        // The original scripts' defaults: TEMPO NO2 over Tijuana.
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            species: GasSpecies::No2,
            variable: None,
            longitude: -117.0283,
            latitude: 32.5426,
            num_records: 100,
            sort: SortOrder::Descending,
        }
    }
}

impl SamplingConfig {
    /// Load the configuration: defaults, then the TOML file (if given), then
    /// `TEMPO_*` environment variables, later layers winning.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        let config: Self = figment.merge(Env::prefixed("TEMPO_")).extract()?;
        Ok(config)
    }

    /// The variable to request: the explicit override or the species default.
    pub fn variable_name(&self) -> &str {
        self.variable
            .as_deref()
            .unwrap_or_else(|| self.species.variable_name())
    }

    pub fn point(&self) -> PointGeometry {
        PointGeometry {
            longitude: self.longitude,
            latitude: self.latitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SamplingConfig::default();
        assert_eq!(config.species, GasSpecies::No2);
        assert_eq!(config.variable_name(), "NO2_Troposphere");
        assert_eq!(config.num_records, 100);
        assert_eq!(config.point().to_string(), "-117.0283, 32.5426");
    }

    #[test]
    fn test_variable_override() {
        let config = SamplingConfig {
            variable: Some("NO2_Total".to_string()),
            ..Default::default()
        };
        assert_eq!(config.variable_name(), "NO2_Total");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SamplingConfig {
            species: GasSpecies::Hcho,
            ..Default::default()
        };
        let figment = Figment::from(Serialized::defaults(config));
        let loaded: SamplingConfig = figment.extract().unwrap();
        assert_eq!(loaded.species, GasSpecies::Hcho);
        assert_eq!(loaded.variable_name(), "HCHO_Troposphere");
    }
}
