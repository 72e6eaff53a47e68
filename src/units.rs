//! Conversion from satellite column densities to approximate surface concentrations.

use serde::{Deserialize, Serialize};

/// Avogadro's number in molecules/mol.
pub const AVOGADRO: f64 = 6.022e23;

/// Effective tropospheric column height in meters assumed when collapsing
/// a column density into a volumetric concentration.
pub const COLUMN_HEIGHT_M: f64 = 2000.0;

/// Trace gases available from the TEMPO L3 hourly image services.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum GasSpecies {
    #[strum(to_string = "NO2", serialize = "no2")]
    #[serde(rename = "NO2")]
    No2,
    #[strum(to_string = "HCHO", serialize = "hcho", serialize = "CH2O")]
    #[serde(rename = "HCHO")]
    Hcho,
}

impl GasSpecies {
    /// Molar mass in g/mol.
    pub fn molar_mass(&self) -> f64 {
        match self {
            Self::No2 => 46.0055,
            Self::Hcho => 30.026,
        }
    }

    /// The variable sampled from the image service for this gas.
    pub fn variable_name(&self) -> &'static str {
        match self {
            Self::No2 => "NO2_Troposphere",
            Self::Hcho => "HCHO_Troposphere",
        }
    }

    /// Human-readable label used in printed output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::No2 => "NO\u{2082}",
            Self::Hcho => "CH\u{2082}O",
        }
    }
}

/// Convert a tropospheric column density (molecules/cm2) into an approximate
/// near-surface concentration (ug/m3), assuming the gas is distributed evenly
/// through a [`COLUMN_HEIGHT_M`] deep column.
///
/// A missing input propagates to a missing output rather than erroring; the
/// image service reports gaps as absent or sentinel values, and those rows
/// simply have no concentration.
pub fn column_to_ug_m3(column_molec_per_cm2: Option<f64>, molar_mass_g_per_mol: f64) -> Option<f64> {
    let molec_per_cm2 = column_molec_per_cm2?;
    let molec_per_m2 = molec_per_cm2 * 1e4;
    let molec_per_m3 = molec_per_m2 / COLUMN_HEIGHT_M;
    let mol_per_m3 = molec_per_m3 / AVOGADRO;
    let g_per_m3 = mol_per_m3 * molar_mass_g_per_mol;
    let ug_per_m3 = g_per_m3 * 1e6;
    Some(ug_per_m3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[test]
    fn test_convert_zero_and_missing() {
        assert_eq!(column_to_ug_m3(Some(0.0), 46.0055), Some(0.0));
        assert_eq!(column_to_ug_m3(None, 46.0055), None);
    }

    #[test]
    fn test_convert_known_value() {
        // 1e15 molec/cm2 of NO2 through a 2 km column:
        // 1e19 molec/m2 -> 5e15 molec/m3 -> 8.3029e-9 mol/m3
        // -> 3.8198e-7 g/m3 -> 0.38198 ug/m3
        let v = column_to_ug_m3(Some(1e15), 46.0055).unwrap();
        approx::assert_relative_eq!(v, 0.381978, epsilon = 1e-5);
    }

    #[rstest]
    #[case(1e13, 1e14)]
    #[case(1e14, 1e15)]
    #[case(5.2e14, 5.3e14)]
    fn test_convert_monotonic(#[case] lo: f64, #[case] hi: f64) {
        let a = column_to_ug_m3(Some(lo), 46.0055).unwrap();
        let b = column_to_ug_m3(Some(hi), 46.0055).unwrap();
        assert!(a < b, "conversion must increase with column density");
    }

    #[rstest]
    #[case("NO2", GasSpecies::No2)]
    #[case("no2", GasSpecies::No2)]
    #[case("HCHO", GasSpecies::Hcho)]
    #[case("CH2O", GasSpecies::Hcho)]
    fn test_species_from_str(#[case] s: &str, #[case] expected: GasSpecies) {
        assert_eq!(GasSpecies::from_str(s).unwrap(), expected);
    }

    #[test]
    fn test_species_variables() {
        assert_eq!(GasSpecies::No2.variable_name(), "NO2_Troposphere");
        assert_eq!(GasSpecies::Hcho.variable_name(), "HCHO_Troposphere");
    }
}
