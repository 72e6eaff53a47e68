use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use error_stack::ResultExt;
use tempo_rs::{
    config::SamplingConfig,
    imageserver::{ImageServiceClient, TimeSelector},
    logging::init_logging,
    samples::{collect_valid_samples, latest_sample},
    units::{column_to_ug_m3, GasSpecies},
};

fn main() -> ExitCode {
    let clargs = LatestCli::parse();
    init_logging(clargs.verbosity.log_level_filter());
    if let Err(e) = driver(clargs) {
        eprintln!("ERROR: {e:?}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Report the most recent valid trace-gas reading at the configured point.
///
/// Queries the configured TEMPO image service for its newest acquisition,
/// samples it at the configured point, and prints the column density along
/// with the approximate surface concentration.
#[derive(Debug, Parser)]
struct LatestCli {
    /// Path to a TOML configuration file. Settings may also be given as
    /// TEMPO_* environment variables; defaults are used when neither is set.
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// Gas species to sample (NO2 or HCHO), overriding the configuration.
    #[clap(short = 's', long)]
    species: Option<GasSpecies>,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct CliError(String);

impl From<&str> for CliError {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

fn driver(clargs: LatestCli) -> error_stack::Result<(), CliError> {
    let mut config = SamplingConfig::load(clargs.config.as_deref())
        .change_context_lazy(|| CliError::from("Error loading configuration"))?;
    if let Some(species) = clargs.species {
        config.species = species;
    }
    let variable = config.variable_name().to_string();
    let species = config.species;

    let client = ImageServiceClient::new(&config.service_url)
        .change_context_lazy(|| CliError::from("Error creating the image service client"))?;

    log::info!("Fetching available timestamps from the server");
    let times = client
        .fetch_available_times()
        .change_context_lazy(|| CliError::from("Error fetching the available timestamps"))?;
    let latest_time = match times.first() {
        Some(t) => *t,
        None => {
            println!("No timestamps were found on the server.");
            return Ok(());
        }
    };

    let raws = client
        .fetch_samples(&variable, config.point(), TimeSelector::Single(latest_time))
        .change_context_lazy(|| CliError::from("Error fetching samples"))?;
    let samples = collect_valid_samples(&raws, &variable);
    let latest = match latest_sample(&samples) {
        Some(s) => s,
        None => {
            println!(
                "No data found for {variable} at point ({}) for the latest record.",
                config.point()
            );
            return Ok(());
        }
    };

    let concentration = column_to_ug_m3(Some(latest.column_density), species.molar_mass())
        .expect("a present column density always converts");

    println!("Latest record:");
    println!("  StdTime (UTC):      {}", latest.time().format("%Y-%m-%d %H:%M:%S"));
    println!("  {variable}:   {:.4e} molec/cm\u{b2}", latest.column_density);
    println!(
        "\n{} concentration (approximate, \u{b5}g/m\u{b3}): {concentration:.2}",
        species.label()
    );

    Ok(())
}
