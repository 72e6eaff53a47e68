use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use error_stack::ResultExt;
use tempo_rs::{
    config::SamplingConfig,
    imageserver::{ImageServiceClient, TimeSelector},
    logging::init_logging,
    samples::{collect_valid_samples, sample_table, SortOrder},
    units::GasSpecies,
};

fn main() -> ExitCode {
    let clargs = HistoryCli::parse();
    init_logging(clargs.verbosity.log_level_filter());
    if let Err(e) = driver(clargs) {
        eprintln!("ERROR: {e:?}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Tabulate the recent trace-gas readings at the configured point.
///
/// Fetches the newest N acquisition times from the configured TEMPO image
/// service, samples them at the configured point in a single ranged request,
/// and prints a table of column densities with approximate surface
/// concentrations.
#[derive(Debug, Parser)]
struct HistoryCli {
    /// Path to a TOML configuration file. Settings may also be given as
    /// TEMPO_* environment variables; defaults are used when neither is set.
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// Gas species to sample (NO2 or HCHO), overriding the configuration.
    #[clap(short = 's', long)]
    species: Option<GasSpecies>,

    /// How many recent acquisitions to cover, overriding the configuration.
    #[clap(short = 'n', long)]
    num_records: Option<usize>,

    /// Print oldest records first instead of newest first.
    #[clap(long)]
    oldest_first: bool,

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

fn driver(clargs: HistoryCli) -> error_stack::Result<(), CliError> {
    let mut config = SamplingConfig::load(clargs.config.as_deref())
        .change_context_lazy(|| CliError::from("Error loading configuration"))?;
    if let Some(species) = clargs.species {
        config.species = species;
    }
    if let Some(n) = clargs.num_records {
        config.num_records = n;
    }
    if clargs.oldest_first {
        config.sort = SortOrder::Ascending;
    }
    let variable = config.variable_name().to_string();

    let client = ImageServiceClient::new(&config.service_url)
        .change_context_lazy(|| CliError::from("Error creating the image service client"))?;

    log::info!("Fetching available timestamps from the server");
    let times = client
        .fetch_available_times()
        .change_context_lazy(|| CliError::from("Error fetching the available timestamps"))?;
    if times.is_empty() {
        println!("No timestamps were found on the server.");
        return Ok(());
    }

    let selector = match window_selector(&times, config.num_records) {
        Some(s) => s,
        None => {
            println!("No recent records requested (num_records is 0).");
            return Ok(());
        }
    };
    log::info!("Requesting data for the time range {selector}");

    let raws = client
        .fetch_samples(&variable, config.point(), selector)
        .change_context_lazy(|| CliError::from("Error fetching samples"))?;
    let samples = collect_valid_samples(&raws, &variable);
    if samples.is_empty() {
        println!(
            "No valid data found for {variable} at point ({}) for the requested time range.",
            config.point()
        );
        return Ok(());
    }

    println!(
        "--- Last {} valid {} records ---",
        samples.len(),
        config.species.label()
    );
    println!(
        "{}",
        sample_table(&samples, config.species.molar_mass(), config.sort)
    );

    Ok(())
}

/// The time range covering the newest `num_records` entries of a
/// newest-first catalog. `None` when the window is empty, including
/// `num_records == 0`.
fn window_selector(times: &[i64], num_records: usize) -> Option<TimeSelector> {
    let window = &times[..times.len().min(num_records)];
    TimeSelector::covering(window)
}
