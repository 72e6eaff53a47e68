use std::{
    io::{BufRead, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use error_stack::ResultExt;
use tempo_rs::{
    cmr::{BoundingBox, CmrClient},
    earthdata::{CredentialProvider, EnvCredentials, NetrcCredentials, URS_HOST},
    logging::init_logging,
};

fn main() -> ExitCode {
    let clargs = FetchCli::parse();
    init_logging(clargs.verbosity.log_level_filter());
    if let Err(e) = driver(clargs) {
        eprintln!("ERROR: {e:?}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Interactively search the Earthdata CMR catalog and download a granule.
///
/// Searches dataset collections by keyword within a bounding box, lists the
/// matches for selection, then lists that collection's granules and downloads
/// the chosen one using Earthdata login credentials. Credentials come from
/// the EARTHDATA_USERNAME/EARTHDATA_PASSWORD environment variables if set,
/// otherwise from the netrc file (prompting and storing them on first use).
#[derive(Debug, Parser)]
struct FetchCli {
    /// Keyword for the dataset search (e.g. 'aerosol', 'temperature').
    /// Prompted for when omitted.
    keyword: Option<String>,

    /// Search area as 'W,S,E,N' degrees.
    #[clap(short = 'b', long, default_value = "-117.25,32.3,-116.8,32.7")]
    bbox: BoundingBox,

    /// Maximum number of collections and granules to list.
    #[clap(short = 'p', long, default_value_t = 5)]
    page_size: usize,

    /// Directory to save the downloaded file in.
    #[clap(short = 'o', long, default_value = ".")]
    output_dir: PathBuf,

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

fn driver(clargs: FetchCli) -> error_stack::Result<(), CliError> {
    println!("=== NASA Earthdata Dataset Downloader ===");

    let keyword = match clargs.keyword {
        Some(k) => k,
        None => prompt("Enter a keyword for dataset search (e.g. 'aerosol', 'temperature'): ")
            .change_context_lazy(|| CliError::from("Error reading the search keyword"))?,
    };

    let client = CmrClient::new()
        .change_context_lazy(|| CliError::from("Error creating the CMR client"))?;

    println!("\nSearching datasets in {} ...", clargs.bbox);
    let collections = client
        .search_collections(&keyword, clargs.bbox, clargs.page_size)
        .change_context_lazy(|| CliError::from("Error searching collections"))?;
    if collections.is_empty() {
        println!("No datasets found.");
        return Ok(());
    }

    println!("\nAvailable datasets:");
    for (idx, c) in collections.iter().enumerate() {
        println!("{}. {}", idx + 1, c.describe());
    }
    let collection = &collections[select("Select a dataset by number: ", collections.len())
        .change_context_lazy(|| CliError::from("Error reading the dataset selection"))?];

    println!("\nSearching available files (granules)...");
    let granules = client
        .search_granules(&collection.id, clargs.bbox, clargs.page_size)
        .change_context_lazy(|| CliError::from("Error searching granules"))?;
    if granules.is_empty() {
        println!("No files found for this dataset in the area.");
        return Ok(());
    }

    println!("\nAvailable files:");
    for (idx, g) in granules.iter().enumerate() {
        println!("{}. {}", idx + 1, g.title.as_deref().unwrap_or(&g.id));
    }
    let granule = &granules[select("Select a file to download by number: ", granules.len())
        .change_context_lazy(|| CliError::from("Error reading the file selection"))?];

    let links = granule.data_links();
    let url = match links.first() {
        Some(url) => *url,
        None => {
            println!("No downloadable link found.");
            return Ok(());
        }
    };

    // Prefer the non-interactive environment credentials, fall back to the
    // netrc file (which prompts and stores on first use).
    let creds = match EnvCredentials.credentials(URS_HOST) {
        Ok(creds) => creds,
        Err(e) => {
            log::debug!("Environment credentials unavailable ({e}), trying the netrc file");
            let netrc = NetrcCredentials::standard()
                .change_context_lazy(|| CliError::from("Error locating the netrc file"))?;
            netrc
                .credentials(URS_HOST)
                .change_context_lazy(|| CliError::from("Error getting Earthdata credentials"))?
        }
    };

    let file_name = url.rsplit('/').next().unwrap_or("earthdata-download");
    let dest = clargs.output_dir.join(file_name);
    println!("Downloading {} ...", dest.display());
    client
        .download(url, &dest, &creds)
        .change_context_lazy(|| CliError::from("Error downloading the file"))?;
    println!("Download complete.");

    Ok(())
}

fn prompt(message: &str) -> Result<String, CliError> {
    print!("{message}");
    std::io::stdout()
        .flush()
        .map_err(|e| CliError(e.to_string()))?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| CliError(e.to_string()))?;
    let line = line.trim().to_string();
    if line.is_empty() {
        Err(CliError::from("empty input"))
    } else {
        Ok(line)
    }
}

/// Prompt for a 1-based selection and return the 0-based index.
fn select(message: &str, len: usize) -> Result<usize, CliError> {
    let line = prompt(message)?;
    let n: usize = line
        .parse()
        .map_err(|_| CliError(format!("'{line}' is not a number")))?;
    if n == 0 || n > len {
        Err(CliError(format!("selection must be between 1 and {len}")))
    } else {
        Ok(n - 1)
    }
}
