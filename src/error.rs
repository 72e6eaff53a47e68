//! Common errors across the tempo-rs crate

use std::path::PathBuf;

/// Errors from the ArcGIS image-service client.
#[derive(Debug, thiserror::Error)]
pub enum ImageServiceError {
    #[error("Error requesting {url}: {reason}")]
    Request { url: String, reason: String },
    #[error("Response from {url} was not valid JSON: {reason}")]
    InvalidJson { url: String, reason: String },
    #[error("Response from {url} did not have the expected structure: {reason}")]
    MalformedResponse { url: String, reason: String },
}

impl ImageServiceError {
    pub(crate) fn request(url: &str, err: reqwest::Error) -> Self {
        Self::Request {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn invalid_json(url: &str, err: reqwest::Error) -> Self {
        Self::InvalidJson {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn malformed<S: ToString>(url: &str, reason: S) -> Self {
        Self::MalformedResponse {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors from searching the CMR catalog or downloading granules.
#[derive(Debug, thiserror::Error)]
pub enum CmrError {
    #[error("Error requesting {url}: {reason}")]
    Request { url: String, reason: String },
    #[error("Response from {url} was not valid JSON: {reason}")]
    InvalidJson { url: String, reason: String },
    #[error("Download from {url} failed: {reason}")]
    Download { url: String, reason: String },
    #[error("Error writing downloaded data to {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },
}

/// Errors obtaining Earthdata login credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Could not read credential file {}: {reason}", .path.display())]
    CouldNotRead { path: PathBuf, reason: String },
    #[error("Could not write credential file {}: {reason}", .path.display())]
    CouldNotWrite { path: PathBuf, reason: String },
    #[error("No credentials available for {host}: {reason}")]
    NotAvailable { host: String, reason: String },
    #[error("Error reading from the terminal: {0}")]
    Prompt(String),
}

/// Errors loading the sampling configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Error loading configuration: {0}")]
    Load(#[from] figment::Error),
}
