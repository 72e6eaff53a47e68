//! Earthdata login credentials.
//!
//! Downloads from Earthdata DAACs authenticate against URS
//! (`urs.earthdata.nasa.gov`). The conventional place to keep those
//! credentials is a netrc file, but tools should not be hardwired to it, so
//! credential lookup goes through the [`CredentialProvider`] trait with
//! environment-variable and netrc implementations.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::CredentialError;

/// The Earthdata authentication host that credential entries are stored under.
pub const URS_HOST: &str = "urs.earthdata.nasa.gov";

/// A username/password pair for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub trait CredentialProvider {
    /// Produce credentials for `host`, or a [`CredentialError`] explaining
    /// why none are available.
    fn credentials(&self, host: &str) -> Result<Credentials, CredentialError>;
}

/// Credentials from `EARTHDATA_USERNAME` / `EARTHDATA_PASSWORD`, for
/// non-interactive use.
pub struct EnvCredentials;

impl EnvCredentials {
    pub const USERNAME_VAR: &'static str = "EARTHDATA_USERNAME";
    pub const PASSWORD_VAR: &'static str = "EARTHDATA_PASSWORD";
}

impl CredentialProvider for EnvCredentials {
    fn credentials(&self, host: &str) -> Result<Credentials, CredentialError> {
        let username = std::env::var(Self::USERNAME_VAR).map_err(|_| {
            CredentialError::NotAvailable {
                host: host.to_string(),
                reason: format!("{} is not set", Self::USERNAME_VAR),
            }
        })?;
        let password = std::env::var(Self::PASSWORD_VAR).map_err(|_| {
            CredentialError::NotAvailable {
                host: host.to_string(),
                reason: format!("{} is not set", Self::PASSWORD_VAR),
            }
        })?;
        Ok(Credentials { username, password })
    }
}

/// One machine entry parsed from a netrc file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NetrcEntry {
    /// `None` for a `default` entry, which matches any host.
    machine: Option<String>,
    login: Option<String>,
    password: Option<String>,
}

/// Credentials from a netrc-format file.
///
/// The file is the line-oriented `machine`/`login`/`password` token format;
/// Windows tooling conventionally names it `_netrc` instead of `.netrc`.
pub struct NetrcCredentials {
    path: PathBuf,
}

impl NetrcCredentials {
    /// The netrc file at its conventional per-OS location in the home directory.
    pub fn standard() -> Result<Self, CredentialError> {
        let home = home_dir().ok_or_else(|| CredentialError::NotAvailable {
            host: URS_HOST.to_string(),
            reason: "could not determine the home directory".to_string(),
        })?;
        let name = if cfg!(windows) { "_netrc" } else { ".netrc" };
        Ok(Self {
            path: home.join(name),
        })
    }

    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the entry for `host`, falling back to a `default` entry.
    /// A missing file reads as "no entry", not an error.
    pub fn lookup(&self, host: &str) -> Result<Option<Credentials>, CredentialError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CredentialError::CouldNotRead {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };
        Ok(find_host(&parse_netrc(&text), host))
    }

    /// Get credentials for `host`, prompting on the terminal and appending a
    /// new entry to the file if none exist yet.
    ///
    /// On Unix the file permissions are restricted to owner read/write after
    /// writing, matching what curl and wget demand of a netrc file.
    pub fn ensure_entry(&self, host: &str) -> Result<Credentials, CredentialError> {
        if let Some(creds) = self.lookup(host)? {
            return Ok(creds);
        }

        log::info!(
            "No entry for {host} in {}, prompting for Earthdata login",
            self.path.display()
        );
        let username = prompt_line(&format!("Enter NASA Earthdata Login Username for {host}: "))?;
        let password = prompt_line(&password_prompt(host))?;
        let creds = Credentials { username, password };
        self.append_entry(host, &creds)?;
        Ok(creds)
    }

    fn append_entry(&self, host: &str, creds: &Credentials) -> Result<(), CredentialError> {
        let write_err = |e: std::io::Error| CredentialError::CouldNotWrite {
            path: self.path.clone(),
            reason: e.to_string(),
        };

        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;
        f.write_all(format_entry(host, creds).as_bytes())
            .map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }

        Ok(())
    }
}

impl CredentialProvider for NetrcCredentials {
    fn credentials(&self, host: &str) -> Result<Credentials, CredentialError> {
        self.ensure_entry(host)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

fn prompt_line(prompt: &str) -> Result<String, CredentialError> {
    print!("{prompt}");
    std::io::stdout()
        .flush()
        .map_err(|e| CredentialError::Prompt(e.to_string()))?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| CredentialError::Prompt(e.to_string()))?;
    let line = line.trim().to_string();
    if line.is_empty() {
        Err(CredentialError::Prompt("empty input".to_string()))
    } else {
        Ok(line)
    }
}

// Input is read from plain stdin, so warn that the password is visible
// while typed.
fn password_prompt(host: &str) -> String {
    format!("Enter NASA Earthdata Login Password for {host} (input will be echoed): ")
}

fn format_entry(host: &str, creds: &Credentials) -> String {
    format!(
        "machine {host}\nlogin {}\npassword {}\n",
        creds.username, creds.password
    )
}

/// Parse netrc text as a token stream. Unknown tokens are skipped, which
/// covers `account` and `macdef`-free files in practice.
fn parse_netrc(text: &str) -> Vec<NetrcEntry> {
    let mut entries: Vec<NetrcEntry> = vec![];
    let mut tokens = text.split_whitespace();
    while let Some(tok) = tokens.next() {
        match tok {
            "machine" => {
                if let Some(name) = tokens.next() {
                    entries.push(NetrcEntry {
                        machine: Some(name.to_string()),
                        login: None,
                        password: None,
                    });
                }
            }
            "default" => entries.push(NetrcEntry {
                machine: None,
                login: None,
                password: None,
            }),
            "login" => {
                if let (Some(entry), Some(value)) = (entries.last_mut(), tokens.next()) {
                    entry.login = Some(value.to_string());
                }
            }
            "password" => {
                if let (Some(entry), Some(value)) = (entries.last_mut(), tokens.next()) {
                    entry.password = Some(value.to_string());
                }
            }
            _ => (),
        }
    }
    entries
}

fn find_host(entries: &[NetrcEntry], host: &str) -> Option<Credentials> {
    entries
        .iter()
        .find(|e| e.machine.as_deref() == Some(host))
        .or_else(|| entries.iter().find(|e| e.machine.is_none()))
        .and_then(|e| {
            Some(Credentials {
                username: e.login.clone()?,
                password: e.password.clone()?,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_netrc() {
        let text = "machine urs.earthdata.nasa.gov\nlogin alice\npassword hunter2\n";
        let creds = find_host(&parse_netrc(text), URS_HOST).unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn test_parse_single_line_entries() {
        let text = "machine example.com login bob password pw1\nmachine urs.earthdata.nasa.gov login alice password pw2";
        let creds = find_host(&parse_netrc(text), URS_HOST).unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "pw2");
    }

    #[test]
    fn test_default_entry_fallback() {
        let text = "machine example.com login bob password pw1\ndefault login carol password pw3";
        let creds = find_host(&parse_netrc(text), "urs.earthdata.nasa.gov").unwrap();
        assert_eq!(creds.username, "carol");
    }

    #[test]
    fn test_incomplete_entry_yields_none() {
        // A machine line without login/password is what the original scripts
        // left behind when interrupted mid-bootstrap.
        let text = "machine urs.earthdata.nasa.gov\n";
        assert!(find_host(&parse_netrc(text), URS_HOST).is_none());
    }

    #[test]
    fn test_password_prompt_warns_about_echo() {
        assert!(password_prompt(URS_HOST).contains("echoed"));
    }

    #[test]
    fn test_round_trip_written_entry() {
        let creds = Credentials {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        let text = format_entry(URS_HOST, &creds);
        assert_eq!(find_host(&parse_netrc(&text), URS_HOST).unwrap(), creds);
    }
}
