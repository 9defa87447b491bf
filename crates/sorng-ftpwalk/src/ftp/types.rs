//! Shared types for the FTP crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::ftp::error::{FtpError, FtpResult};

// ─── Connection / Session ────────────────────────────────────────────

/// Security mode for the control channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum FtpSecurityMode {
    /// Plain-text FTP (port 21).
    #[default]
    None,
    /// Explicit FTPS: starts plain then upgrades via AUTH TLS (port 21).
    Explicit,
    /// Implicit FTPS: TLS from the first byte (port 990).
    Implicit,
}

/// Representation type (RFC 959 TYPE command).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TransferType {
    Ascii,
    #[default]
    Binary,
}

impl TransferType {
    /// Argument of the `TYPE` command.
    pub fn code(self) -> &'static str {
        match self {
            TransferType::Ascii => "A",
            TransferType::Binary => "I",
        }
    }
}

/// Configuration for a single FTP session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default)]
    pub security: FtpSecurityMode,
    /// Remote directory to CWD into after login.
    #[serde(default)]
    pub initial_directory: Option<String>,
    /// Control connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
    /// Ceiling for the PASV round-trip plus data socket open.
    #[serde(default = "default_pasv_timeout")]
    pub pasv_timeout_sec: u64,
    /// Accept self-signed / untrusted certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Verbose protocol tracing.
    #[serde(default)]
    pub debug: bool,
    /// Friendly label used in log lines.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_port() -> u16 {
    21
}
fn default_username() -> String {
    "anonymous".into()
}
fn default_password() -> String {
    "anonymous@".into()
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_pasv_timeout() -> u64 {
    10
}

impl Default for FtpConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: default_username(),
            password: default_password(),
            security: FtpSecurityMode::None,
            initial_directory: None,
            connect_timeout_sec: default_connect_timeout(),
            pasv_timeout_sec: default_pasv_timeout(),
            accept_invalid_certs: false,
            debug: false,
            label: None,
        }
    }
}

impl FtpConnectionConfig {
    /// Build a config from `ftp://[user[:pass]@]host[:port][/dir]`.
    ///
    /// `ftps://` selects implicit TLS and defaults the port to 990.
    pub fn from_url(raw: &str) -> FtpResult<Self> {
        let url = Url::parse(raw)
            .map_err(|e| FtpError::invalid_config(format!("Bad FTP URL '{}': {}", raw, e)))?;

        let (security, default_port) = match url.scheme() {
            "ftp" => (FtpSecurityMode::None, 21),
            "ftps" => (FtpSecurityMode::Implicit, 990),
            other => {
                return Err(FtpError::invalid_config(format!(
                    "Unsupported URL scheme '{}'",
                    other
                )))
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FtpError::invalid_config("FTP URL has no host"))?
            .to_string();

        let mut config = Self {
            host,
            port: url.port().unwrap_or(default_port),
            security,
            ..Self::default()
        };
        if !url.username().is_empty() {
            config.username = url.username().to_string();
            config.password = url.password().unwrap_or_default().to_string();
        }
        let path = url.path();
        if path.len() > 1 {
            config.initial_directory = Some(path.to_string());
        }
        Ok(config)
    }

    /// `host:port` for the control connection.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec)
    }

    pub fn pasv_timeout(&self) -> Duration {
        Duration::from_secs(self.pasv_timeout_sec)
    }
}

// ─── FTP Response ────────────────────────────────────────────────────

/// A single FTP reply (may be multi-line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpResponse {
    pub code: u16,
    /// Raw reply lines with the line terminator stripped.
    pub lines: Vec<String>,
    pub multiline: bool,
}

impl FtpResponse {
    /// Full reply text (all lines joined).
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Text of the closing line after the `NNN ` prefix.
    pub fn message(&self) -> &str {
        self.lines
            .last()
            .map(|l| l.get(4..).unwrap_or("").trim())
            .unwrap_or("")
    }

    /// Positive-preliminary reply (1xx).
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Positive-completion reply (2xx).
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

// ─── Directory Listing ───────────────────────────────────────────────

/// Type of a remote filesystem entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FtpEntryKind {
    File,
    Directory,
    Symlink,
}

/// One normalised entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    /// Listing base joined with the entry name.
    pub path: String,
    pub name: String,
    pub kind: FtpEntryKind,
    /// Link target, for symlinks whose listing carries one.
    pub target: Option<String>,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    pub permissions: Option<String>,
}

impl ListEntry {
    pub fn new(base: &str, name: &str, kind: FtpEntryKind) -> Self {
        Self {
            path: join_path(base, name),
            name: name.to_string(),
            kind,
            target: None,
            size: None,
            modified: None,
            permissions: None,
        }
    }
}

/// A parsed listing split by entry kind, in server emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub files: Vec<ListEntry>,
    pub directories: Vec<ListEntry>,
    pub symlinks: Vec<ListEntry>,
}

impl Listing {
    pub fn push(&mut self, entry: ListEntry) {
        match entry.kind {
            FtpEntryKind::File => self.files.push(entry),
            FtpEntryKind::Directory => self.directories.push(entry),
            FtpEntryKind::Symlink => self.symlinks.push(entry),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.directories.len() + self.symlinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Join a listing base path and an entry name with a single `/`.
pub fn join_path(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}
