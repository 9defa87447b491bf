//! FTP-specific error type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ftp::status;

/// Categorised FTP error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpError {
    pub kind: FtpErrorKind,
    /// Human-readable message; for reply-driven errors this is the raw reply text.
    pub message: String,
    /// FTP reply code that triggered the error, if any.
    pub code: Option<u16>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FtpErrorKind {
    /// TCP / DNS resolution failure while opening the control connection.
    ConnectionFailed,
    /// AUTH TLS / TLS handshake failure.
    TlsFailed,
    /// Socket read/write failure on an established connection.
    Transport,
    /// The control connection was closed (by QUIT, timeout teardown or the peer).
    Disconnected,
    /// Wrong username/password.
    AuthFailed,
    /// Reply code did not match the expected status.
    Protocol,
    /// Reply line carried no parseable three-digit code.
    NoStatusCode,
    /// PASV round-trip plus data connect exceeded its ceiling.
    NegotiationTimeout,
    /// Malformed `227` payload.
    BadPassiveReply,
    /// The selected listing format has no parser.
    UnsupportedFormat,
    /// 550 while opening a listing.
    PathUnavailable,
    /// Listing refused or truncated for any other reason.
    ListingFailed,
    /// The walker reached its depth bound.
    DepthExceeded,
    /// Operation timed out.
    Timeout,
    /// Config / parameter validation error.
    InvalidConfig,
}

pub type FtpResult<T> = Result<T, FtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ConnectionFailed, msg)
    }

    pub fn tls_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::TlsFailed, msg)
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Transport, msg)
    }

    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Disconnected, msg)
    }

    pub fn auth_failed(code: u16, msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::AuthFailed, msg).with_code(code)
    }

    /// Reply `code` arrived where another status was expected.
    pub fn protocol(code: u16, reply_text: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Protocol, reply_text).with_code(code)
    }

    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Protocol, msg)
    }

    pub fn no_status_code(line: &str) -> Self {
        Self::new(
            FtpErrorKind::NoStatusCode,
            format!("No status code in reply: '{}'", line.trim_end()),
        )
    }

    pub fn negotiation_timeout(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::NegotiationTimeout, msg)
    }

    pub fn bad_passive_reply(reply_text: &str) -> Self {
        Self::new(
            FtpErrorKind::BadPassiveReply,
            format!("Bad passive reply: '{}'", reply_text.trim_end()),
        )
        .with_code(status::ENTERING_PASSIVE_MODE)
    }

    pub fn unsupported_format(format: &str) -> Self {
        Self::new(
            FtpErrorKind::UnsupportedFormat,
            format!("{} listing format is not implemented", format),
        )
    }

    pub fn path_unavailable(reply_text: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::PathUnavailable, reply_text).with_code(status::FILE_UNAVAILABLE)
    }

    pub fn listing_failed(code: u16, reply_text: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ListingFailed, reply_text).with_code(code)
    }

    pub fn depth_exceeded(path: &str) -> Self {
        Self::new(
            FtpErrorKind::DepthExceeded,
            format!("Depth limit reached at '{}'", path),
        )
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Timeout, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidConfig, msg)
    }

    // ── Inspection ───────────────────────────────────────────────

    /// Reply code associated with this error.
    ///
    /// Falls back to the first three characters of the message, and to 0
    /// when those are not a number.
    pub fn status_code(&self) -> u16 {
        self.code.unwrap_or_else(|| {
            self.message
                .get(..3)
                .and_then(|c| c.parse::<u16>().ok())
                .unwrap_or(0)
        })
    }

    /// Whether walkers conventionally skip past this failure.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self.kind,
            FtpErrorKind::PathUnavailable | FtpErrorKind::DepthExceeded
        ) || status::is_skippable(self.status_code())
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message)
        } else {
            write!(f, "[FTP {:?}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FtpError {}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => Self::timeout(format!("I/O timeout: {}", e)),
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe => Self::disconnected(e.to_string()),
            _ => Self::transport(e.to_string()),
        }
    }
}

impl From<FtpError> for String {
    fn from(e: FtpError) -> String {
        e.message
    }
}
