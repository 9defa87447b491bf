//! # sorng-ftpwalk: FTP/FTPS client and tree walker
//!
//! Implementation of the client side of FTP (RFC 959) with:
//! - **RFC 2228 / 4217**: AUTH TLS / FTPS (Explicit & Implicit)
//! - **RFC 3659**: MLSD structured listings, SIZE
//! - **RFC 2389**: FEAT negotiation
//!
//! Architecture:
//! - `types`: config, replies, listing entries
//! - `error`: FTP-specific error type
//! - `status`: named RFC 959 reply codes
//! - `protocol`: low-level command/reply codec
//! - `connection`: TCP + TLS control transport
//! - `tls`: rustls connector, AUTH TLS upgrade, data-socket wrapping
//! - `transfer`: PASV negotiation and data streams
//! - `client`: the stateful session (`execute`, login, quit)
//! - `features`: FEAT capability bitmask and listing-format dispatch
//! - `parser`: MLSD and Unix LIST parsers
//! - `listing`: passive-data listing retrieval
//! - `directory`: single-command wrappers (CWD, MKD, DELE, ...)
//! - `file_ops`: RETR / STOR
//! - `walk`: recursive tree walker

pub mod types;
pub mod error;
pub mod status;
pub mod protocol;
pub mod connection;
pub mod tls;
pub mod transfer;
pub mod client;
pub mod features;
pub mod parser;
pub mod listing;
pub mod directory;
pub mod file_ops;
pub mod walk;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::FtpSession;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use features::{Capabilities, ListingFormat};
pub use types::*;
pub use walk::WalkError;
