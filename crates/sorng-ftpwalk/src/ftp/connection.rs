//! TCP + TLS transport for the FTP control connection.
//!
//! Handles plain-TCP connect, implicit-FTPS wrapping, and the
//! timeout policy from `FtpConnectionConfig`.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::tls::TlsSettings;
use crate::ftp::types::{FtpConnectionConfig, FtpResponse, FtpSecurityMode};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Result of opening the control connection.
pub struct Established {
    pub codec: FtpCodec,
    pub banner: FtpResponse,
    /// Present for implicit FTPS; every data socket is wrapped with it.
    pub tls: Option<TlsSettings>,
}

/// Establish the control connection and read the server greeting.
///
/// For Explicit FTPS the caller must later issue AUTH TLS themselves
/// (handled in `client.rs`).
pub async fn connect(config: &FtpConnectionConfig) -> FtpResult<Established> {
    let addr = config.address();

    let tcp = timeout(config.connect_timeout(), TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::timeout(format!("TCP connect to {} timed out", addr)))?
        .map_err(|e| FtpError::connection_failed(format!("TCP connect to {}: {}", addr, e)))?;

    tcp.set_nodelay(true).ok();

    let (mut codec, tls) = match config.security {
        FtpSecurityMode::Implicit => {
            let settings = TlsSettings::new(&config.host, config.accept_invalid_certs)?;
            let stream = timeout(config.connect_timeout(), settings.wrap(tcp))
                .await
                .map_err(|_| FtpError::timeout("Implicit TLS handshake timed out"))??;
            (FtpCodec::from_tls(stream, config.debug), Some(settings))
        }
        // Plain TCP (None or Explicit; Explicit upgrades later).
        _ => (FtpCodec::from_tcp(tcp, config.debug), None),
    };

    let banner = timeout(config.connect_timeout(), codec.read_response())
        .await
        .map_err(|_| FtpError::timeout(format!("No greeting from {}", addr)))??;

    if !banner.is_completion() {
        return Err(FtpError::connection_failed(format!(
            "Server refused connection: {}",
            banner.text()
        ))
        .with_code(banner.code));
    }

    Ok(Established { codec, banner, tls })
}
