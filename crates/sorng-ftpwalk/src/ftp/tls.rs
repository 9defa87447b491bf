//! TLS helpers for Explicit and Implicit FTPS (RFC 4217).
//!
//! - Builds a rustls `ClientConfig` from the native root store, with
//!   optional self-signed cert acceptance.
//! - Provides `upgrade_to_tls` for swapping a plain control codec for a
//!   TLS one after `AUTH TLS`.
//! - Wraps data sockets once a session runs under TLS.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::{FtpCodec, ReadHalf, WriteHalf};

/// Transport-encryption settings applied to the control socket and every
/// data socket opened after the upgrade.
#[derive(Clone)]
pub struct TlsSettings {
    pub connector: TlsConnector,
    pub server_name: ServerName<'static>,
}

impl std::fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsSettings")
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

impl TlsSettings {
    pub fn new(host: &str, accept_invalid_certs: bool) -> FtpResult<Self> {
        let config = build_client_config(accept_invalid_certs)?;
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| FtpError::tls_failed(format!("Invalid server name '{}': {}", host, e)))?;
        Ok(Self {
            connector: TlsConnector::from(config),
            server_name,
        })
    }

    /// Run the client handshake over `tcp`.
    pub async fn wrap(&self, tcp: TcpStream) -> FtpResult<TlsStream<TcpStream>> {
        self.connector
            .connect(self.server_name.clone(), tcp)
            .await
            .map_err(|e| FtpError::tls_failed(format!("TLS handshake failed: {}", e)))
    }
}

/// Build the rustls client configuration.
pub fn build_client_config(accept_invalid_certs: bool) -> FtpResult<Arc<rustls::ClientConfig>> {
    let mut root_store = rustls::RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        log::warn!("Skipping native root certificate source: {}", err);
    }
    for cert in native.certs {
        if let Err(e) = root_store.add(cert) {
            log::debug!("Ignoring unusable root certificate: {}", e);
        }
    }

    let mut config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    if accept_invalid_certs {
        log::warn!("FTPS certificate verification disabled, insecure!");
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoCertVerifier));
    }

    Ok(Arc::new(config))
}

/// Upgrade an existing **plain** control connection to TLS.
///
/// Called after a successful `AUTH TLS` + 234 reply.
/// Consumes the plain codec, performs the TLS handshake, returns a new codec.
pub async fn upgrade_to_tls(codec: FtpCodec, settings: &TlsSettings) -> FtpResult<FtpCodec> {
    let debug = codec.debug;
    let tcp = reunite_plain(codec)?;
    let tls = settings.wrap(tcp).await?;
    Ok(FtpCodec::from_tls(tls, debug))
}

/// Reunite the read + write halves back into a `TcpStream`.
/// Only works when both halves are `Plain`.
fn reunite_plain(codec: FtpCodec) -> FtpResult<TcpStream> {
    let rd = match codec.reader {
        ReadHalf::Plain(br) => br.into_inner(),
        ReadHalf::Tls(_) => {
            return Err(FtpError::tls_failed(
                "Cannot upgrade: connection is already TLS",
            ))
        }
    };
    let wr = match codec.writer {
        WriteHalf::Plain(w) => w,
        WriteHalf::Tls(_) => {
            return Err(FtpError::tls_failed(
                "Cannot upgrade: connection is already TLS",
            ))
        }
    };
    rd.reunite(wr)
        .map_err(|e| FtpError::tls_failed(format!("Reunite failed: {}", e)))
}

// ─── NoCertVerifier (for self-signed certs) ─────────────────────────

#[derive(Debug)]
struct NoCertVerifier;

impl rustls::client::danger::ServerCertVerifier for NoCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ED25519,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
        ]
    }
}
