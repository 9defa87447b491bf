//! Stateful FTP session. Owns the control connection and issues commands.
//!
//! Lifecycle: `connect()` → greeting → optional AUTH TLS → login →
//! optional CWD. `quit()` or `close()` drop the control connection; every
//! later call fails with `Disconnected`.
//!
//! The session exposes the `execute` primitive used by `directory.rs`,
//! `listing.rs` and `file_ops.rs` for higher-level operations.

use crate::ftp::connection;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::features::Capabilities;
use crate::ftp::protocol::FtpCodec;
use crate::ftp::status;
use crate::ftp::tls::{self, TlsSettings};
use crate::ftp::types::*;
use uuid::Uuid;

/// A connected FTP client session.
///
/// Not safe for concurrent use; every operation takes `&mut self`.
pub struct FtpSession {
    pub id: String,
    pub config: FtpConnectionConfig,
    pub(crate) codec: Option<FtpCodec>,
    /// Set by implicit TLS or `auth_tls`; wraps every data socket.
    pub(crate) tls: Option<TlsSettings>,
    pub(crate) capabilities: Option<Capabilities>,
    banner: FtpResponse,
}

impl FtpSession {
    /// Open the control connection and bring the session to a logged-in state.
    pub async fn connect(config: FtpConnectionConfig) -> FtpResult<Self> {
        let mut session = Self::open(config).await?;

        if session.config.security == FtpSecurityMode::Explicit {
            session.auth_tls().await?;
        }

        let user = session.config.username.clone();
        let pass = session.config.password.clone();
        session.login(&user, &pass).await?;

        if let Some(dir) = session.config.initial_directory.clone() {
            session.cwd(&dir).await?;
        }

        log::info!(
            "[ftp:{}] connected to {} as {}",
            session.id,
            session.label(),
            session.config.username
        );
        Ok(session)
    }

    /// Open a bare control connection to `host[:port]` and read the greeting.
    ///
    /// No login is performed; call `login` next.
    pub async fn connect_addr(addr: &str) -> FtpResult<Self> {
        let (host, port) = match addr.rsplit_once(':') {
            Some((h, p)) if !h.contains(':') => {
                let port = p
                    .parse::<u16>()
                    .map_err(|_| FtpError::invalid_config(format!("Bad port in '{}'", addr)))?;
                (h.to_string(), port)
            }
            _ => (addr.to_string(), 21),
        };
        Self::open(FtpConnectionConfig {
            host,
            port,
            ..Default::default()
        })
        .await
    }

    async fn open(config: FtpConnectionConfig) -> FtpResult<Self> {
        if config.host.trim().is_empty() {
            return Err(FtpError::invalid_config("Host must not be empty"));
        }

        let id = Uuid::new_v4().to_string();
        let est = connection::connect(&config).await?;
        log::debug!("[ftp:{}] greeting: {}", id, est.banner.text());

        Ok(Self {
            id,
            config,
            codec: Some(est.codec),
            tls: est.tls,
            capabilities: None,
            banner: est.banner,
        })
    }

    // ─── Control primitive ───────────────────────────────────────

    pub(crate) fn codec_mut(&mut self) -> FtpResult<&mut FtpCodec> {
        self.codec
            .as_mut()
            .ok_or_else(|| FtpError::disconnected("Session is not connected"))
    }

    /// Send `cmd` and require reply code `expected`.
    ///
    /// A mismatch fails with a `Protocol` error carrying the raw reply.
    pub async fn execute(&mut self, expected: u16, cmd: &str) -> FtpResult<FtpResponse> {
        self.codec_mut()?.expect(cmd, expected).await
    }

    /// Send `cmd` and return the reply whatever its code.
    pub async fn raw_command(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.codec_mut()?.execute(cmd).await
    }

    // ─── Authentication ──────────────────────────────────────────

    /// `USER` / `PASS` exchange.
    ///
    /// A server that answers `USER` with 230 is taken as "already logged
    /// in" and no password is sent.
    pub async fn login(&mut self, user: &str, pass: &str) -> FtpResult<()> {
        let resp = self.raw_command(&format!("USER {}", user)).await?;
        match resp.code {
            status::USER_LOGGED_IN => {
                log::debug!("[ftp:{}] logged in without password", self.id);
                return Ok(());
            }
            status::NEED_PASSWORD => {}
            code => return Err(FtpError::auth_failed(code, resp.text())),
        }

        let resp = self.raw_command(&format!("PASS {}", pass)).await?;
        if resp.code != status::USER_LOGGED_IN {
            return Err(FtpError::auth_failed(resp.code, resp.text()));
        }
        Ok(())
    }

    /// Explicit FTPS: `AUTH TLS`, swap the control transport, then
    /// `PBSZ 0` and `PROT P` so data sockets are encrypted too.
    pub async fn auth_tls(&mut self) -> FtpResult<()> {
        if self.codec_mut()?.is_tls() {
            return Err(FtpError::tls_failed("Control connection is already TLS"));
        }
        let settings = TlsSettings::new(&self.config.host, self.config.accept_invalid_certs)?;

        self.execute(status::AUTH_MECHANISM_ACCEPTED, "AUTH TLS").await?;

        let plain = self
            .codec
            .take()
            .ok_or_else(|| FtpError::disconnected("Session is not connected"))?;
        self.codec = Some(tls::upgrade_to_tls(plain, &settings).await?);

        self.execute(status::COMMAND_OK, "PBSZ 0").await?;
        self.execute(status::COMMAND_OK, "PROT P").await?;
        self.tls = Some(settings);
        log::debug!("[ftp:{}] control channel upgraded to TLS", self.id);
        Ok(())
    }

    // ─── Teardown ────────────────────────────────────────────────

    /// Send `QUIT` (221 expected) and drop the control connection.
    ///
    /// The connection is dropped even when the reply is unexpected.
    pub async fn quit(&mut self) -> FtpResult<()> {
        let result = self.execute(status::CLOSING_CONTROL_CONNECTION, "QUIT").await;
        self.close().await;
        result.map(|_| ())
    }

    /// Drop the control connection without saying goodbye.
    pub async fn close(&mut self) {
        if let Some(mut codec) = self.codec.take() {
            codec.shutdown().await;
            log::debug!("[ftp:{}] control connection closed", self.id);
        }
    }

    // ─── Accessors ───────────────────────────────────────────────

    pub fn is_connected(&self) -> bool {
        self.codec.is_some()
    }

    /// Whether data sockets are TLS-wrapped.
    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    /// Server greeting read at connect time.
    pub fn banner(&self) -> &FtpResponse {
        &self.banner
    }

    pub(crate) fn label(&self) -> String {
        self.config
            .label
            .clone()
            .unwrap_or_else(|| self.config.address())
    }
}
