//! Data-channel management for FTP transfers.
//!
//! Only passive mode (RFC 959 `PASV`) is supported. The advertised host
//! octets are ignored and the control connection's host is reused, since
//! servers behind NAT often advertise an unreachable internal address.
//!
//! Once a session runs under TLS every data socket is wrapped too (PROT P).

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use lazy_static::lazy_static;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;

use crate::ftp::client::FtpSession;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::status;
use crate::ftp::tls::TlsSettings;
use crate::ftp::types::FtpResponse;

lazy_static! {
    static ref PASV_RE: Regex = Regex::new(r"\(([^)]*)\)").expect("valid PASV regex");
}

/// Abstraction over a plain or TLS-wrapped data stream.
pub enum DataStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for DataStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            DataStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for DataStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            DataStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_flush(cx),
            DataStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DataStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            DataStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// A connected data socket that may still be finishing its TLS handshake.
///
/// FTPS servers only start the data-channel TLS session once they have
/// received the transfer command, so the handshake runs on its own task
/// and is joined after the opening reply. Dropping a pending handshake
/// aborts it and closes the socket.
pub enum PendingData {
    Plain(TcpStream),
    Tls(HandshakeTask),
}

pub struct HandshakeTask(JoinHandle<FtpResult<TlsStream<TcpStream>>>);

impl Drop for HandshakeTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl PendingData {
    /// Start wrapping `tcp` when the session carries TLS settings.
    pub fn start(tcp: TcpStream, tls: Option<&TlsSettings>) -> Self {
        match tls {
            None => PendingData::Plain(tcp),
            Some(settings) => {
                let settings = settings.clone();
                let handle = tokio::spawn(async move { settings.wrap(tcp).await });
                PendingData::Tls(HandshakeTask(handle))
            }
        }
    }

    /// Wait for the socket to become usable.
    pub async fn ready(self) -> FtpResult<DataStream> {
        match self {
            PendingData::Plain(tcp) => Ok(DataStream::Plain(tcp)),
            PendingData::Tls(mut task) => {
                let stream = (&mut task.0)
                    .await
                    .map_err(|e| FtpError::tls_failed(format!("Data TLS task failed: {}", e)))??;
                Ok(DataStream::Tls(Box::new(stream)))
            }
        }
    }
}

/// Extract the data port from a `227` reply text.
///
/// The payload is `(h1,h2,h3,h4,p1,p2)`; the port is `p1*256+p2`. Any other
/// group count, a non-numeric or out-of-range number, or port 0 fails with
/// `BadPassiveReply`.
pub fn parse_pasv_port(text: &str) -> FtpResult<u16> {
    let inner = PASV_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .ok_or_else(|| FtpError::bad_passive_reply(text))?
        .as_str();

    let nums = inner
        .split(',')
        .map(|p| p.trim().parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| FtpError::bad_passive_reply(text))?;

    if nums.len() != 6 {
        return Err(FtpError::bad_passive_reply(text));
    }

    let port = u16::from(nums[4]) * 256 + u16::from(nums[5]);
    if port == 0 {
        return Err(FtpError::bad_passive_reply(text));
    }
    Ok(port)
}

/// `PASV` round-trip followed by the TCP connect to `host:<port>`.
pub async fn negotiate_passive(codec: &mut FtpCodec, host: &str) -> FtpResult<TcpStream> {
    let resp = codec.expect("PASV", status::ENTERING_PASSIVE_MODE).await?;
    let port = parse_pasv_port(&resp.text())?;
    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(|e| FtpError::transport(format!("PASV data connect to {}:{}: {}", host, port, e)))?;
    tcp.set_nodelay(true).ok();
    Ok(tcp)
}

/// Read every line of a data stream, line terminators stripped.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected.
pub async fn read_lines(data: DataStream) -> FtpResult<Vec<String>> {
    let mut reader = BufReader::new(data);
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = match reader.read_until(b'\n', &mut buf).await {
            Ok(n) => n,
            // TLS peers that close without close_notify.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => 0,
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// Copy a data stream into `writer` until EOF.
pub async fn copy_from_data<W>(data: &mut DataStream, writer: &mut W) -> FtpResult<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = match data.read(&mut buf).await {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => 0,
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    writer.flush().await?;
    Ok(total)
}

/// Map a refused transfer command to an error.
pub type RefusalMapper = fn(&FtpResponse) -> FtpError;

/// Data socket plus the reply that opened the transfer.
pub struct OpenTransfer {
    pub data: DataStream,
    pub opening: FtpResponse,
}

impl FtpSession {
    /// Negotiate a passive data connection.
    ///
    /// The `PASV` round-trip and the TCP connect share the
    /// `pasv_timeout_sec` ceiling. On timeout the control connection is
    /// torn down, since its stream state can no longer be trusted.
    pub(crate) async fn open_data(&mut self) -> FtpResult<PendingData> {
        let limit = self.config.pasv_timeout();
        let host = self.config.host.clone();
        let codec = self.codec_mut()?;

        let negotiated = timeout(limit, negotiate_passive(codec, &host)).await;
        let tcp = match negotiated {
            Ok(result) => result?,
            Err(_) => {
                log::warn!(
                    "[ftp:{}] passive negotiation exceeded {:?}; closing session",
                    self.id,
                    limit
                );
                self.codec = None;
                return Err(FtpError::negotiation_timeout(format!(
                    "PASV negotiation with {} timed out after {:?}",
                    host, limit
                )));
            }
        };
        Ok(PendingData::start(tcp, self.tls.as_ref()))
    }

    /// Open a data channel, send `cmd` and wait for the server to accept it.
    ///
    /// The opening reply is read without dropping buffered input, because
    /// the closing reply may already follow it. A reply other than 1xx/2xx
    /// is turned into an error by `refused` and the data socket is closed
    /// before returning.
    pub(crate) async fn start_transfer(
        &mut self,
        cmd: &str,
        refused: RefusalMapper,
    ) -> FtpResult<OpenTransfer> {
        let pending = self.open_data().await?;
        let codec = self.codec_mut()?;
        codec.send_command(cmd).await?;
        let opening = codec.read_response_keep_buffer().await?;

        if !opening.is_preliminary() && !opening.is_completion() {
            drop(pending);
            return Err(refused(&opening));
        }

        let data = match pending.ready().await {
            Ok(data) => data,
            Err(e) => return Err(self.abort_transfer(&opening, e).await),
        };
        Ok(OpenTransfer { data, opening })
    }

    /// Resynchronise the control channel after the data side of a transfer
    /// failed, then hand back `err`.
    ///
    /// The data socket must already be closed. The pending closing reply is
    /// read and discarded within `pasv_timeout_sec`; when it cannot be read
    /// the session is closed instead.
    pub(crate) async fn abort_transfer(&mut self, opening: &FtpResponse, err: FtpError) -> FtpError {
        if opening.is_completion() {
            return err;
        }
        let limit = self.config.pasv_timeout();
        let Some(codec) = self.codec.as_mut() else {
            return err;
        };
        match timeout(limit, codec.read_response()).await {
            Ok(Ok(closing)) => {
                log::debug!(
                    "[ftp:{}] discarded closing reply {} after failed transfer: {}",
                    self.id,
                    closing.code,
                    err
                );
            }
            Ok(Err(e)) => {
                log::warn!("[ftp:{}] closing reply unreadable ({}); closing session", self.id, e);
                self.close().await;
            }
            Err(_) => {
                log::warn!(
                    "[ftp:{}] no closing reply within {:?}; closing session",
                    self.id,
                    limit
                );
                self.close().await;
            }
        }
        err
    }

    /// Read the closing reply of a transfer whose data socket has been closed.
    ///
    /// A transfer the server answered with 2xx straight away has no further
    /// reply.
    pub(crate) async fn finish_transfer(
        &mut self,
        opening: &FtpResponse,
        failed: RefusalMapper,
    ) -> FtpResult<FtpResponse> {
        if opening.is_completion() {
            return Ok(opening.clone());
        }
        let closing = self.codec_mut()?.read_response().await?;
        if !closing.is_completion() {
            return Err(failed(&closing));
        }
        Ok(closing)
    }
}
