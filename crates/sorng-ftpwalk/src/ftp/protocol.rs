//! Low-level FTP command/reply codec (RFC 959 §4).
//!
//! Handles:
//! - Sending FTP commands terminated with `\r\n`
//! - Reading single-line and multi-line replies
//! - Parsing the 3-digit reply code
//! - Dropping trailing chatter left in the input buffer after a reply

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::FtpResponse;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// Abstraction over plain TCP or TLS-wrapped read half.
pub enum ReadHalf {
    Plain(BufReader<OwnedReadHalf>),
    Tls(BufReader<tokio::io::ReadHalf<TlsStream<TcpStream>>>),
}

/// Abstraction over plain TCP or TLS-wrapped write half.
pub enum WriteHalf {
    Plain(OwnedWriteHalf),
    Tls(tokio::io::WriteHalf<TlsStream<TcpStream>>),
}

/// The FTP command/reply codec operating on split halves.
pub struct FtpCodec {
    pub reader: ReadHalf,
    pub writer: WriteHalf,
    /// Log protocol lines at debug instead of trace level.
    pub debug: bool,
}

impl FtpCodec {
    /// Create a codec from a plain TCP stream.
    pub fn from_tcp(stream: TcpStream, debug: bool) -> Self {
        let (rd, wr) = stream.into_split();
        Self {
            reader: ReadHalf::Plain(BufReader::new(rd)),
            writer: WriteHalf::Plain(wr),
            debug,
        }
    }

    /// Create a codec from a TLS-wrapped TCP stream.
    pub fn from_tls(stream: TlsStream<TcpStream>, debug: bool) -> Self {
        let (rd, wr) = tokio::io::split(stream);
        Self {
            reader: ReadHalf::Tls(BufReader::new(rd)),
            writer: WriteHalf::Tls(wr),
            debug,
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.writer, WriteHalf::Tls(_))
    }

    /// Send a raw FTP command (CRLF is appended) and flush.
    pub async fn send_command(&mut self, cmd: &str) -> FtpResult<()> {
        let line = format!("{}\r\n", cmd);
        match &mut self.writer {
            WriteHalf::Plain(w) => {
                w.write_all(line.as_bytes()).await?;
                w.flush().await?;
            }
            WriteHalf::Tls(w) => {
                w.write_all(line.as_bytes()).await?;
                w.flush().await?;
            }
        }
        self.log(&format!(">>> {}", mask_secret(cmd)));
        Ok(())
    }

    /// Read a complete reply, then discard whatever is still buffered.
    pub async fn read_response(&mut self) -> FtpResult<FtpResponse> {
        self.read_response_inner(true).await
    }

    /// Read a complete reply and leave any further buffered input alone.
    ///
    /// Used for the opening reply of a data transfer, where the closing
    /// reply may already sit in the buffer.
    pub async fn read_response_keep_buffer(&mut self) -> FtpResult<FtpResponse> {
        self.read_response_inner(false).await
    }

    async fn read_response_inner(&mut self, discard: bool) -> FtpResult<FtpResponse> {
        let resp = match &mut self.reader {
            ReadHalf::Plain(r) => read_reply(r, discard).await?,
            ReadHalf::Tls(r) => read_reply(r, discard).await?,
        };
        self.log(&format!(
            "<<< {}",
            resp.lines.last().map(String::as_str).unwrap_or("")
        ));
        Ok(resp)
    }

    /// Send a command and return the reply, whatever its code.
    pub async fn execute(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.send_command(cmd).await?;
        self.read_response().await
    }

    /// Send a command and require reply code `expected`.
    pub async fn expect(&mut self, cmd: &str, expected: u16) -> FtpResult<FtpResponse> {
        let resp = self.execute(cmd).await?;
        check_code(resp, expected)
    }

    /// Shut down the write side; the socket closes once the codec is dropped.
    pub async fn shutdown(&mut self) {
        let _ = match &mut self.writer {
            WriteHalf::Plain(w) => w.shutdown().await,
            WriteHalf::Tls(w) => w.shutdown().await,
        };
    }

    fn log(&self, line: &str) {
        if self.debug {
            log::debug!("{}", line);
        } else {
            log::trace!("{}", line);
        }
    }
}

/// Fail with a protocol error carrying the raw reply unless its code is `expected`.
pub fn check_code(resp: FtpResponse, expected: u16) -> FtpResult<FtpResponse> {
    if resp.code != expected {
        return Err(FtpError::protocol(resp.code, resp.text()));
    }
    Ok(resp)
}

/// Extract the reply code from a line and report whether it opens a
/// multi-line block.
///
/// `"220 Ready"` → `(220, false)`, `"211-Features:"` → `(211, true)`.
/// Lines without a leading three-digit code fail with `NoStatusCode`.
pub fn parse_status_line(line: &str) -> FtpResult<(u16, bool)> {
    let trimmed = line.trim_matches(|c| c == ' ' || c == '\r' || c == '\n');
    let first = trimmed
        .split_whitespace()
        .next()
        .ok_or_else(|| FtpError::no_status_code(line))?;

    if first.len() == 3 {
        if let Some(code) = parse_digits(first) {
            return Ok((code, false));
        }
    } else if first.len() == 4 && first.ends_with('-') {
        if let Some(code) = first.get(..3).and_then(parse_digits) {
            return Ok((code, true));
        }
    } else if trimmed.as_bytes().get(3) == Some(&b'-') {
        if let Some(code) = trimmed.get(..3).and_then(parse_digits) {
            return Ok((code, true));
        }
    }
    Err(FtpError::no_status_code(line))
}

fn parse_digits(s: &str) -> Option<u16> {
    if s.len() == 3 && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

/// Read one reply from `reader`.
///
/// Multi-line replies look like:
/// ```text
/// 220-Welcome to my FTP server
///  some continuation text
/// 220 End of greeting
/// ```
/// Inside a block, only a line starting with the opening code followed by
/// a space closes the reply; anything else is kept verbatim as a
/// continuation.
pub async fn read_reply<R>(reader: &mut BufReader<R>, discard: bool) -> FtpResult<FtpResponse>
where
    R: AsyncRead + Unpin,
{
    let first = read_line_raw(reader).await?;
    let parsed = parse_status_line(&first);

    let result = match parsed {
        Ok((code, multiline)) => {
            let mut lines = vec![first];
            if multiline {
                let code_str = format!("{:03}", code);
                let terminator = format!("{} ", code_str);
                loop {
                    let next = read_line_raw(reader).await?;
                    let closes = next.starts_with(&terminator) || next == code_str;
                    lines.push(next);
                    if closes {
                        break;
                    }
                }
            }
            Ok(FtpResponse {
                code,
                lines,
                multiline,
            })
        }
        Err(e) => Err(e),
    };

    if discard {
        let dropped = discard_buffered(reader);
        if dropped > 0 {
            log::debug!("discarded {} trailing bytes after reply", dropped);
        }
    }
    result
}

/// Drop everything currently sitting in the read buffer.
pub fn discard_buffered<R>(reader: &mut BufReader<R>) -> usize
where
    R: AsyncRead + Unpin,
{
    let n = reader.buffer().len();
    reader.consume(n);
    n
}

/// Read a single line with the line terminator stripped.
async fn read_line_raw<R>(reader: &mut BufReader<R>) -> FtpResult<String>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Err(FtpError::disconnected("Server closed connection"));
    }
    let line = String::from_utf8_lossy(&buf);
    Ok(line.trim_end_matches(|c| c == '\r' || c == '\n').to_string())
}

fn mask_secret(cmd: &str) -> String {
    if cmd.get(..5).map_or(false, |p| p.eq_ignore_ascii_case("PASS ")) {
        "PASS ****".to_string()
    } else {
        cmd.to_string()
    }
}
