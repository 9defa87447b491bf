//! Single-command wrappers: CWD, PWD, MKD, RMD, DELE, RNFR/RNTO, SIZE, ...
//!
//! Each one is an `execute` call with a fixed expected reply code.

use crate::ftp::client::FtpSession;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::status;
use crate::ftp::types::TransferType;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref QUOTED_PATH: Regex = Regex::new(r#""((?:[^"]|"")*)""#).expect("valid path regex");
}

impl FtpSession {
    // ─── CWD / CDUP / PWD ────────────────────────────────────────

    pub async fn cwd(&mut self, path: &str) -> FtpResult<()> {
        self.execute(status::FILE_ACTION_OK, &format!("CWD {}", path))
            .await?;
        Ok(())
    }

    pub async fn cdup(&mut self) -> FtpResult<()> {
        self.execute(status::FILE_ACTION_OK, "CDUP").await?;
        Ok(())
    }

    /// Current remote directory.
    pub async fn pwd(&mut self) -> FtpResult<String> {
        let resp = self.execute(status::PATHNAME_CREATED, "PWD").await?;
        parse_quoted_path(&resp.text())
    }

    // ─── MKD / RMD ───────────────────────────────────────────────

    /// Create a directory; returns the path the server reports.
    pub async fn mkd(&mut self, path: &str) -> FtpResult<String> {
        let resp = self
            .execute(status::PATHNAME_CREATED, &format!("MKD {}", path))
            .await?;
        Ok(parse_quoted_path(&resp.text()).unwrap_or_else(|_| path.to_string()))
    }

    pub async fn rmd(&mut self, path: &str) -> FtpResult<()> {
        self.execute(status::FILE_ACTION_OK, &format!("RMD {}", path))
            .await?;
        Ok(())
    }

    // ─── DELE / RNFR+RNTO ────────────────────────────────────────

    pub async fn dele(&mut self, path: &str) -> FtpResult<()> {
        self.execute(status::FILE_ACTION_OK, &format!("DELE {}", path))
            .await?;
        Ok(())
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> FtpResult<()> {
        self.execute(status::FILE_ACTION_PENDING, &format!("RNFR {}", from))
            .await?;
        self.execute(status::FILE_ACTION_OK, &format!("RNTO {}", to))
            .await?;
        Ok(())
    }

    // ─── SIZE / SYST / TYPE / NOOP / STAT ────────────────────────

    /// Size of a remote file (RFC 3659 SIZE).
    pub async fn size(&mut self, path: &str) -> FtpResult<u64> {
        let resp = self
            .execute(status::FILE_STATUS, &format!("SIZE {}", path))
            .await?;
        // "213 12345"
        resp.message()
            .parse::<u64>()
            .map_err(|_| FtpError::protocol_error(format!("Cannot parse SIZE: {}", resp.text())))
    }

    /// System name from `SYST`, e.g. `UNIX Type: L8`.
    pub async fn syst(&mut self) -> FtpResult<String> {
        let resp = self.execute(status::SYSTEM_TYPE, "SYST").await?;
        Ok(resp.message().to_string())
    }

    pub async fn set_type(&mut self, tt: TransferType) -> FtpResult<()> {
        self.execute(status::COMMAND_OK, &format!("TYPE {}", tt.code()))
            .await?;
        Ok(())
    }

    pub async fn noop(&mut self) -> FtpResult<()> {
        self.execute(status::COMMAND_OK, "NOOP").await?;
        Ok(())
    }

    /// `STAT [path]`; returns the body lines between the opening and
    /// closing status lines.
    pub async fn stat(&mut self, path: Option<&str>) -> FtpResult<Vec<String>> {
        let cmd = match path {
            Some(p) => format!("STAT {}", p),
            None => "STAT".to_string(),
        };
        let resp = self.raw_command(&cmd).await?;
        if !matches!(
            resp.code,
            status::SYSTEM_STATUS | status::DIRECTORY_STATUS | status::FILE_STATUS
        ) {
            return Err(FtpError::protocol(resp.code, resp.text()));
        }
        if !resp.multiline {
            return Ok(vec![resp.message().to_string()]);
        }
        let body = &resp.lines[1..resp.lines.len().saturating_sub(1).max(1)];
        Ok(body.iter().map(|l| l.trim().to_string()).collect())
    }
}

/// Parse `257 "/some/path" text` into the path, undoubling embedded quotes.
fn parse_quoted_path(text: &str) -> FtpResult<String> {
    QUOTED_PATH
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace("\"\"", "\""))
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse path reply: {}", text)))
}
