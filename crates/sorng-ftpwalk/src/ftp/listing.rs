//! Directory listing retrieval over the passive-data idiom.
//!
//! PASV → send command → opening reply → drain data socket → close it →
//! closing reply.

use crate::ftp::client::FtpSession;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::features::ListingFormat;
use crate::ftp::status;
use crate::ftp::transfer::{self, OpenTransfer, RefusalMapper};
use crate::ftp::types::{FtpResponse, Listing};

/// 550 on the opening reply is `PathUnavailable`; anything else is a
/// generic listing failure.
fn listing_refused(resp: &FtpResponse) -> FtpError {
    if resp.code == status::FILE_UNAVAILABLE {
        FtpError::path_unavailable(resp.text())
    } else {
        FtpError::listing_failed(resp.code, resp.text())
    }
}

fn listing_truncated(resp: &FtpResponse) -> FtpError {
    FtpError::listing_failed(resp.code, resp.text())
}

fn command_failed(resp: &FtpResponse) -> FtpError {
    FtpError::protocol(resp.code, resp.text())
}

/// Empty or blank paths list the current directory.
fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        "."
    } else {
        trimmed
    }
}

impl FtpSession {
    /// List `path` with the best format the server supports.
    pub async fn get_listing(&mut self, path: &str) -> FtpResult<Listing> {
        let caps = self.capabilities().await?;
        self.list_with(ListingFormat::select(caps), path).await
    }

    /// List `path` with an explicit format.
    ///
    /// Formats without a parser fail before any data channel is opened.
    pub async fn list_with(&mut self, format: ListingFormat, path: &str) -> FtpResult<Listing> {
        format.ensure_supported()?;
        let path = normalize_path(path);
        let (_, lines) = self
            .retrieve_lines(&format.command(path), listing_refused, listing_truncated)
            .await?;
        let listing = format.parse(path, &lines, self.config.debug)?;
        log::trace!(
            "[ftp:{}] {} {}: {} files, {} dirs, {} links",
            self.id,
            format,
            path,
            listing.files.len(),
            listing.directories.len(),
            listing.symlinks.len()
        );
        Ok(listing)
    }

    /// Unparsed `LIST` output for `path`.
    pub async fn list_raw(&mut self, path: &str) -> FtpResult<Vec<String>> {
        let cmd = ListingFormat::List.command(normalize_path(path));
        let (_, lines) = self
            .retrieve_lines(&cmd, listing_refused, listing_truncated)
            .await?;
        Ok(lines)
    }

    /// Run `cmd` over a data channel and return the closing reply code
    /// together with every line received.
    pub async fn raw_passive_command(&mut self, cmd: &str) -> FtpResult<(u16, Vec<String>)> {
        let (closing, lines) = self
            .retrieve_lines(cmd, command_failed, command_failed)
            .await?;
        Ok((closing.code, lines))
    }

    async fn retrieve_lines(
        &mut self,
        cmd: &str,
        refused: RefusalMapper,
        truncated: RefusalMapper,
    ) -> FtpResult<(FtpResponse, Vec<String>)> {
        let OpenTransfer { data, opening } = self.start_transfer(cmd, refused).await?;
        // The data socket is consumed and closed here, before the closing reply.
        let lines = match transfer::read_lines(data).await {
            Ok(lines) => lines,
            Err(e) => return Err(self.abort_transfer(&opening, e).await),
        };
        let closing = self.finish_transfer(&opening, truncated).await?;
        Ok((closing, lines))
    }
}
