//! File transfers: RETR into any `AsyncWrite`, STOR from any `AsyncRead`.

use crate::ftp::client::FtpSession;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::status;
use crate::ftp::transfer;
use crate::ftp::types::{FtpResponse, TransferType};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

fn transfer_refused(resp: &FtpResponse) -> FtpError {
    if resp.code == status::FILE_UNAVAILABLE {
        FtpError::path_unavailable(resp.text())
    } else {
        FtpError::protocol(resp.code, resp.text())
    }
}

fn transfer_failed(resp: &FtpResponse) -> FtpError {
    FtpError::protocol(resp.code, resp.text())
}

impl FtpSession {
    // ─── DOWNLOAD (RETR) ─────────────────────────────────────────

    /// Download `path` into `writer` in binary mode; returns bytes copied.
    pub async fn retrieve<W>(&mut self, path: &str, writer: &mut W) -> FtpResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        self.set_type(TransferType::Binary).await?;
        let mut open = self
            .start_transfer(&format!("RETR {}", path), transfer_refused)
            .await?;

        let copied = transfer::copy_from_data(&mut open.data, writer).await;
        drop(open.data);
        let copied = match copied {
            Ok(n) => n,
            Err(e) => return Err(self.abort_transfer(&open.opening, e).await),
        };

        self.finish_transfer(&open.opening, transfer_failed).await?;
        log::debug!("[ftp:{}] RETR {} ({} bytes)", self.id, path, copied);
        Ok(copied)
    }

    // ─── UPLOAD (STOR) ───────────────────────────────────────────

    /// Upload everything `reader` yields to `path` in binary mode; returns
    /// bytes sent.
    pub async fn store<R>(&mut self, path: &str, reader: &mut R) -> FtpResult<u64>
    where
        R: AsyncRead + Unpin,
    {
        self.set_type(TransferType::Binary).await?;
        let mut open = self
            .start_transfer(&format!("STOR {}", path), transfer_refused)
            .await?;

        let sent = async {
            let n = tokio::io::copy(reader, &mut open.data).await?;
            open.data.shutdown().await?;
            Ok::<u64, std::io::Error>(n)
        }
        .await;
        drop(open.data);
        let sent = match sent {
            Ok(n) => n,
            Err(e) => return Err(self.abort_transfer(&open.opening, e.into()).await),
        };

        self.finish_transfer(&open.opening, transfer_failed).await?;
        log::debug!("[ftp:{}] STOR {} ({} bytes)", self.id, path, sent);
        Ok(sent)
    }
}
