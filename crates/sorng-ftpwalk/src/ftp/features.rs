//! FEAT capability discovery (RFC 2389) and listing-format dispatch.

use std::fmt;
use std::ops::BitOr;

use crate::ftp::client::FtpSession;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::parser;
use crate::ftp::types::Listing;

/// Listing extensions advertised by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    /// No listing extension; only `LIST` can be used.
    pub const LEGACY_ONLY: Capabilities = Capabilities(0);
    /// Structured facts (`MLST`/`MLSD`, RFC 3659).
    pub const MLSD: Capabilities = Capabilities(1);
    /// Name-only listing.
    pub const NLST: Capabilities = Capabilities(1 << 1);
    /// Easily Parsed LIST Format.
    pub const EPLF: Capabilities = Capabilities(1 << 2);

    pub fn contains(self, other: Capabilities) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Capabilities) {
        self.0 |= other.0;
    }

    pub fn is_legacy_only(self) -> bool {
        self.0 == 0
    }

    /// Scan FEAT reply lines for listing markers.
    ///
    /// Matching is by substring since servers format the feature list
    /// loosely.
    pub fn from_feat_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut caps = Capabilities::LEGACY_ONLY;
        for line in lines {
            let line = line.as_ref().to_ascii_uppercase();
            if line.contains("MLST") || line.contains("MLSD") {
                caps.insert(Capabilities::MLSD);
            }
            if line.contains("NLST") {
                caps.insert(Capabilities::NLST);
            }
            if line.contains("EPLF") {
                caps.insert(Capabilities::EPLF);
            }
        }
        caps
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

/// Wire format of a directory listing, one per listing command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFormat {
    Mlsd,
    Eplf,
    Nlst,
    List,
}

impl ListingFormat {
    /// Highest-fidelity format the server supports.
    pub fn select(caps: Capabilities) -> Self {
        if caps.contains(Capabilities::MLSD) {
            ListingFormat::Mlsd
        } else if caps.contains(Capabilities::EPLF) {
            ListingFormat::Eplf
        } else if caps.contains(Capabilities::NLST) {
            ListingFormat::Nlst
        } else {
            ListingFormat::List
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ListingFormat::Mlsd => "MLSD",
            ListingFormat::Eplf => "EPLF",
            ListingFormat::Nlst => "NLST",
            ListingFormat::List => "LIST",
        }
    }

    /// Listing command for `path`.
    pub fn command(self, path: &str) -> String {
        match self {
            ListingFormat::Eplf => format!("LIST {}", path),
            other => format!("{} {}", other.name(), path),
        }
    }

    /// Fail with `UnsupportedFormat` for formats without a parser.
    pub fn ensure_supported(self) -> FtpResult<()> {
        match self {
            ListingFormat::Mlsd | ListingFormat::List => Ok(()),
            other => Err(FtpError::unsupported_format(other.name())),
        }
    }

    /// Normalise raw listing lines into entries under `base`.
    pub fn parse(self, base: &str, lines: &[String], debug: bool) -> FtpResult<Listing> {
        match self {
            ListingFormat::Mlsd => Ok(parser::parse_mlsd(base, lines)),
            ListingFormat::List => {
                let listing = parser::parse_unix(base, lines);
                if debug && listing.is_empty() && !lines.is_empty() {
                    log::debug!(
                        "{}: empty folder or unrecognised listing format ({} lines)",
                        base,
                        lines.len()
                    );
                }
                Ok(listing)
            }
            other => Err(FtpError::unsupported_format(other.name())),
        }
    }
}

impl fmt::Display for ListingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FtpSession {
    /// Listing capabilities, probed with `FEAT` on first use.
    ///
    /// A non-2xx reply degrades to `LEGACY_ONLY` instead of failing.
    pub async fn capabilities(&mut self) -> FtpResult<Capabilities> {
        if let Some(caps) = self.capabilities {
            return Ok(caps);
        }

        let resp = self.raw_command("FEAT").await?;
        let caps = if resp.is_completion() {
            Capabilities::from_feat_lines(&resp.lines)
        } else {
            log::debug!(
                "[ftp:{}] FEAT refused ({}); using LIST only",
                self.id,
                resp.code
            );
            Capabilities::LEGACY_ONLY
        };
        self.capabilities = Some(caps);
        Ok(caps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftp::error::FtpErrorKind;
    use crate::ftp::testutil::{Feat, FakeServer};

    #[test]
    fn feat_lines_set_bits() {
        let caps = Capabilities::from_feat_lines(&[
            "211-Features:",
            " MDTM",
            " MLST type*;size*;modify*;",
            " nlst",
            "211 End",
        ]);
        assert!(caps.contains(Capabilities::MLSD));
        assert!(caps.contains(Capabilities::NLST));
        assert!(!caps.contains(Capabilities::EPLF));
        assert_eq!(caps, Capabilities::MLSD | Capabilities::NLST);
    }

    #[test]
    fn no_markers_is_legacy_only() {
        let caps = Capabilities::from_feat_lines(&["211-Features:", " SIZE", "211 End"]);
        assert!(caps.is_legacy_only());
        assert!(!caps.contains(Capabilities::LEGACY_ONLY));
    }

    #[test]
    fn unrecognised_list_output_is_an_empty_listing() {
        let lines = vec![
            "total 0".to_string(),
            "+i8388621.29609,m824255902,/,\tdev".to_string(),
        ];
        let listing = ListingFormat::List.parse("/pub", &lines, true).unwrap();
        assert!(listing.is_empty());
        let listing = ListingFormat::List.parse("/pub", &lines, false).unwrap();
        assert!(listing.is_empty());
    }

    #[test]
    fn selection_prefers_highest_fidelity() {
        let all = Capabilities::MLSD | Capabilities::NLST | Capabilities::EPLF;
        assert_eq!(ListingFormat::select(all), ListingFormat::Mlsd);
        assert_eq!(
            ListingFormat::select(Capabilities::EPLF | Capabilities::NLST),
            ListingFormat::Eplf
        );
        assert_eq!(ListingFormat::select(Capabilities::NLST), ListingFormat::Nlst);
        assert_eq!(
            ListingFormat::select(Capabilities::LEGACY_ONLY),
            ListingFormat::List
        );
    }

    #[test]
    fn stub_formats_are_unsupported() {
        for format in [ListingFormat::Eplf, ListingFormat::Nlst] {
            let err = format.ensure_supported().unwrap_err();
            assert_eq!(err.kind, FtpErrorKind::UnsupportedFormat);
            let err = format.parse("/", &["x".to_string()], false).unwrap_err();
            assert_eq!(err.kind, FtpErrorKind::UnsupportedFormat);
        }
        assert!(ListingFormat::Mlsd.ensure_supported().is_ok());
        assert_eq!(ListingFormat::List.command("/pub"), "LIST /pub");
    }

    #[tokio::test]
    async fn capabilities_are_probed_once() {
        let server = FakeServer::builder().feat(Feat::Mlsd).start().await;
        let mut session = FtpSession::connect(server.config()).await.unwrap();
        let first = session.capabilities().await.unwrap();
        let second = session.capabilities().await.unwrap();
        assert_eq!(first, Capabilities::MLSD);
        assert_eq!(first, second);
        let feats = server.commands().iter().filter(|c| *c == "FEAT").count();
        assert_eq!(feats, 1);
    }

    #[tokio::test]
    async fn refused_feat_degrades_to_legacy() {
        let server = FakeServer::builder().feat(Feat::Refused).start().await;
        let mut session = FtpSession::connect(server.config()).await.unwrap();
        let caps = session.capabilities().await.unwrap();
        assert!(caps.is_legacy_only());
    }
}
