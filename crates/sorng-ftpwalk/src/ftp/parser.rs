//! LIST / MLSD response parsers.
//!
//! Two wire formats are normalised:
//! 1. **MLSD facts** (RFC 3659): `type=file;size=1234;modify=20260101120000; file.txt`
//! 2. **Unix-style** (`ls -l`): `-rwxr-xr-x 1 owner group 1234 Jan  1 12:00 file.txt`
//!
//! Each parser splits the entries into files, directories and symlinks.

use crate::ftp::types::{FtpEntryKind, ListEntry, Listing};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UNIX_LINE: Regex = Regex::new(
        r"(?x)
        ^([-dl])                         # type flag
        ([rwxsStT-]{9})[+@.]?\s+         # permission bits
        (\d+)\s+                         # link count
        (\S+)\s+                         # owner
        (\S+)\s+                         # group
        (\d+)\s+                         # size
        (\w{3}\s+\d{1,2}\s+(?:\d{1,2}:\d{2}|\d{4}))\s+   # date or time of day
        (.+)$                            # name (possibly with -> target)
        ",
    )
    .expect("valid unix listing regex");
}

// ─── MLSD parser ─────────────────────────────────────────────────────

/// Parse MLSD lines listed under `base`.
///
/// `.`/`..` and the `cdir`/`pdir` self-references are dropped, as are
/// lines without a usable `type` fact.
pub fn parse_mlsd<S: AsRef<str>>(base: &str, lines: &[S]) -> Listing {
    let mut listing = Listing::default();
    for line in lines {
        if let Some(entry) = parse_mlsd_line(base, line.as_ref()) {
            listing.push(entry);
        }
    }
    listing
}

/// Parse MLSD fact-line: `fact1=val1;fact2=val2; filename`
fn parse_mlsd_line(base: &str, line: &str) -> Option<ListEntry> {
    let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
    // Facts never contain spaces; the name is everything after the first one.
    let (facts, name) = line.split_once(' ')?;
    if name.is_empty() {
        return None;
    }

    let mut kind = None;
    let mut target = None;
    let mut size = None;
    let mut modified = None;
    let mut perm = None;
    let mut mode = None;

    for fact in facts.split(';') {
        let Some((key, value)) = fact.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "type" => {
                let value = value.to_ascii_lowercase();
                kind = match value.as_str() {
                    "file" => Some(FtpEntryKind::File),
                    "dir" => Some(FtpEntryKind::Directory),
                    "cdir" | "pdir" => return None,
                    "os.unix=symlink" => Some(FtpEntryKind::Symlink),
                    v if v.starts_with("os.unix=slink") => {
                        // Original case is kept for the target path.
                        target = fact
                            .split_once(':')
                            .map(|(_, t)| t.to_string())
                            .filter(|t| !t.is_empty());
                        Some(FtpEntryKind::Symlink)
                    }
                    _ => None,
                };
            }
            "size" | "sizd" => size = value.parse::<u64>().ok(),
            "modify" => modified = parse_mlsd_time(value),
            "perm" => perm = Some(value.to_string()),
            "unix.mode" => mode = Some(value.to_string()),
            _ => {}
        }
    }

    let kind = kind?;
    if kind == FtpEntryKind::Directory && (name == "." || name == "..") {
        return None;
    }

    let mut entry = ListEntry::new(base, name, kind);
    entry.target = target;
    entry.size = size;
    entry.modified = modified;
    entry.permissions = mode.or(perm);
    Some(entry)
}

/// Parse MLSD timestamp: `YYYYMMDDHHmmSS[.fraction]`
fn parse_mlsd_time(s: &str) -> Option<DateTime<Utc>> {
    let base = s.get(..14)?;
    NaiveDateTime::parse_from_str(base, "%Y%m%d%H%M%S")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

// ─── Unix-style parser ───────────────────────────────────────────────

/// Parse Unix `ls -l` lines listed under `base`:
/// ```text
/// drwxr-xr-x   2 user group  4096 Jan  1 12:00 dirname
/// -rw-r--r--   1 user group  1234 Jan  1  2025 file.txt
/// lrwxrwxrwx   1 user group    42 Jan  1 12:00 link -> target
/// ```
/// Lines that do not match (`total 12`, device files, other formats) are
/// skipped, so an unrecognised format yields an empty listing.
pub fn parse_unix<S: AsRef<str>>(base: &str, lines: &[S]) -> Listing {
    let mut listing = Listing::default();
    for line in lines {
        if let Some(entry) = parse_unix_line(base, line.as_ref()) {
            listing.push(entry);
        }
    }
    listing
}

fn parse_unix_line(base: &str, line: &str) -> Option<ListEntry> {
    let caps = UNIX_LINE.captures(line.trim_end())?;

    let kind = match caps.get(1)?.as_str() {
        "d" => FtpEntryKind::Directory,
        "l" => FtpEntryKind::Symlink,
        _ => FtpEntryKind::File,
    };
    let perms = caps.get(2)?.as_str();
    let size = caps.get(6)?.as_str().parse::<u64>().ok();
    let date_str = caps.get(7)?.as_str();
    let name_raw = caps.get(8)?.as_str();

    let (name, target) = match (kind, name_raw.split_once("->")) {
        (FtpEntryKind::Symlink, Some((name, target))) => {
            (name.trim(), Some(target.trim().to_string()))
        }
        _ => (name_raw, None),
    };
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }

    let mut entry = ListEntry::new(base, name, kind);
    entry.target = target;
    entry.size = size;
    entry.modified = parse_unix_date(date_str, Utc::now());
    entry.permissions = Some(perms.to_string());
    Some(entry)
}

/// Parse the date portion: "Jan  1 12:00" or "Jan  1  2025".
///
/// The time-of-day form omits the year: it is the most recent such date
/// not more than a day ahead of `now`.
fn parse_unix_date(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let normalised = s.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalised.contains(':') {
        let year = now.year();
        let dt = NaiveDateTime::parse_from_str(
            &format!("{} {}", year, normalised),
            "%Y %b %d %H:%M",
        )
        .ok()?;
        let dt = Utc.from_utc_datetime(&dt);
        if dt > now + Duration::days(1) {
            let earlier = NaiveDateTime::parse_from_str(
                &format!("{} {}", year - 1, normalised),
                "%Y %b %d %H:%M",
            )
            .ok()?;
            return Some(Utc.from_utc_datetime(&earlier));
        }
        return Some(dt);
    }

    let date = NaiveDate::parse_from_str(&normalised, "%b %d %Y").ok()?;
    Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::from_hms_opt(0, 0, 0)?)))
}
