//! Recursive, depth-bounded directory walker.
//!
//! Pre-order: every file of a directory is visited before any of its
//! subdirectories is entered, and subdirectories are entered in listing
//! order. Symlinks are not followed.

use serde::{Deserialize, Serialize};

use crate::ftp::client::FtpSession;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::ListEntry;

/// A failure handed to the walk's error policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkError {
    pub path: String,
    /// Reply code behind the failure, 0 when there is none.
    pub code: u16,
    pub message: String,
    /// Permission/availability failures that walkers usually step over.
    pub skippable: bool,
}

impl WalkError {
    pub fn new(path: &str, err: &FtpError) -> Self {
        Self {
            path: path.to_string(),
            code: err.status_code(),
            message: err.message.clone(),
            skippable: err.is_skippable(),
        }
    }
}

type NoPolicy = fn(&WalkError) -> FtpResult<bool>;

impl FtpSession {
    /// Walk `path` and abort on the first error.
    ///
    /// `depth` counts directory levels including `path` itself; `None` is
    /// unbounded. Branches cut off by the bound end silently.
    pub async fn walk<V>(&mut self, path: &str, depth: Option<u32>, mut visit: V) -> FtpResult<()>
    where
        V: FnMut(&ListEntry) -> FtpResult<()>,
    {
        let mut policy: Option<NoPolicy> = None;
        self.walk_dir(path, start_depth(depth), &mut visit, &mut policy)
            .await
    }

    /// Walk `path`, consulting `policy` on every failure.
    ///
    /// The policy sees listing errors, `visit` errors and directories cut
    /// off by the depth bound (`DepthExceeded`). `Ok(true)` continues past
    /// the failing node, `Ok(false)` aborts with the original error and
    /// `Err` aborts with the policy's own error.
    pub async fn walk_custom<V, P>(
        &mut self,
        path: &str,
        depth: Option<u32>,
        mut visit: V,
        policy: P,
    ) -> FtpResult<()>
    where
        V: FnMut(&ListEntry) -> FtpResult<()>,
        P: FnMut(&WalkError) -> FtpResult<bool>,
    {
        let mut policy = Some(policy);
        self.walk_dir(path, start_depth(depth), &mut visit, &mut policy)
            .await
    }

    async fn walk_dir<V, P>(
        &mut self,
        path: &str,
        depth: Option<u32>,
        visit: &mut V,
        policy: &mut Option<P>,
    ) -> FtpResult<()>
    where
        V: FnMut(&ListEntry) -> FtpResult<()>,
        P: FnMut(&WalkError) -> FtpResult<bool>,
    {
        let listing = match self.get_listing(path).await {
            Ok(listing) => listing,
            Err(e) => return consult(policy, path, e),
        };

        for file in &listing.files {
            if let Err(e) = visit(file) {
                consult(policy, &file.path, e)?;
            }
        }

        for dir in &listing.directories {
            match depth {
                Some(remaining) if remaining <= 1 => {
                    if policy.is_some() {
                        consult(policy, &dir.path, FtpError::depth_exceeded(&dir.path))?;
                    } else {
                        log::trace!("[ftp:{}] depth bound stops at {}", self.id, dir.path);
                    }
                }
                _ => {
                    let next = depth.map(|d| d - 1);
                    Box::pin(self.walk_dir(&dir.path, next, visit, policy)).await?;
                }
            }
        }
        Ok(())
    }
}

/// `Some(0)` lists the starting directory just like `Some(1)`.
fn start_depth(depth: Option<u32>) -> Option<u32> {
    depth.map(|d| d.max(1))
}

/// Apply the error policy: strict mode without one.
fn consult<P>(policy: &mut Option<P>, path: &str, err: FtpError) -> FtpResult<()>
where
    P: FnMut(&WalkError) -> FtpResult<bool>,
{
    let Some(policy) = policy.as_mut() else {
        return Err(err);
    };
    let report = WalkError::new(path, &err);
    if policy(&report)? {
        log::debug!("skipping {}: {}", path, err);
        Ok(())
    } else {
        Err(err)
    }
}
