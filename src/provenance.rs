//! Provenance stamping
//!
//! The specification folder normally sits at the top of a git checkout; the
//! checked-out commit is recorded in the index so consumers know which
//! revision it describes.

use std::path::Path;

use git2::{ErrorCode, Repository};
use tracing::debug;

use crate::error::Result;

/// Commit id of the repository containing `spec_root`.
///
/// Opens the parent of `spec_root` as a repository. A parent that is not a
/// repository yields an empty string; any other git failure is an error.
pub fn commit_for(spec_root: &Path) -> Result<String> {
    let Some(repo_dir) = spec_root.parent() else {
        return Ok(String::new());
    };

    let repo = match Repository::open(repo_dir) {
        Ok(repo) => repo,
        Err(e) if e.code() == ErrorCode::NotFound => {
            debug!(dir = %repo_dir.display(), "not a git repository, commit left empty");
            return Ok(String::new());
        }
        Err(e) => return Err(e.into()),
    };

    let head = repo.head()?;
    let commit = head.peel_to_commit()?;
    Ok(commit.id().to_string())
}
