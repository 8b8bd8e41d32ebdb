//! Conflict recovery for mirrors whose pull failed
//!
//! The transaction moves the diverged mirror aside, clones a fresh copy in
//! its place and puts the old copy back if the clone fails:
//!
//! ```text
//! Stable --rename--> Staging --clone ok--> Committed
//!                       |
//!                       +--clone failed--> rename back ok ---> RolledBack
//!                                          rename back failed -> Broken
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::git::GitOps;

/// Suffix appended to a mirror directory while it is moved aside
pub const CONFLICT_SUFFIX: &str = "_conflict";

/// Rollback failed: the mirror is missing and the old copy sits at `conflict_path`
#[derive(Debug, Clone, Error)]
#[error(
    "failed to restore {} to {} after clone failure ({clone_error}): {rollback_error}",
    conflict_path.display(),
    path.display()
)]
pub struct ConflictRecoveryError {
    pub path: PathBuf,
    pub conflict_path: PathBuf,
    pub clone_error: String,
    pub rollback_error: String,
}

/// Terminal state of a recovery transaction
#[derive(Debug)]
pub enum RecoveryOutcome {
    /// Mirror could not be moved aside and was left untouched
    Stable { error: String },
    /// Fresh clone in place, previous copy kept at `conflict_path`
    Committed { conflict_path: PathBuf },
    /// Clone failed and the previous copy was restored
    RolledBack { conflict_path: PathBuf, error: String },
    /// Clone failed and the previous copy could not be restored
    Broken(ConflictRecoveryError),
}

/// `<path>_conflict`
pub fn conflict_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(CONFLICT_SUFFIX);
    PathBuf::from(name)
}

/// Replace the mirror at `path` with a fresh clone of `url`
pub async fn recover<G: GitOps + ?Sized>(git: &G, url: &str, path: &Path) -> RecoveryOutcome {
    let conflict_path = conflict_path(path);

    // Stable -> Staging
    if tokio::fs::try_exists(&conflict_path).await.unwrap_or(true) {
        return RecoveryOutcome::Stable {
            error: format!("{} already exists", conflict_path.display()),
        };
    }
    if let Err(e) = tokio::fs::rename(path, &conflict_path).await {
        return RecoveryOutcome::Stable {
            error: format!(
                "failed to move {} to {}: {}",
                path.display(),
                conflict_path.display(),
                e
            ),
        };
    }
    info!("Moved {} aside due to conflict", path.display());

    let clone_error = match git.clone_repo(url, path).await {
        Ok(()) => {
            info!("Overwritten {}", path.display());
            return RecoveryOutcome::Committed { conflict_path };
        }
        Err(e) => format!("{:#}", e),
    };

    warn!("Failed to clone {}, reverting: {}", path.display(), clone_error);

    match tokio::fs::rename(&conflict_path, path).await {
        Ok(()) => RecoveryOutcome::RolledBack {
            conflict_path,
            error: clone_error,
        },
        Err(e) => {
            let err = ConflictRecoveryError {
                path: path.to_path_buf(),
                conflict_path,
                clone_error,
                rollback_error: e.to_string(),
            };
            error!("{}", err);
            RecoveryOutcome::Broken(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::PullOutcome;
    use anyhow::{anyhow, Result};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Clone double that writes a marker, fails, or fails after leaving debris
    enum FakeClone {
        Succeed,
        Fail,
        FailLeavingDebris,
    }

    #[async_trait]
    impl GitOps for FakeClone {
        async fn clone_repo(&self, _url: &str, path: &Path) -> Result<()> {
            match self {
                FakeClone::Succeed => {
                    std::fs::create_dir_all(path.join(".git"))?;
                    std::fs::write(path.join("fresh"), "clone")?;
                    Ok(())
                }
                FakeClone::Fail => Err(anyhow!("remote hung up")),
                FakeClone::FailLeavingDebris => {
                    std::fs::create_dir_all(path.join(".git"))?;
                    std::fs::write(path.join(".git/partial"), "x")?;
                    Err(anyhow!("remote hung up mid transfer"))
                }
            }
        }

        async fn pull(&self, _path: &Path) -> Result<PullOutcome> {
            unreachable!("recovery never pulls")
        }

        async fn origin_url(&self, _path: &Path) -> Result<Option<String>> {
            unreachable!("recovery never reads remotes")
        }

        async fn replace_origin(&self, _: &Path, _: Option<&str>, _: &str) -> Result<()> {
            unreachable!("recovery never writes remotes")
        }
    }

    fn mirror(root: &Path) -> PathBuf {
        let path = root.join("group/project");
        std::fs::create_dir_all(path.join(".git")).unwrap();
        std::fs::write(path.join("local"), "diverged").unwrap();
        path
    }

    #[test]
    fn test_conflict_path() {
        assert_eq!(
            conflict_path(Path::new("/srv/mirrors/a/b")),
            PathBuf::from("/srv/mirrors/a/b_conflict")
        );
    }

    #[tokio::test]
    async fn test_commit_keeps_previous_copy() {
        let temp_dir = TempDir::new().unwrap();
        let path = mirror(temp_dir.path());

        let outcome = recover(&FakeClone::Succeed, "https://example.com/p.git", &path).await;

        let kept = assert_matches!(outcome, RecoveryOutcome::Committed { conflict_path } => conflict_path);
        assert!(path.join("fresh").exists());
        assert!(kept.join("local").exists());
    }

    #[tokio::test]
    async fn test_rollback_restores_mirror() {
        let temp_dir = TempDir::new().unwrap();
        let path = mirror(temp_dir.path());

        let outcome = recover(&FakeClone::Fail, "https://example.com/p.git", &path).await;

        assert_matches!(outcome, RecoveryOutcome::RolledBack { ref error, .. } if error.contains("remote hung up"));
        assert_eq!(std::fs::read_to_string(path.join("local")).unwrap(), "diverged");
        assert!(!conflict_path(&path).exists());
    }

    #[tokio::test]
    async fn test_failed_rollback_is_broken() {
        let temp_dir = TempDir::new().unwrap();
        let path = mirror(temp_dir.path());

        let outcome = recover(&FakeClone::FailLeavingDebris, "https://example.com/p.git", &path).await;

        let err = assert_matches!(outcome, RecoveryOutcome::Broken(err) => err);
        assert_eq!(err.path, path);
        assert_eq!(err.conflict_path, conflict_path(&path));
        assert!(err.conflict_path.join("local").exists());
        let message = err.to_string();
        assert!(message.contains("project_conflict"));
        assert!(message.contains("mid transfer"));
    }

    #[tokio::test]
    async fn test_existing_conflict_dir_blocks_staging() {
        let temp_dir = TempDir::new().unwrap();
        let path = mirror(temp_dir.path());
        std::fs::create_dir_all(conflict_path(&path)).unwrap();

        let outcome = recover(&FakeClone::Succeed, "https://example.com/p.git", &path).await;

        assert_matches!(outcome, RecoveryOutcome::Stable { .. });
        assert!(path.join("local").exists());
        assert!(!path.join("fresh").exists());
    }
}
