//! Sync Reconciler - brings the mirror tree in line with the catalog
//!
//! Repositories are processed one after another in catalog order. Each one is
//! cloned when its target directory is absent and pulled otherwise; a failed
//! pull either becomes a per-repository error or, with
//! `overwrite_on_conflict`, triggers the recovery transaction in
//! [`crate::conflict`]. No per-repository failure stops the pass.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::conflict::{self, ConflictRecoveryError, RecoveryOutcome};
use crate::git::{GitOps, PullOutcome};
use crate::report::Reporter;
use crate::repository::Repository;

/// Result of reconciling a single repository
#[derive(Debug, Clone)]
pub enum SyncResult {
    /// Target was absent and has been cloned
    Cloned { path: PathBuf },
    /// Existing mirror fast-forwarded to new commits
    Pulled { path: PathBuf },
    /// Existing mirror had nothing to pull
    UpToDate { path: PathBuf },
    /// Pull failed and the mirror was replaced by a fresh clone
    Overwritten { path: PathBuf, conflict_path: PathBuf },
    /// Per-repository failure, the mirror is as it was before
    Failed { path: PathBuf, error: String },
    /// Conflict recovery could not restore the previous mirror
    RecoveryFailed(ConflictRecoveryError),
}

impl SyncResult {
    pub fn path(&self) -> &Path {
        match self {
            SyncResult::Cloned { path }
            | SyncResult::Pulled { path }
            | SyncResult::UpToDate { path }
            | SyncResult::Overwritten { path, .. }
            | SyncResult::Failed { path, .. } => path,
            SyncResult::RecoveryFailed(err) => &err.path,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SyncResult::Cloned { .. }
                | SyncResult::Pulled { .. }
                | SyncResult::UpToDate { .. }
                | SyncResult::Overwritten { .. }
        )
    }
}

/// Results from a complete reconciliation pass
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
    /// Recovery transactions that ended without a mirror at the target path
    pub broken_operations: usize,
    pub duration: Duration,
    pub results: Vec<SyncResult>,
    /// Every target path the catalog claims, normalized
    pub realized: HashSet<PathBuf>,
    /// `_conflict` copies set aside by recovery during this pass
    pub preserved: HashSet<PathBuf>,
}

impl SyncSummary {
    fn compile(results: Vec<SyncResult>, realized: HashSet<PathBuf>, duration: Duration) -> Self {
        let mut successful_operations = 0;
        let mut failed_operations = 0;
        let mut broken_operations = 0;
        let mut preserved = HashSet::new();

        for result in &results {
            match result {
                SyncResult::Failed { .. } => failed_operations += 1,
                SyncResult::RecoveryFailed(err) => {
                    broken_operations += 1;
                    preserved.insert(err.conflict_path.clone());
                }
                SyncResult::Overwritten { conflict_path, .. } => {
                    successful_operations += 1;
                    preserved.insert(conflict_path.clone());
                }
                _ => successful_operations += 1,
            }
        }

        Self {
            total_repositories: results.len(),
            successful_operations,
            failed_operations,
            broken_operations,
            duration,
            results,
            realized,
            preserved,
        }
    }

    /// Paths the orphan pass must leave alone
    ///
    /// Realized targets, the `_conflict` copy next to each of them (left by
    /// this or an earlier run) and everything recovery preserved this pass.
    pub fn known_paths(&self) -> HashSet<PathBuf> {
        self.realized
            .iter()
            .map(|path| conflict::conflict_path(path))
            .chain(self.realized.iter().cloned())
            .chain(self.preserved.iter().cloned())
            .collect()
    }
}

/// Clone-or-pull reconciler for one mirror root
pub struct SyncEngine<G> {
    git: G,
    root: PathBuf,
    overwrite_on_conflict: bool,
}

impl<G: GitOps> SyncEngine<G> {
    /// `root` must be absolute and normalized
    pub fn new(git: G, root: PathBuf, overwrite_on_conflict: bool) -> Self {
        Self {
            git,
            root,
            overwrite_on_conflict,
        }
    }

    pub fn git(&self) -> &G {
        &self.git
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reconcile every catalog repository in order
    pub async fn reconcile(&self, repositories: &[Repository], reporter: &mut Reporter) -> SyncSummary {
        let start_time = Instant::now();
        let mut realized = HashSet::with_capacity(repositories.len());
        let mut results = Vec::with_capacity(repositories.len());

        reporter.begin("sync", repositories.len());

        for repo in repositories {
            reporter.step();
            let path = repo.target_path(&self.root);
            realized.insert(path.clone());

            let result = self.sync_repository(repo, path, reporter).await;
            match &result {
                SyncResult::Failed { error, .. } => {
                    reporter.error(format!("Failed to sync {} - {}", repo.name, error));
                }
                SyncResult::RecoveryFailed(err) => {
                    reporter.error(format!("Failed to recover {} - {}", repo.name, err));
                }
                other => debug!("Sync completed: {:?}", other),
            }
            results.push(result);
        }

        let summary = SyncSummary::compile(results, realized, start_time.elapsed());

        info!(
            "Sync completed in {:.2}s: {} successful, {} failed, {} broken",
            summary.duration.as_secs_f64(),
            summary.successful_operations,
            summary.failed_operations,
            summary.broken_operations
        );

        summary
    }

    async fn sync_repository(&self, repo: &Repository, path: PathBuf, reporter: &Reporter) -> SyncResult {
        if !path.exists() {
            reporter.info(format!("Cloning {} into {}", repo.name, path.display()));
            return self.clone_repository(repo, path).await;
        }

        reporter.info(format!("Pulling {}", path.display()));
        let pull_error = match self.git.pull(&path).await {
            Ok(PullOutcome::Updated) => return SyncResult::Pulled { path },
            Ok(PullOutcome::UpToDate) => return SyncResult::UpToDate { path },
            Err(e) => format!("{:#}", e),
        };

        if !self.overwrite_on_conflict {
            return SyncResult::Failed {
                path,
                error: pull_error,
            };
        }

        info!("Pull of {} failed, overwriting: {}", repo.name, pull_error);
        match conflict::recover(&self.git, &repo.clone_url, &path).await {
            RecoveryOutcome::Committed { conflict_path } => SyncResult::Overwritten { path, conflict_path },
            RecoveryOutcome::Stable { error } => SyncResult::Failed {
                path,
                error: format!("{}; {}", pull_error, error),
            },
            RecoveryOutcome::RolledBack { error, .. } => SyncResult::Failed {
                path,
                error: format!("{}; overwrite failed, restored previous copy: {}", pull_error, error),
            },
            RecoveryOutcome::Broken(err) => SyncResult::RecoveryFailed(err),
        }
    }

    async fn clone_repository(&self, repo: &Repository, path: PathBuf) -> SyncResult {
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return SyncResult::Failed {
                    error: format!("Failed to create parent directory {}: {}", parent.display(), e),
                    path,
                };
            }
        }

        match self.git.clone_repo(&repo.clone_url, &path).await {
            Ok(()) => SyncResult::Cloned { path },
            Err(e) => SyncResult::Failed {
                path,
                error: format!("{:#}", e),
            },
        }
    }
}
