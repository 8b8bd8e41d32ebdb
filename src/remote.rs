//! Remote URL Updater - repoints existing mirrors at their catalog clone URL
//!
//! Tokens rotate and hosts move, so a mirror's stored `origin` can drift from
//! the URL the provider hands out today. Updating is idempotent: a mirror
//! whose origin already matches is never written to.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::git::{redact, GitOps};
use crate::report::Reporter;
use crate::repository::Repository;

/// What happened to one mirror's origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    Unchanged { path: PathBuf },
    /// Origin rewritten; `previous` is `None` when origin was missing
    Updated { path: PathBuf, previous: Option<String> },
    Failed { path: PathBuf, error: String },
}

/// Rewrite `origin` of every existing mirror whose URL differs from the catalog
pub async fn update_remotes<G: GitOps + ?Sized>(
    git: &G,
    root: &Path,
    repositories: &[Repository],
    reporter: &mut Reporter,
) -> Vec<UpdateResult> {
    reporter.begin("update", repositories.len());
    let mut results = Vec::new();

    for repo in repositories {
        reporter.step();
        let path = repo.target_path(root);
        if !path.exists() {
            debug!("Skipping {}: no local mirror at {}", repo.name, path.display());
            continue;
        }

        let result = match update_remote(git, &path, &repo.clone_url).await {
            Ok(None) => UpdateResult::Unchanged { path },
            Ok(Some(previous)) => {
                info!("{} outdated, updated 'origin'", repo.name);
                UpdateResult::Updated { path, previous }
            }
            Err(e) => {
                reporter.error(format!("Failed to update remote of {} - {:#}", repo.name, e));
                UpdateResult::Failed {
                    path,
                    error: format!("{:#}", e),
                }
            }
        };
        results.push(result);
    }

    results
}

/// Returns `Some(previous origin)` when a write happened
async fn update_remote<G: GitOps + ?Sized>(
    git: &G,
    path: &Path,
    url: &str,
) -> anyhow::Result<Option<Option<String>>> {
    let current = git.origin_url(path).await?;
    if current.as_deref() == Some(url) {
        return Ok(None);
    }

    debug!(
        "Repointing {} from {} to {}",
        path.display(),
        current.as_deref().map(redact).unwrap_or_else(|| "<none>".to_string()),
        redact(url)
    );
    git.replace_origin(path, current.as_deref(), url).await?;
    Ok(Some(current))
}
