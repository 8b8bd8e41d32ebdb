//! Orphan Scanner - finds local mirrors the catalog no longer lists
//!
//! A directory that directly contains `.git` is a git root; the scan never
//! descends into it. Every other directory is searched recursively. A git
//! root whose path is missing from the known set of the preceding
//! reconciliation pass ([`crate::sync::SyncSummary::known_paths`]) is an
//! orphan. Conflict copies next to catalog targets are never orphans.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::OrphanPolicy;
use crate::git::{GitOps, PullOutcome};
use crate::report::Reporter;

/// What happened to one orphaned mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrphanResult {
    Removed { path: PathBuf },
    Pulled { path: PathBuf, outcome: PullOutcome },
    Failed { path: PathBuf, error: String },
}

/// Git roots under `root` that are not in `known`, in sorted walk order
pub fn find_orphans(root: &Path, known: &HashSet<PathBuf>) -> Vec<PathBuf> {
    let mut orphans = Vec::new();
    walk(root, known, &mut orphans);
    orphans
}

fn walk(dir: &Path, known: &HashSet<PathBuf>, orphans: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Skipping unreadable directory {}: {}", dir.display(), e);
            return;
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();

    for path in dirs {
        if path.join(".git").exists() {
            let normalized = path_clean::clean(&path);
            if !known.contains(&normalized) {
                debug!("Found orphaned mirror {}", normalized.display());
                orphans.push(normalized);
            }
        } else {
            walk(&path, known, orphans);
        }
    }
}

/// Apply `policy` to every orphan under `root`
pub async fn handle_orphans<G: GitOps + ?Sized>(
    git: &G,
    root: &Path,
    known: &HashSet<PathBuf>,
    policy: OrphanPolicy,
    reporter: &mut Reporter,
) -> Vec<OrphanResult> {
    if policy == OrphanPolicy::Ignore {
        return Vec::new();
    }

    let orphans = find_orphans(root, known);
    if orphans.is_empty() {
        return Vec::new();
    }

    reporter.begin("orphans", orphans.len());
    let mut results = Vec::with_capacity(orphans.len());

    for path in orphans {
        reporter.step();
        let result = match policy {
            OrphanPolicy::Remove => match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    reporter.info(format!("Removed orphaned repo {}", path.display()));
                    OrphanResult::Removed { path }
                }
                Err(e) => {
                    reporter.error(format!("Failed to remove orphaned repo {} - {}", path.display(), e));
                    OrphanResult::Failed {
                        path,
                        error: e.to_string(),
                    }
                }
            },
            OrphanPolicy::Pull => match git.pull(&path).await {
                Ok(outcome) => {
                    reporter.info(format!("Pulled orphaned repo {}", path.display()));
                    OrphanResult::Pulled { path, outcome }
                }
                Err(e) => {
                    reporter.error(format!("Failed to pull orphaned repo {} - {:#}", path.display(), e));
                    OrphanResult::Failed {
                        path,
                        error: format!("{:#}", e),
                    }
                }
            },
            OrphanPolicy::Ignore => continue,
        };
        results.push(result);
    }

    results
}
