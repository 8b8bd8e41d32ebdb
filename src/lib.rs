//! gitback - mirror GitHub and GitLab accounts into a local directory tree
//!
//! gitback lists every repository visible to the configured accounts, keeps
//! one mirror per repository under a single root directory and reconciles
//! that tree on every run.
//!
//! ## Core Features
//!
//! - **Multiple accounts**: any number of GitHub and GitLab accounts, self-hosted instances included
//! - **Rule filters**: per-account scripts deciding which repositories are mirrored
//! - **Conflict recovery**: diverged mirrors can be replaced by a fresh clone with rollback
//! - **Orphan handling**: mirrors no account lists anymore are ignored, pulled or removed
//! - **Remote repair**: stale `origin` URLs are rewritten to the current clone URL
//!
//! ## Modules
//!
//! - [`config`]: YAML configuration
//! - [`filter`]: rule language and filter chains
//! - [`provider`], [`github`], [`gitlab`]: hosting provider clients
//! - [`catalog`]: aggregation of all accounts into one repository list
//! - [`git`]: git primitives over the `git` executable
//! - [`sync`], [`conflict`]: the clone-or-pull reconciler
//! - [`orphan`]: detection and handling of orphaned mirrors
//! - [`remote`]: origin URL updater
//! - [`backup`]: the `backup`, `check` and `update` operations

pub mod backup;
pub mod catalog;
pub mod config;
pub mod conflict;
pub mod error;
pub mod filter;
pub mod git;
pub mod github;
pub mod gitlab;
pub mod orphan;
pub mod provider;
pub mod remote;
pub mod report;
pub mod repository;
pub mod sync;

pub use backup::{Backup, BackupReport};
pub use catalog::Catalog;
pub use config::Config;
pub use error::BackupError;
pub use git::{GitCli, GitOps};
pub use report::{ErrorLog, Reporter};
pub use repository::{Repository, Visibility};
pub use sync::{SyncEngine, SyncResult, SyncSummary};
