//! Normalized repository records
//!
//! Every provider converts its API objects into [`Repository`] so the filter
//! engine, the reconciler and the remote updater never see provider-specific
//! types.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};

/// Repository visibility as reported by the hosting provider
///
/// The discriminants are the integer values exposed to filter rules as
/// `visibility`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public = 0,
    Private = 1,
    Internal = 2,
}

impl Visibility {
    /// Parse the visibility string used by both GitHub and GitLab
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "internal" => Some(Visibility::Internal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-agnostic description of a remote repository
///
/// Records are built fresh on every run by a provider's listing call and are
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Clone URL, possibly with credentials embedded
    pub clone_url: String,

    /// Catalog key and relative mirror path (e.g. "octocat/hello-world")
    pub name: String,

    /// Size as reported by the provider, -1 when unknown
    pub size: i64,

    pub created_at: DateTime<Utc>,

    /// Whether the authenticated account owns the repository
    pub owner: bool,

    /// Whether the authenticated account is a member of the repository
    pub member: bool,

    pub visibility: Visibility,

    /// Name of the configured account that listed this repository
    pub provider_name: String,

    pub archived: bool,
}

impl Repository {
    /// Local mirror location of this repository below `root`
    pub fn target_path(&self, root: &Path) -> PathBuf {
        path_clean::clean(root.join(&self.name))
    }
}
