use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::BackupError;
use crate::filter::{FilterChain, Rule};

/// Main configuration structure for gitback
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Root directory that receives the mirror tree
    pub repository: String,

    /// Accounts to mirror, processed in order
    #[serde(default)]
    pub accounts: Vec<Account>,

    /// Replace a mirror whose pull fails with a fresh clone
    #[serde(default)]
    pub overwrite_on_conflict: bool,

    /// What to do with local mirrors no account lists anymore
    #[serde(default)]
    pub handle_orphaned: OrphanPolicy,
}

/// A single hosting account and its filter rules
#[derive(Deserialize, Clone)]
pub struct Account {
    pub name: String,

    pub provider: ProviderKind,

    pub token: String,

    /// Provider-specific positional arguments
    ///
    /// GitHub: `[user, api_base]`, GitLab: `[base_url]`; all optional.
    #[serde(default)]
    pub args: Vec<String>,

    /// Ordered rule scripts, see [`crate::filter`]
    #[serde(default)]
    pub filters: Vec<String>,
}

impl Account {
    /// Positional argument at `index`, if set and non-empty
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args
            .get(index)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Compile the account's filter rules in order
    pub fn filter_chain(&self) -> Result<FilterChain, BackupError> {
        let rules = self
            .filters
            .iter()
            .enumerate()
            .map(|(index, source)| {
                Rule::compile(source).map_err(|source| BackupError::Filter {
                    account: self.name.clone(),
                    index,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FilterChain::new(rules))
    }
}

// Tokens must never end up in verbose logs
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("token", &"<redacted>")
            .field("args", &self.args)
            .field("filters", &self.filters)
            .finish()
    }
}

/// Hosting provider of an account, stored as an integer in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "u8")]
pub enum ProviderKind {
    GitHub = 0,
    GitLab = 1,
}

impl TryFrom<u8> for ProviderKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ProviderKind::GitHub),
            1 => Ok(ProviderKind::GitLab),
            other => Err(format!("unknown provider {} (expected 0 = GitHub, 1 = GitLab)", other)),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::GitHub => f.write_str("GitHub"),
            ProviderKind::GitLab => f.write_str("GitLab"),
        }
    }
}

/// Handling of local mirrors that are absent from the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum OrphanPolicy {
    #[default]
    Ignore = 0,
    Pull = 1,
    Remove = 2,
}

impl TryFrom<u8> for OrphanPolicy {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OrphanPolicy::Ignore),
            1 => Ok(OrphanPolicy::Pull),
            2 => Ok(OrphanPolicy::Remove),
            other => Err(format!(
                "unknown handle_orphaned value {} (expected 0 = ignore, 1 = pull, 2 = remove)",
                other
            )),
        }
    }
}

impl Config {
    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self, BackupError> {
        let content = std::fs::read_to_string(path).map_err(|source| BackupError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&content).map_err(|source| BackupError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Absolute, normalized mirror root with `~` and environment variables expanded
    pub fn root(&self) -> Result<PathBuf, BackupError> {
        let expanded = shellexpand::full(&self.repository).map_err(|e| {
            BackupError::ConfigInvalid(format!("cannot expand repository path {}: {}", self.repository, e))
        })?;

        let path = PathBuf::from(expanded.as_ref());
        let absolute = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .map_err(|e| BackupError::ConfigInvalid(format!("cannot resolve working directory: {}", e)))?
                .join(path)
        };

        Ok(path_clean::clean(absolute))
    }

    /// Resolve the mirror root and make sure it is an existing directory
    pub fn validated_root(&self) -> Result<PathBuf, BackupError> {
        if self.repository.trim().is_empty() {
            return Err(BackupError::ConfigInvalid("repository path is empty".to_string()));
        }

        let root = self.root()?;
        let metadata = std::fs::metadata(&root).map_err(|e| {
            BackupError::ConfigInvalid(format!("failed to access {}: {}", root.display(), e))
        })?;

        if !metadata.is_dir() {
            return Err(BackupError::ConfigInvalid(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        Ok(root)
    }
}
