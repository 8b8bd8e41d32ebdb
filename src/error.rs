//! Run-level error taxonomy
//!
//! Only errors that abort a whole operation live here. Failures scoped to a
//! single repository are reported through [`crate::sync::SyncResult`] and the
//! [`crate::report::Reporter`] instead of being propagated.

use std::path::PathBuf;
use thiserror::Error;

use crate::filter::FilterError;

/// Fatal errors for `backup`, `check` and `update`
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("invalid filter #{index} for account '{account}': {source}")]
    Filter {
        account: String,
        index: usize,
        #[source]
        source: FilterError,
    },

    #[error("failed to init client {account}: {message}")]
    Auth { account: String, message: String },

    #[error("failed to list repositories for {account}: {message}")]
    List { account: String, message: String },
}

impl BackupError {
    /// Whether this error was raised before any provider was contacted
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            BackupError::ConfigRead { .. }
                | BackupError::ConfigParse { .. }
                | BackupError::ConfigInvalid(_)
                | BackupError::Filter { .. }
        )
    }
}
