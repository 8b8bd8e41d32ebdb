//! Run orchestration for the `backup`, `check` and `update` commands

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::{Config, OrphanPolicy};
use crate::error::BackupError;
use crate::git::GitOps;
use crate::orphan::{self, OrphanResult};
use crate::provider::{Provider, ProviderRegistry};
use crate::remote::{self, UpdateResult};
use crate::report::Reporter;
use crate::sync::{SyncEngine, SyncSummary};

/// Outcome of a `backup` run
#[derive(Debug)]
pub struct BackupReport {
    pub sync: SyncSummary,
    pub orphans: Vec<OrphanResult>,
}

/// A validated configuration with its providers ready to be contacted
pub struct Backup {
    root: PathBuf,
    overwrite_on_conflict: bool,
    handle_orphaned: OrphanPolicy,
    providers: Vec<Box<dyn Provider>>,
}

impl Backup {
    /// Validate `config` and build providers from the builtin registry
    pub fn new(config: &Config) -> Result<Self, BackupError> {
        Self::with_registry(config, &ProviderRegistry::builtin())
    }

    /// Fails on a bad root or a filter that does not compile, before any network access
    pub fn with_registry(config: &Config, registry: &ProviderRegistry) -> Result<Self, BackupError> {
        let root = config.validated_root()?;
        let providers = registry.create_all(&config.accounts)?;

        debug!("Mirror root {} with {} accounts", root.display(), providers.len());

        Ok(Self {
            root,
            overwrite_on_conflict: config.overwrite_on_conflict,
            handle_orphaned: config.handle_orphaned,
            providers,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Contact every account and collect the filtered catalog
    ///
    /// Rules that fail to run are reported per repository; the run goes on.
    pub async fn check(&mut self, reporter: &mut Reporter) -> Result<Catalog, BackupError> {
        let catalog = Catalog::build(&mut self.providers).await?;

        if !catalog.filter_failures().is_empty() {
            reporter.begin("filter", catalog.filter_failures().len());
            for failure in catalog.filter_failures() {
                reporter.step();
                reporter.error(failure);
            }
        }

        info!("Catalog contains {} repositories", catalog.len());
        Ok(catalog)
    }

    /// Mirror the catalog, then handle orphans according to the policy
    pub async fn backup<G: GitOps>(&mut self, git: G, reporter: &mut Reporter) -> Result<BackupReport, BackupError> {
        let catalog = self.check(reporter).await?;

        let engine = SyncEngine::new(git, self.root.clone(), self.overwrite_on_conflict);
        let sync = engine.reconcile(catalog.repositories(), reporter).await;

        let orphans = orphan::handle_orphans(
            engine.git(),
            &self.root,
            &sync.known_paths(),
            self.handle_orphaned,
            reporter,
        )
        .await;

        Ok(BackupReport { sync, orphans })
    }

    /// Repoint the origin of every existing mirror at its catalog URL
    pub async fn update<G: GitOps>(&mut self, git: G, reporter: &mut Reporter) -> Result<Vec<UpdateResult>, BackupError> {
        let catalog = self.check(reporter).await?;
        let results = remote::update_remotes(&git, &self.root, catalog.repositories(), reporter).await;

        let updated = results
            .iter()
            .filter(|r| matches!(r, UpdateResult::Updated { .. }))
            .count();
        info!("Updated {} of {} remotes", updated, results.len());

        Ok(results)
    }
}
