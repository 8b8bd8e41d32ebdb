//! Catalog Builder - the run-scoped list of repositories to mirror

use std::fmt::Write as _;
use tracing::info;

use crate::error::BackupError;
use crate::filter::FilterFailure;
use crate::provider::{Provider, ProviderError};
use crate::repository::Repository;

/// Filtered repositories of all accounts, in account then listing order
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    repositories: Vec<Repository>,
    filter_failures: Vec<FilterFailure>,
}

impl Catalog {
    /// Initialize and list every provider in turn; the first failure aborts
    pub async fn build(providers: &mut [Box<dyn Provider>]) -> Result<Self, BackupError> {
        let mut catalog = Self::default();

        for provider in providers.iter_mut() {
            let account = provider.name().to_string();

            provider.init().await.map_err(|e| into_backup_error(&account, e))?;
            let listing = provider.list().await.map_err(|e| into_backup_error(&account, e))?;

            info!(
                "Account {} contributes {} repositories",
                account,
                listing.repositories.len()
            );
            catalog.repositories.extend(listing.repositories);
            catalog.filter_failures.extend(listing.filter_failures);
        }

        Ok(catalog)
    }

    pub fn from_repositories(repositories: Vec<Repository>) -> Self {
        Self {
            repositories,
            filter_failures: Vec::new(),
        }
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    /// Rules that failed to run while the accounts were listed
    pub fn filter_failures(&self) -> &[FilterFailure] {
        &self.filter_failures
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// `Provider | Name | CreatedAt | Size` table printed by `check`
    pub fn render_table(&self) -> String {
        let mut table = String::from("Found the following repositories:\n");
        let _ = writeln!(
            table,
            "| {:<10.10} | {:<60.60} | {:<10.10} | {:>10.10} |",
            "Provider", "Name", "CreatedAt", "Size"
        );
        for repo in &self.repositories {
            let _ = writeln!(
                table,
                "| {:<10.10} | {:<60.60} | {:<10.10} | {:>10} |",
                repo.provider_name,
                repo.name,
                repo.created_at.format("%Y-%m-%d").to_string(),
                repo.size
            );
        }
        table
    }
}

fn into_backup_error(account: &str, error: ProviderError) -> BackupError {
    match error {
        ProviderError::Auth(message) => BackupError::Auth {
            account: account.to_string(),
            message,
        },
        ProviderError::List(message) => BackupError::List {
            account: account.to_string(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterChain, Rule};
    use crate::provider::Listing;
    use crate::repository::Visibility;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        name: String,
        repos: Vec<Repository>,
        filters: FilterChain,
        fail_init: bool,
        listed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Provider for Fixed {
        fn name(&self) -> &str {
            &self.name
        }

        fn register_filter(&mut self, chain: FilterChain) {
            self.filters = chain;
        }

        async fn init(&mut self) -> Result<(), ProviderError> {
            if self.fail_init {
                Err(ProviderError::Auth("401 Bad credentials".to_string()))
            } else {
                Ok(())
            }
        }

        async fn list(&self) -> Result<Listing, ProviderError> {
            self.listed.fetch_add(1, Ordering::SeqCst);
            let mut listing = Listing::default();
            for repo in &self.repos {
                listing.offer(&self.filters, repo.clone());
            }
            Ok(listing)
        }
    }

    fn repo(account: &str, name: &str) -> Repository {
        Repository {
            clone_url: format!("https://example.com/{}.git", name),
            name: name.to_string(),
            size: 1200,
            created_at: Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap(),
            owner: true,
            member: true,
            visibility: Visibility::Public,
            provider_name: account.to_string(),
            archived: false,
        }
    }

    fn provider(name: &str, repos: Vec<Repository>, fail_init: bool, listed: &Arc<AtomicUsize>) -> Box<dyn Provider> {
        Box::new(Fixed {
            name: name.to_string(),
            repos,
            filters: FilterChain::default(),
            fail_init,
            listed: listed.clone(),
        })
    }

    #[tokio::test]
    async fn test_build_preserves_account_order() {
        let listed = Arc::new(AtomicUsize::new(0));
        let mut providers = vec![
            provider("a", vec![repo("a", "a/one"), repo("a", "a/two")], false, &listed),
            provider("b", vec![repo("b", "b/three")], false, &listed),
        ];

        let catalog = Catalog::build(&mut providers).await.unwrap();
        let names: Vec<&str> = catalog.repositories().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a/one", "a/two", "b/three"]);
        assert_eq!(listed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_build_collects_filter_failures() {
        let listed = Arc::new(AtomicUsize::new(0));
        let mut broken = provider("a", vec![repo("a", "a/one"), repo("a", "a/two")], false, &listed);
        broken.register_filter(FilterChain::new(vec![Rule::compile("r := len(size) > 0").unwrap()]));
        let mut providers = vec![broken, provider("b", vec![repo("b", "b/three")], false, &listed)];

        let catalog = Catalog::build(&mut providers).await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.filter_failures().len(), 2);
        assert_eq!(catalog.filter_failures()[0].repository, "a/one");
    }

    #[tokio::test]
    async fn test_auth_failure_aborts_before_later_accounts() {
        let listed = Arc::new(AtomicUsize::new(0));
        let mut providers = vec![
            provider("broken", Vec::new(), true, &listed),
            provider("fine", vec![repo("fine", "x")], false, &listed),
        ];

        let err = Catalog::build(&mut providers).await.unwrap_err();
        assert!(matches!(err, BackupError::Auth { ref account, .. } if account == "broken"));
        assert!(!err.is_config_error());
        assert_eq!(listed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_render_table() {
        let catalog = Catalog::from_repositories(vec![repo("personal", "octocat/hello")]);
        let table = catalog.render_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("| Provider "));
        assert!(lines[2].contains("personal"));
        assert!(lines[2].contains("octocat/hello"));
        assert!(lines[2].contains("2020-01-02"));
        assert!(lines[2].trim_end().ends_with("1200 |"));
    }
}
