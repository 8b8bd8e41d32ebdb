use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::{Octocrab, Page};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Account;
use crate::filter::FilterChain;
use crate::provider::{embed_credentials, Listing, Provider, ProviderError};
use crate::repository::{Repository, Visibility};

/// GitHub account provider
///
/// Args: `[user, api_base]`, both optional. When `user` is set it is used as
/// the owner login and embedded with the token into clone URLs; otherwise the
/// login of the token holder is resolved during [`Provider::init`].
pub struct GitHubProvider {
    name: String,
    token: String,
    user: Option<String>,
    api_base: Option<String>,
    filters: FilterChain,
    client: Option<Octocrab>,
    login: String,
}

/// Query of `GET /user/repos`
#[derive(Serialize)]
struct ListParams {
    visibility: &'static str,
    sort: &'static str,
    per_page: u8,
}

/// Fields of a GitHub repository object the provider reads
#[derive(Debug, Deserialize)]
struct GhRepository {
    full_name: String,
    clone_url: String,
    #[serde(default)]
    size: Option<i64>,
    created_at: Option<DateTime<Utc>>,
    owner: GhOwner,
    #[serde(default)]
    permissions: Option<GhPermissions>,
    visibility: Option<String>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Deserialize)]
struct GhOwner {
    login: String,
}

#[derive(Debug, Default, Deserialize)]
struct GhPermissions {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    push: bool,
}

impl GitHubProvider {
    pub fn new(account: &Account) -> Self {
        Self {
            name: account.name.clone(),
            token: account.token.clone(),
            user: account.arg(0).map(str::to_string),
            api_base: account.arg(1).map(str::to_string),
            filters: FilterChain::default(),
            client: None,
            login: String::new(),
        }
    }

    /// Login the provider treats as the account owner
    pub fn login(&self) -> &str {
        &self.login
    }

    fn to_repository(&self, repo: GhRepository) -> Repository {
        let owner = repo.owner.login.eq_ignore_ascii_case(&self.login);
        let permissions = repo.permissions.unwrap_or_default();
        let visibility = repo
            .visibility
            .as_deref()
            .and_then(Visibility::parse)
            .unwrap_or(if repo.private {
                Visibility::Private
            } else {
                Visibility::Public
            });

        let clone_url = match &self.user {
            Some(user) => embed_credentials(&repo.clone_url, user, &self.token),
            None => repo.clone_url,
        };

        Repository {
            clone_url,
            name: repo.full_name,
            size: repo.size.unwrap_or(-1),
            created_at: repo.created_at.unwrap_or_default(),
            owner,
            member: owner || permissions.push || permissions.admin,
            visibility,
            provider_name: self.name.clone(),
            archived: repo.archived,
        }
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn register_filter(&mut self, chain: FilterChain) {
        self.filters = chain;
    }

    async fn init(&mut self) -> Result<(), ProviderError> {
        // The builder is not Send and must be gone before the first await
        let client = {
            let mut builder = Octocrab::builder().personal_token(self.token.clone());
            if let Some(api_base) = &self.api_base {
                builder = builder
                    .base_uri(api_base.as_str())
                    .map_err(|e| ProviderError::Auth(format!("invalid API base {}: {}", api_base, e)))?;
            }
            builder
                .build()
                .map_err(|e| ProviderError::Auth(format!("failed to create GitHub client: {}", e)))?
        };

        self.login = match &self.user {
            Some(user) => user.clone(),
            None => {
                let user = client.current().user().await.map_err(|e| {
                    ProviderError::Auth(format!("failed to get current user, check your token: {}", e))
                })?;
                user.login
            }
        };

        info!("Authenticated as GitHub user: {}", self.login);
        self.client = Some(client);
        Ok(())
    }

    async fn list(&self) -> Result<Listing, ProviderError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ProviderError::List("client not initialized".to_string()))?;

        let params = ListParams {
            visibility: "all",
            sort: "created",
            per_page: 100,
        };

        let mut page: Page<GhRepository> = client
            .get("/user/repos", Some(&params))
            .await
            .map_err(|e| ProviderError::List(format!("failed to fetch repositories: {}", e)))?;

        let mut listing = Listing::default();

        loop {
            for repo in std::mem::take(&mut page.items) {
                debug!("got {} size {:?}", repo.full_name, repo.size);
                listing.offer(&self.filters, self.to_repository(repo));
            }

            page = match client
                .get_page::<GhRepository>(&page.next)
                .await
                .map_err(|e| ProviderError::List(format!("failed to fetch next page: {}", e)))?
            {
                Some(next) => next,
                None => break,
            };
        }

        info!(
            "Found {} GitHub repositories for {}, {} after filtering",
            listing.seen,
            self.name,
            listing.repositories.len()
        );
        Ok(listing)
    }
}
