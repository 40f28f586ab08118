use anyhow::{anyhow, Context, Result};
use octocrab::models::Repository;
use octocrab::Octocrab;
use std::env;
use tracing::{debug, info, warn};

use crate::config::Config;

/// GitHub client wrapper with authentication management
pub struct GitHubClient {
    client: Octocrab,
    username: String,
}

/// Minimal snapshot of a repository listing entry, before parent hydration
#[derive(Debug, Clone)]
pub struct RepoListing {
    pub name: String,
    pub owner: String,
    pub is_fork: bool,
}

/// Everything the sync engine needs to know about one fork
///
/// Immutable snapshot fetched once per run. The upstream branch is read from
/// the parent repository, since different forks may track different defaults.
#[derive(Debug, Clone)]
pub struct ForkSpec {
    /// Repository name (e.g., "forks-sync")
    pub name: String,

    /// Owner login (always the authenticated user after filtering)
    pub owner: String,

    /// SSH URL of the fork, used as the clone source
    pub ssh_url: String,

    /// Clone URL of the parent repository, registered as the `upstream` remote
    pub upstream_url: String,

    /// Current default branch of the parent repository
    pub upstream_branch: String,
}

impl ForkSpec {
    /// Display name (owner/name format)
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl From<&Repository> for RepoListing {
    fn from(repo: &Repository) -> Self {
        Self {
            name: repo.name.clone(),
            owner: repo
                .owner
                .as_ref()
                .map(|o| o.login.clone())
                .unwrap_or_default(),
            is_fork: repo.fork.unwrap_or(false),
        }
    }
}

/// Keep only forks owned by the authenticated user
///
/// Forks owned by organizations or collaborators are excluded: this tool only
/// force-pushes to repositories the account fully owns.
pub fn filter_owned_forks(listings: Vec<RepoListing>, username: &str) -> Vec<RepoListing> {
    listings
        .into_iter()
        .filter(|listing| listing.is_fork && listing.owner == username)
        .collect()
}

/// Resolve the token to use: explicit configuration wins, GITHUB_TOKEN is the
/// environment fallback
pub fn resolve_token(config: &Config) -> Option<String> {
    config
        .token
        .clone()
        .filter(|token| !token.is_empty())
        .or_else(|| env::var("GITHUB_TOKEN").ok().filter(|token| !token.is_empty()))
}

/// Map an API failure to an error the run can surface without retrying
fn classify_api_error(error: octocrab::Error, action: &str) -> anyhow::Error {
    if let octocrab::Error::GitHub { ref source, .. } = error {
        let status = source.status_code.as_u16();
        let message = source.message.clone();
        return match status {
            401 => anyhow!("GitHub rejected the token while {}: {}", action, message),
            403 => anyhow!(
                "GitHub refused the request while {} (rate limited or forbidden): {}",
                action,
                message
            ),
            404 => anyhow!("GitHub resource not found while {}: {}", action, message),
            _ => anyhow!("GitHub API error ({}) while {}: {}", status, action, message),
        };
    }

    anyhow::Error::from(error).context(format!("GitHub API request failed while {}", action))
}

impl GitHubClient {
    /// Create a new GitHub client and verify the token against the API
    pub async fn new(token: &str) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .context("Failed to create GitHub client")?;

        let user = client
            .current()
            .user()
            .await
            .map_err(|e| classify_api_error(e, "fetching the authenticated user"))?;

        let username = user.login.clone();

        info!("Authenticated as GitHub user: {}", username);

        Ok(Self { client, username })
    }

    /// Get the authenticated username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// List all repositories for the authenticated user
    pub async fn list_user_repositories(&self) -> Result<Vec<Repository>> {
        debug!("Fetching user repositories for: {}", self.username);

        let mut repositories = Vec::new();
        let mut page = 1u8;

        loop {
            let page_repos = self
                .client
                .current()
                .list_repos_for_authenticated_user()
                .per_page(100)
                .page(page)
                .send()
                .await
                .map_err(|e| {
                    classify_api_error(e, &format!("listing repositories (page {})", page))
                })?;

            let items = page_repos.items;
            if items.is_empty() {
                break;
            }

            repositories.extend(items);

            // GitHub API pagination limit for u8
            if page >= 255 {
                warn!("Reached maximum pagination limit (255 pages)");
                break;
            }
            page += 1;
        }

        info!("Found {} user repositories", repositories.len());
        Ok(repositories)
    }

    /// Discover the user's own forks, with upstream metadata attached
    ///
    /// The listing endpoint omits parent details, so each surviving fork is
    /// fetched individually to read its parent's clone URL and default branch.
    pub async fn list_forks(&self) -> Result<Vec<ForkSpec>> {
        let repositories = self.list_user_repositories().await?;

        let listings: Vec<RepoListing> = repositories.iter().map(RepoListing::from).collect();
        let candidates = filter_owned_forks(listings, &self.username);

        info!(
            "Found {} forks owned by {}",
            candidates.len(),
            self.username
        );

        let mut forks = Vec::new();
        for candidate in candidates {
            match self.hydrate_fork(&candidate).await? {
                Some(spec) => forks.push(spec),
                None => warn!(
                    "Skipping {}: upstream metadata is incomplete",
                    candidate.name
                ),
            }
        }

        Ok(forks)
    }

    /// Fetch one fork's full record and extract the fields the engine needs
    async fn hydrate_fork(&self, listing: &RepoListing) -> Result<Option<ForkSpec>> {
        debug!("Fetching fork details for: {}", listing.name);

        let repo = self
            .client
            .repos(&listing.owner, &listing.name)
            .get()
            .await
            .map_err(|e| classify_api_error(e, &format!("fetching fork {}", listing.name)))?;

        let ssh_url = match &repo.ssh_url {
            Some(url) => url.clone(),
            None => return Ok(None),
        };

        let parent = match repo.parent.as_deref() {
            Some(parent) => parent,
            None => return Ok(None),
        };

        let upstream_url = match &parent.clone_url {
            Some(url) => url.to_string(),
            None => return Ok(None),
        };

        let upstream_branch = match &parent.default_branch {
            Some(branch) => branch.clone(),
            None => return Ok(None),
        };

        Ok(Some(ForkSpec {
            name: listing.name.clone(),
            owner: listing.owner.clone(),
            ssh_url,
            upstream_url,
            upstream_branch,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(name: &str, owner: &str, is_fork: bool) -> RepoListing {
        RepoListing {
            name: name.to_string(),
            owner: owner.to_string(),
            is_fork,
        }
    }

    #[test]
    fn test_filter_keeps_only_owned_forks() {
        let listings = vec![
            listing("my-fork", "me", true),
            listing("my-project", "me", false),
            listing("org-fork", "some-org", true),
            listing("another-fork", "me", true),
        ];

        let kept = filter_owned_forks(listings, "me");

        let names: Vec<&str> = kept.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["my-fork", "another-fork"]);
    }

    #[test]
    fn test_filter_empty_input() {
        let kept = filter_owned_forks(Vec::new(), "me");
        assert!(kept.is_empty());
    }

    #[test]
    fn test_filter_no_matching_owner() {
        let listings = vec![listing("fork", "someone-else", true)];
        assert!(filter_owned_forks(listings, "me").is_empty());
    }

    #[test]
    fn test_resolve_token_prefers_config() {
        let config = Config {
            token: Some("ghp_from_config".to_string()),
            ..Default::default()
        };

        assert_eq!(resolve_token(&config), Some("ghp_from_config".to_string()));
    }

    #[test]
    fn test_resolve_token_ignores_empty_config_value() {
        let config = Config {
            token: Some(String::new()),
            ..Default::default()
        };

        // Empty string in the config must not mask the environment fallback;
        // with neither set, resolution yields nothing.
        std::env::remove_var("GITHUB_TOKEN");
        assert_eq!(resolve_token(&config), None);
    }

    #[test]
    fn test_fork_spec_full_name() {
        let spec = ForkSpec {
            name: "forks-sync".to_string(),
            owner: "me".to_string(),
            ssh_url: "git@github.com:me/forks-sync.git".to_string(),
            upstream_url: "https://github.com/upstream/forks-sync.git".to_string(),
            upstream_branch: "main".to_string(),
        };

        assert_eq!(spec.full_name(), "me/forks-sync");
    }
}
