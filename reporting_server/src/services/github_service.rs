//! GitHub integration — branch/tag/commit/PR listings and cross-repository
//! PR aggregation over the stack catalog.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{GatewayError, GatewayResult};
use crate::models::pull_request::{
    AggregatedPullRequest, Branch, Commit, PrState, PullRequest, PullRequestAggregate, SkippedRepo,
    Tag,
};
use crate::models::repository::Repository;

/// Hard ceiling on repositories visited by one aggregation.
pub const MAX_AGGREGATE_REPOS: usize = 50;
/// Hard ceiling on PRs requested per repository.
pub const MAX_PRS_PER_REPO: usize = 30;

const BRANCHES_PER_PAGE: usize = 30;
const TAGS_PER_PAGE: usize = 30;
const COMMITS_PER_PAGE: usize = 20;

/// Read access to the hosted VCS.
#[async_trait]
pub trait VcsApi: Send + Sync {
    async fn fetch_branches(&self, owner: &str, repo: &str) -> GatewayResult<Vec<Branch>>;

    async fn fetch_tags(&self, owner: &str, repo: &str) -> GatewayResult<Vec<Tag>>;

    async fn fetch_commits(&self, owner: &str, repo: &str) -> GatewayResult<Vec<Commit>>;

    /// PRs sorted by most recently updated.
    async fn fetch_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: PrState,
        per_page: usize,
    ) -> GatewayResult<Vec<PullRequest>>;
}

/// [`VcsApi`] over the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GithubClient {
    /// An empty `token` sends anonymous requests.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "dag-reporting");
        if !self.token.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.token));
        }

        let resp = request.send().await.inspect_err(|_| crate::metrics::vcs_request(false))?;
        let status = resp.status();
        crate::metrics::vcs_request(status.is_success());

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(%url, status = status.as_u16(), "GitHub request failed");
            return Err(GatewayError::VcsApi {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }
}

#[derive(Deserialize)]
struct GhRef {
    name: String,
    #[serde(default)]
    commit: Option<GhCommitRef>,
}

#[derive(Deserialize)]
struct GhCommitRef {
    #[serde(default)]
    sha: Option<String>,
}

#[derive(Deserialize)]
struct GhCommit {
    sha: String,
    #[serde(default)]
    commit: Option<GhCommitDetail>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct GhCommitDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    author: Option<GhSignature>,
}

#[derive(Deserialize)]
struct GhSignature {
    #[serde(default)]
    date: Option<String>,
}

#[derive(Deserialize)]
struct GhPull {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    html_url: Option<String>,
}

impl From<GhPull> for PullRequest {
    fn from(p: GhPull) -> Self {
        Self {
            number: p.number,
            title: p.title,
            state: p.state,
            url: p.html_url,
        }
    }
}

#[async_trait]
impl VcsApi for GithubClient {
    async fn fetch_branches(&self, owner: &str, repo: &str) -> GatewayResult<Vec<Branch>> {
        let data: Vec<GhRef> = self
            .get_json(&format!("/repos/{owner}/{repo}/branches?per_page={BRANCHES_PER_PAGE}"))
            .await?;
        Ok(data
            .into_iter()
            .map(|b| Branch {
                name: b.name,
                sha: b.commit.and_then(|c| c.sha),
            })
            .collect())
    }

    async fn fetch_tags(&self, owner: &str, repo: &str) -> GatewayResult<Vec<Tag>> {
        let data: Vec<GhRef> = self
            .get_json(&format!("/repos/{owner}/{repo}/tags?per_page={TAGS_PER_PAGE}"))
            .await?;
        Ok(data
            .into_iter()
            .map(|t| Tag {
                name: t.name,
                sha: t.commit.and_then(|c| c.sha),
            })
            .collect())
    }

    async fn fetch_commits(&self, owner: &str, repo: &str) -> GatewayResult<Vec<Commit>> {
        let data: Vec<GhCommit> = self
            .get_json(&format!("/repos/{owner}/{repo}/commits?per_page={COMMITS_PER_PAGE}"))
            .await?;
        Ok(data
            .into_iter()
            .map(|c| {
                let (message, date) = match c.commit {
                    Some(detail) => (
                        detail
                            .message
                            .map(|m| m.lines().next().unwrap_or_default().to_string()),
                        detail.author.and_then(|a| a.date),
                    ),
                    None => (None, None),
                };
                Commit {
                    sha: c.sha,
                    message,
                    date,
                    url: c.html_url,
                }
            })
            .collect())
    }

    async fn fetch_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: PrState,
        per_page: usize,
    ) -> GatewayResult<Vec<PullRequest>> {
        let data: Vec<GhPull> = self
            .get_json(&format!(
                "/repos/{owner}/{repo}/pulls?state={}&per_page={per_page}&sort=updated",
                state.as_str()
            ))
            .await?;
        Ok(data.into_iter().map(PullRequest::from).collect())
    }
}

/// Fetch PRs for the first `repo_limit` catalog entries, one repository at a time.
///
/// A failing repository is recorded in `repos_skipped` and the batch moves on;
/// `items` keep catalog order, then API order.
pub async fn fetch_all_pull_requests(
    vcs: &dyn VcsApi,
    repos: &[Repository],
    state: PrState,
    repo_limit: usize,
    per_repo: usize,
) -> PullRequestAggregate {
    let repo_limit = repo_limit.min(MAX_AGGREGATE_REPOS);
    let per_repo = per_repo.min(MAX_PRS_PER_REPO);
    let mut aggregate = PullRequestAggregate::default();

    for repo in repos.iter().take(repo_limit) {
        aggregate.repos_queried.push(repo.id.clone());

        match vcs
            .fetch_pull_requests(&repo.owner, &repo.repo, state, per_repo)
            .await
        {
            Ok(pulls) => {
                aggregate
                    .items
                    .extend(pulls.into_iter().map(|pr| AggregatedPullRequest {
                        repo_id: repo.id.clone(),
                        owner: repo.owner.clone(),
                        repo: repo.repo.clone(),
                        apps: repo.apps.clone(),
                        pr,
                    }));
            }
            Err(e) => {
                tracing::warn!(repo = %repo.id, error = %e, "Skipping repository in PR aggregation");
                crate::metrics::repo_skipped();
                aggregate.repos_skipped.push(SkippedRepo {
                    id: repo.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    aggregate
}
