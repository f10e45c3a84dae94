//! REST API for pipeline runs, task runs, repositories, PRs and stacks.
//!
//! Each call re-reads the cluster, the stack files, or GitHub; nothing is cached.

use serde::{Deserialize, Serialize};

use crate::error::GatewayResult;
use crate::models::pipeline_run::{PipelineRun, PipelineRunDetail};
use crate::models::pull_request::{PrState, PullRequestAggregate};
use crate::models::task_run::TaskRun;
use crate::services::cluster_service::ClusterClient;
use crate::services::github_service::{self, VcsApi, MAX_AGGREGATE_REPOS, MAX_PRS_PER_REPO};
use crate::services::run_service::{self, PIPELINE_RUN_LABEL};
use crate::services::stack_service::StackRegistry;

pub const DEFAULT_RUN_LIMIT: usize = 50;
pub const MAX_RUN_LIMIT: usize = 100;
pub const DEFAULT_PRS_PER_REPO: usize = 15;
/// Page size for single-repository PR listings.
pub const REPO_PRS_PER_PAGE: usize = 30;

#[derive(Debug, Default, Deserialize)]
pub struct PipelineRunsQuery {
    pub limit: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NamespaceQuery {
    pub namespace: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunsQuery {
    pub pipeline_run: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StateQuery {
    pub state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PullRequestsQuery {
    pub state: Option<String>,
    pub repos: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Parse a numeric query value into `1..=max`. Missing, unparseable or zero
/// values fall back to `default`.
pub fn clamp_limit(raw: Option<&str>, default: usize, max: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n != 0)
        .map(|n| n.clamp(1, max as i64) as usize)
        .unwrap_or(default)
        .min(max)
}

/// Requested namespace, or the configured one when absent/blank.
pub fn namespace_or<'a>(requested: Option<&'a str>, fallback: &'a str) -> &'a str {
    requested.filter(|s| !s.trim().is_empty()).unwrap_or(fallback)
}

/// Most recent pipeline runs, newest first.
pub async fn list_pipeline_runs(
    cluster: &dyn ClusterClient,
    namespace: &str,
    limit: usize,
) -> GatewayResult<Vec<PipelineRun>> {
    let args = [
        "get",
        "pipelineruns",
        "-n",
        namespace,
        "-o",
        "json",
        "--sort-by=.metadata.creationTimestamp",
    ]
    .map(String::from);
    let data = cluster.query(&args).await?.into_json();
    Ok(run_service::normalize_runs(&data, limit))
}

pub async fn get_pipeline_run(
    cluster: &dyn ClusterClient,
    namespace: &str,
    name: &str,
) -> GatewayResult<PipelineRunDetail> {
    let args = ["get", "pipelinerun", name, "-n", namespace, "-o", "json"].map(String::from);
    let data = cluster.query(&args).await?.into_json();
    Ok(run_service::normalize_run_detail(data))
}

/// Task runs in `namespace`, optionally only those of one pipeline run.
pub async fn list_task_runs(
    cluster: &dyn ClusterClient,
    namespace: &str,
    pipeline_run: Option<&str>,
) -> GatewayResult<Vec<TaskRun>> {
    let mut args: Vec<String> = ["get", "taskruns", "-n", namespace]
        .into_iter()
        .map(String::from)
        .collect();
    if let Some(run) = pipeline_run.filter(|s| !s.is_empty()) {
        args.push("-l".to_string());
        args.push(format!("{PIPELINE_RUN_LABEL}={run}"));
    }
    args.extend(["-o".to_string(), "json".to_string()]);

    let data = cluster.query(&args).await?.into_json();
    Ok(run_service::normalize_task_runs(&data))
}

/// Open/closed PRs across the stack catalog, skipping unreachable repositories.
pub async fn aggregate_pull_requests(
    stacks: &StackRegistry,
    vcs: &dyn VcsApi,
    query: &PullRequestsQuery,
) -> GatewayResult<PullRequestAggregate> {
    let state = PrState::parse(query.state.as_deref());
    let repo_limit = clamp_limit(query.repos.as_deref(), MAX_AGGREGATE_REPOS, MAX_AGGREGATE_REPOS);
    let per_repo = clamp_limit(query.per_page.as_deref(), DEFAULT_PRS_PER_REPO, MAX_PRS_PER_REPO);

    let repos = stacks.list_repositories().await?;
    let aggregate =
        github_service::fetch_all_pull_requests(vcs, &repos, state, repo_limit, per_repo).await;

    tracing::info!(
        state = state.as_str(),
        queried = aggregate.repos_queried.len(),
        skipped = aggregate.repos_skipped.len(),
        items = aggregate.items.len(),
        "Aggregated pull requests"
    );
    Ok(aggregate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_applies_default_and_ceiling() {
        assert_eq!(clamp_limit(None, 50, 100), 50);
        assert_eq!(clamp_limit(Some("abc"), 50, 100), 50);
        assert_eq!(clamp_limit(Some("0"), 50, 100), 50);
        assert_eq!(clamp_limit(Some("10"), 50, 100), 10);
        assert_eq!(clamp_limit(Some("500"), 50, 100), 100);
        assert_eq!(clamp_limit(Some("-5"), 50, 100), 1);
    }

    #[test]
    fn blank_namespace_uses_fallback() {
        assert_eq!(namespace_or(None, "tekton-pipelines"), "tekton-pipelines");
        assert_eq!(namespace_or(Some(""), "tekton-pipelines"), "tekton-pipelines");
        assert_eq!(namespace_or(Some("ci"), "tekton-pipelines"), "ci");
    }
}
