//! Gateway HTTP routes.

pub mod api;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::models::pipeline_run::{PipelineRun, PipelineRunDetail};
use crate::models::pull_request::{Branch, Commit, PrState, PullRequest, PullRequestAggregate, Tag};
use crate::models::repository::{Repository, StackListing};
use crate::models::task_run::TaskRun;
use crate::models::trigger::{TriggerRequest, TriggerResponse};
use crate::models::ItemList;
use crate::services::cluster_service::{ClusterClient, KubectlClient, ProcessScriptRunner, ScriptRunner};
use crate::services::github_service::{GithubClient, VcsApi};
use crate::services::stack_service::StackRegistry;
use crate::services::trigger_service;

/// Shared state for gateway route handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub cluster: Arc<dyn ClusterClient>,
    pub scripts: Arc<dyn ScriptRunner>,
    pub vcs: Arc<dyn VcsApi>,
    pub stacks: StackRegistry,
}

impl GatewayState {
    /// State wired to `kubectl`, local scripts and the GitHub API.
    pub fn from_config(config: GatewayConfig) -> Self {
        Self {
            cluster: Arc::new(KubectlClient::new(config.kubectl.clone())),
            scripts: Arc::new(ProcessScriptRunner::new(config.repo_root.clone())),
            vcs: Arc::new(GithubClient::new(
                config.github_api.clone(),
                config.github_token.clone(),
            )),
            stacks: StackRegistry::new(config.stacks_dir(), config.platform_repo.clone()),
            config: Arc::new(config),
        }
    }
}

/// Build the gateway's Axum router.
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        // Cluster
        .route("/api/pipelineruns", get(list_pipeline_runs))
        .route("/api/pipelineruns/{name}", get(get_pipeline_run))
        .route("/api/taskruns", get(list_task_runs))
        // Repositories
        .route("/api/repos", get(list_repos))
        .route("/api/repos/{owner}/{repo}/branches", get(list_branches))
        .route("/api/repos/{owner}/{repo}/tags", get(list_tags))
        .route("/api/repos/{owner}/{repo}/commits", get(list_commits))
        .route("/api/repos/{owner}/{repo}/prs", get(list_repo_prs))
        .route("/api/prs", get(aggregate_prs))
        // Trigger
        .route("/api/stacks", get(list_stacks))
        .route("/api/trigger", post(trigger_handler))
        .route("/api/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// ── Pipeline runs ──

async fn list_pipeline_runs(
    State(state): State<GatewayState>,
    Query(query): Query<api::PipelineRunsQuery>,
) -> GatewayResult<Json<ItemList<PipelineRun>>> {
    let limit = api::clamp_limit(
        query.limit.as_deref(),
        api::DEFAULT_RUN_LIMIT,
        api::MAX_RUN_LIMIT,
    );
    let namespace = api::namespace_or(query.namespace.as_deref(), &state.config.namespace);

    api::list_pipeline_runs(state.cluster.as_ref(), namespace, limit)
        .await
        .map(|items| Json(items.into()))
}

async fn get_pipeline_run(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
    Query(query): Query<api::NamespaceQuery>,
) -> GatewayResult<Json<PipelineRunDetail>> {
    let namespace = api::namespace_or(query.namespace.as_deref(), &state.config.namespace);

    api::get_pipeline_run(state.cluster.as_ref(), namespace, &name)
        .await
        .map(Json)
}

async fn list_task_runs(
    State(state): State<GatewayState>,
    Query(query): Query<api::TaskRunsQuery>,
) -> GatewayResult<Json<ItemList<TaskRun>>> {
    let namespace = api::namespace_or(query.namespace.as_deref(), &state.config.namespace);

    api::list_task_runs(state.cluster.as_ref(), namespace, query.pipeline_run.as_deref())
        .await
        .map(|items| Json(items.into()))
}

// ── Repositories ──

async fn list_repos(State(state): State<GatewayState>) -> GatewayResult<Json<ItemList<Repository>>> {
    let repos = state.stacks.list_repositories().await?;
    Ok(Json(repos.into()))
}

async fn list_branches(
    State(state): State<GatewayState>,
    Path((owner, repo)): Path<(String, String)>,
) -> GatewayResult<Json<ItemList<Branch>>> {
    let branches = state.vcs.fetch_branches(&owner, &repo).await?;
    Ok(Json(branches.into()))
}

async fn list_tags(
    State(state): State<GatewayState>,
    Path((owner, repo)): Path<(String, String)>,
) -> GatewayResult<Json<ItemList<Tag>>> {
    let tags = state.vcs.fetch_tags(&owner, &repo).await?;
    Ok(Json(tags.into()))
}

async fn list_commits(
    State(state): State<GatewayState>,
    Path((owner, repo)): Path<(String, String)>,
) -> GatewayResult<Json<ItemList<Commit>>> {
    let commits = state.vcs.fetch_commits(&owner, &repo).await?;
    Ok(Json(commits.into()))
}

async fn list_repo_prs(
    State(state): State<GatewayState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<api::StateQuery>,
) -> GatewayResult<Json<ItemList<PullRequest>>> {
    let state_filter = PrState::parse(query.state.as_deref());
    let pulls = state
        .vcs
        .fetch_pull_requests(&owner, &repo, state_filter, api::REPO_PRS_PER_PAGE)
        .await?;
    Ok(Json(pulls.into()))
}

async fn aggregate_prs(
    State(state): State<GatewayState>,
    Query(query): Query<api::PullRequestsQuery>,
) -> GatewayResult<Json<PullRequestAggregate>> {
    api::aggregate_pull_requests(&state.stacks, state.vcs.as_ref(), &query)
        .await
        .map(Json)
}

// ── Trigger ──

async fn list_stacks(State(state): State<GatewayState>) -> GatewayResult<Json<StackListing>> {
    state.stacks.list_stacks().await.map(Json)
}

async fn trigger_handler(
    State(state): State<GatewayState>,
    payload: Result<Json<TriggerRequest>, JsonRejection>,
) -> GatewayResult<Json<TriggerResponse>> {
    let Json(req) = payload.map_err(|e| GatewayError::Validation(e.body_text()))?;

    trigger_service::trigger(
        &state.config,
        state.scripts.as_ref(),
        state.cluster.as_ref(),
        req,
    )
    .await
    .map(Json)
}

async fn health() -> Json<api::HealthResponse> {
    Json(api::HealthResponse { ok: true })
}
