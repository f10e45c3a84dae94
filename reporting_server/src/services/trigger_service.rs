//! Trigger synthesis — validates a trigger request, builds the PipelineRun
//! document (inline for bootstrap, via `generate-run.sh` for pr/merge) and
//! submits it to the cluster.

use std::path::PathBuf;

use serde_json::{json, Value};

use crate::config::{GatewayConfig, STACKS_DIR_NAME};
use crate::error::{GatewayError, GatewayResult};
use crate::models::trigger::{PipelineType, TriggerRequest, TriggerResponse, ValidatedTrigger};
use crate::services::cluster_service::{ClusterClient, ScriptRunner};

const GENERATOR_SCRIPT: &str = "generate-run.sh";
const DEFAULT_REVISION: &str = "main";
const DEFAULT_REGISTRY: &str = "localhost:5000";
const GENERATOR_DEFAULT_STORAGE_CLASS: &str = "gp3";

const BOOTSTRAP_PIPELINE: &str = "stack-bootstrap";
const BOOTSTRAP_SERVICE_ACCOUNT: &str = "tekton-pr-sa";
const BOOTSTRAP_IMAGE_TAG: &str = "base-1";
const BOOTSTRAP_WORKSPACE_SIZE: &str = "10Gi";

/// A PipelineRun document ready for `create`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionDocument {
    /// Built in-process.
    Inline(Value),
    /// Generator stdout, passed through verbatim.
    Generated(String),
}

impl ExecutionDocument {
    pub fn to_text(&self) -> GatewayResult<String> {
        match self {
            Self::Inline(doc) => Ok(serde_json::to_string_pretty(doc)?),
            Self::Generated(text) => Ok(text.clone()),
        }
    }
}

/// Check a raw request and apply defaults. Runs before any external call.
pub fn validate(req: TriggerRequest, config: &GatewayConfig) -> GatewayResult<ValidatedTrigger> {
    let pipeline_type = non_blank(req.pipeline_type)
        .as_deref()
        .and_then(PipelineType::parse)
        .ok_or_else(|| {
            GatewayError::Validation("pipelineType must be pr, bootstrap, or merge".to_string())
        })?;

    let stack = non_blank(req.stack)
        .ok_or_else(|| GatewayError::Validation("stack is required".to_string()))?;

    let pr_number = req.pr_number.filter(|n| !n.is_blank()).map(|n| n.to_string());
    if pipeline_type == PipelineType::Pr && pr_number.is_none() {
        return Err(GatewayError::Validation(
            "prNumber is required for PR runs".to_string(),
        ));
    }

    let app = non_blank(req.app)
        .ok_or_else(|| GatewayError::Validation("app (changed-app) is required".to_string()))?;

    Ok(ValidatedTrigger {
        pipeline_type,
        stack,
        app,
        pr_number: pr_number.filter(|_| pipeline_type == PipelineType::Pr),
        git_url: non_blank(req.git_url).unwrap_or_else(|| config.platform_git_url()),
        git_revision: non_blank(req.git_revision).unwrap_or_else(|| DEFAULT_REVISION.to_string()),
        image_registry: non_blank(req.image_registry)
            .unwrap_or_else(|| DEFAULT_REGISTRY.to_string()),
        version_overrides: non_blank(req.version_overrides),
        build_images: req.build_images.unwrap_or(false),
        storage_class: req.storage_class.unwrap_or_default(),
    })
}

/// Build the document for a validated trigger.
pub async fn synthesize(
    config: &GatewayConfig,
    scripts: &dyn ScriptRunner,
    trigger: &ValidatedTrigger,
) -> GatewayResult<ExecutionDocument> {
    match trigger.pipeline_type {
        PipelineType::Bootstrap => Ok(ExecutionDocument::Inline(bootstrap_document(
            config, trigger,
        ))),
        PipelineType::Pr | PipelineType::Merge => {
            let script = generator_path(config);
            if !tokio::fs::try_exists(&script).await? {
                return Err(GatewayError::GeneratorUnavailable(format!(
                    "{GENERATOR_SCRIPT} not found"
                )));
            }
            let stdout = scripts.run(&script, &generator_args(trigger)).await?;
            Ok(ExecutionDocument::Generated(stdout))
        }
    }
}

/// Create the run and report its name. Falls back to `created` when the
/// cluster output names nothing.
pub async fn submit(
    cluster: &dyn ClusterClient,
    document: &ExecutionDocument,
    namespace: &str,
) -> GatewayResult<TriggerResponse> {
    let output = cluster.create(&document.to_text()?).await?;
    let pipeline_run = output
        .created_name()
        .unwrap_or_else(|| "created".to_string());

    Ok(TriggerResponse {
        ok: true,
        pipeline_run,
        namespace: namespace.to_string(),
    })
}

/// Validate, synthesize, and submit one trigger request.
pub async fn trigger(
    config: &GatewayConfig,
    scripts: &dyn ScriptRunner,
    cluster: &dyn ClusterClient,
    req: TriggerRequest,
) -> GatewayResult<TriggerResponse> {
    let trigger = validate(req, config)?;
    let document = synthesize(config, scripts, &trigger).await?;
    let response = submit(cluster, &document, &config.namespace).await?;

    crate::metrics::trigger_submitted(trigger.pipeline_type.as_str());
    tracing::info!(
        pipeline_type = %trigger.pipeline_type,
        stack = %trigger.stack,
        app = %trigger.app,
        pipeline_run = %response.pipeline_run,
        "Pipeline run created"
    );

    Ok(response)
}

/// `foo.yaml` becomes `stacks/foo.yaml`; already-prefixed paths are kept.
pub fn stack_file_path(stack: &str) -> String {
    let prefix = format!("{STACKS_DIR_NAME}/");
    if stack.starts_with(&prefix) {
        stack.to_string()
    } else {
        format!("{prefix}{stack}")
    }
}

pub fn bootstrap_document(config: &GatewayConfig, trigger: &ValidatedTrigger) -> Value {
    json!({
        "apiVersion": "tekton.dev/v1",
        "kind": "PipelineRun",
        "metadata": {
            "generateName": format!("{BOOTSTRAP_PIPELINE}-"),
            "namespace": config.namespace,
        },
        "spec": {
            "pipelineRef": { "name": BOOTSTRAP_PIPELINE },
            "taskRunTemplate": { "serviceAccountName": BOOTSTRAP_SERVICE_ACCOUNT },
            "params": [
                { "name": "git-url", "value": trigger.git_url },
                { "name": "git-revision", "value": trigger.git_revision },
                { "name": "stack-file", "value": stack_file_path(&trigger.stack) },
                { "name": "image-registry", "value": trigger.image_registry },
                { "name": "image-tag", "value": BOOTSTRAP_IMAGE_TAG },
            ],
            "workspaces": [
                {
                    "name": "shared-workspace",
                    "volumeClaimTemplate": {
                        "spec": {
                            "accessModes": ["ReadWriteOnce"],
                            "resources": { "requests": { "storage": BOOTSTRAP_WORKSPACE_SIZE } },
                        }
                    }
                },
                {
                    "name": "ssh-key",
                    "secret": { "secretName": config.git_ssh_secret },
                },
                {
                    "name": "build-cache",
                    "persistentVolumeClaim": { "claimName": config.cache_pvc },
                },
            ],
        }
    })
}

pub fn generator_path(config: &GatewayConfig) -> PathBuf {
    config.scripts_dir().join(GENERATOR_SCRIPT)
}

/// Command-line flags for `generate-run.sh`.
pub fn generator_args(trigger: &ValidatedTrigger) -> Vec<String> {
    let storage_class = if trigger.storage_class.is_empty() {
        GENERATOR_DEFAULT_STORAGE_CLASS
    } else {
        trigger.storage_class.as_str()
    };

    let mut args: Vec<String> = [
        "--mode",
        trigger.pipeline_type.as_str(),
        "--stack",
        trigger.stack.as_str(),
        "--app",
        trigger.app.as_str(),
        "--git-url",
        trigger.git_url.as_str(),
        "--git-revision",
        trigger.git_revision.as_str(),
        "--registry",
        trigger.image_registry.as_str(),
        "--storage-class",
        storage_class,
    ]
    .into_iter()
    .map(String::from)
    .collect();

    if let Some(pr) = &trigger.pr_number {
        args.extend(["--pr".to_string(), pr.clone()]);
    }
    if let Some(overrides) = &trigger.version_overrides {
        args.extend(["--version-overrides".to_string(), overrides.clone()]);
    }
    if trigger.build_images {
        args.push("--build-images".to_string());
    }
    args
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::models::trigger::PrNumber;
    use crate::services::cluster_service::ClusterOutput;

    fn request(pipeline_type: &str) -> TriggerRequest {
        TriggerRequest {
            pipeline_type: Some(pipeline_type.to_string()),
            stack: Some("stack-one.yaml".to_string()),
            app: Some("demo-fe".to_string()),
            ..Default::default()
        }
    }

    fn config() -> GatewayConfig {
        GatewayConfig::with_defaults("/nonexistent/repo")
    }

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
    }

    #[async_trait]
    impl ScriptRunner for RecordingRunner {
        async fn run(&self, program: &Path, args: &[String]) -> GatewayResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_path_buf(), args.to_vec()));
            Ok("apiVersion: tekton.dev/v1\nkind: PipelineRun\n".to_string())
        }
    }

    #[derive(Default)]
    struct RecordingCluster {
        documents: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ClusterClient for RecordingCluster {
        async fn query(&self, _args: &[String]) -> GatewayResult<ClusterOutput> {
            Ok(ClusterOutput::Json(json!({"items": []})))
        }

        async fn create(&self, document: &str) -> GatewayResult<ClusterOutput> {
            self.documents.lock().unwrap().push(document.to_string());
            Ok(ClusterOutput::Text(
                "pipelinerun.tekton.dev/stack-pr-42-x7k2p created\n".to_string(),
            ))
        }
    }

    fn validation_message(req: TriggerRequest) -> String {
        match validate(req, &config()) {
            Err(GatewayError::Validation(message)) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_pipeline_type() {
        let message = validation_message(request("widget"));
        assert!(message.contains("pr, bootstrap, or merge"), "{message}");
        let message = validation_message(TriggerRequest::default());
        assert!(message.contains("pipelineType"), "{message}");
    }

    #[test]
    fn pr_runs_need_pr_number() {
        let message = validation_message(request("pr"));
        assert!(message.contains("prNumber"), "{message}");

        let mut req = request("pr");
        req.pr_number = Some(PrNumber::Number(0));
        assert!(validation_message(req).contains("prNumber"));
    }

    #[test]
    fn stack_checked_before_app() {
        let req = TriggerRequest {
            pipeline_type: Some("merge".to_string()),
            ..Default::default()
        };
        assert_eq!(validation_message(req), "stack is required");

        let mut req = request("bootstrap");
        req.app = Some(" ".to_string());
        assert_eq!(validation_message(req), "app (changed-app) is required");
    }

    #[test]
    fn applies_defaults() {
        let trigger = validate(request("merge"), &config()).unwrap();
        assert_eq!(trigger.git_url, "https://github.com/jmjava/tekton-dag.git");
        assert_eq!(trigger.git_revision, "main");
        assert_eq!(trigger.image_registry, "localhost:5000");
        assert_eq!(trigger.storage_class, "");
        assert_eq!(trigger.pr_number, None);
        assert!(!trigger.build_images);
    }

    #[test]
    fn pr_number_only_kept_for_pr_runs() {
        let mut req = request("merge");
        req.pr_number = Some(PrNumber::Number(12));
        assert_eq!(validate(req, &config()).unwrap().pr_number, None);
    }

    #[test]
    fn bootstrap_stack_path_is_prefixed_once() {
        assert_eq!(stack_file_path("foo.yaml"), "stacks/foo.yaml");
        assert_eq!(stack_file_path("stacks/foo.yaml"), "stacks/foo.yaml");
    }

    #[test]
    fn bootstrap_document_binds_params_and_workspaces() {
        let mut config = config();
        config.namespace = "ci".to_string();
        config.git_ssh_secret = "deploy-key".to_string();
        let trigger = validate(request("bootstrap"), &config).unwrap();

        let doc = bootstrap_document(&config, &trigger);
        assert_eq!(doc["metadata"]["generateName"], "stack-bootstrap-");
        assert_eq!(doc["metadata"]["namespace"], "ci");
        assert_eq!(doc["spec"]["taskRunTemplate"]["serviceAccountName"], "tekton-pr-sa");

        let params = &doc["spec"]["params"];
        assert_eq!(params[2], json!({"name": "stack-file", "value": "stacks/stack-one.yaml"}));
        assert_eq!(params[4], json!({"name": "image-tag", "value": "base-1"}));

        let workspaces = &doc["spec"]["workspaces"];
        assert_eq!(
            workspaces[0]["volumeClaimTemplate"]["spec"]["resources"]["requests"]["storage"],
            "10Gi"
        );
        assert_eq!(workspaces[1]["secret"]["secretName"], "deploy-key");
        assert_eq!(workspaces[2]["persistentVolumeClaim"]["claimName"], "build-cache");
    }

    #[test]
    fn generator_args_for_pr_run() {
        let mut req = request("pr");
        req.pr_number = Some(PrNumber::Text("42".to_string()));
        req.version_overrides = Some("demo-fe=1.2.3".to_string());
        req.build_images = Some(true);
        let trigger = validate(req, &config()).unwrap();

        assert_eq!(
            generator_args(&trigger),
            [
                "--mode",
                "pr",
                "--stack",
                "stack-one.yaml",
                "--app",
                "demo-fe",
                "--git-url",
                "https://github.com/jmjava/tekton-dag.git",
                "--git-revision",
                "main",
                "--registry",
                "localhost:5000",
                "--storage-class",
                "gp3",
                "--pr",
                "42",
                "--version-overrides",
                "demo-fe=1.2.3",
                "--build-images",
            ]
        );
    }

    #[test]
    fn generator_args_keep_explicit_storage_class() {
        let mut req = request("merge");
        req.storage_class = Some("standard".to_string());
        let args = generator_args(&validate(req, &config()).unwrap());
        assert_eq!(args.last().map(String::as_str), Some("standard"));
        assert!(!args.contains(&"--pr".to_string()));
    }

    #[test]
    fn loose_body_fields_map_to_generator_flags() {
        let req: TriggerRequest = serde_json::from_value(json!({
            "pipelineType": "merge",
            "stack": "stack-one.yaml",
            "app": "demo-fe",
            "versionOverrides": {"demo-fe": "1.2.3"},
            "buildImages": "yes"
        }))
        .unwrap();
        let args = generator_args(&validate(req, &config()).unwrap());
        assert!(!args.contains(&"--version-overrides".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--build-images"));
    }

    #[tokio::test]
    async fn missing_generator_is_reported() {
        let runner = RecordingRunner::default();
        let trigger = validate(request("merge"), &config()).unwrap();

        let err = synthesize(&config(), &runner, &trigger).await.unwrap_err();
        assert!(matches!(err, GatewayError::GeneratorUnavailable(_)));
        assert_eq!(err.to_string(), "generate-run.sh not found");
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generator_output_is_submitted_verbatim() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("scripts")).unwrap();
        std::fs::write(root.path().join("scripts/generate-run.sh"), "#!/bin/sh\n").unwrap();
        let config = GatewayConfig::with_defaults(root.path());
        let runner = RecordingRunner::default();
        let cluster = RecordingCluster::default();

        let mut req = request("pr");
        req.pr_number = Some(PrNumber::Number(42));
        let response = trigger(&config, &runner, &cluster, req).await.unwrap();

        assert_eq!(
            response,
            TriggerResponse {
                ok: true,
                pipeline_run: "stack-pr-42-x7k2p".to_string(),
                namespace: "tekton-pipelines".to_string(),
            }
        );
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].0, root.path().join("scripts/generate-run.sh"));
        assert_eq!(
            cluster.documents.lock().unwrap()[0],
            "apiVersion: tekton.dev/v1\nkind: PipelineRun\n"
        );
    }

    #[tokio::test]
    async fn bootstrap_skips_generator() {
        let runner = RecordingRunner::default();
        let cluster = RecordingCluster::default();

        trigger(&config(), &runner, &cluster, request("bootstrap"))
            .await
            .unwrap();

        assert!(runner.calls.lock().unwrap().is_empty());
        let submitted: Value =
            serde_json::from_str(&cluster.documents.lock().unwrap()[0]).unwrap();
        assert_eq!(submitted["spec"]["pipelineRef"]["name"], "stack-bootstrap");
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_cluster() {
        let runner = RecordingRunner::default();
        let cluster = RecordingCluster::default();

        let err = trigger(&config(), &runner, &cluster, request("widget"))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Validation(_)));
        assert!(cluster.documents.lock().unwrap().is_empty());
    }
}
