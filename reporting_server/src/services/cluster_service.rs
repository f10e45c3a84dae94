//! Cluster access through the `kubectl` command line, plus the script runner
//! used for the delegated run generator.
//!
//! Every call spawns one process, waits for it, and surfaces a nonzero exit
//! immediately. Nothing is retried.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{GatewayError, GatewayResult};

/// Captured output of a cluster command: parsed JSON when possible, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterOutput {
    Json(serde_json::Value),
    Text(String),
}

impl ClusterOutput {
    /// Parse captured stdout. Empty output counts as an empty object.
    pub fn parse(stdout: &str) -> Self {
        if stdout.trim().is_empty() {
            return Self::Json(serde_json::json!({}));
        }
        match serde_json::from_str(stdout) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(stdout.to_string()),
        }
    }

    /// The JSON document, or `Null` for text output.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Self::Json(value) => value,
            Self::Text(_) => serde_json::Value::Null,
        }
    }

    /// Name of the resource reported by a `create` call.
    ///
    /// Structured output yields `metadata.name`; confirmation text such as
    /// `pipelinerun.tekton.dev/stack-pr-x7k2p created` yields the first token
    /// after the last `/`.
    pub fn created_name(&self) -> Option<String> {
        match self {
            Self::Json(value) => value["metadata"]["name"].as_str().map(str::to_string),
            Self::Text(text) => {
                let (_, tail) = text.rsplit_once('/')?;
                let tail = tail.trim();
                let name = tail.split_whitespace().next().unwrap_or(tail);
                (!name.is_empty()).then(|| name.to_string())
            }
        }
    }
}

/// Query/create access to the orchestrator.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Run a read command, e.g. `get pipelineruns -n ns -o json`.
    async fn query(&self, args: &[String]) -> GatewayResult<ClusterOutput>;

    /// Create resources from a document piped on stdin.
    async fn create(&self, document: &str) -> GatewayResult<ClusterOutput>;
}

/// Runs an external program and captures its stdout.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[String]) -> GatewayResult<String>;
}

/// [`ClusterClient`] backed by the `kubectl` binary and its ambient credentials.
#[derive(Debug, Clone)]
pub struct KubectlClient {
    binary: String,
}

impl KubectlClient {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn invoke(&self, args: &[String], input: Option<&str>) -> GatewayResult<ClusterOutput> {
        let verb = args.first().map(String::as_str).unwrap_or("-");
        tracing::debug!(binary = %self.binary, ?args, "Running cluster command");

        let output = run_captured(Path::new(&self.binary), args, input, None).await?;
        let success = output.status.success();
        crate::metrics::cluster_command(verb, success);

        if !success {
            let message = failure_message(&output, &self.binary);
            tracing::warn!(verb, error = %message, "Cluster command failed");
            return Err(GatewayError::ClusterCommand(message));
        }

        Ok(ClusterOutput::parse(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl ClusterClient for KubectlClient {
    async fn query(&self, args: &[String]) -> GatewayResult<ClusterOutput> {
        self.invoke(args, None).await
    }

    async fn create(&self, document: &str) -> GatewayResult<ClusterOutput> {
        let args = ["create", "-f", "-"].map(String::from);
        self.invoke(&args, Some(document)).await
    }
}

/// [`ScriptRunner`] that spawns processes inside the repository root.
#[derive(Debug, Clone)]
pub struct ProcessScriptRunner {
    work_dir: PathBuf,
}

impl ProcessScriptRunner {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

#[async_trait]
impl ScriptRunner for ProcessScriptRunner {
    async fn run(&self, program: &Path, args: &[String]) -> GatewayResult<String> {
        tracing::info!(script = %program.display(), ?args, "Running script");

        let output = run_captured(program, args, None, Some(&self.work_dir)).await?;
        if !output.status.success() {
            return Err(GatewayError::GeneratorFailed(failure_message(&output, "Script")));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

async fn run_captured(
    program: &Path,
    args: &[String],
    input: Option<&str>,
    work_dir: Option<&Path>,
) -> std::io::Result<Output> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = work_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn()?;
    if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
        // The child may exit without reading stdin; its exit status decides.
        if let Err(err) = stdin.write_all(input.as_bytes()).await {
            if err.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(err);
            }
        }
        // stdin is dropped here so the child sees EOF
    }
    child.wait_with_output().await
}

/// Captured stderr, or `"<label> exited with code N"` when nothing was written.
fn failure_message(output: &Output, label: &str) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        format!("{label} exited with code {}", output.status.code().unwrap_or(-1))
    } else {
        stderr.into_owned()
    }
}
