//! Prometheus metrics for gateway observability.

use metrics::counter;

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record one invocation of the cluster command-line tool.
pub fn cluster_command(verb: &str, success: bool) {
    counter!(
        "dag_cluster_commands_total",
        "verb" => verb.to_string(),
        "outcome" => outcome(success)
    )
    .increment(1);
}

/// Record one GitHub API request.
pub fn vcs_request(success: bool) {
    counter!("dag_vcs_requests_total", "outcome" => outcome(success)).increment(1);
}

/// Record a repository skipped during PR aggregation.
pub fn repo_skipped() {
    counter!("dag_repos_skipped_total").increment(1);
}

/// Record a submitted pipeline run.
pub fn trigger_submitted(pipeline_type: &str) {
    counter!("dag_triggers_total", "pipeline_type" => pipeline_type.to_string()).increment(1);
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
