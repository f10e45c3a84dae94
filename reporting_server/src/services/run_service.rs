//! Projection of raw PipelineRun/TaskRun records into reporting views.
//!
//! Everything here is a pure function of the fetched records.

use chrono::DateTime;
use serde_json::Value;

use crate::models::pipeline_run::{PipelineRun, PipelineRunDetail};
use crate::models::task_run::TaskRun;

/// Label linking a TaskRun to its PipelineRun.
pub const PIPELINE_RUN_LABEL: &str = "tekton.dev/pipelineRun";

const TEST_SUMMARY_RESULT: &str = "test-summary";
const PR_NUMBER_PARAM: &str = "pr-number";
const CHANGED_APP_PARAM: &str = "changed-app";

/// Status fields that have carried pipeline results across Tekton API versions,
/// newest first.
const RESULT_FIELDS: [&str; 2] = ["results", "pipelineResults"];

/// List view of a run: missing pipeline reference reads `-`, missing or empty condition reason reads `Unknown`.
pub fn normalize_run(raw: &Value) -> PipelineRun {
    let mut run = project_run(raw);
    run.pipeline.get_or_insert_with(|| "-".to_string());
    run.status = run
        .status
        .filter(|s| !s.is_empty())
        .or_else(|| Some("Unknown".to_string()));
    run
}

/// Single-run view. Unlike [`normalize_run`], `pipeline` and `status` stay
/// absent when the record lacks them.
pub fn normalize_run_detail(mut raw: Value) -> PipelineRunDetail {
    let run = project_run(&raw);
    PipelineRunDetail {
        run,
        spec: raw.get_mut("spec").map(Value::take).unwrap_or_default(),
        status_full: raw.get_mut("status").map(Value::take).unwrap_or_default(),
    }
}

/// Most recent `limit` runs, newest first. `list["items"]` must already be
/// sorted by ascending creation timestamp.
pub fn normalize_runs(list: &Value, limit: usize) -> Vec<PipelineRun> {
    let items = list["items"].as_array().map(Vec::as_slice).unwrap_or_default();
    let start = items.len().saturating_sub(limit);
    items[start..].iter().rev().map(normalize_run).collect()
}

pub fn normalize_task_run(raw: &Value) -> TaskRun {
    let condition = first_condition(raw);
    TaskRun {
        name: string_at(raw, "/metadata/name"),
        pipeline_run: raw["metadata"]["labels"][PIPELINE_RUN_LABEL]
            .as_str()
            .map(str::to_string),
        task: string_at(raw, "/spec/taskRef/name"),
        status: string_field(condition, "reason"),
        message: string_field(condition, "message"),
        start_time: string_at(raw, "/status/startTime"),
        completion_time: string_at(raw, "/status/completionTime"),
        status_full: raw["status"].clone(),
    }
}

pub fn normalize_task_runs(list: &Value) -> Vec<TaskRun> {
    list["items"]
        .as_array()
        .map(|items| items.iter().map(normalize_task_run).collect())
        .unwrap_or_default()
}

/// Whole seconds between two RFC 3339 timestamps, rounding halves up.
/// `None` unless both parse.
pub fn duration_seconds(start: Option<&str>, end: Option<&str>) -> Option<i64> {
    let start = DateTime::parse_from_rfc3339(start?).ok()?;
    let end = DateTime::parse_from_rfc3339(end?).ok()?;
    let millis = (end - start).num_milliseconds() as f64;
    Some((millis / 1000.0 + 0.5).floor() as i64)
}

/// Value of the `test-summary` result, wherever this record's schema keeps it.
pub fn test_summary(status: &Value) -> Option<String> {
    let results = RESULT_FIELDS
        .iter()
        .map(|field| &status[*field])
        .find(|value| !value.is_null())?;
    named_value(results, TEST_SUMMARY_RESULT)
}

/// First `{name, value}` entry in `list` whose name equals `name` exactly.
/// Empty and non-scalar values count as absent.
pub fn named_value(list: &Value, name: &str) -> Option<String> {
    let entry = list
        .as_array()?
        .iter()
        .find(|entry| entry["name"].as_str() == Some(name))?;
    scalar_text(&entry["value"])
}

fn project_run(raw: &Value) -> PipelineRun {
    let status = &raw["status"];
    let condition = first_condition(raw);
    let start_time = status["startTime"].as_str();
    let completion_time = status["completionTime"].as_str();
    let params = &raw["spec"]["params"];

    PipelineRun {
        name: string_at(raw, "/metadata/name"),
        namespace: string_at(raw, "/metadata/namespace"),
        pipeline: string_at(raw, "/spec/pipelineRef/name").filter(|s| !s.is_empty()),
        status: string_field(condition, "reason"),
        message: string_field(condition, "message"),
        start_time: start_time.map(str::to_string),
        completion_time: completion_time.map(str::to_string),
        duration_seconds: duration_seconds(start_time, completion_time),
        test_summary: test_summary(status),
        pr_number: named_value(params, PR_NUMBER_PARAM),
        changed_app: named_value(params, CHANGED_APP_PARAM),
    }
}

fn first_condition(raw: &Value) -> Option<&Value> {
    raw.pointer("/status/conditions/0")
}

fn string_at(raw: &Value, pointer: &str) -> Option<String> {
    raw.pointer(pointer)?.as_str().map(str::to_string)
}

fn string_field(value: Option<&Value>, field: &str) -> Option<String> {
    value?.get(field)?.as_str().map(str::to_string)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
