//! Tekton DAG reporting gateway.
//!
//! Surfaces PipelineRun/TaskRun status from the cluster, derives the
//! repository catalog from stack descriptors, aggregates pull requests across
//! those repositories from GitHub, and creates new PipelineRuns on demand.
//! All state is re-derived per request; cluster access goes through `kubectl`.

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod services;
