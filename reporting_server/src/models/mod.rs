//! Reporting views and request shapes, re-derived per request.

pub mod pipeline_run;
pub mod pull_request;
pub mod repository;
pub mod task_run;
pub mod trigger;

use serde::Serialize;

/// `{items: [...]}` envelope used by list endpoints.
#[derive(Debug, Serialize)]
pub struct ItemList<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ItemList<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}
