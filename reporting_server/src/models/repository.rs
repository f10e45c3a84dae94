//! Repository catalog entries derived from stack descriptors.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    /// `owner/repo`, unique within a catalog.
    pub id: String,
    pub owner: String,
    pub repo: String,
    pub apps: Vec<String>,
    pub stacks: Vec<String>,
}

impl Repository {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            id: format!("{owner}/{repo}"),
            owner: owner.to_string(),
            repo: repo.to_string(),
            apps: Vec::new(),
            stacks: Vec::new(),
        }
    }
}

/// App entry from the stack registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackApp {
    pub name: String,
    pub stack: String,
}

/// Stack files and registry apps, for the trigger form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackListing {
    pub stacks: Vec<String>,
    pub apps: Vec<StackApp>,
}
