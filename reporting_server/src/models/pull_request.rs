//! Trimmed GitHub shapes and the cross-repository PR aggregate.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub name: String,
    pub sha: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub name: String,
    pub sha: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub sha: String,
    /// First line of the commit message.
    pub message: Option<String>,
    pub date: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub url: Option<String>,
}

/// PR state filter. Anything other than `closed` or `all` means `open`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrState {
    #[default]
    Open,
    Closed,
    All,
}

impl PrState {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("closed") => Self::Closed,
            Some("all") => Self::All,
            _ => Self::Open,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

/// One PR tagged with the catalog entry it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedPullRequest {
    pub repo_id: String,
    pub owner: String,
    pub repo: String,
    pub apps: Vec<String>,
    pub pr: PullRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRepo {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestAggregate {
    pub items: Vec<AggregatedPullRequest>,
    pub repos_queried: Vec<String>,
    pub repos_skipped: Vec<SkippedRepo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_state_means_open() {
        assert_eq!(PrState::parse(None), PrState::Open);
        assert_eq!(PrState::parse(Some("merged")), PrState::Open);
        assert_eq!(PrState::parse(Some("closed")), PrState::Closed);
        assert_eq!(PrState::parse(Some("all")).as_str(), "all");
    }
}
