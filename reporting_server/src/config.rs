//! Gateway configuration — loaded from environment variables.

use std::path::{Path, PathBuf};

/// Directory under the repository root that holds stack descriptors.
pub const STACKS_DIR_NAME: &str = "stacks";

/// Maximum number of parent hops when searching for the repository root.
const ROOT_SEARCH_HOPS: usize = 5;

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Namespace the pipeline engine runs in.
    pub namespace: String,
    /// Checkout of the pipeline repository (holds `stacks/` and `scripts/`).
    pub repo_root: PathBuf,
    /// Secret mounted as the `ssh-key` workspace of bootstrap runs.
    pub git_ssh_secret: String,
    /// Claim mounted as the `build-cache` workspace of bootstrap runs.
    pub cache_pvc: String,
    /// GitHub token for API calls. Empty means anonymous.
    pub github_token: String,
    /// Base URL of the GitHub REST API.
    pub github_api: String,
    /// Cluster command-line binary.
    pub kubectl: String,
    /// `owner/name` of the platform repository.
    pub platform_repo: String,
}

impl GatewayConfig {
    pub fn from_env(repo_root: PathBuf) -> Self {
        let namespace =
            std::env::var("TEKTON_NAMESPACE").unwrap_or_else(|_| "tekton-pipelines".to_string());
        let git_ssh_secret =
            std::env::var("GIT_SSH_SECRET_NAME").unwrap_or_else(|_| "git-ssh-key".to_string());
        let cache_pvc = std::env::var("CACHE_PVC").unwrap_or_else(|_| "build-cache".to_string());
        let github_token = std::env::var("GITHUB_TOKEN").unwrap_or_default();
        let github_api =
            std::env::var("GITHUB_API").unwrap_or_else(|_| "https://api.github.com".to_string());
        let kubectl = std::env::var("KUBECTL").unwrap_or_else(|_| "kubectl".to_string());
        let platform_repo =
            std::env::var("PLATFORM_REPO").unwrap_or_else(|_| "jmjava/tekton-dag".to_string());

        if github_token.is_empty() {
            tracing::warn!("GITHUB_TOKEN not set -- GitHub API calls are unauthenticated and rate limited");
        }

        Self {
            namespace,
            repo_root,
            git_ssh_secret,
            cache_pvc,
            github_token,
            github_api,
            kubectl,
            platform_repo,
        }
    }

    /// Configuration with built-in defaults rooted at `repo_root`; nothing is read from the environment.
    pub fn with_defaults(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            namespace: "tekton-pipelines".to_string(),
            repo_root: repo_root.into(),
            git_ssh_secret: "git-ssh-key".to_string(),
            cache_pvc: "build-cache".to_string(),
            github_token: String::new(),
            github_api: "https://api.github.com".to_string(),
            kubectl: "kubectl".to_string(),
            platform_repo: "jmjava/tekton-dag".to_string(),
        }
    }

    pub fn stacks_dir(&self) -> PathBuf {
        self.repo_root.join(STACKS_DIR_NAME)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.repo_root.join("scripts")
    }

    /// Clone URL used when a trigger omits `gitUrl`.
    pub fn platform_git_url(&self) -> String {
        format!("https://github.com/{}.git", self.platform_repo)
    }
}

/// Resolve the repository root: an explicit path wins, otherwise walk upward
/// from `start` looking for a `stacks` directory, falling back to `start`.
pub fn resolve_repo_root(explicit: Option<PathBuf>, start: &Path) -> PathBuf {
    if let Some(root) = explicit {
        return root;
    }

    start
        .ancestors()
        .take(ROOT_SEARCH_HOPS + 1)
        .find(|dir| dir.join(STACKS_DIR_NAME).is_dir())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| start.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_root_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("stacks")).unwrap();

        let root = resolve_repo_root(Some(PathBuf::from("/opt/dag")), dir.path());
        assert_eq!(root, PathBuf::from("/opt/dag"));
    }

    #[test]
    fn walks_up_to_stacks_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("stacks")).unwrap();
        let nested = dir.path().join("reporting-gui").join("backend");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(resolve_repo_root(None, &nested), dir.path());
    }

    #[test]
    fn falls_back_to_start_when_no_stacks_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(resolve_repo_root(None, &nested), nested);
    }

    #[test]
    fn platform_git_url_follows_platform_repo() {
        let mut config = GatewayConfig::with_defaults("/tmp");
        assert_eq!(
            config.platform_git_url(),
            "https://github.com/jmjava/tekton-dag.git"
        );
        config.platform_repo = "acme/platform".to_string();
        assert_eq!(config.platform_git_url(), "https://github.com/acme/platform.git");
    }
}
