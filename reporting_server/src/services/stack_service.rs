//! Stack registry — derives the repository catalog and the trigger form's
//! stack/app listing from the descriptors under `stacks/`.
//!
//! Parsing is line-oriented and lenient: malformed entries are skipped,
//! first-seen order is preserved, and nothing is cached between calls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::GatewayResult;
use crate::models::repository::{Repository, StackApp, StackListing};

/// Control files in the stacks directory that are not stack descriptors.
const RESERVED_FILES: [&str; 2] = ["registry.yaml", "versions.yaml"];
const REGISTRY_FILE: &str = "registry.yaml";

#[derive(Debug, Clone)]
pub struct StackRegistry {
    stacks_dir: PathBuf,
    platform_repo: String,
}

/// File contents with invalid UTF-8 replaced by U+FFFD.
async fn read_lossy(path: &Path) -> GatewayResult<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// One `- name:` entry from a stack descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEntry {
    pub name: String,
    pub repo: String,
}

impl StackRegistry {
    /// `platform_repo` is the `owner/name` always listed first.
    pub fn new(stacks_dir: impl Into<PathBuf>, platform_repo: impl Into<String>) -> Self {
        Self {
            stacks_dir: stacks_dir.into(),
            platform_repo: platform_repo.into(),
        }
    }

    /// Repository catalog: the platform repository, then every app repository
    /// in first-seen order across the (sorted) stack files.
    pub async fn list_repositories(&self) -> GatewayResult<Vec<Repository>> {
        let mut catalog = Catalog::default();
        if let Some((owner, repo)) = split_repo(&self.platform_repo) {
            let platform = catalog.entry(owner, repo);
            platform.apps.push("platform".to_string());
        }

        if !tokio::fs::try_exists(&self.stacks_dir).await? {
            return Ok(catalog.into_repositories());
        }

        for file in self.stack_files().await? {
            let content = read_lossy(&self.stacks_dir.join(&file)).await?;
            for app in parse_app_entries(&content) {
                let Some((owner, repo)) = split_repo(&app.repo) else {
                    tracing::debug!(stack = %file, app = %app.name, repo = %app.repo, "Ignoring malformed repo value");
                    continue;
                };
                let entry = catalog.entry(owner, repo);
                entry.apps.push(app.name);
                if !entry.stacks.contains(&file) {
                    entry.stacks.push(file.clone());
                }
            }
        }

        Ok(catalog.into_repositories())
    }

    /// Sorted stack files plus the apps declared in `registry.yaml`.
    pub async fn list_stacks(&self) -> GatewayResult<StackListing> {
        if !tokio::fs::try_exists(&self.stacks_dir).await? {
            return Ok(StackListing {
                stacks: Vec::new(),
                apps: Vec::new(),
            });
        }

        let stacks = self.stack_files().await?;
        let registry = self.stacks_dir.join(REGISTRY_FILE);
        let apps = if tokio::fs::try_exists(&registry).await? {
            parse_registry_apps(&read_lossy(&registry).await?)
        } else {
            Vec::new()
        };

        Ok(StackListing { stacks, apps })
    }

    /// Eligible `.yaml` descriptors, sorted by file name.
    async fn stack_files(&self) -> GatewayResult<Vec<String>> {
        let mut files = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.stacks_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.ends_with(".yaml") && !RESERVED_FILES.contains(&name.as_str()) {
                files.push(name);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Insertion-ordered repositories keyed by `owner/repo`.
#[derive(Default)]
struct Catalog {
    repos: Vec<Repository>,
    index: HashMap<String, usize>,
}

impl Catalog {
    fn entry(&mut self, owner: &str, repo: &str) -> &mut Repository {
        let id = format!("{owner}/{repo}");
        let idx = match self.index.get(&id) {
            Some(&idx) => idx,
            None => {
                self.repos.push(Repository::new(owner, repo));
                self.index.insert(id, self.repos.len() - 1);
                self.repos.len() - 1
            }
        };
        &mut self.repos[idx]
    }

    fn into_repositories(self) -> Vec<Repository> {
        self.repos
    }
}

/// Split `owner/name[/...]` into its first two segments; both must be non-empty.
pub fn split_repo(value: &str) -> Option<(&str, &str)> {
    let mut parts = value.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    Some((owner, repo))
}

/// Extract app entries from a stack descriptor.
///
/// An entry starts at an indented (two or more columns) `- name: <app>` list
/// item and runs until the next one; its repository is the first `repo:` key
/// inside it. Entries missing either value are dropped.
pub fn parse_app_entries(content: &str) -> Vec<AppEntry> {
    let mut entries = Vec::new();
    let mut current: Option<(Option<String>, Option<String>)> = None;

    for line in content.lines() {
        if let Some(rest) = list_item_name(line) {
            if let Some(entry) = current.take().and_then(complete_entry) {
                entries.push(entry);
            }
            current = Some((value_token(rest), None));
            continue;
        }

        if let Some((_, repo)) = current.as_mut() {
            if repo.is_none() {
                *repo = key_value(line, "repo").and_then(value_token);
            }
        }
    }

    if let Some(entry) = current.and_then(complete_entry) {
        entries.push(entry);
    }
    entries
}

/// Extract `{name, stack}` pairs from `registry.yaml`: a bare `name:` key at
/// exactly two columns of indentation, with `stack:` on the following line.
pub fn parse_registry_apps(content: &str) -> Vec<StackApp> {
    let lines: Vec<&str> = content.lines().collect();
    let mut apps = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(name) = registry_app_key(line) else {
            continue;
        };
        let stack = lines
            .get(i + 1)
            .and_then(|next| key_value(next, "stack"))
            .and_then(value_token)
            .unwrap_or_default();
        apps.push(StackApp {
            name: name.to_string(),
            stack,
        });
    }

    apps
}

fn complete_entry((name, repo): (Option<String>, Option<String>)) -> Option<AppEntry> {
    Some(AppEntry {
        name: name?,
        repo: repo?,
    })
}

/// Text after `name:` when `line` is an indented `- name:` list item.
fn list_item_name(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() < 2 {
        return None;
    }
    let after_dash = trimmed.strip_prefix('-')?;
    if !after_dash.starts_with(char::is_whitespace) {
        return None;
    }
    after_dash.trim_start().strip_prefix("name:")
}

/// Text after `<key>:` on a mapping line, tolerating a leading `- `.
fn key_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let trimmed = line.trim_start();
    let trimmed = trimmed
        .strip_prefix('-')
        .map(str::trim_start)
        .unwrap_or(trimmed);
    trimmed.strip_prefix(key)?.strip_prefix(':')
}

fn registry_app_key(line: &str) -> Option<&str> {
    let mut chars = line.chars();
    let indented = chars.next().is_some_and(char::is_whitespace)
        && chars.next().is_some_and(char::is_whitespace);
    if !indented {
        return None;
    }
    let key_part = line.get(2..)?;
    let (key, rest) = key_part.split_once(':')?;
    let valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    (valid_key && rest.trim().is_empty()).then_some(key)
}

/// First whitespace-delimited token, unquoted.
fn value_token(rest: &str) -> Option<String> {
    let token = rest.split_whitespace().next()?;
    let token = token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .or_else(|| token.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')))
        .unwrap_or(token);
    (!token.is_empty()).then(|| token.to_string())
}
