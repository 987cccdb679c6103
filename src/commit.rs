use std::fs;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use log::debug;
use serde::Deserialize;

use crate::document::{Commit, GitUser};
use crate::error::{BenchError, Result};

/// Subset of a GitHub Actions event payload (`$GITHUB_EVENT_PATH`).
#[derive(Deserialize)]
struct EventPayload {
    head_commit: Option<Commit>,
    pull_request: Option<PullRequest>,
}

#[derive(Deserialize)]
struct PullRequest {
    title: String,
    html_url: String,
    head: PullRequestHead,
}

#[derive(Deserialize)]
struct PullRequestHead {
    sha: String,
    user: PullRequestUser,
    repo: PullRequestRepo,
}

#[derive(Deserialize)]
struct PullRequestUser {
    login: String,
}

#[derive(Deserialize)]
struct PullRequestRepo {
    updated_at: String,
}

/// Reads the commit a workflow run was triggered for.
///
/// Push events carry the full commit. For pull requests the head sha is
/// used, with the PR title as message and the PR author as both author and
/// committer.
///
/// # Errors
///
/// Returns an error if the file cannot be read or describes neither a push
/// nor a pull request.
pub fn from_event_file(path: &Path) -> Result<Commit> {
    let contents = fs::read_to_string(path)?;
    let payload: EventPayload = serde_json::from_str(&contents)?;
    debug!("Read event payload from {}", path.display());
    from_event(payload)
}

fn from_event(payload: EventPayload) -> Result<Commit> {
    if let Some(commit) = payload.head_commit {
        return Ok(commit);
    }

    let pr = payload.pull_request.ok_or_else(|| {
        BenchError::InvalidEntry("event payload has neither head_commit nor pull_request".into())
    })?;
    let user = GitUser {
        email: String::new(),
        name: pr.head.user.login.clone(),
        username: Some(pr.head.user.login),
    };

    Ok(Commit {
        author: user.clone(),
        committer: user,
        distinct: true,
        url: format!("{}/commits/{}", pr.html_url, pr.head.sha),
        id: pr.head.sha,
        message: pr.title,
        timestamp: pr.head.repo.updated_at,
        tree_id: String::new(),
    })
}

/// Commit described on the command line, for runs outside GitHub Actions.
#[derive(Debug, Clone, Default)]
pub struct ManualCommit {
    pub id: String,
    pub timestamp: Option<String>,
    pub message: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
}

impl ManualCommit {
    /// Missing fields are left empty; the timestamp defaults to now.
    pub fn into_commit(self) -> Commit {
        let user = GitUser {
            email: String::new(),
            name: self.author.unwrap_or_default(),
            username: None,
        };

        Commit {
            author: user.clone(),
            committer: user,
            distinct: true,
            id: self.id,
            message: self.message.unwrap_or_default(),
            timestamp: self
                .timestamp
                .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            tree_id: String::new(),
            url: self.url.unwrap_or_default(),
        }
    }
}
