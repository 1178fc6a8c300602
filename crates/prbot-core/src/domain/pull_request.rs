//! The pull request an evaluation runs against.

use prbot_host::PullRequestRecord;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Immutable snapshot of the pull request in the current context.
///
/// Only constructible through validation, so every field is known to be
/// present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    author: String,
    repo_owner: String,
    repo_name: String,
    number: u64,
    head_sha: String,
    base_sha: String,
    branch_name: String,
}

/// Input fields for constructing a [`PullRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullRequestFields {
    pub number: u64,
    pub author: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub head_sha: String,
    pub base_sha: String,
    pub branch_name: String,
}

impl PullRequest {
    /// Validate `fields`, reporting the first missing one.
    pub fn new(fields: PullRequestFields) -> Result<Self, ValidationError> {
        let missing = |field| Err(ValidationError::MissingPullRequestField { field });
        if fields.number == 0 {
            return missing("pull request number");
        }
        if fields.author.is_empty() {
            return missing("user login");
        }
        if fields.repo_owner.is_empty() {
            return missing("repository owner");
        }
        if fields.repo_name.is_empty() {
            return missing("repository name");
        }
        if fields.head_sha.is_empty() {
            return missing("head commit sha");
        }
        if fields.base_sha.is_empty() {
            return missing("base commit sha");
        }
        if fields.branch_name.is_empty() {
            return missing("branch name");
        }

        Ok(Self {
            author: fields.author,
            repo_owner: fields.repo_owner,
            repo_name: fields.repo_name,
            number: fields.number,
            head_sha: fields.head_sha,
            base_sha: fields.base_sha,
            branch_name: fields.branch_name,
        })
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn repo_owner(&self) -> &str {
        &self.repo_owner
    }

    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn head_sha(&self) -> &str {
        &self.head_sha
    }

    pub fn base_sha(&self) -> &str {
        &self.base_sha
    }

    /// Name of the branch being merged in.
    pub fn branch_name(&self) -> &str {
        &self.branch_name
    }
}

impl std::fmt::Display for PullRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.repo_owner, self.repo_name, self.number)
    }
}

impl TryFrom<PullRequestRecord> for PullRequest {
    type Error = ValidationError;

    fn try_from(record: PullRequestRecord) -> Result<Self, Self::Error> {
        PullRequest::new(PullRequestFields {
            number: record.number.unwrap_or_default(),
            author: record.author.unwrap_or_default(),
            repo_owner: record.repo_owner.unwrap_or_default(),
            repo_name: record.repo_name.unwrap_or_default(),
            head_sha: record.head_sha.unwrap_or_default(),
            base_sha: record.base_sha.unwrap_or_default(),
            branch_name: record.head_ref.unwrap_or_default(),
        })
    }
}
