//! Validated pull request comments.

use chrono::{DateTime, Utc};
use prbot_host::CommentRecord;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// The commenter's relationship to the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorAssociation {
    Owner,
    Member,
    Collaborator,
    Contributor,
    FirstTimeContributor,
    FirstTimer,
    Mannequin,
    None,
    Other(String),
}

impl AuthorAssociation {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "OWNER" => AuthorAssociation::Owner,
            "MEMBER" => AuthorAssociation::Member,
            "COLLABORATOR" => AuthorAssociation::Collaborator,
            "CONTRIBUTOR" => AuthorAssociation::Contributor,
            "FIRST_TIME_CONTRIBUTOR" => AuthorAssociation::FirstTimeContributor,
            "FIRST_TIMER" => AuthorAssociation::FirstTimer,
            "MANNEQUIN" => AuthorAssociation::Mannequin,
            "NONE" => AuthorAssociation::None,
            _ => AuthorAssociation::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AuthorAssociation::Owner => "OWNER",
            AuthorAssociation::Member => "MEMBER",
            AuthorAssociation::Collaborator => "COLLABORATOR",
            AuthorAssociation::Contributor => "CONTRIBUTOR",
            AuthorAssociation::FirstTimeContributor => "FIRST_TIME_CONTRIBUTOR",
            AuthorAssociation::FirstTimer => "FIRST_TIMER",
            AuthorAssociation::Mannequin => "MANNEQUIN",
            AuthorAssociation::None => "NONE",
            AuthorAssociation::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for AuthorAssociation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comment with every required field present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub commenter: String,
    pub author_association: AuthorAssociation,
    /// Commit the comment was attached to.
    pub commit_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ValidationError;

    fn try_from(record: CommentRecord) -> Result<Self, Self::Error> {
        let comment_id = record.id;
        let missing = |field| ValidationError::MissingCommentField { field, comment_id };

        let commenter = record
            .commenter
            .filter(|login| !login.is_empty())
            .ok_or_else(|| missing("user.login"))?;
        let association = record
            .author_association
            .ok_or_else(|| missing("author_association"))?;
        let commit_id = record.commit_id.ok_or_else(|| missing("commit_id"))?;
        let body = record.body.ok_or_else(|| missing("body"))?;
        let created_at = record.created_at.ok_or_else(|| missing("created_at"))?;

        Ok(Comment {
            commenter,
            author_association: AuthorAssociation::parse(&association),
            commit_id,
            body,
            created_at,
        })
    }
}
