//! Reviewer policy: who must approve whose pull requests.
//!
//! Every author with an explicit entry is an internal contributor and gets
//! the reviewers listed for them. Everyone else gets the default reviewers,
//! who also act as the admin allow-list for comment overrides.
//!
//! An explicit entry with an empty list still marks the author internal,
//! but their required reviewers fall back to the defaults: an empty entry
//! never waives review.

use std::collections::{BTreeMap, BTreeSet};

use prbot_host::RepositoryHost;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::{BotError, Result};

/// Key that marks the default reviewers in the CI workflow's JSON map.
pub const DEFAULT_REVIEWERS_KEY: &str = "";

/// Reviewer policy as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerPolicyConfig {
    /// Reviewers for authors without an explicit entry. Required.
    pub default_reviewers: Option<Vec<String>>,
    /// Author login to required reviewer logins.
    #[serde(default)]
    pub authors: BTreeMap<String, Vec<String>>,
}

impl ReviewerPolicyConfig {
    /// Parse reviewer policy JSON.
    ///
    /// Accepts the object form used by the CI workflow,
    /// `{"author": ["reviewer", ...], "": ["default", ...]}`, and the
    /// structured form `{"default_reviewers": [...], "authors": {...}}`.
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(BotError::Configuration("reviewers not set".to_string()));
        }
        let invalid = |e: serde_json::Error| {
            BotError::Configuration(format!("invalid reviewers JSON: {e}"))
        };
        let value: serde_json::Value = serde_json::from_str(raw).map_err(invalid)?;

        let structured = value.as_object().is_some_and(|obj| {
            !obj.is_empty()
                && !obj.contains_key(DEFAULT_REVIEWERS_KEY)
                && obj
                    .keys()
                    .all(|k| k == "default_reviewers" || k == "authors")
        });
        if structured {
            return serde_json::from_value(value).map_err(invalid);
        }

        let mut map: BTreeMap<String, Vec<String>> =
            serde_json::from_value(value).map_err(invalid)?;
        let default_reviewers = map.remove(DEFAULT_REVIEWERS_KEY);
        Ok(Self {
            default_reviewers,
            authors: map,
        })
    }
}

/// Validated reviewer policy. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewerPolicy {
    default_reviewers: Vec<String>,
    authors: BTreeMap<String, Vec<String>>,
}

/// Drop duplicates, keeping first occurrence order.
fn ordered_set(logins: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    logins
        .into_iter()
        .filter(|l| seen.insert(l.clone()))
        .collect()
}

impl ReviewerPolicy {
    /// Build a policy without consulting the host.
    pub fn new(config: ReviewerPolicyConfig) -> Result<Self> {
        let default_reviewers = config.default_reviewers.ok_or_else(|| {
            BotError::Configuration(
                "default reviewers are not set. set default reviewers with an empty string as a key"
                    .to_string(),
            )
        })?;
        if default_reviewers.is_empty() {
            return Err(BotError::Configuration(
                "default reviewers must not be empty".to_string(),
            ));
        }
        if let Some(login) = default_reviewers
            .iter()
            .chain(config.authors.values().flatten())
            .find(|l| l.trim().is_empty())
        {
            return Err(BotError::Configuration(format!(
                "reviewer login {login:?} is blank"
            )));
        }

        Ok(Self {
            default_reviewers: ordered_set(default_reviewers),
            authors: config
                .authors
                .into_iter()
                .map(|(author, reviewers)| (author, ordered_set(reviewers)))
                .collect(),
        })
    }

    /// Build a policy and check every login in it against the host's user
    /// directory. Done once, at construction.
    pub async fn resolve(config: ReviewerPolicyConfig, host: &dyn RepositoryHost) -> Result<Self> {
        let policy = Self::new(config)?;
        for login in policy.all_logins() {
            let exists = host
                .user_exists(login)
                .await
                .map_err(BotError::host("user_exists"))?;
            if !exists {
                return Err(BotError::Configuration(format!(
                    "login {login} does not resolve to a user"
                )));
            }
            debug!(login = %login, "policy login resolved");
        }
        Ok(policy)
    }

    /// Every login the policy mentions, authors included, each once.
    pub fn all_logins(&self) -> BTreeSet<&str> {
        self.default_reviewers
            .iter()
            .chain(self.authors.keys())
            .chain(self.authors.values().flatten())
            .map(String::as_str)
            .collect()
    }

    /// Reviewers that must approve pull requests by `author`.
    pub fn required_reviewers_for(&self, author: &str) -> &[String] {
        match self.authors.get(author) {
            Some(reviewers) if !reviewers.is_empty() => reviewers,
            _ => &self.default_reviewers,
        }
    }

    /// Whether `author` has an explicit entry.
    pub fn is_internal(&self, author: &str) -> bool {
        self.authors.contains_key(author)
    }

    pub fn default_reviewers(&self) -> &[String] {
        &self.default_reviewers
    }

    /// Whether `login` may authorize workflow runs by comment.
    pub fn is_admin(&self, login: &str) -> bool {
        self.default_reviewers.iter().any(|r| r == login)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prbot_host::fakes::MemoryHost;

    fn policy(raw: &str) -> ReviewerPolicy {
        ReviewerPolicy::new(ReviewerPolicyConfig::from_json(raw).unwrap()).unwrap()
    }

    #[test]
    fn known_author_gets_explicit_reviewers() {
        let p = policy(r#"{"foo": ["bar", "baz"], "": ["admin"]}"#);
        assert_eq!(p.required_reviewers_for("foo"), ["bar", "baz"]);
        assert!(p.is_internal("foo"));
    }

    #[test]
    fn unknown_authors_share_the_default_set() {
        let p = policy(r#"{"foo": ["bar"], "": ["admin1", "admin2"]}"#);
        assert_eq!(
            p.required_reviewers_for("stranger"),
            p.required_reviewers_for("someone-else")
        );
        assert_eq!(p.required_reviewers_for("stranger"), ["admin1", "admin2"]);
        assert!(!p.is_internal("stranger"));
    }

    #[test]
    fn explicit_lookup_does_not_merge_defaults() {
        let p = policy(r#"{"foo": ["bar"], "": ["admin"]}"#);
        assert_eq!(p.required_reviewers_for("foo"), ["bar"]);
    }

    #[test]
    fn empty_explicit_entry_is_internal_with_default_reviewers() {
        let p = policy(r#"{"foo": [], "": ["admin"]}"#);
        assert!(p.is_internal("foo"));
        assert_eq!(p.required_reviewers_for("foo"), ["admin"]);
    }

    #[test]
    fn missing_default_is_configuration_error() {
        let config = ReviewerPolicyConfig::from_json(r#"{"foo": ["bar"]}"#).unwrap();
        let err = ReviewerPolicy::new(config).unwrap_err();
        assert!(matches!(err, BotError::Configuration(_)));
        assert!(err.to_string().contains("default reviewers are not set"));
    }

    #[test]
    fn empty_reviewers_string_is_configuration_error() {
        assert!(matches!(
            ReviewerPolicyConfig::from_json("  "),
            Err(BotError::Configuration(_))
        ));
        assert!(matches!(
            ReviewerPolicyConfig::from_json("[1, 2]"),
            Err(BotError::Configuration(_))
        ));
    }

    #[test]
    fn structured_form_is_accepted() {
        let p = policy(r#"{"default_reviewers": ["admin"], "authors": {"foo": ["bar"]}}"#);
        assert_eq!(p.default_reviewers(), ["admin"]);
        assert_eq!(p.required_reviewers_for("foo"), ["bar"]);
        assert!(!p.is_internal("default_reviewers"));
    }

    #[test]
    fn duplicate_reviewers_are_collapsed_in_order() {
        let p = policy(r#"{"foo": ["b", "a", "b"], "": ["admin"]}"#);
        assert_eq!(p.required_reviewers_for("foo"), ["b", "a"]);
    }

    #[test]
    fn default_reviewers_are_admins() {
        let p = policy(r#"{"": ["test-user"]}"#);
        assert!(p.is_admin("test-user"));
        assert!(!p.is_admin("random-user"));
    }

    #[tokio::test]
    async fn resolve_rejects_unknown_login() {
        let host = MemoryHost::new();
        host.add_user("foo");
        host.add_user("admin");
        let config = ReviewerPolicyConfig::from_json(r#"{"foo": ["ghost"], "": ["admin"]}"#).unwrap();

        let err = ReviewerPolicy::resolve(config, &host).await.unwrap_err();
        assert!(matches!(err, BotError::Configuration(_)));
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn resolve_checks_each_login_once() {
        let host = MemoryHost::new();
        for login in ["foo", "bar", "admin"] {
            host.add_user(login);
        }
        let config =
            ReviewerPolicyConfig::from_json(r#"{"foo": ["bar", "admin"], "": ["admin", "bar"]}"#)
                .unwrap();

        ReviewerPolicy::resolve(config, &host).await.unwrap();
        assert_eq!(host.operations().len(), 3);
    }
}
