//! Runtime settings for the bot.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::comment_gate::TRIGGER_PHRASE;
use crate::commit_verify::TRUSTED_COMMIT_MARKER;
use crate::domain::{BotError, Result};

/// Overall deadline for one invocation when none is configured.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// Bot settings. Everything except the reviewer policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSettings {
    /// Name of the workflow that enforces reviews.
    pub check_workflow: String,
    /// Name of the workflow that assigns reviewers.
    pub assign_workflow: String,
    /// Phrase that releases gated workflows.
    pub trigger_phrase: String,
    /// Signature payload fragment that marks host-made commits.
    pub trusted_commit_marker: String,
    /// Overall deadline for one invocation.
    pub deadline: Duration,
    /// Reject override comments dated after the evaluation started.
    pub enforce_comment_timing: bool,
}

impl Default for BotSettings {
    fn default() -> Self {
        BotSettings {
            check_workflow: "Check".to_string(),
            assign_workflow: "Assign".to_string(),
            trigger_phrase: TRIGGER_PHRASE.to_string(),
            trusted_commit_marker: TRUSTED_COMMIT_MARKER.to_string(),
            deadline: DEFAULT_DEADLINE,
            enforce_comment_timing: true,
        }
    }
}

impl BotSettings {
    /// Defaults overridden by `PRBOT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `PRBOT_*` key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();
        if let Some(v) = lookup("PRBOT_CHECK_WORKFLOW") {
            settings.check_workflow = v;
        }
        if let Some(v) = lookup("PRBOT_ASSIGN_WORKFLOW") {
            settings.assign_workflow = v;
        }
        if let Some(v) = lookup("PRBOT_TRIGGER_PHRASE") {
            settings.trigger_phrase = v;
        }
        if let Some(v) = lookup("PRBOT_TRUSTED_COMMIT_MARKER") {
            settings.trusted_commit_marker = v;
        }
        if let Some(v) = lookup("PRBOT_DEADLINE_SECS") {
            let secs: u64 = v.trim().parse().map_err(|_| {
                BotError::Configuration(format!("PRBOT_DEADLINE_SECS is not a number: {v:?}"))
            })?;
            settings.deadline = Duration::from_secs(secs);
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("check workflow", &self.check_workflow),
            ("assign workflow", &self.assign_workflow),
            ("trigger phrase", &self.trigger_phrase),
            ("trusted commit marker", &self.trusted_commit_marker),
        ] {
            if value.trim().is_empty() {
                return Err(BotError::Configuration(format!("{name} must not be empty")));
            }
        }
        if self.deadline.is_zero() {
            return Err(BotError::Configuration(
                "deadline must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
