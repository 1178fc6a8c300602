//! prbot - pull request review gate for hosted CI
//!
//! Each subcommand is one CI job step. It reads the triggering event,
//! fetches fresh state from GitHub, decides, and exits non-zero when the
//! pull request must not proceed.
//!
//! ## Commands
//!
//! - `assign-reviewers`: request review from the author's required reviewers
//! - `check-reviewers`: enforce required approvals and invalidate stale ones
//! - `dismiss-runs`: prune stale check runs across all open pull requests
//! - `rerun-workflows`: re-run the latest check and assign runs
//! - `approve-run`: let gated workflows continue when an admin commented

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use prbot_core::{
    prune_stale_runs_for_repository, with_deadline, Bot, BotError, BotSettings, PullRequest,
    ReviewerPolicy, ReviewerPolicyConfig, TriggerEvent, METRICS,
};
use prbot_host::{GithubConfig, GithubHost, RepositoryHost, DEFAULT_API_URL};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "prbot")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pull request review gate for hosted CI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// GitHub token
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub API base URL
    #[arg(long, global = true, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by the commands that act on the triggering pull request.
#[derive(Args, Debug, Clone)]
struct PullRequestArgs {
    /// Reviewer policy as JSON: `{"author": ["reviewer"], "": ["default"]}`
    #[arg(long, env = "PRBOT_REVIEWERS")]
    reviewers: String,

    /// Path of the webhook event payload
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Request review from the author's required reviewers
    AssignReviewers(PullRequestArgs),

    /// Enforce required approvals on the pull request
    CheckReviewers(PullRequestArgs),

    /// Delete stale check runs for every open pull request
    DismissRuns {
        /// Repository as owner/name
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repository: String,
    },

    /// Re-run the latest check and assign workflow runs
    RerunWorkflows(PullRequestArgs),

    /// Allow gated workflows to continue if an admin commented the trigger phrase
    ApproveRun(PullRequestArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    prbot_core::init_tracing(cli.json, level);

    let settings = BotSettings::from_env().context("invalid PRBOT_* settings")?;
    let mut config = GithubConfig::new(&cli.api_url);
    match cli.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => config = config.with_token(token),
        None => bail!("a GitHub token is required (--token or GITHUB_TOKEN)"),
    }
    let host: Arc<dyn RepositoryHost> =
        Arc::new(GithubHost::new(config).context("failed to build GitHub client")?);

    let result = run(cli.command, host, settings).await;
    METRICS.flush();
    result
}

async fn run(command: Commands, host: Arc<dyn RepositoryHost>, settings: BotSettings) -> Result<()> {
    let deadline = settings.deadline;
    match command {
        Commands::AssignReviewers(args) => {
            under_deadline("assign-reviewers", deadline, cmd_assign(host, settings, &args)).await
        }
        Commands::CheckReviewers(args) => {
            under_deadline("check-reviewers", deadline, cmd_check(host, settings, &args)).await
        }
        Commands::DismissRuns { repository } => {
            under_deadline(
                "dismiss-runs",
                deadline,
                cmd_dismiss_runs(host, &settings, &repository),
            )
            .await
        }
        Commands::RerunWorkflows(args) => {
            under_deadline("rerun-workflows", deadline, cmd_rerun(host, settings, &args)).await
        }
        Commands::ApproveRun(args) => {
            under_deadline("approve-run", deadline, cmd_approve_run(host, settings, &args)).await
        }
    }
}

/// Run a command future under the overall deadline.
async fn under_deadline<T>(
    operation: &str,
    after: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    with_deadline(operation, after, async { Ok::<_, BotError>(fut.await) }).await?
}

/// Split `owner/name`.
fn parse_repository(repository: &str) -> Result<(&str, &str)> {
    match repository.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => bail!("repository must be given as owner/name, got {repository:?}"),
    }
}

async fn load_pull_request(host: &dyn RepositoryHost, event_path: &Path) -> Result<PullRequest> {
    let event = TriggerEvent::from_path(event_path)
        .with_context(|| format!("failed to parse event payload {}", event_path.display()))?;
    event
        .resolve(host)
        .await
        .context("failed to resolve the pull request for this event")
}

async fn load_bot(
    host: Arc<dyn RepositoryHost>,
    settings: BotSettings,
    reviewers: &str,
) -> Result<Bot> {
    let config = ReviewerPolicyConfig::from_json(reviewers).context("invalid reviewer policy")?;
    let policy = ReviewerPolicy::resolve(config, host.as_ref())
        .await
        .context("failed to resolve reviewer policy")?;
    Ok(Bot::new(host, policy, settings))
}

async fn cmd_assign(
    host: Arc<dyn RepositoryHost>,
    settings: BotSettings,
    args: &PullRequestArgs,
) -> Result<()> {
    let bot = load_bot(host, settings, &args.reviewers).await?;
    let pr = load_pull_request(bot.host(), &args.event_path).await?;
    let requested = bot
        .assign(&pr)
        .await
        .with_context(|| format!("assigning reviewers to {pr} failed"))?;

    if requested.is_empty() {
        println!("No reviewers to request for {pr}");
    } else {
        println!("Requested review on {pr} from: {}", requested.join(", "));
    }
    Ok(())
}

async fn cmd_check(
    host: Arc<dyn RepositoryHost>,
    settings: BotSettings,
    args: &PullRequestArgs,
) -> Result<()> {
    let bot = load_bot(host, settings, &args.reviewers).await?;
    let pr = load_pull_request(bot.host(), &args.event_path).await?;
    let outcome = bot
        .check(&pr)
        .await
        .with_context(|| format!("review check for {pr} did not pass"))?;

    info!(pr = %pr, "all required reviewers approved");
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn cmd_dismiss_runs(
    host: Arc<dyn RepositoryHost>,
    settings: &BotSettings,
    repository: &str,
) -> Result<()> {
    let (owner, repo) = parse_repository(repository)?;
    let reports =
        prune_stale_runs_for_repository(host.as_ref(), owner, repo, &settings.check_workflow)
            .await
            .with_context(|| format!("pruning stale runs in {owner}/{repo} failed"))?;

    let deleted: usize = reports.iter().map(|(_, r)| r.deleted.len()).sum();
    println!(
        "Pruned {deleted} stale run(s) across {} open pull request(s) in {owner}/{repo}",
        reports.len()
    );
    Ok(())
}

async fn cmd_rerun(
    host: Arc<dyn RepositoryHost>,
    settings: BotSettings,
    args: &PullRequestArgs,
) -> Result<()> {
    let bot = load_bot(host, settings, &args.reviewers).await?;
    let pr = load_pull_request(bot.host(), &args.event_path).await?;
    let runs = bot
        .rerun_workflows(&pr)
        .await
        .with_context(|| format!("re-running workflows for {pr} failed"))?;

    for id in runs {
        println!("Re-ran workflow run {id}");
    }
    Ok(())
}

async fn cmd_approve_run(
    host: Arc<dyn RepositoryHost>,
    settings: BotSettings,
    args: &PullRequestArgs,
) -> Result<()> {
    let bot = load_bot(host, settings, &args.reviewers).await?;
    let pr = load_pull_request(bot.host(), &args.event_path).await?;
    bot.has_workflow_run_approval(&pr)
        .await
        .with_context(|| format!("workflow run for {pr} is not approved"))?;

    println!("Workflow run approved for {pr}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use prbot_host::fakes::MemoryHost;
    use prbot_host::{PullRequestRecord, ReviewRecord, Workflow, WorkflowRun};

    const EVENT: &str = r#"{
      "action": "synchronize",
      "number": 9,
      "pull_request": {
        "user": {"login": "alice"},
        "head": {"ref": "feature", "sha": "h1"},
        "base": {"ref": "master", "sha": "b1"}
      },
      "repository": {"name": "r", "owner": {"login": "o"}}
    }"#;

    const REVIEWERS: &str = r#"{"alice": ["bob"], "": ["admin"]}"#;

    fn args(dir: &tempfile::TempDir) -> PullRequestArgs {
        let event_path = dir.path().join("event.json");
        std::fs::write(&event_path, EVENT).unwrap();
        PullRequestArgs {
            reviewers: REVIEWERS.to_string(),
            event_path,
        }
    }

    fn host() -> Arc<MemoryHost> {
        let host = MemoryHost::new();
        for login in ["alice", "bob", "admin"] {
            host.add_user(login);
        }
        host.add_workflow(
            "o",
            "r",
            Workflow {
                id: 1,
                name: "Check".into(),
            },
        );
        Arc::new(host)
    }

    #[test]
    fn repository_must_be_owner_slash_name() {
        assert_eq!(
            parse_repository("gravitational/teleport").unwrap(),
            ("gravitational", "teleport")
        );
        for bad in ["teleport", "/teleport", "gravitational/", "a/b/c"] {
            assert!(parse_repository(bad).is_err(), "{bad}");
        }
    }

    #[tokio::test]
    async fn check_passes_with_required_approval() {
        let dir = tempfile::tempdir().unwrap();
        let host = host();
        host.add_review(
            "o",
            "r",
            9,
            ReviewRecord {
                id: Some(1),
                reviewer: Some("bob".into()),
                state: Some("APPROVED".into()),
                commit_id: Some("h1".into()),
                submitted_at: Some(Utc::now()),
            },
        );

        cmd_check(host.clone(), BotSettings::default(), &args(&dir))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_check_names_pull_request() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_check(host(), BotSettings::default(), &args(&dir))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "review check for o/r#9 did not pass");
        assert_eq!(err.root_cause().to_string(), "pull request has no reviews");
    }

    #[tokio::test]
    async fn unknown_reviewer_fails_before_any_decision() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(&dir);
        a.reviewers = r#"{"alice": ["ghost"], "": ["admin"]}"#.to_string();
        let host = host();

        let err = cmd_assign(host.clone(), BotSettings::default(), &a)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("ghost"));
        assert!(host.review_requests().is_empty());
    }

    #[tokio::test]
    async fn dismiss_runs_sweeps_repository() {
        let host = host();
        host.add_pull_request(
            PullRequestRecord {
                number: Some(9),
                author: Some("alice".into()),
                repo_owner: Some("o".into()),
                repo_name: Some("r".into()),
                head_sha: Some("h1".into()),
                base_sha: Some("b1".into()),
                head_ref: Some("feature".into()),
            },
            true,
        );
        for (id, hour) in [(1, 1), (2, 2)] {
            host.add_run(
                "o",
                "r",
                WorkflowRun {
                    id,
                    workflow_id: 1,
                    head_branch: Some("feature".into()),
                    created_at: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
                },
            );
        }

        cmd_dismiss_runs(host.clone(), &BotSettings::default(), "o/r")
            .await
            .unwrap();
        assert_eq!(host.deleted_runs(), [1]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_commands_time_out() {
        let dir = tempfile::tempdir().unwrap();
        let host: Arc<dyn RepositoryHost> =
            Arc::new(MemoryHost::new().with_latency(Duration::from_secs(30)));
        let settings = BotSettings::default().with_deadline(Duration::from_secs(5));

        let err = run(Commands::CheckReviewers(args(&dir)), host, settings)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BotError>(),
            Some(BotError::Timeout { .. })
        ));
    }
}
