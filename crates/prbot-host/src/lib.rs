//! prbot-host: repository host access for prbot
//!
//! This crate is the only place that knows how to talk to a code host.
//! The decision engine in `prbot-core` sees nothing but the
//! `RepositoryHost` trait.
//!
//! ## Key Components
//!
//! - `RepositoryHost`: async capability trait (reviews, comments, commits, workflow runs)
//! - `GithubHost`: GitHub REST implementation
//! - `fakes::MemoryHost`: in-memory implementation for tests

mod error;
pub mod fakes;
pub mod github;
pub mod host_traits;

pub use error::HostError;
pub use github::{GithubConfig, GithubHost, DEFAULT_API_URL};
pub use host_traits::{
    CommentRecord, CommitComparison, CommitRecord, CommitVerification, HostResult,
    PullRequestRecord, RepositoryHost, ReviewRecord, Workflow, WorkflowRun,
};
