//! forks-sync - Keep your git forks up to date with their upstream default branches
//!
//! forks-sync discovers the forks owned by an authenticated GitHub account,
//! clones any that are missing locally, and rebases each local clone onto its
//! upstream's current default branch, optionally force-pushing the result.
//!
//! ## Core Features
//!
//! - **Fork Discovery**: Lists the account's repositories via the GitHub API
//!   and keeps only self-owned forks
//! - **Clone-then-Rebase**: Shallow-clones missing forks, then rebases each
//!   onto `upstream/<default branch>`
//! - **Bounded Concurrency**: Syncs forks in parallel behind a configurable
//!   limit
//! - **Dry Mode**: Runs all decision logic and logging without executing git
//!   commands unless `--force` is passed
//!
//! ## Modules
//!
//! - [`config`]: Run configuration and parsing
//! - [`github`]: GitHub API integration and fork discovery
//! - [`git`]: External git command execution
//! - [`sync`]: The bounded-concurrency sync engine

pub mod config;
pub mod git;
pub mod github;
pub mod sync;

pub use config::Config;
pub use git::{CommandRunner, CommandStatus, GitCommand, GitCommandRunner};
pub use github::{ForkSpec, GitHubClient};
pub use sync::{OutcomeRecord, RunSummary, SyncEngine, SyncStatus};
