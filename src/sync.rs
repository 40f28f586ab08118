//! Sync engine - bounded-concurrency fork synchronization
//!
//! Fans one unit of work out per eligible fork (clone if absent, then rebase
//! onto the upstream default branch), throttled by a semaphore so at most
//! `threads` command sequences run at once, and joins all units before
//! reporting the run summary.

use crate::config::Config;
use crate::git::{
    clone_commands, rebase_commands, CommandRunner, CommandStatus, GitCommand, GitCommandRunner,
};
use crate::github::{resolve_token, ForkSpec, GitHubClient};
use anyhow::{anyhow, Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Which sync operation produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Clone,
    Rebase,
}

impl Operation {
    fn done(&self) -> &'static str {
        match self {
            Operation::Clone => "cloned!",
            Operation::Rebase => "rebased!",
        }
    }

    fn gerund(&self) -> &'static str {
        match self {
            Operation::Clone => "cloning",
            Operation::Rebase => "rebasing",
        }
    }
}

/// Result of one clone or rebase command sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Success,
    TimedOut,
    Failed(String),
}

/// One per-fork operation outcome, consumed by the logger and the summary
#[derive(Debug, Clone)]
pub struct OutcomeRecord {
    pub repo: String,
    pub operation: Operation,
    pub status: SyncStatus,
}

impl OutcomeRecord {
    pub fn succeeded(&self) -> bool {
        self.status == SyncStatus::Success
    }
}

/// Results from a complete sync run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub total_forks: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
    pub timed_out_operations: usize,
    pub duration: Duration,
    pub dry_run: bool,
    pub outcomes: Vec<OutcomeRecord>,
}

/// The main sync engine that orchestrates fork synchronization
pub struct SyncEngine {
    config: Arc<Config>,
    runner: Arc<dyn CommandRunner>,
}

impl SyncEngine {
    /// Create a new sync engine with the given configuration
    pub fn new(config: Config) -> Self {
        let runner = Arc::new(GitCommandRunner::new(config.command_timeout()));
        Self {
            config: Arc::new(config),
            runner,
        }
    }

    /// Create an engine with a custom command runner
    pub fn with_runner(config: Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config: Arc::new(config),
            runner,
        }
    }

    /// Run a complete sync: discover forks, synchronize them, report
    pub async fn run(&self) -> Result<RunSummary> {
        let start_time = Instant::now();

        // The token check happens before any network activity
        let token = resolve_token(&self.config).ok_or_else(|| {
            error!("A GitHub token must be present to run forks-sync.");
            anyhow!("A GitHub token must be present to run forks-sync.")
        })?;

        if self.config.force {
            info!("Starting fork synchronization");
        } else {
            info!("Starting fork synchronization (dry run; pass --force to push changes)");
        }

        let client = GitHubClient::new(&token).await?;

        let forks = client
            .list_forks()
            .await
            .context("Failed to discover forks")?;
        let total_forks = forks.len();

        if self.config.force {
            tokio::fs::create_dir_all(self.config.forks_dir())
                .await
                .context("Failed to create forks directory")?;
        }

        let outcomes = self.sync_forks(forks).await;

        let duration = start_time.elapsed();
        let summary = self.compile_summary(total_forks, outcomes, duration);

        let mode = if summary.dry_run { "dry run" } else { "full run" };
        info!(
            "Forks Sync complete ({})! Your forks are now up to date with their upstream default branches. Execution time: {:.2}s.",
            mode,
            summary.duration.as_secs_f64()
        );

        Ok(summary)
    }

    /// Fan out one unit of work per fork, bounded by the thread limit
    ///
    /// Units are launched eagerly; the semaphore parks any beyond the limit
    /// at the acquire call. The run joins every unit before returning - a
    /// fork that fails never cancels its siblings.
    pub async fn sync_forks(&self, forks: Vec<ForkSpec>) -> Vec<OutcomeRecord> {
        info!(
            "Syncing {} forks with up to {} in flight",
            forks.len(),
            self.config.threads
        );

        let semaphore = Arc::new(Semaphore::new(self.config.threads));
        let forks_root = self.config.forks_dir();

        let mut futures = FuturesUnordered::new();

        for fork in forks {
            let semaphore = semaphore.clone();
            let runner = self.runner.clone();
            let force = self.config.force;
            let path = forks_root.join(&fork.name);

            futures.push(async move {
                let _permit = semaphore.acquire().await.expect("Semaphore closed");

                sync_fork(runner.as_ref(), force, &fork, &path).await
            });
        }

        let mut outcomes = Vec::new();
        while let Some(records) = futures.next().await {
            outcomes.extend(records);
        }

        outcomes
    }

    /// Compile the run summary from collected outcomes
    fn compile_summary(
        &self,
        total_forks: usize,
        outcomes: Vec<OutcomeRecord>,
        duration: Duration,
    ) -> RunSummary {
        let mut successful_operations = 0;
        let mut failed_operations = 0;
        let mut timed_out_operations = 0;

        for outcome in &outcomes {
            match outcome.status {
                SyncStatus::Success => successful_operations += 1,
                SyncStatus::TimedOut => timed_out_operations += 1,
                SyncStatus::Failed(_) => failed_operations += 1,
            }
        }

        RunSummary {
            total_forks,
            successful_operations,
            failed_operations,
            timed_out_operations,
            duration,
            dry_run: !self.config.force,
            outcomes,
        }
    }

    /// Get configuration for external inspection
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Clone the fork when it is absent from disk, then rebase it
///
/// The existence check is the only local-state signal: an existing directory
/// is never re-cloned, whatever its contents. A failed clone does not skip
/// the rebase attempt - it fails fast on its own record and the next run
/// retries both.
async fn sync_fork(
    runner: &dyn CommandRunner,
    force: bool,
    fork: &ForkSpec,
    path: &Path,
) -> Vec<OutcomeRecord> {
    let mut records = Vec::new();

    if !path.exists() {
        records.push(
            run_sequence(
                runner,
                force,
                &fork.name,
                Operation::Clone,
                clone_commands(fork, path),
            )
            .await,
        );
    } else {
        debug!("{} already on disk, skipping clone", fork.name);
    }

    records.push(
        run_sequence(
            runner,
            force,
            &fork.name,
            Operation::Rebase,
            rebase_commands(fork, path),
        )
        .await,
    );

    records
}

/// Run one command sequence in order, halting at the first failing step
///
/// In dry-run mode the sequence is built and the outcome logged, but the
/// runner is never invoked.
async fn run_sequence(
    runner: &dyn CommandRunner,
    force: bool,
    repo: &str,
    operation: Operation,
    commands: Vec<GitCommand>,
) -> OutcomeRecord {
    if force {
        for command in &commands {
            match runner.run(command).await {
                CommandStatus::Success => {}
                CommandStatus::TimedOut => {
                    warn!("Forks Sync timed out {} {}.", operation.gerund(), repo);
                    return OutcomeRecord {
                        repo: repo.to_string(),
                        operation,
                        status: SyncStatus::TimedOut,
                    };
                }
                CommandStatus::Failed(detail) => {
                    warn!("{}\n{}", repo, detail);
                    return OutcomeRecord {
                        repo: repo.to_string(),
                        operation,
                        status: SyncStatus::Failed(detail),
                    };
                }
            }
        }
    }

    info!("{} {}", repo, operation.done());
    OutcomeRecord {
        repo: repo.to_string(),
        operation,
        status: SyncStatus::Success,
    }
}
