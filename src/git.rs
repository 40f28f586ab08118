use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::github::ForkSpec;

/// One discrete git invocation
///
/// Sync sequences are explicit ordered lists of these, each checked for
/// failure on its own. Never a shell pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    /// Arguments passed to the git binary
    pub args: Vec<String>,

    /// Working directory, when the command must run inside the clone
    pub cwd: Option<PathBuf>,
}

impl GitCommand {
    pub fn new(args: &[&str]) -> Self {
        Self {
            args: args.iter().map(|arg| arg.to_string()).collect(),
            cwd: None,
        }
    }

    pub fn in_dir(args: &[&str], cwd: &Path) -> Self {
        Self {
            args: args.iter().map(|arg| arg.to_string()).collect(),
            cwd: Some(cwd.to_path_buf()),
        }
    }

    /// Human-readable form for logging (e.g., "git checkout main")
    pub fn display(&self) -> String {
        format!("git {}", self.args.join(" "))
    }
}

/// Outcome of a single command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    /// Exit code 0 within the timeout
    Success,
    /// The command did not finish within the configured timeout
    TimedOut,
    /// Non-zero exit or spawn failure, with raw diagnostic detail
    Failed(String),
}

/// Executes external git commands on behalf of the sync engine
///
/// A trait so tests can substitute an instrumented runner.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &GitCommand) -> CommandStatus;
}

/// Subprocess-backed runner with a per-invocation timeout
pub struct GitCommandRunner {
    timeout: Duration,
}

impl GitCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for GitCommandRunner {
    async fn run(&self, command: &GitCommand) -> CommandStatus {
        debug!("Running: {}", command.display());

        let mut process = AsyncCommand::new("git");
        process
            .args(&command.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(cwd) = &command.cwd {
            process.current_dir(cwd);
        }

        match tokio::time::timeout(self.timeout, process.output()).await {
            Ok(Ok(output)) if output.status.success() => CommandStatus::Success,
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let detail = if stderr.is_empty() {
                    format!("git exited with {}", output.status)
                } else {
                    stderr
                };
                CommandStatus::Failed(detail)
            }
            Ok(Err(e)) => CommandStatus::Failed(format!("Failed to execute git: {}", e)),
            Err(_) => CommandStatus::TimedOut,
        }
    }
}

/// Command sequence for a fork that is not yet on disk: shallow-clone the
/// fork, then register its parent as the `upstream` remote
pub fn clone_commands(fork: &ForkSpec, path: &Path) -> Vec<GitCommand> {
    let target = path.display().to_string();

    vec![
        GitCommand::new(&["clone", "--depth=1", &fork.ssh_url, &target]),
        GitCommand::in_dir(&["remote", "add", "upstream", &fork.upstream_url], path),
    ]
}

/// Command sequence that rebases a local fork onto its upstream default
/// branch and force-pushes the result back to origin
pub fn rebase_commands(fork: &ForkSpec, path: &Path) -> Vec<GitCommand> {
    let branch = &fork.upstream_branch;

    vec![
        GitCommand::in_dir(&["checkout", branch], path),
        GitCommand::in_dir(&["fetch", "--depth=1", "upstream"], path),
        GitCommand::in_dir(&["rebase", &format!("upstream/{}", branch)], path),
        GitCommand::in_dir(&["push", "origin", "-f"], path),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_fork() -> ForkSpec {
        ForkSpec {
            name: "demo".to_string(),
            owner: "me".to_string(),
            ssh_url: "git@github.com:me/demo.git".to_string(),
            upstream_url: "https://github.com/upstream/demo.git".to_string(),
            upstream_branch: "main".to_string(),
        }
    }

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_clone_commands() {
        let fork = demo_fork();
        let path = Path::new("/tmp/forks/demo");

        let commands = clone_commands(&fork, path);

        assert_eq!(commands.len(), 2);

        assert_eq!(
            commands[0].args,
            vec![
                "clone",
                "--depth=1",
                "git@github.com:me/demo.git",
                "/tmp/forks/demo"
            ]
        );
        assert_eq!(commands[0].cwd, None);

        assert_eq!(
            commands[1].args,
            vec![
                "remote",
                "add",
                "upstream",
                "https://github.com/upstream/demo.git"
            ]
        );
        assert_eq!(commands[1].cwd, Some(path.to_path_buf()));
    }

    #[test]
    fn test_rebase_commands() {
        let fork = demo_fork();
        let path = Path::new("/tmp/forks/demo");

        let commands = rebase_commands(&fork, path);

        let argv: Vec<String> = commands.iter().map(|c| c.args.join(" ")).collect();
        assert_eq!(
            argv,
            vec![
                "checkout main",
                "fetch --depth=1 upstream",
                "rebase upstream/main",
                "push origin -f"
            ]
        );

        // Every rebase step runs inside the clone
        assert!(commands.iter().all(|c| c.cwd == Some(path.to_path_buf())));
    }

    #[test]
    fn test_rebase_commands_follow_upstream_branch() {
        let mut fork = demo_fork();
        fork.upstream_branch = "develop".to_string();
        let path = Path::new("/tmp/forks/demo");

        let commands = rebase_commands(&fork, path);

        assert_eq!(commands[0].args, vec!["checkout", "develop"]);
        assert_eq!(commands[2].args, vec!["rebase", "upstream/develop"]);
    }

    #[test]
    fn test_command_display() {
        let command = GitCommand::new(&["checkout", "main"]);
        assert_eq!(command.display(), "git checkout main");
    }

    #[tokio::test]
    async fn test_runner_reports_success() {
        if !git_available() {
            return;
        }

        let runner = GitCommandRunner::new(Duration::from_secs(30));
        let status = runner.run(&GitCommand::new(&["--version"])).await;

        assert_eq!(status, CommandStatus::Success);
    }

    #[tokio::test]
    async fn test_runner_reports_failure_with_detail() {
        if !git_available() {
            return;
        }

        let runner = GitCommandRunner::new(Duration::from_secs(30));
        let status = runner
            .run(&GitCommand::new(&["--definitely-not-a-flag"]))
            .await;

        match status {
            CommandStatus::Failed(detail) => assert!(!detail.is_empty()),
            other => panic!("Expected failure, got {:?}", other),
        }
    }
}
