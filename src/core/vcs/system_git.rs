//! System git backend
//!
//! Drives the user's `git` binary through its porcelain surface. Commands
//! run in an isolated environment with safe config overrides passed through
//! `GIT_CONFIG_*` variables, so the argument list stays exactly what the
//! operation means.

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::core::error::{GitError, PromoteError, PromoteResult, ResultExt};
use std::path::{Path, PathBuf};

/// Config overrides applied to every git invocation
const SAFE_CONFIG: &[(&str, &str)] = &[
  ("protocol.version", "2"),
  ("advice.detachedHead", "false"),
  ("core.quotePath", "false"),
  ("commit.gpgSign", "false"),
  ("tag.gpgSign", "false"),
];

/// Author/committer identity for release commits and tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
  pub name: String,
  pub email: String,
}

/// Git backend using system git
pub struct SystemGit<'r> {
  runner: &'r dyn CommandRunner,

  /// Working tree root
  pub(crate) work_tree: PathBuf,

  identity: Option<Identity>,
}

impl<'r> SystemGit<'r> {
  /// Bind to a working tree without probing it
  pub fn new(runner: &'r dyn CommandRunner, work_tree: &Path) -> Self {
    Self {
      runner,
      work_tree: work_tree.to_path_buf(),
      identity: None,
    }
  }

  /// Open a git repository, resolving its top-level directory
  pub fn open(runner: &'r dyn CommandRunner, path: &Path) -> PromoteResult<Self> {
    let probe = Self::new(runner, path);
    let output = probe.run(&["rev-parse", "--show-toplevel"])?;

    if !output.success {
      if output.stderr.contains("not a git repository") {
        return Err(PromoteError::Git(GitError::RepoNotFound {
          path: path.to_path_buf(),
        }));
      }
      return Err(PromoteError::message(format!(
        "Failed to open git repository: {}",
        output.reason()
      )));
    }

    let top = output.stdout.trim();
    let work_tree = if top.is_empty() { path.to_path_buf() } else { PathBuf::from(top) };
    Ok(Self::new(runner, &work_tree))
  }

  /// Use `identity` as author and committer for everything this backend writes
  pub fn with_identity(mut self, identity: Identity) -> Self {
    self.identity = Some(identity);
    self
  }

  pub fn work_tree(&self) -> &Path {
    &self.work_tree
  }

  /// Get HEAD commit SHA
  pub fn head_commit(&self) -> PromoteResult<String> {
    self.run_checked(&["rev-parse", "HEAD"])
  }

  /// Get current branch name ("HEAD" when detached)
  pub fn current_branch(&self) -> PromoteResult<String> {
    let output = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
    if !output.success {
      return Ok("HEAD".to_string());
    }
    Ok(output.stdout.trim().to_string())
  }

  /// Build a git command with isolated environment
  ///
  /// - Runs in the working tree
  /// - Clears environment variables except a short passthrough list
  /// - Adds safe configuration overrides
  /// - Applies the release identity, if any
  pub(crate) fn git_cmd(&self, args: &[&str]) -> CommandSpec {
    let mut spec = CommandSpec::new("git", &self.work_tree).args(args.iter().copied());
    spec.isolated = true;

    spec = spec.env("GIT_CONFIG_COUNT", SAFE_CONFIG.len().to_string());
    for (i, (key, value)) in SAFE_CONFIG.iter().enumerate() {
      spec = spec
        .env(format!("GIT_CONFIG_KEY_{}", i), *key)
        .env(format!("GIT_CONFIG_VALUE_{}", i), *value);
    }

    spec = spec.env("GIT_TERMINAL_PROMPT", "0");

    if let Some(identity) = &self.identity {
      spec = spec
        .env("GIT_AUTHOR_NAME", identity.name.as_str())
        .env("GIT_AUTHOR_EMAIL", identity.email.as_str())
        .env("GIT_COMMITTER_NAME", identity.name.as_str())
        .env("GIT_COMMITTER_EMAIL", identity.email.as_str());
    }

    spec
  }

  /// Run a git command, returning its output whatever the exit status
  pub(crate) fn run(&self, args: &[&str]) -> PromoteResult<CommandOutput> {
    let spec = self.git_cmd(args);
    self
      .runner
      .run(&spec)
      .with_context(|| format!("Failed to execute {}", spec.display()))
  }

  /// Run a git command and return trimmed stdout, failing on non-zero exit
  pub(crate) fn run_checked(&self, args: &[&str]) -> PromoteResult<String> {
    let output = self.run(args)?;
    if !output.success {
      return Err(PromoteError::Git(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: output.stderr,
      }));
    }
    Ok(output.stdout.trim().to_string())
  }
}
