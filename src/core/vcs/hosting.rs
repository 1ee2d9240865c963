//! Hosting-platform integration via the `gh` CLI
//!
//! Pull requests and hosted releases are owned by the platform. We only look
//! them up and create them when absent; nothing here edits or closes them.

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::core::error::{PromoteError, PromoteResult, ResultExt};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct PullRequestInfo {
  url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseInfo {
  tag_name: String,
}

/// Hosting CLI bound to a repository checkout
pub struct HostingCli<'r> {
  runner: &'r dyn CommandRunner,
  program: String,
  cwd: PathBuf,
}

impl<'r> HostingCli<'r> {
  pub fn new(runner: &'r dyn CommandRunner, program: &str, cwd: &Path) -> Self {
    Self {
      runner,
      program: program.to_string(),
      cwd: cwd.to_path_buf(),
    }
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  /// Whether the CLI is installed
  pub fn is_available(&self) -> bool {
    self.runner.is_available(&self.program)
  }

  fn run(&self, args: &[&str]) -> PromoteResult<CommandOutput> {
    let spec = CommandSpec::new(self.program.as_str(), &self.cwd).args(args.iter().copied());
    let output = self
      .runner
      .run(&spec)
      .with_context(|| format!("Failed to execute {}", spec.display()))?;

    if !output.success {
      return Err(PromoteError::message(format!(
        "{} failed: {}",
        spec.display(),
        output.reason()
      )));
    }
    Ok(output)
  }

  /// Find a pull request (any state) from `head` into `base`
  pub fn find_pull_request(&self, base: &str, head: &str) -> PromoteResult<Option<String>> {
    let output = self.run(&[
      "pr", "list", "--base", base, "--head", head, "--state", "all", "--json", "url",
    ])?;
    let prs: Vec<PullRequestInfo> = parse_json_list(&output.stdout)?;
    Ok(prs.into_iter().next().map(|pr| pr.url))
  }

  /// Open a pull request, returning whatever the CLI printed (usually the URL)
  pub fn create_pull_request(&self, base: &str, head: &str, title: &str, body: &str) -> PromoteResult<String> {
    let output = self.run(&[
      "pr", "create", "--base", base, "--head", head, "--title", title, "--body", body,
    ])?;
    Ok(output.stdout.trim().to_string())
  }

  /// Whether a hosted release exists for `tag`
  pub fn release_exists(&self, tag: &str) -> PromoteResult<bool> {
    let output = self.run(&["release", "list", "--limit", "1000", "--json", "tagName"])?;
    let releases: Vec<ReleaseInfo> = parse_json_list(&output.stdout)?;
    Ok(releases.iter().any(|r| r.tag_name == tag))
  }

  /// Create a hosted release for an already-pushed tag
  pub fn create_release(&self, tag: &str, title: &str, notes: &str) -> PromoteResult<String> {
    let output = self.run(&["release", "create", tag, "--verify-tag", "--title", title, "--notes", notes])?;
    Ok(output.stdout.trim().to_string())
  }
}

/// Empty output means an empty list
fn parse_json_list<T: serde::de::DeserializeOwned>(stdout: &str) -> PromoteResult<Vec<T>> {
  let trimmed = stdout.trim();
  if trimmed.is_empty() {
    return Ok(Vec::new());
  }
  Ok(serde_json::from_str(trimmed)?)
}
