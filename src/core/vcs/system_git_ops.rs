//! Release operations for SystemGit (branches, commits, tags, remotes)

use super::system_git::SystemGit;
use crate::core::error::{GitError, PromoteError, PromoteResult};

impl SystemGit<'_> {
  /// Fetch from remote
  pub fn fetch(&self, remote: &str) -> PromoteResult<()> {
    self.run_checked(&["fetch", "--prune", remote]).map(|_| ())
  }

  /// Check if a local branch exists
  pub fn branch_exists(&self, branch: &str) -> PromoteResult<bool> {
    let listed = self.run_checked(&["branch", "--list", branch])?;
    Ok(!listed.is_empty())
  }

  /// Check if a branch exists on the remote
  pub fn remote_branch_exists(&self, remote: &str, branch: &str) -> PromoteResult<bool> {
    let refname = format!("refs/heads/{}", branch);
    let listed = self.run_checked(&["ls-remote", "--heads", remote, &refname])?;
    Ok(!listed.is_empty())
  }

  /// Check out `branch`, creating it from HEAD if it does not exist yet.
  /// Uncommitted changes in the working tree are carried over.
  pub fn checkout_branch(&self, branch: &str) -> PromoteResult<()> {
    if self.branch_exists(branch)? {
      self.run_checked(&["checkout", branch])?;
    } else {
      self.run_checked(&["checkout", "-b", branch])?;
    }
    Ok(())
  }

  /// Stage every change in the working tree (additions, modifications, deletions)
  pub fn add_all(&self) -> PromoteResult<()> {
    self.run_checked(&["add", "--all", "--", "."]).map(|_| ())
  }

  /// Whether the index differs from HEAD
  pub fn has_staged_changes(&self) -> PromoteResult<bool> {
    let output = self.run(&["diff", "--cached", "--quiet"])?;
    match output.code {
      Some(0) => Ok(false),
      Some(1) => Ok(true),
      _ => Err(PromoteError::Git(GitError::CommandFailed {
        command: "git diff --cached --quiet".to_string(),
        stderr: output.stderr,
      })),
    }
  }

  /// Commit the index
  pub fn commit(&self, message: &str) -> PromoteResult<String> {
    self.run_checked(&["commit", "--no-verify", "-m", message])?;
    self.head_commit()
  }

  /// Check if a tag exists locally
  pub fn tag_exists(&self, tag: &str) -> PromoteResult<bool> {
    let listed = self.run_checked(&["tag", "--list", tag])?;
    Ok(listed.lines().any(|l| l.trim() == tag))
  }

  /// Create an annotated tag on HEAD
  pub fn create_annotated_tag(&self, tag: &str, message: &str) -> PromoteResult<()> {
    self.run_checked(&["tag", "-a", tag, "-m", message]).map(|_| ())
  }

  /// List tag names matching a glob pattern
  pub fn list_tags(&self, pattern: &str) -> PromoteResult<Vec<String>> {
    let listed = self.run_checked(&["tag", "--list", pattern])?;
    Ok(
      listed
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect(),
    )
  }

  /// List local branches whose name starts with `prefix`
  pub fn list_branches(&self, prefix: &str) -> PromoteResult<Vec<String>> {
    let listed = self.run_checked(&["for-each-ref", "--format=%(refname:short)", "refs/heads"])?;
    Ok(
      listed
        .lines()
        .map(str::trim)
        .filter(|b| b.starts_with(prefix))
        .map(str::to_string)
        .collect(),
    )
  }

  /// List branches on `remote` whose name starts with `prefix`
  pub fn list_remote_branches(&self, remote: &str, prefix: &str) -> PromoteResult<Vec<String>> {
    let listed = self.run_checked(&["ls-remote", "--heads", remote])?;
    Ok(
      listed
        .lines()
        // Format: "<sha>\trefs/heads/<branch>"
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter_map(|r| r.strip_prefix("refs/heads/"))
        .filter(|b| b.starts_with(prefix))
        .map(str::to_string)
        .collect(),
    )
  }

  /// Push a branch, setting upstream
  pub fn push_branch(&self, remote: &str, branch: &str) -> PromoteResult<()> {
    let output = self.run(&["push", "-u", remote, branch])?;

    if !output.success {
      return Err(PromoteError::Git(GitError::PushFailed {
        remote: remote.to_string(),
        branch: branch.to_string(),
        reason: output.stderr.trim().to_string(),
      }));
    }

    Ok(())
  }

  /// Push a single tag
  pub fn push_tag(&self, remote: &str, tag: &str) -> PromoteResult<()> {
    let refspec = format!("refs/tags/{}", tag);
    let output = self.run(&["push", remote, &refspec])?;

    if !output.success {
      return Err(PromoteError::Git(GitError::PushFailed {
        remote: remote.to_string(),
        branch: tag.to_string(),
        reason: output.stderr.trim().to_string(),
      }));
    }

    Ok(())
  }
}
