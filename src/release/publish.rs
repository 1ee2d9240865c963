//! Release publishing: commit, tag, push, pull request, hosted release
//!
//! Each step reports a [`StepOutcome`]. Only a failed branch push is fatal;
//! everything after it is safe to retry by re-running, and everything before
//! it naturally no-ops when nothing changed.

use crate::core::config::PromoteConfig;
use crate::core::error::{GitError, PromoteError};
use crate::core::step::{StepOutcome, StepRecord};
use crate::core::vcs::{HostingCli, SystemGit};
use serde::Serialize;

/// Subject of the release commit
pub fn commit_message(version: &str, skip_ci: bool) -> String {
  if skip_ci {
    format!("Release v{} [skip ci]", version)
  } else {
    format!("Release v{}", version)
  }
}

pub fn tag_name(version: &str) -> String {
  format!("v{}", version)
}

/// What the publisher did
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishReport {
  pub steps: Vec<StepRecord>,
  pub commit: Option<String>,
  pub pull_request: Option<String>,
  pub release: Option<String>,
}

#[cfg(test)]
impl PublishReport {
  fn fatal(&self) -> Option<&StepRecord> {
    self.steps.iter().find(|s| s.outcome.is_fatal())
  }

  fn outcome(&self, name: &str) -> Option<&StepOutcome> {
    self.steps.iter().find(|s| s.name == name).map(|s| &s.outcome)
  }
}

impl PublishReport {
  fn push(&mut self, name: &'static str, outcome: StepOutcome) -> bool {
    let fatal = outcome.is_fatal();
    self.steps.push(StepRecord::new(name, outcome));
    !fatal
  }
}

/// Drives the version-control and hosting steps of a release
pub struct ReleasePublisher<'a> {
  git: &'a SystemGit<'a>,
  hosting: &'a HostingCli<'a>,
  config: &'a PromoteConfig,
}

impl<'a> ReleasePublisher<'a> {
  pub fn new(git: &'a SystemGit<'a>, hosting: &'a HostingCli<'a>, config: &'a PromoteConfig) -> Self {
    Self { git, hosting, config }
  }

  /// Fetch the remote and check out `branch` (created from HEAD if new).
  /// Both are soft: a stale or offline remote must not block a release.
  pub fn prepare(&self, branch: &str) -> Vec<StepRecord> {
    let mut steps = Vec::new();

    let fetch = if !self.config.fetch {
      StepOutcome::Skipped("fetch disabled".to_string())
    } else {
      match self.git.fetch(&self.config.remote) {
        Ok(()) => StepOutcome::Ok,
        Err(e) => StepOutcome::SoftFailure(e.to_string()),
      }
    };
    steps.push(StepRecord::new("fetch", fetch));

    let checkout = match self.git.checkout_branch(branch) {
      Ok(()) => StepOutcome::Ok,
      Err(e) => StepOutcome::SoftFailure(e.to_string()),
    };
    steps.push(StepRecord::new("checkout", checkout));

    steps
  }

  /// Run the publishing steps in order, stopping at the first fatal one
  pub fn publish(&self, version: &str, branch: &str) -> PublishReport {
    let mut report = PublishReport::default();
    let tag = tag_name(version);
    let remote = self.config.remote.as_str();

    let (stage, has_changes) = match self.git.add_all().and_then(|_| self.git.has_staged_changes()) {
      Ok(changes) => (StepOutcome::Ok, changes),
      Err(e) => (StepOutcome::SoftFailure(e.to_string()), false),
    };
    report.push("stage", stage);

    let commit = if !has_changes {
      StepOutcome::Skipped("nothing to commit".to_string())
    } else {
      match self.git.commit(&commit_message(version, self.config.skip_ci)) {
        Ok(sha) => {
          report.commit = Some(sha);
          StepOutcome::Ok
        }
        Err(e) => StepOutcome::SoftFailure(e.to_string()),
      }
    };
    report.push("commit", commit);

    let tagged = match self.git.tag_exists(&tag) {
      Ok(true) => StepOutcome::Skipped(format!("tag {} already exists", tag)),
      Ok(false) => match self.git.create_annotated_tag(&tag, &format!("Release {}", tag)) {
        Ok(()) => StepOutcome::Ok,
        Err(e) => StepOutcome::SoftFailure(e.to_string()),
      },
      Err(e) => StepOutcome::SoftFailure(e.to_string()),
    };
    let tag_present = !matches!(tagged, StepOutcome::SoftFailure(_));
    report.push("tag", tagged);

    let pushed = match self.git.push_branch(remote, branch) {
      Ok(()) => StepOutcome::Ok,
      Err(PromoteError::Git(GitError::PushFailed { reason, .. })) => StepOutcome::Fatal(reason),
      Err(e) => StepOutcome::Fatal(e.to_string()),
    };
    if !report.push("push-branch", pushed) {
      return report;
    }

    let tag_push = if !tag_present {
      StepOutcome::Skipped("tag was not created".to_string())
    } else {
      match self.git.push_tag(remote, &tag) {
        Ok(()) => StepOutcome::Ok,
        Err(e) => StepOutcome::SoftFailure(e.to_string()),
      }
    };
    report.push("push-tag", tag_push);

    let pr = self.open_pull_request(version, branch, &mut report.pull_request);
    report.push("pull-request", pr);

    let release = self.create_release(version, &mut report.release);
    report.push("hosted-release", release);

    report
  }

  /// Open a PR from `branch` into the base branch unless one already exists
  pub fn open_pull_request(&self, version: &str, branch: &str, url: &mut Option<String>) -> StepOutcome {
    if !self.config.open_pr {
      return StepOutcome::Skipped("pull requests disabled".to_string());
    }
    if !self.hosting.is_available() {
      return StepOutcome::Skipped(format!("{} not found on PATH", self.hosting.program()));
    }

    let base = self.config.base_branch.as_str();
    match self.hosting.find_pull_request(base, branch) {
      Ok(Some(existing)) => {
        *url = Some(existing);
        return StepOutcome::Skipped("pull request already exists".to_string());
      }
      Ok(None) => {}
      Err(e) => return StepOutcome::SoftFailure(e.to_string()),
    }

    let title = format!("Release v{}", version);
    let body = format!("Automated release of v{} from build artifact.", version);
    match self.hosting.create_pull_request(base, branch, &title, &body) {
      Ok(created) => {
        *url = Some(created);
        StepOutcome::Ok
      }
      Err(e) => StepOutcome::SoftFailure(e.to_string()),
    }
  }

  /// Create the hosted release for `v<version>` unless it already exists
  pub fn create_release(&self, version: &str, url: &mut Option<String>) -> StepOutcome {
    if !self.config.create_release {
      return StepOutcome::Skipped("hosted releases disabled".to_string());
    }
    if !self.hosting.is_available() {
      return StepOutcome::Skipped(format!("{} not found on PATH", self.hosting.program()));
    }

    let tag = tag_name(version);
    match self.hosting.release_exists(&tag) {
      Ok(true) => return StepOutcome::Skipped(format!("release {} already exists", tag)),
      Ok(false) => {}
      Err(e) => return StepOutcome::SoftFailure(e.to_string()),
    }

    match self
      .hosting
      .create_release(&tag, &tag, crate::release::changelog::RELEASE_NOTE)
    {
      Ok(created) => {
        *url = Some(created);
        StepOutcome::Ok
      }
      Err(e) => StepOutcome::SoftFailure(e.to_string()),
    }
  }
}
