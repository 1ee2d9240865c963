//! Release state reconciliation
//!
//! Re-derives where the last release got to from the repository alone:
//! release branches (local and remote), version tags, the persisted version
//! and, when the hosting CLI is present, the pull request and hosted release.
//! Missing pull requests and releases are created with the same rules the
//! publisher uses.

use crate::core::config::PromoteConfig;
use crate::core::error::PromoteResult;
use crate::core::step::StepOutcome;
use crate::core::vcs::{HostingCli, SystemGit};
use crate::release::changelog::ChangelogWriter;
use crate::release::publish::{ReleasePublisher, tag_name};
use crate::release::version::VersionManager;
use serde::Serialize;
use std::collections::BTreeSet;

/// State of an externally owned record (pull request or hosted release)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum RecordState {
  /// Already there (with its URL when known)
  Present(Option<String>),
  /// Created by this verification
  Created(Option<String>),
  /// Not there and not created
  Missing,
  /// Could not be checked (no CLI, nothing to check against)
  Unchecked(String),
  /// The CLI call failed
  Failed(String),
}

impl RecordState {
  pub fn is_complete(&self) -> bool {
    matches!(self, RecordState::Present(_) | RecordState::Created(_))
  }
}

/// One pipeline stage and whether the repository shows it done
#[derive(Debug, Clone, Serialize)]
pub struct StageCheck {
  pub stage: &'static str,
  pub complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
  pub branches: Vec<String>,
  pub remote_branches: Vec<String>,
  /// `v*` tags, newest version first
  pub tags: Vec<String>,
  pub persisted_version: Option<String>,
  /// Version of the newest changelog entry
  pub changelog_version: Option<String>,
  pub version_tagged: bool,
  pub hosting_available: bool,
  pub latest_branch: Option<String>,
  pub latest_tag: Option<String>,
  pub pull_request: RecordState,
  pub release: RecordState,
}

impl VerifyReport {
  pub fn stages(&self) -> Vec<StageCheck> {
    vec![
      StageCheck {
        stage: "versioned",
        complete: self.persisted_version.is_some(),
      },
      StageCheck {
        stage: "changelogged",
        complete: self.persisted_version.is_some() && self.changelog_version == self.persisted_version,
      },
      StageCheck {
        stage: "branched",
        complete: self.latest_branch.is_some(),
      },
      StageCheck {
        stage: "tagged",
        complete: self.version_tagged,
      },
      StageCheck {
        stage: "pushed",
        complete: !self.remote_branches.is_empty(),
      },
      StageCheck {
        stage: "published",
        complete: self.pull_request.is_complete() || self.release.is_complete(),
      },
    ]
  }
}

/// Sort tags by semantic version, newest first. Tags that are not
/// `v<semver>` go last in name order.
pub fn sort_tags(tags: &mut [String]) {
  let parse = |t: &str| semver::Version::parse(t.strip_prefix('v').unwrap_or(t)).ok();
  tags.sort_by(|a, b| match (parse(a), parse(b)) {
    (Some(va), Some(vb)) => vb.cmp(&va),
    (Some(_), None) => std::cmp::Ordering::Less,
    (None, Some(_)) => std::cmp::Ordering::Greater,
    (None, None) => a.cmp(b),
  });
}

pub struct ReleaseVerifier<'a> {
  git: &'a SystemGit<'a>,
  hosting: &'a HostingCli<'a>,
  config: &'a PromoteConfig,
  versions: VersionManager,
  changelog: ChangelogWriter,
  repair: bool,
}

impl<'a> ReleaseVerifier<'a> {
  pub fn new(
    git: &'a SystemGit<'a>,
    hosting: &'a HostingCli<'a>,
    config: &'a PromoteConfig,
    versions: VersionManager,
    changelog: ChangelogWriter,
  ) -> Self {
    Self {
      git,
      hosting,
      config,
      versions,
      changelog,
      repair: true,
    }
  }

  /// Create missing pull requests and releases (default: true)
  pub fn repair(mut self, repair: bool) -> Self {
    self.repair = repair;
    self
  }

  pub fn verify(&self) -> PromoteResult<VerifyReport> {
    let prefix = self.config.branch_prefix.as_str();
    let branches = self.git.list_branches(prefix)?;
    let remote_branches = match self.git.list_remote_branches(&self.config.remote, prefix) {
      Ok(found) => found,
      Err(e) => {
        tracing::warn!(remote = %self.config.remote, error = %e, "could not list remote branches");
        Vec::new()
      }
    };

    let mut tags = self.git.list_tags("v*")?;
    sort_tags(&mut tags);

    let persisted_version = self.versions.read_raw()?.filter(|v| !v.is_empty());
    let changelog_version = self.changelog.latest_version()?;
    let version_tagged = match &persisted_version {
      Some(v) => tags.contains(&tag_name(v)),
      None => false,
    };

    let all_branches: BTreeSet<&String> = branches.iter().chain(remote_branches.iter()).collect();
    let latest_branch = all_branches.into_iter().max_by(|a, b| compare_branches(a, b)).cloned();
    let latest_tag = tags.first().cloned();
    let hosting_available = self.hosting.is_available();

    let publisher = ReleasePublisher::new(self.git, self.hosting, self.config);

    let pull_request = match (&latest_branch, hosting_available) {
      (_, false) => RecordState::Unchecked(format!("{} not found on PATH", self.hosting.program())),
      (None, true) => RecordState::Unchecked("no release branch".to_string()),
      (Some(branch), true) => {
        let version = persisted_version.as_deref().unwrap_or("0.0.0");
        self.check_pull_request(&publisher, branch, version)
      }
    };

    let release = match (&latest_tag, hosting_available) {
      (_, false) => RecordState::Unchecked(format!("{} not found on PATH", self.hosting.program())),
      (None, true) => RecordState::Unchecked("no version tag".to_string()),
      (Some(tag), true) => self.check_release(&publisher, tag),
    };

    let report = VerifyReport {
      branches,
      remote_branches,
      tags,
      persisted_version,
      changelog_version,
      version_tagged,
      hosting_available,
      latest_branch,
      latest_tag,
      pull_request,
      release,
    };
    tracing::info!(
      branch = report.latest_branch.as_deref().unwrap_or("<none>"),
      tag = report.latest_tag.as_deref().unwrap_or("<none>"),
      "verification finished"
    );
    Ok(report)
  }

  fn check_pull_request(&self, publisher: &ReleasePublisher<'_>, branch: &str, version: &str) -> RecordState {
    match self.hosting.find_pull_request(&self.config.base_branch, branch) {
      Ok(Some(url)) => return RecordState::Present(Some(url)),
      Ok(None) if !self.repair => return RecordState::Missing,
      Ok(None) => {}
      Err(e) => return RecordState::Failed(e.to_string()),
    }

    let mut url = None;
    repaired(publisher.open_pull_request(version, branch, &mut url), url)
  }

  fn check_release(&self, publisher: &ReleasePublisher<'_>, tag: &str) -> RecordState {
    match self.hosting.release_exists(tag) {
      Ok(true) => return RecordState::Present(None),
      Ok(false) if !self.repair => return RecordState::Missing,
      Ok(false) => {}
      Err(e) => return RecordState::Failed(e.to_string()),
    }

    let version = tag.strip_prefix('v').unwrap_or(tag);
    let mut url = None;
    repaired(publisher.create_release(version, &mut url), url)
  }
}

fn repaired(outcome: StepOutcome, url: Option<String>) -> RecordState {
  match outcome {
    StepOutcome::Ok => RecordState::Created(url.filter(|u| !u.is_empty())),
    StepOutcome::Skipped(reason) => {
      tracing::info!(reason = %reason, "record not created");
      RecordState::Missing
    }
    StepOutcome::SoftFailure(reason) | StepOutcome::Fatal(reason) => RecordState::Failed(reason),
  }
}

/// Same-second collisions get `-2`, `-3`, ... suffixes, so compare the
/// timestamp part first and the numeric suffix second.
fn compare_branches(a: &str, b: &str) -> std::cmp::Ordering {
  let split = |name: &str| -> (String, u64) {
    match name.rsplit_once('-') {
      Some((head, n)) if head.contains('-') && !n.is_empty() && n.len() < 6 && n.chars().all(|c| c.is_ascii_digit()) => {
        (head.to_string(), n.parse().unwrap_or(0))
      }
      _ => (name.to_string(), 1),
    }
  };
  split(a).cmp(&split(b))
}
