//! The release pipeline
//!
//! One sequential pass through an ordered list of stages:
//!
//! ```text
//! Resolved -> Extracted | DirectSource -> Synced -> Versioned
//!          -> Changelogged -> Committed -> Tagged -> Pushed -> Published
//! ```
//!
//! Stages never move backwards and nothing is rolled back. A failed run is
//! resumed by running again.

use crate::core::artifact::{self, ArchiveFormat, ArtifactSource};
use crate::core::context::RunContext;
use crate::core::error::{GitError, PromoteError, PromoteResult};
use crate::core::step::{StepOutcome, StepRecord};
use crate::core::sync::{SyncOutcome, TreeSynchronizer};
use crate::core::vcs::{CommandRunner, HostingCli, SystemGit};
use crate::release::changelog::ChangelogWriter;
use crate::release::publish::{ReleasePublisher, tag_name};
use crate::release::version::{VersionChange, VersionManager};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Furthest point a run reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  /// No artifact was found; nothing happened
  NoSource,
  Resolved,
  Extracted,
  DirectSource,
  Synced,
  Versioned,
  Changelogged,
  Committed,
  Tagged,
  Pushed,
  Published,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::NoSource => "no source",
      Stage::Resolved => "resolved",
      Stage::Extracted => "extracted",
      Stage::DirectSource => "direct source",
      Stage::Synced => "synced",
      Stage::Versioned => "versioned",
      Stage::Changelogged => "changelogged",
      Stage::Committed => "committed",
      Stage::Tagged => "tagged",
      Stage::Pushed => "pushed",
      Stage::Published => "published",
    };
    f.write_str(name)
  }
}

/// Summary of one run (also the `--json` document)
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub stage: Stage,
  pub dry_run: bool,
  pub source: Option<ArtifactSource>,
  pub format: Option<ArchiveFormat>,
  pub sync: Option<SyncOutcome>,
  pub version: Option<VersionChange>,
  pub branch: Option<String>,
  pub tag: Option<String>,
  pub commit: Option<String>,
  pub pull_request: Option<String>,
  pub release: Option<String>,
  pub steps: Vec<StepRecord>,
}

impl RunReport {
  fn new(dry_run: bool) -> Self {
    Self {
      stage: Stage::Resolved,
      dry_run,
      source: None,
      format: None,
      sync: None,
      version: None,
      branch: None,
      tag: None,
      commit: None,
      pull_request: None,
      release: None,
      steps: Vec::new(),
    }
  }

  fn reach(&mut self, stage: Stage) {
    self.stage = self.stage.max(stage);
  }

  /// Advance past the publishing steps that completed
  fn record_publish_steps(&mut self, steps: Vec<StepRecord>) {
    for step in steps {
      let done = matches!(step.outcome, StepOutcome::Ok | StepOutcome::Skipped(_));
      match step.name {
        "commit" if done => self.reach(Stage::Committed),
        "tag" if done => self.reach(Stage::Tagged),
        "push-branch" if step.outcome.is_ok() => self.reach(Stage::Pushed),
        "pull-request" | "hosted-release" if step.outcome.is_ok() => self.reach(Stage::Published),
        _ => {}
      }
      self.steps.push(step);
    }
  }

  pub fn fatal(&self) -> Option<&StepRecord> {
    self.steps.iter().find(|s| s.outcome.is_fatal())
  }

  /// The error a fatal step maps to, if the run had one
  pub fn failure(&self, remote: &str) -> Option<PromoteError> {
    let step = self.fatal()?;
    let StepOutcome::Fatal(reason) = &step.outcome else {
      return None;
    };
    let err = match step.name {
      "push-branch" => GitError::PushFailed {
        remote: remote.to_string(),
        branch: self.branch.clone().unwrap_or_default(),
        reason: reason.clone(),
      },
      name => GitError::CommandFailed {
        command: name.to_string(),
        stderr: reason.clone(),
      },
    };
    Some(PromoteError::Git(err))
  }
}

/// `<prefix><YYYYMMDD-HHMMSS>` in UTC
pub fn branch_name(prefix: &str, at: DateTime<Utc>) -> String {
  format!("{}{}", prefix, at.format("%Y%m%d-%H%M%S"))
}

/// First of `base`, `base-2`, `base-3`, ... not present locally or on `remote`
pub fn unique_branch_name(git: &SystemGit<'_>, remote: &str, base: &str) -> PromoteResult<String> {
  let taken = |name: &str| -> PromoteResult<bool> {
    if git.branch_exists(name)? {
      return Ok(true);
    }
    match git.remote_branch_exists(remote, name) {
      Ok(found) => Ok(found),
      Err(e) => {
        tracing::debug!(remote, error = %e, "remote branch lookup failed");
        Ok(false)
      }
    }
  };

  let mut candidate = base.to_string();
  let mut n = 2;
  while taken(&candidate)? {
    candidate = format!("{}-{}", base, n);
    n += 1;
  }
  Ok(candidate)
}

/// Runs a release against one destination
pub struct Pipeline<'a> {
  ctx: &'a RunContext,
  runner: &'a dyn CommandRunner,
  dry_run: bool,
  show_progress: bool,
}

impl<'a> Pipeline<'a> {
  pub fn new(ctx: &'a RunContext, runner: &'a dyn CommandRunner) -> Self {
    Self {
      ctx,
      runner,
      dry_run: false,
      show_progress: true,
    }
  }

  /// Preview the run without writing anything
  pub fn dry_run(mut self, dry_run: bool) -> Self {
    self.dry_run = dry_run;
    self
  }

  pub fn show_progress(mut self, show: bool) -> Self {
    self.show_progress = show;
    self
  }

  /// Run every stage in order.
  ///
  /// Returns `Err` for errors raised before publishing (unsupported archive,
  /// not a repository, bad configuration). A failed branch push is reported
  /// as a fatal step in the returned report instead; see [`RunReport::failure`].
  pub fn run(&self) -> PromoteResult<RunReport> {
    let config = &self.ctx.config;
    let mut report = RunReport::new(self.dry_run);

    let Some(source) = artifact::resolve(config.archive.as_deref(), config.source_dir.as_deref()) else {
      tracing::warn!("no build artifact found, nothing to release");
      report.stage = Stage::NoSource;
      return Ok(report);
    };
    tracing::info!(source = %source.path().display(), "artifact resolved");
    report.source = Some(source.clone());

    let directive = config.bump_directive()?;

    // Removed when this function returns, on every path
    let staging = match &source {
      ArtifactSource::Archive(path) => {
        let (staging, format) = artifact::extract(path)?;
        report.format = Some(format);
        report.reach(Stage::Extracted);
        Some(staging)
      }
      ArtifactSource::Directory(_) => {
        report.reach(Stage::DirectSource);
        None
      }
    };
    let source_root = staging.as_ref().map_or(source.path(), |s| s.root());

    let exclusions = config.exclusions();
    let synchronizer = TreeSynchronizer::new(&exclusions)
      .dry_run(self.dry_run)
      .show_progress(self.show_progress);
    let versions = VersionManager::new(self.ctx.version_path());
    let base_branch = branch_name(&config.branch_prefix, self.ctx.started_at);

    if self.dry_run {
      report.sync = Some(synchronizer.sync(source_root, &self.ctx.root)?);
      let change = versions.plan(&directive)?;
      report.tag = Some(tag_name(&change.next));
      report.version = Some(change);
      report.branch = Some(base_branch);
      return Ok(report);
    }

    let git = SystemGit::open(self.runner, &self.ctx.root)?.with_identity(config.identity());
    let hosting = HostingCli::new(self.runner, &config.hosting_cli, git.work_tree());
    let publisher = ReleasePublisher::new(&git, &hosting, config);

    let starting = git.current_branch()?;
    let branch = unique_branch_name(&git, &config.remote, &base_branch)?;
    tracing::info!(branch = %branch, from = %starting, "release branch selected");
    report.branch = Some(branch.clone());
    report.steps.extend(publisher.prepare(&branch));

    let sync = synchronizer.sync(source_root, &self.ctx.root)?;
    for failure in &sync.failures {
      tracing::warn!(path = %failure.path.display(), reason = %failure.reason, "file not synced");
    }
    report.sync = Some(sync);
    report.reach(Stage::Synced);

    let change = versions.bump(&directive)?;
    report.tag = Some(tag_name(&change.next));
    report.reach(Stage::Versioned);

    ChangelogWriter::new(self.ctx.changelog_path()).prepend(&change.next, self.ctx.started_at.date_naive())?;
    report.reach(Stage::Changelogged);

    let published = publisher.publish(&change.next, &branch);
    report.version = Some(change);
    report.commit = published.commit;
    report.pull_request = published.pull_request;
    report.release = published.release;
    report.record_publish_steps(published.steps);

    drop(staging);
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::config::ConfigOverrides;
  use crate::core::vcs::CommandOutput;
  use crate::core::vcs::testing::ScriptedRunner;
  use chrono::TimeZone;
  use std::fs;
  use std::path::Path;
  use tempfile::TempDir;

  fn context(root: &Path, source_dir: Option<&Path>) -> RunContext {
    let overrides = ConfigOverrides {
      source_dir: source_dir.map(Path::to_path_buf),
      ..ConfigOverrides::default()
    };
    RunContext::build_with_env(root, &overrides, Vec::new()).unwrap()
  }

  fn repo_runner(root: &Path) -> ScriptedRunner {
    ScriptedRunner::new()
      .on(
        "git rev-parse --show-toplevel",
        CommandOutput::ok(format!("{}\n", root.display())),
      )
      .on("git diff --cached --quiet", CommandOutput::failed(1, ""))
      .on("git rev-parse HEAD", CommandOutput::ok("f00d\n"))
  }

  #[test]
  fn test_branch_name_format() {
    let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 5, 7).unwrap();
    assert_eq!(branch_name("release/", at), "release/20250314-090507");
  }

  #[test]
  fn test_unique_branch_name_appends_suffix() {
    let runner = ScriptedRunner::new()
      .on("git branch --list release/x-", CommandOutput::ok(""))
      .on("git branch --list release/x", CommandOutput::ok("  release/x\n"))
      .on(
        "git ls-remote --heads origin refs/heads/release/x-2",
        CommandOutput::ok("abc\trefs/heads/release/x-2\n"),
      );
    let git = SystemGit::new(&runner, Path::new("/repo"));

    assert_eq!(unique_branch_name(&git, "origin", "release/x").unwrap(), "release/x-3");
  }

  #[test]
  fn test_no_source_is_terminal() {
    let dest = TempDir::new().unwrap();
    let ctx = context(dest.path(), Some(&dest.path().join("missing")));
    let runner = ScriptedRunner::new();

    let report = Pipeline::new(&ctx, &runner).run().unwrap();

    assert_eq!(report.stage, Stage::NoSource);
    assert!(runner.calls().is_empty());
    assert!(!ctx.version_path().exists());
  }

  #[test]
  fn test_directory_release_reaches_published_stages() {
    let dest = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("app.js"), "console.log(1)").unwrap();
    fs::write(dest.path().join("VERSION"), "0.4.2\n").unwrap();

    let ctx = context(dest.path(), Some(src.path()));
    let runner = repo_runner(dest.path());
    let report = Pipeline::new(&ctx, &runner).show_progress(false).run().unwrap();

    assert_eq!(report.stage, Stage::Pushed);
    assert_eq!(report.sync.as_ref().unwrap().copied, 1);
    assert_eq!(report.version.as_ref().unwrap().next, "0.4.3");
    assert_eq!(report.tag.as_deref(), Some("v0.4.3"));
    assert_eq!(report.commit.as_deref(), Some("f00d"));
    assert!(report.fatal().is_none());
    assert_eq!(fs::read_to_string(dest.path().join("VERSION")).unwrap(), "0.4.3\n");
    assert!(
      fs::read_to_string(dest.path().join("CHANGELOG.md"))
        .unwrap()
        .starts_with("## v0.4.3 — ")
    );

    let branch = report.branch.unwrap();
    assert!(branch.starts_with("release/"));
    assert!(runner.called(&format!("git checkout -b {}", branch)));
  }

  #[test]
  fn test_push_failure_maps_to_git_error() {
    let dest = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), "a").unwrap();

    let ctx = context(dest.path(), Some(src.path()));
    let runner = ScriptedRunner::new()
      .on("git push -u", CommandOutput::failed(1, "remote: Permission denied"))
      .on("git diff --cached --quiet", CommandOutput::failed(1, ""));
    let report = Pipeline::new(&ctx, &runner).show_progress(false).run().unwrap();

    assert_eq!(report.stage, Stage::Tagged);
    let err = report.failure("origin").unwrap();
    assert_eq!(err.exit_code().as_i32(), 2);
    assert!(err.to_string().contains("Permission denied"));
    // Local state stays for a re-run
    assert_eq!(fs::read_to_string(dest.path().join("VERSION")).unwrap(), "0.0.1\n");
  }

  #[test]
  fn test_dry_run_writes_nothing() {
    let dest = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), "a").unwrap();
    fs::write(dest.path().join("VERSION"), "1.2.3\n").unwrap();

    let ctx = context(dest.path(), Some(src.path()));
    let runner = ScriptedRunner::new();
    let report = Pipeline::new(&ctx, &runner).dry_run(true).show_progress(false).run().unwrap();

    assert!(report.dry_run);
    assert_eq!(report.stage, Stage::DirectSource);
    assert_eq!(report.sync.unwrap().copied, 1);
    assert_eq!(report.version.unwrap().next, "1.2.4");
    assert!(!dest.path().join("a.txt").exists());
    assert!(!dest.path().join("CHANGELOG.md").exists());
    assert_eq!(fs::read_to_string(dest.path().join("VERSION")).unwrap(), "1.2.3\n");
    assert!(runner.calls().is_empty());
  }

  #[test]
  fn test_unsupported_archive_aborts_before_mutation() {
    let dest = TempDir::new().unwrap();
    let archive = dest.path().join("build.bin");
    fs::write(&archive, "definitely not an archive").unwrap();

    let overrides = ConfigOverrides {
      archive: Some(archive),
      ..ConfigOverrides::default()
    };
    let ctx = RunContext::build_with_env(dest.path(), &overrides, Vec::new()).unwrap();
    let runner = ScriptedRunner::new();

    let err = Pipeline::new(&ctx, &runner).run().unwrap_err();
    assert_eq!(err.exit_code().as_i32(), 3);
    assert!(runner.calls().is_empty());
    assert!(!ctx.version_path().exists());
  }
}
