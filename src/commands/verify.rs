//! `promote verify`: report (and repair) release state

use crate::core::context::RunContext;
use crate::core::error::PromoteResult;
use crate::core::vcs::{HostingCli, SystemGit, SystemRunner};
use crate::release::verify::{RecordState, VerifyReport};
use crate::release::changelog::ChangelogWriter;
use crate::release::{ReleaseVerifier, VersionManager};

pub fn run_verify(ctx: &RunContext, repair: bool, json: bool) -> PromoteResult<()> {
  let runner = SystemRunner;
  let config = ctx.config.as_ref();
  let git = SystemGit::open(&runner, &ctx.root)?.with_identity(config.identity());
  let hosting = HostingCli::new(&runner, &config.hosting_cli, git.work_tree());

  let versions = VersionManager::new(ctx.version_path());
  let changelog = ChangelogWriter::new(ctx.changelog_path());
  let report = ReleaseVerifier::new(&git, &hosting, config, versions, changelog)
    .repair(repair)
    .verify()?;

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    print_report(&report);
  }
  Ok(())
}

fn print_report(report: &VerifyReport) {
  println!("🔎 Release state");
  println!();
  println!(
    "  Version:         {}",
    report.persisted_version.as_deref().unwrap_or("(none)")
  );
  println!(
    "  Changelog:       {}",
    report.changelog_version.as_deref().unwrap_or("(no entries)")
  );
  println!(
    "  Latest branch:   {}",
    report.latest_branch.as_deref().unwrap_or("(none)")
  );
  println!("  Latest tag:      {}", report.latest_tag.as_deref().unwrap_or("(none)"));
  println!(
    "  Branches:        {} local, {} remote",
    report.branches.len(),
    report.remote_branches.len()
  );
  println!("  Tags:            {}", report.tags.len());
  println!("  Pull request:    {}", describe(&report.pull_request));
  println!("  Hosted release:  {}", describe(&report.release));
  println!();

  for check in report.stages() {
    let glyph = if check.complete { "✅" } else { "⬜" };
    println!("  {} {}", glyph, check.stage);
  }
}

fn describe(state: &RecordState) -> String {
  match state {
    RecordState::Present(Some(url)) => format!("present ({})", url),
    RecordState::Present(None) => "present".to_string(),
    RecordState::Created(Some(url)) => format!("created ({})", url),
    RecordState::Created(None) => "created".to_string(),
    RecordState::Missing => "missing".to_string(),
    RecordState::Unchecked(reason) => format!("not checked: {}", reason),
    RecordState::Failed(reason) => format!("check failed: {}", reason),
  }
}
