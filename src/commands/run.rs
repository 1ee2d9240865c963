//! `promote run`: the full release pipeline

use crate::core::context::RunContext;
use crate::core::error::PromoteResult;
use crate::core::step::StepOutcome;
use crate::core::vcs::SystemRunner;
use crate::release::{Pipeline, RunReport, Stage};

/// Run the release pipeline against the destination in `ctx`
pub fn run_release(ctx: &RunContext, dry_run: bool, json: bool) -> PromoteResult<()> {
  let runner = SystemRunner;
  let report = Pipeline::new(ctx, &runner)
    .dry_run(dry_run)
    .show_progress(!json)
    .run()?;

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    print_report(&report);
  }

  match report.failure(&ctx.config.remote) {
    Some(err) => Err(err),
    None => Ok(()),
  }
}

fn print_report(report: &RunReport) {
  if report.stage == Stage::NoSource {
    println!("⚠️  No build artifact found (nothing to release)");
    return;
  }

  match &report.version {
    Some(change) => println!(
      "📦 Release v{} ({} → {})",
      change.next,
      change.previous.as_deref().unwrap_or("none"),
      change.next
    ),
    None => println!("📦 Release"),
  }
  println!();

  if let Some(source) = &report.source {
    match report.format {
      Some(format) => println!("  Source:  {} ({:?})", source.path().display(), format),
      None => println!("  Source:  {} (directory)", source.path().display()),
    }
  }
  if let Some(branch) = &report.branch {
    println!("  Branch:  {}", branch);
  }
  if let Some(tag) = &report.tag {
    println!("  Tag:     {}", tag);
  }
  if let Some(sync) = &report.sync {
    println!(
      "  Sync:    {} copied, {} updated, {} skipped",
      sync.copied, sync.updated, sync.skipped
    );
    for failure in &sync.failures {
      println!("           ⚠️  {}: {}", failure.path.display(), failure.reason);
    }
  }

  if !report.steps.is_empty() {
    println!();
    println!("  Steps:");
    for step in &report.steps {
      let detail = match &step.outcome {
        StepOutcome::Ok => "ok".to_string(),
        StepOutcome::Skipped(reason) => format!("skipped ({})", reason),
        StepOutcome::SoftFailure(reason) => format!("soft: {}", reason),
        StepOutcome::Fatal(reason) => format!("fatal: {}", reason),
      };
      println!("    {} {:<15} {}", step.outcome.glyph(), step.name, detail);
    }
  }

  if let Some(url) = &report.pull_request {
    println!();
    println!("  Pull request: {}", url);
  }
  if let Some(url) = &report.release {
    println!("  Release:      {}", url);
  }

  println!();
  if report.dry_run {
    println!("🔍 Dry-run mode (no changes applied)");
  } else if report.fatal().is_some() {
    println!("❌ Stopped after stage: {}", report.stage);
  } else {
    println!("✅ Reached stage: {}", report.stage);
  }
}
