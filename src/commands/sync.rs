//! `promote sync`: merge an artifact into the destination without releasing

use crate::core::artifact::{self, ArtifactSource};
use crate::core::context::RunContext;
use crate::core::error::{PromoteError, PromoteResult};
use crate::core::sync::{FileOutcome, TreeSynchronizer};
use std::path::PathBuf;

/// Sync `source` (or the configured artifact) into the destination root
pub fn run_sync(ctx: &RunContext, source: Option<PathBuf>, dry_run: bool, json: bool) -> PromoteResult<()> {
  let config = &ctx.config;
  let resolved = match source {
    Some(path) if path.is_dir() => Some(ArtifactSource::Directory(path)),
    Some(path) if path.is_file() => Some(ArtifactSource::Archive(path)),
    Some(path) => {
      return Err(PromoteError::with_help(
        format!("Artifact not found: {}", path.display()),
        "Pass an existing directory or archive, or omit it to use the configured artifact",
      ));
    }
    None => artifact::resolve(config.archive.as_deref(), config.source_dir.as_deref()),
  };

  let Some(source) = resolved else {
    if json {
      println!("null");
    } else {
      println!("⚠️  No build artifact found (nothing to sync)");
    }
    return Ok(());
  };

  let staging = match &source {
    ArtifactSource::Archive(path) => Some(artifact::extract(path)?.0),
    ArtifactSource::Directory(_) => None,
  };
  let source_root = staging.as_ref().map_or(source.path(), |s| s.root());

  let exclusions = config.exclusions();
  let outcome = TreeSynchronizer::new(&exclusions)
    .dry_run(dry_run)
    .show_progress(!json)
    .sync(source_root, &ctx.root)?;

  if json {
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    return Ok(());
  }

  for (path, file) in &outcome.files {
    let mark = match file {
      FileOutcome::Copied => "+",
      FileOutcome::Updated => "~",
      FileOutcome::Skipped => continue,
    };
    println!("  {} {}", mark, path.display());
  }
  for failure in &outcome.failures {
    println!("  ⚠️  {}: {}", failure.path.display(), failure.reason);
  }

  println!();
  println!(
    "{} {} of {} files changed ({} copied, {} updated, {} skipped)",
    if dry_run { "🔍" } else { "✅" },
    outcome.changed(),
    outcome.total(),
    outcome.copied,
    outcome.updated,
    outcome.skipped
  );
  if dry_run {
    println!("   Dry-run mode (no files written)");
  }
  Ok(())
}
