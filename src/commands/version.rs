//! `promote version`: show (and optionally persist) the next version

use crate::core::context::RunContext;
use crate::core::error::PromoteResult;
use crate::release::VersionManager;

pub fn run_version(ctx: &RunContext, write: bool, json: bool) -> PromoteResult<()> {
  let directive = ctx.config.bump_directive()?;
  let versions = VersionManager::new(ctx.version_path());

  let change = if write {
    versions.bump(&directive)?
  } else {
    versions.plan(&directive)?
  };

  if json {
    println!("{}", serde_json::to_string_pretty(&change)?);
    return Ok(());
  }

  println!("  Current:  {}", change.previous.as_deref().unwrap_or("(none, 0.0.0)"));
  println!("  Next:     {} ({})", change.next, directive.name());
  if write {
    println!();
    println!("✅ Wrote {}", versions.path().display());
  }
  Ok(())
}
