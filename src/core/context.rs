//! Run context - build once, pass everywhere
//!
//! ```text
//! main.rs:
//!   RunContext::build() -> &RunContext
//!   |
//!   v
//! commands/run.rs, verify.rs, etc:
//!   fn run_*(ctx: &RunContext, ...)
//! ```

use crate::core::config::{ConfigOverrides, PromoteConfig};
use crate::core::error::{PromoteResult, ResultExt};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a command needs about the destination and its configuration
#[derive(Debug, Clone)]
pub struct RunContext {
  /// Destination working tree root (absolute path)
  pub root: PathBuf,

  /// Fully layered configuration
  pub config: Arc<PromoteConfig>,

  /// Run start, used for branch names and changelog dates
  pub started_at: DateTime<Utc>,
}

impl RunContext {
  /// Layer defaults, config file, process environment and CLI overrides
  pub fn build(root: &Path, overrides: &ConfigOverrides) -> PromoteResult<Self> {
    Self::build_with_env(root, overrides, std::env::vars())
  }

  /// Same as [`RunContext::build`] with an explicit environment
  pub fn build_with_env<I>(root: &Path, overrides: &ConfigOverrides, env: I) -> PromoteResult<Self>
  where
    I: IntoIterator<Item = (String, String)>,
  {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let root = absolute(&cwd, root);

    let mut config = PromoteConfig::load(&root)?;
    config.apply_env(env)?;
    config.apply_overrides(overrides);
    config.validate()?;

    // Artifact paths are given relative to where promote was started
    config.archive = config.archive.map(|p| absolute(&cwd, &p));
    config.source_dir = config.source_dir.map(|p| absolute(&cwd, &p));

    tracing::debug!(root = %root.display(), "run context ready");
    Ok(Self {
      root,
      config: Arc::new(config),
      started_at: Utc::now(),
    })
  }

  pub fn version_path(&self) -> PathBuf {
    self.root.join(&self.config.version_file)
  }

  pub fn changelog_path(&self) -> PathBuf {
    self.root.join(&self.config.changelog_file)
  }
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
  if path.is_absolute() { path.to_path_buf() } else { base.join(path) }
}
