//! Prepend-only changelog
//!
//! A new entry is a header line, a fixed note, and a blank line, followed by
//! the previous file content byte for byte. The file is replaced atomically.

use crate::core::error::{PromoteResult, ResultExt};
use chrono::NaiveDate;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Note line written under every automated entry
pub const RELEASE_NOTE: &str = "- Automated release from build artifact.";

/// Header line for `version` released on `date`
pub fn header(version: &str, date: NaiveDate) -> String {
  format!("## v{} — {}", version, date.format("%Y-%m-%d"))
}

/// The text prepended for one release
pub fn entry(version: &str, date: NaiveDate) -> String {
  format!("{}\n{}\n\n", header(version, date), RELEASE_NOTE)
}

/// Version of the newest entry, if any
pub fn latest_version(content: &str) -> Option<&str> {
  content.lines().find_map(|line| {
    let rest = line.strip_prefix("## v")?;
    rest.split_whitespace().next()
  })
}

pub struct ChangelogWriter {
  path: PathBuf,
}

impl ChangelogWriter {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// Version of the newest entry in the file, `None` if absent or empty
  pub fn latest_version(&self) -> PromoteResult<Option<String>> {
    let prior = self.read_prior()?;
    Ok(latest_version(&String::from_utf8_lossy(&prior)).map(str::to_string))
  }

  /// Prior content as raw bytes (empty when absent)
  fn read_prior(&self) -> PromoteResult<Vec<u8>> {
    match fs::read(&self.path) {
      Ok(bytes) => Ok(bytes),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
      Err(e) => Err(e).with_context(|| format!("Failed to read changelog {}", self.path.display())),
    }
  }

  /// Prepend an entry for `version` and replace the file
  pub fn prepend(&self, version: &str, date: NaiveDate) -> PromoteResult<()> {
    let prior = self.read_prior()?;
    let mut content = entry(version, date).into_bytes();
    content.extend_from_slice(&prior);

    let dir = match self.path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
      _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    // Same directory so the final rename never crosses filesystems
    let mut tmp = NamedTempFile::new_in(&dir)
      .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(&content)?;
    // The temp file starts out 0600
    if let Some(permissions) = record_permissions(&self.path) {
      tmp.as_file().set_permissions(permissions)?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(&self.path)?;

    tracing::info!(path = %self.path.display(), version, "changelog updated");
    Ok(())
  }
}

/// Mode of the existing record, or the usual mode for a new one
fn record_permissions(path: &Path) -> Option<fs::Permissions> {
  match fs::metadata(path) {
    Ok(meta) => Some(meta.permissions()),
    Err(_) => new_record_permissions(),
  }
}

#[cfg(unix)]
fn new_record_permissions() -> Option<fs::Permissions> {
  use std::os::unix::fs::PermissionsExt;
  Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_record_permissions() -> Option<fs::Permissions> {
  None
}
