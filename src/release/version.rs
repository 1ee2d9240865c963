//! Persisted version record and bump rules
//!
//! The record is a single line `MAJOR.MINOR.PATCH`. A missing record means
//! `0.0.0`; missing or non-numeric components read as zero. Writes are a
//! single overwrite with no rollback.

use crate::core::config::ENV_PREFIX;
use crate::core::error::{ConfigError, PromoteError, PromoteResult, ResultExt};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// `(major, minor, patch)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Version {
  pub major: u64,
  pub minor: u64,
  pub patch: u64,
}

impl Version {
  pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
    Self { major, minor, patch }
  }

  /// Parse leniently: `"1.2"` is `1.2.0`, `"x.5.y"` is `0.5.0`, `""` is `0.0.0`.
  /// A leading `v` is accepted.
  pub fn parse_lenient(s: &str) -> Self {
    let s = s.trim();
    let s = s.strip_prefix('v').unwrap_or(s);
    let mut parts = s.split('.').map(|p| p.trim().parse::<u64>().unwrap_or(0));

    Self {
      major: parts.next().unwrap_or(0),
      minor: parts.next().unwrap_or(0),
      patch: parts.next().unwrap_or(0),
    }
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
  }
}

/// How the next version is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BumpDirective {
  Major,
  Minor,
  Patch,
  /// Use this value verbatim
  Set(String),
}

impl BumpDirective {
  /// Unrecognized kinds fall back to `Patch`; `set` needs a non-empty value
  pub fn parse(kind: &str, explicit: Option<&str>) -> PromoteResult<Self> {
    match kind.trim().to_ascii_lowercase().as_str() {
      "major" => Ok(Self::Major),
      "minor" => Ok(Self::Minor),
      "patch" => Ok(Self::Patch),
      "set" => match explicit.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(Self::Set(value.to_string())),
        _ => Err(PromoteError::Config(ConfigError::MissingField {
          field: "set_version".to_string(),
        })),
      },
      other => {
        tracing::warn!(bump = other, env = %format!("{}BUMP", ENV_PREFIX), "unrecognized bump, using patch");
        Ok(Self::Patch)
      }
    }
  }

  /// Next version after `current`. Fails only when the bumped component
  /// is already `u64::MAX`.
  pub fn apply(&self, current: Version) -> PromoteResult<String> {
    let next = match self {
      Self::Major => Version::new(increment(current, current.major)?, 0, 0),
      Self::Minor => Version::new(current.major, increment(current, current.minor)?, 0),
      Self::Patch => Version::new(current.major, current.minor, increment(current, current.patch)?),
      Self::Set(explicit) => return Ok(explicit.clone()),
    };
    Ok(next.to_string())
  }

  pub fn name(&self) -> &'static str {
    match self {
      Self::Major => "major",
      Self::Minor => "minor",
      Self::Patch => "patch",
      Self::Set(_) => "set",
    }
  }
}

fn increment(current: Version, component: u64) -> PromoteResult<u64> {
  component.checked_add(1).ok_or_else(|| {
    PromoteError::with_help(
      format!("Version {} cannot be bumped: component overflows", current),
      "Set the next version explicitly with --set",
    )
  })
}

/// A computed transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionChange {
  /// Raw previous record, `None` if absent
  pub previous: Option<String>,
  pub next: String,
}

/// Reads and writes the version record
pub struct VersionManager {
  path: PathBuf,
}

impl VersionManager {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Raw first line of the record, `None` if the file does not exist
  pub fn read_raw(&self) -> PromoteResult<Option<String>> {
    match fs::read_to_string(&self.path) {
      Ok(content) => Ok(Some(content.lines().next().unwrap_or("").trim().to_string())),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e).with_context(|| format!("Failed to read version record {}", self.path.display())),
    }
  }

  /// Compute the transition without writing it
  pub fn plan(&self, directive: &BumpDirective) -> PromoteResult<VersionChange> {
    let previous = self.read_raw()?;
    let current = previous.as_deref().map(Version::parse_lenient).unwrap_or_default();
    Ok(VersionChange {
      previous,
      next: directive.apply(current)?,
    })
  }

  /// Overwrite the record with `version`
  pub fn write(&self, version: &str) -> PromoteResult<()> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      fs::create_dir_all(parent)?;
    }
    fs::write(&self.path, format!("{}\n", version))
      .with_context(|| format!("Failed to write version record {}", self.path.display()))
  }

  /// Compute and persist the next version
  pub fn bump(&self, directive: &BumpDirective) -> PromoteResult<VersionChange> {
    let change = self.plan(directive)?;
    self.write(&change.next)?;
    tracing::info!(
      previous = change.previous.as_deref().unwrap_or("<none>"),
      next = %change.next,
      bump = directive.name(),
      "version bumped"
    );
    Ok(change)
  }
}
