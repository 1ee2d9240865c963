//! Additive, content-addressed tree synchronization
//!
//! Merges a source tree into a destination working tree:
//!
//! - new files are copied (modification time preserved)
//! - existing files are overwritten only when their SHA-256 digests differ
//! - nothing in the destination is ever deleted
//! - any path with a segment in the [`ExclusionSet`] is ignored entirely
//!
//! Running the same sync twice yields zero copies and zero updates the
//! second time.

use crate::core::error::PromoteResult;
use crate::ui::progress::FileProgress;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Syncs with more files than this draw a progress bar on a terminal
const PROGRESS_THRESHOLD: usize = 200;

/// Path segment names that are never copied, added or compared
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet(BTreeSet<String>);

impl ExclusionSet {
  pub fn new<I: IntoIterator<Item = String>>(names: I) -> Self {
    Self(names.into_iter().collect())
  }

  /// Whether any segment of `relative` is excluded
  pub fn excludes(&self, relative: &Path) -> bool {
    relative.components().any(|c| match c {
      Component::Normal(segment) => segment.to_str().is_some_and(|s| self.0.contains(s)),
      _ => false,
    })
  }
}

/// What happened to one source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOutcome {
  /// No destination file existed
  Copied,
  /// Destination existed with different (or unreadable) content
  Updated,
  /// Destination already had identical content
  Skipped,
}

/// A file whose write failed; the run continues without it
#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
  pub path: PathBuf,
  pub reason: String,
}

/// Result of one sync
///
/// Every non-excluded regular file under the source is counted exactly once in
/// `copied + updated + skipped`. Files whose write failed keep their
/// classification and are also listed in `failures`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
  pub copied: usize,
  pub updated: usize,
  pub skipped: usize,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub files: Vec<(PathBuf, FileOutcome)>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub failures: Vec<SyncFailure>,
}

impl SyncOutcome {
  pub fn total(&self) -> usize {
    self.copied + self.updated + self.skipped
  }

  /// Files that were (or would be) written
  pub fn changed(&self) -> usize {
    self.copied + self.updated
  }

  fn record(&mut self, relative: PathBuf, outcome: FileOutcome) {
    match outcome {
      FileOutcome::Copied => self.copied += 1,
      FileOutcome::Updated => self.updated += 1,
      FileOutcome::Skipped => self.skipped += 1,
    }
    self.files.push((relative, outcome));
  }
}

/// Merges a source directory into a destination working tree
pub struct TreeSynchronizer<'a> {
  exclusions: &'a ExclusionSet,
  dry_run: bool,
  show_progress: bool,
}

impl<'a> TreeSynchronizer<'a> {
  pub fn new(exclusions: &'a ExclusionSet) -> Self {
    Self {
      exclusions,
      dry_run: false,
      show_progress: io::stdout().is_terminal(),
    }
  }

  /// Classify every file but write nothing
  pub fn dry_run(mut self, dry_run: bool) -> Self {
    self.dry_run = dry_run;
    self
  }

  pub fn show_progress(mut self, show: bool) -> Self {
    self.show_progress = show;
    self
  }

  /// Sync `source` into `dest`
  pub fn sync(&self, source: &Path, dest: &Path) -> PromoteResult<SyncOutcome> {
    let files = self.collect_files(source);
    let mut outcome = SyncOutcome::default();

    let mut progress = (self.show_progress && files.len() > PROGRESS_THRESHOLD)
      .then(|| FileProgress::new(files.len(), format!("Syncing {} files", files.len())));

    for relative in files {
      let src = source.join(&relative);
      let dst = dest.join(&relative);
      let classification = classify(&src, &dst);

      if !self.dry_run
        && classification != FileOutcome::Skipped
        && let Err(e) = copy_file(&src, &dst)
      {
        tracing::warn!(path = %relative.display(), error = %e, "failed to write file");
        outcome.failures.push(SyncFailure {
          path: relative.clone(),
          reason: e.to_string(),
        });
      }

      tracing::debug!(path = %relative.display(), outcome = ?classification, "synced");
      outcome.record(relative, classification);

      if let Some(bar) = progress.as_mut() {
        bar.inc();
      }
    }

    tracing::info!(
      copied = outcome.copied,
      updated = outcome.updated,
      skipped = outcome.skipped,
      failures = outcome.failures.len(),
      dry_run = self.dry_run,
      "sync finished"
    );
    Ok(outcome)
  }

  /// Relative paths of all non-excluded regular files, in a stable order
  fn collect_files(&self, source: &Path) -> Vec<PathBuf> {
    let walker = WalkDir::new(source)
      .follow_links(false)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|entry| {
        entry
          .path()
          .strip_prefix(source)
          .map(|rel| !self.exclusions.excludes(rel))
          .unwrap_or(true)
      });

    let mut files = Vec::new();
    for entry in walker {
      let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
          tracing::warn!(error = %e, "skipping unreadable source entry");
          continue;
        }
      };
      if !entry.file_type().is_file() {
        continue;
      }
      if let Ok(relative) = entry.path().strip_prefix(source) {
        files.push(relative.to_path_buf());
      }
    }
    files
  }
}

/// Decide what a sync of `src` onto `dst` does. Digest failures count as "different".
fn classify(src: &Path, dst: &Path) -> FileOutcome {
  if !dst.exists() {
    return FileOutcome::Copied;
  }

  match (file_digest(src), file_digest(dst)) {
    (Ok(a), Ok(b)) if a == b => FileOutcome::Skipped,
    (Err(e), _) | (_, Err(e)) => {
      tracing::warn!(path = %dst.display(), error = %e, "digest failed, assuming different");
      FileOutcome::Updated
    }
    _ => FileOutcome::Updated,
  }
}

/// SHA-256 of a file's content
pub fn file_digest(path: &Path) -> io::Result<Vec<u8>> {
  let mut file = File::open(path)?;
  let mut hasher = Sha256::new();
  io::copy(&mut file, &mut hasher)?;
  Ok(hasher.finalize().to_vec())
}

/// Copy one file, creating parent directories and keeping the source mtime
fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
  if let Some(parent) = dst.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::copy(src, dst)?;

  // Best effort: not every platform/filesystem lets us set mtime
  if let Ok(mtime) = fs::metadata(src).and_then(|m| m.modified())
    && let Err(e) = OpenOptions::new().write(true).open(dst).and_then(|f| f.set_modified(mtime))
  {
    tracing::debug!(path = %dst.display(), error = %e, "could not preserve modification time");
  }
  Ok(())
}
