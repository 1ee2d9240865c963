//! Build artifact resolution and extraction
//!
//! An artifact is either an archive or an already-expanded directory. Archives
//! are recognized by their leading bytes (never by extension) and expanded
//! into a [`StagingTree`] that is removed when dropped, on every exit path.

use crate::core::error::{ArtifactError, PromoteError, PromoteResult, ResultExt};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;

/// Bytes needed to recognize every supported container
const SNIFF_LEN: usize = 512;

/// Offset of the POSIX tar magic in the first header block
const USTAR_OFFSET: usize = 257;

/// The selected build output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum ArtifactSource {
  Archive(PathBuf),
  Directory(PathBuf),
}

impl ArtifactSource {
  pub fn path(&self) -> &Path {
    match self {
      ArtifactSource::Archive(p) | ArtifactSource::Directory(p) => p,
    }
  }
}

/// Pick the artifact for this run: an existing archive file first, then an
/// existing fallback directory. `None` is an expected outcome, not an error.
pub fn resolve(archive: Option<&Path>, source_dir: Option<&Path>) -> Option<ArtifactSource> {
  if let Some(archive) = archive {
    if archive.is_file() {
      return Some(ArtifactSource::Archive(archive.to_path_buf()));
    }
    tracing::debug!(path = %archive.display(), "archive not present");
  }

  if let Some(dir) = source_dir {
    if dir.is_dir() {
      return Some(ArtifactSource::Directory(dir.to_path_buf()));
    }
    tracing::debug!(path = %dir.display(), "source directory not present");
  }

  None
}

/// Recognized container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveFormat {
  Zip,
  Tar,
  TarGz,
  TarZst,
}

impl ArchiveFormat {
  /// Identify a container from its leading bytes
  pub fn sniff(head: &[u8]) -> Option<Self> {
    if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
      Some(Self::Zip)
    } else if head.starts_with(&[0x1f, 0x8b]) {
      Some(Self::TarGz)
    } else if head.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
      Some(Self::TarZst)
    } else if head.len() >= USTAR_OFFSET + 5 && &head[USTAR_OFFSET..USTAR_OFFSET + 5] == b"ustar" {
      Some(Self::Tar)
    } else {
      None
    }
  }

  /// Read the head of `path` and identify it
  pub fn detect(path: &Path) -> PromoteResult<Self> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)
      .and_then(|f| f.take(SNIFF_LEN as u64).read_to_end(&mut head))
      .with_context(|| format!("Failed to read archive {}", path.display()))?;

    Self::sniff(&head).ok_or_else(|| {
      PromoteError::Artifact(ArtifactError::UnsupportedContainerFormat {
        path: path.to_path_buf(),
        magic: hex_prefix(&head),
      })
    })
  }
}

fn hex_prefix(bytes: &[u8]) -> String {
  if bytes.is_empty() {
    return "<empty file>".to_string();
  }
  bytes.iter().take(8).map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ")
}

/// Ephemeral directory holding an expanded artifact; removed on drop
#[derive(Debug)]
pub struct StagingTree {
  dir: TempDir,
}

impl StagingTree {
  pub fn new() -> PromoteResult<Self> {
    let dir = tempfile::Builder::new()
      .prefix("promote-staging-")
      .tempdir()
      .context("Failed to create staging directory")?;
    Ok(Self { dir })
  }

  pub fn root(&self) -> &Path {
    self.dir.path()
  }
}

/// Expand `archive` into a fresh staging tree. All or nothing: on error the
/// partially populated tree is discarded.
pub fn extract(archive: &Path) -> PromoteResult<(StagingTree, ArchiveFormat)> {
  let format = ArchiveFormat::detect(archive)?;
  let staging = StagingTree::new()?;

  let failed = |reason: String| {
    PromoteError::Artifact(ArtifactError::ExtractionFailed {
      path: archive.to_path_buf(),
      reason,
    })
  };

  let file = File::open(archive).with_context(|| format!("Failed to open archive {}", archive.display()))?;
  let result = match format {
    ArchiveFormat::Zip => unpack_zip(file, staging.root()),
    ArchiveFormat::Tar => unpack_tar(file, staging.root()),
    ArchiveFormat::TarGz => {
      let stream = tar_stream(archive, flate2::read::MultiGzDecoder::new(file))?;
      unpack_tar(stream, staging.root())
    }
    ArchiveFormat::TarZst => {
      let decoder = zstd::stream::read::Decoder::new(file).map_err(|e| failed(e.to_string()))?;
      unpack_tar(tar_stream(archive, decoder)?, staging.root())
    }
  };

  match result {
    Ok(0) => Err(failed("archive has no entries".to_string())),
    Ok(entries) => {
      tracing::info!(archive = %archive.display(), format = ?format, entries, "archive extracted");
      Ok((staging, format))
    }
    Err(reason) => Err(failed(reason)),
  }
}

/// Decompressed stream, checked to open with a tar header block
fn tar_stream<R: Read>(archive: &Path, mut decoder: R) -> PromoteResult<io::Chain<io::Cursor<Vec<u8>>, R>> {
  let mut head = Vec::with_capacity(SNIFF_LEN);
  (&mut decoder).take(SNIFF_LEN as u64).read_to_end(&mut head).map_err(|e| {
    PromoteError::Artifact(ArtifactError::ExtractionFailed {
      path: archive.to_path_buf(),
      reason: e.to_string(),
    })
  })?;

  if ArchiveFormat::sniff(&head) != Some(ArchiveFormat::Tar) {
    return Err(PromoteError::Artifact(ArtifactError::UnsupportedContainerFormat {
      path: archive.to_path_buf(),
      magic: hex_prefix(&head),
    }));
  }
  Ok(io::Cursor::new(head).chain(decoder))
}

/// Reject absolute paths and parent traversal
fn safe_relative(path: &Path) -> Result<PathBuf, String> {
  let mut clean = PathBuf::new();
  for component in path.components() {
    match component {
      Component::Normal(part) => clean.push(part),
      Component::CurDir => {}
      _ => return Err(format!("entry escapes staging directory: {}", path.display())),
    }
  }
  Ok(clean)
}

fn unpack_tar<R: Read>(reader: R, root: &Path) -> Result<usize, String> {
  let mut archive = tar::Archive::new(reader);
  archive.set_preserve_mtime(true);

  let mut count = 0;
  for entry in archive.entries().map_err(|e| e.to_string())? {
    let mut entry = entry.map_err(|e| e.to_string())?;
    let path = entry.path().map_err(|e| e.to_string())?.into_owned();
    safe_relative(&path)?;

    if !entry.unpack_in(root).map_err(|e| format!("{}: {}", path.display(), e))? {
      return Err(format!("entry escapes staging directory: {}", path.display()));
    }
    count += 1;
  }
  Ok(count)
}

fn unpack_zip(file: File, root: &Path) -> Result<usize, String> {
  let mut archive = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;

  for i in 0..archive.len() {
    let mut entry = archive.by_index(i).map_err(|e| e.to_string())?;
    let relative = entry
      .enclosed_name()
      .ok_or_else(|| format!("entry escapes staging directory: {}", entry.name()))?;
    let target = root.join(safe_relative(&relative)?);

    if entry.is_dir() {
      fs::create_dir_all(&target).map_err(|e| e.to_string())?;
      continue;
    }

    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    let mut out = File::create(&target).map_err(|e| format!("{}: {}", relative.display(), e))?;
    io::copy(&mut entry, &mut out).map_err(|e| format!("{}: {}", relative.display(), e))?;

    #[cfg(unix)]
    if let Some(mode) = entry.unix_mode() {
      use std::os::unix::fs::PermissionsExt;
      let _ = fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777));
    }
  }
  Ok(archive.len())
}
