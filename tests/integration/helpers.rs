//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Hosting CLI name that is never on PATH, so tests never talk to a real platform
pub const MISSING_CLI: &str = "promote-test-missing-cli";

/// A destination working tree with a local bare repository as `origin`
pub struct TestRepo {
  _root: TempDir,
  pub path: PathBuf,
  pub remote: PathBuf,
  /// Scratch space outside the working tree for artifacts
  pub scratch: PathBuf,
}

impl TestRepo {
  /// Create a repository on `main` with one commit pushed to `origin`
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().join("work");
    let remote = root.path().join("remote.git");
    let scratch = root.path().join("artifacts");
    fs::create_dir_all(&path)?;
    fs::create_dir_all(&scratch)?;

    git(root.path(), &["init", "--bare", "--initial-branch=main", "remote.git"])?;
    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;
    git(&path, &["config", "commit.gpgsign", "false"])?;

    fs::write(path.join("README.md"), "# site\n")?;
    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", "Initial commit"])?;
    git(&path, &["remote", "add", "origin", &remote.to_string_lossy()])?;
    git(&path, &["push", "-u", "origin", "main"])?;

    Ok(Self {
      _root: root,
      path,
      remote,
      scratch,
    })
  }

  /// Write a file in the working tree
  pub fn write(&self, rel: &str, content: &str) -> Result<()> {
    let file = self.path.join(rel);
    if let Some(parent) = file.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::write(file, content)?;
    Ok(())
  }

  pub fn read(&self, rel: &str) -> Result<String> {
    fs::read_to_string(self.path.join(rel)).with_context(|| format!("Failed to read {}", rel))
  }

  pub fn exists(&self, rel: &str) -> bool {
    self.path.join(rel).exists()
  }

  /// Commit everything in the working tree
  pub fn commit_all(&self, message: &str) -> Result<()> {
    git(&self.path, &["add", "--all"])?;
    git(&self.path, &["commit", "-m", message])?;
    Ok(())
  }

  /// Local branches starting with `release/`
  pub fn release_branches(&self) -> Result<Vec<String>> {
    lines(git(
      &self.path,
      &["for-each-ref", "--format=%(refname:short)", "refs/heads/release/"],
    )?)
  }

  /// Branches starting with `release/` in the bare remote
  pub fn remote_release_branches(&self) -> Result<Vec<String>> {
    lines(git(
      &self.remote,
      &["for-each-ref", "--format=%(refname:short)", "refs/heads/release/"],
    )?)
  }

  pub fn tags(&self) -> Result<Vec<String>> {
    lines(git(&self.path, &["tag", "--list"])?)
  }

  pub fn remote_tags(&self) -> Result<Vec<String>> {
    lines(git(&self.remote, &["tag", "--list"])?)
  }

  /// `git log -1 --format=<format>` in the working tree
  pub fn last_commit(&self, format: &str) -> Result<String> {
    let output = git(&self.path, &["log", "-1", &format!("--format={}", format)])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// `git status --porcelain`
  pub fn status(&self) -> Result<String> {
    let output = git(&self.path, &["status", "--porcelain"])?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
  }

  /// Write a directory artifact under scratch
  pub fn source_dir(&self, name: &str, files: &[(&str, &str)]) -> Result<PathBuf> {
    let dir = self.scratch.join(name);
    for (rel, content) in files {
      let file = dir.join(rel);
      fs::create_dir_all(file.parent().context("file has no parent")?)?;
      fs::write(file, content)?;
    }
    Ok(dir)
  }

  /// Build a gzip-compressed tar under scratch
  pub fn tar_gz(&self, name: &str, files: &[(&str, &str)]) -> Result<PathBuf> {
    let path = self.scratch.join(name);
    let encoder = flate2::write::GzEncoder::new(File::create(&path)?, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (rel, content) in files {
      let mut header = tar::Header::new_gnu();
      header.set_size(content.len() as u64);
      header.set_mode(0o644);
      header.set_mtime(1_700_000_000);
      header.set_cksum();
      builder.append_data(&mut header, rel, content.as_bytes())?;
    }
    builder.into_inner()?.finish()?;
    Ok(path)
  }

  /// Build a zip under scratch
  pub fn zip(&self, name: &str, files: &[(&str, &str)]) -> Result<PathBuf> {
    let path = self.scratch.join(name);
    let mut writer = zip::ZipWriter::new(File::create(&path)?);
    let options = zip::write::SimpleFileOptions::default();
    for (rel, content) in files {
      writer.start_file(*rel, options)?;
      writer.write_all(content.as_bytes())?;
    }
    writer.finish()?;
    Ok(path)
  }
}

fn lines(output: Output) -> Result<Vec<String>> {
  Ok(
    String::from_utf8_lossy(&output.stdout)
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty())
      .map(String::from)
      .collect(),
  )
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

/// Run the promote binary with a clean `PROMOTE_*` environment, whatever its exit status
pub fn promote(cwd: &Path, args: &[&str]) -> Result<Output> {
  let mut cmd = Command::new(env!("CARGO_BIN_EXE_promote"));
  cmd.current_dir(cwd).args(args);

  for (key, _) in std::env::vars() {
    if key.starts_with("PROMOTE_") {
      cmd.env_remove(key);
    }
  }
  cmd.env("PROMOTE_HOSTING_CLI", MISSING_CLI);

  cmd.output().context("Failed to run promote")
}

/// Run promote and fail unless it exits 0
pub fn run_promote(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = promote(cwd, args)?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::bail!(
      "promote command failed: promote {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout,
      stderr
    );
  }

  Ok(output)
}

/// Run promote with `--json` appended and parse stdout
pub fn run_promote_json(cwd: &Path, args: &[&str]) -> Result<serde_json::Value> {
  let mut args = args.to_vec();
  args.push("--json");
  let output = run_promote(cwd, &args)?;
  serde_json::from_slice(&output.stdout).context("promote did not print JSON")
}
