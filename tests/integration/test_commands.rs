//! Integration tests for `promote verify`, `promote sync` and `promote version`

use crate::helpers::{TestRepo, promote, run_promote, run_promote_json};
use anyhow::Result;

#[test]
fn test_verify_after_release() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write("VERSION", "0.4.2\n")?;
  repo.commit_all("Add version")?;
  let source = repo.source_dir("site", &[("index.html", "ok\n")])?;
  run_promote(&repo.path, &["run", "--source-dir", &source.to_string_lossy()])?;

  let report = run_promote_json(&repo.path, &["verify"])?;

  assert_eq!(report["persisted_version"], "0.4.3");
  assert_eq!(report["changelog_version"], "0.4.3");
  assert_eq!(report["version_tagged"], true);
  assert_eq!(report["latest_tag"], "v0.4.3");
  assert_eq!(report["hosting_available"], false);
  assert_eq!(report["branches"].as_array().map(Vec::len), Some(1));
  assert_eq!(report["remote_branches"].as_array().map(Vec::len), Some(1));
  assert_eq!(report["latest_branch"], report["branches"][0]);
  assert_eq!(report["pull_request"]["state"], "unchecked");

  Ok(())
}

#[test]
fn test_verify_empty_repository() -> Result<()> {
  let repo = TestRepo::new()?;

  let output = promote(&repo.path, &["verify", "--no-repair"])?;
  assert_eq!(output.status.code(), Some(0));

  let report = run_promote_json(&repo.path, &["verify", "--no-repair"])?;
  assert_eq!(report["persisted_version"], serde_json::Value::Null);
  assert_eq!(report["version_tagged"], false);
  assert_eq!(report["tags"].as_array().map(Vec::len), Some(0));

  Ok(())
}

#[test]
fn test_verify_outside_repository_fails() -> Result<()> {
  let dir = tempfile::TempDir::new()?;

  let output = promote(dir.path(), &["verify"])?;
  assert_ne!(output.status.code(), Some(0));

  Ok(())
}

#[test]
fn test_sync_is_idempotent() -> Result<()> {
  let repo = TestRepo::new()?;
  let source = repo.source_dir("site", &[("a.txt", "a\n"), ("nested/b.txt", "b\n")])?;
  let source = source.to_string_lossy();

  let first = run_promote_json(&repo.path, &["sync", &source])?;
  assert_eq!(first["copied"], 2);

  let second = run_promote_json(&repo.path, &["sync", &source])?;
  assert_eq!(second["copied"], 0);
  assert_eq!(second["updated"], 0);
  assert_eq!(second["skipped"], 2);

  // Destination-only files survive
  assert!(repo.exists("README.md"));
  // No commit, no version
  assert!(!repo.exists("VERSION"));

  Ok(())
}

#[test]
fn test_sync_dry_run_from_archive() -> Result<()> {
  let repo = TestRepo::new()?;
  let archive = repo.tar_gz("build.tar.gz", &[("README.md", "# replaced\n"), ("new.txt", "n\n")])?;

  let report = run_promote_json(&repo.path, &["sync", &archive.to_string_lossy(), "--dry-run"])?;

  assert_eq!(report["copied"], 1);
  assert_eq!(report["updated"], 1);
  assert_eq!(repo.read("README.md")?, "# site\n");
  assert!(!repo.exists("new.txt"));

  Ok(())
}

#[test]
fn test_version_preview_and_write() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write("VERSION", "1.2.3\n")?;

  let preview = run_promote_json(&repo.path, &["version", "--bump", "minor"])?;
  assert_eq!(preview["previous"], "1.2.3");
  assert_eq!(preview["next"], "1.3.0");
  assert_eq!(repo.read("VERSION")?, "1.2.3\n");

  run_promote(&repo.path, &["version", "--set", "9.9.9", "--write"])?;
  assert_eq!(repo.read("VERSION")?, "9.9.9\n");

  Ok(())
}

#[test]
fn test_config_file_is_honored() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write("promote.toml", "version_file = \"meta/VERSION\"\nbump = \"major\"\n")?;
  repo.write("meta/VERSION", "3.1.4\n")?;

  let preview = run_promote_json(&repo.path, &["version"])?;
  assert_eq!(preview["next"], "4.0.0");

  Ok(())
}

#[test]
fn test_invalid_config_exits_with_user_error() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write("promote.toml", "no_such_key = true\n")?;

  let output = promote(&repo.path, &["version"])?;
  assert_eq!(output.status.code(), Some(1));

  Ok(())
}

#[test]
fn test_sync_missing_source_is_user_error() -> Result<()> {
  let repo = TestRepo::new()?;

  let output = promote(&repo.path, &["sync", "does/not/exist"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("Artifact not found"));

  Ok(())
}
