//! Integration tests for `promote run`

use crate::helpers::{TestRepo, promote, run_promote, run_promote_json};
use anyhow::Result;

fn step<'a>(report: &'a serde_json::Value, name: &str) -> &'a serde_json::Value {
  report["steps"]
    .as_array()
    .and_then(|steps| steps.iter().find(|s| s["name"] == name))
    .map(|s| &s["outcome"])
    .unwrap_or(&serde_json::Value::Null)
}

#[test]
fn test_end_to_end_archive_release() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write("VERSION", "0.4.2\n")?;
  repo.write("CHANGELOG.md", "## v0.4.2 — 2025-01-01\n- Automated release from build artifact.\n\n")?;
  repo.write("same.txt", "unchanged\n")?;
  repo.write("app.txt", "old build\n")?;
  repo.commit_all("Release v0.4.2")?;

  let archive = repo.tar_gz(
    "build.tar.gz",
    &[("same.txt", "unchanged\n"), ("app.txt", "new build\n"), ("new.txt", "fresh\n")],
  )?;
  let archive = archive.to_string_lossy();

  let report = run_promote_json(&repo.path, &["run", "--archive", &archive])?;

  assert_eq!(report["sync"]["copied"], 1);
  assert_eq!(report["sync"]["updated"], 1);
  assert_eq!(report["sync"]["skipped"], 1);
  assert_eq!(report["version"]["previous"], "0.4.2");
  assert_eq!(report["version"]["next"], "0.4.3");
  assert_eq!(report["tag"], "v0.4.3");
  assert_eq!(report["stage"], "pushed");
  assert_eq!(report["format"], "tar-gz");

  assert_eq!(repo.read("VERSION")?, "0.4.3\n");
  assert_eq!(repo.read("app.txt")?, "new build\n");
  assert_eq!(repo.read("new.txt")?, "fresh\n");

  let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
  let changelog = repo.read("CHANGELOG.md")?;
  assert!(changelog.starts_with(&format!(
    "## v0.4.3 — {}\n- Automated release from build artifact.\n\n## v0.4.2 — 2025-01-01\n",
    today
  )));

  let branches = repo.release_branches()?;
  assert_eq!(branches.len(), 1);
  assert_eq!(report["branch"], branches[0].as_str());
  assert_eq!(repo.remote_release_branches()?, branches);
  assert!(repo.tags()?.contains(&"v0.4.3".to_string()));
  assert!(repo.remote_tags()?.contains(&"v0.4.3".to_string()));

  assert_eq!(repo.last_commit("%s")?, "Release v0.4.3");
  assert_eq!(repo.last_commit("%an")?, "release-bot");
  assert!(repo.status()?.is_empty());

  Ok(())
}

#[test]
fn test_no_source_exits_successfully() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write("VERSION", "1.0.0\n")?;
  repo.commit_all("Add version")?;

  let missing = repo.scratch.join("does-not-exist");
  let output = run_promote(&repo.path, &["run", "--source-dir", &missing.to_string_lossy()])?;

  assert!(String::from_utf8_lossy(&output.stdout).contains("No build artifact found"));
  assert_eq!(repo.read("VERSION")?, "1.0.0\n");
  assert!(repo.release_branches()?.is_empty());
  assert!(repo.tags()?.is_empty());
  assert_eq!(repo.last_commit("%s")?, "Add version");

  Ok(())
}

#[test]
fn test_unsupported_archive_is_fatal() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write("VERSION", "1.0.0\n")?;
  repo.commit_all("Add version")?;

  let bogus = repo.scratch.join("build.bin");
  std::fs::write(&bogus, "this is not an archive at all")?;

  let output = promote(&repo.path, &["run", "--archive", &bogus.to_string_lossy()])?;

  assert_eq!(output.status.code(), Some(3));
  assert!(String::from_utf8_lossy(&output.stderr).contains("Unsupported"));
  assert_eq!(repo.read("VERSION")?, "1.0.0\n");
  assert!(repo.status()?.is_empty());
  assert!(repo.release_branches()?.is_empty());

  Ok(())
}

#[test]
fn test_branch_push_failure_exits_nonzero() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write("VERSION", "1.0.0\n")?;
  repo.commit_all("Add version")?;
  crate::helpers::git(&repo.path, &["remote", "set-url", "origin", "/nonexistent/promote/remote.git"])?;

  let source = repo.source_dir("site", &[("index.html", "<h1>hi</h1>\n")])?;
  let output = promote(&repo.path, &["run", "--source-dir", &source.to_string_lossy()])?;

  assert_eq!(output.status.code(), Some(2));
  // Local work is kept for a re-run
  assert_eq!(repo.read("VERSION")?, "1.0.1\n");
  assert_eq!(repo.last_commit("%s")?, "Release v1.0.1");
  assert!(repo.tags()?.contains(&"v1.0.1".to_string()));
  assert!(repo.remote_release_branches()?.is_empty());

  Ok(())
}

#[test]
fn test_zip_dry_run_then_release() -> Result<()> {
  let repo = TestRepo::new()?;
  let archive = repo.zip("build.zip", &[("index.html", "<h1>v2</h1>\n"), ("assets/app.js", "run()\n")])?;
  let archive = archive.to_string_lossy();

  let preview = run_promote_json(&repo.path, &["run", "--archive", &archive, "--dry-run"])?;
  assert_eq!(preview["dry_run"], true);
  assert_eq!(preview["format"], "zip");
  assert_eq!(preview["sync"]["copied"], 2);
  assert_eq!(preview["version"]["next"], "0.0.1");
  assert!(!repo.exists("index.html"));
  assert!(!repo.exists("VERSION"));
  assert!(repo.release_branches()?.is_empty());

  let report = run_promote_json(&repo.path, &["run", "--archive", &archive, "--bump", "minor", "--skip-ci"])?;
  assert_eq!(report["version"]["next"], "0.1.0");
  assert_eq!(repo.read("assets/app.js")?, "run()\n");
  assert_eq!(repo.last_commit("%s")?, "Release v0.1.0 [skip ci]");

  Ok(())
}

#[test]
fn test_rerun_with_same_version_tolerates_existing_tag() -> Result<()> {
  let repo = TestRepo::new()?;
  let source = repo.source_dir("site", &[("index.html", "<h1>hi</h1>\n")])?;
  let source = source.to_string_lossy();

  let first = run_promote_json(&repo.path, &["run", "--source-dir", &source, "--set", "2.0.0"])?;
  assert_eq!(step(&first, "tag")["status"], "ok");

  let second = run_promote_json(&repo.path, &["run", "--source-dir", &source, "--set", "2.0.0"])?;
  assert_eq!(second["sync"]["copied"], 0);
  assert_eq!(second["sync"]["updated"], 0);
  assert_eq!(second["sync"]["skipped"], 1);
  assert_eq!(step(&second, "tag")["status"], "skipped");
  assert_eq!(step(&second, "push-branch")["status"], "ok");
  assert_ne!(first["branch"], second["branch"]);

  assert_eq!(repo.release_branches()?.len(), 2);
  assert_eq!(repo.tags()?, vec!["v2.0.0".to_string()]);

  Ok(())
}

#[test]
fn test_excluded_segments_are_not_synced() -> Result<()> {
  let repo = TestRepo::new()?;
  let source = repo.source_dir(
    "site",
    &[
      ("index.html", "ok\n"),
      ("node_modules/dep/index.js", "nope\n"),
      ("__pycache__/x.pyc", "nope\n"),
      ("lib/__pycache__/y.pyc", "nope\n"),
    ],
  )?;

  let report = run_promote_json(&repo.path, &["run", "--source-dir", &source.to_string_lossy()])?;

  assert_eq!(report["sync"]["copied"], 1);
  assert!(repo.exists("index.html"));
  assert!(!repo.exists("node_modules"));
  assert!(!repo.exists("__pycache__"));
  assert!(!repo.exists("lib"));

  Ok(())
}

#[test]
fn test_missing_hosting_cli_is_skipped() -> Result<()> {
  let repo = TestRepo::new()?;
  let source = repo.source_dir("site", &[("index.html", "ok\n")])?;

  let report = run_promote_json(&repo.path, &["run", "--source-dir", &source.to_string_lossy()])?;

  assert_eq!(step(&report, "pull-request")["status"], "skipped");
  assert_eq!(step(&report, "hosted-release")["status"], "skipped");
  assert_eq!(report["pull_request"], serde_json::Value::Null);

  Ok(())
}
