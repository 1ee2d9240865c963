use crate::core::error::{ConfigError, PromoteError, PromoteResult, ResultExt};
use crate::core::sync::ExclusionSet;
use crate::core::vcs::system_git::Identity;
use crate::release::version::BumpDirective;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable prefix for every option
pub const ENV_PREFIX: &str = "PROMOTE_";

/// Configuration for a promote run
///
/// Layered, lowest precedence first: defaults, config file
/// (promote.toml, .promote.toml, .config/promote.toml), `PROMOTE_*`
/// environment variables, CLI flags.
///
/// # Example
///
/// ```toml
/// base_branch = "main"
/// branch_prefix = "release/"
/// bump = "minor"
/// archive = "out/site.tar.gz"
/// open_pr = true
/// exclude = [".git", "node_modules", "target"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromoteConfig {
  /// Branch pull requests target
  pub base_branch: String,

  /// Release branch prefix (the verifier discovers branches by it)
  pub branch_prefix: String,

  /// Bump directive: major, minor, patch or set
  pub bump: String,

  /// Explicit version for `bump = "set"`
  pub set_version: Option<String>,

  /// Commit/tag author name
  pub author_name: String,

  /// Commit/tag author email
  pub author_email: String,

  /// Push remote
  pub remote: String,

  /// Open a pull request after pushing
  pub open_pr: bool,

  /// Create a hosted release for the tag
  pub create_release: bool,

  /// Mark the release commit so CI ignores it
  pub skip_ci: bool,

  /// Build artifact archive (preferred when it exists)
  pub archive: Option<PathBuf>,

  /// Prepared directory used when no archive is present
  pub source_dir: Option<PathBuf>,

  /// Persisted version record, relative to the destination root
  pub version_file: PathBuf,

  /// Changelog record, relative to the destination root
  pub changelog_file: PathBuf,

  /// Path segment names never synced
  pub exclude: Vec<String>,

  /// Hosting-platform CLI program
  pub hosting_cli: String,

  /// Fetch the remote before branching
  pub fetch: bool,
}

fn default_exclusions() -> Vec<String> {
  [
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    "node_modules",
    "target",
    "dist",
    "build",
    ".venv",
    ".DS_Store",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

impl Default for PromoteConfig {
  fn default() -> Self {
    Self {
      base_branch: "main".to_string(),
      branch_prefix: "release/".to_string(),
      bump: "patch".to_string(),
      set_version: None,
      author_name: "release-bot".to_string(),
      author_email: "release-bot@users.noreply.github.com".to_string(),
      remote: "origin".to_string(),
      open_pr: true,
      create_release: true,
      skip_ci: false,
      archive: None,
      source_dir: None,
      version_file: PathBuf::from("VERSION"),
      changelog_file: PathBuf::from("CHANGELOG.md"),
      exclude: default_exclusions(),
      hosting_cli: "gh".to_string(),
      fetch: true,
    }
  }
}

/// Values given on the command line; `None` leaves the lower layers alone
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
  pub base_branch: Option<String>,
  pub branch_prefix: Option<String>,
  pub bump: Option<String>,
  pub set_version: Option<String>,
  pub remote: Option<String>,
  pub archive: Option<PathBuf>,
  pub source_dir: Option<PathBuf>,
  pub no_pr: bool,
  pub no_release: bool,
  pub skip_ci: bool,
  pub no_fetch: bool,
}

impl PromoteConfig {
  /// Find config file in search order: promote.toml, .promote.toml, .config/promote.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = [
      path.join("promote.toml"),
      path.join(".promote.toml"),
      path.join(".config").join("promote.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load the config file if there is one, defaults otherwise
  pub fn load(path: &Path) -> PromoteResult<Self> {
    let Some(config_path) = Self::find_config_path(path) else {
      return Ok(Self::default());
    };

    let content = fs::read_to_string(&config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let config: PromoteConfig = toml_edit::de::from_str(&content)
      .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

    tracing::debug!(path = %config_path.display(), "loaded config file");
    Ok(config)
  }

  /// Apply `PROMOTE_*` variables. Unknown `PROMOTE_*` keys are ignored.
  pub fn apply_env<I, K, V>(&mut self, vars: I) -> PromoteResult<()>
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
  {
    for (key, value) in vars {
      let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
        continue;
      };
      let key = key.as_ref();
      let value = value.as_ref().trim();

      match name {
        "BASE_BRANCH" => self.base_branch = value.to_string(),
        "BRANCH_PREFIX" => self.branch_prefix = value.to_string(),
        "BUMP" => self.bump = value.to_string(),
        "SET_VERSION" => self.set_version = non_empty(value),
        "AUTHOR_NAME" => self.author_name = value.to_string(),
        "AUTHOR_EMAIL" => self.author_email = value.to_string(),
        "REMOTE" => self.remote = value.to_string(),
        "OPEN_PR" => self.open_pr = parse_bool(key, value)?,
        "CREATE_RELEASE" => self.create_release = parse_bool(key, value)?,
        "SKIP_CI" => self.skip_ci = parse_bool(key, value)?,
        "ARCHIVE" => self.archive = non_empty(value).map(PathBuf::from),
        "SOURCE_DIR" => self.source_dir = non_empty(value).map(PathBuf::from),
        "VERSION_FILE" => self.version_file = PathBuf::from(value),
        "CHANGELOG_FILE" => self.changelog_file = PathBuf::from(value),
        "EXCLUDE" => {
          self.exclude = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
        }
        "HOSTING_CLI" => self.hosting_cli = value.to_string(),
        "FETCH" => self.fetch = parse_bool(key, value)?,
        _ => {}
      }
    }
    Ok(())
  }

  /// Apply command-line values (highest precedence)
  pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
    if let Some(v) = &overrides.base_branch {
      self.base_branch = v.clone();
    }
    if let Some(v) = &overrides.branch_prefix {
      self.branch_prefix = v.clone();
    }
    if let Some(v) = &overrides.bump {
      self.bump = v.clone();
    }
    if let Some(v) = &overrides.set_version {
      self.set_version = Some(v.clone());
      if overrides.bump.is_none() {
        self.bump = "set".to_string();
      }
    }
    if let Some(v) = &overrides.remote {
      self.remote = v.clone();
    }
    if let Some(v) = &overrides.archive {
      self.archive = Some(v.clone());
    }
    if let Some(v) = &overrides.source_dir {
      self.source_dir = Some(v.clone());
    }
    if overrides.no_pr {
      self.open_pr = false;
    }
    if overrides.no_release {
      self.create_release = false;
    }
    if overrides.skip_ci {
      self.skip_ci = true;
    }
    if overrides.no_fetch {
      self.fetch = false;
    }
  }

  /// Parsed bump directive
  pub fn bump_directive(&self) -> PromoteResult<BumpDirective> {
    BumpDirective::parse(&self.bump, self.set_version.as_deref())
  }

  /// Identity for release commits and tags
  pub fn identity(&self) -> Identity {
    Identity {
      name: self.author_name.clone(),
      email: self.author_email.clone(),
    }
  }

  pub fn exclusions(&self) -> ExclusionSet {
    ExclusionSet::new(self.exclude.iter().cloned())
  }

  /// Check values that have no sensible fallback
  pub fn validate(&self) -> PromoteResult<()> {
    for (field, value) in [
      ("base_branch", &self.base_branch),
      ("remote", &self.remote),
      ("branch_prefix", &self.branch_prefix),
    ] {
      if value.trim().is_empty() {
        return Err(PromoteError::Config(ConfigError::MissingField {
          field: field.to_string(),
        }));
      }
    }
    self.bump_directive().map(|_| ())
  }
}

fn non_empty(value: &str) -> Option<String> {
  if value.is_empty() { None } else { Some(value.to_string()) }
}

fn parse_bool(key: &str, value: &str) -> PromoteResult<bool> {
  match value.to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Ok(true),
    "0" | "false" | "no" | "off" => Ok(false),
    _ => Err(PromoteError::Config(ConfigError::InvalidValue {
      key: key.to_string(),
      value: value.to_string(),
      expected: "true or false".to_string(),
    })),
  }
}
