//! Error types for promote with contextual messages and exit codes
//!
//! Every fatal condition of a run surfaces through [`PromoteError`]. Soft
//! failures never become errors; they are recorded as step outcomes instead
//! (see [`crate::core::step`]).

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for promote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing files)
  User = 1,
  /// System error (git, network, I/O)
  System = 2,
  /// Artifact could not be unpacked (unknown container, corrupt archive)
  Artifact = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for promote
#[derive(Debug)]
pub enum PromoteError {
  /// Configuration errors
  Config(ConfigError),

  /// Artifact resolution and extraction errors
  Artifact(ArtifactError),

  /// Git operation errors
  Git(GitError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl PromoteError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    PromoteError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    PromoteError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      PromoteError::Message { message, context, help } => PromoteError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      PromoteError::Io(e) => PromoteError::Message {
        message: ctx_str,
        context: Some(format!("I/O error: {}", e)),
        help: None,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      PromoteError::Config(_) => ExitCode::User,
      PromoteError::Artifact(_) => ExitCode::Artifact,
      PromoteError::Git(_) => ExitCode::System,
      PromoteError::Io(_) => ExitCode::System,
      PromoteError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      PromoteError::Config(e) => e.help_message(),
      PromoteError::Artifact(e) => e.help_message(),
      PromoteError::Git(e) => e.help_message(),
      PromoteError::Message { help, .. } => help.clone(),
      PromoteError::Io(_) => None,
    }
  }
}

impl fmt::Display for PromoteError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PromoteError::Config(e) => write!(f, "{}", e),
      PromoteError::Artifact(e) => write!(f, "{}", e),
      PromoteError::Git(e) => write!(f, "{}", e),
      PromoteError::Io(e) => write!(f, "I/O error: {}", e),
      PromoteError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for PromoteError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      PromoteError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for PromoteError {
  fn from(err: io::Error) -> Self {
    PromoteError::Io(err)
  }
}

impl From<String> for PromoteError {
  fn from(msg: String) -> Self {
    PromoteError::message(msg)
  }
}

impl From<&str> for PromoteError {
  fn from(msg: &str) -> Self {
    PromoteError::message(msg)
  }
}

impl From<toml_edit::de::Error> for PromoteError {
  fn from(err: toml_edit::de::Error) -> Self {
    PromoteError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_json::Error> for PromoteError {
  fn from(err: serde_json::Error) -> Self {
    PromoteError::message(format!("JSON error: {}", err))
  }
}

impl From<tempfile::PersistError> for PromoteError {
  fn from(err: tempfile::PersistError) -> Self {
    PromoteError::Io(err.error)
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// Missing required field
  MissingField { field: String },

  /// A value could not be interpreted
  InvalidValue { key: String, value: String, expected: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::MissingField { field } if field == "set_version" => {
        Some("Pass --set <VERSION> or export PROMOTE_SET_VERSION when using the `set` bump.".to_string())
      }
      ConfigError::InvalidValue { key, expected, .. } => Some(format!("Set {} to {}.", key, expected)),
      _ => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::MissingField { field } => {
        write!(f, "Missing required configuration value: {}", field)
      }
      ConfigError::InvalidValue { key, value, .. } => {
        write!(f, "Invalid value '{}' for {}", value, key)
      }
    }
  }
}

/// Artifact errors
#[derive(Debug)]
pub enum ArtifactError {
  /// The archive is not one of the recognized container formats
  UnsupportedContainerFormat { path: PathBuf, magic: String },

  /// The archive was recognized but could not be fully expanded
  ExtractionFailed { path: PathBuf, reason: String },
}

impl ArtifactError {
  fn help_message(&self) -> Option<String> {
    match self {
      ArtifactError::UnsupportedContainerFormat { .. } => {
        Some("Supported containers: zip, tar, tar.gz, tar.zst (detected by content, not extension).".to_string())
      }
      ArtifactError::ExtractionFailed { .. } => {
        Some("The archive may be truncated or contain unsafe paths. Rebuild the artifact and retry.".to_string())
      }
    }
  }
}

impl fmt::Display for ArtifactError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ArtifactError::UnsupportedContainerFormat { path, magic } => {
        write!(
          f,
          "Unsupported archive container: {} (leading bytes: {})",
          path.display(),
          magic
        )
      }
      ArtifactError::ExtractionFailed { path, reason } => {
        write!(f, "Failed to extract {}: {}", path.display(), reason)
      }
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },

  /// Push failed
  PushFailed {
    remote: String,
    branch: String,
    reason: String,
  },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::PushFailed { reason, .. } => {
        if reason.contains("non-fast-forward") {
          Some("The remote branch has diverged. Re-run promote to publish under a fresh branch name.".to_string())
        } else if reason.contains("Permission denied") || reason.contains("403") {
          Some("Check the credentials used for the push remote.".to_string())
        } else {
          Some("The release commit is kept locally; fix the remote and re-run promote.".to_string())
        }
      }
      GitError::RepoNotFound { path } => Some(format!(
        "The destination must be a git working tree: {}",
        path.display()
      )),
      GitError::CommandFailed { .. } => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
      GitError::PushFailed { remote, branch, reason } => {
        write!(f, "Push to {}/{} failed: {}", remote, branch, reason)
      }
    }
  }
}

/// Result type alias for promote
pub type PromoteResult<T> = Result<T, PromoteError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> PromoteResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> PromoteResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<PromoteError>,
{
  fn context(self, ctx: impl Into<String>) -> PromoteResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> PromoteResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &PromoteError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
