//! External tool plumbing: system git and the hosting-platform CLI
//!
//! Every subprocess goes through a [`CommandRunner`] so the release steps can
//! be exercised against a scripted runner in tests.

pub mod hosting;
pub mod system_git;
mod system_git_ops;

pub use hosting::HostingCli;
pub use system_git::SystemGit;

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variables passed through to isolated subprocesses
const PASSTHROUGH_ENV: &[&str] = &[
  "PATH",
  "HOME",
  "USERPROFILE",
  "SYSTEMROOT",
  "TMPDIR",
  "XDG_CONFIG_HOME",
  "SSH_AUTH_SOCK",
  "GIT_SSH_COMMAND",
  "GH_TOKEN",
  "GITHUB_TOKEN",
  "GH_HOST",
];

/// A fully described subprocess invocation
#[derive(Debug, Clone)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: PathBuf,
  pub envs: Vec<(String, String)>,
  /// Clear the inherited environment (keeping [`PASSTHROUGH_ENV`])
  pub isolated: bool,
}

impl CommandSpec {
  pub fn new(program: impl Into<String>, cwd: &Path) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: cwd.to_path_buf(),
      envs: Vec::new(),
      isolated: false,
    }
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.envs.push((key.into(), value.into()));
    self
  }

  /// Program and arguments joined for logs and error messages
  pub fn display(&self) -> String {
    if self.args.is_empty() {
      self.program.clone()
    } else {
      format!("{} {}", self.program, self.args.join(" "))
    }
  }
}

/// Captured result of a subprocess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
  pub success: bool,
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

#[cfg(test)]
impl CommandOutput {
  pub fn ok(stdout: impl Into<String>) -> Self {
    Self {
      success: true,
      code: Some(0),
      stdout: stdout.into(),
      stderr: String::new(),
    }
  }

  pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
    Self {
      success: false,
      code: Some(code),
      stdout: String::new(),
      stderr: stderr.into(),
    }
  }
}

impl CommandOutput {
  /// First non-empty line of stderr, falling back to stdout
  pub fn reason(&self) -> String {
    let pick = |s: &str| s.lines().map(str::trim).find(|l| !l.is_empty()).map(str::to_string);
    pick(&self.stderr)
      .or_else(|| pick(&self.stdout))
      .unwrap_or_else(|| format!("exit code {}", self.code.map_or("?".to_string(), |c| c.to_string())))
  }
}

/// Executes subprocesses (blocking, no timeout)
pub trait CommandRunner {
  fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput>;

  /// Whether `program` can be found on the execution path
  fn is_available(&self, program: &str) -> bool;
}

/// Runs real processes with `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
  fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args).current_dir(&spec.cwd);

    if spec.isolated {
      cmd.env_clear();
      for key in PASSTHROUGH_ENV {
        if let Some(value) = std::env::var_os(key) {
          cmd.env(key, value);
        }
      }
    }
    for (key, value) in &spec.envs {
      cmd.env(key, value);
    }

    tracing::debug!(command = %spec.display(), cwd = %spec.cwd.display(), "running");
    let output = cmd.output()?;

    Ok(CommandOutput {
      success: output.status.success(),
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
  }

  fn is_available(&self, program: &str) -> bool {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
      return candidate.is_file();
    }

    let Some(path) = std::env::var_os("PATH") else {
      return false;
    };

    std::env::split_paths(&path).any(|dir| {
      let exe = dir.join(program);
      exe.is_file() || (cfg!(windows) && exe.with_extension("exe").is_file())
    })
  }
}
