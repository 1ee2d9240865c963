//! Tri-state step outcomes
//!
//! Every external call in a run reports one of these outcomes and the caller
//! branches on it explicitly. Only [`StepOutcome::Fatal`] stops a run.

use serde::Serialize;
use std::fmt;

/// Outcome of a single pipeline step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StepOutcome {
  /// The step did its work
  Ok,
  /// The step had nothing to do (already done, disabled, tool missing)
  Skipped(String),
  /// The step failed but the run continues
  SoftFailure(String),
  /// The step failed and the run stops here
  Fatal(String),
}

impl StepOutcome {
  pub fn is_fatal(&self) -> bool {
    matches!(self, StepOutcome::Fatal(_))
  }

  pub fn is_ok(&self) -> bool {
    matches!(self, StepOutcome::Ok)
  }

  /// Short glyph for human output
  pub fn glyph(&self) -> &'static str {
    match self {
      StepOutcome::Ok => "✅",
      StepOutcome::Skipped(_) => "⏭️ ",
      StepOutcome::SoftFailure(_) => "⚠️ ",
      StepOutcome::Fatal(_) => "❌",
    }
  }
}

impl fmt::Display for StepOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StepOutcome::Ok => write!(f, "ok"),
      StepOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
      StepOutcome::SoftFailure(reason) => write!(f, "soft failure: {}", reason),
      StepOutcome::Fatal(reason) => write!(f, "fatal: {}", reason),
    }
  }
}

/// A named step and what happened to it
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
  pub name: &'static str,
  pub outcome: StepOutcome,
}

impl StepRecord {
  pub fn new(name: &'static str, outcome: StepOutcome) -> Self {
    match &outcome {
      StepOutcome::Ok => tracing::info!(step = name, "step completed"),
      StepOutcome::Skipped(reason) => tracing::info!(step = name, reason = %reason, "step skipped"),
      StepOutcome::SoftFailure(reason) => tracing::warn!(step = name, reason = %reason, "step failed (tolerated)"),
      StepOutcome::Fatal(reason) => tracing::error!(step = name, reason = %reason, "step failed"),
    }
    Self { name, outcome }
  }
}
