//! Diagnostic logging
//!
//! Controlled by environment:
//! - `PROMOTE_LOG`: an `EnvFilter` directive (default `warn`)
//! - `PROMOTE_LOG_FORMAT=json`: JSON events instead of human-readable lines
//!
//! Events always go to stderr so `--json` output on stdout stays clean.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

pub const LOG_ENV: &str = "PROMOTE_LOG";
pub const LOG_FORMAT_ENV: &str = "PROMOTE_LOG_FORMAT";

/// Install the global subscriber. Later calls are no-ops.
pub fn init() {
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
  let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

  let registry = tracing_subscriber::registry().with(filter);
  let _ = if json {
    registry
      .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
      .try_init()
  } else {
    registry
      .with(
        tracing_subscriber::fmt::layer()
          .with_target(false)
          .with_writer(std::io::stderr),
      )
      .try_init()
  };
}
