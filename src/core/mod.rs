//! Core engine for promote
//!
//! - **artifact**: locate the build artifact and expand archives into a staging tree
//! - **config**: layered configuration (defaults, promote.toml, `PROMOTE_*`, CLI)
//! - **context**: run context built once and passed to every command
//! - **error**: error types with contextual help and exit codes
//! - **logging**: tracing subscriber setup
//! - **step**: tri-state step outcomes
//! - **sync**: additive, content-addressed tree synchronization
//! - **vcs**: system git and hosting CLI behind an injectable command runner

pub mod artifact;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod step;
pub mod sync;
pub mod vcs;
