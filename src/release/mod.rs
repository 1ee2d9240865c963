//! Release pipeline: version, changelog, publishing and verification
//!
//! - **version**: persisted version record and bump rules
//! - **changelog**: prepend-only changelog with atomic replace
//! - **publish**: commit, tag, push, pull request, hosted release
//! - **pipeline**: the ordered run from artifact to published release
//! - **verify**: reconcile release state from the repository alone

pub mod changelog;
pub mod pipeline;
pub mod publish;
pub mod verify;
pub mod version;

pub use pipeline::{Pipeline, RunReport, Stage};
pub use verify::ReleaseVerifier;
pub use version::VersionManager;
