//! CLI commands for promote
//!
//! - **run**: the full release pipeline (artifact → published release)
//! - **verify**: report release state from the repository and repair missing records
//! - **sync**: merge an artifact into the destination without releasing
//! - **version**: show or persist the next version
//!
//! All commands accept `&RunContext` so configuration is layered once.

pub mod run;
pub mod sync;
pub mod verify;
pub mod version;

pub use run::run_release;
pub use sync::run_sync;
pub use verify::run_verify;
pub use version::run_version;
