//! Integration tests for promote
//!
//! Each test builds a throwaway git repository with a local bare remote and
//! drives the compiled binary against it.

mod helpers;
mod test_commands;
mod test_run;
