mod commands;
mod core;
mod release;
mod ui;

use clap::{Args, Parser, Subcommand};
use core::config::ConfigOverrides;
use core::context::RunContext;
use core::error::{PromoteError, print_error};
use std::path::PathBuf;

/// Promote a build artifact into a versioned, published release
#[derive(Parser)]
#[command(name = "promote")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  /// Destination working tree (a git checkout)
  #[arg(long, global = true, default_value = ".")]
  dest: PathBuf,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Sync the artifact, bump the version, update the changelog and publish
  Run {
    #[command(flatten)]
    release: ReleaseArgs,
    /// Build artifact archive (zip, tar, tar.gz or tar.zst)
    #[arg(long)]
    archive: Option<PathBuf>,
    /// Prepared directory used when no archive is present
    #[arg(long)]
    source_dir: Option<PathBuf>,
    /// Bump directive: major, minor, patch or set
    #[arg(long)]
    bump: Option<String>,
    /// Explicit next version (implies --bump set)
    #[arg(long = "set", value_name = "VERSION")]
    set_version: Option<String>,
    /// Branch the pull request targets
    #[arg(long)]
    base_branch: Option<String>,
    /// Do not open a pull request
    #[arg(long)]
    no_pr: bool,
    /// Do not create a hosted release
    #[arg(long)]
    no_release: bool,
    /// Mark the release commit so CI ignores it
    #[arg(long)]
    skip_ci: bool,
    /// Do not fetch the remote before branching
    #[arg(long)]
    no_fetch: bool,
    /// Show what would happen without changing anything
    #[arg(long)]
    dry_run: bool,
    /// Output the run summary in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Report release state and create missing pull requests / releases
  Verify {
    #[command(flatten)]
    release: ReleaseArgs,
    /// Only report; never create anything
    #[arg(long)]
    no_repair: bool,
    /// Output the report in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Merge an artifact into the destination without releasing
  Sync {
    /// Archive or directory to sync (default: the configured artifact)
    source: Option<PathBuf>,
    /// Show what would change without writing
    #[arg(long)]
    dry_run: bool,
    /// Output the sync outcome in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Show the current and next version
  Version {
    /// Bump directive: major, minor, patch or set
    #[arg(long)]
    bump: Option<String>,
    /// Explicit next version (implies --bump set)
    #[arg(long = "set", value_name = "VERSION")]
    set_version: Option<String>,
    /// Persist the next version
    #[arg(long)]
    write: bool,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },
}

/// Flags shared by commands that look at release branches
#[derive(Args)]
struct ReleaseArgs {
  /// Push remote
  #[arg(long)]
  remote: Option<String>,
  /// Release branch prefix
  #[arg(long)]
  branch_prefix: Option<String>,
}

impl Commands {
  /// CLI layer of the configuration
  fn overrides(&self) -> ConfigOverrides {
    match self {
      Commands::Run {
        release,
        archive,
        source_dir,
        bump,
        set_version,
        base_branch,
        no_pr,
        no_release,
        skip_ci,
        no_fetch,
        ..
      } => ConfigOverrides {
        base_branch: base_branch.clone(),
        branch_prefix: release.branch_prefix.clone(),
        bump: bump.clone(),
        set_version: set_version.clone(),
        remote: release.remote.clone(),
        archive: archive.clone(),
        source_dir: source_dir.clone(),
        no_pr: *no_pr,
        no_release: *no_release,
        skip_ci: *skip_ci,
        no_fetch: *no_fetch,
      },
      Commands::Verify { release, .. } => ConfigOverrides {
        branch_prefix: release.branch_prefix.clone(),
        remote: release.remote.clone(),
        ..ConfigOverrides::default()
      },
      Commands::Version { bump, set_version, .. } => ConfigOverrides {
        bump: bump.clone(),
        set_version: set_version.clone(),
        ..ConfigOverrides::default()
      },
      Commands::Sync { .. } => ConfigOverrides::default(),
    }
  }
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn main() {
  core::logging::init();
  let cli = Cli::parse();

  let ctx = match RunContext::build(&cli.dest, &cli.command.overrides()) {
    Ok(ctx) => ctx,
    Err(e) => handle_error(e),
  };

  let result = match cli.command {
    Commands::Run { dry_run, json, .. } => commands::run_release(&ctx, dry_run, json),
    Commands::Verify { no_repair, json, .. } => commands::run_verify(&ctx, !no_repair, json),
    Commands::Sync { source, dry_run, json } => commands::run_sync(&ctx, source, dry_run, json),
    Commands::Version { write, json, .. } => commands::run_version(&ctx, write, json),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: PromoteError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
