use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use config::Operation;
use std::path::PathBuf;

mod config;
mod error;
mod format;
mod preview;
mod rsync;
mod rules;
mod sync;

#[cfg(test)]
mod testutil;

#[derive(Parser)]
#[command(
    name = "sitesync",
    about = "Pull and push a site's files between a remote host and a local copy"
)]
struct Cli {
    /// Settings file (default: nearest sitesync.toml or sitesync.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct FiltersArgs {
    /// Merge in the pull- or push-specific rules
    #[arg(long = "for", value_enum)]
    pub(crate) operation: Option<Operation>,

    /// Print each rule as an rsync `--filter=` argument
    #[arg(long, default_value_t = false)]
    pub(crate) args: bool,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct PreviewArgs {
    #[arg(long = "for", value_enum)]
    pub(crate) operation: Option<Operation>,

    /// Relative paths to check; a trailing `/` marks a directory. Without
    /// paths, the local site is walked and every transferred file listed.
    pub(crate) paths: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct SyncArgs {
    /// Pass --dry-run to rsync
    #[arg(long, default_value_t = false)]
    pub(crate) dry_run: bool,

    /// Print the rsync command instead of running it
    #[arg(long, default_value_t = false)]
    pub(crate) print: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the compiled rsync filter rules
    Filters(FiltersArgs),
    /// Show which paths the filter rules transfer
    Preview(PreviewArgs),
    /// Copy the remote site files to the local copy
    Pull(SyncArgs),
    /// Copy the local site files to the remote host
    Push(SyncArgs),
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info,globset=warn"),
            2 => tracing_subscriber::EnvFilter::new("debug,globset=warn"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Filters(args) => sync::run_filters(config, args),
        Commands::Preview(args) => sync::run_preview(config, args),
        Commands::Pull(args) => sync::run_sync(config, Operation::Pull, args),
        Commands::Push(args) => sync::run_sync(config, Operation::Push, args),
    }
}
