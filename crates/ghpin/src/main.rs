use clap::{Parser, Subcommand};
use ghpin_lib::commands;
use ghpin_lib::commands::app::AppError;
use ghpin_lib::config::{Config, PinOptions};
use ghpin_lib::infrastructure::{RepoError, default_workflows_dir};
use log::LevelFilter;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level error type for the ghpin CLI binary
#[derive(Debug, Error)]
enum GhpinError {
    /// Command orchestration failed.
    #[error(transparent)]
    App(#[from] AppError),

    /// Repository detection failed.
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Parser)]
#[command(name = "ghpin")]
#[command(about = "Pin GitHub Actions references to commit SHAs", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite every `uses: owner/repo@ref` to the commit SHA the ref points to
    Pin {
        /// Resolve and validate, but do not modify any file
        #[arg(short, long)]
        dry_run: bool,

        /// Append `# <ref>` to pinned lines without a comment
        #[arg(long)]
        annotate: bool,

        /// Workflows directory (default: .github/workflows of the enclosing repository)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Report action references that are not pinned to a commit SHA
    Check {
        /// Workflows directory (default: .github/workflows of the enclosing repository)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<(), GhpinError> {
    let cli = Cli::parse();

    init_logging(&cli);

    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Pin {
            dry_run,
            annotate,
            dir,
        } => {
            let options = PinOptions::from_env()
                .with_preview(dry_run)
                .with_verbose(cli.verbose)
                .with_annotate(annotate);
            let config = Config::new(&workflows_dir(&cwd, dir)?, options);
            commands::app::pin(config)?;
        }
        Commands::Check { dir } => {
            let options = PinOptions::default().with_verbose(cli.verbose);
            let config = Config::new(&workflows_dir(&cwd, dir)?, options);
            commands::app::check(&config)?;
        }
    }
    Ok(())
}

/// # Errors
///
/// Returns [`GhpinError::Repo`] if `cwd` is inside a bare repository.
fn workflows_dir(cwd: &Path, dir: Option<PathBuf>) -> Result<PathBuf, GhpinError> {
    match dir {
        Some(dir) => Ok(dir),
        None => Ok(default_workflows_dir(cwd)?),
    }
}

/// Initialize logging based on the verbosity level specified in the CLI
fn init_logging(cli: &Cli) {
    let verbose = cli.verbose;
    let mut builder = env_logger::builder();
    builder
        .filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format(move |buf, record| {
            let level = record.level();
            let style = &buf.default_level_style(level);
            if verbose {
                let timestamp = buf.timestamp();
                writeln!(buf, "[{timestamp} {style}{level}{style:#}] {}", record.args())
            } else {
                writeln!(buf, "[{style}{level}{style:#}] {}", record.args())
            }
        });

    builder.init();
}
