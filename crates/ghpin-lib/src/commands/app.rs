use log::{info, warn};
use thiserror::Error;

use crate::config::Config;
use crate::domain::RunOutcome;
use crate::infrastructure::{FileWorkflowStore, GithubError, GithubRegistry};

use super::check::{CheckError, Finding};
use super::pin::PinError;

/// Errors that can occur during command orchestration
#[derive(Debug, Error)]
pub enum AppError {
    /// The GitHub registry could not be initialized.
    #[error(transparent)]
    Github(#[from] GithubError),

    /// The pin command failed or left references unpinned.
    #[error(transparent)]
    Pin(#[from] PinError),

    /// The check command failed or found violations.
    #[error(transparent)]
    Check(#[from] CheckError),
}

/// Run the pin command against the configured workflows directory.
///
/// # Errors
///
/// Returns [`AppError::Github`] if the registry cannot be created.
/// Returns [`AppError::Pin`] if a workflow cannot be read or written, or if
/// any file or reference could not be pinned.
pub fn pin(config: Config) -> Result<RunOutcome, AppError> {
    let Config {
        workflows_dir,
        options,
    } = config;

    if options.credential.is_none() {
        warn!(
            "GITHUB_TOKEN not set. Without it you may encounter rate limits for public repositories and cannot access private repositories."
        );
    }

    let registry = GithubRegistry::new(options.credential.clone())?;
    let store = FileWorkflowStore::new(&workflows_dir);
    let outcome = super::pin::run(&store, registry, &options)?;

    for report in outcome.files.iter().filter(|r| r.is_failed()) {
        for issue in &report.issues {
            warn!("{}: {issue}", report.path.display());
        }
    }

    if !outcome.is_success() {
        return Err(PinError::Incomplete {
            files: outcome.files_failed(),
            references: outcome.unresolved,
        }
        .into());
    }

    if !options.preview_only && outcome.files_updated() > 0 {
        info!("Review the changes and commit the pinned workflows.");
    }

    Ok(outcome)
}

/// Run the check command: report unpinned references without modifying
/// anything.
///
/// # Errors
///
/// Returns [`AppError::Check`] if a workflow cannot be read or any finding
/// is reported.
pub fn check(config: &Config) -> Result<(), AppError> {
    let store = FileWorkflowStore::new(&config.workflows_dir);
    let findings = super::check::run(&store)?;

    if findings.is_empty() {
        info!("All actions are pinned to commit SHAs.");
        return Ok(());
    }

    for finding in &findings {
        match finding {
            Finding::Unpinned { .. } => info!("[error] {}", finding.message()),
            Finding::Malformed { .. } => warn!("{}", finding.message()),
        }
    }

    let (unpinned, malformed) = super::check::tally(&findings);
    info!("{} issue(s) found", findings.len());

    Err(CheckError::ViolationsFound {
        unpinned,
        malformed,
    }
    .into())
}
