use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::PinOptions;
use crate::domain::{
    ActionRef, ActionRegistry, ActionResolver, FileIssue, FileReport, FileState, ParsedWorkflow,
    Pin, ResolutionKey, Resolutions, RunOutcome, WorkflowError, WorkflowStore, rewrite,
};

/// Errors that can occur during the pin command
#[derive(Debug, Error)]
pub enum PinError {
    /// The workflow directory or a workflow file could not be accessed.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// The run finished but not every file and reference was pinned.
    #[error("{files} workflow file(s) failed and {references} reference(s) could not be resolved")]
    Incomplete { files: usize, references: usize },
}

/// A workflow that parsed, with the unpinned references it contains.
struct ScannedWorkflow {
    path: PathBuf,
    content: String,
    parsed: ParsedWorkflow,
    refs: Vec<ActionRef>,
}

/// Pin every unpinned action reference in the store's workflows.
///
/// Resolution is batched: unique `action@ref` pairs from all files are
/// resolved once, then each file is rewritten, validated and (unless
/// previewing) written. Per-file and per-reference failures are recorded in
/// the returned outcome; they do not stop other files.
///
/// A missing workflow directory or an empty one is nothing to pin.
///
/// # Errors
///
/// Returns [`PinError::Workflow`] if the directory cannot be listed or a
/// workflow file cannot be read or written. A file whose bytes are not
/// UTF-8 is reported as malformed instead.
pub fn run<S: WorkflowStore, R: ActionRegistry>(
    store: &S,
    registry: R,
    options: &PinOptions,
) -> Result<RunOutcome, PinError> {
    let mut outcome = RunOutcome {
        preview: options.preview_only,
        ..RunOutcome::default()
    };

    let paths = match store.find_workflows() {
        Ok(paths) => paths,
        Err(WorkflowError::DirectoryNotFound { path }) => {
            info!("{} not found. Nothing to pin.", path.display());
            return Ok(outcome);
        }
        Err(e) => return Err(e.into()),
    };
    if paths.is_empty() {
        info!("No workflow files found. Nothing to pin.");
        return Ok(outcome);
    }

    info!("Found {} workflow file(s)", paths.len());
    for path in &paths {
        debug!("{}", path.display());
    }

    let mut scanned = Vec::new();
    for path in paths {
        let content = match store.read(&path) {
            Ok(content) => content,
            Err(e) if e.is_undecodable() => {
                outcome
                    .files
                    .push(malformed(path, "file is not valid UTF-8 text".to_owned()));
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        match ParsedWorkflow::parse(&content) {
            Ok(parsed) => {
                let refs = parsed.action_refs();
                scanned.push(ScannedWorkflow {
                    path,
                    content,
                    parsed,
                    refs,
                });
            }
            Err(e) => outcome.files.push(malformed(path, e.to_string())),
        }
    }

    let keys: BTreeSet<ResolutionKey> = scanned
        .iter()
        .flat_map(|w| w.refs.iter().map(ActionRef::key))
        .collect();
    outcome.unique_actions = keys.len();

    let resolutions = if keys.is_empty() {
        Resolutions::default()
    } else {
        info!("Resolving {} unique action(s)...", keys.len());
        let mut resolver = ActionResolver::new(registry);
        resolver.resolve_all(&keys)
    };
    for failure in resolutions.failures() {
        warn!("{failure}");
    }
    outcome.resolved = resolutions.resolved_count();
    outcome.unresolved = resolutions.len().saturating_sub(outcome.resolved);

    for workflow in scanned {
        let report = pin_workflow(store, workflow, &resolutions, options)?;
        outcome.files.push(report);
    }

    if options.verbose_logging {
        for report in &outcome.files {
            info!("{report}");
        }
    }
    info!("{outcome}");
    if options.preview_only {
        info!("Dry run mode - no files were modified");
    }

    Ok(outcome)
}

fn malformed(path: PathBuf, message: String) -> FileReport {
    warn!("{}: malformed workflow: {message}", path.display());
    let mut report = FileReport::new(path, FileState::Malformed);
    report.issues.push(FileIssue::Malformed { message });
    report
}

/// Rewrite one workflow with the resolved pins that apply to it.
fn pin_workflow<S: WorkflowStore>(
    store: &S,
    workflow: ScannedWorkflow,
    resolutions: &Resolutions,
    options: &PinOptions,
) -> Result<FileReport, PinError> {
    let ScannedWorkflow {
        path,
        content,
        parsed,
        refs,
    } = workflow;
    let display = path.display().to_string();

    if refs.is_empty() {
        debug!("{display}: all actions are already pinned or no actions found");
        return Ok(FileReport::new(path, FileState::NoActionsFound));
    }

    let mut report = FileReport::new(path, FileState::NothingResolved);
    report.found = refs.len();

    let keys: BTreeSet<ResolutionKey> = refs.iter().map(ActionRef::key).collect();
    let mut pins = Vec::new();
    for key in keys {
        if let Some(sha) = resolutions.sha_for(&key) {
            pins.push(Pin::new(key, sha.clone()));
        } else if let Some(e) = resolutions.error_for(&key) {
            report.issues.push(FileIssue::Unresolved(e.clone()));
        }
    }

    if pins.is_empty() {
        warn!("{display}: none of {} action(s) could be resolved", report.found);
        return Ok(report);
    }

    let rewritten = match rewrite(&content, &parsed, &pins, options.annotate) {
        Ok(rewritten) => rewritten,
        Err(e) => {
            warn!("{display}: validation failed, changes not saved: {e}");
            report.state = FileState::ValidationFailed;
            report.issues.push(FileIssue::ValidationFailed {
                message: e.to_string(),
            });
            return Ok(report);
        }
    };

    for pin in &pins {
        info!("{display}: {} -> {}", pin.original(), pin.pinned());
        report.changes.push(format!("{} -> {}", pin.original(), pin.pinned()));
    }
    report.updated = rewritten.replaced;

    if options.preview_only {
        info!("{display}: would update {} reference(s)", rewritten.replaced);
        report.state = FileState::PreviewOnly;
    } else {
        store.write(&report.path, &rewritten.content)?;
        info!("{display}: updated {} reference(s)", rewritten.replaced);
        report.state = FileState::Written;
    }

    Ok(report)
}
