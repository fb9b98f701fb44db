use log::{debug, info};
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{ActionRef, ParsedWorkflow, WorkflowError, WorkflowStore};

/// Errors that can occur during the check command
#[derive(Debug, Error)]
pub enum CheckError {
    /// A workflow could not be listed or read.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Unpinned references or malformed workflows were found.
    #[error("{unpinned} unpinned reference(s) and {malformed} malformed workflow(s) found")]
    ViolationsFound { unpinned: usize, malformed: usize },
}

/// A single problem reported by the check command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// A remote action whose ref is not a commit SHA
    Unpinned { workflow: PathBuf, action: ActionRef },
    /// A workflow that could not be parsed
    Malformed { workflow: PathBuf, message: String },
}

impl Finding {
    /// Human-readable message naming the file and, for unpinned references,
    /// the job and one-based step.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Finding::Unpinned { workflow, action } => format!(
                "{}: job {} step {}: {} is not pinned to a commit SHA",
                workflow.display(),
                action.job,
                action.step + 1,
                action.raw
            ),
            Finding::Malformed { workflow, message } => {
                format!("{}: malformed workflow: {message}", workflow.display())
            }
        }
    }
}

/// Scan every workflow and report unpinned references. Read-only; no
/// network access.
///
/// A missing workflow directory yields no findings.
///
/// # Errors
///
/// Returns [`CheckError::Workflow`] if the directory cannot be listed or a
/// workflow file cannot be read. A file whose bytes are not UTF-8 is
/// reported as malformed instead.
pub fn run<S: WorkflowStore>(store: &S) -> Result<Vec<Finding>, CheckError> {
    let paths = match store.find_workflows() {
        Ok(paths) => paths,
        Err(WorkflowError::DirectoryNotFound { path }) => {
            info!("{} not found. Nothing to check.", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut findings = Vec::new();
    for path in paths {
        debug!("Checking {}", path.display());
        let content = match store.read(&path) {
            Ok(content) => content,
            Err(e) if e.is_undecodable() => {
                findings.push(Finding::Malformed {
                    workflow: path,
                    message: "file is not valid UTF-8 text".to_owned(),
                });
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        match ParsedWorkflow::parse(&content) {
            Ok(parsed) => findings.extend(parsed.action_refs().into_iter().map(|action| {
                Finding::Unpinned {
                    workflow: path.clone(),
                    action,
                }
            })),
            Err(e) => findings.push(Finding::Malformed {
                workflow: path,
                message: e.to_string(),
            }),
        }
    }

    Ok(findings)
}

/// Split findings into (unpinned, malformed) counts.
#[must_use]
pub fn tally(findings: &[Finding]) -> (usize, usize) {
    let malformed = findings
        .iter()
        .filter(|f| matches!(f, Finding::Malformed { .. }))
        .count();
    (findings.len() - malformed, malformed)
}
