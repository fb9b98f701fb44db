use std::fmt;
use std::path::PathBuf;

use super::ResolutionError;

/// Where a workflow file ended up after a pin run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// No unpinned remote actions in the file
    NoActionsFound,
    /// The file could not be parsed as a workflow
    Malformed,
    /// Actions were found but none of them resolved
    NothingResolved,
    /// The rewritten text was rejected and the file left untouched
    ValidationFailed,
    /// The rewrite was validated but not written (dry run)
    PreviewOnly,
    /// The rewrite was validated and written to disk
    Written,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileState::NoActionsFound => write!(f, "no actions found"),
            FileState::Malformed => write!(f, "malformed"),
            FileState::NothingResolved => write!(f, "nothing resolved"),
            FileState::ValidationFailed => write!(f, "validation failed"),
            FileState::PreviewOnly => write!(f, "preview only"),
            FileState::Written => write!(f, "written"),
        }
    }
}

/// A problem recorded against one workflow file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileIssue {
    Malformed { message: String },
    Unresolved(ResolutionError),
    ValidationFailed { message: String },
}

impl fmt::Display for FileIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileIssue::Malformed { message } => write!(f, "malformed workflow: {message}"),
            FileIssue::Unresolved(e) => write!(f, "{e}"),
            FileIssue::ValidationFailed { message } => {
                write!(f, "rewrite validation failed: {message}")
            }
        }
    }
}

/// Per-file result of a pin run.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub state: FileState,
    /// Unpinned references found (one per step)
    pub found: usize,
    /// `uses:` lines pinned (or that would be pinned in preview)
    pub updated: usize,
    /// `old -> new` for each distinct reference pinned
    pub changes: Vec<String>,
    pub issues: Vec<FileIssue>,
}

impl FileReport {
    #[must_use]
    pub fn new(path: PathBuf, state: FileState) -> Self {
        Self {
            path,
            state,
            found: 0,
            updated: 0,
            changes: Vec::new(),
            issues: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.state, FileState::Malformed | FileState::ValidationFailed)
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} found, {} updated)",
            self.path.display(),
            self.state,
            self.found,
            self.updated
        )
    }
}

/// Aggregated result of one pin run.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub files: Vec<FileReport>,
    /// Unique `action@ref` pairs across all files
    pub unique_actions: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub preview: bool,
}

impl RunOutcome {
    #[must_use]
    pub fn files_scanned(&self) -> usize {
        self.files.len()
    }

    /// Files written, or that would be written in preview.
    #[must_use]
    pub fn files_updated(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.state, FileState::Written | FileState::PreviewOnly))
            .count()
    }

    #[must_use]
    pub fn refs_updated(&self) -> usize {
        self.files.iter().map(|f| f.updated).sum()
    }

    #[must_use]
    pub fn files_failed(&self) -> usize {
        self.files.iter().filter(|f| f.is_failed()).count()
    }

    /// True when every file processed cleanly and every reference resolved.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.unresolved == 0 && self.files_failed() == 0
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.preview {
            "would be updated"
        } else {
            "updated"
        };
        write!(
            f,
            "{} file(s) scanned, {} unique action(s), {} resolved, {} failed; {} reference(s) {verb} in {} file(s)",
            self.files_scanned(),
            self.unique_actions,
            self.resolved,
            self.unresolved,
            self.refs_updated(),
            self.files_updated(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(state: FileState, updated: usize) -> FileReport {
        let mut report = FileReport::new(PathBuf::from("ci.yml"), state);
        report.updated = updated;
        report
    }

    #[test]
    fn counts_written_and_preview_files_as_updated() {
        let outcome = RunOutcome {
            files: vec![
                report(FileState::Written, 2),
                report(FileState::PreviewOnly, 1),
                report(FileState::NoActionsFound, 0),
            ],
            ..RunOutcome::default()
        };
        assert_eq!(outcome.files_scanned(), 3);
        assert_eq!(outcome.files_updated(), 2);
        assert_eq!(outcome.refs_updated(), 3);
        assert!(outcome.is_success());
    }

    #[test]
    fn failed_file_or_unresolved_ref_is_not_success() {
        let outcome = RunOutcome {
            files: vec![report(FileState::ValidationFailed, 0)],
            ..RunOutcome::default()
        };
        assert!(!outcome.is_success());

        let outcome = RunOutcome {
            unresolved: 1,
            ..RunOutcome::default()
        };
        assert!(!outcome.is_success());
    }

    #[test]
    fn file_report_line_shows_state_and_counts() {
        let mut report = report(FileState::Written, 2);
        report.found = 3;
        assert_eq!(report.to_string(), "ci.yml: written (3 found, 2 updated)");
    }

    #[test]
    fn preview_summary_says_would_be_updated() {
        let outcome = RunOutcome {
            files: vec![report(FileState::PreviewOnly, 2)],
            unique_actions: 2,
            resolved: 2,
            preview: true,
            ..RunOutcome::default()
        };
        assert_eq!(
            outcome.to_string(),
            "1 file(s) scanned, 2 unique action(s), 2 resolved, 0 failed; 2 reference(s) would be updated in 1 file(s)"
        );
    }
}
