use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::ActionRef;

/// Errors that can occur when working with workflow files
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow directory not found: {}", path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("failed to read glob pattern")]
    Glob(#[from] glob::PatternError),

    #[error("failed to list workflow directory: {}", path.display())]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read workflow: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write workflow: {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkflowError {
    /// True when a file was read but its bytes are not UTF-8 text, which
    /// makes it malformed rather than unreadable.
    #[must_use]
    pub fn is_undecodable(&self) -> bool {
        matches!(
            self,
            WorkflowError::Read { source, .. } if source.kind() == std::io::ErrorKind::InvalidData
        )
    }
}

/// Access to the workflow files of one directory.
pub trait WorkflowStore {
    /// List the `.yml` and `.yaml` files directly inside the workflows directory.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::DirectoryNotFound`] if the directory does not exist,
    /// or another variant if it cannot be listed.
    fn find_workflows(&self) -> Result<Vec<PathBuf>, WorkflowError>;

    /// Read the raw text of a workflow file.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Read`] if the file cannot be read.
    fn read(&self, path: &Path) -> Result<String, WorkflowError>;

    /// Replace the text of a workflow file.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Write`] if the file cannot be written.
    fn write(&self, path: &Path, content: &str) -> Result<(), WorkflowError>;
}

/// Minimal workflow structure for YAML parsing
#[derive(Debug, Deserialize)]
struct RawWorkflow {
    #[serde(default)]
    jobs: Option<IndexMap<String, RawJob>>,
}

#[derive(Debug, Deserialize)]
struct RawJob {
    #[serde(default)]
    steps: Option<Vec<RawStep>>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    uses: Option<UsesValue>,
}

/// `uses:` may hold any YAML value; only strings name an action.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UsesValue {
    Text(String),
    Other(#[allow(dead_code)] IgnoredAny),
}

/// A well-formed document whose top level is not a mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NonMapping {
    Sequence(#[allow(dead_code)] Vec<IgnoredAny>),
    Text(#[allow(dead_code)] String),
    Number(#[allow(dead_code)] f64),
    Flag(#[allow(dead_code)] bool),
}

/// One job of a parsed workflow: its id and the `uses` value of each step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobShape {
    pub id: String,
    pub uses: Vec<Option<String>>,
}

/// Read-only structural view of a workflow, in declaration order.
///
/// Never serialized back: rewrites operate on the raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedWorkflow {
    pub jobs: Vec<JobShape>,
}

impl ParsedWorkflow {
    /// Parse workflow text. An empty document, a document without `jobs`,
    /// or one whose top level is not a mapping yields a workflow with no jobs.
    ///
    /// # Errors
    ///
    /// Returns the parser's error if the text is not valid YAML for a workflow.
    pub fn parse(content: &str) -> Result<Self, serde_saphyr::Error> {
        let raw: Option<RawWorkflow> = match serde_saphyr::from_str(content) {
            Ok(raw) => raw,
            Err(e) => {
                if serde_saphyr::from_str::<NonMapping>(content).is_ok() {
                    return Ok(Self::default());
                }
                return Err(e);
            }
        };

        let jobs = raw
            .and_then(|w| w.jobs)
            .unwrap_or_default()
            .into_iter()
            .map(|(id, job)| JobShape {
                id,
                uses: job
                    .steps
                    .unwrap_or_default()
                    .into_iter()
                    .map(|step| match step.uses {
                        Some(UsesValue::Text(text)) => Some(text),
                        Some(UsesValue::Other(_)) | None => None,
                    })
                    .collect(),
            })
            .collect();

        Ok(Self { jobs })
    }

    /// Every unpinned remote action reference, job by job, step by step.
    #[must_use]
    pub fn action_refs(&self) -> Vec<ActionRef> {
        self.jobs
            .iter()
            .flat_map(|job| {
                job.uses.iter().enumerate().filter_map(|(step, uses)| {
                    uses.as_deref()
                        .and_then(|uses| ActionRef::parse(uses, &job.id, step))
                })
            })
            .collect()
    }

    /// Number of steps whose `uses` value is exactly `raw`.
    #[must_use]
    pub fn count_uses(&self, raw: &str) -> usize {
        self.jobs
            .iter()
            .flat_map(|job| job.uses.iter())
            .filter(|uses| uses.as_deref() == Some(raw))
            .count()
    }
}
