pub mod action;
pub mod outcome;
pub mod resolution;
pub mod rewrite;
pub mod workflow;

pub use action::{ActionPath, ActionRef, CommitSha, RefName, RepoSlug, ResolutionKey};
pub use outcome::{FileIssue, FileReport, FileState, RunOutcome};
pub use resolution::{
    ActionRegistry, ActionResolver, LookupError, ResolutionError, Resolutions, TagEntry,
};
pub use rewrite::{Pin, Rewrite, RewriteError, rewrite};
pub use workflow::{JobShape, ParsedWorkflow, WorkflowError, WorkflowStore};
