pub mod github;
pub mod repo;
pub mod workflow;

pub use github::{GithubError, GithubRegistry};
pub use repo::{RepoError, default_workflows_dir, find_root};
pub use workflow::FileWorkflowStore;
// WorkflowError is defined in domain; re-export it for convenience
pub use crate::domain::WorkflowError;
