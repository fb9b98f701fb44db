use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when locating the workflows directory
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("repository has no work tree")]
    BareRepository,

    #[error("no valid git repository could be found")]
    GitRepository(#[source] Box<gix_discover::upwards::Error>),
}

/// Find the root of the git repository containing the given path.
///
/// # Errors
///
/// Returns an error if no git repository is found or the repository is bare.
pub fn find_root(start: &Path) -> Result<PathBuf, RepoError> {
    let (repo_path, _trust) =
        gix_discover::upwards(start).map_err(|e| RepoError::GitRepository(Box::new(e)))?;

    let (_git_dir, work_tree) = repo_path.into_repository_and_work_tree_directories();

    work_tree.ok_or(RepoError::BareRepository)
}

/// The `.github/workflows` directory of the repository containing `start`,
/// or of `start` itself when it is not inside a git repository.
///
/// # Errors
///
/// Returns [`RepoError::BareRepository`] if `start` is inside a bare repository.
pub fn default_workflows_dir(start: &Path) -> Result<PathBuf, RepoError> {
    let root = match find_root(start) {
        Ok(root) => root,
        Err(RepoError::GitRepository(e)) => {
            log::debug!("{e}; using {}", start.display());
            start.to_path_buf()
        }
        Err(e) => return Err(e),
    };

    Ok(root.join(".github").join("workflows"))
}
