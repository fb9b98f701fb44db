use glob::glob;
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{WorkflowError, WorkflowStore};

/// Workflow files of one directory on the local file system.
pub struct FileWorkflowStore {
    workflows_dir: PathBuf,
}

impl FileWorkflowStore {
    #[must_use]
    pub fn new(workflows_dir: &Path) -> Self {
        Self {
            workflows_dir: workflows_dir.to_path_buf(),
        }
    }

    #[must_use]
    pub fn workflows_dir(&self) -> &Path {
        &self.workflows_dir
    }
}

impl WorkflowStore for FileWorkflowStore {
    fn find_workflows(&self) -> Result<Vec<PathBuf>, WorkflowError> {
        if !self.workflows_dir.is_dir() {
            return Err(WorkflowError::DirectoryNotFound {
                path: self.workflows_dir.clone(),
            });
        }
        // glob swallows unreadable directories; surface them instead
        fs::read_dir(&self.workflows_dir).map_err(|source| WorkflowError::List {
            path: self.workflows_dir.clone(),
            source,
        })?;

        let escaped_dir = glob::Pattern::escape(&self.workflows_dir.to_string_lossy());
        let mut workflows = Vec::new();

        for extension in &["yml", "yaml"] {
            let pattern = format!("{escaped_dir}/*.{extension}");

            for entry in glob(&pattern)? {
                match entry {
                    Ok(path) if path.is_file() => workflows.push(path),
                    Ok(_) => {}
                    Err(e) => warn!("Error reading path: {e}"),
                }
            }
        }

        workflows.sort();
        Ok(workflows)
    }

    fn read(&self, path: &Path) -> Result<String, WorkflowError> {
        fs::read_to_string(path).map_err(|source| WorkflowError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), WorkflowError> {
        fs::write(path, content).map_err(|source| WorkflowError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_workflow(dir: &Path, name: &str, content: &str) -> PathBuf {
        let workflows_dir = dir.join(".github").join("workflows");
        fs::create_dir_all(&workflows_dir).unwrap();
        let file_path = workflows_dir.join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    #[test]
    fn finds_yml_and_yaml_files_only() {
        let temp_dir = TempDir::new().unwrap();
        create_test_workflow(temp_dir.path(), "ci.yml", "name: CI");
        create_test_workflow(temp_dir.path(), "deploy.yaml", "name: Deploy");
        create_test_workflow(temp_dir.path(), "README.md", "# docs");
        let workflows_dir = temp_dir.path().join(".github").join("workflows");
        fs::create_dir_all(workflows_dir.join("nested")).unwrap();
        fs::write(workflows_dir.join("nested").join("inner.yml"), "name: Inner").unwrap();

        let store = FileWorkflowStore::new(&workflows_dir);
        let workflows = store.find_workflows().unwrap();

        let names: Vec<_> = workflows
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["ci.yml", "deploy.yaml"]);
    }

    #[test]
    fn missing_directory_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileWorkflowStore::new(&temp_dir.path().join("missing"));

        let err = store.find_workflows().unwrap_err();
        assert!(matches!(err, WorkflowError::DirectoryNotFound { .. }));
    }

    #[test]
    fn directory_with_glob_characters_is_listed() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("[weird]");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("ci.yml"), "name: CI").unwrap();

        let store = FileWorkflowStore::new(&dir);
        assert_eq!(store.find_workflows().unwrap().len(), 1);
    }

    #[test]
    fn writes_and_reads_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_test_workflow(temp_dir.path(), "ci.yml", "name: CI\n");
        let store = FileWorkflowStore::new(path.parent().unwrap());

        store.write(&path, "name: Pinned\n").unwrap();
        assert_eq!(store.read(&path).unwrap(), "name: Pinned\n");
    }
}
