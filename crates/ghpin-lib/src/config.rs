use std::env;
use std::path::{Path, PathBuf};

/// Runtime settings loaded from environment variables.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Github API token for authenticated requests
    pub github_token: Option<String>,
}

impl Settings {
    /// Load settings from environment variables. An empty `GITHUB_TOKEN`
    /// counts as unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            github_token: env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }
}

/// How a pin run behaves.
#[derive(Debug, Clone, Default)]
pub struct PinOptions {
    /// Resolve and validate everything but write nothing
    pub preview_only: bool,
    /// List every file's final state before the run summary
    pub verbose_logging: bool,
    /// Token for the Github API; anonymous when absent
    pub credential: Option<String>,
    /// Append `# <original ref>` to pinned lines that have no comment
    pub annotate: bool,
}

impl PinOptions {
    /// Options with the credential taken from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            credential: Settings::from_env().github_token,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_preview(mut self, preview_only: bool) -> Self {
        self.preview_only = preview_only;
        self
    }

    #[must_use]
    pub fn with_verbose(mut self, verbose_logging: bool) -> Self {
        self.verbose_logging = verbose_logging;
        self
    }

    #[must_use]
    pub fn with_annotate(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }
}

/// All application configuration, assembled once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub workflows_dir: PathBuf,
    pub options: PinOptions,
}

impl Config {
    #[must_use]
    pub fn new(workflows_dir: &Path, options: PinOptions) -> Self {
        Self {
            workflows_dir: workflows_dir.to_path_buf(),
            options,
        }
    }
}
