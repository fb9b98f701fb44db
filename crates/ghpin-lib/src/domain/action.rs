use std::fmt;

/// Path of a remote action as written in `uses:` (e.g., "actions/checkout",
/// "github/codeql-action/upload-sarif").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionPath(String);

impl ActionPath {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the repository (owner/repo) the action lives in.
    /// Handles subpath actions like "github/codeql-action/upload-sarif".
    /// Returns `None` when the path has fewer than two non-empty segments.
    #[must_use]
    pub fn repo(&self) -> Option<RepoSlug> {
        let mut segments = self.0.split('/');
        let owner = segments.next().filter(|s| !s.is_empty())?;
        let name = segments.next().filter(|s| !s.is_empty())?;
        Some(RepoSlug {
            owner: owner.to_owned(),
            name: name.to_owned(),
        })
    }

    /// Returns true for actions that live in the workflow's own repository
    /// (`./path`, `../path`, or any path with a `/./` segment).
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with("./") || self.0.starts_with("../") || self.0.contains("/./")
    }

    /// Returns true for `docker://` container actions.
    #[must_use]
    pub fn is_docker(&self) -> bool {
        self.0.starts_with("docker://")
    }
}

impl fmt::Display for ActionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActionPath {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ActionPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The requested ref after `@` (tag, semantic version, branch, or SHA).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

impl RefName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this ref is already an immutable commit SHA.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        CommitSha::is_valid(&self.0)
    }

    /// Returns true if this ref looks like a version tag: an optional `v`
    /// followed by one to three dot-separated numeric components
    /// ("v4", "4.1", "v4.1.0").
    #[must_use]
    pub fn is_version_like(&self) -> bool {
        let stripped = self.0.strip_prefix('v').unwrap_or(&self.0);
        let mut count = 0_usize;
        for part in stripped.split('.') {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return false;
            }
            count = count.saturating_add(1);
        }
        (1..=3).contains(&count)
    }

    /// The major component when this ref is a bare major version
    /// ("v3" → "3", "3" → "3"), otherwise `None`.
    #[must_use]
    pub fn bare_major(&self) -> Option<&str> {
        let stripped = self.0.strip_prefix('v').unwrap_or(&self.0);
        (!stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())).then_some(stripped)
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RefName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RefName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A resolved commit SHA (40 lowercase hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitSha(String);

impl CommitSha {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log output.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }

    /// Check if a string is a full commit SHA (40 lowercase hexadecimal characters)
    #[must_use]
    pub fn is_valid(s: &str) -> bool {
        s.len() == 40 && s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CommitSha {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for CommitSha {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Deduplication key for resolution: one remote lookup per unique pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolutionKey {
    pub path: ActionPath,
    pub git_ref: RefName,
}

impl ResolutionKey {
    #[must_use]
    pub fn new(path: ActionPath, git_ref: RefName) -> Self {
        Self { path, git_ref }
    }
}

impl fmt::Display for ResolutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.git_ref)
    }
}

/// An unpinned action reference found in a workflow step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef {
    pub path: ActionPath,
    pub git_ref: RefName,
    /// Exact `uses:` value as written (`owner/repo@ref`)
    pub raw: String,
    /// Id of the job declaring the step
    pub job: String,
    /// Zero-based index of the step within its job
    pub step: usize,
}

impl ActionRef {
    /// Split a `uses:` value on its last `@`.
    ///
    /// Returns `None` for values that are not pinnable: no `@`, local
    /// actions, docker actions, paths without owner/repo, or refs that are
    /// already commit SHAs.
    #[must_use]
    pub fn parse(uses: &str, job: &str, step: usize) -> Option<Self> {
        let (path, git_ref) = uses.rsplit_once('@')?;
        let path = ActionPath::from(path);
        let git_ref = RefName::from(git_ref);

        if path.is_local() || path.is_docker() || path.repo().is_none() {
            return None;
        }
        if git_ref.as_str().is_empty() || git_ref.is_pinned() {
            return None;
        }

        Some(Self {
            path,
            git_ref,
            raw: uses.to_owned(),
            job: job.to_owned(),
            step,
        })
    }

    #[must_use]
    pub fn key(&self) -> ResolutionKey {
        ResolutionKey::new(self.path.clone(), self.git_ref.clone())
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha_validation_requires_forty_lowercase_hex() {
        assert!(CommitSha::is_valid(
            "704facf57e6136b1bc63b828d79edcd491f0ee84"
        ));
        assert!(!CommitSha::is_valid(
            "704FACF57E6136B1BC63B828D79EDCD491F0EE84"
        ));
        assert!(!CommitSha::is_valid("704facf"));
        assert!(!CommitSha::is_valid(
            "704facf57e6136b1bc63b828d79edcd491f0ee8g"
        ));
    }

    #[test]
    fn version_like_refs() {
        for ok in ["v1", "1", "v1.2", "v1.2.3", "10.20.30"] {
            assert!(RefName::from(ok).is_version_like(), "{ok}");
        }
        for not in ["main", "latest", "v1.2.3.4", "v", "v1.", "v1-beta", "V1"] {
            assert!(!RefName::from(not).is_version_like(), "{not}");
        }
    }

    #[test]
    fn bare_major_only_for_single_component() {
        assert_eq!(RefName::from("v3").bare_major(), Some("3"));
        assert_eq!(RefName::from("3").bare_major(), Some("3"));
        assert_eq!(RefName::from("v3.1").bare_major(), None);
        assert_eq!(RefName::from("main").bare_major(), None);
    }

    #[test]
    fn repo_of_subpath_action() {
        let path = ActionPath::from("github/codeql-action/upload-sarif");
        let repo = path.repo().unwrap();
        assert_eq!(repo.owner, "github");
        assert_eq!(repo.name, "codeql-action");
        assert_eq!(repo.to_string(), "github/codeql-action");
    }

    #[test]
    fn parse_splits_on_last_at() {
        let action = ActionRef::parse("actions/checkout@v4", "build", 0).unwrap();
        assert_eq!(action.path.as_str(), "actions/checkout");
        assert_eq!(action.git_ref.as_str(), "v4");
        assert_eq!(action.raw, "actions/checkout@v4");

        let action = ActionRef::parse("owner/repo@feature@x", "build", 1).unwrap();
        assert_eq!(action.path.as_str(), "owner/repo@feature");
        assert_eq!(action.git_ref.as_str(), "x");
    }

    #[test]
    fn parse_rejects_non_pinnable_values() {
        assert!(ActionRef::parse("actions/checkout", "j", 0).is_none());
        assert!(ActionRef::parse("./local/action@v1", "j", 0).is_none());
        assert!(ActionRef::parse("../shared/action@v1", "j", 0).is_none());
        assert!(ActionRef::parse("owner/repo/./nested@v1", "j", 0).is_none());
        assert!(ActionRef::parse("docker://alpine@sha256:abc", "j", 0).is_none());
        assert!(ActionRef::parse("checkout@v4", "j", 0).is_none());
        assert!(ActionRef::parse("actions/checkout@", "j", 0).is_none());
        assert!(
            ActionRef::parse(
                "actions/cache@704facf57e6136b1bc63b828d79edcd491f0ee84",
                "j",
                0
            )
            .is_none()
        );
    }

    #[test]
    fn uppercase_sha_is_not_pinned() {
        let action =
            ActionRef::parse("actions/cache@704FACF57E6136B1BC63B828D79EDCD491F0EE84", "j", 0);
        assert!(action.is_some());
    }

    #[test]
    fn short_sha_for_logs() {
        let sha = CommitSha::from("a1b2c3d4e5f6789012345678901234567890abcd");
        assert_eq!(sha.short(), "a1b2c3d");
    }
}
