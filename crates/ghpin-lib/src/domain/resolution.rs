use log::debug;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use super::{CommitSha, RefName, RepoSlug, ResolutionKey};

/// Failure of a single query against the action registry.
///
/// `NotFound` is definitive; `Transport` covers network, timeout, auth and
/// server failures that may succeed on a later run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("{reason}")]
    Transport { reason: String },
}

impl LookupError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors that can occur during reference resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("failed to resolve {key}: {source}")]
    Unresolved {
        key: ResolutionKey,
        #[source]
        source: LookupError,
    },

    #[error("{key} does not name a repository (expected owner/repo)")]
    InvalidPath { key: ResolutionKey },
}

/// A tag as listed by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub name: String,
    pub sha: CommitSha,
}

impl TagEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, sha: impl Into<CommitSha>) -> Self {
        Self {
            name: name.into(),
            sha: sha.into(),
        }
    }
}

/// Trait for querying tags and branches of action repositories
pub trait ActionRegistry {
    /// List the repository's tags in the registry's own order.
    ///
    /// The listing may end early once a tag named exactly `until` has been
    /// returned; every tag listed before it is always included.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] if the repository does not exist.
    fn list_tags(&self, repo: &RepoSlug, until: &str) -> Result<Vec<TagEntry>, LookupError>;

    /// Commit at the head of a branch.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] if the repository or branch does not exist.
    fn branch_head(&self, repo: &RepoSlug, branch: &str) -> Result<CommitSha, LookupError>;

    /// Commit a tag points to, looked up directly by name.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] if the repository or tag does not exist.
    fn tag_ref(&self, repo: &RepoSlug, tag: &str) -> Result<CommitSha, LookupError>;
}

impl<R: ActionRegistry + ?Sized> ActionRegistry for &R {
    fn list_tags(&self, repo: &RepoSlug, until: &str) -> Result<Vec<TagEntry>, LookupError> {
        (**self).list_tags(repo, until)
    }

    fn branch_head(&self, repo: &RepoSlug, branch: &str) -> Result<CommitSha, LookupError> {
        (**self).branch_head(repo, branch)
    }

    fn tag_ref(&self, repo: &RepoSlug, tag: &str) -> Result<CommitSha, LookupError> {
        (**self).tag_ref(repo, tag)
    }
}

/// Outcome of resolving every unique key of a run.
#[derive(Debug, Default)]
pub struct Resolutions {
    entries: BTreeMap<ResolutionKey, Result<CommitSha, ResolutionError>>,
}

impl Resolutions {
    #[must_use]
    pub fn sha_for(&self, key: &ResolutionKey) -> Option<&CommitSha> {
        self.entries.get(key).and_then(|r| r.as_ref().ok())
    }

    #[must_use]
    pub fn error_for(&self, key: &ResolutionKey) -> Option<&ResolutionError> {
        self.entries.get(key).and_then(|r| r.as_ref().err())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.entries.values().filter(|r| r.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ResolutionError> {
        self.entries.values().filter_map(|r| r.as_ref().err())
    }
}

/// Resolves action references to commit SHAs.
///
/// Owns the cache for one run: each unique key is looked up at most once,
/// and its outcome (success or failure) is reused afterwards.
pub struct ActionResolver<R: ActionRegistry> {
    registry: R,
    cache: HashMap<ResolutionKey, Result<CommitSha, ResolutionError>>,
}

impl<R: ActionRegistry> ActionResolver<R> {
    #[must_use]
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            cache: HashMap::new(),
        }
    }

    /// Access the underlying registry
    #[must_use]
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Resolve a single key, consulting the run cache first.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError`] if no tag or branch matches the ref.
    pub fn resolve(&mut self, key: &ResolutionKey) -> Result<CommitSha, ResolutionError> {
        if let Some(cached) = self.cache.get(key) {
            debug!("{key} already resolved in this run");
            return cached.clone();
        }

        let outcome = self.lookup(key);
        self.cache.insert(key.clone(), outcome.clone());
        outcome
    }

    /// Resolve every key, isolating failures per key.
    pub fn resolve_all<'k, I>(&mut self, keys: I) -> Resolutions
    where
        I: IntoIterator<Item = &'k ResolutionKey>,
    {
        let mut resolutions = Resolutions::default();
        for key in keys {
            let outcome = self.resolve(key);
            resolutions.entries.insert(key.clone(), outcome);
        }
        resolutions
    }

    /// Query the registry: tag list for version-shaped refs, then the
    /// branch head, then a direct tag lookup when the tag list was skipped.
    fn lookup(&self, key: &ResolutionKey) -> Result<CommitSha, ResolutionError> {
        let repo = key
            .path
            .repo()
            .ok_or_else(|| ResolutionError::InvalidPath { key: key.clone() })?;
        let unresolved = |source: LookupError| ResolutionError::Unresolved {
            key: key.clone(),
            source,
        };
        let git_ref = &key.git_ref;

        let consult_tags = git_ref.is_version_like();
        if consult_tags {
            debug!("Listing tags of {repo} for {git_ref}");
            match self.registry.list_tags(&repo, git_ref.as_str()) {
                Ok(tags) => {
                    if let Some(tag) = select_tag(&tags, git_ref) {
                        debug!("{key} matched tag {} at {}", tag.name, tag.sha.short());
                        return ensure_sha(tag.sha.clone()).map_err(unresolved);
                    }
                    debug!("No tag of {repo} matches {git_ref}, trying branch");
                }
                Err(e) if e.is_not_found() => debug!("No tags listed for {repo}: {e}"),
                Err(e) => return Err(unresolved(e)),
            }
        }

        debug!("Looking up branch {git_ref} of {repo}");
        let head = match self.registry.branch_head(&repo, git_ref.as_str()) {
            Err(e) if e.is_not_found() && !consult_tags => {
                debug!("{e}, trying tag ref {git_ref} of {repo}");
                self.registry.tag_ref(&repo, git_ref.as_str())
            }
            Ok(sha) => Ok(sha),
            Err(e) => Err(e),
        };

        head.and_then(ensure_sha).map_err(|e| match e {
            LookupError::NotFound { .. } => unresolved(LookupError::NotFound {
                what: format!("tag or branch {git_ref} in {repo}"),
            }),
            LookupError::Transport { .. } => unresolved(e),
        })
    }
}

/// Pick the tag for a version-shaped ref: the exact name, or for a bare
/// major version the first listed tag of that major line.
///
/// The registry's order is kept as-is; no semantic version sorting.
fn select_tag<'t>(tags: &'t [TagEntry], git_ref: &RefName) -> Option<&'t TagEntry> {
    if let Some(exact) = tags.iter().find(|t| t.name == git_ref.as_str()) {
        return Some(exact);
    }

    let major = git_ref.bare_major()?;
    let prefixed = format!("v{major}.");
    let plain = format!("{major}.");
    tags.iter().find(|t| t.name.starts_with(&prefixed) || t.name.starts_with(&plain))
}

fn ensure_sha(sha: CommitSha) -> Result<CommitSha, LookupError> {
    if CommitSha::is_valid(sha.as_str()) {
        Ok(sha)
    } else {
        Err(LookupError::Transport {
            reason: format!("registry returned an invalid commit SHA: {sha}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActionPath;
    use std::cell::{Cell, RefCell};

    const SHA_A: &str = "a1b2c3d4e5f6789012345678901234567890abcd";
    const SHA_B: &str = "b2c3d4e5f6789012345678901234567890abcdef";
    const SHA_D: &str = "d4e5f6789012345678901234567890abcdef1234";
    const SHA_E: &str = "e5f6789012345678901234567890abcdef123456";

    struct MockRegistry {
        tags: Result<Vec<TagEntry>, LookupError>,
        branch: Result<CommitSha, LookupError>,
        tag_ref: Result<CommitSha, LookupError>,
        tag_lists: Cell<usize>,
        branches: Cell<usize>,
        tag_refs: Cell<usize>,
        listed_until: RefCell<String>,
    }

    impl MockRegistry {
        fn new() -> Self {
            Self {
                tags: Ok(vec![]),
                branch: Err(LookupError::NotFound {
                    what: "branch".to_owned(),
                }),
                tag_ref: Err(LookupError::NotFound {
                    what: "tag".to_owned(),
                }),
                tag_lists: Cell::new(0),
                branches: Cell::new(0),
                tag_refs: Cell::new(0),
                listed_until: RefCell::new(String::new()),
            }
        }
    }

    impl ActionRegistry for MockRegistry {
        fn list_tags(&self, _repo: &RepoSlug, until: &str) -> Result<Vec<TagEntry>, LookupError> {
            self.tag_lists.set(self.tag_lists.get() + 1);
            self.listed_until.replace(until.to_owned());
            self.tags.clone()
        }

        fn branch_head(&self, _repo: &RepoSlug, _branch: &str) -> Result<CommitSha, LookupError> {
            self.branches.set(self.branches.get() + 1);
            self.branch.clone()
        }

        fn tag_ref(&self, _repo: &RepoSlug, _tag: &str) -> Result<CommitSha, LookupError> {
            self.tag_refs.set(self.tag_refs.get() + 1);
            self.tag_ref.clone()
        }
    }

    fn key(path: &str, git_ref: &str) -> ResolutionKey {
        ResolutionKey::new(ActionPath::from(path), RefName::from(git_ref))
    }

    #[test]
    fn exact_tag_match_wins() {
        let mut registry = MockRegistry::new();
        registry.tags = Ok(vec![
            TagEntry::new("v3.6.0", SHA_B),
            TagEntry::new("v3", SHA_A),
        ]);
        let mut resolver = ActionResolver::new(registry);

        let sha = resolver.resolve(&key("actions/checkout", "v3")).unwrap();
        assert_eq!(sha.as_str(), SHA_A);
        assert_eq!(resolver.registry().branches.get(), 0);
        assert_eq!(*resolver.registry().listed_until.borrow(), "v3");
    }

    #[test]
    fn bare_major_falls_back_to_first_listed_line_tag() {
        let mut registry = MockRegistry::new();
        registry.tags = Ok(vec![
            TagEntry::new("v4.0.2", SHA_B),
            TagEntry::new("v3.8.1", SHA_D),
            TagEntry::new("v3.9.0", SHA_A),
        ]);
        let mut resolver = ActionResolver::new(registry);

        let sha = resolver.resolve(&key("actions/setup-node", "v3")).unwrap();
        assert_eq!(sha.as_str(), SHA_D);
    }

    #[test]
    fn major_fallback_accepts_unprefixed_tags() {
        let mut registry = MockRegistry::new();
        registry.tags = Ok(vec![TagEntry::new("2.1.0", SHA_B)]);
        let mut resolver = ActionResolver::new(registry);

        let sha = resolver.resolve(&key("owner/tool", "v2")).unwrap();
        assert_eq!(sha.as_str(), SHA_B);
    }

    #[test]
    fn minor_version_does_not_use_major_fallback() {
        let mut registry = MockRegistry::new();
        registry.tags = Ok(vec![TagEntry::new("v1.2.9", SHA_B)]);
        registry.branch = Ok(CommitSha::from(SHA_E));
        let mut resolver = ActionResolver::new(registry);

        let sha = resolver.resolve(&key("owner/tool", "v1.2")).unwrap();
        assert_eq!(sha.as_str(), SHA_E);
    }

    #[test]
    fn version_not_in_tags_falls_through_to_branch() {
        let mut registry = MockRegistry::new();
        registry.branch = Ok(CommitSha::from(SHA_E));
        let mut resolver = ActionResolver::new(registry);

        let sha = resolver
            .resolve(&key("company/custom-action", "v1.2.3"))
            .unwrap();
        assert_eq!(sha.as_str(), SHA_E);
        assert_eq!(resolver.registry().tag_lists.get(), 1);
        assert_eq!(resolver.registry().branches.get(), 1);
        assert_eq!(resolver.registry().tag_refs.get(), 0);
    }

    #[test]
    fn missing_tag_list_falls_through_to_branch() {
        let mut registry = MockRegistry::new();
        registry.tags = Err(LookupError::NotFound {
            what: "tags".to_owned(),
        });
        registry.branch = Ok(CommitSha::from(SHA_E));
        let mut resolver = ActionResolver::new(registry);

        let sha = resolver.resolve(&key("owner/tool", "v1")).unwrap();
        assert_eq!(sha.as_str(), SHA_E);
    }

    #[test]
    fn transport_failure_on_tag_list_is_not_masked() {
        let mut registry = MockRegistry::new();
        registry.tags = Err(LookupError::Transport {
            reason: "timed out".to_owned(),
        });
        registry.branch = Ok(CommitSha::from(SHA_E));
        let mut resolver = ActionResolver::new(registry);

        let err = resolver.resolve(&key("owner/tool", "v1")).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::Unresolved {
                source: LookupError::Transport { .. },
                ..
            }
        ));
        assert_eq!(resolver.registry().branches.get(), 0);
    }

    #[test]
    fn branch_name_skips_tag_list() {
        let mut registry = MockRegistry::new();
        registry.branch = Ok(CommitSha::from(SHA_A));
        let mut resolver = ActionResolver::new(registry);

        let sha = resolver.resolve(&key("owner/tool", "main")).unwrap();
        assert_eq!(sha.as_str(), SHA_A);
        assert_eq!(resolver.registry().tag_lists.get(), 0);
    }

    #[test]
    fn non_version_tag_resolves_through_tag_ref() {
        let mut registry = MockRegistry::new();
        registry.tag_ref = Ok(CommitSha::from(SHA_B));
        let mut resolver = ActionResolver::new(registry);

        let sha = resolver.resolve(&key("owner/tool", "latest")).unwrap();
        assert_eq!(sha.as_str(), SHA_B);
        assert_eq!(resolver.registry().tag_refs.get(), 1);
    }

    #[test]
    fn unresolved_reports_reference_and_cause() {
        let mut resolver = ActionResolver::new(MockRegistry::new());

        let err = resolver.resolve(&key("owner/tool", "v9")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to resolve owner/tool@v9: tag or branch v9 in owner/tool not found"
        );
    }

    #[test]
    fn outcomes_are_cached_per_key() {
        let mut registry = MockRegistry::new();
        registry.branch = Ok(CommitSha::from(SHA_A));
        let mut resolver = ActionResolver::new(registry);

        let main = key("owner/tool", "main");
        let missing = key("owner/tool", "v7");
        let resolutions = resolver.resolve_all([&main, &missing, &main, &missing]);

        assert_eq!(resolutions.len(), 2);
        assert_eq!(resolutions.resolved_count(), 1);
        assert_eq!(resolutions.sha_for(&main).map(CommitSha::as_str), Some(SHA_A));
        assert!(resolutions.error_for(&missing).is_some());
        // main: one branch lookup; v7: one tag list + one branch lookup
        assert_eq!(resolver.registry().branches.get(), 2);
        assert_eq!(resolver.registry().tag_lists.get(), 1);
    }

    #[test]
    fn invalid_sha_from_registry_is_rejected() {
        let mut registry = MockRegistry::new();
        registry.branch = Ok(CommitSha::from("not-a-sha"));
        let mut resolver = ActionResolver::new(registry);

        assert!(resolver.resolve(&key("owner/tool", "main")).is_err());
    }
}
