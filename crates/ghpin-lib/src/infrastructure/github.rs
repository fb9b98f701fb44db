use log::debug;
use reqwest::{StatusCode, Url};
use reqwest::blocking::Response;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::error::Error as _;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{ActionRegistry, CommitSha, LookupError, RepoSlug, TagEntry};

const GITHUB_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "ghpin-cli";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const TAGS_PER_PAGE: u32 = 100;

/// Errors that can occur when interacting with the Github API
#[derive(Debug, Error)]
pub enum GithubError {
    #[error("failed to create HTTP client")]
    ClientInit(#[source] reqwest::Error),

    #[error("invalid API URL: {reason}")]
    InvalidUrl { reason: String },

    #[error("failed to fetch {operation} from {url}")]
    Request {
        operation: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Github API returned status {status} for {url}")]
    ApiStatus { status: StatusCode, url: String },

    #[error("failed to parse response from {url}")]
    ParseResponse {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl GithubError {
    /// Map to the domain's lookup error: a 404 is a definitive not-found,
    /// everything else is a transport failure.
    fn into_lookup(self, what: impl FnOnce() -> String) -> LookupError {
        match self {
            GithubError::ApiStatus { status, .. } if status == StatusCode::NOT_FOUND => {
                LookupError::NotFound { what: what() }
            }
            other @ (GithubError::ClientInit(_)
            | GithubError::InvalidUrl { .. }
            | GithubError::Request { .. }
            | GithubError::ApiStatus { .. }
            | GithubError::ParseResponse { .. }) => {
                let reason = match other.source() {
                    Some(source) => format!("{other}: {source}"),
                    None => other.to_string(),
                };
                LookupError::Transport { reason }
            }
        }
    }
}

/// Tag entry returned by the tags API
#[derive(Debug, Deserialize)]
struct TagResponse {
    name: String,
    commit: CommitObject,
}

/// Branch returned by the branches API
#[derive(Debug, Deserialize)]
struct BranchResponse {
    commit: CommitObject,
}

#[derive(Debug, Deserialize)]
struct CommitObject {
    sha: String,
}

/// Git ref (or annotated tag object) returned by the git database API
#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

pub struct GithubRegistry {
    client: reqwest::blocking::Client,
    token: Option<String>,
}

impl GithubRegistry {
    /// Create a new Github client. Without a token requests are anonymous
    /// and subject to lower rate limits.
    ///
    /// # Errors
    ///
    /// Returns `GithubError::ClientInit` if the HTTP client cannot be initialized.
    ///
    /// # Panics
    ///
    /// This method panics if called from within an async runtime. See docs on
    /// [`reqwest::blocking`] for details.
    pub fn new(token: Option<String>) -> Result<Self, GithubError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(GithubError::ClientInit)?;

        Ok(Self { client, token })
    }

    fn get(&self, operation: &'static str, url: &str) -> Result<Response, GithubError> {
        debug!("GET {url}");
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().map_err(|source| GithubError::Request {
            operation,
            url: url.to_owned(),
            source,
        })?;

        if !response.status().is_success() {
            return Err(GithubError::ApiStatus {
                status: response.status(),
                url: url.to_owned(),
            });
        }

        Ok(response)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
    ) -> Result<T, GithubError> {
        self.get(operation, url)?
            .json()
            .map_err(|source| GithubError::ParseResponse {
                url: url.to_owned(),
                source,
            })
    }

    /// Fetch the tags of a repository, following the `Link` header for
    /// pagination. The API's order is preserved.
    ///
    /// With `until`, paging stops after the page that contains a tag with
    /// exactly that name.
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails or a page cannot be parsed.
    pub fn get_tags(
        &self,
        repo: &RepoSlug,
        until: Option<&str>,
    ) -> Result<Vec<TagEntry>, GithubError> {
        let mut url = repo_url(repo, ["tags"])?;
        url.set_query(Some(&format!("per_page={TAGS_PER_PAGE}")));

        collect_tag_pages(url.into(), until, |url| self.get_tag_page(url))
    }

    fn get_tag_page(&self, url: &str) -> Result<(Vec<TagEntry>, Option<String>), GithubError> {
        let response = self.get("tags", url)?;
        let next_url = parse_next_link(response.headers());

        let page: Vec<TagResponse> =
            response
                .json()
                .map_err(|source| GithubError::ParseResponse {
                    url: url.to_owned(),
                    source,
                })?;

        let tags = page
            .into_iter()
            .map(|t| TagEntry::new(t.name, CommitSha::from(t.commit.sha)))
            .collect();
        Ok((tags, next_url))
    }

    /// Fetch the commit at the head of a branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    pub fn get_branch_head(&self, repo: &RepoSlug, branch: &str) -> Result<String, GithubError> {
        let url = repo_url(repo, ["branches"].into_iter().chain(branch.split('/')))?;
        let branch: BranchResponse = self.get_json("branch", url.as_str())?;
        Ok(branch.commit.sha)
    }

    /// Fetch the commit a tag points to, dereferencing annotated tags.
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails or a response cannot be parsed.
    pub fn get_tag_commit(&self, repo: &RepoSlug, tag: &str) -> Result<String, GithubError> {
        let url = repo_url(repo, ["git", "ref", "tags"].into_iter().chain(tag.split('/')))?;
        let git_ref: GitRef = self.get_json("tag ref", url.as_str())?;

        if git_ref.object.kind == "tag" {
            let url = repo_url(repo, ["git", "tags", git_ref.object.sha.as_str()])?;
            let annotated: GitRef = self.get_json("annotated tag", url.as_str())?;
            return Ok(annotated.object.sha);
        }

        Ok(git_ref.object.sha)
    }
}

/// API URL under `/repos/{owner}/{repo}/`, each segment percent-encoded.
///
/// Git ref names may contain `#`, `%` or `?`; `/` inside a ref is kept as
/// a path separator by passing the ref split on `/`.
fn repo_url<'s>(
    repo: &RepoSlug,
    segments: impl IntoIterator<Item = &'s str>,
) -> Result<Url, GithubError> {
    let mut url = Url::parse(GITHUB_API_BASE).map_err(|e| GithubError::InvalidUrl {
        reason: e.to_string(),
    })?;
    url.path_segments_mut()
        .map_err(|()| GithubError::InvalidUrl {
            reason: format!("{GITHUB_API_BASE} cannot be a base URL"),
        })?
        .pop_if_empty()
        .extend(["repos", repo.owner.as_str(), repo.name.as_str()])
        .extend(segments);
    Ok(url)
}

/// Walk tag pages from `first_url`, stopping early once a page contains the
/// tag named `until`.
fn collect_tag_pages<F>(
    first_url: String,
    until: Option<&str>,
    mut fetch_page: F,
) -> Result<Vec<TagEntry>, GithubError>
where
    F: FnMut(&str) -> Result<(Vec<TagEntry>, Option<String>), GithubError>,
{
    let mut tags = Vec::new();
    let mut next = Some(first_url);

    while let Some(url) = next {
        let (page, next_url) = fetch_page(&url)?;
        let found = until.filter(|name| page.iter().any(|t| t.name == *name));
        tags.extend(page);
        if let Some(name) = found {
            debug!("Found tag {name} after {} tag(s), skipping later pages", tags.len());
            break;
        }
        next = next_url;
    }

    Ok(tags)
}

/// Parse the `Link` header to find the `rel="next"` URL for pagination.
fn parse_next_link(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let link_header = headers.get("link")?.to_str().ok()?;
    for part in link_header.split(',') {
        let part = part.trim();
        if part.ends_with("rel=\"next\"") {
            // Extract URL between < and >
            let start = part.find('<')?.checked_add(1)?;
            let end = part.find('>')?;
            return part.get(start..end).map(str::to_owned);
        }
    }
    None
}

impl ActionRegistry for GithubRegistry {
    fn list_tags(&self, repo: &RepoSlug, until: &str) -> Result<Vec<TagEntry>, LookupError> {
        self.get_tags(repo, Some(until))
            .map_err(|e| e.into_lookup(|| format!("repository {repo}")))
    }

    fn branch_head(&self, repo: &RepoSlug, branch: &str) -> Result<CommitSha, LookupError> {
        self.get_branch_head(repo, branch)
            .map(CommitSha::from)
            .map_err(|e| e.into_lookup(|| format!("branch {branch} in {repo}")))
    }

    fn tag_ref(&self, repo: &RepoSlug, tag: &str) -> Result<CommitSha, LookupError> {
        self.get_tag_commit(repo, tag)
            .map(CommitSha::from)
            .map_err(|e| e.into_lookup(|| format!("tag {tag} in {repo}")))
    }
}
