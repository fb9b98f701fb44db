use regex::{Captures, Regex};
use thiserror::Error;

use super::{CommitSha, ParsedWorkflow, ResolutionKey};

/// Reasons a rewritten workflow is rejected
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("{reference}: expected {expected} `uses:` occurrence(s), found {found}")]
    OccurrenceMismatch {
        reference: String,
        expected: usize,
        found: usize,
    },

    #[error("rewritten workflow is not valid YAML")]
    Reparse(#[source] Box<serde_saphyr::Error>),

    #[error("rewritten workflow no longer has the same jobs, steps and actions")]
    StructureChanged,

    #[error("invalid regex pattern")]
    Regex(#[from] regex::Error),
}

/// A resolved reference to substitute into a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    pub key: ResolutionKey,
    pub sha: CommitSha,
}

impl Pin {
    #[must_use]
    pub fn new(key: ResolutionKey, sha: CommitSha) -> Self {
        Self { key, sha }
    }

    /// The `uses:` value being replaced.
    #[must_use]
    pub fn original(&self) -> String {
        self.key.to_string()
    }

    /// The `uses:` value after pinning.
    #[must_use]
    pub fn pinned(&self) -> String {
        format!("{}@{}", self.key.path, self.sha)
    }
}

/// Validated result of rewriting one workflow's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub content: String,
    /// Number of `uses:` lines changed
    pub replaced: usize,
}

impl Rewrite {
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.replaced == 0
    }
}

/// Substitute every pin into `content`, then re-parse to validate.
///
/// Only values directly after a `uses:` key are touched; comments, quoting
/// and all other text stay byte-for-byte. With `annotate`, a changed
/// block-style line without a trailing comment gets `# <original ref>`
/// appended; flow-style values are never annotated.
///
/// # Errors
///
/// Returns [`RewriteError`] when the anchored matches disagree with the
/// parsed steps, or when the new text does not parse back into the same
/// jobs and steps with exactly the intended `uses:` values.
pub fn rewrite(
    content: &str,
    original: &ParsedWorkflow,
    pins: &[Pin],
    annotate: bool,
) -> Result<Rewrite, RewriteError> {
    let mut updated = content.to_owned();
    let mut replaced = 0_usize;

    for pin in pins {
        let raw = pin.original();
        let re = uses_pattern(&raw)?;

        let expected = original.count_uses(&raw);
        let found = re.find_iter(&updated).count();
        if found != expected {
            return Err(RewriteError::OccurrenceMismatch {
                reference: raw,
                expected,
                found,
            });
        }

        let pinned = pin.pinned();
        let git_ref = pin.key.git_ref.as_str();
        updated = re
            .replace_all(&updated, |caps: &Captures| {
                let tail = caps.name("tail").map_or("", |m| m.as_str());
                let mut line = format!("{}{}{pinned}{tail}", &caps["lead"], &caps["open"]);
                if annotate && caps.name("flow").is_none() && !tail.contains('#') {
                    line.push_str(" # ");
                    line.push_str(git_ref);
                }
                line
            })
            .into_owned();
        replaced = replaced.saturating_add(found);
    }

    validate(original, &updated, pins)?;

    Ok(Rewrite {
        content: updated,
        replaced,
    })
}

/// Anchored `uses:` value for one exact reference, optionally quoted.
///
/// The key sits at the start of a line (after an optional `- `) or right
/// after `{` or `,` inside a flow mapping. The value is followed by the end
/// of the line (whitespace and a comment allowed) or, in flow style, by `,`
/// or `}`.
fn uses_pattern(raw: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(raw);
    Regex::new(&format!(
        r#"(?mR)(?P<lead>(?:^[ \t]*(?:-[ \t]+)?|[{{,][ \t]*)uses:[ \t]+)(?P<open>["']?){escaped}(?P<tail>["']?(?:[ \t]*(?:#.*)?$|(?P<flow>[ \t]*[,}}])))"#
    ))
}

/// Re-parse the rewritten text and compare it with the original structure
/// after applying the intended substitutions.
fn validate(original: &ParsedWorkflow, updated: &str, pins: &[Pin]) -> Result<(), RewriteError> {
    let reparsed =
        ParsedWorkflow::parse(updated).map_err(|e| RewriteError::Reparse(Box::new(e)))?;

    let mut expected = original.clone();
    for job in &mut expected.jobs {
        for uses in job.uses.iter_mut().flatten() {
            if let Some(pin) = pins.iter().find(|p| p.original() == *uses) {
                *uses = pin.pinned();
            }
        }
    }

    if reparsed == expected {
        Ok(())
    } else {
        Err(RewriteError::StructureChanged)
    }
}
