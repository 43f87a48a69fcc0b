//! Source package references.
//!
//! A model is published as a reference of the form
//! `git+<repo>@<branch>#subdirectory=<subdir>`. This module parses that string
//! without a regular expression so each way it can be malformed is reported
//! as its own [`MalformedKind`], and derives the on-disk location used to cache
//! the clone.

use std::fmt;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use thiserror::Error;
use url::Url;

const SCHEME_PREFIX: &str = "git+";
const BRANCH_SEPARATOR: char = '@';
const SUBDIRECTORY_MARKER: &str = "#subdirectory=";

/// A parsed source package reference.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceReference {
    repository_url: String,
    branch: String,
    subdirectory: String,
    storage_segments: Vec<String>,
}

/// The specific way a reference string failed to parse.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MalformedKind {
    /// The string does not start with `git+`.
    MissingPrefix,
    /// No `@` separates the repository from the branch.
    MissingBranchSeparator,
    /// Nothing between `git+` and `@`.
    EmptyRepository,
    /// No `#subdirectory=` marker follows the branch.
    MissingSubdirectory,
    /// Nothing between `@` and `#subdirectory=`.
    EmptyBranch,
    /// Nothing after `#subdirectory=`.
    EmptySubdirectory,
    /// The string contains a control character such as a newline.
    ControlCharacter,
    /// The repository is not a valid URL.
    InvalidUrl,
    /// The repository URL has no host component.
    MissingHost,
    /// The subdirectory is absolute or climbs out of the checkout.
    UnsafeSubdirectory,
}

impl fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingPrefix => "expected the reference to start with `git+`",
            Self::MissingBranchSeparator => "missing `@` before the branch",
            Self::EmptyRepository => "repository is empty",
            Self::MissingSubdirectory => "missing `#subdirectory=` after the branch",
            Self::EmptyBranch => "branch is empty",
            Self::EmptySubdirectory => "subdirectory is empty",
            Self::ControlCharacter => "reference contains control characters",
            Self::InvalidUrl => "repository is not a valid URL",
            Self::MissingHost => "repository URL has no host",
            Self::UnsafeSubdirectory => "subdirectory must be relative and stay inside the checkout",
        };
        f.write_str(text)
    }
}

/// Errors raised while resolving references.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ReferenceError {
    /// The reference does not follow `git+<repo>@<branch>#subdirectory=<subdir>`.
    #[error("malformed source reference `{input}`: {kind}")]
    Malformed {
        /// The string that failed to parse.
        input: String,
        /// What was wrong with it.
        kind: MalformedKind,
    },
}

impl ReferenceError {
    /// Returns the failure kind.
    #[must_use]
    pub const fn kind(&self) -> MalformedKind {
        match self {
            Self::Malformed { kind, .. } => *kind,
        }
    }
}

impl SourceReference {
    /// Parses a `git+<repo>@<branch>#subdirectory=<subdir>` reference.
    ///
    /// The repository runs to the first `@`, the branch to the first
    /// `#subdirectory=` after it, and the subdirectory takes the remainder.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Malformed`] when any part of the grammar is
    /// not satisfied.
    pub fn parse(input: &str) -> Result<Self, ReferenceError> {
        let fail = |kind| ReferenceError::Malformed {
            input: input.to_owned(),
            kind,
        };

        if input.chars().any(char::is_control) {
            return Err(fail(MalformedKind::ControlCharacter));
        }
        let rest = input
            .strip_prefix(SCHEME_PREFIX)
            .ok_or_else(|| fail(MalformedKind::MissingPrefix))?;
        let (repository, after_repo) = rest
            .split_once(BRANCH_SEPARATOR)
            .ok_or_else(|| fail(MalformedKind::MissingBranchSeparator))?;
        if repository.is_empty() {
            return Err(fail(MalformedKind::EmptyRepository));
        }
        let (branch, subdirectory) = after_repo
            .split_once(SUBDIRECTORY_MARKER)
            .ok_or_else(|| fail(MalformedKind::MissingSubdirectory))?;
        if branch.is_empty() {
            return Err(fail(MalformedKind::EmptyBranch));
        }
        if subdirectory.is_empty() {
            return Err(fail(MalformedKind::EmptySubdirectory));
        }
        if !is_contained_subdirectory(subdirectory) {
            return Err(fail(MalformedKind::UnsafeSubdirectory));
        }

        let storage_segments = storage_segments(repository).map_err(fail)?;

        Ok(Self {
            repository_url: repository.to_owned(),
            branch: branch.to_owned(),
            subdirectory: subdirectory.to_owned(),
            storage_segments,
        })
    }

    /// Repository URL passed to `git clone`.
    #[must_use]
    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    /// Branch to clone.
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Project directory inside the repository.
    #[must_use]
    pub fn subdirectory(&self) -> &str {
        &self.subdirectory
    }

    /// Host and path components of the repository URL, in order.
    ///
    /// Empty path components are dropped, so `https://h/org/repo/` and
    /// `https://h/org/repo` name the same repository and share one clone.
    /// Any other spelling difference (`repo.git`, letter case) yields a
    /// separate clone.
    #[must_use]
    pub fn storage_segments(&self) -> &[String] {
        &self.storage_segments
    }

    /// Directory containing the buildable project: the clone location joined
    /// with the subdirectory.
    #[must_use]
    pub fn project_dir(&self, base: &Utf8Path) -> Utf8PathBuf {
        storage_path(base, self).join(&self.subdirectory)
    }
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SCHEME_PREFIX}{}{BRANCH_SEPARATOR}{}{SUBDIRECTORY_MARKER}{}",
            self.repository_url, self.branch, self.subdirectory
        )
    }
}

/// Location of the cached clone for `reference` under `base`.
#[must_use]
pub fn storage_path(base: &Utf8Path, reference: &SourceReference) -> Utf8PathBuf {
    let mut path = base.to_path_buf();
    for segment in &reference.storage_segments {
        path.push(segment);
    }
    path
}

fn storage_segments(repository: &str) -> Result<Vec<String>, MalformedKind> {
    let url = Url::parse(repository).map_err(|_| MalformedKind::InvalidUrl)?;
    let host = url.host_str().ok_or(MalformedKind::MissingHost)?;
    let authority = url
        .port()
        .map_or_else(|| host.to_owned(), |port| format!("{host}:{port}"));

    let mut segments = vec![authority];
    if let Some(parts) = url.path_segments() {
        segments.extend(
            parts
                .filter(|part| !part.is_empty())
                .map(ToOwned::to_owned),
        );
    }
    Ok(segments)
}

fn is_contained_subdirectory(subdirectory: &str) -> bool {
    let path = Utf8Path::new(subdirectory);
    path.is_relative()
        && path.components().all(|component| {
            matches!(component, Utf8Component::Normal(_) | Utf8Component::CurDir)
        })
}
