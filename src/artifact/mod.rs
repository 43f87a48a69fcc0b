//! Build-or-reuse pipeline for servable artifacts.
//!
//! Resolving an artifact first asks the build tool whether `name:version`
//! already exists. Only when it does not is the source reference cloned into
//! the local repository cache and built. The freshly built artifact is then
//! looked up again under whatever tag the build tool assigned.
//!
//! The only cleanup the pipeline performs is removing a partially cloned
//! directory when `git clone` fails, so a later run never builds from a
//! half-populated checkout.

pub mod bentoml;
pub mod git;

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::matcher::ResourceRequirement;
use crate::reference::{SourceReference, storage_path};
use crate::workspace::{self, WorkspaceError};

pub use bentoml::BentoCli;
pub use git::GitCli;

/// `name:version` identity of an artifact.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ArtifactTag {
    /// Artifact name.
    pub name: String,
    /// Artifact version.
    pub version: String,
}

impl ArtifactTag {
    /// Creates a tag from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parses `name:version`. Both parts must be non-empty.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let (name, version) = text.trim().split_once(':')?;
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(name, version))
    }
}

impl fmt::Display for ArtifactTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

/// Resources declared by one service of an artifact.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServiceResources {
    /// Number of GPUs, when the service declares a GPU requirement.
    pub gpu: Option<u32>,
    /// GPU family such as `nvidia-tesla-t4`.
    pub gpu_type: Option<String>,
    /// Memory per GPU in MiB.
    pub gpu_memory_mib: Option<u64>,
}

impl ServiceResources {
    /// Returns the GPU requirement, or `None` when no GPU count is declared.
    #[must_use]
    pub fn requirement(&self) -> Option<ResourceRequirement> {
        self.gpu.map(|gpu_count| ResourceRequirement {
            gpu_count,
            gpu_memory_mib: self.gpu_memory_mib,
            gpu_family: self.gpu_type.clone(),
        })
    }
}

/// Configuration of one service packaged in an artifact.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServiceConfig {
    /// Service name, when reported.
    pub name: Option<String>,
    /// Declared resources, if any.
    pub resources: Option<ServiceResources>,
}

/// A built artifact as reported by the build tool.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArtifactHandle {
    /// Artifact name.
    pub name: String,
    /// Artifact version.
    pub version: String,
    /// Services packaged in the artifact, in declaration order.
    pub services: Vec<ServiceConfig>,
}

impl ArtifactHandle {
    /// Identity of this artifact.
    #[must_use]
    pub fn tag(&self) -> ArtifactTag {
        ArtifactTag::new(&self.name, &self.version)
    }
}

/// Outcome of asking the build tool for an artifact.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ArtifactQuery {
    /// The artifact exists.
    Found(ArtifactHandle),
    /// The build tool reported that the tag is unknown.
    NotFound,
    /// The query could not be answered (tool missing, unreadable output).
    TransientError(String),
}

/// Build tool collaborator.
pub trait BuildTool {
    /// Looks up metadata for `tag`.
    fn query(&self, tag: &ArtifactTag) -> ArtifactQuery;

    /// Builds the project in `project_dir` as `version`, returning the tag the
    /// tool assigned.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::BuildFailed`] when packaging fails.
    fn build(&self, project_dir: &Utf8Path, version: &str) -> Result<ArtifactTag, PipelineError>;
}

/// Source-control collaborator.
pub trait SourceControl {
    /// Clones `branch` of `repository` into `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CloneFailed`] when the clone does not complete.
    fn clone_branch(
        &self,
        repository: &str,
        branch: &str,
        destination: &Utf8Path,
    ) -> Result<(), PipelineError>;
}

/// Errors raised while resolving an artifact.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PipelineError {
    /// Raised when the artifact is still missing after a build.
    #[error("artifact {tag} not found")]
    ArtifactNotFound {
        /// Tag that could not be found.
        tag: String,
    },
    /// Raised when the build tool cannot answer a query.
    #[error("failed to query artifact {tag}: {message}")]
    QueryFailed {
        /// Tag being queried.
        tag: String,
        /// Description of the failure.
        message: String,
    },
    /// Raised when cloning the source repository fails.
    #[error("failed to clone {repository} (branch {branch}): {message}")]
    CloneFailed {
        /// Repository URL.
        repository: String,
        /// Requested branch.
        branch: String,
        /// Description of the failure.
        message: String,
    },
    /// Raised when the build step fails.
    #[error("failed to build {project_dir}: {message}")]
    BuildFailed {
        /// Directory that was built.
        project_dir: Utf8PathBuf,
        /// Description of the failure.
        message: String,
    },
    /// Raised when the local repository cache cannot be prepared.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

/// Inputs for a single artifact resolution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildRequest {
    /// Tag to look up first; its version is reused for a rebuild.
    pub tag: ArtifactTag,
    /// Where the source lives.
    pub reference: SourceReference,
    /// Discard any cached clone before building.
    pub force_rebuild: bool,
}

/// Resolves artifacts, building them from source when absent.
#[derive(Clone, Debug)]
pub struct ArtifactPipeline<B, S> {
    build_tool: B,
    source_control: S,
    repos_dir: Utf8PathBuf,
}

impl<B: BuildTool, S: SourceControl> ArtifactPipeline<B, S> {
    /// Creates a pipeline that caches clones under `repos_dir`.
    #[must_use]
    pub fn new(build_tool: B, source_control: S, repos_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            build_tool,
            source_control,
            repos_dir: repos_dir.into(),
        }
    }

    /// Root directory of the clone cache.
    #[must_use]
    pub fn repos_dir(&self) -> &Utf8Path {
        &self.repos_dir
    }

    /// Returns the artifact for `request`, building it when the build tool
    /// does not know the tag.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when querying, cloning, or building fails, or
    /// when the built artifact cannot be found afterwards.
    pub fn resolve(&self, request: &BuildRequest) -> Result<ArtifactHandle, PipelineError> {
        match self.build_tool.query(&request.tag) {
            ArtifactQuery::Found(handle) => {
                info!(tag = %request.tag, "reusing existing artifact");
                return Ok(handle);
            }
            ArtifactQuery::NotFound => {
                info!(tag = %request.tag, "artifact not found; building from source");
            }
            ArtifactQuery::TransientError(message) => {
                return Err(PipelineError::QueryFailed {
                    tag: request.tag.to_string(),
                    message,
                });
            }
        }

        let checkout = storage_path(&self.repos_dir, &request.reference);
        if request.force_rebuild {
            discard_checkout(&checkout);
        }
        self.ensure_checkout(&checkout, &request.reference)?;

        let project_dir = request.reference.project_dir(&self.repos_dir);
        let built = self.build_tool.build(&project_dir, &request.tag.version)?;
        info!(tag = %built, "build finished");

        match self.build_tool.query(&built) {
            ArtifactQuery::Found(handle) => Ok(handle),
            ArtifactQuery::NotFound => Err(PipelineError::ArtifactNotFound {
                tag: built.to_string(),
            }),
            ArtifactQuery::TransientError(message) => Err(PipelineError::QueryFailed {
                tag: built.to_string(),
                message,
            }),
        }
    }

    fn ensure_checkout(
        &self,
        checkout: &Utf8Path,
        reference: &SourceReference,
    ) -> Result<(), PipelineError> {
        if workspace::path_exists(checkout)? {
            debug!(path = %checkout, "reusing cached clone");
            return Ok(());
        }

        if let Some(parent) = checkout.parent() {
            workspace::create_dir_all(parent)?;
        }

        let cloned = self.source_control.clone_branch(
            reference.repository_url(),
            reference.branch(),
            checkout,
        );
        if cloned.is_err() {
            discard_checkout(checkout);
        }
        cloned
    }
}

fn discard_checkout(checkout: &Utf8Path) {
    match workspace::path_exists(checkout) {
        Ok(false) => {}
        Ok(true) | Err(_) => {
            if let Err(err) = workspace::remove_tree(checkout) {
                warn!(path = %checkout, error = %err, "failed to remove cached clone");
            }
        }
    }
}
