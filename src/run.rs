//! Orchestrates `cllama run` end to end.
//!
//! The run workflow resolves the model in the catalog, builds or reuses its
//! artifact, asks the operator for a provider and an instance type matching
//! the service's GPU requirement, prepares the ingress security group, and
//! launches one instance that serves the model on first boot.

use thiserror::Error;
use tracing::info;

use crate::artifact::{
    ArtifactHandle, ArtifactPipeline, ArtifactTag, BuildRequest, BuildTool, PipelineError,
    ServiceConfig, SourceControl,
};
use crate::catalog::{self, CatalogError};
use crate::cloud::{CloudControlPlane, CloudError, LaunchResult};
use crate::matcher::{self, MatchError, MatchLevel};
use crate::provision::{self, ProvisionError, Provisioner};
use crate::reference::{ReferenceError, SourceReference};
use crate::select::{Choice, SelectError, Selector};

/// Provider this tool can provision on.
pub const SUPPORTED_PROVIDER: &str = "aws";

const PROVIDER_PROMPT: &str = "Select a cloud provider";
const INSTANCE_PROMPT: &str = "Select an instance type";

/// Providers offered in the prompt as `(label, value)`.
const PROVIDERS: [(&str, &str); 3] = [
    (SUPPORTED_PROVIDER, SUPPORTED_PROVIDER),
    ("gcp (not supported)", "gcp"),
    ("azure (not supported)", "azure"),
];

/// Arguments of a single run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunRequest {
    /// Catalog model name.
    pub model: String,
    /// Catalog tag, or `latest`.
    pub tag: String,
    /// Discard the cached clone before building.
    pub force_rebuild: bool,
}

/// Settings applied to every run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunSettings {
    /// Name of the shared ingress security group.
    pub security_group_name: String,
    /// Port the service listens on.
    pub service_port: u16,
}

/// What a successful run produced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunOutcome {
    /// Artifact that was served.
    pub artifact: ArtifactHandle,
    /// Instance type picked by the operator.
    pub instance_type: String,
    /// Security group attached to the instance.
    pub security_group_id: String,
    /// Provider response to the launch.
    pub launch: LaunchResult,
}

/// Errors surfaced while performing a run.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RunError {
    /// Raised when the model or tag is not in the catalog.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Raised when the catalog's source reference is malformed.
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    /// Raised when the artifact cannot be built or found.
    #[error("artifact pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),
    /// Raised when the artifact has no service.
    #[error("artifact {tag} declares no service")]
    NoServices {
        /// Artifact tag.
        tag: String,
    },
    /// Raised when the artifact packages more than one service.
    #[error("artifact {tag} declares {count} services; only one is supported")]
    MultipleServices {
        /// Artifact tag.
        tag: String,
        /// Number of services found.
        count: usize,
    },
    /// Raised when the service has no resources section.
    #[error("service config is missing resources")]
    ServiceConfigMissing,
    /// Raised when the service does not request a GPU.
    #[error("the service must declare a GPU requirement")]
    GpuRequired,
    /// Raised when an interactive prompt fails or is cancelled.
    #[error(transparent)]
    Selection(#[from] SelectError),
    /// Raised when the operator picks a provider other than AWS.
    #[error("cloud provider `{provider}` is not supported")]
    UnsupportedProvider {
        /// Picked provider.
        provider: String,
    },
    /// Raised when the instance catalog cannot be read.
    #[error("failed to list instance types: {0}")]
    InstanceCatalog(#[source] CloudError),
    /// Raised when no instance type fits the service.
    #[error(transparent)]
    Match(#[from] MatchError),
    /// Raised when the security group or launch fails.
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

/// Executes the run flow using the provided collaborators.
#[derive(Debug)]
pub struct RunOrchestrator<B, S, C, P> {
    pipeline: ArtifactPipeline<B, S>,
    provisioner: Provisioner<C>,
    selector: P,
    settings: RunSettings,
}

impl<B, S, C, P> RunOrchestrator<B, S, C, P>
where
    B: BuildTool,
    S: SourceControl,
    C: CloudControlPlane,
    P: Selector,
{
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(
        pipeline: ArtifactPipeline<B, S>,
        provisioner: Provisioner<C>,
        selector: P,
        settings: RunSettings,
    ) -> Self {
        Self {
            pipeline,
            provisioner,
            selector,
            settings,
        }
    }

    /// Builds or reuses the model's artifact and launches an instance for it.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when any step fails; nothing is retried.
    pub fn execute(&self, request: &RunRequest) -> Result<RunOutcome, RunError> {
        let entry = catalog::resolve(&request.model, &request.tag)?;
        let reference = SourceReference::parse(&entry.source)?;
        let artifact = self.pipeline.resolve(&BuildRequest {
            tag: ArtifactTag::new(&entry.model, &entry.tag),
            reference: reference.clone(),
            force_rebuild: request.force_rebuild,
        })?;
        let service = single_service(&artifact)?;

        self.choose_provider()?;
        let instance_catalog = self
            .provisioner
            .cloud()
            .describe_instance_types()
            .map_err(RunError::InstanceCatalog)?;

        let requirement = service
            .resources
            .as_ref()
            .ok_or(RunError::ServiceConfigMissing)?
            .requirement()
            .ok_or(RunError::GpuRequired)?;
        let candidates = matcher::filter(&instance_catalog, &requirement, MatchLevel::Exact)?;
        let choices: Vec<Choice> = candidates
            .iter()
            .map(|candidate| Choice::new(matcher::instance_card(candidate), &candidate.type_name))
            .collect();
        let instance_type = self.selector.select(INSTANCE_PROMPT, &choices)?;
        info!(%instance_type, "instance type selected");

        let policy = self
            .provisioner
            .ensure_ingress_policy(&self.settings.security_group_name)?;
        let script = provision::build_bootstrap_script(&reference, self.settings.service_port);
        let launch = self.provisioner.launch(&instance_type, &policy, &script)?;

        Ok(RunOutcome {
            artifact,
            instance_type,
            security_group_id: policy.id,
            launch,
        })
    }

    fn choose_provider(&self) -> Result<(), RunError> {
        let choices = PROVIDERS.map(|(label, value)| Choice::new(label, value));
        let provider = self.selector.select(PROVIDER_PROMPT, &choices)?;
        if provider == SUPPORTED_PROVIDER {
            return Ok(());
        }
        Err(RunError::UnsupportedProvider { provider })
    }
}

fn single_service(artifact: &ArtifactHandle) -> Result<&ServiceConfig, RunError> {
    match artifact.services.as_slice() {
        [service] => Ok(service),
        [] => Err(RunError::NoServices {
            tag: artifact.tag().to_string(),
        }),
        services => Err(RunError::MultipleServices {
            tag: artifact.tag().to_string(),
            count: services.len(),
        }),
    }
}
