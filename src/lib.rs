//! Core library for the cllama model launcher.
//!
//! The crate resolves a catalog model to a BentoML artifact (building it from
//! its git source when the local store lacks it), matches the service's GPU
//! requirement against the AWS instance catalog, and launches an instance
//! that serves the model on first boot.

pub mod artifact;
pub mod aws;
pub mod catalog;
pub mod cloud;
pub mod command;
pub mod config;
pub mod gpu;
pub mod matcher;
pub mod provision;
pub mod reference;
pub mod run;
pub mod select;
pub mod test_support;
pub mod workspace;

pub use artifact::{
    ArtifactHandle, ArtifactPipeline, ArtifactQuery, ArtifactTag, BentoCli, BuildRequest,
    BuildTool, GitCli, PipelineError, ServiceConfig, ServiceResources, SourceControl,
};
pub use aws::AwsCli;
pub use catalog::{CatalogEntry, CatalogError};
pub use cloud::{
    CloudControlPlane, CloudError, IngressRule, LaunchRequest, LaunchResult, SecurityPolicyHandle,
};
pub use command::{CommandError, CommandOutput, CommandRunner, CommandSpec, ProcessCommandRunner};
pub use config::{CllamaConfig, ConfigError, StoragePaths};
pub use matcher::{
    GpuSpec, InstanceTypeDescriptor, MatchError, MatchLevel, ResourceRequirement,
};
pub use provision::{LaunchSettings, ProvisionError, Provisioner};
pub use reference::{MalformedKind, ReferenceError, SourceReference};
pub use run::{RunError, RunOrchestrator, RunOutcome, RunRequest, RunSettings};
pub use select::{Choice, SelectError, Selector, TerminalSelector};
