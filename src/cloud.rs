//! Cloud control-plane abstraction.
//!
//! The provisioning workflow only needs five operations from a provider:
//! read the instance catalog, look up, create, and open a security group, and
//! launch an instance. [`CloudControlPlane`] captures exactly those so the
//! workflow can run against a scripted provider in tests.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::command::CommandError;
use crate::matcher::InstanceTypeDescriptor;

/// Identifies a security group (ingress policy) in the cloud account.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SecurityPolicyHandle {
    /// Provider identifier such as `sg-0123`.
    pub id: String,
}

impl SecurityPolicyHandle {
    /// Wraps a provider identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// One inbound rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IngressRule {
    /// IP protocol, for example `tcp`.
    pub protocol: &'static str,
    /// Destination port.
    pub port: u16,
    /// Source range in CIDR notation.
    pub cidr: &'static str,
}

/// Rules opened on the default security group: HTTP, HTTPS, and SSH from
/// anywhere.
pub const DEFAULT_INGRESS_RULES: [IngressRule; 3] = [
    IngressRule {
        protocol: "tcp",
        port: 80,
        cidr: "0.0.0.0/0",
    },
    IngressRule {
        protocol: "tcp",
        port: 443,
        cidr: "0.0.0.0/0",
    },
    IngressRule {
        protocol: "tcp",
        port: 22,
        cidr: "0.0.0.0/0",
    },
];

/// Parameters for launching one instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchRequest {
    /// Instance type such as `g4dn.xlarge`.
    pub instance_type: String,
    /// Machine image identifier.
    pub image_id: String,
    /// Security group applied to the instance.
    pub security_group_id: String,
    /// File holding the bootstrap script passed as user data.
    pub user_data_path: Utf8PathBuf,
    /// Key pair used for SSH access, if configured.
    pub key_name: Option<String>,
    /// Number of instances to start.
    pub count: u32,
}

/// Provider response to a launch.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LaunchResult {
    /// Reservation grouping the launched instances.
    pub reservation_id: Option<String>,
    /// Identifiers of the launched instances.
    pub instance_ids: Vec<String>,
}

/// Errors raised by cloud providers.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CloudError {
    /// Raised when the provider CLI exits with a non-zero status.
    #[error("{program} {operation} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Program that failed (typically `aws`).
        program: String,
        /// Operation being performed.
        operation: String,
        /// Exit status reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Raised when JSON output from the CLI cannot be parsed.
    #[error("failed to parse {resource} output: {message}")]
    Parse {
        /// Resource type being parsed (for example `instance types`).
        resource: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when command execution fails.
    #[error(transparent)]
    Runner(#[from] CommandError),
}

/// Operations the provisioning workflow needs from a provider.
pub trait CloudControlPlane {
    /// Lists every instance type available in the configured region.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError`] when the catalog cannot be retrieved or parsed.
    fn describe_instance_types(&self) -> Result<Vec<InstanceTypeDescriptor>, CloudError>;

    /// Looks up a security group by name.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError`] when the lookup fails.
    fn find_security_group(&self, name: &str)
    -> Result<Option<SecurityPolicyHandle>, CloudError>;

    /// Creates an empty security group.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError`] when creation fails.
    fn create_security_group(
        &self,
        name: &str,
        description: &str,
    ) -> Result<SecurityPolicyHandle, CloudError>;

    /// Adds an inbound rule. Adding a rule that already exists succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError`] when the rule cannot be added.
    fn authorize_ingress(
        &self,
        group: &SecurityPolicyHandle,
        rule: &IngressRule,
    ) -> Result<(), CloudError>;

    /// Launches instances.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError`] when the launch request is rejected.
    fn run_instances(&self, request: &LaunchRequest) -> Result<LaunchResult, CloudError>;
}
