//! Security-group setup, bootstrap script rendering, and instance launch.

use camino::{Utf8Path, Utf8PathBuf};
use shell_escape::unix::escape;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::cloud::{
    CloudControlPlane, CloudError, DEFAULT_INGRESS_RULES, LaunchRequest, LaunchResult,
    SecurityPolicyHandle,
};
use crate::reference::SourceReference;
use crate::workspace::{self, WorkspaceError};

/// Description attached to security groups created by this tool.
pub const SECURITY_GROUP_DESCRIPTION: &str = "Default VPC security group for cllama services";

/// Directory the repository is cloned into on the instance.
const REMOTE_CHECKOUT: &str = "bento_repo";

/// Path of the `bentoml` entry point after a user-level pip install.
const REMOTE_BENTOML_BIN: &str = "/home/ubuntu/.local/bin/bentoml";

/// Errors raised while provisioning.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when the security group cannot be found, created, or opened.
    #[error("failed to prepare security group {name}: {source}")]
    SecurityPolicy {
        /// Security group name.
        name: String,
        /// Provider failure.
        #[source]
        source: CloudError,
    },
    /// Raised when the launch request fails.
    #[error("failed to launch {instance_type}: {source}")]
    Launch {
        /// Requested instance type.
        instance_type: String,
        /// Provider failure.
        #[source]
        source: CloudError,
    },
    /// Raised when the bootstrap script cannot be written.
    #[error("failed to write bootstrap script: {0}")]
    Script(#[from] WorkspaceError),
}

/// Launch-time settings shared by every instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchSettings {
    /// Machine image identifier.
    pub image_id: String,
    /// Key pair for SSH access.
    pub key_name: Option<String>,
    /// Directory receiving rendered bootstrap scripts.
    pub cache_dir: Utf8PathBuf,
}

/// Drives the provisioning sequence against a cloud control plane.
#[derive(Clone, Debug)]
pub struct Provisioner<C> {
    cloud: C,
    settings: LaunchSettings,
}

impl<C: CloudControlPlane> Provisioner<C> {
    /// Creates a provisioner.
    #[must_use]
    pub const fn new(cloud: C, settings: LaunchSettings) -> Self {
        Self { cloud, settings }
    }

    /// Underlying control plane.
    #[must_use]
    pub const fn cloud(&self) -> &C {
        &self.cloud
    }

    /// Returns the security group named `stable_name`, creating it when it
    /// does not exist yet, and makes sure HTTP, HTTPS, and SSH are open.
    ///
    /// Rules are applied to a found group as well, so a group left half
    /// configured by an earlier failure is completed; rules already present
    /// are reported as duplicates and accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::SecurityPolicy`] when any cloud call fails.
    pub fn ensure_ingress_policy(
        &self,
        stable_name: &str,
    ) -> Result<SecurityPolicyHandle, ProvisionError> {
        let failed = |source: CloudError| ProvisionError::SecurityPolicy {
            name: stable_name.to_owned(),
            source,
        };

        let found = self.cloud.find_security_group(stable_name).map_err(failed)?;
        let group = found
            .map_or_else(
                || self.create_group(stable_name),
                |existing| {
                    info!(group = %existing.id, name = stable_name, "reusing security group");
                    Ok(existing)
                },
            )
            .map_err(failed)?;

        for rule in &DEFAULT_INGRESS_RULES {
            self.cloud.authorize_ingress(&group, rule).map_err(failed)?;
        }
        Ok(group)
    }

    fn create_group(&self, stable_name: &str) -> Result<SecurityPolicyHandle, CloudError> {
        let created = self
            .cloud
            .create_security_group(stable_name, SECURITY_GROUP_DESCRIPTION)?;
        info!(group = %created.id, name = stable_name, "created security group");
        Ok(created)
    }

    /// Writes `script` to the cache directory and launches one instance.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Script`] when the script cannot be written
    /// and [`ProvisionError::Launch`] when the cloud rejects the request.
    pub fn launch(
        &self,
        instance_type: &str,
        policy: &SecurityPolicyHandle,
        script: &str,
    ) -> Result<LaunchResult, ProvisionError> {
        let script_path = self.persist_script(script)?;
        let request = LaunchRequest {
            instance_type: instance_type.to_owned(),
            image_id: self.settings.image_id.clone(),
            security_group_id: policy.id.clone(),
            user_data_path: script_path,
            key_name: self.settings.key_name.clone(),
            count: 1,
        };

        let launched = self
            .cloud
            .run_instances(&request)
            .map_err(|source| ProvisionError::Launch {
                instance_type: instance_type.to_owned(),
                source,
            })?;
        info!(
            instance_type,
            instances = ?launched.instance_ids,
            "launch requested"
        );
        Ok(launched)
    }

    fn persist_script(&self, script: &str) -> Result<Utf8PathBuf, WorkspaceError> {
        workspace::create_dir_all(&self.settings.cache_dir)?;
        let path = script_path(&self.settings.cache_dir, Uuid::new_v4());
        workspace::write_file(&path, script)?;
        Ok(path)
    }
}

/// Path of the bootstrap script for launch `id`: the first eight hex digits
/// of the id name the file.
#[must_use]
pub fn script_path(cache_dir: &Utf8Path, id: Uuid) -> Utf8PathBuf {
    let simple = id.simple().to_string();
    let short: String = simple.chars().take(8).collect();
    cache_dir.join(format!("init_script_{short}.sh"))
}

/// Renders the first-boot script that installs and serves the model.
#[must_use]
pub fn build_bootstrap_script(reference: &SourceReference, port: u16) -> String {
    let repository = escape(reference.repository_url().into());
    let branch = escape(reference.branch().into());
    let project = escape(format!("{REMOTE_CHECKOUT}/{}", reference.subdirectory()).into());
    let lines = [
        String::from("#!/bin/sh"),
        String::from("pip3 install bentoml"),
        format!("git clone --branch {branch} {repository} {REMOTE_CHECKOUT}"),
        format!("cd {project}"),
        String::from("pip3 install -r requirements.txt"),
        format!("{REMOTE_BENTOML_BIN} serve . --port {port}"),
    ];
    let mut script = lines.join("\n");
    script.push('\n');
    script
}
