//! AWS control plane driven through the `aws` CLI.
//!
//! Every request is issued as `aws ec2 <operation> ... --output json` and the
//! JSON response is decoded into the crate's provider-neutral types. Adding a
//! security-group rule that already exists is reported by AWS as
//! `InvalidPermission.Duplicate`; that response is treated as success so
//! repeated provisioning converges on the same group.

mod types;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cloud::{
    CloudControlPlane, CloudError, IngressRule, LaunchRequest, LaunchResult, SecurityPolicyHandle,
};
use crate::command::{CommandOutput, CommandRunner, CommandSpec, ProcessCommandRunner};
use crate::matcher::InstanceTypeDescriptor;

use self::types::{InstanceTypesPage, Reservation, SecurityGroupEntry, SecurityGroupsPage};

/// Default AWS CLI binary name.
pub const DEFAULT_AWS_BIN: &str = "aws";

const DUPLICATE_RULE_CODE: &str = "InvalidPermission.Duplicate";

/// Cloud control plane backed by the `aws` CLI.
#[derive(Clone, Debug)]
pub struct AwsCli<R: CommandRunner> {
    runner: R,
    program: String,
    region: Option<String>,
}

impl AwsCli<ProcessCommandRunner> {
    /// Creates an adapter wired to the real process runner.
    #[must_use]
    pub fn with_process_runner(program: impl Into<String>, region: Option<String>) -> Self {
        Self::new(ProcessCommandRunner, program, region)
    }
}

impl<R: CommandRunner> AwsCli<R> {
    /// Creates an adapter. `region` overrides the CLI profile's region.
    #[must_use]
    pub fn new(runner: R, program: impl Into<String>, region: Option<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            region,
        }
    }

    fn ec2(&self, operation: &str) -> CommandSpec {
        let region_args = self
            .region
            .iter()
            .flat_map(|region| ["--region", region.as_str()]);
        CommandSpec::new(&self.program)
            .args(["ec2", operation])
            .args(region_args)
    }

    fn run(&self, operation: &str, spec: &CommandSpec) -> Result<CommandOutput, CloudError> {
        let output = self.runner.run(spec)?;
        if output.is_success() {
            return Ok(output);
        }
        Err(CloudError::CommandFailure {
            program: self.program.clone(),
            operation: operation.to_owned(),
            status: output.code,
            status_text: output.status_text(),
            stderr: output.stderr.trim().to_owned(),
        })
    }

    fn run_json<T>(&self, operation: &str, resource: &str, spec: CommandSpec) -> Result<T, CloudError>
    where
        T: DeserializeOwned,
    {
        let output = self.run(operation, &spec.args(["--output", "json"]))?;
        serde_json::from_str::<T>(&output.stdout).map_err(|err| CloudError::Parse {
            resource: resource.to_owned(),
            message: err.to_string(),
        })
    }
}

impl<R: CommandRunner> CloudControlPlane for AwsCli<R> {
    fn describe_instance_types(&self) -> Result<Vec<InstanceTypeDescriptor>, CloudError> {
        let operation = "describe-instance-types";
        let page: InstanceTypesPage =
            self.run_json(operation, "instance types", self.ec2(operation))?;
        debug!(count = page.instance_types.len(), "fetched instance catalog");
        Ok(page
            .instance_types
            .into_iter()
            .map(InstanceTypeDescriptor::from)
            .collect())
    }

    fn find_security_group(
        &self,
        name: &str,
    ) -> Result<Option<SecurityPolicyHandle>, CloudError> {
        let operation = "describe-security-groups";
        let spec = self
            .ec2(operation)
            .arg("--filters")
            .arg(format!("Name=group-name,Values={name}"));
        let page: SecurityGroupsPage = self.run_json(operation, "security groups", spec)?;
        Ok(page
            .security_groups
            .into_iter()
            .next()
            .map(|group| SecurityPolicyHandle::new(group.group_id)))
    }

    fn create_security_group(
        &self,
        name: &str,
        description: &str,
    ) -> Result<SecurityPolicyHandle, CloudError> {
        let operation = "create-security-group";
        let spec = self
            .ec2(operation)
            .args(["--group-name", name, "--description", description]);
        let created: SecurityGroupEntry = self.run_json(operation, "security group", spec)?;
        Ok(SecurityPolicyHandle::new(created.group_id))
    }

    fn authorize_ingress(
        &self,
        group: &SecurityPolicyHandle,
        rule: &IngressRule,
    ) -> Result<(), CloudError> {
        let operation = "authorize-security-group-ingress";
        let spec = self
            .ec2(operation)
            .args(["--group-id", group.id.as_str(), "--protocol", rule.protocol])
            .args([String::from("--port"), rule.port.to_string()])
            .args(["--cidr", rule.cidr]);
        match self.run(operation, &spec) {
            Ok(_) => Ok(()),
            Err(CloudError::CommandFailure { ref stderr, .. })
                if stderr.contains(DUPLICATE_RULE_CODE) =>
            {
                debug!(group = %group.id, port = rule.port, "ingress rule already present");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn run_instances(&self, request: &LaunchRequest) -> Result<LaunchResult, CloudError> {
        let operation = "run-instances";
        let key_args = request
            .key_name
            .as_ref()
            .map(|key_name| vec![String::from("--key-name"), key_name.clone()])
            .unwrap_or_default();
        let spec = self
            .ec2(operation)
            .args(["--image-id", request.image_id.as_str()])
            .args(["--instance-type", request.instance_type.as_str()])
            .args(["--security-group-ids", request.security_group_id.as_str()])
            .arg("--user-data")
            .arg(format!("file://{}", request.user_data_path))
            .args(key_args)
            .args([String::from("--count"), request.count.to_string()]);

        let reservation: Reservation = self.run_json(operation, "reservation", spec)?;
        Ok(LaunchResult {
            reservation_id: reservation.reservation_id,
            instance_ids: reservation
                .instances
                .into_iter()
                .map(|instance| instance.instance_id)
                .collect(),
        })
    }
}
