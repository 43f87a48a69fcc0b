//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::rc::Rc;

use camino::Utf8PathBuf;

use crate::command::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use crate::select::{Choice, SelectError, Selector};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Working directory override.
    pub current_dir: Option<Utf8PathBuf>,
    /// Extra environment variables, lossily converted to UTF-8.
    pub env: Vec<(String, String)>,
    /// Whether output was to be echoed while running.
    pub streamed: bool,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Returns the recorded invocations rendered as command strings.
    #[must_use]
    pub fn command_strings(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .map(CommandInvocation::command_string)
            .collect()
    }

    /// Pushes a successful exit status with empty output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: command.program().to_owned(),
            args: command.arguments().to_vec(),
            current_dir: command.working_dir().map(ToOwned::to_owned),
            env: command
                .environment()
                .iter()
                .map(|(key, value)| {
                    (
                        key.to_string_lossy().into_owned(),
                        value.to_string_lossy().into_owned(),
                    )
                })
                .collect(),
            streamed: command.is_streamed(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: command.program().to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Selector that answers prompts from a FIFO queue of labels.
///
/// Each answer is matched against the offered choice labels; `None` simulates
/// the operator cancelling the prompt.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSelector {
    answers: Rc<RefCell<VecDeque<Option<String>>>>,
    prompts: Rc<RefCell<Vec<(String, Vec<Choice>)>>>,
}

impl ScriptedSelector {
    /// Creates a selector with no queued answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the label to pick for the next prompt.
    pub fn push_answer(&self, label: impl Into<String>) {
        self.answers.borrow_mut().push_back(Some(label.into()));
    }

    /// Queues a cancellation for the next prompt.
    pub fn push_cancel(&self) {
        self.answers.borrow_mut().push_back(None);
    }

    /// Returns every prompt shown so far together with its choices.
    #[must_use]
    pub fn prompts(&self) -> Vec<(String, Vec<Choice>)> {
        self.prompts.borrow().clone()
    }
}

impl Selector for ScriptedSelector {
    fn select(&self, prompt: &str, choices: &[Choice]) -> Result<String, SelectError> {
        self.prompts
            .borrow_mut()
            .push((prompt.to_owned(), choices.to_vec()));
        if choices.is_empty() {
            return Err(SelectError::NoChoices {
                prompt: prompt.to_owned(),
            });
        }
        let answer = self
            .answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| SelectError::Prompt(String::from("no scripted answer available")))?;
        let label = answer.ok_or(SelectError::Cancelled)?;
        choices
            .iter()
            .find(|choice| choice.label == label)
            .map(|choice| choice.value.clone())
            .ok_or_else(|| SelectError::Prompt(format!("no choice labelled `{label}`")))
    }
}

/// One GPU-equipped entry for [`json_instance_types`].
#[derive(Clone, Copy, Debug)]
pub struct GpuEntry<'a> {
    /// GPU model name such as `T4`.
    pub name: &'a str,
    /// Number of GPUs.
    pub count: u32,
    /// Memory per GPU in MiB.
    pub memory_mib: u64,
}

/// Produces a payload shaped like `aws ec2 describe-instance-types`.
///
/// Each item is `(type, vcpus, memory MiB, optional GPU)`.
#[must_use]
pub fn json_instance_types(items: &[(&str, u32, u64, Option<GpuEntry<'_>>)]) -> String {
    let rendered = items
        .iter()
        .map(|(name, vcpus, memory, gpu)| {
            let gpu_json = gpu.map_or_else(String::new, |entry| {
                format!(
                    ",\"GpuInfo\":{{\"Gpus\":[{{\"Name\":\"{}\",\"Manufacturer\":\"NVIDIA\",\"Count\":{},\"MemoryInfo\":{{\"SizeInMiB\":{}}}}}]}}",
                    entry.name, entry.count, entry.memory_mib
                )
            });
            format!(
                "{{\"InstanceType\":\"{name}\",\"VCpuInfo\":{{\"DefaultVCpus\":{vcpus}}},\"MemoryInfo\":{{\"SizeInMiB\":{memory}}}{gpu_json}}}"
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("{{\"InstanceTypes\":[{rendered}]}}")
}

/// Produces a payload shaped like `aws ec2 describe-security-groups`.
#[must_use]
pub fn json_security_groups(group_ids: &[&str]) -> String {
    let rendered = group_ids
        .iter()
        .map(|id| format!("{{\"GroupId\":\"{id}\",\"GroupName\":\"cllama-http-default\"}}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{\"SecurityGroups\":[{rendered}]}}")
}

/// Produces a payload shaped like `aws ec2 create-security-group`.
#[must_use]
pub fn json_created_group(group_id: &str) -> String {
    format!("{{\"GroupId\":\"{group_id}\"}}")
}

/// Stderr `aws` prints when an ingress rule is already present.
pub const DUPLICATE_RULE_STDERR: &str = "An error occurred (InvalidPermission.Duplicate) when calling the AuthorizeSecurityGroupIngress operation: the specified rule already exists";

/// Produces a payload shaped like `aws ec2 run-instances`.
#[must_use]
pub fn json_reservation(reservation_id: &str, instance_ids: &[&str]) -> String {
    let rendered = instance_ids
        .iter()
        .map(|id| format!("{{\"InstanceId\":\"{id}\"}}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{\"ReservationId\":\"{reservation_id}\",\"Instances\":[{rendered}]}}")
}

/// Produces `bentoml get` YAML for a single-service artifact.
#[must_use]
pub fn yaml_artifact(name: &str, version: &str, resources: &str) -> String {
    let mut rendered = format!("name: {name}\nversion: {version}\nservices:\n- name: Service\n");
    if !resources.is_empty() {
        rendered.push_str("  config:\n    resources:\n");
        for line in resources.lines() {
            rendered.push_str("      ");
            rendered.push_str(line.trim());
            rendered.push('\n');
        }
    }
    rendered
}
