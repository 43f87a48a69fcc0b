//! BDD step definitions for `cllama run`.

use cllama::artifact::bentoml::DEFAULT_BENTOML_BIN;
use cllama::artifact::git::DEFAULT_GIT_BIN;
use cllama::aws::DEFAULT_AWS_BIN;
use cllama::test_support::{
    DUPLICATE_RULE_STDERR, json_created_group, json_instance_types, json_reservation,
    json_security_groups, yaml_artifact,
};
use cllama::{
    ArtifactPipeline, AwsCli, BentoCli, GitCli, LaunchSettings, Provisioner, RunOrchestrator,
    RunRequest, RunSettings, StoragePaths,
};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{
    IMAGE_ID, RunContext, RunResult, SECURITY_GROUP_NAME, STANDARD_CATALOG, instance_label,
    two_service_artifact,
};

const INSTANCE_PROMPT: &str = "Select an instance type";

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn split_tag(tag: &str) -> (&str, &str) {
    tag.trim()
        .split_once(':')
        .unwrap_or_else(|| panic!("invalid tag in feature file: {tag}"))
}

#[given("bentoml has \"{tag}\" needing one \"{family}\" GPU")]
fn artifact_with_gpu(run_context: RunContext, tag: String, family: String) -> RunContext {
    let (name, version) = split_tag(&tag);
    let resources = format!("gpu: 1\ngpu_type: {}", family.trim());
    run_context
        .bento
        .push_output(Some(0), yaml_artifact(name, version, &resources), "");
    run_context
}

#[given("bentoml has \"{tag}\" with two services")]
fn artifact_with_two_services(run_context: RunContext, tag: String) -> RunContext {
    let (name, version) = split_tag(&tag);
    run_context
        .bento
        .push_output(Some(0), two_service_artifact(name, version), "");
    run_context
}

#[given("bentoml has \"{tag}\" without a GPU requirement")]
fn artifact_without_gpu(run_context: RunContext, tag: String) -> RunContext {
    let (name, version) = split_tag(&tag);
    run_context
        .bento
        .push_output(Some(0), yaml_artifact(name, version, "cpu: 2"), "");
    run_context
}

#[given("AWS offers the standard GPU catalog")]
fn standard_catalog(run_context: RunContext) -> RunContext {
    run_context
        .aws
        .push_output(Some(0), json_instance_types(STANDARD_CATALOG), "");
    run_context
}

#[given("the security group \"{group_id}\" already exists")]
fn existing_group(run_context: RunContext, group_id: String) -> RunContext {
    run_context
        .aws
        .push_output(Some(0), json_security_groups(&[group_id.trim()]), "");
    for _ in 0..3 {
        run_context
            .aws
            .push_output(Some(254), "", DUPLICATE_RULE_STDERR); // rule already present
    }
    run_context
}

#[given("no security group exists yet")]
fn no_group(run_context: RunContext) -> RunContext {
    run_context
        .aws
        .push_output(Some(0), json_security_groups(&[]), "");
    run_context
}

#[given("AWS creates security group \"{group_id}\"")]
fn group_created(run_context: RunContext, group_id: String) -> RunContext {
    run_context
        .aws
        .push_output(Some(0), json_created_group(group_id.trim()), "");
    for _ in 0..3 {
        run_context.aws.push_success(); // authorize ingress rule
    }
    run_context
}

#[given("AWS launches reservation \"{reservation}\" with instance \"{instance}\"")]
fn launch_succeeds(run_context: RunContext, reservation: String, instance: String) -> RunContext {
    run_context.aws.push_output(
        Some(0),
        json_reservation(reservation.trim(), &[instance.trim()]),
        "",
    );
    run_context
}

#[given("the operator picks provider \"{provider}\"")]
fn picks_provider(run_context: RunContext, provider: String) -> RunContext {
    run_context.selector.push_answer(provider.trim());
    run_context
}

#[given("the operator picks instance \"{instance_type}\"")]
fn picks_instance(run_context: RunContext, instance_type: String) -> RunContext {
    run_context
        .selector
        .push_answer(instance_label(instance_type.trim()));
    run_context
}

#[when("the operator runs model \"{model}\" with tag \"{tag}\"")]
fn operator_runs(mut run_context: RunContext, model: String, tag: String) -> RunContext {
    let paths = StoragePaths::under(run_context.root.join("home"));
    let pipeline = ArtifactPipeline::new(
        BentoCli::new(run_context.bento.clone(), DEFAULT_BENTOML_BIN, paths.bentoml.clone()),
        GitCli::new(run_context.git.clone(), DEFAULT_GIT_BIN),
        paths.repos.clone(),
    );
    let provisioner = Provisioner::new(
        AwsCli::new(run_context.aws.clone(), DEFAULT_AWS_BIN, None),
        LaunchSettings {
            image_id: IMAGE_ID.to_owned(),
            key_name: None,
            cache_dir: paths.cache,
        },
    );
    let orchestrator = RunOrchestrator::new(
        pipeline,
        provisioner,
        run_context.selector.clone(),
        RunSettings {
            security_group_name: SECURITY_GROUP_NAME.to_owned(),
            service_port: 80,
        },
    );

    let result = orchestrator.execute(&RunRequest {
        model: model.trim().to_owned(),
        tag: tag.trim().to_owned(),
        force_rebuild: false,
    });
    run_context.outcome = Some(match result {
        Ok(outcome) => RunResult::Success(outcome),
        Err(err) => RunResult::Failure(err.to_string()),
    });
    run_context
}

#[then("the run launched \"{instance_type}\" in security group \"{group_id}\"")]
fn run_launched(
    run_context: &RunContext,
    instance_type: String,
    group_id: String,
) -> Result<(), StepError> {
    let Some(RunResult::Success(outcome)) = run_context.outcome.as_ref() else {
        return Err(StepError::Assertion(format!(
            "expected a successful run, got {:?}",
            run_context.outcome
        )));
    };
    if outcome.instance_type != instance_type.trim() {
        return Err(StepError::Assertion(format!(
            "expected instance type {instance_type}, got {}",
            outcome.instance_type
        )));
    }
    if outcome.security_group_id != group_id.trim() {
        return Err(StepError::Assertion(format!(
            "expected security group {group_id}, got {}",
            outcome.security_group_id
        )));
    }

    let launches: Vec<String> = run_context
        .aws
        .command_strings()
        .into_iter()
        .filter(|command| command.contains("run-instances"))
        .collect();
    let expected = format!("--instance-type {} ", instance_type.trim());
    match launches.as_slice() {
        [launch] if launch.contains(&expected) && launch.contains(IMAGE_ID) => Ok(()),
        _ => Err(StepError::Assertion(format!(
            "expected one launch of {instance_type}, got {launches:?}"
        ))),
    }
}

#[then("the instance prompt offered \"{types}\"")]
fn instance_prompt_offered(run_context: &RunContext, types: String) -> Result<(), StepError> {
    let expected: Vec<String> = types.trim().split(',').map(instance_label).collect();
    let offered: Vec<String> = run_context
        .selector
        .prompts()
        .into_iter()
        .find(|(prompt, _)| prompt == INSTANCE_PROMPT)
        .map(|(_, choices)| choices.into_iter().map(|choice| choice.label).collect())
        .ok_or_else(|| StepError::Assertion(String::from("instance prompt was not shown")))?;
    if offered == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected choices {expected:?}, got {offered:?}"
        )))
    }
}

#[then("AWS opened ports \"{ports}\"")]
fn opened_ports(run_context: &RunContext, ports: String) -> Result<(), StepError> {
    let opened: Vec<String> = run_context
        .aws
        .command_strings()
        .iter()
        .filter(|command| command.contains("authorize-security-group-ingress"))
        .filter_map(|command| {
            let mut tokens = command.split_whitespace();
            tokens.find(|token| *token == "--port")?;
            tokens.next().map(str::to_owned)
        })
        .collect();
    let expected: Vec<String> = ports.trim().split(',').map(str::to_owned).collect();
    if opened == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected ports {expected:?}, got {opened:?}"
        )))
    }
}

#[then("the run fails with \"{fragment}\"")]
fn run_fails(run_context: &RunContext, fragment: String) -> Result<(), StepError> {
    match run_context.outcome.as_ref() {
        Some(RunResult::Failure(message)) if message.contains(fragment.trim()) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected failure mentioning {fragment:?}, got {other:?}"
        ))),
    }
}

#[then("git was never invoked")]
fn git_never_invoked(run_context: &RunContext) -> Result<(), StepError> {
    never_invoked("git", &run_context.git.command_strings())
}

#[then("bentoml was never invoked")]
fn bentoml_never_invoked(run_context: &RunContext) -> Result<(), StepError> {
    never_invoked("bentoml", &run_context.bento.command_strings())
}

#[then("AWS was never called")]
fn aws_never_called(run_context: &RunContext) -> Result<(), StepError> {
    never_invoked("aws", &run_context.aws.command_strings())
}

#[then("AWS was never asked to launch")]
fn aws_never_launched(run_context: &RunContext) -> Result<(), StepError> {
    let commands = run_context.aws.command_strings();
    if commands.iter().any(|command| command.contains("run-instances")) {
        Err(StepError::Assertion(format!(
            "unexpected launch request in {commands:?}"
        )))
    } else {
        Ok(())
    }
}

#[then("no prompt was shown")]
fn no_prompt(run_context: &RunContext) -> Result<(), StepError> {
    let prompts = run_context.selector.prompts();
    if prompts.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("unexpected prompts: {prompts:?}")))
    }
}

fn never_invoked(tool: &str, commands: &[String]) -> Result<(), StepError> {
    if commands.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "{tool} was invoked: {commands:?}"
        )))
    }
}
