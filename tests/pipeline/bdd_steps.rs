//! BDD step definitions for the artifact pipeline.

use cllama::artifact::bentoml::DEFAULT_BENTOML_BIN;
use cllama::artifact::git::DEFAULT_GIT_BIN;
use cllama::artifact::{ArtifactPipeline, ArtifactTag, BentoCli, BuildRequest, GitCli};
use cllama::test_support::yaml_artifact;
use cllama::workspace;
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::PipelineContext;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn parse_tag(raw: &str) -> ArtifactTag {
    ArtifactTag::parse(raw).unwrap_or_else(|| panic!("invalid tag in feature file: {raw}"))
}

#[given("a pipeline for tag \"{tag}\"")]
fn pipeline_for_tag(mut pipeline_context: PipelineContext, tag: String) -> PipelineContext {
    pipeline_context.tag = Some(parse_tag(&tag));
    pipeline_context
}

#[given("bentoml already has the artifact")]
fn artifact_present(pipeline_context: PipelineContext) -> PipelineContext {
    let tag = pipeline_context.tag();
    pipeline_context.runner.push_output(
        Some(0),
        yaml_artifact(&tag.name, &tag.version, "gpu: 1\ngpu_type: nvidia-tesla-t4"),
        "",
    );
    pipeline_context
}

#[given("bentoml does not have the artifact")]
fn artifact_absent(pipeline_context: PipelineContext) -> PipelineContext {
    let tag = pipeline_context.tag();
    pipeline_context
        .runner
        .push_output(Some(1), "", format!("Bento '{tag}' is not found"));
    pipeline_context
}

#[given("git clones the repository")]
fn clone_succeeds(pipeline_context: PipelineContext) -> PipelineContext {
    pipeline_context.runner.push_success();
    pipeline_context
}

#[given("git fails to clone the repository")]
fn clone_fails(pipeline_context: PipelineContext) -> PipelineContext {
    pipeline_context
        .runner
        .push_output(Some(128), "", "fatal: could not read from remote repository");
    pipeline_context
}

#[given("bentoml builds the artifact as \"{built}\"")]
fn build_succeeds(pipeline_context: PipelineContext, built: String) -> PipelineContext {
    let tag = parse_tag(&built);
    pipeline_context
        .runner
        .push_output(Some(0), format!("__tag__:{tag}\n"), "");
    pipeline_context
        .runner
        .push_output(Some(0), yaml_artifact(&tag.name, &tag.version, "gpu: 1"), "");
    pipeline_context
}

#[given("a stale checkout exists on disk")]
fn stale_checkout(pipeline_context: PipelineContext) -> PipelineContext {
    let checkout = pipeline_context.checkout();
    workspace::create_dir_all(&checkout)
        .unwrap_or_else(|err| panic!("create stale checkout: {err}"));
    workspace::write_file(&checkout.join("stale.txt"), "old revision")
        .unwrap_or_else(|err| panic!("write stale file: {err}"));
    pipeline_context
}

#[given("a rebuild is forced")]
fn rebuild_forced(mut pipeline_context: PipelineContext) -> PipelineContext {
    pipeline_context.force_rebuild = true;
    pipeline_context
}

#[when("the pipeline resolves the artifact")]
fn resolve_artifact(mut pipeline_context: PipelineContext) -> PipelineContext {
    let pipeline = ArtifactPipeline::new(
        BentoCli::new(
            pipeline_context.runner.clone(),
            DEFAULT_BENTOML_BIN,
            pipeline_context.store.clone(),
        ),
        GitCli::new(pipeline_context.runner.clone(), DEFAULT_GIT_BIN),
        pipeline_context.repos.clone(),
    );
    let request = BuildRequest {
        tag: pipeline_context.tag(),
        reference: PipelineContext::reference(),
        force_rebuild: pipeline_context.force_rebuild,
    };
    pipeline_context.outcome = Some(pipeline.resolve(&request));
    pipeline_context
}

#[then("the resolved artifact is \"{expected}\"")]
fn resolved_artifact(pipeline_context: &PipelineContext, expected: String) -> Result<(), StepError> {
    match pipeline_context.outcome.as_ref() {
        Some(Ok(handle)) if handle.tag().to_string() == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected artifact {expected}, got {other:?}"
        ))),
    }
}

#[then("git was never invoked")]
fn git_not_invoked(pipeline_context: &PipelineContext) -> Result<(), StepError> {
    let git_calls = pipeline_context
        .runner
        .invocations()
        .into_iter()
        .filter(|call| call.program == DEFAULT_GIT_BIN)
        .count();
    if git_calls == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("git was invoked {git_calls} time(s)")))
    }
}

#[then("bentoml looked up \"{expected}\" after building")]
fn looked_up_built_tag(pipeline_context: &PipelineContext, expected: String) -> Result<(), StepError> {
    let commands = pipeline_context.runner.command_strings();
    let last = commands
        .last()
        .ok_or_else(|| StepError::Assertion(String::from("no commands recorded")))?;
    if *last == format!("bentoml get {expected}") {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected final lookup of {expected}, got {commands:?}"
        )))
    }
}

#[then("the build ran in the project subdirectory")]
fn build_in_subdirectory(pipeline_context: &PipelineContext) -> Result<(), StepError> {
    let expected = pipeline_context.checkout().join("llama2-7b-chat");
    let build = pipeline_context
        .runner
        .invocations()
        .into_iter()
        .find(|call| call.args.iter().any(|arg| arg == "build"))
        .ok_or_else(|| StepError::Assertion(String::from("missing build invocation")))?;
    if build.current_dir.as_ref() == Some(&expected) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected build in {expected}, got {:?}",
            build.current_dir
        )))
    }
}

#[then("the pipeline fails with \"{fragment}\"")]
fn pipeline_fails(pipeline_context: &PipelineContext, fragment: String) -> Result<(), StepError> {
    match pipeline_context.outcome.as_ref() {
        Some(Err(err)) if err.to_string().contains(&fragment) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected failure mentioning {fragment:?}, got {other:?}"
        ))),
    }
}

#[then("no checkout remains on disk")]
fn no_checkout(pipeline_context: &PipelineContext) -> Result<(), StepError> {
    let checkout = pipeline_context.checkout();
    let exists = workspace::path_exists(&checkout)
        .map_err(|err| StepError::Assertion(err.to_string()))?;
    if exists {
        Err(StepError::Assertion(format!("{checkout} should have been removed")))
    } else {
        Ok(())
    }
}

#[then("the stale checkout was discarded")]
fn stale_checkout_discarded(pipeline_context: &PipelineContext) -> Result<(), StepError> {
    let stale = pipeline_context.checkout().join("stale.txt");
    let exists =
        workspace::path_exists(&stale).map_err(|err| StepError::Assertion(err.to_string()))?;
    let cloned = pipeline_context
        .runner
        .command_strings()
        .iter()
        .any(|command| command.starts_with("git clone --branch main"));
    if !exists && cloned {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "stale file present: {exists}, fresh clone issued: {cloned}"
        )))
    }
}
