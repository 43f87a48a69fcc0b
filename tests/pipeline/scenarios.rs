//! BDD scenarios for the artifact pipeline.

use rstest_bdd_macros::scenario;

use super::test_helpers::{PipelineContext, pipeline_context};

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "Reuse an artifact already in the store"
)]
fn scenario_reuse_artifact(pipeline_context: PipelineContext) {
    let _ = pipeline_context;
}

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "Build a missing artifact from source"
)]
fn scenario_build_missing_artifact(pipeline_context: PipelineContext) {
    let _ = pipeline_context;
}

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "Clean up after a failed clone"
)]
fn scenario_failed_clone(pipeline_context: PipelineContext) {
    let _ = pipeline_context;
}

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "Force a rebuild from a fresh checkout"
)]
fn scenario_force_rebuild(pipeline_context: PipelineContext) {
    let _ = pipeline_context;
}
