//! BDD scenarios for `cllama run`.

use rstest_bdd_macros::scenario;

use super::test_helpers::{RunContext, run_context};

#[scenario(
    path = "tests/features/run.feature",
    name = "Launch the exact-match instance for a cached artifact"
)]
fn scenario_launch_exact_match(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Create the ingress security group when it is missing"
)]
fn scenario_create_security_group(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Reject a provider other than AWS"
)]
fn scenario_unsupported_provider(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Reject an artifact with several services"
)]
fn scenario_multiple_services(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Require a GPU declaration"
)]
fn scenario_gpu_required(run_context: RunContext) {
    let _ = run_context;
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Stop before any tool runs for an unknown model"
)]
fn scenario_unknown_model(run_context: RunContext) {
    let _ = run_context;
}
