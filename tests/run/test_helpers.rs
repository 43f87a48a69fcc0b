//! Shared fixtures and helpers for run BDD scenarios.

use std::sync::Arc;

use camino::Utf8PathBuf;
use cllama::test_support::{GpuEntry, ScriptedRunner, ScriptedSelector};
use cllama::RunOutcome;
use rstest::fixture;
use tempfile::TempDir;

pub const SECURITY_GROUP_NAME: &str = "cllama-http-default";
pub const IMAGE_ID: &str = "ami-02623cf022763d4a1";

const T4: GpuEntry<'static> = GpuEntry {
    name: "T4",
    count: 1,
    memory_mib: 16_384,
};

/// Catalog offered by the scripted AWS account: two exact T4 matches, one
/// near match on a different GPU, one multi-GPU type, and one CPU-only type.
pub const STANDARD_CATALOG: &[(&str, u32, u64, Option<GpuEntry<'static>>)] = &[
    ("g4dn.2xlarge", 8, 32_768, Some(T4)),
    (
        "g5.xlarge",
        4,
        16_384,
        Some(GpuEntry {
            name: "A10G",
            count: 1,
            memory_mib: 24_576,
        }),
    ),
    ("m5.large", 2, 8_192, None),
    (
        "g4dn.12xlarge",
        48,
        196_608,
        Some(GpuEntry {
            name: "T4",
            count: 4,
            memory_mib: 16_384,
        }),
    ),
    ("g4dn.xlarge", 4, 16_384, Some(T4)),
];

#[derive(Clone, Debug)]
pub enum RunResult {
    Success(RunOutcome),
    Failure(String),
}

#[derive(Clone, Debug)]
pub struct RunContext {
    pub bento: ScriptedRunner,
    pub git: ScriptedRunner,
    pub aws: ScriptedRunner,
    pub selector: ScriptedSelector,
    pub root: Utf8PathBuf,
    pub outcome: Option<RunResult>,
    _dir: Arc<TempDir>,
}

#[fixture]
pub fn run_context() -> RunContext {
    let dir = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .unwrap_or_else(|path| panic!("non-utf8 tempdir path: {}", path.display()));

    RunContext {
        bento: ScriptedRunner::new(),
        git: ScriptedRunner::new(),
        aws: ScriptedRunner::new(),
        selector: ScriptedSelector::new(),
        root,
        outcome: None,
        _dir: Arc::new(dir),
    }
}

/// Prompt label shown for `type_name` from [`STANDARD_CATALOG`].
pub fn instance_label(type_name: &str) -> String {
    let Some((name, vcpus, memory, gpu)) = STANDARD_CATALOG
        .iter()
        .find(|(name, ..)| *name == type_name)
    else {
        panic!("{type_name} is not in the standard catalog");
    };
    let gpu_label = gpu.map_or_else(
        || String::from("none"),
        |entry| format!("{} x {}", entry.name, entry.count),
    );
    format!("{name} (cpus: {vcpus}, mem: {memory}, gpu: {gpu_label})")
}

pub fn two_service_artifact(name: &str, version: &str) -> String {
    format!(
        "name: {name}\nversion: {version}\nservices:\n- name: Chat\n  config:\n    resources:\n      gpu: 1\n- name: Embed\n  config:\n    resources:\n      gpu: 1\n"
    )
}
