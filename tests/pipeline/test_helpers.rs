//! Shared fixtures for pipeline BDD scenarios.

use std::sync::Arc;

use camino::Utf8PathBuf;
use cllama::artifact::{ArtifactHandle, ArtifactTag, PipelineError};
use cllama::reference::{SourceReference, storage_path};
use cllama::test_support::ScriptedRunner;
use rstest::fixture;
use tempfile::TempDir;

pub const SOURCE: &str =
    "git+https://github.com/bojiang/bentovllm@main#subdirectory=llama2-7b-chat";

#[derive(Clone, Debug)]
pub struct PipelineContext {
    pub runner: ScriptedRunner,
    pub store: Utf8PathBuf,
    pub repos: Utf8PathBuf,
    pub tag: Option<ArtifactTag>,
    pub force_rebuild: bool,
    pub outcome: Option<Result<ArtifactHandle, PipelineError>>,
    _root: Arc<TempDir>,
}

impl PipelineContext {
    pub fn reference() -> SourceReference {
        SourceReference::parse(SOURCE)
            .unwrap_or_else(|err| panic!("catalog reference should parse: {err}"))
    }

    pub fn checkout(&self) -> Utf8PathBuf {
        storage_path(&self.repos, &Self::reference())
    }

    pub fn tag(&self) -> ArtifactTag {
        self.tag
            .clone()
            .unwrap_or_else(|| panic!("test setup requires a tag"))
    }
}

#[fixture]
pub fn pipeline_context() -> PipelineContext {
    let root = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let base = Utf8PathBuf::from_path_buf(root.path().to_path_buf())
        .unwrap_or_else(|path| panic!("non-utf8 tempdir path: {}", path.display()));

    PipelineContext {
        runner: ScriptedRunner::new(),
        store: base.join("bentoml"),
        repos: base.join("repos"),
        tag: None,
        force_rebuild: false,
        outcome: None,
        _root: Arc::new(root),
    }
}
