//! BentoML command-line adapter.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::debug;

use crate::artifact::{
    ArtifactHandle, ArtifactQuery, ArtifactTag, BuildTool, PipelineError, ServiceConfig,
    ServiceResources,
};
use crate::command::{CommandRunner, CommandSpec};
use crate::gpu::MIB_PER_GIB;

/// Default BentoML binary name.
pub const DEFAULT_BENTOML_BIN: &str = "bentoml";

/// Environment variable selecting BentoML's artifact store.
pub const BENTOML_HOME_ENV: &str = "BENTOML_HOME";

const TAG_OUTPUT_PREFIX: &str = "__tag__:";

/// Drives `bentoml get` and `bentoml build`.
#[derive(Clone, Debug)]
pub struct BentoCli<R> {
    runner: R,
    program: String,
    store: Utf8PathBuf,
}

impl<R: CommandRunner> BentoCli<R> {
    /// Creates an adapter that keeps artifacts in `store`.
    #[must_use]
    pub fn new(runner: R, program: impl Into<String>, store: impl Into<Utf8PathBuf>) -> Self {
        Self {
            runner,
            program: program.into(),
            store: store.into(),
        }
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.program).env(BENTOML_HOME_ENV, self.store.as_str())
    }
}

impl<R: CommandRunner> BuildTool for BentoCli<R> {
    fn query(&self, tag: &ArtifactTag) -> ArtifactQuery {
        let spec = self.command().arg("get").arg(tag.to_string());
        let output = match self.runner.run(&spec) {
            Ok(output) => output,
            Err(err) => return ArtifactQuery::TransientError(err.to_string()),
        };

        if !output.is_success() {
            debug!(%tag, stderr = %output.stderr.trim(), "bentoml get reported no artifact");
            return ArtifactQuery::NotFound;
        }

        parse_artifact(&output.stdout).map_or_else(ArtifactQuery::TransientError, ArtifactQuery::Found)
    }

    fn build(&self, project_dir: &Utf8Path, version: &str) -> Result<ArtifactTag, PipelineError> {
        let failed = |message: String| PipelineError::BuildFailed {
            project_dir: project_dir.to_path_buf(),
            message,
        };

        let spec = self
            .command()
            .args(["build", ".", "--version", version, "--output", "tag"])
            .current_dir(project_dir)
            .streamed();
        let output = self.runner.run(&spec).map_err(|err| failed(err.to_string()))?;
        if !output.is_success() {
            return Err(failed(format!(
                "{} exited with status {}: {}",
                self.program,
                output.status_text(),
                output.stderr.trim()
            )));
        }

        parse_build_tag(&output.stdout)
            .ok_or_else(|| failed(format!("unexpected build output: {}", output.stdout.trim())))
    }
}

/// Extracts the artifact tag from `bentoml build --output tag` output.
#[must_use]
pub fn parse_build_tag(stdout: &str) -> Option<ArtifactTag> {
    let line = stdout.lines().map(str::trim).rfind(|line| !line.is_empty())?;
    ArtifactTag::parse(line.strip_prefix(TAG_OUTPUT_PREFIX).unwrap_or(line))
}

/// Parses `bentoml get` YAML into an [`ArtifactHandle`].
///
/// Lines may carry Python-specific YAML tags (`!!python/...`); everything from
/// `!!` onwards is dropped before parsing.
///
/// # Errors
///
/// Returns a description of the problem when the document is not valid.
pub fn parse_artifact(stdout: &str) -> Result<ArtifactHandle, String> {
    let cleaned = stdout
        .lines()
        .map(|line| line.split("!!").next().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n");
    let document: ArtifactDocument =
        serde_yaml::from_str(&cleaned).map_err(|err| format!("invalid artifact metadata: {err}"))?;

    let services = document
        .services
        .into_iter()
        .map(ServiceDocument::into_config)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ArtifactHandle {
        name: document.name,
        version: document.version,
        services,
    })
}

#[derive(Debug, Deserialize)]
struct ArtifactDocument {
    name: String,
    version: String,
    #[serde(default)]
    services: Vec<ServiceDocument>,
}

#[derive(Debug, Deserialize)]
struct ServiceDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    config: Option<ServiceConfigDocument>,
}

#[derive(Debug, Deserialize)]
struct ServiceConfigDocument {
    #[serde(default)]
    resources: Option<ResourcesDocument>,
}

#[derive(Debug, Deserialize)]
struct ResourcesDocument {
    #[serde(default)]
    gpu: Option<u32>,
    #[serde(default)]
    gpu_type: Option<String>,
    #[serde(default)]
    gpu_memory: Option<GpuMemoryValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GpuMemoryValue {
    Number(serde_yaml::Number),
    Text(String),
}

impl GpuMemoryValue {
    fn to_mib(&self) -> Result<u64, String> {
        match self {
            Self::Number(number) => parse_gib_as_mib(&number.to_string()),
            Self::Text(text) => parse_gib_as_mib(text),
        }
    }
}

impl ResourcesDocument {
    fn into_resources(self) -> Result<ServiceResources, String> {
        Ok(ServiceResources {
            gpu: self.gpu,
            gpu_type: self.gpu_type,
            gpu_memory_mib: self
                .gpu_memory
                .as_ref()
                .map(GpuMemoryValue::to_mib)
                .transpose()?,
        })
    }
}

impl ServiceDocument {
    fn into_config(self) -> Result<ServiceConfig, String> {
        let resources = self
            .config
            .and_then(|config| config.resources)
            .map(ResourcesDocument::into_resources)
            .transpose()?;
        Ok(ServiceConfig {
            name: self.name,
            resources,
        })
    }
}

/// Parses a GiB amount such as `16`, `22.5`, `24Gi` or `80GB` into MiB.
///
/// The decimal text is converted exactly; amounts that are not a whole
/// number of MiB are rejected.
fn parse_gib_as_mib(raw: &str) -> Result<u64, String> {
    let invalid = || format!("gpu_memory must be a GiB amount in whole MiB, got `{raw}`");
    let lowered = raw.trim().to_ascii_lowercase();
    let number = ["gib", "gi", "gb", "g"]
        .iter()
        .find_map(|suffix| lowered.strip_suffix(suffix))
        .unwrap_or(&lowered)
        .trim();

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() || !whole.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(invalid());
    }
    let whole_mib = whole
        .parse::<u64>()
        .ok()
        .and_then(|gib| gib.checked_mul(MIB_PER_GIB))
        .ok_or_else(invalid)?;
    let fraction_mib = fraction_as_mib(fraction).ok_or_else(invalid)?;
    whole_mib.checked_add(fraction_mib).ok_or_else(invalid)
}

/// MiB represented by the digits after the decimal point of a GiB amount.
fn fraction_as_mib(digits: &str) -> Option<u64> {
    if !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    let significant = digits.trim_end_matches('0');
    if significant.is_empty() {
        return Some(0);
    }
    let scale = 10_u64.checked_pow(u32::try_from(significant.len()).ok()?)?;
    let scaled = significant.parse::<u64>().ok()?.checked_mul(MIB_PER_GIB)?;
    if scaled.checked_rem(scale)? != 0 {
        return None;
    }
    scaled.checked_div(scale)
}
