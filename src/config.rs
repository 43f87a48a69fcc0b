//! Configuration loading via `ortho-config`.
//!
//! Values merge defaults, `cllama.toml` (or `.cllama.toml`, or the file named
//! by `CLLAMA_CONFIG_PATH`), and `CLLAMA_*` environment variables.

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::artifact::bentoml::DEFAULT_BENTOML_BIN;
use crate::artifact::git::DEFAULT_GIT_BIN;
use crate::aws::DEFAULT_AWS_BIN;
use crate::workspace::{self, WorkspaceError};

/// Default root for local state.
pub const DEFAULT_HOME: &str = "~/.cllama";

/// Machine image launched by default (Ubuntu with Python 3 on `us-east-1`).
pub const DEFAULT_IMAGE_ID: &str = "ami-02623cf022763d4a1";

/// Security group shared by every service this tool launches.
pub const DEFAULT_SECURITY_GROUP: &str = "cllama-http-default";

/// Settings for `cllama run`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "CLLAMA",
    discovery(
        app_name = "cllama",
        env_var = "CLLAMA_CONFIG_PATH",
        config_file_name = "cllama.toml",
        dotfile_name = ".cllama.toml",
        project_file_name = "cllama.toml"
    )
)]
pub struct CllamaConfig {
    /// Root directory for the artifact store, clones, and scripts. Supports a
    /// leading `~/`.
    #[ortho_config(default = DEFAULT_HOME.to_owned())]
    pub home: String,
    /// Path to the `bentoml` executable.
    #[ortho_config(default = DEFAULT_BENTOML_BIN.to_owned())]
    pub bentoml_bin: String,
    /// Path to the `git` executable.
    #[ortho_config(default = DEFAULT_GIT_BIN.to_owned())]
    pub git_bin: String,
    /// Path to the `aws` executable.
    #[ortho_config(default = DEFAULT_AWS_BIN.to_owned())]
    pub aws_bin: String,
    /// Region passed to every `aws` call; the CLI profile decides when unset.
    pub aws_region: Option<String>,
    /// Machine image for launched instances.
    #[ortho_config(default = DEFAULT_IMAGE_ID.to_owned())]
    pub image_id: String,
    /// EC2 key pair attached to launched instances.
    pub key_name: Option<String>,
    /// Name of the ingress security group.
    #[ortho_config(default = DEFAULT_SECURITY_GROUP.to_owned())]
    pub security_group_name: String,
    /// Port the service listens on.
    #[ortho_config(default = 80)]
    pub service_port: u16,
}

/// Local directories derived from [`CllamaConfig::home`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoragePaths {
    /// Expanded home directory.
    pub home: Utf8PathBuf,
    /// BentoML artifact store (`BENTOML_HOME`).
    pub bentoml: Utf8PathBuf,
    /// Clone cache.
    pub repos: Utf8PathBuf,
    /// Rendered bootstrap scripts.
    pub cache: Utf8PathBuf,
}

impl StoragePaths {
    /// Derives the layout under `home`.
    #[must_use]
    pub fn under(home: impl Into<Utf8PathBuf>) -> Self {
        let root = home.into();
        Self {
            bentoml: root.join("bentoml"),
            repos: root.join("repos"),
            cache: root.join("cache"),
            home: root,
        }
    }

    /// Creates the home, clone, and script directories.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when a directory cannot be created.
    pub fn ensure(&self) -> Result<(), WorkspaceError> {
        for dir in [&self.home, &self.repos, &self.cache] {
            workspace::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl CllamaConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to cllama.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    fn require_optional_field(
        value: Option<&str>,
        metadata: &FieldMetadata,
    ) -> Result<(), ConfigError> {
        value.map_or(Ok(()), |present| Self::require_field(present, metadata))
    }

    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("cllama")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks that every required value is present after trimming.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the environment variable
    /// and TOML key to set, or [`ConfigError::InvalidValue`] for a zero port.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (
                self.home.as_str(),
                FieldMetadata::new("state directory", "CLLAMA_HOME", "home"),
            ),
            (
                self.bentoml_bin.as_str(),
                FieldMetadata::new("bentoml executable", "CLLAMA_BENTOML_BIN", "bentoml_bin"),
            ),
            (
                self.git_bin.as_str(),
                FieldMetadata::new("git executable", "CLLAMA_GIT_BIN", "git_bin"),
            ),
            (
                self.aws_bin.as_str(),
                FieldMetadata::new("aws executable", "CLLAMA_AWS_BIN", "aws_bin"),
            ),
            (
                self.image_id.as_str(),
                FieldMetadata::new("machine image", "CLLAMA_IMAGE_ID", "image_id"),
            ),
            (
                self.security_group_name.as_str(),
                FieldMetadata::new(
                    "security group name",
                    "CLLAMA_SECURITY_GROUP_NAME",
                    "security_group_name",
                ),
            ),
        ];
        for (value, metadata) in &required {
            Self::require_field(value, metadata)?;
        }
        Self::require_optional_field(
            self.key_name.as_deref(),
            &FieldMetadata::new("key pair name", "CLLAMA_KEY_NAME", "key_name"),
        )?;
        Self::require_optional_field(
            self.aws_region.as_deref(),
            &FieldMetadata::new("AWS region", "CLLAMA_AWS_REGION", "aws_region"),
        )?;
        if self.service_port == 0 {
            return Err(ConfigError::InvalidValue {
                field: String::from("service_port"),
                message: String::from("port must be between 1 and 65535"),
            });
        }
        Ok(())
    }

    /// Derives local directories, expanding a leading `~/` from `HOME`.
    #[must_use]
    pub fn storage_paths(&self) -> StoragePaths {
        StoragePaths::under(expand_tilde(self.home.trim()))
    }
}

/// Expands a leading `~/` using the `HOME` environment variable.
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds an unusable value.
    #[error("invalid {field}: {message}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// What is wrong with the value.
        message: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}
