//! Binary entry point for the cllama CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use cllama::artifact::{ArtifactPipeline, BentoCli, GitCli};
use cllama::catalog::{self, CatalogError};
use cllama::workspace::WorkspaceError;
use cllama::{
    AwsCli, CllamaConfig, ConfigError, LaunchSettings, ProcessCommandRunner, Provisioner,
    RunError, RunOrchestrator, RunOutcome, RunRequest, RunSettings, TerminalSelector,
};

mod cli;

use cli::{Cli, RunCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to prepare local state: {0}")]
    Storage(#[from] WorkspaceError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("run failed: {0}")]
    Run(#[from] RunError),
    #[error("failed to write output: {0}")]
    Output(String),
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli) {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Serve => Ok(()),
        Cli::List => list_models(io::stdout()),
        Cli::Run(command) => run_command(&command),
    }
}

fn list_models(mut target: impl Write) -> Result<(), CliError> {
    let listing = catalog::render_listing().map_err(|err| CliError::Output(err.to_string()))?;
    write!(target, "{listing}").map_err(|err| CliError::Output(err.to_string()))
}

fn run_command(args: &RunCommand) -> Result<(), CliError> {
    catalog::resolve(&args.model, &args.tag)?;

    let config = CllamaConfig::load_without_cli_args()?;
    config.validate()?;
    let paths = config.storage_paths();
    paths.ensure()?;

    let pipeline = ArtifactPipeline::new(
        BentoCli::new(ProcessCommandRunner, &config.bentoml_bin, paths.bentoml.clone()),
        GitCli::new(ProcessCommandRunner, &config.git_bin),
        paths.repos.clone(),
    );
    let provisioner = Provisioner::new(
        AwsCli::with_process_runner(&config.aws_bin, config.aws_region.clone()),
        LaunchSettings {
            image_id: config.image_id.clone(),
            key_name: config.key_name.clone(),
            cache_dir: paths.cache,
        },
    );
    let orchestrator = RunOrchestrator::new(
        pipeline,
        provisioner,
        TerminalSelector,
        RunSettings {
            security_group_name: config.security_group_name.clone(),
            service_port: config.service_port,
        },
    );

    let outcome = orchestrator.execute(&RunRequest {
        model: args.model.clone(),
        tag: args.tag.clone(),
        force_rebuild: args.force_rebuild,
    })?;
    write_outcome(io::stdout(), &outcome)
}

fn write_outcome(mut target: impl Write, outcome: &RunOutcome) -> Result<(), CliError> {
    let instances = if outcome.launch.instance_ids.is_empty() {
        String::from("none reported")
    } else {
        outcome.launch.instance_ids.join(", ")
    };
    writeln!(
        target,
        "launched {} for {}:{} (security group {}, instances: {instances})",
        outcome.instance_type,
        outcome.artifact.name,
        outcome.artifact.version,
        outcome.security_group_id
    )
    .map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
