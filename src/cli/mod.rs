//! Command-line interface definitions for the `cllama` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `cllama` binary.
#[derive(Debug, Parser)]
#[command(
    name = "cllama",
    about = "Build a model-serving artifact and launch a GPU instance to serve it",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Reserved for serving models locally; currently does nothing.
    #[command(name = "serve", about = "Serve models locally (not implemented yet)")]
    Serve,
    /// Build or reuse a model's artifact and launch an instance for it.
    #[command(name = "run", about = "Build a model and launch an instance serving it")]
    Run(RunCommand),
    /// Print the built-in model catalog.
    #[command(name = "list", about = "List available models and tags")]
    List,
}

/// Arguments for the `cllama run` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct RunCommand {
    /// Catalog model name, for example `llama2`.
    #[arg(value_name = "MODEL")]
    pub(crate) model: String,
    /// Model tag; `latest` picks the model's first tag.
    #[arg(long, value_name = "TAG", default_value = "latest")]
    pub(crate) tag: String,
    /// Discard the cached clone and rebuild from a fresh checkout.
    #[arg(long)]
    pub(crate) force_rebuild: bool,
}
