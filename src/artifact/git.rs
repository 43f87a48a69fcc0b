//! Git command-line adapter.

use camino::Utf8Path;

use crate::artifact::{PipelineError, SourceControl};
use crate::command::{CommandRunner, CommandSpec};

/// Default git binary name.
pub const DEFAULT_GIT_BIN: &str = "git";

/// Clones repositories by shelling out to `git`.
#[derive(Clone, Debug)]
pub struct GitCli<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> GitCli<R> {
    /// Creates an adapter around `program`.
    #[must_use]
    pub fn new(runner: R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

impl<R: CommandRunner> SourceControl for GitCli<R> {
    fn clone_branch(
        &self,
        repository: &str,
        branch: &str,
        destination: &Utf8Path,
    ) -> Result<(), PipelineError> {
        let failed = |message: String| PipelineError::CloneFailed {
            repository: repository.to_owned(),
            branch: branch.to_owned(),
            message,
        };

        let spec = CommandSpec::new(&self.program)
            .args(["clone", "--branch", branch, repository])
            .arg(destination.as_str())
            .streamed();
        let output = self.runner.run(&spec).map_err(|err| failed(err.to_string()))?;
        if output.is_success() {
            return Ok(());
        }

        Err(failed(format!(
            "{} exited with status {}: {}",
            self.program,
            output.status_text(),
            output.stderr.trim()
        )))
    }
}
