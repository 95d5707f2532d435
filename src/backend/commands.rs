use crate::runner;
use declarative::{CommandOutput, CommandRunner, ProviderError, ProviderResult};
use std::path::Path;

/// Runs `Exec` commands through `sh -c`
pub struct Shell;

impl CommandRunner for Shell {
    fn run(&self, command: &str, cwd: Option<&Path>) -> ProviderResult<CommandOutput> {
        runner::shell(command, cwd)
            .map(CommandOutput::from)
            .map_err(|e| ProviderError::backend(format!("sh -c {command}"), format!("{e:#}")))
    }
}
