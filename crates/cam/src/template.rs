//! Minimal command showing the lifecycle pattern; execute only logs.

use cambench_commands::{CommandBehavior, CommandError, NoInputs, SessionContext};
use cambench_host::{InputSpec, TerminationReason};
use tracing::info;

pub const COMMAND: &str = "Template_Command";

#[derive(Debug, Default)]
pub struct TemplateCommand {
    executions: usize,
}

impl TemplateCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executions(&self) -> usize {
        self.executions
    }
}

impl CommandBehavior for TemplateCommand {
    type Input = NoInputs;

    fn build_inputs(
        &mut self,
        _ctx: &mut SessionContext<'_>,
    ) -> Result<Vec<InputSpec>, CommandError> {
        Ok(Vec::new())
    }

    fn execute(&mut self, ctx: &mut SessionContext<'_>) -> Result<(), CommandError> {
        self.executions += 1;
        info!(session = %ctx.token(), "template command executed");
        Ok(())
    }

    fn session_ended(&mut self, reason: TerminationReason) {
        info!(?reason, "template command closed");
    }
}
