//! "NC Program Defaults": prepares a new NC program from the stored defaults.
//! 依已儲存的預設值準備新的 NC 程式。

use cambench_commands::{CommandBehavior, CommandError, NoInputs, SessionContext};
use cambench_host::InputSpec;
use std::path::PathBuf;
use tracing::info;

use crate::defaults::NcProgramDefaults;

pub const COMMAND: &str = "ncProgramsDefault";

/// Parameters handed to the host when it creates the NC program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NcProgramRequest {
    pub display_name: String,
    pub program_name: String,
    pub filename: String,
    pub comment: String,
    pub output_folder: PathBuf,
}

#[derive(Debug, Default)]
pub struct CreateNcProgramCommand {
    desktop: Option<PathBuf>,
    requests: Vec<NcProgramRequest>,
}

impl CreateNcProgramCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the desktop fallback used when no output path is stored.
    pub fn with_desktop(mut self, desktop: impl Into<PathBuf>) -> Self {
        self.desktop = Some(desktop.into());
        self
    }

    pub fn requests(&self) -> &[NcProgramRequest] {
        &self.requests
    }
}

impl CommandBehavior for CreateNcProgramCommand {
    type Input = NoInputs;

    fn build_inputs(
        &mut self,
        ctx: &mut SessionContext<'_>,
    ) -> Result<Vec<InputSpec>, CommandError> {
        // Unreadable defaults end the session before the dialog opens.
        let store = ctx.settings().ok_or(CommandError::NoSettings)?;
        NcProgramDefaults::from_store(store)?;
        Ok(Vec::new())
    }

    fn execute(&mut self, ctx: &mut SessionContext<'_>) -> Result<(), CommandError> {
        let store = ctx.settings().ok_or(CommandError::NoSettings)?;
        let defaults = NcProgramDefaults::from_store(store)?;
        let output_folder = match &self.desktop {
            Some(desktop) => defaults.output_folder_from(desktop),
            None => defaults.output_folder(),
        };
        let request = NcProgramRequest {
            display_name: defaults.display_name,
            program_name: defaults.name,
            filename: defaults.filename,
            comment: defaults.comment,
            output_folder,
        };
        info!(
            program = %request.program_name,
            folder = %request.output_folder.display(),
            "NC program prepared"
        );
        self.requests.push(request);
        Ok(())
    }
}
