//! Process-wide table of installed commands.
//! 全域的已安裝命令表。

use cambench_resources::TeardownReport;
use tracing::{error, info, warn};

use crate::behavior::CommandBehavior;
use crate::lifecycle::{CommandLifecycle, LifecycleState};
use crate::LifecycleError;

/// Object-safe face of a [`CommandLifecycle`], so commands with different
/// behaviors share one registry.
pub trait ManagedCommand {
    fn command_id(&self) -> &str;
    fn state(&self) -> LifecycleState;
    fn install(&self) -> Result<(), LifecycleError>;
    fn uninstall(&self) -> Result<TeardownReport, LifecycleError>;
}

impl<B: CommandBehavior> ManagedCommand for CommandLifecycle<B> {
    fn command_id(&self) -> &str {
        CommandLifecycle::command_id(self)
    }

    fn state(&self) -> LifecycleState {
        CommandLifecycle::state(self)
    }

    fn install(&self) -> Result<(), LifecycleError> {
        CommandLifecycle::install(self)
    }

    fn uninstall(&self) -> Result<TeardownReport, LifecycleError> {
        CommandLifecycle::uninstall(self)
    }
}

/// Outcome of [`ExtensionRegistry::start`].
#[derive(Debug, Default)]
pub struct StartReport {
    pub installed: Vec<String>,
    pub failed: Vec<(String, LifecycleError)>,
}

impl StartReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of [`ExtensionRegistry::stop`].
#[derive(Debug, Default)]
pub struct StopReport {
    pub uninstalled: Vec<String>,
    /// Commands whose teardown left resources behind or failed outright.
    pub incomplete: Vec<(String, String)>,
}

/// Commands of one extension, started and stopped together.
/// 同一擴充功能中一起啟動與停止的命令。
#[derive(Default)]
pub struct ExtensionRegistry {
    commands: Vec<Box<dyn ManagedCommand>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a command. Ids must be unique.
    pub fn register(
        &mut self,
        command: impl ManagedCommand + 'static,
    ) -> Result<(), LifecycleError> {
        if self.get(command.command_id()).is_some() {
            return Err(LifecycleError::DuplicateCommand(
                command.command_id().to_string(),
            ));
        }
        self.commands.push(Box::new(command));
        Ok(())
    }

    pub fn get(&self, command_id: &str) -> Option<&dyn ManagedCommand> {
        self.commands
            .iter()
            .find(|command| command.command_id() == command_id)
            .map(|command| &**command)
    }

    pub fn command_ids(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|command| command.command_id().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Installs every command in registration order. A failing command is
    /// logged and reported; the others still install.
    /// 依註冊順序安裝所有命令；單一命令失敗不影響其他命令。
    pub fn start(&self) -> StartReport {
        let mut report = StartReport::default();
        for command in &self.commands {
            let id = command.command_id().to_string();
            match command.install() {
                Ok(()) => report.installed.push(id),
                Err(err) => {
                    error!(command = %id, error = %err, "command failed to install");
                    report.failed.push((id, err));
                }
            }
        }
        info!(
            installed = report.installed.len(),
            failed = report.failed.len(),
            "extension started"
        );
        report
    }

    /// Uninstalls every command in reverse order, tolerating missing resources.
    /// 以相反順序解除安裝所有命令，容忍已不存在的資源。
    pub fn stop(&self) -> StopReport {
        let mut report = StopReport::default();
        for command in self.commands.iter().rev() {
            let id = command.command_id().to_string();
            match command.uninstall() {
                Ok(teardown) if teardown.is_complete() => report.uninstalled.push(id),
                Ok(teardown) => {
                    let summary = teardown
                        .failures
                        .iter()
                        .map(|failure| format!("{}: {}", failure.target, failure.error))
                        .collect::<Vec<_>>()
                        .join("; ");
                    report.uninstalled.push(id.clone());
                    report.incomplete.push((id, summary));
                }
                Err(err) => {
                    warn!(command = %id, error = %err, "command failed to uninstall");
                    report.incomplete.push((id, err.to_string()));
                }
            }
        }
        info!(
            uninstalled = report.uninstalled.len(),
            incomplete = report.incomplete.len(),
            "extension stopped"
        );
        report
    }
}
