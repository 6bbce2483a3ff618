//! Command lifecycle and extension registry.
//! 命令生命週期與擴充功能登錄。
//!
//! A [`CommandLifecycle`] owns one command's menu control and event handlers
//! and drives its interactive sessions; a [`CommandBehavior`] supplies the
//! command-specific dialog inputs and execute step. The [`ExtensionRegistry`]
//! starts and stops all commands of an extension together.

mod behavior;
mod descriptor;
mod extension;
mod lifecycle;

use cambench_events::RegistryError;
use cambench_resources::ResourceError;
use thiserror::Error;

pub use behavior::{CommandBehavior, CommandError, NoInputs, SessionContext};
pub use descriptor::{CommandDescriptor, SettingsSpec};
pub use extension::{ExtensionRegistry, ManagedCommand, StartReport, StopReport};
pub use lifecycle::{CommandLifecycle, LifecycleState, SessionSnapshot, SessionSummary};

/// Errors surfaced by install, uninstall and registration.
/// 安裝、解除安裝與註冊時回報的錯誤。
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("command '{command}' could not be provisioned")]
    Provision {
        command: String,
        #[source]
        source: ResourceError,
    },
    #[error("command '{command}' could not subscribe to its created event")]
    Subscribe {
        command: String,
        #[source]
        source: RegistryError,
    },
    #[error("command '{0}' is busy handling a host event")]
    Busy(String),
    #[error("command '{0}' is already registered")]
    DuplicateCommand(String),
}
