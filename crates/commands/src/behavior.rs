use cambench_host::{
    Host, InputChange, InputSpec, InputValue, SelectionRef, SessionToken, TerminationReason,
};
use cambench_settings::{SettingsError, SettingsStore};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by command behaviors inside a session. None of them ends the
/// session.
/// 命令行為在工作階段中產生的錯誤；皆不會結束工作階段。
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("input '{0}' is not handled by this command")]
    UnknownInput(String),
    #[error("input '{id}' expected a {expected} value")]
    InvalidInput { id: String, expected: &'static str },
    #[error("nothing selected for '{0}'")]
    MissingSelection(String),
    #[error("the selected '{0}' is no longer valid, please select it again")]
    StaleHandle(String),
    #[error("{0}")]
    Invalid(String),
    #[error("this command has no settings store")]
    NoSettings,
    #[error("operation failed: {0}")]
    DomainOperationFailed(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Input type for commands without dialog inputs.
#[derive(Debug)]
pub enum NoInputs {}

impl TryFrom<InputChange> for NoInputs {
    type Error = CommandError;

    fn try_from(change: InputChange) -> Result<Self, Self::Error> {
        Err(CommandError::UnknownInput(change.id))
    }
}

/// Command-specific part of a lifecycle: which inputs to show, how to react to
/// edits and what to do on execute.
/// 生命週期中屬於個別命令的部分：顯示哪些輸入、如何回應編輯、執行時做什麼。
pub trait CommandBehavior: 'static {
    /// Typed view of the inputs this command declares.
    type Input: TryFrom<InputChange, Error = CommandError>;

    fn build_inputs(
        &mut self,
        ctx: &mut SessionContext<'_>,
    ) -> Result<Vec<InputSpec>, CommandError>;

    fn input_changed(
        &mut self,
        _input: Self::Input,
        _ctx: &mut SessionContext<'_>,
    ) -> Result<(), CommandError> {
        Ok(())
    }

    /// Returning an error disables the confirmation action.
    fn validate(&self, _ctx: &SessionContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn execute(&mut self, ctx: &mut SessionContext<'_>) -> Result<(), CommandError>;

    fn session_ended(&mut self, _reason: TerminationReason) {}
}

/// What a behavior sees of the running session.
/// 命令行為可存取的工作階段內容。
pub struct SessionContext<'s> {
    host: &'s dyn Host,
    token: SessionToken,
    inputs: &'s mut BTreeMap<String, InputValue>,
    settings: Option<&'s mut SettingsStore>,
}

impl<'s> SessionContext<'s> {
    pub(crate) fn new(
        host: &'s dyn Host,
        token: SessionToken,
        inputs: &'s mut BTreeMap<String, InputValue>,
        settings: Option<&'s mut SettingsStore>,
    ) -> Self {
        Self {
            host,
            token,
            inputs,
            settings,
        }
    }

    pub fn host(&self) -> &dyn Host {
        self.host
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn input(&self, id: &str) -> Option<&InputValue> {
        self.inputs.get(id)
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        self.input(id).and_then(InputValue::as_text)
    }

    pub fn toggle(&self, id: &str) -> Option<bool> {
        self.input(id).and_then(InputValue::as_toggle)
    }

    /// Updates an input from the framework side and mirrors it into the dialog.
    pub fn set_input(&mut self, id: &str, value: InputValue) {
        self.host.update_input(self.token, id, &value);
        self.inputs.insert(id.to_string(), value);
    }

    /// Picked entity of a selection input, checked against the host.
    /// 取得選取輸入所指的實體，並向主機確認其仍有效。
    pub fn selection(&self, id: &str) -> Result<&SelectionRef, CommandError> {
        match self.input(id) {
            Some(InputValue::Selection(Some(selection))) => {
                if self.host.is_selection_valid(selection) {
                    Ok(selection)
                } else {
                    Err(CommandError::StaleHandle(selection.label.clone()))
                }
            }
            Some(InputValue::Selection(None)) | None => {
                Err(CommandError::MissingSelection(id.to_string()))
            }
            Some(_) => Err(CommandError::InvalidInput {
                id: id.to_string(),
                expected: "selection",
            }),
        }
    }

    pub fn settings(&self) -> Option<&SettingsStore> {
        self.settings.as_deref()
    }

    pub fn settings_mut(&mut self) -> Result<&mut SettingsStore, CommandError> {
        self.settings.as_deref_mut().ok_or(CommandError::NoSettings)
    }

    /// Fails with [`CommandError::StaleHandle`] when any picked entity has gone stale.
    pub(crate) fn check_selections(&self) -> Result<(), CommandError> {
        for value in self.inputs.values() {
            if let InputValue::Selection(Some(selection)) = value {
                if !self.host.is_selection_valid(selection) {
                    return Err(CommandError::StaleHandle(selection.label.clone()));
                }
            }
        }
        Ok(())
    }
}
