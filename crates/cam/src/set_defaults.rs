//! "Set NC Program Defaults": edits the NC-program settings family.
//! 「設定 NC 程式預設值」：編輯 NC 程式設定。

use cambench_commands::{CommandBehavior, CommandError, SessionContext};
use cambench_host::{InputChange, InputSpec, InputValue};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::defaults::{self, NcProgramDefaults};

pub const COMMAND: &str = "setNcProgramDefaults";
pub const SELECT_FOLDER: &str = "selectFolder";

/// Inputs of the defaults dialog.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultsInput {
    DisplayName(String),
    Name(String),
    Filename(String),
    Comment(String),
    CreateFolder(bool),
    OutputFolder(String),
    /// The folder-picker button was pressed (or reset).
    SelectFolder(bool),
    FilePath(String),
}

impl TryFrom<InputChange> for DefaultsInput {
    type Error = CommandError;

    fn try_from(change: InputChange) -> Result<Self, Self::Error> {
        let InputChange { id, value } = change;
        let input = match (id.as_str(), value) {
            (defaults::DISPLAY_NAME, InputValue::Text(text)) => DefaultsInput::DisplayName(text),
            (defaults::NAME, InputValue::Text(text)) => DefaultsInput::Name(text),
            (defaults::FILENAME, InputValue::Text(text)) => DefaultsInput::Filename(text),
            (defaults::COMMENT, InputValue::Text(text)) => DefaultsInput::Comment(text),
            (defaults::OUTPUT_FOLDER, InputValue::Text(text)) => DefaultsInput::OutputFolder(text),
            (defaults::FILE_PATH, InputValue::Text(text)) => DefaultsInput::FilePath(text),
            (defaults::CREATE_FOLDER, InputValue::Toggle(flag)) => {
                DefaultsInput::CreateFolder(flag)
            }
            (SELECT_FOLDER, InputValue::Toggle(flag)) => DefaultsInput::SelectFolder(flag),
            (
                defaults::DISPLAY_NAME
                | defaults::NAME
                | defaults::FILENAME
                | defaults::COMMENT
                | defaults::OUTPUT_FOLDER
                | defaults::FILE_PATH,
                _,
            ) => {
                return Err(CommandError::InvalidInput {
                    id: id.clone(),
                    expected: "text",
                })
            }
            (defaults::CREATE_FOLDER | SELECT_FOLDER, _) => {
                return Err(CommandError::InvalidInput {
                    id: id.clone(),
                    expected: "toggle",
                })
            }
            _ => return Err(CommandError::UnknownInput(id.clone())),
        };
        Ok(input)
    }
}

/// Dialog that shows the stored defaults and writes them back on OK.
#[derive(Debug, Default)]
pub struct SetDefaultsCommand {
    saved: usize,
}

impl SetDefaultsCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves since the extension started.
    pub fn saved(&self) -> usize {
        self.saved
    }

    fn collect(ctx: &SessionContext<'_>) -> NcProgramDefaults {
        let text = |id: &str| ctx.text(id).unwrap_or_default().to_string();
        let file_path = text(defaults::FILE_PATH);
        NcProgramDefaults {
            display_name: text(defaults::DISPLAY_NAME),
            name: text(defaults::NAME),
            filename: text(defaults::FILENAME),
            comment: text(defaults::COMMENT),
            create_folder: ctx.toggle(defaults::CREATE_FOLDER).unwrap_or(false),
            output_folder: text(defaults::OUTPUT_FOLDER),
            file_path: (!file_path.trim().is_empty()).then(|| PathBuf::from(file_path.trim())),
        }
    }
}

impl CommandBehavior for SetDefaultsCommand {
    type Input = DefaultsInput;

    fn build_inputs(
        &mut self,
        ctx: &mut SessionContext<'_>,
    ) -> Result<Vec<InputSpec>, CommandError> {
        let store = ctx.settings().ok_or(CommandError::NoSettings)?;
        let current = NcProgramDefaults::from_store(store)?;
        let file_path = current
            .file_path
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        Ok(vec![
            InputSpec::new(
                defaults::DISPLAY_NAME,
                "Display Name",
                InputValue::Text(current.display_name),
            ),
            InputSpec::new(
                defaults::NAME,
                "Program Name",
                InputValue::Text(current.name),
            ),
            InputSpec::new(
                defaults::FILENAME,
                "File Name",
                InputValue::Text(current.filename),
            ),
            InputSpec::new(
                defaults::COMMENT,
                "Program Comment",
                InputValue::Text(current.comment),
            ),
            InputSpec::new(
                defaults::CREATE_FOLDER,
                "Create new folder?",
                InputValue::Toggle(current.create_folder),
            ),
            InputSpec::new(
                defaults::OUTPUT_FOLDER,
                "Folder Name",
                InputValue::Text(current.output_folder),
            ),
            InputSpec::new(
                SELECT_FOLDER,
                "Select save folder",
                InputValue::Toggle(false),
            ),
            InputSpec::new(
                defaults::FILE_PATH,
                "Folder Path",
                InputValue::Text(file_path),
            )
            .read_only(),
        ])
    }

    fn input_changed(
        &mut self,
        input: DefaultsInput,
        ctx: &mut SessionContext<'_>,
    ) -> Result<(), CommandError> {
        if let DefaultsInput::SelectFolder(true) = input {
            match ctx.host().choose_folder("Select save folder") {
                Some(folder) => {
                    debug!(folder = %folder.display(), "save folder chosen");
                    ctx.set_input(
                        defaults::FILE_PATH,
                        InputValue::Text(folder.display().to_string()),
                    );
                }
                None => debug!("folder picker dismissed"),
            }
            ctx.set_input(SELECT_FOLDER, InputValue::Toggle(false));
        }
        Ok(())
    }

    fn validate(&self, ctx: &SessionContext<'_>) -> Result<(), CommandError> {
        let values = Self::collect(ctx);
        if values.name.trim().is_empty() {
            return Err(CommandError::Invalid("Program Name is required".into()));
        }
        if values.create_folder && values.output_folder.trim().is_empty() {
            return Err(CommandError::Invalid(
                "Folder Name is required when creating a new folder".into(),
            ));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut SessionContext<'_>) -> Result<(), CommandError> {
        let values = Self::collect(ctx);
        let store = ctx.settings_mut()?;
        store.set_many(values.to_settings())?;
        self.saved += 1;
        info!(path = %store.path().display(), "NC program defaults saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_are_typed_by_id() {
        let change = InputChange::new(defaults::CREATE_FOLDER, InputValue::Toggle(true));
        assert_eq!(
            DefaultsInput::try_from(change).unwrap(),
            DefaultsInput::CreateFolder(true)
        );

        let wrong = InputChange::new(defaults::NAME, InputValue::Toggle(true));
        assert!(matches!(
            DefaultsInput::try_from(wrong),
            Err(CommandError::InvalidInput {
                expected: "text",
                ..
            })
        ));

        let unknown = InputChange::new("rope_dia", InputValue::Distance(1.0));
        assert!(matches!(
            DefaultsInput::try_from(unknown),
            Err(CommandError::UnknownInput(id)) if id == "rope_dia"
        ));
    }
}
