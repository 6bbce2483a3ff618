//! Typed view of the NC-program settings family.
//! NC 程式設定家族的型別化檢視。

use cambench_settings::{SettingValue, SettingsError, SettingsMap, SettingsStore};
use std::path::{Path, PathBuf};

pub const DISPLAY_NAME: &str = "displayName";
pub const NAME: &str = "name";
pub const FILENAME: &str = "filename";
pub const COMMENT: &str = "comment";
pub const CREATE_FOLDER: &str = "createFolder";
pub const OUTPUT_FOLDER: &str = "outputFolder";
pub const FILE_PATH: &str = "filePath";

/// User defaults applied to newly created NC programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NcProgramDefaults {
    pub display_name: String,
    pub name: String,
    pub filename: String,
    pub comment: String,
    pub create_folder: bool,
    /// Sub-folder created under `file_path` when `create_folder` is set.
    pub output_folder: String,
    pub file_path: Option<PathBuf>,
}

impl Default for NcProgramDefaults {
    fn default() -> Self {
        Self {
            display_name: "NC Program".to_string(),
            name: "1001".to_string(),
            filename: "1001".to_string(),
            comment: String::new(),
            create_folder: false,
            output_folder: "NC Programs".to_string(),
            file_path: None,
        }
    }
}

impl NcProgramDefaults {
    /// Compiled defaults layer for [`SettingsStore::load`].
    pub fn compiled() -> SettingsMap {
        Self::default().to_settings()
    }

    pub fn from_store(store: &SettingsStore) -> Result<Self, SettingsError> {
        let file_path = store.get_str(FILE_PATH)?.trim();
        Ok(Self {
            display_name: store.get_str(DISPLAY_NAME)?.to_string(),
            name: store.get_str(NAME)?.to_string(),
            filename: store.get_str(FILENAME)?.to_string(),
            comment: store.get_str(COMMENT)?.to_string(),
            create_folder: store.get_bool(CREATE_FOLDER)?,
            output_folder: store.get_str(OUTPUT_FOLDER)?.to_string(),
            file_path: (!file_path.is_empty()).then(|| PathBuf::from(file_path)),
        })
    }

    pub fn to_settings(&self) -> SettingsMap {
        let file_path = self
            .file_path
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        [
            (DISPLAY_NAME, SettingValue::from(self.display_name.as_str())),
            (NAME, SettingValue::from(self.name.as_str())),
            (FILENAME, SettingValue::from(self.filename.as_str())),
            (COMMENT, SettingValue::from(self.comment.as_str())),
            (CREATE_FOLDER, SettingValue::from(self.create_folder)),
            (
                OUTPUT_FOLDER,
                SettingValue::from(self.output_folder.as_str()),
            ),
            (FILE_PATH, SettingValue::from(file_path)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
    }

    /// Folder NC programs are posted to, falling back to the user's desktop.
    /// 程式輸出資料夾；未設定路徑時使用桌面。
    pub fn output_folder(&self) -> PathBuf {
        let desktop = dirs::desktop_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Desktop")))
            .unwrap_or_else(|| PathBuf::from("."));
        self.output_folder_from(&desktop)
    }

    pub fn output_folder_from(&self, desktop: &Path) -> PathBuf {
        match &self.file_path {
            Some(base) if self.create_folder && !self.output_folder.trim().is_empty() => {
                base.join(self.output_folder.trim())
            }
            Some(base) => base.clone(),
            None => desktop.to_path_buf(),
        }
    }
}
