use cambench_resources::{LeafDescriptor, Placement};
use cambench_settings::SettingsMap;
use std::path::PathBuf;

/// Settings file a command family reads at session start.
/// 命令家族於工作階段開始時讀取的設定檔。
#[derive(Clone, Debug, PartialEq)]
pub struct SettingsSpec {
    pub path: PathBuf,
    pub defaults: SettingsMap,
}

impl SettingsSpec {
    pub fn new(path: impl Into<PathBuf>, defaults: SettingsMap) -> Self {
        Self {
            path: path.into(),
            defaults,
        }
    }
}

/// Immutable identity of a command, built once when the extension loads.
/// 命令的不可變識別資料，於擴充功能載入時建立一次。
#[derive(Clone, Debug, PartialEq)]
pub struct CommandDescriptor {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub placement: Placement,
    pub promoted: bool,
    pub resource_folder: Option<PathBuf>,
    pub tooltip_image: Option<PathBuf>,
    pub settings: Option<SettingsSpec>,
}

impl CommandDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        placement: Placement,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: String::new(),
            placement,
            promoted: false,
            resource_folder: None,
            tooltip_image: None,
            settings: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn promoted(mut self, promoted: bool) -> Self {
        self.promoted = promoted;
        self
    }

    pub fn with_resources(mut self, folder: impl Into<PathBuf>) -> Self {
        self.resource_folder = Some(folder.into());
        self
    }

    pub fn with_tooltip_image(mut self, image: impl Into<PathBuf>) -> Self {
        self.tooltip_image = Some(image.into());
        self
    }

    pub fn with_settings(mut self, settings: SettingsSpec) -> Self {
        self.settings = Some(settings);
        self
    }

    pub(crate) fn leaf(&self) -> LeafDescriptor {
        LeafDescriptor {
            command_id: self.id.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            promoted: self.promoted,
            resource_folder: self.resource_folder.clone(),
            tooltip_image: self.tooltip_image.clone(),
        }
    }
}
