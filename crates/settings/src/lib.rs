//! Persisted user settings and add-in configuration for CamBench.
//! CamBench 的使用者設定保存與外掛組態。

pub mod addin;
pub mod store;
pub mod value;

pub use addin::{
    AddinConfig, AddinConfigError, PanelConfig, TabConfig, CAM_UTILS_PANEL, POST_UTILS_PANEL,
};
pub use store::{SettingsDocument, SettingsError, SettingsStore, SETTINGS_VERSION};
pub use value::{SettingValue, SettingsMap};
