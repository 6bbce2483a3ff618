//! Add-in level configuration: identity and where commands are placed.
//! 外掛層級設定：識別資訊與命令放置位置。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_VERSION: u32 = 1;

/// Panel key for general CAM helpers.
pub const CAM_UTILS_PANEL: &str = "camUtils";
/// Panel key for post-processing helpers.
pub const POST_UTILS_PANEL: &str = "postUtils";

#[derive(Debug, Error)]
pub enum AddinConfigError {
    #[error("failed to read add-in config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse add-in config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddinConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_addin_name")]
    pub addin_name: String,
    #[serde(default = "default_company_name")]
    pub company_name: String,
    #[serde(default = "default_workspace_id")]
    pub workspace_id: String,
    #[serde(default)]
    pub tab: TabConfig,
    #[serde(default = "default_panels")]
    pub panels: BTreeMap<String, PanelConfig>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_addin_name() -> String {
    "CamUtilities".to_string()
}

fn default_company_name() -> String {
    "DSI".to_string()
}

fn default_workspace_id() -> String {
    "CAMEnvironment".to_string()
}

fn default_panels() -> BTreeMap<String, PanelConfig> {
    let addin = default_addin_name();
    let mut panels = BTreeMap::new();
    panels.insert(
        CAM_UTILS_PANEL.to_string(),
        PanelConfig::new(panel_id(&addin, CAM_UTILS_PANEL), "CAM UTILITIES"),
    );
    panels.insert(
        POST_UTILS_PANEL.to_string(),
        PanelConfig::new(panel_id(&addin, POST_UTILS_PANEL), "POST UTILITIES"),
    );
    panels
}

fn panel_id(addin: &str, key: &str) -> String {
    format!("{addin}_{key}_panel")
}

impl Default for AddinConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            debug: false,
            addin_name: default_addin_name(),
            company_name: default_company_name(),
            workspace_id: default_workspace_id(),
            tab: TabConfig::default(),
            panels: default_panels(),
        }
    }
}

impl AddinConfig {
    /// 載入設定；檔案不存在時使用預設值。 / Loads the config, using defaults when missing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AddinConfigError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path).map_err(|source| AddinConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let mut config: AddinConfig =
            serde_json::from_str(&contents).map_err(|source| AddinConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        config.sanitize();
        Ok(config)
    }

    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = CONFIG_VERSION;
        }
        if self.addin_name.trim().is_empty() {
            self.addin_name = default_addin_name();
        }
        if self.company_name.trim().is_empty() {
            self.company_name = default_company_name();
        }
        if self.workspace_id.trim().is_empty() {
            self.workspace_id = default_workspace_id();
        }
        self.tab.sanitize();
        for (key, panel) in self.panels.iter_mut() {
            if panel.id.trim().is_empty() {
                panel.id = panel_id(&self.addin_name, key);
            }
            if panel.name.trim().is_empty() {
                panel.name = key.to_uppercase();
            }
        }
    }

    /// Globally unique command id: `<company>_<addin>_<local>`.
    /// 全域唯一的命令識別碼。
    pub fn command_id(&self, local: &str) -> String {
        format!("{}_{}_{}", self.company_name, self.addin_name, local)
    }

    pub fn panel(&self, key: &str) -> Option<&PanelConfig> {
        self.panels.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabConfig {
    pub id: String,
    pub name: String,
}

impl Default for TabConfig {
    fn default() -> Self {
        Self {
            id: "CAM_UTILITIES_cam_tab".to_string(),
            name: "CAM UTILITIES".to_string(),
        }
    }
}

impl TabConfig {
    fn sanitize(&mut self) {
        let defaults = TabConfig::default();
        if self.id.trim().is_empty() {
            self.id = defaults.id;
        }
        if self.name.trim().is_empty() {
            self.name = defaults.name;
        }
    }
}

/// Group (panel) placement inside the add-in tab.
/// 外掛分頁中的群組（面板）位置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub insert_after: Option<String>,
}

impl PanelConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            insert_after: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_cam_defaults() {
        let dir = tempdir().unwrap();
        let config = AddinConfig::load(dir.path().join("addin.json")).unwrap();
        assert_eq!(config.workspace_id, "CAMEnvironment");
        assert_eq!(config.tab.id, "CAM_UTILITIES_cam_tab");
        assert_eq!(
            config.panel(POST_UTILS_PANEL).map(|panel| panel.id.as_str()),
            Some("CamUtilities_postUtils_panel")
        );
        assert_eq!(
            config.command_id("setNcProgramDefaults"),
            "DSI_CamUtilities_setNcProgramDefaults"
        );
    }

    #[test]
    fn sanitize_repairs_blank_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("addin.json");
        fs::write(
            &path,
            r#"{
                "version": 0,
                "addin_name": "Shop",
                "company_name": " ",
                "tab": { "id": "", "name": "Shop Tools" },
                "panels": { "probe": { "id": "", "name": "" } }
            }"#,
        )
        .unwrap();

        let config = AddinConfig::load(&path).unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.company_name, "DSI");
        assert_eq!(config.tab.id, "CAM_UTILITIES_cam_tab");
        assert_eq!(config.tab.name, "Shop Tools");
        let probe = config.panel("probe").unwrap();
        assert_eq!(probe.id, "Shop_probe_panel");
        assert_eq!(probe.name, "PROBE");
        assert!(!config.debug);
    }
}
