use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::value::{SettingValue, SettingsMap};

/// Current on-disk schema version of a settings document.
/// 設定文件目前的結構版本。
pub const SETTINGS_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("settings document {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize settings {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no value or default for setting '{0}'")]
    MissingKey(String),
    #[error("setting '{key}' holds a {found}, expected a {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct PersistedDocument {
    #[serde(default)]
    version: u32,
    #[serde(rename = "userSettings", default)]
    user_settings: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct PersistedDocumentRef<'a> {
    version: u32,
    #[serde(rename = "userSettings")]
    user_settings: &'a SettingsMap,
}

/// 預設值與使用者覆寫值的疊加。 / Compiled defaults overlaid by user overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsDocument {
    defaults: SettingsMap,
    overrides: SettingsMap,
}

impl SettingsDocument {
    pub fn new(defaults: SettingsMap) -> Self {
        Self {
            defaults,
            overrides: SettingsMap::new(),
        }
    }

    /// Override when present, otherwise the compiled default.
    /// 若有覆寫值則回傳之，否則回傳預設值。
    pub fn effective(&self, key: &str) -> Option<&SettingValue> {
        self.overrides.get(key).or_else(|| self.defaults.get(key))
    }

    /// Flattened view of every effective setting.
    pub fn effective_map(&self) -> SettingsMap {
        let mut merged = self.defaults.clone();
        for (key, value) in &self.overrides {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    pub fn is_overridden(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
    }
}

/// JSON-backed settings store shared by every session of a command family.
/// 以 JSON 保存、供同一命令家族所有工作階段共用的設定儲存區。
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    document: SettingsDocument,
    recovered: bool,
}

impl SettingsStore {
    /// Loads overrides from `path`, falling back to `defaults` when the file is
    /// missing or malformed. Only genuine I/O failures are returned.
    /// 從 `path` 載入覆寫值；檔案不存在或格式錯誤時改用預設值，僅回報實際 I/O 錯誤。
    pub fn load(path: impl AsRef<Path>, defaults: SettingsMap) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let mut document = SettingsDocument::new(defaults);
        if !path.exists() {
            debug!(path = %path.display(), "settings file absent; using compiled defaults");
            return Ok(Self {
                path,
                document,
                recovered: false,
            });
        }

        match read_overrides(&path) {
            Ok(overrides) => {
                document.overrides = overrides;
                Ok(Self {
                    path,
                    document,
                    recovered: false,
                })
            }
            Err(err @ SettingsError::Malformed { .. }) => {
                warn!(error = %err, "discarding malformed settings document");
                Ok(Self {
                    path,
                    document,
                    recovered: true,
                })
            }
            Err(err) => Err(err),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &SettingsDocument {
        &self.document
    }

    /// True when the last load discarded a malformed document.
    pub fn recovered_from_malformed(&self) -> bool {
        self.recovered
    }

    pub fn get(&self, key: &str) -> Result<&SettingValue, SettingsError> {
        self.document
            .effective(key)
            .ok_or_else(|| SettingsError::MissingKey(key.to_string()))
    }

    pub fn get_str(&self, key: &str) -> Result<&str, SettingsError> {
        let value = self.get(key)?;
        value.as_str().ok_or_else(|| mismatch(key, "string", value))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, SettingsError> {
        let value = self.get(key)?;
        value.as_bool().ok_or_else(|| mismatch(key, "bool", value))
    }

    pub fn get_number(&self, key: &str) -> Result<f64, SettingsError> {
        let value = self.get(key)?;
        value.as_f64().ok_or_else(|| mismatch(key, "number", value))
    }

    /// Stores an override and persists the whole document before returning.
    /// 寫入覆寫值，並在回傳前同步保存整份文件。
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<SettingValue>,
    ) -> Result<(), SettingsError> {
        self.set_many([(key.into(), value.into())])
    }

    /// Applies several overrides with a single persist. On a failed write the
    /// in-memory overrides are restored so memory never runs ahead of disk.
    pub fn set_many<I, K, V>(&mut self, entries: I) -> Result<(), SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SettingValue>,
    {
        let previous = self.document.overrides.clone();
        for (key, value) in entries {
            self.document.overrides.insert(key.into(), value.into());
        }
        self.commit(previous)
    }

    /// Drops an override so the compiled default applies again.
    pub fn reset(&mut self, key: &str) -> Result<bool, SettingsError> {
        let previous = self.document.overrides.clone();
        if self.document.overrides.remove(key).is_none() {
            return Ok(false);
        }
        self.commit(previous).map(|_| true)
    }

    fn commit(&mut self, previous: SettingsMap) -> Result<(), SettingsError> {
        match self.save() {
            Ok(()) => {
                self.recovered = false;
                Ok(())
            }
            Err(err) => {
                self.document.overrides = previous;
                Err(err)
            }
        }
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let payload = serde_json::to_string_pretty(&PersistedDocumentRef {
            version: SETTINGS_VERSION,
            user_settings: &self.document.overrides,
        })
        .map_err(|source| SettingsError::Serialize {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, payload.as_bytes())
    }
}

fn mismatch(key: &str, expected: &'static str, found: &SettingValue) -> SettingsError {
    SettingsError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

fn read_overrides(path: &Path) -> Result<SettingsMap, SettingsError> {
    let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let persisted: PersistedDocument =
        serde_json::from_str(&contents).map_err(|source| SettingsError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(migrate(persisted, path))
}

/// Upgrades legacy documents (no `version`) and keeps scalar values only.
fn migrate(persisted: PersistedDocument, path: &Path) -> SettingsMap {
    if persisted.version == 0 {
        debug!(path = %path.display(), "upgrading unversioned settings document");
    } else if persisted.version > SETTINGS_VERSION {
        warn!(
            path = %path.display(),
            version = persisted.version,
            "settings document is newer than this build; reading known values only"
        );
    }

    let mut overrides = SettingsMap::new();
    for (key, raw) in persisted.user_settings {
        match SettingValue::from_json(raw) {
            Some(value) => {
                overrides.insert(key, value);
            }
            None => warn!(path = %path.display(), key = %key, "dropping non-scalar setting"),
        }
    }
    overrides
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| SettingsError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data).map_err(|source| SettingsError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn defaults() -> SettingsMap {
        let mut map = SettingsMap::new();
        map.insert("displayName".into(), "NC Program".into());
        map.insert("createFolder".into(), false.into());
        map
    }

    #[test]
    fn effective_prefers_override() {
        let mut document = SettingsDocument::new(defaults());
        assert_eq!(
            document.effective("displayName"),
            Some(&SettingValue::from("NC Program"))
        );
        document
            .overrides
            .insert("displayName".into(), "Roughing".into());
        assert_eq!(
            document.effective("displayName"),
            Some(&SettingValue::from("Roughing"))
        );
        assert!(document.is_overridden("displayName"));
        assert!(!document.is_overridden("createFolder"));
        assert_eq!(document.effective_map().len(), 2);
    }

    #[test]
    fn set_writes_versioned_document_without_tmp_leftovers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("defaults.json");
        let mut store = SettingsStore::load(&path, defaults()).unwrap();
        store.set("comment", "first op").unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["userSettings"]["comment"], "first op");
        assert!(raw["userSettings"].get("displayName").is_none());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn legacy_document_drops_non_scalars() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("defaults.json");
        fs::write(
            &path,
            r#"{"userSettings": {"name": "1001", "tags": ["a"], "filePath": null}}"#,
        )
        .unwrap();

        let store = SettingsStore::load(&path, defaults()).unwrap();
        assert_eq!(store.get_str("name").unwrap(), "1001");
        assert!(matches!(
            store.get("tags"),
            Err(SettingsError::MissingKey(key)) if key == "tags"
        ));
        assert!(store.get("filePath").is_err());
    }

    #[test]
    fn failed_write_rolls_back_memory() {
        let dir = tempdir().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("blocked.json");
        fs::create_dir_all(&path).unwrap();
        let mut store = SettingsStore {
            path: path.clone(),
            document: SettingsDocument::new(defaults()),
            recovered: false,
        };
        assert!(store.set("displayName", "X").is_err());
        assert_eq!(store.get_str("displayName").unwrap(), "NC Program");
    }
}
