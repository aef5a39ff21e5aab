//! Configuration storage
//!
//! One JSON file: `~/.consolemod/config.json`, or
//! `%APPDATA%\ConsoleMod\config.json` on Windows. Files written before the
//! format carried a version keep the console settings flat at the top level
//! and are migrated when loaded.

use std::path::PathBuf;

use serde_json::{Map, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

use super::types::{ConfigFile, ConsoleConfig, CONFIG_VERSION};

/// Configuration storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config version {found} is newer than supported {supported}")]
    VersionTooNew { found: u64, supported: u32 },
}

/// Default config file location
pub fn config_file() -> Result<PathBuf, StorageError> {
    let app_dir = if cfg!(windows) {
        dirs::config_dir().map(|dir| dir.join("ConsoleMod"))
    } else {
        None
    };

    app_dir
        .or_else(|| dirs::home_dir().map(|home| home.join(".consolemod")))
        .map(|dir| dir.join("config.json"))
        .ok_or(StorageError::NoConfigDir)
}

/// Reads and writes the config file
pub struct ConfigStorage {
    path: PathBuf,
}

impl ConfigStorage {
    /// Storage at the default location
    pub fn open_default() -> Result<Self, StorageError> {
        Ok(Self::at(config_file()?))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the config.
    ///
    /// A missing file yields defaults. An unreadable file is moved aside and
    /// replaced by defaults; a file from a newer version is an error.
    pub async fn load(&self) -> Result<ConfigFile, StorageError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {:?}, using defaults", self.path);
                return Ok(ConfigFile::default());
            }
            Err(e) => return Err(e.into()),
        };

        let decoded = serde_json::from_str::<Value>(&raw)
            .map_err(StorageError::from)
            .and_then(decode);
        match decoded {
            Ok(config) => Ok(config),
            Err(StorageError::Json(e)) => self.quarantine(e).await,
            Err(e) => Err(e),
        }
    }

    /// Write the config through a temp file and rename
    pub async fn save(&self, config: &ConfigFile) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(config)?;

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }

    /// Record the console last talked to. Returns `true` if the file changed.
    pub async fn remember_host(&self, host: &str) -> Result<bool, StorageError> {
        let mut config = self.load().await?;
        if config.last_host.as_deref() == Some(host) {
            return Ok(false);
        }
        config.last_host = Some(host.to_string());
        self.save(&config).await?;
        Ok(true)
    }

    async fn quarantine(&self, cause: serde_json::Error) -> Result<ConfigFile, StorageError> {
        let target = self.path.with_extension(format!(
            "json.corrupt.{}",
            chrono::Utc::now().format("%Y%m%d_%H%M%S")
        ));

        match fs::rename(&self.path, &target).await {
            Ok(()) => warn!(
                "Config {:?} unreadable ({}), moved to {:?}; using defaults",
                self.path, cause, target
            ),
            Err(e) => error!("Config {:?} unreadable ({}) and could not be moved: {}", self.path, cause, e),
        }
        Ok(ConfigFile::default())
    }
}

fn decode(value: Value) -> Result<ConfigFile, StorageError> {
    match value.get("version").and_then(Value::as_u64) {
        Some(found) if found > u64::from(CONFIG_VERSION) => Err(StorageError::VersionTooNew {
            found,
            supported: CONFIG_VERSION,
        }),
        Some(_) => Ok(serde_json::from_value(value)?),
        None => match value {
            Value::Object(fields) if !fields.contains_key("console") => migrate_flat(fields),
            other => Ok(serde_json::from_value(other)?),
        },
    }
}

/// Unversioned file: console settings at the top level
fn migrate_flat(mut fields: Map<String, Value>) -> Result<ConfigFile, StorageError> {
    let last_host = match fields.remove("last_host") {
        Some(host) => serde_json::from_value(host)?,
        None => None,
    };
    let console: ConsoleConfig = serde_json::from_value(Value::Object(fields))?;
    debug!("Migrated unversioned config to version {}", CONFIG_VERSION);

    Ok(ConfigFile {
        version: CONFIG_VERSION,
        console,
        last_host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp = tempdir().unwrap();
        let storage = ConfigStorage::at(temp.path().join("config.json"));

        let config = storage.load().await.unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.console, ConsoleConfig::default());
        assert!(config.last_host.is_none());
    }

    #[tokio::test]
    async fn test_save_creates_directory_and_reloads() {
        let temp = tempdir().unwrap();
        let storage = ConfigStorage::at(temp.path().join("nested").join("config.json"));

        let mut config = ConfigFile::default();
        config.console.port = 2121;
        storage.save(&config).await.unwrap();

        assert_eq!(storage.load().await.unwrap().console.port, 2121);
        assert!(!temp.path().join("nested").join("config.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_flat_unversioned_file_is_migrated() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"port": 2121, "last_host": "192.168.1.20", "strict_listing": true}"#)
            .unwrap();

        let config = ConfigStorage::at(path).load().await.unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.console.port, 2121);
        assert!(config.console.strict_listing);
        assert_eq!(config.console.package_dir, "/dev_hdd0/packages");
        assert_eq!(config.last_host.as_deref(), Some("192.168.1.20"));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_moved_aside() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let storage = ConfigStorage::at(path.clone());

        assert_eq!(storage.load().await.unwrap().console, ConsoleConfig::default());
        assert!(!path.exists());
        let moved = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("corrupt"))
            .count();
        assert_eq!(moved, 1);
    }

    #[tokio::test]
    async fn test_wrongly_typed_field_is_moved_aside() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"version": 1, "console": {"port": "twenty-one"}}"#).unwrap();

        let config = ConfigStorage::at(path.clone()).load().await.unwrap();
        assert_eq!(config.console.port, 21);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_newer_version_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"version": 99}"#).unwrap();

        assert!(matches!(
            ConfigStorage::at(path.clone()).load().await,
            Err(StorageError::VersionTooNew { found: 99, .. })
        ));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_remember_host_writes_only_on_change() {
        let temp = tempdir().unwrap();
        let storage = ConfigStorage::at(temp.path().join("config.json"));

        assert!(storage.remember_host("192.168.1.50").await.unwrap());
        assert!(!storage.remember_host("192.168.1.50").await.unwrap());
        assert!(storage.remember_host("ps3.lan:2121").await.unwrap());
        assert_eq!(
            storage.load().await.unwrap().last_host.as_deref(),
            Some("ps3.lan:2121")
        );
    }
}
