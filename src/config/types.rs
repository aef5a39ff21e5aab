//! Configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ftp::path_utils::DEFAULT_ROOT;
use crate::ftp::types::constants;

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// On-disk configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Console connection and layout settings
    #[serde(default)]
    pub console: ConsoleConfig,

    /// Last console address used, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_host: Option<String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            console: ConsoleConfig::default(),
            last_host: None,
        }
    }
}

/// Console connection settings and filesystem layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// FTP port (default: 21)
    #[serde(default = "default_port")]
    pub port: u16,

    /// FTP user (console servers accept anonymous logins)
    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Timeout for a single command, listing or transfer chunk
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,

    /// Directory used for paths without a separator
    #[serde(default = "default_root")]
    pub default_root: String,

    /// Removable storage mount points, checked in order
    #[serde(default = "default_usb_mount_points")]
    pub usb_mount_points: Vec<String>,

    /// Directory holding one subdirectory per user profile
    #[serde(default = "default_profile_root")]
    pub profile_root: String,

    /// Directory the console installs packages from
    #[serde(default = "default_package_dir")]
    pub package_dir: String,

    /// Package file extension, including the dot
    #[serde(default = "default_package_extension")]
    pub package_extension: String,

    /// Fail listings that contain unrecognized entries instead of skipping them
    #[serde(default)]
    pub strict_listing: bool,
}

impl ConsoleConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// True if `name` carries the package extension (case-insensitive)
    pub fn is_package_file(&self, name: &str) -> bool {
        let ext = self.package_extension.to_ascii_lowercase();
        name.len() > ext.len() && name.to_ascii_lowercase().ends_with(&ext)
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            username: default_username(),
            password: default_password(),
            connect_timeout_secs: default_connect_timeout(),
            operation_timeout_secs: default_operation_timeout(),
            default_root: default_root(),
            usb_mount_points: default_usb_mount_points(),
            profile_root: default_profile_root(),
            package_dir: default_package_dir(),
            package_extension: default_package_extension(),
            strict_listing: false,
        }
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_port() -> u16 {
    constants::DEFAULT_FTP_PORT
}

fn default_username() -> String {
    "anonymous".to_string()
}

fn default_password() -> String {
    "anonymous".to_string()
}

fn default_connect_timeout() -> u64 {
    constants::DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_operation_timeout() -> u64 {
    constants::DEFAULT_OPERATION_TIMEOUT_SECS
}

fn default_root() -> String {
    DEFAULT_ROOT.to_string()
}

fn default_usb_mount_points() -> Vec<String> {
    constants::USB_MOUNT_POINTS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_profile_root() -> String {
    constants::PROFILE_ROOT.to_string()
}

fn default_package_dir() -> String {
    constants::PACKAGE_DIR.to_string()
}

fn default_package_extension() -> String {
    constants::PACKAGE_EXTENSION.to_string()
}
