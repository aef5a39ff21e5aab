//! Console FTP data types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ConsoleError;

/// Address of a console's FTP server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteAddress {
    /// Host name or IP address
    pub host: String,
    /// FTP control port
    pub port: u16,
}

impl RemoteAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host` or `host:port`, falling back to `default_port`.
    pub fn parse_with_port(raw: &str, default_port: u16) -> Result<Self, ConsoleError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConsoleError::ConnectionError("empty host address".into()));
        }

        match raw.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !host.contains(':') => {
                let port = port.parse::<u16>().map_err(|_| {
                    ConsoleError::ConnectionError(format!("invalid port in {}", raw))
                })?;
                Ok(Self::new(host, port))
            }
            _ => Ok(Self::new(raw, default_port)),
        }
    }
}

impl FromStr for RemoteAddress {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_port(s, constants::DEFAULT_FTP_PORT)
    }
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Kind of a directory listing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Link,
    Unknown,
}

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Entry name (not full path)
    pub name: String,
    /// Entry kind
    pub kind: EntryKind,
    /// Size in bytes (0 for directories)
    pub size: u64,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: 0,
        }
    }
}

/// Lifecycle of a [`RemoteSession`](super::session::RemoteSession)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
}

/// Constants for console FTP operations
pub mod constants {
    /// Standard FTP control port
    pub const DEFAULT_FTP_PORT: u16 = 21;

    /// Connect timeout (10 s)
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Per-operation timeout: one command, listing or transfer chunk (5 min)
    pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 300;

    /// Transfer chunk size (64 KB)
    pub const TRANSFER_CHUNK_SIZE: usize = 64 * 1024;

    /// Removable storage mount points, checked in order
    pub const USB_MOUNT_POINTS: [&str; 2] = ["/dev_usb000/", "/dev_usb001/"];

    /// Root holding one directory per user profile
    pub const PROFILE_ROOT: &str = "/dev_hdd0/home/";

    /// Directory the console installs package files from
    pub const PACKAGE_DIR: &str = "/dev_hdd0/packages";

    /// Installer package extension
    pub const PACKAGE_EXTENSION: &str = ".pkg";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let a: RemoteAddress = "192.168.1.50".parse().unwrap();
        assert_eq!(a, RemoteAddress::new("192.168.1.50", 21));

        let a: RemoteAddress = "ps3.lan:2121".parse().unwrap();
        assert_eq!(a, RemoteAddress::new("ps3.lan", 2121));
        assert_eq!(a.to_string(), "ps3.lan:2121");
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        assert!("".parse::<RemoteAddress>().is_err());
        assert!("ps3.lan:ftp".parse::<RemoteAddress>().is_err());
    }

    #[test]
    fn test_entry_kind_serializes_lowercase() {
        let json = serde_json::to_string(&RemoteEntry::directory("game")).unwrap();
        assert!(json.contains("\"kind\":\"directory\""));
    }
}
