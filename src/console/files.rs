//! Host-level console file operations
//!
//! Every call opens its own [`RemoteSession`], performs one operation and
//! closes the session again, whatever the outcome.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::ConsoleConfig;
use crate::ftp::client::{Connector, FtpConnector};
use crate::ftp::error::ConsoleError;
use crate::ftp::session::RemoteSession;
use crate::ftp::types::{RemoteAddress, RemoteEntry};

/// Entry point for console file operations
#[derive(Clone)]
pub struct ConsoleFiles {
    connector: Arc<dyn Connector>,
    config: Arc<ConsoleConfig>,
}

impl ConsoleFiles {
    pub fn new(connector: Arc<dyn Connector>, config: ConsoleConfig) -> Self {
        Self {
            connector,
            config: Arc::new(config),
        }
    }

    /// Talk to real consoles over FTP
    pub fn ftp(config: ConsoleConfig) -> Self {
        let connector = FtpConnector::from_config(&config);
        Self::new(Arc::new(connector), config)
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Parse `host` or `host:port` using the configured port as default
    pub fn address(&self, raw: &str) -> Result<RemoteAddress, ConsoleError> {
        RemoteAddress::parse_with_port(raw, self.config.port)
    }

    /// Open a session the caller is responsible for closing
    pub async fn open(&self, host: &RemoteAddress) -> Result<RemoteSession, ConsoleError> {
        RemoteSession::open(self.connector.as_ref(), host, &self.config).await
    }

    pub async fn upload_file(
        &self,
        host: &RemoteAddress,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<u64, ConsoleError> {
        let mut session = self.open(host).await?;
        let result = session.upload_file(local_path, remote_path).await;
        session.close().await;
        result
    }

    /// Returns `false` when the file was already absent
    pub async fn delete_file(&self, host: &RemoteAddress, remote_path: &str) -> Result<bool, ConsoleError> {
        let mut session = self.open(host).await?;
        let result = session.delete_file(remote_path).await;
        session.close().await;
        result
    }

    pub async fn download_file(
        &self,
        host: &RemoteAddress,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<u64, ConsoleError> {
        let mut session = self.open(host).await?;
        let result = session.download_file(remote_path, local_path).await;
        session.close().await;
        result
    }

    pub async fn file_exists(&self, host: &RemoteAddress, remote_path: &str) -> Result<bool, ConsoleError> {
        let mut session = self.open(host).await?;
        let result = session.file_exists(remote_path).await;
        session.close().await;
        result
    }

    pub async fn directory_exists(&self, host: &RemoteAddress, path: &str) -> Result<bool, ConsoleError> {
        let mut session = self.open(host).await?;
        let result = session.directory_exists(path).await;
        session.close().await;
        result
    }

    /// Child directory names of `parent_path`, without `.` and `..`
    pub async fn list_child_directories(
        &self,
        host: &RemoteAddress,
        parent_path: &str,
    ) -> Result<Vec<String>, ConsoleError> {
        let mut session = self.open(host).await?;
        let result = session.list_directories(parent_path).await;
        session.close().await;
        result
    }

    pub async fn list_entries(&self, host: &RemoteAddress, path: &str) -> Result<Vec<RemoteEntry>, ConsoleError> {
        let mut session = self.open(host).await?;
        let result = session.list_entries(path).await;
        session.close().await;
        if let Ok(entries) = &result {
            info!("Listed {} entries in {} on {}", entries.len(), path, host);
        }
        result
    }
}
