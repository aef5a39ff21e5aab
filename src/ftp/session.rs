//! Console session management
//!
//! A [`RemoteSession`] is one connection to one console, opened for a single
//! logical operation and closed right after it. Every remote call, and every
//! chunk of a transfer, is bounded by the configured operation timeout; a
//! timed-out call drops the transport immediately so nothing stays half-open.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::client::{Connector, RemoteClient};
use super::error::ConsoleError;
use super::path_utils::{is_self_or_parent, join_remote_path, resolve_remote_path, ResolvedPath, SEPARATOR};
use super::types::{constants, EntryKind, RemoteAddress, RemoteEntry, SessionState};
use crate::config::ConsoleConfig;

/// Scoped connection to one console
pub struct RemoteSession {
    /// Session ID used in log lines
    id: String,
    address: RemoteAddress,
    /// `None` once the transport is released
    client: Option<Box<dyn RemoteClient>>,
    state: SessionState,
    default_root: String,
    operation_timeout: Duration,
    strict_listing: bool,
}

impl RemoteSession {
    /// Connect to `address`.
    ///
    /// Fails with `ConnectionError`, timeouts included, without ever reaching
    /// [`SessionState::Connected`].
    pub async fn open(
        connector: &dyn Connector,
        address: &RemoteAddress,
        config: &ConsoleConfig,
    ) -> Result<Self, ConsoleError> {
        let id = Uuid::new_v4().to_string();
        debug!("Session {} connecting to {}", id, address);

        let limit = config.connect_timeout();
        let client = match tokio::time::timeout(limit, connector.connect(address)).await {
            Ok(Ok(client)) => client,
            Ok(Err(e)) => {
                warn!("Session {} failed to connect to {}: {}", id, address, e);
                return Err(match e {
                    e if e.is_connection_failure() => e,
                    other => ConsoleError::ConnectionError(other.to_string()),
                });
            }
            Err(_) => {
                warn!("Session {} timed out connecting to {}", id, address);
                return Err(ConsoleError::timed_out(format_args!("connect to {}", address), limit));
            }
        };

        debug!("Session {} connected to {}", id, address);

        Ok(Self {
            id,
            address: address.clone(),
            client: Some(client),
            state: SessionState::Connected,
            default_root: config.default_root.clone(),
            operation_timeout: config.operation_timeout(),
            strict_listing: config.strict_listing,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Split a console path using this session's default root
    pub fn resolve(&self, remote_path: &str) -> ResolvedPath {
        resolve_remote_path(remote_path, &self.default_root)
    }

    /// Upload a local file, creating the remote directory when missing.
    ///
    /// The file is streamed in fixed-size chunks. An existing remote file is
    /// overwritten. Returns bytes written.
    pub async fn upload_file(&mut self, local_path: &Path, remote_path: &str) -> Result<u64, ConsoleError> {
        let resolved = self.resolve(remote_path);
        let file_name = resolved.require_file_name()?.to_string();

        let mut local = fs::File::open(local_path).await.map_err(|e| {
            ConsoleError::TransferError(format!("open {}: {}", local_path.display(), e))
        })?;

        self.ensure_directory(&resolved.directory).await?;
        self.set_current_directory(&resolved.directory).await?;
        self.begin_put(&file_name).await?;

        let mut buffer = vec![0u8; constants::TRANSFER_CHUNK_SIZE];
        let mut transferred = 0u64;
        loop {
            let n = match local.read(&mut buffer).await {
                Ok(n) => n,
                Err(e) => {
                    let err = ConsoleError::TransferError(format!("read {}: {}", local_path.display(), e));
                    return Err(self.abandon_transfer(err));
                }
            };
            if n == 0 {
                break;
            }
            self.write_chunk(buffer[..n].to_vec()).await?;
            transferred += n as u64;
        }
        self.finish_put().await?;

        info!(
            "Session {} uploaded {} bytes to {}",
            self.id,
            transferred,
            resolved.full_path()
        );
        Ok(transferred)
    }

    /// Delete a remote file if it exists.
    ///
    /// Returns `false` when there was nothing to delete.
    pub async fn delete_file(&mut self, remote_path: &str) -> Result<bool, ConsoleError> {
        let resolved = self.resolve(remote_path);
        let file_name = resolved.require_file_name()?.to_string();

        if !self.remote_directory_exists(&resolved.directory).await? {
            debug!("Session {}: {} absent, nothing to delete", self.id, resolved.directory);
            return Ok(false);
        }
        self.set_current_directory(&resolved.directory).await?;

        if !self.remote_file_exists(&file_name).await? {
            debug!("Session {}: {} absent, nothing to delete", self.id, resolved.full_path());
            return Ok(false);
        }

        self.remove_file(&file_name).await?;
        info!("Session {} deleted {}", self.id, resolved.full_path());
        Ok(true)
    }

    /// Download a remote file, overwriting `local_path`. Returns bytes written.
    pub async fn download_file(&mut self, remote_path: &str, local_path: &Path) -> Result<u64, ConsoleError> {
        let resolved = self.resolve(remote_path);
        let file_name = resolved.require_file_name()?.to_string();

        if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                ConsoleError::TransferError(format!("create {}: {}", parent.display(), e))
            })?;
        }

        self.set_current_directory(&resolved.directory).await?;
        self.begin_get(&file_name).await?;

        let mut local = match fs::File::create(local_path).await {
            Ok(file) => file,
            Err(e) => {
                let err = ConsoleError::TransferError(format!("create {}: {}", local_path.display(), e));
                return Err(self.abandon_transfer(err));
            }
        };

        let mut transferred = 0u64;
        loop {
            let chunk = self.read_chunk(constants::TRANSFER_CHUNK_SIZE).await?;
            if chunk.is_empty() {
                break;
            }
            if let Err(e) = local.write_all(&chunk).await {
                let err = ConsoleError::TransferError(format!("write {}: {}", local_path.display(), e));
                return Err(self.abandon_transfer(err));
            }
            transferred += chunk.len() as u64;
        }
        if let Err(e) = local.flush().await {
            let err = ConsoleError::TransferError(format!("write {}: {}", local_path.display(), e));
            return Err(self.abandon_transfer(err));
        }
        self.finish_get().await?;

        info!(
            "Session {} downloaded {} bytes from {} to {}",
            self.id,
            transferred,
            resolved.full_path(),
            local_path.display()
        );
        Ok(transferred)
    }

    /// Check whether a remote file exists. Never creates anything.
    pub async fn file_exists(&mut self, remote_path: &str) -> Result<bool, ConsoleError> {
        let resolved = self.resolve(remote_path);
        let file_name = resolved.require_file_name()?.to_string();

        if !self.remote_directory_exists(&resolved.directory).await? {
            return Ok(false);
        }
        self.set_current_directory(&resolved.directory).await?;
        self.remote_file_exists(&file_name).await
    }

    /// Check whether the literal `path` is an existing directory.
    pub async fn directory_exists(&mut self, path: &str) -> Result<bool, ConsoleError> {
        self.remote_directory_exists(path).await
    }

    /// Names of the child directories of `parent_path`'s directory.
    ///
    /// `.` and `..` are dropped by name, wherever the server lists them.
    pub async fn list_directories(&mut self, parent_path: &str) -> Result<Vec<String>, ConsoleError> {
        let directory = self.resolve(parent_path).directory;
        self.set_current_directory(&directory).await?;

        let names: Vec<String> = self
            .list(&directory)
            .await?
            .into_iter()
            .filter(|entry| entry.kind == EntryKind::Directory && !is_self_or_parent(&entry.name))
            .map(|entry| entry.name)
            .collect();

        debug!("Session {} found {} directories in {}", self.id, names.len(), directory);
        Ok(names)
    }

    /// Entries of the literal directory `path`, without `.`/`..`.
    ///
    /// Unrecognized entries are skipped, or rejected with `UnknownEntry` when
    /// strict listing is configured.
    pub async fn list_entries(&mut self, path: &str) -> Result<Vec<RemoteEntry>, ConsoleError> {
        self.set_current_directory(path).await?;

        let mut entries = Vec::new();
        for entry in self.list(path).await? {
            if is_self_or_parent(&entry.name) {
                continue;
            }
            if entry.kind == EntryKind::Unknown {
                if self.strict_listing {
                    return Err(ConsoleError::UnknownEntry(entry.name));
                }
                debug!("Session {} skipping unrecognized entry {:?}", self.id, entry.name);
                continue;
            }
            entries.push(entry);
        }

        debug!("Session {} listed {} entries in {}", self.id, entries.len(), path);
        Ok(entries)
    }

    /// Release the connection.
    ///
    /// A failed disconnect is logged, not returned; the transport is dropped
    /// either way.
    pub async fn close(mut self) {
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        let Some(mut client) = self.client.take() else {
            self.state = SessionState::Idle;
            return;
        };

        self.state = SessionState::Disconnecting;
        match tokio::time::timeout(self.operation_timeout, client.disconnect()).await {
            Ok(Ok(())) => debug!("Session {} disconnected from {}", self.id, self.address),
            Ok(Err(e)) => warn!("Session {} disconnect from {} failed: {}", self.id, self.address, e),
            Err(_) => warn!("Session {} disconnect from {} timed out", self.id, self.address),
        }
        drop(client);
        self.state = SessionState::Idle;
    }

    /// Create `directory` and any missing parents.
    ///
    /// A directory that already exists, or appears while we create it, is
    /// not an error.
    async fn ensure_directory(&mut self, directory: &str) -> Result<(), ConsoleError> {
        if self.remote_directory_exists(directory).await? {
            return Ok(());
        }

        let mut current = SEPARATOR.to_string();
        for part in directory.split(SEPARATOR).filter(|p| !p.is_empty()) {
            current = join_remote_path(&current, part);
            if self.remote_directory_exists(&current).await? {
                continue;
            }

            debug!("Session {} creating directory {}", self.id, current);
            if let Err(e) = self.create_directory(&current).await {
                if e.is_connection_failure() || !self.remote_directory_exists(&current).await? {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn client(&mut self) -> Result<&mut Box<dyn RemoteClient>, ConsoleError> {
        let id = &self.id;
        self.client
            .as_mut()
            .ok_or_else(|| ConsoleError::ConnectionError(format!("session {} is closed", id)))
    }

    /// Drop the transport when the connection failed or timed out
    fn settle<T>(&mut self, result: Result<T, ConsoleError>) -> Result<T, ConsoleError> {
        if let Err(e) = &result {
            if e.is_connection_failure() {
                warn!("Session {} lost its connection ({}), releasing transport", self.id, e);
                self.release();
            }
        }
        result
    }

    /// Any failure mid-transfer leaves the server mid-command, so the
    /// transport is released whatever the error.
    fn settle_transfer<T>(&mut self, result: Result<T, ConsoleError>) -> Result<T, ConsoleError> {
        result.map_err(|e| self.abandon_transfer(e))
    }

    fn abandon_transfer(&mut self, err: ConsoleError) -> ConsoleError {
        warn!("Session {} transfer failed ({}), releasing transport", self.id, err);
        self.release();
        err
    }

    fn release(&mut self) {
        self.client = None;
        self.state = SessionState::Idle;
    }

    async fn remote_directory_exists(&mut self, path: &str) -> Result<bool, ConsoleError> {
        let limit = self.operation_timeout;
        let result = bounded(limit, "directory exists", self.client()?.directory_exists(path)).await;
        self.settle(result)
    }

    async fn create_directory(&mut self, path: &str) -> Result<(), ConsoleError> {
        let limit = self.operation_timeout;
        let result = bounded(limit, "create directory", self.client()?.create_directory(path)).await;
        self.settle(result)
    }

    async fn set_current_directory(&mut self, path: &str) -> Result<(), ConsoleError> {
        let limit = self.operation_timeout;
        let result = bounded(limit, "set directory", self.client()?.set_current_directory(path)).await;
        self.settle(result)
    }

    async fn remote_file_exists(&mut self, name: &str) -> Result<bool, ConsoleError> {
        let limit = self.operation_timeout;
        let result = bounded(limit, "file exists", self.client()?.file_exists(name)).await;
        self.settle(result)
    }

    async fn begin_put(&mut self, name: &str) -> Result<(), ConsoleError> {
        let limit = self.operation_timeout;
        let result = bounded(limit, "open upload", self.client()?.begin_put(name)).await;
        self.settle(result)
    }

    async fn write_chunk(&mut self, chunk: Vec<u8>) -> Result<(), ConsoleError> {
        let limit = self.operation_timeout;
        let result = bounded(limit, "upload chunk", self.client()?.write_chunk(chunk)).await;
        self.settle_transfer(result)
    }

    async fn finish_put(&mut self) -> Result<(), ConsoleError> {
        let limit = self.operation_timeout;
        let result = bounded(limit, "finish upload", self.client()?.finish_put()).await;
        self.settle_transfer(result)
    }

    async fn begin_get(&mut self, name: &str) -> Result<(), ConsoleError> {
        let limit = self.operation_timeout;
        let result = bounded(limit, "open download", self.client()?.begin_get(name)).await;
        self.settle(result)
    }

    async fn read_chunk(&mut self, max_len: usize) -> Result<Vec<u8>, ConsoleError> {
        let limit = self.operation_timeout;
        let result = bounded(limit, "download chunk", self.client()?.read_chunk(max_len)).await;
        self.settle_transfer(result)
    }

    async fn finish_get(&mut self) -> Result<(), ConsoleError> {
        let limit = self.operation_timeout;
        let result = bounded(limit, "finish download", self.client()?.finish_get()).await;
        self.settle_transfer(result)
    }

    async fn remove_file(&mut self, name: &str) -> Result<(), ConsoleError> {
        let limit = self.operation_timeout;
        let result = bounded(limit, "delete", self.client()?.remove_file(name)).await;
        self.settle(result)
    }

    async fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, ConsoleError> {
        let limit = self.operation_timeout;
        let result = bounded(limit, "list", self.client()?.list(path)).await;
        self.settle(result)
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        if self.client.take().is_some() {
            warn!(
                "Session {} to {} dropped without close, releasing transport",
                self.id, self.address
            );
        }
    }
}

async fn bounded<T>(
    limit: Duration,
    op: &str,
    fut: impl Future<Output = Result<T, ConsoleError>>,
) -> Result<T, ConsoleError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ConsoleError::timed_out(op, limit))?
}
