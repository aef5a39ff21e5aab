//! In-memory console
//!
//! A [`Connector`] backed by an in-process filesystem that behaves like the
//! console's FTP server: `MKD` on an existing directory fails, `CWD` into a
//! missing directory fails, listings carry `.` and `..`. Used for tests and
//! dry runs without hardware.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::client::{Connector, RemoteClient};
use super::error::ConsoleError;
use super::path_utils::{is_absolute_remote_path, join_remote_path, SEPARATOR};
use super::types::{RemoteAddress, RemoteEntry};

/// Where the synthetic `.`/`..` entries appear in listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyntheticEntries {
    #[default]
    Leading,
    Trailing,
    Absent,
}

#[derive(Debug, Default)]
struct ConsoleState {
    directories: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    /// Entries that are not plain files or directories, keyed by directory
    extra_entries: BTreeMap<String, Vec<RemoteEntry>>,
    synthetic: SyntheticEntries,
    unreachable: bool,
    delay: Option<Duration>,
    connections_opened: usize,
    connections_active: usize,
    largest_chunk: usize,
}

/// Shared handle to an in-memory console filesystem
#[derive(Debug, Clone)]
pub struct MemoryConsole {
    state: Arc<Mutex<ConsoleState>>,
}

impl MemoryConsole {
    /// Empty console with only `/`
    pub fn new() -> Self {
        let mut state = ConsoleState::default();
        state.directories.insert(SEPARATOR.to_string());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Create a directory and all of its parents
    pub fn add_directory(&self, path: &str) {
        let mut state = self.state.lock();
        let key = dir_key(path);
        let mut current = String::new();
        for part in key.split(SEPARATOR).filter(|p| !p.is_empty()) {
            current = join_remote_path(if current.is_empty() { "/" } else { &current }, part);
            state.directories.insert(current.clone());
        }
    }

    /// Create a file, adding its parent directories
    pub fn add_file(&self, path: &str, content: &[u8]) {
        let (dir, _) = split_file_key(path);
        self.add_directory(&dir);
        self.state.lock().files.insert(file_key(path), content.to_vec());
    }

    /// Add a raw listing entry (links, unrecognized lines) to a directory
    pub fn add_entry(&self, dir: &str, entry: RemoteEntry) {
        self.add_directory(dir);
        self.state
            .lock()
            .extra_entries
            .entry(dir_key(dir))
            .or_default()
            .push(entry);
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(&file_key(path)).cloned()
    }

    pub fn has_directory(&self, path: &str) -> bool {
        self.state.lock().directories.contains(&dir_key(path))
    }

    /// Number of files anywhere on the console
    pub fn file_count(&self) -> usize {
        self.state.lock().files.len()
    }

    /// Refuse every connection attempt
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Delay applied before every client operation
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().delay = delay;
    }

    pub fn set_synthetic_entries(&self, synthetic: SyntheticEntries) {
        self.state.lock().synthetic = synthetic;
    }

    /// Largest single chunk a client has written
    pub fn largest_chunk(&self) -> usize {
        self.state.lock().largest_chunk
    }

    /// Connections ever established
    pub fn connections_opened(&self) -> usize {
        self.state.lock().connections_opened
    }

    /// Connections established and not yet released
    pub fn open_connections(&self) -> usize {
        self.state.lock().connections_active
    }
}

impl Default for MemoryConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryConsole {
    async fn connect(&self, address: &RemoteAddress) -> Result<Box<dyn RemoteClient>, ConsoleError> {
        let delay = {
            let mut state = self.state.lock();
            if state.unreachable {
                return Err(ConsoleError::ConnectionError(format!(
                    "{}: connection refused",
                    address
                )));
            }
            state.connections_opened += 1;
            state.connections_active += 1;
            state.delay
        };

        // Registered before the delay so a timed-out connect still releases it
        let client = MemoryClient {
            state: self.state.clone(),
            cwd: SEPARATOR.to_string(),
            upload: None,
            download: None,
            released: false,
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Box::new(client))
    }
}

struct MemoryClient {
    state: Arc<Mutex<ConsoleState>>,
    cwd: String,
    /// File key and bytes received so far
    upload: Option<(String, Vec<u8>)>,
    /// File content and read offset
    download: Option<(Vec<u8>, usize)>,
    released: bool,
}

impl MemoryClient {
    async fn pause(&self) -> Result<(), ConsoleError> {
        if self.released {
            return Err(ConsoleError::ConnectionError("connection released".into()));
        }
        let delay = self.state.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    fn absolute(&self, path: &str) -> String {
        if is_absolute_remote_path(path) {
            path.to_string()
        } else {
            join_remote_path(&self.cwd, path)
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            let mut state = self.state.lock();
            state.connections_active = state.connections_active.saturating_sub(1);
        }
    }
}

impl Drop for MemoryClient {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl RemoteClient for MemoryClient {
    async fn directory_exists(&mut self, path: &str) -> Result<bool, ConsoleError> {
        self.pause().await?;
        let key = dir_key(&self.absolute(path));
        Ok(self.state.lock().directories.contains(&key))
    }

    async fn create_directory(&mut self, path: &str) -> Result<(), ConsoleError> {
        self.pause().await?;
        let key = dir_key(&self.absolute(path));
        let (parent, _) = split_file_key(&key);
        let mut state = self.state.lock();
        if state.directories.contains(&key) {
            return Err(ConsoleError::TransferError(format!("550 {}: file exists", key)));
        }
        if !state.directories.contains(&dir_key(&parent)) {
            return Err(ConsoleError::TransferError(format!(
                "550 {}: no such directory",
                parent
            )));
        }
        state.directories.insert(key);
        Ok(())
    }

    async fn set_current_directory(&mut self, path: &str) -> Result<(), ConsoleError> {
        self.pause().await?;
        let key = dir_key(&self.absolute(path));
        if !self.state.lock().directories.contains(&key) {
            return Err(ConsoleError::TransferError(format!(
                "550 {}: no such directory",
                key
            )));
        }
        self.cwd = key;
        Ok(())
    }

    async fn file_exists(&mut self, name: &str) -> Result<bool, ConsoleError> {
        self.pause().await?;
        let key = file_key(&self.absolute(name));
        Ok(self.state.lock().files.contains_key(&key))
    }

    async fn begin_put(&mut self, name: &str) -> Result<(), ConsoleError> {
        self.pause().await?;
        let key = file_key(&self.absolute(name));
        let (dir, _) = split_file_key(&key);
        if !self.state.lock().directories.contains(&dir_key(&dir)) {
            return Err(ConsoleError::TransferError(format!("553 {}: no such directory", dir)));
        }
        self.upload = Some((key, Vec::new()));
        Ok(())
    }

    async fn write_chunk(&mut self, chunk: Vec<u8>) -> Result<(), ConsoleError> {
        self.pause().await?;
        let (_, data) = self
            .upload
            .as_mut()
            .ok_or_else(|| ConsoleError::TransferError("no upload in progress".into()))?;
        data.extend_from_slice(&chunk);
        let mut state = self.state.lock();
        state.largest_chunk = state.largest_chunk.max(chunk.len());
        Ok(())
    }

    async fn finish_put(&mut self) -> Result<(), ConsoleError> {
        self.pause().await?;
        let (key, data) = self
            .upload
            .take()
            .ok_or_else(|| ConsoleError::TransferError("no upload in progress".into()))?;
        self.state.lock().files.insert(key, data);
        Ok(())
    }

    async fn begin_get(&mut self, name: &str) -> Result<(), ConsoleError> {
        self.pause().await?;
        let key = file_key(&self.absolute(name));
        let data = self
            .state
            .lock()
            .files
            .get(&key)
            .cloned()
            .ok_or_else(|| ConsoleError::TransferError(format!("550 {}: no such file", key)))?;
        self.download = Some((data, 0));
        Ok(())
    }

    async fn read_chunk(&mut self, max_len: usize) -> Result<Vec<u8>, ConsoleError> {
        self.pause().await?;
        let (data, offset) = self
            .download
            .as_mut()
            .ok_or_else(|| ConsoleError::TransferError("no download in progress".into()))?;
        let end = (*offset + max_len).min(data.len());
        let chunk = data[*offset..end].to_vec();
        *offset = end;
        Ok(chunk)
    }

    async fn finish_get(&mut self) -> Result<(), ConsoleError> {
        self.pause().await?;
        self.download
            .take()
            .map(|_| ())
            .ok_or_else(|| ConsoleError::TransferError("no download in progress".into()))
    }

    async fn remove_file(&mut self, name: &str) -> Result<(), ConsoleError> {
        self.pause().await?;
        let key = file_key(&self.absolute(name));
        self.state
            .lock()
            .files
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| ConsoleError::TransferError(format!("550 {}: no such file", key)))
    }

    async fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, ConsoleError> {
        self.pause().await?;
        let key = dir_key(&self.absolute(path));
        let state = self.state.lock();
        if !state.directories.contains(&key) {
            return Err(ConsoleError::TransferError(format!(
                "550 {}: no such directory",
                key
            )));
        }

        let mut entries: Vec<RemoteEntry> = state
            .directories
            .iter()
            .filter(|d| *d != &key && split_file_key(d).0 == key)
            .map(|d| RemoteEntry::directory(split_file_key(d).1))
            .collect();
        entries.extend(
            state
                .files
                .iter()
                .filter(|(f, _)| split_file_key(f).0 == key)
                .map(|(f, data)| RemoteEntry::file(split_file_key(f).1, data.len() as u64)),
        );
        if let Some(extra) = state.extra_entries.get(&key) {
            entries.extend(extra.iter().cloned());
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let synthetic = vec![RemoteEntry::directory("."), RemoteEntry::directory("..")];
        match state.synthetic {
            SyntheticEntries::Leading => Ok(synthetic.into_iter().chain(entries).collect()),
            SyntheticEntries::Trailing => Ok(entries.into_iter().chain(synthetic).collect()),
            SyntheticEntries::Absent => Ok(entries),
        }
    }

    async fn disconnect(&mut self) -> Result<(), ConsoleError> {
        self.upload = None;
        self.download = None;
        self.release();
        Ok(())
    }
}

/// Absolute directory key without trailing separator (`/` for the root)
fn dir_key(path: &str) -> String {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        SEPARATOR.to_string()
    } else if is_absolute_remote_path(trimmed) {
        trimmed.to_string()
    } else {
        format!("{}{}", SEPARATOR, trimmed)
    }
}

fn file_key(path: &str) -> String {
    let (dir, name) = split_file_key(path);
    join_remote_path(&dir, &name)
}

/// Split an absolute key into (parent directory key, last component)
fn split_file_key(path: &str) -> (String, String) {
    let key = dir_key(path);
    match key.rfind(SEPARATOR) {
        Some(0) => (SEPARATOR.to_string(), key[1..].to_string()),
        Some(idx) => (key[..idx].to_string(), key[idx + 1..].to_string()),
        None => (SEPARATOR.to_string(), key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftp::types::EntryKind;

    fn address() -> RemoteAddress {
        RemoteAddress::new("memory", 21)
    }

    #[tokio::test]
    async fn test_listing_reports_children_with_synthetic_entries() {
        let console = MemoryConsole::new();
        console.add_file("/dev_hdd0/packages/a.pkg", b"abc");
        console.add_directory("/dev_hdd0/packages/sub");

        let mut client = console.connect(&address()).await.unwrap();
        let entries = client.list("/dev_hdd0/packages").await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".", "..", "a.pkg", "sub"]);
        assert_eq!(entries[2].size, 3);
        assert_eq!(entries[3].kind, EntryKind::Directory);
    }

    #[tokio::test]
    async fn test_mkdir_behaves_like_ftp() {
        let console = MemoryConsole::new();
        let mut client = console.connect(&address()).await.unwrap();

        assert!(client.create_directory("/a/b").await.is_err());
        client.create_directory("/a").await.unwrap();
        assert!(client.create_directory("/a/").await.is_err());
        client.create_directory("/a/b").await.unwrap();
        assert!(console.has_directory("/a/b/"));
    }

    #[tokio::test]
    async fn test_connection_accounting() {
        let console = MemoryConsole::new();
        {
            let _dropped = console.connect(&address()).await.unwrap();
            assert_eq!(console.open_connections(), 1);
        }
        assert_eq!(console.open_connections(), 0);

        let mut client = console.connect(&address()).await.unwrap();
        client.disconnect().await.unwrap();
        client.disconnect().await.unwrap();
        assert_eq!(console.open_connections(), 0);
        assert_eq!(console.connections_opened(), 2);
    }

    #[tokio::test]
    async fn test_chunked_put_lands_on_finish() {
        let console = MemoryConsole::new();
        console.add_directory("/dev_hdd0");
        let mut client = console.connect(&address()).await.unwrap();

        client.set_current_directory("/dev_hdd0").await.unwrap();
        client.begin_put("a.bin").await.unwrap();
        client.write_chunk(vec![1, 2]).await.unwrap();
        client.write_chunk(vec![3]).await.unwrap();
        assert!(console.file("/dev_hdd0/a.bin").is_none());
        client.finish_put().await.unwrap();

        assert_eq!(console.file("/dev_hdd0/a.bin").unwrap(), vec![1, 2, 3]);
        assert_eq!(console.largest_chunk(), 2);
    }

    #[test]
    fn test_split_file_key() {
        assert_eq!(split_file_key("/a.pkg"), ("/".into(), "a.pkg".into()));
        assert_eq!(
            split_file_key("/dev_hdd0/home/"),
            ("/dev_hdd0".into(), "home".into())
        );
    }
}
