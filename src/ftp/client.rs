//! Remote file-transfer client seam
//!
//! [`Connector`] opens one [`RemoteClient`] per session. The production
//! implementation speaks FTP through `suppaftp`; its blocking calls run on the
//! tokio blocking pool so the async caller can bound each one with a timeout.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use suppaftp::types::FileType as FtpFileType;
use suppaftp::{FtpError, FtpStream, Status};
use tracing::{debug, info, warn};

use super::error::ConsoleError;
use super::types::{EntryKind, RemoteAddress, RemoteEntry};
use crate::config::ConsoleConfig;

/// Primitive operations a console's file server offers.
///
/// File names passed to `file_exists`, `begin_put`, `begin_get` and
/// `remove_file` are relative to the current directory. Transfers are
/// chunked: `begin_put`, any number of `write_chunk`, then `finish_put`
/// (and likewise `begin_get`, `read_chunk` until it returns nothing,
/// `finish_get`).
#[async_trait]
pub trait RemoteClient: Send {
    async fn directory_exists(&mut self, path: &str) -> Result<bool, ConsoleError>;

    async fn create_directory(&mut self, path: &str) -> Result<(), ConsoleError>;

    async fn set_current_directory(&mut self, path: &str) -> Result<(), ConsoleError>;

    async fn file_exists(&mut self, name: &str) -> Result<bool, ConsoleError>;

    /// Open `name` for writing, replacing any existing file
    async fn begin_put(&mut self, name: &str) -> Result<(), ConsoleError>;

    async fn write_chunk(&mut self, chunk: Vec<u8>) -> Result<(), ConsoleError>;

    async fn finish_put(&mut self) -> Result<(), ConsoleError>;

    async fn begin_get(&mut self, name: &str) -> Result<(), ConsoleError>;

    /// Up to `max_len` bytes; empty at end of file
    async fn read_chunk(&mut self, max_len: usize) -> Result<Vec<u8>, ConsoleError>;

    async fn finish_get(&mut self) -> Result<(), ConsoleError>;

    async fn remove_file(&mut self, name: &str) -> Result<(), ConsoleError>;

    /// Raw listing, including whatever self/parent entries the server sends
    async fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, ConsoleError>;

    /// Release the transport. Calling it twice is a no-op.
    async fn disconnect(&mut self) -> Result<(), ConsoleError>;
}

/// Opens transport connections to console hosts
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: &RemoteAddress) -> Result<Box<dyn RemoteClient>, ConsoleError>;
}

/// Connector for the console's FTP server
#[derive(Debug, Clone)]
pub struct FtpConnector {
    username: String,
    password: String,
    io_timeout: Duration,
}

impl FtpConnector {
    pub fn new(username: impl Into<String>, password: impl Into<String>, io_timeout: Duration) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            io_timeout,
        }
    }

    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self::new(
            config.username.clone(),
            config.password.clone(),
            config.operation_timeout(),
        )
    }
}

#[async_trait]
impl Connector for FtpConnector {
    async fn connect(&self, address: &RemoteAddress) -> Result<Box<dyn RemoteClient>, ConsoleError> {
        let target = address.clone();
        let username = self.username.clone();
        let password = self.password.clone();
        let io_timeout = self.io_timeout;

        debug!("Connecting to FTP server at {}", target);

        let (stream, control) = tokio::task::spawn_blocking(
            move || -> Result<(FtpStream, TcpStream), ConsoleError> {
                let socket = (target.host.as_str(), target.port)
                    .to_socket_addrs()
                    .map_err(|e| ConsoleError::ConnectionError(format!("{}: {}", target, e)))?
                    .next()
                    .ok_or_else(|| {
                        ConsoleError::ConnectionError(format!("{}: no address resolved", target))
                    })?;

                let mut ftp = FtpStream::connect_timeout(socket, io_timeout)?;
                let control = ftp.get_ref().try_clone().map_err(connection_io)?;
                control
                    .set_read_timeout(Some(io_timeout))
                    .and_then(|_| control.set_write_timeout(Some(io_timeout)))
                    .map_err(connection_io)?;

                ftp.login(username.as_str(), password.as_str())
                    .map_err(|e| ConsoleError::ConnectionError(format!("login rejected: {}", e)))?;
                ftp.transfer_type(FtpFileType::Binary)?;

                Ok((ftp, control))
            },
        )
        .await
        .map_err(|e| ConsoleError::ConnectionError(format!("connect worker failed: {}", e)))??;

        info!("Connected to FTP server at {}", address);

        Ok(Box::new(FtpClient {
            stream: Some(stream),
            upload: None,
            download: None,
            control,
            data: None,
            io_timeout,
            address: address.clone(),
        }))
    }
}

/// One FTP control connection
pub struct FtpClient {
    /// `None` once released, or while a blocking call holds the stream
    stream: Option<FtpStream>,
    upload: Option<Box<dyn Write + Send>>,
    download: Option<Box<dyn Read + Send>>,
    /// Handles on the sockets a worker may be blocked on; shut down on drop
    control: TcpStream,
    data: Option<TcpStream>,
    io_timeout: Duration,
    address: RemoteAddress,
}

impl FtpClient {
    /// Run a blocking FTP exchange on the control stream.
    async fn run<T, F>(&mut self, op: &'static str, f: F) -> Result<T, ConsoleError>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> Result<T, ConsoleError> + Send + 'static,
    {
        let stream = self.stream.take().ok_or_else(|| {
            ConsoleError::ConnectionError(format!("{}: connection to {} released", op, self.address))
        })?;
        let (stream, result) = on_worker(op, stream, f).await?;
        self.stream = Some(stream);
        result
    }

    /// Keep a handle on a freshly opened data connection
    fn track_data_socket(&mut self, socket: TcpStream) -> Result<(), ConsoleError> {
        socket
            .set_read_timeout(Some(self.io_timeout))
            .and_then(|_| socket.set_write_timeout(Some(self.io_timeout)))
            .map_err(transfer_io)?;
        self.data = Some(socket);
        Ok(())
    }
}

#[async_trait]
impl RemoteClient for FtpClient {
    async fn directory_exists(&mut self, path: &str) -> Result<bool, ConsoleError> {
        let path = path.to_string();
        self.run("directory_exists", move |ftp| {
            let previous = ftp.pwd()?;
            match ftp.cwd(&path) {
                Ok(()) => {
                    ftp.cwd(&previous)?;
                    Ok(true)
                }
                Err(e) if is_unavailable(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn create_directory(&mut self, path: &str) -> Result<(), ConsoleError> {
        let path = path.to_string();
        self.run("create_directory", move |ftp| Ok(ftp.mkdir(&path)?))
            .await
    }

    async fn set_current_directory(&mut self, path: &str) -> Result<(), ConsoleError> {
        let path = path.to_string();
        self.run("set_current_directory", move |ftp| Ok(ftp.cwd(&path)?))
            .await
    }

    async fn file_exists(&mut self, name: &str) -> Result<bool, ConsoleError> {
        let name = name.to_string();
        self.run("file_exists", move |ftp| {
            let lines = ftp.list(None)?;
            Ok(lines
                .iter()
                .map(|line| parse_list_line(line))
                .any(|entry| entry.kind == EntryKind::File && entry.name == name))
        })
        .await
    }

    async fn begin_put(&mut self, name: &str) -> Result<(), ConsoleError> {
        let name = name.to_string();
        let (writer, socket) = self
            .run("begin_put", move |ftp| {
                let writer = ftp.put_with_stream(&name)?;
                let socket = writer.get_ref().try_clone().map_err(transfer_io)?;
                Ok((writer, socket))
            })
            .await?;
        self.track_data_socket(socket)?;
        self.upload = Some(Box::new(writer));
        Ok(())
    }

    async fn write_chunk(&mut self, chunk: Vec<u8>) -> Result<(), ConsoleError> {
        let writer = self
            .upload
            .take()
            .ok_or_else(|| ConsoleError::TransferError("no upload in progress".into()))?;
        let (writer, result) = on_worker("write_chunk", writer, move |w| {
            w.write_all(&chunk).map_err(transfer_io)
        })
        .await?;
        self.upload = Some(writer);
        result
    }

    async fn finish_put(&mut self) -> Result<(), ConsoleError> {
        let writer = self
            .upload
            .take()
            .ok_or_else(|| ConsoleError::TransferError("no upload in progress".into()))?;
        self.data = None;
        self.run("finish_put", move |ftp| Ok(ftp.finalize_put_stream(writer)?))
            .await
    }

    async fn begin_get(&mut self, name: &str) -> Result<(), ConsoleError> {
        let name = name.to_string();
        let (reader, socket) = self
            .run("begin_get", move |ftp| {
                let reader = ftp.retr_as_stream(&name)?;
                let socket = reader.get_ref().try_clone().map_err(transfer_io)?;
                Ok((reader, socket))
            })
            .await?;
        self.track_data_socket(socket)?;
        self.download = Some(Box::new(reader));
        Ok(())
    }

    async fn read_chunk(&mut self, max_len: usize) -> Result<Vec<u8>, ConsoleError> {
        let reader = self
            .download
            .take()
            .ok_or_else(|| ConsoleError::TransferError("no download in progress".into()))?;
        let (reader, result) = on_worker("read_chunk", reader, move |r| {
            let mut buffer = vec![0u8; max_len];
            let n = r.read(&mut buffer).map_err(transfer_io)?;
            buffer.truncate(n);
            Ok(buffer)
        })
        .await?;
        self.download = Some(reader);
        result
    }

    async fn finish_get(&mut self) -> Result<(), ConsoleError> {
        let reader = self
            .download
            .take()
            .ok_or_else(|| ConsoleError::TransferError("no download in progress".into()))?;
        self.data = None;
        self.run("finish_get", move |ftp| Ok(ftp.finalize_retr_stream(reader)?))
            .await
    }

    async fn remove_file(&mut self, name: &str) -> Result<(), ConsoleError> {
        let name = name.to_string();
        self.run("remove_file", move |ftp| Ok(ftp.rm(&name)?)).await
    }

    async fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, ConsoleError> {
        let path = path.to_string();
        self.run("list", move |ftp| {
            let lines = ftp.list(Some(path.as_str()))?;
            Ok(lines.iter().map(|line| parse_list_line(line)).collect())
        })
        .await
    }

    async fn disconnect(&mut self) -> Result<(), ConsoleError> {
        self.upload = None;
        self.download = None;
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        debug!("Closing FTP connection to {}", self.address);

        tokio::task::spawn_blocking(move || stream.quit())
            .await
            .map_err(|e| ConsoleError::ConnectionError(format!("quit worker failed: {}", e)))?
            .map_err(|e| {
                warn!("QUIT failed, dropping socket: {}", e);
                ConsoleError::from(e)
            })
    }
}

impl Drop for FtpClient {
    fn drop(&mut self) {
        // A worker abandoned by a timeout still owns its stream; shutting the
        // sockets down makes its blocked call fail right away.
        if let Some(data) = self.data.take() {
            let _ = data.shutdown(Shutdown::Both);
        }
        let _ = self.control.shutdown(Shutdown::Both);
    }
}

/// Move `value` onto the blocking pool, run `f` on it and hand it back.
///
/// If the awaiting future is dropped, the worker keeps `value` and drops it
/// when `f` returns.
async fn on_worker<V, T, F>(
    op: &'static str,
    mut value: V,
    f: F,
) -> Result<(V, Result<T, ConsoleError>), ConsoleError>
where
    V: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut V) -> Result<T, ConsoleError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let result = f(&mut value);
        (value, result)
    })
    .await
    .map_err(|e| ConsoleError::ConnectionError(format!("{} worker failed: {}", op, e)))
}

fn connection_io(err: std::io::Error) -> ConsoleError {
    ConsoleError::ConnectionError(err.to_string())
}

fn transfer_io(err: std::io::Error) -> ConsoleError {
    ConsoleError::TransferError(err.to_string())
}

/// 550: no such file or directory
fn is_unavailable(err: &FtpError) -> bool {
    matches!(
        err,
        FtpError::UnexpectedResponse(resp) if matches!(resp.status, Status::FileUnavailable)
    )
}

/// Parse one LIST line into a tagged entry.
///
/// Lines the parser cannot read become [`EntryKind::Unknown`] carrying the raw
/// line as their name.
pub fn parse_list_line(line: &str) -> RemoteEntry {
    match suppaftp::list::File::from_str(line) {
        Ok(file) => {
            let kind = if file.is_directory() {
                EntryKind::Directory
            } else if file.is_symlink() {
                EntryKind::Link
            } else if file.is_file() {
                EntryKind::File
            } else {
                EntryKind::Unknown
            };
            RemoteEntry {
                name: file.name().to_string(),
                kind,
                size: file.size() as u64,
            }
        }
        Err(_) => RemoteEntry {
            name: line.trim().to_string(),
            kind: EntryKind::Unknown,
            size: 0,
        },
    }
}
