//! FTP Module
//!
//! Console file transfer: path handling, the transport seam, and the scoped
//! [`RemoteSession`] everything else is built on.

pub mod client;
pub mod error;
pub mod memory;
pub mod path_utils;
pub mod session;
pub mod types;

pub use client::{Connector, FtpClient, FtpConnector, RemoteClient};
pub use error::ConsoleError;
pub use memory::{MemoryConsole, SyntheticEntries};
pub use path_utils::{resolve_remote_path, ResolvedPath, DEFAULT_ROOT};
pub use session::RemoteSession;
pub use types::{EntryKind, RemoteAddress, RemoteEntry, SessionState};
