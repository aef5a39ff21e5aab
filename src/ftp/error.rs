//! Console file-transfer error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Transfer failed: {0}")]
    TransferError(String),

    #[error("No removable storage device found")]
    NoDeviceFound,

    #[error("No user profiles found")]
    NoProfilesFound,

    #[error("Package file already exists: {0}")]
    PackageExists(String),

    #[error("Unrecognized listing entry: {0}")]
    UnknownEntry(String),
}

impl ConsoleError {
    /// True for failures that mean the session itself is unusable,
    /// timeouts included.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ConsoleError::ConnectionError(_))
    }

    /// Connection failure for an exchange that exceeded its time limit
    pub fn timed_out(what: impl std::fmt::Display, limit: std::time::Duration) -> Self {
        ConsoleError::ConnectionError(format!("{} timed out after {}s", what, limit.as_secs()))
    }
}

impl From<suppaftp::FtpError> for ConsoleError {
    fn from(err: suppaftp::FtpError) -> Self {
        match err {
            suppaftp::FtpError::ConnectionError(e) => ConsoleError::ConnectionError(e.to_string()),
            suppaftp::FtpError::InvalidAddress(e) => ConsoleError::ConnectionError(e.to_string()),
            other => ConsoleError::TransferError(other.to_string()),
        }
    }
}

// Serialized as the display string for UI consumers
impl serde::Serialize for ConsoleError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
