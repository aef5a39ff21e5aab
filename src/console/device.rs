//! Removable storage discovery

use tracing::{debug, info};

use super::files::ConsoleFiles;
use crate::ftp::error::ConsoleError;
use crate::ftp::types::RemoteAddress;

/// First configured USB mount point that exists on the console.
///
/// Candidates are checked in configuration order. Connection failures are
/// returned as-is, never mistaken for an absent device.
pub async fn find_removable_storage(
    files: &ConsoleFiles,
    host: &RemoteAddress,
) -> Result<String, ConsoleError> {
    for candidate in &files.config().usb_mount_points {
        if files.directory_exists(host, candidate).await? {
            info!("Removable storage found at {} on {}", candidate, host);
            return Ok(candidate.clone());
        }
        debug!("No removable storage at {} on {}", candidate, host);
    }
    Err(ConsoleError::NoDeviceFound)
}
