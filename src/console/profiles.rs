//! User profile discovery

use serde::Serialize;
use tracing::debug;

use super::files::ConsoleFiles;
use crate::ftp::error::ConsoleError;
use crate::ftp::types::RemoteAddress;

/// Profile IDs under the configured profile root, in listing order.
///
/// Fails with `NoProfilesFound` when the console has none.
pub async fn list_profile_ids(
    files: &ConsoleFiles,
    host: &RemoteAddress,
) -> Result<Vec<String>, ConsoleError> {
    let ids = files
        .list_child_directories(host, &files.config().profile_root)
        .await?;
    if ids.is_empty() {
        return Err(ConsoleError::NoProfilesFound);
    }
    debug!("Found {} profiles on {}", ids.len(), host);
    Ok(ids)
}

/// Whether the caller has to ask which profile to use
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "ids", rename_all = "lowercase")]
pub enum ProfileChoice {
    Single(String),
    Multiple(Vec<String>),
}

impl ProfileChoice {
    pub fn from_ids(mut ids: Vec<String>) -> Result<Self, ConsoleError> {
        match ids.len() {
            0 => Err(ConsoleError::NoProfilesFound),
            1 => Ok(ProfileChoice::Single(ids.remove(0))),
            _ => Ok(ProfileChoice::Multiple(ids)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsoleConfig;
    use crate::ftp::memory::MemoryConsole;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_list_profile_ids() {
        let console = MemoryConsole::new();
        console.add_directory("/dev_hdd0/home/00000001");
        console.add_directory("/dev_hdd0/home/00000002");
        let files = ConsoleFiles::new(Arc::new(console.clone()), ConsoleConfig::default());
        let host = files.address("192.168.1.50").unwrap();

        let ids = list_profile_ids(&files, &host).await.unwrap();
        assert_eq!(ids, vec!["00000001", "00000002"]);
    }

    #[tokio::test]
    async fn test_empty_profile_root() {
        let console = MemoryConsole::new();
        console.add_directory("/dev_hdd0/home");
        let files = ConsoleFiles::new(Arc::new(console.clone()), ConsoleConfig::default());
        let host = files.address("192.168.1.50").unwrap();

        assert!(matches!(
            list_profile_ids(&files, &host).await,
            Err(ConsoleError::NoProfilesFound)
        ));
    }

    #[test]
    fn test_profile_choice() {
        assert!(matches!(
            ProfileChoice::from_ids(vec![]),
            Err(ConsoleError::NoProfilesFound)
        ));
        assert_eq!(
            ProfileChoice::from_ids(vec!["00000001".into()]).unwrap(),
            ProfileChoice::Single("00000001".into())
        );
        assert_eq!(
            ProfileChoice::from_ids(vec!["a".into(), "b".into()]).unwrap(),
            ProfileChoice::Multiple(vec!["a".into(), "b".into()])
        );
    }
}
