//! Package files in the console's install directory

use std::path::{Path, PathBuf};

use tracing::info;

use super::sync::PackageCatalogSync;
use crate::console::ConsoleFiles;
use crate::ftp::error::ConsoleError;
use crate::ftp::path_utils::join_remote_path;
use crate::ftp::types::RemoteAddress;

/// Install, remove and fetch package files
#[derive(Clone)]
pub struct PackageFiles {
    files: ConsoleFiles,
}

impl PackageFiles {
    pub fn new(files: ConsoleFiles) -> Self {
        Self { files }
    }

    fn remote_path(&self, file_name: &str) -> String {
        join_remote_path(&self.files.config().package_dir, file_name)
    }

    fn checked_name(&self, file_name: &str) -> Result<(), ConsoleError> {
        if file_name.contains('/') || !self.files.config().is_package_file(file_name) {
            return Err(ConsoleError::InvalidPath(format!(
                "{} is not a {} file",
                file_name,
                self.files.config().package_extension
            )));
        }
        Ok(())
    }

    /// Upload `local_file` into the package directory.
    ///
    /// Refuses to replace a package that is already there.
    pub async fn install_package(&self, host: &RemoteAddress, local_file: &Path) -> Result<String, ConsoleError> {
        let file_name = local_file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ConsoleError::InvalidPath(local_file.display().to_string()))?;
        self.checked_name(file_name)?;

        let remote = self.remote_path(file_name);
        if self.files.file_exists(host, &remote).await? {
            return Err(ConsoleError::PackageExists(file_name.to_string()));
        }

        self.files.upload_file(host, local_file, &remote).await?;
        info!("Installed package {} on {}", file_name, host);
        Ok(remote)
    }

    /// Remove one package file. Returns `false` when it was already gone.
    pub async fn delete_package(&self, host: &RemoteAddress, file_name: &str) -> Result<bool, ConsoleError> {
        self.checked_name(file_name)?;
        self.files.delete_file(host, &self.remote_path(file_name)).await
    }

    /// Remove every package file, returning how many were deleted
    pub async fn delete_all_packages(&self, host: &RemoteAddress) -> Result<usize, ConsoleError> {
        let package_dir = &self.files.config().package_dir;
        let listing = PackageCatalogSync::new(self.files.clone())
            .list_packages(host, package_dir)
            .await?;

        let mut deleted = 0;
        for entry in listing {
            if self.delete_package(host, &entry.file_name).await? {
                deleted += 1;
            }
        }
        info!("Deleted {} packages on {}", deleted, host);
        Ok(deleted)
    }

    /// Download a package into `local_dir`, keeping its file name
    pub async fn download_package(
        &self,
        host: &RemoteAddress,
        file_name: &str,
        local_dir: &Path,
    ) -> Result<PathBuf, ConsoleError> {
        self.checked_name(file_name)?;
        let local_path = local_dir.join(file_name);
        self.files
            .download_file(host, &self.remote_path(file_name), &local_path)
            .await?;
        Ok(local_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsoleConfig;
    use crate::ftp::memory::MemoryConsole;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn setup(console: &MemoryConsole) -> (PackageFiles, RemoteAddress) {
        let files = ConsoleFiles::new(Arc::new(console.clone()), ConsoleConfig::default());
        let host = files.address("192.168.1.50").unwrap();
        (PackageFiles::new(files), host)
    }

    #[tokio::test]
    async fn test_install_refuses_existing_package() {
        let console = MemoryConsole::new();
        let (packages, host) = setup(&console);
        let temp = tempdir().unwrap();
        let local = temp.path().join("mod_a.pkg");
        std::fs::write(&local, b"v1").unwrap();

        let remote = packages.install_package(&host, &local).await.unwrap();
        assert_eq!(remote, "/dev_hdd0/packages/mod_a.pkg");
        assert_eq!(console.file(&remote).unwrap(), b"v1");

        std::fs::write(&local, b"v2").unwrap();
        assert!(matches!(
            packages.install_package(&host, &local).await,
            Err(ConsoleError::PackageExists(_))
        ));
        assert_eq!(console.file(&remote).unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_install_requires_package_extension() {
        let console = MemoryConsole::new();
        let (packages, host) = setup(&console);
        let temp = tempdir().unwrap();
        let local = temp.path().join("mod_a.zip");
        std::fs::write(&local, b"zip").unwrap();

        assert!(matches!(
            packages.install_package(&host, &local).await,
            Err(ConsoleError::InvalidPath(_))
        ));
        assert_eq!(console.connections_opened(), 0);
    }

    #[tokio::test]
    async fn test_delete_all_packages() {
        let console = MemoryConsole::new();
        console.add_file("/dev_hdd0/packages/a.pkg", b"a");
        console.add_file("/dev_hdd0/packages/b.pkg", b"b");
        console.add_file("/dev_hdd0/packages/keep.txt", b"c");
        let (packages, host) = setup(&console);

        assert_eq!(packages.delete_all_packages(&host).await.unwrap(), 2);
        assert_eq!(console.file_count(), 1);
        assert_eq!(packages.delete_all_packages(&host).await.unwrap(), 0);
        assert!(!packages.delete_package(&host, "a.pkg").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_all_without_package_dir() {
        let console = MemoryConsole::new();
        let (packages, host) = setup(&console);
        assert_eq!(packages.delete_all_packages(&host).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_download_package() {
        let console = MemoryConsole::new();
        console.add_file("/dev_hdd0/packages/mod_a.pkg", b"package");
        let (packages, host) = setup(&console);
        let temp = tempdir().unwrap();

        let local = packages
            .download_package(&host, "mod_a.pkg", &temp.path().join("saved"))
            .await
            .unwrap();
        assert_eq!(local, temp.path().join("saved").join("mod_a.pkg"));
        assert_eq!(std::fs::read(&local).unwrap(), b"package");
    }
}
