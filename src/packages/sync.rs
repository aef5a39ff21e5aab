//! Package version reconciliation
//!
//! Lists the console's package directory and reports installed packages the
//! catalog has a newer version of. Nothing runs on a timer; callers decide
//! when to sync.

use serde::Serialize;
use tracing::{debug, info};

use super::types::{InstalledPackages, PackageCatalog, RemotePackageEntry, StaleVersionFinding};
use crate::console::ConsoleFiles;
use crate::ftp::error::ConsoleError;
use crate::ftp::types::{EntryKind, RemoteAddress};

/// Result of one sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Package files currently on the console
    pub listing: Vec<RemotePackageEntry>,
    /// Installed packages with a newer catalog version
    pub stale: Vec<StaleVersionFinding>,
}

pub struct PackageCatalogSync {
    files: ConsoleFiles,
}

impl PackageCatalogSync {
    pub fn new(files: ConsoleFiles) -> Self {
        Self { files }
    }

    /// Run one sync pass against `remote_package_dir`.
    ///
    /// A failed listing aborts the pass. Files without an installed record
    /// and IDs missing from the catalog are not errors.
    pub async fn sync(
        &self,
        host: &RemoteAddress,
        remote_package_dir: &str,
        installed: &dyn InstalledPackages,
        catalog: &dyn PackageCatalog,
    ) -> Result<SyncReport, ConsoleError> {
        let listing = self.list_packages(host, remote_package_dir).await?;

        let mut stale = Vec::new();
        for entry in &listing {
            let Some(record) = installed.find_for_file(&entry.file_name) else {
                debug!("{} has no installed record", entry.file_name);
                continue;
            };
            let Some(latest) = catalog.latest_version(&record.id) else {
                debug!("{} ({}) is not in the catalog", entry.file_name, record.id);
                continue;
            };
            if *latest > record.version {
                stale.push(StaleVersionFinding {
                    package_id: record.id.clone(),
                    file_name: entry.file_name.clone(),
                    installed_version: record.version.clone(),
                    catalog_version: latest.clone(),
                });
            }
        }

        info!(
            "Package sync on {}: {} packages, {} outdated",
            host,
            listing.len(),
            stale.len()
        );
        Ok(SyncReport { listing, stale })
    }

    /// Package files in `remote_package_dir`, in listing order.
    ///
    /// A console that has no package directory yet has no packages.
    pub async fn list_packages(
        &self,
        host: &RemoteAddress,
        remote_package_dir: &str,
    ) -> Result<Vec<RemotePackageEntry>, ConsoleError> {
        let config = self.files.config();

        let mut session = self.files.open(host).await?;
        let entries = match session.directory_exists(remote_package_dir).await {
            Ok(true) => session.list_entries(remote_package_dir).await,
            Ok(false) => {
                debug!("{} does not exist on {}", remote_package_dir, host);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        };
        session.close().await;
        let entries = entries?;

        Ok(entries
            .into_iter()
            .filter(|e| e.kind == EntryKind::File && config.is_package_file(&e.name))
            .map(|e| RemotePackageEntry {
                file_name: e.name,
                size: e.size,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsoleConfig;
    use crate::ftp::memory::MemoryConsole;
    use crate::ftp::types::RemoteEntry;
    use crate::packages::types::{CatalogIndex, InstalledPackageRecord, InstalledRecords};
    use std::sync::Arc;

    const PACKAGE_DIR: &str = "/dev_hdd0/packages";

    fn setup(console: &MemoryConsole) -> (PackageCatalogSync, RemoteAddress) {
        let files = ConsoleFiles::new(Arc::new(console.clone()), ConsoleConfig::default());
        let host = files.address("192.168.1.50").unwrap();
        (PackageCatalogSync::new(files), host)
    }

    fn catalog(version: &str) -> CatalogIndex {
        let mut catalog = CatalogIndex::new();
        catalog.insert("mod_a", version);
        catalog
    }

    #[tokio::test]
    async fn test_newer_catalog_version_is_reported() {
        let console = MemoryConsole::new();
        console.add_file("/dev_hdd0/packages/mod_a.pkg", &[0u8; 1024]);
        let (sync, host) = setup(&console);
        let installed = InstalledRecords::new(vec![InstalledPackageRecord::new("mod_a", "1.0")]);

        let report = sync
            .sync(&host, PACKAGE_DIR, &installed, &catalog("1.1"))
            .await
            .unwrap();

        assert_eq!(
            report.listing,
            vec![RemotePackageEntry {
                file_name: "mod_a.pkg".into(),
                size: 1024
            }]
        );
        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.stale[0].package_id, "mod_a");
        assert_eq!(report.stale[0].installed_version.as_str(), "1.0");
        assert_eq!(report.stale[0].catalog_version.as_str(), "1.1");
    }

    #[tokio::test]
    async fn test_same_or_older_catalog_version_is_not_reported() {
        let console = MemoryConsole::new();
        console.add_file("/dev_hdd0/packages/mod_a.pkg", &[0u8; 1024]);
        let (sync, host) = setup(&console);
        let installed = InstalledRecords::new(vec![InstalledPackageRecord::new("mod_a", "1.0")]);

        for version in ["1.0", "1.0.0", "0.9"] {
            let report = sync
                .sync(&host, PACKAGE_DIR, &installed, &catalog(version))
                .await
                .unwrap();
            assert!(report.stale.is_empty(), "{}", version);
        }
    }

    #[tokio::test]
    async fn test_installed_pre_release_is_outdated_by_final_release() {
        let console = MemoryConsole::new();
        console.add_file("/dev_hdd0/packages/mod_a.pkg", b"a");
        let (sync, host) = setup(&console);
        let installed = InstalledRecords::new(vec![InstalledPackageRecord::new("mod_a", "1.0-beta")]);

        let report = sync
            .sync(&host, PACKAGE_DIR, &installed, &catalog("1.0"))
            .await
            .unwrap();
        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.stale[0].installed_version.as_str(), "1.0-beta");
    }

    #[tokio::test]
    async fn test_only_package_files_are_listed() {
        let console = MemoryConsole::new();
        console.add_file("/dev_hdd0/packages/mod_a.pkg", b"a");
        console.add_file("/dev_hdd0/packages/MOD_B.PKG", b"bb");
        console.add_file("/dev_hdd0/packages/readme.txt", b"ccc");
        console.add_directory("/dev_hdd0/packages/folder.pkg");
        console.add_entry(
            PACKAGE_DIR,
            RemoteEntry {
                name: "link.pkg".into(),
                kind: EntryKind::Link,
                size: 4,
            },
        );
        let (sync, host) = setup(&console);

        let report = sync
            .sync(&host, PACKAGE_DIR, &InstalledRecords::default(), &CatalogIndex::new())
            .await
            .unwrap();
        let names: Vec<&str> = report.listing.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, vec!["MOD_B.PKG", "mod_a.pkg"]);
        assert!(report.stale.is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_and_uncatalogued_entries_are_data() {
        let console = MemoryConsole::new();
        console.add_file("/dev_hdd0/packages/mod_a.pkg", b"a");
        console.add_file("/dev_hdd0/packages/mod_x.pkg", b"x");
        let (sync, host) = setup(&console);
        let installed = InstalledRecords::new(vec![
            InstalledPackageRecord::new("mod_a", "1.0"),
            InstalledPackageRecord::new("mod_gone", "1.0"),
        ]);

        let report = sync
            .sync(&host, PACKAGE_DIR, &installed, &CatalogIndex::new())
            .await
            .unwrap();
        assert_eq!(report.listing.len(), 2);
        assert!(report.stale.is_empty());
    }

    #[tokio::test]
    async fn test_missing_package_directory_is_empty() {
        let console = MemoryConsole::new();
        console.add_directory("/dev_hdd0");
        let (sync, host) = setup(&console);
        let installed = InstalledRecords::new(vec![InstalledPackageRecord::new("mod_a", "1.0")]);

        let report = sync
            .sync(&host, PACKAGE_DIR, &installed, &catalog("1.1"))
            .await
            .unwrap();
        assert_eq!(report, SyncReport::default());
        assert!(!console.has_directory(PACKAGE_DIR));
        assert_eq!(console.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts() {
        let console = MemoryConsole::new();
        console.set_unreachable(true);
        let (sync, host) = setup(&console);

        let result = sync
            .sync(&host, PACKAGE_DIR, &InstalledRecords::default(), &CatalogIndex::new())
            .await;
        assert!(matches!(result, Err(ConsoleError::ConnectionError(_))));
    }
}
