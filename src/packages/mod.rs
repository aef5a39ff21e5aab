//! Package files and version reconciliation

pub mod manager;
pub mod sync;
pub mod types;
pub mod version;

pub use manager::PackageFiles;
pub use sync::{PackageCatalogSync, SyncReport};
pub use types::{
    CatalogIndex, InstalledPackageRecord, InstalledPackages, InstalledRecords, PackageCatalog,
    RemotePackageEntry, StaleVersionFinding,
};
pub use version::PackageVersion;
