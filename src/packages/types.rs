//! Package sync inputs and outputs

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::version::PackageVersion;

/// A package the user installed through the app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackageRecord {
    /// Catalog ID of the package
    pub id: String,
    pub version: PackageVersion,
    /// Package file name on the console, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl InstalledPackageRecord {
    pub fn new(id: impl Into<String>, version: impl Into<PackageVersion>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            file_name: None,
            name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// True if this record describes the console file `file_name`.
    ///
    /// The recorded file name wins; without one, the ID is compared against
    /// the file name's stem.
    pub fn matches_file(&self, file_name: &str) -> bool {
        match &self.file_name {
            Some(recorded) => recorded.eq_ignore_ascii_case(file_name),
            None => file_stem(file_name).eq_ignore_ascii_case(&self.id),
        }
    }
}

/// A package file found in the console's package directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePackageEntry {
    pub file_name: String,
    pub size: u64,
}

/// An installed package the catalog has a newer version of
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleVersionFinding {
    pub package_id: String,
    pub file_name: String,
    pub installed_version: PackageVersion,
    pub catalog_version: PackageVersion,
}

/// Read-only view of the user's installed packages
pub trait InstalledPackages: Send + Sync {
    /// Record describing the console file `file_name`, if any
    fn find_for_file(&self, file_name: &str) -> Option<&InstalledPackageRecord>;
}

/// Latest known version per package ID
pub trait PackageCatalog: Send + Sync {
    fn latest_version(&self, package_id: &str) -> Option<&PackageVersion>;
}

/// Installed records held in memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstalledRecords {
    records: Vec<InstalledPackageRecord>,
}

impl InstalledRecords {
    pub fn new(records: Vec<InstalledPackageRecord>) -> Self {
        Self { records }
    }

    /// Parse a JSON array of records
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn records(&self) -> &[InstalledPackageRecord] {
        &self.records
    }
}

impl InstalledPackages for InstalledRecords {
    fn find_for_file(&self, file_name: &str) -> Option<&InstalledPackageRecord> {
        // Recorded file names take precedence over ID/stem matches
        self.records
            .iter()
            .find(|r| r.file_name.is_some() && r.matches_file(file_name))
            .or_else(|| self.records.iter().find(|r| r.matches_file(file_name)))
    }
}

/// Catalog versions keyed by package ID
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogIndex {
    latest: HashMap<String, PackageVersion>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `{"id": "version"}`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Record a version, keeping the highest one seen per ID
    pub fn insert(&mut self, package_id: impl Into<String>, version: impl Into<PackageVersion>) {
        let version = version.into();
        self.latest
            .entry(package_id.into())
            .and_modify(|current| {
                if version > *current {
                    *current = version.clone();
                }
            })
            .or_insert(version);
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

impl PackageCatalog for CatalogIndex {
    fn latest_version(&self, package_id: &str) -> Option<&PackageVersion> {
        self.latest.get(package_id)
    }
}

fn file_stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_matching() {
        let by_id = InstalledPackageRecord::new("mod_a", "1.0");
        assert!(by_id.matches_file("mod_a.pkg"));
        assert!(by_id.matches_file("MOD_A.PKG"));
        assert!(!by_id.matches_file("mod_b.pkg"));

        let by_name = InstalledPackageRecord::new("1234", "1.0").with_file_name("Mod A.pkg");
        assert!(by_name.matches_file("mod a.pkg"));
        assert!(!by_name.matches_file("1234.pkg"));
    }

    #[test]
    fn test_recorded_file_name_wins() {
        let records = InstalledRecords::new(vec![
            InstalledPackageRecord::new("mod_a", "1.0"),
            InstalledPackageRecord::new("other", "2.0").with_file_name("mod_a.pkg"),
        ]);
        assert_eq!(records.find_for_file("mod_a.pkg").unwrap().id, "other");
        assert!(records.find_for_file("mod_c.pkg").is_none());
    }

    #[test]
    fn test_records_from_json() {
        let records = InstalledRecords::from_json(
            r#"[{"id": "mod_a", "version": "1.0"}, {"id": "9", "version": "2", "file_name": "x.pkg"}]"#,
        )
        .unwrap();
        assert_eq!(records.records().len(), 2);
        assert_eq!(records.records()[1].file_name.as_deref(), Some("x.pkg"));
    }

    #[test]
    fn test_catalog_keeps_highest_version() {
        let mut catalog = CatalogIndex::new();
        catalog.insert("mod_a", "1.2");
        catalog.insert("mod_a", "1.10");
        catalog.insert("mod_a", "1.3");
        assert_eq!(catalog.latest_version("mod_a").unwrap().as_str(), "1.10");
        assert!(catalog.latest_version("mod_b").is_none());

        let parsed = CatalogIndex::from_json(r#"{"mod_a": "1.1"}"#).unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
