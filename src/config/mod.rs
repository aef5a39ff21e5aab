//! Configuration Management Module
//!
//! Console connection settings, filesystem layout and their on-disk storage.

pub mod storage;
pub mod types;

pub use storage::{config_file, ConfigStorage, StorageError};
pub use types::{ConfigFile, ConsoleConfig, CONFIG_VERSION};
