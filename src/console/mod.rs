//! Console-level operations built on scoped FTP sessions

pub mod device;
pub mod files;
pub mod profiles;

pub use device::find_removable_storage;
pub use files::ConsoleFiles;
pub use profiles::{list_profile_ids, ProfileChoice};
