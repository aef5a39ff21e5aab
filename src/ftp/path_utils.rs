//! Console path utilities
//!
//! Console FTP paths always use `/` as separator and are always absolute.
//! A bare file name (no separator) lives under the console's primary data root.

use super::error::ConsoleError;

/// Remote path separator
pub const SEPARATOR: char = '/';

/// Primary data root on the console's internal drive
pub const DEFAULT_ROOT: &str = "/dev_hdd0/";

/// A console path split into its directory and bare file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Directory, always absolute and ending with exactly one `/`
    pub directory: String,
    /// File name without separators (may be empty)
    pub file_name: String,
}

impl ResolvedPath {
    /// File name, or `InvalidPath` when the path pointed at a directory.
    pub fn require_file_name(&self) -> Result<&str, ConsoleError> {
        if self.file_name.is_empty() {
            return Err(ConsoleError::InvalidPath(format!(
                "no file name in {}",
                self.directory
            )));
        }
        Ok(&self.file_name)
    }

    /// Rejoined absolute path
    pub fn full_path(&self) -> String {
        format!("{}{}", self.directory, self.file_name)
    }
}

/// Split a console path into directory and file name.
///
/// # Examples
/// ```
/// use consolemod_lib::ftp::path_utils::resolve_remote_path;
///
/// let r = resolve_remote_path("/dev_hdd0/packages/foo.pkg", "/dev_hdd0/");
/// assert_eq!(r.directory, "/dev_hdd0/packages/");
/// assert_eq!(r.file_name, "foo.pkg");
///
/// let r = resolve_remote_path("foo.pkg", "/dev_hdd0/");
/// assert_eq!(r.directory, "/dev_hdd0/");
/// assert_eq!(r.file_name, "foo.pkg");
/// ```
pub fn resolve_remote_path(path: &str, default_root: &str) -> ResolvedPath {
    match path.rfind(SEPARATOR) {
        None => ResolvedPath {
            directory: normalize_remote_dir(default_root),
            file_name: path.to_string(),
        },
        Some(idx) => {
            let (dir, rest) = path.split_at(idx + 1);
            ResolvedPath {
                directory: normalize_remote_dir(dir),
                file_name: rest.replace(SEPARATOR, ""),
            }
        }
    }
}

/// Make a directory absolute, collapse repeated separators and end it with
/// exactly one separator.
pub fn normalize_remote_dir(dir: &str) -> String {
    let mut normalized = SEPARATOR.to_string();
    for part in dir.split(SEPARATOR).filter(|p| !p.is_empty()) {
        normalized.push_str(part);
        normalized.push(SEPARATOR);
    }
    normalized
}

/// Check if a console path is absolute.
pub fn is_absolute_remote_path(path: &str) -> bool {
    path.starts_with(SEPARATOR)
}

/// Join console path components using `/`.
pub fn join_remote_path(base: &str, component: &str) -> String {
    if base.ends_with(SEPARATOR) {
        format!("{}{}", base, component)
    } else {
        format!("{}{}{}", base, SEPARATOR, component)
    }
}

/// Names every listing carries for the directory itself and its parent.
pub fn is_self_or_parent(name: &str) -> bool {
    name == "." || name == ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_with_directory() {
        let r = resolve_remote_path("/dev_hdd0/packages/foo.pkg", DEFAULT_ROOT);
        assert_eq!(r.directory, "/dev_hdd0/packages/");
        assert_eq!(r.file_name, "foo.pkg");
        assert_eq!(r.full_path(), "/dev_hdd0/packages/foo.pkg");
    }

    #[test]
    fn test_resolve_bare_name_uses_default_root() {
        let r = resolve_remote_path("foo.pkg", DEFAULT_ROOT);
        assert_eq!(r.directory, DEFAULT_ROOT);
        assert_eq!(r.file_name, "foo.pkg");

        let r = resolve_remote_path("EBOOT.BIN", "/dev_usb000");
        assert_eq!(r.directory, "/dev_usb000/");
        assert_eq!(r.file_name, "EBOOT.BIN");
    }

    #[test]
    fn test_resolve_collapses_repeated_separators() {
        let r = resolve_remote_path("/dev_hdd0//tmp//a.sprx", DEFAULT_ROOT);
        assert_eq!(r.directory, "/dev_hdd0/tmp/");
        assert_eq!(r.file_name, "a.sprx");
    }

    #[test]
    fn test_resolve_relative_directory_made_absolute() {
        let r = resolve_remote_path("dev_hdd0/game/x.bin", DEFAULT_ROOT);
        assert_eq!(r.directory, "/dev_hdd0/game/");
        assert_eq!(r.file_name, "x.bin");
    }

    #[test]
    fn test_resolve_directory_path_has_empty_name() {
        let r = resolve_remote_path("/dev_hdd0/home/", DEFAULT_ROOT);
        assert_eq!(r.directory, "/dev_hdd0/home/");
        assert_eq!(r.file_name, "");
        assert!(matches!(
            r.require_file_name(),
            Err(ConsoleError::InvalidPath(_))
        ));

        let root = resolve_remote_path("/", DEFAULT_ROOT);
        assert_eq!(root.directory, "/");
        assert!(root.require_file_name().is_err());
    }

    #[test]
    fn test_resolve_reconstructs_input() {
        for p in [
            "/dev_hdd0/packages/foo.pkg",
            "/dev_usb000/mods/cod4/patch_mp.ff",
            "/a",
            "/dev_hdd0/game/BLES00000/USRDIR/EBOOT.BIN",
        ] {
            let r = resolve_remote_path(p, DEFAULT_ROOT);
            assert_eq!(format!("{}{}", r.directory, r.file_name), p);
        }
    }

    #[test]
    fn test_normalize_remote_dir() {
        assert_eq!(normalize_remote_dir(""), "/");
        assert_eq!(normalize_remote_dir("///"), "/");
        assert_eq!(normalize_remote_dir("dev_usb000"), "/dev_usb000/");
        assert_eq!(normalize_remote_dir("/dev_hdd0/home"), "/dev_hdd0/home/");
    }

    #[test]
    fn test_is_absolute_remote_path() {
        assert!(is_absolute_remote_path("/dev_hdd0"));
        assert!(is_absolute_remote_path("/"));
        assert!(!is_absolute_remote_path("dev_hdd0/game"));
    }

    #[test]
    fn test_join_remote_path() {
        assert_eq!(join_remote_path("/dev_hdd0", "game"), "/dev_hdd0/game");
        assert_eq!(join_remote_path("/dev_hdd0/", "game"), "/dev_hdd0/game");
        assert_eq!(join_remote_path("/", "dev_hdd0"), "/dev_hdd0");
    }

    #[test]
    fn test_self_or_parent() {
        assert!(is_self_or_parent("."));
        assert!(is_self_or_parent(".."));
        assert!(!is_self_or_parent("..."));
        assert!(!is_self_or_parent(".hidden"));
    }
}
