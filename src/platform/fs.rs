// CleanLog - platform/fs.rs
//
// Filesystem helpers: executable lookup on PATH, default scan folders,
// and reading source files with path context.

use crate::util::constants;
use crate::util::error::CleanLogError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Locate an executable on `PATH`, like `command -v`.
///
/// A name containing a path separator is checked as-is. On Windows each
/// `PATHEXT` extension is tried as well.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    find_executable_in(name, &path_var)
}

/// `find_executable` against an explicit search path.
pub fn find_executable_in(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    std::env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .find_map(|dir| {
            executable_names(name)
                .into_iter()
                .map(|n| dir.join(n))
                .find(|p| is_executable(p))
        })
}

#[cfg(windows)]
fn executable_names(name: &str) -> Vec<String> {
    let exts = std::env::var("PATHEXT").unwrap_or_else(|_| ".EXE;.CMD;.BAT;.COM".to_string());
    let mut names = vec![name.to_string()];
    names.extend(
        exts.split(';')
            .filter(|e| !e.is_empty())
            .map(|e| format!("{name}{}", e.to_lowercase())),
    );
    names
}

#[cfg(not(windows))]
fn executable_names(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Default dedup scan roots: the user's Downloads and Documents folders.
///
/// Uses the platform's user directories when known, else `~/Downloads`
/// and `~/Documents`. Folders that do not exist are still returned; the
/// scanner reports them as warnings.
pub fn default_scan_dirs() -> Vec<PathBuf> {
    let Some(user_dirs) = directories::UserDirs::new() else {
        tracing::warn!("Could not determine the home directory; no default scan paths");
        return Vec::new();
    };
    let home = user_dirs.home_dir().to_path_buf();
    let downloads = user_dirs
        .download_dir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| home.join(constants::DEFAULT_SCAN_DIRS[0]));
    let documents = user_dirs
        .document_dir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| home.join(constants::DEFAULT_SCAN_DIRS[1]));
    vec![downloads, documents]
}

/// Split newline-separated path input into trimmed, non-empty paths.
pub fn parse_path_list(input: &str) -> Vec<PathBuf> {
    input
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Read a whole file with path context on failure.
pub fn read_source(path: &Path) -> Result<Vec<u8>, CleanLogError> {
    std::fs::read(path).map_err(|source| CleanLogError::Io {
        path: path.to_path_buf(),
        operation: "read source file",
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_find_executable_in_search_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("docker");
        std::fs::write(&exe, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        let plain = dir.path().join("notes");
        std::fs::write(&plain, "text").unwrap();

        let search = std::env::join_paths([PathBuf::from("/nonexistent/cleanlog"), dir.path().to_path_buf()])
            .unwrap();
        assert_eq!(find_executable_in("docker", &search), Some(exe.clone()));
        assert_eq!(find_executable_in("notes", &search), None, "not executable");
        assert_eq!(find_executable_in("podman", &search), None);
        assert_eq!(find_executable_in("", &search), None);
        assert_eq!(
            find_executable_in(exe.to_str().unwrap(), OsStr::new("")),
            Some(exe)
        );
    }

    #[test]
    fn test_parse_path_list() {
        let paths = parse_path_list("  /a/b \n\n/c\r\n   \n");
        assert_eq!(paths, vec![PathBuf::from("/a/b"), PathBuf::from("/c")]);
    }

    #[test]
    fn test_read_source_error_has_path() {
        let err = read_source(Path::new("/nonexistent/cleanlog/bill.csv")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/nonexistent/cleanlog/bill.csv"));
        assert!(msg.contains("read source file"));
    }
}
