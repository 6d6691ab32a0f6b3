use dirs::home_dir;
use std::path::{Path, PathBuf};

/// Returns the kiln home directory, or None if the user's home cannot be resolved.
///
/// `KILN_HOME` overrides the default `~/.kiln`.
pub fn try_kiln_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("KILN_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".kiln"))
}

/// Logs directory: ~/.kiln/logs
pub fn try_log_dir() -> Option<PathBuf> {
    try_kiln_home().map(|h| h.join("logs"))
}

/// Default install prefix: `$KILN_PREFIX`, else ~/.kiln/prefix
pub fn try_default_prefix() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("KILN_PREFIX") {
        return Some(PathBuf::from(val));
    }
    try_kiln_home().map(|h| h.join("prefix"))
}

/// Generate a build log path for a package
pub fn build_log_path(log_dir: &Path, package: &str, version: &str) -> PathBuf {
    let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    log_dir.join(format!("build-{package}-{version}-{timestamp}.log"))
}
