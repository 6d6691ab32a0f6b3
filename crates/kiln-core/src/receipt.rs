//! Install receipt: what was staged, and its digests.
//!
//! Written to `<prefix>/share/<name>/INSTALL_RECEIPT.json` once staging
//! completes. The receipt carries no timestamps, so installing the same tree
//! twice produces the same bytes.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use kiln_schema::Recipe;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const RECEIPT_FILE: &str = "INSTALL_RECEIPT.json";

/// One staged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptEntry {
    /// Path relative to the prefix, `/`-separated.
    pub path: String,
    pub sha256: String,
    pub executable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub name: String,
    pub version: String,
    pub source_url: String,
    pub source_sha256: String,
    pub files: Vec<ReceiptEntry>,
}

impl InstallReceipt {
    /// Build a receipt from the staged top-level paths, expanding directories.
    ///
    /// # Errors
    ///
    /// Returns an error if a staged file cannot be read.
    pub fn collect(recipe: &Recipe, prefix: &Path, staged: &[PathBuf]) -> std::io::Result<Self> {
        let mut files = Vec::new();
        for root in staged {
            for entry in walkdir::WalkDir::new(root).follow_links(false) {
                let entry = entry.map_err(std::io::Error::other)?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                let rel = path.strip_prefix(prefix).unwrap_or(path);
                files.push(ReceiptEntry {
                    path: rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/"),
                    sha256: sha256_file(path)?,
                    executable: is_executable(path),
                });
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup_by(|a, b| a.path == b.path);

        Ok(Self {
            name: recipe.package.name.to_string(),
            version: recipe
                .package
                .version()
                .map(|v| v.to_string())
                .unwrap_or_default(),
            source_url: recipe.package.url.clone(),
            source_sha256: recipe.package.sha256.clone(),
            files,
        })
    }

    /// Where the receipt for `recipe` lives under `prefix`.
    pub fn path(recipe: &Recipe, prefix: &Path) -> PathBuf {
        prefix.join(recipe.share_dir()).join(RECEIPT_FILE)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        json.push('\n');
        fs::write(path, json)
    }

    /// # Errors
    ///
    /// Returns an error if the file is missing or not a receipt.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }
}

fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}
