//! Copy classified artifacts into the install prefix.
//!
//! Each matched entry lands directly under `<prefix>/<dest>/` with its own
//! file name. Existing files are replaced, never appended to, so staging the
//! same tree twice gives the same layout. A failure partway through a bucket
//! leaves what was already copied in place; cleanup belongs to the host.

use std::fs;
use std::path::{Path, PathBuf};

use crate::classify::ClassifiedBucket;
use crate::error::InstallError;

/// Mode forced onto executable kinds (`rwxr-xr-x` at minimum).
#[cfg(unix)]
const EXECUTABLE_MODE: u32 = 0o755;

/// Stages buckets under a single prefix.
#[derive(Debug)]
pub struct Stager<'a> {
    prefix: &'a Path,
}

impl<'a> Stager<'a> {
    pub fn new(prefix: &'a Path) -> Self {
        Self { prefix }
    }

    /// Copy every match of `bucket` into the prefix.
    ///
    /// Returns the staged top-level destinations (files or directories).
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Stage`] naming the bucket and the first path
    /// that could not be created or copied.
    pub fn stage_bucket(&self, bucket: &ClassifiedBucket) -> Result<Vec<PathBuf>, InstallError> {
        let name = bucket.spec.name.as_str();
        let dest_dir = self.prefix.join(&bucket.spec.dest);
        fs::create_dir_all(&dest_dir).map_err(|e| InstallError::stage(name, &dest_dir, e))?;

        let mut staged = Vec::with_capacity(bucket.matches.len());
        for src in &bucket.matches {
            let Some(file_name) = src.file_name() else {
                continue;
            };
            let dst = dest_dir.join(file_name);

            copy_entry(src, &dst).map_err(|e| InstallError::stage(name, src, e))?;

            if bucket.spec.kind.is_executable() {
                make_executable(&dst).map_err(|e| InstallError::stage(name, &dst, e))?;
            }

            tracing::debug!(bucket = name, from = %src.display(), to = %dst.display(), "staged");
            staged.push(dst);
        }

        Ok(staged)
    }
}

/// Copy a file or a directory tree from `src` to `dst`, replacing `dst`.
fn copy_entry(src: &Path, dst: &Path) -> std::io::Result<()> {
    if src.is_dir() {
        if dst.is_file() {
            fs::remove_file(dst)?;
        }
        fs::create_dir_all(dst)?;
        return copy_dir_all(src, dst);
    }

    // Remove first: a read-only file from a previous install cannot be
    // opened for writing.
    match fs::symlink_metadata(dst) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dst)?,
        Ok(_) => fs::remove_file(dst)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::copy(src, dst)?;
    Ok(())
}

/// Recursively copy the contents of `src` into `dst`.
///
/// Uses `fs_extra` for robust recursive copying with overwrite semantics.
fn copy_dir_all(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs_extra::dir::copy(
        src,
        dst,
        &fs_extra::dir::CopyOptions::new()
            .content_only(true)
            .overwrite(true),
    )
    .map_err(|e| std::io::Error::other(format!("Copy failed: {e}")))?;
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(path)?.permissions().mode();
    fs::set_permissions(path, fs::Permissions::from_mode(mode | EXECUTABLE_MODE))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
