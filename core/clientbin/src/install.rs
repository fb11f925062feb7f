//! Installing an unpacked binary behind its stable name.
//!
//! Consumers always run a client through `<unpack folder>/<bin>`. When an
//! archive ships the binary under another name, that stable path becomes an
//! alias of the unpacked file:
//!
//! - Unix: a relative symlink
//! - Windows: a copy of the file
//!
//! Either way the alias is built under a temporary sibling name and renamed
//! over the stable path, so readers see the old target or the new one and
//! never a missing or half-written file.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Size and modification time of every regular file below a folder.
pub type Snapshot = HashMap<PathBuf, (u64, Option<SystemTime>)>;

/// Records the regular files below `root`. A missing `root` gives an empty snapshot.
#[must_use]
pub fn snapshot(root: &Path) -> Snapshot {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            Some((entry.into_path(), (metadata.len(), metadata.modified().ok())))
        })
        .collect()
}

/// Returns the regular files below `root` that are new or changed since `before`.
#[must_use]
pub fn changed_since(root: &Path, before: &Snapshot) -> Vec<PathBuf> {
    snapshot(root)
        .into_iter()
        .filter(|(path, stamp)| before.get(path) != Some(stamp))
        .map(|(path, _)| path)
        .collect()
}

/// Searches `root` recursively for a regular file named `name`.
///
/// Symlinks are never matched. The shallowest match wins; matches at the same
/// depth are ordered by file name.
#[must_use]
pub fn find_binary(root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == name)
        .min_by_key(walkdir::DirEntry::depth)
        .map(walkdir::DirEntry::into_path)
}

/// Picks the regular file named `name` out of `files`, with the same ordering
/// as [`find_binary`].
///
/// `files` is what one unpack run produced, so leftovers of earlier runs in the
/// same folder are never chosen.
#[must_use]
pub fn pick_binary(files: &[PathBuf], name: &str) -> Option<PathBuf> {
    files
        .iter()
        .filter(|path| path.file_name().is_some_and(|file| file == name))
        .filter(|path| std::fs::symlink_metadata(path).is_ok_and(|m| m.is_file()))
        .min_by(|a, b| {
            let depth = |p: &Path| p.components().count();
            depth(a.as_path())
                .cmp(&depth(b.as_path()))
                .then_with(|| a.cmp(b))
        })
        .cloned()
}

/// Returns a fresh hidden sibling of `path` to build its replacement in.
///
/// # Errors
///
/// Returns an error if `path` has no parent or no file name.
pub fn staging_sibling(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .with_context(|| format!("Path has no parent: {}", path.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("Path has no file name: {}", path.display()))?;
    Ok(parent.join(format!(
        ".{}.{:016x}.tmp",
        file_name.to_string_lossy(),
        rand::random::<u64>()
    )))
}

/// Points `stable` at `target`, replacing whatever `stable` was before.
///
/// # Errors
///
/// Returns an error if the alias cannot be created or renamed into place.
pub fn replace_alias(target: &Path, stable: &Path) -> Result<()> {
    let staging = staging_sibling(stable)?;

    if let Err(e) = create_alias(target, &staging) {
        let _ = std::fs::remove_file(&staging);
        return Err(e);
    }

    if let Err(e) = std::fs::rename(&staging, stable) {
        let _ = std::fs::remove_file(&staging);
        return Err(e).with_context(|| {
            format!(
                "Failed to move alias {} into place at {}",
                staging.display(),
                stable.display()
            )
        });
    }

    Ok(())
}

#[cfg(unix)]
fn create_alias(target: &Path, alias: &Path) -> Result<()> {
    // Relative when the target lives under the alias directory, so the
    // unpack folder can be moved as a whole.
    let link_target = alias
        .parent()
        .and_then(|dir| target.strip_prefix(dir).ok())
        .map_or_else(|| target.to_path_buf(), Path::to_path_buf);

    std::os::unix::fs::symlink(&link_target, alias).with_context(|| {
        format!(
            "Failed to create symlink from {} to {}",
            alias.display(),
            link_target.display()
        )
    })
}

#[cfg(windows)]
fn create_alias(target: &Path, alias: &Path) -> Result<()> {
    std::fs::copy(target, alias).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            target.display(),
            alias.display()
        )
    })?;
    Ok(())
}

/// Adds execute permission (0o755) to `path` when it has no execute bit.
///
/// # Errors
///
/// Returns an error if the metadata cannot be read or permissions cannot be set.
#[cfg(unix)]
pub fn ensure_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .with_context(|| format!("Failed to get metadata: {}", path.display()))?
        .permissions();
    if perms.mode() & 0o111 == 0 {
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("Failed to set permissions: {}", path.display()))?;
    }
    Ok(())
}

/// Sets executable permissions (no-op on Windows).
#[cfg(windows)]
#[allow(clippy::unnecessary_wraps)]
pub fn ensure_executable(_path: &Path) -> Result<()> {
    Ok(())
}
