//! Candidate binary discovery.
//!
//! Candidates are collected in a fixed order:
//!
//! 1. The executable search path, via `which::which(bin)`
//! 2. `<folder>/<bin>` for each extra folder, in caller order, when executable
//!
//! Duplicate paths keep their first position.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::logger::Logger;

/// Finds every path that could be the executable `bin`.
///
/// An empty result means the client was not found; no sanity probe should run.
pub async fn locate(bin: &str, folders: &[PathBuf], logger: &dyn Logger) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = which_on_path(bin).await
        && !path.as_os_str().is_empty()
    {
        logger.debug(format_args!("Got PATH binary for {bin}: {}", path.display()));
        candidates.push(path);
    }

    for folder in folders {
        let path = folder.join(bin);
        if is_executable(&path).await {
            logger.debug(format_args!(
                "Got extra folder binary for {bin}: {}",
                path.display()
            ));
            candidates.push(path);
        }
    }

    dedupe_paths(candidates)
}

/// Resolves `bin` through the executable search path on a blocking thread.
async fn which_on_path(bin: &str) -> Option<PathBuf> {
    let bin = bin.to_string();
    tokio::task::spawn_blocking(move || which::which(bin).ok())
        .await
        .ok()
        .flatten()
}

/// Returns `true` if `path` is a regular file the current user may execute.
pub(crate) async fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = tokio::fs::metadata(path).await else {
        return false;
    };
    metadata.is_file() && has_execute_permission(&metadata)
}

#[cfg(unix)]
fn has_execute_permission(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_execute_permission(_metadata: &std::fs::Metadata) -> bool {
    true
}

fn dedupe_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|path| seen.insert(path.clone()))
        .collect()
}
