//! Provisioning pipeline: download, verify, unpack, install, re-verify.
//!
//! ## Stages
//!
//! 1. Resolve the download descriptor (`url` and `type` are required)
//! 2. Check the URL against the caller's pattern, if any
//! 3. Create `<base>/<id>`
//! 4. Fetch the archive to `<folder>/archive.<type>`
//! 5. Check declared digests
//! 6. Unpack into `<folder>/unpacked`, with the caller's handler or a built-in extractor
//! 7. Locate the binary among the files this run unpacked and alias it at
//!    `<folder>/unpacked/<bin>`
//! 8. Re-run the sanity probe on the stable path
//!
//! A failure in stages 1-6 aborts with a [`ProvisionError`]. From stage 7 on,
//! problems are recorded in the returned record's state instead.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use regex::Regex;
use serde::Serialize;

use crate::archive::ArchiveKind;
use crate::errors::ProvisionError;
use crate::fetch::{ArchiveFetcher, HttpFetcher, ProgressCallback};
use crate::install;
use crate::logger::Logger;
use crate::record::{ClientRecord, FailReason};
use crate::sanity;
use crate::verify;

/// Name of the unpack folder inside a download folder.
pub const UNPACK_FOLDER: &str = "unpacked";

/// Caller-supplied unpacker, called with `(download_file, unpack_folder)`.
pub type UnpackHandler =
    Arc<dyn Fn(PathBuf, PathBuf) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Options for a single download.
#[derive(Clone, Default)]
pub struct DownloadOptions {
    /// Base folder; the client id is appended. A fresh temporary folder when `None`.
    pub download_folder: Option<PathBuf>,
    /// Pattern the download URL must match.
    pub url_regex: Option<Regex>,
    /// Replaces the built-in extractors.
    pub unpack_handler: Option<UnpackHandler>,
    /// Receives fetch progress.
    pub progress: Option<ProgressCallback>,
}

impl DownloadOptions {
    /// Sets the base download folder.
    #[must_use]
    pub fn with_download_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.download_folder = Some(folder.into());
        self
    }

    /// Requires the download URL to match `pattern`.
    #[must_use]
    pub fn with_url_regex(mut self, pattern: Regex) -> Self {
        self.url_regex = Some(pattern);
        self
    }

    /// Unpacks with `handler` instead of the built-in extractors.
    #[must_use]
    pub fn with_unpack_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(PathBuf, PathBuf) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.unpack_handler = Some(Arc::new(
            move |file, folder| -> BoxFuture<'static, anyhow::Result<()>> {
                Box::pin(handler(file, folder))
            },
        ));
        self
    }

    /// Reports fetch progress to `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }
}

impl fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("download_folder", &self.download_folder)
            .field("url_regex", &self.url_regex)
            .field("unpack_handler", &self.unpack_handler.is_some())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOutcome {
    /// `<base>/<id>`.
    pub download_folder: PathBuf,
    /// `<download_folder>/archive.<type>`.
    pub download_file: PathBuf,
    /// `<download_folder>/unpacked`.
    pub unpack_folder: PathBuf,
    /// The updated record.
    pub client: ClientRecord,
}

/// Collaborators of one pipeline run.
pub(crate) struct Pipeline<'a> {
    pub(crate) fetcher: Option<&'a dyn ArchiveFetcher>,
    pub(crate) logger: &'a dyn Logger,
    pub(crate) probe_timeout: Duration,
}

impl Pipeline<'_> {
    /// Provisions `record` and returns the outcome with the updated record.
    pub(crate) async fn run(
        &self,
        record: ClientRecord,
        options: &DownloadOptions,
    ) -> Result<DownloadOutcome, ProvisionError> {
        let id = record.id().to_string();
        let descriptor = record.config().download.clone().unwrap_or_default();
        let (url, kind) = descriptor
            .source()
            .ok_or_else(|| ProvisionError::download_info_unavailable(&id))?;

        if let Some(pattern) = &options.url_regex
            && !pattern.is_match(url)
        {
            return Err(ProvisionError::url_rejected(url));
        }

        let download_folder = stage_folder(&id, options.download_folder.as_deref()).await?;
        self.logger.debug(format_args!(
            "Downloading to folder {} ...",
            download_folder.display()
        ));

        let download_file = download_folder.join(format!("archive.{kind}"));
        self.logger.info(format_args!(
            "Downloading package from {url} to {} ...",
            download_file.display()
        ));

        let default_fetcher;
        let fetcher: &dyn ArchiveFetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => {
                default_fetcher = HttpFetcher::new()
                    .map_err(|e| ProvisionError::transport(&id, format!("{e:#}")))?;
                &default_fetcher
            }
        };
        if let Err(e) = fetcher
            .fetch(url, &download_file, options.progress.clone())
            .await
        {
            self.logger.error(format_args!("Error downloading package for {id}: {e:#}"));
            return Err(ProvisionError::transport(&id, format!("{e:#}")));
        }
        self.logger.debug(format_args!("Downloaded {url} to {}", download_file.display()));

        let mismatch = {
            let file = download_file.clone();
            let descriptor = descriptor.clone();
            tokio::task::spawn_blocking(move || verify::check_digests(&file, &descriptor))
                .await
                .map_err(|e| ProvisionError::Internal(e.into()))?
                .map_err(ProvisionError::Internal)?
        };
        if let Some(mismatch) = mismatch {
            return Err(ProvisionError::hash_mismatch(
                mismatch.algorithm.as_str(),
                mismatch.expected,
                mismatch.actual,
            ));
        }

        let unpack_folder = download_folder.join(UNPACK_FOLDER);
        let produced = self.unpack(kind, &download_file, &unpack_folder, options).await?;

        let client = self.install(record, &unpack_folder, produced).await;

        Ok(DownloadOutcome {
            download_folder,
            download_file,
            unpack_folder,
            client,
        })
    }

    async fn unpack(
        &self,
        kind: &str,
        download_file: &Path,
        unpack_folder: &Path,
        options: &DownloadOptions,
    ) -> Result<Produced, ProvisionError> {
        self.logger.debug(format_args!(
            "Unpacking {} to {} ...",
            download_file.display(),
            unpack_folder.display()
        ));

        if let Some(handler) = &options.unpack_handler {
            self.logger.debug(format_args!("Using custom unpack handler"));
            let root = unpack_folder.to_path_buf();
            let before = tokio::task::spawn_blocking(move || install::snapshot(&root))
                .await
                .map_err(|e| ProvisionError::Internal(e.into()))?;

            handler(download_file.to_path_buf(), unpack_folder.to_path_buf())
                .await
                .map_err(ProvisionError::Unpack)?;

            let root = unpack_folder.to_path_buf();
            let changed =
                tokio::task::spawn_blocking(move || install::changed_since(&root, &before))
                    .await
                    .map_err(|e| ProvisionError::Internal(e.into()))?;
            return Ok(Produced::Changed(changed));
        }

        let archive = ArchiveKind::from_type(kind)
            .ok_or_else(|| ProvisionError::unsupported_archive(kind))?;
        let file = download_file.to_path_buf();
        let folder = unpack_folder.to_path_buf();
        let written = tokio::task::spawn_blocking(move || archive.extract(&file, &folder))
            .await
            .map_err(|e| ProvisionError::Internal(e.into()))?
            .map_err(ProvisionError::Unpack)?;

        self.logger.debug(format_args!(
            "Unpacked {} entries from {} to {}",
            written.len(),
            download_file.display(),
            unpack_folder.display()
        ));
        Ok(Produced::Exact(written))
    }

    /// Locates the unpacked binary, aliases it at the stable path and re-verifies it.
    async fn install(
        &self,
        mut record: ClientRecord,
        unpack_folder: &Path,
        produced: Produced,
    ) -> ClientRecord {
        record.reset();
        let id = record.id().to_string();
        let search_name = record.config().archive_bin().to_string();
        let stable = unpack_folder.join(&record.config().bin);

        self.logger.debug(format_args!(
            "Searching for binary {search_name} in {} ...",
            unpack_folder.display()
        ));
        let root = unpack_folder.to_path_buf();
        let name = search_name.clone();
        let located = tokio::task::spawn_blocking(move || produced.locate(&root, &name))
            .await
            .ok()
            .flatten();

        let Some(located) = located else {
            self.logger.warn(format_args!(
                "Unable to find {search_name} for {id} in {}",
                unpack_folder.display()
            ));
            record.mark_unavailable(FailReason::NotFound);
            return record;
        };

        let result = {
            let located = located.clone();
            let stable = stable.clone();
            tokio::task::spawn_blocking(move || {
                install::ensure_executable(&located)?;
                if located != stable {
                    install::replace_alias(&located, &stable)?;
                }
                anyhow::Ok(())
            })
            .await
        };
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.logger.error(format_args!(
                    "Unable to install {} as {}: {e:#}",
                    located.display(),
                    stable.display()
                ));
                record.mark_unavailable(FailReason::NotFound);
                return record;
            }
            Err(e) => {
                self.logger.error(format_args!("Install task for {id} failed: {e}"));
                record.mark_unavailable(FailReason::NotFound);
                return record;
            }
        }

        self.logger.info(format_args!("Installed {id} binary at {}", stable.display()));
        sanity::verify(record, vec![stable], self.probe_timeout, self.logger).await
    }
}

/// Files one unpack step produced.
enum Produced {
    /// Exactly what the built-in extractor wrote.
    Exact(Vec<PathBuf>),
    /// What a custom handler added or changed, judged by size and modification time.
    Changed(Vec<PathBuf>),
}

impl Produced {
    /// Finds the binary among this run's files.
    ///
    /// A handler that rewrites a file in place without changing its size or
    /// timestamp leaves no trace, so that case falls back to a full search.
    fn locate(&self, root: &Path, name: &str) -> Option<PathBuf> {
        match self {
            Self::Exact(files) => install::pick_binary(files, name),
            Self::Changed(files) => {
                install::pick_binary(files, name).or_else(|| install::find_binary(root, name))
            }
        }
    }
}

/// Creates `<base>/<id>`, using a fresh temporary base when none is given.
async fn stage_folder(id: &str, base: Option<&Path>) -> Result<PathBuf, ProvisionError> {
    let base = match base {
        Some(base) => base.to_path_buf(),
        None => tempfile::Builder::new()
            .prefix("clientbin-")
            .tempdir()
            .map_err(|e| ProvisionError::io("Failed to create temporary folder", e))?
            .keep(),
    };

    let folder = base.join(id);
    tokio::fs::create_dir_all(&folder).await.map_err(|e| {
        ProvisionError::io(
            format!("Failed to create directory: {}", folder.display()),
            e,
        )
    })?;
    Ok(folder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_folder_appends_id_to_base() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let folder = stage_folder("Maga", Some(dir.path()))
            .await
            .expect("Should create folder");
        assert_eq!(folder, dir.path().join("Maga"));
        assert!(folder.is_dir());
    }

    #[tokio::test]
    async fn stage_folder_uses_fresh_temp_base() {
        let first = stage_folder("Maga", None).await.expect("Should create folder");
        let second = stage_folder("Maga", None).await.expect("Should create folder");

        assert_ne!(first, second);
        assert!(first.ends_with("Maga"));
        assert!(first.is_dir());

        for folder in [first, second] {
            if let Some(base) = folder.parent() {
                let _ = std::fs::remove_dir_all(base);
            }
        }
    }

    #[test]
    fn builder_methods_fill_options() {
        let options = DownloadOptions::default()
            .with_download_folder("/tmp/clients")
            .with_url_regex(Regex::new("localhost").expect("Should compile"))
            .with_unpack_handler(|_file, _folder| async { Ok(()) });

        assert_eq!(options.download_folder, Some(PathBuf::from("/tmp/clients")));
        assert!(options.url_regex.is_some());
        assert!(options.unpack_handler.is_some());
        assert!(format!("{options:?}").contains("unpack_handler: true"));
    }
}
