//! Archive extraction for downloaded client packages.
//!
//! Two archive types are built in:
//!
//! - `zip` → [`extract_zip`]
//! - `tar` → [`extract_tar`], plain or gzip-compressed (detected from the magic bytes)
//!
//! Both formats share the rules applied to every entry:
//!
//! - paths are kept as stored; absolute paths and `..` components are rejected
//! - a folder reached through a link must resolve inside the destination
//! - files are written to a temporary sibling and renamed into place, so an
//!   existing file or link is replaced rather than written through
//! - stored Unix permission bits are restored
//!
//! Extractors return the paths they wrote. The destination may still hold files
//! from earlier runs, and only the returned paths belong to this archive.

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Component, Path, PathBuf};

use crate::install;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Archive formats with a built-in extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// ZIP archive.
    Zip,
    /// Tar archive, optionally gzip-compressed.
    Tar,
}

impl ArchiveKind {
    /// Maps a catalog archive type to a built-in extractor.
    #[must_use]
    pub fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "zip" => Some(Self::Zip),
            "tar" => Some(Self::Tar),
            _ => None,
        }
    }

    /// Extracts `archive_path` into `dest_dir` with this format's extractor and
    /// returns the paths of the non-directory entries written.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be read or extracted.
    pub fn extract(self, archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
        match self {
            Self::Zip => extract_zip(archive_path, dest_dir),
            Self::Tar => extract_tar(archive_path, dest_dir),
        }
    }
}

/// Writes archive entries below a destination root.
struct Unpacker<'a> {
    root: &'a Path,
    canonical_root: PathBuf,
    written: Vec<PathBuf>,
}

impl<'a> Unpacker<'a> {
    fn new(root: &'a Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Cannot create unpack folder {}", root.display()))?;
        let canonical_root = root
            .canonicalize()
            .with_context(|| format!("Cannot resolve unpack folder {}", root.display()))?;
        Ok(Self {
            root,
            canonical_root,
            written: Vec::new(),
        })
    }

    /// Walks `relative` below the root, creating missing folders.
    fn descend(&self, relative: &Path) -> Result<PathBuf> {
        ensure_relative(relative)?;
        let mut dir = self.root.to_path_buf();
        for component in relative.components() {
            if let Component::Normal(part) = component {
                dir.push(part);
                self.enter(&dir)?;
            }
        }
        Ok(dir)
    }

    fn enter(&self, dir: &Path) -> Result<()> {
        match std::fs::symlink_metadata(dir) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                let resolved = dir
                    .canonicalize()
                    .with_context(|| format!("Cannot resolve link {}", dir.display()))?;
                if !resolved.starts_with(&self.canonical_root) {
                    bail!(
                        "Archive entry escapes the unpack folder through link {}",
                        dir.display()
                    );
                }
                if !resolved.is_dir() {
                    bail!("Not a directory: {}", dir.display());
                }
                Ok(())
            }
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => bail!("Not a directory: {}", dir.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                std::fs::create_dir(dir).with_context(|| format!("Cannot create {}", dir.display()))
            }
            Err(e) => Err(e).with_context(|| format!("Cannot inspect {}", dir.display())),
        }
    }

    /// Prepares the parent folders of `entry` and returns its destination.
    fn slot(&self, entry: &Path) -> Result<PathBuf> {
        ensure_relative(entry)?;
        let name = entry
            .file_name()
            .with_context(|| format!("Archive entry has no file name: {}", entry.display()))?;
        let parent = self.descend(entry.parent().unwrap_or(Path::new("")))?;
        Ok(parent.join(name))
    }

    fn dir(&self, entry: &Path) -> Result<()> {
        self.descend(entry).map(drop)
    }

    fn file(&mut self, entry: &Path, content: &mut impl Read, mode: Option<u32>) -> Result<()> {
        let path = self.slot(entry)?;
        let staging = install::staging_sibling(&path)?;

        let written = write_file(&staging, content, mode).and_then(|()| {
            std::fs::rename(&staging, &path)
                .with_context(|| format!("Cannot move {} into place", path.display()))
        });
        if let Err(e) = written {
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }

        self.written.push(path);
        Ok(())
    }

    /// Unpacks a tar entry that is neither a file nor a folder, such as a link.
    fn special<R: Read>(&mut self, entry: &mut tar::Entry<'_, R>, name: &Path) -> Result<()> {
        let path = self.slot(name)?;
        remove_non_dir(&path)?;
        // Resolves hard links against the root and refuses targets outside it.
        entry
            .unpack_in(self.root)
            .with_context(|| format!("Cannot unpack {}", path.display()))?;
        self.written.push(path);
        Ok(())
    }
}

fn write_file(path: &Path, content: &mut impl Read, mode: Option<u32>) -> Result<()> {
    let mut out = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    std::io::copy(content, &mut out).with_context(|| format!("Cannot write {}", path.display()))?;
    if let Some(mode) = mode {
        apply_mode(path, mode)?;
    }
    Ok(())
}

/// Extracts a ZIP archive into `dest_dir` and returns the files written.
///
/// # Errors
///
/// Returns an error if the file is not a readable ZIP archive, an entry path
/// escapes `dest_dir`, or an entry cannot be written.
///
/// # Example
///
/// ```ignore
/// let files = extract_zip(Path::new("archive.zip"), Path::new("unpacked"))?;
/// ```
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Cannot open {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Not a ZIP archive: {}", archive_path.display()))?;
    let mut unpacker = Unpacker::new(dest_dir)?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("Corrupt ZIP entry #{index}"))?;
        let name = entry
            .enclosed_name()
            .with_context(|| format!("Unsafe path in ZIP entry #{index}: {}", entry.name()))?;

        if entry.is_dir() {
            unpacker.dir(&name)?;
        } else {
            let mode = entry.unix_mode();
            unpacker.file(&name, &mut entry, mode)?;
        }
    }

    Ok(unpacker.written)
}

/// Extracts a tar archive into `dest_dir` and returns the non-directory
/// entries written.
///
/// Gzip compression is detected from the content, so `.tar` and `.tar.gz`
/// payloads are both accepted regardless of the file name.
///
/// # Errors
///
/// Returns an error if the file is not a readable tar stream, an entry path
/// or link escapes `dest_dir`, or an entry cannot be written.
pub fn extract_tar(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = open_tar(archive_path)?;
    let mut unpacker = Unpacker::new(dest_dir)?;

    let entries = archive
        .entries()
        .with_context(|| format!("Not a tar archive: {}", archive_path.display()))?;
    for entry in entries {
        let mut entry =
            entry.with_context(|| format!("Corrupt tar entry in {}", archive_path.display()))?;
        let name = entry
            .path()
            .context("Tar entry path is not valid")?
            .into_owned();
        let kind = entry.header().entry_type();

        if kind.is_dir() {
            unpacker.dir(&name)?;
        } else if kind.is_file() {
            let mode = entry.header().mode().ok();
            unpacker.file(&name, &mut entry, mode)?;
        } else if !kind.is_pax_global_extensions() {
            unpacker.special(&mut entry, &name)?;
        }
    }

    Ok(unpacker.written)
}

/// Opens a tar archive, inserting a gzip decoder when the content is compressed.
fn open_tar(archive_path: &Path) -> Result<tar::Archive<Box<dyn Read>>> {
    let open = || {
        File::open(archive_path).with_context(|| format!("Cannot open {}", archive_path.display()))
    };

    let mut magic = [0u8; 2];
    let gzipped = open()?.read_exact(&mut magic).is_ok() && magic == GZIP_MAGIC;

    let reader = BufReader::new(open()?);
    let stream: Box<dyn Read> = if gzipped {
        Box::new(GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };
    Ok(tar::Archive::new(stream))
}

/// Rejects absolute entry paths and paths containing `..`.
fn ensure_relative(entry_path: &Path) -> Result<()> {
    let escapes = entry_path.is_absolute()
        || entry_path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        bail!("Archive entry escapes the unpack folder: {}", entry_path.display());
    }
    Ok(())
}

/// Removes a file or link where a link entry is about to be created.
fn remove_non_dir(path: &Path) -> Result<()> {
    if let Ok(metadata) = std::fs::symlink_metadata(path)
        && !metadata.is_dir()
    {
        std::fs::remove_file(path).with_context(|| format!("Cannot remove {}", path.display()))?;
    }
    Ok(())
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o777))
        .with_context(|| format!("Cannot set mode {mode:o} on {}", path.display()))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn apply_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
