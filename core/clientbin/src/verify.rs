//! Checksum verification for downloaded archives.
//!
//! Catalog entries may declare a SHA-256 and/or MD5 digest. Each declared
//! digest gates the pipeline independently; SHA-256 is checked first.
//! Comparison is exact: digests are lower-case hex and matching is case-sensitive.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::catalog::DownloadDescriptor;

/// Digest algorithms a download descriptor can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
    /// MD5.
    Md5,
}

impl HashAlgorithm {
    /// Returns the algorithm name used in catalogs and error messages.
    #[must_use = "returns the algorithm name without side effects"]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Md5 => "md5",
        }
    }
}

/// A declared digest that differs from the computed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// The algorithm that failed.
    pub algorithm: HashAlgorithm,
    /// Digest declared in the catalog.
    pub expected: String,
    /// Digest of the file.
    pub actual: String,
}

/// Checks every digest `descriptor` declares against `file_path`.
///
/// Returns the first mismatch, or `None` when all declared digests match
/// (including when none are declared).
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn check_digests(
    file_path: &Path,
    descriptor: &DownloadDescriptor,
) -> Result<Option<Mismatch>> {
    let declared = [
        (HashAlgorithm::Sha256, descriptor.sha256.as_deref()),
        (HashAlgorithm::Md5, descriptor.md5.as_deref()),
    ];

    for (algorithm, expected) in declared {
        let Some(expected) = expected.filter(|e| !e.is_empty()) else {
            continue;
        };
        let actual = match algorithm {
            HashAlgorithm::Sha256 => compute_sha256(file_path)?,
            HashAlgorithm::Md5 => compute_md5(file_path)?,
        };
        if actual != expected {
            return Ok(Some(Mismatch {
                algorithm,
                expected: expected.to_string(),
                actual,
            }));
        }
    }

    Ok(None)
}

/// Computes the SHA-256 hash of a file as a lower-case hex string.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn compute_sha256(file_path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    read_chunks(file_path, |chunk| hasher.update(chunk))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Computes the MD5 hash of a file as a lower-case hex string.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn compute_md5(file_path: &Path) -> Result<String> {
    let mut context = md5::Context::new();
    read_chunks(file_path, |chunk| context.consume(chunk))?;
    Ok(format!("{:x}", context.compute()))
}

fn read_chunks(file_path: &Path, mut sink: impl FnMut(&[u8])) -> Result<()> {
    let mut file = std::fs::File::open(file_path)
        .with_context(|| format!("Failed to open file for checksum: {}", file_path.display()))?;

    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).with_context(|| {
            format!("Failed to read file for checksum: {}", file_path.display())
        })?;

        if bytes_read == 0 {
            break;
        }

        sink(&buffer[..bytes_read]);
    }

    Ok(())
}
