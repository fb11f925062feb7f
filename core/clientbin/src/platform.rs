//! Host platform resolution.
//!
//! Catalogs key platform entries by an OS name and a CPU architecture name.
//! The OS names follow the catalog convention:
//!
//! - Windows → `win`
//! - macOS → `mac`
//! - everything else → the native identifier (`linux`, `freebsd`, ...)
//!
//! The architecture is the native identifier, unchanged (`x86_64`, `aarch64`, ...).

use std::fmt;

/// An OS/architecture pair in catalog naming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    /// Resolves the platform the process is running on.
    #[must_use = "returns the platform without side effects"]
    pub fn current() -> Self {
        Self::from_native(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Maps native OS and architecture identifiers to catalog naming.
    ///
    /// # Example
    ///
    /// ```
    /// use clientbin::Platform;
    ///
    /// let platform = Platform::from_native("macos", "aarch64");
    /// assert_eq!(platform.os(), "mac");
    /// assert_eq!(platform.arch(), "aarch64");
    /// ```
    #[must_use = "returns the platform without side effects"]
    pub fn from_native(os: &str, arch: &str) -> Self {
        let os = match os {
            "windows" => "win",
            "macos" => "mac",
            other => other,
        };
        Self::new(os, arch)
    }

    /// Creates a platform from names already in catalog form.
    #[must_use = "returns the platform without side effects"]
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Returns the catalog OS name.
    #[must_use = "returns the OS string without side effects"]
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Returns the catalog architecture name.
    #[must_use = "returns the architecture string without side effects"]
    pub fn arch(&self) -> &str {
        &self.arch
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
