//! Platform capability table.
//!
//! Every piece of platform knowledge the pipeline needs is resolved here,
//! once, so the orchestration itself stays platform-agnostic: how release
//! assets are named, which archive format a platform ships, whether the
//! executable carries a suffix, and whether a detached signature file is
//! distributed at all.

use thiserror::Error;

/// The host `(os, arch)` pair does not map to any published artifact.
///
/// Raised before any network or filesystem I/O and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported platform: {os}/{arch}")]
pub struct UnsupportedPlatform {
    /// Host OS string as reported by the environment.
    pub os: String,
    /// Host architecture string as reported by the environment.
    pub arch: String,
}

/// Operating systems with published server artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// Windows (zip archives, `.exe` suffix)
    Windows,
    /// macOS (tar.gz archives, Gatekeeper-verified, no signature file)
    Darwin,
    /// Linux (tar.gz archives)
    Linux,
}

impl Os {
    /// Parse a host OS string (`std::env::consts::OS` values plus the
    /// common aliases).
    pub fn from_host_str(os: &str) -> Option<Self> {
        match os {
            "windows" | "win32" => Some(Self::Windows),
            "macos" | "darwin" => Some(Self::Darwin),
            "linux" => Some(Self::Linux),
            _ => None,
        }
    }

    /// OS segment of the release asset name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::Darwin => "Darwin",
            Self::Linux => "Linux",
        }
    }

    /// Archive format this OS ships in.
    pub fn archive_kind(self) -> ArchiveKind {
        match self {
            Self::Windows => ArchiveKind::Zip,
            Self::Darwin | Self::Linux => ArchiveKind::TarGz,
        }
    }

    /// Executable filename suffix.
    pub fn exe_suffix(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Darwin | Self::Linux => "",
        }
    }

    /// Whether release archives for this OS include a detached signature.
    ///
    /// macOS archives do not; Gatekeeper performs its own verification of
    /// the notarized binary.
    pub fn ships_signature(self) -> bool {
        !matches!(self, Self::Darwin)
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// CPU architectures with published server artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// `x86_64` / amd64
    X86_64,
    /// arm64 / aarch64
    Arm64,
}

impl Arch {
    /// Parse a host architecture string (`std::env::consts::ARCH` values
    /// plus the common aliases).
    pub fn from_host_str(arch: &str) -> Option<Self> {
        match arch {
            "x86_64" | "amd64" | "x64" => Some(Self::X86_64),
            "aarch64" | "arm64" => Some(Self::Arm64),
            _ => None,
        }
    }

    /// Architecture segment of the release asset name.
    pub fn label(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Arm64 => "arm64",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Archive container formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Gzip-compressed tarball, streamed through the external `tar` tool.
    TarGz,
    /// Zip archive, staged to disk and expanded by the platform utility.
    Zip,
}

impl ArchiveKind {
    /// Detect the archive kind from an asset filename.
    ///
    /// Dispatch is driven by the name's extension rather than re-derived
    /// from platform detection, so a mismatched asset fails loudly instead
    /// of being fed to the wrong extractor.
    pub fn from_asset_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// Canonical file extension, including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::TarGz => ".tar.gz",
            Self::Zip => ".zip",
        }
    }
}

/// A resolved `(os, arch)` pair. Exactly one artifact identity exists per
/// supported pair; everything else is an [`UnsupportedPlatform`] error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Operating system component.
    pub os: Os,
    /// Architecture component.
    pub arch: Arch,
}

impl Platform {
    /// Resolve the platform this process is running on.
    pub fn current() -> Result<Self, UnsupportedPlatform> {
        Self::from_host(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Resolve a platform from host strings.
    ///
    /// Any pair outside `{Windows, Darwin, Linux} x {x86_64, arm64}` is a
    /// hard failure, never a silent fallback.
    pub fn from_host(os: &str, arch: &str) -> Result<Self, UnsupportedPlatform> {
        match (Os::from_host_str(os), Arch::from_host_str(arch)) {
            (Some(os), Some(arch)) => Ok(Self { os, arch }),
            _ => Err(UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            }),
        }
    }

    /// Release asset name for a tool on this platform:
    /// `<tool>_<OS>_<arch><ext>`.
    ///
    /// # Example
    ///
    /// ```
    /// use binstrap_core::platform::Platform;
    ///
    /// let p = Platform::from_host("linux", "x86_64").unwrap();
    /// assert_eq!(p.asset_name("mytool"), "mytool_Linux_x86_64.tar.gz");
    /// ```
    pub fn asset_name(self, tool: &str) -> String {
        format!(
            "{tool}_{}_{}{}",
            self.os.label(),
            self.arch.label(),
            self.os.archive_kind().extension()
        )
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
