//! Cache path queries.
//!
//! Pure mappings from a tool, version, and platform to canonical cache
//! locations, plus the two filesystem checks the orchestrator needs: a
//! stat-based existence probe and a best-effort cache wipe. No other
//! component writes into the cache root.

use std::io;
use std::path::{Path, PathBuf};

use crate::platform::Os;

/// Canonical cache layout for one tool at one version.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
    tool: String,
    version: String,
    os: Os,
}

impl StorageLayout {
    /// Build the layout for `tool`/`version` under a per-installation
    /// storage root.
    pub fn new(root: impl Into<PathBuf>, tool: &str, version: &str, os: Os) -> Self {
        Self {
            root: root.into(),
            tool: tool.to_string(),
            version: version.to_string(),
            os,
        }
    }

    /// Binary cache root: `<root>/bin`. Holds one subdirectory per version.
    pub fn bin_cache_dir(&self) -> PathBuf {
        bin_cache_dir(&self.root)
    }

    /// Versioned cache entry: `<root>/bin/<version>`.
    pub fn versioned_dir(&self) -> PathBuf {
        self.bin_cache_dir().join(&self.version)
    }

    /// Path of the extracted server binary, with the platform's executable
    /// suffix.
    pub fn binary_path(&self) -> PathBuf {
        self.versioned_dir()
            .join(format!("{}{}", self.tool, self.os.exe_suffix()))
    }

    /// Path of the detached signature: the binary path plus `.sig`.
    pub fn signature_path(&self) -> PathBuf {
        let mut path = self.binary_path().into_os_string();
        path.push(".sig");
        PathBuf::from(path)
    }

    /// Delete the whole binary cache, all versions included.
    ///
    /// Idempotent: an already-absent cache is success. Other failures are
    /// returned for the caller to log; a failed wipe must never mask the
    /// error that prompted it.
    pub async fn clean(&self) -> io::Result<()> {
        clean_bin_cache(&self.root).await
    }
}

/// Binary cache root under a storage root: `<root>/bin`.
pub fn bin_cache_dir(root: &Path) -> PathBuf {
    root.join("bin")
}

/// Remove the binary cache under `root`, tolerating an absent tree.
pub async fn clean_bin_cache(root: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(bin_cache_dir(root)).await {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Whether `path` exists and is a regular file.
///
/// `NotFound` maps to `Ok(false)`; every other error (permissions, bad
/// mounts) propagates rather than being mistaken for "absent".
pub async fn file_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(os: Os) -> StorageLayout {
        StorageLayout::new("/data/binstrap", "srv", "1.2.3", os)
    }

    #[test]
    fn test_path_shapes() {
        let layout = layout(Os::Linux);
        assert_eq!(layout.bin_cache_dir(), PathBuf::from("/data/binstrap/bin"));
        assert_eq!(
            layout.versioned_dir(),
            PathBuf::from("/data/binstrap/bin/1.2.3")
        );
        assert_eq!(
            layout.binary_path(),
            PathBuf::from("/data/binstrap/bin/1.2.3/srv")
        );
        assert_eq!(
            layout.signature_path(),
            PathBuf::from("/data/binstrap/bin/1.2.3/srv.sig")
        );
    }

    #[test]
    fn test_windows_suffix_carries_into_signature() {
        let layout = layout(Os::Windows);
        assert_eq!(
            layout.binary_path().file_name().and_then(|n| n.to_str()),
            Some("srv.exe")
        );
        assert_eq!(
            layout.signature_path().file_name().and_then(|n| n.to_str()),
            Some("srv.exe.sig")
        );
    }

    #[tokio::test]
    async fn test_file_exists_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("present");
        tokio::fs::write(&file, b"x").await.unwrap();

        assert!(file_exists(&file).await.unwrap());
        assert!(!file_exists(&dir.path().join("missing")).await.unwrap());
        // A directory is not a usable binary
        assert!(!file_exists(dir.path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_clean_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path(), "srv", "1.2.3", Os::Linux);

        // Nothing to delete yet
        layout.clean().await.unwrap();

        tokio::fs::create_dir_all(layout.versioned_dir()).await.unwrap();
        tokio::fs::write(layout.binary_path(), b"bin").await.unwrap();
        layout.clean().await.unwrap();
        assert!(!layout.bin_cache_dir().exists());

        layout.clean().await.unwrap();
    }
}
