//! Archive extraction through external unpack tools.
//!
//! Two strategies, selected by [`crate::platform::ArchiveKind`]:
//!
//! - tar.gz archives are piped straight from the download stream into an
//!   external `tar` process, so nothing is staged on disk and peak disk use
//!   is the extracted size only;
//! - zip archives (Windows) are staged into a temp file and expanded with
//!   `Expand-Archive`, since the platform utility cannot read from a pipe.
//!
//! Neither strategy promises anything about partial content on failure. The
//! orchestrator's completeness check treats a half-written entry as absent
//! on the next run.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::Command;

/// Failures while unpacking a downloaded archive.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Filesystem or stream I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The asset name does not map to a known archive format.
    #[error("unsupported asset type: {0}")]
    UnsupportedFormat(String),

    /// The external unpack tool exited unsuccessfully.
    #[error("{tool} failed ({status}): {stderr}")]
    Tool {
        /// Name of the tool that was invoked.
        tool: &'static str,
        /// Its exit status.
        status: ExitStatus,
        /// Captured diagnostic output.
        stderr: String,
    },

    /// Zip extraction invoked on a host that has no zip artifacts.
    ///
    /// This is a contract violation by the caller, caught before the
    /// stream is touched.
    #[error("zip extraction is only supported on Windows")]
    ZipUnsupportedHost,
}

/// Stream a gzipped tarball into `dest` via the external `tar` tool.
///
/// The target directory is created first, parents included. `tar` reads the
/// archive from stdin; its stderr is captured and attached to the error on
/// a non-zero exit.
pub async fn extract_tar_gz<R>(reader: &mut R, dest: &Path) -> Result<(), ExtractError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    tokio::fs::create_dir_all(dest).await?;

    let mut child = Command::new("tar")
        .arg("-xz")
        .arg("-C")
        .arg(dest)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::other("tar stdin was not captured"))?;
    let copy_result = tokio::io::copy(reader, &mut stdin).await;
    drop(stdin);

    let output = child.wait_with_output().await?;

    // A broken pipe means tar died first; report its status and stderr
    // below instead of the secondary write error.
    if let Err(err) = copy_result {
        if err.kind() != io::ErrorKind::BrokenPipe {
            return Err(ExtractError::Io(err));
        }
    }

    if !output.status.success() {
        return Err(ExtractError::Tool {
            tool: "tar",
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

/// Stage a zip stream to a temp file and expand it into `dest`.
///
/// Only valid on Windows; the zip-using platform is the only one that
/// publishes zip artifacts. The staged file is deleted afterwards no matter
/// how the unpack went; a failed delete is logged and never escalated.
pub async fn extract_zip<R>(reader: &mut R, dest: &Path) -> Result<(), ExtractError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if !cfg!(target_os = "windows") {
        return Err(ExtractError::ZipUnsupportedHost);
    }

    tokio::fs::create_dir_all(dest).await?;

    let staged = tempfile::Builder::new()
        .prefix("binstrap-")
        .suffix(".zip")
        .tempfile()?;

    let mut file = tokio::fs::File::from_std(staged.as_file().try_clone()?);
    tokio::io::copy(reader, &mut file).await?;
    file.flush().await?;
    // Close our write handle so Expand-Archive can open the file.
    drop(file);

    let result = run_expand_archive(staged.path(), dest).await;

    if let Err(err) = staged.close() {
        tracing::warn!("failed to delete staged zip archive: {err}");
    }

    result
}

async fn run_expand_archive(archive: &Path, dest: &Path) -> Result<(), ExtractError> {
    let script = format!(
        "Expand-Archive -Path \"{}\" -DestinationPath \"{}\" -Force",
        archive.display(),
        dest.display()
    );

    let output = Command::new("powershell.exe")
        .arg("-NoProfile")
        .arg("-Command")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(ExtractError::Tool {
            tool: "Expand-Archive",
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}
