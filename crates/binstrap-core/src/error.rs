//! Domain-specific errors for the readiness pipeline

use thiserror::Error;

use crate::io::download::DownloadError;
use crate::io::extract::ExtractError;
use crate::platform::UnsupportedPlatform;
use crate::validate::ValidateError;

/// Terminal failure of one readiness computation.
///
/// Component errors bubble up unchanged or wrapped with context; the
/// orchestrator is the single point that turns them into the terminal
/// event. None of these are retried internally; re-invoking the whole
/// operation is the only retry.
#[derive(Error, Debug)]
pub enum ReadyError {
    /// No artifact is published for this `(os, arch)` pair.
    #[error(transparent)]
    UnsupportedPlatform(#[from] UnsupportedPlatform),

    /// Operator-supplied configuration is unusable (e.g. the override
    /// path does not exist).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The fetch failed at the network or HTTP level.
    #[error("failed to download server binary: {0}")]
    Download(#[from] DownloadError),

    /// The archive could not be unpacked into the cache.
    #[error("failed to download server binary: {0}")]
    Extraction(#[from] ExtractError),

    /// Signature verification ran and failed. This is a trust boundary;
    /// it is never downgraded to a warning.
    #[error(
        "the server binary may be corrupted or can no longer be verified; update the client and try again"
    )]
    SignatureMismatch,

    /// The key, signature, or binary could not be read or decoded, so
    /// verification never ran. Distinct from [`Self::SignatureMismatch`]
    /// so operators can tell "could not check" from "checked and failed".
    #[error("could not verify server binary: {0}")]
    ValidationIo(String),

    /// Filesystem failure outside the categories above (e.g. a
    /// permission error while probing the cache).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ValidateError> for ReadyError {
    fn from(err: ValidateError) -> Self {
        match err {
            ValidateError::Mismatch => Self::SignatureMismatch,
            other => Self::ValidationIo(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_error_split() {
        assert!(matches!(
            ReadyError::from(ValidateError::Mismatch),
            ReadyError::SignatureMismatch
        ));
        assert!(matches!(
            ReadyError::from(ValidateError::Io(std::io::Error::other("boom"))),
            ReadyError::ValidationIo(_)
        ));
    }

    #[test]
    fn test_download_phase_context() {
        let err = ReadyError::from(DownloadError::Status {
            status: "404 Not Found".to_string(),
            url: "http://host/v1/srv.tar.gz".to_string(),
        });
        let msg = err.to_string();
        assert!(msg.starts_with("failed to download server binary"));
        assert!(msg.contains("404"));
    }
}
