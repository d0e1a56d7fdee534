//! Readiness orchestration.
//!
//! One readiness computation runs per invocation: check the cache, fetch
//! and extract on a miss, verify the signature when required, and report a
//! single terminal outcome. The sequence is arranged so that no caller can
//! observe an unverified binary while verification is required.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::ReadyError;
use crate::io::{download, extract};
use crate::platform::{ArchiveKind, Platform};
use crate::reporter::Reporter;
use crate::storage::{self, StorageLayout};
use crate::validate;

/// Inbound context from the host: where to cache, what to fetch, and the
/// operator's configuration.
#[derive(Debug, Clone)]
pub struct LoadContext {
    /// Stable per-installation storage root. This subsystem owns
    /// everything under `<storage_root>/bin`.
    pub storage_root: PathBuf,
    /// Tool name; release asset and binary filenames derive from it.
    pub tool: String,
    /// Target version, without the leading `v`.
    pub version: String,
    /// Base URL of the release downloads, up to but excluding the
    /// `/v<version>/` segment.
    pub release_base: String,
    /// Path to the bundled base64 Ed25519 public key file.
    pub public_key_path: PathBuf,
    /// Operator override: absolute path to a pre-existing binary. When
    /// set it supersedes cache, download, and validation, but the path
    /// must exist; a dangling override is a configuration error, not
    /// something to ignore.
    pub binary_override: Option<PathBuf>,
    /// Skip signature verification. A deliberate, warned-about trust
    /// decision.
    pub disable_verification: bool,
    /// Trust a cache entry that is already complete without re-verifying
    /// it. Defaults to off: a complete entry is still verified on every
    /// invocation, so a binary swapped on disk after download is caught.
    pub trust_cached: bool,
    /// Host OS string, normally `std::env::consts::OS`.
    pub host_os: String,
    /// Host architecture string, normally `std::env::consts::ARCH`.
    pub host_arch: String,
}

impl LoadContext {
    /// Context with the host platform detected from the running process
    /// and all optional settings off.
    pub fn new(
        storage_root: impl Into<PathBuf>,
        tool: &str,
        version: &str,
        release_base: &str,
        public_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            storage_root: storage_root.into(),
            tool: tool.to_string(),
            version: version.to_string(),
            release_base: release_base.to_string(),
            public_key_path: public_key_path.into(),
            binary_override: None,
            disable_verification: false,
            trust_cached: false,
            host_os: std::env::consts::OS.to_string(),
            host_arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Progress and outcome of one readiness computation.
#[derive(Debug)]
pub enum LoadEvent {
    /// The cache was incomplete and a download is beginning. Fires at
    /// most once, always before the terminal event.
    DownloadStarted,
    /// Terminal: the verified binary is ready at this path.
    Ready(PathBuf),
    /// Terminal: the computation failed.
    Failed(ReadyError),
}

/// Run the readiness computation in the background, reporting over a
/// channel.
///
/// Postcondition: exactly one terminal event ([`LoadEvent::Ready`] or
/// [`LoadEvent::Failed`]) is sent per invocation, and it is the last
/// event. Dropping the receiver abandons the listening side only;
/// in-flight work (including external unpack processes) runs to
/// completion or natural failure.
pub fn load_server(ctx: LoadContext, reporter: Arc<dyn Reporter>) -> mpsc::Receiver<LoadEvent> {
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        let outcome = run(&ctx, &reporter, &tx).await;
        let terminal = match outcome {
            Ok(path) => LoadEvent::Ready(path),
            Err(err) => LoadEvent::Failed(err),
        };
        let _ = tx.send(terminal).await;
    });
    rx
}

/// Direct-call form of [`load_server`]: resolve the binary path or fail.
pub async fn ensure_ready(
    ctx: &LoadContext,
    reporter: &dyn Reporter,
) -> Result<PathBuf, ReadyError> {
    // Progress events are discarded; the channel is sized so `run` never
    // blocks on them.
    let (tx, _rx) = mpsc::channel(4);
    run(ctx, reporter, &tx).await
}

async fn run(
    ctx: &LoadContext,
    reporter: &dyn Reporter,
    events: &mpsc::Sender<LoadEvent>,
) -> Result<PathBuf, ReadyError> {
    if let Some(override_path) = &ctx.binary_override {
        if !storage::file_exists(override_path).await? {
            return Err(ReadyError::Configuration(format!(
                "server path override does not exist: {}",
                override_path.display()
            )));
        }
        reporter.warning(&format!(
            "Using server path override: {}",
            override_path.display()
        ));
        return Ok(override_path.clone());
    }

    let platform = Platform::from_host(&ctx.host_os, &ctx.host_arch)?;
    let layout = StorageLayout::new(&ctx.storage_root, &ctx.tool, &ctx.version, platform.os);

    // Recomputed on every invocation so a configuration change is honored
    // on the next check, not cached across runs.
    let validation_required = validate::required(platform.os, ctx.disable_verification, reporter);

    reporter.info("Checking for required files...");
    let cache_was_complete = cache_complete(&layout, validation_required).await?;

    if !cache_was_complete {
        reporter.info("Required files not found. Downloading server binary...");
        // Wipe stale versions before fetching; a partial entry must never
        // be mixed with fresh artifacts. Failure here is logged and does
        // not mask the download outcome.
        if let Err(err) = layout.clean().await {
            reporter.error(&format!("Failed to clean up bin directory: {err}"));
        }
        let _ = events.send(LoadEvent::DownloadStarted).await;
        fetch_and_extract(ctx, platform, &layout, reporter).await?;
    }

    if validation_required && !(cache_was_complete && ctx.trust_cached) {
        reporter.info("Validating server binary signature...");
        validate::verify_detached(
            &layout.binary_path(),
            &layout.signature_path(),
            &ctx.public_key_path,
        )
        .await?;
    }

    let binary = layout.binary_path();
    reporter.info(&format!("Server binary is ready at: {}", binary.display()));
    Ok(binary)
}

/// A cache entry counts as present only when every required file exists:
/// the binary, plus the signature when validation applies. Anything less
/// is treated as fully absent.
async fn cache_complete(
    layout: &StorageLayout,
    validation_required: bool,
) -> Result<bool, ReadyError> {
    if !storage::file_exists(&layout.binary_path()).await? {
        return Ok(false);
    }
    if validation_required && !storage::file_exists(&layout.signature_path()).await? {
        return Ok(false);
    }
    Ok(true)
}

async fn fetch_and_extract(
    ctx: &LoadContext,
    platform: Platform,
    layout: &StorageLayout,
    reporter: &dyn Reporter,
) -> Result<(), ReadyError> {
    let asset = platform.asset_name(&ctx.tool);
    let url = download::asset_url(&ctx.release_base, &ctx.version, &asset);

    // Dispatch on the asset name, not on platform detection; the two must
    // agree by construction of the capability table.
    let kind = ArchiveKind::from_asset_name(&asset)
        .ok_or_else(|| extract::ExtractError::UnsupportedFormat(asset.clone()))?;

    reporter.info(&format!("Downloading server archive from: {url}"));
    let client = reqwest::Client::new();
    let response = download::start_download(&client, &url).await?;

    let target = layout.versioned_dir();
    reporter.info(&format!("Extracting server archive to: {}", target.display()));
    let mut reader = download::stream_reader(response);
    match kind {
        ArchiveKind::TarGz => extract::extract_tar_gz(&mut reader, &target).await?,
        ArchiveKind::Zip => extract::extract_zip(&mut reader, &target).await?,
    }

    Ok(())
}
