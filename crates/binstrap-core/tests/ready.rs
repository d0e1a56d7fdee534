//! End-to-end readiness scenarios against a mock release server.

use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::SigningKey;
use sha2::{Digest, Sha512};

use binstrap_core::{LoadContext, LoadEvent, NullReporter, ReadyError, ensure_ready, load_server};

const TOOL: &str = "srv";
const VERSION: &str = "1.2.3";
const ASSET_PATH: &str = "/v1.2.3/srv_Linux_x86_64.tar.gz";

fn release_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

fn rogue_key() -> SigningKey {
    SigningKey::from_bytes(&[9u8; 32])
}

fn sign_b64(key: &SigningKey, payload: &[u8]) -> String {
    let mut digest = Sha512::new();
    digest.update(payload);
    let signature = key.sign_prehashed(digest, None).unwrap();
    BASE64.encode(signature.to_bytes())
}

/// Test environment with a temp storage root and a bundled public key.
struct TestEnv {
    _dir: tempfile::TempDir,
    storage_root: PathBuf,
    public_key: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let storage_root = dir.path().join("storage");
        let public_key = dir.path().join("release.pub");
        std::fs::write(
            &public_key,
            BASE64.encode(release_key().verifying_key().to_bytes()),
        )
        .unwrap();
        Self {
            _dir: dir,
            storage_root,
            public_key,
        }
    }

    /// Context pinned to Linux/x86_64 so asset names and validation
    /// behavior are identical on every test host.
    fn context(&self, release_base: &str) -> LoadContext {
        let mut ctx = LoadContext::new(
            &self.storage_root,
            TOOL,
            VERSION,
            release_base,
            &self.public_key,
        );
        ctx.host_os = "linux".to_string();
        ctx.host_arch = "x86_64".to_string();
        ctx
    }

    fn versioned_dir(&self) -> PathBuf {
        self.storage_root.join("bin").join(VERSION)
    }

    fn binary_path(&self) -> PathBuf {
        self.versioned_dir().join(TOOL)
    }

    fn signature_path(&self) -> PathBuf {
        self.versioned_dir().join(format!("{TOOL}.sig"))
    }

    /// Pre-populate a complete cache entry signed by `key`.
    fn populate_cache(&self, payload: &[u8], key: &SigningKey) {
        std::fs::create_dir_all(self.versioned_dir()).unwrap();
        std::fs::write(self.binary_path(), payload).unwrap();
        std::fs::write(self.signature_path(), sign_b64(key, payload)).unwrap();
    }
}

/// A release archive holding the binary and its detached signature, built
/// with the system tar tool.
fn release_archive(payload: &[u8], key: &SigningKey) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(TOOL), payload).unwrap();
    std::fs::write(dir.path().join(format!("{TOOL}.sig")), sign_b64(key, payload)).unwrap();
    let output = std::process::Command::new("tar")
        .arg("-cz")
        .arg("-C")
        .arg(dir.path())
        .arg(".")
        .output()
        .expect("failed to run tar");
    assert!(output.status.success());
    output.stdout
}

async fn collect_events(ctx: LoadContext) -> Vec<LoadEvent> {
    let mut rx = load_server(ctx, Arc::new(NullReporter));
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_empty_cache_downloads_then_ready() {
    let env = TestEnv::new();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", ASSET_PATH)
        .with_status(200)
        .with_body(release_archive(b"fresh server build", &release_key()))
        .create_async()
        .await;

    let events = collect_events(env.context(&server.url())).await;

    assert_eq!(events.len(), 2, "events: {events:?}");
    assert!(matches!(events[0], LoadEvent::DownloadStarted));
    match &events[1] {
        LoadEvent::Ready(path) => assert_eq!(path, &env.binary_path()),
        other => panic!("expected ready, got {other:?}"),
    }
    assert_eq!(
        std::fs::read(env.binary_path()).unwrap(),
        b"fresh server build"
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cache_hit_fast_path_makes_no_request() {
    let env = TestEnv::new();
    env.populate_cache(b"cached build", &release_key());

    // Unroutable base: any fetch attempt would fail the run.
    let events = collect_events(env.context("http://127.0.0.1:1")).await;

    assert_eq!(events.len(), 1, "events: {events:?}");
    match &events[0] {
        LoadEvent::Ready(path) => assert_eq!(path, &env.binary_path()),
        other => panic!("expected ready, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_signature_wipes_and_refetches() {
    let env = TestEnv::new();
    std::fs::create_dir_all(env.versioned_dir()).unwrap();
    std::fs::write(env.binary_path(), b"stale unverifiable build").unwrap();

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", ASSET_PATH)
        .with_status(200)
        .with_body(release_archive(b"replacement build", &release_key()))
        .create_async()
        .await;

    let events = collect_events(env.context(&server.url())).await;

    // A binary without its signature is a fully-missing entry
    assert!(matches!(events[0], LoadEvent::DownloadStarted));
    assert!(matches!(events[1], LoadEvent::Ready(_)));
    assert_eq!(
        std::fs::read(env.binary_path()).unwrap(),
        b"replacement build"
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_http_404_fails_and_leaves_no_cache() {
    let env = TestEnv::new();
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", ASSET_PATH)
        .with_status(404)
        .create_async()
        .await;

    let events = collect_events(env.context(&server.url())).await;

    assert_eq!(events.len(), 2, "events: {events:?}");
    assert!(matches!(events[0], LoadEvent::DownloadStarted));
    match &events[1] {
        LoadEvent::Failed(ReadyError::Download(_)) => {}
        other => panic!("expected download failure, got {other:?}"),
    }
    assert!(!env.storage_root.join("bin").exists());
}

#[tokio::test]
async fn test_wrong_key_cache_fails_without_deleting_files() {
    let env = TestEnv::new();
    env.populate_cache(b"tampered build", &rogue_key());

    let events = collect_events(env.context("http://127.0.0.1:1")).await;

    assert_eq!(events.len(), 1, "events: {events:?}");
    assert!(matches!(
        events[0],
        LoadEvent::Failed(ReadyError::SignatureMismatch)
    ));
    // Validation failure never triggers deletion; only an incomplete
    // entry does.
    assert!(env.binary_path().is_file());
    assert!(env.signature_path().is_file());
}

#[tokio::test]
async fn test_freshly_downloaded_binary_is_still_verified() {
    let env = TestEnv::new();
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", ASSET_PATH)
        .with_status(200)
        .with_body(release_archive(b"unverifiable build", &rogue_key()))
        .create_async()
        .await;

    let events = collect_events(env.context(&server.url())).await;

    assert!(matches!(events[0], LoadEvent::DownloadStarted));
    assert!(matches!(
        events[1],
        LoadEvent::Failed(ReadyError::SignatureMismatch)
    ));
}

#[tokio::test]
async fn test_override_path_short_circuits() {
    let env = TestEnv::new();
    let override_bin = env.storage_root.join("operator-server");
    std::fs::create_dir_all(&env.storage_root).unwrap();
    std::fs::write(&override_bin, b"operator build").unwrap();

    let mut ctx = env.context("http://127.0.0.1:1");
    ctx.binary_override = Some(override_bin.clone());

    let path = ensure_ready(&ctx, &NullReporter).await.unwrap();
    assert_eq!(path, override_bin);
    // The cache was never touched.
    assert!(!env.storage_root.join("bin").exists());
}

#[tokio::test]
async fn test_missing_override_is_a_configuration_error() {
    let env = TestEnv::new();
    let mut ctx = env.context("http://127.0.0.1:1");
    ctx.binary_override = Some(env.storage_root.join("nope"));

    let err = ensure_ready(&ctx, &NullReporter).await.unwrap_err();
    match err {
        ReadyError::Configuration(msg) => assert!(msg.contains("nope")),
        other => panic!("expected configuration error, got {other}"),
    }
    assert!(!env.storage_root.join("bin").exists());
}

#[tokio::test]
async fn test_disabled_verification_accepts_unsigned_cache() {
    let env = TestEnv::new();
    std::fs::create_dir_all(env.versioned_dir()).unwrap();
    std::fs::write(env.binary_path(), b"unsigned build").unwrap();

    let mut ctx = env.context("http://127.0.0.1:1");
    ctx.disable_verification = true;

    let path = ensure_ready(&ctx, &NullReporter).await.unwrap();
    assert_eq!(path, env.binary_path());
}

#[tokio::test]
async fn test_trust_cached_skips_reverification() {
    let env = TestEnv::new();
    env.populate_cache(b"swapped on disk", &rogue_key());

    let mut ctx = env.context("http://127.0.0.1:1");
    ctx.trust_cached = true;

    // The documented trust gap: a complete entry is taken at face value.
    let path = ensure_ready(&ctx, &NullReporter).await.unwrap();
    assert_eq!(path, env.binary_path());

    // Default behavior re-verifies and catches the swap.
    ctx.trust_cached = false;
    let err = ensure_ready(&ctx, &NullReporter).await.unwrap_err();
    assert!(matches!(err, ReadyError::SignatureMismatch));
}

#[tokio::test]
async fn test_unsupported_platform_fails_before_any_io() {
    let env = TestEnv::new();
    let mut ctx = env.context("http://127.0.0.1:1");
    ctx.host_os = "freebsd".to_string();

    let err = ensure_ready(&ctx, &NullReporter).await.unwrap_err();
    assert!(matches!(err, ReadyError::UnsupportedPlatform(_)));
    assert!(!env.storage_root.exists());
}

#[tokio::test]
async fn test_exactly_one_terminal_event() {
    let env = TestEnv::new();
    env.populate_cache(b"cached build", &release_key());

    let events = collect_events(env.context("http://127.0.0.1:1")).await;
    let terminals = events
        .iter()
        .filter(|e| matches!(e, LoadEvent::Ready(_) | LoadEvent::Failed(_)))
        .count();
    assert_eq!(terminals, 1);
    assert!(matches!(events.last(), Some(LoadEvent::Ready(_))));
}
