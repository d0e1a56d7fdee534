//! binstrap-core - verified server-binary readiness
//!
//! Guarantees a client has a verified, version-matched, platform-appropriate
//! server binary on disk before launching it, fetching and validating it on
//! demand when absent.
//!
//! # Overview
//!
//! The entry points are [`ops::load_server`], which runs the readiness
//! computation in the background and reports progress plus exactly one
//! terminal outcome over an event channel, and [`ops::ensure_ready`], the
//! direct async-call form. Everything else is plumbing underneath them:
//!
//! - [`platform`] resolves the host into an artifact identity. All platform
//!   knowledge (asset naming, archive format, executable suffix, whether
//!   signatures ship) lives in this one capability table.
//! - [`storage`] maps a tool and version to canonical cache paths.
//! - [`io::download`] performs the HTTP fetch and hands back a live byte
//!   stream.
//! - [`io::extract`] unpacks that stream into the cache through external
//!   unpack tools.
//! - [`validate`] verifies a detached Ed25519ph signature over the binary
//!   against a bundled public key.
//!
//! # Directory layout
//!
//! ```text
//! <storage root>/
//! └── bin/
//!     └── <version>/
//!         ├── <tool>[.exe]        # the server binary
//!         └── <tool>[.exe].sig    # detached signature (base64), non-macOS
//! ```
//!
//! A cache entry is either fully populated or treated as absent; partial
//! entries are wiped wholesale and refetched.

pub mod error;
pub mod io;
pub mod ops;
pub mod platform;
pub mod reporter;
pub mod storage;
pub mod validate;

// Re-exports for convenience
pub use error::ReadyError;
pub use ops::{LoadContext, LoadEvent, ensure_ready, load_server};
pub use platform::{Arch, ArchiveKind, Os, Platform};
pub use reporter::{NullReporter, Reporter};

/// User Agent string sent with artifact downloads
pub const USER_AGENT: &str = concat!("binstrap/", env!("CARGO_PKG_VERSION"));
