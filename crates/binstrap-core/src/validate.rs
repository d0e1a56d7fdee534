//! Detached signature verification.
//!
//! Release archives ship the server binary alongside a detached Ed25519ph
//! signature (base64 text). Verification streams the binary through an
//! incremental SHA-512 digest and finalizes against the bundled public
//! key, so memory use is independent of binary size.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::{Signature, VerifyingKey};
use sha2::{Digest, Sha512};
use thiserror::Error;
use tokio::io::AsyncReadExt;

use crate::platform::Os;
use crate::reporter::Reporter;

/// Failures while checking the server binary's signature.
#[derive(Error, Debug)]
pub enum ValidateError {
    /// The key, signature, or binary could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The bundled public key is not a valid base64 Ed25519 key.
    #[error("invalid public key: {0}")]
    Key(String),

    /// The signature file is not a valid base64 Ed25519 signature.
    #[error("invalid signature encoding: {0}")]
    Encoding(String),

    /// Verification ran and the signature does not match the binary.
    #[error("signature does not match the binary")]
    Mismatch,
}

/// Whether the binary's signature must be verified on this host.
///
/// False on macOS: Gatekeeper performs its own verification and the macOS
/// archives include no signature file. False when the operator disabled
/// the safety check; that is a deliberate trust decision and is warned
/// about loudly rather than passing in silence. True otherwise.
pub fn required(os: Os, disable_safety_check: bool, reporter: &dyn Reporter) -> bool {
    if !os.ships_signature() {
        return false;
    }
    if disable_safety_check {
        reporter.warning("Safety check is disabled. This is not recommended.");
        return false;
    }
    true
}

/// Verify the detached signature over `binary` against the bundled key.
///
/// Both the key and the signature are base64 text files, trimmed of
/// surrounding whitespace. The binary is digested in fixed-size chunks and
/// verified with Ed25519ph (SHA-512 prehash). A mismatch is
/// [`ValidateError::Mismatch`]; everything else means the check could not
/// run at all.
pub async fn verify_detached(
    binary: &Path,
    signature: &Path,
    public_key: &Path,
) -> Result<(), ValidateError> {
    let key_text = tokio::fs::read_to_string(public_key).await?;
    let key_bytes = BASE64
        .decode(key_text.trim())
        .map_err(|err| ValidateError::Key(err.to_string()))?;
    let key_bytes: [u8; 32] = key_bytes
        .as_slice()
        .try_into()
        .map_err(|_| ValidateError::Key("expected a 32-byte Ed25519 key".to_string()))?;
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|err| ValidateError::Key(err.to_string()))?;

    let signature_text = tokio::fs::read_to_string(signature).await?;
    let signature_bytes = BASE64
        .decode(signature_text.trim())
        .map_err(|err| ValidateError::Encoding(err.to_string()))?;
    let signature_bytes: [u8; 64] = signature_bytes
        .as_slice()
        .try_into()
        .map_err(|_| ValidateError::Encoding("expected a 64-byte signature".to_string()))?;
    let signature = Signature::from_bytes(&signature_bytes);

    let mut digest = Sha512::new();
    let mut file = tokio::fs::File::open(binary).await?;
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        digest.update(&buf[..read]);
    }

    verifying_key
        .verify_prehashed(digest, None, &signature)
        .map_err(|_| ValidateError::Mismatch)
}
