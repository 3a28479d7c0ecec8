//! Authenticated encryption of the credential store.
//!
//! A store is serialized to JSON and sealed with AES-256-GCM under the
//! [`EncryptionKey`]. The on-disk blob is:
//!
//! ```text
//! version (1 byte) || nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! The version byte is bound as associated data, so altering any byte of the
//! blob (including the version) fails authentication. Both functions are pure;
//! file I/O lives in [`crate::vault::store_file`].

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::RngCore;
use thiserror::Error;
use tracing::{instrument, trace, warn};
use zeroize::Zeroizing;

use super::keys::EncryptionKey;
use crate::vault::store::CredentialStore;

/// Current blob format version.
pub const FORMAT_VERSION: u8 = 1;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + NONCE_LEN;

#[derive(Debug, Error)]
pub enum CodecError {
    /// The blob did not authenticate under the key.
    ///
    /// **[INTEGRITY VIOLATION]** Wrong key, truncated file, unknown format
    /// version, or tampered ciphertext. The AEAD tag cannot tell these apart.
    #[error("Failed to decrypt store: {reason} - wrong key or corrupted/tampered data")]
    Decryption { reason: &'static str },

    /// Decrypted bytes are not a well-formed store document.
    #[error("Decrypted store is not valid: {0}")]
    Parse(#[source] serde_json::Error),

    /// Serialization or encryption failed while sealing a store.
    #[error("Failed to encrypt store: {0}")]
    Encryption(String),
}

/// Serialize and seal a store.
///
/// A fresh random nonce is drawn on every call, so encoding the same store
/// twice yields different blobs.
#[instrument(level = "debug", skip_all, fields(entries = store.len()))]
pub fn encode_store(store: &CredentialStore, key: &EncryptionKey) -> Result<Vec<u8>, CodecError> {
    let plaintext = Zeroizing::new(
        serde_json::to_vec(store).map_err(|e| CodecError::Encryption(e.to_string()))?,
    );

    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let aad = [FORMAT_VERSION];
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext.as_slice(),
                aad: &aad,
            },
        )
        .map_err(|e| CodecError::Encryption(e.to_string()))?;

    let mut blob = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    blob.push(FORMAT_VERSION);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);

    trace!(blob_len = blob.len(), "Encoded store");
    Ok(blob)
}

/// Open and parse a sealed store.
#[instrument(level = "debug", skip_all, fields(blob_len = blob.len()))]
pub fn decode_store(blob: &[u8], key: &EncryptionKey) -> Result<CredentialStore, CodecError> {
    if blob.len() < HEADER_LEN + TAG_LEN {
        warn!("Store blob too short");
        return Err(CodecError::Decryption {
            reason: "blob is truncated",
        });
    }

    let (version, rest) = (blob[0], &blob[1..]);
    if version != FORMAT_VERSION {
        warn!(version, "Unknown store format version");
        return Err(CodecError::Decryption {
            reason: "unknown format version",
        });
    }

    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let aad = [version];
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| {
                warn!("Store decryption failed - authentication tag mismatch");
                CodecError::Decryption {
                    reason: "authentication tag mismatch",
                }
            })?,
    );

    serde_json::from_slice(&plaintext).map_err(CodecError::Parse)
}
