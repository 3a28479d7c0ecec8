#![forbid(unsafe_code)]

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;
use thiserror::Error;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

/// Length of the store encryption key in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Errors that can occur while creating, loading or persisting key material.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The key file could not be read or written.
    #[error("Key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The key file does not contain exactly `KEY_LEN` bytes.
    ///
    /// This usually means the file was truncated, replaced, or is not a key file at all.
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Refusing to overwrite an existing key file.
    #[error("Key file already exists: {0}")]
    AlreadyExists(PathBuf),
}

/// Symmetric key protecting the encrypted store file.
///
/// The key is generated once during bootstrap and lives in its own file; it is
/// never written into the store. The bytes are wiped from memory on drop and
/// are never shown by `Debug`.
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl EncryptionKey {
    /// Generate a fresh random key from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        rand::rng().fill_bytes(&mut *bytes);
        Self { bytes }
    }

    /// Build a key from raw bytes.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, KeyError> {
        let array: [u8; KEY_LEN] = raw.try_into().map_err(|_| KeyError::InvalidLength {
            expected: KEY_LEN,
            actual: raw.len(),
        })?;
        Ok(Self {
            bytes: Zeroizing::new(array),
        })
    }

    /// Read a key file containing the raw key bytes.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, KeyError> {
        let raw = Zeroizing::new(fs::read(path).map_err(|source| KeyError::Io {
            path: path.to_path_buf(),
            source,
        })?);
        let key = Self::from_bytes(&raw)?;
        debug!("Loaded store key");
        Ok(key)
    }

    /// Write the raw key bytes to a new file.
    ///
    /// Fails with [`KeyError::AlreadyExists`] rather than replacing an existing
    /// key, since that would orphan whatever store the old key protects.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn write_new(&self, path: &Path) -> Result<(), KeyError> {
        let io_err = |source| KeyError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| {
                if source.kind() == io::ErrorKind::AlreadyExists {
                    KeyError::AlreadyExists(path.to_path_buf())
                } else {
                    io_err(source)
                }
            })?;
        file.write_all(&*self.bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        debug!("Wrote store key");
        Ok(())
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
