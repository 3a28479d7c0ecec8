//! The encrypted store on disk.
//!
//! [`StoreFile`] couples a data path with the key that seals it. Every save
//! writes a temporary file next to the target and renames it into place, so a
//! crash mid-write leaves the previous store intact. [`StoreLock`] keeps a
//! second process from opening the same store while a session is running.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::crypto::{CodecError, EncryptionKey, decode_store, encode_store};
use crate::vault::store::CredentialStore;

#[derive(Debug, Error)]
pub enum StoreFileError {
    #[error("Failed to access store file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write store file {path}: {reason}")]
    AtomicWrite { path: PathBuf, reason: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("store is locked by another session ({0})")]
    Locked(PathBuf),
}

impl StoreFileError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreFileError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// An encrypted store file and its key.
#[derive(Debug)]
pub struct StoreFile {
    path: PathBuf,
    key: EncryptionKey,
}

impl StoreFile {
    pub fn new(path: impl Into<PathBuf>, key: EncryptionKey) -> Self {
        Self {
            path: path.into(),
            key,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read and decrypt the store.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<CredentialStore, StoreFileError> {
        let blob = fs::read(&self.path).map_err(|e| StoreFileError::io(&self.path, e))?;
        let store = decode_store(&blob, &self.key)?;
        debug!(entries = store.len(), "Loaded store");
        Ok(store)
    }

    /// Encrypt and atomically replace the store on disk.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub fn save(&self, store: &CredentialStore) -> Result<(), StoreFileError> {
        let blob = encode_store(store, &self.key)?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| StoreFileError::io(parent, e))?;

        // Same directory as the target so the rename stays on one filesystem
        let mut temp_file =
            NamedTempFile::new_in(parent).map_err(|e| StoreFileError::io(parent, e))?;
        temp_file
            .write_all(&blob)
            .and_then(|()| temp_file.as_file().sync_all())
            .map_err(|e| StoreFileError::io(temp_file.path(), e))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| StoreFileError::AtomicWrite {
                path: self.path.clone(),
                reason: format!("Failed to persist temp file: {e}"),
            })?;

        info!(entries = store.len(), bytes = blob.len(), "Saved store");
        Ok(())
    }
}

/// Exclusive advisory lock on `<data path>.lock`, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    _file: File,
}

impl StoreLock {
    /// Take the lock without waiting. Fails with [`StoreFileError::Locked`] if
    /// another session holds it.
    #[instrument(level = "debug", skip_all, fields(data = %data_path.display()))]
    pub fn acquire(data_path: &Path) -> Result<Self, StoreFileError> {
        let path = lock_path_for(data_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreFileError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StoreFileError::io(&path, e))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                debug!(lock = %path.display(), "Acquired store lock");
                Ok(Self { path, _file: file })
            }
            Err(e) if is_contended(&e) => {
                warn!(lock = %path.display(), "Store lock is held by another process");
                Err(StoreFileError::Locked(path))
            }
            Err(e) => Err(StoreFileError::io(&path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// `data.bin` -> `data.bin.lock`
pub fn lock_path_for(data_path: &Path) -> PathBuf {
    let mut name = data_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}
