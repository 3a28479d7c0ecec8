//! Application home layout and the JSON files that describe it.
//!
//! A pwkeep home directory contains:
//!
//! ```text
//! <home>/
//!   config.json    user settings: ENCRYPTION_METHOD, DATA_LOCATION
//!   mgr.json       first-run marker: INITIAL (read-only after bootstrap)
//!   meta.json      written by bootstrap: method, key and data paths (read-only)
//!   keys/store.key raw key bytes (read-only)
//!   data.bin       encrypted store (location set by DATA_LOCATION)
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

pub const CONFIG_FILE: &str = "config.json";
pub const MARKER_FILE: &str = "mgr.json";
pub const METADATA_FILE: &str = "meta.json";
pub const KEY_DIR: &str = "keys";
pub const KEY_FILE: &str = "store.key";
pub const DATA_FILE: &str = "data.bin";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown encryption method from config file `{0}`")]
    UnsupportedEncryptionMethod(String),
}

impl ConfigError {
    fn io(path: &Path, source: io::Error) -> Self {
        ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Encryption schemes the store can be sealed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMethod {
    Aes256Gcm,
}

impl EncryptionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            EncryptionMethod::Aes256Gcm => "AES-256-GCM",
        }
    }
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AES-256-GCM" => Ok(EncryptionMethod::Aes256Gcm),
            other => Err(ConfigError::UnsupportedEncryptionMethod(other.to_owned())),
        }
    }
}

/// User settings read by bootstrap.
///
/// The method is kept as a string here so that an unknown value parses and
/// is rejected by bootstrap with a clear message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(rename = "ENCRYPTION_METHOD")]
    pub encryption_method: String,
    /// Directory holding the encrypted store. Relative paths resolve against the home.
    #[serde(rename = "DATA_LOCATION")]
    pub data_location: PathBuf,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            encryption_method: EncryptionMethod::Aes256Gcm.as_str().to_owned(),
            data_location: PathBuf::from("."),
        }
    }
}

impl UserConfig {
    pub fn method(&self) -> Result<EncryptionMethod, ConfigError> {
        self.encryption_method.parse()
    }
}

/// First-run marker. `initial` flips to false exactly once, after bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstRunMarker {
    #[serde(rename = "INITIAL", deserialize_with = "bool_or_legacy_string")]
    pub initial: bool,
}

impl Default for FirstRunMarker {
    fn default() -> Self {
        Self { initial: true }
    }
}

/// Paths and method recorded by bootstrap, read at every session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "ENCRYPTION_METHOD")]
    pub encryption_method: String,
    #[serde(rename = "KEY_LOCATION")]
    pub key_location: PathBuf,
    #[serde(rename = "DATA_LOCATION")]
    pub data_location: PathBuf,
}

impl Metadata {
    pub fn method(&self) -> Result<EncryptionMethod, ConfigError> {
        self.encryption_method.parse()
    }
}

/// Accepts `true`/`false` as well as the legacy `"True"`/`"False"` strings.
fn bool_or_legacy_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct BoolLike;

    impl Visitor<'_> for BoolLike {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a boolean or \"True\"/\"False\"")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v {
                "True" | "true" => Ok(true),
                "False" | "false" => Ok(false),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }

    deserializer.deserialize_any(BoolLike)
}

/// Locations of everything under one pwkeep home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppLayout {
    home: PathBuf,
}

impl AppLayout {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join(CONFIG_FILE)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.home.join(MARKER_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.home.join(METADATA_FILE)
    }

    pub fn key_path(&self) -> PathBuf {
        self.home.join(KEY_DIR).join(KEY_FILE)
    }

    /// Resolve the store file for a configured data directory.
    pub fn data_path(&self, data_location: &Path) -> PathBuf {
        self.resolve(data_location).join(DATA_FILE)
    }

    /// Resolve a possibly relative path against the home directory.
    ///
    /// `.` components are dropped, so the default `DATA_LOCATION` of `.`
    /// resolves to the home directory itself.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.home.join(path)
        };
        joined
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }

    /// Create the home directory and default `config.json`/`mgr.json` when absent.
    ///
    /// Existing files are left untouched.
    #[instrument(level = "debug", skip_all, fields(home = %self.home.display()))]
    pub fn ensure_seeded(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.home).map_err(|e| ConfigError::io(&self.home, e))?;

        let config_path = self.config_path();
        if !config_path.exists() {
            write_json(&config_path, &UserConfig::default())?;
            debug!("Seeded default config");
        }

        let marker_path = self.marker_path();
        if !marker_path.exists() {
            write_json(&marker_path, &FirstRunMarker::default())?;
            debug!("Seeded first-run marker");
        }
        Ok(())
    }

    pub fn load_config(&self) -> Result<UserConfig, ConfigError> {
        read_json(&self.config_path())
    }

    pub fn load_marker(&self) -> Result<FirstRunMarker, ConfigError> {
        read_json(&self.marker_path())
    }

    pub fn load_metadata(&self) -> Result<Metadata, ConfigError> {
        read_json(&self.metadata_path())
    }
}

/// Read a JSON document.
pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a pretty-printed JSON document, replacing any existing file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(value).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(|e| ConfigError::io(path, e))
}

/// Drop write permission on a file so it cannot be modified by accident.
pub fn make_read_only(path: &Path) -> Result<(), ConfigError> {
    let mut permissions = fs::metadata(path)
        .map_err(|e| ConfigError::io(path, e))?
        .permissions();
    permissions.set_readonly(true);
    fs::set_permissions(path, permissions).map_err(|e| ConfigError::io(path, e))
}
