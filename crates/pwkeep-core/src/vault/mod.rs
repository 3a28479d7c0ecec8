//! Credential store, master-password session and on-disk state.

pub mod bootstrap;
pub mod config;
pub mod policy;
pub mod session;
pub mod store;
pub mod store_file;

pub use bootstrap::{Bootstrap, BootstrapError, BootstrapState, collect_root_password};
pub use config::{AppLayout, ConfigError, EncryptionMethod, FirstRunMarker, Metadata, UserConfig};
pub use policy::{ValidationReport, describe_rules, validate};
pub use session::{AuthResult, MAX_ATTEMPTS, MASK_PLACEHOLDER, Session};
pub use store::{CredentialRecord, CredentialStore, RESERVED_TITLE, StoreError};
pub use store_file::{StoreFile, StoreFileError, StoreLock};
