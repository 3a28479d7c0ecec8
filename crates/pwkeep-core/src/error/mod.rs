//! Error types for the pwkeep core crate
//!
//! Each module owns its error enum; this module re-exports them so callers
//! have a single place to import from.

pub use crate::crypto::{CodecError, KeyError};
pub use crate::shell::ShellError;
pub use crate::vault::bootstrap::BootstrapError;
pub use crate::vault::config::ConfigError;
pub use crate::vault::store::StoreError;
pub use crate::vault::store_file::StoreFileError;
