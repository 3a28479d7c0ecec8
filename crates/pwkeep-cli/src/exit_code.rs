//! Exit codes for the CLI.
//!
//! Scripts can tell a wrong master password apart from a damaged store or a
//! concurrent session without parsing messages.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Every master password attempt failed
pub const AUTH_FAILED: u8 = 3;

/// Store or key file missing, unreadable, corrupt or tampered with
pub const STORE_INVALID: u8 = 4;

/// Another session holds the store lock
pub const STORE_LOCKED: u8 = 9;

/// `ENCRYPTION_METHOD` names a scheme pwkeep does not implement
pub const UNSUPPORTED_METHOD: u8 = 10;
