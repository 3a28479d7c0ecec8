#![forbid(unsafe_code)]

pub mod crypto;
pub mod error;
pub mod shell;
pub mod vault;

pub use crypto::{EncryptionKey, decode_store, encode_store};
pub use shell::{Clipboard, CommandLoop, Console, LoopSummary};
pub use vault::{
    AppLayout, AuthResult, Bootstrap, CredentialRecord, CredentialStore, Metadata, Session,
    StoreFile, ValidationReport,
};
