//! Cryptographic primitives for the credential store

pub mod codec;
pub mod keys;

pub use codec::{CodecError, FORMAT_VERSION, decode_store, encode_store};
pub use keys::{EncryptionKey, KEY_LEN, KeyError};
