//! In-memory credential store.
//!
//! The root credential is a dedicated field rather than a specially-excluded
//! map entry, so enumerating titles never needs to filter it out. On the wire
//! the store keeps the flat document shape
//! `{"USER": {"root": ...}, "<title>": {"username": ..., "password": ...}}`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroize;

/// Title under which the root credential is serialized. Never usable as an
/// ordinary credential title.
pub const RESERVED_TITLE: &str = "USER";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("`USER` is reserved and cannot be used as a credential title")]
    ReservedTitle,

    #[error("title `{0}` not found in credentials")]
    NotFound(String),

    #[error("title `{0}` already in database")]
    AlreadyExists(String),
}

/// A titled username/password pair.
///
/// The password is wiped from memory on drop and never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    username: String,
    password: String,
}

impl CredentialRecord {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl Drop for CredentialRecord {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// The master password, created once at bootstrap and immutable afterwards.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RootCredential {
    root: String,
}

impl Drop for RootCredential {
    fn drop(&mut self) {
        self.root.zeroize();
    }
}

/// Credential mapping plus the root credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStore {
    #[serde(rename = "USER")]
    user: RootCredential,
    #[serde(flatten)]
    entries: BTreeMap<String, CredentialRecord>,
}

impl CredentialStore {
    /// Create a store holding only the root credential.
    pub fn create(root_password: impl Into<String>) -> Self {
        Self {
            user: RootCredential {
                root: root_password.into(),
            },
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, title: &str) -> Result<&CredentialRecord, StoreError> {
        check_title(title)?;
        self.entries
            .get(title)
            .ok_or_else(|| StoreError::NotFound(title.to_owned()))
    }

    /// Whether an ordinary credential exists under `title`. Always false for
    /// the reserved title.
    pub fn contains(&self, title: &str) -> bool {
        title != RESERVED_TITLE && self.entries.contains_key(title)
    }

    /// Add a credential, refusing to replace an existing one.
    pub fn insert(&mut self, title: &str, record: CredentialRecord) -> Result<(), StoreError> {
        check_title(title)?;
        if self.entries.contains_key(title) {
            return Err(StoreError::AlreadyExists(title.to_owned()));
        }
        self.entries.insert(title.to_owned(), record);
        Ok(())
    }

    /// Add or fully overwrite a credential, returning the replaced record.
    pub fn put(
        &mut self,
        title: &str,
        record: CredentialRecord,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        check_title(title)?;
        Ok(self.entries.insert(title.to_owned(), record))
    }

    pub fn remove(&mut self, title: &str) -> Result<CredentialRecord, StoreError> {
        check_title(title)?;
        self.entries
            .remove(title)
            .ok_or_else(|| StoreError::NotFound(title.to_owned()))
    }

    /// All credential titles in sorted order. Never includes the reserved title.
    pub fn list_titles(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Exact comparison against the root password, in constant time.
    pub fn verify_root(&self, candidate: &str) -> bool {
        self.user.root.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("root", &"[REDACTED]")
            .field("titles", &self.list_titles())
            .finish()
    }
}

fn check_title(title: &str) -> Result<(), StoreError> {
    if title == RESERVED_TITLE {
        Err(StoreError::ReservedTitle)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> CredentialRecord {
        CredentialRecord::new("alice", "p1")
    }

    #[test]
    fn test_create_holds_only_root() {
        let store = CredentialStore::create("Abc1234!");
        assert!(store.is_empty());
        assert!(store.list_titles().is_empty());
        assert!(store.verify_root("Abc1234!"));
    }

    #[test]
    fn test_put_get_remove_round_trip() {
        let mut store = CredentialStore::create("Abc1234!");
        store.put("bank", bank()).unwrap();
        assert_eq!(store.get("bank").unwrap(), &bank());

        let removed = store.remove("bank").unwrap();
        assert_eq!(removed, bank());
        assert_eq!(
            store.get("bank").unwrap_err(),
            StoreError::NotFound("bank".to_string())
        );
    }

    #[test]
    fn test_reserved_title_rejected_everywhere() {
        let mut store = CredentialStore::create("Abc1234!");
        store.put("bank", bank()).unwrap();

        assert_eq!(store.get(RESERVED_TITLE).unwrap_err(), StoreError::ReservedTitle);
        assert_eq!(
            store.put(RESERVED_TITLE, bank()).unwrap_err(),
            StoreError::ReservedTitle
        );
        assert_eq!(
            store.insert(RESERVED_TITLE, bank()).unwrap_err(),
            StoreError::ReservedTitle
        );
        assert_eq!(store.remove(RESERVED_TITLE).unwrap_err(), StoreError::ReservedTitle);
        assert!(!store.contains(RESERVED_TITLE));

        // Root is untouched
        assert!(store.verify_root("Abc1234!"));
    }

    #[test]
    fn test_insert_is_create_only() {
        let mut store = CredentialStore::create("Abc1234!");
        store.insert("bank", bank()).unwrap();
        let err = store
            .insert("bank", CredentialRecord::new("bob", "other"))
            .unwrap_err();
        assert_eq!(err, StoreError::AlreadyExists("bank".to_string()));
        assert_eq!(store.get("bank").unwrap().username(), "alice");
    }

    #[test]
    fn test_put_overwrites_whole_record() {
        let mut store = CredentialStore::create("Abc1234!");
        store.put("bank", bank()).unwrap();
        let previous = store
            .put("bank", CredentialRecord::new("bob", "p2"))
            .unwrap();
        assert_eq!(previous, Some(bank()));

        let record = store.get("bank").unwrap();
        assert_eq!(record.username(), "bob");
        assert_eq!(record.password(), "p2");
    }

    #[test]
    fn test_remove_missing_title() {
        let mut store = CredentialStore::create("Abc1234!");
        assert_eq!(
            store.remove("nope").unwrap_err(),
            StoreError::NotFound("nope".to_string())
        );
    }

    #[test]
    fn test_list_titles_is_sorted_and_stable() {
        let mut store = CredentialStore::create("Abc1234!");
        for title in ["mail", "bank", "work"] {
            store.insert(title, bank()).unwrap();
        }
        assert_eq!(store.list_titles(), vec!["bank", "mail", "work"]);
        assert_eq!(store.list_titles(), store.list_titles());
    }

    #[test]
    fn test_verify_root_is_exact() {
        let store = CredentialStore::create("Abc1234!");
        assert!(store.verify_root("Abc1234!"));
        assert!(!store.verify_root("abc1234!"));
        assert!(!store.verify_root("Abc1234"));
        assert!(!store.verify_root("Abc1234! "));
        assert!(!store.verify_root(""));
    }

    #[test]
    fn test_serialized_shape_keeps_user_entry() {
        let mut store = CredentialStore::create("Abc1234!");
        store.insert("bank", bank()).unwrap();

        let value = serde_json::to_value(&store).unwrap();
        assert_eq!(value["USER"]["root"], "Abc1234!");
        assert_eq!(value["bank"]["username"], "alice");
        assert_eq!(value["bank"]["password"], "p1");

        let parsed: CredentialStore = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, store);
        assert_eq!(parsed.list_titles(), vec!["bank"]);
    }

    #[test]
    fn test_legacy_document_parses() {
        let json = r#"{
            "USER": {"root": "Abc1234!"},
            "github": {"username": "octocat", "password": "s3cret"}
        }"#;
        let store: CredentialStore = serde_json::from_str(json).unwrap();
        assert!(store.verify_root("Abc1234!"));
        assert_eq!(store.list_titles(), vec!["github"]);
        assert_eq!(store.get("github").unwrap().password(), "s3cret");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut store = CredentialStore::create("RootPass1!");
        store.insert("bank", CredentialRecord::new("alice", "hunter2")).unwrap();

        let debug = format!("{store:?} {:?}", store.get("bank").unwrap());
        assert!(debug.contains("bank"));
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("RootPass1!"));
    }
}
