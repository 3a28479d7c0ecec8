use std::fmt;

use anyhow::{Context, Result};
use pwkeep_core::shell::{authenticate, choose_session};
use pwkeep_core::vault::StoreLock;
use pwkeep_core::{AppLayout, AuthResult, Clipboard, CommandLoop, Console, EncryptionKey, StoreFile};
use tracing::info;

/// Every master password attempt failed.
#[derive(Debug)]
pub struct LockedOut;

impl fmt::Display for LockedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("authentication failed, store left untouched")
    }
}

impl std::error::Error for LockedOut {}

/// Unlock the store, run the command loop and write the store back.
///
/// Nothing is written unless the loop ends cleanly.
pub fn execute<C: Console, K: Clipboard>(
    layout: &AppLayout,
    console: &mut C,
    clipboard: &mut K,
) -> Result<()> {
    let metadata = layout
        .load_metadata()
        .context("Failed to read meta.json")?;
    metadata.method().context("Cannot open store")?;

    let key = EncryptionKey::load(&metadata.key_location).with_context(|| {
        format!(
            "unable to open/find key file `{}`, make sure KEY_LOCATION in meta.json is correct",
            metadata.key_location.display()
        )
    })?;
    let file = StoreFile::new(&metadata.data_location, key);
    let _lock = StoreLock::acquire(file.path()).context("Cannot open store")?;
    let mut store = file
        .load()
        .with_context(|| format!("Failed to open store {}", file.path().display()))?;

    console.write_line("please enter your master password to begin")?;
    match authenticate(console, &store)? {
        AuthResult::Authenticated { attempt } => info!(attempt, "Session unlocked"),
        AuthResult::LockedOut => return Err(LockedOut.into()),
    }
    let session = choose_session(console)?;

    let summary = CommandLoop::new(&mut store, session, console, clipboard)
        .run()
        .context("Session aborted, store was not saved")?;

    console.write_line("updating database")?;
    file.save(&store).context("Failed to save store")?;
    info!(changed = summary.changed, entries = store.len(), "Store saved");
    console.write_line("terminating program")?;
    Ok(())
}
