//! Master password authentication and per-session display preferences.
//!
//! Authentication is a small state machine:
//!
//! ```text
//! Start -> Prompting(1) -> ... -> Prompting(MAX_ATTEMPTS) -> LockedOut
//!               \______________________/
//!                        |
//!                  Authenticated
//! ```
//!
//! Lockout is not persisted: every process run starts with a fresh budget.

use tracing::{info, instrument, warn};

use super::store::CredentialStore;

/// Total number of master password attempts per run.
pub const MAX_ATTEMPTS: u32 = 4;

/// Shown in place of a password when masking is enabled.
pub const MASK_PLACEHOLDER: &str = "`masked`";

/// Outcome of [`Session::authenticate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    /// The root password matched on the given 1-based attempt.
    Authenticated { attempt: u32 },
    /// Every attempt failed; the caller must stop without opening the store.
    LockedOut,
}

/// An authenticated session's preferences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    masking: bool,
}

impl Session {
    /// Prompt for the root password until it matches or the attempt budget runs out.
    ///
    /// `prompt` receives the 1-based attempt number and is called at most
    /// [`MAX_ATTEMPTS`] times. Errors from `prompt` are returned unchanged.
    #[instrument(level = "info", name = "session::authenticate", skip_all)]
    pub fn authenticate<F, E>(store: &CredentialStore, mut prompt: F) -> Result<AuthResult, E>
    where
        F: FnMut(u32) -> Result<String, E>,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let candidate = zeroize::Zeroizing::new(prompt(attempt)?);
            if store.verify_root(&candidate) {
                info!(attempt, "Root password accepted");
                return Ok(AuthResult::Authenticated { attempt });
            }
            warn!(attempt, remaining = MAX_ATTEMPTS - attempt, "Root password rejected");
        }
        warn!("Maximum password attempts reached");
        Ok(AuthResult::LockedOut)
    }

    pub fn new(masking: bool) -> Self {
        Self { masking }
    }

    pub fn set_masking(&mut self, masking: bool) {
        self.masking = masking;
    }

    pub fn masking(&self) -> bool {
        self.masking
    }

    /// The text to display for a password under the current masking preference.
    pub fn display_password<'a>(&self, password: &'a str) -> &'a str {
        if self.masking {
            MASK_PLACEHOLDER
        } else {
            password
        }
    }
}

/// Attempts left after `attempt` failed, for user-facing feedback.
pub fn remaining_attempts(attempt: u32) -> u32 {
    MAX_ATTEMPTS.saturating_sub(attempt)
}
