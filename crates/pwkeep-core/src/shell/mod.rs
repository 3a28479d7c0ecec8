//! The interactive command loop.
//!
//! One verb per iteration, blocking on input between iterations. Every
//! branch writes explicit feedback; refusals (reserved title, missing title,
//! duplicate title) are reported and the loop continues.
//!
//! Entering credentials for `add` and `edit` runs a small state machine:
//!
//! ```text
//! Editing -> Confirming -> Committed
//!    ^           |
//!    +-- Retrying+
//! ```

pub mod console;

use std::fmt;
use std::io;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

pub use console::{Clipboard, Console};

use crate::vault::session::{AuthResult, MAX_ATTEMPTS, Session, remaining_attempts};
use crate::vault::store::{CredentialRecord, CredentialStore, RESERVED_TITLE, StoreError};

/// Title answer that backs out of `add`, `edit` and `remove`.
pub const EXIT_SENTINEL: &str = "exit";

const MENU: &str = "\
welcome, enter the appropriate option to continue

    `a`  add          add new credentials
    `c`  copy         copy a password to the clipboard
    `e`  edit         edit existing credentials
    `r`  remove       remove existing credentials
    `v`  view-titles  view titles of all credentials
    `x`  exit         save and quit";

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Console I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("input ended while {0}")]
    UnexpectedEof(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action `{0}`")]
pub struct UnknownVerb(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Add,
    Copy,
    Edit,
    Remove,
    ViewTitles,
    Exit,
}

impl FromStr for Verb {
    type Err = UnknownVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "a" | "add" => Ok(Verb::Add),
            "c" | "copy" => Ok(Verb::Copy),
            "e" | "edit" => Ok(Verb::Edit),
            "r" | "remove" => Ok(Verb::Remove),
            "v" | "view" | "view-titles" => Ok(Verb::ViewTitles),
            "x" | "exit" => Ok(Verb::Exit),
            other => Err(UnknownVerb(other.to_owned())),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verb::Add => "add",
            Verb::Copy => "copy",
            Verb::Edit => "edit",
            Verb::Remove => "remove",
            Verb::ViewTitles => "view-titles",
            Verb::Exit => "exit",
        })
    }
}

/// What a finished loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Whether any credential was added, changed or removed.
    pub changed: bool,
}

enum EntryState {
    Editing,
    Confirming(CredentialRecord),
    Retrying,
    Committed(CredentialRecord),
}

/// Drives verbs against a store through a console.
pub struct CommandLoop<'a, C: ?Sized, K: ?Sized> {
    store: &'a mut CredentialStore,
    session: Session,
    console: &'a mut C,
    clipboard: &'a mut K,
    changed: bool,
}

impl<'a, C, K> CommandLoop<'a, C, K>
where
    C: Console + ?Sized,
    K: Clipboard + ?Sized,
{
    pub fn new(
        store: &'a mut CredentialStore,
        session: Session,
        console: &'a mut C,
        clipboard: &'a mut K,
    ) -> Self {
        Self {
            store,
            session,
            console,
            clipboard,
            changed: false,
        }
    }

    /// Run until `exit` or end of input at the action prompt.
    ///
    /// End of input inside a verb is an error; the caller must not persist
    /// the store in that case.
    #[instrument(level = "info", name = "shell::run", skip_all, fields(masking = self.session.masking()))]
    pub fn run(mut self) -> Result<LoopSummary, ShellError> {
        self.say(MENU)?;
        let mut prompt = "enter an option:  ";

        loop {
            let Some(answer) = self.console.read_line(prompt)? else {
                debug!("End of input at action prompt, treating as exit");
                break;
            };

            let verb = match answer.parse::<Verb>() {
                Ok(verb) => verb,
                Err(e) => {
                    debug!(error = %e, "Rejected action");
                    prompt = "please enter a valid option (`a`, `c`, `e`, `r`, `v`, `x`):  ";
                    continue;
                }
            };

            debug!(%verb, "Dispatching");
            match verb {
                Verb::Add => self.add()?,
                Verb::Copy => self.copy()?,
                Verb::Edit => self.edit()?,
                Verb::Remove => self.remove()?,
                Verb::ViewTitles => self.view_titles()?,
                Verb::Exit => break,
            }
            prompt = "enter another action (`a`, `c`, `e`, `r`, `v`) or `x` to quit:  ";
        }

        info!(changed = self.changed, entries = self.store.len(), "Command loop finished");
        Ok(LoopSummary {
            changed: self.changed,
        })
    }

    fn add(&mut self) -> Result<(), ShellError> {
        self.say("adding new credentials")?;
        let title = self.ask_title("enter the title of these credentials or `exit`:  ")?;

        if title == EXIT_SENTINEL {
            return self.say("aborting addition of new credentials");
        }
        if title.is_empty() {
            return self.say("a title cannot be empty, try again");
        }
        if title == RESERVED_TITLE {
            return self.say("`USER` is an invalid title, try again");
        }
        if self.store.contains(&title) {
            let refusal = StoreError::AlreadyExists(title);
            return self.say(&format!(
                "{refusal}, enter `e` to edit existing credentials"
            ));
        }

        let record = self.enter_credentials(&title, None)?;
        self.store.insert(&title, record)?;
        self.changed = true;
        info!(entries = self.store.len(), "Credential added");
        self.say("new credentials added")
    }

    fn copy(&mut self) -> Result<(), ShellError> {
        let title = self.ask_title("enter the title of the credentials:  ")?;

        if title == RESERVED_TITLE {
            return self.say("cannot copy `USER` credentials");
        }
        let (username, password) = match self.store.get(&title) {
            Ok(record) => (
                record.username().to_owned(),
                Zeroizing::new(record.password().to_owned()),
            ),
            Err(e) => return self.say(&e.to_string()),
        };

        match self.clipboard.set_text(&password) {
            Ok(()) => {
                self.say(&format!("username:  {username}"))?;
                self.say("password:  (copied to clipboard)")
            }
            Err(e) => {
                warn!(error = %e, "Clipboard write failed");
                self.say(&format!("username:  {username}"))?;
                self.say(&format!("password:  could not copy to clipboard ({e})"))
            }
        }
    }

    fn edit(&mut self) -> Result<(), ShellError> {
        self.say("editing current credentials")?;
        let title = self.ask_title("enter the title of the credentials or `exit`:  ")?;

        if title == EXIT_SENTINEL {
            return self.say("aborting edit of credentials");
        }
        if title == RESERVED_TITLE {
            return self.say("cannot edit `USER` credentials");
        }
        let current = match self.store.get(&title) {
            Ok(record) => record.clone(),
            Err(e) => return self.say(&e.to_string()),
        };

        self.say(&format!("editing credentials for {title}"))?;
        let record = self.enter_credentials(&title, Some(&current))?;
        self.store.put(&title, record)?;
        self.changed = true;
        info!("Credential updated");
        self.say(&format!("credentials for `{title}` updated"))
    }

    fn remove(&mut self) -> Result<(), ShellError> {
        self.say("removing credentials from database")?;
        let title = self.ask_title("enter the title of the credentials or `exit`:  ")?;

        if title == EXIT_SENTINEL {
            return self.say("no credentials removed");
        }
        if title == RESERVED_TITLE {
            return self.say("cannot remove `USER` credentials");
        }
        if !self.store.contains(&title) {
            return self.say(&StoreError::NotFound(title).to_string());
        }

        let answer = self.ask(
            &format!("are you sure you want to remove credentials for {title} (y/n):  "),
            "confirming removal",
        )?;
        if answer.trim().eq_ignore_ascii_case("y") {
            self.store.remove(&title)?;
            self.changed = true;
            info!(entries = self.store.len(), "Credential removed");
            self.say(&format!("credentials for `{title}` removed"))
        } else {
            self.say("aborting removal of credentials")
        }
    }

    fn view_titles(&mut self) -> Result<(), ShellError> {
        let titles: Vec<String> = self
            .store
            .list_titles()
            .into_iter()
            .map(str::to_owned)
            .collect();

        self.say("titles for credentials:")?;
        if titles.is_empty() {
            return self.say("    (none)");
        }
        for title in titles {
            self.say(&format!("    {title}"))?;
        }
        Ok(())
    }

    fn enter_credentials(
        &mut self,
        title: &str,
        current: Option<&CredentialRecord>,
    ) -> Result<CredentialRecord, ShellError> {
        let mut state = EntryState::Editing;
        loop {
            state = match state {
                EntryState::Editing => {
                    if let Some(current) = current {
                        let shown = self.session.display_password(current.password());
                        self.say("current credentials:")?;
                        self.say(&format!("    username:  {}", current.username()))?;
                        self.say(&format!("    password:  {shown}"))?;
                    }
                    let username =
                        self.ask("enter the username for this credential:  ", "reading a username")?;
                    let password = self.ask_password("enter password for this credential:  ")?;
                    EntryState::Confirming(CredentialRecord::new(username, password.as_str()))
                }
                EntryState::Confirming(record) => {
                    let shown = self.session.display_password(record.password());
                    self.say("new credentials created:")?;
                    self.say(&format!("    title:      {title}"))?;
                    self.say(&format!("    username:   {}", record.username()))?;
                    self.say(&format!("    password:   {shown}"))?;

                    let answer = self.ask(
                        "enter `r` to retry or any other key to save these credentials:  ",
                        "confirming credentials",
                    )?;
                    if answer.trim() == "r" {
                        EntryState::Retrying
                    } else {
                        EntryState::Committed(record)
                    }
                }
                EntryState::Retrying => {
                    self.say("retry entering credentials")?;
                    EntryState::Editing
                }
                EntryState::Committed(record) => return Ok(record),
            };
        }
    }

    fn ask_title(&mut self, prompt: &str) -> Result<String, ShellError> {
        Ok(self.ask(prompt, "reading a title")?.trim().to_owned())
    }

    fn ask(&mut self, prompt: &str, during: &'static str) -> Result<String, ShellError> {
        self.console
            .read_line(prompt)?
            .ok_or(ShellError::UnexpectedEof(during))
    }

    /// Hidden input when masking is on, plain input otherwise.
    fn ask_password(&mut self, prompt: &str) -> Result<Zeroizing<String>, ShellError> {
        let answer = if self.session.masking() {
            self.console.read_secret(prompt)?
        } else {
            self.console.read_line(prompt)?
        };
        answer
            .map(Zeroizing::new)
            .ok_or(ShellError::UnexpectedEof("reading a password"))
    }

    fn say(&mut self, line: &str) -> Result<(), ShellError> {
        Ok(self.console.write_line(line)?)
    }
}

/// Prompt for the root password, reporting how many tries remain after each miss.
pub fn authenticate<C: Console + ?Sized>(
    console: &mut C,
    store: &CredentialStore,
) -> Result<AuthResult, ShellError> {
    let result = Session::authenticate(store, |attempt| -> Result<String, ShellError> {
        if attempt > 1 {
            let left = remaining_attempts(attempt - 1);
            let noun = if left == 1 { "try" } else { "tries" };
            console.write_line(&format!("invalid, you have {left} {noun} left"))?;
        }
        let prompt = if attempt == 1 { "password: " } else { "enter password: " };
        console
            .read_secret(prompt)?
            .ok_or(ShellError::UnexpectedEof("reading the master password"))
    })?;

    if result == AuthResult::LockedOut {
        console.write_line(&format!(
            "maximum tries ({MAX_ATTEMPTS}) reached, terminating program"
        ))?;
    }
    Ok(result)
}

/// Ask whether passwords should be masked for this session.
pub fn choose_session<C: Console + ?Sized>(console: &mut C) -> Result<Session, ShellError> {
    let answer = console
        .read_line("enter `m` if you wish to mask all passwords for this session:  ")?
        .ok_or(ShellError::UnexpectedEof("choosing masking"))?;
    Ok(Session::new(answer.trim() == "m"))
}
