//! Clipboard sink that pipes into the platform's clipboard tool.

use std::env;
use std::io::{self, Write};
use std::process::{Command, Stdio};

use pwkeep_core::Clipboard;
use tracing::{debug, instrument};

/// Overrides the clipboard program, e.g. `PWKEEP_CLIPBOARD_COMMAND="xclip -selection clipboard"`.
pub const CLIPBOARD_COMMAND_ENV: &str = "PWKEEP_CLIPBOARD_COMMAND";

#[cfg(target_os = "macos")]
const CANDIDATES: &[&[&str]] = &[&["pbcopy"]];

#[cfg(windows)]
const CANDIDATES: &[&[&str]] = &[&["clip"]];

#[cfg(not(any(target_os = "macos", windows)))]
const CANDIDATES: &[&[&str]] = &[
    &["wl-copy"],
    &["xclip", "-selection", "clipboard"],
    &["xsel", "--clipboard", "--input"],
];

#[derive(Debug, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    fn commands() -> Vec<Vec<String>> {
        if let Ok(custom) = env::var(CLIPBOARD_COMMAND_ENV)
            && !custom.trim().is_empty()
        {
            return vec![custom.split_whitespace().map(str::to_owned).collect()];
        }
        CANDIDATES
            .iter()
            .map(|argv| argv.iter().map(|s| (*s).to_owned()).collect())
            .collect()
    }
}

impl Clipboard for SystemClipboard {
    #[instrument(level = "debug", skip_all)]
    fn set_text(&mut self, text: &str) -> io::Result<()> {
        pipe_to_first(&Self::commands(), text)
    }
}

/// Pipe `text` into each command in turn until one exits successfully.
///
/// Missing programs are skipped. A program that fails is reaped and the next
/// one is tried; the last failure is returned if none succeeds.
fn pipe_to_first(commands: &[Vec<String>], text: &str) -> io::Result<()> {
    let mut last_err = None;
    for argv in commands {
        let Some((program, args)) = argv.split_first() else {
            continue;
        };

        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(program = %program, "Clipboard tool not installed");
                continue;
            }
            Err(e) => {
                debug!(program = %program, error = %e, "Clipboard tool failed to start");
                last_err = Some(e);
                continue;
            }
        };

        // Closing stdin before waiting lets the tool see end of input
        let written = child
            .stdin
            .take()
            .map_or(Ok(()), |mut stdin| stdin.write_all(text.as_bytes()));
        let status = child.wait();

        match (written, status) {
            (Ok(()), Ok(status)) if status.success() => {
                debug!(program = %program, "Copied to clipboard");
                return Ok(());
            }
            (Ok(()), Ok(status)) => {
                debug!(program = %program, %status, "Clipboard tool failed");
                last_err = Some(io::Error::other(format!("{program} exited with {status}")));
            }
            (Err(e), _) | (_, Err(e)) => {
                debug!(program = %program, error = %e, "Clipboard tool failed");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no clipboard tool found (set {CLIPBOARD_COMMAND_ENV})"),
        )
    }))
}
