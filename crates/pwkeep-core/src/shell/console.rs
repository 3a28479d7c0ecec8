//! Input/output seams for the interactive flows.
//!
//! The command loop, authentication and bootstrap only talk to a [`Console`]
//! and a [`Clipboard`]. The binary supplies terminal-backed implementations;
//! tests use [`ScriptedConsole`] and [`RecordingClipboard`].

use std::io;

/// Line-oriented user interaction.
///
/// `read_line` and `read_secret` return `Ok(None)` at end of input.
pub trait Console {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Read without echoing the typed characters.
    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>>;

    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// Write-only sink for a copied password.
pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> io::Result<()>;
}

#[cfg(any(test, feature = "test-support"))]
pub use scripted::{InputKind, RecordingClipboard, ScriptedConsole};

#[cfg(any(test, feature = "test-support"))]
mod scripted {
    use std::collections::VecDeque;
    use std::io;

    use super::{Clipboard, Console};

    /// Which input path a prompt was answered through.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum InputKind {
        Line,
        Secret,
    }

    /// Replays queued answers and records everything written.
    ///
    /// Prompts are recorded in the transcript as they are asked, so a test can
    /// assert on the exact interaction sequence.
    #[derive(Debug, Default)]
    pub struct ScriptedConsole {
        input: VecDeque<String>,
        transcript: Vec<String>,
        prompts: Vec<(InputKind, String)>,
    }

    impl ScriptedConsole {
        pub fn new<I, S>(answers: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                input: answers.into_iter().map(Into::into).collect(),
                ..Self::default()
            }
        }

        /// Everything written and prompted, joined by newlines.
        pub fn output(&self) -> String {
            self.transcript.join("\n")
        }

        pub fn prompts(&self) -> &[(InputKind, String)] {
            &self.prompts
        }

        /// Answers that were never consumed.
        pub fn remaining(&self) -> usize {
            self.input.len()
        }

        fn next(&mut self, kind: InputKind, prompt: &str) -> Option<String> {
            self.prompts.push((kind, prompt.to_owned()));
            self.transcript.push(prompt.to_owned());
            self.input.pop_front()
        }
    }

    impl Console for ScriptedConsole {
        fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
            Ok(self.next(InputKind::Line, prompt))
        }

        fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
            Ok(self.next(InputKind::Secret, prompt))
        }

        fn write_line(&mut self, line: &str) -> io::Result<()> {
            self.transcript.push(line.to_owned());
            Ok(())
        }
    }

    /// Keeps every copied value. Can be told to fail.
    #[derive(Debug, Default)]
    pub struct RecordingClipboard {
        pub copied: Vec<String>,
        pub fail: bool,
    }

    impl RecordingClipboard {
        pub fn failing() -> Self {
            Self {
                copied: Vec::new(),
                fail: true,
            }
        }
    }

    impl Clipboard for RecordingClipboard {
        fn set_text(&mut self, text: &str) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    "no clipboard available",
                ));
            }
            self.copied.push(text.to_owned());
            Ok(())
        }
    }
}

