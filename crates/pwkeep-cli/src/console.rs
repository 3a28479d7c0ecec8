//! Terminal-backed console.

use std::io::{self, BufRead, IsTerminal, Write};

use pwkeep_core::Console;

/// Prompts and messages on stdout, answers from stdin.
///
/// Secrets are read with `rpassword` when stdin is a terminal. Piped input
/// is read line by line for both kinds of prompt, which keeps the binary
/// scriptable.
pub struct StdConsole {
    stdin: io::StdinLock<'static>,
    stdout: io::Stdout,
    interactive: bool,
}

impl StdConsole {
    pub fn new() -> Self {
        let stdin = io::stdin();
        let interactive = stdin.is_terminal();
        Self {
            stdin: stdin.lock(),
            stdout: io::stdout(),
            interactive,
        }
    }

    fn prompt(&mut self, prompt: &str) -> io::Result<()> {
        let mut out = self.stdout.lock();
        out.write_all(prompt.as_bytes())?;
        out.flush()
    }
}

impl Console for StdConsole {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.prompt(prompt)?;
        let mut line = String::new();
        if self.stdin.read_line(&mut line)? == 0 {
            // Keep the next message off the prompt line
            writeln!(self.stdout)?;
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        if !self.interactive {
            return self.read_line(prompt);
        }
        self.prompt(prompt)?;
        match rpassword::read_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.stdout, "{line}")
    }
}
