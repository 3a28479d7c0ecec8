#![deny(unsafe_code)]

mod clipboard;
mod commands;
mod console;
mod exit_code;
mod output;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pwkeep_core::error::{
    BootstrapError, CodecError, ConfigError, KeyError, ShellError, StoreFileError,
};
use pwkeep_core::{AppLayout, Bootstrap, Console};

use crate::clipboard::SystemClipboard;
use crate::commands::open::LockedOut;
use crate::console::StdConsole;

/// Local credential manager with an encrypted store
#[derive(Parser)]
#[command(name = "pwkeep")]
#[command(author, version)]
#[command(after_help = "The first run creates the root user, the encryption key and the store.
Later runs ask for the master password and open the interactive prompt:

    a  add       c  copy       e  edit
    r  remove    v  view-titles      x  exit

Set PWKEEP_CLIPBOARD_COMMAND to choose the program `copy` pipes passwords into.")]
struct Cli {
    /// Directory holding config.json, mgr.json, meta.json and keys/
    #[arg(long, env = "PWKEEP_HOME", value_name = "DIR")]
    home: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress logging and error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            let args: Vec<String> = std::env::args().collect();
            let is_quiet = args.iter().any(|a| a == "-q" || a == "--quiet");
            if !is_quiet {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let layout = AppLayout::new(resolve_home(cli.home)?);
    tracing::debug!(home = %layout.home().display(), "Using home directory");
    layout
        .ensure_seeded()
        .context("Failed to prepare home directory")?;

    let mut console = StdConsole::new();
    let mut clipboard = SystemClipboard;
    console
        .write_line(output::WELCOME)
        .context("Failed to write to stdout")?;

    if Bootstrap::needs_bootstrap(&layout).context("Failed to read mgr.json")? {
        commands::init::execute(&layout, &mut console)?;
    }
    commands::open::execute(&layout, &mut console, &mut clipboard)
}

/// `--home`/`PWKEEP_HOME`, else the platform data directory.
fn resolve_home(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(home) = flag {
        return Ok(home);
    }
    let dirs = directories::ProjectDirs::from("", "", "pwkeep")
        .context("Could not determine a data directory, pass --home")?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if cause.downcast_ref::<LockedOut>().is_some() {
            return exit_code::AUTH_FAILED;
        }

        if let Some(err) = cause.downcast_ref::<BootstrapError>() {
            return match err {
                BootstrapError::Config(config_err) => config_code(config_err),
                BootstrapError::Key(_) => exit_code::STORE_INVALID,
                BootstrapError::StoreFile(file_err) => store_file_code(file_err),
                BootstrapError::AlreadyInitialized(_) | BootstrapError::Shell(_) => {
                    exit_code::GENERAL_ERROR
                }
            };
        }

        if let Some(err) = cause.downcast_ref::<ConfigError>() {
            return config_code(err);
        }

        if let Some(err) = cause.downcast_ref::<StoreFileError>() {
            return store_file_code(err);
        }

        if cause.downcast_ref::<KeyError>().is_some()
            || cause.downcast_ref::<CodecError>().is_some()
        {
            return exit_code::STORE_INVALID;
        }

        if cause.downcast_ref::<ShellError>().is_some() {
            return exit_code::GENERAL_ERROR;
        }
    }

    exit_code::GENERAL_ERROR
}

fn config_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::UnsupportedEncryptionMethod(_) => exit_code::UNSUPPORTED_METHOD,
        ConfigError::Io { .. } | ConfigError::Parse { .. } => exit_code::GENERAL_ERROR,
    }
}

fn store_file_code(err: &StoreFileError) -> u8 {
    match err {
        StoreFileError::Locked(_) => exit_code::STORE_LOCKED,
        StoreFileError::Codec(_) | StoreFileError::Io { .. } => exit_code::STORE_INVALID,
        StoreFileError::AtomicWrite { .. } => exit_code::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_lockout_maps_to_auth_failed() {
        let err = anyhow::Error::new(LockedOut).context("outer");
        assert_eq!(categorize_error(&err), exit_code::AUTH_FAILED);
    }

    #[test]
    fn test_store_lock_maps_to_locked() {
        let err = anyhow::Error::new(StoreFileError::Locked(PathBuf::from("data.bin.lock")))
            .context("Cannot open store");
        assert_eq!(categorize_error(&err), exit_code::STORE_LOCKED);
    }

    #[test]
    fn test_unsupported_method_inside_bootstrap() {
        let err = anyhow::Error::new(BootstrapError::Config(
            ConfigError::UnsupportedEncryptionMethod("Feret".to_string()),
        ))
        .context("Failed to initialize pwkeep");
        assert_eq!(categorize_error(&err), exit_code::UNSUPPORTED_METHOD);
    }

    #[test]
    fn test_decryption_failure_maps_to_invalid_store() {
        let err = anyhow::Error::new(StoreFileError::Codec(CodecError::Decryption {
            reason: "authentication tag mismatch",
        }));
        assert_eq!(categorize_error(&err), exit_code::STORE_INVALID);
    }

    #[test]
    fn test_unknown_error_is_general() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(categorize_error(&err), exit_code::GENERAL_ERROR);
    }

    #[test]
    fn test_home_flag_wins() {
        let home = resolve_home(Some(PathBuf::from("/srv/pwkeep"))).unwrap();
        assert_eq!(home, Path::new("/srv/pwkeep"));
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from(["pwkeep", "--home", "/tmp/h", "-vv", "-q"]).unwrap();
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/h")));
        assert_eq!(cli.verbose, 2);
        assert!(cli.quiet);
    }
}
