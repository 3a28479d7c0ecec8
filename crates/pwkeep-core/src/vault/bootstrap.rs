//! First-run initialization.
//!
//! ```text
//! Uninitialized -> CollectingRootPassword -> GeneratingKey
//!   -> PersistingKeyAndMetadata -> PersistingInitialStore -> Initialized
//! ```
//!
//! The configured encryption method is checked before anything is prompted
//! or written, so a bad config leaves the home directory untouched and
//! bootstrap can simply be retried.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::crypto::{EncryptionKey, KeyError};
use crate::shell::{Console, ShellError};
use crate::vault::config::{
    AppLayout, ConfigError, EncryptionMethod, FirstRunMarker, Metadata, UserConfig,
    make_read_only, write_json,
};
use crate::vault::policy::{describe_rules, validate};
use crate::vault::store::CredentialStore;
use crate::vault::store_file::{StoreFile, StoreFileError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("pwkeep is already initialized ({0} says INITIAL is false)")]
    AlreadyInitialized(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    StoreFile(#[from] StoreFileError),

    #[error(transparent)]
    Shell(#[from] ShellError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Uninitialized,
    CollectingRootPassword,
    GeneratingKey,
    PersistingKeyAndMetadata,
    PersistingInitialStore,
    Initialized,
}

/// One-time creation of the key, metadata and initial store.
#[derive(Debug)]
pub struct Bootstrap {
    layout: AppLayout,
    state: BootstrapState,
}

impl Bootstrap {
    pub fn new(layout: AppLayout) -> Self {
        Self {
            layout,
            state: BootstrapState::Uninitialized,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Whether the first-run marker still asks for initialization.
    pub fn needs_bootstrap(layout: &AppLayout) -> Result<bool, ConfigError> {
        Ok(layout.load_marker()?.initial)
    }

    /// Interactive bootstrap: collect a valid, confirmed root password and
    /// initialize.
    #[instrument(level = "info", name = "bootstrap::run", skip_all, fields(home = %self.layout.home().display()))]
    pub fn run<C: Console + ?Sized>(&mut self, console: &mut C) -> Result<Metadata, BootstrapError> {
        let (config, method) = self.preflight()?;

        self.state = BootstrapState::CollectingRootPassword;
        let root = match collect_root_password(console) {
            Ok(root) => root,
            Err(e) => {
                self.state = BootstrapState::Uninitialized;
                return Err(e.into());
            }
        };

        console
            .write_line("building password manager based on config settings")
            .map_err(ShellError::from)?;
        self.persist(&config, method, &root)
    }

    /// Initialize with an already chosen root password.
    ///
    /// The password is not checked against the policy here; [`Bootstrap::run`]
    /// does that while prompting.
    #[instrument(level = "info", name = "bootstrap::initialize", skip_all)]
    pub fn initialize(&mut self, root_password: &str) -> Result<Metadata, BootstrapError> {
        let (config, method) = self.preflight()?;
        self.persist(&config, method, root_password)
    }

    fn preflight(&self) -> Result<(UserConfig, EncryptionMethod), BootstrapError> {
        let marker_path = self.layout.marker_path();
        if !self.layout.load_marker()?.initial {
            return Err(BootstrapError::AlreadyInitialized(marker_path));
        }

        let config = self.layout.load_config()?;
        let method = config.method().inspect_err(|e| {
            warn!(error = %e, "Refusing to bootstrap with an unknown encryption method");
        })?;
        debug!(%method, "Encryption method accepted");
        Ok((config, method))
    }

    /// Write the key, metadata, initial store and marker.
    ///
    /// A failure after the key is written removes every file this run
    /// created and returns to [`BootstrapState::Uninitialized`], so a retry
    /// starts from a clean home directory.
    fn persist(
        &mut self,
        config: &UserConfig,
        method: EncryptionMethod,
        root_password: &str,
    ) -> Result<Metadata, BootstrapError> {
        let mut created = Vec::new();
        match self.write_artifacts(config, method, root_password, &mut created) {
            Ok(metadata) => {
                self.state = BootstrapState::Initialized;
                info!(data = %metadata.data_location.display(), "Bootstrap complete");
                Ok(metadata)
            }
            Err(e) => {
                warn!(error = %e, files = created.len(), "Bootstrap failed, removing partial files");
                remove_created(&created);
                self.state = BootstrapState::Uninitialized;
                Err(e)
            }
        }
    }

    fn write_artifacts(
        &mut self,
        config: &UserConfig,
        method: EncryptionMethod,
        root_password: &str,
        created: &mut Vec<PathBuf>,
    ) -> Result<Metadata, BootstrapError> {
        self.state = BootstrapState::GeneratingKey;
        let key = EncryptionKey::random();
        let key_path = self.layout.key_path();
        let data_path = self.layout.data_path(&config.data_location);

        self.state = BootstrapState::PersistingKeyAndMetadata;
        key.write_new(&key_path)?;
        created.push(key_path.clone());
        make_read_only(&key_path)?;
        debug!(path = %key_path.display(), "Wrote store key");

        let metadata = Metadata {
            encryption_method: method.to_string(),
            key_location: key_path,
            data_location: data_path,
        };
        let metadata_path = self.layout.metadata_path();
        write_json(&metadata_path, &metadata)?;
        created.push(metadata_path.clone());
        make_read_only(&metadata_path)?;

        self.state = BootstrapState::PersistingInitialStore;
        StoreFile::new(&metadata.data_location, key).save(&CredentialStore::create(root_password))?;
        created.push(metadata.data_location.clone());

        // The marker flip commits the bootstrap
        let marker_path = self.layout.marker_path();
        write_json(&marker_path, &FirstRunMarker { initial: false })?;
        if let Err(e) = make_read_only(&marker_path) {
            warn!(error = %e, "Could not make the first-run marker read-only");
        }

        Ok(metadata)
    }
}

/// Delete files left behind by an interrupted bootstrap.
fn remove_created(paths: &[PathBuf]) {
    for path in paths.iter().rev() {
        if let Ok(meta) = fs::metadata(path) {
            let mut permissions = meta.permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            if let Err(e) = fs::set_permissions(path, permissions) {
                warn!(path = %path.display(), error = %e, "Could not restore write permission");
            }
        }
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed partial bootstrap file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Could not remove partial bootstrap file"),
        }
    }
}

/// Prompt until a root password passes every policy rule and is entered
/// identically twice.
pub fn collect_root_password<C: Console + ?Sized>(
    console: &mut C,
) -> Result<Zeroizing<String>, ShellError> {
    console.write_line("creating root user")?;
    console.write_line(&describe_rules())?;

    loop {
        let candidate = read_secret(console, "enter your master password: ")?;
        let report = validate(&candidate);
        if !report.is_valid() {
            debug!("Root password rejected by policy");
            console.write_line("password entered did not meet all criteria:")?;
            console.write_line(report.to_string().trim_end())?;
            console.write_line("please try again")?;
            continue;
        }

        let confirmation = read_secret(console, "reenter your master password: ")?;
        if *confirmation == *candidate {
            console.write_line("root user created")?;
            return Ok(candidate);
        }
        console.write_line("your two passwords didn't match, try again")?;
    }
}

fn read_secret<C: Console + ?Sized>(
    console: &mut C,
    prompt: &str,
) -> Result<Zeroizing<String>, ShellError> {
    console
        .read_secret(prompt)?
        .map(Zeroizing::new)
        .ok_or(ShellError::UnexpectedEof("choosing the root password"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::console::ScriptedConsole;
    use tempfile::TempDir;

    fn seeded_home() -> (TempDir, AppLayout) {
        let temp = TempDir::new().unwrap();
        let layout = AppLayout::new(temp.path().join("home"));
        layout.ensure_seeded().unwrap();
        (temp, layout)
    }

    #[test]
    fn test_collect_rejects_weak_and_mismatched() {
        let mut console = ScriptedConsole::new([
            "abc12345",   // weak
            "Abc1234!",   // valid
            "Abc1234?",   // mismatch
            "Xyz9876#",   // valid
            "Xyz9876#",   // confirmed
        ]);
        let root = collect_root_password(&mut console).unwrap();
        assert_eq!(root.as_str(), "Xyz9876#");

        let out = console.output();
        assert!(out.contains("did not meet all criteria"));
        assert!(out.contains("MISSING"));
        assert!(out.contains("your two passwords didn't match"));
        assert!(out.contains("root user created"));
    }

    #[test]
    fn test_run_creates_everything() {
        let (_temp, layout) = seeded_home();
        assert!(Bootstrap::needs_bootstrap(&layout).unwrap());

        let mut bootstrap = Bootstrap::new(layout.clone());
        let mut console = ScriptedConsole::new(["Abc1234!", "Abc1234!"]);
        let metadata = bootstrap.run(&mut console).unwrap();

        assert_eq!(bootstrap.state(), BootstrapState::Initialized);
        assert_eq!(metadata.encryption_method, "AES-256-GCM");
        assert_eq!(metadata.key_location, layout.key_path());
        assert_eq!(metadata.data_location, layout.data_path(std::path::Path::new(".")));
        assert_eq!(layout.load_metadata().unwrap(), metadata);
        assert!(!Bootstrap::needs_bootstrap(&layout).unwrap());

        for path in [layout.key_path(), layout.metadata_path(), layout.marker_path()] {
            assert!(
                fs::metadata(&path).unwrap().permissions().readonly(),
                "{} should be read-only",
                path.display()
            );
        }

        let key = EncryptionKey::load(&metadata.key_location).unwrap();
        let store = StoreFile::new(&metadata.data_location, key).load().unwrap();
        assert!(store.verify_root("Abc1234!"));
        assert!(store.list_titles().is_empty());
    }

    #[test]
    fn test_unknown_method_writes_nothing() {
        let (_temp, layout) = seeded_home();
        let config = UserConfig {
            encryption_method: "Feret".to_string(),
            ..UserConfig::default()
        };
        write_json(&layout.config_path(), &config).unwrap();

        let mut bootstrap = Bootstrap::new(layout.clone());
        let mut console = ScriptedConsole::new(["Abc1234!", "Abc1234!"]);
        let err = bootstrap.run(&mut console).unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::Config(ConfigError::UnsupportedEncryptionMethod(ref m)) if m == "Feret"
        ));
        assert_eq!(bootstrap.state(), BootstrapState::Uninitialized);
        assert!(console.prompts().is_empty(), "no password is asked for");
        assert!(!layout.key_path().exists());
        assert!(!layout.metadata_path().exists());
        assert!(Bootstrap::needs_bootstrap(&layout).unwrap());
    }

    #[test]
    fn test_existing_key_is_not_overwritten() {
        let (_temp, layout) = seeded_home();
        let original = EncryptionKey::random();
        original.write_new(&layout.key_path()).unwrap();

        let err = Bootstrap::new(layout.clone())
            .initialize("Abc1234!")
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Key(KeyError::AlreadyExists(_))));
        assert!(!layout.metadata_path().exists());
        assert!(Bootstrap::needs_bootstrap(&layout).unwrap());
    }

    #[test]
    fn test_second_bootstrap_is_refused() {
        let (_temp, layout) = seeded_home();
        Bootstrap::new(layout.clone()).initialize("Abc1234!").unwrap();

        let err = Bootstrap::new(layout).initialize("Other123!").unwrap_err();
        assert!(matches!(err, BootstrapError::AlreadyInitialized(_)));
    }

    #[test]
    fn test_relative_data_location_resolves_against_home() {
        let (_temp, layout) = seeded_home();
        let config = UserConfig {
            data_location: PathBuf::from("vaultdata"),
            ..UserConfig::default()
        };
        write_json(&layout.config_path(), &config).unwrap();

        let metadata = Bootstrap::new(layout.clone()).initialize("Abc1234!").unwrap();
        assert_eq!(
            metadata.data_location,
            layout.home().join("vaultdata").join("data.bin")
        );
        assert!(metadata.data_location.is_file());
    }

    #[test]
    fn test_eof_while_collecting_leaves_uninitialized() {
        let (_temp, layout) = seeded_home();
        let mut bootstrap = Bootstrap::new(layout.clone());
        let mut console = ScriptedConsole::new(["Abc1234!"]);

        let err = bootstrap.run(&mut console).unwrap_err();
        assert!(matches!(err, BootstrapError::Shell(ShellError::UnexpectedEof(_))));
        assert_eq!(bootstrap.state(), BootstrapState::Uninitialized);
        assert!(!layout.key_path().exists());
    }

    #[test]
    fn test_failed_store_write_rolls_back_and_retry_succeeds() {
        let (_temp, layout) = seeded_home();
        fs::write(layout.home().join("blocker"), b"not a directory").unwrap();
        let blocked = UserConfig {
            data_location: PathBuf::from("blocker/sub"),
            ..UserConfig::default()
        };
        write_json(&layout.config_path(), &blocked).unwrap();

        let mut bootstrap = Bootstrap::new(layout.clone());
        let err = bootstrap.initialize("Abc1234!").unwrap_err();
        assert!(matches!(err, BootstrapError::StoreFile(_)));
        assert_eq!(bootstrap.state(), BootstrapState::Uninitialized);
        assert!(!layout.key_path().exists());
        assert!(!layout.metadata_path().exists());
        assert!(Bootstrap::needs_bootstrap(&layout).unwrap());

        write_json(&layout.config_path(), &UserConfig::default()).unwrap();
        let metadata = bootstrap.initialize("Abc1234!").unwrap();
        assert_eq!(bootstrap.state(), BootstrapState::Initialized);
        assert!(metadata.key_location.is_file());
        assert!(metadata.data_location.is_file());
    }
}
