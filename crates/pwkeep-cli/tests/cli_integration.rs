#![allow(deprecated)] // cargo_bin! macro doesn't exist yet in assert_cmd 2.1

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const ROOT: &str = "Abc1234!";

fn pwkeep(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pwkeep").unwrap();
    cmd.arg("--home").arg(home);
    cmd.env_remove("PWKEEP_HOME");
    cmd.env_remove("RUST_LOG");
    // Never touch the real clipboard from tests
    cmd.env("PWKEEP_CLIPBOARD_COMMAND", "true");
    cmd
}

fn script(lines: &[&str]) -> String {
    let mut input = lines.join("\n");
    input.push('\n');
    input
}

/// Bootstrap a home and store one credential, returning the kept-alive dir.
fn initialized_home() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    pwkeep(temp.path())
        .write_stdin(script(&[
            ROOT, ROOT, // root password and confirmation
            ROOT, "",   // unlock, no masking
            "a", "bank", "alice", "p1", "", "x",
        ]))
        .assert()
        .success();
    temp
}

#[test]
fn test_first_run_bootstraps_and_adds() {
    let temp = TempDir::new().unwrap();
    pwkeep(temp.path())
        .write_stdin(script(&[
            "weakpass", ROOT, ROOT, ROOT, "", "a", "bank", "alice", "p1", "", "v", "x",
        ]))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("\n  +---"))
        .stdout(predicate::str::contains("pwkeep    password manager"))
        .stdout(predicate::str::contains("did not meet all criteria"))
        .stdout(predicate::str::contains("initialization complete"))
        .stdout(predicate::str::contains("AES-256-GCM"))
        .stdout(predicate::str::contains("new credentials added"))
        .stdout(predicate::str::contains("    bank"))
        .stdout(predicate::str::contains("updating database"));

    let home = temp.path();
    assert!(home.join("meta.json").is_file());
    assert!(home.join("keys").join("store.key").is_file());
    assert!(home.join("data.bin").is_file());

    let marker: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(home.join("mgr.json")).unwrap()).unwrap();
    assert_eq!(marker["INITIAL"], false);

    let meta: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(home.join("meta.json")).unwrap()).unwrap();
    assert_eq!(meta["ENCRYPTION_METHOD"], "AES-256-GCM");
}

#[test]
fn test_store_is_encrypted_at_rest() {
    let temp = initialized_home();
    let blob = fs::read(temp.path().join("data.bin")).unwrap();
    for needle in [b"alice".as_slice(), b"p1", ROOT.as_bytes(), b"bank"] {
        assert!(!blob.windows(needle.len()).any(|w| w == needle));
    }
}

#[test]
fn test_second_run_sees_saved_credentials() {
    let temp = initialized_home();
    pwkeep(temp.path())
        .write_stdin(script(&[ROOT, "", "v", "x"]))
        .assert()
        .success()
        .stdout(predicate::str::contains("pwkeep    password manager"))
        .stdout(predicate::str::contains("    bank"))
        .stdout(predicate::str::contains("creating root user").not())
        .stdout(predicate::str::contains("    USER").not());
}

#[test]
fn test_masked_session_hides_password() {
    let temp = initialized_home();
    pwkeep(temp.path())
        .write_stdin(script(&[ROOT, "m", "e", "bank", "alice", "n3wSecret", "", "x"]))
        .assert()
        .success()
        .stdout(predicate::str::contains("`masked`"))
        .stdout(predicate::str::contains("n3wSecret").not())
        .stdout(predicate::str::contains("password:  p1").not());
}

#[test]
fn test_lockout_exits_with_auth_code() {
    let temp = initialized_home();
    let before = fs::read(temp.path().join("data.bin")).unwrap();

    pwkeep(temp.path())
        .write_stdin(script(&["one", "two", "three", "four"]))
        .assert()
        .code(3)
        .stdout(predicate::str::contains("invalid, you have 3 tries left"))
        .stdout(predicate::str::contains("maximum tries (4) reached"))
        .stderr(predicate::str::contains("authentication failed"));

    assert_eq!(fs::read(temp.path().join("data.bin")).unwrap(), before);
}

#[test]
fn test_unsupported_method_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    fs::write(
        home.join("config.json"),
        r#"{"ENCRYPTION_METHOD": "Feret", "DATA_LOCATION": "."}"#,
    )
    .unwrap();

    pwkeep(home)
        .write_stdin(script(&[ROOT, ROOT]))
        .assert()
        .code(10)
        .stderr(predicate::str::contains("unknown encryption method"));

    assert!(!home.join("keys").exists());
    assert!(!home.join("meta.json").exists());
    assert!(!home.join("data.bin").exists());
}

#[test]
fn test_corrupt_store_is_rejected() {
    let temp = initialized_home();
    let data = temp.path().join("data.bin");
    let mut blob = fs::read(&data).unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0xFF;
    fs::write(&data, &blob).unwrap();

    pwkeep(temp.path())
        .write_stdin(script(&[ROOT, "", "x"]))
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Failed to decrypt store"));

    assert_eq!(fs::read(&data).unwrap(), blob, "corrupt store must not be rewritten");
}

#[test]
fn test_missing_key_is_reported() {
    let temp = initialized_home();
    let key = temp.path().join("keys").join("store.key");
    let mut permissions = fs::metadata(&key).unwrap().permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    fs::set_permissions(&key, permissions).unwrap();
    fs::remove_file(&key).unwrap();

    pwkeep(temp.path())
        .write_stdin(script(&[ROOT]))
        .assert()
        .code(4)
        .stderr(predicate::str::contains("unable to open/find key file"));
}

#[test]
fn test_input_ending_mid_verb_discards_changes() {
    let temp = initialized_home();
    pwkeep(temp.path())
        .write_stdin(script(&[ROOT, "", "a", "mail", "bob"]))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("store was not saved"));

    pwkeep(temp.path())
        .write_stdin(script(&[ROOT, "", "v", "x"]))
        .assert()
        .success()
        .stdout(predicate::str::contains("    mail").not());
}

#[cfg(unix)]
#[test]
fn test_copy_pipes_password_to_clipboard_command() {
    let temp = initialized_home();
    let sink = temp.path().join("clipboard.txt");

    pwkeep(temp.path())
        .env("PWKEEP_CLIPBOARD_COMMAND", format!("tee {}", sink.display()))
        .write_stdin(script(&[ROOT, "", "c", "bank", "x"]))
        .assert()
        .success()
        .stdout(predicate::str::contains("username:  alice"))
        .stdout(predicate::str::contains("(copied to clipboard)"));

    assert_eq!(fs::read_to_string(&sink).unwrap(), "p1");
}

#[test]
fn test_quiet_suppresses_error_output() {
    let temp = initialized_home();
    pwkeep(temp.path())
        .arg("-q")
        .write_stdin(script(&["one", "two", "three", "four"]))
        .assert()
        .code(3)
        .stderr(predicate::str::is_empty());
}
