//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::Command;
use camino::Utf8PathBuf;
use caravan::state::StateDocument;
use caravan::store::StateStore;
use predicates::prelude::predicate;
use tempfile::TempDir;

fn state_path(tmp: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(tmp.path().join("run_data.json"))
        .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()))
}

fn seed_state(tmp: &TempDir) -> Utf8PathBuf {
    let path = state_path(tmp);
    StateStore::new(path.clone())
        .save(&StateDocument::seed("us-west-1", "us-east-1"))
        .unwrap_or_else(|err| panic!("seed state: {err}"));
    path
}

fn caravan() -> Command {
    Command::cargo_bin("caravan").unwrap_or_else(|err| panic!("binary should exist: {err}"))
}

#[test]
fn no_arguments_prints_usage_and_fails() {
    caravan()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn status_fails_when_the_state_document_is_missing() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));

    caravan()
        .env("CARAVAN_STATE_PATH", state_path(&tmp).as_str())
        .arg("status")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn status_prints_the_table_for_a_seeded_document() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = seed_state(&tmp);

    caravan()
        .env("CARAVAN_STATE_PATH", path.as_str())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("DEPLOYMENT STATUS"))
        .stdout(predicate::str::contains("PENDING"));
}

#[test]
fn unwind_without_the_typed_token_is_cancelled() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = seed_state(&tmp);

    caravan()
        .env("CARAVAN_STATE_PATH", path.as_str())
        .arg("unwind")
        .write_stdin("no\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("cancelled"));
}

#[test]
fn unknown_subcommands_are_rejected() {
    caravan()
        .arg("teleport")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
