//! Smoke tests to verify command wiring

use assert_cmd::Command;
use predicates::prelude::*;

fn stocksctl() -> Command {
    let mut cmd = Command::cargo_bin("stocksctl").unwrap();
    // Keep the developer's .env and shell from leaking into assertions.
    for var in [
        "DB_CONFIG",
        "DB_HOST",
        "DB_PORT",
        "DB_USER",
        "DB_PASS",
        "DB_NAME",
        "SERVER_ADDRESS",
        "SERVER_PORT",
        "MIGRATIONS_DIR",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    stocksctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("serve")
                .and(predicate::str::contains("generate"))
                .and(predicate::str::contains("migrate"))
                .and(predicate::str::contains("rollback"))
                .and(predicate::str::contains("status")),
        );
}

#[test]
fn test_generate_help() {
    stocksctl()
        .arg("generate")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Migration name"));
}

#[test]
fn test_generate_requires_name() {
    stocksctl().arg("generate").assert().failure();
}

#[test]
fn test_generate_writes_pair() {
    let dir = tempfile::tempdir().unwrap();

    stocksctl()
        .current_dir(dir.path())
        .env("MIGRATIONS_DIR", dir.path().join("migrations"))
        .args(["generate", "--name", "add_index"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_add_index.up.sql"));

    let files: Vec<String> = std::fs::read_dir(dir.path().join("migrations"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|f| f.ends_with("_add_index.down.sql")));
}

#[test]
fn test_generate_rejects_empty_name() {
    let dir = tempfile::tempdir().unwrap();

    stocksctl()
        .current_dir(dir.path())
        .args(["generate", "--name", "  ", "--dir", "migrations"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("migration name"));
}

#[test]
fn test_migrate_without_database_config_fails() {
    let dir = tempfile::tempdir().unwrap();

    stocksctl()
        .current_dir(dir.path())
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DB_HOST"));
}

#[test]
fn test_serve_without_rest_config_fails() {
    let dir = tempfile::tempdir().unwrap();

    stocksctl()
        .current_dir(dir.path())
        .arg("serve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid server configuration"));
}
