//! CLI integration tests for mysql2yasdb.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for configuration errors. None of them needs a database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the mysql2yasdb binary.
fn cmd() -> Command {
    Command::cargo_bin("mysql2yasdb").unwrap()
}

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_sync_subcommand_help() {
    cmd()
        .args(["sync", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--parallel"))
        .stdout(predicate::str::contains("--parallel-per-table"))
        .stdout(predicate::str::contains("--batch-size"));
}

#[test]
fn test_check_subcommand_help() {
    cmd()
        .args(["check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--parallel"))
        .stdout(predicate::str::contains("--sample-lines"))
        .stdout(predicate::str::contains("--rows-only"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mysql2yasdb"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_log_format_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

// =============================================================================
// Argument Errors
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_non_numeric_parallel_is_rejected() {
    cmd()
        .args(["sync", "-p", "many"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_rows_only_not_accepted_by_sync() {
    cmd()
        .args(["sync", "--rows-only"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--rows-only"));
}

// =============================================================================
// Exit Code Tests - Config Errors
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    // A missing file is an IO error, not a config error.
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let file = config_file("invalid: yaml: content: [\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_required_fields_exits_with_code_2() {
    let file = config_file("source:\n  host: 127.0.0.1\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "sync"])
        .assert()
        .code(2);
}

#[test]
fn test_schemas_and_tables_together_exits_with_code_2() {
    let file = config_file(
        r#"
source:
  host: 127.0.0.1
  user: root
  database: app
  schemas: [app]
  tables: [users]
target:
  host: 127.0.0.1
  user: sys
  remap_schemas: [APP]
"#,
    );

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "check"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_remap_length_mismatch_exits_with_code_2() {
    let file = config_file(
        r#"
source:
  host: 127.0.0.1
  user: root
  schemas: [app, crm]
target:
  host: 127.0.0.1
  user: sys
  remap_schemas: [APP]
"#,
    );

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "sync", "-p", "2"])
        .assert()
        .code(2);
}

#[test]
fn test_zero_parallel_on_command_line_exits_with_code_2() {
    let file = config_file(
        r#"
source:
  host: 127.0.0.1
  user: root
  schemas: [app]
target:
  host: 127.0.0.1
  user: sys
  remap_schemas: [APP]
"#,
    );

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "sync", "-p", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("parallel must be at least 1"));
}
