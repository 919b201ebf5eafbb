//! `lualink check` integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn check_accepts_valid_config() {
    let env = TestEnv::new();
    env.write_file(
        "config.lua",
        r#"
            server = {
                host = "0.0.0.0",
                port = 8080,
            }
        "#,
    );

    env
        .lualink_cmd()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn check_verbose_lists_defined_globals() {
    let env = TestEnv::new();
    env.write_file("config.lua", "server = { port = 1 }\nworkers = 4");

    env
        .lualink_cmd()
        .arg("check")
        .arg("--verbose")
        .assert()
        .success()
        .stdout(predicate::str::contains("defines:"))
        .stdout(predicate::str::contains("workers"));
}

#[test]
fn check_rejects_broken_config() {
    let env = TestEnv::new();
    env.write_file("config.lua", "server = { host = ");

    env
        .lualink_cmd()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed"));
}

#[test]
fn check_reports_runtime_errors_with_location() {
    let env = TestEnv::new();
    env.write_file("config.lua", "error('port clash')");

    env
        .lualink_cmd()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("port clash"));
}

#[test]
fn check_missing_file_fails() {
    let env = TestEnv::new();

    env
        .lualink_cmd()
        .arg("check")
        .arg("absent.lua")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn checked_config_cannot_touch_the_filesystem() {
    let env = TestEnv::new();
    env.write_file("config.lua", r#"io.open("/etc/passwd", "r")"#);

    env
        .lualink_cmd()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed"));
}
