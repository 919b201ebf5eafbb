//! `lualink eval` integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn eval_prints_scalar_result() {
    let env = TestEnv::new();

    env
        .lualink_cmd()
        .arg("eval")
        .arg("1 + 2")
        .assert()
        .success()
        .stdout(predicate::str::contains("3"));
}

#[test]
fn eval_prints_tables_as_json() {
    let env = TestEnv::new();

    env
        .lualink_cmd()
        .arg("eval")
        .arg(r#"{ name = "demo", ports = { 80, 443 } }"#)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "demo""#))
        .stdout(predicate::str::contains("443"));
}

#[test]
fn eval_runs_in_the_sandbox() {
    let env = TestEnv::new();

    // `os` is removed in the restricted sandbox, so indexing it fails.
    env
        .lualink_cmd()
        .arg("eval")
        .arg("os.getenv('HOME')")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn eval_reports_bad_expressions() {
    let env = TestEnv::new();

    env
        .lualink_cmd()
        .arg("eval")
        .arg("1 +")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}
