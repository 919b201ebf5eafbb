//! `lualink init` integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn init_writes_a_valid_starter_config() {
    let env = TestEnv::new();

    env
        .lualink_cmd()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote config.lua"));

    let content = std::fs::read_to_string(env.path().join("config.lua")).unwrap();
    assert!(content.contains("app = {"));
    assert!(content.contains("server = {"));

    // The scaffold must pass its own check.
    env
        .lualink_cmd()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn init_refuses_to_overwrite() {
    let env = TestEnv::new();
    env.write_file("config.lua", "-- precious");

    env
        .lualink_cmd()
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let content = std::fs::read_to_string(env.path().join("config.lua")).unwrap();
    assert_eq!(content, "-- precious");
}
