//! Watch-and-reload behavior across the engine and watcher.

use std::time::Duration;

use lualink_lib::{Engine, Watcher, WatcherOptions};

use super::common::TestEnv;

fn fast_watcher(paths: Vec<std::path::PathBuf>) -> Watcher {
    Watcher::new(WatcherOptions {
        paths,
        poll_interval: Duration::from_millis(20),
        debounce: Duration::from_millis(10),
    })
    .unwrap()
}

#[test]
fn edits_flow_into_typed_values_after_reload() {
    let env = TestEnv::new();
    let config = env.write_file("limits.lua", "limits = { max_jobs = 4 }");

    let engine = Engine::sandboxed().unwrap();
    engine.load_file(&config).unwrap();
    let before: i64 = engine.eval("limits.max_jobs").unwrap();
    assert_eq!(before, 4);

    let mut watcher = fast_watcher(vec![config.clone()]);
    env.write_file("limits.lua", "limits = { max_jobs = 64 } -- raised");

    std::thread::sleep(Duration::from_millis(500));
    watcher.close();

    let mut reload_count = 0;
    engine.run_reload_loop(&watcher, |batch, err| {
        assert!(err.is_none());
        assert!(!batch.is_empty());
        reload_count += 1;
    });
    assert!(reload_count >= 1);

    let after: i64 = engine.eval("limits.max_jobs").unwrap();
    assert_eq!(after, 64);
}

#[test]
fn reload_keeps_registered_host_functions() {
    let env = TestEnv::new();
    let config = env.write_file("calc.lua", "result = base_value()");

    let engine = Engine::sandboxed().unwrap();
    engine
        .register_typed("base_value", |_, ()| Ok(10))
        .unwrap();
    engine.load_file(&config).unwrap();

    let mut watcher = fast_watcher(vec![config.clone()]);
    env.write_file("calc.lua", "result = base_value() * 2 -- doubled");

    std::thread::sleep(Duration::from_millis(500));
    watcher.close();
    engine.run_reload_loop(&watcher, |_, err| assert!(err.is_none()));

    let result: i64 = engine.eval("result").unwrap();
    assert_eq!(result, 20);
}
