//! Implementation of the `lualink watch` command.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use lualink_lib::{Engine, Watcher, WatcherOptions};
use owo_colors::OwoColorize;

use crate::map_lua_err;

/// Load `config`, then reload it whenever it changes, until interrupted.
pub fn cmd_watch(config: &Path, poll_interval: Duration, debounce: Duration) -> Result<()> {
    if !config.exists() {
        eprintln!(
            "{} config file not found: {}",
            "error:".red().bold(),
            config.display()
        );
        std::process::exit(1);
    }

    let engine = map_lua_err(Engine::sandboxed())?;
    if let Err(e) = engine.load_file(config) {
        eprintln!(
            "{} initial load failed: {}",
            "error:".red().bold(),
            e
        );
        std::process::exit(1);
    }

    let watcher = map_lua_err(Watcher::new(WatcherOptions {
        paths: vec![config.to_path_buf()],
        poll_interval,
        debounce,
    }))?;

    println!(
        "{} watching {} (poll {})",
        "::".cyan().bold(),
        config.display(),
        humantime::format_duration(poll_interval)
    );

    engine.run_reload_loop(&watcher, |batch, err| match err {
        None => println!(
            "{} reloaded {} file(s)",
            "::".green().bold(),
            batch.len()
        ),
        Some(e) => eprintln!("{} reload failed: {}", "error:".red().bold(), e),
    });

    Ok(())
}
