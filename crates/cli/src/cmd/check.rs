//! Implementation of the `lualink check` command.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use lualink_lib::{Engine, Error, stack_frames};
use owo_colors::OwoColorize;

use crate::map_lua_err;

const GLOBAL_NAMES: &str = r#"
    local names = {}
    for k in pairs(_G) do
        if type(k) == "string" then
            table.insert(names, k)
        end
    end
    table.sort(names)
    return names
"#;

/// Load `config` in a restricted sandbox and report the outcome.
///
/// Exits with status 1 when the file is missing or fails to execute.
pub fn cmd_check(config: &Path, verbose: bool) -> Result<()> {
    if !config.exists() {
        eprintln!(
            "{} config file not found: {}",
            "error:".red().bold(),
            config.display()
        );
        std::process::exit(1);
    }

    tracing::debug!(config = %config.display(), "checking config");
    let engine = map_lua_err(Engine::sandboxed())?;
    let before: Vec<String> = map_lua_err(engine.eval(GLOBAL_NAMES))?;

    let start = Instant::now();
    match engine.load_file(config) {
        Ok(()) => {
            let elapsed = Duration::from_millis(start.elapsed().as_millis() as u64);
            println!(
                "{} {} is valid ({})",
                "::".green().bold(),
                config.display(),
                humantime::format_duration(elapsed)
            );
            if verbose {
                let after: Vec<String> = map_lua_err(engine.eval(GLOBAL_NAMES))?;
                let defined: Vec<String> = after
                    .into_iter()
                    .filter(|name| !before.contains(name))
                    .collect();
                if !defined.is_empty() {
                    println!("   defines: {}", defined.join(", "));
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!(
                "{} {} failed: {}",
                "error:".red().bold(),
                config.display(),
                e
            );
            if let Error::Lua(lua_err) = &e {
                for frame in stack_frames(lua_err) {
                    eprintln!("   {}", frame);
                }
            }
            std::process::exit(1);
        }
    }
}
