//! Implementation of the `lualink eval` command.

use anyhow::Result;
use lualink_lib::Engine;
use owo_colors::OwoColorize;

use crate::map_lua_err;

/// Evaluate `expr` in a restricted sandbox and print the result as JSON.
pub fn cmd_eval(expr: &str) -> Result<()> {
    let engine = map_lua_err(Engine::sandboxed())?;

    match engine.eval::<serde_json::Value>(expr) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
