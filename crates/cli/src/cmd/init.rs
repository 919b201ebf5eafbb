//! Implementation of the `lualink init` command.
//!
//! Writes a commented starter configuration built with the generator, so
//! the scaffold always stays valid Lua.

use std::path::Path;

use anyhow::{Context, Result};
use lualink_lib::Generator;
use owo_colors::OwoColorize;

/// Write a starter configuration file at `path`.
///
/// Refuses to overwrite an existing file.
pub fn cmd_init(path: &Path) -> Result<()> {
    if path.exists() {
        eprintln!(
            "{} {} already exists",
            "error:".red().bold(),
            path.display()
        );
        std::process::exit(1);
    }

    let mut g = Generator::new();
    g.comment("lualink configuration")
        .comment("validate with: lualink check")
        .raw("")
        .table("app")
        .field("name", &"my-app")
        .field("debug", &false)
        .end_table();
    g.raw("")
        .table("server")
        .field("host", &"127.0.0.1")
        .field("port", &8080)
        .field("tags", &["dev"])
        .end_table();

    std::fs::write(path, g.as_str())
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("{} wrote {}", "::".green().bold(), path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {}", path.display());
    println!("  2. Run: lualink check {}", path.display());
    println!("  3. Run: lualink watch {}", path.display());

    Ok(())
}
