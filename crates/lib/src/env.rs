//! Configuration environments (dev/staging/prod).
//!
//! An environment names a base config, an overlay config, extra includes and
//! an env-var prefix. Activating one loads the layers in order and imports
//! matching process environment variables as nested globals:
//! `APP_DB_HOST=x` with prefix `APP_` becomes `db.host = "x"`.

use std::collections::HashMap;
use std::path::PathBuf;

use mlua::prelude::*;
use tracing::debug;

use crate::engine::Engine;
use crate::error::{Error, Result};

/// One named configuration environment.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub name: String,
    /// Config loaded first, shared across environments. Relative to the
    /// manager's config dir.
    pub base_config: Option<PathBuf>,
    /// Environment-specific overlay, loaded after the base.
    pub env_config: Option<PathBuf>,
    /// Env vars with this prefix are imported after loading.
    pub env_prefix: Option<String>,
    /// Additional files loaded last, in order.
    pub include_paths: Vec<PathBuf>,
}

/// Registers and activates environments against one engine.
pub struct EnvManager<'a> {
    engine: &'a Engine,
    config_dir: PathBuf,
    environments: HashMap<String, Environment>,
    active: Option<String>,
}

impl<'a> EnvManager<'a> {
    pub fn new(engine: &'a Engine, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            config_dir: config_dir.into(),
            environments: HashMap::new(),
            active: None,
        }
    }

    /// Register an environment. Every referenced config file must exist.
    pub fn register(&mut self, env: Environment) -> Result<()> {
        if env.name.is_empty() {
            return Err(Error::Env("environment name cannot be empty".to_string()));
        }

        for config in [&env.base_config, &env.env_config] {
            if let Some(rel) = config {
                let path = self.config_dir.join(rel);
                if !path.exists() {
                    return Err(Error::Env(format!(
                        "config not found: {}",
                        path.display()
                    )));
                }
            }
        }

        self.environments.insert(env.name.clone(), env);
        Ok(())
    }

    /// Load an environment's layers into the engine and mark it active.
    pub fn activate(&mut self, name: &str) -> Result<()> {
        let env = self
            .environments
            .get(name)
            .ok_or_else(|| Error::Env(format!("environment not found: {}", name)))?
            .clone();

        debug!(name, "activating environment");

        if let Some(base) = &env.base_config {
            self.engine.load_file(self.config_dir.join(base))?;
        }
        if let Some(overlay) = &env.env_config {
            self.engine.load_file(self.config_dir.join(overlay))?;
        }
        for include in &env.include_paths {
            self.engine.load_file(self.config_dir.join(include))?;
        }

        if let Some(prefix) = &env.env_prefix {
            import_env_vars(self.engine, prefix)?;
        }

        self.active = Some(name.to_string());
        Ok(())
    }

    /// The currently active environment, if any.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }
}

/// Import every `PREFIX_*` process env var as a nested global.
fn import_env_vars(engine: &Engine, prefix: &str) -> Result<()> {
    for (key, value) in std::env::vars() {
        let Some(suffix) = key.strip_prefix(prefix) else {
            continue;
        };
        if suffix.is_empty() {
            continue;
        }

        let path: Vec<String> = suffix.to_lowercase().split('_').map(String::from).collect();
        set_nested_global(engine.lua(), &path, &value).map_err(|e| {
            Error::Env(format!("failed to import env var {}: {}", key, e))
        })?;
    }
    Ok(())
}

/// Walk/create tables along `path` and set the final segment to `value`.
fn set_nested_global(lua: &Lua, path: &[String], value: &str) -> Result<()> {
    let (last, parents) = path.split_last().expect("path is never empty");

    let mut table = lua.globals();
    for segment in parents {
        let entry: LuaValue = table.get(segment.as_str())?;
        table = match entry {
            LuaValue::Table(t) => t,
            LuaValue::Nil => {
                let fresh = lua.create_table()?;
                table.set(segment.as_str(), &fresh)?;
                fresh
            }
            other => {
                return Err(Error::Env(format!(
                    "global segment '{}' is a {}, not a table",
                    segment,
                    other.type_name()
                )));
            }
        };
    }

    table.set(last.as_str(), value)?;
    Ok(())
}
