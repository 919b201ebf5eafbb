//! Lua plugins with per-plugin isolation.
//!
//! Each plugin runs in its own sandboxed Lua state and declares a `metadata`
//! table (`name` and `version` at minimum) plus an optional `exports` table
//! of functions the host can call. Plugins talk back through the `host`
//! API table: `host.emit(event, data)` and `host.log(level, message)`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::prelude::*;
use serde_json::Value as JsonValue;
use tracing::debug;
use walkdir::WalkDir;

use crate::consts::PLUGIN_MAX_MEMORY;
use crate::error::{Error, Result};
use crate::marshal;
use crate::sandbox::Sandbox;

/// Options for [`PluginManager::new`].
#[derive(Debug, Clone)]
pub struct PluginOptions {
    /// Directory scanned for `*.lua` plugin files.
    pub dir: PathBuf,
    /// Policy each plugin state is built under.
    pub sandbox: Sandbox,
    /// Metadata keys every plugin must declare, beyond `name` and `version`.
    pub required_metadata: Vec<String>,
}

impl PluginOptions {
    /// Restricted defaults for the given plugin directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sandbox: Sandbox {
                max_memory: PLUGIN_MAX_MEMORY,
                ..Sandbox::restricted()
            },
            required_metadata: Vec::new(),
        }
    }
}

/// A loaded plugin and its isolated state.
pub struct Plugin {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub path: PathBuf,
    lua: Lua,
}

impl Plugin {
    /// Names listed in the plugin's `exports` table.
    pub fn exports(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(exports) = self.lua.globals().get::<LuaTable>("exports") {
            for pair in exports.pairs::<String, LuaValue>() {
                if let Ok((name, LuaValue::Function(_))) = pair {
                    names.push(name);
                }
            }
        }
        names.sort();
        names
    }
}

/// Handles an event emitted by a plugin or the host.
pub type EventHandler = Rc<dyn Fn(&JsonValue) -> std::result::Result<(), String>>;

type SharedHandlers = Rc<RefCell<HashMap<String, Vec<EventHandler>>>>;

/// Loads plugins and routes their events.
pub struct PluginManager {
    options: PluginOptions,
    plugins: HashMap<String, Plugin>,
    handlers: SharedHandlers,
}

impl PluginManager {
    pub fn new(options: PluginOptions) -> Self {
        Self {
            options,
            plugins: HashMap::new(),
            handlers: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Scan the plugin directory and load every `*.lua` file.
    ///
    /// Returns the number of plugins loaded. A missing directory loads
    /// nothing.
    pub fn load_plugins(&mut self) -> Result<usize> {
        let dir = self.options.dir.clone();
        if !dir.exists() {
            return Ok(0);
        }

        let mut count = 0;
        for entry in WalkDir::new(&dir)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|e| e == "lua") {
                self.load_plugin(path)?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Load a single plugin file.
    pub fn load_plugin(&mut self, path: &Path) -> Result<()> {
        let source = std::fs::read_to_string(path)?;
        let lua = self.options.sandbox.build_state()?;
        register_host_api(&lua, self.handlers.clone())?;

        lua
            .load(&source)
            .set_name(format!("@{}", path.display()))
            .exec()
            .map_err(|e| Error::Plugin(format!("{}: {}", path.display(), e)))?;

        let metadata = match lua.globals().get::<LuaValue>("metadata")? {
            LuaValue::Table(t) => t,
            _ => {
                return Err(Error::Plugin(format!(
                    "{}: plugin must declare a 'metadata' table",
                    path.display()
                )));
            }
        };

        let name: String = metadata
            .get("name")
            .map_err(|_| Error::Plugin(format!("{}: metadata.name is required", path.display())))?;
        let version: String = metadata
            .get("version")
            .map_err(|_| Error::Plugin(format!("{}: metadata.version is required", path.display())))?;
        let description: Option<String> = metadata.get("description").ok();

        for key in &self.options.required_metadata {
            let value: LuaValue = metadata.get(key.as_str())?;
            if value.is_nil() {
                return Err(Error::Plugin(format!(
                    "{}: metadata.{} is required",
                    path.display(),
                    key
                )));
            }
        }

        if self.plugins.contains_key(&name) {
            return Err(Error::Plugin(format!("duplicate plugin name '{}'", name)));
        }

        debug!(name, version, path = %path.display(), "loaded plugin");
        self.plugins.insert(
            name.clone(),
            Plugin {
                name,
                version,
                description,
                path: path.to_path_buf(),
                lua,
            },
        );
        Ok(())
    }

    /// A loaded plugin by name.
    pub fn get(&self, name: &str) -> Option<&Plugin> {
        self.plugins.get(name)
    }

    /// All loaded plugins, in name order.
    pub fn plugins(&self) -> Vec<&Plugin> {
        let mut all: Vec<&Plugin> = self.plugins.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Call an exported plugin function with marshaled arguments.
    pub fn call(&self, plugin: &str, function: &str, args: &[JsonValue]) -> Result<JsonValue> {
        let plugin = self
            .plugins
            .get(plugin)
            .ok_or_else(|| Error::NotFound(plugin.to_string()))?;

        let exports: LuaTable = plugin
            .lua
            .globals()
            .get("exports")
            .map_err(|_| Error::Plugin(format!("plugin '{}' exports nothing", plugin.name)))?;
        let value: LuaValue = exports.get(function)?;
        let LuaValue::Function(f) = value else {
            return Err(Error::NotFound(format!("{}.{}", plugin.name, function)));
        };

        let mut lua_args = Vec::with_capacity(args.len());
        for arg in args {
            lua_args.push(marshal::json_to_lua(&plugin.lua, arg)?);
        }

        let result: LuaValue = f.call(LuaMultiValue::from_iter(lua_args))?;
        marshal::lua_to_json(result)
    }

    /// Register a handler for an event name.
    pub fn on(&self, event: impl Into<String>, handler: EventHandler) {
        self
            .handlers
            .borrow_mut()
            .entry(event.into())
            .or_default()
            .push(handler);
    }

    /// Emit an event to all registered handlers, in registration order.
    pub fn emit(&self, event: &str, data: &JsonValue) -> Result<()> {
        emit_event(&self.handlers, event, data)
    }
}

fn emit_event(handlers: &SharedHandlers, event: &str, data: &JsonValue) -> Result<()> {
    // Snapshot first so handlers may register further handlers.
    let snapshot = handlers
        .borrow()
        .get(event)
        .cloned()
        .unwrap_or_default();
    for handler in snapshot {
        handler(data).map_err(|message| {
            Error::Plugin(format!("handler for '{}' failed: {}", event, message))
        })?;
    }
    Ok(())
}

/// Install the `host` API table into a plugin state.
fn register_host_api(lua: &Lua, handlers: SharedHandlers) -> Result<()> {
    let host = lua.create_table()?;

    let emit_handlers = handlers;
    let emit = lua.create_function(move |_, (event, data): (String, Option<LuaValue>)| {
        let json = match data {
            Some(value) => marshal::lua_to_json(value).map_err(|e| mlua::Error::runtime(e.to_string()))?,
            None => JsonValue::Null,
        };
        emit_event(&emit_handlers, &event, &json).map_err(|e| mlua::Error::runtime(e.to_string()))
    })?;
    host.set("emit", emit)?;

    let log = lua.create_function(|_, (level, message): (String, String)| {
        match level.as_str() {
            "debug" => tracing::debug!(target: "lualink::plugin", "{}", message),
            "warn" => tracing::warn!(target: "lualink::plugin", "{}", message),
            "error" => tracing::error!(target: "lualink::plugin", "{}", message),
            _ => tracing::info!(target: "lualink::plugin", "{}", message),
        }
        Ok(())
    })?;
    host.set("log", log)?;

    lua.globals().set("host", host)?;
    Ok(())
}
