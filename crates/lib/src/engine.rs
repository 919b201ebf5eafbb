//! The embedded configuration engine.
//!
//! An [`Engine`] owns one Lua state, created under a [`Sandbox`] policy, and
//! carries the hook and middleware registries. All loading, evaluation and
//! value exchange goes through it.
//!
//! # Example
//!
//! ```ignore
//! use lualink_lib::{Engine, Sandbox};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Server { host: String, port: u16 }
//!
//! let engine = Engine::sandboxed()?;
//! engine.load_file("config.lua")?;
//! let server: Server = engine.get("server")?;
//! ```

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use mlua::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;
use walkdir::WalkDir;

use crate::consts::DEADLINE_CHECK_INSTRUCTIONS;
use crate::error::{Error, Result};
use crate::functions::{Callback, Middleware, apply_middlewares};
use crate::hooks::{Hook, HookEvent, HookKind, HookRegistry};
use crate::marshal;
use crate::sandbox::Sandbox;
use crate::schema::Schema;

/// Construction options for an [`Engine`].
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub sandbox: Sandbox,
}

pub(crate) type SharedHooks = Rc<RefCell<HookRegistry>>;

/// Run the hooks of `kind` for `event`, aborting on the first error.
pub(crate) fn run_hooks(hooks: &SharedHooks, kind: HookKind, event: &HookEvent) -> Result<()> {
    let snapshot = hooks.borrow().snapshot(kind);
    for hook in snapshot {
        hook(event)?;
    }
    Ok(())
}

/// An embedded Lua configuration engine.
pub struct Engine {
    lua: Lua,
    sandbox: Sandbox,
    hooks: SharedHooks,
    middlewares: RefCell<Vec<Middleware>>,
    deadline: Rc<Cell<Option<Instant>>>,
}

impl Engine {
    /// Create an engine under the given options.
    pub fn new(options: EngineOptions) -> Result<Self> {
        let sandbox = options.sandbox;
        let lua = sandbox.build_state()?;

        let deadline: Rc<Cell<Option<Instant>>> = Rc::new(Cell::new(None));
        if sandbox.max_execution_time > Duration::ZERO {
            let armed = deadline.clone();
            lua.set_hook(
                mlua::HookTriggers::new().every_nth_instruction(DEADLINE_CHECK_INSTRUCTIONS),
                move |_lua, _debug| {
                    if let Some(limit) = armed.get() {
                        if Instant::now() > limit {
                            return Err(mlua::Error::runtime("script execution timed out"));
                        }
                    }
                    Ok(mlua::VmState::Continue)
                },
            );
        }

        setup_lualink_global(&lua)?;

        Ok(Self {
            lua,
            sandbox,
            hooks: Rc::new(RefCell::new(HookRegistry::new())),
            middlewares: RefCell::new(Vec::new()),
            deadline,
        })
    }

    /// Create an engine with the restricted default sandbox.
    pub fn sandboxed() -> Result<Self> {
        Self::new(EngineOptions::default())
    }

    /// The underlying Lua state, for advanced use.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// The sandbox policy this engine was created with.
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Register a lifecycle hook.
    pub fn add_hook(&self, kind: HookKind, hook: Hook) {
        self.hooks.borrow_mut().add(kind, hook);
    }

    /// Register a middleware. Applies to functions registered afterwards;
    /// the first registered middleware runs outermost.
    pub fn add_middleware(&self, middleware: Middleware) {
        self.middlewares.borrow_mut().push(middleware);
    }

    /// Load and execute a Lua file, with load hooks around it.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }
        let source = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading config file");

        // The '@' prefix marks the chunk as a file in Lua diagnostics.
        self.load_chunk(&source, &format!("@{}", path.display()), &path.display().to_string())
    }

    /// Execute a Lua chunk from memory, with load hooks around it.
    pub fn load_string(&self, source: &str, name: &str) -> Result<()> {
        self.load_chunk(source, name, name)
    }

    /// Execute every `*.lua` file directly under `dir`, in name order.
    ///
    /// Returns the number of files executed.
    pub fn load_directory(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let mut count = 0;
        for entry in WalkDir::new(dir)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|e| e == "lua") {
                self.load_file(path)?;
                count += 1;
            }
        }
        Ok(count)
    }

    pub(crate) fn load_chunk(&self, source: &str, chunk_name: &str, event_name: &str) -> Result<()> {
        let event = HookEvent::new(HookKind::BeforeLoad, event_name);
        run_hooks(&self.hooks, HookKind::BeforeLoad, &event)?;

        let start = Instant::now();
        let chunk = self.lua.load(source).set_name(chunk_name);
        self.with_deadline(|| chunk.exec())?;

        let event = HookEvent::new(HookKind::AfterLoad, event_name).with_elapsed(start.elapsed());
        run_hooks(&self.hooks, HookKind::AfterLoad, &event)
    }

    /// Fetch a global and decode it into a typed value.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value: LuaValue = self.lua.globals().get(name)?;
        if value.is_nil() {
            return Err(Error::NotFound(name.to_string()));
        }
        marshal::from_lua(&self.lua, value)
    }

    /// Fetch a global, validate its dynamic image against `schema`, then
    /// decode it.
    pub fn get_validated<T: DeserializeOwned>(&self, name: &str, schema: &Schema) -> Result<T> {
        let value: LuaValue = self.lua.globals().get(name)?;
        if value.is_nil() {
            return Err(Error::NotFound(name.to_string()));
        }
        let json = marshal::lua_to_json(value)?;
        schema.validate(&json)?;
        serde_json::from_value(json).map_err(|e| Error::InvalidType(e.to_string()))
    }

    /// Set a global from a typed host value.
    pub fn set_global<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let lua_value = marshal::to_lua(&self.lua, value)?;
        self.lua.globals().set(name, lua_value)?;
        Ok(())
    }

    /// Set multiple globals at once.
    pub fn register_constants<I, S>(&self, constants: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, JsonValue)>,
        S: AsRef<str>,
    {
        for (name, value) in constants {
            let lua_value = marshal::json_to_lua(&self.lua, &value)?;
            self.lua.globals().set(name.as_ref(), lua_value)?;
        }
        Ok(())
    }

    /// Publish a table global for a host type, seeded from `default` when
    /// given (the serialized default must be a table).
    pub fn register_type<T: Serialize>(&self, name: &str, default: Option<&T>) -> Result<()> {
        debug!(name, "registering type");
        let table = match default {
            Some(value) => match marshal::to_lua(&self.lua, value)? {
                LuaValue::Table(t) => t,
                other => {
                    return Err(Error::InvalidType(format!(
                        "default for '{}' must serialize to a table, got {}",
                        name,
                        other.type_name()
                    )));
                }
            },
            None => self.lua.create_table()?,
        };
        self.lua.globals().set(name, table)?;
        Ok(())
    }

    /// Expose a host callback as a global Lua function.
    ///
    /// The registered middleware chain wraps the callback, and
    /// BeforeExec/AfterExec hooks fire around every call.
    pub fn register_function(&self, name: &str, callback: Callback) -> Result<()> {
        debug!(name, "registering function");
        let middlewares = self.middlewares.borrow().clone();
        let chained = apply_middlewares(&middlewares, callback);

        let hooks = self.hooks.clone();
        let fn_name = name.to_string();
        let wrapped = self.lua.create_function(move |lua, args: LuaMultiValue| {
            let event = HookEvent::new(HookKind::BeforeExec, &fn_name);
            run_hooks(&hooks, HookKind::BeforeExec, &event)
                .map_err(|e| mlua::Error::runtime(e.to_string()))?;

            let start = Instant::now();
            let result = chained(lua, args);

            let event = HookEvent::new(HookKind::AfterExec, &fn_name)
                .with_elapsed(start.elapsed())
                .with_error(result.as_ref().err().map(|e| e.to_string()));
            run_hooks(&hooks, HookKind::AfterExec, &event)
                .map_err(|e| mlua::Error::runtime(e.to_string()))?;

            result
        })?;

        self.lua.globals().set(name, wrapped)?;
        Ok(())
    }

    /// Expose a host function with an mlua-typed signature.
    ///
    /// The function still goes through the middleware chain and exec hooks.
    pub fn register_typed<F, A, R>(&self, name: &str, f: F) -> Result<()>
    where
        F: Fn(&Lua, A) -> LuaResult<R> + 'static,
        A: mlua::FromLuaMulti,
        R: mlua::IntoLuaMulti,
    {
        let inner = self.lua.create_function(f)?;
        let callback: Callback = Rc::new(move |_lua, args| inner.call::<LuaMultiValue>(args));
        self.register_function(name, callback)
    }

    /// Evaluate a Lua expression and decode the result.
    pub fn eval<T: DeserializeOwned>(&self, expr: &str) -> Result<T> {
        let chunk = self.lua.load(expr).set_name("eval");
        let value: LuaValue = self.with_deadline(|| chunk.eval())?;
        marshal::from_lua(&self.lua, value)
    }

    /// Call a global Lua function with marshaled arguments and decode the
    /// first return value.
    pub fn call<T: DeserializeOwned>(&self, name: &str, args: &[JsonValue]) -> Result<T> {
        let value: LuaValue = self.lua.globals().get(name)?;
        let function = match value {
            LuaValue::Function(f) => f,
            LuaValue::Nil => return Err(Error::NotFound(name.to_string())),
            other => {
                return Err(Error::InvalidType(format!(
                    "'{}' is a {}, not a function",
                    name,
                    other.type_name()
                )));
            }
        };

        let mut lua_args = Vec::with_capacity(args.len());
        for arg in args {
            lua_args.push(marshal::json_to_lua(&self.lua, arg)?);
        }

        let results: LuaMultiValue =
            self.with_deadline(|| function.call(LuaMultiValue::from_iter(lua_args)))?;
        let first = results.into_iter().next().unwrap_or(LuaValue::Nil);
        marshal::from_lua(&self.lua, first)
    }

    /// Arm the execution deadline around a Lua entry point.
    fn with_deadline<R>(&self, f: impl FnOnce() -> LuaResult<R>) -> Result<R> {
        if self.sandbox.max_execution_time > Duration::ZERO {
            self
                .deadline
                .set(Some(Instant::now() + self.sandbox.max_execution_time));
        }
        let result = f();
        self.deadline.set(None);
        Ok(result?)
    }
}

/// Install the `lualink` info table: version and a log bridge into tracing.
fn setup_lualink_global(lua: &Lua) -> Result<()> {
    let table = lua.create_table()?;
    table.set("version", env!("CARGO_PKG_VERSION"))?;

    let log = lua.create_function(|_, (level, message): (String, String)| {
        match level.as_str() {
            "trace" => tracing::trace!(target: "lualink::script", "{}", message),
            "debug" => tracing::debug!(target: "lualink::script", "{}", message),
            "warn" => tracing::warn!(target: "lualink::script", "{}", message),
            "error" => tracing::error!(target: "lualink::script", "{}", message),
            _ => tracing::info!(target: "lualink::script", "{}", message),
        }
        Ok(())
    })?;
    table.set("log", log)?;

    lua.globals().set("lualink", table)?;
    Ok(())
}
