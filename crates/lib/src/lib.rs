//! lualink: an embedded Lua configuration bridge.
//!
//! This crate embeds a Lua 5.4 interpreter in the host process and bridges
//! it to typed Rust values: host functions and types exposed to scripts,
//! Lua-authored configuration decoded back through serde, a capability
//! sandbox, and watch/reload, hook and middleware pipelines on top.
//!
//! # Overview
//!
//! - [`Engine`] owns a sandboxed Lua state and is the entry point for
//!   loading, evaluating and exchanging values.
//! - [`Sandbox`] decides what scripts may touch: stdlib subset, memory cap,
//!   execution deadline, `io.open` path policy.
//! - [`marshal`] converts host values to and from Lua through serde;
//!   `#[serde(rename)]` controls configuration key names.
//! - [`Schema`] validates decoded configuration; [`docgen`] renders it as a
//!   Markdown reference.
//! - [`watch::Watcher`] polls config files and feeds
//!   [`Engine::run_reload_loop`].
//! - [`EnvManager`] layers dev/staging/prod configs;
//!   [`plugin::PluginManager`] runs isolated Lua plugins.
//!
//! # Example
//!
//! ```
//! use lualink_lib::Engine;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Server {
//!     host: String,
//!     port: u16,
//! }
//!
//! let engine = Engine::sandboxed().unwrap();
//! engine
//!     .load_string(r#"server = { host = "0.0.0.0", port = 8080 }"#, "inline")
//!     .unwrap();
//! let server: Server = engine.get("server").unwrap();
//! assert_eq!(server.port, 8080);
//! ```

pub mod consts;
pub mod docgen;
pub mod engine;
pub mod env;
pub mod error;
pub mod functions;
pub mod generator;
pub mod hooks;
pub mod marshal;
pub mod plugin;
pub mod sandbox;
pub mod schema;
pub mod template;
pub mod watch;

pub use engine::{Engine, EngineOptions};
pub use env::{EnvManager, Environment};
pub use error::{Error, Result, StackFrame, stack_frames};
pub use functions::{Callback, Middleware, typed};
pub use generator::Generator;
pub use hooks::{Hook, HookEvent, HookKind};
pub use sandbox::Sandbox;
pub use schema::{Field, Schema};
pub use template::TemplateOptions;
pub use watch::{Watcher, WatcherOptions};
