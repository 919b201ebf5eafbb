//! Host callbacks and the middleware chain.
//!
//! Every host function exposed to Lua is normalized to the [`Callback`]
//! shape so middleware can wrap logging, caching or access checks around it
//! without knowing the signature. Typed adapters build callbacks from plain
//! Rust functions over serde types.

use std::rc::Rc;

use mlua::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::marshal;

/// The uniform shape of a host function callable from Lua.
pub type Callback = Rc<dyn Fn(&Lua, LuaMultiValue) -> LuaResult<LuaMultiValue>>;

/// Wraps a callback, returning a new one.
pub type Middleware = Rc<dyn Fn(Callback) -> Callback>;

/// Apply `middlewares` to `callback` in reverse order, so the first
/// registered middleware ends up outermost.
pub fn apply_middlewares(middlewares: &[Middleware], callback: Callback) -> Callback {
    let mut wrapped = callback;
    for mw in middlewares.iter().rev() {
        wrapped = mw(wrapped);
    }
    wrapped
}

/// Build a callback from a function over serde types.
///
/// The first Lua argument is decoded into `A`; the return value is marshaled
/// back. Decode failures and host errors surface as Lua errors the script can
/// `pcall`.
pub fn typed<A, R, F>(f: F) -> Callback
where
    A: DeserializeOwned,
    R: Serialize,
    F: Fn(A) -> Result<R, Error> + 'static,
{
    Rc::new(move |lua, args| {
        let first = args.into_iter().next().unwrap_or(LuaValue::Nil);
        let arg: A = lua
            .from_value(first)
            .map_err(|e| mlua::Error::runtime(format!("invalid argument: {}", e)))?;

        let ret = f(arg).map_err(|e| mlua::Error::runtime(e.to_string()))?;

        let value = marshal::to_lua(lua, &ret).map_err(|e| mlua::Error::runtime(e.to_string()))?;
        Ok(LuaMultiValue::from_iter([value]))
    })
}
