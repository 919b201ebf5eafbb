//! Value marshaling between host types and Lua.
//!
//! Typed conversion goes through serde: any `Serialize` host value becomes a
//! Lua value and any Lua value decodes into a `Deserialize` target. Field
//! renames (`#[serde(rename = "...")]`) control the table keys, which is how
//! host structs map onto configuration tables.
//!
//! The dynamic bridge (`lua_to_json` / `json_to_lua`) covers untyped data:
//! schema validation, plugin calls, and CLI output all operate on the
//! `serde_json::Value` image of a Lua value.

use mlua::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Convert a host value to a Lua value.
///
/// `None` and unit serialize to `nil` rather than mlua's null sentinel, so
/// optional fields disappear from tables the way Lua code expects.
pub fn to_lua<T: Serialize + ?Sized>(lua: &Lua, value: &T) -> Result<LuaValue> {
    let options = mlua::SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false);
    Ok(lua.to_value_with(value, options)?)
}

/// Decode a Lua value into a typed host value.
pub fn from_lua<T: DeserializeOwned>(lua: &Lua, value: LuaValue) -> Result<T> {
    lua
        .from_value(value)
        .map_err(|e| Error::InvalidType(e.to_string()))
}

/// Convert a Lua value to a `serde_json::Value`.
///
/// Tables whose keys are exclusively positive integers become arrays
/// (1-indexed, holes filled with null); all other tables become objects.
pub fn lua_to_json(value: LuaValue) -> Result<JsonValue> {
    match value {
        LuaValue::Nil => Ok(JsonValue::Null),
        LuaValue::Boolean(b) => Ok(JsonValue::Bool(b)),
        LuaValue::Integer(i) => Ok(JsonValue::Number(i.into())),
        LuaValue::Number(n) => {
            if n.is_finite() {
                Ok(serde_json::Number::from_f64(n).map_or(JsonValue::Null, JsonValue::Number))
            } else {
                Err(Error::InvalidType(
                    "numbers must be finite (not NaN or Infinity)".to_string(),
                ))
            }
        }
        LuaValue::String(s) => Ok(JsonValue::String(s.to_str()?.to_string())),
        LuaValue::Table(t) => {
            let mut is_array = true;
            let mut max_index = 0;
            for pair in t.clone().pairs::<LuaValue, LuaValue>() {
                let (k, _) = pair?;
                match k {
                    LuaValue::Integer(i) if i > 0 => {
                        max_index = max_index.max(i as usize);
                    }
                    _ => {
                        is_array = false;
                        break;
                    }
                }
            }

            if is_array && max_index > 0 {
                let mut arr = Vec::with_capacity(max_index);
                for i in 1..=max_index {
                    let v: LuaValue = t.get(i)?;
                    arr.push(lua_to_json(v)?);
                }
                Ok(JsonValue::Array(arr))
            } else {
                let mut map = serde_json::Map::new();
                for pair in t.pairs::<String, LuaValue>() {
                    let (k, v) = pair?;
                    map.insert(k, lua_to_json(v)?);
                }
                Ok(JsonValue::Object(map))
            }
        }
        LuaValue::Function(_) => Err(Error::InvalidType("cannot convert a function".to_string())),
        LuaValue::Thread(_) => Err(Error::InvalidType("cannot convert a thread".to_string())),
        LuaValue::UserData(_) | LuaValue::LightUserData(_) => {
            Err(Error::InvalidType("cannot convert userdata".to_string()))
        }
        other => Err(Error::InvalidType(format!(
            "cannot convert a {} value",
            other.type_name()
        ))),
    }
}

/// Convert a `serde_json::Value` to a Lua value.
pub fn json_to_lua(lua: &Lua, value: &JsonValue) -> Result<LuaValue> {
    match value {
        JsonValue::Null => Ok(LuaValue::Nil),
        JsonValue::Bool(b) => Ok(LuaValue::Boolean(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(LuaValue::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(LuaValue::Number(f))
            } else {
                Err(Error::InvalidType("invalid number".to_string()))
            }
        }
        JsonValue::String(s) => Ok(LuaValue::String(lua.create_string(s)?)),
        JsonValue::Array(arr) => {
            let table = lua.create_table()?;
            for (i, v) in arr.iter().enumerate() {
                table.set(i + 1, json_to_lua(lua, v)?)?;
            }
            Ok(LuaValue::Table(table))
        }
        JsonValue::Object(obj) => {
            let table = lua.create_table()?;
            for (k, v) in obj {
                table.set(k.as_str(), json_to_lua(lua, v)?)?;
            }
            Ok(LuaValue::Table(table))
        }
    }
}
