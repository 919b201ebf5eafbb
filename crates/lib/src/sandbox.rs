//! Capability sandbox for embedded Lua states.
//!
//! The sandbox decides which standard libraries a state is created with,
//! removes the escape hatches the base library always ships (`load`,
//! `dofile`, ...), caps the allocator, and optionally fences `io.open`
//! behind a path policy. `debug` is never available.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mlua::prelude::*;

use crate::consts::{DEFAULT_MAX_EXECUTION_TIME, DEFAULT_MAX_MEMORY, MIN_MEMORY_LIMIT};
use crate::error::{Error, Result};

/// Security policy for a Lua state.
#[derive(Debug, Clone)]
pub struct Sandbox {
    /// Allow the `io`, `os` and `package` libraries.
    pub enable_file_io: bool,
    /// With file I/O off, still install a reduced `os` table
    /// (clock/date/difftime/time).
    pub enable_os: bool,
    /// Lua allocator cap in bytes. 0 = unlimited. Minimum 100 KB when set.
    pub max_memory: usize,
    /// Wall-clock budget per load/eval/call entry. ZERO = unlimited.
    pub max_execution_time: Duration,
    /// With file I/O on, paths `io.open` may touch. Empty = all (minus blocked).
    pub allowed_paths: Vec<PathBuf>,
    /// With file I/O on, paths `io.open` must not touch. Takes precedence.
    pub blocked_paths: Vec<PathBuf>,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::restricted()
    }
}

impl Sandbox {
    /// A restrictive policy suitable for untrusted configuration.
    pub fn restricted() -> Self {
        Self {
            enable_file_io: false,
            enable_os: false,
            max_memory: DEFAULT_MAX_MEMORY,
            max_execution_time: DEFAULT_MAX_EXECUTION_TIME,
            allowed_paths: Vec::new(),
            blocked_paths: Vec::new(),
        }
    }

    /// An unrestricted policy. Only for trusted code.
    pub fn unrestricted() -> Self {
        Self {
            enable_file_io: true,
            enable_os: true,
            max_memory: 0,
            max_execution_time: Duration::ZERO,
            allowed_paths: Vec::new(),
            blocked_paths: Vec::new(),
        }
    }

    /// The standard library set implied by this policy.
    ///
    /// Base functions (print, pairs, tostring, ...) are always available.
    pub fn stdlib(&self) -> LuaStdLib {
        let mut libs = LuaStdLib::TABLE | LuaStdLib::STRING | LuaStdLib::MATH;
        if self.enable_file_io {
            libs |= LuaStdLib::IO | LuaStdLib::OS | LuaStdLib::PACKAGE;
        } else if self.enable_os {
            libs |= LuaStdLib::OS;
        }
        libs
    }

    /// Create a Lua state conforming to this policy.
    pub fn build_state(&self) -> Result<Lua> {
        let lua = Lua::new_with(self.stdlib(), mlua::LuaOptions::default())?;
        self.apply(&lua)?;
        Ok(lua)
    }

    /// Apply global removals, the memory cap and the path policy to `lua`.
    ///
    /// The state must have been created with `self.stdlib()`; `build_state`
    /// does both steps.
    pub fn apply(&self, lua: &Lua) -> Result<()> {
        let globals = lua.globals();

        if !self.enable_file_io {
            // The base library ships these even when io/package are not loaded.
            globals.set("dofile", LuaValue::Nil)?;
            globals.set("loadfile", LuaValue::Nil)?;
            globals.set("load", LuaValue::Nil)?;
            globals.set("require", LuaValue::Nil)?;
            globals.set("package", LuaValue::Nil)?;

            if self.enable_os {
                self.reduce_os_table(lua)?;
            }
        } else {
            // Loading native modules would escape the sandbox entirely.
            if let Ok(package) = globals.get::<LuaTable>("package") {
                package.set("loadlib", LuaValue::Nil)?;
                package.set("cpath", LuaValue::Nil)?;
            }

            if !self.allowed_paths.is_empty() || !self.blocked_paths.is_empty() {
                self.install_open_policy(lua)?;
            }
        }

        if self.max_memory > 0 {
            if self.max_memory < MIN_MEMORY_LIMIT {
                return Err(Error::Sandbox(format!(
                    "memory limit too small (minimum {} bytes)",
                    MIN_MEMORY_LIMIT
                )));
            }
            lua.set_memory_limit(self.max_memory)?;
        }

        Ok(())
    }

    /// Replace `os` with a table carrying only the clock/date functions.
    fn reduce_os_table(&self, lua: &Lua) -> Result<()> {
        let os_table: LuaTable = lua.globals().get("os")?;
        let reduced = lua.create_table()?;
        for name in ["clock", "date", "difftime", "time"] {
            reduced.set(name, os_table.get::<LuaValue>(name)?)?;
        }
        lua.globals().set("os", reduced)?;
        Ok(())
    }

    /// Wrap `io.open` to enforce the allowed/blocked path lists.
    fn install_open_policy(&self, lua: &Lua) -> Result<()> {
        let io_table: LuaTable = lua.globals().get("io")?;
        let open: LuaFunction = io_table.get("open")?;

        let allowed = self.allowed_paths.clone();
        let blocked = self.blocked_paths.clone();
        let guarded = lua.create_function(move |_, (path, mode): (String, Option<String>)| {
            if !path_permitted(Path::new(&path), &allowed, &blocked) {
                return Err(mlua::Error::runtime(format!(
                    "access to '{}' is blocked by sandbox policy",
                    path
                )));
            }
            open.call::<LuaMultiValue>((path, mode))
        })?;

        io_table.set("open", guarded)?;
        Ok(())
    }
}

fn path_permitted(path: &Path, allowed: &[PathBuf], blocked: &[PathBuf]) -> bool {
    if blocked.iter().any(|b| path.starts_with(b)) {
        return false;
    }
    if allowed.is_empty() {
        return true;
    }
    allowed.iter().any(|a| path.starts_with(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn eval_is_nil(lua: &Lua, expr: &str) -> bool {
        lua.load(expr).eval::<LuaValue>().unwrap().is_nil()
    }

    #[test]
    fn restricted_removes_dangerous_globals() {
        let lua = Sandbox::restricted().build_state().unwrap();

        for global in ["io", "os", "require", "load", "loadfile", "dofile", "package", "debug"] {
            assert!(eval_is_nil(&lua, global), "{global} should be nil");
        }
    }

    #[test]
    fn restricted_keeps_safe_libraries() {
        let lua = Sandbox::restricted().build_state().unwrap();

        let upper: String = lua.load(r#"return string.upper("ok")"#).eval().unwrap();
        assert_eq!(upper, "OK");
        let floor: i64 = lua.load(r#"return math.floor(3.7)"#).eval().unwrap();
        assert_eq!(floor, 3);
        let len: i64 = lua.load(r#"return #({1, 2, 3})"#).eval().unwrap();
        assert_eq!(len, 3);
    }

    #[test]
    fn debug_is_never_available() {
        let lua = Sandbox::unrestricted().build_state().unwrap();
        assert!(eval_is_nil(&lua, "debug"));
    }

    #[test]
    fn reduced_os_table_keeps_clock_functions() {
        let sandbox = Sandbox {
            enable_os: true,
            ..Sandbox::restricted()
        };
        let lua = sandbox.build_state().unwrap();

        let t: f64 = lua.load("return os.time()").eval().unwrap();
        assert!(t > 0.0);
        assert!(eval_is_nil(&lua, "os.execute"));
        assert!(eval_is_nil(&lua, "os.remove"));
        assert!(eval_is_nil(&lua, "os.getenv"));
    }

    #[test]
    fn memory_limit_is_enforced() {
        let sandbox = Sandbox {
            max_memory: 300 * 1024,
            ..Sandbox::restricted()
        };
        let lua = sandbox.build_state().unwrap();

        let result = lua
            .load(
                r#"
                local s = "x"
                for _ = 1, 40 do s = s .. s end
                return #s
            "#,
            )
            .exec();
        assert!(result.is_err(), "allocation past the cap should fail");
    }

    #[test]
    fn tiny_memory_limit_is_rejected() {
        let sandbox = Sandbox {
            max_memory: 1024,
            ..Sandbox::restricted()
        };
        assert!(matches!(sandbox.build_state(), Err(Error::Sandbox(_))));
    }

    #[test]
    fn blocked_path_cannot_be_opened() {
        let dir = TempDir::new().unwrap();
        let secret = dir.path().join("secret.txt");
        fs::write(&secret, "hidden").unwrap();

        let sandbox = Sandbox {
            blocked_paths: vec![dir.path().to_path_buf()],
            ..Sandbox::unrestricted()
        };
        let lua = sandbox.build_state().unwrap();

        let script = format!(r#"return io.open({:?}, "r")"#, secret.display().to_string());
        let result = lua.load(&script).eval::<LuaValue>();
        assert!(result.is_err());
    }

    #[test]
    fn allowlist_is_exhaustive() {
        let dir = TempDir::new().unwrap();
        let inside = dir.path().join("ok.txt");
        fs::write(&inside, "fine").unwrap();

        let sandbox = Sandbox {
            allowed_paths: vec![dir.path().to_path_buf()],
            ..Sandbox::unrestricted()
        };
        let lua = sandbox.build_state().unwrap();

        let script = format!(
            r#"
                local f = assert(io.open({:?}, "r"))
                local content = f:read("*a")
                f:close()
                return content
            "#,
            inside.display().to_string()
        );
        let content: String = lua.load(&script).eval().unwrap();
        assert_eq!(content, "fine");

        let outside = lua
            .load(r#"return io.open("/etc/hostname", "r")"#)
            .eval::<LuaValue>();
        assert!(outside.is_err());
    }

    #[test]
    fn unrestricted_blocks_native_module_loading() {
        let lua = Sandbox::unrestricted().build_state().unwrap();
        assert!(eval_is_nil(&lua, "package.loadlib"));
    }
}
