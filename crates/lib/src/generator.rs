//! Fluent Lua source generation.
//!
//! Builds configuration files programmatically, for `init`-style scaffolding
//! and for writing host state back out as Lua. Values go through the same
//! serde image as the marshaling layer, so anything serializable can be
//! emitted.
//!
//! # Example
//!
//! ```
//! use lualink_lib::generator::Generator;
//!
//! let mut g = Generator::new();
//! g.comment("generated")
//!   .table("server")
//!   .field("host", &"0.0.0.0")
//!   .field("port", &8080)
//!   .end_table();
//! assert!(g.as_str().contains("host = \"0.0.0.0\""));
//! ```

use serde::Serialize;
use serde_json::Value as JsonValue;

const INDENT: &str = "    ";

/// A fluent builder producing Lua source text.
#[derive(Debug, Default)]
pub struct Generator {
    buffer: String,
    indent: usize,
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The generated source so far.
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    /// Consume the builder, returning the generated source.
    pub fn finish(self) -> String {
        self.buffer
    }

    /// Clear the buffer and indentation.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.indent = 0;
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.buffer.push_str(INDENT);
        }
    }

    /// Open a table. With a name, emits `name = {`; anonymous otherwise.
    pub fn table(&mut self, name: &str) -> &mut Self {
        self.write_indent();
        if !name.is_empty() {
            self.buffer.push_str(&key_syntax(name));
            self.buffer.push_str(" = ");
        }
        self.buffer.push_str("{\n");
        self.indent += 1;
        self
    }

    /// Close the innermost table.
    pub fn end_table(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self.write_indent();
        self.buffer.push('}');
        if self.indent == 0 {
            self.buffer.push('\n');
        } else {
            self.buffer.push_str(",\n");
        }
        self
    }

    /// Emit `name = <value>,` using Lua literal syntax for the value.
    pub fn field<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> &mut Self {
        let json = serde_json::to_value(value).unwrap_or(JsonValue::Null);
        self.write_indent();
        self.buffer.push_str(&key_syntax(name));
        self.buffer.push_str(" = ");
        self.write_value(&json);
        self.buffer.push_str(",\n");
        self
    }

    /// Emit an inline array entry `{ a, b, c },`.
    pub fn array<T: Serialize>(&mut self, values: &[T]) -> &mut Self {
        self.write_indent();
        self.buffer.push_str("{ ");
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                self.buffer.push_str(", ");
            }
            let json = serde_json::to_value(v).unwrap_or(JsonValue::Null);
            self.write_value(&json);
        }
        self.buffer.push_str(" },\n");
        self
    }

    /// Emit a `-- comment` line.
    pub fn comment(&mut self, text: &str) -> &mut Self {
        self.write_indent();
        self.buffer.push_str("-- ");
        self.buffer.push_str(text);
        self.buffer.push('\n');
        self
    }

    /// Emit raw Lua code at the current indentation.
    pub fn raw(&mut self, code: &str) -> &mut Self {
        self.write_indent();
        self.buffer.push_str(code.trim());
        self.buffer.push('\n');
        self
    }

    /// Open a function declaration. With an empty name, emits an anonymous
    /// function header.
    pub fn func(&mut self, name: &str, params: &[&str]) -> &mut Self {
        self.write_indent();
        self.buffer.push_str("function");
        if !name.is_empty() {
            self.buffer.push(' ');
            self.buffer.push_str(name);
        }
        self.buffer.push('(');
        self.buffer.push_str(&params.join(", "));
        self.buffer.push_str(")\n");
        self.indent += 1;
        self
    }

    /// Close the innermost function declaration.
    pub fn end_func(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self.write_indent();
        self.buffer.push_str("end\n");
        self
    }

    fn write_value(&mut self, value: &JsonValue) {
        match value {
            JsonValue::Null => self.buffer.push_str("nil"),
            JsonValue::Bool(b) => self.buffer.push_str(if *b { "true" } else { "false" }),
            JsonValue::Number(n) => self.buffer.push_str(&n.to_string()),
            JsonValue::String(s) => {
                self.buffer.push_str(&format!("{:?}", s));
            }
            JsonValue::Array(items) => {
                self.buffer.push_str("{ ");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.buffer.push_str(", ");
                    }
                    self.write_value(item);
                }
                self.buffer.push_str(" }");
            }
            JsonValue::Object(map) => {
                self.buffer.push_str("{\n");
                self.indent += 1;
                for (key, item) in map {
                    self.write_indent();
                    self.buffer.push_str(&key_syntax(key));
                    self.buffer.push_str(" = ");
                    self.write_value(item);
                    self.buffer.push_str(",\n");
                }
                self.indent -= 1;
                self.write_indent();
                self.buffer.push('}');
            }
        }
    }
}

/// Keys that are not plain identifiers need bracket syntax.
fn key_syntax(name: &str) -> String {
    let plain = !name.is_empty()
        && !name.chars().next().is_some_and(|c| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("[{:?}]", name)
    }
}
