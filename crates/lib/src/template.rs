//! Template pre-processing of configuration sources.
//!
//! Placeholders are substituted before the chunk reaches the Lua compiler:
//!
//! - `{{ name }}` — looked up in [`TemplateOptions::variables`]
//! - `{{ env:NAME }}` — read from the process environment
//! - `{{ name | fallback }}` — literal fallback when the variable is unset
//!
//! Unknown placeholders without a fallback are an error naming the
//! placeholder.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value as JsonValue;

use crate::engine::Engine;
use crate::error::{Error, Result};

/// Options for template rendering.
#[derive(Debug, Clone)]
pub struct TemplateOptions {
    /// Substitution variables.
    pub variables: HashMap<String, JsonValue>,
    /// Opening delimiter (default `{{`).
    pub left_delim: String,
    /// Closing delimiter (default `}}`).
    pub right_delim: String,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            variables: HashMap::new(),
            left_delim: "{{".to_string(),
            right_delim: "}}".to_string(),
        }
    }
}

impl TemplateOptions {
    /// Options with the given variables and default delimiters.
    pub fn with_variables<I, S>(variables: I) -> Self
    where
        I: IntoIterator<Item = (S, JsonValue)>,
        S: Into<String>,
    {
        Self {
            variables: variables.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..Self::default()
        }
    }
}

/// Render `source`, substituting every placeholder.
pub fn render(source: &str, options: &TemplateOptions) -> Result<String> {
    let left = options.left_delim.as_str();
    let right = options.right_delim.as_str();
    if left.is_empty() || right.is_empty() {
        return Err(Error::Template("delimiters cannot be empty".to_string()));
    }

    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find(left) {
        out.push_str(&rest[..start]);
        let after_left = &rest[start + left.len()..];
        let Some(end) = after_left.find(right) else {
            let snippet: String = rest[start..].chars().take(20).collect();
            return Err(Error::Template(format!(
                "unterminated placeholder near '{}'",
                snippet
            )));
        };

        let placeholder = after_left[..end].trim();
        out.push_str(&resolve(placeholder, options)?);
        rest = &after_left[end + right.len()..];
    }
    out.push_str(rest);

    Ok(out)
}

fn resolve(placeholder: &str, options: &TemplateOptions) -> Result<String> {
    let (name, fallback) = match placeholder.split_once('|') {
        Some((name, fallback)) => (name.trim(), Some(fallback.trim())),
        None => (placeholder, None),
    };

    if name.is_empty() {
        return Err(Error::Template("empty placeholder".to_string()));
    }

    if let Some(var) = name.strip_prefix("env:") {
        if let Ok(value) = std::env::var(var.trim()) {
            return Ok(value);
        }
    } else if let Some(value) = options.variables.get(name) {
        return Ok(scalar_text(value));
    }

    match fallback {
        Some(fallback) => Ok(fallback.to_string()),
        None => Err(Error::Template(format!(
            "no value for placeholder '{}'",
            name
        ))),
    }
}

/// Substituted text for a variable: strings insert bare, everything else
/// uses its JSON rendering (which matches Lua literal syntax for numbers,
/// booleans and arrays of scalars).
fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Engine {
    /// Render a config file as a template, then execute the result.
    ///
    /// A fresh empty `config` table is published first, so templates can
    /// assign into `config.*` unconditionally.
    pub fn process_template(&self, path: impl AsRef<Path>, options: &TemplateOptions) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }
        let source = std::fs::read_to_string(path)?;
        let rendered = render(&source, options)?;

        self.lua().globals().set("config", self.lua().create_table()?)?;
        self.load_chunk(
            &rendered,
            &format!("@{}", path.display()),
            &path.display().to_string(),
        )
    }
}
