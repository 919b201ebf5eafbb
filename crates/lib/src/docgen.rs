//! Markdown reference generation from a schema.

use std::collections::HashMap;
use std::fmt::Write;

use crate::schema::{Field, Schema};

/// Options for [`generate_docs`].
#[derive(Debug, Default)]
pub struct DocOptions {
    /// Include `**Example:**` lines for fields that declare one.
    pub include_examples: bool,
    /// Overrides for rendered type labels, keyed by the field's declared
    /// `type_name`.
    pub type_descriptions: HashMap<String, String>,
}

/// Render a configuration reference for `schema` as Markdown.
///
/// One `##` section per field; nested schemas recurse with dotted paths.
pub fn generate_docs(schema: &Schema, options: &DocOptions) -> String {
    let mut out = String::from("# Configuration Reference\n\n");
    render_fields(&mut out, schema, "", options);
    out
}

fn render_fields(out: &mut String, schema: &Schema, prefix: &str, options: &DocOptions) {
    for (name, field) in &schema.fields {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };

        let _ = writeln!(out, "## {}\n", path);
        let _ = writeln!(out, "**Type:** `{}`\n", type_label(field, options));

        if let Some(doc) = &field.doc {
            let _ = writeln!(out, "{}\n", doc);
        }

        let rules = rule_lines(field);
        if !rules.is_empty() {
            let _ = writeln!(out, "**Validation:**");
            for rule in rules {
                let _ = writeln!(out, "- {}", rule);
            }
            let _ = writeln!(out);
        }

        if options.include_examples {
            if let Some(example) = &field.example {
                let _ = writeln!(out, "**Example:** `{}`\n", example);
            }
        }

        if let Some(nested) = &field.nested {
            render_fields(out, nested, &path, options);
        }
    }
}

fn type_label(field: &Field, options: &DocOptions) -> String {
    let name = field.type_name.clone().unwrap_or_else(|| inferred_type(field));
    options
        .type_descriptions
        .get(&name)
        .cloned()
        .unwrap_or(name)
}

/// Guess a type label from the declared rules when none was given.
fn inferred_type(field: &Field) -> String {
    if field.nested.is_some() {
        "table".to_string()
    } else if field.range.is_some() {
        "number".to_string()
    } else if field.pattern.is_some() {
        "string".to_string()
    } else {
        "any".to_string()
    }
}

fn rule_lines(field: &Field) -> Vec<String> {
    let mut rules = Vec::new();
    if field.required {
        rules.push("required".to_string());
    }
    if let Some(pattern) = &field.pattern {
        rules.push(format!("must match `{}`", pattern.as_str()));
    }
    if let Some((min, max)) = field.range {
        rules.push(format!("between {} and {}", min, max));
    }
    if field.custom.is_some() {
        rules.push("custom validation".to_string());
    }
    rules
}
