//! MOTD flattening.
//!
//! A server description is either a legacy string with `§` formatting codes
//! or a chat component (`{"text": ..., "extra": [...]}`), possibly nested.

use serde_json::Value;

/// Flattens a description into a single line of plain text.
pub fn flatten(description: &Value) -> String {
    let mut raw = String::new();
    collect(description, &mut raw);
    let stripped = strip_formatting(&raw);
    stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect(value: &Value, out: &mut String) {
    match value {
        Value::String(text) => out.push_str(text),
        Value::Array(parts) => parts.iter().for_each(|part| collect(part, out)),
        Value::Object(component) => {
            if let Some(text) = component.get("text") {
                collect(text, out);
            }
            if let Some(extra) = component.get("extra") {
                collect(extra, out);
            }
        }
        _ => {}
    }
}

/// Removes `§x` formatting codes.
pub fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}
