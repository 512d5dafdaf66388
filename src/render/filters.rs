//! Custom filters available to manifest templates
//!
//! - `to_yaml`: re-encode a value as YAML
//! - `nindent`: newline plus indentation, for nesting blocks
//! - `b64enc`: standard base64 encoding, for secret data

use base64::{engine::general_purpose::STANDARD, Engine};
use minijinja::{Error, ErrorKind, Value};

/// Encode a value as YAML with the trailing newline trimmed
///
/// Usage: `{{ proxy.resources | to_yaml | nindent(12) }}`
pub fn to_yaml(value: Value) -> Result<String, Error> {
    serde_yaml::to_string(&value)
        .map(|s| s.trim_end_matches('\n').to_string())
        .map_err(|e| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("yaml encode error: {}", e),
            )
        })
}

/// Start a new line and indent every line of the value by `width` spaces
///
/// Usage: `labels: {{ helpers.labels(name, component) | nindent(4) }}`
pub fn nindent(value: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    let mut out = String::with_capacity(value.len() + width * 4);
    for line in value.lines() {
        out.push('\n');
        if !line.is_empty() {
            out.push_str(&pad);
            out.push_str(line);
        }
    }
    out
}

/// Base64 encode filter
///
/// Numbers are encoded by their decimal representation.
///
/// Usage: `{{ proxy.http_proxy.password | b64enc }}`
pub fn b64enc(value: Value) -> Result<String, Error> {
    if value.is_undefined() || value.is_none() {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "cannot base64 encode a missing value",
        ));
    }
    Ok(STANDARD.encode(value.to_string().as_bytes()))
}
