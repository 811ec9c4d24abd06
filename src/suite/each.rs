//! Title formatting for table-driven tests.
//!
//! Placeholders: `%s` string, `%d`/`%i` integer, `%f` float, `%j`/`%o`
//! JSON, `%#` row index, `%%` literal percent. When a row serializes to an
//! array, each placeholder consumes the next element; otherwise the whole
//! row fills the first placeholder.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;

fn placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"%[sdifjo#%]").expect("placeholder pattern is valid"))
}

/// Expand `template` for one table row.
pub fn format_title<T: Serialize>(template: &str, row: &T, index: usize) -> String {
    let args = match serde_json::to_value(row) {
        Ok(Value::Array(items)) => items,
        Ok(other) => vec![other],
        Err(_) => Vec::new(),
    };
    let mut args = args.into_iter();

    placeholder()
        .replace_all(template, |caps: &Captures<'_>| match &caps[0] {
            "%%" => "%".to_string(),
            "%#" => index.to_string(),
            token => match args.next() {
                Some(value) => render(token, &value),
                None => token.to_string(),
            },
        })
        .into_owned()
}

fn render(token: &str, value: &Value) -> String {
    match token {
        "%s" => match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
        "%d" | "%i" => value
            .as_f64()
            .map(|n| (n.trunc() as i64).to_string())
            .unwrap_or_else(|| "NaN".to_string()),
        "%f" => value
            .as_f64()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "NaN".to_string()),
        _ => value.to_string(),
    }
}
