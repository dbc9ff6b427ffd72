//! Helpers for the embedded-JSON column.
//!
//! The upstream extracts are sloppy: trailing commas appear before closing
//! brackets and property names vary in casing between file revisions. Both
//! are tolerated here; anything else malformed skips the row.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::error::SkipReason;
use crate::fields::clean_text;

/// Decode one embedded JSON cell into its array items. An empty cell is an
/// empty list (the caller's empty-children check handles it); malformed
/// JSON is a row skip. Non-object entries are dropped like any other
/// invalid line item.
pub(crate) fn decode_items(raw: &str) -> Result<Vec<Map<String, Value>>, SkipReason> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let normalized = strip_trailing_commas(raw);
    let value: Value = serde_json::from_str(&normalized).map_err(|_| SkipReason::BadJson)?;
    let Value::Array(items) = value else {
        return Err(SkipReason::BadJson);
    };
    let mut objects = Vec::with_capacity(items.len());
    for item in items {
        if let Value::Object(obj) = item {
            objects.push(obj);
        }
    }
    Ok(objects)
}

/// Remove commas that directly precede `]` or `}` outside string literals.
fn strip_trailing_commas(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let mut ws = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() {
                        ws.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if !matches!(chars.peek(), Some(']') | Some('}')) {
                    out.push(',');
                }
                out.push_str(&ws);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Case-insensitive object field lookup.
pub(crate) fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).or_else(|| {
        obj.iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(key).then_some(v))
    })
}

/// Decimal parse with scientific-notation fallback, shared with the price
/// column.
pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .ok()
        .or_else(|| Decimal::from_scientific(raw).ok())
}

pub(crate) fn decimal_field(obj: &Map<String, Value>, key: &str) -> Option<Decimal> {
    match field(obj, key)? {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

pub(crate) fn int_field(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    match field(obj, key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match field(obj, key)? {
        Value::String(s) => Some(clean_text(s).to_string()),
        _ => None,
    }
}
