//! Panic-free JSON encoding for wire envelopes.

use serde_json::Value;

/// Nesting beyond this depth is treated as a self-referencing structure.
const MAX_DEPTH: usize = 64;

/// Largest integer JavaScript can represent exactly (2^53 - 1).
const JS_SAFE_INT: u64 = 9_007_199_254_740_991;

/// Encode a value, degrading instead of failing: subtrees nested deeper
/// than the cap become the literal string `"[Circular]"`, and integers
/// outside the ±2^53 safe range become decimal strings. Timestamps are
/// expected to already be ISO-8601 strings (chrono's serde form).
pub fn encode(value: &Value) -> String {
    let mut out = String::with_capacity(128);
    write_value(&mut out, value, 0);
    out
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    if depth > MAX_DEPTH {
        out.push_str("\"[Circular]\"");
        return;
    }

    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(number) => write_number(out, number),
        Value::String(text) => write_escaped(out, text),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item, depth + 1);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(out, key);
                out.push(':');
                write_value(out, item, depth + 1);
            }
            out.push('}');
        }
    }
}

fn write_number(out: &mut String, number: &serde_json::Number) {
    if let Some(i) = number.as_i64() {
        if i.unsigned_abs() > JS_SAFE_INT {
            out.push('"');
            out.push_str(&i.to_string());
            out.push('"');
        } else {
            out.push_str(&i.to_string());
        }
    } else if let Some(u) = number.as_u64() {
        if u > JS_SAFE_INT {
            out.push('"');
            out.push_str(&u.to_string());
            out.push('"');
        } else {
            out.push_str(&u.to_string());
        }
    } else {
        // Finite f64; serde_json's Display form is valid JSON.
        out.push_str(&number.to_string());
    }
}

fn write_escaped(out: &mut String, text: &str) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if (ch as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", ch as u32));
            }
            ch => out.push(ch),
        }
    }
    out.push('"');
}
