//! Conversion between program values and `serde_json::Value`.
//!
//! Everything that crosses the session boundary (capability arguments and
//! results, the extracted `result`) goes through here.

use serde_json::{Map, Number, Value as Json};

use super::fault::Fault;
use super::format::{float_repr, repr};
use super::value::{Dict, Value};

const MAX_DEPTH: usize = 200;

/// Strict conversion: non-serializable values are a `TypeError`.
pub fn to_json(value: &Value) -> Result<Json, Fault> {
    convert(value, 0, true)
}

/// Lenient conversion used for result extraction: values with no JSON form
/// are rendered with `repr()` instead of failing the execution.
pub fn to_json_lossy(value: &Value) -> Json {
    convert(value, 0, false).unwrap_or_else(|_| Json::String(repr(value)))
}

fn convert(value: &Value, depth: usize, strict: bool) -> Result<Json, Fault> {
    if depth > MAX_DEPTH {
        return Err(Fault::value_error("Circular reference detected"));
    }
    Ok(match value {
        Value::None => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => match Number::from_f64(*f) {
            Some(n) => Json::Number(n),
            None if strict => {
                return Err(Fault::value_error(
                    "Out of range float values are not JSON compliant",
                ))
            }
            None => Json::Null,
        },
        Value::Str(s) => Json::String(s.to_string()),
        Value::List(l) => {
            let items = l.borrow().clone();
            seq(&items, depth, strict)?
        }
        Value::Tuple(t) => seq(t, depth, strict)?,
        Value::Dict(d) => {
            let d = d.borrow().clone();
            object(&d, depth, strict)?
        }
        Value::Temporal(t) if !strict => Json::String(t.display()),
        other if strict => {
            return Err(Fault::type_error(format!(
                "Object of type {} is not JSON serializable",
                other.type_name()
            )))
        }
        other => Json::String(repr(other)),
    })
}

fn seq(items: &[Value], depth: usize, strict: bool) -> Result<Json, Fault> {
    items
        .iter()
        .map(|v| convert(v, depth + 1, strict))
        .collect::<Result<Vec<_>, _>>()
        .map(Json::Array)
}

fn object(d: &Dict, depth: usize, strict: bool) -> Result<Json, Fault> {
    let mut map = Map::new();
    for (k, v) in d.iter() {
        let key = match k {
            Value::Str(s) => s.to_string(),
            Value::None => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => float_repr(*f),
            other if strict => {
                return Err(Fault::type_error(format!(
                    "keys must be str, int, float, bool or None, not {}",
                    other.type_name()
                )))
            }
            other => repr(other),
        };
        map.insert(key, convert(v, depth + 1, strict)?);
    }
    Ok(Json::Object(map))
}

pub fn from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::None,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::str(s),
        Json::Array(items) => Value::list(items.iter().map(from_json).collect()),
        Json::Object(map) => {
            let mut d = Dict::new();
            for (k, v) in map {
                // String keys always hash.
                let _ = d.insert(Value::str(k), from_json(v));
            }
            Value::dict(d)
        }
    }
}

/// Render JSON text with the spacing and escaping of `json.dumps`.
pub fn dumps(json: &Json, indent: Option<usize>, sort_keys: bool) -> String {
    let mut out = String::new();
    write_json(json, &mut out, indent, sort_keys, 0);
    out
}

fn newline(out: &mut String, indent: Option<usize>, level: usize) {
    if let Some(width) = indent {
        out.push('\n');
        out.push_str(&" ".repeat(width * level));
    }
}

fn write_json(json: &Json, out: &mut String, indent: Option<usize>, sort_keys: bool, level: usize) {
    let item_sep = if indent.is_some() { "," } else { ", " };
    match json {
        Json::Null => out.push_str("null"),
        Json::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Json::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => out.push_str(&i.to_string()),
            (None, Some(u)) => out.push_str(&u.to_string()),
            _ => out.push_str(&float_repr(n.as_f64().unwrap_or(f64::NAN))),
        },
        Json::String(s) => write_escaped(s, out),
        Json::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(item_sep);
                }
                newline(out, indent, level + 1);
                write_json(item, out, indent, sort_keys, level + 1);
            }
            newline(out, indent, level);
            out.push(']');
        }
        Json::Object(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return;
            }
            let mut entries: Vec<(&String, &Json)> = map.iter().collect();
            if sort_keys {
                entries.sort_by(|a, b| a.0.cmp(b.0));
            }
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(item_sep);
                }
                newline(out, indent, level + 1);
                write_escaped(k, out);
                out.push_str(": ");
                write_json(v, out, indent, sort_keys, level + 1);
            }
            newline(out, indent, level);
            out.push('}');
        }
    }
}

/// ASCII-only escaping, as `json.dumps` does by default.
fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 || (c as u32) > 0x7f => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_structures_convert() {
        let mut d = Dict::new();
        d.insert(Value::str("a"), Value::Int(3)).unwrap();
        d.insert(
            Value::str("b"),
            Value::tuple(vec![Value::Float(1.5), Value::None, Value::Bool(true)]),
        )
        .unwrap();
        assert_eq!(
            to_json(&Value::dict(d)).unwrap(),
            json!({"a": 3, "b": [1.5, null, true]})
        );
    }

    #[test]
    fn test_non_string_keys_are_stringified() {
        let mut d = Dict::new();
        d.insert(Value::Int(1), Value::str("x")).unwrap();
        d.insert(Value::None, Value::str("y")).unwrap();
        assert_eq!(to_json(&Value::dict(d)).unwrap(), json!({"1": "x", "null": "y"}));
    }

    #[test]
    fn test_strict_rejects_functions_lossy_renders_them() {
        let v = Value::Range(super::super::value::RangeValue {
            start: 0,
            stop: 3,
            step: 1,
        });
        let err = to_json(&v).unwrap_err();
        assert_eq!(err.message, "Object of type range is not JSON serializable");
        assert_eq!(to_json_lossy(&v), json!("range(0, 3)"));
    }

    #[test]
    fn test_from_json_preserves_key_order() {
        let v = from_json(&json!({"z": 1, "a": [1, 2.5, "s"]}));
        assert_eq!(format!("{:?}", v), "{'z': 1, 'a': [1, 2.5, 's']}");
    }

    #[test]
    fn test_dumps_matches_default_separators() {
        let j = json!({"a": [1, 2], "b": {"c": null}, "d": "é"});
        assert_eq!(
            dumps(&j, None, false),
            r#"{"a": [1, 2], "b": {"c": null}, "d": "\u00e9"}"#
        );
    }

    #[test]
    fn test_dumps_indent_and_sort() {
        let j = json!({"b": 1, "a": [true]});
        assert_eq!(
            dumps(&j, Some(2), true),
            "{\n  \"a\": [\n    true\n  ],\n  \"b\": 1\n}"
        );
    }
}
