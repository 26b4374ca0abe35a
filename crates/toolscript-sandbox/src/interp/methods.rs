//! Methods of the built-in types.
//!
//! The tables below are the complete attribute surface the default guard
//! exposes on values; anything else is an `AttributeError`.

use std::rc::Rc;

use super::builtins::{dict_update, sort_values, Args};
use super::collections::{counter_method, is_counter_method, COUNTER_METHODS};
use super::eval::Interpreter;
use super::fault::{ExcKind, Fault};
use super::format::{format_value, repr, repr_within, to_str_within};
use super::guards::{key_error, normalize_index};
use super::ops::{check_len, py_eq};
use super::temporal::{self, DATETIME_METHODS, DATE_METHODS, TIMEDELTA_METHODS};
use super::value::{Dict, MatchValue, TypeKind, Value};

const STR_METHODS: &[&str] = &[
    "lower", "upper", "strip", "lstrip", "rstrip", "split", "rsplit", "join", "replace",
    "startswith", "endswith", "find", "rfind", "index", "count", "format", "title",
    "capitalize", "isdigit", "isalpha", "isalnum", "isspace", "islower", "isupper",
    "splitlines", "zfill", "ljust", "rjust", "center", "removeprefix", "removesuffix",
];

const LIST_METHODS: &[&str] = &[
    "append", "extend", "insert", "pop", "remove", "index", "count", "sort", "reverse", "copy",
    "clear",
];

const DICT_METHODS: &[&str] = &[
    "get", "keys", "values", "items", "pop", "setdefault", "update", "copy", "clear",
];

const TUPLE_METHODS: &[&str] = &["index", "count"];

const MATCH_METHODS: &[&str] = &["group", "groups", "groupdict", "span", "start", "end"];

pub fn method_names(kind: TypeKind) -> &'static [&'static str] {
    match kind {
        TypeKind::Str => STR_METHODS,
        TypeKind::List => LIST_METHODS,
        TypeKind::Dict => DICT_METHODS,
        TypeKind::Tuple => TUPLE_METHODS,
        TypeKind::Match => MATCH_METHODS,
        TypeKind::DateTime => DATETIME_METHODS,
        TypeKind::Date => DATE_METHODS,
        TypeKind::TimeDelta => TIMEDELTA_METHODS,
        _ => &[],
    }
}

/// Resolve `name` against the method table of `kind`.
pub fn lookup_method(kind: TypeKind, name: &str) -> Option<&'static str> {
    method_names(kind).iter().copied().find(|m| *m == name)
}

/// Like [`lookup_method`], plus the extra methods of a `Counter`.
pub fn lookup_value_method(value: &Value, name: &str) -> Option<&'static str> {
    if let Value::Dict(d) = value {
        let counter = d.try_borrow().map(|d| d.is_counter()).unwrap_or(false);
        if counter {
            if let Some(m) = COUNTER_METHODS.iter().copied().find(|m| *m == name) {
                return Some(m);
            }
        }
    }
    lookup_method(value.type_kind(), name)
}

pub fn call_method(
    interp: &mut Interpreter,
    receiver: &Value,
    name: &'static str,
    args: Args,
) -> Result<Value, Fault> {
    match receiver {
        Value::Str(s) => str_method(interp, s, name, args),
        Value::List(_) => list_method(interp, receiver, name, args),
        Value::Dict(d) if is_counter_method(name) && d.borrow().is_counter() => {
            counter_method(interp, d, name, args)
        }
        Value::Dict(_) => dict_method(interp, receiver, name, args),
        Value::Temporal(t) => temporal::call_method(t, name, args),
        Value::Tuple(t) => seq_method(name, t, args, "tuple"),
        Value::Match(m) => match_method(m, name, args),
        other => Err(Fault::attribute_error(format!(
            "'{}' object has no attribute '{}'",
            other.type_name(),
            name
        ))),
    }
}

fn strip_set(args: &Args) -> Result<Option<Vec<char>>, Fault> {
    match args.arg(0) {
        None | Some(Value::None) => Ok(None),
        Some(v) => Ok(Some(v.expect_str("strip arg")?.chars().collect())),
    }
}

/// Prefix test argument: a string or a tuple of strings.
fn affixes(v: &Value, method: &str) -> Result<Vec<Rc<str>>, Fault> {
    match v {
        Value::Str(s) => Ok(vec![s.clone()]),
        Value::Tuple(items) => items.iter().map(|i| i.expect_str(method)).collect(),
        other => Err(Fault::type_error(format!(
            "{} first arg must be str or a tuple of str, not {}",
            method,
            other.type_name()
        ))),
    }
}

fn char_index(s: &str, byte: usize) -> i64 {
    s[..byte].chars().count() as i64
}

fn pad_arg(args: &Args) -> Result<(usize, char), Fault> {
    let width = args.arg(0).map(|v| v.expect_int("width")).transpose()?.unwrap_or(0);
    let fill = match args.arg(1) {
        Some(v) => {
            let s = v.expect_str("fill character")?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(Fault::type_error(
                        "The fill character must be exactly one character long",
                    ))
                }
            }
        }
        None => ' ',
    };
    Ok((width.max(0) as usize, fill))
}

fn str_method(interp: &mut Interpreter, s: &Rc<str>, name: &str, mut args: Args) -> Result<Value, Fault> {
    let out = |t: String| -> Result<Value, Fault> { Ok(Value::string(t)) };
    match name {
        "lower" | "upper" | "title" | "capitalize" | "isdigit" | "isalpha" | "isalnum"
        | "isspace" | "islower" | "isupper" | "splitlines" => {
            args.finish()?;
            args.count(0, 0)?;
            let nonempty = !s.is_empty();
            match name {
                "lower" => out(s.to_lowercase()),
                "upper" => out(s.to_uppercase()),
                "title" => out(title_case(s)),
                "capitalize" => {
                    let mut chars = s.chars();
                    out(match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
                        None => String::new(),
                    })
                }
                "isdigit" => Ok(Value::Bool(nonempty && s.chars().all(|c| c.is_ascii_digit()))),
                "isalpha" => Ok(Value::Bool(nonempty && s.chars().all(char::is_alphabetic))),
                "isalnum" => Ok(Value::Bool(nonempty && s.chars().all(char::is_alphanumeric))),
                "isspace" => Ok(Value::Bool(nonempty && s.chars().all(char::is_whitespace))),
                "islower" => Ok(Value::Bool(
                    s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase),
                )),
                "isupper" => Ok(Value::Bool(
                    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase),
                )),
                _ => {
                    let lines: Vec<Value> = s.lines().map(Value::str).collect();
                    Ok(Value::list(lines))
                }
            }
        }
        "strip" | "lstrip" | "rstrip" => {
            args.finish()?;
            args.count(0, 1)?;
            let set = strip_set(&args)?;
            let pred = |c: char| match &set {
                Some(chars) => chars.contains(&c),
                None => c.is_whitespace(),
            };
            out(match name {
                "strip" => s.trim_matches(pred),
                "lstrip" => s.trim_start_matches(pred),
                _ => s.trim_end_matches(pred),
            }
            .to_string())
        }
        "split" | "rsplit" => {
            let sep = args.take(0, "sep");
            let maxsplit = args.take(1, "maxsplit");
            args.finish()?;
            args.count(0, 2)?;
            let maxsplit = maxsplit.map(|v| v.expect_int("maxsplit")).transpose()?.unwrap_or(-1);
            let limit = if maxsplit < 0 { usize::MAX } else { maxsplit as usize };
            let parts = match sep {
                None | Some(Value::None) => split_whitespace(s, limit, name == "rsplit"),
                Some(sep) => {
                    let sep = sep.expect_str("separator")?;
                    if sep.is_empty() {
                        return Err(Fault::value_error("empty separator"));
                    }
                    if name == "rsplit" {
                        let mut parts: Vec<String> =
                            s.rsplitn(limit.saturating_add(1), &*sep).map(str::to_string).collect();
                        parts.reverse();
                        parts
                    } else {
                        s.splitn(limit.saturating_add(1), &*sep).map(str::to_string).collect()
                    }
                }
            };
            interp.check_len(parts.len())?;
            Ok(Value::list(parts.into_iter().map(Value::string).collect()))
        }
        "join" => {
            args.finish()?;
            args.count(1, 1)?;
            let items = interp.collect(&args.pos[0])?;
            let mut total = 0usize;
            for (i, item) in items.iter().enumerate() {
                let Value::Str(p) = item else {
                    return Err(Fault::type_error(format!(
                        "sequence item {}: expected str instance, {} found",
                        i,
                        item.type_name()
                    )));
                };
                let sep_len = if i > 0 { s.len() } else { 0 };
                total = total
                    .checked_add(p.len())
                    .and_then(|t| t.checked_add(sep_len))
                    .unwrap_or(usize::MAX);
            }
            interp.check_len(total)?;
            let mut joined = String::with_capacity(total);
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    joined.push_str(s);
                }
                if let Value::Str(p) = item {
                    joined.push_str(p);
                }
            }
            out(joined)
        }
        "replace" => {
            args.finish()?;
            args.count(2, 3)?;
            let old = args.pos[0].expect_str("replace() argument 1")?;
            let new = args.pos[1].expect_str("replace() argument 2")?;
            let count = args.arg(2).map(|v| v.expect_int("count")).transpose()?.unwrap_or(-1);
            let replaced = if count < 0 {
                s.replace(&*old, &new)
            } else {
                s.replacen(&*old, &new, count as usize)
            };
            interp.check_len(replaced.len())?;
            out(replaced)
        }
        "startswith" | "endswith" => {
            args.finish()?;
            args.count(1, 1)?;
            let candidates = affixes(&args.pos[0], name)?;
            let hit = candidates.iter().any(|a| {
                if name == "startswith" {
                    s.starts_with(&**a)
                } else {
                    s.ends_with(&**a)
                }
            });
            Ok(Value::Bool(hit))
        }
        "find" | "rfind" | "index" => {
            args.finish()?;
            args.count(1, 1)?;
            let sub = args.pos[0].expect_str("substring")?;
            let found = if name == "rfind" { s.rfind(&*sub) } else { s.find(&*sub) };
            match found {
                Some(b) => Ok(Value::Int(char_index(s, b))),
                None if name == "index" => Err(Fault::value_error("substring not found")),
                None => Ok(Value::Int(-1)),
            }
        }
        "count" => {
            args.finish()?;
            args.count(1, 1)?;
            let sub = args.pos[0].expect_str("substring")?;
            let n = if sub.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(&*sub).count()
            };
            Ok(Value::Int(n as i64))
        }
        "format" => {
            let text = str_format(s, &args.pos, &args.kw, interp.cap())?;
            interp.check_len(text.len())?;
            out(text)
        }
        "zfill" => {
            args.finish()?;
            args.count(1, 1)?;
            let width = args.pos[0].expect_int("width")?.max(0) as usize;
            let len = s.chars().count();
            if len >= width {
                return out(s.to_string());
            }
            interp.check_len(width)?;
            let (sign, digits) = match s.chars().next() {
                Some(c @ ('+' | '-')) => (c.to_string(), &s[1..]),
                _ => (String::new(), &s[..]),
            };
            out(format!("{}{}{}", sign, "0".repeat(width - len), digits))
        }
        "ljust" | "rjust" | "center" => {
            args.finish()?;
            args.count(1, 2)?;
            let (width, fill) = pad_arg(&args)?;
            let len = s.chars().count();
            if len >= width {
                return out(s.to_string());
            }
            interp.check_len(width)?;
            let gap = width - len;
            let pad = |n: usize| fill.to_string().repeat(n);
            out(match name {
                "ljust" => format!("{}{}", s, pad(gap)),
                "rjust" => format!("{}{}", pad(gap), s),
                _ => {
                    let left = gap / 2 + (gap & width & 1);
                    format!("{}{}{}", pad(left), s, pad(gap - left))
                }
            })
        }
        "removeprefix" | "removesuffix" => {
            args.finish()?;
            args.count(1, 1)?;
            let affix = args.pos[0].expect_str(name)?;
            let stripped = if name == "removeprefix" {
                s.strip_prefix(&*affix)
            } else {
                s.strip_suffix(&*affix)
            };
            out(stripped.unwrap_or(s).to_string())
        }
        _ => Err(Fault::attribute_error(format!(
            "'str' object has no attribute '{}'",
            name
        ))),
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_cased = true;
        } else {
            out.push(c);
            prev_cased = false;
        }
    }
    out
}

fn split_whitespace(s: &str, limit: usize, from_right: bool) -> Vec<String> {
    if limit == usize::MAX {
        return s.split_whitespace().map(str::to_string).collect();
    }
    let mut parts = Vec::new();
    if from_right {
        let mut rest = s.trim_end();
        while parts.len() < limit {
            let Some(pos) = rest.rfind(char::is_whitespace) else { break };
            let word = &rest[pos..];
            parts.push(word.trim_start().to_string());
            rest = rest[..pos].trim_end();
            if rest.is_empty() {
                break;
            }
        }
        if !rest.is_empty() {
            parts.push(rest.to_string());
        }
        parts.retain(|p| !p.is_empty());
        parts.reverse();
    } else {
        let mut rest = s.trim_start();
        while parts.len() < limit {
            let Some(pos) = rest.find(char::is_whitespace) else { break };
            parts.push(rest[..pos].to_string());
            rest = rest[pos..].trim_start();
            if rest.is_empty() {
                break;
            }
        }
        if !rest.is_empty() {
            parts.push(rest.to_string());
        }
    }
    parts
}

/// `str.format`: `{}`, `{0}`, `{name}`, conversions `!r`/`!s` and format specs.
pub fn str_format(template: &str, pos: &[Value], kw: &[(String, Value)], cap: usize) -> Result<String, Fault> {
    let mut out = String::with_capacity(template.len());
    let mut auto = 0usize;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(Fault::value_error(
                    "Single '}' encountered in format string",
                ))
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for d in chars.by_ref() {
                    if d == '}' {
                        closed = true;
                        break;
                    }
                    field.push(d);
                }
                if !closed {
                    return Err(Fault::value_error(
                        "Single '{' encountered in format string",
                    ));
                }
                let (head, spec) = match field.split_once(':') {
                    Some((h, s)) => (h.to_string(), s.to_string()),
                    None => (field.clone(), String::new()),
                };
                let (key, conversion) = match head.split_once('!') {
                    Some((k, c)) => (k.to_string(), Some(c.to_string())),
                    None => (head, None),
                };
                let value = if key.is_empty() {
                    let v = pos.get(auto).cloned().ok_or_else(|| {
                        Fault::index_error(format!(
                            "Replacement index {} out of range for positional args tuple",
                            auto
                        ))
                    })?;
                    auto += 1;
                    v
                } else if let Ok(i) = key.parse::<usize>() {
                    pos.get(i).cloned().ok_or_else(|| {
                        Fault::index_error(format!(
                            "Replacement index {} out of range for positional args tuple",
                            i
                        ))
                    })?
                } else {
                    kw.iter()
                        .find(|(k, _)| *k == key)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| Fault::new(ExcKind::KeyError, repr(&Value::str(&key))))?
                };
                let value = match conversion.as_deref() {
                    None => value,
                    Some("r") => Value::string(repr_within(&value, cap)?),
                    Some("s") => Value::string(to_str_within(&value, cap)?),
                    Some(other) => {
                        return Err(Fault::value_error(format!(
                            "Unknown conversion specifier {}",
                            other
                        )))
                    }
                };
                if spec.is_empty() {
                    out.push_str(&to_str_within(&value, cap)?);
                } else {
                    out.push_str(&format_value(&value, &spec)?);
                }
                check_len(out.len(), cap)?;
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn list_method(interp: &mut Interpreter, receiver: &Value, name: &str, mut args: Args) -> Result<Value, Fault> {
    let Value::List(list) = receiver else {
        return Err(Fault::type_error("list method called on non-list"));
    };
    match name {
        "append" => {
            args.finish()?;
            args.count(1, 1)?;
            interp.check_len(list.borrow().len() + 1)?;
            list.borrow_mut().push(args.pos[0].clone());
            Ok(Value::None)
        }
        "extend" => {
            args.finish()?;
            args.count(1, 1)?;
            let items = interp.collect(&args.pos[0])?;
            interp.check_len(list.borrow().len() + items.len())?;
            list.borrow_mut().extend(items);
            Ok(Value::None)
        }
        "insert" => {
            args.finish()?;
            args.count(2, 2)?;
            let i = args.pos[0].expect_int("insert index")?;
            let mut items = list.borrow_mut();
            interp.check_len(items.len() + 1)?;
            let len = items.len() as i64;
            let idx = if i < 0 { (i + len).max(0) } else { i.min(len) };
            items.insert(idx as usize, args.pos[1].clone());
            Ok(Value::None)
        }
        "pop" => {
            args.finish()?;
            args.count(0, 1)?;
            let mut items = list.borrow_mut();
            if items.is_empty() {
                return Err(Fault::index_error("pop from empty list"));
            }
            let i = args.arg(0).map(|v| v.expect_int("pop index")).transpose()?.unwrap_or(-1);
            let len = items.len();
            match normalize_index(i, len) {
                Some(idx) => Ok(items.remove(idx)),
                None => Err(Fault::index_error("pop index out of range")),
            }
        }
        "remove" => {
            args.finish()?;
            args.count(1, 1)?;
            let snapshot = list.borrow().clone();
            for (i, item) in snapshot.iter().enumerate() {
                if py_eq(item, &args.pos[0])? {
                    let mut items = list.borrow_mut();
                    if i < items.len() {
                        items.remove(i);
                    }
                    return Ok(Value::None);
                }
            }
            Err(Fault::value_error("list.remove(x): x not in list"))
        }
        "sort" => {
            let key = args.kwarg("key").filter(|v| !matches!(v, Value::None));
            let reverse = args.kwarg("reverse").map(|v| v.truthy()).unwrap_or(false);
            args.finish()?;
            args.count(0, 0)?;
            let items = list.borrow().clone();
            let sorted = sort_values(interp, items, key.as_ref(), reverse)?;
            *list.borrow_mut() = sorted;
            Ok(Value::None)
        }
        "reverse" => {
            args.finish()?;
            args.count(0, 0)?;
            list.borrow_mut().reverse();
            Ok(Value::None)
        }
        "copy" => {
            args.finish()?;
            args.count(0, 0)?;
            Ok(Value::list(list.borrow().clone()))
        }
        "clear" => {
            args.finish()?;
            args.count(0, 0)?;
            let drained: Vec<Value> = list.borrow_mut().drain(..).collect();
            drop(drained);
            Ok(Value::None)
        }
        _ => {
            let snapshot = list.borrow().clone();
            seq_method(name, &snapshot, args, "list")
        }
    }
}

/// `index` and `count`, shared by lists and tuples.
fn seq_method(name: &str, items: &[Value], args: Args, type_name: &str) -> Result<Value, Fault> {
    args.finish()?;
    match name {
        "count" => {
            args.count(1, 1)?;
            let mut n = 0;
            for item in items {
                if py_eq(item, &args.pos[0])? {
                    n += 1;
                }
            }
            Ok(Value::Int(n))
        }
        "index" => {
            args.count(1, 1)?;
            for (i, item) in items.iter().enumerate() {
                if py_eq(item, &args.pos[0])? {
                    return Ok(Value::Int(i as i64));
                }
            }
            Err(Fault::value_error(format!(
                "{}.index(x): x not in {}",
                type_name, type_name
            )))
        }
        _ => Err(Fault::attribute_error(format!(
            "'{}' object has no attribute '{}'",
            type_name, name
        ))),
    }
}

fn dict_method(interp: &mut Interpreter, receiver: &Value, name: &str, mut args: Args) -> Result<Value, Fault> {
    let Value::Dict(dict) = receiver else {
        return Err(Fault::type_error("dict method called on non-dict"));
    };
    match name {
        "get" => {
            args.finish()?;
            args.count(1, 2)?;
            let found = dict.borrow().get(&args.pos[0])?;
            Ok(found.or_else(|| args.arg(1).cloned()).unwrap_or(Value::None))
        }
        "keys" | "values" | "items" => {
            args.finish()?;
            args.count(0, 0)?;
            let d = dict.borrow();
            Ok(Value::list(match name {
                "keys" => d.keys(),
                "values" => d.values(),
                _ => d
                    .items()
                    .into_iter()
                    .map(|(k, v)| Value::tuple(vec![k, v]))
                    .collect(),
            }))
        }
        "pop" => {
            args.finish()?;
            args.count(1, 2)?;
            let removed = dict.borrow_mut().remove(&args.pos[0])?;
            match (removed, args.arg(1)) {
                (Some(v), _) => Ok(v),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(key_error(&args.pos[0])),
            }
        }
        "setdefault" => {
            args.finish()?;
            args.count(1, 2)?;
            let key = args.pos[0].clone();
            if let Some(v) = dict.borrow().get(&key)? {
                return Ok(v);
            }
            let default = args.arg(1).cloned().unwrap_or(Value::None);
            interp.check_len(dict.borrow().len() + 1)?;
            dict.borrow_mut().insert(key, default.clone())?;
            Ok(default)
        }
        "update" => {
            args.count(0, 1)?;
            let mut updated = dict.borrow().clone();
            if let Some(source) = args.arg(0).cloned() {
                dict_update(interp, &mut updated, &source)?;
            }
            for (k, v) in std::mem::take(&mut args.kw) {
                updated.insert(Value::string(k), v)?;
            }
            interp.check_len(updated.len())?;
            *dict.borrow_mut() = updated;
            Ok(Value::None)
        }
        "copy" => {
            args.finish()?;
            args.count(0, 0)?;
            Ok(Value::dict(dict.borrow().clone()))
        }
        "clear" => {
            args.finish()?;
            args.count(0, 0)?;
            let drained = dict.borrow_mut().take_entries();
            drop(drained);
            Ok(Value::None)
        }
        _ => Err(Fault::attribute_error(format!(
            "'dict' object has no attribute '{}'",
            name
        ))),
    }
}

fn match_method(m: &Rc<MatchValue>, name: &str, mut args: Args) -> Result<Value, Fault> {
    match name {
        "group" => {
            args.finish()?;
            match args.pos.len() {
                0 => m.group(0),
                1 => m.group(m.group_index(&args.pos[0])?),
                _ => {
                    let groups = args
                        .pos
                        .iter()
                        .map(|k| m.group_index(k).and_then(|i| m.group(i)))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::tuple(groups))
                }
            }
        }
        "groups" => {
            let default = args.take(0, "default").unwrap_or(Value::None);
            args.finish()?;
            let groups = (1..m.spans.len())
                .map(|i| match m.group(i)? {
                    Value::None => Ok(default.clone()),
                    v => Ok(v),
                })
                .collect::<Result<Vec<_>, Fault>>()?;
            Ok(Value::tuple(groups))
        }
        "groupdict" => {
            args.finish()?;
            args.count(0, 0)?;
            let mut d = Dict::new();
            for (i, n) in m.names.iter().enumerate() {
                if let Some(n) = n {
                    d.insert(Value::str(n), m.group(i)?)?;
                }
            }
            Ok(Value::dict(d))
        }
        "span" | "start" | "end" => {
            args.finish()?;
            args.count(0, 1)?;
            let idx = match args.arg(0) {
                Some(k) => m.group_index(k)?,
                None => 0,
            };
            let (start, end) = m.char_span(idx)?;
            Ok(match name {
                "span" => Value::tuple(vec![Value::Int(start), Value::Int(end)]),
                "start" => Value::Int(start),
                _ => Value::Int(end),
            })
        }
        _ => Err(Fault::attribute_error(format!(
            "'re.Match' object has no attribute '{}'",
            name
        ))),
    }
}
