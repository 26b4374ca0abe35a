//! Text rendering of values: `str()`, `repr()`, format specs and `%` formatting.

use super::fault::Fault;
use super::ops::check_len;
use super::value::{Dict, MissingKey, Value};

const MAX_REPR_DEPTH: usize = 64;

/// `str(value)`
pub fn to_str(value: &Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        Value::Exception(e) => e.message.clone(),
        Value::Temporal(t) => t.display(),
        other => repr(other),
    }
}

/// `repr(value)`
pub fn repr(value: &Value) -> String {
    let mut out = Rendered::new(usize::MAX);
    write_repr(value, &mut out, 0);
    out.buf
}

/// `str(value)` for program-visible text: a rendering longer than `cap`
/// bytes is a MemoryError, raised before the rest of the value is visited.
pub fn to_str_within(value: &Value, cap: usize) -> Result<String, Fault> {
    match value {
        Value::Str(_) | Value::Exception(_) | Value::Temporal(_) => {
            let text = to_str(value);
            check_len(text.len(), cap)?;
            Ok(text)
        }
        other => repr_within(other, cap),
    }
}

/// `repr(value)` bounded by `cap` bytes.
pub fn repr_within(value: &Value, cap: usize) -> Result<String, Fault> {
    let mut out = Rendered::new(cap);
    write_repr(value, &mut out, 0);
    if out.full {
        return Err(Fault::memory(format!(
            "rendered text exceeds the limit of {} bytes",
            cap
        )));
    }
    Ok(out.buf)
}

/// Output buffer that stops accepting text once `cap` bytes are written.
struct Rendered {
    buf: String,
    cap: usize,
    full: bool,
}

impl Rendered {
    fn new(cap: usize) -> Self {
        Self {
            buf: String::new(),
            cap,
            full: false,
        }
    }

    fn push_str(&mut self, s: &str) {
        if self.full {
            return;
        }
        if self.buf.len().saturating_add(s.len()) > self.cap {
            self.full = true;
            return;
        }
        self.buf.push_str(s);
    }

    fn push(&mut self, c: char) {
        let mut tmp = [0u8; 4];
        self.push_str(c.encode_utf8(&mut tmp));
    }
}

fn write_seq(items: &[Value], open: &str, close: &str, out: &mut Rendered, depth: usize) {
    out.push_str(open);
    for (i, item) in items.iter().enumerate() {
        if out.full {
            return;
        }
        if i > 0 {
            out.push_str(", ");
        }
        write_repr(item, out, depth + 1);
    }
    out.push_str(close);
}

fn write_dict(d: &Dict, out: &mut Rendered, depth: usize) {
    match &d.missing {
        MissingKey::Raise => write_entries(d.iter(), out, depth),
        MissingKey::Count if d.is_empty() => out.push_str("Counter()"),
        MissingKey::Count => {
            out.push_str("Counter(");
            write_entries(most_common_order(d).into_iter(), out, depth);
            out.push(')');
        }
        MissingKey::Factory(factory) => {
            out.push_str("defaultdict(");
            write_repr(factory, out, depth + 1);
            out.push_str(", ");
            write_entries(d.iter(), out, depth);
            out.push(')');
        }
    }
}

/// Counter entries by descending count; ties and non-numeric counts keep
/// insertion order.
pub fn most_common_order(d: &Dict) -> Vec<&(Value, Value)> {
    let mut entries: Vec<&(Value, Value)> = d.iter().collect();
    entries.sort_by(|a, b| {
        match (b.1.as_f64(), a.1.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
            _ => std::cmp::Ordering::Equal,
        }
    });
    entries
}

fn write_entries<'a>(entries: impl Iterator<Item = &'a (Value, Value)>, out: &mut Rendered, depth: usize) {
    out.push('{');
    for (i, (k, v)) in entries.enumerate() {
        if out.full {
            return;
        }
        if i > 0 {
            out.push_str(", ");
        }
        write_repr(k, out, depth + 1);
        out.push_str(": ");
        write_repr(v, out, depth + 1);
    }
    out.push('}');
}

fn write_repr(value: &Value, out: &mut Rendered, depth: usize) {
    if out.full {
        return;
    }
    if depth > MAX_REPR_DEPTH {
        out.push_str("...");
        return;
    }
    match value {
        Value::None => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(f) => out.push_str(&float_repr(*f)),
        Value::Str(s) => {
            // quoting at most doubles the text plus the quotes
            if out.buf.len().saturating_add(s.len()) > out.cap {
                out.full = true;
                return;
            }
            out.push_str(&quote_str(s))
        }
        Value::List(l) => match l.try_borrow() {
            Ok(items) => write_seq(&items, "[", "]", out, depth),
            Err(_) => out.push_str("[...]"),
        },
        Value::Tuple(t) => {
            if t.len() == 1 {
                out.push('(');
                write_repr(&t[0], out, depth + 1);
                out.push_str(",)");
            } else {
                write_seq(t, "(", ")", out, depth);
            }
        }
        Value::Dict(d) => match d.try_borrow() {
            Ok(d) => write_dict(&d, out, depth),
            Err(_) => out.push_str("{...}"),
        },
        Value::Range(r) => {
            if r.step == 1 {
                out.push_str(&format!("range({}, {})", r.start, r.stop));
            } else {
                out.push_str(&format!("range({}, {}, {})", r.start, r.stop, r.step));
            }
        }
        Value::Function(f) => out.push_str(&format!("<function {}>", f.name)),
        Value::Builtin(b) => out.push_str(&format!("<built-in function {}>", b.name())),
        Value::Method(m) => out.push_str(&format!(
            "<built-in method {} of {} object>",
            m.name,
            m.receiver.type_name()
        )),
        Value::Capability(name) => out.push_str(&format!("<capability {}>", name)),
        Value::Module(m) => out.push_str(&format!("<module '{}'>", m.name())),
        Value::Type(t) => out.push_str(&format!("<class '{}'>", t.name())),
        Value::Exception(e) => {
            out.push_str(e.kind.name());
            out.push('(');
            if !e.message.is_empty() {
                out.push_str(&quote_str(&e.message));
            }
            out.push(')');
        }
        Value::Match(m) => {
            let span = m.char_span(0).unwrap_or((0, 0));
            let text = m.group(0).map(|g| repr(&g)).unwrap_or_default();
            out.push_str(&format!(
                "<re.Match object; span=({}, {}), match={}>",
                span.0, span.1, text
            ));
        }
        Value::Temporal(t) => out.push_str(&t.repr()),
    }
}

/// Quote a string the way `repr` does: single quotes unless the text contains
/// a single quote and no double quote.
pub fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Shortest round-tripping float text: `1.0`, `0.1`, `1e+16`, `1.5e-07`.
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    let abs = f.abs();
    if (1e-4..1e16).contains(&abs) {
        let s = format!("{}", f);
        if s.contains('.') {
            s
        } else {
            format!("{}.0", s)
        }
    } else {
        normalize_exponent(&format!("{:e}", f))
    }
}

/// Rust renders `1.5e-7`; the program language renders `1.5e-07`.
fn normalize_exponent(rust: &str) -> String {
    let Some((mantissa, exp)) = rust.split_once('e') else {
        return rust.to_string();
    };
    let (sign, digits) = match exp.strip_prefix('-') {
        Some(d) => ('-', d),
        None => ('+', exp),
    };
    if digits.len() < 2 {
        format!("{}e{}0{}", mantissa, sign, digits)
    } else {
        format!("{}e{}{}", mantissa, sign, digits)
    }
}

/// Parsed format specification: `[[fill]align][sign][0][width][,][.precision][type]`
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FormatSpec {
    pub fill: Option<char>,
    pub align: Option<char>,
    pub sign: Option<char>,
    pub zero: bool,
    pub width: Option<usize>,
    pub grouping: Option<char>,
    pub precision: Option<usize>,
    pub kind: Option<char>,
}

impl FormatSpec {
    pub fn parse(spec: &str) -> Result<Self, Fault> {
        let chars: Vec<char> = spec.chars().collect();
        let mut out = FormatSpec::default();
        let mut i = 0;
        let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');
        if chars.len() >= 2 && is_align(chars[1]) {
            out.fill = Some(chars[0]);
            out.align = Some(chars[1]);
            i = 2;
        } else if !chars.is_empty() && is_align(chars[0]) {
            out.align = Some(chars[0]);
            i = 1;
        }
        if let Some(&c @ ('+' | '-' | ' ')) = chars.get(i) {
            out.sign = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            out.zero = true;
            i += 1;
        }
        let start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i > start {
            out.width = chars[start..i].iter().collect::<String>().parse().ok();
        }
        if let Some(&c @ (',' | '_')) = chars.get(i) {
            out.grouping = Some(c);
            i += 1;
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            let start = i;
            while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
            if i == start {
                return Err(Fault::value_error("Format specifier missing precision"));
            }
            out.precision = chars[start..i].iter().collect::<String>().parse().ok();
        }
        if let Some(&c) = chars.get(i) {
            out.kind = Some(c);
            i += 1;
        }
        if i != chars.len() {
            return Err(Fault::value_error(format!(
                "Invalid format specifier '{}'",
                spec
            )));
        }
        Ok(out)
    }
}

/// `format(value, spec)`
pub fn format_value(value: &Value, spec: &str) -> Result<String, Fault> {
    if spec.is_empty() {
        return Ok(to_str(value));
    }
    if let Value::Temporal(t) = value {
        return t.strftime(spec);
    }
    let spec = FormatSpec::parse(spec)?;
    let (body, numeric) = match value {
        Value::Int(_) | Value::Bool(_) | Value::Float(_) => (format_number(value, &spec)?, true),
        Value::Str(s) => {
            if !matches!(spec.kind, None | Some('s')) {
                return Err(Fault::value_error(format!(
                    "Unknown format code '{}' for object of type 'str'",
                    spec.kind.unwrap_or(' ')
                )));
            }
            let text: String = match spec.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s.to_string(),
            };
            (text, false)
        }
        other => (to_str(other), false),
    };
    Ok(pad(&body, &spec, numeric))
}

fn format_number(value: &Value, spec: &FormatSpec) -> Result<String, Fault> {
    let kind = spec.kind;
    let int_value = match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    };
    let (negative, digits) = match (kind, int_value) {
        (None | Some('d') | Some('n'), Some(i)) => (i < 0, group(&i.unsigned_abs().to_string(), spec.grouping)),
        (Some('x'), Some(i)) => (i < 0, format!("{:x}", i.unsigned_abs())),
        (Some('X'), Some(i)) => (i < 0, format!("{:X}", i.unsigned_abs())),
        (Some('o'), Some(i)) => (i < 0, format!("{:o}", i.unsigned_abs())),
        (Some('b'), Some(i)) => (i < 0, format!("{:b}", i.unsigned_abs())),
        (Some('c'), Some(i)) => {
            let c = u32::try_from(i)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| Fault::new(super::fault::ExcKind::OverflowError, "%c arg not in range(0x110000)"))?;
            (false, c.to_string())
        }
        (Some(k @ ('d' | 'x' | 'X' | 'o' | 'b' | 'c' | 'n')), None) => {
            return Err(Fault::value_error(format!(
                "Unknown format code '{}' for object of type 'float'",
                k
            )))
        }
        _ => {
            let f = value.as_f64().unwrap_or(0.0);
            let negative = f.is_sign_negative();
            let abs = f.abs();
            let text = match kind {
                Some('f') | Some('F') => fixed(abs, spec.precision.unwrap_or(6), spec.grouping),
                Some('e') | Some('E') => {
                    let s = scientific(abs, spec.precision.unwrap_or(6));
                    if kind == Some('E') {
                        s.to_uppercase()
                    } else {
                        s
                    }
                }
                Some('%') => format!("{}%", fixed(abs * 100.0, spec.precision.unwrap_or(6), spec.grouping)),
                Some('g') | Some('G') => general(abs, spec.precision.unwrap_or(6)),
                None => match spec.precision {
                    Some(p) => general(abs, p),
                    None => float_repr(abs),
                },
                Some(k) => {
                    return Err(Fault::value_error(format!(
                        "Unknown format code '{}' for object of type '{}'",
                        k,
                        value.type_name()
                    )))
                }
            };
            (negative && !f.is_nan(), text)
        }
    };
    let sign = if negative {
        "-"
    } else {
        match spec.sign {
            Some('+') => "+",
            Some(' ') => " ",
            _ => "",
        }
    };
    Ok(format!("{}{}", sign, digits))
}

fn group(digits: &str, sep: Option<char>) -> String {
    let Some(sep) = sep else {
        return digits.to_string();
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let len = digits.len();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}

fn fixed(abs: f64, precision: usize, grouping: Option<char>) -> String {
    if !abs.is_finite() {
        return float_repr(abs);
    }
    let s = format!("{:.*}", precision, abs);
    match s.split_once('.') {
        Some((int_part, frac)) => format!("{}.{}", group(int_part, grouping), frac),
        None => group(&s, grouping),
    }
}

fn scientific(abs: f64, precision: usize) -> String {
    if !abs.is_finite() {
        return float_repr(abs);
    }
    normalize_exponent(&format!("{:.*e}", precision, abs))
}

fn general(abs: f64, precision: usize) -> String {
    if !abs.is_finite() {
        return float_repr(abs);
    }
    let p = precision.max(1);
    if abs == 0.0 {
        return "0".to_string();
    }
    let exp = abs.log10().floor() as i64;
    let text = if exp >= -4 && exp < p as i64 {
        let decimals = (p as i64 - 1 - exp).max(0) as usize;
        format!("{:.*}", decimals, abs)
    } else {
        scientific(abs, p - 1)
    };
    strip_trailing_zeros(&text)
}

fn strip_trailing_zeros(text: &str) -> String {
    let (mantissa, exp) = match text.find('e') {
        Some(pos) => (&text[..pos], &text[pos..]),
        None => (text, ""),
    };
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };
    format!("{}{}", mantissa, exp)
}

fn pad(body: &str, spec: &FormatSpec, numeric: bool) -> String {
    let Some(width) = spec.width else {
        return body.to_string();
    };
    let len = body.chars().count();
    if len >= width {
        return body.to_string();
    }
    let (fill, align) = if spec.zero && spec.align.is_none() && numeric {
        ('0', '=')
    } else {
        (
            spec.fill.unwrap_or(' '),
            spec.align.unwrap_or(if numeric { '>' } else { '<' }),
        )
    };
    let gap = width - len;
    let fill_str = |n: usize| fill.to_string().repeat(n);
    match align {
        '<' => format!("{}{}", body, fill_str(gap)),
        '^' => format!("{}{}{}", fill_str(gap / 2), body, fill_str(gap - gap / 2)),
        '=' => {
            let (sign, rest) = match body.chars().next() {
                Some(c @ ('-' | '+' | ' ')) => (c.to_string(), &body[1..]),
                _ => (String::new(), body),
            };
            format!("{}{}{}", sign, fill_str(gap), rest)
        }
        _ => format!("{}{}", fill_str(gap), body),
    }
}

/// `template % args`
pub fn percent_format(template: &str, args: &Value, cap: usize) -> Result<String, Fault> {
    let positional: Vec<Value> = match args {
        Value::Tuple(items) => items.to_vec(),
        other => vec![other.clone()],
    };
    let mapping = match args {
        Value::Dict(d) => Some(d.clone()),
        _ => None,
    };
    let mut next = 0usize;
    let mut out = String::with_capacity(template.len());
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c != '%' {
            out.push(c);
            i += 1;
            continue;
        }
        i += 1;
        if chars.get(i) == Some(&'%') {
            out.push('%');
            i += 1;
            continue;
        }
        let mut key: Option<String> = None;
        if chars.get(i) == Some(&'(') {
            let start = i + 1;
            let end = chars[start..]
                .iter()
                .position(|c| *c == ')')
                .map(|p| start + p)
                .ok_or_else(|| Fault::value_error("incomplete format key"))?;
            key = Some(chars[start..end].iter().collect());
            i = end + 1;
        }
        let mut spec = String::new();
        while let Some(&c) = chars.get(i) {
            if matches!(c, '-' | '+' | ' ' | '0' | '.') || c.is_ascii_digit() {
                spec.push(c);
                i += 1;
            } else {
                break;
            }
        }
        let Some(&conv) = chars.get(i) else {
            return Err(Fault::value_error("incomplete format"));
        };
        i += 1;
        let value = match &key {
            Some(k) => {
                let d = mapping
                    .as_ref()
                    .ok_or_else(|| Fault::type_error("format requires a mapping"))?;
                let found = d.borrow().get(&Value::str(k))?;
                found.ok_or_else(|| Fault::new(super::fault::ExcKind::KeyError, quote_str(k)))?
            }
            None => {
                let v = positional
                    .get(next)
                    .cloned()
                    .ok_or_else(|| Fault::type_error("not enough arguments for format string"))?;
                next += 1;
                v
            }
        };
        let std_spec = percent_spec_to_format(&spec);
        let text = match conv {
            's' => format_value(&Value::string(to_str_within(&value, cap)?), &std_spec)?,
            'r' => format_value(&Value::string(repr_within(&value, cap)?), &std_spec)?,
            'd' | 'i' => {
                let as_int = match &value {
                    Value::Float(f) => Value::Int(f.trunc() as i64),
                    v @ (Value::Int(_) | Value::Bool(_)) => v.clone(),
                    other => {
                        return Err(Fault::type_error(format!(
                            "%d format: a real number is required, not {}",
                            other.type_name()
                        )))
                    }
                };
                format_value(&as_int, &format!("{}d", std_spec))?
            }
            'f' | 'F' | 'e' | 'E' | 'g' | 'G' | 'x' | 'X' | 'o' => {
                if value.as_f64().is_none() {
                    return Err(Fault::type_error(format!(
                        "must be real number, not {}",
                        value.type_name()
                    )));
                }
                format_value(&value, &format!("{}{}", std_spec, conv))?
            }
            other => {
                return Err(Fault::value_error(format!(
                    "unsupported format character '{}'",
                    other
                )))
            }
        };
        out.push_str(&text);
        check_len(out.len(), cap)?;
    }
    if mapping.is_none() && next < positional.len() && matches!(args, Value::Tuple(_)) {
        return Err(Fault::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(out)
}

/// `%-08.2` style flags → format-spec text.
fn percent_spec_to_format(spec: &str) -> String {
    let left = spec.contains('-');
    let plus = spec.contains('+');
    let body: String = spec.chars().filter(|c| !matches!(c, '-' | '+' | ' ')).collect();
    let mut out = String::new();
    if left {
        out.push('<');
    } else if !body.is_empty() && !body.starts_with('0') && !body.starts_with('.') {
        out.push('>');
    }
    if plus {
        out.push('+');
    }
    out.push_str(&body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_float_repr() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(-2.5), "-2.5");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e-7), "1.5e-07");
        assert_eq!(float_repr(f64::INFINITY), "inf");
    }

    #[test]
    fn test_repr_containers() {
        let v = Value::list(vec![
            Value::Int(1),
            Value::str("a"),
            Value::None,
            Value::Bool(true),
        ]);
        assert_eq!(repr(&v), "[1, 'a', None, True]");
        assert_eq!(repr(&Value::tuple(vec![Value::Int(1)])), "(1,)");
        let mut d = Dict::new();
        d.insert(Value::str("k"), Value::Float(2.0)).unwrap();
        assert_eq!(repr(&Value::dict(d)), "{'k': 2.0}");
    }

    #[test]
    fn test_counter_and_defaultdict_repr() {
        let mut c = Dict::new();
        c.missing = MissingKey::Count;
        assert_eq!(repr(&Value::dict(c.clone())), "Counter()");
        c.insert(Value::str("b"), Value::Int(1)).unwrap();
        c.insert(Value::str("a"), Value::Int(3)).unwrap();
        c.insert(Value::str("c"), Value::Int(1)).unwrap();
        assert_eq!(repr(&Value::dict(c)), "Counter({'a': 3, 'b': 1, 'c': 1})");
        let mut d = Dict::new();
        d.missing = MissingKey::Factory(Value::Type(super::super::value::TypeKind::List));
        d.insert(Value::Int(1), Value::list(vec![])).unwrap();
        assert_eq!(repr(&Value::dict(d)), "defaultdict(<class 'list'>, {1: []})");
    }

    #[test]
    fn test_bounded_rendering() {
        let big = Value::list(vec![Value::Int(12345); 100]);
        assert_eq!(repr_within(&big, 10_000).unwrap(), repr(&big));
        let err = repr_within(&big, 50).unwrap_err();
        assert_eq!(err.kind, super::super::fault::ExcKind::MemoryError);
        assert!(to_str_within(&Value::str("abcdef"), 3).is_err());
        assert_eq!(to_str_within(&Value::str("abc"), 3).unwrap(), "abc");
    }

    #[test]
    fn test_quote_str_choice() {
        assert_eq!(quote_str("it's"), "\"it's\"");
        assert_eq!(quote_str("a\nb"), "'a\\nb'");
    }

    #[test]
    fn test_str_of_exception_is_message() {
        let e = Value::Exception(Rc::new(super::super::value::ExceptionValue {
            kind: super::super::fault::ExcKind::ValueError,
            message: "bad".into(),
        }));
        assert_eq!(to_str(&e), "bad");
        assert_eq!(repr(&e), "ValueError('bad')");
    }

    #[test]
    fn test_format_specs() {
        assert_eq!(format_value(&Value::Float(3.14159), ".2f").unwrap(), "3.14");
        assert_eq!(format_value(&Value::Int(42), ">5").unwrap(), "   42");
        assert_eq!(format_value(&Value::Int(42), "05").unwrap(), "00042");
        assert_eq!(format_value(&Value::Int(-42), "05").unwrap(), "-0042");
        assert_eq!(format_value(&Value::Int(1234567), ",").unwrap(), "1,234,567");
        assert_eq!(format_value(&Value::str("ab"), "^6").unwrap(), "  ab  ");
        assert_eq!(format_value(&Value::str("ab"), "*<4").unwrap(), "ab**");
        assert_eq!(format_value(&Value::Float(0.256), ".1%").unwrap(), "25.6%");
        assert_eq!(format_value(&Value::Int(255), "x").unwrap(), "ff");
        assert_eq!(format_value(&Value::Float(1234.5), ",.2f").unwrap(), "1,234.50");
        assert_eq!(format_value(&Value::Float(0.0001234), "g").unwrap(), "0.0001234");
        assert_eq!(format_value(&Value::Float(1.5e10), ".3e").unwrap(), "1.500e+10");
    }

    #[test]
    fn test_format_spec_errors() {
        assert!(format_value(&Value::str("x"), "d").is_err());
        assert!(format_value(&Value::Float(1.0), "d").is_err());
        assert!(FormatSpec::parse(".f").is_err());
    }

    #[test]
    fn test_percent_format() {
        let args = Value::tuple(vec![Value::str("rows"), Value::Int(3), Value::Float(2.5)]);
        assert_eq!(
            percent_format("%s: %d (%.1f)", &args, 1_000).unwrap(),
            "rows: 3 (2.5)"
        );
        assert_eq!(percent_format("100%%", &Value::tuple(vec![]), 1_000).unwrap(), "100%");
        assert_eq!(percent_format("%5s|", &Value::str("ab"), 1_000).unwrap(), "   ab|");
        assert_eq!(percent_format("%-5s|", &Value::str("ab"), 1_000).unwrap(), "ab   |");
        assert!(percent_format("%s %s", &Value::tuple(vec![Value::Int(1)]), 1_000).is_err());
    }
}
