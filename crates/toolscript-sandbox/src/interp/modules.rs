//! Safe standard-library modules: `json`, `math`, `time` and `re` live here;
//! `collections`, `datetime`, `random`, `itertools` and `functools` are
//! routed to their own files.

use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::{Captures, Regex};

use super::builtins::{float_to_int, Args, Builtin};
use super::convert::{dumps, from_json, to_json};
use super::eval::Interpreter;
use super::fault::{ExcKind, Fault};
use super::value::{MatchValue, ModuleKind, TypeKind, Value};
use super::{collections, itertools, random, temporal};

const RE_IGNORECASE: i64 = 2;
const RE_MULTILINE: i64 = 8;
const RE_DOTALL: i64 = 16;

/// Member lookup for `module.name`.
pub fn module_attr(module: ModuleKind, name: &str) -> Option<Value> {
    let f = |b: Builtin| Some(Value::Builtin(b));
    match (module, name) {
        (ModuleKind::Json, "dumps") => f(Builtin::JsonDumps),
        (ModuleKind::Json, "loads") => f(Builtin::JsonLoads),
        (ModuleKind::Math, "sqrt") => f(Builtin::MathSqrt),
        (ModuleKind::Math, "floor") => f(Builtin::MathFloor),
        (ModuleKind::Math, "ceil") => f(Builtin::MathCeil),
        (ModuleKind::Math, "log") => f(Builtin::MathLog),
        (ModuleKind::Math, "exp") => f(Builtin::MathExp),
        (ModuleKind::Math, "fabs") => f(Builtin::MathFabs),
        (ModuleKind::Math, "isclose") => f(Builtin::MathIsclose),
        (ModuleKind::Math, "pi") => Some(Value::Float(std::f64::consts::PI)),
        (ModuleKind::Math, "e") => Some(Value::Float(std::f64::consts::E)),
        (ModuleKind::Math, "tau") => Some(Value::Float(std::f64::consts::TAU)),
        (ModuleKind::Math, "inf") => Some(Value::Float(f64::INFINITY)),
        (ModuleKind::Math, "nan") => Some(Value::Float(f64::NAN)),
        (ModuleKind::Time, "time") => f(Builtin::TimeTime),
        (ModuleKind::Time, "sleep") => f(Builtin::TimeSleep),
        (ModuleKind::Re, "search") => f(Builtin::ReSearch),
        (ModuleKind::Re, "match") => f(Builtin::ReMatch),
        (ModuleKind::Re, "fullmatch") => f(Builtin::ReFullmatch),
        (ModuleKind::Re, "findall") => f(Builtin::ReFindall),
        (ModuleKind::Re, "sub") => f(Builtin::ReSub),
        (ModuleKind::Re, "split") => f(Builtin::ReSplit),
        (ModuleKind::Re, "IGNORECASE" | "I") => Some(Value::Int(RE_IGNORECASE)),
        (ModuleKind::Re, "MULTILINE" | "M") => Some(Value::Int(RE_MULTILINE)),
        (ModuleKind::Re, "DOTALL" | "S") => Some(Value::Int(RE_DOTALL)),
        (ModuleKind::Collections, "Counter") => f(Builtin::Counter),
        (ModuleKind::Collections, "defaultdict") => f(Builtin::Defaultdict),
        (ModuleKind::Collections, "OrderedDict") => Some(Value::Type(TypeKind::Dict)),
        (ModuleKind::Datetime, "datetime") => Some(Value::Type(TypeKind::DateTime)),
        (ModuleKind::Datetime, "date") => Some(Value::Type(TypeKind::Date)),
        (ModuleKind::Datetime, "timedelta") => Some(Value::Type(TypeKind::TimeDelta)),
        (ModuleKind::Random, "seed") => f(Builtin::RandomSeed),
        (ModuleKind::Random, "random") => f(Builtin::RandomRandom),
        (ModuleKind::Random, "randint") => f(Builtin::RandomRandint),
        (ModuleKind::Random, "randrange") => f(Builtin::RandomRandrange),
        (ModuleKind::Random, "uniform") => f(Builtin::RandomUniform),
        (ModuleKind::Random, "choice") => f(Builtin::RandomChoice),
        (ModuleKind::Random, "choices") => f(Builtin::RandomChoices),
        (ModuleKind::Random, "shuffle") => f(Builtin::RandomShuffle),
        (ModuleKind::Random, "sample") => f(Builtin::RandomSample),
        (ModuleKind::Itertools, name) => ITERTOOLS
            .iter()
            .copied()
            .find(|b| b.name() == name)
            .map(Value::Builtin),
        (ModuleKind::Functools, "reduce") => f(Builtin::Reduce),
        _ => None,
    }
}

const ITERTOOLS: &[Builtin] = &[
    Builtin::Chain,
    Builtin::Product,
    Builtin::Permutations,
    Builtin::Combinations,
    Builtin::CombinationsWithReplacement,
    Builtin::Accumulate,
    Builtin::Islice,
    Builtin::ZipLongest,
    Builtin::Groupby,
    Builtin::Repeat,
    Builtin::Pairwise,
    Builtin::Starmap,
    Builtin::Takewhile,
    Builtin::Dropwhile,
    Builtin::Filterfalse,
    Builtin::Compress,
];

/// Class-level attributes: `datetime.now`, `date.today`, ...
pub fn type_attr(kind: TypeKind, name: &str) -> Option<Value> {
    let b = match (kind, name) {
        (TypeKind::DateTime, "now" | "today") => Builtin::DatetimeNow,
        (TypeKind::DateTime, "utcnow") => Builtin::DatetimeUtcnow,
        (TypeKind::DateTime, "fromisoformat") => Builtin::DatetimeFromisoformat,
        (TypeKind::DateTime, "fromtimestamp") => Builtin::DatetimeFromtimestamp,
        (TypeKind::Date, "today") => Builtin::DateToday,
        (TypeKind::Date, "fromisoformat") => Builtin::DateFromisoformat,
        _ => return None,
    };
    Some(Value::Builtin(b))
}

pub fn call_module_function(
    interp: &mut Interpreter,
    builtin: Builtin,
    mut args: Args,
) -> Result<Value, Fault> {
    match builtin.module() {
        Some(ModuleKind::Collections) => return collections::call(interp, builtin, args),
        Some(ModuleKind::Datetime) => return datetime_function(builtin, args),
        Some(ModuleKind::Random) => return random::call(interp, builtin, args),
        Some(ModuleKind::Itertools | ModuleKind::Functools) => {
            return itertools::call(interp, builtin, args)
        }
        _ => {}
    }
    match builtin {
        Builtin::JsonDumps => {
            let indent = args.kwarg("indent");
            let sort_keys = args.kwarg("sort_keys").map(|v| v.truthy()).unwrap_or(false);
            args.finish()?;
            args.count(1, 1)?;
            let indent = match indent {
                None | Some(Value::None) => None,
                Some(v) => Some(v.expect_int("indent")?.clamp(0, 64) as usize),
            };
            let json = to_json(&args.pos[0])?;
            let text = dumps(&json, indent, sort_keys);
            interp.check_len(text.len())?;
            Ok(Value::string(text))
        }
        Builtin::JsonLoads => {
            args.finish()?;
            args.count(1, 1)?;
            let text = args.pos[0].expect_str("the JSON object")?;
            serde_json::from_str::<serde_json::Value>(&text)
                .map(|json| from_json(&json))
                .map_err(|e| Fault::value_error(format!("Invalid JSON: {}", e)))
        }
        Builtin::MathIsclose => {
            let rel_tol = args.kwarg("rel_tol").map(|v| number(&v)).transpose()?.unwrap_or(1e-9);
            let abs_tol = args.kwarg("abs_tol").map(|v| number(&v)).transpose()?.unwrap_or(0.0);
            args.finish()?;
            args.count(2, 2)?;
            let (a, b) = (number(&args.pos[0])?, number(&args.pos[1])?);
            if rel_tol < 0.0 || abs_tol < 0.0 {
                return Err(Fault::value_error("tolerances must be non-negative"));
            }
            if a == b {
                return Ok(Value::Bool(true));
            }
            if a.is_infinite() || b.is_infinite() {
                return Ok(Value::Bool(false));
            }
            let diff = (a - b).abs();
            Ok(Value::Bool(
                diff <= (rel_tol * b).abs() || diff <= (rel_tol * a).abs() || diff <= abs_tol,
            ))
        }
        Builtin::MathLog => {
            args.finish()?;
            args.count(1, 2)?;
            let x = number(&args.pos[0])?;
            let ln = |v: f64| {
                if v <= 0.0 {
                    Err(Fault::value_error("math domain error"))
                } else {
                    Ok(v.ln())
                }
            };
            match args.arg(1) {
                None => ln(x).map(Value::Float),
                Some(base) => {
                    let denom = ln(number(base)?)?;
                    if denom == 0.0 {
                        return Err(Fault::zero_division("float division by zero"));
                    }
                    Ok(Value::Float(ln(x)? / denom))
                }
            }
        }
        Builtin::MathSqrt | Builtin::MathFloor | Builtin::MathCeil | Builtin::MathExp | Builtin::MathFabs => {
            args.finish()?;
            args.count(1, 1)?;
            let arg = &args.pos[0];
            match builtin {
                Builtin::MathFloor | Builtin::MathCeil if arg.as_index().is_some() => {
                    Ok(Value::Int(arg.as_index().unwrap_or(0)))
                }
                Builtin::MathFloor => float_to_int(number(arg)?.floor()),
                Builtin::MathCeil => float_to_int(number(arg)?.ceil()),
                Builtin::MathSqrt => {
                    let x = number(arg)?;
                    if x < 0.0 {
                        return Err(Fault::value_error("math domain error"));
                    }
                    Ok(Value::Float(x.sqrt()))
                }
                Builtin::MathExp => {
                    let r = number(arg)?.exp();
                    if r.is_infinite() {
                        return Err(Fault::new(ExcKind::OverflowError, "math range error"));
                    }
                    Ok(Value::Float(r))
                }
                _ => Ok(Value::Float(number(arg)?.abs())),
            }
        }
        Builtin::TimeTime => {
            args.finish()?;
            args.count(0, 0)?;
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            Ok(Value::Float(now))
        }
        Builtin::TimeSleep => {
            args.finish()?;
            args.count(1, 1)?;
            let secs = number(&args.pos[0])?;
            if secs < 0.0 || secs.is_nan() {
                return Err(Fault::value_error("sleep length must be non-negative"));
            }
            interp.sleep(secs)?;
            Ok(Value::None)
        }
        _ => call_re(interp, builtin, args),
    }
}

fn datetime_function(builtin: Builtin, args: Args) -> Result<Value, Fault> {
    args.finish()?;
    match builtin {
        Builtin::DatetimeNow | Builtin::DatetimeUtcnow | Builtin::DateToday => {
            args.count(0, 0)?;
            Ok(match builtin {
                Builtin::DatetimeNow => temporal::now(),
                Builtin::DatetimeUtcnow => temporal::utcnow(),
                _ => temporal::today(),
            })
        }
        Builtin::DatetimeFromisoformat | Builtin::DateFromisoformat => {
            args.count(1, 1)?;
            let text = args.pos[0].expect_str("fromisoformat: argument")?;
            if builtin == Builtin::DateFromisoformat {
                temporal::date_fromisoformat(&text)
            } else {
                temporal::datetime_fromisoformat(&text)
            }
        }
        Builtin::DatetimeFromtimestamp => {
            args.count(1, 1)?;
            temporal::from_timestamp(number(&args.pos[0])?)
        }
        other => Err(Fault::type_error(format!("{}() is not callable here", other.name()))),
    }
}

fn number(v: &Value) -> Result<f64, Fault> {
    v.as_f64().ok_or_else(|| {
        Fault::type_error(format!("must be real number, not {}", v.type_name()))
    })
}

/// Compile with Python-style integer flags mapped onto inline flags.
pub fn compile_regex(pattern: &str, flags: i64) -> Result<Regex, Fault> {
    let mut inline = String::new();
    if flags & RE_IGNORECASE != 0 {
        inline.push('i');
    }
    if flags & RE_MULTILINE != 0 {
        inline.push('m');
    }
    if flags & RE_DOTALL != 0 {
        inline.push('s');
    }
    let full = if inline.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", inline, pattern)
    };
    Regex::new(&full).map_err(|e| Fault::value_error(format!("invalid regular expression: {}", e)))
}

fn match_value(re: &Regex, text: &Rc<str>, caps: &Captures<'_>) -> Value {
    let spans = (0..caps.len())
        .map(|i| caps.get(i).map(|m| (m.start(), m.end())))
        .collect();
    let names: Rc<[Option<String>]> = re.capture_names().map(|n| n.map(str::to_string)).collect();
    Value::Match(Rc::new(MatchValue {
        text: text.clone(),
        spans,
        names,
    }))
}

fn call_re(interp: &mut Interpreter, builtin: Builtin, mut args: Args) -> Result<Value, Fault> {
    let flags = match args.kwarg("flags") {
        Some(v) => v.expect_int("flags")?,
        None => 0,
    };
    match builtin {
        Builtin::ReSearch | Builtin::ReMatch | Builtin::ReFullmatch | Builtin::ReFindall => {
            args.finish()?;
            args.count(2, 3)?;
            let flags = args.arg(2).map(|v| v.expect_int("flags")).transpose()?.unwrap_or(flags);
            let pattern = args.pos[0].expect_str("pattern")?;
            let text = args.pos[1].expect_str("string")?;
            let pattern = match builtin {
                Builtin::ReMatch => format!(r"\A(?:{})", pattern),
                Builtin::ReFullmatch => format!(r"\A(?:{})\z", pattern),
                _ => pattern.to_string(),
            };
            let re = interp.regex(&pattern, flags)?;
            if builtin == Builtin::ReFindall {
                return findall(interp, &re, &text);
            }
            Ok(match re.captures(&text) {
                Some(caps) => match_value(&re, &text, &caps),
                None => Value::None,
            })
        }
        Builtin::ReSub => {
            let count = args.take(3, "count");
            args.finish()?;
            args.count(3, 5)?;
            let flags = args.arg(4).map(|v| v.expect_int("flags")).transpose()?.unwrap_or(flags);
            let count = count.map(|v| v.expect_int("count")).transpose()?.unwrap_or(0);
            let pattern = args.pos[0].expect_str("pattern")?;
            let repl = args.pos[1].clone();
            let text = args.pos[2].expect_str("string")?;
            let re = interp.regex(&pattern, flags)?;
            sub(interp, &re, &repl, &text, count)
        }
        Builtin::ReSplit => {
            let maxsplit = args.take(2, "maxsplit");
            args.finish()?;
            args.count(2, 4)?;
            let flags = args.arg(3).map(|v| v.expect_int("flags")).transpose()?.unwrap_or(flags);
            let maxsplit = maxsplit.map(|v| v.expect_int("maxsplit")).transpose()?.unwrap_or(0);
            let pattern = args.pos[0].expect_str("pattern")?;
            let text = args.pos[1].expect_str("string")?;
            let re = interp.regex(&pattern, flags)?;
            split(interp, &re, &text, maxsplit)
        }
        other => Err(Fault::type_error(format!("{}() is not callable here", other.name()))),
    }
}

fn findall(interp: &mut Interpreter, re: &Regex, text: &str) -> Result<Value, Fault> {
    let groups = re.captures_len() - 1;
    let group_text = |caps: &Captures<'_>, i: usize| {
        Value::str(caps.get(i).map(|m| m.as_str()).unwrap_or(""))
    };
    let mut out = Vec::new();
    for caps in re.captures_iter(text) {
        interp.poll()?;
        out.push(match groups {
            0 => group_text(&caps, 0),
            1 => group_text(&caps, 1),
            n => Value::tuple((1..=n).map(|i| group_text(&caps, i)).collect()),
        });
        interp.check_len(out.len())?;
    }
    Ok(Value::list(out))
}

/// Expand a replacement template: `\1`, `\g<name>`, `\g<1>` and escapes.
fn expand_template(template: &str, caps: &Captures<'_>, out: &mut String) -> Result<(), Fault> {
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(d) if d.is_ascii_digit() => {
                let mut num = d.to_string();
                if let Some(e) = chars.peek().copied().filter(char::is_ascii_digit) {
                    num.push(e);
                    chars.next();
                }
                let idx: usize = num.parse().unwrap_or(0);
                if idx >= caps.len() {
                    return Err(Fault::value_error(format!("invalid group reference {}", idx)));
                }
                out.push_str(caps.get(idx).map(|m| m.as_str()).unwrap_or(""));
            }
            Some('g') => {
                if chars.next() != Some('<') {
                    return Err(Fault::value_error("missing <"));
                }
                let name: String = chars.by_ref().take_while(|c| *c != '>').collect();
                let m = match name.parse::<usize>() {
                    Ok(i) if i < caps.len() => caps.get(i),
                    Ok(i) => {
                        return Err(Fault::value_error(format!("invalid group reference {}", i)))
                    }
                    Err(_) => match caps.name(&name) {
                        Some(m) => Some(m),
                        None => {
                            return Err(Fault::new(
                                ExcKind::IndexError,
                                format!("unknown group name '{}'", name),
                            ))
                        }
                    },
                };
                out.push_str(m.map(|m| m.as_str()).unwrap_or(""));
            }
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => return Err(Fault::value_error("bad escape (end of pattern)")),
        }
    }
    Ok(())
}

fn sub(interp: &mut Interpreter, re: &Regex, repl: &Value, text: &Rc<str>, count: i64) -> Result<Value, Fault> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (n, caps) in re.captures_iter(text).enumerate() {
        if count > 0 && n as i64 >= count {
            break;
        }
        interp.poll()?;
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        match repl {
            Value::Str(template) => expand_template(template, &caps, &mut out)?,
            f if f.is_callable() => {
                let m = match_value(re, text, &caps);
                let r = interp.call_value(f, vec![m], Vec::new())?;
                out.push_str(&r.expect_str("replacement")?);
            }
            other => {
                return Err(Fault::type_error(format!(
                    "expected str or callable for repl, got {}",
                    other.type_name()
                )))
            }
        }
        last = whole.end();
        interp.check_len(out.len())?;
    }
    out.push_str(&text[last..]);
    Ok(Value::string(out))
}

fn split(interp: &mut Interpreter, re: &Regex, text: &str, maxsplit: i64) -> Result<Value, Fault> {
    let mut out = Vec::new();
    let mut last = 0;
    for (n, caps) in re.captures_iter(text).enumerate() {
        if maxsplit > 0 && n as i64 >= maxsplit {
            break;
        }
        interp.poll()?;
        let Some(whole) = caps.get(0) else { continue };
        out.push(Value::str(&text[last..whole.start()]));
        for i in 1..caps.len() {
            out.push(caps.get(i).map(|m| Value::str(m.as_str())).unwrap_or(Value::None));
        }
        last = whole.end();
        interp.check_len(out.len())?;
    }
    out.push(Value::str(&text[last..]));
    Ok(Value::list(out))
}
