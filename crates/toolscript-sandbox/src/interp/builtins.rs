//! Built-in functions and type constructors.

use std::cmp::Ordering;
use std::rc::Rc;

use super::eval::Interpreter;
use super::fault::{ExcKind, Fault};
use super::format::{repr, repr_within, to_str, to_str_within};
use super::modules;
use super::temporal;
use super::ops::{binary_op, check_len, py_cmp};
use super::value::{Dict, ExceptionValue, ModuleKind, RangeValue, TypeKind, Value};
use crate::lang::ast::BinOp;

/// Host-implemented callables: global builtins and safe-module functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Enumerate,
    Zip,
    Max,
    Min,
    Sum,
    Abs,
    Round,
    Pow,
    Divmod,
    Sorted,
    Reversed,
    All,
    Any,
    Isinstance,
    Print,
    Repr,
    Hasattr,
    Map,
    Filter,
    Chr,
    Ord,
    JsonDumps,
    JsonLoads,
    MathSqrt,
    MathFloor,
    MathCeil,
    MathLog,
    MathExp,
    MathFabs,
    MathIsclose,
    TimeTime,
    TimeSleep,
    ReSearch,
    ReMatch,
    ReFullmatch,
    ReFindall,
    ReSub,
    ReSplit,
    Issubclass,
    Counter,
    Defaultdict,
    DatetimeNow,
    DatetimeUtcnow,
    DatetimeFromisoformat,
    DatetimeFromtimestamp,
    DateToday,
    DateFromisoformat,
    RandomSeed,
    RandomRandom,
    RandomRandint,
    RandomRandrange,
    RandomUniform,
    RandomChoice,
    RandomChoices,
    RandomShuffle,
    RandomSample,
    Chain,
    Product,
    Permutations,
    Combinations,
    CombinationsWithReplacement,
    Accumulate,
    Islice,
    ZipLongest,
    Groupby,
    Repeat,
    Pairwise,
    Starmap,
    Takewhile,
    Dropwhile,
    Filterfalse,
    Compress,
    Reduce,
}

/// Builtins bound as program globals.
pub const GLOBAL_BUILTINS: &[Builtin] = &[
    Builtin::Len,
    Builtin::Enumerate,
    Builtin::Zip,
    Builtin::Max,
    Builtin::Min,
    Builtin::Sum,
    Builtin::Abs,
    Builtin::Round,
    Builtin::Pow,
    Builtin::Divmod,
    Builtin::Sorted,
    Builtin::Reversed,
    Builtin::All,
    Builtin::Any,
    Builtin::Isinstance,
    Builtin::Issubclass,
    Builtin::Print,
    Builtin::Repr,
    Builtin::Hasattr,
    Builtin::Map,
    Builtin::Filter,
    Builtin::Chr,
    Builtin::Ord,
];

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Enumerate => "enumerate",
            Builtin::Zip => "zip",
            Builtin::Max => "max",
            Builtin::Min => "min",
            Builtin::Sum => "sum",
            Builtin::Abs => "abs",
            Builtin::Round => "round",
            Builtin::Pow => "pow",
            Builtin::Divmod => "divmod",
            Builtin::Sorted => "sorted",
            Builtin::Reversed => "reversed",
            Builtin::All => "all",
            Builtin::Any => "any",
            Builtin::Isinstance => "isinstance",
            Builtin::Print => "print",
            Builtin::Repr => "repr",
            Builtin::Hasattr => "hasattr",
            Builtin::Map => "map",
            Builtin::Filter => "filter",
            Builtin::Chr => "chr",
            Builtin::Ord => "ord",
            Builtin::JsonDumps => "dumps",
            Builtin::JsonLoads => "loads",
            Builtin::MathSqrt => "sqrt",
            Builtin::MathFloor => "floor",
            Builtin::MathCeil => "ceil",
            Builtin::MathLog => "log",
            Builtin::MathExp => "exp",
            Builtin::MathFabs => "fabs",
            Builtin::MathIsclose => "isclose",
            Builtin::TimeTime => "time",
            Builtin::TimeSleep => "sleep",
            Builtin::ReSearch => "search",
            Builtin::ReMatch => "match",
            Builtin::ReFullmatch => "fullmatch",
            Builtin::ReFindall => "findall",
            Builtin::ReSub => "sub",
            Builtin::ReSplit => "split",
            Builtin::Issubclass => "issubclass",
            Builtin::Counter => "Counter",
            Builtin::Defaultdict => "defaultdict",
            Builtin::DatetimeNow => "now",
            Builtin::DatetimeUtcnow => "utcnow",
            Builtin::DatetimeFromisoformat | Builtin::DateFromisoformat => "fromisoformat",
            Builtin::DatetimeFromtimestamp => "fromtimestamp",
            Builtin::DateToday => "today",
            Builtin::RandomSeed => "seed",
            Builtin::RandomRandom => "random",
            Builtin::RandomRandint => "randint",
            Builtin::RandomRandrange => "randrange",
            Builtin::RandomUniform => "uniform",
            Builtin::RandomChoice => "choice",
            Builtin::RandomChoices => "choices",
            Builtin::RandomShuffle => "shuffle",
            Builtin::RandomSample => "sample",
            Builtin::Chain => "chain",
            Builtin::Product => "product",
            Builtin::Permutations => "permutations",
            Builtin::Combinations => "combinations",
            Builtin::CombinationsWithReplacement => "combinations_with_replacement",
            Builtin::Accumulate => "accumulate",
            Builtin::Islice => "islice",
            Builtin::ZipLongest => "zip_longest",
            Builtin::Groupby => "groupby",
            Builtin::Repeat => "repeat",
            Builtin::Pairwise => "pairwise",
            Builtin::Starmap => "starmap",
            Builtin::Takewhile => "takewhile",
            Builtin::Dropwhile => "dropwhile",
            Builtin::Filterfalse => "filterfalse",
            Builtin::Compress => "compress",
            Builtin::Reduce => "reduce",
        }
    }

    /// Safe module the function belongs to, if any.
    pub fn module(self) -> Option<ModuleKind> {
        match self {
            Builtin::JsonDumps | Builtin::JsonLoads => Some(ModuleKind::Json),
            Builtin::MathSqrt
            | Builtin::MathFloor
            | Builtin::MathCeil
            | Builtin::MathLog
            | Builtin::MathExp
            | Builtin::MathFabs
            | Builtin::MathIsclose => Some(ModuleKind::Math),
            Builtin::TimeTime | Builtin::TimeSleep => Some(ModuleKind::Time),
            Builtin::ReSearch
            | Builtin::ReMatch
            | Builtin::ReFullmatch
            | Builtin::ReFindall
            | Builtin::ReSub
            | Builtin::ReSplit => Some(ModuleKind::Re),
            Builtin::Counter | Builtin::Defaultdict => Some(ModuleKind::Collections),
            Builtin::DatetimeNow
            | Builtin::DatetimeUtcnow
            | Builtin::DatetimeFromisoformat
            | Builtin::DatetimeFromtimestamp
            | Builtin::DateToday
            | Builtin::DateFromisoformat => Some(ModuleKind::Datetime),
            Builtin::RandomSeed
            | Builtin::RandomRandom
            | Builtin::RandomRandint
            | Builtin::RandomRandrange
            | Builtin::RandomUniform
            | Builtin::RandomChoice
            | Builtin::RandomChoices
            | Builtin::RandomShuffle
            | Builtin::RandomSample => Some(ModuleKind::Random),
            Builtin::Chain
            | Builtin::Product
            | Builtin::Permutations
            | Builtin::Combinations
            | Builtin::CombinationsWithReplacement
            | Builtin::Accumulate
            | Builtin::Islice
            | Builtin::ZipLongest
            | Builtin::Groupby
            | Builtin::Repeat
            | Builtin::Pairwise
            | Builtin::Starmap
            | Builtin::Takewhile
            | Builtin::Dropwhile
            | Builtin::Filterfalse
            | Builtin::Compress => Some(ModuleKind::Itertools),
            Builtin::Reduce => Some(ModuleKind::Functools),
            _ => None,
        }
    }

    pub fn from_global(name: &str) -> Option<Self> {
        GLOBAL_BUILTINS.iter().copied().find(|b| b.name() == name)
    }
}

/// Arguments of a host-implemented call.
pub struct Args {
    pub name: &'static str,
    pub pos: Vec<Value>,
    pub kw: Vec<(String, Value)>,
}

impl Args {
    pub fn new(name: &'static str, pos: Vec<Value>, kw: Vec<(String, Value)>) -> Self {
        Self { name, pos, kw }
    }

    /// Positional arity check.
    pub fn count(&self, min: usize, max: usize) -> Result<(), Fault> {
        let n = self.pos.len();
        if n >= min && n <= max {
            return Ok(());
        }
        let msg = if min == max {
            format!(
                "{}() takes exactly {} argument{} ({} given)",
                self.name,
                min,
                if min == 1 { "" } else { "s" },
                n
            )
        } else if n < min {
            format!("{}() expected at least {} arguments, got {}", self.name, min, n)
        } else {
            format!("{}() takes at most {} arguments ({} given)", self.name, max, n)
        };
        Err(Fault::type_error(msg))
    }

    pub fn arg(&self, i: usize) -> Option<&Value> {
        self.pos.get(i)
    }

    /// Remove a keyword argument.
    pub fn kwarg(&mut self, name: &str) -> Option<Value> {
        let idx = self.kw.iter().position(|(k, _)| k == name)?;
        Some(self.kw.remove(idx).1)
    }

    /// Positional `i` or keyword `name`, whichever was given.
    pub fn take(&mut self, i: usize, name: &str) -> Option<Value> {
        let kw = self.kwarg(name);
        self.pos.get(i).cloned().or(kw)
    }

    /// Fail on keyword arguments nobody consumed.
    pub fn finish(&self) -> Result<(), Fault> {
        match self.kw.first() {
            Some((k, _)) => Err(Fault::type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                self.name, k
            ))),
            None => Ok(()),
        }
    }
}

fn none_to_option(v: Option<Value>) -> Option<Value> {
    v.filter(|v| !matches!(v, Value::None))
}

pub fn call_builtin(interp: &mut Interpreter, builtin: Builtin, mut args: Args) -> Result<Value, Fault> {
    if builtin.module().is_some() {
        return modules::call_module_function(interp, builtin, args);
    }
    match builtin {
        Builtin::Print => {
            let sep = text_kwarg(&mut args, "sep", " ")?;
            let end = text_kwarg(&mut args, "end", "\n")?;
            args.finish()?;
            let cap = interp.cap();
            let mut line = String::new();
            for (i, v) in args.pos.iter().enumerate() {
                if i > 0 {
                    line.push_str(&sep);
                }
                line.push_str(&to_str_within(v, cap)?);
                check_len(line.len(), cap)?;
            }
            line.push_str(&end);
            interp.write_output(&line)?;
            Ok(Value::None)
        }
        Builtin::Sorted => {
            let key = none_to_option(args.kwarg("key"));
            let reverse = args.kwarg("reverse").map(|v| v.truthy()).unwrap_or(false);
            args.finish()?;
            args.count(1, 1)?;
            let items = interp.collect(&args.pos[0])?;
            Ok(Value::list(sort_values(interp, items, key.as_ref(), reverse)?))
        }
        Builtin::Max | Builtin::Min => min_max(interp, builtin, args),
        Builtin::Map => {
            args.finish()?;
            if args.pos.len() < 2 {
                return Err(Fault::type_error("map() must have at least two arguments."));
            }
            let func = args.pos[0].clone();
            let columns = zip_columns(interp, &args.pos[1..])?;
            let mut out = Vec::with_capacity(columns.len());
            for row in columns {
                interp.poll()?;
                out.push(interp.call_value(&func, row, Vec::new())?);
            }
            Ok(Value::list(out))
        }
        Builtin::Filter => {
            args.finish()?;
            args.count(2, 2)?;
            let func = args.pos[0].clone();
            let mut out = Vec::new();
            for item in interp.collect(&args.pos[1])? {
                interp.poll()?;
                let keep = match func {
                    Value::None => item.truthy(),
                    _ => interp.call_value(&func, vec![item.clone()], Vec::new())?.truthy(),
                };
                if keep {
                    out.push(item);
                }
            }
            Ok(Value::list(out))
        }
        _ => {
            let start = match builtin {
                Builtin::Enumerate | Builtin::Sum => args.kwarg("start"),
                Builtin::Round => args.kwarg("ndigits"),
                _ => None,
            };
            args.finish()?;
            call_simple(interp, builtin, args.pos, start, args.name)
        }
    }
}

fn text_kwarg(args: &mut Args, name: &str, default: &str) -> Result<String, Fault> {
    match args.kwarg(name).as_ref() {
        None | Some(Value::None) => Ok(default.to_string()),
        Some(Value::Str(s)) => Ok(s.to_string()),
        Some(other) => Err(Fault::type_error(format!(
            "{} must be None or a string, not {}",
            name,
            other.type_name()
        ))),
    }
}

/// Builtins taking only positional arguments (plus one optional keyword).
fn call_simple(
    interp: &mut Interpreter,
    builtin: Builtin,
    pos: Vec<Value>,
    extra: Option<Value>,
    name: &'static str,
) -> Result<Value, Fault> {
    let args = Args::new(name, pos, Vec::new());
    let arg0 = || args.pos[0].clone();
    match builtin {
        Builtin::Len => {
            args.count(1, 1)?;
            len_of(&args.pos[0]).map(|n| Value::Int(n as i64))
        }
        Builtin::Repr => {
            args.count(1, 1)?;
            repr_within(&args.pos[0], interp.cap()).map(Value::string)
        }
        Builtin::Abs => {
            args.count(1, 1)?;
            match arg0() {
                Value::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(Fault::overflow),
                Value::Bool(b) => Ok(Value::Int(b as i64)),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(Fault::type_error(format!(
                    "bad operand type for abs(): '{}'",
                    other.type_name()
                ))),
            }
        }
        Builtin::Round => {
            args.count(1, 2)?;
            let ndigits = none_to_option(args.arg(1).cloned().or(extra));
            round(&args.pos[0], ndigits.as_ref())
        }
        Builtin::Pow => {
            args.count(2, 3)?;
            match args.arg(2) {
                None | Some(Value::None) => binary_op(BinOp::Pow, &args.pos[0], &args.pos[1], interp.cap()),
                Some(m) => mod_pow(&args.pos[0], &args.pos[1], m),
            }
        }
        Builtin::Divmod => {
            args.count(2, 2)?;
            let (a, b) = (&args.pos[0], &args.pos[1]);
            let q = binary_op(BinOp::FloorDiv, a, b, interp.cap())?;
            let r = binary_op(BinOp::Mod, a, b, interp.cap())?;
            Ok(Value::tuple(vec![q, r]))
        }
        Builtin::Sum => {
            args.count(1, 2)?;
            let mut total = args.arg(1).cloned().or(extra).unwrap_or(Value::Int(0));
            if matches!(total, Value::Str(_)) {
                return Err(Fault::type_error(
                    "sum() can't sum strings [use ''.join(seq) instead]",
                ));
            }
            for item in interp.iterate(&args.pos[0])? {
                interp.poll()?;
                total = binary_op(BinOp::Add, &total, &item, interp.cap())?;
            }
            Ok(total)
        }
        Builtin::All | Builtin::Any => {
            args.count(1, 1)?;
            let want = builtin == Builtin::Any;
            for item in interp.iterate(&args.pos[0])? {
                interp.poll()?;
                if item.truthy() == want {
                    return Ok(Value::Bool(want));
                }
            }
            Ok(Value::Bool(!want))
        }
        Builtin::Enumerate => {
            args.count(1, 2)?;
            let start = match args.arg(1).cloned().or(extra) {
                Some(v) => v.expect_int("enumerate() start")?,
                None => 0,
            };
            let items = interp.collect(&args.pos[0])?;
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let idx = start.checked_add(i as i64).ok_or_else(Fault::overflow)?;
                out.push(Value::tuple(vec![Value::Int(idx), item]));
            }
            Ok(Value::list(out))
        }
        Builtin::Zip => {
            let rows = zip_columns(interp, &args.pos)?;
            Ok(Value::list(rows.into_iter().map(Value::tuple).collect()))
        }
        Builtin::Reversed => {
            args.count(1, 1)?;
            match &args.pos[0] {
                Value::Dict(_) => Err(Fault::type_error("'dict' object is not reversible")),
                v => {
                    let mut items = interp.collect(v)?;
                    items.reverse();
                    Ok(Value::list(items))
                }
            }
        }
        Builtin::Isinstance => {
            args.count(2, 2)?;
            isinstance(&args.pos[0], &args.pos[1]).map(Value::Bool)
        }
        Builtin::Issubclass => {
            args.count(2, 2)?;
            let Value::Type(class) = &args.pos[0] else {
                return Err(Fault::type_error("issubclass() arg 1 must be a class"));
            };
            issubclass(*class, &args.pos[1]).map(Value::Bool)
        }
        Builtin::Hasattr => {
            args.count(2, 2)?;
            let name = args.pos[1].expect_str("hasattr(): attribute name")?;
            Ok(Value::Bool(interp.guard().getattr(&args.pos[0], &name).is_ok()))
        }
        Builtin::Chr => {
            args.count(1, 1)?;
            let code = args.pos[0].expect_int("chr() argument")?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::string(c.to_string()))
                .ok_or_else(|| Fault::value_error("chr() arg not in range(0x110000)"))
        }
        Builtin::Ord => {
            args.count(1, 1)?;
            let s = args.pos[0].expect_str("ord() argument")?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Int(c as i64)),
                _ => Err(Fault::type_error(format!(
                    "ord() expected a character, but string of length {} found",
                    s.chars().count()
                ))),
            }
        }
        other => Err(Fault::type_error(format!("{}() is not callable here", other.name()))),
    }
}

pub fn len_of(v: &Value) -> Result<usize, Fault> {
    Ok(match v {
        Value::Str(s) => s.chars().count(),
        Value::List(l) => l.borrow().len(),
        Value::Tuple(t) => t.len(),
        Value::Dict(d) => d.borrow().len(),
        Value::Range(r) => r.len(),
        other => {
            return Err(Fault::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    })
}

fn isinstance(value: &Value, class: &Value) -> Result<bool, Fault> {
    match class {
        Value::Type(t) => Ok(t.contains(value)),
        Value::Tuple(items) => {
            for item in items.iter() {
                if isinstance(value, item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Fault::type_error(
            "isinstance() arg 2 must be a type or tuple of types",
        )),
    }
}

fn issubclass(class: TypeKind, base: &Value) -> Result<bool, Fault> {
    match base {
        Value::Type(t) => Ok(class.is_subclass_of(*t)),
        Value::Tuple(items) => {
            for item in items.iter() {
                if issubclass(class, item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Fault::type_error(
            "issubclass() arg 2 must be a class, a tuple of classes, or a union",
        )),
    }
}

/// Transpose iterables into rows, stopping at the shortest.
pub fn zip_columns(interp: &mut Interpreter, iterables: &[Value]) -> Result<Vec<Vec<Value>>, Fault> {
    if iterables.is_empty() {
        return Ok(Vec::new());
    }
    let mut iters = Vec::with_capacity(iterables.len());
    for it in iterables {
        iters.push(interp.iterate(it)?);
    }
    let rows = iters.iter().map(|it| it.len()).min().unwrap_or(0);
    interp.check_len(rows)?;
    let mut out = Vec::with_capacity(rows);
    for _ in 0..rows {
        out.push(iters.iter_mut().filter_map(|it| it.next()).collect());
    }
    Ok(out)
}

fn min_max(interp: &mut Interpreter, builtin: Builtin, mut args: Args) -> Result<Value, Fault> {
    let key = none_to_option(args.kwarg("key"));
    let default = args.kwarg("default");
    args.finish()?;
    let items = match args.pos.len() {
        0 => {
            return Err(Fault::type_error(format!(
                "{} expected at least 1 argument, got 0",
                args.name
            )))
        }
        1 => interp.collect(&args.pos[0])?,
        _ => args.pos.clone(),
    };
    if items.is_empty() {
        return default.ok_or_else(|| {
            Fault::value_error(format!("{}() arg is an empty sequence", args.name))
        });
    }
    let want = if builtin == Builtin::Max {
        Ordering::Greater
    } else {
        Ordering::Less
    };
    let symbol = if builtin == Builtin::Max { ">" } else { "<" };
    let mut best: Option<(Value, Value)> = None;
    for item in items {
        interp.poll()?;
        let k = match &key {
            Some(f) => interp.call_value(f, vec![item.clone()], Vec::new())?,
            None => item.clone(),
        };
        best = match best {
            None => Some((k, item)),
            Some((bk, bv)) => {
                if py_cmp(&k, &bk, symbol)? == Some(want) {
                    Some((k, item))
                } else {
                    Some((bk, bv))
                }
            }
        };
    }
    Ok(best.map(|(_, v)| v).unwrap_or(Value::None))
}

/// Stable sort with a fallible comparison, optionally by key.
pub fn sort_values(
    interp: &mut Interpreter,
    items: Vec<Value>,
    key: Option<&Value>,
    reverse: bool,
) -> Result<Vec<Value>, Fault> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let k = match key {
            Some(f) => interp.call_value(f, vec![item.clone()], Vec::new())?,
            None => item.clone(),
        };
        keyed.push((k, item));
    }
    if reverse {
        keyed.reverse();
    }
    let mut sorted = merge_sort(interp, keyed)?;
    if reverse {
        sorted.reverse();
    }
    Ok(sorted.into_iter().map(|(_, v)| v).collect())
}

fn merge_sort(
    interp: &mut Interpreter,
    mut items: Vec<(Value, Value)>,
) -> Result<Vec<(Value, Value)>, Fault> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(interp, items)?;
    let right = merge_sort(interp, right)?;
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        interp.poll()?;
        // Take from the right only when strictly smaller.
        let take_right = py_cmp(&r.0, &l.0, "<")? == Some(Ordering::Less);
        let next = if take_right { right.next() } else { left.next() };
        out.extend(next);
    }
    out.extend(left);
    out.extend(right);
    Ok(out)
}

fn round(x: &Value, ndigits: Option<&Value>) -> Result<Value, Fault> {
    let digits = match ndigits {
        Some(v) => Some(v.expect_int("round() ndigits")?),
        None => None,
    };
    match (x, digits) {
        (Value::Int(_) | Value::Bool(_), None) => Ok(Value::Int(x.as_index().unwrap_or(0))),
        (Value::Int(_) | Value::Bool(_), Some(d)) if d >= 0 => Ok(Value::Int(x.as_index().unwrap_or(0))),
        (Value::Int(_) | Value::Bool(_), Some(d)) => {
            let i = x.as_index().unwrap_or(0) as i128;
            let Some(p) = u32::try_from(-d).ok().and_then(|e| 10i128.checked_pow(e)) else {
                return Ok(Value::Int(0));
            };
            let q = i.div_euclid(p);
            let r = i.rem_euclid(p);
            let q = match (2 * r).cmp(&p) {
                Ordering::Greater => q + 1,
                Ordering::Equal if q % 2 != 0 => q + 1,
                _ => q,
            };
            i64::try_from(q * p).map(Value::Int).map_err(|_| Fault::overflow())
        }
        (Value::Float(f), None) => float_to_int(f.round_ties_even()),
        (Value::Float(f), Some(d)) => {
            if !f.is_finite() {
                return Ok(Value::Float(*f));
            }
            let d = d.clamp(-308, 308) as i32;
            let p = 10f64.powi(d.abs());
            let r = if d >= 0 {
                (f * p).round_ties_even() / p
            } else {
                (f / p).round_ties_even() * p
            };
            Ok(Value::Float(if r.is_finite() { r } else { *f }))
        }
        (other, _) => Err(Fault::type_error(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}

fn mod_pow(base: &Value, exp: &Value, modulus: &Value) -> Result<Value, Fault> {
    let (Some(b), Some(e), Some(m)) = (base.as_index(), exp.as_index(), modulus.as_index()) else {
        return Err(Fault::type_error(
            "pow() 3rd argument not allowed unless all arguments are integers",
        ));
    };
    if m == 0 {
        return Err(Fault::value_error("pow() 3rd argument cannot be 0"));
    }
    if e < 0 {
        return Err(Fault::value_error("pow() negative exponent not supported"));
    }
    let m = m as i128;
    let mut result: i128 = 1;
    let mut b = (b as i128).rem_euclid(m);
    let mut e = e;
    while e > 0 {
        if e & 1 == 1 {
            result = (result * b).rem_euclid(m);
        }
        b = (b * b).rem_euclid(m);
        e >>= 1;
    }
    // Result takes the sign of the modulus.
    let r = result.rem_euclid(m);
    let r = if m < 0 && r != 0 { r + m } else { r };
    Ok(Value::Int(r as i64))
}

pub fn float_to_int(f: f64) -> Result<Value, Fault> {
    if f.is_nan() {
        return Err(Fault::value_error("cannot convert float NaN to integer"));
    }
    if f.is_infinite() {
        return Err(Fault::new(
            ExcKind::OverflowError,
            "cannot convert float infinity to integer",
        ));
    }
    let t = f.trunc();
    if t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return Err(Fault::overflow());
    }
    Ok(Value::Int(t as i64))
}

fn parse_int(text: &str, base: u32) -> Option<i64> {
    let t = text.trim();
    let (neg, body) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let (base, body) = match base {
        0 | 16 if body.len() > 2 && (body.starts_with("0x") || body.starts_with("0X")) => (16, &body[2..]),
        0 | 8 if body.len() > 2 && (body.starts_with("0o") || body.starts_with("0O")) => (8, &body[2..]),
        0 | 2 if body.len() > 2 && (body.starts_with("0b") || body.starts_with("0B")) => (2, &body[2..]),
        0 => (10, body),
        b => (b, body),
    };
    if body.is_empty() || body.starts_with('_') || body.ends_with('_') || body.contains("__") {
        return None;
    }
    let digits: String = body.chars().filter(|c| *c != '_').collect();
    if digits.starts_with('+') || digits.starts_with('-') {
        return None;
    }
    let magnitude = i128::from_str_radix(&digits, base).ok()?;
    let v = if neg { -magnitude } else { magnitude };
    i64::try_from(v).ok()
}

fn parse_float(text: &str) -> Option<f64> {
    let t = text.trim();
    let lower = t.to_ascii_lowercase();
    let unsigned = lower.trim_start_matches(['+', '-']);
    if matches!(unsigned, "inf" | "infinity" | "nan") {
        let v = if unsigned == "nan" { f64::NAN } else { f64::INFINITY };
        return Some(if lower.starts_with('-') { -v } else { v });
    }
    if t.is_empty() || t.contains("__") || t.starts_with('_') || t.ends_with('_') {
        return None;
    }
    t.replace('_', "").parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Call a class: conversions, container constructors, `range`, `type` and
/// exception instantiation.
pub fn call_type(interp: &mut Interpreter, kind: TypeKind, mut args: Args) -> Result<Value, Fault> {
    match kind {
        TypeKind::Int => {
            let base = args.take(1, "base");
            args.finish()?;
            args.count(0, 2)?;
            let Some(x) = args.arg(0) else {
                return Ok(Value::Int(0));
            };
            match (x, base) {
                (Value::Str(s), base) => {
                    let base = match base {
                        Some(b) => b.expect_int("int() base")?,
                        None => 10,
                    };
                    if base != 0 && !(2..=36).contains(&base) {
                        return Err(Fault::value_error("int() base must be >= 2 and <= 36, or 0"));
                    }
                    parse_int(s, base as u32).map(Value::Int).ok_or_else(|| {
                        Fault::value_error(format!(
                            "invalid literal for int() with base {}: {}",
                            base,
                            repr(x)
                        ))
                    })
                }
                (_, Some(_)) => Err(Fault::type_error(
                    "int() can't convert non-string with explicit base",
                )),
                (Value::Int(i), None) => Ok(Value::Int(*i)),
                (Value::Bool(b), None) => Ok(Value::Int(*b as i64)),
                (Value::Float(f), None) => float_to_int(*f),
                (other, None) => Err(Fault::type_error(format!(
                    "int() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))),
            }
        }
        TypeKind::Float => {
            args.finish()?;
            args.count(0, 1)?;
            let Some(x) = args.arg(0) else {
                return Ok(Value::Float(0.0));
            };
            match x {
                Value::Str(s) => parse_float(s).map(Value::Float).ok_or_else(|| {
                    Fault::value_error(format!("could not convert string to float: {}", repr(x)))
                }),
                other => other.as_f64().map(Value::Float).ok_or_else(|| {
                    Fault::type_error(format!(
                        "float() argument must be a string or a real number, not '{}'",
                        other.type_name()
                    ))
                }),
            }
        }
        TypeKind::Str => {
            args.finish()?;
            args.count(0, 1)?;
            match args.arg(0) {
                Some(v) => to_str_within(v, interp.cap()).map(Value::string),
                None => Ok(Value::str("")),
            }
        }
        TypeKind::Bool => {
            args.finish()?;
            args.count(0, 1)?;
            Ok(Value::Bool(args.arg(0).map(|v| v.truthy()).unwrap_or(false)))
        }
        TypeKind::List | TypeKind::Tuple => {
            args.finish()?;
            args.count(0, 1)?;
            let items = match args.arg(0) {
                Some(v) => {
                    let v = v.clone();
                    interp.collect(&v)?
                }
                None => Vec::new(),
            };
            Ok(if kind == TypeKind::List {
                Value::list(items)
            } else {
                Value::tuple(items)
            })
        }
        TypeKind::Dict => {
            args.count(0, 1)?;
            let mut d = Dict::new();
            if let Some(source) = args.arg(0).cloned() {
                dict_update(interp, &mut d, &source)?;
            }
            for (k, v) in std::mem::take(&mut args.kw) {
                d.insert(Value::string(k), v)?;
            }
            interp.check_len(d.len())?;
            Ok(Value::dict(d))
        }
        TypeKind::Range => {
            args.finish()?;
            args.count(1, 3)?;
            let ints = args
                .pos
                .iter()
                .map(|v| {
                    v.as_index().ok_or_else(|| {
                        Fault::type_error(format!(
                            "'{}' object cannot be interpreted as an integer",
                            v.type_name()
                        ))
                    })
                })
                .collect::<Result<Vec<i64>, Fault>>()?;
            let (start, stop, step) = match ints.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step, ..] => (*start, *stop, *step),
                [] => (0, 0, 1),
            };
            if step == 0 {
                return Err(Fault::value_error("range() arg 3 must not be zero"));
            }
            Ok(Value::Range(RangeValue { start, stop, step }))
        }
        TypeKind::Type => {
            args.finish()?;
            args.count(1, 1)?;
            Ok(Value::Type(args.pos[0].type_kind()))
        }
        TypeKind::Exception(exc) => {
            args.finish()?;
            let message = match args.pos.len() {
                0 => String::new(),
                1 => to_str_within(&args.pos[0], interp.cap())?,
                _ => repr_within(&Value::tuple(args.pos.clone()), interp.cap())?,
            };
            Ok(Value::Exception(Rc::new(ExceptionValue { kind: exc, message })))
        }
        TypeKind::DateTime => temporal::new_datetime(args),
        TypeKind::Date => temporal::new_date(args),
        TypeKind::TimeDelta => temporal::new_timedelta(args),
        other => Err(Fault::type_error(format!(
            "cannot create '{}' instances",
            other.name()
        ))),
    }
}

/// `dict.update` / `dict(x)` source handling: a mapping or an iterable of pairs.
pub fn dict_update(interp: &mut Interpreter, d: &mut Dict, source: &Value) -> Result<(), Fault> {
    if let Value::Dict(src) = source {
        let items = src.borrow().items();
        for (k, v) in items {
            d.insert(k, v)?;
        }
        return Ok(());
    }
    for (i, item) in interp.iterate(source)?.enumerate() {
        interp.poll()?;
        let pair = interp.collect(&item).map_err(|_| {
            Fault::type_error(format!(
                "cannot convert dictionary update sequence element #{} to a sequence",
                i
            ))
        })?;
        if pair.len() != 2 {
            return Err(Fault::value_error(format!(
                "dictionary update sequence element #{} has length {}; 2 is required",
                i,
                pair.len()
            )));
        }
        let mut pair = pair.into_iter();
        if let (Some(k), Some(v)) = (pair.next(), pair.next()) {
            d.insert(k, v)?;
        }
    }
    Ok(())
}
