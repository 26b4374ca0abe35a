//! `itertools` and `functools.reduce`.
//!
//! Every function returns a list built eagerly; each item counts against the
//! collection cap as it is produced, so combinatorial explosions stop at the
//! cap instead of exhausting memory.

use super::builtins::{zip_columns, Args, Builtin};
use super::eval::Interpreter;
use super::fault::Fault;
use super::ops::{binary_op, py_eq};
use super::value::Value;
use crate::lang::ast::BinOp;

/// Output buffer that enforces the collection cap per pushed item.
struct Produced<'i, 'a> {
    interp: &'i mut Interpreter<'a>,
    items: Vec<Value>,
}

impl<'i, 'a> Produced<'i, 'a> {
    fn new(interp: &'i mut Interpreter<'a>) -> Self {
        Self {
            interp,
            items: Vec::new(),
        }
    }

    fn push(&mut self, item: Value) -> Result<(), Fault> {
        self.interp.poll()?;
        self.interp.check_len(self.items.len() + 1)?;
        self.items.push(item);
        Ok(())
    }

    fn tuple_of(&mut self, pool: &[Value], indices: &[usize]) -> Result<(), Fault> {
        self.push(Value::tuple(indices.iter().map(|i| pool[*i].clone()).collect()))
    }

    fn finish(self) -> Value {
        Value::list(self.items)
    }
}

fn r_arg(v: Option<Value>, default: usize) -> Result<usize, Fault> {
    match v {
        None | Some(Value::None) => Ok(default),
        Some(v) => {
            let r = v.expect_int("r")?;
            usize::try_from(r).map_err(|_| Fault::value_error("r must be non-negative"))
        }
    }
}

pub fn call(interp: &mut Interpreter, builtin: Builtin, mut args: Args) -> Result<Value, Fault> {
    match builtin {
        Builtin::Chain => {
            args.finish()?;
            let mut out = Produced::new(interp);
            for iterable in &args.pos {
                for item in out.interp.iterate(iterable)? {
                    out.push(item)?;
                }
            }
            Ok(out.finish())
        }
        Builtin::Product => {
            let repeat = r_arg(args.kwarg("repeat"), 1)?;
            args.finish()?;
            let mut pools = Vec::with_capacity(args.pos.len());
            for iterable in &args.pos {
                pools.push(interp.collect(iterable)?);
            }
            interp.check_len(pools.len().saturating_mul(repeat))?;
            let pools: Vec<&Vec<Value>> = (0..repeat).flat_map(|_| pools.iter()).collect();
            product(Produced::new(interp), &pools)
        }
        Builtin::Permutations => {
            args.count(1, 2)?;
            let r = args.take(1, "r");
            args.finish()?;
            let pool = interp.collect(&args.pos[0])?;
            let r = r_arg(r, pool.len())?;
            permutations(Produced::new(interp), &pool, r)
        }
        Builtin::Combinations | Builtin::CombinationsWithReplacement => {
            args.count(1, 2)?;
            let r = args.take(1, "r");
            args.finish()?;
            let Some(r) = r else {
                return Err(Fault::type_error(format!(
                    "{}() missing required argument 'r'",
                    builtin.name()
                )));
            };
            let pool = interp.collect(&args.pos[0])?;
            let r = r_arg(Some(r), 0)?;
            if builtin == Builtin::Combinations {
                combinations(Produced::new(interp), &pool, r)
            } else {
                combinations_with_replacement(Produced::new(interp), &pool, r)
            }
        }
        Builtin::Accumulate => {
            args.count(1, 2)?;
            let func = args.take(1, "func").filter(|f| !matches!(f, Value::None));
            let initial = args.kwarg("initial").filter(|v| !matches!(v, Value::None));
            args.finish()?;
            let items = interp.collect(&args.pos[0])?;
            let mut out = Produced::new(interp);
            let mut acc = initial;
            if let Some(first) = &acc {
                out.push(first.clone())?;
            }
            for item in items {
                let next = match acc.take() {
                    None => item,
                    Some(prev) => match &func {
                        Some(f) => out.interp.call_value(f, vec![prev, item], Vec::new())?,
                        None => binary_op(BinOp::Add, &prev, &item, out.interp.cap())?,
                    },
                };
                out.push(next.clone())?;
                acc = Some(next);
            }
            Ok(out.finish())
        }
        Builtin::Islice => islice(interp, args),
        Builtin::ZipLongest => {
            let fill = args.kwarg("fillvalue").unwrap_or(Value::None);
            args.finish()?;
            let mut columns = Vec::with_capacity(args.pos.len());
            for iterable in &args.pos {
                columns.push(interp.collect(iterable)?);
            }
            let rows = columns.iter().map(Vec::len).max().unwrap_or(0);
            let mut out = Produced::new(interp);
            for row in 0..rows {
                let items = columns
                    .iter()
                    .map(|c| c.get(row).cloned().unwrap_or_else(|| fill.clone()))
                    .collect();
                out.push(Value::tuple(items))?;
            }
            Ok(out.finish())
        }
        Builtin::Groupby => {
            args.count(1, 2)?;
            let key = args.take(1, "key").filter(|f| !matches!(f, Value::None));
            args.finish()?;
            let items = interp.collect(&args.pos[0])?;
            let mut out = Produced::new(interp);
            let mut current: Option<(Value, Vec<Value>)> = None;
            for item in items {
                out.interp.poll()?;
                let k = match &key {
                    Some(f) => out.interp.call_value(f, vec![item.clone()], Vec::new())?,
                    None => item.clone(),
                };
                current = match current.take() {
                    Some((ck, mut group)) if py_eq(&ck, &k)? => {
                        group.push(item);
                        Some((ck, group))
                    }
                    Some((ck, group)) => {
                        out.push(Value::tuple(vec![ck, Value::list(group)]))?;
                        Some((k, vec![item]))
                    }
                    None => Some((k, vec![item])),
                };
            }
            if let Some((ck, group)) = current {
                out.push(Value::tuple(vec![ck, Value::list(group)]))?;
            }
            Ok(out.finish())
        }
        Builtin::Repeat => {
            args.count(1, 2)?;
            let times = args.take(1, "times");
            args.finish()?;
            let Some(times) = times else {
                return Err(Fault::type_error(
                    "repeat() requires 'times'; unbounded repetition is not available",
                ));
            };
            let times = times.expect_int("repeat() times")?.max(0) as usize;
            interp.check_len(times)?;
            Ok(Value::list(vec![args.pos[0].clone(); times]))
        }
        Builtin::Pairwise => {
            args.finish()?;
            args.count(1, 1)?;
            let items = interp.collect(&args.pos[0])?;
            let mut out = Produced::new(interp);
            for pair in items.windows(2) {
                out.push(Value::tuple(pair.to_vec()))?;
            }
            Ok(out.finish())
        }
        Builtin::Starmap => {
            args.finish()?;
            args.count(2, 2)?;
            let func = args.pos[0].clone();
            let rows = interp.collect(&args.pos[1])?;
            let mut out = Produced::new(interp);
            for row in rows {
                let call_args = out.interp.collect(&row)?;
                let result = out.interp.call_value(&func, call_args, Vec::new())?;
                out.push(result)?;
            }
            Ok(out.finish())
        }
        Builtin::Takewhile | Builtin::Dropwhile | Builtin::Filterfalse => {
            args.finish()?;
            args.count(2, 2)?;
            let pred = args.pos[0].clone();
            let items = interp.collect(&args.pos[1])?;
            let mut out = Produced::new(interp);
            let mut dropping = true;
            for item in items {
                let hit = match (&pred, builtin) {
                    (Value::None, Builtin::Filterfalse) => item.truthy(),
                    _ => out.interp.call_value(&pred, vec![item.clone()], Vec::new())?.truthy(),
                };
                match builtin {
                    Builtin::Takewhile if !hit => break,
                    Builtin::Takewhile => out.push(item)?,
                    Builtin::Dropwhile if dropping && hit => {}
                    Builtin::Dropwhile => {
                        dropping = false;
                        out.push(item)?;
                    }
                    _ if !hit => out.push(item)?,
                    _ => {}
                }
            }
            Ok(out.finish())
        }
        Builtin::Compress => {
            args.finish()?;
            args.count(2, 2)?;
            let rows = zip_columns(interp, &args.pos)?;
            let mut out = Produced::new(interp);
            for row in rows {
                if let [item, selector] = row.as_slice() {
                    if selector.truthy() {
                        out.push(item.clone())?;
                    }
                }
            }
            Ok(out.finish())
        }
        Builtin::Reduce => {
            args.finish()?;
            args.count(2, 3)?;
            let func = args.pos[0].clone();
            let mut items = interp.iterate(&args.pos[1])?;
            let mut acc = match args.arg(2).cloned().or_else(|| items.next()) {
                Some(v) => v,
                None => {
                    return Err(Fault::type_error(
                        "reduce() of empty iterable with no initial value",
                    ))
                }
            };
            for item in items {
                acc = interp.call_value(&func, vec![acc, item], Vec::new())?;
            }
            Ok(acc)
        }
        other => Err(Fault::type_error(format!("{}() is not callable here", other.name()))),
    }
}

/// `islice(iterable, stop)` or `islice(iterable, start, stop[, step])`.
/// Ranges are consumed lazily.
fn islice(interp: &mut Interpreter, args: Args) -> Result<Value, Fault> {
    args.finish()?;
    args.count(2, 4)?;
    let bound = |v: &Value| -> Result<Option<usize>, Fault> {
        match v {
            Value::None => Ok(None),
            other => other
                .as_index()
                .and_then(|i| usize::try_from(i).ok())
                .map(Some)
                .ok_or_else(|| {
                    Fault::value_error(
                        "Indices for islice() must be None or an integer: 0 <= x <= sys.maxsize.",
                    )
                }),
        }
    };
    let (start, stop, step) = match &args.pos[1..] {
        [stop] => (0, bound(stop)?, 1),
        [start, stop] => (bound(start)?.unwrap_or(0), bound(stop)?, 1),
        [start, stop, step, ..] => (
            bound(start)?.unwrap_or(0),
            bound(stop)?,
            bound(step)?.unwrap_or(1),
        ),
        [] => (0, None, 1),
    };
    if step == 0 {
        return Err(Fault::value_error(
            "Step for islice() must be a positive integer or None.",
        ));
    }
    let it = interp.iterate(&args.pos[0])?;
    let stop = stop.unwrap_or(usize::MAX).max(start);
    let mut out = Produced::new(interp);
    for item in it.take(stop).skip(start).step_by(step) {
        out.push(item)?;
    }
    Ok(out.finish())
}

fn product(mut out: Produced<'_, '_>, pools: &[&Vec<Value>]) -> Result<Value, Fault> {
    if pools.iter().any(|p| p.is_empty()) {
        return Ok(out.finish());
    }
    let mut indices = vec![0usize; pools.len()];
    loop {
        let row = pools.iter().zip(&indices).map(|(p, i)| p[*i].clone()).collect();
        out.push(Value::tuple(row))?;
        // odometer: advance the rightmost index that still has room
        let mut i = pools.len();
        loop {
            if i == 0 {
                return Ok(out.finish());
            }
            i -= 1;
            indices[i] += 1;
            if indices[i] < pools[i].len() {
                break;
            }
            indices[i] = 0;
        }
    }
}

fn permutations(mut out: Produced<'_, '_>, pool: &[Value], r: usize) -> Result<Value, Fault> {
    let n = pool.len();
    if r > n {
        return Ok(out.finish());
    }
    let mut indices: Vec<usize> = (0..n).collect();
    let mut cycles: Vec<usize> = (n - r + 1..=n).rev().collect();
    out.tuple_of(pool, &indices[..r])?;
    'outer: loop {
        for i in (0..r).rev() {
            cycles[i] -= 1;
            if cycles[i] == 0 {
                indices[i..].rotate_left(1);
                cycles[i] = n - i;
            } else {
                let j = n - cycles[i];
                indices.swap(i, j);
                out.tuple_of(pool, &indices[..r])?;
                continue 'outer;
            }
        }
        return Ok(out.finish());
    }
}

fn combinations(mut out: Produced<'_, '_>, pool: &[Value], r: usize) -> Result<Value, Fault> {
    let n = pool.len();
    if r > n {
        return Ok(out.finish());
    }
    let mut indices: Vec<usize> = (0..r).collect();
    out.tuple_of(pool, &indices)?;
    loop {
        let Some(i) = (0..r).rev().find(|&i| indices[i] != i + n - r) else {
            return Ok(out.finish());
        };
        indices[i] += 1;
        for j in i + 1..r {
            indices[j] = indices[j - 1] + 1;
        }
        out.tuple_of(pool, &indices)?;
    }
}

fn combinations_with_replacement(mut out: Produced<'_, '_>, pool: &[Value], r: usize) -> Result<Value, Fault> {
    let n = pool.len();
    if n == 0 && r > 0 {
        return Ok(out.finish());
    }
    let mut indices = vec![0usize; r];
    out.tuple_of(pool, &indices)?;
    loop {
        let Some(i) = (0..r).rev().find(|&i| indices[i] != n - 1) else {
            return Ok(out.finish());
        };
        let next = indices[i] + 1;
        for slot in &mut indices[i..] {
            *slot = next;
        }
        out.tuple_of(pool, &indices)?;
    }
}
