//! `collections`: `Counter` and `defaultdict`. Both are plain dicts with a
//! missing-key behavior attached, so every dict method keeps working on them.

use std::cell::RefCell;
use std::rc::Rc;

use super::builtins::{dict_update, Args, Builtin};
use super::eval::Interpreter;
use super::fault::Fault;
use super::format::most_common_order;
use super::ops::binary_op;
use super::value::{Dict, MissingKey, Value};
use crate::lang::ast::BinOp;

pub const COUNTER_METHODS: &[&str] = &["most_common", "elements", "total", "subtract"];

/// Methods a counter handles itself rather than through the dict table.
pub fn is_counter_method(name: &str) -> bool {
    name == "update" || COUNTER_METHODS.contains(&name)
}

pub fn call(interp: &mut Interpreter, builtin: Builtin, mut args: Args) -> Result<Value, Fault> {
    match builtin {
        Builtin::Counter => {
            args.count(0, 1)?;
            let mut d = Dict::new();
            d.missing = MissingKey::Count;
            let kw = std::mem::take(&mut args.kw);
            tally(interp, &mut d, args.arg(0), kw, BinOp::Add)?;
            Ok(Value::dict(d))
        }
        Builtin::Defaultdict => {
            args.count(0, 2)?;
            let factory = args.arg(0).cloned().unwrap_or(Value::None);
            if !matches!(factory, Value::None) && !factory.is_callable() {
                return Err(Fault::type_error("first argument must be callable or None"));
            }
            let mut d = Dict::new();
            if let Some(source) = args.arg(1).cloned() {
                dict_update(interp, &mut d, &source)?;
            }
            for (k, v) in std::mem::take(&mut args.kw) {
                d.insert(Value::string(k), v)?;
            }
            interp.check_len(d.len())?;
            d.missing = MissingKey::Factory(factory);
            Ok(Value::dict(d))
        }
        other => Err(Fault::type_error(format!("{}() is not callable here", other.name()))),
    }
}

/// Add or subtract counts: a mapping contributes its values, any other
/// iterable one per element, keywords their values.
fn tally(
    interp: &mut Interpreter,
    d: &mut Dict,
    source: Option<&Value>,
    kw: Vec<(String, Value)>,
    op: BinOp,
) -> Result<(), Fault> {
    let mut pairs = Vec::new();
    match source {
        None | Some(Value::None) => {}
        Some(Value::Dict(src)) => pairs = src.borrow().items(),
        Some(iterable) => {
            for item in interp.iterate(iterable)? {
                interp.poll()?;
                pairs.push((item, Value::Int(1)));
            }
        }
    }
    pairs.extend(kw.into_iter().map(|(k, v)| (Value::string(k), v)));
    let cap = interp.cap();
    for (key, n) in pairs {
        let current = d.get(&key)?.unwrap_or(Value::Int(0));
        let updated = binary_op(op, &current, &n, cap)?;
        d.insert(key, updated)?;
        interp.check_len(d.len())?;
    }
    Ok(())
}

pub fn counter_method(
    interp: &mut Interpreter,
    dict: &Rc<RefCell<Dict>>,
    name: &str,
    mut args: Args,
) -> Result<Value, Fault> {
    match name {
        "most_common" => {
            args.count(0, 1)?;
            let n = args.take(0, "n");
            args.finish()?;
            let d = dict.borrow();
            let ordered = most_common_order(&d);
            let limit = match n.as_ref() {
                None | Some(Value::None) => ordered.len(),
                Some(v) => v.expect_int("most_common() n")?.max(0) as usize,
            };
            Ok(Value::list(
                ordered
                    .into_iter()
                    .take(limit)
                    .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                    .collect(),
            ))
        }
        "elements" => {
            args.finish()?;
            args.count(0, 0)?;
            let d = dict.borrow();
            let repeats = |n: &Value| n.as_index().unwrap_or(0).max(0) as usize;
            let total = d.iter().fold(0usize, |acc, (_, n)| acc.saturating_add(repeats(n)));
            interp.check_len(total)?;
            let mut out = Vec::with_capacity(total);
            for (k, n) in d.iter() {
                out.extend(std::iter::repeat(k).take(repeats(n)).cloned());
            }
            Ok(Value::list(out))
        }
        "total" => {
            args.finish()?;
            args.count(0, 0)?;
            let values = dict.borrow().values();
            let mut total = Value::Int(0);
            for v in values {
                total = binary_op(BinOp::Add, &total, &v, interp.cap())?;
            }
            Ok(total)
        }
        "update" | "subtract" => {
            args.count(0, 1)?;
            let kw = std::mem::take(&mut args.kw);
            let source = args.arg(0).cloned();
            let op = if name == "update" { BinOp::Add } else { BinOp::Sub };
            let mut updated = dict.borrow().clone();
            tally(interp, &mut updated, source.as_ref(), kw, op)?;
            *dict.borrow_mut() = updated;
            Ok(Value::None)
        }
        _ => Err(Fault::attribute_error(format!(
            "'Counter' object has no attribute '{}'",
            name
        ))),
    }
}
