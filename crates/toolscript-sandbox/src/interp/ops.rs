//! Operators: arithmetic, comparison, equality, identity and membership.

use std::cmp::Ordering;
use std::rc::Rc;

use super::fault::{ExcKind, Fault};
use super::format::percent_format;
use super::temporal::{self, Temporal};
use super::value::Value;
use crate::lang::ast::{BinOp, CmpOp, UnaryOp};

const MAX_COMPARE_DEPTH: usize = 200;

fn unsupported(op: &str, a: &Value, b: &Value) -> Fault {
    Fault::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        a.type_name(),
        b.type_name()
    ))
}

/// Numeric view of an operand: exact integer or float.
#[derive(Clone, Copy)]
enum Num {
    I(i64),
    F(f64),
}

fn num(v: &Value) -> Option<Num> {
    match v {
        Value::Int(i) => Some(Num::I(*i)),
        Value::Bool(b) => Some(Num::I(*b as i64)),
        Value::Float(f) => Some(Num::F(*f)),
        _ => None,
    }
}

fn as_f(n: Num) -> f64 {
    match n {
        Num::I(i) => i as f64,
        Num::F(f) => f,
    }
}

/// Length check for values built by repetition or concatenation.
pub fn check_len(len: usize, cap: usize) -> Result<(), Fault> {
    if len > cap {
        return Err(Fault::memory(format!(
            "collection of {} items exceeds the limit of {}",
            len, cap
        )));
    }
    Ok(())
}

fn repeat_count(n: i64) -> usize {
    if n <= 0 {
        0
    } else {
        n as usize
    }
}

fn is_bitwise(op: BinOp) -> bool {
    matches!(
        op,
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::LShift | BinOp::RShift
    )
}

/// Bitwise operators are integer-only; `bool & bool` stays a bool.
fn bitwise_op(op: BinOp, a: &Value, b: &Value) -> Result<Value, Fault> {
    let (x, y) = match (a, b) {
        (Value::Bool(x), Value::Bool(y)) if !matches!(op, BinOp::LShift | BinOp::RShift) => {
            return Ok(Value::Bool(match op {
                BinOp::BitAnd => x & y,
                BinOp::BitOr => x | y,
                _ => x ^ y,
            }))
        }
        (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => match (num(a), num(b)) {
            (Some(Num::I(x)), Some(Num::I(y))) => (x, y),
            _ => return Err(unsupported(op.symbol(), a, b)),
        },
        _ => return Err(unsupported(op.symbol(), a, b)),
    };
    let r = match op {
        BinOp::BitAnd => x & y,
        BinOp::BitOr => x | y,
        BinOp::BitXor => x ^ y,
        BinOp::LShift | BinOp::RShift if y < 0 => return Err(Fault::value_error("negative shift count")),
        BinOp::LShift => {
            if x == 0 {
                0
            } else {
                let shifted = u32::try_from(y)
                    .ok()
                    .filter(|s| *s < 64)
                    .map(|s| x << s)
                    .filter(|r| r >> y == x);
                shifted.ok_or_else(Fault::overflow)?
            }
        }
        // arithmetic shift; large counts saturate to the sign
        _ => x >> y.min(63),
    };
    Ok(Value::Int(r))
}

/// Date and duration arithmetic; `None` leaves the operands to the generic rules.
fn temporal_op(op: BinOp, a: &Value, b: &Value) -> Option<Result<Value, Fault>> {
    let result = match (op, a, b) {
        (BinOp::Add, Value::Temporal(x), Value::Temporal(y)) => temporal::add(x, y)?,
        (BinOp::Sub, Value::Temporal(x), Value::Temporal(y)) => temporal::sub(x, y)?,
        (BinOp::Mul, Value::Temporal(Temporal::Delta(d)), n)
        | (BinOp::Mul, n, Value::Temporal(Temporal::Delta(d))) => temporal::scale(d, n.as_f64()?),
        (BinOp::Div, Value::Temporal(Temporal::Delta(x)), Value::Temporal(Temporal::Delta(y))) => {
            let (x, y) = (x.num_microseconds()?, y.num_microseconds()?);
            if y == 0 {
                return Some(Err(Fault::zero_division("division by zero")));
            }
            return Some(Ok(Value::Float(x as f64 / y as f64)));
        }
        (BinOp::Div, Value::Temporal(Temporal::Delta(d)), n) => {
            let f = n.as_f64()?;
            if f == 0.0 {
                return Some(Err(Fault::zero_division("division by zero")));
            }
            temporal::scale(d, 1.0 / f)
        }
        _ => return None,
    };
    Some(result.map(Value::Temporal))
}

pub fn binary_op(op: BinOp, a: &Value, b: &Value, cap: usize) -> Result<Value, Fault> {
    if is_bitwise(op) {
        return bitwise_op(op, a, b);
    }
    if let Some(result) = temporal_op(op, a, b) {
        return result;
    }
    if let (Some(x), Some(y)) = (num(a), num(b)) {
        return numeric_op(op, x, y);
    }
    match (op, a, b) {
        (BinOp::Add, Value::Str(x), Value::Str(y)) => {
            check_len(x.len() + y.len(), cap)?;
            let mut s = String::with_capacity(x.len() + y.len());
            s.push_str(x);
            s.push_str(y);
            Ok(Value::string(s))
        }
        (BinOp::Add, Value::Str(_), other) => Err(Fault::type_error(format!(
            "can only concatenate str (not \"{}\") to str",
            other.type_name()
        ))),
        (BinOp::Add, Value::List(x), Value::List(y)) => {
            let mut items = x.borrow().clone();
            items.extend(y.borrow().iter().cloned());
            check_len(items.len(), cap)?;
            Ok(Value::list(items))
        }
        (BinOp::Add, Value::List(_), other) => Err(Fault::type_error(format!(
            "can only concatenate list (not \"{}\") to list",
            other.type_name()
        ))),
        (BinOp::Add, Value::Tuple(x), Value::Tuple(y)) => {
            let mut items = x.to_vec();
            items.extend(y.iter().cloned());
            check_len(items.len(), cap)?;
            Ok(Value::tuple(items))
        }
        (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s)) if n.as_index().is_some() => {
            let count = repeat_count(n.as_index().unwrap_or(0));
            check_len(s.len().saturating_mul(count), cap)?;
            Ok(Value::string(s.repeat(count)))
        }
        (BinOp::Mul, Value::List(l), n) | (BinOp::Mul, n, Value::List(l)) if n.as_index().is_some() => {
            let count = repeat_count(n.as_index().unwrap_or(0));
            let items = l.borrow();
            check_len(items.len().saturating_mul(count), cap)?;
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            Ok(Value::list(out))
        }
        (BinOp::Mul, Value::Tuple(t), n) | (BinOp::Mul, n, Value::Tuple(t)) if n.as_index().is_some() => {
            let count = repeat_count(n.as_index().unwrap_or(0));
            check_len(t.len().saturating_mul(count), cap)?;
            let mut out = Vec::with_capacity(t.len() * count);
            for _ in 0..count {
                out.extend(t.iter().cloned());
            }
            Ok(Value::tuple(out))
        }
        (BinOp::Mod, Value::Str(template), args) => {
            let text = percent_format(template, args, cap)?;
            check_len(text.len(), cap)?;
            Ok(Value::string(text))
        }
        _ => Err(unsupported(op.symbol(), a, b)),
    }
}

fn numeric_op(op: BinOp, x: Num, y: Num) -> Result<Value, Fault> {
    if let (Num::I(a), Num::I(b)) = (x, y) {
        return int_op(op, a, b);
    }
    let (a, b) = (as_f(x), as_f(y));
    let r = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(Fault::zero_division("float division by zero"));
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(Fault::zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(Fault::zero_division("float modulo"));
            }
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(Fault::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            let r = a.powf(b);
            if r.is_nan() && !a.is_nan() && !b.is_nan() {
                return Err(Fault::value_error("math domain error"));
            }
            r
        }
        _ => return Err(Fault::type_error(format!(
            "unsupported operand type(s) for {}: 'float'",
            op.symbol()
        ))),
    };
    Ok(Value::Float(r))
}

fn int_op(op: BinOp, a: i64, b: i64) -> Result<Value, Fault> {
    let r = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(Fault::zero_division("division by zero"));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(Fault::zero_division("integer division or modulo by zero"));
            }
            a.checked_div(b).map(|q| {
                if a % b != 0 && (a < 0) != (b < 0) {
                    q - 1
                } else {
                    q
                }
            })
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(Fault::zero_division("integer modulo by zero"));
            }
            a.checked_rem(b).map(|r| if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
        BinOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(Fault::zero_division(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            u32::try_from(b).ok().and_then(|e| a.checked_pow(e))
        }
        _ => return bitwise_op(op, &Value::Int(a), &Value::Int(b)),
    };
    r.map(Value::Int).ok_or_else(Fault::overflow)
}

pub fn unary_op(op: UnaryOp, v: &Value) -> Result<Value, Fault> {
    match (op, v) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.truthy())),
        (UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(Fault::overflow),
        (UnaryOp::Neg, Value::Bool(b)) => Ok(Value::Int(-(*b as i64))),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Value::Int(_) | Value::Float(_)) => Ok(v.clone()),
        (UnaryOp::Pos, Value::Bool(b)) => Ok(Value::Int(*b as i64)),
        (UnaryOp::Invert, Value::Int(i)) => Ok(Value::Int(!i)),
        (UnaryOp::Invert, Value::Bool(b)) => Ok(Value::Int(!(*b as i64))),
        (UnaryOp::Neg, Value::Temporal(Temporal::Delta(d))) => temporal::negate(d).map(Value::Temporal),
        (UnaryOp::Pos, Value::Temporal(Temporal::Delta(_))) => Ok(v.clone()),
        (op, v) => Err(Fault::type_error(format!(
            "bad operand type for unary {}: '{}'",
            match op {
                UnaryOp::Neg => "-",
                UnaryOp::Invert => "~",
                _ => "+",
            },
            v.type_name()
        ))),
    }
}

/// `a == b`
pub fn py_eq(a: &Value, b: &Value) -> Result<bool, Fault> {
    eq_depth(a, b, 0)
}

fn eq_depth(a: &Value, b: &Value, depth: usize) -> Result<bool, Fault> {
    if depth > MAX_COMPARE_DEPTH {
        return Err(Fault::new(
            ExcKind::RecursionError,
            "maximum recursion depth exceeded in comparison",
        ));
    }
    if let (Some(x), Some(y)) = (num(a), num(b)) {
        return Ok(match (x, y) {
            (Num::I(x), Num::I(y)) => x == y,
            (x, y) => as_f(x) == as_f(y),
        });
    }
    Ok(match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return Ok(true);
            }
            let (x, y) = (x.borrow().clone(), y.borrow().clone());
            seq_eq(&x, &y, depth)?
        }
        (Value::Tuple(x), Value::Tuple(y)) => seq_eq(x, y, depth)?,
        (Value::Dict(x), Value::Dict(y)) => {
            if Rc::ptr_eq(x, y) {
                return Ok(true);
            }
            let (x, y) = (x.borrow().clone(), y.borrow());
            if x.len() != y.len() {
                return Ok(false);
            }
            for (k, v) in x.iter() {
                match y.get(k)? {
                    Some(other) if eq_depth(v, &other, depth + 1)? => {}
                    _ => return Ok(false),
                }
            }
            true
        }
        (Value::Range(x), Value::Range(y)) => {
            let (lx, ly) = (x.len(), y.len());
            lx == ly && (lx == 0 || (x.start == y.start && (lx == 1 || x.step == y.step)))
        }
        (Value::Type(x), Value::Type(y)) => x == y,
        (Value::Module(x), Value::Module(y)) => x == y,
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        (Value::Capability(x), Value::Capability(y)) => x == y,
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Exception(x), Value::Exception(y)) => Rc::ptr_eq(x, y),
        (Value::Method(x), Value::Method(y)) => Rc::ptr_eq(x, y),
        (Value::Match(x), Value::Match(y)) => Rc::ptr_eq(x, y),
        (Value::Temporal(x), Value::Temporal(y)) => x == y,
        _ => false,
    })
}

fn seq_eq(x: &[Value], y: &[Value], depth: usize) -> Result<bool, Fault> {
    if x.len() != y.len() {
        return Ok(false);
    }
    for (a, b) in x.iter().zip(y) {
        if !eq_depth(a, b, depth + 1)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Ordering for `<`-family operators and sorting. `None` when unordered (NaN).
pub fn py_cmp(a: &Value, b: &Value, symbol: &str) -> Result<Option<Ordering>, Fault> {
    cmp_depth(a, b, symbol, 0)
}

fn cmp_depth(a: &Value, b: &Value, symbol: &str, depth: usize) -> Result<Option<Ordering>, Fault> {
    if depth > MAX_COMPARE_DEPTH {
        return Err(Fault::new(
            ExcKind::RecursionError,
            "maximum recursion depth exceeded in comparison",
        ));
    }
    if let (Some(x), Some(y)) = (num(a), num(b)) {
        return Ok(match (x, y) {
            (Num::I(x), Num::I(y)) => Some(x.cmp(&y)),
            (x, y) => as_f(x).partial_cmp(&as_f(y)),
        });
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Some(x.cmp(y))),
        (Value::List(x), Value::List(y)) => {
            let (x, y) = (x.borrow().clone(), y.borrow().clone());
            seq_cmp(&x, &y, symbol, depth)
        }
        (Value::Tuple(x), Value::Tuple(y)) => seq_cmp(x, y, symbol, depth),
        (Value::Temporal(x), Value::Temporal(y)) if temporal::compare(x, y).is_some() => {
            Ok(temporal::compare(x, y))
        }
        _ => Err(Fault::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            symbol,
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn seq_cmp(x: &[Value], y: &[Value], symbol: &str, depth: usize) -> Result<Option<Ordering>, Fault> {
    for (a, b) in x.iter().zip(y) {
        if !eq_depth(a, b, depth + 1)? {
            return cmp_depth(a, b, symbol, depth + 1);
        }
    }
    Ok(Some(x.len().cmp(&y.len())))
}

/// `a is b`
pub fn py_is(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => Rc::ptr_eq(x, y) || x == y,
        (Value::List(x), Value::List(y)) => Rc::ptr_eq(x, y),
        (Value::Dict(x), Value::Dict(y)) => Rc::ptr_eq(x, y),
        (Value::Tuple(x), Value::Tuple(y)) => Rc::ptr_eq(x, y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Exception(x), Value::Exception(y)) => Rc::ptr_eq(x, y),
        (Value::Type(x), Value::Type(y)) => x == y,
        (Value::Module(x), Value::Module(y)) => x == y,
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        (Value::Capability(x), Value::Capability(y)) => x == y,
        _ => false,
    }
}

/// `item in container`
pub fn contains(container: &Value, item: &Value) -> Result<bool, Fault> {
    match container {
        Value::Str(s) => match item {
            Value::Str(sub) => Ok(s.contains(&**sub)),
            other => Err(Fault::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(l) => {
            let items = l.borrow().clone();
            for v in &items {
                if py_eq(v, item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Tuple(t) => {
            for v in t.iter() {
                if py_eq(v, item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Dict(d) => d.borrow().contains_key(item),
        Value::Range(r) => Ok(match item {
            Value::Int(_) | Value::Bool(_) => r.contains(item.as_index().unwrap_or(0)),
            Value::Float(f) if f.fract() == 0.0 => r.contains(*f as i64),
            _ => false,
        }),
        other => Err(Fault::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// Evaluate one link of a comparison chain.
pub fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<bool, Fault> {
    Ok(match op {
        CmpOp::Eq => py_eq(a, b)?,
        CmpOp::NotEq => !py_eq(a, b)?,
        CmpOp::Lt => py_cmp(a, b, "<")? == Some(Ordering::Less),
        CmpOp::LtE => matches!(py_cmp(a, b, "<=")?, Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => py_cmp(a, b, ">")? == Some(Ordering::Greater),
        CmpOp::GtE => matches!(py_cmp(a, b, ">=")?, Some(Ordering::Greater | Ordering::Equal)),
        CmpOp::In => contains(b, a)?,
        CmpOp::NotIn => !contains(b, a)?,
        CmpOp::Is => py_is(a, b),
        CmpOp::IsNot => !py_is(a, b),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: usize = 1_000;

    fn int(v: Value) -> i64 {
        match v {
            Value::Int(i) => i,
            other => panic!("expected int, got {:?}", other),
        }
    }

    #[test]
    fn test_floor_division_and_modulo_follow_divisor_sign() {
        assert_eq!(int(binary_op(BinOp::FloorDiv, &Value::Int(7), &Value::Int(2), CAP).unwrap()), 3);
        assert_eq!(int(binary_op(BinOp::FloorDiv, &Value::Int(-7), &Value::Int(2), CAP).unwrap()), -4);
        assert_eq!(int(binary_op(BinOp::FloorDiv, &Value::Int(7), &Value::Int(-2), CAP).unwrap()), -4);
        assert_eq!(int(binary_op(BinOp::FloorDiv, &Value::Int(-7), &Value::Int(-2), CAP).unwrap()), 3);
        assert_eq!(int(binary_op(BinOp::Mod, &Value::Int(-7), &Value::Int(3), CAP).unwrap()), 2);
        assert_eq!(int(binary_op(BinOp::Mod, &Value::Int(7), &Value::Int(-3), CAP).unwrap()), -2);
    }

    #[test]
    fn test_true_division_is_float() {
        assert!(matches!(
            binary_op(BinOp::Div, &Value::Int(7), &Value::Int(2), CAP).unwrap(),
            Value::Float(f) if f == 3.5
        ));
    }

    #[test]
    fn test_division_by_zero() {
        let err = binary_op(BinOp::Div, &Value::Int(1), &Value::Int(0), CAP).unwrap_err();
        assert_eq!(err.kind, ExcKind::ZeroDivisionError);
        assert_eq!(err.message, "division by zero");
    }

    #[test]
    fn test_overflow_is_fault() {
        let err = binary_op(BinOp::Mul, &Value::Int(i64::MAX), &Value::Int(2), CAP).unwrap_err();
        assert_eq!(err.kind, ExcKind::OverflowError);
        let err = binary_op(BinOp::Pow, &Value::Int(10), &Value::Int(40), CAP).unwrap_err();
        assert_eq!(err.kind, ExcKind::OverflowError);
    }

    #[test]
    fn test_bitwise_ops() {
        let op = |op, a, b| int(binary_op(op, &Value::Int(a), &Value::Int(b), CAP).unwrap());
        assert_eq!(op(BinOp::BitAnd, 5, 3), 1);
        assert_eq!(op(BinOp::BitOr, 5, 3), 7);
        assert_eq!(op(BinOp::BitXor, 5, 3), 6);
        assert_eq!(op(BinOp::LShift, 1, 10), 1024);
        assert_eq!(op(BinOp::RShift, -8, 1), -4);
        assert_eq!(op(BinOp::RShift, 1, 100), 0);
        assert_eq!(int(unary_op(UnaryOp::Invert, &Value::Int(5)).unwrap()), -6);

        let err = binary_op(BinOp::LShift, &Value::Int(1), &Value::Int(64), CAP).unwrap_err();
        assert_eq!(err.kind, ExcKind::OverflowError);
        let err = binary_op(BinOp::RShift, &Value::Int(1), &Value::Int(-1), CAP).unwrap_err();
        assert_eq!(err.message, "negative shift count");
        let err = binary_op(BinOp::BitAnd, &Value::Float(1.0), &Value::Int(1), CAP).unwrap_err();
        assert_eq!(err.message, "unsupported operand type(s) for &: 'float' and 'int'");
        assert!(matches!(
            binary_op(BinOp::BitOr, &Value::Bool(true), &Value::Bool(false), CAP).unwrap(),
            Value::Bool(true)
        ));
    }

    #[test]
    fn test_string_ops() {
        let s = binary_op(BinOp::Add, &Value::str("ab"), &Value::str("cd"), CAP).unwrap();
        assert_eq!(format!("{:?}", s), "'abcd'");
        let s = binary_op(BinOp::Mul, &Value::Int(3), &Value::str("ab"), CAP).unwrap();
        assert_eq!(format!("{:?}", s), "'ababab'");
        let err = binary_op(BinOp::Add, &Value::str("a"), &Value::Int(1), CAP).unwrap_err();
        assert_eq!(err.message, "can only concatenate str (not \"int\") to str");
    }

    #[test]
    fn test_repetition_respects_cap() {
        let err = binary_op(BinOp::Mul, &Value::list(vec![Value::None]), &Value::Int(10_000), CAP)
            .unwrap_err();
        assert_eq!(err.kind, ExcKind::MemoryError);
    }

    #[test]
    fn test_equality_across_numeric_types() {
        assert!(py_eq(&Value::Int(1), &Value::Float(1.0)).unwrap());
        assert!(py_eq(&Value::Bool(true), &Value::Int(1)).unwrap());
        assert!(!py_eq(&Value::Int(1), &Value::str("1")).unwrap());
        assert!(py_eq(
            &Value::list(vec![Value::Int(1), Value::str("a")]),
            &Value::list(vec![Value::Int(1), Value::str("a")])
        )
        .unwrap());
        assert!(!py_eq(&Value::list(vec![]), &Value::tuple(vec![])).unwrap());
    }

    #[test]
    fn test_ordering() {
        assert!(compare(CmpOp::Lt, &Value::Int(1), &Value::Float(1.5)).unwrap());
        assert!(compare(CmpOp::Lt, &Value::str("abc"), &Value::str("abd")).unwrap());
        assert!(compare(
            CmpOp::Lt,
            &Value::tuple(vec![Value::Int(1), Value::Int(2)]),
            &Value::tuple(vec![Value::Int(1), Value::Int(3)])
        )
        .unwrap());
        let err = compare(CmpOp::Lt, &Value::str("a"), &Value::Int(1)).unwrap_err();
        assert_eq!(
            err.message,
            "'<' not supported between instances of 'str' and 'int'"
        );
        assert!(!compare(CmpOp::Lt, &Value::Float(f64::NAN), &Value::Int(1)).unwrap());
    }

    #[test]
    fn test_membership() {
        assert!(contains(&Value::str("hello"), &Value::str("ell")).unwrap());
        assert!(contains(&Value::list(vec![Value::Int(2)]), &Value::Float(2.0)).unwrap());
        assert!(contains(&Value::tuple(vec![Value::str("x")]), &Value::str("x")).unwrap());
        assert!(contains(&Value::Int(1), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_duration_arithmetic() {
        let hour = Value::Temporal(Temporal::Delta(chrono::Duration::hours(1)));
        let half = binary_op(BinOp::Div, &hour, &Value::Int(2), CAP).unwrap();
        assert_eq!(format!("{:?}", half), "datetime.timedelta(seconds=1800)");
        let ratio = binary_op(BinOp::Div, &hour, &half, CAP).unwrap();
        assert!(matches!(ratio, Value::Float(r) if r == 2.0));
        let neg = unary_op(UnaryOp::Neg, &half).unwrap();
        assert_eq!(format!("{:?}", neg), "datetime.timedelta(days=-1, seconds=84600)");
        assert!(compare(CmpOp::Lt, &half, &hour).unwrap());
        let err = binary_op(BinOp::Mul, &hour, &hour, CAP).unwrap_err();
        assert_eq!(err.kind, ExcKind::TypeError);
    }

    #[test]
    fn test_percent_operator() {
        let v = binary_op(BinOp::Mod, &Value::str("%d items"), &Value::Int(4), CAP).unwrap();
        assert_eq!(format!("{:?}", v), "'4 items'");
    }
}
