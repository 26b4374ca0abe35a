//! Access guards.
//!
//! The interpreter never touches an attribute, item, iterator or unpacking
//! target directly: every such access is routed through an [`AccessGuard`]
//! held by the execution environment. [`DefaultGuard`] exposes only the
//! per-type method tables and the safe-module members.

use std::rc::Rc;

use super::fault::{ExcKind, Fault};
use super::format::repr;
use super::methods::lookup_value_method;
use super::modules::{module_attr, type_attr};
use super::value::{BoundMethod, RangeValue, Value};

/// Policy hooks for every indirect access a program can perform.
pub trait AccessGuard: Send + Sync {
    /// `obj.name`
    fn getattr(&self, obj: &Value, name: &str) -> Result<Value, Fault>;

    /// `obj.name = value`
    fn setattr(&self, _obj: &Value, _name: &str, _value: Value) -> Result<(), Fault> {
        Err(Fault::attribute_error("attribute assignment is not allowed"))
    }

    /// `obj[key]`
    fn getitem(&self, obj: &Value, key: &Value) -> Result<Value, Fault>;

    /// `obj[lower:upper:step]`
    fn getslice(&self, obj: &Value, slice: &SliceArgs) -> Result<Value, Fault>;

    /// `obj[key] = value`
    fn setitem(&self, obj: &Value, key: Value, value: Value) -> Result<(), Fault>;

    /// `del obj[key]`
    fn delitem(&self, obj: &Value, key: &Value) -> Result<(), Fault>;

    /// `for x in obj`
    fn iter(&self, obj: &Value) -> Result<ValueIter, Fault>;

    /// `a, b = obj`
    fn unpack(&self, obj: &Value, count: usize) -> Result<Vec<Value>, Fault> {
        let mut it = self.iter(obj)?;
        let items: Vec<Value> = it.by_ref().take(count).collect();
        if items.len() < count {
            return Err(Fault::value_error(format!(
                "not enough values to unpack (expected {}, got {})",
                count,
                items.len()
            )));
        }
        if it.next().is_some() {
            return Err(Fault::value_error(format!(
                "too many values to unpack (expected {})",
                count
            )));
        }
        Ok(items)
    }
}

/// Iterator handed out by [`AccessGuard::iter`]. Containers are snapshotted;
/// ranges are produced lazily.
pub enum ValueIter {
    Items(std::vec::IntoIter<Value>),
    Range { range: RangeValue, next: usize, len: usize },
}

impl ValueIter {
    pub fn items(items: Vec<Value>) -> Self {
        ValueIter::Items(items.into_iter())
    }
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::Items(it) => it.next(),
            ValueIter::Range { range, next, len } => {
                if *next >= *len {
                    return None;
                }
                let v = range.get(*next);
                *next += 1;
                Some(Value::Int(v))
            }
        }
    }

    fn nth(&mut self, n: usize) -> Option<Value> {
        match self {
            ValueIter::Items(it) => it.nth(n),
            ValueIter::Range { next, .. } => {
                *next = next.saturating_add(n);
                self.next()
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = match self {
            ValueIter::Items(it) => it.len(),
            ValueIter::Range { next, len, .. } => len.saturating_sub(*next),
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for ValueIter {}

/// Evaluated slice bounds; `None` means omitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SliceArgs {
    pub lower: Option<i64>,
    pub upper: Option<i64>,
    pub step: Option<i64>,
}

impl SliceArgs {
    /// Resolve against a sequence length: `(start, step, count)`.
    pub fn indices(&self, len: usize) -> Result<(i64, i64, usize), Fault> {
        let len = len as i64;
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(Fault::value_error("slice step cannot be zero"));
        }
        let adjust = |v: i64, lo: i64, hi: i64| -> i64 {
            if v < 0 {
                (v + len).max(lo)
            } else {
                v.min(hi)
            }
        };
        let (start, stop) = if step > 0 {
            (
                self.lower.map_or(0, |v| adjust(v, 0, len)),
                self.upper.map_or(len, |v| adjust(v, 0, len)),
            )
        } else {
            (
                self.lower.map_or(len - 1, |v| adjust(v, -1, len - 1)),
                self.upper.map_or(-1, |v| adjust(v, -1, len - 1)),
            )
        };
        let count = if step > 0 && stop > start {
            (stop - start + step - 1) / step
        } else if step < 0 && start > stop {
            (start - stop - step - 1) / (-step)
        } else {
            0
        };
        Ok((start, step, count as usize))
    }
}

fn slice_items<T: Clone>(items: &[T], slice: &SliceArgs) -> Result<Vec<T>, Fault> {
    let (start, step, count) = slice.indices(items.len())?;
    Ok((0..count)
        .map(|i| items[(start + i as i64 * step) as usize].clone())
        .collect())
}

/// Normalize a possibly negative index; `None` when out of range.
pub fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if i < 0 { i + len } else { i };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(idx as usize)
    }
}

fn index_of(key: &Value, container: &Value) -> Result<i64, Fault> {
    key.as_index().ok_or_else(|| {
        Fault::type_error(format!(
            "{} indices must be integers or slices, not {}",
            container.type_name(),
            key.type_name()
        ))
    })
}

pub fn key_error(key: &Value) -> Fault {
    Fault::new(ExcKind::KeyError, repr(key))
}

/// Guard used by every environment unless the host installs its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultGuard;

impl DefaultGuard {
    pub fn new() -> Self {
        Self
    }
}

impl AccessGuard for DefaultGuard {
    fn getattr(&self, obj: &Value, name: &str) -> Result<Value, Fault> {
        if name.starts_with('_') {
            return Err(Fault::attribute_error(format!(
                "\"{}\" is an invalid attribute name because it starts with \"_\"",
                name
            )));
        }
        match obj {
            Value::Module(m) => module_attr(*m, name).ok_or_else(|| {
                Fault::attribute_error(format!(
                    "module '{}' has no attribute '{}'",
                    m.name(),
                    name
                ))
            }),
            Value::Exception(e) if name == "args" => Ok(if e.message.is_empty() {
                Value::tuple(vec![])
            } else {
                Value::tuple(vec![Value::str(&e.message)])
            }),
            Value::Type(t) => type_attr(*t, name).ok_or_else(|| {
                Fault::attribute_error(format!(
                    "type object '{}' has no attribute '{}'",
                    t.name(),
                    name
                ))
            }),
            Value::Temporal(t) if t.field(name).is_some() => {
                t.field(name).ok_or_else(|| Fault::attribute_error(name.to_string()))
            }
            other => match lookup_value_method(other, name) {
                Some(method) => Ok(Value::Method(Rc::new(BoundMethod {
                    receiver: other.clone(),
                    name: method,
                }))),
                None => Err(Fault::attribute_error(format!(
                    "'{}' object has no attribute '{}'",
                    other.type_name(),
                    name
                ))),
            },
        }
    }

    fn getitem(&self, obj: &Value, key: &Value) -> Result<Value, Fault> {
        match obj {
            Value::List(l) => {
                let i = index_of(key, obj)?;
                let items = l.borrow();
                normalize_index(i, items.len())
                    .map(|i| items[i].clone())
                    .ok_or_else(|| Fault::index_error("list index out of range"))
            }
            Value::Tuple(t) => {
                let i = index_of(key, obj)?;
                normalize_index(i, t.len())
                    .map(|i| t[i].clone())
                    .ok_or_else(|| Fault::index_error("tuple index out of range"))
            }
            Value::Str(s) => {
                let i = index_of(key, obj)?;
                let len = s.chars().count();
                normalize_index(i, len)
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::string(c.to_string()))
                    .ok_or_else(|| Fault::index_error("string index out of range"))
            }
            Value::Range(r) => {
                let i = index_of(key, obj)?;
                normalize_index(i, r.len())
                    .map(|i| Value::Int(r.get(i)))
                    .ok_or_else(|| Fault::index_error("range object index out of range"))
            }
            Value::Dict(d) => d.borrow().get(key)?.ok_or_else(|| key_error(key)),
            Value::Match(m) => {
                let idx = m.group_index(key)?;
                m.group(idx)
            }
            other => Err(Fault::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    fn getslice(&self, obj: &Value, slice: &SliceArgs) -> Result<Value, Fault> {
        match obj {
            Value::List(l) => Ok(Value::list(slice_items(&l.borrow(), slice)?)),
            Value::Tuple(t) => Ok(Value::tuple(slice_items(t, slice)?)),
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                Ok(Value::string(slice_items(&chars, slice)?.into_iter().collect()))
            }
            Value::Range(r) => {
                let (start, step, count) = slice.indices(r.len())?;
                let first = r.start as i128 + start as i128 * r.step as i128;
                let new_step = r.step as i128 * step as i128;
                let stop = first + count as i128 * new_step;
                let fits = |v: i128| i64::try_from(v).map_err(|_| Fault::overflow());
                Ok(Value::Range(RangeValue {
                    start: fits(first)?,
                    stop: fits(stop)?,
                    step: fits(new_step)?,
                }))
            }
            other => Err(Fault::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    fn setitem(&self, obj: &Value, key: Value, value: Value) -> Result<(), Fault> {
        match obj {
            Value::List(l) => {
                let i = index_of(&key, obj)?;
                let mut items = l.borrow_mut();
                let len = items.len();
                match normalize_index(i, len) {
                    Some(i) => {
                        items[i] = value;
                        Ok(())
                    }
                    None => Err(Fault::index_error("list assignment index out of range")),
                }
            }
            Value::Dict(d) => d.borrow_mut().insert(key, value),
            other => Err(Fault::type_error(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ))),
        }
    }

    fn delitem(&self, obj: &Value, key: &Value) -> Result<(), Fault> {
        match obj {
            Value::List(l) => {
                let i = index_of(key, obj)?;
                let mut items = l.borrow_mut();
                let len = items.len();
                match normalize_index(i, len) {
                    Some(i) => {
                        items.remove(i);
                        Ok(())
                    }
                    None => Err(Fault::index_error("list assignment index out of range")),
                }
            }
            Value::Dict(d) => {
                let removed = d.borrow_mut().remove(key)?;
                removed.map(|_| ()).ok_or_else(|| key_error(key))
            }
            other => Err(Fault::type_error(format!(
                "'{}' object does not support item deletion",
                other.type_name()
            ))),
        }
    }

    fn iter(&self, obj: &Value) -> Result<ValueIter, Fault> {
        Ok(match obj {
            Value::List(l) => ValueIter::items(l.borrow().clone()),
            Value::Tuple(t) => ValueIter::items(t.to_vec()),
            Value::Dict(d) => ValueIter::items(d.borrow().keys()),
            Value::Str(s) => ValueIter::items(s.chars().map(|c| Value::string(c.to_string())).collect()),
            Value::Range(r) => ValueIter::Range {
                range: *r,
                next: 0,
                len: r.len(),
            },
            other => {
                return Err(Fault::type_error(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::value::{Dict, ModuleKind};

    fn ints(v: &[i64]) -> Value {
        Value::list(v.iter().map(|i| Value::Int(*i)).collect())
    }

    #[test]
    fn test_private_attributes_are_denied() {
        let guard = DefaultGuard::new();
        let err = guard.getattr(&Value::str("x"), "__class__").unwrap_err();
        assert_eq!(err.kind, ExcKind::AttributeError);
        assert!(err.message.contains("starts with \"_\""));
    }

    #[test]
    fn test_only_table_methods_resolve() {
        let guard = DefaultGuard::new();
        assert!(matches!(
            guard.getattr(&Value::str("x"), "upper").unwrap(),
            Value::Method(_)
        ));
        let err = guard.getattr(&Value::str("x"), "encode").unwrap_err();
        assert_eq!(err.message, "'str' object has no attribute 'encode'");
        let err = guard.getattr(&Value::Module(ModuleKind::Math), "system").unwrap_err();
        assert_eq!(err.message, "module 'math' has no attribute 'system'");
    }

    #[test]
    fn test_attribute_assignment_is_denied() {
        let guard = DefaultGuard::new();
        let err = guard.setattr(&Value::list(vec![]), "x", Value::None).unwrap_err();
        assert_eq!(err.message, "attribute assignment is not allowed");
    }

    #[test]
    fn test_negative_indexing() {
        let guard = DefaultGuard::new();
        let list = ints(&[1, 2, 3]);
        assert!(matches!(guard.getitem(&list, &Value::Int(-1)).unwrap(), Value::Int(3)));
        let err = guard.getitem(&list, &Value::Int(3)).unwrap_err();
        assert_eq!(err.message, "list index out of range");
        let err = guard.getitem(&list, &Value::str("a")).unwrap_err();
        assert_eq!(err.message, "list indices must be integers or slices, not str");
    }

    #[test]
    fn test_missing_dict_key() {
        let guard = DefaultGuard::new();
        let err = guard
            .getitem(&Value::dict(Dict::new()), &Value::str("k"))
            .unwrap_err();
        assert_eq!(err.to_string(), "KeyError: 'k'");
    }

    #[test]
    fn test_slices() {
        let guard = DefaultGuard::new();
        let list = ints(&[0, 1, 2, 3, 4, 5]);
        let s = |lower, upper, step| SliceArgs { lower, upper, step };
        let render = |v: Value| format!("{:?}", v);
        assert_eq!(render(guard.getslice(&list, &s(Some(1), Some(4), None)).unwrap()), "[1, 2, 3]");
        assert_eq!(render(guard.getslice(&list, &s(None, None, Some(-1))).unwrap()), "[5, 4, 3, 2, 1, 0]");
        assert_eq!(render(guard.getslice(&list, &s(Some(-2), None, None)).unwrap()), "[4, 5]");
        assert_eq!(render(guard.getslice(&list, &s(None, None, Some(2))).unwrap()), "[0, 2, 4]");
        assert_eq!(render(guard.getslice(&Value::str("hello"), &s(None, Some(-1), None)).unwrap()), "'hell'");
        let r = Value::Range(RangeValue { start: 0, stop: 10, step: 1 });
        assert_eq!(render(guard.getslice(&r, &s(Some(2), Some(8), Some(3))).unwrap()), "range(2, 8, 3)");
    }

    #[test]
    fn test_unpack_counts() {
        let guard = DefaultGuard::new();
        let err = guard.unpack(&ints(&[1, 2, 3]), 2).unwrap_err();
        assert_eq!(err.message, "too many values to unpack (expected 2)");
        let err = guard.unpack(&ints(&[1]), 2).unwrap_err();
        assert_eq!(err.message, "not enough values to unpack (expected 2, got 1)");
        assert_eq!(guard.unpack(&Value::str("ab"), 2).unwrap().len(), 2);
    }

    #[test]
    fn test_range_iteration_is_lazy() {
        let guard = DefaultGuard::new();
        let r = Value::Range(RangeValue { start: 0, stop: i64::MAX, step: 1 });
        let mut it = guard.iter(&r).unwrap();
        assert!(matches!(it.next(), Some(Value::Int(0))));
        assert!(guard.iter(&Value::Int(3)).is_err());
    }
}
