//! Runtime values.
//!
//! Values are `Rc`-based and never leave the session worker thread; results
//! cross the boundary only after conversion to `serde_json::Value`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::builtins::Builtin;
use super::fault::{ExcKind, Fault};
use super::temporal::Temporal;
use crate::lang::ast::{FunctionDef, LambdaDef, Param};

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<Dict>>),
    Range(RangeValue),
    Function(Rc<Function>),
    Builtin(Builtin),
    Method(Rc<BoundMethod>),
    /// Host capability, resolved by name at call time
    Capability(Rc<str>),
    Module(ModuleKind),
    Type(TypeKind),
    Exception(Rc<ExceptionValue>),
    Match(Rc<MatchValue>),
    /// `datetime` module values
    Temporal(Temporal),
}

/// Containers are torn down with an explicit work list so a value nested
/// hundreds of thousands deep (`a = [a]` in a loop) does not exhaust the
/// worker's stack when its last reference goes away.
impl Drop for Value {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        take_children(self, &mut pending);
        while let Some(mut value) = pending.pop() {
            take_children(&mut value, &mut pending);
        }
    }
}

/// Move the items of a uniquely owned container into `out`, leaving it empty.
fn take_children(value: &mut Value, out: &mut Vec<Value>) {
    match value {
        Value::List(list) if Rc::strong_count(list) == 1 => {
            if let Ok(mut items) = list.try_borrow_mut() {
                out.append(&mut items);
            }
        }
        Value::Tuple(items) => {
            if let Some(items) = Rc::get_mut(items) {
                out.append(items);
            }
        }
        Value::Dict(dict) if Rc::strong_count(dict) == 1 => {
            if let Ok(mut dict) = dict.try_borrow_mut() {
                if let MissingKey::Factory(factory) = std::mem::take(&mut dict.missing) {
                    out.push(factory);
                }
                dict.index.clear();
                for (k, v) in dict.entries.drain(..) {
                    out.push(k);
                    out.push(v);
                }
            }
        }
        _ => {}
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::format::repr(self))
    }
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn string(s: String) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(items))
    }

    pub fn dict(d: Dict) -> Self {
        Value::Dict(Rc::new(RefCell::new(d)))
    }

    pub fn type_kind(&self) -> TypeKind {
        match self {
            Value::None => TypeKind::NoneType,
            Value::Bool(_) => TypeKind::Bool,
            Value::Int(_) => TypeKind::Int,
            Value::Float(_) => TypeKind::Float,
            Value::Str(_) => TypeKind::Str,
            Value::List(_) => TypeKind::List,
            Value::Tuple(_) => TypeKind::Tuple,
            Value::Dict(_) => TypeKind::Dict,
            Value::Range(_) => TypeKind::Range,
            Value::Function(_) => TypeKind::Function,
            Value::Builtin(_) | Value::Capability(_) => TypeKind::BuiltinFunction,
            Value::Method(_) => TypeKind::Method,
            Value::Module(_) => TypeKind::Module,
            Value::Type(_) => TypeKind::Type,
            Value::Exception(e) => TypeKind::Exception(e.kind),
            Value::Match(_) => TypeKind::Match,
            Value::Temporal(t) => t.type_kind(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_kind().name()
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            Value::Dict(d) => !d.borrow().is_empty(),
            Value::Range(r) => r.len() > 0,
            _ => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_)
                | Value::Builtin(_)
                | Value::Method(_)
                | Value::Capability(_)
                | Value::Type(_)
        )
    }

    /// Integer view used by indexing and `range`; bools count as ints.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn expect_str(&self, what: &str) -> Result<Rc<str>, Fault> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            other => Err(Fault::type_error(format!(
                "{} must be str, not {}",
                what,
                other.type_name()
            ))),
        }
    }

    pub fn expect_int(&self, what: &str) -> Result<i64, Fault> {
        self.as_index().ok_or_else(|| {
            Fault::type_error(format!(
                "{} must be an integer, not {}",
                what,
                self.type_name()
            ))
        })
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(*b as i64 as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Built-in classes, as returned by `type()` and accepted by `isinstance()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    NoneType,
    Bool,
    Int,
    Float,
    Str,
    List,
    Tuple,
    Dict,
    Range,
    Function,
    BuiltinFunction,
    Method,
    Module,
    Type,
    Match,
    DateTime,
    Date,
    TimeDelta,
    Exception(ExcKind),
}

impl TypeKind {
    pub fn name(self) -> &'static str {
        match self {
            TypeKind::NoneType => "NoneType",
            TypeKind::Bool => "bool",
            TypeKind::Int => "int",
            TypeKind::Float => "float",
            TypeKind::Str => "str",
            TypeKind::List => "list",
            TypeKind::Tuple => "tuple",
            TypeKind::Dict => "dict",
            TypeKind::Range => "range",
            TypeKind::Function => "function",
            TypeKind::BuiltinFunction => "builtin_function_or_method",
            TypeKind::Method => "method",
            TypeKind::Module => "module",
            TypeKind::Type => "type",
            TypeKind::Match => "re.Match",
            TypeKind::DateTime => "datetime.datetime",
            TypeKind::Date => "datetime.date",
            TypeKind::TimeDelta => "datetime.timedelta",
            TypeKind::Exception(k) => k.name(),
        }
    }

    /// Classes bound as program globals by name.
    pub fn from_global(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => TypeKind::Bool,
            "int" => TypeKind::Int,
            "float" => TypeKind::Float,
            "str" => TypeKind::Str,
            "list" => TypeKind::List,
            "tuple" => TypeKind::Tuple,
            "dict" => TypeKind::Dict,
            "range" => TypeKind::Range,
            "type" => TypeKind::Type,
            _ => return ExcKind::from_name(name).map(TypeKind::Exception),
        })
    }

    /// `isinstance(value, self)`
    pub fn contains(self, value: &Value) -> bool {
        value.type_kind().is_subclass_of(self)
    }

    /// `issubclass(self, base)`
    pub fn is_subclass_of(self, base: TypeKind) -> bool {
        match (base, self) {
            (TypeKind::Int, TypeKind::Bool) => true,
            (TypeKind::Date, TypeKind::DateTime) => true,
            (TypeKind::Exception(base), TypeKind::Exception(k)) => k.is_subclass_of(base),
            (a, b) => a == b,
        }
    }
}

/// Lazy `range(start, stop, step)`; `step` is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValue {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeValue {
    pub fn len(&self) -> usize {
        let (start, stop, step) = (self.start as i128, self.stop as i128, self.step as i128);
        let n = if step > 0 && start < stop {
            (stop - start + step - 1) / step
        } else if step < 0 && start > stop {
            (start - stop - step - 1) / (-step)
        } else {
            0
        };
        n.clamp(0, usize::MAX as i128) as usize
    }

    pub fn get(&self, i: usize) -> i64 {
        (self.start as i128 + i as i128 * self.step as i128) as i64
    }

    pub fn contains(&self, v: i64) -> bool {
        let in_bounds = if self.step > 0 {
            v >= self.start && v < self.stop
        } else {
            v <= self.start && v > self.stop
        };
        in_bounds
            && v.checked_sub(self.start)
                .and_then(|d| d.checked_rem(self.step))
                == Some(0)
    }
}

#[derive(Clone)]
pub enum FunctionBody {
    Def(Arc<FunctionDef>),
    Lambda(Arc<LambdaDef>),
}

/// User-defined function or lambda with its captured scope.
pub struct Function {
    pub name: String,
    pub body: FunctionBody,
    /// Evaluated defaults, aligned with `params()`
    pub defaults: Vec<Option<Value>>,
    pub closure: Rc<Scope>,
}

impl Function {
    pub fn params(&self) -> &[Param] {
        match &self.body {
            FunctionBody::Def(d) => &d.params,
            FunctionBody::Lambda(l) => &l.params,
        }
    }
}

/// Method looked up through the guard, bound to its receiver.
pub struct BoundMethod {
    pub receiver: Value,
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Json,
    Math,
    Time,
    Re,
    Collections,
    Datetime,
    Random,
    Itertools,
    Functools,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 9] = [
        ModuleKind::Json,
        ModuleKind::Math,
        ModuleKind::Time,
        ModuleKind::Re,
        ModuleKind::Collections,
        ModuleKind::Datetime,
        ModuleKind::Random,
        ModuleKind::Itertools,
        ModuleKind::Functools,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModuleKind::Json => "json",
            ModuleKind::Math => "math",
            ModuleKind::Time => "time",
            ModuleKind::Re => "re",
            ModuleKind::Collections => "collections",
            ModuleKind::Datetime => "datetime",
            ModuleKind::Random => "random",
            ModuleKind::Itertools => "itertools",
            ModuleKind::Functools => "functools",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// Caught or constructed exception instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionValue {
    pub kind: ExcKind,
    pub message: String,
}

impl ExceptionValue {
    pub fn from_fault(fault: &Fault) -> Self {
        Self {
            kind: fault.kind,
            message: fault.message.clone(),
        }
    }

    pub fn to_fault(&self) -> Fault {
        Fault::new(self.kind, self.message.clone())
    }
}

/// Result of a successful `re` match. Spans are byte offsets into `text`.
#[derive(Debug, Clone)]
pub struct MatchValue {
    pub text: Rc<str>,
    pub spans: Vec<Option<(usize, usize)>>,
    /// Group names by group index
    pub names: Rc<[Option<String>]>,
}

impl MatchValue {
    /// Resolve a group reference given as an index or a group name.
    pub fn group_index(&self, key: &Value) -> Result<usize, Fault> {
        let idx = match key {
            Value::Str(name) => self
                .names
                .iter()
                .position(|n| n.as_deref() == Some(&**name)),
            other => other
                .as_index()
                .and_then(|i| usize::try_from(i).ok())
                .filter(|i| *i < self.spans.len()),
        };
        idx.ok_or_else(|| Fault::index_error("no such group"))
    }

    pub fn group(&self, n: usize) -> Result<Value, Fault> {
        match self.spans.get(n) {
            Some(Some((s, e))) => Ok(Value::str(&self.text[*s..*e])),
            Some(None) => Ok(Value::None),
            None => Err(Fault::index_error("no such group")),
        }
    }

    /// Character offsets, as programs see them.
    pub fn char_span(&self, n: usize) -> Result<(i64, i64), Fault> {
        match self.spans.get(n) {
            Some(Some((s, e))) => {
                let start = self.text[..*s].chars().count() as i64;
                let end = start + self.text[*s..*e].chars().count() as i64;
                Ok((start, end))
            }
            Some(None) => Ok((-1, -1)),
            None => Err(Fault::index_error("no such group")),
        }
    }
}

/// Hashable projection of a key value. Numerically equal keys collide like
/// they do in the source language (`1`, `1.0` and `True` are one key).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Tuple(Vec<HashKey>),
    Type(&'static str),
    Temporal(Temporal),
}

impl HashKey {
    pub fn from_value(value: &Value) -> Result<Self, Fault> {
        Ok(match value {
            Value::None => HashKey::None,
            Value::Bool(b) => HashKey::Int(*b as i64),
            Value::Int(i) => HashKey::Int(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    HashKey::Int(*f as i64)
                } else {
                    HashKey::Float(f.to_bits())
                }
            }
            Value::Str(s) => HashKey::Str(s.clone()),
            Value::Tuple(items) => HashKey::Tuple(
                items
                    .iter()
                    .map(HashKey::from_value)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Type(t) => HashKey::Type(t.name()),
            Value::Temporal(t) => HashKey::Temporal(*t),
            other => {
                return Err(Fault::type_error(format!(
                    "unhashable type: '{}'",
                    other.type_name()
                )))
            }
        })
    }
}

/// What `d[key]` does when `key` is absent.
#[derive(Clone, Default)]
pub enum MissingKey {
    #[default]
    Raise,
    /// `collections.Counter`: absent keys read as zero and are not stored
    Count,
    /// `collections.defaultdict`: store and return the factory's result;
    /// a `None` factory raises like a plain dict
    Factory(Value),
}

/// Insertion-ordered dictionary.
#[derive(Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
    index: HashMap<HashKey, usize>,
    pub missing: MissingKey,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, Fault> {
        let hk = HashKey::from_value(key)?;
        Ok(self.index.get(&hk).map(|i| self.entries[*i].1.clone()))
    }

    pub fn contains_key(&self, key: &Value) -> Result<bool, Fault> {
        Ok(self.index.contains_key(&HashKey::from_value(key)?))
    }

    /// Insert or replace; replacing keeps the original position and key.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), Fault> {
        let hk = HashKey::from_value(&key)?;
        match self.index.get(&hk) {
            Some(i) => self.entries[*i].1 = value,
            None => {
                self.index.insert(hk, self.entries.len());
                self.entries.push((key, value));
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>, Fault> {
        let hk = HashKey::from_value(key)?;
        let Some(pos) = self.index.remove(&hk) else {
            return Ok(None);
        };
        let (_, value) = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Ok(Some(value))
    }

    /// Remove and return the most recently inserted entry.
    pub fn pop_last(&mut self) -> Option<(Value, Value)> {
        let (k, v) = self.entries.pop()?;
        if let Ok(hk) = HashKey::from_value(&k) {
            self.index.remove(&hk);
        }
        Some((k, v))
    }

    /// Remove every entry, keeping the missing-key behavior. The caller
    /// drops the returned entries once no borrow is held.
    pub fn take_entries(&mut self) -> Vec<(Value, Value)> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }

    pub fn is_counter(&self) -> bool {
        matches!(self.missing, MissingKey::Count)
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn items(&self) -> Vec<(Value, Value)> {
        self.entries.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }
}

/// Lexical scope: the program namespace at the root, one child per function call
/// and per comprehension.
pub struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn root() -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn child(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.vars.borrow().get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.vars.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.vars.borrow_mut().insert(name.to_string(), value);
    }

    pub fn remove(&self, name: &str) -> bool {
        self.vars.borrow_mut().remove(name).is_some()
    }

    /// Drop every binding. Breaks reference cycles between functions and the
    /// scope they were defined in.
    pub fn clear(&self) {
        let drained: Vec<Value> = self.vars.borrow_mut().drain().map(|(_, v)| v).collect();
        drop(drained);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.truthy());
        assert!(!Value::Int(0).truthy());
        assert!(Value::str("x").truthy());
        assert!(!Value::list(vec![]).truthy());
        assert!(!Value::dict(Dict::new()).truthy());
    }

    #[test]
    fn test_range_len_and_contains() {
        let r = RangeValue {
            start: 0,
            stop: 10,
            step: 3,
        };
        assert_eq!(r.len(), 4);
        assert!(r.contains(9));
        assert!(!r.contains(10));
        let r = RangeValue {
            start: 5,
            stop: 0,
            step: -2,
        };
        assert_eq!(r.len(), 3);
        assert_eq!(r.get(2), 1);
    }

    #[test]
    fn test_dict_order_and_numeric_keys() {
        let mut d = Dict::new();
        d.insert(Value::str("b"), Value::Int(1)).unwrap();
        d.insert(Value::str("a"), Value::Int(2)).unwrap();
        d.insert(Value::Int(1), Value::str("int")).unwrap();
        d.insert(Value::Float(1.0), Value::str("float")).unwrap();
        assert_eq!(d.len(), 3);
        assert!(matches!(d.get(&Value::Bool(true)).unwrap(), Some(Value::Str(ref s)) if &**s == "float"));
        d.remove(&Value::str("b")).unwrap();
        let keys: Vec<String> = d.keys().iter().map(|k| format!("{:?}", k)).collect();
        assert_eq!(keys, vec!["'a'", "1"]);
        assert!(d.get(&Value::str("a")).unwrap().is_some());
    }

    #[test]
    fn test_unhashable_key() {
        let mut d = Dict::new();
        let err = d.insert(Value::list(vec![]), Value::None).unwrap_err();
        assert_eq!(err.message, "unhashable type: 'list'");
    }

    #[test]
    fn test_scope_chain() {
        let root = Scope::root();
        root.set("x", Value::Int(1));
        let child = Scope::child(&root);
        child.set("y", Value::Int(2));
        assert!(child.lookup("x").is_some());
        assert!(root.lookup("y").is_none());
        assert!(child.get_local("x").is_none());
    }

    #[test]
    fn test_isinstance_bool_is_int() {
        assert!(TypeKind::Int.contains(&Value::Bool(true)));
        assert!(!TypeKind::Bool.contains(&Value::Int(1)));
    }

    #[test]
    fn test_subclass_relations() {
        assert!(TypeKind::Bool.is_subclass_of(TypeKind::Int));
        assert!(TypeKind::DateTime.is_subclass_of(TypeKind::Date));
        assert!(!TypeKind::Date.is_subclass_of(TypeKind::DateTime));
        assert!(TypeKind::Exception(ExcKind::KeyError)
            .is_subclass_of(TypeKind::Exception(ExcKind::LookupError)));
        assert!(!TypeKind::Int.is_subclass_of(TypeKind::Float));
    }

    #[test]
    fn test_take_entries_keeps_missing_key_behavior() {
        let mut d = Dict::new();
        d.missing = MissingKey::Count;
        d.insert(Value::str("a"), Value::Int(1)).unwrap();
        let taken = d.take_entries();
        assert_eq!(taken.len(), 1);
        assert!(d.is_empty());
        assert!(d.is_counter());
        assert!(d.get(&Value::str("a")).unwrap().is_none());
    }
}
