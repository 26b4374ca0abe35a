//! Tree-walking evaluator.
//!
//! One [`Interpreter`] per execution. It owns the step counter, call depth and
//! the stack of exceptions being handled; everything else (capabilities, guard,
//! limits, output) comes from the environment and the execution context.

use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;

use super::builtins::{call_builtin, call_type, Args, Builtin};
use super::convert::{from_json, to_json};
use super::fault::{ExcKind, Fault};
use super::format::{format_value, repr_within, to_str_within};
use super::guards::{AccessGuard, SliceArgs, ValueIter};
use super::methods::call_method;
use super::modules::{compile_regex, module_attr};
use super::ops::{binary_op, check_len, compare, unary_op};
use super::value::{Dict, ExceptionValue, Function, FunctionBody, MissingKey, Scope, TypeKind, Value};
use crate::capabilities::CapabilityError;
use crate::environment::ExecutionEnvironment;
use crate::lang::ast::{
    Arg, BinOp, BoolOp, Comprehension, ExceptHandler, Expr, FStringPart, ParamKind, Stmt, StmtKind,
    Target,
};
use crate::session::{deadline_fault, ExecContext};

/// Deadline and cancellation are checked once per this many polls.
const POLL_INTERVAL: u32 = 64;
const SLEEP_SLICE: Duration = Duration::from_millis(50);
const REGEX_CACHE_SIZE: usize = 64;
const CLOSURE_PRUNE_AT: usize = 4096;

/// How a statement finished.
enum Flow {
    Next,
    Break,
    Continue,
    Return(Value),
}

pub struct Interpreter<'a> {
    env: &'a ExecutionEnvironment,
    ctx: &'a ExecContext,
    steps: u64,
    polls: u32,
    depth: usize,
    /// Exceptions whose `except` body is running, innermost last
    handling: Vec<Fault>,
    /// Non-root scopes captured by functions; cleared on release to break cycles
    closures: HashMap<*const Scope, Weak<Scope>>,
    regexes: HashMap<(String, i64), Regex>,
    /// `random` module state, created on first use
    rng: Option<StdRng>,
}

impl<'a> Interpreter<'a> {
    pub fn new(env: &'a ExecutionEnvironment, ctx: &'a ExecContext) -> Self {
        Self {
            env,
            ctx,
            steps: 0,
            polls: 0,
            depth: 0,
            handling: Vec::new(),
            closures: HashMap::new(),
            regexes: HashMap::new(),
            rng: None,
        }
    }

    /// Execute a program body in `scope`.
    pub fn run(&mut self, body: &[Stmt], scope: &Rc<Scope>) -> Result<(), Fault> {
        self.exec_block(body, scope).map(|_| ())
    }

    /// Drop interpreter-held state and clear every scope captured by a closure.
    pub fn release(&mut self) {
        for (_, weak) in self.closures.drain() {
            if let Some(scope) = weak.upgrade() {
                scope.clear();
            }
        }
        self.handling.clear();
        self.regexes.clear();
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn guard(&self) -> &'a dyn AccessGuard {
        self.env.guard()
    }

    pub fn cap(&self) -> usize {
        self.env.limits().max_collection_len
    }

    pub fn check_len(&self, len: usize) -> Result<(), Fault> {
        check_len(len, self.cap())
    }

    /// Count one step against the budget.
    pub fn tick(&mut self) -> Result<(), Fault> {
        self.steps += 1;
        let max = self.env.limits().max_steps;
        if self.steps > max {
            return Err(Fault::timeout(format!(
                "execution exceeded the step limit of {} steps",
                max
            )));
        }
        self.poll()
    }

    /// Periodic deadline check for host loops that do not count steps.
    pub fn poll(&mut self) -> Result<(), Fault> {
        self.polls = self.polls.wrapping_add(1);
        if self.polls % POLL_INTERVAL == 0 {
            self.check_deadline()?;
        }
        Ok(())
    }

    fn check_deadline(&self) -> Result<(), Fault> {
        if self.ctx.cancelled() || Instant::now() >= self.ctx.deadline {
            return Err(deadline_fault(self.ctx.timeout));
        }
        Ok(())
    }

    pub fn write_output(&mut self, text: &str) -> Result<(), Fault> {
        self.ctx.output.push(text)
    }

    /// `time.sleep`: sleeps in slices so the deadline and cancellation stay enforced.
    pub fn sleep(&mut self, secs: f64) -> Result<(), Fault> {
        if secs.is_nan() || secs < 0.0 {
            return Err(Fault::value_error("sleep length must be non-negative"));
        }
        let mut remaining = Duration::try_from_secs_f64(secs)
            .map_err(|_| Fault::new(ExcKind::OverflowError, "sleep length is too large"))?;
        while !remaining.is_zero() {
            self.check_deadline()?;
            let slice = remaining.min(SLEEP_SLICE);
            thread::sleep(slice);
            remaining -= slice;
        }
        self.check_deadline()
    }

    /// Compiled pattern, cached per execution.
    pub fn regex(&mut self, pattern: &str, flags: i64) -> Result<Regex, Fault> {
        let key = (pattern.to_string(), flags);
        if let Some(re) = self.regexes.get(&key) {
            return Ok(re.clone());
        }
        let re = compile_regex(pattern, flags)?;
        if self.regexes.len() >= REGEX_CACHE_SIZE {
            self.regexes.clear();
        }
        self.regexes.insert(key, re.clone());
        Ok(re)
    }

    pub fn rng(&mut self) -> &mut StdRng {
        self.rng.get_or_insert_with(StdRng::from_entropy)
    }

    /// `random.seed`: a fixed seed makes the sequence reproducible.
    pub fn seed_rng(&mut self, seed: Option<u64>) {
        self.rng = Some(match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        });
    }

    /// `obj[key]` through the guard, then the dict's missing-key behavior.
    fn subscript(&mut self, obj: &Value, key: &Value) -> Result<Value, Fault> {
        let fault = match self.guard().getitem(obj, key) {
            Err(fault) if fault.kind == ExcKind::KeyError => fault,
            other => return other,
        };
        let Value::Dict(d) = obj else {
            return Err(fault);
        };
        let missing = d.borrow().missing.clone();
        match missing {
            MissingKey::Count => Ok(Value::Int(0)),
            MissingKey::Factory(factory) if !matches!(factory, Value::None) => {
                let value = self.call_value(&factory, Vec::new(), Vec::new())?;
                self.check_len(d.borrow().len() + 1)?;
                d.borrow_mut().insert(key.clone(), value.clone())?;
                Ok(value)
            }
            _ => Err(fault),
        }
    }

    pub fn iterate(&mut self, value: &Value) -> Result<ValueIter, Fault> {
        self.guard().iter(value)
    }

    /// Materialize an iterable, refusing anything past the collection cap.
    pub fn collect(&mut self, value: &Value) -> Result<Vec<Value>, Fault> {
        let it = self.iterate(value)?;
        self.check_len(it.len())?;
        Ok(it.collect())
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn exec_block(&mut self, body: &[Stmt], scope: &Rc<Scope>) -> Result<Flow, Fault> {
        for stmt in body {
            let flow = self
                .exec_stmt(stmt, scope)
                .map_err(|fault| fault.at(stmt.line))?;
            if !matches!(flow, Flow::Next) {
                return Ok(flow);
            }
        }
        Ok(Flow::Next)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &Rc<Scope>) -> Result<Flow, Fault> {
        self.tick()?;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr, scope)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value, scope)?;
                for target in targets {
                    self.assign(target, value.clone(), scope)?;
                }
            }
            StmtKind::AugAssign { target, op, value } => self.aug_assign(target, *op, value, scope)?,
            StmtKind::If { test, body, orelse } => {
                let branch = if self.eval(test, scope)?.truthy() { body } else { orelse };
                return self.exec_block(branch, scope);
            }
            StmtKind::While { test, body, orelse } => {
                loop {
                    if !self.eval(test, scope)?.truthy() {
                        break;
                    }
                    match self.exec_block(body, scope)? {
                        Flow::Break => return Ok(Flow::Next),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Next | Flow::Continue => {}
                    }
                    self.tick()?;
                }
                return self.exec_block(orelse, scope);
            }
            StmtKind::For { target, iter, body, orelse } => {
                let iterable = self.eval(iter, scope)?;
                for item in self.iterate(&iterable)? {
                    self.tick()?;
                    self.assign(target, item, scope)?;
                    match self.exec_block(body, scope)? {
                        Flow::Break => return Ok(Flow::Next),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Next | Flow::Continue => {}
                    }
                }
                return self.exec_block(orelse, scope);
            }
            StmtKind::FunctionDef(def) => {
                let func = self.make_function(def.name.clone(), FunctionBody::Def(Arc::clone(def)), scope)?;
                scope.set(&def.name, func);
            }
            StmtKind::Return(value) => {
                let v = match value {
                    Some(e) => self.eval(e, scope)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(v));
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => return self.exec_try(body, handlers, orelse, finalbody, scope),
            StmtKind::Raise(None) => {
                return Err(self.handling.last().cloned().unwrap_or_else(|| {
                    Fault::new(ExcKind::RuntimeError, "No active exception to reraise")
                }));
            }
            StmtKind::Raise(Some(expr)) => {
                let value = self.eval(expr, scope)?;
                return Err(raised_fault(&value)?);
            }
            StmtKind::Assert { test, msg } => {
                if !self.eval(test, scope)?.truthy() {
                    let message = match msg {
                        Some(m) => to_str_within(&self.eval(m, scope)?, self.cap())?,
                        None => String::new(),
                    };
                    return Err(Fault::new(ExcKind::AssertionError, message));
                }
            }
            StmtKind::Import(aliases) => {
                for alias in aliases {
                    let module = self.env.module(&alias.name).ok_or_else(|| import_denied(&alias.name))?;
                    scope.set(alias.bound_name(), Value::Module(module));
                }
            }
            StmtKind::ImportFrom { module, names } => {
                let kind = self.env.module(module).ok_or_else(|| import_denied(module))?;
                for alias in names {
                    if alias.name == "*" {
                        return Err(Fault::new(
                            ExcKind::ImportError,
                            format!("wildcard import from '{}' is not allowed", module),
                        ));
                    }
                    let value = module_attr(kind, &alias.name).ok_or_else(|| {
                        Fault::new(
                            ExcKind::ImportError,
                            format!("cannot import name '{}' from '{}'", alias.name, module),
                        )
                    })?;
                    scope.set(alias.bound_name(), value);
                }
            }
            StmtKind::Delete(targets) => {
                for target in targets {
                    self.delete(target, scope)?;
                }
            }
            StmtKind::Pass => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Next)
    }

    fn exec_try(
        &mut self,
        body: &[Stmt],
        handlers: &[ExceptHandler],
        orelse: &[Stmt],
        finalbody: &[Stmt],
        scope: &Rc<Scope>,
    ) -> Result<Flow, Fault> {
        let outcome = match self.exec_block(body, scope) {
            Ok(Flow::Next) => self.exec_block(orelse, scope),
            Ok(flow) => Ok(flow),
            Err(fault) if fault.kind.is_budget() => return Err(fault),
            Err(fault) => self.handle(fault, handlers, scope),
        };
        if let Err(fault) = &outcome {
            if fault.kind.is_budget() {
                return outcome;
            }
        }
        if finalbody.is_empty() {
            return outcome;
        }
        match self.exec_block(finalbody, scope)? {
            Flow::Next => outcome,
            flow => Ok(flow),
        }
    }

    fn handle(
        &mut self,
        fault: Fault,
        handlers: &[ExceptHandler],
        scope: &Rc<Scope>,
    ) -> Result<Flow, Fault> {
        for handler in handlers {
            let matched = match &handler.kind {
                None => true,
                Some(expr) => {
                    let class = self.eval(expr, scope).map_err(|f| f.at(handler.line))?;
                    exception_matches(fault.kind, &class).map_err(|f| f.at(handler.line))?
                }
            };
            if !matched {
                continue;
            }
            if let Some(name) = &handler.name {
                scope.set(
                    name,
                    Value::Exception(Rc::new(ExceptionValue::from_fault(&fault))),
                );
            }
            self.handling.push(fault);
            let flow = self.exec_block(&handler.body, scope);
            self.handling.pop();
            if let Some(name) = &handler.name {
                scope.remove(name);
            }
            return flow;
        }
        Err(fault)
    }

    fn aug_assign(&mut self, target: &Target, op: BinOp, value: &Expr, scope: &Rc<Scope>) -> Result<(), Fault> {
        match target {
            Target::Name(name) => {
                let current = self.lookup(name, scope)?;
                let rhs = self.eval(value, scope)?;
                let updated = self.inplace(op, &current, &rhs)?;
                scope.set(name, updated);
            }
            Target::Subscript { value: obj, index } => {
                let obj = self.eval(obj, scope)?;
                if matches!(index, Expr::Slice { .. }) {
                    return Err(Fault::type_error("slice assignment is not supported"));
                }
                let key = self.eval(index, scope)?;
                let current = self.subscript(&obj, &key)?;
                let rhs = self.eval(value, scope)?;
                let updated = self.inplace(op, &current, &rhs)?;
                self.guard().setitem(&obj, key, updated)?;
            }
            Target::Attribute { value: obj, attr } => {
                let obj = self.eval(obj, scope)?;
                let current = self.guard().getattr(&obj, attr)?;
                let rhs = self.eval(value, scope)?;
                let updated = self.inplace(op, &current, &rhs)?;
                self.guard().setattr(&obj, attr, updated)?;
            }
            Target::Tuple(_) | Target::Starred(_) => {
                return Err(Fault::type_error(
                    "illegal expression for augmented assignment",
                ))
            }
        }
        Ok(())
    }

    /// `a op= b`; lists extend in place, everything else rebinds.
    fn inplace(&mut self, op: BinOp, current: &Value, rhs: &Value) -> Result<Value, Fault> {
        if let (BinOp::Add, Value::List(list)) = (op, current) {
            let items = self.collect(rhs)?;
            let len = list.borrow().len();
            self.check_len(len + items.len())?;
            list.borrow_mut().extend(items);
            return Ok(current.clone());
        }
        binary_op(op, current, rhs, self.cap())
    }

    fn assign(&mut self, target: &Target, value: Value, scope: &Rc<Scope>) -> Result<(), Fault> {
        match target {
            Target::Name(name) => scope.set(name, value),
            Target::Tuple(targets) => match targets.iter().position(|t| matches!(t, Target::Starred(_))) {
                Some(star) => self.assign_starred(targets, star, value, scope)?,
                None => {
                    let items = self.guard().unpack(&value, targets.len())?;
                    for (t, v) in targets.iter().zip(items) {
                        self.assign(t, v, scope)?;
                    }
                }
            },
            Target::Starred(_) => {
                return Err(Fault::type_error(
                    "starred assignment target must be in a list or tuple",
                ))
            }
            Target::Subscript { value: obj, index } => {
                let obj = self.eval(obj, scope)?;
                if matches!(index, Expr::Slice { .. }) {
                    return Err(Fault::type_error("slice assignment is not supported"));
                }
                let key = self.eval(index, scope)?;
                self.guard().setitem(&obj, key, value)?;
            }
            Target::Attribute { value: obj, attr } => {
                let obj = self.eval(obj, scope)?;
                self.guard().setattr(&obj, attr, value)?;
            }
        }
        Ok(())
    }

    /// `a, *rest, z = value`: the starred target takes the surplus as a list.
    fn assign_starred(&mut self, targets: &[Target], star: usize, value: Value, scope: &Rc<Scope>) -> Result<(), Fault> {
        let mut items = self.collect(&value)?;
        let fixed = targets.len() - 1;
        if items.len() < fixed {
            return Err(Fault::value_error(format!(
                "not enough values to unpack (expected at least {}, got {})",
                fixed,
                items.len()
            )));
        }
        let tail = items.split_off(items.len() - (fixed - star));
        let middle = items.split_off(star);
        for (t, v) in targets[..star].iter().zip(items) {
            self.assign(t, v, scope)?;
        }
        if let Target::Starred(inner) = &targets[star] {
            self.assign(inner, Value::list(middle), scope)?;
        }
        for (t, v) in targets[star + 1..].iter().zip(tail) {
            self.assign(t, v, scope)?;
        }
        Ok(())
    }

    fn delete(&mut self, target: &Target, scope: &Rc<Scope>) -> Result<(), Fault> {
        match target {
            Target::Name(name) => {
                if !scope.remove(name) {
                    return Err(Fault::name_error(name));
                }
            }
            Target::Tuple(targets) => {
                for t in targets {
                    self.delete(t, scope)?;
                }
            }
            Target::Subscript { value, index } => {
                let obj = self.eval(value, scope)?;
                if matches!(index, Expr::Slice { .. }) {
                    return Err(Fault::type_error("slice deletion is not supported"));
                }
                let key = self.eval(index, scope)?;
                self.guard().delitem(&obj, &key)?;
            }
            Target::Attribute { .. } => {
                return Err(Fault::attribute_error("attribute deletion is not allowed"))
            }
            Target::Starred(_) => return Err(Fault::type_error("cannot delete starred")),
        }
        Ok(())
    }

    fn make_function(&mut self, name: String, body: FunctionBody, scope: &Rc<Scope>) -> Result<Value, Fault> {
        let params = match &body {
            FunctionBody::Def(d) => &d.params,
            FunctionBody::Lambda(l) => &l.params,
        };
        let mut defaults = Vec::with_capacity(params.len());
        for p in params {
            defaults.push(match &p.default {
                Some(e) => Some(self.eval(e, scope)?),
                None => None,
            });
        }
        self.track_closure(scope);
        Ok(Value::Function(Rc::new(Function {
            name,
            body,
            defaults,
            closure: Rc::clone(scope),
        })))
    }

    fn track_closure(&mut self, scope: &Rc<Scope>) {
        if self.closures.len() >= CLOSURE_PRUNE_AT {
            self.closures.retain(|_, w| w.strong_count() > 0);
        }
        self.closures
            .entry(Rc::as_ptr(scope))
            .or_insert_with(|| Rc::downgrade(scope));
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn eval(&mut self, expr: &Expr, scope: &Rc<Scope>) -> Result<Value, Fault> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::str(s)),
            Expr::FString(parts) => {
                let text = self.render_fstring(parts, scope)?;
                self.check_len(text.len())?;
                Ok(Value::string(text))
            }
            Expr::Name(name) => self.lookup(name, scope),
            Expr::List(items) => Ok(Value::list(self.eval_all(items, scope)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(items, scope)?)),
            Expr::Dict(pairs) => {
                let mut d = Dict::new();
                for (k, v) in pairs {
                    let key = self.eval(k, scope)?;
                    let value = self.eval(v, scope)?;
                    d.insert(key, value)?;
                }
                self.check_len(d.len())?;
                Ok(Value::dict(d))
            }
            Expr::BinOp { left, op, right } => {
                let a = self.eval(left, scope)?;
                let b = self.eval(right, scope)?;
                binary_op(*op, &a, &b, self.cap())
            }
            Expr::UnaryOp { op, operand } => {
                let v = self.eval(operand, scope)?;
                unary_op(*op, &v)
            }
            Expr::BoolOp { op, values } => {
                let mut last = Value::None;
                for e in values {
                    last = self.eval(e, scope)?;
                    let decided = match op {
                        BoolOp::And => !last.truthy(),
                        BoolOp::Or => last.truthy(),
                    };
                    if decided {
                        break;
                    }
                }
                Ok(last)
            }
            Expr::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut lhs = self.eval(left, scope)?;
                for (op, e) in ops.iter().zip(comparators) {
                    let rhs = self.eval(e, scope)?;
                    if !compare(*op, &lhs, &rhs)? {
                        return Ok(Value::Bool(false));
                    }
                    lhs = rhs;
                }
                Ok(Value::Bool(true))
            }
            Expr::IfExp { test, body, orelse } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(body, scope)
                } else {
                    self.eval(orelse, scope)
                }
            }
            Expr::Call { func, args } => {
                let callee = self.eval(func, scope)?;
                let (pos, kw) = self.eval_args(&callee, args, scope)?;
                self.call_value(&callee, pos, kw)
            }
            Expr::Attribute { value, attr } => {
                let obj = self.eval(value, scope)?;
                self.guard().getattr(&obj, attr)
            }
            Expr::Subscript { value, index } => {
                let obj = self.eval(value, scope)?;
                match index.as_ref() {
                    Expr::Slice { lower, upper, step } => {
                        let slice = SliceArgs {
                            lower: self.slice_bound(lower.as_deref(), scope)?,
                            upper: self.slice_bound(upper.as_deref(), scope)?,
                            step: self.slice_bound(step.as_deref(), scope)?,
                        };
                        self.guard().getslice(&obj, &slice)
                    }
                    other => {
                        let key = self.eval(other, scope)?;
                        self.subscript(&obj, &key)
                    }
                }
            }
            Expr::Slice { .. } => Err(Fault::type_error("slice is only valid inside a subscript")),
            Expr::Lambda(def) => self.make_function(
                "<lambda>".to_string(),
                FunctionBody::Lambda(Arc::clone(def)),
                scope,
            ),
            Expr::ListComp { elt, generators } | Expr::GeneratorExp { elt, generators } => {
                let mut out = Vec::new();
                let inner = Scope::child(scope);
                self.comprehension(generators, 0, &inner, &mut |interp, s| {
                    let v = interp.eval(elt, s)?;
                    interp.check_len(out.len() + 1)?;
                    out.push(v);
                    Ok(())
                })?;
                Ok(Value::list(out))
            }
            Expr::DictComp {
                key,
                value,
                generators,
            } => {
                let mut d = Dict::new();
                let inner = Scope::child(scope);
                self.comprehension(generators, 0, &inner, &mut |interp, s| {
                    let k = interp.eval(key, s)?;
                    let v = interp.eval(value, s)?;
                    d.insert(k, v)?;
                    interp.check_len(d.len())
                })?;
                Ok(Value::dict(d))
            }
        }
    }

    fn eval_all(&mut self, items: &[Expr], scope: &Rc<Scope>) -> Result<Vec<Value>, Fault> {
        self.check_len(items.len())?;
        items.iter().map(|e| self.eval(e, scope)).collect()
    }

    fn slice_bound(&mut self, expr: Option<&Expr>, scope: &Rc<Scope>) -> Result<Option<i64>, Fault> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        match self.eval(expr, scope)? {
            Value::None => Ok(None),
            v => v.as_index().map(Some).ok_or_else(|| {
                Fault::type_error("slice indices must be integers or None")
            }),
        }
    }

    fn render_fstring(&mut self, parts: &[FStringPart], scope: &Rc<Scope>) -> Result<String, Fault> {
        let mut out = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(text) => out.push_str(text),
                FStringPart::Field {
                    expr,
                    conversion,
                    spec,
                } => {
                    let mut value = self.eval(expr, scope)?;
                    match conversion {
                        Some('r') | Some('a') => value = Value::string(repr_within(&value, self.cap())?),
                        Some('s') => value = Value::string(to_str_within(&value, self.cap())?),
                        _ => {}
                    }
                    let spec = match spec {
                        Some(parts) => self.render_fstring(parts, scope)?,
                        None => String::new(),
                    };
                    if spec.is_empty() {
                        out.push_str(&to_str_within(&value, self.cap())?);
                    } else {
                        out.push_str(&format_value(&value, &spec)?);
                    }
                    self.check_len(out.len())?;
                }
            }
        }
        Ok(out)
    }

    fn comprehension(
        &mut self,
        generators: &[Comprehension],
        level: usize,
        scope: &Rc<Scope>,
        emit: &mut dyn FnMut(&mut Self, &Rc<Scope>) -> Result<(), Fault>,
    ) -> Result<(), Fault> {
        let Some(generator) = generators.get(level) else {
            return emit(self, scope);
        };
        let iterable = self.eval(&generator.iter, scope)?;
        'items: for item in self.iterate(&iterable)? {
            self.tick()?;
            self.assign(&generator.target, item, scope)?;
            for cond in &generator.ifs {
                if !self.eval(cond, scope)?.truthy() {
                    continue 'items;
                }
            }
            self.comprehension(generators, level + 1, scope, emit)?;
        }
        Ok(())
    }

    /// Resolve a name: program scopes, then builtins and classes, then safe
    /// modules, then capabilities.
    fn lookup(&self, name: &str, scope: &Rc<Scope>) -> Result<Value, Fault> {
        if let Some(v) = scope.lookup(name) {
            return Ok(v);
        }
        if let Some(b) = Builtin::from_global(name) {
            return Ok(Value::Builtin(b));
        }
        if let Some(t) = TypeKind::from_global(name) {
            return Ok(Value::Type(t));
        }
        if let Some(m) = self.env.module(name) {
            return Ok(Value::Module(m));
        }
        if self.env.registry().contains(name) {
            return Ok(Value::Capability(Rc::from(name)));
        }
        Err(Fault::name_error(name))
    }

    // ---------------------------------------------------------------------
    // Calls
    // ---------------------------------------------------------------------

    fn eval_args(
        &mut self,
        callee: &Value,
        args: &[Arg],
        scope: &Rc<Scope>,
    ) -> Result<(Vec<Value>, Vec<(String, Value)>), Fault> {
        let mut pos = Vec::new();
        let mut kw: Vec<(String, Value)> = Vec::new();
        for arg in args {
            match arg {
                Arg::Positional(e) => pos.push(self.eval(e, scope)?),
                Arg::Keyword(name, e) => {
                    let v = self.eval(e, scope)?;
                    push_keyword(callee, &mut kw, name.clone(), v)?;
                }
                Arg::Star(e) => {
                    let v = self.eval(e, scope)?;
                    let items = self.collect(&v)?;
                    pos.extend(items);
                }
                Arg::DoubleStar(e) => {
                    let v = self.eval(e, scope)?;
                    let Value::Dict(d) = &v else {
                        return Err(Fault::type_error(format!(
                            "argument after ** must be a mapping, not {}",
                            v.type_name()
                        )));
                    };
                    let items = d.borrow().items();
                    for (k, v) in items {
                        let Value::Str(k) = &k else {
                            return Err(Fault::type_error("keywords must be strings"));
                        };
                        push_keyword(callee, &mut kw, k.to_string(), v)?;
                    }
                }
            }
        }
        Ok((pos, kw))
    }

    /// Invoke any callable value.
    pub fn call_value(&mut self, callee: &Value, pos: Vec<Value>, kw: Vec<(String, Value)>) -> Result<Value, Fault> {
        self.tick()?;
        match callee {
            Value::Function(f) => self.call_function(f, pos, kw),
            Value::Builtin(b) => call_builtin(self, *b, Args::new(b.name(), pos, kw)),
            Value::Method(m) => call_method(self, &m.receiver, m.name, Args::new(m.name, pos, kw)),
            Value::Type(t) => call_type(self, *t, Args::new(t.name(), pos, kw)),
            Value::Capability(name) => self.call_capability(name, pos, kw),
            other => Err(Fault::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(&mut self, func: &Rc<Function>, pos: Vec<Value>, kw: Vec<(String, Value)>) -> Result<Value, Fault> {
        if self.depth >= self.env.limits().max_call_depth {
            return Err(Fault::new(
                ExcKind::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }
        let local = Scope::child(&func.closure);
        bind_params(func, pos, kw, &local)?;
        self.depth += 1;
        let outcome = match &func.body {
            FunctionBody::Def(def) => self.exec_block(&def.body, &local).map(|flow| match flow {
                Flow::Return(v) => v,
                _ => Value::None,
            }),
            FunctionBody::Lambda(def) => self.eval(&def.body, &local),
        };
        self.depth -= 1;
        outcome
    }

    fn call_capability(&mut self, name: &str, pos: Vec<Value>, kw: Vec<(String, Value)>) -> Result<Value, Fault> {
        let registry = self.env.registry();
        let capability = registry.resolve(name).ok_or_else(|| Fault::name_error(name))?;
        let pos = pos.iter().map(to_json).collect::<Result<Vec<_>, _>>()?;
        let kw = kw
            .into_iter()
            .map(|(k, v)| to_json(&v).map(|j| (k, j)))
            .collect::<Result<Vec<_>, _>>()?;
        let args = capability
            .bind(pos, kw)
            .map_err(|e| Fault::type_error(e.to_string()))?;
        self.check_deadline()?;
        tracing::debug!(capability = name, "capability call");
        let result = capability.call(&args).map_err(|e| match e {
            CapabilityError::Binding(m) => Fault::type_error(m),
            other => Fault::new(ExcKind::RuntimeError, other.to_string()),
        })?;
        self.check_deadline()?;
        Ok(from_json(&result))
    }
}

fn push_keyword(callee: &Value, kw: &mut Vec<(String, Value)>, name: String, value: Value) -> Result<(), Fault> {
    if kw.iter().any(|(k, _)| *k == name) {
        return Err(Fault::type_error(format!(
            "{}() got multiple values for keyword argument '{}'",
            callable_name(callee),
            name
        )));
    }
    kw.push((name, value));
    Ok(())
}

fn callable_name(value: &Value) -> String {
    match value {
        Value::Function(f) => f.name.clone(),
        Value::Builtin(b) => b.name().to_string(),
        Value::Method(m) => m.name.to_string(),
        Value::Type(t) => t.name().to_string(),
        Value::Capability(n) => n.to_string(),
        other => other.type_name().to_string(),
    }
}

/// Bind call arguments to a user function's parameters in `local`.
fn bind_params(func: &Function, pos: Vec<Value>, kw: Vec<(String, Value)>, local: &Rc<Scope>) -> Result<(), Fault> {
    let params = func.params();
    let mut bound: Vec<Option<Value>> = vec![None; params.len()];
    let varargs = params.iter().position(|p| p.kind == ParamKind::VarArgs);
    let kwargs = params.iter().position(|p| p.kind == ParamKind::KwArgs);
    let positional: Vec<usize> = params
        .iter()
        .enumerate()
        .take(varargs.unwrap_or(params.len()))
        .filter(|(_, p)| p.kind == ParamKind::Normal)
        .map(|(i, _)| i)
        .collect();

    let given = pos.len();
    let mut pos = pos.into_iter();
    for slot in &positional {
        match pos.next() {
            Some(v) => bound[*slot] = Some(v),
            None => break,
        }
    }
    let extra: Vec<Value> = pos.collect();
    match varargs {
        Some(i) => bound[i] = Some(Value::tuple(extra)),
        None if !extra.is_empty() => {
            return Err(Fault::type_error(format!(
                "{}() takes {} positional argument{} but {} {} given",
                func.name,
                positional.len(),
                if positional.len() == 1 { "" } else { "s" },
                given,
                if given == 1 { "was" } else { "were" }
            )))
        }
        None => {}
    }

    let mut extra_kw = Dict::new();
    for (key, value) in kw {
        match params
            .iter()
            .position(|p| matches!(p.kind, ParamKind::Normal | ParamKind::KwOnly) && p.name == key)
        {
            Some(i) if bound[i].is_some() => {
                return Err(Fault::type_error(format!(
                    "{}() got multiple values for argument '{}'",
                    func.name, key
                )))
            }
            Some(i) => bound[i] = Some(value),
            None if kwargs.is_some() => extra_kw.insert(Value::string(key), value)?,
            None => {
                return Err(Fault::type_error(format!(
                    "{}() got an unexpected keyword argument '{}'",
                    func.name, key
                )))
            }
        }
    }
    if let Some(i) = kwargs {
        bound[i] = Some(Value::dict(extra_kw));
    }

    let mut missing = Vec::new();
    for (i, p) in params.iter().enumerate() {
        if bound[i].is_none() {
            match func.defaults.get(i).cloned().flatten() {
                Some(d) => bound[i] = Some(d),
                None => missing.push(format!("'{}'", p.name)),
            }
        }
    }
    if !missing.is_empty() {
        return Err(Fault::type_error(format!(
            "{}() missing {} required positional argument{}: {}",
            func.name,
            missing.len(),
            if missing.len() == 1 { "" } else { "s" },
            join_names(&missing)
        )));
    }

    for (p, v) in params.iter().zip(bound) {
        if let Some(v) = v {
            local.set(&p.name, v);
        }
    }
    Ok(())
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`
fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{} and {}", a, b),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}

fn import_denied(name: &str) -> Fault {
    Fault::new(
        ExcKind::ImportError,
        format!("import of '{}' is not allowed", name),
    )
}

/// The fault a `raise <value>` statement produces.
fn raised_fault(value: &Value) -> Result<Fault, Fault> {
    match value {
        Value::Exception(e) => Ok(e.to_fault()),
        Value::Type(TypeKind::Exception(kind)) => Ok(Fault::new(*kind, "")),
        _ => Err(Fault::type_error("exceptions must derive from BaseException")),
    }
}

/// Does `except <class>` catch a fault of `kind`?
fn exception_matches(kind: ExcKind, class: &Value) -> Result<bool, Fault> {
    match class {
        Value::Type(TypeKind::Exception(base)) => Ok(kind.is_subclass_of(*base)),
        Value::Tuple(classes) => {
            for c in classes.iter() {
                if exception_matches(kind, c)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Fault::type_error(
            "catching classes that do not inherit from BaseException is not allowed",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Capability, CapabilityRegistry, ParamSpec, SideEffect};
    use crate::interp::to_json_lossy;
    use crate::limits::ExecutionLimits;
    use serde_json::{json, Value as Json};

    fn environment() -> ExecutionEnvironment {
        let registry = CapabilityRegistry::builder()
            .register(
                Capability::new("lookup", SideEffect::Pure, |args| {
                    let key = args.str("key")?;
                    if key == "missing" {
                        return Ok(json!({"error": "not found"}));
                    }
                    Ok(json!({"success": true, "result": {"key": key}}))
                })
                .param(ParamSpec::required("key")),
            )
            .register(
                Capability::new("explode", SideEffect::Pure, |_| {
                    Err(CapabilityError::Failed("backend unavailable".to_string()))
                }),
            )
            .build()
            .unwrap();
        ExecutionEnvironment::builder()
            .registry(Arc::new(registry))
            .limits(ExecutionLimits::default().with_max_steps(200_000))
            .build()
    }

    /// Run source and return (outcome, output, root `result`).
    fn run(source: &str) -> (Result<(), Fault>, String, Option<Json>) {
        let env = environment();
        let ctx = ExecContext::new(env.limits().timeout, env.limits().max_output_bytes);
        let body = crate::lang::parse(source).unwrap();
        let root = Scope::root();
        let mut interp = Interpreter::new(&env, &ctx);
        let outcome = interp.run(&body, &root);
        let result = root.get_local("result").map(|v| to_json_lossy(&v));
        interp.release();
        root.clear();
        (outcome, ctx.output.snapshot(), result)
    }

    fn result_of(source: &str) -> Json {
        let (outcome, _, result) = run(source);
        outcome.unwrap();
        result.unwrap_or(Json::Null)
    }

    fn fault_of(source: &str) -> String {
        run(source).0.unwrap_err().to_string()
    }

    #[test]
    fn test_arithmetic_and_control_flow() {
        let src = "total = 0\nfor i in range(10):\n    if i % 2 == 0:\n        continue\n    total += i\nresult = total";
        assert_eq!(result_of(src), json!(25));
        let src = "n = 0\nwhile n < 5:\n    n += 1\nelse:\n    n = -n\nresult = n";
        assert_eq!(result_of(src), json!(-5));
        let src = "for x in [1, 2]:\n    break\nelse:\n    x = 99\nresult = x";
        assert_eq!(result_of(src), json!(1));
    }

    #[test]
    fn test_functions_defaults_and_closures() {
        let src = "def make(step=2):\n    def add(x):\n        return x + step\n    return add\nresult = make()(5) + make(10)(1)";
        assert_eq!(result_of(src), json!(18));
        let src = "def f(a, *rest, **opts):\n    return [a, list(rest), opts]\nresult = f(1, 2, 3, k='v')";
        assert_eq!(result_of(src), json!([1, [2, 3], {"k": "v"}]));
        let src = "result = sorted(['bb', 'a', 'ccc'], key=lambda s: -len(s))";
        assert_eq!(result_of(src), json!(["ccc", "bb", "a"]));
    }

    #[test]
    fn test_argument_binding_errors() {
        assert_eq!(
            fault_of("def f(a, b):\n    pass\nf(1)"),
            "TypeError: f() missing 1 required positional argument: 'b' (line 3)"
        );
        assert_eq!(
            fault_of("def f(a):\n    pass\nf(1, 2)"),
            "TypeError: f() takes 1 positional argument but 2 were given (line 3)"
        );
        assert_eq!(
            fault_of("def f(a):\n    pass\nf(1, a=2)"),
            "TypeError: f() got multiple values for argument 'a' (line 3)"
        );
        assert_eq!(
            fault_of("def f(a, b, c):\n    pass\nf()"),
            "TypeError: f() missing 3 required positional arguments: 'a', 'b', and 'c' (line 3)"
        );
    }

    #[test]
    fn test_recursion_limit() {
        let err = fault_of("def f(n):\n    return f(n + 1)\nf(0)");
        assert!(err.starts_with("RecursionError: maximum recursion depth exceeded"));
        let src = "def fact(n):\n    return 1 if n <= 1 else n * fact(n - 1)\nresult = fact(10)";
        assert_eq!(result_of(src), json!(3628800));
    }

    #[test]
    fn test_try_except_else_finally() {
        let src = "log = []\ntry:\n    x = {}['k']\nexcept KeyError as e:\n    log.append('key')\nelse:\n    log.append('else')\nfinally:\n    log.append('finally')\nresult = log";
        assert_eq!(result_of(src), json!(["key", "finally"]));
        let src = "try:\n    raise ValueError('bad')\nexcept (TypeError, ValueError) as e:\n    result = str(e)";
        assert_eq!(result_of(src), json!("bad"));
        let src = "try:\n    1 / 0\nexcept ArithmeticError:\n    result = 'arith'";
        assert_eq!(result_of(src), json!("arith"));
    }

    #[test]
    fn test_bare_raise() {
        let src = "try:\n    try:\n        int('x')\n    except ValueError:\n        raise\nexcept Exception as e:\n    result = isinstance(e, ValueError)";
        assert_eq!(result_of(src), json!(true));
        assert_eq!(
            fault_of("raise"),
            "RuntimeError: No active exception to reraise (line 1)"
        );
    }

    #[test]
    fn test_step_budget_bypasses_except_and_finally() {
        let src = "try:\n    while True:\n        pass\nexcept Exception:\n    result = 'caught'\nfinally:\n    result = 'finally'";
        let (outcome, _, result) = run(src);
        assert_eq!(outcome.unwrap_err().kind, ExcKind::TimeoutError);
        assert_eq!(result, None);
    }

    #[test]
    fn test_imports() {
        assert_eq!(result_of("import math\nresult = math.floor(2.7)"), json!(2));
        assert_eq!(result_of("from json import dumps as d\nresult = d([1])"), json!("[1]"));
        assert_eq!(result_of("result = json.loads('{\"a\": 1}')['a']"), json!(1));
        assert_eq!(
            fault_of("import os"),
            "ImportError: import of 'os' is not allowed (line 1)"
        );
        assert_eq!(
            fault_of("from math import system"),
            "ImportError: cannot import name 'system' from 'math' (line 1)"
        );
    }

    #[test]
    fn test_dynamic_evaluation_absent() {
        assert_eq!(fault_of("e = eval"), "NameError: name 'eval' is not defined (line 1)");
        assert_eq!(fault_of("getattr"), "NameError: name 'getattr' is not defined (line 1)");
    }

    #[test]
    fn test_capability_calls() {
        assert_eq!(
            result_of("r = lookup('abc')\nresult = r['result']['key']"),
            json!("abc")
        );
        assert_eq!(result_of("result = lookup(key='missing')"), json!({"error": "not found"}));
        assert_eq!(
            fault_of("lookup()"),
            "TypeError: lookup() missing required argument: 'key' (line 1)"
        );
        assert_eq!(
            fault_of("explode()"),
            "RuntimeError: backend unavailable (line 1)"
        );
        assert_eq!(
            fault_of("lookup(len)"),
            "TypeError: Object of type builtin_function_or_method is not JSON serializable (line 1)"
        );
    }

    #[test]
    fn test_comprehensions_and_fstrings() {
        let src = "result = [x * x for x in range(6) if x % 2]";
        assert_eq!(result_of(src), json!([1, 9, 25]));
        let src = "result = {k: v for k, v in zip('ab', [1, 2])}";
        assert_eq!(result_of(src), json!({"a": 1, "b": 2}));
        let src = "x = 3.14159\nname = 'pi'\nresult = f'{name!r} is {x:.2f}'";
        assert_eq!(result_of(src), json!("'pi' is 3.14"));
        let src = "result = [(i, j) for i in range(2) for j in range(i)]";
        assert_eq!(result_of(src), json!([[1, 0]]));
    }

    #[test]
    fn test_unpacking_and_del() {
        assert_eq!(result_of("a, (b, c) = 1, [2, 3]\nresult = a + b + c"), json!(6));
        assert_eq!(
            fault_of("a, b = [1, 2, 3]"),
            "ValueError: too many values to unpack (expected 2) (line 1)"
        );
        assert_eq!(result_of("d = {'a': 1, 'b': 2}\ndel d['a']\nresult = d"), json!({"b": 2}));
        assert_eq!(fault_of("x = 1\ndel x\nx"), "NameError: name 'x' is not defined (line 3)");
    }

    #[test]
    fn test_starred_unpacking() {
        assert_eq!(result_of("a, *b = 1, 2, 3\nresult = [a, b]"), json!([1, [2, 3]]));
        assert_eq!(result_of("*a, b, c = 'xyz'\nresult = [a, b, c]"), json!([["x"], "y", "z"]));
        assert_eq!(result_of("a, *b, c = [1, 2]\nresult = [a, b, c]"), json!([1, [], 2]));
        assert_eq!(
            fault_of("a, *b, c = [1]"),
            "ValueError: not enough values to unpack (expected at least 2, got 1) (line 1)"
        );
    }

    #[test]
    fn test_keyword_only_parameters() {
        let src = "def f(a, *, sep='-', end):\n    return sep.join([a, end])\nresult = f('x', end='y')";
        assert_eq!(result_of(src), json!("x-y"));
        let src = "def f(*args, scale=2):\n    return [x * scale for x in args]\nresult = f(1, 2, scale=3)";
        assert_eq!(result_of(src), json!([3, 6]));
        assert_eq!(
            fault_of("def f(a, *, b):\n    pass\nf(1, 2)"),
            "TypeError: f() takes 1 positional argument but 2 were given (line 3)"
        );
    }

    #[test]
    fn test_bitwise_expressions() {
        assert_eq!(result_of("x = 6\nx &= 3\nresult = [5 & 3, 5 | 3, 5 ^ 3, ~5, 1 << 4, x]"), json!([1, 7, 6, -6, 16, 2]));
    }

    #[test]
    fn test_large_text_is_refused_before_it_is_built() {
        for src in [
            "x = ','.join(['x' * 999999] * 999999)[:3]",
            "x = len(str(['x' * 999999] * 999999))",
            "x = repr({'k': ['ab' * 400000] * 999999})",
            "x = f'{[1] * 999999}'",
            "x = '{}'.format(['y' * 999999] * 3)",
            "x = '%s' % (['z' * 999999] * 3,)",
            "print(['x' * 999999] * 3)",
        ] {
            assert!(fault_of(src).starts_with("MemoryError:"), "{}", src);
        }
        assert_eq!(result_of("result = '-'.join(['a', 'b', 'c'])"), json!("a-b-c"));
        assert_eq!(result_of("result = str([1, 'a', (2,)])"), json!("[1, 'a', (2,)]"));
    }

    #[test]
    fn test_list_augmented_add_is_in_place() {
        let src = "a = [1]\nb = a\na += [2]\nresult = b";
        assert_eq!(result_of(src), json!([1, 2]));
    }

    #[test]
    fn test_print_goes_to_buffer() {
        let (outcome, output, _) = run("print('a', 1, sep='-')\nprint('b', end='')");
        outcome.unwrap();
        assert_eq!(output, "a-1\nb");
    }

    #[test]
    fn test_counter_and_defaultdict() {
        let src = "from collections import Counter, defaultdict\n\
c = Counter('abracadabra')\n\
c['z'] += 2\n\
c.update(['a'])\n\
groups = defaultdict(list)\n\
for w in ['apple', 'avocado', 'banana']:\n    groups[w[0]].append(w)\n\
tally = defaultdict(int)\n\
for n in [1, 2, 1]:\n    tally[n] += 1\n\
result = [c.most_common(2), c['missing'], 'missing' in c, dict(groups), tally[1], repr(Counter()), c.total()]";
        assert_eq!(
            result_of(src),
            json!([[["a", 6], ["b", 2]], 0, false, {"a": ["apple", "avocado"], "b": ["banana"]}, 2, "Counter()", 14])
        );
        assert_eq!(
            fault_of("from collections import defaultdict\nd = defaultdict(None)\nd['k']"),
            "KeyError: 'k' (line 3)"
        );
    }

    #[test]
    fn test_datetime_values() {
        let src = "from datetime import datetime, date, timedelta\n\
start = datetime(2024, 2, 28, 9, 30)\n\
later = start + timedelta(days=2, hours=1)\n\
span = later - start\n\
result = [later.isoformat(), str(later.date()), span.total_seconds(), later.weekday(), f'{start:%Y/%m/%d}', later > start, date(2024, 1, 1) + timedelta(days=31) == date(2024, 2, 1), isinstance(later, date), str(timedelta(minutes=90)), datetime.fromisoformat('2024-03-01 10:30:00') == later]";
        assert_eq!(
            result_of(src),
            json!(["2024-03-01T10:30:00", "2024-03-01", 176400.0, 4, "2024/02/28", true, true, true, "1:30:00", true])
        );
        assert_eq!(
            fault_of("import datetime\ndatetime.date(2023, 2, 29)"),
            "ValueError: day is out of range for month (line 2)"
        );
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let src = "import random\n\
random.seed(42)\n\
a = [random.randint(1, 100) for _ in range(5)]\n\
random.seed(42)\n\
b = [random.randint(1, 100) for _ in range(5)]\n\
random.seed('label')\n\
x = random.random()\n\
random.seed('label')\n\
deck = list(range(10))\n\
random.shuffle(deck)\n\
picked = random.sample(range(50), 5)\n\
weighted = random.choices(['a', 'b'], weights=[0, 1], k=3)\n\
result = [a == b, all(1 <= v <= 100 for v in a), sorted(deck) == list(range(10)), all(picked.count(p) == 1 for p in picked), weighted, random.choice(['only'])]";
        assert_eq!(result_of(src), json!([true, true, true, true, ["b", "b", "b"], "only"]));
        let src = "import random\nrandom.seed('label')\nx = random.random()\nrandom.seed('label')\nresult = x == random.random()";
        assert_eq!(result_of(src), json!(true));
        assert_eq!(
            fault_of("import random\nrandom.choice([])"),
            "IndexError: Cannot choose from an empty sequence (line 2)"
        );
    }

    #[test]
    fn test_itertools_and_reduce() {
        let src = "import itertools\n\
from functools import reduce\n\
result = [\n\
    list(itertools.permutations([1, 2, 3], 2)),\n\
    list(itertools.combinations('abcd', 2))[:3],\n\
    list(itertools.product([0, 1], repeat=2)),\n\
    list(itertools.accumulate([1, 2, 3, 4])),\n\
    itertools.islice(range(10**12), 3, 9, 2),\n\
    [(k, len(g)) for k, g in itertools.groupby('aaabbc')],\n\
    list(itertools.zip_longest([1, 2], ['x'], fillvalue='-')),\n\
    reduce(lambda acc, x: acc * x, [1, 2, 3, 4], 1),\n\
    len(list(itertools.combinations_with_replacement(range(3), 2))),\n\
    list(itertools.chain([1], (2, 3))),\n\
    list(itertools.takewhile(lambda v: v < 3, [1, 2, 5, 1])),\n\
]";
        assert_eq!(
            result_of(src),
            json!([
                [[1, 2], [1, 3], [2, 1], [2, 3], [3, 1], [3, 2]],
                [["a", "b"], ["a", "c"], ["a", "d"]],
                [[0, 0], [0, 1], [1, 0], [1, 1]],
                [1, 3, 6, 10],
                [3, 5, 7],
                [["a", 3], ["b", 2], ["c", 1]],
                [[1, "x"], [2, "-"]],
                24,
                6,
                [1, 2, 3],
                [1, 2]
            ])
        );
        assert_eq!(
            fault_of("from functools import reduce\nreduce(max, [])"),
            "TypeError: reduce() of empty iterable with no initial value (line 2)"
        );
    }

    #[test]
    fn test_combinatorial_output_stops_at_the_cap() {
        let env = ExecutionEnvironment::builder()
            .limits(ExecutionLimits::default().with_max_collection_len(1_000))
            .build();
        let ctx = ExecContext::new(env.limits().timeout, env.limits().max_output_bytes);
        let body = crate::lang::parse("import itertools\nx = itertools.permutations(range(12))").unwrap();
        let root = Scope::root();
        let mut interp = Interpreter::new(&env, &ctx);
        let err = interp.run(&body, &root).unwrap_err();
        assert_eq!(err.kind, ExcKind::MemoryError);
    }

    #[test]
    fn test_issubclass() {
        assert_eq!(
            result_of("result = [issubclass(bool, int), issubclass(KeyError, (ValueError, LookupError)), issubclass(int, str)]"),
            json!([true, true, false])
        );
        assert_eq!(
            fault_of("issubclass(1, int)"),
            "TypeError: issubclass() arg 1 must be a class (line 1)"
        );
    }

    #[test]
    fn test_collection_cap() {
        let env = ExecutionEnvironment::builder()
            .limits(ExecutionLimits::default().with_max_collection_len(10))
            .build();
        let ctx = ExecContext::new(env.limits().timeout, env.limits().max_output_bytes);
        let body = crate::lang::parse("x = list(range(100))").unwrap();
        let root = Scope::root();
        let mut interp = Interpreter::new(&env, &ctx);
        let err = interp.run(&body, &root).unwrap_err();
        assert_eq!(err.kind, ExcKind::MemoryError);
    }

    #[test]
    fn test_attribute_guard() {
        assert_eq!(
            fault_of("'x'.upper.__name__"),
            "AttributeError: \"__name__\" is an invalid attribute name because it starts with \"_\" (line 1)"
        );
        assert_eq!(
            fault_of("[].nope"),
            "AttributeError: 'list' object has no attribute 'nope' (line 1)"
        );
    }
}
