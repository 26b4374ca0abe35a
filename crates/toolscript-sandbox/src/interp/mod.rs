//! Restricted interpreter: values, operators, builtins, safe modules, access
//! guards and the evaluator.

pub mod builtins;
pub mod collections;
pub mod convert;
pub mod eval;
pub mod fault;
pub mod format;
pub mod guards;
pub mod itertools;
pub mod methods;
pub mod modules;
pub mod ops;
pub mod random;
pub mod temporal;
pub mod value;

pub use builtins::{Builtin, GLOBAL_BUILTINS};
pub use convert::{dumps, from_json, to_json, to_json_lossy};
pub use eval::Interpreter;
pub use fault::{ExcKind, Fault, PROGRAM_EXCEPTIONS};
pub use format::{repr, to_str};
pub use guards::{AccessGuard, DefaultGuard, SliceArgs, ValueIter};
pub use methods::method_names;
pub use value::{Dict, ModuleKind, Scope, TypeKind, Value};
