//! Capability registry: the only channel from a program to the outside world.
//!
//! A [`Capability`] is a host function with a declared signature. The registry
//! is assembled once through [`CapabilityRegistry::builder`] and frozen; sessions
//! share it read-only.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("capability '{0}' is already registered")]
    Duplicate(String),
    /// Arguments do not match the declared signature
    #[error("{0}")]
    Binding(String),
    /// The host function itself failed
    #[error("{0}")]
    Failed(String),
}

/// What calling a capability does outside the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Talks to a remote service
    Network,
    /// Changes remote state
    Mutation,
    /// No observable effect
    Pure,
}

impl fmt::Display for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideEffect::Network => write!(f, "network"),
            SideEffect::Mutation => write!(f, "mutation"),
            SideEffect::Pure => write!(f, "pure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub required: bool,
    /// Catch-all for extra keyword arguments (`**params`)
    pub rest: bool,
}

impl ParamSpec {
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: true,
            rest: false,
        }
    }

    pub fn optional(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            rest: false,
        }
    }

    pub fn rest(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            rest: true,
        }
    }
}

/// Arguments bound to a capability's parameters, by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    values: Map<String, Value>,
}

impl CallArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    pub fn str(&self, name: &str) -> Result<&str, CapabilityError> {
        match self.values.get(name) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(CapabilityError::Binding(format!(
                "argument '{}' must be a string, not {}",
                name,
                json_type(other)
            ))),
            None => Err(CapabilityError::Binding(format!(
                "missing argument '{}'",
                name
            ))),
        }
    }

    /// Keyword catch-all collected for a `rest` parameter.
    pub fn rest(&self, name: &str) -> Map<String, Value> {
        match self.values.get(name) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "None",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

pub type CapabilityFn = dyn Fn(&CallArgs) -> Result<Value, CapabilityError> + Send + Sync;

/// A host function exposed to programs under a fixed name.
#[derive(Clone)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub side_effect: SideEffect,
    func: Arc<CapabilityFn>,
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("side_effect", &self.side_effect)
            .finish()
    }
}

impl Capability {
    pub fn new<F>(name: &str, side_effect: SideEffect, func: F) -> Self
    where
        F: Fn(&CallArgs) -> Result<Value, CapabilityError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            description: String::new(),
            params: Vec::new(),
            side_effect,
            func: Arc::new(func),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Rendered signature, e.g. `call_mcp_tool(tool_name, operation=None, **params)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                if p.rest {
                    format!("**{}", p.name)
                } else if p.required {
                    p.name.clone()
                } else {
                    format!("{}=None", p.name)
                }
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }

    /// Match positional then keyword arguments against the declared parameters.
    pub fn bind(&self, positional: Vec<Value>, keywords: Vec<(String, Value)>) -> Result<CallArgs, CapabilityError> {
        let fixed: Vec<&ParamSpec> = self.params.iter().filter(|p| !p.rest).collect();
        let rest = self.params.iter().find(|p| p.rest);
        if positional.len() > fixed.len() {
            return Err(CapabilityError::Binding(format!(
                "{}() takes {} positional argument{} but {} were given",
                self.name,
                fixed.len(),
                if fixed.len() == 1 { "" } else { "s" },
                positional.len()
            )));
        }
        let mut values = Map::new();
        for (spec, value) in fixed.iter().zip(positional) {
            values.insert(spec.name.clone(), value);
        }
        let mut extra = Map::new();
        for (key, value) in keywords {
            if fixed.iter().any(|p| p.name == key) {
                if values.contains_key(&key) {
                    return Err(CapabilityError::Binding(format!(
                        "{}() got multiple values for argument '{}'",
                        self.name, key
                    )));
                }
                values.insert(key, value);
            } else if rest.is_some() {
                extra.insert(key, value);
            } else {
                return Err(CapabilityError::Binding(format!(
                    "{}() got an unexpected keyword argument '{}'",
                    self.name, key
                )));
            }
        }
        let missing: Vec<&str> = fixed
            .iter()
            .filter(|p| p.required && !values.contains_key(&p.name))
            .map(|p| p.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(CapabilityError::Binding(format!(
                "{}() missing required argument{}: {}",
                self.name,
                if missing.len() == 1 { "" } else { "s" },
                missing
                    .iter()
                    .map(|m| format!("'{}'", m))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        if let Some(rest) = rest {
            values.insert(rest.name.clone(), Value::Object(extra));
        }
        Ok(CallArgs { values })
    }

    pub fn call(&self, args: &CallArgs) -> Result<Value, CapabilityError> {
        (self.func)(args)
    }
}

/// Frozen name → capability mapping.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Capability>,
}

impl CapabilityRegistry {
    pub fn builder() -> CapabilityRegistryBuilder {
        CapabilityRegistryBuilder::default()
    }

    /// Registry with no capabilities (pure computation only).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn resolve(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.capabilities.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.values()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

#[derive(Default)]
pub struct CapabilityRegistryBuilder {
    capabilities: BTreeMap<String, Capability>,
    duplicate: Option<String>,
}

impl CapabilityRegistryBuilder {
    pub fn register(mut self, capability: Capability) -> Self {
        if self.capabilities.contains_key(&capability.name) {
            self.duplicate.get_or_insert_with(|| capability.name.clone());
        } else {
            self.capabilities.insert(capability.name.clone(), capability);
        }
        self
    }

    pub fn build(self) -> Result<CapabilityRegistry, CapabilityError> {
        if let Some(name) = self.duplicate {
            return Err(CapabilityError::Duplicate(name));
        }
        Ok(CapabilityRegistry {
            capabilities: self.capabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo() -> Capability {
        Capability::new("echo", SideEffect::Pure, |args| {
            Ok(json!({"success": true, "result": args.clone().into_map()}))
        })
        .param(ParamSpec::required("text"))
        .param(ParamSpec::optional("times"))
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let err = CapabilityRegistry::builder()
            .register(echo())
            .register(echo())
            .build()
            .unwrap_err();
        assert_eq!(err, CapabilityError::Duplicate("echo".to_string()));
    }

    #[test]
    fn test_resolve_and_names() {
        let registry = CapabilityRegistry::builder().register(echo()).build().unwrap();
        assert!(registry.resolve("echo").is_some());
        assert!(registry.resolve("eval").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn test_binding_positional_and_keyword() {
        let cap = echo();
        let args = cap
            .bind(vec![json!("hi")], vec![("times".to_string(), json!(2))])
            .unwrap();
        assert_eq!(args.str("text").unwrap(), "hi");
        assert_eq!(args.get("times"), Some(&json!(2)));
    }

    #[test]
    fn test_binding_errors() {
        let cap = echo();
        let err = cap.bind(vec![], vec![]).unwrap_err();
        assert_eq!(err.to_string(), "echo() missing required argument: 'text'");
        let err = cap
            .bind(vec![json!("a")], vec![("text".to_string(), json!("b"))])
            .unwrap_err();
        assert_eq!(err.to_string(), "echo() got multiple values for argument 'text'");
        let err = cap
            .bind(vec![json!("a")], vec![("color".to_string(), json!("b"))])
            .unwrap_err();
        assert_eq!(err.to_string(), "echo() got an unexpected keyword argument 'color'");
        let err = cap.bind(vec![json!(1), json!(2), json!(3)], vec![]).unwrap_err();
        assert_eq!(err.to_string(), "echo() takes 2 positional arguments but 3 were given");
    }

    #[test]
    fn test_rest_collects_extra_keywords() {
        let cap = Capability::new("call", SideEffect::Network, |_| Ok(Value::Null))
            .param(ParamSpec::required("tool_name"))
            .param(ParamSpec::optional("operation"))
            .param(ParamSpec::rest("params"));
        let args = cap
            .bind(
                vec![json!("drive")],
                vec![
                    ("operation".to_string(), json!("get")),
                    ("document_id".to_string(), json!("doc1")),
                ],
            )
            .unwrap();
        assert_eq!(args.rest("params").get("document_id"), Some(&json!("doc1")));
        assert_eq!(cap.signature(), "call(tool_name, operation=None, **params)");
    }
}
