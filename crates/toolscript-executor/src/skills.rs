//! Skill store: named program templates replayed through the full sandbox pipeline.
//!
//! A template marks arguments as `{{name}}`. Substitution is textual: the
//! argument's `str()` form is pasted in with no quoting or escaping, so a value
//! that breaks the program only shows up as a validation, compile or runtime
//! fault of the rendered source.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use thiserror::Error;
use toolscript_core::observability;
use toolscript_core::protocol::{FaultClass, ResultEnvelope};
use toolscript_sandbox::interp::{from_json, to_str};
use toolscript_sandbox::Sandbox;

/// Persisted file format version
const STORE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub template: String,
    pub saved_at: DateTime<Utc>,
}

impl Skill {
    /// Placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut rest = self.template.as_str();
        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else { break };
            let name = after[..end].trim();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
            rest = &after[end + 2..];
        }
        names
    }
}

#[derive(Debug, Error)]
pub enum SkillStoreError {
    #[error("Skill '{0}' not found")]
    NotFound(String),
    #[error("invalid skill name '{0}': must be non-empty and contain no whitespace")]
    InvalidName(String),
    #[error("skill store {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("skill store {} is malformed: {source}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    skills: Vec<Skill>,
}

/// Replace every `{{key}}` with the program-language `str()` of its value.
/// Markers without a matching argument are left as they are.
pub fn substitute(template: &str, args: &Map<String, Value>) -> String {
    args.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{{{}}}}}", key), &to_str(&from_json(value)))
    })
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_whitespace)
}

/// Process-lifetime skill storage. Persistence is explicit (`load` / `persist`).
#[derive(Debug, Default)]
pub struct SkillStore {
    skills: RwLock<BTreeMap<String, Skill>>,
}

impl SkillStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `template` under `name`, replacing any previous skill of that name.
    pub fn save(&self, name: &str, template: &str) -> Result<Skill, SkillStoreError> {
        if !valid_name(name) {
            return Err(SkillStoreError::InvalidName(name.to_string()));
        }
        let skill = Skill {
            name: name.to_string(),
            template: template.to_string(),
            saved_at: Utc::now(),
        };
        let replaced = self
            .skills
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), skill.clone())
            .is_some();
        observability::audit_skill_saved(name, &observability::code_hash(template));
        tracing::debug!(skill = name, replaced, "skill saved");
        Ok(skill)
    }

    pub fn get(&self, name: &str) -> Option<Skill> {
        self.skills
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// All skills, sorted by name.
    pub fn list(&self) -> Vec<Skill> {
        self.skills
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn remove(&self, name: &str) -> bool {
        self.skills
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.skills.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source text of `name` with `args` substituted.
    pub fn render(&self, name: &str, args: &Map<String, Value>) -> Result<String, SkillStoreError> {
        let skill = self
            .get(name)
            .ok_or_else(|| SkillStoreError::NotFound(name.to_string()))?;
        Ok(substitute(&skill.template, args))
    }

    /// Render and run through the full pipeline of `sandbox`.
    pub fn invoke(&self, sandbox: &Sandbox, name: &str, args: &Map<String, Value>) -> ResultEnvelope {
        let keys: Vec<&str> = args.keys().map(String::as_str).collect();
        match self.render(name, args) {
            Ok(source) => {
                observability::audit_skill_invoked(name, &keys, true);
                sandbox.execute_as(&format!("skill:{}", name), &source)
            }
            Err(e) => {
                observability::audit_skill_invoked(name, &keys, false);
                ResultEnvelope::failed(FaultClass::NotFound, e.to_string(), String::new())
            }
        }
    }

    /// Read a store written by [`SkillStore::persist`]. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self, SkillStoreError> {
        let store = Self::new();
        if !path.exists() {
            return Ok(store);
        }
        let text = fs::read_to_string(path).map_err(|source| SkillStoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: StoreFile = serde_json::from_str(&text).map_err(|source| SkillStoreError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        {
            let mut skills = store.skills.write().unwrap_or_else(|e| e.into_inner());
            for skill in file.skills {
                skills.insert(skill.name.clone(), skill);
            }
        }
        tracing::debug!(path = %path.display(), count = store.len(), "skill store loaded");
        Ok(store)
    }

    /// Write every skill to `path` as JSON, creating parent directories.
    /// The file is replaced atomically; each call writes its own temp file, so
    /// concurrent persists never interleave.
    pub fn persist(&self, path: &Path) -> Result<(), SkillStoreError> {
        let io_err = |source| SkillStoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(io_err)?;
                parent
            }
            None => Path::new("."),
        };
        let file = StoreFile {
            version: STORE_VERSION,
            skills: self.list(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| SkillStoreError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolscript_sandbox::{ExecutionEnvironment, ExecutionLimits};

    fn args(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn sandbox() -> Sandbox {
        Sandbox::new(
            ExecutionEnvironment::builder()
                .limits(ExecutionLimits::default().with_max_steps(100_000))
                .build(),
        )
    }

    #[test]
    fn test_substitute_uses_program_str_form() {
        let out = substitute(
            "a = {{n}}\nb = '{{s}}'\nc = {{flag}}\nd = {{none}}\ne = {{n}}",
            &args(json!({"n": 2.0, "s": "hi", "flag": true, "none": null})),
        );
        assert_eq!(out, "a = 2.0\nb = 'hi'\nc = True\nd = None\ne = 2.0");
    }

    #[test]
    fn test_unknown_markers_left_alone() {
        assert_eq!(substitute("x = {{y}}", &Map::new()), "x = {{y}}");
    }

    #[test]
    fn test_save_overwrites() {
        let store = SkillStore::new();
        store.save("total", "result = 1").unwrap();
        store.save("total", "result = 2").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("total").unwrap().template, "result = 2");
    }

    #[test]
    fn test_invalid_name_rejected() {
        let store = SkillStore::new();
        assert!(matches!(store.save("", "x = 1"), Err(SkillStoreError::InvalidName(_))));
        assert!(matches!(store.save("my skill", "x = 1"), Err(SkillStoreError::InvalidName(_))));
    }

    #[test]
    fn test_invoke_matches_direct_execution() {
        let store = SkillStore::new();
        let sb = sandbox();
        store
            .save("double", "items = {{items}}\nresult = [x * 2 for x in items]")
            .unwrap();
        let via_skill = store.invoke(&sb, "double", &args(json!({"items": [1, 2, 3]})));
        let direct = sb.execute("items = [1, 2, 3]\nresult = [x * 2 for x in items]");
        assert_eq!(via_skill, direct);
        assert_eq!(via_skill.result, Some(json!([2, 4, 6])));
    }

    #[test]
    fn test_invoke_unknown_skill() {
        let env = SkillStore::new().invoke(&sandbox(), "ghost", &Map::new());
        assert!(!env.success);
        assert_eq!(env.fault, Some(FaultClass::NotFound));
        assert_eq!(env.error.as_deref(), Some("Skill 'ghost' not found"));
    }

    #[test]
    fn test_substitution_can_break_validation() {
        let store = SkillStore::new();
        store.save("inject", "{{stmt}}\nresult = 1").unwrap();
        let env = store.invoke(&sandbox(), "inject", &args(json!({"stmt": "import os"})));
        assert_eq!(env.fault, Some(FaultClass::Validation));
    }

    #[test]
    fn test_remove() {
        let store = SkillStore::new();
        store.save("a", "result = 1").unwrap();
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_placeholders() {
        let skill = SkillStore::new()
            .save("p", "x = {{a}} + {{ b }} + {{a}}\ny = '{{'")
            .unwrap();
        assert_eq!(skill.placeholders(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("skills.json");
        let store = SkillStore::new();
        store.save("one", "result = 1").unwrap();
        store.save("two", "result = {{v}}").unwrap();
        store.persist(&path).unwrap();

        let loaded = SkillStore::load(&path).unwrap();
        assert_eq!(loaded.list(), store.list());
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_concurrent_save_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skills.json");
        let store = SkillStore::new();
        std::thread::scope(|s| {
            for i in 0..64 {
                let (store, path) = (&store, &path);
                s.spawn(move || {
                    store.save(&format!("skill_{}", i), "result = {{v}}").unwrap();
                    store.persist(path).unwrap();
                });
            }
        });
        store.persist(&path).unwrap();

        let loaded = SkillStore::load(&path).unwrap();
        assert_eq!(loaded.list().len(), 64);
        assert_eq!(loaded.list(), store.list());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SkillStore::load(&dir.path().join("absent.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skills.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(SkillStore::load(&path), Err(SkillStoreError::Format { .. })));
    }
}
