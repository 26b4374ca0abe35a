//! skill save / invoke / list / show / remove
//!
//! Every command loads the store from disk and mutating commands persist it
//! back, so skills outlive the process.

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use toolscript_executor::{skills_file, SkillStore};

use super::{build_executor, read_source};

fn store_path(skills_file_arg: Option<&str>) -> PathBuf {
    skills_file_arg.map(PathBuf::from).unwrap_or_else(skills_file)
}

fn load_store(path: &Path) -> Result<SkillStore> {
    SkillStore::load(path).with_context(|| format!("Failed to load skill store: {}", path.display()))
}

pub fn cmd_save(
    name: &str,
    file: Option<&str>,
    code: Option<&str>,
    skills_file_arg: Option<&str>,
) -> Result<()> {
    let path = store_path(skills_file_arg);
    let template = read_source(file, code)?;
    let store = load_store(&path)?;
    let skill = store.save(name, &template)?;
    store.persist(&path)?;
    let placeholders = skill.placeholders();
    if placeholders.is_empty() {
        eprintln!("✓ Saved skill '{}'", skill.name);
    } else {
        eprintln!(
            "✓ Saved skill '{}' (arguments: {})",
            skill.name,
            placeholders.join(", ")
        );
    }
    Ok(())
}

pub fn cmd_invoke(
    name: &str,
    args: &str,
    timeout: Option<u64>,
    max_steps: Option<u64>,
    skills_file_arg: Option<&str>,
) -> Result<()> {
    let args: Map<String, Value> =
        serde_json::from_str(args).context("--args must be a JSON object")?;
    let store = load_store(&store_path(skills_file_arg))?;
    let executor = build_executor(timeout, max_steps)?.with_skills(store);
    let envelope = executor.invoke_skill(name, &args);
    println!("{}", serde_json::to_string_pretty(&envelope.to_json())?);
    if !envelope.success {
        anyhow::bail!(
            "Skill '{}' failed: {}",
            name,
            envelope.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

pub fn cmd_list(json: bool, skills_file_arg: Option<&str>) -> Result<()> {
    let store = load_store(&store_path(skills_file_arg))?;
    let skills = store.list();
    if json {
        let items: Vec<Value> = skills
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "arguments": s.placeholders(),
                    "saved_at": s.saved_at.to_rfc3339(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if skills.is_empty() {
        eprintln!("No skills saved.");
        return Ok(());
    }
    for s in &skills {
        let args = s.placeholders();
        if args.is_empty() {
            println!("{}", s.name);
        } else {
            println!("{}  ({})", s.name, args.join(", "));
        }
    }
    Ok(())
}

pub fn cmd_show(name: &str, skills_file_arg: Option<&str>) -> Result<()> {
    let store = load_store(&store_path(skills_file_arg))?;
    let Some(skill) = store.get(name) else {
        anyhow::bail!("Skill '{}' not found", name);
    };
    print!("{}", skill.template);
    if !skill.template.ends_with('\n') {
        println!();
    }
    Ok(())
}

pub fn cmd_remove(name: &str, skills_file_arg: Option<&str>) -> Result<()> {
    let path = store_path(skills_file_arg);
    let store = load_store(&path)?;
    if !store.remove(name) {
        anyhow::bail!("Skill '{}' not found", name);
    }
    store.persist(&path)?;
    eprintln!("✓ Removed skill '{}'", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("skills.json");
        let file_arg = file.to_str();

        cmd_save("title", None, Some("result = '{{x}}'"), file_arg).unwrap();
        let store = SkillStore::load(&file).unwrap();
        assert_eq!(store.get("title").unwrap().template, "result = '{{x}}'");

        cmd_invoke("title", r#"{"x": "hi"}"#, None, Some(10_000), file_arg).unwrap();
        cmd_show("title", file_arg).unwrap();

        cmd_remove("title", file_arg).unwrap();
        assert!(SkillStore::load(&file).unwrap().is_empty());
        assert!(cmd_remove("title", file_arg).is_err());
    }

    #[test]
    fn test_invoke_unknown_skill_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("skills.json");
        assert!(cmd_invoke("nope", "{}", None, None, file.to_str()).is_err());
    }

    #[test]
    fn test_invoke_rejects_non_object_args() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("skills.json");
        let err = cmd_invoke("x", "[1]", None, None, file.to_str()).unwrap_err();
        assert_eq!(err.to_string(), "--args must be a JSON object");
    }
}
