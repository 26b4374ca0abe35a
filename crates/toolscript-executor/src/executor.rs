//! Host facade: one object owning the sandbox, the service backend, the skill
//! store and the discovery catalog.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use toolscript_core::config::SandboxConfig;
use toolscript_core::protocol::{ResultEnvelope, ValidationVerdict};
use toolscript_sandbox::{ExecutionEnvironment, ExecutionLimits, Sandbox};
use toolscript_services::{Catalog, CatalogError, MockBackend};

use crate::skills::{Skill, SkillStore, SkillStoreError};
use crate::tools::service_registry;

#[derive(Debug)]
pub struct CodeExecutor {
    sandbox: Sandbox,
    backend: Arc<MockBackend>,
    skills: SkillStore,
    catalog: Catalog,
}

impl CodeExecutor {
    /// Executor over a fresh mock backend.
    pub fn new(config: &SandboxConfig) -> Result<Self> {
        Self::with_backend(config, Arc::new(MockBackend::default()))
    }

    /// Executor configured from `TOOLSCRIPT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(&SandboxConfig::from_env())
    }

    pub fn with_backend(config: &SandboxConfig, backend: Arc<MockBackend>) -> Result<Self> {
        let registry = service_registry(Arc::clone(&backend)).context("building capability registry")?;
        let env = ExecutionEnvironment::builder()
            .registry(Arc::new(registry))
            .limits(ExecutionLimits::from_config(config))
            .build();
        let sandbox = Sandbox::from_config(env, config)?;
        Ok(Self {
            sandbox,
            backend,
            skills: SkillStore::new(),
            catalog: Catalog::new(),
        })
    }

    /// Replace the skill store (e.g. one loaded from disk).
    pub fn with_skills(mut self, skills: SkillStore) -> Self {
        self.skills = skills;
        self
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn backend(&self) -> &MockBackend {
        &self.backend
    }

    pub fn skills(&self) -> &SkillStore {
        &self.skills
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn execute(&self, code: &str) -> ResultEnvelope {
        self.sandbox.execute(code)
    }

    pub fn validate(&self, code: &str) -> ValidationVerdict {
        self.sandbox.validate(code)
    }

    pub fn save_skill(&self, name: &str, template: &str) -> Result<Skill, SkillStoreError> {
        self.skills.save(name, template)
    }

    pub fn invoke_skill(&self, name: &str, args: &Map<String, Value>) -> ResultEnvelope {
        self.skills.invoke(&self.sandbox, name, args)
    }

    pub fn list_skills(&self) -> Vec<Skill> {
        self.skills.list()
    }

    pub fn persist_skills(&self, path: &Path) -> Result<(), SkillStoreError> {
        self.skills.persist(path)
    }

    pub fn ls(&self, path: &str) -> Result<Vec<String>, CatalogError> {
        self.catalog.list(path)
    }

    pub fn cat(&self, path: &str) -> Result<String, CatalogError> {
        self.catalog.read(path)
    }

    pub fn find_tools(&self, service: Option<&str>) -> Vec<String> {
        self.catalog.find_tools(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolscript_core::protocol::FaultClass;
    use toolscript_services::FixedClock;

    fn executor() -> CodeExecutor {
        let config = SandboxConfig {
            max_steps: 200_000,
            ..SandboxConfig::default()
        };
        CodeExecutor::with_backend(&config, Arc::new(MockBackend::new(Arc::new(FixedClock(1000.0))))).unwrap()
    }

    #[test]
    fn test_document_summary_program() {
        let env = executor().execute(
            "document = get_document('abc123')\n\
             content = document['result']['content']\n\
             summary = content[:20]\n\
             print('Fetched document, length', len(content))\n\
             result = {'summary': summary, 'ok': document['success']}",
        );
        assert!(env.success, "{:?}", env.error);
        assert_eq!(env.result.as_ref().unwrap()["summary"], json!("Discussed the Q4 goa"));
        assert_eq!(env.result.as_ref().unwrap()["ok"], json!(true));
        assert!(env.output.starts_with("Fetched document, length"));
    }

    #[test]
    fn test_unknown_document_is_not_a_fault() {
        let env = executor().execute("result = get_document('missing')");
        assert!(env.success);
        assert_eq!(
            env.result,
            Some(json!({"success": true, "result": {"error": "Document not found"}}))
        );
    }

    #[test]
    fn test_sheet_filter_program() {
        let env = executor().execute(
            "rows = get_sheet_data('team')['result']\n\
             sales = [r['name'] for r in rows if r['department'] == 'Sales']\n\
             result = {'count': len(rows), 'sales': sales}",
        );
        assert_eq!(env.result, Some(json!({"count": 3, "sales": ["Zhang San"]})));
    }

    #[test]
    fn test_generic_dispatch_from_program() {
        let env = executor().execute("result = call_mcp_tool('slack', operation='archive', channel='#ops')");
        assert_eq!(
            env.result,
            Some(json!({"success": true, "result": {"error": "Operation archive not supported"}}))
        );
    }

    #[test]
    fn test_missing_capability_argument_is_type_error() {
        let env = executor().execute("get_document()");
        assert_eq!(env.fault, Some(FaultClass::Runtime));
        assert!(env.error.unwrap().starts_with("TypeError: get_document() missing required argument: 'document_id'"));
    }

    #[test]
    fn test_side_effects_survive_later_fault() {
        let ex = executor();
        let env = ex.execute("send_slack_message('#ops', 'step one')\nx = 1 / 0");
        assert_eq!(env.fault, Some(FaultClass::Runtime));
        let env = ex.execute("msgs = get_slack_messages('#ops')['result']\nresult = msgs[-1]['text']");
        assert_eq!(env.result, Some(json!("step one")));
    }

    #[test]
    fn test_same_program_gives_identical_envelopes() {
        let program = "sent = send_slack_message('#ops', 'deploy done')\n\
             msgs = get_slack_messages('#ops')['result']\n\
             print('messages:', len(msgs))\n\
             result = {'sent': sent, 'last': msgs[-1]}";
        let first = executor().execute(program);
        let second = executor().execute(program);
        assert!(first.success, "{:?}", first.error);
        assert_eq!(first, second);

        let ex = executor();
        let pure = "rows = get_sheet_data('team')['result']\nresult = sorted(r['name'] for r in rows)";
        assert_eq!(ex.execute(pure), ex.execute(pure));
    }

    #[test]
    fn test_skill_round_trip() {
        let ex = executor();
        ex.save_skill("doc_title", "doc = get_document('{{id}}')\nresult = doc['result'].get('title')")
            .unwrap();
        let env = ex.invoke_skill("doc_title", &Map::from_iter([("id".to_string(), json!("abc123"))]));
        assert_eq!(env.result, Some(json!("Q4 goals meeting notes")));
        assert_eq!(ex.list_skills().len(), 1);
    }

    #[test]
    fn test_catalog_stub_runs_in_sandbox() {
        let ex = executor();
        let stub = ex.cat("servers/google_drive/getDocument.py").unwrap();
        let env = ex.execute(&format!("{}\nresult = get_document('abc123')['result']['id']", stub));
        assert_eq!(env.result, Some(json!("abc123")));
        assert_eq!(ex.find_tools(Some("google_drive")).len(), 2);
        assert!(ex.ls("servers").unwrap().contains(&"slack".to_string()));
    }
}
