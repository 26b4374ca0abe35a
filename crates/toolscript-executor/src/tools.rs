//! Service capabilities: the functions programs call to reach the mock services.
//!
//! Named capabilities build a typed [`ServiceCall`] directly; only
//! `call_mcp_tool` goes through string dispatch. Every capability answers with
//! `{"success": true, "result": ...}` or `{"error": ...}` and never faults the
//! program on a service-level failure.

use std::sync::Arc;

use serde_json::{json, Value};
use toolscript_sandbox::{CallArgs, Capability, CapabilityError, CapabilityRegistry, ParamSpec, SideEffect};
use toolscript_services::{CrmOp, DriveOp, MessagingOp, MockBackend, ServiceCall, SheetsOp, TOOLS};

/// Generic dispatch capability
pub const CALL_MCP_TOOL: &str = "call_mcp_tool";

struct Binding {
    name: &'static str,
    operation: &'static str,
    side_effect: SideEffect,
    params: &'static [&'static str],
    build: fn(&CallArgs) -> ServiceCall,
}

fn text(args: &CallArgs, name: &str) -> String {
    match args.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn value(args: &CallArgs, name: &str) -> Value {
    args.get(name).cloned().unwrap_or(Value::Null)
}

const BINDINGS: &[Binding] = &[
    Binding {
        name: "get_document",
        operation: "get_document",
        side_effect: SideEffect::Network,
        params: &["document_id"],
        build: |a| {
            ServiceCall::Drive(DriveOp::GetDocument {
                document_id: text(a, "document_id"),
            })
        },
    },
    Binding {
        name: "upload_file",
        operation: "upload_file",
        side_effect: SideEffect::Mutation,
        params: &["file_path", "folder_id"],
        build: |a| {
            ServiceCall::Drive(DriveOp::UploadFile {
                file_path: text(a, "file_path"),
                folder_id: a.get("folder_id").map(|_| text(a, "folder_id")),
            })
        },
    },
    Binding {
        name: "update_salesforce_record",
        operation: "update_record",
        side_effect: SideEffect::Mutation,
        params: &["record_id", "data"],
        build: |a| {
            ServiceCall::Crm(CrmOp::UpdateRecord {
                record_id: text(a, "record_id"),
                data: value(a, "data"),
            })
        },
    },
    Binding {
        name: "query_records",
        operation: "query_records",
        side_effect: SideEffect::Network,
        params: &["object_type", "criteria"],
        build: |a| {
            ServiceCall::Crm(CrmOp::QueryRecords {
                object_type: a.get("object_type").map(|_| text(a, "object_type")),
                criteria: a.get("criteria").cloned(),
            })
        },
    },
    Binding {
        name: "send_slack_message",
        operation: "send_message",
        side_effect: SideEffect::Mutation,
        params: &["channel", "message"],
        build: |a| {
            ServiceCall::Messaging(MessagingOp::SendMessage {
                channel: text(a, "channel"),
                message: text(a, "message"),
            })
        },
    },
    Binding {
        name: "get_slack_messages",
        operation: "get_messages",
        side_effect: SideEffect::Network,
        params: &["channel"],
        build: |a| {
            ServiceCall::Messaging(MessagingOp::GetMessages {
                channel: text(a, "channel"),
            })
        },
    },
    Binding {
        name: "get_sheet_data",
        operation: "get_sheet_data",
        side_effect: SideEffect::Network,
        params: &["sheet_id"],
        build: |a| {
            ServiceCall::Sheets(SheetsOp::GetSheetData {
                sheet_id: text(a, "sheet_id"),
            })
        },
    },
    Binding {
        name: "update_sheet",
        operation: "update_sheet",
        side_effect: SideEffect::Mutation,
        params: &["sheet_id", "data"],
        build: |a| {
            ServiceCall::Sheets(SheetsOp::UpdateSheet {
                sheet_id: text(a, "sheet_id"),
                data: a.get("data").cloned().unwrap_or_else(|| json!([])),
                rows_count: None,
            })
        },
    },
];

fn summary(operation: &str) -> &'static str {
    TOOLS
        .iter()
        .find(|t| t.operation == operation)
        .map(|t| t.summary)
        .unwrap_or_default()
}

fn service_capability(binding: &Binding, backend: Arc<MockBackend>) -> Capability {
    let build = binding.build;
    let mut cap = Capability::new(binding.name, binding.side_effect, move |args: &CallArgs| {
        let call = build(args);
        Ok(json!({"success": true, "result": backend.execute(&call)}))
    })
    .describe(summary(binding.operation));
    for p in binding.params {
        cap = cap.param(ParamSpec::required(p));
    }
    cap
}

fn call_mcp_tool(backend: Arc<MockBackend>) -> Capability {
    Capability::new(CALL_MCP_TOOL, SideEffect::Network, move |args: &CallArgs| {
        let tool = args.str("tool_name")?;
        let operation = args.get("operation").and_then(Value::as_str);
        Ok(backend.dispatch(tool, operation, &args.rest("params")))
    })
    .param(ParamSpec::required("tool_name"))
    .param(ParamSpec::optional("operation"))
    .param(ParamSpec::rest("params"))
    .describe("Call any service operation by tool name")
}

/// Registry exposing every service capability, all backed by `backend`.
pub fn service_registry(backend: Arc<MockBackend>) -> Result<CapabilityRegistry, CapabilityError> {
    BINDINGS
        .iter()
        .fold(CapabilityRegistry::builder(), |builder, binding| {
            builder.register(service_capability(binding, Arc::clone(&backend)))
        })
        .register(call_mcp_tool(backend))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolscript_services::FixedClock;

    fn registry() -> CapabilityRegistry {
        service_registry(Arc::new(MockBackend::new(Arc::new(FixedClock(1000.0))))).unwrap()
    }

    fn call(reg: &CapabilityRegistry, name: &str, pos: Vec<Value>, kw: Vec<(&str, Value)>) -> Value {
        let cap = reg.resolve(name).unwrap();
        let kw = kw.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        cap.call(&cap.bind(pos, kw).unwrap()).unwrap()
    }

    #[test]
    fn test_registry_surface() {
        let reg = registry();
        assert_eq!(
            reg.names(),
            vec![
                "call_mcp_tool",
                "get_document",
                "get_sheet_data",
                "get_slack_messages",
                "query_records",
                "send_slack_message",
                "update_salesforce_record",
                "update_sheet",
                "upload_file",
            ]
        );
        assert_eq!(
            reg.resolve("call_mcp_tool").unwrap().signature(),
            "call_mcp_tool(tool_name, operation=None, **params)"
        );
        assert_eq!(reg.resolve("get_document").unwrap().description, "Fetch a Google Drive document by id");
    }

    #[test]
    fn test_named_capability_wraps_result() {
        let reg = registry();
        let out = call(&reg, "get_document", vec![json!("missing")], vec![]);
        assert_eq!(out, json!({"success": true, "result": {"error": "Document not found"}}));
    }

    #[test]
    fn test_named_and_generic_paths_agree() {
        let reg = registry();
        let named = call(&reg, "get_sheet_data", vec![json!("s1")], vec![]);
        let generic = call(
            &reg,
            "call_mcp_tool",
            vec![json!("google_sheets")],
            vec![("operation", json!("get_sheet_data")), ("sheet_id", json!("s1"))],
        );
        assert_eq!(named, generic);
    }

    #[test]
    fn test_generic_unknown_tool() {
        let reg = registry();
        let out = call(&reg, "call_mcp_tool", vec![json!("jira")], vec![("operation", json!("x"))]);
        assert_eq!(out, json!({"error": "Tool jira not found"}));
    }

    #[test]
    fn test_generic_tool_name_must_be_string() {
        let reg = registry();
        let cap = reg.resolve("call_mcp_tool").unwrap();
        let args = cap.bind(vec![json!(3)], vec![]).unwrap();
        assert!(matches!(cap.call(&args), Err(CapabilityError::Binding(_))));
    }

    #[test]
    fn test_capabilities_share_backend_state() {
        let reg = registry();
        call(
            &reg,
            "send_slack_message",
            vec![json!("#ops"), json!("hello")],
            vec![],
        );
        let out = call(&reg, "get_slack_messages", vec![], vec![("channel", json!("#ops"))]);
        assert_eq!(out["result"][2]["text"], json!("hello"));
    }
}
