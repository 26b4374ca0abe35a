//! In-memory backend for every mock service.
//!
//! State lives for the lifetime of the backend: uploaded files become readable
//! documents, record updates are visible to later queries, sent messages show up
//! in the channel history and sheet updates replace the sheet's rows.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::call::{CrmOp, DriveOp, MessagingOp, ServiceCall, ServiceError, SheetsOp};
use crate::clock::{Clock, SystemClock};

/// Author recorded for messages sent through the backend
pub const BOT_USER: &str = "toolscript";

#[derive(Debug, Clone, Serialize)]
struct Document {
    id: String,
    title: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    user: String,
    text: String,
    ts: f64,
}

#[derive(Debug, Default)]
struct State {
    documents: BTreeMap<String, Document>,
    records: BTreeMap<String, Map<String, Value>>,
    channels: BTreeMap<String, Vec<Message>>,
    sheets: BTreeMap<String, Vec<Value>>,
    uploads: u64,
}

impl State {
    fn seeded() -> Self {
        let mut state = State::default();
        state.documents.insert(
            "abc123".into(),
            Document {
                id: "abc123".into(),
                title: "Q4 goals meeting notes".into(),
                content: "Discussed the Q4 goals...\nFull meeting transcript with detailed notes and figures..."
                    .into(),
            },
        );
        for (id, name, status) in [("rec1", "Customer A", "active"), ("rec2", "Customer B", "inactive")] {
            let record = json!({"id": id, "name": name, "status": status});
            if let Value::Object(map) = record {
                state.records.insert(id.to_string(), map);
            }
        }
        state
    }
}

fn default_rows() -> Vec<Value> {
    vec![
        json!({"name": "Zhang San", "email": "zhangsan@example.com", "phone": "13800138000", "department": "Sales"}),
        json!({"name": "Li Si", "email": "lisi@example.com", "phone": "13800138001", "department": "Engineering"}),
        json!({"name": "Wang Wu", "email": "wangwu@example.com", "phone": "13800138002", "department": "Marketing"}),
    ]
}

fn default_history(now: f64) -> Vec<Message> {
    vec![
        Message {
            user: "U123".into(),
            text: "Deployment started".into(),
            ts: now - 300.0,
        },
        Message {
            user: "U123".into(),
            text: "Deployment finished".into(),
            ts: now - 60.0,
        },
    ]
}

fn to_value<T: Serialize>(v: &T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

/// Stateful stand-in for the document store, CRM, messaging and spreadsheet services.
#[derive(Debug)]
pub struct MockBackend {
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MockBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(State::seeded()),
        }
    }

    /// Generic entry point behind `call_mcp_tool`.
    ///
    /// Returns `{"success": true, "result": ...}` when the service handled the
    /// call (its result may itself carry an `error` key, e.g. an unknown document
    /// or an unsupported operation), or `{"error": ...}` when the call never
    /// reached a service.
    pub fn dispatch(&self, tool: &str, operation: Option<&str>, params: &Map<String, Value>) -> Value {
        tracing::debug!(tool, operation = operation.unwrap_or_default(), "service dispatch");
        match ServiceCall::parse(tool, operation, params) {
            Ok(call) => json!({"success": true, "result": self.execute(&call)}),
            Err(e @ ServiceError::UnsupportedOperation(_)) => {
                json!({"success": true, "result": {"error": e.to_string()}})
            }
            Err(e) => json!({"error": e.to_string()}),
        }
    }

    /// Run one typed operation and return the service's own response.
    pub fn execute(&self, call: &ServiceCall) -> Value {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match call {
            ServiceCall::Drive(op) => self.drive(&mut state, op),
            ServiceCall::Crm(op) => crm(&mut state, op),
            ServiceCall::Messaging(op) => self.messaging(&mut state, op),
            ServiceCall::Sheets(op) => sheets(&mut state, op),
        }
    }

    fn drive(&self, state: &mut State, op: &DriveOp) -> Value {
        match op {
            DriveOp::GetDocument { document_id } => match state.documents.get(document_id) {
                Some(doc) => to_value(doc),
                None => json!({"error": "Document not found"}),
            },
            DriveOp::UploadFile { file_path, folder_id } => {
                state.uploads += 1;
                let file_id = format!("file{:03}", state.uploads);
                let title = file_path.rsplit('/').next().unwrap_or(file_path).to_string();
                state.documents.insert(
                    file_id.clone(),
                    Document {
                        id: file_id.clone(),
                        title,
                        content: String::new(),
                    },
                );
                tracing::debug!(file_id = %file_id, uploaded_at = self.clock.now(), "file uploaded");
                json!({
                    "status": "uploaded",
                    "file_id": file_id,
                    "file_path": file_path,
                    "folder_id": folder_id,
                })
            }
        }
    }

    fn messaging(&self, state: &mut State, op: &MessagingOp) -> Value {
        let now = self.clock.now();
        match op {
            MessagingOp::SendMessage { channel, message } => {
                state
                    .channels
                    .entry(channel.clone())
                    .or_insert_with(|| default_history(now))
                    .push(Message {
                        user: BOT_USER.into(),
                        text: message.clone(),
                        ts: now,
                    });
                json!({"status": "sent", "channel": channel, "ts": now})
            }
            MessagingOp::GetMessages { channel } => {
                let history = state
                    .channels
                    .entry(channel.clone())
                    .or_insert_with(|| default_history(now));
                to_value(history)
            }
        }
    }
}

fn crm(state: &mut State, op: &CrmOp) -> Value {
    match op {
        CrmOp::UpdateRecord { record_id, data } => {
            let record = state.records.entry(record_id.clone()).or_insert_with(|| {
                let mut map = Map::new();
                map.insert("id".into(), Value::String(record_id.clone()));
                map
            });
            let updated_fields = match data {
                Value::Object(fields) => {
                    for (k, v) in fields {
                        record.insert(k.clone(), v.clone());
                    }
                    fields.len()
                }
                _ => 1,
            };
            json!({"status": "success", "record_id": record_id, "updated_fields": updated_fields})
        }
        CrmOp::QueryRecords { criteria, .. } => {
            let matches = |record: &Map<String, Value>| match criteria {
                Some(Value::Object(want)) => want.iter().all(|(k, v)| record.get(k) == Some(v)),
                _ => true,
            };
            Value::Array(
                state
                    .records
                    .values()
                    .filter(|r| matches(r))
                    .map(|r| Value::Object(r.clone()))
                    .collect(),
            )
        }
    }
}

fn sheets(state: &mut State, op: &SheetsOp) -> Value {
    match op {
        SheetsOp::GetSheetData { sheet_id } => {
            Value::Array(state.sheets.entry(sheet_id.clone()).or_insert_with(default_rows).clone())
        }
        SheetsOp::UpdateSheet {
            sheet_id,
            data,
            rows_count,
        } => {
            let written = match data {
                Value::Array(rows) => {
                    state.sheets.insert(sheet_id.clone(), rows.clone());
                    rows.len() as i64
                }
                _ => 0,
            };
            json!({"status": "updated", "rows_affected": rows_count.unwrap_or(written)})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    const NOW: f64 = 1_700_000_000.0;

    fn backend() -> MockBackend {
        MockBackend::new(Arc::new(FixedClock(NOW)))
    }

    fn params(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_known_document() {
        let out = backend().dispatch("google_drive", Some("get_document"), &params(json!({"document_id": "abc123"})));
        assert_eq!(out["success"], json!(true));
        assert_eq!(out["result"]["id"], json!("abc123"));
        assert!(out["result"]["content"].as_str().unwrap().starts_with("Discussed the Q4 goals"));
    }

    #[test]
    fn test_unknown_document_is_nested_error() {
        let out = backend().dispatch("google_drive", Some("get_document"), &params(json!({"document_id": "nope"})));
        assert_eq!(out, json!({"success": true, "result": {"error": "Document not found"}}));
    }

    #[test]
    fn test_unsupported_operation_is_nested_error() {
        let out = backend().dispatch("slack", Some("archive"), &Map::new());
        assert_eq!(out, json!({"success": true, "result": {"error": "Operation archive not supported"}}));
    }

    #[test]
    fn test_unknown_tool_is_top_level_error() {
        let out = backend().dispatch("jira", Some("get_issue"), &Map::new());
        assert_eq!(out, json!({"error": "Tool jira not found"}));
    }

    #[test]
    fn test_sent_messages_join_history() {
        let b = backend();
        let sent = b.dispatch(
            "slack",
            Some("send_message"),
            &params(json!({"channel": "#deploys", "message": "rolled back"})),
        );
        assert_eq!(sent["result"], json!({"status": "sent", "channel": "#deploys", "ts": NOW}));
        let history = b.dispatch("slack", Some("get_messages"), &params(json!({"channel": "#deploys"})));
        let texts: Vec<&str> = history["result"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["text"].as_str().unwrap())
            .collect();
        assert_eq!(texts, vec!["Deployment started", "Deployment finished", "rolled back"]);
        assert_eq!(history["result"][0]["ts"], json!(NOW - 300.0));
    }

    #[test]
    fn test_record_update_visible_to_query() {
        let b = backend();
        let out = b.execute(&ServiceCall::Crm(CrmOp::UpdateRecord {
            record_id: "rec2".into(),
            data: json!({"status": "active", "tier": "gold"}),
        }));
        assert_eq!(out, json!({"status": "success", "record_id": "rec2", "updated_fields": 2}));
        let active = b.execute(&ServiceCall::Crm(CrmOp::QueryRecords {
            object_type: Some("Account".into()),
            criteria: Some(json!({"status": "active"})),
        }));
        assert_eq!(active.as_array().unwrap().len(), 2);
        let gold = b.execute(&ServiceCall::Crm(CrmOp::QueryRecords {
            object_type: None,
            criteria: Some(json!({"tier": "gold"})),
        }));
        assert_eq!(gold[0]["id"], json!("rec2"));
    }

    #[test]
    fn test_non_mapping_update_counts_one_field() {
        let out = backend().execute(&ServiceCall::Crm(CrmOp::UpdateRecord {
            record_id: "rec9".into(),
            data: json!("closed"),
        }));
        assert_eq!(out["updated_fields"], json!(1));
    }

    #[test]
    fn test_sheet_update_replaces_rows() {
        let b = backend();
        let rows = b.execute(&ServiceCall::Sheets(SheetsOp::GetSheetData { sheet_id: "s1".into() }));
        assert_eq!(rows.as_array().unwrap().len(), 3);
        assert_eq!(rows[0]["department"], json!("Sales"));

        let out = b.dispatch(
            "google_sheets",
            Some("update_sheet"),
            &params(json!({"sheet_id": "s1", "data": [{"name": "Ada"}]})),
        );
        assert_eq!(out["result"], json!({"status": "updated", "rows_affected": 1}));
        let rows = b.execute(&ServiceCall::Sheets(SheetsOp::GetSheetData { sheet_id: "s1".into() }));
        assert_eq!(rows, json!([{"name": "Ada"}]));
    }

    #[test]
    fn test_uploaded_file_becomes_document() {
        let b = backend();
        let out = b.execute(&ServiceCall::Drive(DriveOp::UploadFile {
            file_path: "/tmp/report.pdf".into(),
            folder_id: Some("f1".into()),
        }));
        assert_eq!(out["status"], json!("uploaded"));
        assert_eq!(out["file_id"], json!("file001"));
        let doc = b.execute(&ServiceCall::Drive(DriveOp::GetDocument { document_id: "file001".into() }));
        assert_eq!(doc["title"], json!("report.pdf"));
    }
}
