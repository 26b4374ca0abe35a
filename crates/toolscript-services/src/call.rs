//! Typed service operations.
//!
//! Each service is a closed enum of the operations it supports. Programs reach
//! services by name through `call_mcp_tool`, so [`ServiceCall::parse`] is the one
//! place where tool and operation strings are interpreted.

use serde_json::{Map, Value};
use thiserror::Error;

/// Failure to turn a `(tool, operation, params)` triple into a [`ServiceCall`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Tool {0} not found")]
    UnknownTool(String),
    #[error("Operation {0} not supported")]
    UnsupportedOperation(String),
    #[error("missing parameter '{0}'")]
    MissingParameter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Service {
    Drive,
    Crm,
    Messaging,
    Sheets,
}

impl Service {
    pub const ALL: [Service; 4] = [Service::Drive, Service::Crm, Service::Messaging, Service::Sheets];

    /// Tool name programs pass to `call_mcp_tool`.
    pub fn tool_name(self) -> &'static str {
        match self {
            Service::Drive => "google_drive",
            Service::Crm => "salesforce",
            Service::Messaging => "slack",
            Service::Sheets => "google_sheets",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.tool_name() == name)
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tool_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriveOp {
    GetDocument { document_id: String },
    UploadFile { file_path: String, folder_id: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrmOp {
    UpdateRecord { record_id: String, data: Value },
    /// `criteria` is a field → value mapping every returned record must match.
    QueryRecords { object_type: Option<String>, criteria: Option<Value> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessagingOp {
    SendMessage { channel: String, message: String },
    GetMessages { channel: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SheetsOp {
    GetSheetData { sheet_id: String },
    /// `rows_count` overrides the reported number of affected rows.
    UpdateSheet { sheet_id: String, data: Value, rows_count: Option<i64> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    Drive(DriveOp),
    Crm(CrmOp),
    Messaging(MessagingOp),
    Sheets(SheetsOp),
}

impl ServiceCall {
    pub fn service(&self) -> Service {
        match self {
            ServiceCall::Drive(_) => Service::Drive,
            ServiceCall::Crm(_) => Service::Crm,
            ServiceCall::Messaging(_) => Service::Messaging,
            ServiceCall::Sheets(_) => Service::Sheets,
        }
    }

    /// Operation name as programs spell it.
    pub fn operation(&self) -> &'static str {
        match self {
            ServiceCall::Drive(DriveOp::GetDocument { .. }) => "get_document",
            ServiceCall::Drive(DriveOp::UploadFile { .. }) => "upload_file",
            ServiceCall::Crm(CrmOp::UpdateRecord { .. }) => "update_record",
            ServiceCall::Crm(CrmOp::QueryRecords { .. }) => "query_records",
            ServiceCall::Messaging(MessagingOp::SendMessage { .. }) => "send_message",
            ServiceCall::Messaging(MessagingOp::GetMessages { .. }) => "get_messages",
            ServiceCall::Sheets(SheetsOp::GetSheetData { .. }) => "get_sheet_data",
            ServiceCall::Sheets(SheetsOp::UpdateSheet { .. }) => "update_sheet",
        }
    }

    /// Interpret a generic call. The tool is checked before the operation, the
    /// operation before its parameters.
    pub fn parse(
        tool: &str,
        operation: Option<&str>,
        params: &Map<String, Value>,
    ) -> Result<Self, ServiceError> {
        let service = Service::from_tool_name(tool)
            .ok_or_else(|| ServiceError::UnknownTool(tool.to_string()))?;
        let operation = operation.ok_or_else(|| ServiceError::MissingParameter("operation".into()))?;
        let p = Params(params);
        let call = match (service, operation) {
            (Service::Drive, "get_document") => ServiceCall::Drive(DriveOp::GetDocument {
                document_id: p.text("document_id")?,
            }),
            (Service::Drive, "upload_file") => ServiceCall::Drive(DriveOp::UploadFile {
                file_path: p.text("file_path")?,
                folder_id: p.optional_text("folder_id"),
            }),
            (Service::Crm, "update_record") => ServiceCall::Crm(CrmOp::UpdateRecord {
                record_id: p.text("record_id")?,
                data: p.value("data")?,
            }),
            (Service::Crm, "query_records") => ServiceCall::Crm(CrmOp::QueryRecords {
                object_type: p.optional_text("object_type"),
                criteria: p.optional_value("criteria"),
            }),
            (Service::Messaging, "send_message") => {
                ServiceCall::Messaging(MessagingOp::SendMessage {
                    channel: p.text("channel")?,
                    message: p.text("message")?,
                })
            }
            (Service::Messaging, "get_messages") => {
                ServiceCall::Messaging(MessagingOp::GetMessages {
                    channel: p.text("channel")?,
                })
            }
            (Service::Sheets, "get_sheet_data") => ServiceCall::Sheets(SheetsOp::GetSheetData {
                sheet_id: p.text("sheet_id")?,
            }),
            (Service::Sheets, "update_sheet") => ServiceCall::Sheets(SheetsOp::UpdateSheet {
                sheet_id: p.text("sheet_id")?,
                data: p.optional_value("data").unwrap_or(Value::Array(Vec::new())),
                rows_count: p.optional_value("rows_count").and_then(|v| v.as_i64()),
            }),
            (_, other) => return Err(ServiceError::UnsupportedOperation(other.to_string())),
        };
        Ok(call)
    }
}

struct Params<'a>(&'a Map<String, Value>);

impl Params<'_> {
    fn optional_value(&self, name: &str) -> Option<Value> {
        self.0.get(name).filter(|v| !v.is_null()).cloned()
    }

    fn value(&self, name: &str) -> Result<Value, ServiceError> {
        self.optional_value(name)
            .ok_or_else(|| ServiceError::MissingParameter(name.to_string()))
    }

    /// Identifiers arrive as strings, but numbers and booleans are accepted in text form.
    fn optional_text(&self, name: &str) -> Option<String> {
        self.optional_value(name).map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    fn text(&self, name: &str) -> Result<String, ServiceError> {
        self.optional_text(name)
            .ok_or_else(|| ServiceError::MissingParameter(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_parse_get_document() {
        let call = ServiceCall::parse(
            "google_drive",
            Some("get_document"),
            &params(json!({"document_id": "abc123"})),
        )
        .unwrap();
        assert_eq!(
            call,
            ServiceCall::Drive(DriveOp::GetDocument { document_id: "abc123".into() })
        );
        assert_eq!(call.service(), Service::Drive);
        assert_eq!(call.operation(), "get_document");
    }

    #[test]
    fn test_unknown_tool_checked_first() {
        let err = ServiceCall::parse("dropbox", Some("nope"), &Map::new()).unwrap_err();
        assert_eq!(err.to_string(), "Tool dropbox not found");
    }

    #[test]
    fn test_unsupported_operation() {
        let err = ServiceCall::parse("slack", Some("delete_channel"), &Map::new()).unwrap_err();
        assert_eq!(err, ServiceError::UnsupportedOperation("delete_channel".into()));
        assert_eq!(err.to_string(), "Operation delete_channel not supported");
    }

    #[test]
    fn test_missing_parameter() {
        let err = ServiceCall::parse("slack", Some("send_message"), &params(json!({"channel": "#ops"})))
            .unwrap_err();
        assert_eq!(err.to_string(), "missing parameter 'message'");
        let err = ServiceCall::parse("slack", None, &Map::new()).unwrap_err();
        assert_eq!(err.to_string(), "missing parameter 'operation'");
    }

    #[test]
    fn test_null_counts_as_missing() {
        let err = ServiceCall::parse(
            "salesforce",
            Some("update_record"),
            &params(json!({"record_id": "rec1", "data": null})),
        )
        .unwrap_err();
        assert_eq!(err, ServiceError::MissingParameter("data".into()));
    }

    #[test]
    fn test_numeric_identifier_accepted_as_text() {
        let call = ServiceCall::parse("google_sheets", Some("get_sheet_data"), &params(json!({"sheet_id": 7})))
            .unwrap();
        assert_eq!(call, ServiceCall::Sheets(SheetsOp::GetSheetData { sheet_id: "7".into() }));
    }

    #[test]
    fn test_tool_names_round_trip() {
        for service in Service::ALL {
            assert_eq!(Service::from_tool_name(service.tool_name()), Some(service));
        }
    }
}
