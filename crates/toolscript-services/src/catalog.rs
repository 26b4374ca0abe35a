//! Tool discovery catalog: a read-only virtual filesystem an agent browses to
//! find out which service calls exist before writing a program.
//!
//! Layout is `servers/<service>/<tool>.py`; each file is a short stub showing how
//! the tool is reached through `call_mcp_tool`.

use std::collections::BTreeMap;

use thiserror::Error;

/// Root directory holding one subdirectory per service
pub const SERVERS_DIR: &str = "servers";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Directory not found - {0}")]
    DirectoryNotFound(String),
    #[error("File not found - {0}")]
    FileNotFound(String),
}

/// One tool as exposed in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    /// Tool name passed to `call_mcp_tool`
    pub service: &'static str,
    /// File stem under `servers/<service>/`
    pub file: &'static str,
    /// Function name defined by the stub
    pub function: &'static str,
    pub operation: &'static str,
    pub params: &'static [&'static str],
    pub summary: &'static str,
}

impl ToolSpec {
    pub fn path(&self) -> String {
        format!("{}/{}/{}.py", SERVERS_DIR, self.service, self.file)
    }

    /// Stub source: a function forwarding its parameters to `call_mcp_tool`.
    pub fn render(&self) -> String {
        let forwarded: String = self
            .params
            .iter()
            .map(|p| format!(", {}={}", p, p))
            .collect();
        format!(
            "def {}({}):\n    \"\"\"{}\"\"\"\n    return call_mcp_tool(\"{}\", operation=\"{}\"{})\n",
            self.function,
            self.params.join(", "),
            self.summary,
            self.service,
            self.operation,
            forwarded,
        )
    }
}

/// Every tool the mock services expose.
pub const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        service: "google_drive",
        file: "getDocument",
        function: "get_document",
        operation: "get_document",
        params: &["document_id"],
        summary: "Fetch a Google Drive document by id",
    },
    ToolSpec {
        service: "google_drive",
        file: "uploadFile",
        function: "upload_file",
        operation: "upload_file",
        params: &["file_path", "folder_id"],
        summary: "Upload a file to a Google Drive folder",
    },
    ToolSpec {
        service: "salesforce",
        file: "updateRecord",
        function: "update_record",
        operation: "update_record",
        params: &["record_id", "data"],
        summary: "Update fields of a Salesforce record",
    },
    ToolSpec {
        service: "salesforce",
        file: "queryRecords",
        function: "query_records",
        operation: "query_records",
        params: &["object_type", "criteria"],
        summary: "Query Salesforce records matching the given field values",
    },
    ToolSpec {
        service: "slack",
        file: "sendMessage",
        function: "send_message",
        operation: "send_message",
        params: &["channel", "message"],
        summary: "Send a message to a Slack channel",
    },
    ToolSpec {
        service: "slack",
        file: "getMessages",
        function: "get_messages",
        operation: "get_messages",
        params: &["channel"],
        summary: "List the messages of a Slack channel",
    },
    ToolSpec {
        service: "google_sheets",
        file: "getSheetData",
        function: "get_sheet_data",
        operation: "get_sheet_data",
        params: &["sheet_id"],
        summary: "Read all rows of a spreadsheet",
    },
    ToolSpec {
        service: "google_sheets",
        file: "updateSheet",
        function: "update_sheet",
        operation: "update_sheet",
        params: &["sheet_id", "data"],
        summary: "Replace the rows of a spreadsheet",
    },
];

#[derive(Debug, Clone)]
enum Node {
    Dir(BTreeMap<String, Node>),
    File(String),
}

/// Static, sorted virtual filesystem built from a tool table.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: BTreeMap<String, Node>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::from_tools(TOOLS)
    }
}

fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|p| !p.is_empty() && *p != ".").collect()
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools(tools: &[ToolSpec]) -> Self {
        let mut servers: BTreeMap<String, Node> = BTreeMap::new();
        for tool in tools {
            let dir = servers
                .entry(tool.service.to_string())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            if let Node::Dir(files) = dir {
                files.insert(format!("{}.py", tool.file), Node::File(tool.render()));
            }
        }
        let mut root = BTreeMap::new();
        root.insert(SERVERS_DIR.to_string(), Node::Dir(servers));
        Self { root }
    }

    fn dir(&self, parts: &[&str]) -> Option<&BTreeMap<String, Node>> {
        let mut current = &self.root;
        for part in parts {
            match current.get(*part) {
                Some(Node::Dir(children)) => current = children,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Entries of a directory, sorted. `""` and `"/"` name the root.
    pub fn list(&self, path: &str) -> Result<Vec<String>, CatalogError> {
        self.dir(&split(path))
            .map(|d| d.keys().cloned().collect())
            .ok_or_else(|| CatalogError::DirectoryNotFound(path.to_string()))
    }

    /// Contents of a file.
    pub fn read(&self, path: &str) -> Result<String, CatalogError> {
        let parts = split(path);
        let Some((name, parents)) = parts.split_last() else {
            return Err(CatalogError::FileNotFound(path.to_string()));
        };
        let dir = self
            .dir(parents)
            .ok_or_else(|| CatalogError::DirectoryNotFound(parents.join("/")))?;
        match dir.get(*name) {
            Some(Node::File(content)) => Ok(content.clone()),
            _ => Err(CatalogError::FileNotFound(path.to_string())),
        }
    }

    /// Paths of every tool file, or only those of `service`. Unknown services yield nothing.
    pub fn find_tools(&self, service: Option<&str>) -> Vec<String> {
        let Some(servers) = self.dir(&[SERVERS_DIR]) else {
            return Vec::new();
        };
        servers
            .iter()
            .filter(|(name, _)| service.map_or(true, |s| s == name.as_str()))
            .flat_map(|(name, node)| match node {
                Node::Dir(files) => files
                    .keys()
                    .map(|f| format!("{}/{}/{}", SERVERS_DIR, name, f))
                    .collect::<Vec<_>>(),
                Node::File(_) => Vec::new(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_root_and_services() {
        let c = Catalog::new();
        assert_eq!(c.list("/").unwrap(), vec!["servers"]);
        assert_eq!(c.list("").unwrap(), vec!["servers"]);
        assert_eq!(
            c.list("servers").unwrap(),
            vec!["google_drive", "google_sheets", "salesforce", "slack"]
        );
        assert_eq!(
            c.list("/servers/google_drive/").unwrap(),
            vec!["getDocument.py", "uploadFile.py"]
        );
    }

    #[test]
    fn test_list_missing_directory() {
        let err = Catalog::new().list("servers/dropbox").unwrap_err();
        assert_eq!(err.to_string(), "Directory not found - servers/dropbox");
        // a file is not a directory
        assert!(Catalog::new().list("servers/slack/sendMessage.py").is_err());
    }

    #[test]
    fn test_read_stub() {
        let src = Catalog::new().read("servers/google_drive/uploadFile.py").unwrap();
        assert_eq!(
            src,
            "def upload_file(file_path, folder_id):\n    \"\"\"Upload a file to a Google Drive folder\"\"\"\n    return call_mcp_tool(\"google_drive\", operation=\"upload_file\", file_path=file_path, folder_id=folder_id)\n"
        );
    }

    #[test]
    fn test_read_errors() {
        let c = Catalog::new();
        assert_eq!(
            c.read("servers/slack/nope.py").unwrap_err(),
            CatalogError::FileNotFound("servers/slack/nope.py".into())
        );
        assert_eq!(
            c.read("servers/jira/x.py").unwrap_err().to_string(),
            "Directory not found - servers/jira"
        );
        assert!(c.read("servers").is_err());
        assert!(c.read("").is_err());
    }

    #[test]
    fn test_find_tools() {
        let c = Catalog::new();
        assert_eq!(c.find_tools(None).len(), TOOLS.len());
        assert_eq!(
            c.find_tools(Some("slack")),
            vec!["servers/slack/getMessages.py", "servers/slack/sendMessage.py"]
        );
        assert!(c.find_tools(Some("jira")).is_empty());
    }

    #[test]
    fn test_every_tool_path_is_readable() {
        let c = Catalog::new();
        for tool in TOOLS {
            assert!(c.read(&tool.path()).unwrap().starts_with(&format!("def {}(", tool.function)));
        }
    }
}
