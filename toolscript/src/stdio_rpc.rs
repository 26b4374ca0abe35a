//! Stdio JSON-RPC 2.0 server (`toolscript serve --stdio`).
//!
//! One request per line on stdin, one response per line on stdout. Requests run
//! concurrently on the rayon pool against a single shared [`CodeExecutor`], so
//! service state and saved skills are visible across requests.
//!
//! Request: `{"jsonrpc":"2.0","id":1,"method":"execute","params":{"code":"..."}}`
//! Response: `{"jsonrpc":"2.0","id":1,"result":{...}}` or `{"jsonrpc":"2.0","id":1,"error":{...}}`

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use toolscript_core::config::SandboxConfig;
use toolscript_executor::{skills_file, CodeExecutor, SkillStore};

/// Maximum JSON-RPC request size (10 MB).
const MAX_REQUEST_SIZE: usize = 10 * 1024 * 1024;

/// Shared state for every request handled by one server.
pub(crate) struct RpcContext {
    executor: CodeExecutor,
    skills_path: PathBuf,
}

impl RpcContext {
    pub(crate) fn load(config: &SandboxConfig, skills_path: PathBuf) -> Result<Self> {
        let store = SkillStore::load(&skills_path)
            .with_context(|| format!("Failed to load skill store: {}", skills_path.display()))?;
        let executor = CodeExecutor::new(config)?.with_skills(store);
        Ok(Self {
            executor,
            skills_path,
        })
    }
}

/// Run the stdio RPC daemon until stdin closes.
pub fn serve_stdio() -> Result<()> {
    let ctx = Arc::new(RpcContext::load(&SandboxConfig::from_env(), skills_file())?);
    tracing::info!(skills = ctx.executor.skills().len(), "stdio rpc ready");

    let (tx, rx) = mpsc::channel::<(Value, std::result::Result<Value, String>)>();

    // stdout is not Sync: a single writer thread owns it
    let writer_handle = thread::spawn(move || -> Result<()> {
        let mut stdout = io::stdout();
        for (id, result) in rx {
            writeln!(stdout, "{}", response(id, result))?;
            stdout.flush()?;
        }
        Ok(())
    });

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let mut pending = 0usize;

    loop {
        let line = match read_line_limited(&mut reader) {
            Ok(None) => break,
            Ok(Some(l)) => l,
            Err(e) => {
                tracing::warn!(error = %e, "rejected request");
                let _ = tx.send((Value::Null, Err(format!("Request size error: {}", e))));
                continue;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                let _ = tx.send((Value::Null, Err(format!("Parse error: {}", e))));
                continue;
            }
        };

        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request
            .get("method")
            .and_then(|m| m.as_str())
            .unwrap_or("")
            .to_string();
        let params = request
            .get("params")
            .cloned()
            .unwrap_or(Value::Object(Map::new()));

        pending += 1;
        let tx = tx.clone();
        let done_tx = done_tx.clone();
        let ctx = Arc::clone(&ctx);
        rayon::spawn(move || {
            let result = dispatch_request(&ctx, &method, &params);
            let _ = tx.send((id, result.map_err(|e| e.to_string())));
            let _ = done_tx.send(());
        });
    }

    for _ in 0..pending {
        let _ = done_rx.recv();
    }
    drop(tx);
    writer_handle
        .join()
        .map_err(|_| anyhow::anyhow!("Writer thread panicked"))??;

    Ok(())
}

fn response(id: Value, result: std::result::Result<Value, String>) -> Value {
    match result {
        Ok(res) => json!({"jsonrpc": "2.0", "id": id, "result": res}),
        Err(msg) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32603, "message": msg}
        }),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Size-limited stdin reader
// ═══════════════════════════════════════════════════════════════════════════════

/// Read a single line from `reader`, enforcing [`MAX_REQUEST_SIZE`].
/// Returns `Ok(None)` on EOF, `Ok(Some(line))` on success.
fn read_line_limited(reader: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    loop {
        let available = match reader.fill_buf() {
            Ok(b) => b,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return if buf.is_empty() {
                Ok(None)
            } else {
                if buf.last() == Some(&b'\r') { buf.pop(); }
                String::from_utf8(buf)
                    .map(Some)
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Invalid UTF-8"))
            };
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                if buf.len() + pos > MAX_REQUEST_SIZE {
                    reader.consume(pos + 1);
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "Request exceeds 10MB size limit",
                    ));
                }
                buf.extend_from_slice(&available[..pos]);
                reader.consume(pos + 1);
                if buf.last() == Some(&b'\r') { buf.pop(); }
                return String::from_utf8(buf)
                    .map(Some)
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Invalid UTF-8"));
            }
            None => {
                let len = available.len();
                if buf.len() + len > MAX_REQUEST_SIZE {
                    reader.consume(len);
                    skip_until_newline(reader);
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "Request exceeds 10MB size limit",
                    ));
                }
                buf.extend_from_slice(available);
                reader.consume(len);
            }
        }
    }
}

fn skip_until_newline(reader: &mut impl BufRead) {
    loop {
        match reader.fill_buf() {
            Ok(b) if b.is_empty() => break,
            Ok(b) => {
                if let Some(pos) = b.iter().position(|&c| c == b'\n') {
                    reader.consume(pos + 1);
                    break;
                }
                let len = b.len();
                reader.consume(len);
            }
            Err(_) => break,
        }
    }
}

/// Route one request to its handler.
pub(crate) fn dispatch_request(ctx: &RpcContext, method: &str, params: &Value) -> Result<Value> {
    let p = params.as_object().context("params must be object")?;
    let ex = &ctx.executor;
    match method {
        "execute" => Ok(ex.execute(str_param(p, "code")?).to_json()),
        "validate" => Ok(serde_json::to_value(ex.validate(str_param(p, "code")?))?),
        "save_skill" => {
            let skill = ex.save_skill(str_param(p, "name")?, str_param(p, "template")?)?;
            ex.persist_skills(&ctx.skills_path)?;
            Ok(json!({"saved": skill.name, "arguments": skill.placeholders()}))
        }
        "invoke_skill" => {
            let name = str_param(p, "name")?;
            let args = match p.get("args") {
                None | Some(Value::Null) => Map::new(),
                Some(Value::Object(m)) => m.clone(),
                Some(_) => anyhow::bail!("args must be object"),
            };
            Ok(ex.invoke_skill(name, &args).to_json())
        }
        "list_skills" => {
            let skills: Vec<Value> = ex
                .list_skills()
                .iter()
                .map(|s| json!({"name": s.name, "arguments": s.placeholders()}))
                .collect();
            Ok(json!({"skills": skills}))
        }
        "ls" => {
            let path = p.get("path").and_then(|v| v.as_str()).unwrap_or("");
            Ok(json!({"entries": ex.ls(path)?}))
        }
        "cat" => Ok(json!({"content": ex.cat(str_param(p, "path")?)?})),
        "find_tools" => {
            let service = p.get("service").and_then(|v| v.as_str());
            Ok(json!({"tools": ex.find_tools(service)}))
        }
        _ => anyhow::bail!("Method not found: {}", method),
    }
}

fn str_param<'a>(p: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    p.get(key)
        .and_then(|v| v.as_str())
        .with_context(|| format!("{} required", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ctx() -> (tempfile::TempDir, RpcContext) {
        let dir = tempfile::tempdir().unwrap();
        let config = SandboxConfig {
            max_steps: 100_000,
            ..SandboxConfig::default()
        };
        let ctx = RpcContext::load(&config, dir.path().join("skills.json")).unwrap();
        (dir, ctx)
    }

    #[test]
    fn test_execute_returns_envelope() {
        let (_dir, ctx) = ctx();
        let res = dispatch_request(&ctx, "execute", &json!({"code": "print('hi')\nresult = 6 * 7"})).unwrap();
        assert_eq!(res["success"], json!(true));
        assert_eq!(res["result"], json!(42));
        assert_eq!(res["output"], json!("hi\n"));
    }

    #[test]
    fn test_validate_reports_errors() {
        let (_dir, ctx) = ctx();
        let res = dispatch_request(&ctx, "validate", &json!({"code": "import os"})).unwrap();
        assert_eq!(res["valid"], json!(false));
        assert!(!res["errors"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_save_skill_persists_and_invokes() {
        let (dir, ctx) = ctx();
        dispatch_request(
            &ctx,
            "save_skill",
            &json!({"name": "double", "template": "result = {{n}} * 2"}),
        )
        .unwrap();
        assert!(dir.path().join("skills.json").exists());

        let res = dispatch_request(&ctx, "invoke_skill", &json!({"name": "double", "args": {"n": 21}})).unwrap();
        assert_eq!(res["result"], json!(42));

        let list = dispatch_request(&ctx, "list_skills", &json!({})).unwrap();
        assert_eq!(list["skills"][0]["arguments"], json!(["n"]));
    }

    #[test]
    fn test_unknown_skill_is_envelope_not_rpc_error() {
        let (_dir, ctx) = ctx();
        let res = dispatch_request(&ctx, "invoke_skill", &json!({"name": "nope"})).unwrap();
        assert_eq!(res["success"], json!(false));
        assert_eq!(res["fault"], json!("not_found"));
    }

    #[test]
    fn test_catalog_methods() {
        let (_dir, ctx) = ctx();
        let ls = dispatch_request(&ctx, "ls", &json!({})).unwrap();
        assert_eq!(ls["entries"], json!(["servers"]));
        let cat = dispatch_request(&ctx, "cat", &json!({"path": "servers/slack/sendMessage.py"})).unwrap();
        assert!(cat["content"].as_str().unwrap().contains("call_mcp_tool(\"slack\""));
        assert!(dispatch_request(&ctx, "cat", &json!({"path": "servers/x.py"})).is_err());
    }

    #[test]
    fn test_bad_requests() {
        let (_dir, ctx) = ctx();
        let err = dispatch_request(&ctx, "nope", &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Method not found: nope");
        let err = dispatch_request(&ctx, "execute", &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "code required");
        assert!(dispatch_request(&ctx, "execute", &json!([1])).is_err());
    }

    #[test]
    fn test_error_response_shape() {
        let resp = response(json!(7), Err("boom".into()));
        assert_eq!(resp, json!({"jsonrpc": "2.0", "id": 7, "error": {"code": -32603, "message": "boom"}}));
    }

    #[test]
    fn test_read_line_limited() {
        let mut r = Cursor::new(b"one\r\ntwo".to_vec());
        assert_eq!(read_line_limited(&mut r).unwrap().as_deref(), Some("one"));
        assert_eq!(read_line_limited(&mut r).unwrap().as_deref(), Some("two"));
        assert_eq!(read_line_limited(&mut r).unwrap(), None);
    }

    #[test]
    fn test_oversized_request_is_skipped() {
        let mut data = vec![b'x'; MAX_REQUEST_SIZE + 1];
        data.extend_from_slice(b"\nnext\n");
        let mut r = BufReader::with_capacity(64 * 1024, Cursor::new(data));
        assert!(read_line_limited(&mut r).is_err());
        assert_eq!(read_line_limited(&mut r).unwrap().as_deref(), Some("next"));
    }
}
