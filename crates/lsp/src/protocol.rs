use lsp_types::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use url::Url;

#[derive(Error, Debug)]
pub enum LspError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("LSP error: {0}")]
    Protocol(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Process not started")]
    NotStarted,
}

pub type Result<T> = std::result::Result<T, LspError>;

type Pending = Arc<Mutex<HashMap<i64, oneshot::Sender<Value>>>>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC client speaking to a language server over stdio
pub struct LspClient {
    process: Option<Child>,
    stdin: Option<ChildStdin>,
    next_id: i64,
    pending: Pending,
    workspace: String,
}

impl LspClient {
    pub fn new(workspace: &str) -> Self {
        Self {
            process: None,
            stdin: None,
            next_id: 0,
            pending: Arc::new(Mutex::new(HashMap::new())),
            workspace: workspace.to_string(),
        }
    }

    /// Spawns the server process and starts the response reader thread.
    pub fn start(&mut self, command: &str, args: &[&str]) -> Result<()> {
        tracing::info!("Starting LSP: {} {:?} in {}", command, args, self.workspace);

        let mut child = Command::new(command)
            .args(args)
            .current_dir(&self.workspace)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = child.stdin.take().ok_or(LspError::NotStarted)?;
        let stdout = child.stdout.take().ok_or(LspError::NotStarted)?;

        self.stdin = Some(stdin);

        let pending = Arc::clone(&self.pending);
        std::thread::spawn(move || {
            Self::dispatch_responses(stdout, pending);
        });

        self.process = Some(child);
        Ok(())
    }

    /// Routes every response frame to the request waiting on its id.
    /// Notifications and server-initiated requests are discarded.
    fn dispatch_responses(stdout: ChildStdout, pending: Pending) {
        let mut reader = BufReader::new(stdout);

        loop {
            let body = match read_frame(&mut reader) {
                Ok(Some(body)) => body,
                Ok(None) => return,
                Err(e) => {
                    tracing::debug!("LSP reader stopped: {}", e);
                    return;
                }
            };

            let Ok(msg) = serde_json::from_slice::<Value>(&body) else {
                continue;
            };
            if msg.get("method").is_some() {
                continue;
            }
            if let Some(id) = msg.get("id").and_then(Value::as_i64) {
                if let Some(sender) = lock(&pending).remove(&id) {
                    let _ = sender.send(msg);
                }
            }
        }
    }

    /// Sends a request and waits for its result.
    pub async fn request<R: for<'de> Deserialize<'de>>(&mut self, method: &str, params: Value) -> Result<R> {
        if self.stdin.is_none() {
            return Err(LspError::NotStarted);
        }
        self.next_id += 1;
        let id = self.next_id;

        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        // register before writing so a fast reply cannot be missed
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        let stdin = self.stdin.as_mut().ok_or(LspError::NotStarted)?;
        write_frame(stdin, &request)?;

        let response = tokio::time::timeout(REQUEST_TIMEOUT, rx)
            .await
            .map_err(|_| {
                lock(&self.pending).remove(&id);
                LspError::Timeout(method.to_string())
            })?
            .map_err(|_| LspError::Protocol("Channel closed".into()))?;

        parse_response(response)
    }

    /// Sends a notification (no response expected).
    pub fn notify(&mut self, method: &str, params: Value) -> Result<()> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });

        let stdin = self.stdin.as_mut().ok_or(LspError::NotStarted)?;
        write_frame(stdin, &notification)
    }

    pub async fn initialize(&mut self) -> Result<InitializeResult> {
        let root_uri = file_uri(&self.workspace)?;

        let result: InitializeResult = self.request("initialize", json!({
            "rootUri": root_uri,
            "capabilities": {
                "textDocument": {
                    "documentSymbol": {
                        "hierarchicalDocumentSymbolSupport": true
                    },
                    "callHierarchy": {
                        "dynamicRegistration": false
                    }
                }
            }
        })).await?;

        self.notify("initialized", json!({}))?;

        Ok(result)
    }

    pub fn open_file(&mut self, path: &str, content: &str, language_id: &str) -> Result<()> {
        let uri = file_uri(path)?;

        self.notify("textDocument/didOpen", json!({
            "textDocument": {
                "uri": uri,
                "languageId": language_id,
                "version": 1,
                "text": content
            }
        }))
    }

    /// Document symbols of a file. Flat responses are lifted into childless
    /// hierarchical symbols.
    pub async fn document_symbols(&mut self, path: &str) -> Result<Vec<DocumentSymbol>> {
        let uri = file_uri(path)?;

        let result: Option<DocumentSymbolResponse> = self.request("textDocument/documentSymbol", json!({
            "textDocument": { "uri": uri }
        })).await?;

        Ok(match result {
            Some(DocumentSymbolResponse::Nested(symbols)) => symbols,
            Some(DocumentSymbolResponse::Flat(symbols)) => symbols.into_iter().map(lift_flat).collect(),
            None => Vec::new(),
        })
    }

    pub async fn prepare_call_hierarchy(&mut self, path: &str, line: u32, column: u32) -> Result<Vec<CallHierarchyItem>> {
        let uri = file_uri(path)?;

        let items: Option<Vec<CallHierarchyItem>> = self.request("textDocument/prepareCallHierarchy", json!({
            "textDocument": { "uri": uri },
            "position": { "line": line, "character": column }
        })).await?;

        Ok(items.unwrap_or_default())
    }

    pub async fn incoming_calls(&mut self, item: &CallHierarchyItem) -> Result<Vec<CallHierarchyIncomingCall>> {
        let calls: Option<Vec<CallHierarchyIncomingCall>> = self.request("callHierarchy/incomingCalls", json!({
            "item": item
        })).await?;

        Ok(calls.unwrap_or_default())
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.stdin = None;
        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
        Ok(())
    }
}

impl Drop for LspClient {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn file_uri(path: &str) -> Result<String> {
    Url::from_file_path(path)
        .map(|u| u.to_string())
        .map_err(|_| LspError::Protocol(format!("Invalid path: {}", path)))
}

#[allow(deprecated)]
fn lift_flat(info: SymbolInformation) -> DocumentSymbol {
    DocumentSymbol {
        name: info.name,
        detail: None,
        kind: info.kind,
        tags: info.tags,
        deprecated: info.deprecated,
        range: info.location.range,
        selection_range: info.location.range,
        children: None,
    }
}

/// Writes one `Content-Length` framed message.
pub(crate) fn write_frame<W: Write>(writer: &mut W, msg: &Value) -> Result<()> {
    let body = serde_json::to_string(msg)?;
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(body.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Reads one `Content-Length` framed message body. `None` on clean EOF.
pub(crate) fn read_frame<R: BufRead>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    loop {
        let mut content_length: Option<usize> = None;
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let header = line.trim();
            if header.is_empty() {
                break;
            }
            if let Some(value) = header.strip_prefix("Content-Length:") {
                content_length = value.trim().parse().ok();
            }
        }

        // a blank line without a length header carries no body
        let Some(len) = content_length.filter(|&n| n > 0) else {
            continue;
        };

        let mut body = vec![0u8; len];
        reader.read_exact(&mut body)?;
        return Ok(Some(body));
    }
}

fn parse_response<R: for<'de> Deserialize<'de>>(response: Value) -> Result<R> {
    if let Some(error) = response.get("error") {
        return Err(LspError::Protocol(error.to_string()));
    }
    match response.get("result") {
        Some(result) => Ok(serde_json::from_value(result.clone())?),
        None => Err(LspError::Protocol("No result".into())),
    }
}
