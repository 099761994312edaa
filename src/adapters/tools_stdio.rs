//! Tool server implementing JSON-RPC 2.0 over stdin/stdout.
//!
//! Exposes the agent's task operations as callable tools for LLM-driven
//! clients. Tasks started through a tool run on an in-process scheduler
//! owned by the server.
//!
//! Protocol: newline-delimited JSON-RPC 2.0 on stdin/stdout.
//! Logging goes to stderr (stdout is reserved for protocol messages).

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::domain::models::task::TaskMessage;
use crate::services::registry::HandlerRegistry;
use crate::services::scheduler::TaskScheduler;

enum ToolError {
    /// Malformed or missing arguments: JSON-RPC -32602.
    InvalidParams(String),
    /// No such tool: JSON-RPC -32601.
    UnknownTool(String),
    /// Tool ran but failed: tool result with `isError`.
    Failed(String),
}

/// Stdio tool server backed by an in-process scheduler.
pub struct ToolServer {
    scheduler: Arc<TaskScheduler>,
    registry: Arc<HandlerRegistry>,
}

impl ToolServer {
    pub fn new(scheduler: Arc<TaskScheduler>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            scheduler,
            registry,
        }
    }

    /// Run the stdio loop, reading JSON-RPC from stdin and writing
    /// responses to stdout until stdin closes.
    pub async fn run(&self) -> anyhow::Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        eprintln!("[taskmesh-tools] stdio server started");

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }

            let response = self.handle_message(&line);
            if response.is_empty() {
                continue;
            }
            let mut response_bytes = response.into_bytes();
            response_bytes.push(b'\n');
            stdout.write_all(&response_bytes).await?;
            stdout.flush().await?;
        }

        eprintln!("[taskmesh-tools] stdio server stopped");
        Ok(())
    }

    fn handle_message(&self, line: &str) -> String {
        let request: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                return error_response(
                    serde_json::Value::Null,
                    -32700,
                    &format!("Parse error: {e}"),
                );
            }
        };

        let id = request.get("id").cloned().unwrap_or(serde_json::Value::Null);
        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let params = request
            .get("params")
            .cloned()
            .unwrap_or(serde_json::json!({}));

        match method {
            "initialize" => handle_initialize(id),
            "tools/list" => handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, &params),
            // Client notification; notifications carry no id and get no
            // response.
            "notifications/initialized" => String::new(),
            _ => error_response(id, -32601, &format!("Method not found: {method}")),
        }
    }

    fn handle_tools_call(&self, id: serde_json::Value, params: &serde_json::Value) -> String {
        let tool_name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::json!({}));

        let result = match tool_name {
            "list_tasks" => self.tool_list_tasks(),
            "get_task_status" => self.tool_get_task_status(&arguments),
            "start_drift_scan" => self.tool_start_task("drift-scan", &arguments),
            "start_docs_update" => self.tool_start_task("docs-update", &arguments),
            _ => Err(ToolError::UnknownTool(tool_name.to_string())),
        };

        match result {
            Ok(content) => success_response(
                id,
                serde_json::json!({
                    "content": [{
                        "type": "text",
                        "text": content
                    }]
                }),
            ),
            Err(ToolError::InvalidParams(message)) => {
                error_response(id, -32602, &format!("Invalid params: {message}"))
            }
            Err(ToolError::UnknownTool(name)) => {
                error_response(id, -32601, &format!("Unknown tool: {name}"))
            }
            Err(ToolError::Failed(message)) => success_response(
                id,
                serde_json::json!({
                    "content": [{
                        "type": "text",
                        "text": message
                    }],
                    "isError": true
                }),
            ),
        }
    }

    fn tool_list_tasks(&self) -> Result<String, ToolError> {
        let snapshots = self.scheduler.snapshots();
        serde_json::to_string_pretty(&snapshots).map_err(|e| ToolError::Failed(e.to_string()))
    }

    fn tool_get_task_status(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        let task_id = args
            .get("task_id")
            .and_then(|i| i.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolError::InvalidParams("missing required field: task_id".into()))?;

        match self.scheduler.snapshot(task_id) {
            Some(snapshot) => serde_json::to_string_pretty(&snapshot)
                .map_err(|e| ToolError::Failed(e.to_string())),
            // An unknown id is an answer, not a protocol error.
            None => Ok(format!("Task {task_id} not found")),
        }
    }

    /// Register a task of `kind` under the caller-supplied id. Duplicate
    /// ids are idempotent: the task is not started twice.
    fn tool_start_task(
        &self,
        kind: &str,
        args: &serde_json::Value,
    ) -> Result<String, ToolError> {
        let task_id = args
            .get("id")
            .and_then(|i| i.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolError::InvalidParams("missing required field: id".into()))?;

        let mut message = TaskMessage::new(kind, None);
        message.id = task_id.to_string();

        if self.scheduler.ingest(&self.registry, message) {
            Ok(format!("Started {kind} task {task_id}"))
        } else {
            Ok(format!("Task {task_id} is already tracked"))
        }
    }
}

fn handle_initialize(id: serde_json::Value) -> String {
    let result = serde_json::json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {
            "tools": {}
        },
        "serverInfo": {
            "name": "taskmesh",
            "version": env!("CARGO_PKG_VERSION")
        }
    });
    success_response(id, result)
}

fn handle_tools_list(id: serde_json::Value) -> String {
    let tools = serde_json::json!({
        "tools": [
            {
                "name": "list_tasks",
                "description": "List every task tracked by this agent with its status, progress percentage, and error (if failed). Use this to monitor background work you have started.",
                "inputSchema": {
                    "type": "object",
                    "properties": {}
                }
            },
            {
                "name": "get_task_status",
                "description": "Get the status, progress, and error details of one task by id. Ids are returned by start_drift_scan, start_docs_update, and list_tasks.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "task_id": { "type": "string", "description": "Task id (e.g. 'drift-scan-1714070000000')" }
                    },
                    "required": ["task_id"]
                }
            },
            {
                "name": "start_drift_scan",
                "description": "Start a background scan comparing the project's implementation against its specs. Returns immediately; poll get_task_status with the same id for progress. Starting an id that is already tracked is a no-op.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Caller-chosen task id (e.g. 'drift-scan-1714070000000')" }
                    },
                    "required": ["id"]
                }
            },
            {
                "name": "start_docs_update",
                "description": "Start a background regeneration of project documentation from the archived specs. Returns immediately; poll get_task_status with the same id for progress. Starting an id that is already tracked is a no-op.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Caller-chosen task id (e.g. 'docs-update-1714070000000')" }
                    },
                    "required": ["id"]
                }
            }
        ]
    });
    success_response(id, tools)
}

fn success_response(id: serde_json::Value, result: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
    .to_string()
}

fn error_response(id: serde_json::Value, code: i32, message: &str) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::Config;

    fn server() -> ToolServer {
        let scheduler = TaskScheduler::new(1, None, None);
        let registry = Arc::new(HandlerRegistry::with_builtin_handlers(&Config::default()));
        ToolServer::new(scheduler, registry)
    }

    fn parse(response: &str) -> serde_json::Value {
        serde_json::from_str(response).unwrap()
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let response = parse(&server().handle_message(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        ));
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["serverInfo"]["name"], "taskmesh");
    }

    #[tokio::test]
    async fn tools_list_names_all_four_tools() {
        let response =
            parse(&server().handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#));
        let names: Vec<&str> = response["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            ["list_tasks", "get_task_status", "start_drift_scan", "start_docs_update"]
        );
    }

    #[tokio::test]
    async fn unknown_method_is_a_method_not_found_error() {
        let response =
            parse(&server().handle_message(r#"{"jsonrpc":"2.0","id":3,"method":"bogus/thing"}"#));
        assert_eq!(response["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_method_not_found_error() {
        let response = parse(&server().handle_message(
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"frobnicate"}}"#,
        ));
        assert_eq!(response["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn get_task_status_without_id_is_invalid_params() {
        let response = parse(&server().handle_message(
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"get_task_status","arguments":{}}}"#,
        ));
        assert_eq!(response["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn get_task_status_for_unknown_id_is_a_plain_answer() {
        let response = parse(&server().handle_message(
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"get_task_status","arguments":{"task_id":"ghost-1"}}}"#,
        ));
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("not found"));
        assert!(response["result"].get("isError").is_none());
    }

    #[tokio::test]
    async fn start_drift_scan_requires_an_id() {
        let response = parse(&server().handle_message(
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"start_drift_scan","arguments":{}}}"#,
        ));
        assert_eq!(response["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn start_drift_scan_tracks_the_task_once() {
        let srv = server();
        let request = r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"name":"start_drift_scan","arguments":{"id":"drift-scan-7"}}}"#;

        let first = parse(&srv.handle_message(request));
        let text = first["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("Started"));
        assert!(srv.scheduler.is_tracked("drift-scan-7"));

        let second = parse(&srv.handle_message(request));
        let text = second["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("already tracked"));
        assert_eq!(srv.scheduler.snapshots().len(), 1);
    }

    #[tokio::test]
    async fn notification_gets_no_response() {
        let response =
            server().handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);
        assert!(response.is_empty());
    }
}
