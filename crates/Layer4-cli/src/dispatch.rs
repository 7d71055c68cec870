//! Line-delimited JSON tool protocol
//!
//! One request per line on the input:
//!
//! ```text
//! {"tool":"ask","arguments":{"agentName":"reviewer","question":"...","async":true}}
//! {"tool":"await","arguments":{"token":"a3f2c1"}}
//! {"tool":"halt","arguments":{"token":"a3f2c1"}}
//! {"tool":"tasks"}
//! ```
//!
//! One response per line on the output: `{"ok":true,"result":...}` or
//! `{"ok":false,"error":"..."}`. Requests are handled one at a time.

use autorun_foundation::{Error, Result};
use autorun_task::{TaskManager, TaskToken, WaitMode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub tool: String,

    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// `ask` arguments. `async`: true = immediate, false = blocking,
/// absent = hybrid. An explicit `mode` wins over `async`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AskArguments {
    #[serde(alias = "role")]
    agent_name: String,

    question: String,

    #[serde(default, rename = "async")]
    is_async: Option<bool>,

    #[serde(default)]
    mode: Option<WaitMode>,
}

impl AskArguments {
    fn wait_mode(&self) -> WaitMode {
        if let Some(mode) = self.mode {
            return mode;
        }
        match self.is_async {
            Some(true) => WaitMode::Immediate,
            Some(false) => WaitMode::Blocking,
            None => WaitMode::Hybrid,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenArguments {
    token: TaskToken,
}

/// Run one request against the manager
pub async fn dispatch(manager: &TaskManager, request: Request) -> Result<Value> {
    debug!("Dispatching {}", request.tool);

    match request.tool.as_str() {
        "ask" => {
            let args: AskArguments = parse_arguments("ask", request.arguments)?;
            let response = manager
                .submit(&args.agent_name, &args.question, args.wait_mode())
                .await?;
            Ok(serde_json::to_value(response)?)
        }
        "await" => {
            let args: TokenArguments = parse_arguments("await", request.arguments)?;
            let response = manager.resume(&args.token).await?;
            Ok(serde_json::to_value(response)?)
        }
        "halt" => {
            let args: TokenArguments = parse_arguments("halt", request.arguments)?;
            let response = manager.cancel(&args.token)?;
            Ok(serde_json::to_value(response)?)
        }
        "tasks" => Ok(serde_json::to_value(manager.list())?),
        other => Err(Error::InvalidInput(format!("Unknown tool: {}", other))),
    }
}

fn parse_arguments<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| Error::InvalidInput(format!("{} arguments: {}", tool, e)))
}

/// Parse, dispatch and wrap a single input line
pub async fn handle_line(manager: &TaskManager, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return Response::failure(format!("Invalid request: {}", e)),
    };

    let tool = request.tool.clone();
    match dispatch(manager, request).await {
        Ok(result) => Response::success(result),
        Err(e) => {
            if e.is_user_facing() {
                debug!("{} rejected: {}", tool, e);
            } else {
                warn!("{} failed: {}", tool, e);
            }
            Response::failure(e.to_string())
        }
    }
}

/// Serve requests until the input closes
pub async fn serve<R, W>(manager: &TaskManager, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(manager, &line).await;
        let mut payload = serde_json::to_vec(&response)?;
        payload.push(b'\n');
        output.write_all(&payload).await?;
        output.flush().await?;
    }

    info!("Input closed, {} task(s) still registered", manager.list().len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use autorun_foundation::AutorunConfig;
    use serde_json::json;

    fn manager() -> TaskManager {
        TaskManager::new(AutorunConfig::default())
    }

    #[test]
    fn test_ask_wait_mode_mapping() {
        let parse = |v: Value| serde_json::from_value::<AskArguments>(v).unwrap().wait_mode();

        assert_eq!(
            parse(json!({"agentName": "a", "question": "q"})),
            WaitMode::Hybrid
        );
        assert_eq!(
            parse(json!({"agentName": "a", "question": "q", "async": true})),
            WaitMode::Immediate
        );
        assert_eq!(
            parse(json!({"agentName": "a", "question": "q", "async": false})),
            WaitMode::Blocking
        );
        assert_eq!(
            parse(json!({"role": "a", "question": "q", "async": true, "mode": "hybrid"})),
            WaitMode::Hybrid
        );
    }

    #[tokio::test]
    async fn test_invalid_json_line() {
        let response = handle_line(&manager(), "{not json").await;
        assert!(!response.ok);
        assert!(response.error.unwrap().starts_with("Invalid request"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let response = handle_line(&manager(), r#"{"tool":"explode"}"#).await;
        assert_eq!(
            response,
            Response::failure("Invalid input: Unknown tool: explode")
        );
    }

    #[tokio::test]
    async fn test_missing_arguments() {
        let response = handle_line(&manager(), r#"{"tool":"ask","arguments":{"question":"q"}}"#).await;
        assert!(!response.ok);
        assert!(response.error.unwrap().contains("ask arguments"));
    }

    #[tokio::test]
    async fn test_unknown_token() {
        for tool in ["await", "halt"] {
            let line = json!({"tool": tool, "arguments": {"token": "ffffff"}}).to_string();
            let response = handle_line(&manager(), &line).await;
            assert_eq!(response, Response::failure("Invalid token: ffffff"));
        }
    }

    #[tokio::test]
    async fn test_serve_writes_one_line_per_request() {
        let input: &[u8] = b"{\"tool\":\"tasks\"}\n\n{\"tool\":\"await\",\"arguments\":{\"token\":\"abcdef\"}}\n";
        let mut output = Vec::new();

        serve(&manager(), input, &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], json!({"ok": true, "result": []}));
        assert_eq!(lines[1]["ok"], false);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ask_then_halt_over_protocol() {
        let dir = tempfile::tempdir().unwrap();
        let config = AutorunConfig::default()
            .agents_dir(dir.path())
            .worker(autorun_foundation::WorkerConfig::new("sh").args(["-c", "sleep 30"]));
        let manager = TaskManager::new(config);

        let ask = json!({
            "tool": "ask",
            "arguments": {"agentName": "default", "question": "wait", "async": true}
        });
        let response = handle_line(&manager, &ask.to_string()).await;
        let result = response.result.unwrap();
        assert_eq!(result["status"], "running");
        let token = result["token"].as_str().unwrap().to_string();

        let halt = json!({"tool": "halt", "arguments": {"token": token}});
        let response = handle_line(&manager, &halt.to_string()).await;
        assert_eq!(
            response.result.unwrap(),
            json!({"token": token, "status": "cancelled", "message": "Task cancelled successfully"})
        );
    }
}
