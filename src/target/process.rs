use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{BackendTarget, InvocationError, truncate_output};

/// Default time a tool server gets to answer one request.
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(30);

/// How much stderr to keep in error messages.
const STDERR_PREVIEW_BYTES: usize = 2_000;

/// JSON-RPC id used for the single request sent per spawn.
const REQUEST_ID: u64 = 1;

/// Environment variables inherited from the parent. Everything else is stripped.
const SAFE_ENV_VARS: &[&str] = &[
    "PATH", "HOME", "USER", "SHELL", "LANG", "LC_ALL", "TERM", "TZ",
];

/// Settings for a tool server spawned per invocation.
#[derive(Debug, Clone)]
pub struct ProcessSettings {
    pub command: String,
    pub args: Vec<String>,
    /// Extra environment on top of the safe inherited set.
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    /// Tool name sent in the `tools/call` request.
    pub tool: String,
    /// Argument key that carries the prompt.
    pub prompt_arg: String,
    pub timeout: Duration,
}

/// A backend reached by spawning a stdio tool server and sending it one
/// JSON-RPC `tools/call` request.
pub struct ProcessTarget {
    name: String,
    settings: ProcessSettings,
}

impl ProcessTarget {
    pub fn new(name: &str, settings: ProcessSettings) -> Self {
        Self {
            name: name.to_string(),
            settings,
        }
    }

    fn build_request(&self, prompt: &str) -> String {
        let mut arguments = serde_json::Map::new();
        arguments.insert(self.settings.prompt_arg.clone(), Value::from(prompt));
        let request = json!({
            "jsonrpc": "2.0",
            "id": REQUEST_ID,
            "method": "tools/call",
            "params": {
                "name": self.settings.tool,
                "arguments": arguments,
            }
        });
        format!("{request}\n")
    }

    fn filtered_env(&self) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = SAFE_ENV_VARS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|val| (key.to_string(), val)))
            .collect();
        env.extend(
            self.settings
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        env
    }

    /// Find the response to our request among the server's stdout lines.
    /// Log lines and notifications are skipped.
    fn parse_output(stdout: &str) -> Option<Result<String, InvocationError>> {
        stdout
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
            .find(|msg| msg.get("id").and_then(Value::as_u64) == Some(REQUEST_ID))
            .map(|msg| Self::decode_response(&msg))
    }

    fn decode_response(msg: &Value) -> Result<String, InvocationError> {
        if let Some(error) = msg.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("tool server returned an error");
            return Err(InvocationError::Failed(message.to_string()));
        }

        let result = msg
            .get("result")
            .ok_or_else(|| InvocationError::Malformed("response has no result".to_string()))?;

        let text = result
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|block| block.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            let message = if text.is_empty() {
                "tool reported an error".to_string()
            } else {
                text
            };
            return Err(InvocationError::Failed(message));
        }

        if text.trim().is_empty() {
            return Err(InvocationError::Malformed(
                "tool result contained no text".to_string(),
            ));
        }
        Ok(text)
    }

    async fn run(&self, prompt: &str) -> Result<String, InvocationError> {
        let mut command = Command::new(&self.settings.command);
        command
            .args(&self.settings.args)
            .env_clear()
            .envs(self.filtered_env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.settings.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            let request = self.build_request(prompt);
            // A server may answer and exit without draining stdin.
            match stdin.write_all(request.as_bytes()).await {
                Ok(()) => {
                    let _ = stdin.shutdown().await;
                }
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e.into()),
            }
        }

        let output = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if let Some(result) = Self::parse_output(&stdout) {
            return result;
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(InvocationError::Failed(format!(
            "tool server exited with {} without a response\nstderr: {}",
            output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string()),
            truncate_output(stderr.trim(), STDERR_PREVIEW_BYTES)
        )))
    }
}

#[async_trait]
impl BackendTarget for ProcessTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "process"
    }

    async fn invoke(&self, prompt: &str) -> Result<String, InvocationError> {
        debug!(
            target_name = %self.name,
            command = %self.settings.command,
            tool = %self.settings.tool,
            "spawning tool server"
        );
        // Dropping the timed-out future drops the child, which kills it.
        match tokio::time::timeout(self.settings.timeout, self.run(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(InvocationError::Timeout(self.settings.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ProcessTarget {
        ProcessTarget::new(
            "tool",
            ProcessSettings {
                command: "true".to_string(),
                args: vec![],
                env: BTreeMap::from([("LOG_LEVEL".to_string(), "INFO".to_string())]),
                cwd: None,
                tool: "generate".to_string(),
                prompt_arg: "prompt".to_string(),
                timeout: DEFAULT_PROCESS_TIMEOUT,
            },
        )
    }

    #[test]
    fn request_is_a_single_json_rpc_line() {
        let line = target().build_request("write a post");
        assert!(line.ends_with('\n'));
        let value: Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["method"], "tools/call");
        assert_eq!(value["id"], 1);
        assert_eq!(value["params"]["name"], "generate");
        assert_eq!(value["params"]["arguments"]["prompt"], "write a post");
    }

    #[test]
    fn env_includes_configured_vars() {
        let env = target().filtered_env();
        assert!(env.contains(&("LOG_LEVEL".to_string(), "INFO".to_string())));
    }

    #[test]
    fn parse_joins_text_blocks() {
        let stdout = r#"{"jsonrpc":"2.0","id":1,"result":{"content":[{"type":"text","text":"one"},{"type":"text","text":"two"}]}}"#;
        let text = ProcessTarget::parse_output(stdout).unwrap().unwrap();
        assert_eq!(text, "one\ntwo");
    }

    #[test]
    fn parse_skips_log_lines_and_notifications() {
        let stdout = "starting server...\n\
            {\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\"}\n\
            {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"ok\"}]}}\n";
        let text = ProcessTarget::parse_output(stdout).unwrap().unwrap();
        assert_eq!(text, "ok");
    }

    #[test]
    fn parse_without_response_is_none() {
        assert!(ProcessTarget::parse_output("just logs\n").is_none());
    }

    #[test]
    fn json_rpc_error_is_failure() {
        let stdout = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"unknown tool"}}"#;
        let err = ProcessTarget::parse_output(stdout).unwrap().unwrap_err();
        assert_eq!(err.to_string(), "unknown tool");
    }

    #[test]
    fn tool_error_flag_is_failure() {
        let stdout = r#"{"jsonrpc":"2.0","id":1,"result":{"isError":true,"content":[{"type":"text","text":"rate limited"}]}}"#;
        let err = ProcessTarget::parse_output(stdout).unwrap().unwrap_err();
        assert_eq!(err.to_string(), "rate limited");
    }

    #[test]
    fn empty_content_is_malformed() {
        let stdout = r#"{"jsonrpc":"2.0","id":1,"result":{"content":[]}}"#;
        let err = ProcessTarget::parse_output(stdout).unwrap().unwrap_err();
        assert!(matches!(err, InvocationError::Malformed(_)));
    }
}
