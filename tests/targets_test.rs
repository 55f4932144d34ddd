use std::collections::BTreeMap;
use std::time::Duration;

use promptcast::target::http::{HttpSettings, HttpTarget};
use promptcast::target::process::{ProcessSettings, ProcessTarget};
use promptcast::target::{BackendTarget, InvocationError};

fn http_settings(base_url: &str) -> HttpSettings {
    HttpSettings {
        base_url: base_url.to_string(),
        model: "test-model".to_string(),
        api_key_env: None,
        instruction: None,
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn http_target_returns_first_choice() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "model": "test-model",
            "messages": [{ "role": "user", "content": "hello" }]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"hi there"}}]}"#)
        .create_async()
        .await;

    let target = HttpTarget::new("remote", http_settings(&format!("{}/v1/", server.url()))).unwrap();
    let answer = target.invoke("hello").await.unwrap();

    assert_eq!(answer, "hi there");
    mock.assert_async().await;
}

#[tokio::test]
async fn http_target_sends_bearer_from_env() {
    // PATH is always set, so it stands in for an API key variable.
    let key = std::env::var("PATH").unwrap();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", format!("Bearer {key}").as_str())
        .with_status(200)
        .with_body(r#"{"choices":[{"message":{"content":"ok"}}]}"#)
        .create_async()
        .await;

    let settings = HttpSettings {
        api_key_env: Some("PATH".to_string()),
        instruction: Some("be brief".to_string()),
        ..http_settings(&server.url())
    };
    let target = HttpTarget::new("remote", settings).unwrap();

    assert_eq!(target.invoke("hello").await.unwrap(), "ok");
    mock.assert_async().await;
}

#[tokio::test]
async fn http_target_reports_status_errors() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body("overloaded")
        .create_async()
        .await;

    let target = HttpTarget::new("remote", http_settings(&server.url())).unwrap();
    let err = target.invoke("hello").await.unwrap_err();

    match err {
        InvocationError::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn http_target_rejects_empty_content() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(r#"{"choices":[]}"#)
        .create_async()
        .await;

    let target = HttpTarget::new("remote", http_settings(&server.url())).unwrap();
    let err = target.invoke("hello").await.unwrap_err();
    assert!(matches!(err, InvocationError::Malformed(_)));
}

#[cfg(unix)]
mod process {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> ProcessTarget {
        ProcessTarget::new(
            "tool",
            ProcessSettings {
                command: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string()],
                env: BTreeMap::new(),
                cwd: None,
                tool: "post".to_string(),
                prompt_arg: "text".to_string(),
                timeout,
            },
        )
    }

    #[tokio::test]
    async fn reads_the_tool_result() {
        let target = sh(
            r#"read line; echo 'starting up'; echo '{"jsonrpc":"2.0","id":1,"result":{"content":[{"type":"text","text":"posted"}]}}'"#,
            Duration::from_secs(5),
        );
        assert_eq!(target.invoke("hello").await.unwrap(), "posted");
    }

    #[tokio::test]
    async fn request_carries_tool_and_prompt() {
        // Echo the request's params back as the result text.
        let target = sh(
            r#"read line; t=match; case "$line" in *'"name":"post"'*) ;; *) t=mismatch;; esac; case "$line" in *'"text":"hello"'*) ;; *) t=mismatch;; esac; echo "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"$t\"}]}}""#,
            Duration::from_secs(5),
        );
        assert_eq!(target.invoke("hello").await.unwrap(), "match");
    }

    #[tokio::test]
    async fn tool_error_is_a_failure() {
        let target = sh(
            r#"cat >/dev/null; echo '{"jsonrpc":"2.0","id":1,"result":{"isError":true,"content":[{"type":"text","text":"rate limited"}]}}'"#,
            Duration::from_secs(5),
        );
        let err = target.invoke("hello").await.unwrap_err();
        assert_eq!(err.to_string(), "rate limited");
    }

    #[tokio::test]
    async fn exit_without_response_includes_stderr() {
        let target = sh("cat >/dev/null; echo 'no credentials' >&2; exit 3", Duration::from_secs(5));
        let err = target.invoke("hello").await.unwrap_err().to_string();
        assert!(err.contains("exited with 3"), "{err}");
        assert!(err.contains("no credentials"), "{err}");
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let target = sh("sleep 5", Duration::from_millis(200));
        let err = target.invoke("hello").await.unwrap_err();
        assert!(matches!(err, InvocationError::Timeout(_)));
    }

    #[tokio::test]
    async fn environment_is_filtered() {
        let mut settings = ProcessSettings {
            command: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                r#"cat >/dev/null; echo "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"${EXTRA:-unset}/${CARGO_PKG_NAME:-unset}\"}]}}""#.to_string(),
            ],
            env: BTreeMap::new(),
            cwd: None,
            tool: "post".to_string(),
            prompt_arg: "text".to_string(),
            timeout: Duration::from_secs(5),
        };
        settings.env.insert("EXTRA".to_string(), "given".to_string());
        let target = ProcessTarget::new("tool", settings);

        assert_eq!(target.invoke("hello").await.unwrap(), "given/unset");
    }

    #[tokio::test]
    async fn missing_command_is_an_io_error() {
        let target = ProcessTarget::new(
            "tool",
            ProcessSettings {
                command: "/nonexistent/tool-server".to_string(),
                args: vec![],
                env: BTreeMap::new(),
                cwd: None,
                tool: "post".to_string(),
                prompt_arg: "text".to_string(),
                timeout: Duration::from_secs(5),
            },
        );
        assert!(matches!(
            target.invoke("hello").await.unwrap_err(),
            InvocationError::Io(_)
        ));
    }
}
