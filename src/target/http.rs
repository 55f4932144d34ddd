use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{BackendTarget, InvocationError, truncate_output};

/// Default request timeout for chat-completion calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// How much of an error body to keep in messages.
const BODY_PREVIEW_BYTES: usize = 512;

/// Settings for one OpenAI-compatible chat-completions backend.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// API root, e.g. `https://api.blackbox.ai/v1`. `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the bearer token. Read on every call.
    pub api_key_env: Option<String>,
    /// Optional system message sent ahead of the prompt.
    pub instruction: Option<String>,
    pub timeout: Duration,
}

/// A model backend reached over HTTP.
pub struct HttpTarget {
    name: String,
    settings: HttpSettings,
    client: reqwest::Client,
}

impl HttpTarget {
    pub fn new(name: &str, settings: HttpSettings) -> Result<Self, InvocationError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            name: name.to_string(),
            settings,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn build_messages<'a>(&'a self, prompt: &'a str) -> Vec<Message<'a>> {
        let mut messages = Vec::with_capacity(2);
        if let Some(instruction) = &self.settings.instruction {
            messages.push(Message {
                role: "system",
                content: instruction,
            });
        }
        messages.push(Message {
            role: "user",
            content: prompt,
        });
        messages
    }

    fn api_key(&self) -> Result<Option<String>, InvocationError> {
        let Some(var) = &self.settings.api_key_env else {
            return Ok(None);
        };
        match std::env::var(var) {
            Ok(key) if !key.is_empty() => Ok(Some(key)),
            _ => Err(InvocationError::MissingCredential(var.clone())),
        }
    }

    fn parse_response(body: &str) -> Result<String, InvocationError> {
        let resp: ApiResponse = serde_json::from_str(body).map_err(|e| {
            InvocationError::Malformed(format!(
                "{e}: {}",
                truncate_output(body, BODY_PREVIEW_BYTES)
            ))
        })?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(InvocationError::Malformed(
                "response contained no message content".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl BackendTarget for HttpTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "http"
    }

    async fn invoke(&self, prompt: &str) -> Result<String, InvocationError> {
        let body = ApiRequest {
            model: &self.settings.model,
            messages: self.build_messages(prompt),
        };

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = self.api_key()? {
            req = req.bearer_auth(key);
        }

        debug!(target_name = %self.name, model = %self.settings.model, "sending chat completion");
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(InvocationError::Status {
                status: status.as_u16(),
                body: truncate_output(&text, BODY_PREVIEW_BYTES),
            });
        }

        Self::parse_response(&text)
    }
}

// --- API types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> HttpSettings {
        HttpSettings {
            base_url: "https://api.example.com/v1/".to_string(),
            model: "test-model".to_string(),
            api_key_env: None,
            instruction: None,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let target = HttpTarget::new("llm", settings()).unwrap();
        assert_eq!(
            target.endpoint(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn messages_without_instruction() {
        let target = HttpTarget::new("llm", settings()).unwrap();
        let messages = target.build_messages("hi");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "hi");
    }

    #[test]
    fn messages_with_instruction() {
        let target = HttpTarget::new(
            "llm",
            HttpSettings {
                instruction: Some("be brief".to_string()),
                ..settings()
            },
        )
        .unwrap();
        let messages = target.build_messages("hi");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "be brief");
    }

    #[test]
    fn parse_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}},{"message":{"content":"second"}}]}"#;
        assert_eq!(HttpTarget::parse_response(body).unwrap(), "hello");
    }

    #[test]
    fn parse_no_choices_is_malformed() {
        let err = HttpTarget::parse_response(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, InvocationError::Malformed(_)));
    }

    #[test]
    fn parse_null_content_is_malformed() {
        let err =
            HttpTarget::parse_response(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap_err();
        assert!(matches!(err, InvocationError::Malformed(_)));
    }

    #[test]
    fn parse_garbage_is_malformed() {
        let err = HttpTarget::parse_response("<html>oops</html>").unwrap_err();
        assert!(err.to_string().contains("malformed response"));
    }

    #[test]
    fn missing_api_key_env_is_an_error() {
        let target = HttpTarget::new(
            "llm",
            HttpSettings {
                api_key_env: Some("PROMPTCAST_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
                ..settings()
            },
        )
        .unwrap();
        let err = target.api_key().unwrap_err();
        assert!(matches!(err, InvocationError::MissingCredential(_)));
    }
}
