use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Terminal state of one target invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Succeeded,
    /// Success from a simulate-only target. No external side effect happened.
    Mock,
    Error,
}

impl ExecutionStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded | Self::Mock)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Succeeded => "succeeded",
            Self::Mock => "mock",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Outcome of running one prompt against one target.
///
/// Either `content` or `error` is set, never both, and the status agrees:
/// the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    request_label: String,
    target_name: String,
    status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(
        rename = "elapsed_ms",
        serialize_with = "serialize_millis",
        skip_serializing_if = "Option::is_none"
    )]
    elapsed: Option<Duration>,
}

impl ExecutionResult {
    pub fn succeeded(label: &str, target: &str, content: String, elapsed: Option<Duration>) -> Self {
        Self::success(ExecutionStatus::Succeeded, label, target, content, elapsed)
    }

    pub fn mock(label: &str, target: &str, content: String, elapsed: Option<Duration>) -> Self {
        Self::success(ExecutionStatus::Mock, label, target, content, elapsed)
    }

    pub fn failed(
        label: &str,
        target: &str,
        error: impl Into<String>,
        elapsed: Option<Duration>,
    ) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unknown error".to_string();
        }
        Self {
            request_label: label.to_string(),
            target_name: target.to_string(),
            status: ExecutionStatus::Error,
            content: None,
            error: Some(error),
            elapsed,
        }
    }

    // Empty content is not a success.
    fn success(
        status: ExecutionStatus,
        label: &str,
        target: &str,
        content: String,
        elapsed: Option<Duration>,
    ) -> Self {
        if content.trim().is_empty() {
            return Self::failed(label, target, "empty response", elapsed);
        }
        Self {
            request_label: label.to_string(),
            target_name: target.to_string(),
            status,
            content: Some(content),
            error: None,
            elapsed,
        }
    }

    pub fn request_label(&self) -> &str {
        &self.request_label
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success() && self.content.is_some()
    }
}

/// Durations go over the wire as fractional milliseconds.
pub(crate) fn serialize_ms<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

fn serialize_millis<S: Serializer>(elapsed: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match elapsed {
        Some(d) => serialize_ms(d, s),
        None => s.serialize_none(),
    }
}
