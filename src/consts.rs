//! Project-wide constants.

use std::path::PathBuf;
use std::time::Duration;

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
pub const REPO: &str = env!("CARGO_PKG_REPOSITORY");

/// Template rendered by mock targets. Supports `{prompt}` and `{target}`.
pub const DEFAULT_MOCK_TEMPLATE: &str = "Echo: {prompt}";

/// Request label used when the caller supplies none.
pub const DEFAULT_REQUEST_LABEL: &str = "custom_prompt";

/// Environment variable that switches every target to its mock stand-in.
pub const MOCK_ENV_VAR: &str = "PROMPTCAST_MOCK";

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV_VAR: &str = "PROMPTCAST_LOG";

/// Default config path: `~/.promptcast/config.yaml`, or `promptcast.yaml`
/// in the working directory when there is no home directory.
pub fn default_config_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".promptcast").join("config.yaml"),
        None => PathBuf::from("promptcast.yaml"),
    }
}

/// Format a duration for humans: `850ms`, `1.25s`.
pub fn format_duration(d: Duration) -> String {
    let ms = (d.as_secs_f64() * 1000.0).round();
    if ms < 1000.0 {
        format!("{ms:.0}ms")
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}
