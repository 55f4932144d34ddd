//! Target configuration loaded from YAML.
//!
//! One file names every backend the executor may fan out to, plus the
//! mock-mode switch. See [`Config::from_yaml`] for the format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::consts::DEFAULT_MOCK_TEMPLATE;
use crate::engine::ExecutorOptions;
use crate::target::TargetRegistry;
use crate::target::http::{DEFAULT_HTTP_TIMEOUT, HttpSettings, HttpTarget};
use crate::target::mock::MockTarget;
use crate::target::process::{DEFAULT_PROCESS_TIMEOUT, ProcessSettings, ProcessTarget};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("target name must not be empty")]
    EmptyName,

    #[error("target '{target}': {field} must not be empty")]
    EmptyField { target: String, field: &'static str },

    #[error("target '{0}': timeout_secs must be greater than zero")]
    ZeroTimeout(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mock_mode: bool,

    #[serde(default = "default_mock_template")]
    pub mock_template: String,

    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

/// One backend entry, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetConfig {
    Process(ProcessConfig),
    Http(HttpConfig),
    Mock(MockConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub tool: String,
    #[serde(default = "default_prompt_arg")]
    pub prompt_arg: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: Option<String>,
    pub instruction: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockConfig {
    pub template: Option<String>,
    #[serde(default)]
    pub delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mock_mode: false,
            mock_template: default_mock_template(),
            targets: BTreeMap::new(),
        }
    }
}

fn default_mock_template() -> String {
    DEFAULT_MOCK_TEMPLATE.to_string()
}

fn default_prompt_arg() -> String {
    "prompt".to_string()
}

impl Config {
    /// Read and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        debug!(path = %path.display(), "config file read");
        Self::from_yaml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse and validate YAML such as:
    ///
    /// ```yaml
    /// mock_mode: false
    /// targets:
    ///   blackbox: { type: http, base_url: "https://api.blackbox.ai/v1", model: blackboxai-pro, api_key_env: BLACKBOX_API_KEY }
    ///   twitter:  { type: process, command: uv, args: [run, server.py], tool: post_tweet }
    ///   echo:     { type: mock, delay_ms: 10 }
    /// ```
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text).context("failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (name, target) in &self.targets {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
            let empty = |field: &'static str| ConfigError::EmptyField {
                target: name.clone(),
                field,
            };
            let timeout = match target {
                TargetConfig::Process(p) => {
                    if p.command.trim().is_empty() {
                        return Err(empty("command"));
                    }
                    if p.tool.trim().is_empty() {
                        return Err(empty("tool"));
                    }
                    if p.prompt_arg.trim().is_empty() {
                        return Err(empty("prompt_arg"));
                    }
                    p.timeout_secs
                }
                TargetConfig::Http(h) => {
                    if h.base_url.trim().is_empty() {
                        return Err(empty("base_url"));
                    }
                    if h.model.trim().is_empty() {
                        return Err(empty("model"));
                    }
                    h.timeout_secs
                }
                TargetConfig::Mock(_) => None,
            };
            if timeout == Some(0) {
                return Err(ConfigError::ZeroTimeout(name.clone()));
            }
        }
        Ok(())
    }

    /// Resolve the mock switch: CLI flag, then environment, then file.
    pub fn resolve_mock_mode(&mut self, flag: bool, env_value: Option<&str>) {
        if flag {
            self.mock_mode = true;
        } else if let Some(value) = env_value {
            self.mock_mode = parse_bool(value);
        }
    }

    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            mock_mode: self.mock_mode,
            mock_template: self.mock_template.clone(),
        }
    }

    /// Build one adapter per configured target.
    pub fn build_registry(&self) -> Result<TargetRegistry> {
        let mut registry = TargetRegistry::new();
        for (name, target) in &self.targets {
            match target {
                TargetConfig::Process(p) => {
                    registry.register(Arc::new(ProcessTarget::new(
                        name,
                        ProcessSettings {
                            command: p.command.clone(),
                            args: p.args.clone(),
                            env: p.env.clone(),
                            cwd: p.cwd.clone(),
                            tool: p.tool.clone(),
                            prompt_arg: p.prompt_arg.clone(),
                            timeout: p
                                .timeout_secs
                                .map_or(DEFAULT_PROCESS_TIMEOUT, Duration::from_secs),
                        },
                    )));
                }
                TargetConfig::Http(h) => {
                    let target = HttpTarget::new(
                        name,
                        HttpSettings {
                            base_url: h.base_url.clone(),
                            model: h.model.clone(),
                            api_key_env: h.api_key_env.clone(),
                            instruction: h.instruction.clone(),
                            timeout: h.timeout_secs.map_or(DEFAULT_HTTP_TIMEOUT, Duration::from_secs),
                        },
                    )
                    .with_context(|| format!("failed to build HTTP client for target '{name}'"))?;
                    registry.register(Arc::new(target));
                }
                TargetConfig::Mock(m) => {
                    let mut target = MockTarget::new(name)
                        .with_template(m.template.as_deref().unwrap_or(&self.mock_template));
                    if m.delay_ms > 0 {
                        target = target.with_delay(Duration::from_millis(m.delay_ms));
                    }
                    registry.register(Arc::new(target));
                }
            }
        }
        Ok(registry)
    }
}

/// `1`, `true`, `yes`, `on` (any case) are true; everything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
mock_template: "[{target}] {prompt}"
targets:
  blackbox:
    type: http
    base_url: https://api.blackbox.ai/v1
    model: blackboxai-pro
    api_key_env: BLACKBOX_API_KEY
    timeout_secs: 20
  twitter:
    type: process
    command: uv
    args: [run, python, server.py]
    env:
      LOG_LEVEL: INFO
    tool: post_tweet
  echo:
    type: mock
    delay_ms: 10
"#;

    #[test]
    fn parses_all_target_kinds() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert!(!config.mock_mode);
        assert_eq!(config.mock_template, "[{target}] {prompt}");
        assert_eq!(config.targets.len(), 3);

        match &config.targets["twitter"] {
            TargetConfig::Process(p) => {
                assert_eq!(p.command, "uv");
                assert_eq!(p.args, vec!["run", "python", "server.py"]);
                assert_eq!(p.env["LOG_LEVEL"], "INFO");
                assert_eq!(p.prompt_arg, "prompt");
                assert!(p.timeout_secs.is_none());
            }
            other => panic!("expected process, got {other:?}"),
        }
        match &config.targets["blackbox"] {
            TargetConfig::Http(h) => assert_eq!(h.timeout_secs, Some(20)),
            other => panic!("expected http, got {other:?}"),
        }
    }

    #[test]
    fn empty_document_has_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert!(config.targets.is_empty());
        assert_eq!(config.mock_template, DEFAULT_MOCK_TEMPLATE);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let yaml = "targets:\n  x:\n    type: carrier_pigeon\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn empty_command_is_rejected() {
        let yaml = "targets:\n  x:\n    type: process\n    command: ''\n    tool: t\n";
        let err = Config::from_yaml(yaml).unwrap_err();
        let config_err = err.downcast_ref::<ConfigError>().unwrap();
        assert_eq!(
            *config_err,
            ConfigError::EmptyField {
                target: "x".to_string(),
                field: "command"
            }
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let yaml = "targets:\n  x:\n    type: http\n    base_url: http://localhost\n    model: m\n    timeout_secs: 0\n";
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn builds_registry_with_kinds() {
        let registry = Config::from_yaml(SAMPLE).unwrap().build_registry().unwrap();
        assert_eq!(
            registry.describe(),
            vec![
                ("blackbox".to_string(), "http".to_string()),
                ("echo".to_string(), "mock".to_string()),
                ("twitter".to_string(), "process".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn mock_entry_uses_file_template() {
        let registry = Config::from_yaml(SAMPLE).unwrap().build_registry().unwrap();
        let echo = registry.get("echo").unwrap();
        assert_eq!(echo.invoke("hi").await.unwrap(), "[echo] hi");
    }

    #[test]
    fn mock_mode_precedence() {
        let mut config = Config::default();
        config.resolve_mock_mode(false, None);
        assert!(!config.mock_mode);

        config.resolve_mock_mode(false, Some("no"));
        assert!(!config.mock_mode);

        config.resolve_mock_mode(false, Some("TRUE"));
        assert!(config.mock_mode);

        let mut config = Config::default();
        config.resolve_mock_mode(true, Some("0"));
        assert!(config.mock_mode);
    }

    #[test]
    fn file_mock_mode_survives_unset_env() {
        let mut config = Config::from_yaml("mock_mode: true").unwrap();
        config.resolve_mock_mode(false, None);
        assert!(config.executor_options().mock_mode);
    }

    #[test]
    fn env_overrides_file_mock_mode() {
        let mut config = Config::from_yaml("mock_mode: true").unwrap();
        config.resolve_mock_mode(false, Some("off"));
        assert!(!config.mock_mode);
    }

    #[test]
    fn parse_bool_values() {
        for v in ["1", "true", "Yes", " on "] {
            assert!(parse_bool(v), "{v}");
        }
        for v in ["0", "false", "", "maybe"] {
            assert!(!parse_bool(v), "{v}");
        }
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.targets.len(), 3);
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = Config::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }
}
