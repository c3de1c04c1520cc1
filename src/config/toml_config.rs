use crate::utils::error::{ChatError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "multi-agent-chat.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub dapr: DaprConfig,
    pub ports: PortsConfig,
    pub orchestration: OrchestrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub app_id: String,
    pub output_dir: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            app_id: "multi-agent-chat".to_string(),
            output_dir: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaprConfig {
    pub pubsub_name: String,
    pub topic: String,
    pub route: String,
    pub state_store: String,
    pub history_key: String,
    pub api_token: Option<String>,
    pub sidecar_command: String,
    pub components_dir: String,
    pub redis_host: String,
    pub redis_command: String,
    pub tracing_sampling_rate: String,
    pub cors_allowed_origins: String,
}

impl Default for DaprConfig {
    fn default() -> Self {
        Self {
            pubsub_name: "chat-pubsub".to_string(),
            topic: "agent-messages".to_string(),
            route: "/agent-messages".to_string(),
            state_store: "chat-state".to_string(),
            history_key: "chat-history".to_string(),
            api_token: None,
            sidecar_command: "dapr".to_string(),
            components_dir: "./components".to_string(),
            redis_host: "localhost:6379".to_string(),
            redis_command: "redis-server".to_string(),
            tracing_sampling_rate: "1".to_string(),
            cors_allowed_origins: "*".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortsConfig {
    pub frontend: u16,
    pub dapr_http: u16,
    pub dapr_grpc: u16,
    pub app: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            frontend: 8501,
            dapr_http: 3500,
            dapr_grpc: 50001,
            app: 6001,
        }
    }
}

impl PortsConfig {
    pub fn as_pairs(&self) -> [(&'static str, u16); 4] {
        [
            ("ports.frontend", self.frontend),
            ("ports.dapr_http", self.dapr_http),
            ("ports.dapr_grpc", self.dapr_grpc),
            ("ports.app", self.app),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub max_turns: usize,
    pub approval_marker: String,
    pub history_limit: usize,
    pub startup_delay_secs: u64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            approval_marker: "%APPROVED%".to_string(),
            history_limit: 100,
            startup_delay_secs: 5,
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ChatError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        let mut config: Self =
            toml::from_str(&processed_content).map_err(|e| ChatError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;

        // 未設定的變數會原樣留下，不能當作 token 送出
        config.dapr.api_token = config
            .dapr
            .api_token
            .take()
            .filter(|token| !token.trim().is_empty() && !is_unresolved_placeholder(token));
        Ok(config)
    }

    /// 指定路徑優先；否則讀取工作目錄下的預設檔，不存在則全部使用預設值
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// 替換環境變數 (例如 ${DAPR_API_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ChatError::config(e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// dapr run 會為 app 設定 DAPR_HTTP_PORT / DAPR_GRPC_PORT
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("DAPR_HTTP_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
        {
            self.ports.dapr_http = port;
        }
        if let Some(port) = std::env::var("DAPR_GRPC_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
        {
            self.ports.dapr_grpc = port;
        }
        if self.dapr.api_token.is_none() {
            self.dapr.api_token = std::env::var("DAPR_API_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty());
        }
    }

    pub fn sidecar_url(&self) -> String {
        format!("http://localhost:{}", self.ports.dapr_http)
    }

    pub fn sampling_rate(&self) -> Result<f64> {
        self.dapr
            .tracing_sampling_rate
            .trim()
            .parse::<f64>()
            .map_err(|e| ChatError::InvalidConfigValueError {
                field: "dapr.tracing_sampling_rate".to_string(),
                value: self.dapr.tracing_sampling_rate.clone(),
                reason: e.to_string(),
            })
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("app.app_id", &self.app.app_id)?;
        validation::validate_path("app.output_dir", &self.app.output_dir)?;

        validation::validate_non_empty_string("dapr.pubsub_name", &self.dapr.pubsub_name)?;
        validation::validate_non_empty_string("dapr.topic", &self.dapr.topic)?;
        validation::validate_non_empty_string("dapr.state_store", &self.dapr.state_store)?;
        validation::validate_non_empty_string("dapr.history_key", &self.dapr.history_key)?;
        validation::validate_non_empty_string("dapr.redis_host", &self.dapr.redis_host)?;
        validation::validate_path("dapr.components_dir", &self.dapr.components_dir)?;

        if !self.dapr.route.starts_with('/') {
            return Err(ChatError::InvalidConfigValueError {
                field: "dapr.route".to_string(),
                value: self.dapr.route.clone(),
                reason: "Route must start with '/'".to_string(),
            });
        }

        validation::validate_range("dapr.tracing_sampling_rate", self.sampling_rate()?, 0.0, 1.0)?;
        validation::validate_distinct_ports(&self.ports.as_pairs())?;
        validation::validate_url("sidecar_url", &self.sidecar_url())?;

        validation::validate_positive_number(
            "orchestration.max_turns",
            self.orchestration.max_turns,
            1,
        )?;
        validation::validate_non_empty_string(
            "orchestration.approval_marker",
            &self.orchestration.approval_marker,
        )?;

        Ok(())
    }
}

fn is_unresolved_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("${") && value.ends_with('}')
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_launch_ports() {
        let config = AppConfig::default();

        assert_eq!(config.ports.frontend, 8501);
        assert_eq!(config.ports.dapr_http, 3500);
        assert_eq!(config.ports.dapr_grpc, 50001);
        assert_eq!(config.ports.app, 6001);
        assert_eq!(config.dapr.pubsub_name, "chat-pubsub");
        assert_eq!(config.dapr.state_store, "chat-state");
        assert_eq!(config.sidecar_url(), "http://localhost:3500");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml_config() {
        let toml_content = r#"
[app]
output_dir = "./generated"

[orchestration]
max_turns = 6

[ports]
frontend = 9000
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.app.app_id, "multi-agent-chat");
        assert_eq!(config.app.output_dir, "./generated");
        assert_eq!(config.orchestration.max_turns, 6);
        assert_eq!(config.orchestration.approval_marker, "%APPROVED%");
        assert_eq!(config.ports.frontend, 9000);
        assert_eq!(config.ports.app, 6001);
    }

    #[test]
    fn test_unset_api_token_variable_is_dropped() {
        std::env::remove_var("MAC_TEST_UNSET_DAPR_TOKEN");

        let toml_content = r#"
[dapr]
api_token = "${MAC_TEST_UNSET_DAPR_TOKEN}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert!(config.dapr.api_token.is_none());

        let config = AppConfig::from_toml_str("[dapr]\napi_token = \"  \"\n").unwrap();
        assert!(config.dapr.api_token.is_none());

        let config = AppConfig::from_toml_str("[dapr]\napi_token = \"s3cret\"\n").unwrap();
        assert_eq!(config.dapr.api_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MAC_TEST_STATE_STORE", "team-state");

        let toml_content = r#"
[dapr]
state_store = "${MAC_TEST_STATE_STORE}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.dapr.state_store, "team-state");

        std::env::remove_var("MAC_TEST_STATE_STORE");
    }

    #[test]
    fn test_duplicate_ports_rejected() {
        let toml_content = r#"
[ports]
frontend = 3500
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sampling_rate_must_be_probability() {
        let mut config = AppConfig::default();
        config.dapr.tracing_sampling_rate = "2".to_string();
        assert!(config.validate().is_err());

        config.dapr.tracing_sampling_rate = "abc".to_string();
        assert!(config.sampling_rate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[app]
app_id = "file-test"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.app.app_id, "file-test");
    }
}
