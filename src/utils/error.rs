use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML rendering error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Sidecar returned HTTP {status}: {message}")]
    SidecarError { status: u16, message: String },

    #[error("Language model error ({kind:?}): {message}")]
    ModelError { kind: ModelErrorKind, message: String },

    #[error("Malformed chat message: {message}")]
    MessageFormatError { message: String },

    #[error("Process '{name}' failed: {message}")]
    ProcessError { name: String, message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

/// Azure OpenAI 錯誤分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    Authentication,
    DeploymentNotFound,
    RateLimited,
    ServiceUnavailable,
    InvalidRequest,
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ChatError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn message_format(message: impl Into<String>) -> Self {
        Self::MessageFormatError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) | Self::SidecarError { .. } | Self::ModelError { .. } => {
                ErrorCategory::Network
            }
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::SerializationError(_)
            | Self::YamlError(_)
            | Self::CsvError(_)
            | Self::MessageFormatError { .. }
            | Self::ValidationError { .. } => ErrorCategory::Data,
            Self::IoError(_) | Self::ZipError(_) | Self::ProcessError { .. } => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ValidationError { .. } => ErrorSeverity::Low,
            Self::HttpError(_) | Self::SidecarError { .. } => ErrorSeverity::Medium,
            Self::ModelError { .. } if self.is_retryable() => ErrorSeverity::Medium,
            Self::ProcessError { .. } | Self::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// 命令失敗時的退出碼；輸入錯誤同樣視為失敗
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }

    /// 暫時性錯誤（sidecar 未就緒、限流、5xx）
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpError(e) => e.is_timeout() || e.is_connect(),
            Self::SidecarError { status, .. } => *status >= 500,
            Self::ModelError { kind, .. } => matches!(
                kind,
                ModelErrorKind::RateLimited | ModelErrorKind::ServiceUnavailable
            ),
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::HttpError(_) => {
                "Check that the Dapr sidecar is running (multi-agent-chat launch) and reachable"
            }
            Self::SidecarError { .. } => {
                "Verify the Dapr components (chat-pubsub, chat-state) and that Redis is up on localhost:6379"
            }
            Self::ModelError { kind, .. } => match kind {
                ModelErrorKind::Authentication => "Check AZURE_OPENAI_API_KEY",
                ModelErrorKind::DeploymentNotFound => {
                    "Check AZURE_OPENAI_CHAT_DEPLOYMENT_NAME and AZURE_OPENAI_ENDPOINT"
                }
                ModelErrorKind::RateLimited => "Wait a moment and submit the request again",
                _ => "Retry later or inspect the Azure OpenAI deployment",
            },
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => {
                "Review the .env file and the TOML configuration, then run check-config"
            }
            Self::MessageFormatError { .. } | Self::SerializationError(_) => {
                "Inspect the published payload; messages need agent_name, role, content, timestamp and message_id"
            }
            Self::ValidationError { .. } => "Adjust the input and try again",
            Self::ProcessError { .. } => {
                "Make sure redis-server and the dapr CLI are installed and on PATH"
            }
            Self::IoError(_) | Self::ZipError(_) | Self::YamlError(_) | Self::CsvError(_) => {
                "Check file permissions for the output directory"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Could not reach a backing service: {}", self),
            ErrorCategory::Data => format!("Invalid data: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
