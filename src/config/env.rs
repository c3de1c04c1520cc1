use crate::utils::error::{ChatError, Result};
use crate::utils::validation::{self, Validate};

pub const API_KEY_VAR: &str = "AZURE_OPENAI_API_KEY";
pub const ENDPOINT_VAR: &str = "AZURE_OPENAI_ENDPOINT";
pub const DEPLOYMENT_VAR: &str = "AZURE_OPENAI_CHAT_DEPLOYMENT_NAME";
pub const API_VERSION_VAR: &str = "AZURE_OPENAI_API_VERSION";
pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";

pub const REQUIRED_VARS: [&str; 3] = [API_KEY_VAR, ENDPOINT_VAR, DEPLOYMENT_VAR];
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// Azure OpenAI 連線設定（來自環境變數或 .env）
#[derive(Clone)]
pub struct AzureOpenAiSettings {
    pub api_key: String,
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub github_token: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl std::fmt::Debug for AzureOpenAiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAiSettings")
            .field("api_key", &"***")
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("github_token", &self.github_token.as_ref().map(|_| "***"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AzureOpenAiSettings {
    /// 載入 .env（若存在）後讀取環境變數
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing = missing_vars_with(&lookup);
        if !missing.is_empty() {
            return Err(ChatError::MissingConfigError {
                field: missing.join(", "),
            });
        }

        let get = |name: &str| lookup(name).unwrap_or_default().trim().to_string();

        let settings = Self {
            api_key: get(API_KEY_VAR),
            endpoint: get(ENDPOINT_VAR).trim_end_matches('/').to_string(),
            deployment: get(DEPLOYMENT_VAR),
            api_version: lookup(API_VERSION_VAR)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            github_token: lookup(GITHUB_TOKEN_VAR).filter(|v| !v.trim().is_empty()),
            temperature: 0.7,
            max_tokens: 4096,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

impl Validate for AzureOpenAiSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string(API_KEY_VAR, &self.api_key)?;
        validation::validate_url(ENDPOINT_VAR, &self.endpoint)?;
        validation::validate_non_empty_string(DEPLOYMENT_VAR, &self.deployment)?;
        validation::validate_range("temperature", self.temperature, 0.0, 2.0)?;
        Ok(())
    }
}

/// 列出未設定（或空白）的必要環境變數
pub fn missing_vars() -> Vec<&'static str> {
    let _ = dotenvy::dotenv();
    missing_vars_with(|name| std::env::var(name).ok())
}

fn missing_vars_with<F>(lookup: F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    REQUIRED_VARS
        .iter()
        .copied()
        .filter(|name| lookup(name).map(|v| v.trim().is_empty()).unwrap_or(true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_settings_from_complete_environment() {
        let lookup = lookup_from(&[
            (API_KEY_VAR, "secret"),
            (ENDPOINT_VAR, "https://team.openai.azure.com/"),
            (DEPLOYMENT_VAR, "gpt-4o"),
        ]);

        let settings = AzureOpenAiSettings::from_lookup(lookup).unwrap();
        assert_eq!(settings.endpoint, "https://team.openai.azure.com");
        assert_eq!(settings.api_version, DEFAULT_API_VERSION);
        assert!(settings.github_token.is_none());
        assert_eq!(
            settings.chat_completions_url(),
            "https://team.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );
        assert!(!format!("{:?}", settings).contains("secret"));
    }

    #[test]
    fn test_missing_and_blank_vars_reported() {
        let lookup = lookup_from(&[(API_KEY_VAR, "  "), (DEPLOYMENT_VAR, "gpt-4o")]);
        let missing = missing_vars_with(&lookup);
        assert_eq!(missing, vec![API_KEY_VAR, ENDPOINT_VAR]);

        let err = AzureOpenAiSettings::from_lookup(lookup).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(API_KEY_VAR));
        assert!(message.contains(ENDPOINT_VAR));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let lookup = lookup_from(&[
            (API_KEY_VAR, "secret"),
            (ENDPOINT_VAR, "not a url"),
            (DEPLOYMENT_VAR, "gpt-4o"),
        ]);
        assert!(AzureOpenAiSettings::from_lookup(lookup).is_err());
    }
}
