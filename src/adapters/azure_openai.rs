use crate::config::env::AzureOpenAiSettings;
use crate::domain::model::CompletionMessage;
use crate::domain::ports::LanguageModel;
use crate::utils::error::{ChatError, ModelErrorKind, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: Vec<&'a CompletionMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Azure OpenAI chat completions 客戶端
pub struct AzureOpenAi {
    settings: AzureOpenAiSettings,
    client: Client,
}

impl AzureOpenAi {
    pub fn new(settings: AzureOpenAiSettings) -> Self {
        Self {
            settings,
            client: Client::new(),
        }
    }

    pub fn settings(&self) -> &AzureOpenAiSettings {
        &self.settings
    }
}

#[async_trait]
impl LanguageModel for AzureOpenAi {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[CompletionMessage],
    ) -> Result<String> {
        let system = CompletionMessage::system(system_prompt);
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(&system);
        all.extend(messages.iter());

        let request = ChatCompletionRequest {
            messages: all,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        tracing::debug!(
            "Calling deployment '{}' with {} messages",
            self.settings.deployment,
            request.messages.len()
        );

        let response = self
            .client
            .post(self.settings.chat_completions_url())
            .header("api-key", &self.settings.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_status(status, &body));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ChatError::ModelError {
                kind: ModelErrorKind::EmptyResponse,
                message: "completion contained no message content".to_string(),
            })
    }
}

pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> ChatError {
    let kind = match status.as_u16() {
        401 | 403 => ModelErrorKind::Authentication,
        404 => ModelErrorKind::DeploymentNotFound,
        429 => ModelErrorKind::RateLimited,
        500..=599 => ModelErrorKind::ServiceUnavailable,
        _ => ModelErrorKind::InvalidRequest,
    };
    ChatError::ModelError {
        kind,
        message: format!("HTTP {}: {}", status, body),
    }
}
