use crate::config::toml_config::AppConfig;
use crate::domain::ports::{PubSub, StateStore};
use crate::utils::error::{ChatError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};

pub const API_TOKEN_HEADER: &str = "dapr-api-token";

/// Dapr sidecar 的 HTTP API 客戶端 (v1.0)
#[derive(Debug, Clone)]
pub struct DaprClient {
    base_url: String,
    api_token: Option<String>,
    client: Client,
}

impl DaprClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: None,
            client: Client::new(),
        }
    }

    pub fn with_api_token(mut self, api_token: Option<String>) -> Self {
        self.api_token = api_token;
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.sidecar_url()).with_api_token(config.dapr.api_token.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.api_token {
            Some(token) => builder.header(API_TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ChatError::SidecarError {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PubSub for DaprClient {
    /// GET /v1.0/healthz
    async fn health(&self) -> Result<()> {
        let response = self.request(Method::GET, "/v1.0/healthz").send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn publish(
        &self,
        pubsub_name: &str,
        topic: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let path = format!("/v1.0/publish/{}/{}", pubsub_name, topic);
        tracing::debug!("Publishing to {}{}", self.base_url, path);

        let response = self
            .request(Method::POST, &path)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(payload)?)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for DaprClient {
    async fn get_state(&self, store_name: &str, key: &str) -> Result<Option<serde_json::Value>> {
        let path = format!("/v1.0/state/{}/{}", store_name, key);
        let response = self.request(Method::GET, &path).send().await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = Self::check(response).await?.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let value: serde_json::Value = serde_json::from_str(&body)?;
        // 其他客戶端可能把整份文件序列化成字串後再存入
        match value {
            serde_json::Value::String(inner) => match serde_json::from_str(&inner) {
                Ok(decoded) => Ok(Some(decoded)),
                Err(_) => Ok(Some(serde_json::Value::String(inner))),
            },
            other => Ok(Some(other)),
        }
    }

    async fn save_state(
        &self,
        store_name: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<()> {
        let path = format!("/v1.0/state/{}", store_name);
        let body = serde_json::json!([{ "key": key, "value": value }]);

        let response = self.request(Method::POST, &path).json(&body).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_publish_posts_json_to_topic() {
        let server = MockServer::start();
        let publish_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1.0/publish/chat-pubsub/agent-messages")
                .header("content-type", "application/json")
                .header(API_TOKEN_HEADER, "token-1")
                .json_body(serde_json::json!({"agent_name": "ProductOwner"}));
            then.status(204);
        });

        let client = DaprClient::new(server.base_url()).with_api_token(Some("token-1".into()));
        client
            .publish(
                "chat-pubsub",
                "agent-messages",
                &serde_json::json!({"agent_name": "ProductOwner"}),
            )
            .await
            .unwrap();

        publish_mock.assert();
    }

    #[tokio::test]
    async fn test_publish_failure_maps_to_sidecar_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1.0/publish/chat-pubsub/agent-messages");
            then.status(500).body("ERR_PUBSUB_PUBLISH_MESSAGE");
        });

        let client = DaprClient::new(server.base_url());
        let err = client
            .publish("chat-pubsub", "agent-messages", &serde_json::json!({}))
            .await
            .unwrap_err();

        match err {
            ChatError::SidecarError { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("ERR_PUBSUB"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_state_missing_key_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1.0/state/chat-state/chat-history");
            then.status(204);
        });

        let client = DaprClient::new(server.base_url());
        let value = client.get_state("chat-state", "chat-history").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_get_state_decodes_string_encoded_document() {
        let server = MockServer::start();
        let encoded = serde_json::to_string(&serde_json::json!([{"a": 1}])).unwrap();
        server.mock(|when, then| {
            when.method(GET).path("/v1.0/state/chat-state/chat-history");
            then.status(200).json_body(serde_json::Value::String(encoded));
        });

        let client = DaprClient::new(server.base_url());
        let value = client
            .get_state("chat-state", "chat-history")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, serde_json::json!([{"a": 1}]));
    }

    #[tokio::test]
    async fn test_save_state_wraps_key_value() {
        let server = MockServer::start();
        let save_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1.0/state/chat-state")
                .json_body(serde_json::json!([{"key": "chat-history", "value": []}]));
            then.status(204);
        });

        let client = DaprClient::new(format!("{}/", server.base_url()));
        client
            .save_state("chat-state", "chat-history", &serde_json::json!([]))
            .await
            .unwrap();
        save_mock.assert();
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start();
        let health_mock = server.mock(|when, then| {
            when.method(GET).path("/v1.0/healthz");
            then.status(204);
        });

        let client = DaprClient::new(server.base_url());
        assert!(client.health().await.is_ok());
        health_mock.assert();
    }
}
