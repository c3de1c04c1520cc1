use crate::domain::ports::{PubSub, StateStore};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// (pubsub, topic, payload)
pub type PublishedEvent = (String, String, serde_json::Value);

/// 不經 sidecar 的行程內 pub/sub 與 state store，供 `run --no-dapr` 使用
#[derive(Debug, Clone, Default)]
pub struct InMemorySidecar {
    published: Arc<Mutex<Vec<PublishedEvent>>>,
    state: Arc<Mutex<HashMap<(String, String), serde_json::Value>>>,
}

impl InMemorySidecar {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<PublishedEvent> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl PubSub for InMemorySidecar {
    async fn publish(
        &self,
        pubsub_name: &str,
        topic: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        self.published
            .lock()
            .await
            .push((pubsub_name.to_string(), topic.to_string(), payload.clone()));
        Ok(())
    }
}

#[async_trait]
impl StateStore for InMemorySidecar {
    async fn get_state(&self, store_name: &str, key: &str) -> Result<Option<serde_json::Value>> {
        let state = self.state.lock().await;
        Ok(state
            .get(&(store_name.to_string(), key.to_string()))
            .cloned())
    }

    async fn save_state(
        &self,
        store_name: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<()> {
        self.state
            .lock()
            .await
            .insert((store_name.to_string(), key.to_string()), value.clone());
        Ok(())
    }
}
