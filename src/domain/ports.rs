use crate::domain::model::{ChatMessage, CompletionMessage};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[async_trait]
pub trait PubSub: Send + Sync {
    /// 確認 broker 可用；預設視為可用
    async fn health(&self) -> Result<()> {
        Ok(())
    }

    async fn publish(&self, pubsub_name: &str, topic: &str, payload: &serde_json::Value)
        -> Result<()>;
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// 不存在的 key 回傳 `None`
    async fn get_state(&self, store_name: &str, key: &str) -> Result<Option<serde_json::Value>>;
    async fn save_state(&self, store_name: &str, key: &str, value: &serde_json::Value)
        -> Result<()>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, messages: &[CompletionMessage])
        -> Result<String>;
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &ChatMessage) -> Result<()>;
}
