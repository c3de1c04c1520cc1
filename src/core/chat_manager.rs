use crate::adapters::dapr::DaprClient;
use crate::config::toml_config::AppConfig;
use crate::domain::model::ChatMessage;
use crate::domain::ports::{MessageHandler, PubSub, StateStore};
use crate::utils::error::{ChatError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Pub/sub 與 state store 的命名設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatManagerSettings {
    pub app_id: String,
    pub pubsub_name: String,
    pub topic_name: String,
    pub state_store: String,
    pub history_key: String,
}

impl Default for ChatManagerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ChatManagerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            app_id: config.app.app_id.clone(),
            pubsub_name: config.dapr.pubsub_name.clone(),
            topic_name: config.dapr.topic.clone(),
            state_store: config.dapr.state_store.clone(),
            history_key: config.dapr.history_key.clone(),
        }
    }
}

/// 透過 sidecar 的 pub/sub 與 state store 管理代理之間的訊息
pub struct ChatManager<P: PubSub, S: StateStore> {
    settings: ChatManagerSettings,
    pubsub: P,
    state: S,
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
}

pub type DaprChatManager = ChatManager<DaprClient, DaprClient>;

impl<P: PubSub, S: StateStore> ChatManager<P, S> {
    pub fn new(settings: ChatManagerSettings, pubsub: P, state: S) -> Self {
        Self {
            settings,
            pubsub,
            state,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &ChatManagerSettings {
        &self.settings
    }

    pub async fn initialize(&self) -> Result<()> {
        match self.pubsub.health().await {
            Ok(()) => {
                tracing::info!("🔌 Dapr client initialized for app '{}'", self.settings.app_id);
                Ok(())
            }
            Err(e) => {
                tracing::error!("❌ Failed to initialize Dapr client: {}", e);
                Err(e)
            }
        }
    }

    pub async fn publish_message(&self, message: &ChatMessage) -> Result<()> {
        let payload = serde_json::to_value(message)?;

        if let Err(e) = self
            .pubsub
            .publish(&self.settings.pubsub_name, &self.settings.topic_name, &payload)
            .await
        {
            tracing::error!("❌ Failed to publish message: {}", e);
            return Err(e);
        }

        tracing::info!(
            "📨 Message published from {}: {}",
            message.agent_name,
            message.message_id
        );
        Ok(())
    }

    /// 同一代理重複訂閱時，後註冊的 handler 取代先前的
    pub async fn subscribe(&self, agent_name: impl Into<String>, handler: Arc<dyn MessageHandler>) {
        let agent_name = agent_name.into();
        tracing::info!("Subscribed {} to messages", agent_name);
        self.handlers.write().await.insert(agent_name, handler);
    }

    pub async fn subscribers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// 將收到的事件分送給除了發送者以外的所有 handler，回傳成功送達的數量
    pub async fn handle_incoming_message(&self, event: &Value) -> Result<usize> {
        let message = parse_event(event)?;

        let targets: Vec<(String, Arc<dyn MessageHandler>)> = self
            .handlers
            .read()
            .await
            .iter()
            .filter(|(name, _)| name.as_str() != message.agent_name)
            .map(|(name, handler)| (name.clone(), Arc::clone(handler)))
            .collect();

        let mut delivered = 0;
        for (name, handler) in targets {
            match handler.handle(&message).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(
                    "⚠️ Handler for {} failed on message {}: {}",
                    name,
                    message.message_id,
                    e
                ),
            }
        }

        tracing::debug!(
            "Routed message {} from {} to {} handlers",
            message.message_id,
            message.agent_name,
            delivered
        );
        Ok(delivered)
    }

    /// 取得最後 `limit` 則訊息；`limit == 0` 表示全部
    pub async fn get_chat_history(&self, limit: usize) -> Result<Vec<ChatMessage>> {
        let Some(document) = self
            .state
            .get_state(&self.settings.state_store, &self.settings.history_key)
            .await?
        else {
            return Ok(Vec::new());
        };

        let mut messages: Vec<ChatMessage> = serde_json::from_value(document).map_err(|e| {
            ChatError::message_format(format!("chat history document is malformed: {}", e))
        })?;

        if limit > 0 && messages.len() > limit {
            let skip = messages.len() - limit;
            messages.drain(..skip);
        }
        Ok(messages)
    }

    /// 以完整清單覆寫歷史紀錄
    pub async fn save_chat_history(&self, messages: &[ChatMessage]) -> Result<()> {
        let document = serde_json::to_value(messages)?;
        self.state
            .save_state(&self.settings.state_store, &self.settings.history_key, &document)
            .await?;

        tracing::info!("💾 Saved {} messages to chat history", messages.len());
        Ok(())
    }

    pub async fn append_to_history(&self, message: &ChatMessage) -> Result<usize> {
        let mut history = self.get_chat_history(0).await?;
        history.push(message.clone());
        self.save_chat_history(&history).await?;
        Ok(history.len())
    }

    pub async fn send_agent_message(&self, agent_name: &str, role: &str, content: &str) -> Result<String> {
        let message = ChatMessage::new(agent_name, role, content);
        self.publish_message(&message).await?;
        Ok(message.message_id)
    }

    pub async fn cleanup(&self) {
        self.handlers.write().await.clear();
        tracing::info!("Dapr client closed");
    }
}

pub fn dapr_chat_manager(config: &AppConfig) -> DaprChatManager {
    let client = DaprClient::from_config(config);
    ChatManager::new(
        ChatManagerSettings::from_config(config),
        client.clone(),
        client,
    )
}

/// 依設定建立並初始化 Dapr chat manager
pub async fn create_chat_manager(config: &AppConfig) -> Result<DaprChatManager> {
    let manager = dapr_chat_manager(config);
    manager.initialize().await?;
    Ok(manager)
}

/// 接受 CloudEvent（data 為物件或 JSON 字串）或直接的訊息物件
pub fn parse_event(event: &Value) -> Result<ChatMessage> {
    let payload = match event.get("data") {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
            .map_err(|e| ChatError::message_format(format!("event data is not JSON: {}", e)))?,
        Some(data) => data.clone(),
        None => event.clone(),
    };

    serde_json::from_value(payload).map_err(|e| ChatError::message_format(e.to_string()))
}

/// 僅記錄收到的訊息
pub struct LoggingHandler {
    agent_name: String,
}

impl LoggingHandler {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
        }
    }
}

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn handle(&self, message: &ChatMessage) -> Result<()> {
        tracing::info!(
            "📬 {} received {} from {} ({} chars)",
            self.agent_name,
            message.message_id,
            message.agent_name,
            message.content.len()
        );
        Ok(())
    }
}

/// 將訊息轉送到 mpsc channel
pub struct ChannelHandler {
    sender: mpsc::UnboundedSender<ChatMessage>,
}

impl ChannelHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChatMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl MessageHandler for ChannelHandler {
    async fn handle(&self, message: &ChatMessage) -> Result<()> {
        self.sender
            .send(message.clone())
            .map_err(|_| ChatError::validation("message receiver dropped"))
    }
}
