use anyhow::Result;
use multi_agent_chat::core::chat_manager::{ChannelHandler, ChatManagerSettings};
use multi_agent_chat::domain::model::ChatMessage;
use multi_agent_chat::server::subscription::{self, Subscription};
use multi_agent_chat::{AppConfig, ChatManager, InMemorySidecar};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

type MemoryChat = ChatManager<InMemorySidecar, InMemorySidecar>;

/// 在隨機埠啟動訂閱端點，回傳 base url
async fn start_app(chat: Arc<MemoryChat>) -> Result<String> {
    let config = AppConfig::default();
    let app = subscription::router(chat, Subscription::from_config(&config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(format!("http://{}", addr))
}

fn memory_chat() -> Arc<MemoryChat> {
    let sidecar = InMemorySidecar::new();
    Arc::new(ChatManager::new(
        ChatManagerSettings::default(),
        sidecar.clone(),
        sidecar,
    ))
}

#[tokio::test]
async fn test_subscription_discovery() -> Result<()> {
    let base = start_app(memory_chat()).await?;

    let body: Value = reqwest::get(format!("{}/dapr/subscribe", base))
        .await?
        .json()
        .await?;

    assert_eq!(
        body,
        json!([{
            "pubsubname": "chat-pubsub",
            "topic": "agent-messages",
            "route": "/agent-messages"
        }])
    );
    Ok(())
}

#[tokio::test]
async fn test_cloud_event_is_routed_to_other_agents() -> Result<()> {
    let chat = memory_chat();
    let (analyst, mut analyst_rx) = ChannelHandler::new();
    let (engineer, mut engineer_rx) = ChannelHandler::new();
    chat.subscribe("BusinessAnalyst", Arc::new(analyst)).await;
    chat.subscribe("SoftwareEngineer", Arc::new(engineer)).await;

    let base = start_app(Arc::clone(&chat)).await?;

    let message = ChatMessage::new("BusinessAnalyst", "assistant", "Here is the plan");
    // Dapr 會把 data 包成字串的情況
    let event = json!({
        "specversion": "1.0",
        "type": "com.dapr.event.sent",
        "topic": "agent-messages",
        "datacontenttype": "application/json",
        "data": serde_json::to_string(&message)?,
    });

    let response = reqwest::Client::new()
        .post(format!("{}/agent-messages", base))
        .header("content-type", "application/cloudevents+json")
        .body(event.to_string())
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "SUCCESS");

    let received = tokio::time::timeout(Duration::from_secs(1), engineer_rx.recv())
        .await?
        .expect("engineer should receive the message");
    assert_eq!(received.message_id, message.message_id);
    assert_eq!(received.content, "Here is the plan");

    // 發送者不會收到自己的訊息
    assert!(analyst_rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_malformed_event_is_dropped() -> Result<()> {
    let base = start_app(memory_chat()).await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/agent-messages", base))
        .header("content-type", "application/cloudevents+json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "DROP");

    let response = client
        .post(format!("{}/agent-messages", base))
        .json(&json!({ "data": { "agent_name": "x" } }))
        .send()
        .await?;
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "DROP");
    Ok(())
}

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let base = start_app(memory_chat()).await?;
    let response = reqwest::get(format!("{}/healthz", base)).await?;
    assert_eq!(response.status(), 200);
    Ok(())
}
