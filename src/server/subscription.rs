use crate::config::toml_config::AppConfig;
use crate::core::agents;
use crate::core::chat_manager::{dapr_chat_manager, ChatManager, LoggingHandler};
use crate::domain::ports::{PubSub, StateStore};
use crate::utils::error::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// GET /dapr/subscribe 的回應項目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub pubsubname: String,
    pub topic: String,
    pub route: String,
}

impl Subscription {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            pubsubname: config.dapr.pubsub_name.clone(),
            topic: config.dapr.topic.clone(),
            route: config.dapr.route.clone(),
        }
    }
}

pub struct SubscriptionState<P: PubSub, S: StateStore> {
    chat: Arc<ChatManager<P, S>>,
    subscription: Subscription,
}

pub fn router<P, S>(chat: Arc<ChatManager<P, S>>, subscription: Subscription) -> Router
where
    P: PubSub + 'static,
    S: StateStore + 'static,
{
    let route = subscription.route.clone();
    let state = Arc::new(SubscriptionState { chat, subscription });

    Router::new()
        .route("/dapr/subscribe", get(list_subscriptions::<P, S>))
        .route(&route, post(receive_message::<P, S>))
        .route("/healthz", get(health_check))
        .with_state(state)
}

async fn list_subscriptions<P: PubSub, S: StateStore>(
    State(state): State<Arc<SubscriptionState<P, S>>>,
) -> Json<Vec<Subscription>> {
    Json(vec![state.subscription.clone()])
}

/// Dapr 以 application/cloudevents+json 投遞，所以直接解析原始內容
async fn receive_message<P: PubSub, S: StateStore>(
    State(state): State<Arc<SubscriptionState<P, S>>>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let event: Value = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!("❌ Failed to handle incoming message: {}", e);
            return (StatusCode::OK, Json(json!({ "status": "DROP" })));
        }
    };

    match state.chat.handle_incoming_message(&event).await {
        Ok(delivered) => {
            tracing::debug!("Delivered incoming message to {} handlers", delivered);
            (StatusCode::OK, Json(json!({ "status": "SUCCESS" })))
        }
        Err(e) => {
            tracing::error!("❌ Failed to handle incoming message: {}", e);
            (StatusCode::OK, Json(json!({ "status": "DROP" })))
        }
    }
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// 啟動訂閱端點（預設埠 6001），直到收到 Ctrl-C。
/// 不等待 sidecar 健康檢查：daprd 會先等 app 埠開啟
pub async fn serve(config: &AppConfig, port: u16) -> Result<()> {
    let chat = Arc::new(dapr_chat_manager(config));
    for agent in agents::default_team(&config.orchestration.approval_marker) {
        chat.subscribe(agent.name.clone(), Arc::new(LoggingHandler::new(agent.name)))
            .await;
    }

    let subscription = Subscription::from_config(config);
    let app = router(Arc::clone(&chat), subscription.clone());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("🚀 Subscription app listening on http://localhost:{}", port);
    tracing::info!(
        "📡 {}/{} -> POST {}",
        subscription.pubsubname,
        subscription.topic,
        subscription.route
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(super::shutdown_signal())
        .await?;

    chat.cleanup().await;
    Ok(())
}
