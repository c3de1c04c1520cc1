use crate::adapters::azure_openai::AzureOpenAi;
use crate::adapters::storage::LocalStorage;
use crate::config::env::{self, AzureOpenAiSettings};
use crate::config::toml_config::AppConfig;
use crate::core::artifacts::{ArtifactWriter, BUNDLE_ZIP, INDEX_HTML, PUSH_SCRIPT};
use crate::core::chat_manager::{dapr_chat_manager, ChatManager};
use crate::core::orchestrator::AgentTeam;
use crate::domain::ports::{LanguageModel, PubSub, StateStore, Storage};
use crate::utils::error::{ChatError, Result};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Multi-Agent System - Web App Generator</title>
<style>
  body { font-family: sans-serif; max-width: 60rem; margin: 2rem auto; }
  textarea { width: 100%; height: 9rem; }
  .msg { border: 1px solid #ddd; padding: .5rem; margin: .5rem 0; white-space: pre-wrap; }
  .error { color: #b00020; }
</style>
</head>
<body>
<h1>Multi-Agent System - Web App Generator</h1>
<p id="status"></p>
<h2>Project Requirements</h2>
<textarea id="requirements" placeholder="Example: Create a simple calculator app with buttons for basic arithmetic operations..."></textarea>
<p><button id="generate">Generate Web Application</button></p>
<div id="result"></div>
<script>
async function refreshStatus() {
  const res = await fetch('/api/status');
  const body = await res.json();
  const el = document.getElementById('status');
  if (!body.ready) {
    el.className = 'error';
    el.textContent = body.error;
  } else {
    el.textContent = 'Azure OpenAI credentials configured.';
  }
}
document.getElementById('generate').onclick = async () => {
  const out = document.getElementById('result');
  out.textContent = 'Multi-agent system is working on your request...';
  const res = await fetch('/api/generate', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify({ requirements: document.getElementById('requirements').value })
  });
  const body = await res.json();
  out.innerHTML = '';
  if (!res.ok) {
    out.className = 'error';
    out.textContent = body.error;
    return;
  }
  out.className = '';
  const h = document.createElement('h2');
  h.textContent = 'Agent Conversation History';
  out.appendChild(h);
  for (const m of body.history) {
    const d = document.createElement('div');
    d.className = 'msg';
    d.textContent = m.role + ' - ' + m.agent_name + '\n\n' + m.content;
    out.appendChild(d);
  }
  if (body.artifacts.includes('index.html')) {
    const a = document.createElement('p');
    a.innerHTML = '<a href="/download/index.html">Download HTML File</a> | ' +
      '<a href="/download/artifacts.zip">Download bundle</a> | ' +
      'run <code>chmod +x push_to_github.sh && ./push_to_github.sh</code>';
    out.appendChild(a);
  }
};
refreshStatus();
</script>
</body>
</html>
"#;

pub struct WebState<P: PubSub, S: StateStore> {
    config: AppConfig,
    model: Option<Arc<dyn LanguageModel>>,
    missing_vars: Vec<&'static str>,
    model_error: Option<String>,
    chat: Arc<ChatManager<P, S>>,
    writer: ArtifactWriter<LocalStorage>,
    run_lock: Mutex<()>,
}

impl<P: PubSub, S: StateStore> WebState<P, S> {
    pub fn new(
        config: AppConfig,
        model: Option<Arc<dyn LanguageModel>>,
        missing_vars: Vec<&'static str>,
        chat: Arc<ChatManager<P, S>>,
    ) -> Self {
        let writer = ArtifactWriter::new(LocalStorage::new(config.app.output_dir.clone()));
        Self {
            config,
            model,
            missing_vars,
            model_error: None,
            chat,
            writer,
            run_lock: Mutex::new(()),
        }
    }

    /// 模型無法建立的原因（例如端點格式錯誤），回報給前端
    pub fn with_model_error(mut self, message: impl Into<String>) -> Self {
        self.model_error = Some(message.into());
        self
    }

    fn unavailable_reason(&self) -> String {
        match (&self.model_error, self.missing_vars.is_empty()) {
            (_, false) => format!(
                "Missing environment variables: {}",
                self.missing_vars.join(", ")
            ),
            (Some(message), true) => format!("Azure OpenAI is not configured: {}", message),
            (None, true) => "Azure OpenAI is not configured".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub requirements: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub fn router<P, S>(state: Arc<WebState<P, S>>) -> Router
where
    P: PubSub + 'static,
    S: StateStore + 'static,
{
    Router::new()
        .route("/", get(index_page))
        .route("/api/status", get(status::<P, S>))
        .route("/api/generate", post(generate::<P, S>))
        .route("/api/history", get(history::<P, S>))
        .route("/download/{file}", get(download::<P, S>))
        .with_state(state)
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn status<P: PubSub, S: StateStore>(
    State(state): State<Arc<WebState<P, S>>>,
) -> Json<serde_json::Value> {
    Json(json!({
        "ready": state.model.is_some(),
        "missing_vars": state.missing_vars,
        "error": state.model.is_none().then(|| state.unavailable_reason()),
    }))
}

async fn generate<P: PubSub, S: StateStore>(
    State(state): State<Arc<WebState<P, S>>>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    if request.requirements.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Please enter your requirements for the web application." })),
        )
            .into_response();
    }

    let Some(model) = state.model.clone() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": state.unavailable_reason(),
                "missing_vars": state.missing_vars,
            })),
        )
            .into_response();
    };

    let team = match AgentTeam::with_default_agents(model, &state.config.orchestration) {
        Ok(team) => team,
        Err(e) => return error_response(e),
    };

    // 同一時間只跑一次，避免輸出目錄互相覆寫
    let _guard = state.run_lock.lock().await;
    tracing::info!("🧑‍💼 New generation request ({} chars)", request.requirements.len());

    match team
        .generate(&request.requirements, &state.chat, &state.writer)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(json!(outcome))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn history<P: PubSub, S: StateStore>(
    State(state): State<Arc<WebState<P, S>>>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(state.config.orchestration.history_limit);
    match state.chat.get_chat_history(limit).await {
        Ok(messages) => (StatusCode::OK, Json(json!(messages))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn download<P: PubSub, S: StateStore>(
    State(state): State<Arc<WebState<P, S>>>,
    Path(file): Path<String>,
) -> Response {
    let content_type = match file.as_str() {
        INDEX_HTML => "text/html; charset=utf-8",
        BUNDLE_ZIP => "application/zip",
        PUSH_SCRIPT => "text/x-shellscript",
        _ => return StatusCode::NOT_FOUND.into_response(),
    };

    match state.writer.storage().read_file(&file).await {
        Ok(data) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file),
                ),
            ],
            data,
        )
            .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn error_response(e: ChatError) -> Response {
    tracing::error!("❌ {} (Category: {:?})", e, e.category());
    let status = if e.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(json!({
            "error": e.user_friendly_message(),
            "suggestion": e.recovery_suggestion(),
        })),
    )
        .into_response()
}

/// 啟動前端（預設埠 8501），直到收到 Ctrl-C
pub async fn serve(config: &AppConfig, port: u16) -> Result<()> {
    let (model, missing_vars, model_error): (
        Option<Arc<dyn LanguageModel>>,
        Vec<&'static str>,
        Option<String>,
    ) = match AzureOpenAiSettings::from_env() {
        Ok(settings) => (Some(Arc::new(AzureOpenAi::new(settings))), Vec::new(), None),
        Err(e) => {
            tracing::warn!("⚠️ Azure OpenAI not configured: {}", e);
            (None, env::missing_vars(), Some(e.to_string()))
        }
    };

    let chat = Arc::new(dapr_chat_manager(config));
    if let Err(e) = chat.initialize().await {
        tracing::warn!("⚠️ Sidecar not reachable yet, continuing: {}", e);
    }

    let mut state = WebState::new(config.clone(), model, missing_vars, chat);
    if let Some(message) = model_error {
        state = state.with_model_error(message);
    }
    let state = Arc::new(state);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("🌐 Web front end listening on http://localhost:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(super::shutdown_signal())
        .await?;
    Ok(())
}
