use crate::domain::model::ChatMessage;
use crate::domain::ports::Storage;
use crate::utils::error::{ChatError, Result};
use chrono::SecondsFormat;
use regex::Regex;
use std::io::Write;
use std::sync::LazyLock;
use zip::write::{FileOptions, ZipWriter};

pub const INDEX_HTML: &str = "index.html";
pub const PUSH_SCRIPT: &str = "push_to_github.sh";
pub const HISTORY_JSON: &str = "chat_history.json";
pub const BUNDLE_ZIP: &str = "artifacts.zip";

const PUSH_SCRIPT_BODY: &str = r#"#!/usr/bin/env bash
# Publishes the generated index.html to a GitHub repository.
# usage: ./push_to_github.sh <repo-url>   (or set GITHUB_REPO_URL)
set -euo pipefail

REPO_URL="${1:-${GITHUB_REPO_URL:-}}"
if [ -z "$REPO_URL" ]; then
  echo "usage: ./push_to_github.sh <repo-url>" >&2
  exit 1
fi

if [ ! -d .git ]; then
  git init -q
fi

git add index.html
git commit -m "Add generated web application" || true
git branch -M main

if [ -n "${GITHUB_TOKEN:-}" ]; then
  REPO_URL="${REPO_URL/https:\/\//https://${GITHUB_TOKEN}@}"
fi

git push -u "$REPO_URL" main
"#;

static FENCED_HTML: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```html[^\n]*\n(.*?)```").expect("fenced html pattern"));

static BARE_HTML: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<!DOCTYPE html>.*</html>").expect("bare html pattern"));

/// 取出最後一個 ```html 區塊；沒有時退而尋找完整的 <!DOCTYPE html> 文件
pub fn extract_html(text: &str) -> Option<String> {
    if let Some(caps) = FENCED_HTML.captures_iter(text).last() {
        let body = caps[1].trim();
        if !body.is_empty() {
            return Some(body.to_string());
        }
    }

    BARE_HTML
        .find(text)
        .map(|m| m.as_str().trim().to_string())
}

pub fn history_to_json(history: &[ChatMessage]) -> Result<String> {
    Ok(serde_json::to_string_pretty(history)?)
}

pub fn history_to_csv(history: &[ChatMessage]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["timestamp", "agent_name", "role", "message_id", "content"])?;

    for message in history {
        let timestamp = message
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Micros, false);
        writer.write_record([
            timestamp.as_str(),
            message.agent_name.as_str(),
            message.role.as_str(),
            message.message_id.as_str(),
            message.content.as_str(),
        ])?;
    }

    let data = writer
        .into_inner()
        .map_err(|e| ChatError::IoError(e.into_error()))?;
    String::from_utf8(data).map_err(|e| ChatError::validation(e.to_string()))
}

pub fn build_bundle(html: &str, history_json: &str) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    zip.start_file::<_, ()>(INDEX_HTML, FileOptions::default())?;
    zip.write_all(html.as_bytes())?;

    zip.start_file::<_, ()>(PUSH_SCRIPT, FileOptions::default().unix_permissions(0o755))?;
    zip.write_all(PUSH_SCRIPT_BODY.as_bytes())?;

    zip.start_file::<_, ()>(HISTORY_JSON, FileOptions::default())?;
    zip.write_all(history_json.as_bytes())?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// 將執行結果寫入輸出目錄
pub struct ArtifactWriter<S: Storage> {
    storage: S,
}

impl<S: Storage> ArtifactWriter<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// 一律寫入對話紀錄；核准且有 HTML 時再寫入網頁、推送腳本與壓縮包
    pub async fn write(
        &self,
        history: &[ChatMessage],
        html: Option<&str>,
        approved: bool,
    ) -> Result<Vec<String>> {
        let mut written = Vec::new();

        let history_json = history_to_json(history)?;
        self.storage
            .write_file(HISTORY_JSON, history_json.as_bytes())
            .await?;
        written.push(HISTORY_JSON.to_string());

        match (approved, html) {
            (true, Some(html)) => {
                self.storage.write_file(INDEX_HTML, html.as_bytes()).await?;
                written.push(INDEX_HTML.to_string());

                self.storage
                    .write_file(PUSH_SCRIPT, PUSH_SCRIPT_BODY.as_bytes())
                    .await?;
                written.push(PUSH_SCRIPT.to_string());

                let bundle = build_bundle(html, &history_json)?;
                tracing::debug!("Writing bundle ({} bytes)", bundle.len());
                self.storage.write_file(BUNDLE_ZIP, &bundle).await?;
                written.push(BUNDLE_ZIP.to_string());
            }
            (true, None) => {
                tracing::warn!("⚠️ Approved without any HTML code block; nothing to publish");
            }
            (false, _) => {
                tracing::warn!("⚠️ Run ended without approval; skipping index.html");
            }
        }

        Ok(written)
    }
}
