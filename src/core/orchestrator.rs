use crate::config::toml_config::OrchestrationConfig;
use crate::core::agents;
use crate::core::artifacts::{self, ArtifactWriter};
use crate::core::chat_manager::ChatManager;
use crate::domain::model::{AgentProfile, ChatMessage, CompletionMessage};
use crate::domain::ports::{LanguageModel, PubSub, StateStore, Storage};
use crate::utils::error::{ChatError, Result};
use serde::Serialize;
use std::sync::Arc;

pub const USER_AGENT_NAME: &str = "user";

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub history: Vec<ChatMessage>,
    pub approved: bool,
    pub turns: usize,
    pub html: Option<String>,
    pub artifacts: Vec<String>,
}

/// 依序輪流發言的代理團隊；最後一位代理的核准標記結束對話
pub struct AgentTeam {
    model: Arc<dyn LanguageModel>,
    agents: Vec<AgentProfile>,
    max_turns: usize,
    approval_marker: String,
}

impl AgentTeam {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        agents: Vec<AgentProfile>,
        config: &OrchestrationConfig,
    ) -> Result<Self> {
        if agents.is_empty() {
            return Err(ChatError::config("agent team cannot be empty"));
        }
        Ok(Self {
            model,
            agents,
            max_turns: config.max_turns.max(1),
            approval_marker: config.approval_marker.clone(),
        })
    }

    pub fn with_default_agents(
        model: Arc<dyn LanguageModel>,
        config: &OrchestrationConfig,
    ) -> Result<Self> {
        Self::new(model, agents::default_team(&config.approval_marker), config)
    }

    pub fn agents(&self) -> &[AgentProfile] {
        &self.agents
    }

    fn approver(&self) -> &AgentProfile {
        &self.agents[self.agents.len() - 1]
    }

    pub fn is_approval(&self, agent: &AgentProfile, content: &str) -> bool {
        agent.name == self.approver().name
            && content
                .to_lowercase()
                .contains(&self.approval_marker.to_lowercase())
    }

    /// 每則訊息都會發佈並寫回 state store
    pub async fn run<P: PubSub, S: StateStore>(
        &self,
        requirements: &str,
        chat: &ChatManager<P, S>,
    ) -> Result<RunOutcome> {
        let requirements = requirements.trim();
        if requirements.is_empty() {
            return Err(ChatError::validation(
                "Please enter your requirements for the web application",
            ));
        }

        tracing::info!("🚀 Starting agent run with {} agents", self.agents.len());

        let request = ChatMessage::new(USER_AGENT_NAME, "user", requirements);
        chat.publish_message(&request).await?;
        let mut history = vec![request];
        chat.save_chat_history(&history).await?;

        let mut approved = false;
        let mut turns = 0;

        while turns < self.max_turns {
            let agent = &self.agents[turns % self.agents.len()];
            turns += 1;
            tracing::info!(
                "🤖 Turn {}/{}: {} is working",
                turns,
                self.max_turns,
                agent.description
            );

            let conversation = build_conversation(agent, &history);
            let reply = self.model.complete(&agent.instructions, &conversation).await?;

            let message = ChatMessage::new(&agent.name, "assistant", reply);
            chat.publish_message(&message).await?;
            let is_approval = self.is_approval(agent, &message.content);
            history.push(message);
            chat.save_chat_history(&history).await?;

            if is_approval {
                tracing::info!("✅ {} approved the result", agent.description);
                approved = true;
                break;
            }
        }

        if !approved {
            tracing::warn!("⚠️ Reached {} turns without approval", self.max_turns);
        }

        let html = history
            .iter()
            .rev()
            .filter(|m| m.agent_name != USER_AGENT_NAME)
            .find_map(|m| artifacts::extract_html(&m.content));

        Ok(RunOutcome {
            history,
            approved,
            turns,
            html,
            artifacts: Vec::new(),
        })
    }

    /// 執行並寫出成品
    pub async fn generate<P, S, St>(
        &self,
        requirements: &str,
        chat: &ChatManager<P, S>,
        writer: &ArtifactWriter<St>,
    ) -> Result<RunOutcome>
    where
        P: PubSub,
        S: StateStore,
        St: Storage,
    {
        let mut outcome = self.run(requirements, chat).await?;
        outcome.artifacts = writer
            .write(&outcome.history, outcome.html.as_deref(), outcome.approved)
            .await?;
        Ok(outcome)
    }
}

/// 自己的發言為 assistant，其他人的發言以 user 身分並標示發言者
pub fn build_conversation(agent: &AgentProfile, history: &[ChatMessage]) -> Vec<CompletionMessage> {
    history
        .iter()
        .map(|message| {
            if message.agent_name == agent.name {
                CompletionMessage::assistant(message.content.clone())
            } else {
                CompletionMessage::user(format!("[{}]: {}", message.agent_name, message.content))
            }
        })
        .collect()
}
