pub mod agents;
pub mod artifacts;
pub mod chat_manager;
pub mod orchestrator;

pub use crate::domain::model::{AgentProfile, ChatMessage, CompletionMessage};
pub use crate::domain::ports::{LanguageModel, MessageHandler, PubSub, StateStore, Storage};
pub use crate::utils::error::Result;
