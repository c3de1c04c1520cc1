pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
#[cfg(feature = "cli")]
pub mod supervisor;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command, HistoryFormat};

pub use adapters::{AzureOpenAi, DaprClient, InMemorySidecar, LocalStorage};
pub use config::env::AzureOpenAiSettings;
pub use config::toml_config::AppConfig;
pub use core::artifacts::ArtifactWriter;
pub use core::chat_manager::{ChatManager, DaprChatManager};
pub use core::orchestrator::{AgentTeam, RunOutcome};
pub use utils::error::{ChatError, Result};
