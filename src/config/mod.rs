pub mod dapr_components;
pub mod env;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "multi-agent-chat")]
#[command(about = "Multi-agent web app generator backed by a Dapr sidecar")]
pub struct CliConfig {
    /// Path to TOML configuration file (defaults to ./multi-agent-chat.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the pub/sub subscription app that the Dapr sidecar calls
    Serve {
        #[arg(long)]
        port: Option<u16>,

        /// Emit JSON logs
        #[arg(long)]
        json_logs: bool,
    },

    /// Run the web front end
    Web {
        #[arg(long)]
        port: Option<u16>,
    },

    /// Start Redis (if needed), the Dapr sidecar and the web front end
    Launch,

    /// Run the agent team once for the given requirements
    Run {
        #[arg(short, long)]
        requirements: String,

        /// Directory for index.html, push_to_github.sh and artifacts.zip
        #[arg(short, long)]
        output: Option<String>,

        /// Do not publish to or persist through the sidecar
        #[arg(long)]
        no_dapr: bool,
    },

    /// Publish a single agent message
    Send {
        #[arg(long)]
        agent: String,

        #[arg(long, default_value = "assistant")]
        role: String,

        #[arg(long)]
        content: String,
    },

    /// Print the chat history stored in the state store
    History {
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_enum, default_value_t = HistoryFormat::Json)]
        format: HistoryFormat,
    },

    /// Validate configuration and environment variables
    CheckConfig,

    /// Write Dapr component and configuration YAML files
    Components {
        #[arg(long)]
        out: Option<String>,
    },
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HistoryFormat {
    Json,
    Csv,
}
