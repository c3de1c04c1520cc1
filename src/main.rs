use anyhow::Context;
use clap::Parser;
use multi_agent_chat::config::dapr_components;
use multi_agent_chat::config::env;
use multi_agent_chat::core::artifacts;
use multi_agent_chat::core::chat_manager::{create_chat_manager, ChatManagerSettings};
use multi_agent_chat::domain::ports::{PubSub, StateStore};
use multi_agent_chat::server::{subscription, web};
use multi_agent_chat::utils::{logger, validation::Validate};
use multi_agent_chat::{
    supervisor, AgentTeam, AppConfig, ArtifactWriter, AzureOpenAi, AzureOpenAiSettings,
    ChatError, ChatManager, CliConfig, Command, HistoryFormat, InMemorySidecar, LocalStorage,
    Result,
};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    match &cli.command {
        Command::Serve { json_logs: true, .. } => logger::init_json_logger(cli.verbose),
        _ => logger::init_cli_logger(cli.verbose),
    }

    tracing::info!("Starting multi-agent-chat");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = AppConfig::load(cli.config.as_deref()).with_context(|| {
        format!(
            "failed to load configuration{}",
            cli.config
                .as_ref()
                .map(|p| format!(" from {}", p.display()))
                .unwrap_or_default()
        )
    })?;

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = dispatch(cli.command, &config).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        std::process::exit(e.exit_code());
    }

    Ok(())
}

async fn dispatch(command: Command, config: &AppConfig) -> Result<()> {
    match command {
        Command::Serve { port, .. } => {
            subscription::serve(config, port.unwrap_or(config.ports.app)).await
        }
        Command::Web { port } => web::serve(config, port.unwrap_or(config.ports.frontend)).await,
        Command::Launch => supervisor::launch(config).await,
        Command::Run {
            requirements,
            output,
            no_dapr,
        } => {
            let output_dir = output.unwrap_or_else(|| config.app.output_dir.clone());
            let writer = ArtifactWriter::new(LocalStorage::new(output_dir.clone()));

            let settings = AzureOpenAiSettings::from_env()?;
            settings.validate()?;
            let team = AgentTeam::with_default_agents(
                Arc::new(AzureOpenAi::new(settings)),
                &config.orchestration,
            )?;

            if no_dapr {
                let sidecar = InMemorySidecar::new();
                let chat = ChatManager::new(
                    ChatManagerSettings::from_config(config),
                    sidecar.clone(),
                    sidecar,
                );
                run_team(&team, &requirements, &chat, &writer, &output_dir).await
            } else {
                let chat = create_chat_manager(config).await?;
                let result = run_team(&team, &requirements, &chat, &writer, &output_dir).await;
                chat.cleanup().await;
                result
            }
        }
        Command::Send {
            agent,
            role,
            content,
        } => {
            let chat = create_chat_manager(config).await?;
            let message_id = chat.send_agent_message(&agent, &role, &content).await?;
            println!("📨 Published message {} from {}", message_id, agent);
            Ok(())
        }
        Command::History { limit, format } => {
            let chat = create_chat_manager(config).await?;
            let messages = chat
                .get_chat_history(limit.unwrap_or(config.orchestration.history_limit))
                .await?;
            let rendered = match format {
                HistoryFormat::Json => artifacts::history_to_json(&messages)?,
                HistoryFormat::Csv => artifacts::history_to_csv(&messages)?,
            };
            println!("{}", rendered);
            Ok(())
        }
        Command::CheckConfig => check_config(config),
        Command::Components { out } => {
            let dir = out.unwrap_or_else(|| config.dapr.components_dir.clone());
            let written = dapr_components::write_components(config, Path::new(&dir))?;
            for path in written {
                println!("📝 {}", path.display());
            }
            Ok(())
        }
    }
}

async fn run_team<P: PubSub, S: StateStore>(
    team: &AgentTeam,
    requirements: &str,
    chat: &ChatManager<P, S>,
    writer: &ArtifactWriter<LocalStorage>,
    output_dir: &str,
) -> Result<()> {
    let outcome = team.generate(requirements, chat, writer).await?;

    for message in &outcome.history {
        println!("── {} ({}) ──", message.agent_name, message.role);
        println!("{}\n", message.content);
    }

    if outcome.approved {
        println!("✅ Approved after {} turns", outcome.turns);
    } else {
        println!("⚠️ Stopped after {} turns without approval", outcome.turns);
    }
    println!("📁 Artifacts in {}: {}", output_dir, outcome.artifacts.join(", "));
    Ok(())
}

fn check_config(config: &AppConfig) -> Result<()> {
    println!("✅ Configuration is valid");
    for (name, port) in config.ports.as_pairs() {
        println!("   {:<10} {}", name, port);
    }
    println!("   sidecar    {}", config.sidecar_url());

    let missing = env::missing_vars();
    if missing.is_empty() {
        println!("✅ Azure OpenAI environment variables are set");
        Ok(())
    } else {
        Err(ChatError::MissingConfigError {
            field: missing.join(", "),
        })
    }
}
