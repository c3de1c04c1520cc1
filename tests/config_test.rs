use anyhow::Result;
use multi_agent_chat::config::dapr_components::{self, Component, Configuration};
use multi_agent_chat::domain::ports::Storage;
use multi_agent_chat::utils::validation::Validate;
use multi_agent_chat::{AppConfig, LocalStorage};
use tempfile::TempDir;

#[test]
fn test_config_file_drives_sidecar_resources() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let components_dir = temp_dir.path().join("components");

    let config_content = format!(
        r#"
[app]
app_id = "team-chat"

[dapr]
pubsub_name = "team-pubsub"
state_store = "team-state"
redis_host = "cache:6380"
components_dir = "{}"
"#,
        components_dir.to_string_lossy().replace('\\', "/")
    );
    let config_path = temp_dir.path().join("multi-agent-chat.toml");
    std::fs::write(&config_path, config_content)?;

    let config = AppConfig::load(Some(&config_path))?;
    config.validate()?;
    assert_eq!(config.app.app_id, "team-chat");

    let written = dapr_components::write_components(&config, &components_dir)?;
    assert_eq!(written.len(), 4);

    let pubsub: Component =
        serde_yaml::from_str(&std::fs::read_to_string(components_dir.join("pubsub.yaml"))?)?;
    assert_eq!(pubsub.kind, "Component");
    assert_eq!(pubsub.metadata.name, "team-pubsub");
    assert_eq!(pubsub.spec.component_type, "pubsub.redis");
    assert!(pubsub
        .spec
        .metadata
        .iter()
        .any(|m| m.name == "redisHost" && m.value == "cache:6380"));

    let state: Component =
        serde_yaml::from_str(&std::fs::read_to_string(components_dir.join("statestore.yaml"))?)?;
    assert_eq!(state.metadata.name, "team-state");
    assert_eq!(state.spec.component_type, "state.redis");

    let sidecar: Configuration =
        serde_yaml::from_str(&std::fs::read_to_string(components_dir.join("config.yaml"))?)?;
    assert_eq!(sidecar.metadata.name, "daprConfig");
    assert_eq!(sidecar.spec.tracing.sampling_rate, "1");
    assert_eq!(sidecar.spec.http_pipeline.handlers[0].handler_type, "middleware.http.cors");
    Ok(())
}

#[test]
fn test_invalid_config_file_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("bad.toml");
    std::fs::write(&config_path, "[ports]\napp = 8501\n")?;

    let config = AppConfig::load(Some(&config_path))?;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("ports"));

    std::fs::write(&config_path, "[orchestration]\nmax_turns = \"many\"\n")?;
    assert!(AppConfig::load(Some(&config_path)).is_err());
    Ok(())
}

#[test]
fn test_local_storage_creates_output_directories() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let storage = LocalStorage::new(temp_dir.path().join("out").to_string_lossy().to_string());

    tokio_test::block_on(async {
        storage.write_file("nested/index.html", b"<html></html>").await?;
        let data = storage.read_file("nested/index.html").await?;
        assert_eq!(data, b"<html></html>");
        Ok::<_, multi_agent_chat::ChatError>(())
    })?;

    assert!(temp_dir.path().join("out/nested/index.html").exists());
    Ok(())
}
