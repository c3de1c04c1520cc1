//! Dapr sidecar resources rendered from [`AppConfig`].
//!
//! The launcher writes these into `dapr.components_dir` before starting the
//! sidecar: a Redis pub/sub component, a Redis state store, the CORS
//! middleware and a `Configuration` with full trace sampling.

use crate::config::toml_config::AppConfig;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "dapr.io/v1alpha1";
pub const CONFIGURATION_NAME: &str = "daprConfig";
pub const CONFIGURATION_FILE: &str = "config.yaml";
pub const CORS_COMPONENT_NAME: &str = "cors";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource<S> {
    pub api_version: String,
    pub kind: String,
    pub metadata: ResourceMetadata,
    pub spec: S,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    #[serde(rename = "type")]
    pub component_type: String,
    pub version: String,
    pub metadata: Vec<MetadataItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataItem {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSpec {
    pub tracing: TracingSpec,
    pub http_pipeline: HttpPipelineSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingSpec {
    pub sampling_rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpPipelineSpec {
    pub handlers: Vec<HandlerSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub handler_type: String,
}

pub type Component = Resource<ComponentSpec>;
pub type Configuration = Resource<ConfigurationSpec>;

fn component(name: &str, component_type: &str, metadata: Vec<(&str, &str)>) -> Component {
    Resource {
        api_version: API_VERSION.to_string(),
        kind: "Component".to_string(),
        metadata: ResourceMetadata {
            name: name.to_string(),
        },
        spec: ComponentSpec {
            component_type: component_type.to_string(),
            version: "v1".to_string(),
            metadata: metadata
                .into_iter()
                .map(|(name, value)| MetadataItem {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .collect(),
        },
    }
}

pub fn pubsub_component(config: &AppConfig) -> Component {
    component(
        &config.dapr.pubsub_name,
        "pubsub.redis",
        vec![("redisHost", config.dapr.redis_host.as_str()), ("redisPassword", "")],
    )
}

pub fn state_component(config: &AppConfig) -> Component {
    component(
        &config.dapr.state_store,
        "state.redis",
        vec![("redisHost", config.dapr.redis_host.as_str()), ("redisPassword", "")],
    )
}

pub fn cors_component(config: &AppConfig) -> Component {
    component(
        CORS_COMPONENT_NAME,
        "middleware.http.cors",
        vec![("allowedOrigins", config.dapr.cors_allowed_origins.as_str())],
    )
}

pub fn sidecar_configuration(config: &AppConfig) -> Configuration {
    Resource {
        api_version: API_VERSION.to_string(),
        kind: "Configuration".to_string(),
        metadata: ResourceMetadata {
            name: CONFIGURATION_NAME.to_string(),
        },
        spec: ConfigurationSpec {
            tracing: TracingSpec {
                sampling_rate: config.dapr.tracing_sampling_rate.clone(),
            },
            http_pipeline: HttpPipelineSpec {
                handlers: vec![HandlerSpec {
                    name: CORS_COMPONENT_NAME.to_string(),
                    handler_type: "middleware.http.cors".to_string(),
                }],
            },
        },
    }
}

/// (檔名, YAML 內容)
pub fn render_all(config: &AppConfig) -> Result<Vec<(String, String)>> {
    Ok(vec![
        ("pubsub.yaml".to_string(), serde_yaml::to_string(&pubsub_component(config))?),
        ("statestore.yaml".to_string(), serde_yaml::to_string(&state_component(config))?),
        ("cors.yaml".to_string(), serde_yaml::to_string(&cors_component(config))?),
        (
            CONFIGURATION_FILE.to_string(),
            serde_yaml::to_string(&sidecar_configuration(config))?,
        ),
    ])
}

pub fn write_components(config: &AppConfig, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for (file_name, yaml) in render_all(config)? {
        let path = dir.join(file_name);
        std::fs::write(&path, yaml)?;
        tracing::debug!("Wrote Dapr resource {}", path.display());
        written.push(path);
    }
    Ok(written)
}
