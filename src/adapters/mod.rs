// Adapters layer: concrete implementations for external systems (Dapr sidecar, Azure OpenAI, in-memory sidecar, local files).

pub mod azure_openai;
pub mod dapr;
pub mod memory;
pub mod storage;

pub use azure_openai::AzureOpenAi;
pub use dapr::DaprClient;
pub use memory::InMemorySidecar;
pub use storage::LocalStorage;
