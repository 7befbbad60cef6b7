//! Provider catalog: which providers exist, their models, budgets and client factories.
//!
//! Loaded once at startup from YAML and read-only afterwards.
//!
//! ```yaml
//! llm_providers:
//!   openai:
//!     models: [gpt-4o, gpt-4o-mini]
//!   local:
//!     api: openai
//!     base_url: http://localhost:8000/v1
//!     api_key_env: LOCAL_KEY
//!     chunk_tokens: 1024
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::config::{ConfigError, SessionConfig};
use crate::llm::{ApiKind, ClientFactory, ProviderRegistry, ProviderSettings, defaults};
use crate::session::ModelRef;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Provider {0} not found")]
    ProviderNotFound(String),

    #[error("Model {model} not found for provider {provider}")]
    ModelNotFound { provider: String, model: String },
}

// ============================================================================
// Catalog
// ============================================================================

/// Chunk and memory budgets in effect for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budgets {
    pub chunk_tokens: usize,
    pub memory_tokens: usize,
}

impl From<SessionConfig> for Budgets {
    fn from(config: SessionConfig) -> Self {
        Self {
            chunk_tokens: config.chunk_tokens,
            memory_tokens: config.memory_tokens,
        }
    }
}

/// One provider as configured.
#[derive(Clone)]
pub struct CatalogEntry {
    pub id: String,
    pub models: Vec<String>,
    pub budgets: Budgets,
    pub factory: ClientFactory,
}

impl CatalogEntry {
    pub fn has_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// Static table of providers, in declaration order.
#[derive(Clone, Default)]
pub struct ProviderCatalog {
    providers: IndexMap<String, CatalogEntry>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the catalog file, building a client factory for every provider.
    pub async fn load(
        path: impl AsRef<Path>,
        session: SessionConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::CatalogIo {
                path: path.to_path_buf(),
                source,
            })?;
        let file: CatalogFile =
            serde_saphyr::from_str(&contents).map_err(|source| ConfigError::CatalogYaml {
                path: path.to_path_buf(),
                source,
            })?;

        let mut catalog = Self::new();
        for (id, provider) in file.llm_providers.unwrap_or_default() {
            let settings = provider.settings(&id)?;
            let budgets = Budgets {
                chunk_tokens: provider.chunk_tokens.unwrap_or(session.chunk_tokens),
                memory_tokens: provider.memory_tokens.unwrap_or(session.memory_tokens),
            };
            let factory = registry.factory(&id, &settings);
            info!(
                provider = %id,
                api = %settings.api,
                models = provider.models.len(),
                "Registered provider"
            );
            catalog = catalog.with_provider(id, provider.models, budgets, factory);
        }

        if catalog.is_empty() {
            warn!(path = %path.display(), "Provider catalog is empty");
        }
        Ok(catalog)
    }

    /// Add or replace a provider.
    #[must_use]
    pub fn with_provider(
        mut self,
        id: impl Into<String>,
        models: Vec<String>,
        budgets: Budgets,
        factory: ClientFactory,
    ) -> Self {
        let id = id.into();
        self.providers.insert(
            id.clone(),
            CatalogEntry {
                id,
                models,
                budgets,
                factory,
            },
        );
        self
    }

    pub fn list_providers(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn list_models(&self, provider: &str) -> Result<&[String], CatalogError> {
        Ok(&self.entry(provider)?.models)
    }

    pub fn get_factory(&self, provider: &str) -> Result<ClientFactory, CatalogError> {
        Ok(self.entry(provider)?.factory.clone())
    }

    pub fn budgets(&self, provider: &str) -> Result<Budgets, CatalogError> {
        Ok(self.entry(provider)?.budgets)
    }

    /// Find the entry for a binding, checking that the model is listed.
    pub fn resolve(&self, binding: &ModelRef) -> Result<&CatalogEntry, CatalogError> {
        let entry = self.entry(&binding.provider)?;
        if !entry.has_model(&binding.model) {
            return Err(CatalogError::ModelNotFound {
                provider: binding.provider.clone(),
                model: binding.model.clone(),
            });
        }
        Ok(entry)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn entry(&self, provider: &str) -> Result<&CatalogEntry, CatalogError> {
        self.providers
            .get(provider)
            .ok_or_else(|| CatalogError::ProviderNotFound(provider.to_string()))
    }
}

// ============================================================================
// File format
// ============================================================================

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    llm_providers: Option<IndexMap<String, ProviderFile>>,
}

#[derive(Debug, Deserialize)]
struct ProviderFile {
    #[serde(default)]
    models: Vec<String>,
    #[serde(default)]
    api: Option<ApiKind>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    api_key_env: Option<String>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    chunk_tokens: Option<usize>,
    #[serde(default)]
    memory_tokens: Option<usize>,
}

impl ProviderFile {
    fn settings(&self, id: &str) -> Result<ProviderSettings, ConfigError> {
        if let Some(reason) = defaults::unsupported(id) {
            return Err(ConfigError::Catalog(format!(
                "provider '{id}' is not supported: {reason}"
            )));
        }

        let base_url = match (&self.base_url, defaults::base_url(id)) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Some(url)) => url.to_string(),
            (None, None) => {
                return Err(ConfigError::Catalog(format!(
                    "provider '{id}' has no default endpoint; set base_url"
                )));
            }
        };

        Ok(ProviderSettings {
            api: self.api.unwrap_or_else(|| ApiKind::for_provider(id)),
            base_url,
            api_key_env: self
                .api_key_env
                .clone()
                .or_else(|| defaults::api_key_env(id)),
            max_tokens: self.max_tokens.unwrap_or(defaults::MAX_TOKENS),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::llm::{LLMError, UpstreamClient};

    fn yaml(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    async fn load(contents: &str) -> Result<ProviderCatalog, ConfigError> {
        let file = yaml(contents);
        ProviderCatalog::load(file.path(), SessionConfig::default(), &ProviderRegistry::new()).await
    }

    fn unavailable() -> ClientFactory {
        Arc::new(|_: &str| -> Result<Box<dyn UpstreamClient>, LLMError> {
            Err(LLMError::EmptyResponse)
        })
    }

    #[tokio::test]
    async fn load_keeps_declaration_order_and_models() {
        let catalog = load(
            r#"
llm_providers:
  ollama:
    models: [llama3, mistral]
  groq:
    models: [llama-3.1-8b-instant]
  anthropic:
    models: [claude-sonnet-4-5]
"#,
        )
        .await
        .unwrap();

        assert_eq!(catalog.list_providers(), vec!["ollama", "groq", "anthropic"]);
        assert_eq!(catalog.list_models("ollama").unwrap(), ["llama3", "mistral"]);
    }

    #[tokio::test]
    async fn budgets_fall_back_to_session_defaults() {
        let catalog = load(
            r#"
llm_providers:
  ollama:
    models: [llama3]
    chunk_tokens: 256
  openai:
    models: [gpt-4o]
    memory_tokens: 1000
"#,
        )
        .await
        .unwrap();

        assert_eq!(
            catalog.budgets("ollama").unwrap(),
            Budgets {
                chunk_tokens: 256,
                memory_tokens: 65536
            }
        );
        assert_eq!(
            catalog.budgets("openai").unwrap(),
            Budgets {
                chunk_tokens: 2048,
                memory_tokens: 1000
            }
        );
    }

    #[tokio::test]
    async fn bedrock_is_rejected_even_with_base_url() {
        let err = load(
            r#"
llm_providers:
  aws:
    base_url: https://bedrock-runtime.us-east-1.amazonaws.com
    models: [anthropic.claude-v2]
"#,
        )
        .await
        .err()
        .unwrap();
        assert!(
            matches!(err, ConfigError::Catalog(msg) if msg.contains("not supported") && !msg.contains("set base_url"))
        );
    }

    #[tokio::test]
    async fn unknown_provider_needs_base_url() {
        let err = load(
            r#"
llm_providers:
  mystery:
    models: [m1]
"#,
        )
        .await
        .err()
        .unwrap();
        assert!(
            matches!(err, ConfigError::Catalog(msg) if msg.contains("mystery") && msg.contains("base_url"))
        );

        let catalog = load(
            r#"
llm_providers:
  local:
    api: openai
    base_url: http://localhost:8000/v1/
    models: [qwen]
"#,
        )
        .await
        .unwrap();
        assert_eq!(catalog.list_providers(), vec!["local"]);
    }

    #[tokio::test]
    async fn missing_catalog_is_a_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = ProviderCatalog::load(
            dir.path().join("absent.yaml"),
            SessionConfig::default(),
            &ProviderRegistry::new(),
        )
        .await;
        assert!(matches!(result, Err(ConfigError::CatalogIo { .. })));
    }

    #[tokio::test]
    async fn invalid_catalog_yaml_is_a_config_error() {
        let result = load("llm_providers: [unterminated").await;
        assert!(matches!(result, Err(ConfigError::CatalogYaml { .. })));

        let result = load("llm_providers:\n  openai:\n    api: bedrock\n").await;
        assert!(matches!(result, Err(ConfigError::CatalogYaml { .. })));
    }

    #[tokio::test]
    async fn empty_catalog_is_allowed() {
        let catalog = load("llm_providers:\n").await.unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn lookups_report_what_is_missing() {
        let budgets = Budgets::from(SessionConfig::default());
        let catalog = ProviderCatalog::new().with_provider(
            "demo",
            vec!["m1".to_string()],
            budgets,
            unavailable(),
        );

        assert!(catalog.get_factory("demo").is_ok());
        assert!(catalog.resolve(&ModelRef::new("demo", "m1")).is_ok());
        assert_eq!(
            catalog.list_models("nope").unwrap_err(),
            CatalogError::ProviderNotFound("nope".to_string())
        );
        assert_eq!(
            catalog.resolve(&ModelRef::new("demo", "m2")).err().unwrap(),
            CatalogError::ModelNotFound {
                provider: "demo".to_string(),
                model: "m2".to_string()
            }
        );
        assert_eq!(
            catalog.get_factory("nope").err().unwrap().to_string(),
            "Provider nope not found"
        );
    }
}
