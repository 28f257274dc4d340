// Provider abstraction
//
// Each backend implements the `Provider` trait and is resolved by id through
// the `ProviderRegistry`:
// - OpenAI and DeepSeek: OpenAI-compatible chat completions
// - Anthropic: messages API
// - Azure OpenAI: deployment-scoped chat completions
// - Ollama: local generate API
//
// To add a backend:
// 1. Add a `ProviderKind` variant and its id
// 2. Add its connection state to `ProviderClients`
// 3. Implement `Provider` in a new module
// 4. Register it in `ProviderRegistry::with_builtin`

pub mod anthropic;
pub mod azure;
pub mod clients;
pub mod deepseek;
pub mod http;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub use clients::{ApiCredentials, AzureCredentials, ClientOverrides, OllamaEndpoint, ProviderClients};
use crate::error::{Result, TranslatorError};

/// Backends known to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    DeepSeek,
    AzureOpenAi,
    Ollama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::DeepSeek,
        ProviderKind::AzureOpenAi,
        ProviderKind::Ollama,
    ];

    /// Identifier used on the command line and in configuration files
    pub fn id(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::DeepSeek => "deepseek",
            Self::AzureOpenAi => "azure_openai",
            Self::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = TranslatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "deepseek" => Ok(Self::DeepSeek),
            "azure_openai" | "azure" => Ok(Self::AzureOpenAi),
            "ollama" => Ok(Self::Ollama),
            _ => Err(TranslatorError::Config(format!(
                "Unknown provider '{}'. Valid providers: openai, anthropic, deepseek, azure_openai, ollama",
                s
            ))),
        }
    }
}

/// Purpose a model is being chosen for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTask {
    Translation,
}

/// Uniform capability contract over the supported backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Discoverable model ids; falls back to a static list when discovery fails
    async fn get_models(&self, clients: &ProviderClients) -> Vec<String>;

    /// Model used when nothing else is known
    fn get_default_model(&self) -> String;

    /// Ranked hints for auto-selection
    fn get_preferred_models(&self, task: ModelTask) -> Vec<String>;

    /// Whether credentials are present, or for local servers whether the server answers
    async fn is_client_initialized(&self, clients: &ProviderClients) -> bool;

    /// One request/response round-trip returning the raw assistant text
    async fn translate(&self, clients: &ProviderClients, model: &str, content: &str) -> Result<String>;
}

pub type ProviderFactory = Box<dyn Fn() -> Arc<dyn Provider> + Send + Sync>;

/// Maps provider ids to lazily created, cached implementations
#[derive(Default)]
pub struct ProviderRegistry {
    factories: HashMap<ProviderKind, ProviderFactory>,
    instances: Mutex<HashMap<ProviderKind, Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in backend
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ProviderKind::OpenAi, || Arc::new(openai::OpenAiProvider::new()));
        registry.register(ProviderKind::Anthropic, || Arc::new(anthropic::AnthropicProvider::new()));
        registry.register(ProviderKind::DeepSeek, || Arc::new(deepseek::DeepSeekProvider::new()));
        registry.register(ProviderKind::AzureOpenAi, || Arc::new(azure::AzureOpenAiProvider::new()));
        registry.register(ProviderKind::Ollama, || Arc::new(ollama::OllamaProvider::new()));
        registry
    }

    /// Register a factory. Returns false and keeps the existing entry when
    /// `kind` is already registered.
    pub fn register<F>(&mut self, kind: ProviderKind, factory: F) -> bool
    where
        F: Fn() -> Arc<dyn Provider> + Send + Sync + 'static,
    {
        if self.factories.contains_key(&kind) {
            debug!("Provider {} already registered", kind);
            return false;
        }
        self.factories.insert(kind, Box::new(factory));
        true
    }

    pub fn is_registered(&self, kind: ProviderKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Registered kinds in their canonical order
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.is_registered(*kind))
            .collect()
    }

    /// Resolve a provider, creating it on first use
    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn Provider>> {
        let mut instances = self
            .instances
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(provider) = instances.get(&kind) {
            return Ok(Arc::clone(provider));
        }

        let factory = self.factories.get(&kind).ok_or_else(|| {
            TranslatorError::Config(format!("Provider {} is not registered", kind))
        })?;
        let provider = factory();
        instances.insert(kind, Arc::clone(&provider));
        Ok(provider)
    }
}

/// Pick the provider to use: the explicit choice, otherwise the first hosted
/// provider with credentials.
pub fn select_provider(requested: Option<ProviderKind>, clients: &ProviderClients) -> Result<ProviderKind> {
    if let Some(kind) = requested {
        return Ok(kind);
    }

    [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::DeepSeek,
        ProviderKind::AzureOpenAi,
    ]
    .into_iter()
    .find(|kind| clients.is_configured(*kind))
    .ok_or_else(|| {
        TranslatorError::Config(
            "No provider credentials found. Pass --provider with an API key, set OPENAI_API_KEY, ANTHROPIC_API_KEY, DEEPSEEK_API_KEY or AZURE_OPENAI_API_KEY, or use --provider ollama".to_string(),
        )
    })
}

/// Resolve the model for a run.
///
/// A requested model is kept when an available model id starts with it
/// (case-insensitive). Otherwise the first available preferred model wins,
/// then the first available model, then the provider default.
pub async fn select_model(
    provider: &dyn Provider,
    clients: &ProviderClients,
    requested: Option<&str>,
) -> String {
    let available = provider.get_models(clients).await;

    if let Some(requested) = requested.map(str::trim).filter(|m| !m.is_empty()) {
        let wanted = requested.to_lowercase();
        if available.iter().any(|m| m.to_lowercase().starts_with(&wanted)) {
            return requested.to_string();
        }
        warn!(
            "Model '{}' is not offered by {}, selecting one automatically",
            requested,
            provider.kind()
        );
    }

    let preferred = provider.get_preferred_models(ModelTask::Translation);
    let model = preferred
        .into_iter()
        .find(|m| available.contains(m))
        .or_else(|| available.first().cloned())
        .unwrap_or_else(|| provider.get_default_model());

    info!("Using {} model {}", provider.kind(), model);
    model
}
