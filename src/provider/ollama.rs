// Ollama local model server provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::http::{decode, send, to_strings};
use super::{ModelTask, Provider, ProviderClients, ProviderKind};
use crate::error::{Result, TranslatorError};

const DEFAULT_MODEL: &str = "llama3.2";
const FALLBACK_MODELS: &[&str] = &["llama3.2", "llama3.1", "llama3", "mistral", "gemma2", "qwen2.5"];

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Default)]
pub struct OllamaProvider;

impl OllamaProvider {
    pub fn new() -> Self {
        Self
    }

    async fn list_tags(&self, clients: &ProviderClients) -> Result<Vec<String>> {
        let request = clients
            .http()
            .get(format!("{}/api/tags", clients.ollama.base_url))
            .timeout(clients.ollama.timeout);
        let response = send(self.kind(), request).await?;
        let tags: TagList = decode(self.kind(), response).await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn get_models(&self, clients: &ProviderClients) -> Vec<String> {
        match self.list_tags(clients).await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => {
                warn!("Ollama has no local models; pull one with `ollama pull {}`", DEFAULT_MODEL);
                to_strings(FALLBACK_MODELS)
            }
            Err(e) => {
                warn!("Could not list Ollama models, using defaults: {}", e);
                to_strings(FALLBACK_MODELS)
            }
        }
    }

    fn get_default_model(&self) -> String {
        DEFAULT_MODEL.to_string()
    }

    fn get_preferred_models(&self, task: ModelTask) -> Vec<String> {
        match task {
            ModelTask::Translation => to_strings(FALLBACK_MODELS),
        }
    }

    /// Probes the server, since there are no credentials to check
    async fn is_client_initialized(&self, clients: &ProviderClients) -> bool {
        match self.list_tags(clients).await {
            Ok(_) => true,
            Err(e) => {
                debug!("Ollama probe at {} failed: {}", clients.ollama.base_url, e);
                false
            }
        }
    }

    async fn translate(&self, clients: &ProviderClients, model: &str, content: &str) -> Result<String> {
        let body = GenerateRequest {
            model,
            prompt: content,
            stream: false,
        };

        debug!("Sending Ollama generate request with model {}", model);
        let request = clients
            .http()
            .post(format!("{}/api/generate", clients.ollama.base_url))
            .timeout(clients.ollama.timeout)
            .json(&body);

        let response = send(self.kind(), request).await.map_err(|e| match e {
            TranslatorError::Timeout { provider, message } => TranslatorError::Timeout {
                provider,
                message: format!(
                    "{} (no answer within {}s, raise --ollama-timeout for slow models)",
                    message,
                    clients.ollama.timeout.as_secs()
                ),
            },
            other => other,
        })?;

        let generated: GenerateResponse = decode(self.kind(), response).await?;
        Ok(generated.response)
    }
}
