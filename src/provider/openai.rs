// OpenAI chat completions provider

use async_trait::async_trait;
use tracing::warn;

use super::http::{chat_completion, list_model_ids, to_strings};
use super::{ModelTask, Provider, ProviderClients, ProviderKind};
use crate::error::{Result, TranslatorError};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const FALLBACK_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-4-turbo", "gpt-4", "gpt-3.5-turbo"];
const PREFERRED_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-4"];

#[derive(Debug, Default)]
pub struct OpenAiProvider;

impl OpenAiProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn get_models(&self, clients: &ProviderClients) -> Vec<String> {
        let Some(credentials) = &clients.openai else {
            return to_strings(FALLBACK_MODELS);
        };

        let request = clients
            .http()
            .get(format!("{}/models", credentials.base_url))
            .bearer_auth(&credentials.api_key);

        match list_model_ids(self.kind(), request).await {
            Ok(mut models) if !models.is_empty() => {
                models.sort();
                models
            }
            Ok(_) => to_strings(FALLBACK_MODELS),
            Err(e) => {
                warn!("Could not list OpenAI models, using defaults: {}", e);
                to_strings(FALLBACK_MODELS)
            }
        }
    }

    fn get_default_model(&self) -> String {
        DEFAULT_MODEL.to_string()
    }

    fn get_preferred_models(&self, task: ModelTask) -> Vec<String> {
        match task {
            ModelTask::Translation => to_strings(PREFERRED_MODELS),
        }
    }

    async fn is_client_initialized(&self, clients: &ProviderClients) -> bool {
        clients.openai.is_some()
    }

    async fn translate(&self, clients: &ProviderClients, model: &str, content: &str) -> Result<String> {
        let credentials = clients
            .openai
            .as_ref()
            .ok_or_else(|| TranslatorError::NotInitialized(self.kind().to_string()))?;

        let request = clients
            .http()
            .post(format!("{}/chat/completions", credentials.base_url))
            .bearer_auth(&credentials.api_key);

        chat_completion(self.kind(), request, model, content).await
    }
}
