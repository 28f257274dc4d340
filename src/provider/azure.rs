// Azure OpenAI provider
//
// Models are deployments, which the data-plane API cannot enumerate, so
// `get_models` always returns the static list.

use async_trait::async_trait;

use super::http::{chat_completion, to_strings};
use super::{ModelTask, Provider, ProviderClients, ProviderKind};
use crate::error::{Result, TranslatorError};

const DEFAULT_MODEL: &str = "gpt-35-turbo";
const FALLBACK_MODELS: &[&str] = &["gpt-35-turbo", "gpt-4", "gpt-4o"];

#[derive(Debug, Default)]
pub struct AzureOpenAiProvider;

impl AzureOpenAiProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Provider for AzureOpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::AzureOpenAi
    }

    async fn get_models(&self, _clients: &ProviderClients) -> Vec<String> {
        to_strings(FALLBACK_MODELS)
    }

    fn get_default_model(&self) -> String {
        DEFAULT_MODEL.to_string()
    }

    fn get_preferred_models(&self, task: ModelTask) -> Vec<String> {
        match task {
            ModelTask::Translation => to_strings(FALLBACK_MODELS),
        }
    }

    async fn is_client_initialized(&self, clients: &ProviderClients) -> bool {
        clients.azure_openai.is_some()
    }

    async fn translate(&self, clients: &ProviderClients, model: &str, content: &str) -> Result<String> {
        let credentials = clients
            .azure_openai
            .as_ref()
            .ok_or_else(|| TranslatorError::NotInitialized(self.kind().to_string()))?;

        let request = clients
            .http()
            .post(format!(
                "{}/openai/deployments/{}/chat/completions",
                credentials.endpoint, model
            ))
            .query(&[("api-version", credentials.api_version.as_str())])
            .header("api-key", &credentials.api_key);

        chat_completion(self.kind(), request, model, content).await
    }
}
