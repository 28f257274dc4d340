// Anthropic messages API provider

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::http::{decode, send, to_strings, ChatMessage, ModelList};
use super::{ApiCredentials, ModelTask, Provider, ProviderClients, ProviderKind};
use crate::error::{Result, TranslatorError};

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4000;
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const FALLBACK_MODELS: &[&str] = &[
    "claude-3-5-haiku-latest",
    "claude-3-5-sonnet-latest",
    "claude-3-opus-latest",
];

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl MessagesResponse {
    fn text(self) -> String {
        self.content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Default)]
pub struct AnthropicProvider;

impl AnthropicProvider {
    pub fn new() -> Self {
        Self
    }

    fn authorize(request: RequestBuilder, credentials: &ApiCredentials) -> RequestBuilder {
        request
            .header("x-api-key", &credentials.api_key)
            .header("anthropic-version", API_VERSION)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn get_models(&self, clients: &ProviderClients) -> Vec<String> {
        let Some(credentials) = &clients.anthropic else {
            return to_strings(FALLBACK_MODELS);
        };

        let request = Self::authorize(
            clients.http().get(format!("{}/v1/models", credentials.base_url)),
            credentials,
        );

        let listed = match send(self.kind(), request).await {
            Ok(response) => decode::<ModelList>(self.kind(), response).await,
            Err(e) => Err(e),
        };

        match listed {
            Ok(list) if !list.data.is_empty() => list.data.into_iter().map(|m| m.id).collect(),
            Ok(_) => to_strings(FALLBACK_MODELS),
            Err(e) => {
                warn!("Could not list Anthropic models, using defaults: {}", e);
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

    async fn is_client_initialized(&self, clients: &ProviderClients) -> bool {
        clients.anthropic.is_some()
    }

    async fn translate(&self, clients: &ProviderClients, model: &str, content: &str) -> Result<String> {
        let credentials = clients
            .anthropic
            .as_ref()
            .ok_or_else(|| TranslatorError::NotInitialized(self.kind().to_string()))?;

        let body = MessagesRequest {
            model,
            max_tokens: MAX_TOKENS,
            messages: vec![ChatMessage { role: "user", content }],
        };

        debug!("Sending Anthropic message with model {}", model);
        let request = Self::authorize(
            clients.http().post(format!("{}/v1/messages", credentials.base_url)),
            credentials,
        )
        .json(&body);

        let response = send(self.kind(), request).await?;
        let parsed: MessagesResponse = decode(self.kind(), response).await?;
        Ok(parsed.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_joins_text_blocks_only() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"Bon"},{"type":"tool_use","id":"x"},{"type":"text","text":"jour"}]}"#,
        )
        .unwrap();
        assert_eq!(response.text(), "Bonjour");
    }
}
