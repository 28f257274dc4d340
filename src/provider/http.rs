// Shared HTTP plumbing for the hosted providers

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ProviderKind;
use crate::error::{Result, TranslatorError};

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatReply,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub id: String,
}

/// Map a transport failure to the provider error taxonomy
pub fn transport_error(provider: ProviderKind, error: reqwest::Error) -> TranslatorError {
    if error.is_timeout() {
        TranslatorError::Timeout {
            provider: provider.to_string(),
            message: error.to_string(),
        }
    } else {
        TranslatorError::Provider {
            provider: provider.to_string(),
            message: format!("HTTP request failed: {}", error),
        }
    }
}

/// Send a request and turn non-success statuses into errors
pub async fn send(provider: ProviderKind, request: RequestBuilder) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("{}: {}", status, body.trim());
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TranslatorError::Authentication {
            provider: provider.to_string(),
            message,
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => TranslatorError::Timeout {
            provider: provider.to_string(),
            message,
        },
        _ => TranslatorError::Provider {
            provider: provider.to_string(),
            message,
        },
    })
}

/// Decode a JSON body, reporting decode failures as provider errors
pub async fn decode<T: for<'de> Deserialize<'de>>(provider: ProviderKind, response: Response) -> Result<T> {
    response.json().await.map_err(|e| TranslatorError::Provider {
        provider: provider.to_string(),
        message: format!("Failed to parse response: {}", e),
    })
}

/// Run an OpenAI-compatible chat completion. `request` carries URL and auth.
pub async fn chat_completion(
    provider: ProviderKind,
    request: RequestBuilder,
    model: &str,
    content: &str,
) -> Result<String> {
    let body = ChatRequest {
        model,
        messages: vec![ChatMessage { role: "user", content }],
    };

    debug!("Sending {} chat completion with model {}", provider, model);
    let response = send(provider, request.json(&body)).await?;
    let parsed: ChatResponse = decode(provider, response).await?;

    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default())
}

/// List model ids from an OpenAI-compatible `/models` endpoint
pub async fn list_model_ids(provider: ProviderKind, request: RequestBuilder) -> Result<Vec<String>> {
    let response = send(provider, request).await?;
    let parsed: ModelList = decode(provider, response).await?;
    Ok(parsed.data.into_iter().map(|m| m.id).collect())
}

pub fn to_strings(models: &[&str]) -> Vec<String> {
    models.iter().map(|m| m.to_string()).collect()
}
