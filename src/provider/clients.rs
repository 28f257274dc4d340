use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::ProviderKind;
use crate::config::ProviderSettings;
use crate::error::Result;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const AZURE_API_VERSION: &str = "2024-02-01";

const DEFAULT_OLLAMA_TIMEOUT_SECS: u64 = 120;

/// Key and base URL for a hosted provider
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct AzureCredentials {
    pub api_key: String,
    pub endpoint: String,
    pub api_version: String,
}

/// Local Ollama server; needs no key
#[derive(Debug, Clone)]
pub struct OllamaEndpoint {
    pub base_url: String,
    pub timeout: Duration,
}

/// Connection values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ClientOverrides {
    /// Target of the generic `--api-key` flag
    pub provider: Option<ProviderKind>,
    pub api_key: Option<String>,
    pub openai_key: Option<String>,
    pub anthropic_key: Option<String>,
    pub deepseek_key: Option<String>,
    pub azure_openai_key: Option<String>,
    pub azure_openai_endpoint: Option<String>,
    pub azure_openai_api_version: Option<String>,
    pub ollama_base_url: Option<String>,
    pub ollama_timeout: Option<u64>,
    pub request_timeout: Option<u64>,
}

/// Per-provider connection state, built once and shared read-only by every call
#[derive(Debug, Clone)]
pub struct ProviderClients {
    pub openai: Option<ApiCredentials>,
    pub anthropic: Option<ApiCredentials>,
    pub deepseek: Option<ApiCredentials>,
    pub azure_openai: Option<AzureCredentials>,
    pub ollama: OllamaEndpoint,
    http: Client,
}

/// First non-blank value, in priority order
fn first_set<const N: usize>(candidates: [Option<&str>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

impl ProviderClients {
    /// Resolve every provider with priority CLI > environment > config > default.
    ///
    /// `env` looks up environment variables; tests pass a closure instead of
    /// touching the process environment.
    pub fn resolve<F>(overrides: &ClientOverrides, settings: &ProviderSettings, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let generic_target = overrides.provider.unwrap_or(ProviderKind::OpenAi);
        let generic_key = |kind: ProviderKind| {
            if generic_target == kind {
                overrides.api_key.as_deref()
            } else {
                None
            }
        };

        let openai_env = env("OPENAI_API_KEY");
        let openai = first_set([
            overrides.openai_key.as_deref(),
            generic_key(ProviderKind::OpenAi),
            openai_env.as_deref(),
            settings.openai.api_key.as_deref(),
        ])
        .map(|api_key| ApiCredentials {
            api_key,
            base_url: trim_url(
                settings.openai.base_url.clone().unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            ),
        });

        let anthropic_env = env("ANTHROPIC_API_KEY");
        let anthropic = first_set([
            overrides.anthropic_key.as_deref(),
            generic_key(ProviderKind::Anthropic),
            anthropic_env.as_deref(),
            settings.anthropic.api_key.as_deref(),
        ])
        .map(|api_key| ApiCredentials {
            api_key,
            base_url: trim_url(
                settings.anthropic.base_url.clone().unwrap_or_else(|| ANTHROPIC_BASE_URL.to_string()),
            ),
        });

        let deepseek_env = env("DEEPSEEK_API_KEY");
        let deepseek = first_set([
            overrides.deepseek_key.as_deref(),
            generic_key(ProviderKind::DeepSeek),
            deepseek_env.as_deref(),
            settings.deepseek.api_key.as_deref(),
        ])
        .map(|api_key| ApiCredentials {
            api_key,
            base_url: trim_url(
                settings.deepseek.base_url.clone().unwrap_or_else(|| DEEPSEEK_BASE_URL.to_string()),
            ),
        });

        let azure_key_env = env("AZURE_OPENAI_API_KEY");
        let azure_endpoint_env = env("AZURE_OPENAI_ENDPOINT");
        let azure_version_env = env("AZURE_OPENAI_API_VERSION");
        let azure_key = first_set([
            overrides.azure_openai_key.as_deref(),
            generic_key(ProviderKind::AzureOpenAi),
            azure_key_env.as_deref(),
            settings.azure_openai.api_key.as_deref(),
        ]);
        let azure_endpoint = first_set([
            overrides.azure_openai_endpoint.as_deref(),
            azure_endpoint_env.as_deref(),
            settings.azure_openai.endpoint.as_deref(),
        ]);
        let azure_openai = match (azure_key, azure_endpoint) {
            (Some(api_key), Some(endpoint)) => Some(AzureCredentials {
                api_key,
                endpoint: trim_url(endpoint),
                api_version: first_set([
                    overrides.azure_openai_api_version.as_deref(),
                    azure_version_env.as_deref(),
                    settings.azure_openai.api_version.as_deref(),
                ])
                .unwrap_or_else(|| AZURE_API_VERSION.to_string()),
            }),
            (Some(_), None) => {
                debug!("Azure OpenAI key found without an endpoint, provider left unconfigured");
                None
            }
            _ => None,
        };

        let ollama_env = env("OLLAMA_BASE_URL");
        let ollama = OllamaEndpoint {
            base_url: trim_url(
                first_set([
                    overrides.ollama_base_url.as_deref(),
                    ollama_env.as_deref(),
                    settings.ollama.base_url.as_deref(),
                ])
                .unwrap_or_else(|| OLLAMA_BASE_URL.to_string()),
            ),
            timeout: Duration::from_secs(
                overrides
                    .ollama_timeout
                    .or(settings.ollama.timeout)
                    .unwrap_or(DEFAULT_OLLAMA_TIMEOUT_SECS),
            ),
        };

        let request_timeout = overrides
            .request_timeout
            .unwrap_or_else(|| settings.request_timeout());
        let http = Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .build()?;

        Ok(Self {
            openai,
            anthropic,
            deepseek,
            azure_openai,
            ollama,
            http,
        })
    }

    /// Resolve against the process environment
    pub fn from_environment(overrides: &ClientOverrides, settings: &ProviderSettings) -> Result<Self> {
        Self::resolve(overrides, settings, |key| std::env::var(key).ok())
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Whether credentials exist for `kind`; Ollama is always configured
    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::OpenAi => self.openai.is_some(),
            ProviderKind::Anthropic => self.anthropic.is_some(),
            ProviderKind::DeepSeek => self.deepseek.is_some(),
            ProviderKind::AzureOpenAi => self.azure_openai.is_some(),
            ProviderKind::Ollama => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointSettings, ProviderSettings};

    fn env_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_priority_cli_env_config() {
        let mut settings = ProviderSettings::default();
        settings.openai = EndpointSettings {
            api_key: Some("from-config".to_string()),
            base_url: Some("http://proxy.local/v1/".to_string()),
        };
        settings.anthropic.api_key = Some("anthropic-config".to_string());

        let overrides = ClientOverrides {
            openai_key: Some("from-cli".to_string()),
            ..Default::default()
        };
        let env = env_from(&[("OPENAI_API_KEY", "from-env"), ("ANTHROPIC_API_KEY", "anthropic-env")]);

        let clients = ProviderClients::resolve(&overrides, &settings, env).unwrap();
        let openai = clients.openai.unwrap();
        assert_eq!(openai.api_key, "from-cli");
        assert_eq!(openai.base_url, "http://proxy.local/v1");
        assert_eq!(clients.anthropic.unwrap().api_key, "anthropic-env");
        assert!(clients.deepseek.is_none());
    }

    #[test]
    fn test_generic_key_goes_to_selected_provider() {
        let overrides = ClientOverrides {
            provider: Some(ProviderKind::DeepSeek),
            api_key: Some("sk-generic".to_string()),
            ..Default::default()
        };
        let clients = ProviderClients::resolve(&overrides, &ProviderSettings::default(), |_| None).unwrap();
        assert!(clients.openai.is_none());
        assert_eq!(clients.deepseek.unwrap().api_key, "sk-generic");
    }

    #[test]
    fn test_azure_requires_endpoint() {
        let env = env_from(&[("AZURE_OPENAI_API_KEY", "az-key")]);
        let clients = ProviderClients::resolve(&ClientOverrides::default(), &ProviderSettings::default(), env).unwrap();
        assert!(!clients.is_configured(ProviderKind::AzureOpenAi));

        let env = env_from(&[
            ("AZURE_OPENAI_API_KEY", "az-key"),
            ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com/"),
        ]);
        let clients = ProviderClients::resolve(&ClientOverrides::default(), &ProviderSettings::default(), env).unwrap();
        let azure = clients.azure_openai.unwrap();
        assert_eq!(azure.endpoint, "https://example.openai.azure.com");
        assert_eq!(azure.api_version, AZURE_API_VERSION);
    }

    #[test]
    fn test_ollama_defaults_and_blank_values() {
        let overrides = ClientOverrides {
            ollama_base_url: Some("   ".to_string()),
            ..Default::default()
        };
        let clients = ProviderClients::resolve(&overrides, &ProviderSettings::default(), |_| None).unwrap();
        assert_eq!(clients.ollama.base_url, OLLAMA_BASE_URL);
        assert_eq!(clients.ollama.timeout, Duration::from_secs(120));
        assert!(clients.is_configured(ProviderKind::Ollama));
    }
}
