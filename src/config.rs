use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, TranslatorError};

/// Dedicated project configuration file name
pub const CONFIG_FILE_NAME: &str = "po-translate.toml";
/// Table holding the configuration inside `pyproject.toml`
pub const PYPROJECT_TABLE: &str = "po-translate";

fn default_batch_size() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_secs() -> u64 {
    2
}

fn default_slow_mode_threshold() -> usize {
    30
}

fn default_countdown_secs() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    120
}

fn default_ignore_patterns() -> Vec<String> {
    [
        ".git/",
        ".venv/",
        "venv/",
        "env/",
        "node_modules/",
        "build/",
        "dist/",
        "__pycache__/",
        ".tox/",
        ".mypy_cache/",
        ".pytest_cache/",
        "*.egg-info/",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub translation: TranslationSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub providers: ProviderSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationSettings {
    /// Send entries in batches instead of one request per entry
    #[serde(default)]
    pub bulk: bool,
    /// Number of entries per bulk request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Tag translated entries with the provenance comment
    #[serde(default = "default_true")]
    pub mark_ai_generated: bool,
    /// Infer the catalog language from its folder path
    #[serde(default)]
    pub folder_language: bool,
    /// Translate fuzzy entries and clear their flag
    #[serde(default)]
    pub fix_fuzzy: bool,
    /// Context used for entries without msgctxt
    #[serde(default)]
    pub default_context: Option<String>,
    /// Draw progress bars on a terminal
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts per provider call, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Read .gitignore files below the scan root
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,
    /// Patterns that are always excluded
    #[serde(default = "default_ignore_patterns")]
    pub default_ignore_patterns: Vec<String>,
    /// Additional project-specific exclusions
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    /// Pending entries above which single mode triggers a warning
    #[serde(default = "default_slow_mode_threshold")]
    pub slow_mode_threshold: usize,
    /// Seconds to wait after the slow mode warning
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Provider used when none is given on the command line
    #[serde(default)]
    pub default_provider: Option<String>,
    /// Preferred model per provider id
    #[serde(default)]
    pub default_models: HashMap<String, String>,
    /// HTTP timeout for hosted providers, in seconds
    #[serde(default)]
    pub request_timeout: Option<u64>,
    #[serde(default)]
    pub openai: EndpointSettings,
    #[serde(default)]
    pub anthropic: EndpointSettings,
    #[serde(default)]
    pub deepseek: EndpointSettings,
    #[serde(default)]
    pub azure_openai: AzureSettings,
    #[serde(default)]
    pub ollama: OllamaSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureSettings {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OllamaSettings {
    pub base_url: Option<String>,
    pub timeout: Option<u64>,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            bulk: false,
            batch_size: default_batch_size(),
            mark_ai_generated: true,
            folder_language: false,
            fix_fuzzy: false,
            default_context: None,
            show_progress: true,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            default_ignore_patterns: default_ignore_patterns(),
            ignore_patterns: Vec::new(),
            slow_mode_threshold: default_slow_mode_threshold(),
            countdown_secs: default_countdown_secs(),
        }
    }
}

impl ProviderSettings {
    pub fn request_timeout(&self) -> u64 {
        self.request_timeout.unwrap_or_else(default_request_timeout)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslatorError::Config(format!("Failed to read config file: {}", e)))?;

        if path.file_name().is_some_and(|name| name == "pyproject.toml") {
            return Self::from_pyproject_str(&content)?.ok_or_else(|| {
                TranslatorError::Config(format!(
                    "{} has no [tool.{}] table",
                    path.display(),
                    PYPROJECT_TABLE
                ))
            });
        }

        toml::from_str(&content)
            .map_err(|e| TranslatorError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Read the `[tool.po-translate]` table, if the document has one
    pub fn from_pyproject_str(content: &str) -> Result<Option<Self>> {
        let document: toml::Value = toml::from_str(content)
            .map_err(|e| TranslatorError::Config(format!("Failed to parse pyproject.toml: {}", e)))?;

        match document.get("tool").and_then(|tool| tool.get(PYPROJECT_TABLE)) {
            Some(table) => {
                let config = table.clone().try_into().map_err(|e| {
                    TranslatorError::Config(format!("Invalid [tool.{}] table: {}", PYPROJECT_TABLE, e))
                })?;
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }

    /// Find the nearest project configuration at or above `start`.
    ///
    /// A dedicated `po-translate.toml` wins over `pyproject.toml` in the same
    /// directory. A `pyproject.toml` without our table is ignored.
    pub fn discover<P: AsRef<Path>>(start: P) -> Result<Option<(PathBuf, Self)>> {
        let start = start.as_ref();
        let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());

        for dir in start.ancestors() {
            let dedicated = dir.join(CONFIG_FILE_NAME);
            if dedicated.is_file() {
                debug!("Using configuration {}", dedicated.display());
                return Ok(Some((dedicated.clone(), Self::from_file(&dedicated)?)));
            }

            let pyproject = dir.join("pyproject.toml");
            if pyproject.is_file() {
                let content = std::fs::read_to_string(&pyproject)?;
                if let Some(config) = Self::from_pyproject_str(&content)? {
                    debug!("Using configuration {}", pyproject.display());
                    return Ok(Some((pyproject, config)));
                }
            }
        }

        Ok(None)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TranslatorError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslatorError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.translation.bulk);
        assert_eq!(config.translation.batch_size, 50);
        assert!(config.translation.mark_ai_generated);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_secs, 2);
        assert!(config.scan.respect_gitignore);
        assert!(config.scan.default_ignore_patterns.contains(&"node_modules/".to_string()));
        assert_eq!(config.providers.request_timeout(), 120);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [translation]
            bulk = true

            [providers.ollama]
            base_url = "http://gpu-box:11434"
            "#,
        )
        .unwrap();

        assert!(config.translation.bulk);
        assert_eq!(config.translation.batch_size, 50);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(
            config.providers.ollama.base_url.as_deref(),
            Some("http://gpu-box:11434")
        );
    }

    #[test]
    fn test_pyproject_table() {
        let content = r#"
            [project]
            name = "demo"

            [tool.po-translate]
            [tool.po-translate.translation]
            batch_size = 20
            folder_language = true
        "#;
        let config = Config::from_pyproject_str(content).unwrap().unwrap();
        assert_eq!(config.translation.batch_size, 20);
        assert!(config.translation.folder_language);

        assert!(Config::from_pyproject_str("[project]\nname = \"x\"\n").unwrap().is_none());
    }

    #[test]
    fn test_discover_prefers_dedicated_file() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("locales").join("fr");
        std::fs::create_dir_all(&nested).unwrap();

        std::fs::write(
            root.path().join("pyproject.toml"),
            "[tool.po-translate.translation]\nbatch_size = 7\n",
        )
        .unwrap();
        let (path, config) = Config::discover(&nested).unwrap().unwrap();
        assert!(path.ends_with("pyproject.toml"));
        assert_eq!(config.translation.batch_size, 7);

        std::fs::write(
            root.path().join(CONFIG_FILE_NAME),
            "[translation]\nbatch_size = 9\n",
        )
        .unwrap();
        let (path, config) = Config::discover(&nested).unwrap().unwrap();
        assert!(path.ends_with(CONFIG_FILE_NAME));
        assert_eq!(config.translation.batch_size, 9);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = Config::default();
        config.translation.default_context = Some("Web UI".to_string());
        config
            .providers
            .default_models
            .insert("openai".to_string(), "gpt-4o".to_string());
        config.save_to_file(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.translation.default_context.as_deref(), Some("Web UI"));
        assert_eq!(reloaded.providers.default_models["openai"], "gpt-4o");
    }
}
