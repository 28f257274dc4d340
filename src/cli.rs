use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing::Level;

use crate::config::Config;
use crate::error::Result;
use crate::provider::{ClientOverrides, ProviderKind};
use crate::translate::{FuzzyMode, TranslationFlags};

#[derive(Parser, Debug)]
#[command(author, version, about = "Translate gettext PO catalogs with LLM providers", long_about = None)]
pub struct Args {
    /// Folder scanned recursively for .po files
    #[arg(long, required_unless_present = "list_models")]
    pub folder: Option<PathBuf>,

    /// Target language codes (comma-separated); detected from the catalogs when omitted
    #[arg(short = 'l', long = "lang", value_delimiter = ',')]
    pub languages: Vec<String>,

    /// Language names used in prompts, paired with --lang by position
    #[arg(long = "detail-lang", value_delimiter = ',')]
    pub detail_languages: Vec<String>,

    /// Provider: openai, anthropic, deepseek, azure_openai or ollama
    #[arg(long)]
    pub provider: Option<ProviderKind>,

    /// Model id; validated against the provider's model list
    #[arg(long)]
    pub model: Option<String>,

    /// Print the models of the selected provider and exit
    #[arg(long)]
    pub list_models: bool,

    /// API key for the selected provider
    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long)]
    pub openai_key: Option<String>,

    #[arg(long)]
    pub anthropic_key: Option<String>,

    #[arg(long)]
    pub deepseek_key: Option<String>,

    #[arg(long)]
    pub azure_openai_key: Option<String>,

    #[arg(long)]
    pub azure_openai_endpoint: Option<String>,

    #[arg(long)]
    pub azure_openai_api_version: Option<String>,

    #[arg(long)]
    pub ollama_base_url: Option<String>,

    /// Ollama request timeout in seconds
    #[arg(long)]
    pub ollama_timeout: Option<u64>,

    /// Translate entries in batches
    #[arg(long)]
    pub bulk: bool,

    /// Entries per batch in bulk mode
    #[arg(long = "bulksize")]
    pub bulk_size: Option<usize>,

    /// Deprecated: remove every fuzzy flag before translating
    #[arg(long, conflicts_with = "fix_fuzzy")]
    pub fuzzy: bool,

    /// Re-translate fuzzy entries and clear their flag
    #[arg(long)]
    pub fix_fuzzy: bool,

    /// Infer each catalog's language from its folder path
    #[arg(long)]
    pub folder_language: bool,

    /// Do not tag translated entries as AI-generated
    #[arg(long)]
    pub no_ai_comment: bool,

    /// Context for entries without msgctxt
    #[arg(long)]
    pub default_context: Option<String>,

    /// Do not read .gitignore files while scanning
    #[arg(long)]
    pub no_gitignore: bool,

    /// More output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also write logs to a daily rotated file in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Skip the slow mode countdown
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl Args {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    }

    pub fn client_overrides(&self) -> ClientOverrides {
        ClientOverrides {
            provider: self.provider,
            api_key: self.api_key.clone(),
            openai_key: self.openai_key.clone(),
            anthropic_key: self.anthropic_key.clone(),
            deepseek_key: self.deepseek_key.clone(),
            azure_openai_key: self.azure_openai_key.clone(),
            azure_openai_endpoint: self.azure_openai_endpoint.clone(),
            azure_openai_api_version: self.azure_openai_api_version.clone(),
            ollama_base_url: self.ollama_base_url.clone(),
            ollama_timeout: self.ollama_timeout,
            request_timeout: None,
        }
    }

    /// Layer command-line switches over the loaded configuration
    pub fn apply_to(&self, config: &mut Config) {
        let translation = &mut config.translation;
        if self.bulk {
            translation.bulk = true;
        }
        if let Some(size) = self.bulk_size {
            translation.batch_size = size;
        }
        if self.fix_fuzzy {
            translation.fix_fuzzy = true;
        }
        if self.folder_language {
            translation.folder_language = true;
        }
        if self.no_ai_comment {
            translation.mark_ai_generated = false;
        }
        if let Some(context) = &self.default_context {
            translation.default_context = Some(context.clone());
        }
        if self.no_gitignore {
            config.scan.respect_gitignore = false;
        }
    }

    pub fn translation_flags(&self, config: &Config) -> TranslationFlags {
        let mut flags = TranslationFlags::from_settings(&config.translation);
        if self.fuzzy {
            flags.fuzzy = FuzzyMode::Strip;
        }
        flags
    }

    /// Explicit provider, else the configured default
    pub fn requested_provider(&self, config: &Config) -> Result<Option<ProviderKind>> {
        match self.provider {
            Some(kind) => Ok(Some(kind)),
            None => config
                .providers
                .default_provider
                .as_deref()
                .map(str::parse)
                .transpose(),
        }
    }

    /// Explicit model, else the configured default for `kind`
    pub fn requested_model(&self, config: &Config, kind: ProviderKind) -> Option<String> {
        self.model
            .clone()
            .or_else(|| config.providers.default_models.get(kind.id()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("po-translate").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_folder_required_unless_listing_models() {
        assert!(Args::try_parse_from(["po-translate", "--lang", "fr"]).is_err());
        assert!(Args::try_parse_from(["po-translate", "--list-models", "--provider", "ollama"]).is_ok());
    }

    #[test]
    fn test_languages_and_details() {
        let args = parse(&["--folder", "locale", "-l", "fr,de", "--detail-lang", "French,German"]);
        assert_eq!(args.languages, vec!["fr", "de"]);
        assert_eq!(args.detail_languages, vec!["French", "German"]);
        assert_eq!(args.folder, Some(PathBuf::from("locale")));
    }

    #[test]
    fn test_provider_parsing() {
        let args = parse(&["--folder", ".", "--provider", "azure-openai"]);
        assert_eq!(args.provider, Some(ProviderKind::AzureOpenAi));
        assert!(Args::try_parse_from(["po-translate", "--folder", ".", "--provider", "bogus"]).is_err());
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(parse(&["--folder", "."]).log_level(), Level::WARN);
        assert_eq!(parse(&["--folder", ".", "-v"]).log_level(), Level::INFO);
        assert_eq!(parse(&["--folder", ".", "-vv"]).log_level(), Level::DEBUG);
        assert_eq!(parse(&["--folder", ".", "-q"]).log_level(), Level::ERROR);
    }

    #[test]
    fn test_fuzzy_flags_conflict() {
        assert!(Args::try_parse_from(["po-translate", "--folder", ".", "--fuzzy", "--fix-fuzzy"]).is_err());

        let args = parse(&["--folder", ".", "--fuzzy"]);
        assert_eq!(args.translation_flags(&Config::default()).fuzzy, FuzzyMode::Strip);
    }

    #[test]
    fn test_apply_to_config() {
        let args = parse(&[
            "--folder",
            ".",
            "--bulk",
            "--bulksize",
            "20",
            "--no-ai-comment",
            "--fix-fuzzy",
            "--no-gitignore",
            "--default-context",
            "web shop",
        ]);
        let mut config = Config::default();
        args.apply_to(&mut config);

        let flags = args.translation_flags(&config);
        assert!(flags.bulk);
        assert_eq!(flags.batch_size, 20);
        assert!(!flags.mark_ai_generated);
        assert_eq!(flags.fuzzy, FuzzyMode::Fix);
        assert_eq!(flags.default_context.as_deref(), Some("web shop"));
        assert!(!config.scan.respect_gitignore);
    }

    #[test]
    fn test_requested_provider_and_model_fall_back_to_config() {
        let mut config = Config::default();
        config.providers.default_provider = Some("anthropic".to_string());
        config
            .providers
            .default_models
            .insert("anthropic".to_string(), "claude-3-5-sonnet".to_string());

        let args = parse(&["--folder", "."]);
        assert_eq!(args.requested_provider(&config).unwrap(), Some(ProviderKind::Anthropic));
        assert_eq!(
            args.requested_model(&config, ProviderKind::Anthropic).as_deref(),
            Some("claude-3-5-sonnet")
        );

        let args = parse(&["--folder", ".", "--provider", "ollama", "--model", "mistral"]);
        assert_eq!(args.requested_provider(&config).unwrap(), Some(ProviderKind::Ollama));
        assert_eq!(args.requested_model(&config, ProviderKind::Ollama).as_deref(), Some("mistral"));
    }
}
