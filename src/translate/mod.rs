// Translation orchestration
//
// - prompt: prompt templates for single, bulk and retry requests
// - validate: single-item validation and whitespace preservation
// - repair: bulk JSON parsing with a cascading repair ladder
// - service: per-file state machine driving the provider

pub mod prompt;
pub mod repair;
pub mod service;
pub mod validate;

use std::path::PathBuf;
use std::time::Duration;

pub use service::{FileReport, TranslationService};
use crate::catalog::PoDocument;
use crate::config::{RetrySettings, TranslationSettings};
use crate::provider::ProviderKind;

/// How fuzzy entries are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FuzzyMode {
    /// Fuzzy entries count as translated and are left alone
    #[default]
    Keep,
    /// Remove every fuzzy marker before processing (destructive)
    Strip,
    /// Translate fuzzy entries and clear their flag
    Fix,
}

/// Behavior switches for a run
#[derive(Debug, Clone)]
pub struct TranslationFlags {
    pub bulk: bool,
    pub batch_size: usize,
    pub fuzzy: FuzzyMode,
    pub folder_language: bool,
    pub mark_ai_generated: bool,
    pub default_context: Option<String>,
}

impl TranslationFlags {
    pub fn from_settings(settings: &TranslationSettings) -> Self {
        Self {
            bulk: settings.bulk,
            batch_size: settings.batch_size.max(1),
            fuzzy: if settings.fix_fuzzy { FuzzyMode::Fix } else { FuzzyMode::Keep },
            folder_language: settings.folder_language,
            mark_ai_generated: settings.mark_ai_generated,
            default_context: settings.default_context.clone(),
        }
    }
}

/// Provider, model and flags, fixed before processing starts
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub flags: TranslationFlags,
    pub show_progress: bool,
}

/// Bounded retry with a fixed delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            delay: Duration::from_secs(settings.delay_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

/// One entry to translate: its index in the catalog, the source strings
/// (`msgid`, plus `msgid_plural` for plural entries) and its context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub index: usize,
    pub sources: Vec<String>,
    pub context: Option<String>,
}

/// Work for one file in one pass
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub path: PathBuf,
    pub language: String,
    pub detail: Option<String>,
    pub items: Vec<WorkItem>,
}

/// Explicit msgctxt wins, then a non-blank default context
pub fn resolve_context(msgctxt: Option<&str>, default_context: Option<&str>) -> Option<String> {
    msgctxt
        .filter(|c| !c.is_empty())
        .or_else(|| default_context.filter(|c| !c.trim().is_empty()))
        .map(str::to_string)
}

impl TranslationRequest {
    pub fn build(
        document: &PoDocument,
        language: &str,
        detail: Option<String>,
        indices: &[usize],
        default_context: Option<&str>,
    ) -> Self {
        let items = indices
            .iter()
            .filter_map(|&index| {
                let entry = document.entry(index)?;
                let context = resolve_context(entry.msgctxt.as_deref(), default_context);
                let mut sources = vec![entry.msgid];
                sources.extend(entry.msgid_plural);
                Some(WorkItem {
                    index,
                    sources,
                    context,
                })
            })
            .collect();

        Self {
            path: document.path().to_path_buf(),
            language: language.to_string(),
            detail,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_context() {
        assert_eq!(resolve_context(Some("menu"), Some("web")).as_deref(), Some("menu"));
        assert_eq!(resolve_context(None, Some("web")).as_deref(), Some("web"));
        assert_eq!(resolve_context(Some(""), Some("web")).as_deref(), Some("web"));
        assert_eq!(resolve_context(None, Some("  ")), None);
        assert_eq!(resolve_context(None, None), None);
    }

    #[test]
    fn test_flags_from_settings() {
        let mut settings = TranslationSettings::default();
        settings.fix_fuzzy = true;
        settings.batch_size = 0;
        let flags = TranslationFlags::from_settings(&settings);
        assert_eq!(flags.fuzzy, FuzzyMode::Fix);
        assert_eq!(flags.batch_size, 1);
    }
}
