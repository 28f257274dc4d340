use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use super::prompt::{self, CONNECTION_CHECK_PROMPT};
use super::repair::parse_bulk_response;
use super::validate::{is_explanation, is_valid_translation, restore_whitespace, split_edges};
use super::{FuzzyMode, RetryPolicy, TranslationConfig, TranslationRequest, WorkItem};
use crate::catalog::PoDocument;
use crate::error::{Result, TranslatorError};
use crate::interrupt::Interrupt;
use crate::language::{display_name, resolve_file_language};
use crate::provider::{Provider, ProviderClients};

const MIN_SAVE_INTERVAL: usize = 10;

/// Outcome of processing one catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    /// Matched target language; `None` when the file was skipped
    pub language: Option<String>,
    pub pending_before: usize,
    pub pending_after: usize,
    pub translated: usize,
    pub failed: usize,
}

impl FileReport {
    fn skipped(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            ..Default::default()
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.language.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    translated: usize,
    failed: usize,
}

/// Entries between incremental saves in single mode
pub fn save_interval(total: usize) -> usize {
    MIN_SAVE_INTERVAL.max(total / 10)
}

fn is_retryable(error: &TranslatorError) -> bool {
    !matches!(
        error,
        TranslatorError::Authentication { .. } | TranslatorError::NotInitialized(_) | TranslatorError::Config(_)
    )
}

/// Drives one provider over catalogs, one entry or batch at a time
pub struct TranslationService {
    provider: Arc<dyn Provider>,
    clients: Arc<ProviderClients>,
    config: TranslationConfig,
    retry: RetryPolicy,
    interrupt: Interrupt,
}

impl TranslationService {
    pub fn new(
        provider: Arc<dyn Provider>,
        clients: Arc<ProviderClients>,
        config: TranslationConfig,
        retry: RetryPolicy,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            provider,
            clients,
            config,
            retry,
            interrupt,
        }
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    /// Send one minimal request; any error or an empty answer is fatal
    pub async fn validate_connection(&self) -> Result<()> {
        info!(
            "Checking connection to {} with model {}",
            self.config.provider, self.config.model
        );

        match self.call_with_retry(CONNECTION_CHECK_PROMPT).await {
            Ok(reply) if !reply.trim().is_empty() => {
                debug!("Connection check answered: {}", reply.trim());
                Ok(())
            }
            Ok(_) => Err(TranslatorError::ConnectionValidation(format!(
                "{} returned an empty response for model {}",
                self.config.provider, self.config.model
            ))),
            Err(e) => Err(TranslatorError::ConnectionValidation(e.to_string())),
        }
    }

    /// Entries this run works on: fuzzy ones in fix mode, untranslated otherwise
    pub fn pending_indices(&self, document: &PoDocument) -> Vec<usize> {
        match self.config.flags.fuzzy {
            FuzzyMode::Fix => document.fuzzy_indices(),
            FuzzyMode::Keep | FuzzyMode::Strip => document.untranslated_indices(),
        }
    }

    /// Translate one catalog in place.
    ///
    /// Progress is saved incrementally. On interrupt everything completed so
    /// far is saved and `TranslatorError::Interrupted` is returned.
    pub async fn process_file(
        &self,
        path: &Path,
        languages: &[String],
        details: &HashMap<String, String>,
    ) -> Result<FileReport> {
        let mut document = PoDocument::load(path)?;
        let flags = &self.config.flags;

        let Some(language) =
            resolve_file_language(path, document.language(), languages, flags.folder_language)
        else {
            info!(
                "Skipping {}: language {} was not requested",
                path.display(),
                document.language().unwrap_or("(none)")
            );
            return Ok(FileReport::skipped(path));
        };

        let pending = self.pending_indices(&document);
        let mut report = FileReport {
            path: path.to_path_buf(),
            language: Some(language.clone()),
            pending_before: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            debug!("Nothing to translate in {}", path.display());
            return Ok(report);
        }

        let request = TranslationRequest::build(
            &document,
            &language,
            details.get(&language).cloned(),
            &pending,
            flags.default_context.as_deref(),
        );
        info!(
            "Translating {} entries in {} to {} ({} mode)",
            request.items.len(),
            path.display(),
            language,
            if flags.bulk { "bulk" } else { "single" }
        );

        let progress = if flags.bulk {
            self.process_bulk(&mut document, &request).await?
        } else {
            self.process_single(&mut document, &request).await?
        };

        document.save()?;
        report.translated = progress.translated;
        report.failed = progress.failed;
        report.pending_after = self.pending_indices(&document).len();

        info!(
            "Finished {}: {} translated, {} failed, {} still pending",
            path.display(),
            report.translated,
            report.failed,
            report.pending_after
        );
        Ok(report)
    }

    async fn process_single(&self, document: &mut PoDocument, request: &TranslationRequest) -> Result<Progress> {
        let target = display_name(&request.language, request.detail.as_deref());
        let total = request.items.len();
        let interval = save_interval(total);
        let bar = self.progress_bar(total, &request.path);
        let mut progress = Progress::default();

        for (position, item) in request.items.iter().enumerate() {
            self.check_interrupt(document, &progress, &bar)?;

            let translations = self.translate_item(item, &target).await;
            self.apply(document, item, translations, &mut progress);
            bar.inc(1);

            if (position + 1) % interval == 0 || position + 1 == total {
                document.save()?;
                debug!("Saved progress after {}/{} entries", position + 1, total);
            }
        }

        bar.finish_and_clear();
        Ok(progress)
    }

    async fn process_bulk(&self, document: &mut PoDocument, request: &TranslationRequest) -> Result<Progress> {
        let target = display_name(&request.language, request.detail.as_deref());
        let batch_size = self.config.flags.batch_size.max(1);
        let batches = request.items.len().div_ceil(batch_size);
        let bar = self.progress_bar(request.items.len(), &request.path);
        let mut progress = Progress::default();

        for (number, chunk) in request.items.chunks(batch_size).enumerate() {
            self.check_interrupt(document, &progress, &bar)?;
            debug!("Batch {}/{} with {} entries", number + 1, batches, chunk.len());

            match self.translate_chunk(chunk, &target).await {
                Ok(results) => {
                    for (item, translations) in chunk.iter().zip(results) {
                        self.apply(document, item, translations, &mut progress);
                    }
                }
                Err(e) => {
                    warn!(
                        "Batch {}/{} failed ({}), translating its {} entries one by one",
                        number + 1,
                        batches,
                        e,
                        chunk.len()
                    );
                    for item in chunk {
                        self.check_interrupt(document, &progress, &bar)?;
                        let translations = self.translate_item(item, &target).await;
                        self.apply(document, item, translations, &mut progress);
                    }
                }
            }

            bar.inc(chunk.len() as u64);
            document.save()?;
            debug!("Saved progress after batch {}/{}", number + 1, batches);
        }

        bar.finish_and_clear();
        Ok(progress)
    }

    fn check_interrupt(&self, document: &PoDocument, progress: &Progress, bar: &ProgressBar) -> Result<()> {
        if !self.interrupt.is_triggered() {
            return Ok(());
        }

        bar.abandon();
        document.save()?;
        warn!(
            "Interrupted: saved {} translations to {}",
            progress.translated,
            document.path().display()
        );
        Err(TranslatorError::Interrupted {
            saved: progress.translated,
        })
    }

    /// Store a complete translation; partial results leave the entry untouched
    fn apply(&self, document: &mut PoDocument, item: &WorkItem, translations: Vec<String>, progress: &mut Progress) {
        let flags = &self.config.flags;
        let complete = translations.len() == item.sources.len()
            && translations.iter().all(|t| !t.trim().is_empty());

        if complete
            && document.apply_translation(
                item.index,
                &translations,
                flags.mark_ai_generated,
                flags.fuzzy == FuzzyMode::Fix,
            )
        {
            progress.translated += 1;
        } else {
            debug!("Entry {} left untranslated", item.index);
            progress.failed += 1;
        }
    }

    async fn translate_item(&self, item: &WorkItem, target: &str) -> Vec<String> {
        let mut translations = Vec::with_capacity(item.sources.len());
        for source in &item.sources {
            let translated = self.translate_text(source, item.context.as_deref(), target).await;
            let failed = translated.is_empty();
            translations.push(translated);
            if failed {
                break;
            }
        }
        translations
    }

    /// Single-mode translation of one string; empty on failure
    async fn translate_text(&self, source: &str, context: Option<&str>, target: &str) -> String {
        let (_, core, _) = split_edges(source);
        if core.is_empty() {
            return source.to_string();
        }

        let raw = match self.call_with_retry(&prompt::single_prompt(core, target, context)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Giving up on {:?}: {}", core, e);
                return String::new();
            }
        };

        if raw.trim().is_empty() {
            debug!("Empty translation for {:?}, retrying with a plain prompt", core);
            return match self.call_with_retry(&prompt::plain_retry_prompt(core, target)).await {
                Ok(retry) if is_explanation(&retry) => {
                    warn!(
                        "Answer {:?} for {:?} is not a translation, leaving it untranslated",
                        retry.trim(),
                        core
                    );
                    String::new()
                }
                Ok(retry) => restore_whitespace(source, &retry),
                Err(e) => {
                    warn!("Giving up on {:?}: {}", core, e);
                    String::new()
                }
            };
        }

        self.validated(source, core, &raw, context, target).await
    }

    /// Accept `raw` if it validates, otherwise re-prompt once; empty when both fail
    async fn validated(&self, source: &str, core: &str, raw: &str, context: Option<&str>, target: &str) -> String {
        if is_valid_translation(core, raw) {
            return restore_whitespace(source, raw);
        }

        warn!(
            "Rejected answer {:?} for {:?}, retrying with a stricter prompt",
            raw.trim(),
            core
        );
        match self
            .call_with_retry(&prompt::concise_retry_prompt(core, target, context))
            .await
        {
            Ok(retry) if is_valid_translation(core, &retry) => restore_whitespace(source, &retry),
            Ok(retry) => {
                warn!(
                    "Answer {:?} for {:?} still failed validation, leaving it untranslated",
                    retry.trim(),
                    core
                );
                String::new()
            }
            Err(e) => {
                warn!("Giving up on {:?}: {}", core, e);
                String::new()
            }
        }
    }

    /// One bulk request for a chunk. Plural entries contribute two strings.
    /// Errors mean the whole chunk failed; an empty element only fails its entry.
    async fn translate_chunk(&self, chunk: &[WorkItem], target: &str) -> Result<Vec<Vec<String>>> {
        let mut texts: Vec<String> = Vec::new();
        let mut slots: Vec<Vec<Option<usize>>> = Vec::with_capacity(chunk.len());
        for item in chunk {
            let item_slots = item
                .sources
                .iter()
                .map(|source| {
                    let (_, core, _) = split_edges(source);
                    if core.is_empty() {
                        None
                    } else {
                        texts.push(core.to_string());
                        Some(texts.len() - 1)
                    }
                })
                .collect();
            slots.push(item_slots);
        }

        let mut answers = if texts.is_empty() {
            Vec::new()
        } else {
            let context = prompt::dominant_context(chunk.iter().map(|item| item.context.as_deref()));
            let bulk = prompt::bulk_prompt(&texts, target, context.as_deref())?;
            let expected = texts.len();
            self.request_with_retry(&bulk, |raw| parse_bulk_response(&raw, expected))
                .await?
        };

        let mut results = Vec::with_capacity(chunk.len());
        for (item, item_slots) in chunk.iter().zip(slots) {
            let mut translations = Vec::with_capacity(item.sources.len());
            for (source, slot) in item.sources.iter().zip(item_slots) {
                let translated = match slot {
                    None => source.clone(),
                    Some(i) => {
                        let raw = std::mem::take(&mut answers[i]);
                        if raw.trim().is_empty() {
                            String::new()
                        } else {
                            self.validated(source, &texts[i], &raw, item.context.as_deref(), target)
                                .await
                        }
                    }
                };
                translations.push(translated);
            }
            results.push(translations);
        }

        Ok(results)
    }

    async fn call_with_retry(&self, prompt: &str) -> Result<String> {
        self.request_with_retry(prompt, Ok).await
    }

    /// Call the provider and parse the answer, retrying both with a fixed delay
    async fn request_with_retry<T, F>(&self, prompt: &str, parse: F) -> Result<T>
    where
        F: Fn(String) -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            let outcome = match self
                .provider
                .translate(&self.clients, &self.config.model, prompt)
                .await
            {
                Ok(raw) => parse(raw),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retry.max_attempts && is_retryable(&e) => {
                    warn!(
                        "Attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, self.retry.max_attempts, e, self.retry.delay
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn progress_bar(&self, len: usize, path: &Path) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        bar
    }
}
