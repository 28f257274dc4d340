#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use po_translate::config::ProviderSettings;
use po_translate::error::Result;
use po_translate::interrupt::Interrupt;
use po_translate::provider::{ClientOverrides, ModelTask, Provider, ProviderClients, ProviderKind};
use po_translate::translate::prompt::BULK_TEXTS_MARKER;
use po_translate::translate::{FuzzyMode, RetryPolicy, TranslationConfig, TranslationFlags, TranslationService};

pub const HEADER: &str = r#"# Translations for the demo application.
# Copyright (C) 2024 Demo Authors
# This file is distributed under the same license as the demo package.
#
msgid ""
msgstr ""
"Project-Id-Version: demo 1.0\n"
"Report-Msgid-Bugs-To: bugs@demo.example\n"
"POT-Creation-Date: 2024-01-10 09:00+0000\n"
"PO-Revision-Date: 2024-01-11 09:00+0000\n"
"Last-Translator: Demo Translator <i18n@demo.example>\n"
"Language-Team: {lang} <i18n@demo.example>\n"
"Language: {lang}\n"
"MIME-Version: 1.0\n"
"Content-Type: text/plain; charset=UTF-8\n"
"Content-Transfer-Encoding: 8bit\n"
"Plural-Forms: nplurals=2; plural=(n != 1);\n"
"X-Generator: Poedit 3.4\n"

"#;

/// Catalog text with a full header and the given (msgid, msgstr) pairs
pub fn catalog(language: &str, entries: &[(&str, &str)]) -> String {
    let mut content = HEADER.replace("{lang}", language);
    for (msgid, msgstr) in entries {
        content.push_str(&format!("msgid \"{}\"\nmsgstr \"{}\"\n\n", msgid, msgstr));
    }
    content
}

/// Answers every prompt with "<prefix><text>" and counts calls
pub struct ScriptedProvider {
    pub calls: Arc<AtomicUsize>,
    prefix: String,
}

impl ScriptedProvider {
    pub fn new(prefix: &str) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            prefix: prefix.to_string(),
        }
    }

    fn answer(&self, prompt: &str) -> String {
        if let Some((_, payload)) = prompt.split_once(BULK_TEXTS_MARKER) {
            let texts: Vec<String> = serde_json::from_str(payload.trim()).unwrap_or_default();
            let answers: Vec<String> = texts.iter().map(|t| format!("{}{}", self.prefix, t)).collect();
            return serde_json::to_string(&answers).unwrap_or_default();
        }
        let text = prompt
            .rsplit_once("Text to translate:\n")
            .or_else(|| prompt.rsplit_once("\n\n"))
            .map(|(_, text)| text)
            .unwrap_or(prompt);
        format!("{}{}", self.prefix, text)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn get_models(&self, _clients: &ProviderClients) -> Vec<String> {
        vec!["scripted".to_string()]
    }

    fn get_default_model(&self) -> String {
        "scripted".to_string()
    }

    fn get_preferred_models(&self, _task: ModelTask) -> Vec<String> {
        vec!["scripted".to_string()]
    }

    async fn is_client_initialized(&self, _clients: &ProviderClients) -> bool {
        true
    }

    async fn translate(&self, _clients: &ProviderClients, _model: &str, content: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer(content))
    }
}

pub fn offline_clients() -> ProviderClients {
    ProviderClients::resolve(&ClientOverrides::default(), &ProviderSettings::default(), |_| None).unwrap()
}

pub fn flags(bulk: bool, fuzzy: FuzzyMode) -> TranslationFlags {
    TranslationFlags {
        bulk,
        batch_size: 10,
        fuzzy,
        folder_language: false,
        mark_ai_generated: true,
        default_context: None,
    }
}

pub fn service(provider: Arc<ScriptedProvider>, flags: TranslationFlags, interrupt: Interrupt) -> TranslationService {
    TranslationService::new(
        provider,
        Arc::new(offline_clients()),
        TranslationConfig {
            provider: ProviderKind::Ollama,
            model: "scripted".to_string(),
            flags,
            show_progress: false,
        },
        RetryPolicy {
            max_attempts: 2,
            delay: std::time::Duration::ZERO,
        },
        interrupt,
    )
}
