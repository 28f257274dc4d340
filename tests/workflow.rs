mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use assert_fs::TempDir;
use assert_fs::prelude::*;
use po_translate::catalog::PoDocument;
use po_translate::config::ScanSettings;
use po_translate::error::TranslatorError;
use po_translate::interrupt::Interrupt;
use po_translate::translate::{FuzzyMode, TranslationFlags};
use po_translate::workflow::Workflow;

use common::{ScriptedProvider, catalog, flags, service};

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    dir.child("locale/fr/LC_MESSAGES/app.po")
        .write_str(&catalog("fr", &[("Open", ""), ("Close", ""), ("Save", "Enregistrer")]))
        .unwrap();
    dir.child("locale/de/LC_MESSAGES/app.po")
        .write_str(&catalog("de", &[("Open", "Öffnen"), ("Close", "Schließen")]))
        .unwrap();
    dir.child("node_modules/widget/locale/fr.po")
        .write_str(&catalog("fr", &[("Widget", "")]))
        .unwrap();
    dir
}

fn languages(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

fn workflow(provider: &Arc<ScriptedProvider>, bulk: bool, fuzzy: FuzzyMode) -> Workflow {
    let interrupt = Interrupt::new();
    Workflow::new(
        service(provider.clone(), flags(bulk, fuzzy), interrupt.clone()),
        ScanSettings::default(),
        interrupt,
    )
    .assume_yes(true)
}

#[tokio::test]
async fn translates_pending_files_and_skips_the_rest() {
    let dir = project();
    let provider = Arc::new(ScriptedProvider::new("FR:"));
    let workflow = workflow(&provider, false, FuzzyMode::Keep);

    let summary = workflow
        .run(dir.path(), &languages(&["fr", "de"]), &[])
        .await
        .unwrap();

    assert_eq!(summary.scan.scanned, 2);
    assert_eq!(summary.scan.fully_translated(), 1);
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.translated(), 2);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

    let fr = PoDocument::load(dir.child("locale/fr/LC_MESSAGES/app.po").path()).unwrap();
    assert!(fr.untranslated_indices().is_empty());
    assert_eq!(fr.entry(0).unwrap().translations, vec!["FR:Open".to_string()]);
    assert_eq!(fr.entry(2).unwrap().translations, vec!["Enregistrer".to_string()]);
    assert_eq!(fr.ai_generated_indices(), vec![0, 1]);

    let vendored = PoDocument::load(dir.child("node_modules/widget/locale/fr.po").path()).unwrap();
    assert_eq!(vendored.untranslated_indices(), vec![0]);
}

#[tokio::test]
async fn second_run_makes_no_provider_calls() {
    let dir = project();
    let provider = Arc::new(ScriptedProvider::new("FR:"));
    let workflow = workflow(&provider, true, FuzzyMode::Keep);

    workflow.run(dir.path(), &languages(&["fr"]), &[]).await.unwrap();
    let after_first = provider.calls.load(Ordering::SeqCst);
    assert_eq!(after_first, 1);

    let summary = workflow.run(dir.path(), &languages(&["fr"]), &[]).await.unwrap();
    assert!(summary.reports.is_empty());
    assert_eq!(summary.scan.pending_entries(), 0);
    assert_eq!(provider.calls.load(Ordering::SeqCst), after_first);
}

#[tokio::test]
async fn unrequested_languages_are_skipped() {
    let dir = project();
    let provider = Arc::new(ScriptedProvider::new("ES:"));
    let workflow = workflow(&provider, false, FuzzyMode::Keep);

    let summary = workflow.run(dir.path(), &languages(&["es"]), &[]).await.unwrap();
    assert_eq!(summary.scan.skipped, 2);
    assert!(summary.reports.is_empty());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn languages_are_detected_from_headers() {
    let dir = project();
    let provider = Arc::new(ScriptedProvider::new("X:"));
    let workflow = workflow(&provider, false, FuzzyMode::Keep);

    let scan = workflow.scan(dir.path(), &[]).unwrap();
    assert_eq!(scan.languages, languages(&["de", "fr"]));
    assert_eq!(scan.pending_entries(), 2);
}

#[tokio::test]
async fn mismatched_detail_languages_are_fatal() {
    let dir = project();
    let provider = Arc::new(ScriptedProvider::new("FR:"));
    let workflow = workflow(&provider, false, FuzzyMode::Keep);

    let result = workflow
        .run(dir.path(), &languages(&["fr", "de"]), &languages(&["French"]))
        .await;
    assert!(matches!(result, Err(TranslatorError::Config(_))));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fuzzy_strip_runs_before_the_survey() {
    let dir = TempDir::new().unwrap();
    let mut content = catalog("fr", &[]);
    content.push_str("#, fuzzy\nmsgid \"Open\"\nmsgstr \"Ouvrir\"\n\n");
    dir.child("fr.po").write_str(&content).unwrap();

    let provider = Arc::new(ScriptedProvider::new("FR:"));
    let workflow = workflow(&provider, false, FuzzyMode::Strip);

    workflow.run(dir.path(), &languages(&["fr"]), &[]).await.unwrap();

    let doc = PoDocument::load(dir.child("fr.po").path()).unwrap();
    assert!(doc.fuzzy_indices().is_empty());
    assert_eq!(doc.entry(0).unwrap().translations, vec!["Ouvrir".to_string()]);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn countdown_can_be_aborted() {
    let dir = project();
    let provider = Arc::new(ScriptedProvider::new("FR:"));
    let interrupt = Interrupt::new();
    let scan = ScanSettings {
        slow_mode_threshold: 1,
        countdown_secs: 1,
        ..ScanSettings::default()
    };
    let workflow = Workflow::new(
        service(provider.clone(), flags(false, FuzzyMode::Keep), interrupt.clone()),
        scan,
        interrupt.clone(),
    );

    interrupt.trigger();
    let result = workflow.run(dir.path(), &languages(&["fr"]), &[]).await;
    assert!(matches!(result, Err(TranslatorError::Aborted)));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sparse_headers_are_translated_without_losing_content() {
    let dir = TempDir::new().unwrap();
    let minimal = "# Hand-written catalog\nmsgid \"\"\nmsgstr \"\"\n\"Language: fr\\n\"\n\n\
                   # Keep the ellipsis\nmsgid \"Open...\"\nmsgstr \"\"\n\n\
                   #~ msgid \"Gone\"\n#~ msgstr \"Parti\"\n";
    dir.child("locale/fr/LC_MESSAGES/app.po").write_str(minimal).unwrap();
    dir.child("locale/de/LC_MESSAGES/app.po")
        .write_str("#: src/main.rs:3\nmsgid \"Close\"\nmsgstr \"\"\n")
        .unwrap();

    let provider = Arc::new(ScriptedProvider::new("T:"));
    let interrupt = Interrupt::new();
    let flags = TranslationFlags {
        folder_language: true,
        ..flags(false, FuzzyMode::Keep)
    };
    let workflow = Workflow::new(service(provider.clone(), flags, interrupt.clone()), ScanSettings::default(), interrupt)
        .assume_yes(true);

    let summary = workflow
        .run(dir.path(), &languages(&["fr", "de"]), &[])
        .await
        .unwrap();
    assert!(summary.failures.is_empty());
    assert_eq!(summary.translated(), 2);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

    let fr = std::fs::read_to_string(dir.child("locale/fr/LC_MESSAGES/app.po").path()).unwrap();
    assert_eq!(
        fr,
        "# Hand-written catalog\nmsgid \"\"\nmsgstr \"\"\n\"Language: fr\\n\"\n\n\
         # Keep the ellipsis\n#. AI-generated\nmsgid \"Open...\"\nmsgstr \"T:Open...\"\n\n\
         #~ msgid \"Gone\"\n#~ msgstr \"Parti\"\n"
    );

    let de = PoDocument::load(dir.child("locale/de/LC_MESSAGES/app.po").path()).unwrap();
    assert_eq!(de.language(), None);
    assert_eq!(de.entry(0).unwrap().translations, vec!["T:Close".to_string()]);
}

#[tokio::test]
async fn malformed_catalogs_are_skipped() {
    let dir = project();
    dir.child("locale/es/LC_MESSAGES/app.po")
        .write_str("msgid \"Open\"\nmsgstr \"Abrir\"\nnot a po line\n")
        .unwrap();
    let provider = Arc::new(ScriptedProvider::new("FR:"));
    let workflow = workflow(&provider, false, FuzzyMode::Keep);

    let summary = workflow.run(dir.path(), &languages(&["fr", "de"]), &[]).await.unwrap();
    assert_eq!(summary.scan.scanned, 3);
    assert_eq!(summary.scan.skipped, 1);
    assert_eq!(summary.translated(), 2);
}
