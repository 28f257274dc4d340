use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::catalog::{CatalogStats, PoDocument};
use crate::config::ScanSettings;
use crate::error::{Result, TranslatorError};
use crate::filter::{GitignoreFilter, PathFilter};
use crate::interrupt::Interrupt;
use crate::language::{detect_languages, pair_detail_languages, resolve_file_language};
use crate::translate::{FileReport, FuzzyMode, TranslationService};

/// Pre-flight view of one catalog
#[derive(Debug, Clone)]
pub struct FileSurvey {
    pub path: PathBuf,
    pub language: String,
    pub stats: CatalogStats,
    /// Entries this run would work on
    pub pending: usize,
}

/// Result of the read-only first phase
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub root: PathBuf,
    pub languages: Vec<String>,
    pub scanned: usize,
    /// Unreadable catalogs and catalogs in languages that were not requested
    pub skipped: usize,
    pub files: Vec<FileSurvey>,
}

impl ScanSummary {
    pub fn total_entries(&self) -> usize {
        self.files.iter().map(|f| f.stats.total).sum()
    }

    pub fn translated_entries(&self) -> usize {
        self.files.iter().map(|f| f.stats.translated).sum()
    }

    pub fn pending_entries(&self) -> usize {
        self.files.iter().map(|f| f.pending).sum()
    }

    pub fn fully_translated(&self) -> usize {
        self.files.iter().filter(|f| f.pending == 0).count()
    }

    pub fn needing_work(&self) -> impl Iterator<Item = &FileSurvey> {
        self.files.iter().filter(|f| f.pending > 0)
    }

    /// Translated share of all entries, in percent
    pub fn completion(&self) -> f64 {
        let total = self.total_entries();
        if total == 0 {
            100.0
        } else {
            self.translated_entries() as f64 * 100.0 / total as f64
        }
    }
}

/// Outcome of the processing phase
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub scan: ScanSummary,
    pub reports: Vec<FileReport>,
    pub failures: Vec<(PathBuf, String)>,
}

impl RunSummary {
    pub fn translated(&self) -> usize {
        self.reports.iter().map(|r| r.translated).sum()
    }

    pub fn remaining(&self) -> usize {
        self.reports.iter().map(|r| r.pending_after).sum()
    }
}

/// All `.po` files below `root`, pruning excluded directories, sorted
pub fn find_po_files(root: &Path, filter: &dyn PathFilter) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !filter.is_excluded(e.path(), e.file_type().is_dir()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == "po"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn relative(path: &Path, root: &Path) -> String {
    pathdiff::diff_paths(path, root)
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

/// Scan a folder, report what needs work, then translate file by file
pub struct Workflow {
    service: TranslationService,
    scan: ScanSettings,
    interrupt: Interrupt,
    assume_yes: bool,
}

impl Workflow {
    pub fn new(service: TranslationService, scan: ScanSettings, interrupt: Interrupt) -> Self {
        Self {
            service,
            scan,
            interrupt,
            assume_yes: false,
        }
    }

    /// Skip the slow mode countdown
    pub fn assume_yes(mut self, value: bool) -> Self {
        self.assume_yes = value;
        self
    }

    pub fn service(&self) -> &TranslationService {
        &self.service
    }

    /// Find catalogs, resolve languages and survey them without writing anything
    /// (except for the destructive fuzzy strip, which runs before the survey)
    pub fn scan(&self, root: &Path, languages: &[String]) -> Result<ScanSummary> {
        if !root.is_dir() {
            return Err(TranslatorError::Config(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let filter = GitignoreFilter::new(root, &self.scan)?;
        let files = find_po_files(root, &filter);
        info!("Found {} .po files under {}", files.len(), root.display());

        let flags = &self.service.config().flags;
        if flags.fuzzy == FuzzyMode::Strip {
            self.strip_fuzzy(&files);
        }

        let languages = if languages.is_empty() {
            let detected = detect_languages(&files, flags.folder_language)?;
            info!("Detected languages: {}", detected.join(", "));
            detected
        } else {
            languages.to_vec()
        };

        let mut summary = ScanSummary {
            root: root.to_path_buf(),
            languages,
            scanned: files.len(),
            ..Default::default()
        };

        for path in files {
            let document = match PoDocument::load(&path) {
                Ok(document) => document,
                Err(e) => {
                    warn!("Skipping unreadable catalog: {}", e);
                    summary.skipped += 1;
                    continue;
                }
            };

            let Some(language) = resolve_file_language(
                &path,
                document.language(),
                &summary.languages,
                flags.folder_language,
            ) else {
                debug!("Skipping {}: language not requested", path.display());
                summary.skipped += 1;
                continue;
            };

            let pending = self.service.pending_indices(&document).len();
            if pending == 0 {
                info!("Skipping fully translated file: {}", relative(&path, root));
            }
            summary.files.push(FileSurvey {
                stats: document.stats(),
                path,
                language,
                pending,
            });
        }

        Ok(summary)
    }

    /// Run both phases over `root`.
    ///
    /// Errors on individual files are reported and do not stop the run; an
    /// interrupt stops it after the current file has been saved.
    pub async fn run(&self, root: &Path, languages: &[String], details: &[String]) -> Result<RunSummary> {
        let scan = self.scan(root, languages)?;
        let details: HashMap<String, String> = pair_detail_languages(&scan.languages, details)?;
        print_scan_summary(&scan);

        let pending = scan.pending_entries();
        if pending == 0 {
            info!("Nothing to translate");
            return Ok(RunSummary {
                scan,
                ..Default::default()
            });
        }

        let flags = &self.service.config().flags;
        if !flags.bulk && pending > self.scan.slow_mode_threshold && !self.assume_yes {
            self.countdown(pending).await?;
        }

        let targets: Vec<PathBuf> = scan.needing_work().map(|f| f.path.clone()).collect();
        info!("Files needing translation: {}", targets.len());

        let mut summary = RunSummary {
            scan,
            ..Default::default()
        };

        for path in targets {
            if self.interrupt.is_triggered() {
                return Err(TranslatorError::Interrupted {
                    saved: summary.translated(),
                });
            }

            let shown = relative(&path, root);
            match self.service.process_file(&path, &summary.scan.languages, &details).await {
                Ok(report) => summary.reports.push(report),
                Err(TranslatorError::Interrupted { saved }) => {
                    return Err(TranslatorError::Interrupted {
                        saved: summary.translated() + saved,
                    });
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", shown, e);
                    summary.failures.push((path, e.to_string()));
                }
            }
        }

        print_run_summary(&summary);
        Ok(summary)
    }

    fn strip_fuzzy(&self, files: &[PathBuf]) {
        warn!("--fuzzy is deprecated and removes every fuzzy marker; prefer --fix-fuzzy");
        let mut removed = 0;
        for path in files {
            match PoDocument::strip_fuzzy_file(path) {
                Ok(count) => removed += count,
                Err(e) => warn!("Could not strip fuzzy flags from {}: {}", path.display(), e),
            }
        }
        info!("Removed {} fuzzy flags", removed);
    }

    async fn countdown(&self, pending: usize) -> Result<()> {
        let seconds = self.scan.countdown_secs;
        warn!(
            "{} entries will be translated one request at a time, which can be slow. Consider --bulk.",
            pending
        );

        for remaining in (1..=seconds).rev() {
            if self.interrupt.is_triggered() {
                return Err(TranslatorError::Aborted);
            }
            warn!("Starting in {}s, press Ctrl+C to abort", remaining);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        if self.interrupt.is_triggered() {
            return Err(TranslatorError::Aborted);
        }
        Ok(())
    }
}

pub fn print_scan_summary(scan: &ScanSummary) {
    println!("\nScan of {}", scan.root.display());
    println!("Languages: {}", scan.languages.join(", "));
    println!(
        "Files: {} scanned, {} skipped, {} fully translated, {} needing work",
        scan.scanned,
        scan.skipped,
        scan.fully_translated(),
        scan.needing_work().count()
    );
    println!(
        "Entries: {} total, {} translated, {} to translate ({:.1}% complete)",
        scan.total_entries(),
        scan.translated_entries(),
        scan.pending_entries(),
        scan.completion()
    );

    let needing: Vec<&FileSurvey> = scan.needing_work().collect();
    if !needing.is_empty() {
        println!("\n{:<60} {:<10} {:>10}", "File", "Language", "Pending");
        println!("{}", "-".repeat(82));
        for file in needing {
            println!(
                "{:<60} {:<10} {:>10}",
                relative(&file.path, &scan.root),
                file.language,
                file.pending
            );
        }
    }
}

pub fn print_run_summary(summary: &RunSummary) {
    println!("\n{:<60} {:>10} {:>10}", "File", "Translated", "Remaining");
    println!("{}", "-".repeat(82));
    for report in &summary.reports {
        println!(
            "{:<60} {:>10} {:>10}",
            relative(&report.path, &summary.scan.root),
            report.translated,
            report.pending_after
        );
    }
    for (path, error) in &summary.failures {
        println!("{:<60} failed: {}", relative(path, &summary.scan.root), error);
    }
    println!(
        "\nTranslated {} entries, {} still untranslated",
        summary.translated(),
        summary.remaining()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    #[test]
    fn test_find_po_files_prunes_excluded_dirs() {
        let dir = TempDir::new().unwrap();
        dir.child("locale/fr/LC_MESSAGES/app.po").touch().unwrap();
        dir.child("locale/de/LC_MESSAGES/app.po").touch().unwrap();
        dir.child("locale/app.pot").touch().unwrap();
        dir.child("node_modules/pkg/locale/fr.po").touch().unwrap();
        dir.child("notes.txt").touch().unwrap();

        let filter = GitignoreFilter::new(dir.path(), &ScanSettings::default()).unwrap();
        let files = find_po_files(dir.path(), &filter);
        let names: Vec<String> = files.iter().map(|f| relative(f, dir.path())).collect();
        assert_eq!(
            names,
            vec![
                Path::new("locale/de/LC_MESSAGES/app.po").display().to_string(),
                Path::new("locale/fr/LC_MESSAGES/app.po").display().to_string(),
            ]
        );
    }

    #[test]
    fn test_summary_arithmetic() {
        let file = |total, translated, pending| FileSurvey {
            path: PathBuf::from("x.po"),
            language: "fr".to_string(),
            stats: CatalogStats {
                total,
                translated,
                untranslated: total - translated,
                fuzzy: 0,
            },
            pending,
        };
        let summary = ScanSummary {
            files: vec![file(10, 10, 0), file(10, 5, 5)],
            ..Default::default()
        };
        assert_eq!(summary.total_entries(), 20);
        assert_eq!(summary.pending_entries(), 5);
        assert_eq!(summary.fully_translated(), 1);
        assert!((summary.completion() - 75.0).abs() < f64::EPSILON);
        assert!((ScanSummary::default().completion() - 100.0).abs() < f64::EPSILON);
    }
}
