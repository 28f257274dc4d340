// Path exclusion for catalog discovery

use std::cmp::Reverse;
use std::path::Path;

use ignore::Match;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::ScanSettings;
use crate::error::{Result, TranslatorError};

/// Project-level exclusion file read from the scan root
pub const IGNORE_FILE_NAME: &str = ".po-translate-ignore";

const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Decides whether a path is left out of the scan.
///
/// Directories that are excluded are pruned, so nothing below them is visited.
pub trait PathFilter: Send + Sync {
    fn is_excluded(&self, path: &Path, is_dir: bool) -> bool;
}

/// Gitignore-style filter: built-in and configured patterns, the project
/// ignore file, and optionally every `.gitignore` below the root
pub struct GitignoreFilter {
    base: Gitignore,
    // deepest first, so nested rules override outer ones
    nested: Vec<Gitignore>,
}

impl GitignoreFilter {
    pub fn new(root: &Path, settings: &ScanSettings) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in settings.default_ignore_patterns.iter().chain(&settings.ignore_patterns) {
            builder.add_line(None, pattern).map_err(|e| {
                TranslatorError::Config(format!("Invalid ignore pattern '{}': {}", pattern, e))
            })?;
        }

        let project_file = root.join(IGNORE_FILE_NAME);
        if project_file.is_file() {
            debug!("Reading exclusions from {}", project_file.display());
            if let Some(e) = builder.add(&project_file) {
                warn!("Problem reading {}: {}", project_file.display(), e);
            }
        }

        let base = builder
            .build()
            .map_err(|e| TranslatorError::Config(format!("Invalid ignore patterns: {}", e)))?;

        let nested = if settings.respect_gitignore {
            collect_gitignores(root, &base)
        } else {
            Vec::new()
        };
        debug!("Loaded {} .gitignore files under {}", nested.len(), root.display());

        Ok(Self { base, nested })
    }
}

impl PathFilter for GitignoreFilter {
    fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        if self.base.matched(path, is_dir).is_ignore() {
            return true;
        }

        for gitignore in self.nested.iter().filter(|g| path.starts_with(g.path())) {
            match gitignore.matched(path, is_dir) {
                Match::Ignore(_) => return true,
                Match::Whitelist(_) => return false,
                Match::None => {}
            }
        }
        false
    }
}

fn collect_gitignores(root: &Path, base: &Gitignore) -> Vec<Gitignore> {
    let mut found: Vec<Gitignore> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !base.matched(e.path(), e.file_type().is_dir()).is_ignore())
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == GITIGNORE_FILE_NAME)
        .filter_map(|e| {
            let (gitignore, error) = Gitignore::new(e.path());
            if let Some(error) = error {
                warn!("Problem reading {}: {}", e.path().display(), error);
            }
            (!gitignore.is_empty()).then_some(gitignore)
        })
        .collect();

    found.sort_by_key(|g| Reverse(g.path().components().count()));
    found
}
