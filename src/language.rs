//! Language code matching, detection and naming.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::catalog::PoDocument;
use crate::error::{Result, TranslatorError};

static LANGUAGE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{2,3}(?:[_-][A-Za-z0-9]{2,4}){0,2}(?:@[A-Za-z]+)?$").expect("valid regex")
});

/// Codes whose script or region changes the written language; they never
/// fall back to their base code.
const DISTINCT_VARIANTS: &[&str] = &[
    "zh_hans", "zh_hant", "zh_cn", "zh_tw", "zh_hk", "zh_sg", "zh_mo", "sr_latn", "sr_cyrl",
    "sr@latin", "sr@cyrillic", "nb", "nn", "no", "be@tarask",
];

/// Directory and file names that look like codes but are not
const NOT_LANGUAGES: &[&str] = &["po", "pot", "src", "lib", "app", "doc", "web", "www", "api", "tmp", "bin", "etc", "var", "usr"];

/// Lowercase with `-` folded to `_`
pub fn normalize(code: &str) -> String {
    code.trim().to_lowercase().replace('-', "_")
}

/// Primary subtag, e.g. `fr` for `fr_CA` or `sr` for `sr@latin`
pub fn base_language(code: &str) -> String {
    normalize(code)
        .split(['_', '@'])
        .next()
        .unwrap_or_default()
        .to_string()
}

pub fn is_distinct_variant(code: &str) -> bool {
    let normalized = normalize(code);
    DISTINCT_VARIANTS.iter().any(|variant| {
        normalized == *variant
            || normalized
                .strip_prefix(variant)
                .is_some_and(|rest| rest.starts_with('_'))
    })
}

pub fn looks_like_language_code(value: &str) -> bool {
    LANGUAGE_CODE.is_match(value) && !NOT_LANGUAGES.contains(&value.to_lowercase().as_str())
}

/// Match a declared code against the requested set.
///
/// Tries an exact match, then a separator and case insensitive match, then
/// the base language unless the code is a distinct variant. Returns the code
/// in the form it was requested.
pub fn match_language(candidate: &str, requested: &[String]) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    if let Some(hit) = requested.iter().find(|r| r.as_str() == candidate) {
        return Some(hit.clone());
    }

    let normalized = normalize(candidate);
    if let Some(hit) = requested.iter().find(|r| normalize(r) == normalized) {
        return Some(hit.clone());
    }

    if is_distinct_variant(candidate) {
        return None;
    }
    let base = base_language(candidate);
    if base == normalized {
        return None;
    }
    requested.iter().find(|r| normalize(r) == base).cloned()
}

/// Path-derived language candidates, nearest first: the file stem, the
/// suffix after its last `-`, then each parent directory.
fn path_candidates(path: &Path) -> Vec<String> {
    let mut candidates = Vec::new();

    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        candidates.push(stem.to_string());
        if let Some((_, suffix)) = stem.rsplit_once('-') {
            candidates.push(suffix.to_string());
        }
    }

    if let Some(parent) = path.parent() {
        for component in parent.components().rev() {
            if let Some(name) = component.as_os_str().to_str() {
                candidates.push(name.to_string());
            }
        }
    }

    candidates
        .into_iter()
        .filter(|c| looks_like_language_code(c))
        .collect()
}

/// Decide which requested language a catalog belongs to.
///
/// The declared `Language` header is tried first. With folder inference the
/// same ladder runs on each path segment. `None` means skip the file.
pub fn resolve_file_language(
    path: &Path,
    declared: Option<&str>,
    requested: &[String],
    folder_language: bool,
) -> Option<String> {
    if let Some(hit) = declared.and_then(|code| match_language(code, requested)) {
        return Some(hit);
    }

    if folder_language {
        for candidate in path_candidates(path) {
            if let Some(hit) = match_language(&candidate, requested) {
                debug!("Inferred language {} from path {}", hit, path.display());
                return Some(hit);
            }
        }
    }

    None
}

/// Language implied by conventional locale layouts
pub fn language_from_path(path: &Path) -> Option<String> {
    let parent = path.parent();
    let parent_name = parent.and_then(|p| p.file_name()).and_then(|n| n.to_str());

    // locale/<lang>/LC_MESSAGES/<domain>.po
    if parent_name == Some("LC_MESSAGES") {
        let lang = parent
            .and_then(|p| p.parent())
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str());
        if let Some(lang) = lang.filter(|l| looks_like_language_code(l)) {
            return Some(lang.to_string());
        }
    }

    // locales/<lang>/<domain>.po
    if let Some(name) = parent_name.filter(|n| looks_like_language_code(n)) {
        return Some(name.to_string());
    }

    let stem = path.file_stem().and_then(|s| s.to_str())?;
    // <lang>.po
    if looks_like_language_code(stem) {
        return Some(stem.to_string());
    }
    // <domain>-<lang>.po
    stem.rsplit_once('-')
        .map(|(_, suffix)| suffix)
        .filter(|suffix| looks_like_language_code(suffix))
        .map(str::to_string)
}

/// Collect target languages from the catalogs themselves.
///
/// Reads each `Language` header; with `from_folders` the locale layout is
/// used for files without a usable header.
pub fn detect_languages(files: &[PathBuf], from_folders: bool) -> Result<Vec<String>> {
    if files.is_empty() {
        return Err(TranslatorError::NoLanguages("no .po files found".to_string()));
    }

    let mut found = BTreeSet::new();
    for file in files {
        let declared = match PoDocument::load(file) {
            Ok(doc) => doc.language().map(str::to_string),
            Err(e) => {
                warn!("Skipping {} during language detection: {}", file.display(), e);
                None
            }
        };

        let detected = declared
            .filter(|code| looks_like_language_code(code))
            .or_else(|| from_folders.then(|| language_from_path(file)).flatten());

        if let Some(code) = detected {
            found.insert(code);
        }
    }

    if found.is_empty() {
        let hint = if from_folders {
            "no Language headers or locale folders found"
        } else {
            "no Language headers found, pass --lang or use --folder-language"
        };
        return Err(TranslatorError::NoLanguages(hint.to_string()));
    }

    Ok(found.into_iter().collect())
}

/// Pair `--detail-lang` names with `--lang` codes by position
pub fn pair_detail_languages(codes: &[String], details: &[String]) -> Result<HashMap<String, String>> {
    if details.is_empty() {
        return Ok(HashMap::new());
    }
    if details.len() != codes.len() {
        return Err(TranslatorError::Config(format!(
            "{} detail languages given for {} language codes; they are paired by position",
            details.len(),
            codes.len()
        )));
    }

    Ok(codes
        .iter()
        .cloned()
        .zip(details.iter().map(|d| d.trim().to_string()))
        .collect())
}

/// English name for well-known codes
pub fn language_name(code: &str) -> Option<&'static str> {
    let name = match normalize(code).as_str() {
        "zh_hans" | "zh_cn" | "zh_sg" => "Simplified Chinese",
        "zh_hant" | "zh_tw" | "zh_hk" | "zh_mo" => "Traditional Chinese",
        "pt_br" => "Brazilian Portuguese",
        "sr@latin" | "sr_latn" => "Serbian (Latin script)",
        "be@tarask" => "Belarusian (Taraškievica)",
        "nb" | "nb_no" => "Norwegian Bokmål",
        "nn" | "nn_no" => "Norwegian Nynorsk",
        _ => match base_language(code).as_str() {
            "ja" => "Japanese",
            "ko" => "Korean",
            "zh" => "Chinese",
            "fr" => "French",
            "de" => "German",
            "es" => "Spanish",
            "ru" => "Russian",
            "it" => "Italian",
            "pt" => "Portuguese",
            "pl" => "Polish",
            "nl" => "Dutch",
            "tr" => "Turkish",
            "ar" => "Arabic",
            "hi" => "Hindi",
            "th" => "Thai",
            "vi" => "Vietnamese",
            "sv" => "Swedish",
            "da" => "Danish",
            "no" => "Norwegian",
            "fi" => "Finnish",
            "he" => "Hebrew",
            "hu" => "Hungarian",
            "cs" => "Czech",
            "sk" => "Slovak",
            "bg" => "Bulgarian",
            "hr" => "Croatian",
            "sl" => "Slovenian",
            "et" => "Estonian",
            "lv" => "Latvian",
            "lt" => "Lithuanian",
            "el" => "Greek",
            "ro" => "Romanian",
            "sr" => "Serbian",
            "ga" => "Irish",
            "cy" => "Welsh",
            "eu" => "Basque",
            "ca" => "Catalan",
            "gl" => "Galician",
            "is" => "Icelandic",
            "mk" => "Macedonian",
            "sq" => "Albanian",
            "be" => "Belarusian",
            "uk" => "Ukrainian",
            "id" => "Indonesian",
            "ms" => "Malay",
            "fa" => "Persian",
            "bn" => "Bengali",
            "ta" => "Tamil",
            "te" => "Telugu",
            "en" => "English",
            _ => return None,
        },
    };
    Some(name)
}

/// Name used in prompts: the detail name, a known name, or the code itself
pub fn display_name(code: &str, detail: Option<&str>) -> String {
    detail
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .or_else(|| language_name(code).map(str::to_string))
        .unwrap_or_else(|| code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_fallback_matrix() {
        assert_eq!(match_language("fr_CA", &langs(&["fr"])).as_deref(), Some("fr"));
        assert_eq!(match_language("zh_Hans", &langs(&["zh"])), None);
        assert_eq!(match_language("pt_BR", &langs(&["pt_BR"])).as_deref(), Some("pt_BR"));
        assert_eq!(match_language("en-US", &langs(&["en_US"])).as_deref(), Some("en_US"));
    }

    #[test]
    fn test_returns_requested_form() {
        assert_eq!(match_language("fr_CA", &langs(&["fr-CA"])).as_deref(), Some("fr-CA"));
        assert_eq!(match_language("pt_br", &langs(&["pt_BR"])).as_deref(), Some("pt_BR"));
    }

    #[test]
    fn test_distinct_variants_never_collapse() {
        for code in ["zh_Hant", "zh-hans", "zh_CN", "zh_TW", "zh_Hans_SG", "sr_Latn", "sr@latin", "be@tarask"] {
            let base = base_language(code);
            assert_eq!(match_language(code, &[base]), None, "{} collapsed", code);
        }
        assert_eq!(match_language("nb", &langs(&["no"])), None);
        assert_eq!(match_language("zh_Hans", &langs(&["zh_Hans"])).as_deref(), Some("zh_Hans"));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(match_language("de", &langs(&["fr", "es"])), None);
        assert_eq!(match_language("", &langs(&["fr"])), None);
        assert_eq!(match_language("fr", &langs(&["fr_CA"])), None);
    }

    #[test]
    fn test_resolve_prefers_metadata() {
        let path = Path::new("locales/de/messages.po");
        assert_eq!(
            resolve_file_language(path, Some("fr"), &langs(&["fr", "de"]), true).as_deref(),
            Some("fr")
        );
        assert_eq!(resolve_file_language(path, None, &langs(&["fr", "de"]), false), None);
    }

    #[test]
    fn test_resolve_from_folders() {
        let requested = langs(&["fr", "pt", "fr_CA"]);
        assert_eq!(
            resolve_file_language(Path::new("/srv/app/locales/fr_CA/test.po"), None, &requested, true).as_deref(),
            Some("fr_CA")
        );
        assert_eq!(
            resolve_file_language(Path::new("i18n/fr-CA/LC_MESSAGES/messages.po"), None, &langs(&["fr"]), true)
                .as_deref(),
            Some("fr")
        );
        assert_eq!(
            resolve_file_language(Path::new("locale/pt_BR/LC_MESSAGES/django.po"), None, &requested, true)
                .as_deref(),
            Some("pt")
        );
        assert_eq!(
            resolve_file_language(Path::new("languages/plugin-fr_FR.po"), Some(""), &requested, true).as_deref(),
            Some("fr")
        );
    }

    #[test]
    fn test_language_from_path_layouts() {
        assert_eq!(
            language_from_path(Path::new("locale/de/LC_MESSAGES/django.po")).as_deref(),
            Some("de")
        );
        assert_eq!(language_from_path(Path::new("locales/es/messages.po")).as_deref(), Some("es"));
        assert_eq!(language_from_path(Path::new("po/fr.po")).as_deref(), Some("fr"));
        assert_eq!(
            language_from_path(Path::new("languages/my-plugin-pt_BR.po")).as_deref(),
            Some("pt_BR")
        );
        assert_eq!(language_from_path(Path::new("translations/messages.po")), None);
    }

    #[test]
    fn test_detect_languages_requires_files() {
        assert!(matches!(detect_languages(&[], true), Err(TranslatorError::NoLanguages(_))));
    }

    #[test]
    fn test_pair_detail_languages() {
        let codes = langs(&["fr", "de"]);
        let pairs = pair_detail_languages(&codes, &langs(&["French", " German "])).unwrap();
        assert_eq!(pairs["de"], "German");
        assert!(pair_detail_languages(&codes, &[]).unwrap().is_empty());
        assert!(pair_detail_languages(&codes, &langs(&["French"])).is_err());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("fr", Some("Canadian French")), "Canadian French");
        assert_eq!(display_name("fr_CA", None), "French");
        assert_eq!(display_name("zh_Hant", None), "Traditional Chinese");
        assert_eq!(display_name("tlh", Some("  ")), "tlh");
    }
}
