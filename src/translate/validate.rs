// Single-item response validation and whitespace handling

/// Phrases that mark an explanation or refusal instead of a translation
const EXPLANATION_PHRASES: &[&str] = &[
    "i'm sorry",
    "i cannot",
    "i can't",
    "this refers to",
    "this means",
    "in this context",
];

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Whether `translation` looks like a bare translation of `source`.
///
/// Rejects answers longer than twice the source word count plus one, and
/// answers containing explanation or refusal phrases.
pub fn is_valid_translation(source: &str, translation: &str) -> bool {
    let translation = translation.trim();
    if translation.is_empty() {
        return false;
    }

    if word_count(translation) > 2 * word_count(source) + 1 {
        return false;
    }

    !is_explanation(translation)
}

/// Whether the answer explains or refuses instead of translating
pub fn is_explanation(answer: &str) -> bool {
    let lowered = answer.to_lowercase().replace('\u{2019}', "'");
    EXPLANATION_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

/// Split `text` into leading whitespace, core, and trailing whitespace
pub fn split_edges(text: &str) -> (&str, &str, &str) {
    let core_start = text.len() - text.trim_start().len();
    let core_end = text.trim_end().len();
    if core_start >= core_end {
        return (text, "", "");
    }
    (&text[..core_start], &text[core_start..core_end], &text[core_end..])
}

/// Re-apply the source's outer whitespace around a translated core.
///
/// An empty core stays empty so failures never look translated. A
/// whitespace-only source is returned unchanged.
pub fn restore_whitespace(source: &str, translated: &str) -> String {
    if source.trim().is_empty() {
        return source.to_string();
    }
    let core = translated.trim();
    if core.is_empty() {
        return String::new();
    }
    let (leading, _, trailing) = split_edges(source);
    format!("{}{}{}", leading, core, trailing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_translation() {
        assert!(is_valid_translation("Hello", "Bonjour"));
        assert!(is_valid_translation("Save file", "Enregistrer le fichier"));
    }

    #[test]
    fn test_rejects_long_answers() {
        // 1 source word allows up to 3 words
        assert!(is_valid_translation("Open", "Ouvrir le fichier"));
        assert!(!is_valid_translation("Open", "Ouvrir, qui veut dire ceci"));
    }

    #[test]
    fn test_rejects_explanations() {
        assert!(!is_valid_translation("Bank", "I'm sorry, I cannot"));
        assert!(!is_valid_translation("Bank", "I’m sorry"));
        assert!(!is_valid_translation("Run the tool now please", "This means lancer"));
        assert!(!is_valid_translation("Bank", "   "));
    }

    #[test]
    fn test_explanation_ignores_length() {
        assert!(is_explanation("In this context, the word means a river bank"));
        assert!(!is_explanation("Une phrase assez longue mais parfaitement normale"));
    }

    #[test]
    fn test_whitespace_patterns() {
        let patterns = [
            ("Hello", "Bonjour"),
            ("  Hello", "  Bonjour"),
            ("Hello  ", "Bonjour  "),
            ("\tHello\n", "\tBonjour\n"),
            ("\n\n Hello \t", "\n\n Bonjour \t"),
            (" \r\nHello\r\n ", " \r\nBonjour\r\n "),
        ];
        for (source, expected) in patterns {
            assert_eq!(restore_whitespace(source, "  Bonjour\n"), expected, "source {:?}", source);
        }
    }

    #[test]
    fn test_whitespace_edge_cases() {
        assert_eq!(restore_whitespace("   ", "x"), "   ");
        assert_eq!(restore_whitespace("  Hello  ", "   "), "");
        assert_eq!(split_edges(" a b "), (" ", "a b", " "));
        assert_eq!(split_edges("\t"), ("\t", "", ""));
    }
}
