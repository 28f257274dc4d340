// Prompt templates sent to the providers

use std::collections::HashMap;

use crate::error::Result;

/// Marker preceding the JSON payload of a bulk prompt
pub const BULK_TEXTS_MARKER: &str = "Texts to translate:";

/// Minimal request used to check the provider before any file is touched
pub const CONNECTION_CHECK_PROMPT: &str = "Reply with the single word OK.";

fn context_block(context: Option<&str>) -> String {
    match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(context) => format!(
            "IMPORTANT CONTEXT: {}\nChoose the translation that matches this specific context.\n\n",
            context
        ),
        None => String::new(),
    }
}

/// Prompt for one entry
pub fn single_prompt(text: &str, target: &str, context: Option<&str>) -> String {
    format!(
        "Translate the following text from English to {target}.\n\
         {context}\
         Return only the direct translation, without any explanation, notes or alternatives.\n\
         Keep placeholders (such as %s, %(name)s, {{0}}), HTML tags, markup and line breaks exactly as they are.\n\
         Leave URLs, code and technical terms untranslated.\n\n\
         Text to translate:\n{text}",
        target = target,
        context = context_block(context),
        text = text,
    )
}

/// Prompt for a batch; the answer must be a JSON array in the same order
pub fn bulk_prompt(texts: &[String], target: &str, context: Option<&str>) -> Result<String> {
    let payload = serde_json::to_string_pretty(texts)?;
    Ok(format!(
        "Translate the following list of texts from English to {target}.\n\
         {context}\
         Provide only the translations as a JSON array of strings, in the same order and with exactly {count} elements.\n\
         Keep special characters, placeholders (such as %s, %(name)s, {{0}}), HTML tags and line breaks exactly as they are.\n\
         If a term should not be translated (like 'URL' or technical terms), keep it as is.\n\
         Do not add explanations or text outside the JSON array.\n\
         Example format: [\"translation 1\", \"translation 2\"]\n\n\
         {marker}\n{payload}",
        target = target,
        context = context_block(context),
        count = texts.len(),
        marker = BULK_TEXTS_MARKER,
        payload = payload,
    ))
}

/// Stricter prompt used once after a translation failed validation
pub fn concise_retry_prompt(text: &str, target: &str, context: Option<&str>) -> String {
    format!(
        "Translate this text concisely to {target}.\n\
         {context}\
         Respond with the translation only. No explanations, no apologies, no commentary.\n\n\
         {text}",
        target = target,
        context = context_block(context),
        text = text,
    )
}

/// Plain re-prompt used once after an empty answer
pub fn plain_retry_prompt(text: &str, target: &str) -> String {
    format!(
        "Translate this single word or short phrase to {}. Respond with the translation only.\n\n{}",
        target, text
    )
}

/// Most frequent context among a batch, first seen wins ties
pub fn dominant_context<'a, I>(contexts: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, context) in contexts.into_iter().flatten().enumerate() {
        counts.entry(context).or_insert((0, position)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(context, _)| context.to_string())
}
