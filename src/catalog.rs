//! PO catalog adapter.
//!
//! Reads a PO file into blocks that keep their original lines. Only entries
//! touched by a translation or a flag change are rendered again on save, so
//! comments, obsolete entries and header fields the tool does not know about
//! survive untouched. Entries are addressed by their position in the file,
//! so two entries with the same msgid are always updated independently.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Result, TranslatorError};

/// Comment line marking machine-produced translations
pub const AI_MARKER: &str = "AI-generated";

const FUZZY_FLAG: &str = "fuzzy";

/// Read-only snapshot of one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub msgid: String,
    pub msgid_plural: Option<String>,
    pub msgctxt: Option<String>,
    /// One element for scalar entries, one per form for plural entries
    pub translations: Vec<String>,
    pub fuzzy: bool,
    /// Extracted (`#.`) comment lines, joined with newlines
    pub comments: String,
}

impl EntryInfo {
    pub fn is_plural(&self) -> bool {
        self.msgid_plural.is_some()
    }
}

/// Entry counts for one catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    /// Entries with a source string
    pub total: usize,
    pub translated: usize,
    pub untranslated: usize,
    pub fuzzy: usize,
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Single pass, so `\\n` stays a backslash followed by `n`
fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('"') => result.push('"'),
            Some('\\') => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

fn quoted(text: &str) -> std::result::Result<String, String> {
    let text = text.trim();
    text.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(unescape)
        .ok_or_else(|| format!("expected a quoted string, found `{}`", text))
}

/// `keyword "value"`, or gettext's multi-line layout when the value has
/// a newline before its end
fn format_field(keyword: &str, value: &str) -> Vec<String> {
    let pieces: Vec<&str> = value.split_inclusive('\n').collect();
    if pieces.len() <= 1 {
        return vec![format!("{} \"{}\"", keyword, escape(value))];
    }
    let mut lines = vec![format!("{} \"\"", keyword)];
    lines.extend(pieces.iter().map(|piece| format!("\"{}\"", escape(piece))));
    lines
}

fn flags_on(line: &str) -> Option<Vec<&str>> {
    let flags = line.trim_start().strip_prefix("#,")?;
    Some(
        flags
            .split(',')
            .map(str::trim)
            .filter(|flag| !flag.is_empty())
            .collect(),
    )
}

/// Remove `flag` from every `#,` line, dropping lines left empty.
/// Returns how many lines carried it.
fn remove_flag(lines: &mut Vec<String>, flag: &str) -> usize {
    let mut removed = 0;
    let mut kept = Vec::with_capacity(lines.len());
    for line in std::mem::take(lines) {
        let rest: Option<Vec<String>> = flags_on(&line)
            .filter(|flags| flags.contains(&flag))
            .map(|flags| {
                flags
                    .into_iter()
                    .filter(|f| *f != flag)
                    .map(str::to_string)
                    .collect()
            });
        let Some(rest) = rest else {
            kept.push(line);
            continue;
        };
        removed += 1;
        if !rest.is_empty() {
            kept.push(format!("#, {}", rest.join(", ")));
        }
    }
    *lines = kept;
    removed
}

fn extracted_comment(line: &str) -> Option<&str> {
    let comment = line.trim_start().strip_prefix("#.")?;
    Some(comment.strip_prefix(' ').unwrap_or(comment))
}

fn is_translator_comment(line: &str) -> bool {
    let line = line.trim_start();
    line == "#" || line.starts_with("# ")
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Context,
    Id,
    IdPlural,
    Str(usize),
}

fn split_keyword(line: &str) -> Option<std::result::Result<(Field, &str), String>> {
    if let Some(rest) = line.strip_prefix("msgctxt ") {
        return Some(Ok((Field::Context, rest)));
    }
    if let Some(rest) = line.strip_prefix("msgid_plural ") {
        return Some(Ok((Field::IdPlural, rest)));
    }
    if let Some(rest) = line.strip_prefix("msgid ") {
        return Some(Ok((Field::Id, rest)));
    }
    if let Some(rest) = line.strip_prefix("msgstr ") {
        return Some(Ok((Field::Str(0), rest)));
    }
    let indexed = line.strip_prefix("msgstr[")?;
    Some(match indexed.split_once(']') {
        Some((form, rest)) => form
            .trim()
            .parse()
            .map(|form| (Field::Str(form), rest))
            .map_err(|_| format!("invalid plural index `{}`", form)),
        None => Err("unterminated plural index".to_string()),
    })
}

/// One translation unit, keeping the lines it was read from
#[derive(Debug, Clone)]
struct Entry {
    /// Every `#` line above the keywords, as written
    comments: Vec<String>,
    /// msgctxt, msgid and msgid_plural lines, as written
    source_lines: Vec<String>,
    /// Replaced whenever the translation changes
    msgstr_lines: Vec<String>,
    msgctxt: Option<String>,
    msgid: String,
    msgid_plural: Option<String>,
    msgstr: Vec<String>,
}

impl Entry {
    fn is_plural(&self) -> bool {
        self.msgid_plural.is_some()
    }

    fn is_fuzzy(&self) -> bool {
        self.comments
            .iter()
            .filter_map(|line| flags_on(line))
            .any(|flags| flags.contains(&FUZZY_FLAG))
    }

    /// Real source text and no translation. Plural entries count as
    /// translated once any form is filled.
    fn needs_translation(&self) -> bool {
        !self.msgid.trim().is_empty() && self.msgstr.iter().all(|form| form.trim().is_empty())
    }

    fn extracted_comments(&self) -> impl Iterator<Item = &str> {
        self.comments.iter().filter_map(|line| extracted_comment(line))
    }

    fn has_marker(&self) -> bool {
        self.extracted_comments().any(|comment| comment.trim() == AI_MARKER)
    }

    /// Append the marker after the existing comments; false if already present
    fn add_marker(&mut self) -> bool {
        if self.has_marker() {
            return false;
        }
        let position = self
            .comments
            .iter()
            .rposition(|line| extracted_comment(line).is_some())
            .or_else(|| self.comments.iter().rposition(|line| is_translator_comment(line)))
            .map_or(0, |last| last + 1);
        self.comments.insert(position, format!("#. {}", AI_MARKER));
        true
    }

    fn remove_marker(&mut self) -> bool {
        let before = self.comments.len();
        self.comments
            .retain(|line| extracted_comment(line).is_none_or(|comment| comment.trim() != AI_MARKER));
        self.comments.len() != before
    }

    fn set_translations(&mut self, forms: Vec<String>) {
        self.msgstr_lines = if self.is_plural() {
            forms
                .iter()
                .enumerate()
                .flat_map(|(form, text)| format_field(&format!("msgstr[{}]", form), text))
                .collect()
        } else {
            format_field("msgstr", forms.first().map(String::as_str).unwrap_or_default())
        };
        self.msgstr = forms;
    }

    fn lines(&self) -> impl Iterator<Item = &String> {
        self.comments
            .iter()
            .chain(&self.source_lines)
            .chain(&self.msgstr_lines)
    }
}

#[derive(Debug, Clone)]
enum Block {
    /// Blank lines, obsolete entries and stray comments, kept as read
    Verbatim(Vec<String>),
    Entry(Entry),
}

impl Block {
    fn as_entry(&self) -> Option<&Entry> {
        match self {
            Block::Entry(entry) => Some(entry),
            Block::Verbatim(_) => None,
        }
    }

    fn as_entry_mut(&mut self) -> Option<&mut Entry> {
        match self {
            Block::Entry(entry) => Some(entry),
            Block::Verbatim(_) => None,
        }
    }
}

#[derive(Default)]
struct BlockBuilder {
    comments: Vec<String>,
    source_lines: Vec<String>,
    msgstr_lines: Vec<String>,
    msgctxt: Option<String>,
    msgid: Option<String>,
    msgid_plural: Option<String>,
    msgstr: Vec<String>,
    field: Option<Field>,
}

impl BlockBuilder {
    fn has_msgstr(&self) -> bool {
        !self.msgstr_lines.is_empty()
    }

    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Context => self.msgctxt.get_or_insert_with(String::new),
            Field::Id => self.msgid.get_or_insert_with(String::new),
            Field::IdPlural => self.msgid_plural.get_or_insert_with(String::new),
            Field::Str(form) => {
                if self.msgstr.len() <= form {
                    self.msgstr.resize(form + 1, String::new());
                }
                &mut self.msgstr[form]
            }
        }
    }

    fn keyword(&mut self, field: Field, value: String, raw: &str) -> std::result::Result<(), String> {
        match field {
            Field::Context | Field::Id if self.msgid.is_some() && !self.has_msgstr() => {
                return Err("msgid without msgstr".to_string());
            }
            Field::IdPlural | Field::Str(_) if self.msgid.is_none() => {
                return Err("missing msgid".to_string());
            }
            _ => {}
        }
        *self.field_mut(field) = value;
        self.push_line(field, raw);
        self.field = Some(field);
        Ok(())
    }

    fn continuation(&mut self, value: String, raw: &str) -> std::result::Result<(), String> {
        let field = self.field.ok_or("string without a keyword")?;
        self.field_mut(field).push_str(&value);
        self.push_line(field, raw);
        Ok(())
    }

    fn push_line(&mut self, field: Field, raw: &str) {
        match field {
            Field::Str(_) => self.msgstr_lines.push(raw.to_string()),
            _ => self.source_lines.push(raw.to_string()),
        }
    }

    fn finish(self) -> std::result::Result<Option<Block>, String> {
        if self.source_lines.is_empty() && self.msgstr_lines.is_empty() {
            return Ok((!self.comments.is_empty()).then_some(Block::Verbatim(self.comments)));
        }
        let Some(msgid) = self.msgid else {
            return Err("missing msgid".to_string());
        };
        if self.msgstr_lines.is_empty() {
            return Err(format!("msgid \"{}\" has no msgstr", escape(&msgid)));
        }
        Ok(Some(Block::Entry(Entry {
            comments: self.comments,
            source_lines: self.source_lines,
            msgstr_lines: self.msgstr_lines,
            msgctxt: self.msgctxt,
            msgid,
            msgid_plural: self.msgid_plural,
            msgstr: self.msgstr,
        })))
    }
}

fn parse_blocks(content: &str) -> std::result::Result<Vec<Block>, String> {
    let mut blocks = Vec::new();
    let mut current = BlockBuilder::default();

    for (number, raw) in content.lines().enumerate() {
        let at = |message: String| format!("line {}: {}", number + 1, message);
        let line = raw.trim();

        if line.is_empty() {
            blocks.extend(std::mem::take(&mut current).finish().map_err(at)?);
            blocks.push(Block::Verbatim(vec![raw.to_string()]));
        } else if line.starts_with('#') {
            if current.has_msgstr() {
                blocks.extend(std::mem::take(&mut current).finish().map_err(at)?);
            }
            current.comments.push(raw.to_string());
        } else if line.starts_with('"') {
            let value = quoted(line).map_err(at)?;
            current.continuation(value, raw).map_err(at)?;
        } else if let Some(keyword) = split_keyword(line) {
            let (field, rest) = keyword.map_err(at)?;
            if matches!(field, Field::Context | Field::Id) && current.has_msgstr() {
                blocks.extend(std::mem::take(&mut current).finish().map_err(at)?);
            }
            let value = quoted(rest).map_err(at)?;
            current.keyword(field, value, raw).map_err(at)?;
        } else {
            return Err(at(format!("unexpected content `{}`", line)));
        }
    }

    let last = content.lines().count();
    blocks.extend(
        current
            .finish()
            .map_err(|message| format!("line {}: {}", last, message))?,
    );
    Ok(blocks)
}

/// A loaded PO file
pub struct PoDocument {
    path: PathBuf,
    blocks: Vec<Block>,
    /// Block positions of translatable entries, in file order
    entries: Vec<usize>,
    /// Block position of the `msgid ""` metadata entry
    header: Option<usize>,
    newline: &'static str,
    trailing_newline: bool,
    bom: bool,
}

impl PoDocument {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let catalog_error = |message: String| TranslatorError::Catalog {
            path: path.to_path_buf(),
            message,
        };

        let content = std::fs::read_to_string(path).map_err(|e| catalog_error(e.to_string()))?;
        let document = Self::parse(path, &content).map_err(catalog_error)?;
        debug!("Loaded {} entries from {}", document.len(), path.display());
        Ok(document)
    }

    fn parse(path: &Path, content: &str) -> std::result::Result<Self, String> {
        let (bom, body) = match content.strip_prefix('\u{feff}') {
            Some(body) => (true, body),
            None => (false, content),
        };
        let blocks = parse_blocks(body)?;

        let mut header = None;
        let mut entries = Vec::new();
        for (position, block) in blocks.iter().enumerate() {
            let Some(entry) = block.as_entry() else {
                continue;
            };
            let is_first = header.is_none() && entries.is_empty();
            if is_first && entry.msgid.is_empty() && entry.msgctxt.is_none() {
                header = Some(position);
            } else {
                entries.push(position);
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            blocks,
            entries,
            header,
            newline: if body.contains("\r\n") { "\r\n" } else { "\n" },
            trailing_newline: body.ends_with('\n'),
            bom,
        })
    }

    fn render(&self) -> String {
        let mut lines: Vec<&str> = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Verbatim(verbatim) => lines.extend(verbatim.iter().map(String::as_str)),
                Block::Entry(entry) => lines.extend(entry.lines().map(String::as_str)),
            }
        }

        let mut content = String::new();
        if self.bom {
            content.push('\u{feff}');
        }
        content.push_str(&lines.join(self.newline));
        if self.trailing_newline && !lines.is_empty() {
            content.push_str(self.newline);
        }
        content
    }

    /// Write the catalog back to its path.
    ///
    /// The file is written next to the target and renamed over it, so a crash
    /// mid-write leaves the previous version intact.
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut staged = NamedTempFile::new_in(&dir)?;
        staged.write_all(self.render().as_bytes())?;
        staged.flush()?;
        if let Ok(metadata) = std::fs::metadata(&self.path) {
            std::fs::set_permissions(staged.path(), metadata.permissions())?;
        }
        staged
            .persist(&self.path)
            .map_err(|e| TranslatorError::Io(e.error))?;
        debug!("Saved {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value of a header field, matched case-insensitively
    pub fn header_value(&self, key: &str) -> Option<&str> {
        let header = self.blocks.get(self.header?)?.as_entry()?;
        header.msgstr.first()?.lines().find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim().eq_ignore_ascii_case(key).then(|| value.trim())
        })
    }

    /// Declared `Language` header, if any
    pub fn language(&self) -> Option<&str> {
        self.header_value("Language").filter(|language| !language.is_empty())
    }

    /// `nplurals` from the `Plural-Forms` header
    pub fn plural_count(&self) -> Option<usize> {
        self.header_value("Plural-Forms")?
            .split(';')
            .find_map(|part| part.trim().strip_prefix("nplurals=")?.trim().parse().ok())
            .filter(|count| *count > 0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn unit(&self, index: usize) -> Option<&Entry> {
        self.blocks.get(*self.entries.get(index)?)?.as_entry()
    }

    fn unit_mut(&mut self, index: usize) -> Option<&mut Entry> {
        let position = *self.entries.get(index)?;
        self.blocks.get_mut(position)?.as_entry_mut()
    }

    fn units(&self) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter_map(|&position| self.blocks.get(position).and_then(Block::as_entry))
    }

    pub fn entry(&self, index: usize) -> Option<EntryInfo> {
        let entry = self.unit(index)?;
        let translations = if entry.is_plural() {
            entry.msgstr.clone()
        } else {
            vec![entry.msgstr.first().cloned().unwrap_or_default()]
        };

        Some(EntryInfo {
            msgid: entry.msgid.clone(),
            msgid_plural: entry.msgid_plural.clone(),
            msgctxt: entry.msgctxt.clone(),
            translations,
            fuzzy: entry.is_fuzzy(),
            comments: entry.extracted_comments().collect::<Vec<_>>().join("\n"),
        })
    }

    pub fn untranslated_indices(&self) -> Vec<usize> {
        self.units()
            .enumerate()
            .filter(|(_, entry)| entry.needs_translation())
            .map(|(index, _)| index)
            .collect()
    }

    /// Fuzzy entries with real source text
    pub fn fuzzy_indices(&self) -> Vec<usize> {
        self.units()
            .enumerate()
            .filter(|(_, entry)| entry.is_fuzzy() && !entry.msgid.trim().is_empty())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats::default();
        for entry in self.units() {
            if entry.msgid.is_empty() {
                continue;
            }
            stats.total += 1;
            if entry.needs_translation() {
                stats.untranslated += 1;
            } else {
                stats.translated += 1;
            }
            if entry.is_fuzzy() {
                stats.fuzzy += 1;
            }
        }
        stats
    }

    /// Write a translation into the entry at `index`.
    ///
    /// Scalar entries take `translations[0]`. Plural entries take
    /// `translations[0]` for form 0 and `translations[1]` (or the singular when
    /// absent) for every other form; the form count comes from `Plural-Forms`,
    /// falling back to the forms already in the file. Returns false when the
    /// index is out of range.
    pub fn apply_translation(
        &mut self,
        index: usize,
        translations: &[String],
        mark_ai_generated: bool,
        clear_fuzzy: bool,
    ) -> bool {
        let Some(singular) = translations.first() else {
            return false;
        };
        let declared_forms = self.plural_count();
        let path = self.path.display().to_string();
        let Some(entry) = self.unit_mut(index) else {
            warn!("No entry at index {} in {}", index, path);
            return false;
        };

        let forms = if entry.is_plural() {
            let plural = translations.get(1).unwrap_or(singular);
            let form_count = declared_forms.unwrap_or_else(|| entry.msgstr.len().max(2));
            (0..form_count)
                .map(|form| if form == 0 { singular.clone() } else { plural.clone() })
                .collect()
        } else {
            vec![singular.clone()]
        };
        entry.set_translations(forms);

        if clear_fuzzy {
            remove_flag(&mut entry.comments, FUZZY_FLAG);
        }
        if mark_ai_generated {
            entry.add_marker();
        }
        true
    }

    pub fn is_ai_generated(&self, index: usize) -> bool {
        self.unit(index).is_some_and(Entry::has_marker)
    }

    pub fn ai_generated_indices(&self) -> Vec<usize> {
        self.units()
            .enumerate()
            .filter(|(_, entry)| entry.has_marker())
            .map(|(index, _)| index)
            .collect()
    }

    /// Drop the provenance line, keeping other comment lines
    pub fn remove_ai_marker(&mut self, index: usize) -> bool {
        self.unit_mut(index).is_some_and(Entry::remove_marker)
    }

    /// Remove the fuzzy token from every `#,` line in the file, including the
    /// header and obsolete entries. Returns how many lines carried it.
    pub fn strip_fuzzy(&mut self) -> usize {
        self.blocks
            .iter_mut()
            .map(|block| match block {
                Block::Verbatim(lines) => remove_flag(lines, FUZZY_FLAG),
                Block::Entry(entry) => remove_flag(&mut entry.comments, FUZZY_FLAG),
            })
            .sum()
    }

    /// Destructively remove every fuzzy marker from a PO file.
    ///
    /// Translations previously flagged for review are kept as if reviewed.
    /// Prefer translating fuzzy entries with fix-fuzzy mode.
    pub fn strip_fuzzy_file<P: AsRef<Path>>(path: P) -> Result<usize> {
        let path = path.as_ref();
        let mut document = Self::load(path)?;
        let removed = document.strip_fuzzy();
        if removed > 0 {
            document.save()?;
            info!("Removed {} fuzzy markers from {}", removed, path.display());
        }
        Ok(removed)
    }
}
