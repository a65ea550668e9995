//! Core types shared by the parsers, the merge resolver and the serializers.
//!
//! A [`Document`] is an ordered list of [`Entry`] values together with the
//! layout needed to write the file back exactly as it was read: the trivia
//! (blank lines, stray lines, XML whitespace) in front of every entry, the raw
//! text of every entry that has not been touched, the line-ending convention
//! and the text encoding.

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{encoding::TextEncoding, error::Error, formats::FormatType};

/// A single localization unit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Entry {
    /// Unique key within the document.
    pub key: String,

    /// Flat text or plural variants.
    pub value: Value,

    /// Comment attached to the entry, markers included (`/* ... */`, `// ...`).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub comment: Option<String>,
}

impl Entry {
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Entry {
            key: key.into(),
            value: Value::Text(value.into()),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn is_plural(&self) -> bool {
        matches!(self.value, Value::Plural(_))
    }
}

impl Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entry {{ key: {}, value: {} }}", self.key, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum Value {
    /// A flat `.strings` value, unescaped.
    Text(String),

    /// A `.stringsdict` plural rule set.
    Plural(Plural),

    /// A `.stringsdict` value carried without interpretation: the verbatim
    /// XML of a dictionary using variable-width or device-specific rules.
    Opaque(String),
}

impl Value {
    /// Human name of the value's shape, used in merge error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Text(_) => "flat",
            Value::Plural(_) => "plural",
            Value::Opaque(_) => "rule-based",
        }
    }

    /// Whether the value lives in a `.strings` file rather than a
    /// `.stringsdict` one.
    pub fn is_flat(&self) -> bool {
        matches!(self, Value::Text(_))
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Text(value) => write!(f, "{}", value),
            Value::Plural(plural) => write!(f, "{}", plural.format_key),
            Value::Opaque(xml) => write!(f, "{}", xml),
        }
    }
}

/// The dictionary stored under one `.stringsdict` key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Plural {
    /// The `NSStringLocalizedFormatKey` format specifier, e.g. `%#@items@`.
    pub format_key: String,

    /// Variables referenced from the format key, by name.
    #[serde(default)]
    pub variables: BTreeMap<String, PluralVariable>,
}

/// One `%#@name@` variable of a plural entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PluralVariable {
    /// `NSStringFormatSpecTypeKey`, normally `NSStringPluralRuleType`.
    pub spec_type: String,

    /// `NSStringFormatValueTypeKey`, e.g. `d` or `lld`.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub value_type: Option<String>,

    /// Text per variant selector.
    #[serde(default)]
    pub variants: BTreeMap<Selector, String>,
}

impl PluralVariable {
    pub fn plural_rule() -> Self {
        PluralVariable {
            spec_type: PLURAL_RULE_TYPE.to_string(),
            value_type: None,
            variants: BTreeMap::new(),
        }
    }
}

pub const PLURAL_RULE_TYPE: &str = "NSStringPluralRuleType";

/// Key selecting one variant of a plural variable.
///
/// CLDR categories sort first, in their natural order, followed by any other
/// selector (device or width rules) in byte order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Selector {
    Category(PluralCategory),
    Other(String),
}

impl Selector {
    pub fn as_str(&self) -> &str {
        match self {
            Selector::Category(category) => category.as_str(),
            Selector::Other(name) => name,
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        match s.parse::<PluralCategory>() {
            Ok(category) if category.as_str() == s => Selector::Category(category),
            _ => Selector::Other(s.to_string()),
        }
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard CLDR plural forms.
#[derive(Ord, PartialOrd, Eq, PartialEq, Debug, Clone, Copy, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

impl PluralCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluralCategory::Zero => "zero",
            PluralCategory::One => "one",
            PluralCategory::Two => "two",
            PluralCategory::Few => "few",
            PluralCategory::Many => "many",
            PluralCategory::Other => "other",
        }
    }
}

impl FromStr for PluralCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ZERO" => Ok(PluralCategory::Zero),
            "ONE" => Ok(PluralCategory::One),
            "TWO" => Ok(PluralCategory::Two),
            "FEW" => Ok(PluralCategory::Few),
            "MANY" => Ok(PluralCategory::Many),
            "OTHER" => Ok(PluralCategory::Other),
            _ => Err(format!("Unknown plural category: {}", s)),
        }
    }
}

/// Line-ending convention of a text resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    /// Detects the convention from the first line break; LF when there is none.
    pub fn detect(text: &str) -> Self {
        match text.find('\n') {
            Some(idx) if idx > 0 && text.as_bytes()[idx - 1] == b'\r' => LineEnding::CrLf,
            _ => LineEnding::Lf,
        }
    }

    pub fn normalize(text: &str) -> String {
        text.replace("\r\n", "\n")
    }

    pub fn apply(&self, text: String) -> String {
        match self {
            LineEnding::Lf => text,
            LineEnding::CrLf => text.replace('\n', "\r\n"),
        }
    }
}

/// Entry ordering used when a document is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Keep document order. New keys are placed by the merge at their sorted
    /// position among the existing ones.
    #[default]
    Preserve,

    /// Re-emit every entry in byte-wise key order. Trivia stays in place.
    Sorted,
}

/// An entry plus the text that surrounds it in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Item {
    pub entry: Entry,
    /// Trivia in front of the entry (and in front of its comment).
    pub leading: String,
    /// Verbatim text of the entry, comment included. `None` once the entry
    /// has been replaced, in which case it is rendered canonically.
    pub raw: Option<String>,
    /// Comment sharing the entry's last line (`"k" = "v"; // note`), kept
    /// when the entry is rendered canonically.
    pub trailing: Option<String>,
    /// The verbatim text starts on the line where the previous entry ended
    /// (`"a" = "1"; "b" = "2";`).
    pub joined: bool,
}

impl Item {
    pub fn fresh(entry: Entry) -> Self {
        Item {
            entry,
            leading: String::new(),
            raw: None,
            trailing: None,
            joined: false,
        }
    }

    fn render<F>(&self, render: &F) -> Result<String, Error>
    where
        F: Fn(&Entry) -> Result<String, Error>,
    {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone());
        }
        let mut out = render(&self.entry)?;
        if let Some(trailing) = &self.trailing {
            let newline = out.ends_with('\n');
            if newline {
                out.pop();
            }
            out.push_str(trailing);
            if newline {
                out.push('\n');
            }
        }
        Ok(out)
    }
}

/// One parsed resource file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub(crate) format: FormatType,
    pub(crate) items: Vec<Item>,
    /// Text before the first entry slot (the plist header for `.stringsdict`).
    pub(crate) prefix: String,
    /// Text after the last entry.
    pub(crate) suffix: String,
    /// Verbatim text to emit while the document has no entries, when the
    /// empty form differs from `prefix + suffix` (a collapsed `<dict/>`).
    pub(crate) empty_form: Option<String>,
    pub(crate) line_ending: LineEnding,
    pub(crate) encoding: TextEncoding,
    pub(crate) final_newline: bool,
    /// Read from a binary property list; written back as one.
    pub(crate) binary: bool,
}

impl Document {
    /// Creates an empty document for `format`, laid out as a new file would be.
    pub fn new(format: FormatType) -> Self {
        let (prefix, suffix) = format.empty_skeleton();
        Document {
            format,
            items: Vec::new(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            empty_form: None,
            line_ending: LineEnding::Lf,
            encoding: TextEncoding::default(),
            final_newline: true,
            binary: false,
        }
    }

    /// Builds a document from entries, rejecting duplicate keys.
    pub fn from_entries(
        format: FormatType,
        entries: impl IntoIterator<Item = Entry>,
    ) -> Result<Self, Error> {
        let mut doc = Document::new(format);
        for entry in entries {
            if doc.contains_key(&entry.key) {
                return Err(Error::FormatMismatch(format!(
                    "duplicate key `{}`",
                    entry.key
                )));
            }
            let mut item = Item::fresh(entry);
            item.leading = format.entry_indent().to_string();
            doc.items.push(item);
        }
        Ok(doc)
    }

    pub fn format(&self) -> FormatType {
        self.format
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Whether the file was a binary property list.
    pub fn is_binary(&self) -> bool {
        self.binary
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entries in document order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.items.iter().map(|item| &item.entry)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.entry.key.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.items
            .iter()
            .find(|item| item.entry.key == key)
            .map(|item| &item.entry)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub(crate) fn position(&self, key: &str) -> Option<usize> {
        self.items.iter().position(|item| item.entry.key == key)
    }

    /// Verbatim text of `key` when it can be moved to another slot or file as
    /// is. A `.strings` entry that shares a line with another entry cannot.
    pub(crate) fn portable_raw(&self, key: &str) -> Option<&str> {
        let item = self.items.iter().find(|item| item.entry.key == key)?;
        let raw = item.raw.as_deref()?;
        match self.format {
            FormatType::Strings if item.joined || !raw.ends_with('\n') => None,
            _ => Some(raw),
        }
    }

    /// Replaces the entry stored under `entry.key`, keeping its trivia. An
    /// entry with a same-line trailing comment is rendered canonically so the
    /// comment survives.
    pub(crate) fn replace(&mut self, entry: Entry, raw: Option<String>) {
        if let Some(idx) = self.position(&entry.key) {
            let item = &mut self.items[idx];
            item.entry = entry;
            let keeps_comment = item.trailing.is_some();
            item.raw = if keeps_comment { None } else { raw };
        }
    }

    /// Inserts a new entry before the first existing key that sorts after it.
    ///
    /// In a file whose keys are sorted the new entry lands at its sorted
    /// position; otherwise the placement is still deterministic.
    pub(crate) fn insert_sorted(&mut self, entry: Entry, raw: Option<String>) {
        let idx = self
            .items
            .iter()
            .position(|item| item.entry.key.as_bytes() > entry.key.as_bytes())
            .unwrap_or(self.items.len());

        let mut item = Item {
            entry,
            leading: self.format.entry_indent().to_string(),
            raw,
            trailing: None,
            joined: false,
        };
        if idx == 0 && self.format.header_in_leading() {
            if let Some(first) = self.items.first_mut() {
                item.leading = std::mem::take(&mut first.leading);
            }
        }
        self.items.insert(idx, item);
    }

    /// Removes the entry stored under `key`. Non-blank trivia in front of it
    /// is handed to the next entry (or to the file tail) so nothing but the
    /// entry and its comment disappears.
    pub(crate) fn remove(&mut self, key: &str) -> Option<Entry> {
        let idx = self.position(key)?;
        let removed = self.items.remove(idx);
        if !removed.leading.trim().is_empty() {
            match self.items.get_mut(idx) {
                Some(next) => next.leading.insert_str(0, &removed.leading),
                None => self.suffix.insert_str(0, &removed.leading),
            }
        }
        Some(removed.entry)
    }

    /// Concatenates the document, rendering entries without raw text through
    /// `render`.
    pub(crate) fn render_with<F>(&self, layout: Layout, render: F) -> Result<String, Error>
    where
        F: Fn(&Entry) -> Result<String, Error>,
    {
        if self.items.is_empty()
            && let Some(empty) = &self.empty_form
        {
            return Ok(empty.clone());
        }

        let mut order: Vec<usize> = (0..self.items.len()).collect();
        if layout == Layout::Sorted {
            order.sort_by(|&a, &b| {
                self.items[a]
                    .entry
                    .key
                    .as_bytes()
                    .cmp(self.items[b].entry.key.as_bytes())
            });
        }

        let mut out = String::with_capacity(self.prefix.len() + self.suffix.len());
        out.push_str(&self.prefix);
        // Trivia stays in its slot; only the entries move under `Sorted`.
        for (slot, &idx) in order.iter().enumerate() {
            let leading = &self.items[slot].leading;
            let item = &self.items[idx];
            let text = item.render(&render)?;
            // Only an untouched entry may stay on the line of its predecessor.
            if self.format == FormatType::Strings
                && leading.is_empty()
                && !(item.joined && item.raw.is_some() && layout == Layout::Preserve)
                && !out.is_empty()
                && !out.ends_with('\n')
            {
                out.push('\n');
            }
            out.push_str(leading);
            out.push_str(&text);
        }
        if self.format == FormatType::Strings && !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.suffix);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(doc: &Document) -> Vec<&str> {
        doc.keys().collect()
    }

    #[test]
    fn test_selector_from_str_prefers_categories() {
        assert_eq!(
            Selector::from("one"),
            Selector::Category(PluralCategory::One)
        );
        assert_eq!(Selector::from("ONE"), Selector::Other("ONE".to_string()));
        assert_eq!(Selector::from("ipad"), Selector::Other("ipad".to_string()));
    }

    #[test]
    fn test_selector_ordering_is_cldr_then_bytes() {
        let mut selectors = vec![
            Selector::from("other"),
            Selector::from("iphone"),
            Selector::from("zero"),
            Selector::from("few"),
            Selector::from("appletv"),
        ];
        selectors.sort();
        let names: Vec<&str> = selectors.iter().map(Selector::as_str).collect();
        assert_eq!(names, vec!["zero", "few", "other", "appletv", "iphone"]);
    }

    #[test]
    fn test_plural_category_from_str() {
        assert_eq!("Few".parse::<PluralCategory>(), Ok(PluralCategory::Few));
        assert!("several".parse::<PluralCategory>().is_err());
    }

    #[test]
    fn test_line_ending_detection() {
        assert_eq!(LineEnding::detect("a\r\nb\n"), LineEnding::CrLf);
        assert_eq!(LineEnding::detect("a\nb\r\n"), LineEnding::Lf);
        assert_eq!(LineEnding::detect("no break"), LineEnding::Lf);
        assert_eq!(LineEnding::CrLf.apply("a\nb\n".to_string()), "a\r\nb\r\n");
    }

    #[test]
    fn test_from_entries_rejects_duplicates() {
        let err = Document::from_entries(
            FormatType::Strings,
            vec![Entry::text("a", "1"), Entry::text("a", "2")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate key `a`"));
    }

    #[test]
    fn test_insert_sorted_places_key_before_first_greater() {
        let mut doc = Document::from_entries(
            FormatType::Strings,
            vec![Entry::text("alpha", "1"), Entry::text("gamma", "3")],
        )
        .unwrap();
        doc.insert_sorted(Entry::text("beta", "2"), None);
        doc.insert_sorted(Entry::text("zeta", "4"), None);
        doc.insert_sorted(Entry::text("Aardvark", "0"), None);
        assert_eq!(keys(&doc), vec!["Aardvark", "alpha", "beta", "gamma", "zeta"]);
    }

    #[test]
    fn test_insert_at_front_keeps_header_on_top() {
        let mut doc = Document::from_entries(FormatType::Strings, vec![Entry::text("m", "1")])
            .unwrap();
        doc.items[0].leading = "// header\n\n".to_string();
        doc.insert_sorted(Entry::text("a", "0"), None);
        assert_eq!(doc.items[0].leading, "// header\n\n");
        assert_eq!(doc.items[1].leading, "");
    }

    #[test]
    fn test_remove_hands_trivia_to_next_entry() {
        let mut doc = Document::from_entries(
            FormatType::Strings,
            vec![Entry::text("a", "1"), Entry::text("b", "2")],
        )
        .unwrap();
        doc.items[0].leading = "// header\n".to_string();
        doc.items[1].leading = "\n".to_string();
        let removed = doc.remove("a").unwrap();
        assert_eq!(removed.key, "a");
        assert_eq!(doc.items[0].leading, "// header\n\n");
        assert!(doc.remove("missing").is_none());
    }

    #[test]
    fn test_remove_drops_blank_trivia() {
        let mut doc = Document::from_entries(
            FormatType::Strings,
            vec![Entry::text("a", "1"), Entry::text("b", "2")],
        )
        .unwrap();
        doc.items[1].leading = "\n\n".to_string();
        doc.remove("b");
        assert_eq!(doc.suffix, "");
    }

    #[test]
    fn test_render_sorted_keeps_trivia_slots() {
        let mut doc = Document::from_entries(
            FormatType::Strings,
            vec![Entry::text("b", "2"), Entry::text("a", "1")],
        )
        .unwrap();
        doc.items[0].leading = "// header\n".to_string();
        let rendered = doc
            .render_with(Layout::Sorted, |entry| Ok(format!("{}\n", entry.key)))
            .unwrap();
        assert_eq!(rendered, "// header\na\nb\n");
        let preserved = doc
            .render_with(Layout::Preserve, |entry| Ok(format!("{}\n", entry.key)))
            .unwrap();
        assert_eq!(preserved, "// header\nb\na\n");
    }
}
