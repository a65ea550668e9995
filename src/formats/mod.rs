//! All supported localization file formats for locsync.
//!
//! This module re-exports the parser for each format and provides the
//! [`FormatType`] enum for generic format handling across the crate.

pub mod strings;
pub mod stringsdict;

use std::{
    borrow::Cow,
    fmt::{Display, Formatter},
    path::Path,
    str::FromStr,
};

// Reexporting the formats for easier access
pub use strings::Format as StringsFormat;
pub use stringsdict::Format as StringsdictFormat;

use crate::{
    Error,
    traits::Parser,
    types::{Document, Layout},
};

/// Represents all supported localization file formats for generic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatType {
    /// Apple `.strings`: flat `"key" = "value";` pairs.
    Strings,
    /// Apple `.stringsdict`: XML property list of plural rules.
    Stringsdict,
}

/// Implements [`std::fmt::Display`] for [`FormatType`].
///
/// # Example
/// ```rust
/// use locsync::formats::FormatType;
/// assert_eq!(FormatType::Strings.to_string(), "strings");
/// assert_eq!(FormatType::Stringsdict.to_string(), "stringsdict");
/// ```
impl Display for FormatType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatType::Strings => write!(f, "strings"),
            FormatType::Stringsdict => write!(f, "stringsdict"),
        }
    }
}

/// Implements [`std::str::FromStr`] for [`FormatType`].
///
/// Accepts `"strings"` and `"stringsdict"` (case-insensitive, surrounding
/// whitespace ignored). Returns [`crate::error::Error::UnknownFormat`] for
/// anything else.
///
/// # Example
/// ```rust
/// use locsync::formats::FormatType;
/// use std::str::FromStr;
/// assert_eq!(FormatType::from_str("strings").unwrap(), FormatType::Strings);
/// assert_eq!(FormatType::from_str("StringsDict").unwrap(), FormatType::Stringsdict);
/// assert!(FormatType::from_str("xcstrings").is_err());
/// ```
impl FromStr for FormatType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "strings" => Ok(FormatType::Strings),
            "stringsdict" => Ok(FormatType::Stringsdict),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

impl FormatType {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            FormatType::Strings => "strings",
            FormatType::Stringsdict => "stringsdict",
        }
    }

    /// Infers the format from a file's extension.
    ///
    /// ```rust
    /// use locsync::formats::FormatType;
    /// assert_eq!(
    ///     FormatType::from_path("fr.lproj/Localizable.stringsdict"),
    ///     Some(FormatType::Stringsdict)
    /// );
    /// assert_eq!(FormatType::from_path("values/strings.xml"), None);
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<FormatType> {
        match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("strings") => Some(FormatType::Strings),
            Some("stringsdict") => Some(FormatType::Stringsdict),
            _ => None,
        }
    }

    /// Parses raw file content in this format.
    pub fn parse(&self, bytes: &[u8]) -> Result<Document, Error> {
        match self {
            FormatType::Strings => StringsFormat::from_bytes(bytes),
            FormatType::Stringsdict => StringsdictFormat::from_bytes(bytes),
        }
    }

    /// Serializes a document of this format.
    pub fn serialize(&self, doc: &Document, layout: Layout) -> Result<Vec<u8>, Error> {
        match self {
            FormatType::Strings => StringsFormat::to_bytes(doc, layout),
            FormatType::Stringsdict => StringsdictFormat::to_bytes(doc, layout),
        }
    }

    /// Serializes a document of this format as text, even when it was read
    /// from a binary container.
    pub fn serialize_text(&self, doc: &Document, layout: Layout) -> Result<Vec<u8>, Error> {
        match self {
            FormatType::Strings => StringsFormat::to_text_bytes(doc, layout),
            FormatType::Stringsdict => StringsdictFormat::to_text_bytes(doc, layout),
        }
    }

    /// The text form of raw file content in this format.
    pub fn text_bytes<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, [u8]>, Error> {
        match self {
            FormatType::Strings => StringsFormat::text_bytes(bytes),
            FormatType::Stringsdict => StringsdictFormat::text_bytes(bytes),
        }
    }

    /// Puts text produced by [`FormatType::serialize_text`] back into the
    /// document's binary container. `None` for documents read as text.
    pub fn pack(&self, doc: &Document, text: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        if !doc.is_binary() {
            return Ok(None);
        }
        match self {
            FormatType::Strings => StringsFormat::pack(text),
            FormatType::Stringsdict => StringsdictFormat::pack(text),
        }
        .map(Some)
    }

    /// Text of a brand-new, empty file, split around the entry slots.
    pub(crate) fn empty_skeleton(&self) -> (&'static str, &'static str) {
        match self {
            FormatType::Strings => ("", ""),
            FormatType::Stringsdict => (stringsdict::PLIST_HEADER, stringsdict::PLIST_FOOTER),
        }
    }

    /// Trivia placed in front of a newly inserted entry.
    pub(crate) fn entry_indent(&self) -> &'static str {
        match self {
            FormatType::Strings => "",
            FormatType::Stringsdict => "\n\t",
        }
    }

    /// Whether the first entry's trivia holds the file header (so it must stay
    /// at the top when an entry is inserted in front).
    pub(crate) fn header_in_leading(&self) -> bool {
        matches!(self, FormatType::Strings)
    }
}
