//! The parsing/serialization seam shared by every supported format.

use std::{borrow::Cow, fs, path::Path};

use crate::{
    encoding,
    error::Error,
    formats::FormatType,
    types::{Document, Layout, LineEnding},
};

/// A resource file format that can be read into and written from a
/// [`Document`].
///
/// Implementors only deal with decoded, LF-normalized text that always ends
/// with a newline. The provided methods take care of byte-level concerns:
/// encoding detection, line endings and the final newline.
///
/// # Example
///
/// ```rust
/// use locsync::{Layout, traits::Parser, formats::StringsFormat};
///
/// let content = "/* Greeting */\n\"hello\" = \"Hello\";\n";
/// let doc = StringsFormat::from_str(content)?;
/// assert_eq!(doc.len(), 1);
/// assert_eq!(StringsFormat::to_bytes(&doc, Layout::Preserve)?, content.as_bytes());
/// # Ok::<(), locsync::Error>(())
/// ```
pub trait Parser {
    /// The format handled by this parser.
    fn format() -> FormatType;

    /// Parses normalized text into a document.
    fn parse_text(text: &str) -> Result<Document, Error>;

    /// Renders a document into normalized text.
    fn render_text(doc: &Document, layout: Layout) -> Result<String, Error>;

    /// Converts content kept in a binary container into text bytes. `None`
    /// when `bytes` already are text.
    fn unpack(_bytes: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        Ok(None)
    }

    /// Converts text bytes back into the binary container read by
    /// [`Parser::unpack`].
    fn pack(text: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(text.to_vec())
    }

    /// The text form of raw file content.
    fn text_bytes(bytes: &[u8]) -> Result<Cow<'_, [u8]>, Error> {
        Ok(match Self::unpack(bytes)? {
            Some(text) => Cow::Owned(text),
            None => Cow::Borrowed(bytes),
        })
    }

    /// Parse from raw file content.
    fn from_bytes(bytes: &[u8]) -> Result<Document, Error> {
        let bytes = Self::text_bytes(bytes)?;
        let binary = matches!(bytes, Cow::Owned(_));
        let (text, detected) = encoding::decode(&bytes)?;
        let line_ending = LineEnding::detect(&text);
        let mut text = LineEnding::normalize(&text);
        let final_newline = text.is_empty() || text.ends_with('\n');
        if !final_newline {
            text.push('\n');
        }

        let mut doc = Self::parse_text(&text)?;
        doc.encoding = detected;
        doc.line_ending = line_ending;
        doc.final_newline = final_newline;
        doc.binary = binary;
        Ok(doc)
    }

    /// Parse from a string.
    fn from_str(s: &str) -> Result<Document, Error> {
        Self::from_bytes(s.as_bytes())
    }

    /// Parse from file path.
    fn read_from<P: AsRef<Path>>(path: P) -> Result<Document, Error> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::from_bytes(&bytes)
    }

    /// Serialize to text, using the document's encoding and line endings.
    /// A document read from a binary container is still rendered as text.
    fn to_text_bytes(doc: &Document, layout: Layout) -> Result<Vec<u8>, Error> {
        if doc.format() != Self::format() {
            return Err(Error::FormatMismatch(format!(
                "cannot write a {} document as {}",
                doc.format(),
                Self::format()
            )));
        }

        let mut text = Self::render_text(doc, layout)?;
        if !doc.final_newline && text.ends_with('\n') {
            text.pop();
        }
        let text = doc.line_ending.apply(text);
        Ok(encoding::encode(&text, doc.encoding))
    }

    /// Serialize to file content, in the container the document was read from.
    fn to_bytes(doc: &Document, layout: Layout) -> Result<Vec<u8>, Error> {
        let text = Self::to_text_bytes(doc, layout)?;
        if doc.binary {
            Self::pack(&text)
        } else {
            Ok(text)
        }
    }
}
