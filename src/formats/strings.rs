//! Support for Apple `.strings` localization format.
//!
//! The parser keeps everything that is not an entry (blank lines, file
//! headers, stray lines) as trivia in front of the following entry, and keeps
//! the verbatim text of every entry, so an untouched file is written back
//! byte-for-byte. Comments directly above an entry (no blank line in between)
//! are attached to it. A comment that follows the `;` and ends the line stays
//! with the entry as its trailing comment.
//!
//! Keys and values are normally quoted; unquoted (old-style plist) tokens
//! made of letters, digits and `_$+/:.-` are accepted as well.

use std::collections::HashSet;

use crate::{
    error::Error,
    formats::FormatType,
    traits::Parser,
    types::{Document, Entry, Item, Layout, Value},
};

/// Parser and serializer for `.strings` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

impl Parser for Format {
    fn format() -> FormatType {
        FormatType::Strings
    }

    fn parse_text(text: &str) -> Result<Document, Error> {
        let mut doc = Document::new(FormatType::Strings);
        let mut pending: Vec<Chunk> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut pos = 0usize;

        // `pos` is at a line start, or right after an entry or block comment
        // that shares its line with what follows.
        while pos < text.len() {
            let token = skip_blanks(text, pos);
            let rest = &text[token..];

            let (kind, end) = if rest.is_empty() || rest.starts_with('\n') {
                (ChunkKind::Blank, end_of_line(text, token))
            } else if rest.starts_with("/*") {
                let close = close_block_comment(text, token)?;
                (
                    ChunkKind::Comment,
                    rest_of_line_blank(text, close).unwrap_or(close),
                )
            } else if rest.starts_with("//") {
                (ChunkKind::Comment, end_of_line(text, token))
            } else if starts_entry(text, token) {
                let (item, end) = parse_item(text, &mut pending, pos, token)?;
                if !seen.insert(item.entry.key.clone()) {
                    return Err(Error::parse(
                        line_at(text, token),
                        format!("duplicate key \"{}\"", item.entry.key),
                    ));
                }
                doc.items.push(item);
                pos = end;
                continue;
            } else {
                (ChunkKind::Stray, end_of_line(text, token))
            };
            pending.push(Chunk {
                start: pos,
                end,
                kind,
            });
            pos = end;
        }

        doc.suffix = pending
            .iter()
            .map(|chunk| &text[chunk.start..chunk.end])
            .collect();
        Ok(doc)
    }

    fn render_text(doc: &Document, layout: Layout) -> Result<String, Error> {
        doc.render_with(layout, render_entry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkKind {
    Blank,
    Comment,
    Stray,
}

/// A run of text seen since the previous entry: a whole line, or a block
/// comment that ends mid-line.
#[derive(Debug, Clone, Copy)]
struct Chunk {
    start: usize,
    end: usize,
    kind: ChunkKind,
}

/// Byte offset just past the `\n` ending the line that contains `pos`.
fn end_of_line(text: &str, pos: usize) -> usize {
    text[pos..]
        .find('\n')
        .map(|i| pos + i + 1)
        .unwrap_or(text.len())
}

/// 1-based line number of byte offset `pos`. Only used to report errors.
fn line_at(text: &str, pos: usize) -> usize {
    text[..pos.min(text.len())].matches('\n').count() + 1
}

/// Skips spaces and tabs, never a line break.
fn skip_blanks(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    pos + (rest.len() - rest.trim_start_matches([' ', '\t']).len())
}

/// If only blanks remain on the line from `pos`, the offset after its line
/// break (or the end of text).
fn rest_of_line_blank(text: &str, pos: usize) -> Option<usize> {
    let p = skip_blanks(text, pos);
    if p == text.len() {
        Some(p)
    } else if text[p..].starts_with('\n') {
        Some(p + 1)
    } else {
        None
    }
}

/// Offset just past the `*/` closing the block comment opened at `open`.
fn close_block_comment(text: &str, open: usize) -> Result<usize, Error> {
    text[open + 2..]
        .find("*/")
        .map(|i| open + 2 + i + 2)
        .ok_or_else(|| Error::parse(line_at(text, open), "unterminated block comment"))
}

fn is_bare_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '+' | '/' | ':' | '.' | '-')
}

/// Offset after the unquoted token starting at `pos`.
fn bare_token_end(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    pos + rest.find(|c: char| !is_bare_char(c)).unwrap_or(rest.len())
}

/// Whether an entry starts at `pos`: a quoted key, or an unquoted key
/// followed by `=` on the same line.
fn starts_entry(text: &str, pos: usize) -> bool {
    let rest = &text[pos..];
    if rest.starts_with('"') {
        return true;
    }
    if !rest.starts_with(is_bare_char) {
        return false;
    }
    let after = skip_blanks(text, bare_token_end(text, pos));
    text[after..].starts_with('=')
}

/// Parses the entry starting at `entry_start` and splits the pending chunks
/// into trivia and attached comment. `segment_start` is where the text after
/// the previous entry or chunk begins.
fn parse_item(
    text: &str,
    pending: &mut Vec<Chunk>,
    segment_start: usize,
    entry_start: usize,
) -> Result<(Item, usize), Error> {
    let (key, value, after) = parse_pair(text, entry_start)?;
    let (end, trailing) = entry_tail(text, after)?;

    let comment_chunks = pending
        .iter()
        .rev()
        .take_while(|chunk| chunk.kind == ChunkKind::Comment)
        .count();
    let split = pending.len() - comment_chunks;
    let leading: String = pending[..split]
        .iter()
        .map(|chunk| &text[chunk.start..chunk.end])
        .collect();
    let raw_start = pending.get(split).map_or(segment_start, |chunk| chunk.start);

    let comment: String = pending[split..]
        .iter()
        .map(|chunk| &text[chunk.start..chunk.end])
        .collect();
    let comment = comment.trim();
    pending.clear();

    let entry = Entry {
        key,
        value: Value::Text(value),
        comment: (!comment.is_empty()).then(|| comment.to_string()),
    };
    Ok((
        Item {
            entry,
            leading,
            raw: Some(text[raw_start..end].to_string()),
            trailing,
            joined: raw_start > 0 && !text[..raw_start].ends_with('\n'),
        },
        end,
    ))
}

/// Decides where an entry whose `;` ends at `after` stops. The entry keeps
/// the rest of its line when that is blank or a single comment ending the
/// line (`//`, or `/* */` possibly spanning lines). Anything else on the line,
/// such as a second entry, starts a new segment right after the `;`.
fn entry_tail(text: &str, after: usize) -> Result<(usize, Option<String>), Error> {
    if let Some(end) = rest_of_line_blank(text, after) {
        return Ok((end, None));
    }
    let p = skip_blanks(text, after);
    let rest = &text[p..];
    let comment_end = if rest.starts_with("//") {
        Some(p + rest.find('\n').unwrap_or(rest.len()))
    } else if rest.starts_with("/*") {
        let close = close_block_comment(text, p)?;
        rest_of_line_blank(text, close).map(|_| close)
    } else {
        None
    };
    Ok(match comment_end {
        Some(comment_end) => {
            let end = rest_of_line_blank(text, comment_end).unwrap_or(comment_end);
            (end, Some(text[after..comment_end].trim_end().to_string()))
        }
        None => (after, None),
    })
}

/// Parses `key = value;` starting at `start`. Returns the unescaped key and
/// value and the offset after `;`.
fn parse_pair(text: &str, start: usize) -> Result<(String, String, usize), Error> {
    let (key, mut pos) = scan_token(text, start)?;
    pos = skip_whitespace(text, pos);
    if !text[pos..].starts_with('=') {
        return Err(Error::parse(
            line_at(text, pos),
            format!("expected `=` after key \"{}\"", key),
        ));
    }
    pos = skip_whitespace(text, pos + 1);
    if !text[pos..].starts_with(|c: char| c == '"' || is_bare_char(c)) {
        return Err(Error::parse(
            line_at(text, pos),
            format!("expected value for key \"{}\"", key),
        ));
    }
    let (value, after_value) = scan_token(text, pos)?;
    pos = skip_whitespace(text, after_value);
    if !text[pos..].starts_with(';') {
        return Err(Error::parse(
            line_at(text, pos),
            format!("missing `;` after value for key \"{}\"", key),
        ));
    }
    Ok((key, value, pos + 1))
}

fn skip_whitespace(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    pos + (rest.len() - rest.trim_start().len())
}

/// Scans a quoted string or an unquoted token starting at `start`.
fn scan_token(text: &str, start: usize) -> Result<(String, usize), Error> {
    if text[start..].starts_with('"') {
        scan_quoted(text, start)
    } else {
        let end = bare_token_end(text, start);
        Ok((text[start..end].to_string(), end))
    }
}

/// Scans a quoted string whose opening quote is at `start`, returning the
/// unescaped contents and the offset after the closing quote.
fn scan_quoted(text: &str, start: usize) -> Result<(String, usize), Error> {
    let body = &text[start + 1..];
    let mut out = String::new();
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, start + 1 + i + 1)),
            '\\' => {
                let Some((j, escaped)) = chars.next() else {
                    break;
                };
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    'u' | 'U' => {
                        let escape_at = start + 1 + j;
                        let unit = read_hex4(body, j + 1).ok_or_else(|| {
                            Error::parse(line_at(text, escape_at), "invalid \\U escape")
                        })?;
                        for _ in 0..4 {
                            chars.next();
                        }
                        let decoded = if (0xD800..0xDC00).contains(&unit) {
                            // High surrogate: a low surrogate escape must follow.
                            let low = body[j + 5..]
                                .strip_prefix("\\U")
                                .or_else(|| body[j + 5..].strip_prefix("\\u"))
                                .and_then(|_| read_hex4(body, j + 7))
                                .filter(|low| (0xDC00..0xE000).contains(low))
                                .ok_or_else(|| {
                                    Error::parse(
                                        line_at(text, escape_at),
                                        "unpaired surrogate in \\U escape",
                                    )
                                })?;
                            for _ in 0..6 {
                                chars.next();
                            }
                            0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00)
                        } else {
                            unit
                        };
                        let ch = char::from_u32(decoded).ok_or_else(|| {
                            Error::parse(line_at(text, escape_at), "invalid \\U escape")
                        })?;
                        out.push(ch);
                    }
                    other => out.push(other),
                }
            }
            other => out.push(other),
        }
    }

    Err(Error::parse(line_at(text, start), "unterminated string"))
}

fn read_hex4(body: &str, at: usize) -> Option<u32> {
    let digits = body.get(at..at + 4)?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Escapes a key or value for output between double quotes.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out
}

/// Renders an entry in canonical form: its comment (if any) on the line
/// above, then `"key" = "value";`.
pub fn render_entry(entry: &Entry) -> Result<String, Error> {
    let Value::Text(value) = &entry.value else {
        return Err(Error::FormatMismatch(format!(
            "plural entry `{}` cannot be written to a .strings file",
            entry.key
        )));
    };
    let mut out = String::new();
    if let Some(comment) = &entry.comment {
        out.push_str(comment);
        out.push('\n');
    }
    out.push_str(&format!("\"{}\" = \"{}\";\n", escape(&entry.key), escape(value)));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Parser;
    use indoc::indoc;

    fn text_of(doc: &Document, key: &str) -> String {
        match &doc.get(key).unwrap().value {
            Value::Text(v) => v.clone(),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_basic_strings_with_comment() {
        let content = indoc! {r#"
            /* Greeting for the user */
            "hello" = "Hello, world!";
        "#};
        let doc = Format::from_str(content).unwrap();
        assert_eq!(doc.len(), 1);
        let entry = doc.get("hello").unwrap();
        assert_eq!(entry.value, Value::Text("Hello, world!".to_string()));
        assert_eq!(
            entry.comment.as_deref(),
            Some("/* Greeting for the user */")
        );
    }

    #[test]
    fn test_unmodified_file_round_trips_byte_for_byte() {
        let content = indoc! {r#"
            // Header written by hand.
            // Keep it.

            /* Farewell */
            "bye"   =   "Goodbye!" ;   // trailing note
            "hello" = "Hello";

            this line is not an entry
            "quote" = "Say \"hi\"\n\tplease";
            /* trailing comment */
        "#};
        let doc = Format::from_str(content).unwrap();
        let out = Format::to_bytes(&doc, Layout::Preserve).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), content);
    }

    #[test]
    fn test_crlf_and_missing_final_newline_round_trip() {
        let content = "\"a\" = \"1\";\r\n\r\n\"b\" = \"2\";";
        let doc = Format::from_str(content).unwrap();
        assert_eq!(doc.line_ending(), crate::types::LineEnding::CrLf);
        assert_eq!(text_of(&doc, "b"), "2");
        let out = Format::to_bytes(&doc, Layout::Preserve).unwrap();
        assert_eq!(out, content.as_bytes());
    }

    #[test]
    fn test_escapes_are_decoded() {
        let content = r#""k" = "a\"b\\c\nd\te\U00E9\UD83D\UDE00";"#;
        let doc = Format::from_str(content).unwrap();
        assert_eq!(text_of(&doc, "k"), "a\"b\\c\nd\teé😀");
    }

    #[test]
    fn test_multiline_value_is_one_entry() {
        let content = indoc! {r#"
            "multiline" = "This is line 1.
            This is line 2.";
            "next" = "x";
        "#};
        let doc = Format::from_str(content).unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(text_of(&doc, "multiline"), "This is line 1.\nThis is line 2.");
    }

    #[test]
    fn test_comment_separated_by_blank_line_is_not_attached() {
        let content = indoc! {r#"
            /* File header */

            // Comment for A
            "A" = "a";
            "B" = "b";
            /* Multi
               line */
            "C" = "c";
        "#};
        let doc = Format::from_str(content).unwrap();
        assert_eq!(
            doc.get("A").unwrap().comment.as_deref(),
            Some("// Comment for A")
        );
        assert_eq!(doc.get("B").unwrap().comment, None);
        assert_eq!(
            doc.get("C").unwrap().comment.as_deref(),
            Some("/* Multi\n   line */")
        );
        assert_eq!(doc.items[0].leading, "/* File header */\n\n");
    }

    #[test]
    fn test_inline_block_comment_before_entry() {
        let doc = Format::from_str("/* note */ \"k\" = \"v\";\n").unwrap();
        let entry = doc.get("k").unwrap();
        assert_eq!(entry.comment.as_deref(), Some("/* note */"));
        assert_eq!(text_of(&doc, "k"), "v");
    }

    #[test]
    fn test_stray_lines_are_preserved_not_parsed() {
        let content = indoc! {r#"
            "good" = "yes";
            bad line without equals
            "another" = "ok";
        "#};
        let doc = Format::from_str(content).unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["good", "another"]);
        assert_eq!(doc.items[1].leading, "bad line without equals\n");
    }

    #[test]
    fn test_unterminated_string_reports_line() {
        let content = "\"a\" = \"1\";\n\"b\" = \"never closed;\n";
        let err = Format::from_str(content).unwrap_err();
        match err {
            Error::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("unterminated string"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_semicolon_and_equals() {
        let err = Format::from_str("\"a\" = \"1\"\n").unwrap_err();
        assert!(err.to_string().contains("missing `;`"));

        let err = Format::from_str("\n\"a\" \"1\";\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = Format::from_str("\"a\" = \"1\";\n/* open\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let err = Format::from_str("\"a\" = \"1\";\n\"a\" = \"2\";\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn test_trailing_whitespace_is_accepted() {
        let doc = Format::from_str("\"a\" = \"1\";   \t\n").unwrap();
        assert_eq!(text_of(&doc, "a"), "1");
    }

    #[test]
    fn test_render_entry_escapes() {
        let entry = Entry::text("say", "He said \"hi\"\n").with_comment("/* c */");
        assert_eq!(
            render_entry(&entry).unwrap(),
            "/* c */\n\"say\" = \"He said \\\"hi\\\"\\n\";\n"
        );
    }

    #[test]
    fn test_sorted_layout_orders_entries() {
        let content = indoc! {r#"
            // header
            "b" = "2";
            "a" = "1";
        "#};
        let doc = Format::from_str(content).unwrap();
        let out = Format::to_bytes(&doc, Layout::Sorted).unwrap();
        let out = String::from_utf8(out).unwrap();
        let reparsed = Format::from_str(&out).unwrap();
        assert_eq!(reparsed.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(text_of(&reparsed, "b"), "2");
    }

    #[test]
    fn test_utf16_file_is_read() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "\"hello\" = \"Hallo\";\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let doc = Format::from_bytes(&bytes).unwrap();
        assert_eq!(text_of(&doc, "hello"), "Hallo");
        assert_eq!(Format::to_bytes(&doc, Layout::Preserve).unwrap(), bytes);
    }

    #[test]
    fn test_entries_sharing_a_line_are_separate() {
        let content = "\"a\" = \"1\"; \"b\" = \"2\";\n\"c\" = \"3\";\n";
        let doc = Format::from_str(content).unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(text_of(&doc, "b"), "2");
        let out = Format::to_bytes(&doc, Layout::Preserve).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), content);
    }

    #[test]
    fn test_replacing_first_entry_on_a_shared_line_keeps_the_second() {
        let mut doc = Format::from_str("\"a\" = \"1\"; \"b\" = \"2\";\n").unwrap();
        doc.replace(Entry::text("a", "9"), None);
        let out = String::from_utf8(Format::to_bytes(&doc, Layout::Preserve).unwrap()).unwrap();
        assert_eq!(out, "\"a\" = \"9\";\n \"b\" = \"2\";\n");

        let reparsed = Format::from_str(&out).unwrap();
        assert_eq!(text_of(&reparsed, "a"), "9");
        assert_eq!(text_of(&reparsed, "b"), "2");
    }

    #[test]
    fn test_replaced_second_entry_moves_to_its_own_line() {
        let mut doc = Format::from_str("\"a\" = \"1\"; \"b\" = \"2\";\n").unwrap();
        doc.replace(Entry::text("b", "9").with_comment("/* new */"), None);
        let out = String::from_utf8(Format::to_bytes(&doc, Layout::Preserve).unwrap()).unwrap();
        assert_eq!(out, "\"a\" = \"1\";\n/* new */\n\"b\" = \"9\";\n");

        let reparsed = Format::from_str(&out).unwrap();
        assert_eq!(reparsed.get("a").unwrap().comment, None);
        assert_eq!(reparsed.get("b").unwrap().comment.as_deref(), Some("/* new */"));
    }

    #[test]
    fn test_trailing_comment_survives_replacement() {
        let content = indoc! {r#"
            "a" = "1"; // keep me
            "b" = "2"; /* spans
               two lines */
            "c" = "3";
        "#};
        let mut doc = Format::from_str(content).unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(doc.get("b").unwrap().comment, None);
        assert_eq!(
            Format::to_bytes(&doc, Layout::Preserve).unwrap(),
            content.as_bytes()
        );

        doc.replace(Entry::text("a", "9"), Some("\"a\" = \"9\";\n".to_string()));
        doc.replace(Entry::text("b", "8"), None);
        let out = String::from_utf8(Format::to_bytes(&doc, Layout::Preserve).unwrap()).unwrap();
        assert_eq!(
            out,
            indoc! {r#"
                "a" = "9"; // keep me
                "b" = "8"; /* spans
                   two lines */
                "c" = "3";
            "#}
        );
    }

    #[test]
    fn test_errors_after_semicolon_are_reported() {
        let err = Format::from_str("\"a\" = \"1\"; \"b\" = \"open\n").unwrap_err();
        match err {
            Error::Parse { line, message } => {
                assert_eq!(line, 1);
                assert!(message.contains("unterminated string"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = Format::from_str("\"a\" = \"1\"; /* open\n\"b\" = \"2\";\n").unwrap_err();
        assert!(err.to_string().contains("unterminated block comment"));
    }

    #[test]
    fn test_unquoted_keys_and_values() {
        let content = indoc! {r#"
            greeting = "Hello";
            "count" = 42;
            app.name=Demo_App;
        "#};
        let doc = Format::from_str(content).unwrap();
        assert_eq!(
            doc.keys().collect::<Vec<_>>(),
            vec!["greeting", "count", "app.name"]
        );
        assert_eq!(text_of(&doc, "greeting"), "Hello");
        assert_eq!(text_of(&doc, "count"), "42");
        assert_eq!(text_of(&doc, "app.name"), "Demo_App");
        assert_eq!(
            Format::to_bytes(&doc, Layout::Preserve).unwrap(),
            content.as_bytes()
        );
    }

    #[test]
    fn test_unquoted_key_without_value_is_an_error() {
        let err = Format::from_str("\"a\" = \"1\";\nkey = ;\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
        assert!(err.to_string().contains("expected value"));
    }

    #[test]
    fn test_large_file_parses() {
        let content: String = (0..20_000)
            .map(|i| format!("/* c{i} */\n\"key.{i}\" = \"value {i}\";\n\n"))
            .collect();
        let doc = Format::from_str(&content).unwrap();
        assert_eq!(doc.len(), 20_000);
        assert_eq!(text_of(&doc, "key.19999"), "value 19999");
    }
}
