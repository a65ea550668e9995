//! Support for Apple `.stringsdict` plural resources (XML property lists).
//!
//! Every top-level key of the root dictionary maps to a dictionary holding an
//! `NSStringLocalizedFormatKey` and one variable dictionary per `%#@name@`
//! placeholder. The parser records the exact source text of each top-level
//! entry so untouched entries are written back verbatim; new or changed
//! entries are rendered in the tab-indented layout Xcode produces.
//!
//! Entries built on variable-width or device-specific rules are carried as
//! opaque XML. Binary property lists are read through their XML form and
//! written back as binary.

use std::{
    collections::{BTreeMap, HashSet},
    io::Cursor,
};

use indoc::indoc;
use quick_xml::{Reader, escape::partial_escape, events::Event};

use crate::{
    error::Error,
    formats::FormatType,
    traits::Parser,
    types::{Document, Entry, Item, Layout, Plural, PluralVariable, Selector, Value},
};

pub const FORMAT_KEY: &str = "NSStringLocalizedFormatKey";
pub const SPEC_TYPE_KEY: &str = "NSStringFormatSpecTypeKey";
pub const VALUE_TYPE_KEY: &str = "NSStringFormatValueTypeKey";

/// Rule types whose entries are kept as verbatim XML.
pub const OPAQUE_RULE_TYPES: [&str; 2] = [
    "NSStringVariableWidthRuleType",
    "NSStringDeviceSpecificRuleType",
];

const BINARY_MAGIC: &[u8] = b"bplist";

pub(crate) const PLIST_HEADER: &str = indoc! {r#"
    <?xml version="1.0" encoding="UTF-8"?>
    <!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
    <plist version="1.0">
    <dict>"#};

pub(crate) const PLIST_FOOTER: &str = "\n</dict>\n</plist>\n";

/// Parser and serializer for `.stringsdict` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Format;

impl Parser for Format {
    fn format() -> FormatType {
        FormatType::Stringsdict
    }

    fn unpack(bytes: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        if !bytes.starts_with(BINARY_MAGIC) {
            return Ok(None);
        }
        let value = plist::Value::from_reader(Cursor::new(bytes))
            .map_err(|e| Error::parse(1, format!("malformed binary property list: {}", e)))?;
        let mut xml = Vec::new();
        value
            .to_writer_xml(&mut xml)
            .map_err(|e| Error::Encoding(format!("cannot convert binary property list: {}", e)))?;
        if !xml.ends_with(b"\n") {
            xml.push(b'\n');
        }
        Ok(Some(xml))
    }

    fn pack(text: &[u8]) -> Result<Vec<u8>, Error> {
        let value = plist::Value::from_reader_xml(text)
            .map_err(|e| Error::Encoding(format!("cannot re-read merged property list: {}", e)))?;
        let mut out = Vec::new();
        value
            .to_writer_binary(&mut out)
            .map_err(|e| Error::Encoding(format!("cannot write binary property list: {}", e)))?;
        Ok(out)
    }

    fn parse_text(text: &str) -> Result<Document, Error> {
        let mut doc = Document::new(FormatType::Stringsdict);
        let mut xml = PlistReader::new(text);

        let (at, event) = xml.next_node()?;
        match event {
            Event::Start(ref e) if e.name().as_ref() == b"plist" => {}
            Event::Eof => return Err(Error::parse(xml.line(at), "missing <plist> root element")),
            _ => return Err(Error::parse(xml.line(at), "expected <plist> root element")),
        }

        let (at, event) = xml.next_node()?;
        match event {
            Event::Start(ref e) if e.name().as_ref() == b"dict" => {}
            Event::Empty(ref e) if e.name().as_ref() == b"dict" => {
                let end = xml.position();
                xml.expect_end_of_plist()?;
                doc.prefix = format!("{}<dict>", &text[..at]);
                doc.suffix = format!("\n</dict>{}", &text[end..]);
                doc.empty_form = Some(text.to_string());
                return Ok(doc);
            }
            _ => return Err(Error::parse(xml.line(at), "expected <dict> inside <plist>")),
        }

        doc.prefix = text[..xml.position()].to_string();
        let mut segment_start = xml.position();
        let mut seen: HashSet<String> = HashSet::new();
        loop {
            let (at, event) = xml.next_node()?;
            match event {
                Event::End(ref e) if e.name().as_ref() == b"dict" => {
                    doc.suffix = text[segment_start..].to_string();
                    xml.expect_end_of_plist()?;
                    break;
                }
                Event::Start(ref e) if e.name().as_ref() == b"key" => {
                    let key = xml.read_text(b"key")?;
                    let (value_at, value) = xml.next_node()?;
                    let fields = match value {
                        Event::Start(ref v) if v.name().as_ref() == b"dict" => xml.read_dict()?,
                        _ => {
                            return Err(Error::parse(
                                xml.line(value_at),
                                format!("value for key \"{}\" must be a <dict>", key),
                            ));
                        }
                    };
                    let end = xml.position();

                    if !seen.insert(key.clone()) {
                        return Err(Error::parse(xml.line(at), format!("duplicate key \"{}\"", key)));
                    }
                    let value = if uses_opaque_rule(&fields) {
                        Value::Opaque(text[value_at..end].to_string())
                    } else {
                        Value::Plural(plural_from_fields(text, &key, fields, at)?)
                    };
                    doc.items.push(Item {
                        entry: Entry {
                            key,
                            value,
                            comment: None,
                        },
                        leading: text[segment_start..at].to_string(),
                        raw: Some(text[at..end].to_string()),
                        trailing: None,
                        joined: false,
                    });
                    segment_start = end;
                }
                Event::Eof => {
                    return Err(Error::parse(
                        xml.line(at),
                        "unexpected end of file inside root <dict>",
                    ));
                }
                _ => {
                    return Err(Error::parse(
                        xml.line(at),
                        "expected <key> inside root <dict>",
                    ));
                }
            }
        }

        if doc.items.is_empty() {
            doc.empty_form = Some(text.to_string());
            if !doc.suffix.starts_with('\n') {
                doc.suffix.insert(0, '\n');
            }
        }
        Ok(doc)
    }

    fn render_text(doc: &Document, layout: Layout) -> Result<String, Error> {
        doc.render_with(layout, render_entry)
    }
}

/// A value inside a plist dictionary. Only strings and dictionaries carry
/// meaning for `.stringsdict`; other element names are kept for error
/// reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PlistValue {
    String(String),
    Dict(Vec<Field>),
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    key: String,
    value: PlistValue,
    /// Offset of the field's `<key>` tag.
    at: usize,
}

struct PlistReader<'a> {
    text: &'a str,
    reader: Reader<&'a [u8]>,
}

impl<'a> PlistReader<'a> {
    fn new(text: &'a str) -> Self {
        PlistReader {
            text,
            reader: Reader::from_str(text),
        }
    }

    fn position(&self) -> usize {
        self.reader.buffer_position() as usize
    }

    fn line(&self, pos: usize) -> usize {
        line_at(self.text, pos)
    }

    fn read(&mut self) -> Result<Event<'a>, Error> {
        match self.reader.read_event() {
            Ok(event) => Ok(event),
            Err(e) => Err(Error::parse(
                self.line(self.position()),
                format!("malformed XML: {}", e),
            )),
        }
    }

    /// Returns the next structural event and the offset it starts at,
    /// skipping whitespace, comments and prolog events.
    fn next_node(&mut self) -> Result<(usize, Event<'a>), Error> {
        loop {
            let at = self.position();
            match self.read()? {
                Event::Text(ref t) if t.iter().all(u8::is_ascii_whitespace) => continue,
                Event::Comment(_) | Event::Decl(_) | Event::DocType(_) | Event::PI(_) => continue,
                event => return Ok((at, event)),
            }
        }
    }

    /// Reads character data up to the closing `</end>` tag.
    fn read_text(&mut self, end: &[u8]) -> Result<String, Error> {
        let mut out = String::new();
        loop {
            let at = self.position();
            match self.read()? {
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| Error::parse(self.line(at), e.to_string()))?;
                    out.push_str(&text);
                }
                Event::CData(c) => out.push_str(&String::from_utf8_lossy(&c)),
                Event::Comment(_) => {}
                Event::End(ref e) if e.name().as_ref() == end => return Ok(out),
                Event::Eof => {
                    return Err(Error::parse(self.line(at), "unexpected end of file"));
                }
                _ => {
                    return Err(Error::parse(
                        self.line(at),
                        format!(
                            "unexpected markup inside <{}>",
                            String::from_utf8_lossy(end)
                        ),
                    ));
                }
            }
        }
    }

    /// Reads `<key>`/value pairs up to the closing `</dict>`.
    fn read_dict(&mut self) -> Result<Vec<Field>, Error> {
        let mut fields = Vec::new();
        loop {
            let (at, event) = self.next_node()?;
            match event {
                Event::End(ref e) if e.name().as_ref() == b"dict" => return Ok(fields),
                Event::Start(ref e) if e.name().as_ref() == b"key" => {
                    let key = self.read_text(b"key")?;
                    let (value_at, value) = self.next_node()?;
                    let value = match value {
                        Event::Start(ref v) => {
                            let name = v.name().as_ref().to_vec();
                            self.read_value(&name)?
                        }
                        Event::Empty(ref v) => empty_value(v.name().as_ref()),
                        _ => {
                            return Err(Error::parse(
                                self.line(value_at),
                                format!("missing value for key \"{}\"", key),
                            ));
                        }
                    };
                    fields.push(Field { key, value, at });
                }
                Event::Eof => {
                    return Err(Error::parse(
                        self.line(at),
                        "unexpected end of file inside <dict>",
                    ));
                }
                _ => return Err(Error::parse(self.line(at), "expected <key> inside <dict>")),
            }
        }
    }

    fn read_value(&mut self, name: &[u8]) -> Result<PlistValue, Error> {
        match name {
            b"string" => self.read_text(b"string").map(PlistValue::String),
            b"dict" => self.read_dict().map(PlistValue::Dict),
            other => {
                self.skip_element()?;
                Ok(PlistValue::Other(String::from_utf8_lossy(other).into_owned()))
            }
        }
    }

    /// Skips the rest of an element whose start tag was just read.
    fn skip_element(&mut self) -> Result<(), Error> {
        let mut depth = 1usize;
        while depth > 0 {
            let at = self.position();
            match self.read()? {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth -= 1,
                Event::Eof => return Err(Error::parse(self.line(at), "unexpected end of file")),
                _ => {}
            }
        }
        Ok(())
    }

    /// Expects `</plist>` followed by nothing but whitespace and comments.
    fn expect_end_of_plist(&mut self) -> Result<(), Error> {
        let (at, event) = self.next_node()?;
        if !matches!(event, Event::End(ref e) if e.name().as_ref() == b"plist") {
            return Err(Error::parse(self.line(at), "expected </plist> after root <dict>"));
        }
        let (at, event) = self.next_node()?;
        if !matches!(event, Event::Eof) {
            return Err(Error::parse(self.line(at), "unexpected content after </plist>"));
        }
        Ok(())
    }
}

fn empty_value(name: &[u8]) -> PlistValue {
    match name {
        b"string" => PlistValue::String(String::new()),
        b"dict" => PlistValue::Dict(Vec::new()),
        other => PlistValue::Other(String::from_utf8_lossy(other).into_owned()),
    }
}

/// Whether a width or device rule appears anywhere in the entry, as a key
/// or as a spec type.
fn uses_opaque_rule(fields: &[Field]) -> bool {
    fields.iter().any(|field| {
        OPAQUE_RULE_TYPES.contains(&field.key.as_str())
            || match &field.value {
                PlistValue::String(value) => OPAQUE_RULE_TYPES.contains(&value.as_str()),
                PlistValue::Dict(inner) => uses_opaque_rule(inner),
                PlistValue::Other(_) => false,
            }
    })
}

/// 1-based line number of byte offset `pos`. Only used to report errors.
fn line_at(text: &str, pos: usize) -> usize {
    text[..pos.min(text.len())].matches('\n').count() + 1
}

fn plural_from_fields(
    text: &str,
    key: &str,
    fields: Vec<Field>,
    at: usize,
) -> Result<Plural, Error> {
    let mut format_key = None;
    let mut variables = BTreeMap::new();

    for field in fields {
        match (field.key.as_str(), field.value) {
            (FORMAT_KEY, PlistValue::String(value)) => format_key = Some(value),
            (FORMAT_KEY, _) => {
                return Err(Error::parse(
                    line_at(text, field.at),
                    format!("{} of \"{}\" must be a <string>", FORMAT_KEY, key),
                ));
            }
            (name, PlistValue::Dict(inner)) => {
                let variable = variable_from_fields(text, key, name, inner, field.at)?;
                variables.insert(name.to_string(), variable);
            }
            (name, _) => {
                return Err(Error::parse(
                    line_at(text, field.at),
                    format!("variable \"{}\" of \"{}\" must be a <dict>", name, key),
                ));
            }
        }
    }

    let format_key = format_key.ok_or_else(|| {
        Error::parse(line_at(text, at), format!("\"{}\" has no {}", key, FORMAT_KEY))
    })?;
    Ok(Plural {
        format_key,
        variables,
    })
}

fn variable_from_fields(
    text: &str,
    key: &str,
    name: &str,
    fields: Vec<Field>,
    at: usize,
) -> Result<PluralVariable, Error> {
    let mut spec_type = None;
    let mut value_type = None;
    let mut variants = BTreeMap::new();

    for field in fields {
        let PlistValue::String(value) = field.value else {
            return Err(Error::parse(
                line_at(text, field.at),
                format!(
                    "\"{}\" in variable \"{}\" of \"{}\" must be a <string>",
                    field.key, name, key
                ),
            ));
        };
        match field.key.as_str() {
            SPEC_TYPE_KEY => spec_type = Some(value),
            VALUE_TYPE_KEY => value_type = Some(value),
            selector => {
                variants.insert(Selector::from(selector), value);
            }
        }
    }

    let spec_type = spec_type.ok_or_else(|| {
        Error::parse(
            line_at(text, at),
            format!("variable \"{}\" of \"{}\" has no {}", name, key, SPEC_TYPE_KEY),
        )
    })?;
    Ok(PluralVariable {
        spec_type,
        value_type,
        variants,
    })
}

/// Renders a plural entry starting at its `<key>` tag; the caller supplies
/// the newline and indentation in front of it.
pub fn render_entry(entry: &Entry) -> Result<String, Error> {
    let plural = match &entry.value {
        Value::Plural(plural) => plural,
        Value::Opaque(xml) => {
            let mut out = String::new();
            push_key(&mut out, 0, &entry.key);
            push_line(&mut out, 1, xml);
            return Ok(out);
        }
        Value::Text(_) => {
            return Err(Error::FormatMismatch(format!(
                "flat entry `{}` cannot be written to a .stringsdict file",
                entry.key
            )));
        }
    };

    let mut out = String::new();
    push_key(&mut out, 0, &entry.key);
    push_line(&mut out, 1, "<dict>");
    push_key(&mut out, 2, FORMAT_KEY);
    push_string(&mut out, 2, &plural.format_key);
    for (name, variable) in &plural.variables {
        push_key(&mut out, 2, name);
        push_line(&mut out, 2, "<dict>");
        push_key(&mut out, 3, SPEC_TYPE_KEY);
        push_string(&mut out, 3, &variable.spec_type);
        if let Some(value_type) = &variable.value_type {
            push_key(&mut out, 3, VALUE_TYPE_KEY);
            push_string(&mut out, 3, value_type);
        }
        for (selector, text) in &variable.variants {
            push_key(&mut out, 3, selector.as_str());
            push_string(&mut out, 3, text);
        }
        push_line(&mut out, 2, "</dict>");
    }
    push_line(&mut out, 1, "</dict>");
    Ok(out)
}

fn push_line(out: &mut String, depth: usize, line: &str) {
    if !out.is_empty() {
        out.push('\n');
        out.extend(std::iter::repeat_n('\t', depth));
    }
    out.push_str(line);
}

fn push_key(out: &mut String, depth: usize, key: &str) {
    push_line(out, depth, &format!("<key>{}</key>", partial_escape(key)));
}

fn push_string(out: &mut String, depth: usize, value: &str) {
    push_line(out, depth, &format!("<string>{}</string>", partial_escape(value)));
}
