//! Text encoding detection for resource files.
//!
//! Apple tooling historically wrote `.strings` files as UTF-16, so both
//! UTF-8 and UTF-16 (either byte order, with or without a BOM) are accepted.
//! The detected encoding is kept on the parsed document and reused when the
//! file is written back.

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

use crate::error::Error;

/// Character encoding of a text resource, including whether it carried a BOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8 { bom: bool },
    Utf16Le { bom: bool },
    Utf16Be { bom: bool },
}

impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::Utf8 { bom: false }
    }
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 { .. } => "UTF-8",
            TextEncoding::Utf16Le { .. } => "UTF-16LE",
            TextEncoding::Utf16Be { .. } => "UTF-16BE",
        }
    }

    pub fn has_bom(&self) -> bool {
        match *self {
            TextEncoding::Utf8 { bom }
            | TextEncoding::Utf16Le { bom }
            | TextEncoding::Utf16Be { bom } => bom,
        }
    }
}

/// Decodes `bytes` into a string, sniffing the encoding.
///
/// A BOM always wins. Without one, NUL bytes in an even-length buffer mark
/// UTF-16 (the byte order follows where the NULs sit), valid UTF-8 is taken
/// as UTF-8 and anything else is tried as little-endian UTF-16.
pub fn decode(bytes: &[u8]) -> Result<(String, TextEncoding), Error> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let text = decode_strict(encoding, &bytes[bom_len..])?;
        let detected = if encoding == UTF_16LE {
            TextEncoding::Utf16Le { bom: true }
        } else if encoding == UTF_16BE {
            TextEncoding::Utf16Be { bom: true }
        } else {
            TextEncoding::Utf8 { bom: true }
        };
        return Ok((text, detected));
    }

    if let Some(encoding) = sniff_bomless_utf16(bytes) {
        let text = decode_strict(encoding, bytes)?;
        let detected = if encoding == UTF_16LE {
            TextEncoding::Utf16Le { bom: false }
        } else {
            TextEncoding::Utf16Be { bom: false }
        };
        return Ok((text, detected));
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => Ok((text.to_string(), TextEncoding::Utf8 { bom: false })),
        Err(_) if bytes.len() % 2 == 0 => {
            let text = decode_strict(UTF_16LE, bytes)?;
            Ok((text, TextEncoding::Utf16Le { bom: false }))
        }
        Err(e) => Err(Error::Encoding(format!(
            "content is neither UTF-8 nor UTF-16: {}",
            e
        ))),
    }
}

fn sniff_bomless_utf16(bytes: &[u8]) -> Option<&'static Encoding> {
    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return None;
    }
    let (mut even_nuls, mut odd_nuls) = (0usize, 0usize);
    for (i, b) in bytes.iter().enumerate() {
        if *b == 0 {
            if i % 2 == 0 {
                even_nuls += 1;
            } else {
                odd_nuls += 1;
            }
        }
    }
    match (even_nuls, odd_nuls) {
        (0, 0) => None,
        (even, odd) if odd >= even => Some(UTF_16LE),
        _ => Some(UTF_16BE),
    }
}

fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Result<String, Error> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| {
            Error::Encoding(format!(
                "malformed {} content",
                if encoding == UTF_8 {
                    "UTF-8"
                } else {
                    encoding.name()
                }
            ))
        })
}

/// Encodes `text` back into bytes using `encoding`, writing a BOM if the
/// original had one.
pub fn encode(text: &str, encoding: TextEncoding) -> Vec<u8> {
    match encoding {
        TextEncoding::Utf8 { bom } => {
            let mut out = Vec::with_capacity(text.len() + 3);
            if bom {
                out.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
            }
            out.extend_from_slice(text.as_bytes());
            out
        }
        TextEncoding::Utf16Le { bom } => {
            let mut out = Vec::with_capacity(text.len() * 2 + 2);
            if bom {
                out.extend_from_slice(&[0xFF, 0xFE]);
            }
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out
        }
        TextEncoding::Utf16Be { bom } => {
            let mut out = Vec::with_capacity(text.len() * 2 + 2);
            if bom {
                out.extend_from_slice(&[0xFE, 0xFF]);
            }
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_be_bytes());
            }
            out
        }
    }
}
