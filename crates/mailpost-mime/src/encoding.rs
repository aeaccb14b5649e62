//! Content-Transfer-Encoding codecs (RFC 2045).
//!
//! `7bit` and `8bit` are identity transforms: the caller is responsible for
//! handing in data that is already valid for the transport. Quoted-Printable
//! and Base64 output is wrapped with CRLF so that no line exceeds
//! [`MAX_LINE_LENGTH`] characters.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::fmt::Write as _;

/// Maximum length of an encoded line, excluding the CRLF terminator.
pub const MAX_LINE_LENGTH: usize = 76;

/// Content transfer encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII text, written as is.
    SevenBit,
    /// 8-bit text, written as is.
    EightBit,
    /// Quoted-Printable encoding.
    #[default]
    QuotedPrintable,
    /// Base64 encoding.
    Base64,
}

impl TransferEncoding {
    /// Parses a transfer encoding token.
    ///
    /// Matching is case-insensitive. Unknown tokens fall back to `7bit`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        Self::from_token(s).unwrap_or(Self::SevenBit)
    }

    /// Parses a transfer encoding token, returning `None` if it is unknown.
    #[must_use]
    pub fn from_token(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "7bit" => Some(Self::SevenBit),
            "8bit" => Some(Self::EightBit),
            "quoted-printable" => Some(Self::QuotedPrintable),
            "base64" => Some(Self::Base64),
            _ => None,
        }
    }

    /// Returns the canonical header token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::QuotedPrintable => "quoted-printable",
            Self::Base64 => "base64",
        }
    }

    /// Returns true if data passes through this encoding unchanged.
    #[must_use]
    pub const fn is_identity(self) -> bool {
        matches!(self, Self::SevenBit | Self::EightBit)
    }

    /// Encodes raw bytes with this encoding.
    #[must_use]
    pub fn encode(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::SevenBit | Self::EightBit => data.to_vec(),
            Self::QuotedPrintable => encode_quoted_printable(data).into_bytes(),
            Self::Base64 => encode_base64(data).into_bytes(),
        }
    }

    /// Decodes bytes that were encoded with this encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid for the encoding.
    pub fn decode(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::SevenBit | Self::EightBit => Ok(data.to_vec()),
            Self::QuotedPrintable => decode_quoted_printable(data),
            Self::Base64 => decode_base64(data),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encodes raw bytes with the given transfer encoding.
#[must_use]
pub fn encode(data: &[u8], encoding: TransferEncoding) -> Vec<u8> {
    encoding.encode(data)
}

/// Decodes transfer-encoded bytes.
///
/// # Errors
///
/// Returns [`Error::Encoding`] or [`Error::Base64`] if the input is invalid.
pub fn decode(data: &[u8], encoding: TransferEncoding) -> Result<Vec<u8>> {
    encoding.decode(data)
}

/// Encodes data as Base64, wrapped at [`MAX_LINE_LENGTH`] characters.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);

    for (i, ch) in encoded.chars().enumerate() {
        if i > 0 && i % MAX_LINE_LENGTH == 0 {
            result.push_str("\r\n");
        }
        result.push(ch);
    }

    result
}

/// Decodes Base64 data.
///
/// Line breaks and other ASCII whitespace are ignored.
///
/// # Errors
///
/// Returns an error on characters outside the alphabet or bad padding.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Encodes bytes using Quoted-Printable encoding.
///
/// CRLF pairs are kept as hard line breaks; every other byte outside
/// printable ASCII, and `=` itself, becomes `=XX`. A space is escaped when
/// it would otherwise end a line.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() + data.len() / 2);
    let mut line_length = 0;
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];

        if byte == b'\r' && data.get(i + 1) == Some(&b'\n') {
            result.push_str("\r\n");
            line_length = 0;
            i += 2;
            continue;
        }

        let ends_line = match data.get(i + 1) {
            None => true,
            Some(b'\r') => data.get(i + 2) == Some(&b'\n'),
            Some(_) => false,
        };
        let literal = match byte {
            b'!'..=b'<' | b'>'..=b'~' => true,
            b' ' => !ends_line,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // Leave room for the soft break marker
        if line_length + width > MAX_LINE_LENGTH - 1 {
            result.push_str("=\r\n");
            line_length = 0;
        }

        if literal {
            result.push(char::from(byte));
        } else {
            let _ = write!(result, "={byte:02X}");
        }
        line_length += width;
        i += 1;
    }

    result
}

/// Decodes Quoted-Printable data.
///
/// Soft line breaks are removed, hard line breaks (CRLF or bare LF) become
/// CRLF, and trailing whitespace added in transit is dropped.
///
/// # Errors
///
/// Returns [`Error::Encoding`] on a malformed `=XX` escape.
pub fn decode_quoted_printable(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut lines = data.split(|&b| b == b'\n').peekable();

    while let Some(line) = lines.next() {
        let hard_break = lines.peek().is_some();
        let line = trim_line_end(line);
        let (content, soft_break) = match line.strip_suffix(b"=") {
            Some(content) => (content, true),
            None => (line, false),
        };

        decode_qp_line(content, &mut result)?;

        if hard_break && !soft_break {
            result.extend_from_slice(b"\r\n");
        }
    }

    Ok(result)
}

fn decode_qp_line(line: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let mut bytes = line.iter().copied();

    while let Some(byte) = bytes.next() {
        if byte != b'=' {
            out.push(byte);
            continue;
        }

        let (Some(hi), Some(lo)) = (bytes.next(), bytes.next()) else {
            return Err(Error::Encoding("Incomplete escape sequence".to_string()));
        };
        match (hex_value(hi), hex_value(lo)) {
            (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
            _ => {
                return Err(Error::Encoding(format!(
                    "Invalid escape sequence ={}{}",
                    char::from(hi),
                    char::from(lo)
                )));
            }
        }
    }

    Ok(())
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !matches!(b, b' ' | b'\t' | b'\r'))
        .map_or(0, |pos| pos + 1);
    &line[..end]
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}
