//! Message parsing from a byte stream.

use crate::content_type::ContentType;
use crate::encoding::TransferEncoding;
use crate::error::{Error, Result};
use crate::handler::{PartHandler, PartHeader};
use crate::header::{HeaderParser, Headers, field};
use crate::message::Message;
use crate::recipient::{Recipient, RecipientKind, parse_address_list};
use std::io::BufRead;

/// Nesting depth up to which multipart segments are descended into.
const MAX_MULTIPART_DEPTH: usize = 8;

impl Message {
    /// Reads a message, reporting each part of a multipart body to `handler`.
    ///
    /// A single-part body is kept verbatim as the message content and the
    /// handler is not called. For a multipart body the handler receives
    /// every leaf part in order, decoded from its transfer encoding; the
    /// returned message carries the top-level headers only.
    ///
    /// # Errors
    ///
    /// - [`Error::NoMessage`] if the stream is empty.
    /// - [`Error::MessageFormat`] on a malformed header block or multipart
    ///   structure.
    /// - Decoding errors for invalid part content.
    /// - Any error returned by the handler, unchanged.
    pub fn read<R, H>(reader: &mut R, handler: &mut H) -> Result<Self>
    where
        R: BufRead + ?Sized,
        H: PartHandler + ?Sized,
    {
        let Some((headers, has_body)) = read_header_block(reader)? else {
            return Err(Error::NoMessage);
        };
        let mut message = Self::from_wire_headers(headers);
        if !has_body {
            return Ok(message);
        }

        match multipart_boundary(&message.headers) {
            Some(boundary) => {
                tracing::debug!(boundary = %boundary, "Reading multipart message");
                read_multipart(reader, &boundary, handler, 0)?;
            }
            None => {
                reader.read_to_end(&mut message.content)?;
            }
        }
        Ok(message)
    }

    /// Reads a message without interpreting its body.
    ///
    /// The whole body, multipart or not, is kept verbatim as the message
    /// content.
    ///
    /// # Errors
    ///
    /// - [`Error::NoMessage`] if the stream is empty.
    /// - [`Error::MessageFormat`] on a malformed header block.
    pub fn read_raw<R: BufRead + ?Sized>(reader: &mut R) -> Result<Self> {
        let Some((headers, has_body)) = read_header_block(reader)? else {
            return Err(Error::NoMessage);
        };
        let mut message = Self::from_wire_headers(headers);
        if has_body {
            reader.read_to_end(&mut message.content)?;
        }
        Ok(message)
    }

    fn from_wire_headers(mut headers: Headers) -> Self {
        let mut recipients = Vec::new();
        for kind in RecipientKind::ALL {
            for value in headers.remove(kind.header_name()) {
                recipients.extend(parse_address_list(&value).into_iter().map(
                    |(name, address)| match name {
                        Some(name) => Recipient::with_name(kind, address, name),
                        None => Recipient::new(kind, address),
                    },
                ));
            }
        }

        let encoding = headers
            .get(field::CONTENT_TRANSFER_ENCODING)
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse);

        Self {
            headers,
            recipients,
            encoding,
            content_is_encoded: true,
            ..Self::default()
        }
    }
}

/// Reads a header block up to and including the blank line.
///
/// Returns `None` if the stream is already at its end, otherwise the fields
/// and whether a blank line (and so a body) followed.
fn read_header_block<R: BufRead + ?Sized>(reader: &mut R) -> Result<Option<(Headers, bool)>> {
    let mut parser = HeaderParser::new();
    let mut line = Vec::new();
    let mut seen_data = false;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            if seen_data {
                return Ok(Some((parser.finish(), false)));
            }
            return Ok(None);
        }
        seen_data = true;

        let text = String::from_utf8_lossy(trim_eol(&line));
        if text.is_empty() {
            return Ok(Some((parser.finish(), true)));
        }
        parser.push_line(&text)?;
    }
}

fn multipart_boundary(headers: &Headers) -> Option<String> {
    let content_type = ContentType::parse(headers.get(field::CONTENT_TYPE)?).ok()?;
    if !content_type.is_multipart() {
        return None;
    }
    content_type
        .boundary()
        .filter(|boundary| !boundary.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Part,
    Close,
}

/// Classifies a line as a delimiter of `boundary`.
///
/// Trailing whitespace after the delimiter is tolerated.
fn classify(line: &[u8], boundary: &str) -> Option<Delimiter> {
    let line = trim_eol(line).trim_ascii_end();
    let rest = line.strip_prefix(b"--")?.strip_prefix(boundary.as_bytes())?;
    match rest {
        b"" => Some(Delimiter::Part),
        b"--" => Some(Delimiter::Close),
        _ => None,
    }
}

/// Reads a multipart body up to and including its close delimiter.
fn read_multipart<R, H>(reader: &mut R, boundary: &str, handler: &mut H, depth: usize) -> Result<()>
where
    R: BufRead + ?Sized,
    H: PartHandler + ?Sized,
{
    let mut line = Vec::new();

    // Preamble
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Err(Error::format(format!(
                "No delimiter for boundary {boundary:?}"
            )));
        }
        match classify(&line, boundary) {
            Some(Delimiter::Part) => break,
            Some(Delimiter::Close) => return Ok(()),
            None => {}
        }
    }

    let mut segment = Vec::new();
    let mut count = 0;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Err(Error::format(format!(
                "Missing close delimiter for boundary {boundary:?}"
            )));
        }

        let Some(delimiter) = classify(&line, boundary) else {
            segment.extend_from_slice(&line);
            continue;
        };

        // The line break before a delimiter belongs to the delimiter
        let body_end = segment.len() - eol_length(&segment);
        handle_segment(&segment[..body_end], handler, depth)?;
        segment.clear();
        count += 1;

        if delimiter == Delimiter::Close {
            tracing::debug!(boundary, parts = count, "Multipart body complete");
            return Ok(());
        }
    }
}

fn handle_segment<H: PartHandler + ?Sized>(segment: &[u8], handler: &mut H, depth: usize) -> Result<()> {
    let mut cursor = segment;
    let (fields, has_body) = read_header_block(&mut cursor)?.unwrap_or_default();
    let header = PartHeader::new(fields);
    let body = if has_body { cursor } else { &[][..] };

    if let Some(boundary) = multipart_boundary(&header) {
        if depth + 1 >= MAX_MULTIPART_DEPTH {
            return Err(Error::format(format!(
                "Multipart nesting deeper than {MAX_MULTIPART_DEPTH} levels"
            )));
        }
        tracing::trace!(boundary = %boundary, depth = depth + 1, "Descending into nested multipart");
        let mut nested = body;
        return read_multipart(&mut nested, &boundary, handler, depth + 1);
    }

    let encoding = match header.get(field::CONTENT_TRANSFER_ENCODING) {
        Some(value) => TransferEncoding::from_token(value).unwrap_or_else(|| {
            tracing::warn!(encoding = value, "Unknown transfer encoding, treating as 7bit");
            TransferEncoding::SevenBit
        }),
        None => TransferEncoding::SevenBit,
    };
    let decoded = encoding.decode(body)?;

    tracing::trace!(
        content_type = %header.content_type().mime_type(),
        size = decoded.len(),
        "Read part"
    );
    handler.handle_part(&header, &decoded)
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn eol_length(data: &[u8]) -> usize {
    if data.ends_with(b"\r\n") {
        2
    } else {
        usize::from(data.ends_with(b"\n"))
    }
}
