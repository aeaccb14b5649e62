//! Callbacks for parts discovered while reading a multipart message.
//!
//! # Example
//!
//! ```ignore
//! use mailpost_mime::{Message, PartCollector};
//!
//! let mut collector = PartCollector::new();
//! let message = Message::read(&mut input, &mut collector)?;
//! for part in collector.parts() {
//!     println!("{:?}: {} bytes", part.header().name(), part.body().len());
//! }
//! ```

use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::TransferEncoding;
use crate::error::Result;
use crate::header::{Headers, field};
use crate::part::Disposition;
use std::ops::Deref;

/// Header fields of a single part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartHeader {
    fields: Headers,
}

impl PartHeader {
    /// Wraps parsed part header fields.
    #[must_use]
    pub const fn new(fields: Headers) -> Self {
        Self { fields }
    }

    /// Returns the raw header fields.
    #[must_use]
    pub const fn fields(&self) -> &Headers {
        &self.fields
    }

    /// Returns the content type, `text/plain` if absent or unparsable.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.fields
            .get(field::CONTENT_TYPE)
            .and_then(|value| ContentType::parse(value).ok())
            .unwrap_or_else(ContentType::text_plain)
    }

    /// Returns the transfer encoding, `7bit` if absent.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.fields
            .get(field::CONTENT_TRANSFER_ENCODING)
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Returns the parsed `Content-Disposition`, if present.
    #[must_use]
    pub fn content_disposition(&self) -> Option<ContentDisposition> {
        self.fields
            .get(field::CONTENT_DISPOSITION)
            .map(ContentDisposition::parse)
    }

    /// Returns the disposition, `inline` if absent.
    #[must_use]
    pub fn disposition(&self) -> Disposition {
        self.content_disposition()
            .map_or(Disposition::Inline, |cd| cd.disposition)
    }

    /// Returns the part name.
    ///
    /// Taken from the `Content-Type` `name` parameter, falling back to the
    /// `Content-Disposition` `filename` parameter.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.content_type()
            .name()
            .map(str::to_string)
            .or_else(|| self.filename())
    }

    /// Returns the `Content-Disposition` filename parameter.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.content_disposition()
            .and_then(|cd| cd.filename().map(str::to_string))
    }
}

impl Deref for PartHeader {
    type Target = Headers;

    fn deref(&self) -> &Headers {
        &self.fields
    }
}

/// Receives the parts of a multipart message as it is read.
///
/// Called once per part, in message order, with the body already decoded
/// from its transfer encoding. Returning an error aborts the read.
pub trait PartHandler {
    /// Handles one part.
    ///
    /// # Errors
    ///
    /// Any error is propagated out of the read unchanged.
    fn handle_part(&mut self, header: &PartHeader, body: &[u8]) -> Result<()>;
}

impl<F> PartHandler for F
where
    F: FnMut(&PartHeader, &[u8]) -> Result<()>,
{
    fn handle_part(&mut self, header: &PartHeader, body: &[u8]) -> Result<()> {
        self(header, body)
    }
}

/// A part captured by [`PartCollector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPart {
    header: PartHeader,
    body: Vec<u8>,
}

impl ReceivedPart {
    /// Returns the part header.
    #[must_use]
    pub const fn header(&self) -> &PartHeader {
        &self.header
    }

    /// Returns the decoded body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the decoded body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn body_text(&self) -> std::result::Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    /// Consumes the part, returning its body.
    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

/// Handler that keeps every part in memory.
#[derive(Debug, Clone, Default)]
pub struct PartCollector {
    parts: Vec<ReceivedPart>,
}

impl PartCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the collected parts in message order.
    #[must_use]
    pub fn parts(&self) -> &[ReceivedPart] {
        &self.parts
    }

    /// Consumes the collector, returning the parts.
    #[must_use]
    pub fn into_parts(self) -> Vec<ReceivedPart> {
        self.parts
    }
}

impl PartHandler for PartCollector {
    fn handle_part(&mut self, header: &PartHeader, body: &[u8]) -> Result<()> {
        self.parts.push(ReceivedPart {
            header: header.clone(),
            body: body.to_vec(),
        });
        Ok(())
    }
}

/// A handler that logs each part using tracing and discards it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl PartHandler for LoggingHandler {
    fn handle_part(&mut self, header: &PartHeader, body: &[u8]) -> Result<()> {
        tracing::debug!(
            content_type = %header.content_type().mime_type(),
            disposition = %header.disposition(),
            name = ?header.name(),
            size = body.len(),
            "PART"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::Level;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn log_part_at(level: Level) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            LoggingHandler
                .handle_part(&PartHeader::default(), b"abc")
                .unwrap();
        });
        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn header(text: &str) -> PartHeader {
        PartHeader::new(Headers::parse(text).unwrap())
    }

    #[test]
    fn test_part_header_accessors() {
        let header = header(concat!(
            "Content-Type: application/pdf; name=\"report.pdf\"\r\n",
            "Content-Disposition: attachment; filename=\"report-final.pdf\"\r\n",
            "Content-Transfer-Encoding: BASE64\r\n",
        ));

        assert_eq!(header.content_type().mime_type(), "application/pdf");
        assert_eq!(header.transfer_encoding(), TransferEncoding::Base64);
        assert_eq!(header.disposition(), Disposition::Attachment);
        assert_eq!(header.name().as_deref(), Some("report.pdf"));
        assert_eq!(header.filename().as_deref(), Some("report-final.pdf"));
        assert!(header.has("content-disposition"));
    }

    #[test]
    fn test_part_header_defaults() {
        let header = PartHeader::default();
        assert_eq!(header.content_type(), ContentType::text_plain());
        assert_eq!(header.transfer_encoding(), TransferEncoding::SevenBit);
        assert_eq!(header.disposition(), Disposition::Inline);
        assert_eq!(header.name(), None);
    }

    #[test]
    fn test_name_falls_back_to_filename() {
        let header = header("Content-Disposition: attachment; filename=a.txt\r\n");
        assert_eq!(header.name().as_deref(), Some("a.txt"));
    }

    #[test]
    fn test_collector() {
        let mut collector = PartCollector::new();
        collector
            .handle_part(&header("Content-Type: text/plain\r\n"), b"one")
            .unwrap();
        collector.handle_part(&PartHeader::default(), b"two").unwrap();

        let parts = collector.into_parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].body_text().unwrap(), "one");
        assert_eq!(parts[1].clone().into_body(), b"two");
    }

    #[test]
    fn test_closure_handler() {
        let mut sizes = Vec::new();
        let mut handler = |_: &PartHeader, body: &[u8]| -> Result<()> {
            sizes.push(body.len());
            Ok(())
        };
        handler.handle_part(&PartHeader::default(), b"abc").unwrap();
        handler.handle_part(&PartHeader::default(), b"").unwrap();
        assert_eq!(sizes, vec![3, 0]);
    }

    #[test]
    fn test_closure_handler_error() {
        let mut handler =
            |_: &PartHeader, _: &[u8]| -> Result<()> { Err(Error::handler("rejected")) };
        let err = handler.handle_part(&PartHeader::default(), b"").unwrap_err();
        assert!(matches!(err, Error::Handler(_)));
    }

    #[test]
    fn test_logging_handler_logs_at_debug() {
        assert!(log_part_at(Level::INFO).is_empty());

        let logged = log_part_at(Level::DEBUG);
        assert!(logged.contains("DEBUG"));
        assert!(logged.contains("PART"));
        assert!(logged.contains("size=3"));
    }
}
