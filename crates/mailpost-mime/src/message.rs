//! Mail message model.

use crate::content_type::ContentType;
use crate::encoding::TransferEncoding;
use crate::error::Result;
use crate::header::{Headers, field};
use crate::part::{Disposition, Part, PartSource};
use crate::recipient::Recipient;
use chrono::{DateTime, FixedOffset, TimeZone};
use std::fmt;

/// An Internet mail message.
///
/// A message is either single-part, carrying its body in [`content`], or
/// multipart, carrying a list of [`Part`]s. Adding a part turns a
/// single-part message into a multipart one for good.
///
/// Header fields the model does not cover are reachable through
/// [`headers`] and [`headers_mut`].
///
/// [`content`]: Message::content
/// [`headers`]: Message::headers
/// [`headers_mut`]: Message::headers_mut
#[derive(Debug, Default)]
pub struct Message {
    pub(crate) headers: Headers,
    pub(crate) recipients: Vec<Recipient>,
    pub(crate) parts: Vec<Part>,
    pub(crate) content: Vec<u8>,
    pub(crate) encoding: TransferEncoding,
    /// Content is already in wire form, as read from a stream.
    pub(crate) content_is_encoded: bool,
}

impl Message {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the header fields.
    ///
    /// Recipients are kept separately and do not appear here.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the header fields for modification.
    pub const fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Adds a recipient.
    pub fn add_recipient(&mut self, recipient: Recipient) {
        self.recipients.push(recipient);
    }

    /// Returns all recipients, `Bcc` included, in insertion order.
    #[must_use]
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Sets the subject.
    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.headers.set(field::SUBJECT, subject);
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get(field::SUBJECT)
    }

    /// Sets the sender, written as the `From` field.
    pub fn set_sender(&mut self, sender: impl Into<String>) {
        self.headers.set(field::FROM, sender);
    }

    /// Returns the sender from the `From` field.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.headers.get(field::FROM)
    }

    /// Sets the content of a single-part message.
    ///
    /// With `7bit` or `8bit` the content must already follow the rules of
    /// an Internet mail body (CRLF line endings, line length limits).
    pub fn set_content(&mut self, content: impl Into<Vec<u8>>, encoding: TransferEncoding) {
        self.content = content.into();
        self.encoding = encoding;
        self.content_is_encoded = false;
    }

    /// Returns the content of a single-part message.
    ///
    /// For a message that was read, this is the body exactly as it appeared
    /// on the wire, and writing the message sends it out unchanged.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Returns the content as text, if it is valid UTF-8.
    #[must_use]
    pub fn content_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    /// Returns the content decoded from the message's transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid for the encoding.
    pub fn decoded_content(&self) -> Result<Vec<u8>> {
        self.encoding.decode(&self.content)
    }

    /// Returns the transfer encoding of the single-part content.
    #[must_use]
    pub const fn content_transfer_encoding(&self) -> TransferEncoding {
        self.encoding
    }

    /// Sets the `Content-Type` field.
    ///
    /// Accepts a string such as `text/html; charset=utf-8` or a
    /// [`ContentType`].
    pub fn set_content_type(&mut self, content_type: impl fmt::Display) {
        self.headers
            .set(field::CONTENT_TYPE, content_type.to_string());
    }

    /// Returns the `Content-Type` field.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(field::CONTENT_TYPE)
    }

    /// Sets the `Date` field.
    pub fn set_date<Tz: TimeZone>(&mut self, date: &DateTime<Tz>)
    where
        Tz::Offset: fmt::Display,
    {
        self.headers.set(field::DATE, date.to_rfc2822());
    }

    /// Returns the parsed `Date` field.
    ///
    /// Returns `None` if the field is missing or not valid RFC 2822.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.headers
            .get(field::DATE)
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
    }

    /// Returns true if this is a multipart message.
    ///
    /// That is the case once a part was added, or when the `Content-Type`
    /// of a message that was read is `multipart/*`.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        !self.parts.is_empty()
            || self
                .content_type()
                .and_then(|value| ContentType::parse(value).ok())
                .is_some_and(|ct| ct.is_multipart())
    }

    /// Adds a part, taking ownership of its source.
    ///
    /// Converts the message to a multipart message if it is not one yet.
    pub fn add_part(
        &mut self,
        name: impl Into<String>,
        source: impl PartSource + 'static,
        disposition: Disposition,
        encoding: TransferEncoding,
    ) {
        self.make_multipart();
        self.parts
            .push(Part::new(name, Box::new(source), disposition, encoding));
    }

    /// Adds an unnamed inline part.
    pub fn add_content(&mut self, source: impl PartSource + 'static, encoding: TransferEncoding) {
        self.add_part("", source, Disposition::Inline, encoding);
    }

    /// Adds a named attachment.
    pub fn add_attachment(
        &mut self,
        name: impl Into<String>,
        source: impl PartSource + 'static,
        encoding: TransferEncoding,
    ) {
        self.add_part(name, source, Disposition::Attachment, encoding);
    }

    /// Returns the parts in the order they were added.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    fn make_multipart(&mut self) {
        if self.parts.is_empty() {
            self.content.clear();
            self.content_is_encoded = false;
            self.set_content_type(ContentType::new("multipart", "mixed"));
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::part::StringPartSource;
    use crate::recipient::RecipientKind;
    use chrono::Utc;

    #[test]
    fn test_message_new() {
        let message = Message::new();
        assert!(message.headers().is_empty());
        assert!(message.recipients().is_empty());
        assert!(message.content().is_empty());
        assert!(!message.is_multipart());
        assert_eq!(
            message.content_transfer_encoding(),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_message_fields() {
        let mut message = Message::new();
        message.set_subject("Hi");
        message.set_sender("a@x.com");
        message.set_subject("Hello again");

        assert_eq!(message.subject(), Some("Hello again"));
        assert_eq!(message.sender(), Some("a@x.com"));
        assert_eq!(message.headers().len(), 2);
    }

    #[test]
    fn test_message_recipients_keep_order() {
        let mut message = Message::new();
        message.add_recipient(Recipient::bcc("hidden@x.com"));
        message.add_recipient(Recipient::primary("b@y.com"));

        let kinds: Vec<RecipientKind> = message.recipients().iter().map(Recipient::kind).collect();
        assert_eq!(kinds, vec![RecipientKind::Bcc, RecipientKind::Primary]);
    }

    #[test]
    fn test_message_content() {
        let mut message = Message::new();
        message.set_content("Caf=C3=A9", TransferEncoding::QuotedPrintable);
        assert_eq!(message.content_text(), Some("Caf=C3=A9"));
        assert_eq!(message.decoded_content().unwrap(), "Café".as_bytes());
    }

    #[test]
    fn test_message_content_type() {
        let mut message = Message::new();
        assert_eq!(message.content_type(), None);

        message.set_content_type("text/html; charset=utf-8");
        assert_eq!(message.content_type(), Some("text/html; charset=utf-8"));

        message.set_content_type(ContentType::text_plain().with_parameter("format", "flowed"));
        assert_eq!(message.content_type(), Some("text/plain; format=flowed"));
    }

    #[test]
    fn test_message_date() {
        let mut message = Message::new();
        assert!(message.date().is_none());

        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        message.set_date(&date);
        let value = message.headers().get("date").unwrap();
        assert!(value.starts_with("Fri, "));
        assert!(value.ends_with("2024 12:30:00 +0000"));
        assert_eq!(message.date().unwrap(), date);
    }

    #[test]
    fn test_add_part_makes_multipart() {
        let mut message = Message::new();
        message.set_content("ignored", TransferEncoding::SevenBit);
        message.add_content(StringPartSource::text("body"), TransferEncoding::SevenBit);
        message.add_attachment(
            "data.bin",
            StringPartSource::new(vec![0u8, 1, 2], "application/octet-stream"),
            TransferEncoding::Base64,
        );

        assert!(message.is_multipart());
        assert!(message.content().is_empty());
        assert_eq!(message.content_type(), Some("multipart/mixed"));

        let parts = message.parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name(), "");
        assert_eq!(parts[0].disposition(), Disposition::Inline);
        assert_eq!(parts[1].name(), "data.bin");
        assert_eq!(parts[1].disposition(), Disposition::Attachment);
        assert_eq!(parts[1].encoding(), TransferEncoding::Base64);
    }
}
