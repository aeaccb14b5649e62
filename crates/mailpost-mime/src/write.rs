//! Message serialization.

use crate::content_type::{ContentDisposition, ContentType};
use crate::error::{Error, Result};
use crate::header::{Headers, field};
use crate::message::Message;
use crate::part::{Disposition, Part};
use crate::recipient::{RecipientKind, render_recipients};
use chrono::{DateTime, FixedOffset, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::io::Write;

/// Prefix of generated boundaries.
///
/// `=_` cannot occur in Quoted-Printable or Base64 output.
const BOUNDARY_PREFIX: &str = "----=_Part_";

/// Number of random characters in a generated boundary.
const BOUNDARY_TOKEN_LENGTH: usize = 32;

/// Generated boundaries tried before giving up.
const MAX_BOUNDARY_ATTEMPTS: usize = 8;

/// Options controlling how a message is written.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Write `Bcc` recipients into a `Bcc` header field.
    ///
    /// Off by default so blind copies are not disclosed to other recipients.
    pub include_bcc: bool,
    /// Fixed multipart boundary instead of a generated one.
    pub boundary: Option<String>,
    /// Date to stamp on messages without a `Date` field, instead of now.
    pub date: Option<DateTime<FixedOffset>>,
}

impl WriteOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an options builder.
    #[must_use]
    pub fn builder() -> WriteOptionsBuilder {
        WriteOptionsBuilder::new()
    }
}

/// Builder for [`WriteOptions`].
#[derive(Debug, Clone, Default)]
pub struct WriteOptionsBuilder {
    include_bcc: bool,
    boundary: Option<String>,
    date: Option<DateTime<FixedOffset>>,
}

impl WriteOptionsBuilder {
    /// Creates a builder with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether `Bcc` recipients are written.
    #[must_use]
    pub const fn include_bcc(mut self, include: bool) -> Self {
        self.include_bcc = include;
        self
    }

    /// Uses a fixed multipart boundary.
    ///
    /// Writing fails with [`Error::BoundaryCollision`] if a part body
    /// contains a line starting with `--` followed by this boundary.
    #[must_use]
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Sets the date stamped on messages without a `Date` field.
    #[must_use]
    pub const fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Builds the options.
    #[must_use]
    pub fn build(self) -> WriteOptions {
        WriteOptions {
            include_bcc: self.include_bcc,
            boundary: self.boundary,
            date: self.date,
        }
    }
}

impl Message {
    /// Writes the message with default options.
    ///
    /// Takes `&mut self` because part sources are streamed from their start
    /// on every write, which for a [`FilePartSource`] means rewinding the
    /// file.
    ///
    /// [`FilePartSource`]: crate::FilePartSource
    ///
    /// # Errors
    ///
    /// Returns an error if a part source or the output stream fails.
    /// Output already written is not rolled back.
    pub fn write<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<()> {
        self.write_with(out, &WriteOptions::default())
    }

    /// Writes the message.
    ///
    /// Part sources are read once each, in order, before anything is
    /// written.
    ///
    /// # Errors
    ///
    /// Returns an error if a part source or the output stream fails, or if
    /// a fixed boundary occurs in a part body.
    pub fn write_with<W: Write + ?Sized>(&mut self, out: &mut W, options: &WriteOptions) -> Result<()> {
        let mut headers = self.headers.clone();
        self.set_recipient_headers(&mut headers, options.include_bcc);
        if !headers.has(field::DATE) {
            let date = options.date.unwrap_or_else(|| Utc::now().fixed_offset());
            headers.set(field::DATE, date.to_rfc2822());
        }

        if self.parts.is_empty() {
            self.write_single_part(headers, out)
        } else {
            self.write_multipart(headers, out, options)
        }
    }

    /// Serializes the message with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if a part source fails.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(out)
    }

    fn set_recipient_headers(&self, headers: &mut Headers, include_bcc: bool) {
        for kind in RecipientKind::ALL {
            if kind == RecipientKind::Bcc && !include_bcc {
                headers.remove(field::BCC);
                continue;
            }
            if let Some(value) = render_recipients(&self.recipients, kind) {
                headers.set(kind.header_name(), value);
            }
        }
    }

    fn write_single_part<W: Write + ?Sized>(&self, mut headers: Headers, out: &mut W) -> Result<()> {
        let multipart_type = headers
            .get(field::CONTENT_TYPE)
            .and_then(|value| ContentType::parse(value).ok())
            .is_some_and(|ct| ct.is_multipart());
        // A multipart body read from the wire is relayed as is
        let preformed_multipart = multipart_type && !self.content.is_empty();

        if !headers.has(field::CONTENT_TYPE) || (multipart_type && !preformed_multipart) {
            headers.set(field::CONTENT_TYPE, ContentType::text_plain().to_string());
        }
        headers.set(field::CONTENT_TRANSFER_ENCODING, self.encoding.as_str());
        if preformed_multipart {
            tracing::debug!("Writing preformed multipart body");
            if !headers.has(field::MIME_VERSION) {
                headers.set(field::MIME_VERSION, "1.0");
            }
        } else {
            headers.remove(field::MIME_VERSION);
        }

        out.write_all(headers.to_string().as_bytes())?;
        out.write_all(b"\r\n")?;
        if self.content_is_encoded {
            out.write_all(&self.content)?;
        } else {
            out.write_all(&self.encoding.encode(&self.content))?;
        }
        Ok(())
    }

    fn write_multipart<W: Write + ?Sized>(
        &mut self,
        mut headers: Headers,
        out: &mut W,
        options: &WriteOptions,
    ) -> Result<()> {
        let mut bodies = Vec::with_capacity(self.parts.len());
        for part in &mut self.parts {
            let raw = part.read_content()?;
            bodies.push(part.encoding().encode(&raw));
        }

        let boundary = match &options.boundary {
            Some(fixed) if boundary_collides(fixed, &bodies) => {
                return Err(Error::BoundaryCollision(fixed.clone()));
            }
            Some(fixed) => fixed.clone(),
            None => choose_boundary(&bodies, generate_boundary)?,
        };
        tracing::debug!(boundary = %boundary, parts = bodies.len(), "Writing multipart message");

        headers.set(field::MIME_VERSION, "1.0");
        headers.set(
            field::CONTENT_TYPE,
            ContentType::multipart_mixed(boundary.as_str()).to_string(),
        );
        headers.remove(field::CONTENT_TRANSFER_ENCODING);

        out.write_all(headers.to_string().as_bytes())?;
        out.write_all(b"\r\n")?;

        for (part, body) in self.parts.iter().zip(&bodies) {
            write!(out, "--{boundary}\r\n")?;
            out.write_all(part_headers(part).to_string().as_bytes())?;
            out.write_all(b"\r\n")?;
            out.write_all(body)?;
            out.write_all(b"\r\n")?;
        }
        write!(out, "--{boundary}--\r\n")?;
        Ok(())
    }
}

fn part_headers(part: &Part) -> Headers {
    let source = part.source();
    let mut content_type = ContentType::parse(source.media_type()).unwrap_or_else(|_| {
        tracing::warn!(media_type = source.media_type(), "Invalid part media type");
        ContentType::new("application", "octet-stream")
    });
    if !part.name().is_empty() {
        content_type.set_parameter("name", part.name());
    }

    let disposition = match part.disposition() {
        Disposition::Inline => ContentDisposition::new(Disposition::Inline),
        Disposition::Attachment => {
            let filename = source
                .filename()
                .filter(|name| !name.is_empty())
                .unwrap_or(part.name());
            let cd = ContentDisposition::new(Disposition::Attachment);
            if filename.is_empty() {
                cd
            } else {
                cd.with_parameter("filename", filename)
            }
        }
    };

    let mut headers = Headers::new();
    headers.set(field::CONTENT_TYPE, content_type.to_string());
    headers.set(field::CONTENT_DISPOSITION, disposition.to_string());
    headers.set(field::CONTENT_TRANSFER_ENCODING, part.encoding().as_str());
    headers
}

/// Returns true if any body has a line starting with `--boundary`.
fn boundary_collides(boundary: &str, bodies: &[Vec<u8>]) -> bool {
    let delimiter = format!("--{boundary}");
    bodies.iter().any(|body| {
        body.split(|&b| b == b'\n')
            .any(|line| line.starts_with(delimiter.as_bytes()))
    })
}

/// Picks the first generated boundary that does not occur in any body.
fn choose_boundary(bodies: &[Vec<u8>], mut generate: impl FnMut() -> String) -> Result<String> {
    let mut candidate = String::new();
    for _ in 0..MAX_BOUNDARY_ATTEMPTS {
        candidate = generate();
        if !boundary_collides(&candidate, bodies) {
            return Ok(candidate);
        }
        tracing::debug!(candidate = %candidate, "Boundary occurs in part content, regenerating");
    }
    Err(Error::BoundaryCollision(candidate))
}

fn generate_boundary() -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_TOKEN_LENGTH)
        .map(char::from)
        .collect();
    format!("{BOUNDARY_PREFIX}{token}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::encoding::TransferEncoding;
    use crate::part::StringPartSource;
    use crate::recipient::Recipient;
    use chrono::TimeZone;

    fn fixed_date() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 6, 7, 8, 9)
            .unwrap()
    }

    fn write_to_string(message: &mut Message, options: &WriteOptions) -> String {
        let mut out = Vec::new();
        message.write_with(&mut out, options).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_write_options_builder() {
        let options = WriteOptions::builder()
            .include_bcc(true)
            .boundary("b1")
            .date(fixed_date())
            .build();
        assert!(options.include_bcc);
        assert_eq!(options.boundary.as_deref(), Some("b1"));
        assert_eq!(options.date, Some(fixed_date()));

        let defaults = WriteOptions::new();
        assert!(!defaults.include_bcc);
        assert!(defaults.boundary.is_none());
    }

    #[test]
    fn test_write_single_part() {
        let mut message = Message::new();
        message.set_subject("Hi");
        message.set_sender("a@x.com");
        message.add_recipient(Recipient::primary("b@y.com"));
        message.set_content("Hello", TransferEncoding::SevenBit);

        let options = WriteOptions::builder().date(fixed_date()).build();
        let written = write_to_string(&mut message, &options);

        let (head, body) = written.split_once("\r\n\r\n").unwrap();
        let lines: Vec<&str> = head.split("\r\n").collect();
        assert_eq!(lines[0], "Subject: Hi");
        assert_eq!(lines[1], "From: a@x.com");
        assert!(lines.contains(&"To: b@y.com"));
        assert!(lines.contains(&"Content-Type: text/plain"));
        assert!(lines.contains(&"Content-Transfer-Encoding: 7bit"));
        assert!(lines.iter().any(|line| line.starts_with("Date: Mon, ")));
        assert!(!head.contains("MIME-Version"));
        assert_eq!(body, "Hello");
    }

    #[test]
    fn test_write_single_part_encodes_content() {
        let mut message = Message::new();
        message.set_content_type("text/plain; charset=utf-8");
        message.set_content("Grüße", TransferEncoding::QuotedPrintable);

        let written = write_to_string(&mut message, &WriteOptions::new());
        assert!(written.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(written.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        assert!(written.ends_with("\r\n\r\nGr=C3=BC=C3=9Fe"));
        assert!(written.contains("Date: "));
    }

    #[test]
    fn test_write_keeps_existing_date() {
        let mut message = Message::new();
        message.set_date(&fixed_date());
        message.set_content("x", TransferEncoding::SevenBit);

        let written = write_to_string(&mut message, &WriteOptions::new());
        assert_eq!(written.matches("Date: ").count(), 1);
        assert!(written.contains(&fixed_date().to_rfc2822()));
    }

    #[test]
    fn test_bcc_omitted_by_default() {
        let mut message = Message::new();
        message.add_recipient(Recipient::primary("to@x.com"));
        message.add_recipient(Recipient::cc("cc@x.com"));
        message.add_recipient(Recipient::bcc("hidden@x.com"));
        message.headers_mut().add("Bcc", "stale@x.com");
        message.set_content("x", TransferEncoding::SevenBit);

        let written = write_to_string(&mut message, &WriteOptions::new());
        assert!(written.contains("To: to@x.com\r\n"));
        assert!(written.contains("Cc: cc@x.com\r\n"));
        assert!(!written.contains("Bcc"));
        assert!(!written.contains("hidden@x.com"));
        assert_eq!(message.recipients().len(), 3);
    }

    #[test]
    fn test_bcc_included_when_requested() {
        let mut message = Message::new();
        message.add_recipient(Recipient::bcc("hidden@x.com"));
        message.add_recipient(Recipient::bcc("other@x.com"));
        message.set_content("x", TransferEncoding::SevenBit);

        let options = WriteOptions::builder().include_bcc(true).build();
        let written = write_to_string(&mut message, &options);
        assert!(written.contains("Bcc: hidden@x.com, other@x.com\r\n"));
        assert!(!written.contains("To:"));
    }

    #[test]
    fn test_write_multipart_layout() {
        let mut message = Message::new();
        message.set_subject("Files");
        message.add_content(StringPartSource::text("See attached."), TransferEncoding::SevenBit);
        message.add_attachment(
            "data.bin",
            StringPartSource::new(vec![0u8, 159, 146, 150], "application/octet-stream"),
            TransferEncoding::Base64,
        );

        let options = WriteOptions::builder().boundary("XYZ").date(fixed_date()).build();
        let written = write_to_string(&mut message, &options);

        assert!(written.contains("MIME-Version: 1.0\r\n"));
        assert!(written.contains("Content-Type: multipart/mixed; boundary=XYZ\r\n"));
        let body = written.split_once("\r\n\r\n").unwrap().1;
        assert_eq!(
            body,
            concat!(
                "--XYZ\r\n",
                "Content-Type: text/plain\r\n",
                "Content-Disposition: inline\r\n",
                "Content-Transfer-Encoding: 7bit\r\n",
                "\r\n",
                "See attached.\r\n",
                "--XYZ\r\n",
                "Content-Type: application/octet-stream; name=data.bin\r\n",
                "Content-Disposition: attachment; filename=data.bin\r\n",
                "Content-Transfer-Encoding: base64\r\n",
                "\r\n",
                "AJ+Slg==\r\n",
                "--XYZ--\r\n",
            )
        );
    }

    #[test]
    fn test_part_filename_hint_wins() {
        let mut message = Message::new();
        message.add_attachment(
            "Quarterly report",
            StringPartSource::new("1,2", "text/csv").with_filename("q1.csv"),
            TransferEncoding::QuotedPrintable,
        );

        let options = WriteOptions::builder().boundary("B").build();
        let written = write_to_string(&mut message, &options);
        assert!(written.contains("Content-Type: text/csv; name=\"Quarterly report\"\r\n"));
        assert!(written.contains("Content-Disposition: attachment; filename=q1.csv\r\n"));
    }

    #[test]
    fn test_generated_boundary_is_quoted() {
        let mut message = Message::new();
        message.add_content(StringPartSource::text("x"), TransferEncoding::SevenBit);

        let written = write_to_string(&mut message, &WriteOptions::new());
        let start = written.find("boundary=\"").unwrap() + "boundary=\"".len();
        let boundary = &written[start..start + BOUNDARY_PREFIX.len() + BOUNDARY_TOKEN_LENGTH];
        assert!(boundary.starts_with(BOUNDARY_PREFIX));
        assert!(written.contains(&format!("\r\n--{boundary}--\r\n")));
    }

    #[test]
    fn test_fixed_boundary_collision_fails() {
        let mut message = Message::new();
        message.add_content(
            StringPartSource::text("before\r\n--XYZ\r\nafter"),
            TransferEncoding::SevenBit,
        );

        let options = WriteOptions::builder().boundary("XYZ").build();
        let mut out = Vec::new();
        let err = message.write_with(&mut out, &options).unwrap_err();
        assert!(matches!(err, Error::BoundaryCollision(ref b) if b == "XYZ"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_encoded_body_avoids_collision() {
        // Base64 and QP output never contains the delimiter line
        let mut message = Message::new();
        message.add_content(
            StringPartSource::text("--XYZ\r\n"),
            TransferEncoding::Base64,
        );
        let options = WriteOptions::builder().boundary("XYZ").build();
        assert!(message.write_with(&mut Vec::new(), &options).is_ok());
    }

    #[test]
    fn test_choose_boundary_regenerates() {
        let bodies = vec![b"text\r\n--first\r\nmore".to_vec()];
        let mut candidates = vec!["second".to_string(), "first".to_string()];
        let boundary = choose_boundary(&bodies, || candidates.pop().unwrap()).unwrap();
        assert_eq!(boundary, "second");
    }

    #[test]
    fn test_choose_boundary_gives_up() {
        let bodies = vec![b"--same".to_vec()];
        let err = choose_boundary(&bodies, || "same".to_string()).unwrap_err();
        assert!(matches!(err, Error::BoundaryCollision(_)));
    }

    #[test]
    fn test_boundary_collides() {
        let bodies = vec![b"a\r\n--abc--\r\n".to_vec()];
        assert!(boundary_collides("abc", &bodies));
        assert!(!boundary_collides("abd", &bodies));
        assert!(!boundary_collides("abc", &[b"x --abc".to_vec()]));
    }

    #[test]
    fn test_header_values_cannot_add_fields() {
        let mut message = Message::new();
        message.set_subject("Hi\r\nX-Injected: yes");
        message.add_recipient(Recipient::with_name(
            RecipientKind::Primary,
            "a@x.com",
            "Ann\r\nBcc: spy@evil.com",
        ));
        message.set_content("x", TransferEncoding::SevenBit);

        let written = write_to_string(&mut message, &WriteOptions::new());
        let head = written.split_once("\r\n\r\n").unwrap().0;
        assert!(head.contains("Subject: Hi X-Injected: yes\r\n"));
        assert!(head.contains("To: \"Ann Bcc: spy@evil.com\" <a@x.com>\r\n"));
        assert!(!head.contains("\nBcc"));
        assert!(!head.contains("\nX-Injected"));
    }

    #[test]
    fn test_part_name_cannot_add_fields() {
        let mut message = Message::new();
        message.add_attachment(
            "a.txt\r\nX-Injected: yes",
            StringPartSource::text("x"),
            TransferEncoding::SevenBit,
        );

        let options = WriteOptions::builder().boundary("B").build();
        let written = write_to_string(&mut message, &options);
        assert!(!written.contains("\nX-Injected"));
        assert!(written.contains("name=\"a.txt X-Injected: yes\""));
    }

    #[test]
    fn test_preformed_multipart_is_relayed() {
        let raw = concat!(
            "Subject: Relay\r\n",
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "\r\n",
            "part\r\n",
            "--b--\r\n",
        );
        let mut message = Message::read_raw(&mut raw.as_bytes()).unwrap();

        let written = write_to_string(&mut message, &WriteOptions::new());
        let (head, body) = written.split_once("\r\n\r\n").unwrap();
        assert!(head.contains("Content-Type: multipart/mixed; boundary=b\r\n"));
        assert!(head.contains("MIME-Version: 1.0\r\n"));
        assert_eq!(body, "--b\r\n\r\npart\r\n--b--\r\n");
    }

    #[test]
    fn test_stale_multipart_type_without_content() {
        let mut message = Message::new();
        message.set_content_type("multipart/mixed; boundary=x");
        message.headers_mut().set("MIME-Version", "1.0");

        let written = write_to_string(&mut message, &WriteOptions::new());
        assert!(written.contains("Content-Type: text/plain\r\n"));
        assert!(!written.contains("MIME-Version"));
    }

    #[test]
    fn test_read_content_is_not_encoded_twice() {
        let raw = concat!(
            "Content-Type: text/plain; charset=utf-8\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "Caf=C3=A9 =3D ok\r\n",
        );
        let mut message = Message::read_raw(&mut raw.as_bytes()).unwrap();

        let written = write_to_string(&mut message, &WriteOptions::new());
        assert!(written.ends_with("\r\n\r\nCaf=C3=A9 =3D ok\r\n"));

        message.set_content("=", TransferEncoding::QuotedPrintable);
        let written = write_to_string(&mut message, &WriteOptions::new());
        assert!(written.ends_with("\r\n\r\n=3D"));
    }

    #[test]
    fn test_generate_boundary_shape() {
        let first = generate_boundary();
        let second = generate_boundary();
        assert_eq!(first.len(), BOUNDARY_PREFIX.len() + BOUNDARY_TOKEN_LENGTH);
        assert!(first[BOUNDARY_PREFIX.len()..].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }
}
