//! RFC 2822 header fields.
//!
//! [`Headers`] keeps fields in insertion order and allows repeated names.
//! Name lookups are case-insensitive; the original spelling is kept for
//! output.

use crate::error::{Error, Result};
use std::fmt;

/// Names of the header fields the message model works with.
pub mod field {
    /// `Subject`
    pub const SUBJECT: &str = "Subject";
    /// `From`
    pub const FROM: &str = "From";
    /// `To`
    pub const TO: &str = "To";
    /// `Cc`
    pub const CC: &str = "Cc";
    /// `Bcc`
    pub const BCC: &str = "Bcc";
    /// `Date`
    pub const DATE: &str = "Date";
    /// `Content-Type`
    pub const CONTENT_TYPE: &str = "Content-Type";
    /// `Content-Transfer-Encoding`
    pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";
    /// `Content-Disposition`
    pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
    /// `MIME-Version`
    pub const MIME_VERSION: &str = "MIME-Version";
}

/// Ordered collection of header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, keeping any existing fields with the same name.
    ///
    /// Line breaks that do not start a folded continuation line, and other
    /// control characters, are replaced by a space so a value can never
    /// start a new field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields
            .push((clean_name(name.into()), clean_value(value.into())));
    }

    /// Sets a field, replacing any existing values.
    ///
    /// The first existing field keeps its position; later duplicates are
    /// removed. A new field is appended. The value is cleaned as in
    /// [`add`](Self::add).
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = clean_name(name.into());
        let value = clean_value(value.into());

        match self.position(&name) {
            Some(index) => {
                self.fields[index].1 = value;
                let mut seen = 0;
                self.fields.retain(|(existing, _)| {
                    if existing.eq_ignore_ascii_case(&name) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.fields.push((name, value)),
        }
    }

    /// Gets the first value for a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|index| self.fields[index].1.as_str())
    }

    /// Gets all values for a field, in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// Returns true if at least one field has the given name.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes all fields with the given name, returning their values.
    pub fn remove(&mut self, name: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.fields.retain(|(existing, value)| {
            if existing.eq_ignore_ascii_case(name) {
                removed.push(value.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Returns an iterator over all fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses a header block from raw text.
    ///
    /// Parsing stops at the first empty line. Continuation lines are
    /// unfolded into the preceding field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageFormat`] if a line has no `:` separator or a
    /// continuation line appears before any field.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parser = HeaderParser::new();
        for line in text.lines() {
            if line.is_empty() {
                break;
            }
            parser.push_line(line)?;
        }
        Ok(parser.finish())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.fields {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

fn clean_name(name: String) -> String {
    if name.bytes().all(|b| b.is_ascii_graphic() && b != b':') {
        return name;
    }
    name.chars()
        .filter(|c| !c.is_whitespace() && !c.is_control() && *c != ':')
        .collect()
}

/// Keeps CRLF followed by space or tab as a fold; any other CR, LF or
/// control character except tab becomes a single space.
fn clean_value(value: String) -> String {
    if !value.chars().any(|c| c.is_control() && c != '\t') {
        return value;
    }

    let mut cleaned = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' if chars.next_if_eq(&'\n').is_some() => {
                if chars.peek().is_some_and(|next| *next == ' ' || *next == '\t') {
                    cleaned.push_str("\r\n");
                } else {
                    cleaned.push(' ');
                }
            }
            '\t' => cleaned.push('\t'),
            c if c.is_control() => cleaned.push(' '),
            c => cleaned.push(c),
        }
    }
    cleaned
}

/// Incremental header block parser, fed one line at a time.
///
/// Lines are passed without their terminator.
#[derive(Debug, Default)]
pub(crate) struct HeaderParser {
    headers: Headers,
    current: Option<(String, String)>,
}

impl HeaderParser {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_line(&mut self, line: &str) -> Result<()> {
        if line.starts_with(' ') || line.starts_with('\t') {
            let Some((_, value)) = self.current.as_mut() else {
                return Err(Error::format(format!(
                    "Continuation line before any header field: {line:?}"
                )));
            };
            value.push(' ');
            value.push_str(line.trim());
            return Ok(());
        }

        let Some((name, value)) = line.split_once(':') else {
            return Err(Error::format(format!("Header line without ':': {line:?}")));
        };
        let name = name.trim_end();
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(Error::format(format!("Invalid header field name: {name:?}")));
        }

        self.flush();
        self.current = Some((name.to_string(), value.trim().to_string()));
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Headers {
        self.flush();
        self.headers
    }

    fn flush(&mut self) {
        if let Some((name, value)) = self.current.take() {
            self.headers.add(name, value);
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

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert!(headers.has("CONTENT-TYPE"));
        assert_eq!(headers.get("Subject"), None);
    }

    #[test]
    fn test_headers_set_replaces_in_place() {
        let mut headers = Headers::new();
        headers.add("Subject", "First");
        headers.add("To", "alice@example.com");
        headers.add("From", "sender@example.com");
        headers.add("to", "bob@example.com");

        headers.set("TO", "charlie@example.com");
        assert_eq!(headers.get_all("To"), vec!["charlie@example.com"]);

        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Subject", "To", "From"]);
    }

    #[test]
    fn test_headers_set_appends_new() {
        let mut headers = Headers::new();
        headers.set("Subject", "Hi");
        headers.set("Date", "Mon, 1 Jan 2024 00:00:00 +0000");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.iter().last(), Some(("Date", "Mon, 1 Jan 2024 00:00:00 +0000")));
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Cc", "a@example.com");
        headers.add("Subject", "Test");
        headers.add("CC", "b@example.com");

        let removed = headers.remove("cc");
        assert_eq!(removed, vec!["a@example.com", "b@example.com"]);
        assert!(!headers.has("Cc"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = Headers::parse(text).unwrap();
        assert_eq!(headers.len(), 4);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert!(!headers.has("Body"));
    }

    #[test]
    fn test_headers_parse_rejects_missing_colon() {
        let err = Headers::parse("Subject Test\r\n").unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_headers_parse_rejects_leading_continuation() {
        let err = Headers::parse(" folded\r\nSubject: x\r\n").unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_headers_parse_rejects_bad_name() {
        assert!(Headers::parse("From a@b Mon Jan 1 00:00:00 2024\r\n").is_err());
        assert!(Headers::parse(": value\r\n").is_err());
    }

    #[test]
    fn test_headers_neutralize_line_breaks() {
        let mut headers = Headers::new();
        headers.set("Subject", "Hi\r\nX-Injected: yes");
        headers.add("Comments", "one\ntwo\rthree\x00four");
        headers.add("X-Bad\r\nName", "v");

        assert_eq!(headers.get("Subject"), Some("Hi X-Injected: yes"));
        assert_eq!(headers.get("Comments"), Some("one two three four"));
        assert!(headers.has("X-BadName"));
        assert_eq!(headers.to_string().matches("\r\n").count(), 3);

        let parsed = Headers::parse(&headers.to_string()).unwrap();
        assert_eq!(parsed.len(), 3);
        assert!(!parsed.has("X-Injected"));
    }

    #[test]
    fn test_headers_keep_folds() {
        let mut headers = Headers::new();
        headers.set("To", "a@x.com,\r\n\tb@x.com");
        assert_eq!(headers.get("To"), Some("a@x.com,\r\n\tb@x.com"));

        let parsed = Headers::parse(&headers.to_string()).unwrap();
        assert_eq!(parsed.get("To"), Some("a@x.com, b@x.com"));
    }

    #[test]
    fn test_headers_display() {
        let mut headers = Headers::new();
        headers.add("Subject", "Hi");
        headers.add("X-Custom", "one");
        headers.add("X-Custom", "two");

        assert_eq!(
            headers.to_string(),
            "Subject: Hi\r\nX-Custom: one\r\nX-Custom: two\r\n"
        );
    }

    #[test]
    fn test_headers_iter_order() {
        let mut headers = Headers::new();
        headers.add("B", "2");
        headers.add("A", "1");
        headers.add("C", "3");

        let collected: Vec<(&str, &str)> = (&headers).into_iter().collect();
        assert_eq!(collected, vec![("B", "2"), ("A", "1"), ("C", "3")]);
    }
}
