//! `Content-Type` and `Content-Disposition` values.

use crate::error::{Error, Result};
use crate::part::Disposition;
use std::fmt;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters in header order, with lowercase names.
    pub parameters: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: Vec::new(),
        }
    }

    /// Creates a `text/plain` content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// Creates a `multipart/mixed` content type with boundary.
    #[must_use]
    pub fn multipart_mixed(boundary: impl Into<String>) -> Self {
        Self::new("multipart", "mixed").with_parameter("boundary", boundary)
    }

    /// Adds or replaces a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_parameter(key, value);
        self
    }

    /// Adds or replaces a parameter.
    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        set_parameter(&mut self.parameters, key.into(), value.into());
    }

    /// Returns a parameter value by case-insensitive name.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        get_parameter(&self.parameters, key)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// Returns the name parameter if present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameter("name")
    }

    /// Returns `type/subtype` without parameters.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("text")
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="quoted value"`
    ///
    /// # Errors
    ///
    /// Returns an error if the type or subtype is missing.
    pub fn parse(s: &str) -> Result<Self> {
        let (type_str, params) = s.split_once(';').unwrap_or((s, ""));

        let (main_type, sub_type) = type_str
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype in {s:?}")))?;
        let main_type = main_type.trim().to_ascii_lowercase();
        let sub_type = sub_type.trim().to_ascii_lowercase();
        if main_type.is_empty() || sub_type.is_empty() {
            return Err(Error::InvalidContentType(format!(
                "Empty type or subtype in {s:?}"
            )));
        }

        Ok(Self {
            main_type,
            sub_type,
            parameters: parse_parameters(params),
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        write_parameters(f, &self.parameters)
    }
}

/// `Content-Disposition` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type.
    pub disposition: Disposition,
    /// Parameters in header order, with lowercase names.
    pub parameters: Vec<(String, String)>,
}

impl ContentDisposition {
    /// Creates a disposition without parameters.
    #[must_use]
    pub const fn new(disposition: Disposition) -> Self {
        Self {
            disposition,
            parameters: Vec::new(),
        }
    }

    /// Adds or replaces a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        set_parameter(&mut self.parameters, key.into(), value.into());
        self
    }

    /// Returns the filename parameter if present.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        get_parameter(&self.parameters, "filename")
    }

    /// Parses a disposition header value.
    ///
    /// Unknown disposition types are treated as attachments (RFC 2183).
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let (kind, params) = s.split_once(';').unwrap_or((s, ""));
        Self {
            disposition: Disposition::parse(kind),
            parameters: parse_parameters(params),
        }
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.disposition)?;
        write_parameters(f, &self.parameters)
    }
}

fn get_parameter<'a>(parameters: &'a [(String, String)], key: &str) -> Option<&'a str> {
    parameters
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, value)| value.as_str())
}

fn set_parameter(parameters: &mut Vec<(String, String)>, key: String, value: String) {
    let key = key.to_ascii_lowercase();
    match parameters.iter_mut().find(|(name, _)| *name == key) {
        Some((_, existing)) => *existing = value,
        None => parameters.push((key, value)),
    }
}

/// Parses `; key=value; key="quoted; value"` parameter lists.
///
/// Malformed entries without `=` are skipped.
fn parse_parameters(s: &str) -> Vec<(String, String)> {
    let mut parameters = Vec::new();
    let mut chars = s.chars().peekable();

    loop {
        // Skip separators and whitespace
        while chars.peek().is_some_and(|c| *c == ';' || c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ';' {
                break;
            }
            key.push(c);
            chars.next();
        }

        if chars.next_if_eq(&'=').is_none() {
            continue;
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    _ => value.push(c),
                }
            }
            // Discard anything between the closing quote and the separator
            while chars.next_if(|c| *c != ';').is_some() {}
        } else {
            while let Some(c) = chars.next_if(|c| *c != ';') {
                value.push(c);
            }
            value = value.trim_end().to_string();
        }

        let key = key.trim().to_ascii_lowercase();
        if !key.is_empty() {
            parameters.push((key, value));
        }
    }

    parameters
}

fn write_parameters(f: &mut fmt::Formatter<'_>, parameters: &[(String, String)]) -> fmt::Result {
    for (key, value) in parameters {
        if needs_quoting(value) {
            write!(f, "; {key}=\"")?;
            for c in value.chars() {
                if c == '"' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
            f.write_str("\"")?;
        } else {
            write!(f, "; {key}={value}")?;
        }
    }
    Ok(())
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value.contains(|c: char| {
            c.is_whitespace() || c.is_ascii_control() || "()<>@,;:\\\"/[]?=".contains(c)
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_text_plain() {
        let ct = ContentType::text_plain();
        assert_eq!(ct.to_string(), "text/plain");
        assert!(ct.is_text());
        assert!(!ct.is_multipart());
    }

    #[test]
    fn test_multipart_mixed() {
        let ct = ContentType::multipart_mixed("----=_Part_abc");
        assert_eq!(ct.boundary(), Some("----=_Part_abc"));
        assert!(ct.is_multipart());
        assert_eq!(
            ct.to_string(),
            "multipart/mixed; boundary=\"----=_Part_abc\""
        );
    }

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("Text/Plain; Charset=utf-8").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.charset(), Some("utf-8"));
        assert_eq!(ct.mime_type(), "text/plain");
    }

    #[test]
    fn test_content_type_parse_quoted() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"a;b=c\"; x=1").unwrap();
        assert_eq!(ct.boundary(), Some("a;b=c"));
        assert_eq!(ct.parameter("X"), Some("1"));
    }

    #[test]
    fn test_content_type_parse_escaped_quote() {
        let ct = ContentType::parse(r#"application/pdf; name="say \"hi\".pdf""#).unwrap();
        assert_eq!(ct.name(), Some("say \"hi\".pdf"));
        assert_eq!(
            ct.to_string(),
            r#"application/pdf; name="say \"hi\".pdf""#
        );
    }

    #[test]
    fn test_content_type_parse_invalid() {
        assert!(ContentType::parse("text").is_err());
        assert!(ContentType::parse("/plain").is_err());
        assert!(ContentType::parse("").is_err());
    }

    #[test]
    fn test_content_type_with_parameter() {
        let ct = ContentType::new("text", "plain")
            .with_parameter("charset", "iso-8859-1")
            .with_parameter("Format", "flowed")
            .with_parameter("charset", "utf-8");

        assert_eq!(ct.charset(), Some("utf-8"));
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8; format=flowed");
    }

    #[test]
    fn test_content_disposition_round_trip() {
        let cd = ContentDisposition::new(Disposition::Attachment)
            .with_parameter("filename", "report 2024.pdf");
        let rendered = cd.to_string();
        assert_eq!(rendered, "attachment; filename=\"report 2024.pdf\"");

        let parsed = ContentDisposition::parse(&rendered);
        assert_eq!(parsed, cd);
        assert_eq!(parsed.filename(), Some("report 2024.pdf"));
    }

    #[test]
    fn test_content_disposition_unknown_kind() {
        let cd = ContentDisposition::parse("x-custom; foo=bar");
        assert_eq!(cd.disposition, Disposition::Attachment);
        assert_eq!(ContentDisposition::parse(" INLINE ").disposition, Disposition::Inline);
    }
}
