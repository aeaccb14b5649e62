//! Message recipients and address list formatting.

use crate::encoding::MAX_LINE_LENGTH;
use crate::header::field;
use std::fmt;

/// Recipient kind, selecting the header field it is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecipientKind {
    /// Primary recipient (`To`).
    Primary,
    /// Carbon copy (`Cc`).
    Cc,
    /// Blind carbon copy (`Bcc`).
    Bcc,
}

impl RecipientKind {
    /// All kinds, in rendering order.
    pub const ALL: [Self; 3] = [Self::Primary, Self::Cc, Self::Bcc];

    /// Returns the header field name for this kind.
    #[must_use]
    pub const fn header_name(self) -> &'static str {
        match self {
            Self::Primary => field::TO,
            Self::Cc => field::CC,
            Self::Bcc => field::BCC,
        }
    }
}

/// A message recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Recipient {
    kind: RecipientKind,
    address: String,
    display_name: Option<String>,
}

impl Recipient {
    /// Creates a recipient without a display name.
    #[must_use]
    pub fn new(kind: RecipientKind, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into(),
            display_name: None,
        }
    }

    /// Creates a recipient with a display name.
    #[must_use]
    pub fn with_name(
        kind: RecipientKind,
        address: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            address: address.into(),
            display_name: Some(display_name.into()),
        }
    }

    /// Creates a primary (`To`) recipient.
    #[must_use]
    pub fn primary(address: impl Into<String>) -> Self {
        Self::new(RecipientKind::Primary, address)
    }

    /// Creates a `Cc` recipient.
    #[must_use]
    pub fn cc(address: impl Into<String>) -> Self {
        Self::new(RecipientKind::Cc, address)
    }

    /// Creates a `Bcc` recipient.
    #[must_use]
    pub fn bcc(address: impl Into<String>) -> Self {
        Self::new(RecipientKind::Bcc, address)
    }

    /// Returns the recipient kind.
    #[must_use]
    pub const fn kind(&self) -> RecipientKind {
        self.kind
    }

    /// Returns the address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the display name, if any.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_mailbox(self.display_name(), &self.address))
    }
}

/// Formats a mailbox as `addr`, `Name <addr>` or `"Name, Jr." <addr>`.
#[must_use]
pub fn format_mailbox(display_name: Option<&str>, address: &str) -> String {
    match display_name.filter(|name| !name.is_empty()) {
        None => address.to_string(),
        Some(name) if name.contains(|c: char| "\",;:<>()[]@\\".contains(c)) => {
            let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\" <{address}>")
        }
        Some(name) => format!("{name} <{address}>"),
    }
}

/// Renders the header value listing every recipient of one kind.
///
/// Returns `None` if there is no recipient of that kind. The list is folded
/// onto continuation lines before a line would exceed [`MAX_LINE_LENGTH`].
pub(crate) fn render_recipients(recipients: &[Recipient], kind: RecipientKind) -> Option<String> {
    let mut value = String::new();
    let mut line_length = kind.header_name().len() + 2;

    for recipient in recipients.iter().filter(|r| r.kind == kind) {
        let mailbox = recipient.to_string();
        if !value.is_empty() {
            value.push(',');
            line_length += 1;
            if line_length + 1 + mailbox.len() > MAX_LINE_LENGTH {
                value.push_str("\r\n\t");
                line_length = 1;
            } else {
                value.push(' ');
                line_length += 1;
            }
        }
        line_length += mailbox.len();
        value.push_str(&mailbox);
    }

    (!value.is_empty()).then_some(value)
}

/// Parses an address list header value into `(display name, address)` pairs.
///
/// Understands bare addresses, `Name <addr>`, quoted display names and group
/// syntax (`Team: a@x, b@y;`). Empty entries are skipped.
#[must_use]
pub fn parse_address_list(s: &str) -> Vec<(Option<String>, String)> {
    split_top_level(s)
        .into_iter()
        .filter_map(parse_mailbox)
        .collect()
}

fn split_top_level(s: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' | ';' if !in_quotes && !in_angle => {
                items.push(&s[start..i]);
                start = i + 1;
            }
            // Group label
            ':' if !in_quotes && !in_angle => start = i + 1,
            _ => {}
        }
    }
    items.push(&s[start..]);
    items
}

fn parse_mailbox(item: &str) -> Option<(Option<String>, String)> {
    let item = item.trim();
    if item.is_empty() {
        return None;
    }

    let Some(open) = find_unquoted(item, '<') else {
        return Some((None, item.to_string()));
    };
    let close = item[open..].find('>').map_or(item.len(), |pos| open + pos);
    let address = item[open + 1..close].trim();
    if address.is_empty() {
        return None;
    }

    Some((unquote(item[..open].trim()), address.to_string()))
}

fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' && in_quotes {
            escaped = true;
        } else if c == '"' {
            in_quotes = !in_quotes;
        } else if c == needle && !in_quotes {
            return Some(i);
        }
    }
    None
}

fn unquote(name: &str) -> Option<String> {
    let Some(inner) = name
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return (!name.is_empty()).then(|| name.to_string());
    };

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
        } else {
            result.push(c);
        }
    }
    (!result.is_empty()).then_some(result)
}
