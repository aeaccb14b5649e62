//! Multipart body parts and their content sources.

use crate::encoding::TransferEncoding;
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek};
use std::path::Path;

/// How a part is presented to the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Disposition {
    /// Displayed as part of the message body.
    #[default]
    Inline,
    /// Offered as a separate download.
    Attachment,
}

impl Disposition {
    /// Parses a disposition type. Anything but `inline` is an attachment.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("inline") {
            Self::Inline
        } else {
            Self::Attachment
        }
    }

    /// Returns the header token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplies the content of a message part.
///
/// A source is owned by the message it was added to and dropped with it.
pub trait PartSource: fmt::Debug {
    /// Returns the media type of the content, e.g. `text/plain`.
    fn media_type(&self) -> &str;

    /// Returns a suggested filename for attachments.
    fn filename(&self) -> Option<&str> {
        None
    }

    /// Opens the content for reading from the beginning.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying data cannot be accessed.
    fn stream(&mut self) -> io::Result<Box<dyn Read + '_>>;
}

/// Part content held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringPartSource {
    data: Vec<u8>,
    media_type: String,
    filename: Option<String>,
}

impl StringPartSource {
    /// Creates a source with the given content and media type.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>, media_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            media_type: media_type.into(),
            filename: None,
        }
    }

    /// Creates a `text/plain` source.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(data, "text/plain")
    }

    /// Sets the suggested filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Returns the content.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl PartSource for StringPartSource {
    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn stream(&mut self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.data.as_slice())))
    }
}

/// Part content read from a file.
///
/// The file is opened once when the source is created and rewound each
/// time it is streamed.
#[derive(Debug)]
pub struct FilePartSource {
    file: File,
    media_type: String,
    filename: Option<String>,
}

impl FilePartSource {
    /// Opens a file as a part source.
    ///
    /// The suggested filename is the final path component.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, media_type: impl Into<String>) -> io::Result<Self> {
        let path = path.as_ref();
        Ok(Self {
            file: File::open(path)?,
            media_type: media_type.into(),
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        })
    }
}

impl PartSource for FilePartSource {
    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn stream(&mut self) -> io::Result<Box<dyn Read + '_>> {
        self.file.rewind()?;
        Ok(Box::new(&mut self.file))
    }
}

/// A body part of a multipart message.
#[derive(Debug)]
pub struct Part {
    name: String,
    source: Box<dyn PartSource>,
    disposition: Disposition,
    encoding: TransferEncoding,
}

impl Part {
    /// Creates a new part, taking ownership of the source.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source: Box<dyn PartSource>,
        disposition: Disposition,
        encoding: TransferEncoding,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            disposition,
            encoding,
        }
    }

    /// Returns the part name. Empty for unnamed inline content.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the content source.
    #[must_use]
    pub fn source(&self) -> &dyn PartSource {
        self.source.as_ref()
    }

    /// Returns the disposition.
    #[must_use]
    pub const fn disposition(&self) -> Disposition {
        self.disposition
    }

    /// Returns the transfer encoding used when writing.
    #[must_use]
    pub const fn encoding(&self) -> TransferEncoding {
        self.encoding
    }

    /// Reads the whole content of the source.
    pub(crate) fn read_content(&mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        self.source.stream()?.read_to_end(&mut data)?;
        Ok(data)
    }
}
