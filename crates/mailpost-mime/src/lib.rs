//! # mailpost-mime
//!
//! Internet mail message model with MIME multipart read and write engines.
//!
//! ## Features
//!
//! - **Message model**: RFC 2822 header fields, recipients, single-part
//!   content or a list of parts
//! - **Writing**: serialize to any [`std::io::Write`], with generated or
//!   fixed multipart boundaries
//! - **Reading**: parse from any [`std::io::BufRead`], reporting each part
//!   to a [`PartHandler`]
//! - **Encoding/Decoding**: 7bit, 8bit, Quoted-Printable and Base64
//!
//! ## Quick Start
//!
//! ### Writing a Message
//!
//! ```ignore
//! use mailpost_mime::{
//!     FilePartSource, Message, Recipient, StringPartSource, TransferEncoding,
//! };
//!
//! let mut message = Message::new();
//! message.set_subject("Report");
//! message.set_sender("a@x.com");
//! message.add_recipient(Recipient::primary("b@y.com"));
//! message.add_content(StringPartSource::text("See attached."), TransferEncoding::SevenBit);
//! message.add_attachment(
//!     "report.pdf",
//!     FilePartSource::open("report.pdf", "application/pdf")?,
//!     TransferEncoding::Base64,
//! );
//!
//! let mut out = Vec::new();
//! message.write(&mut out)?;
//! ```
//!
//! ### Reading a Message
//!
//! ```ignore
//! use mailpost_mime::{Message, PartCollector};
//!
//! let mut parts = PartCollector::new();
//! let message = Message::read(&mut input, &mut parts)?;
//! println!("Subject: {}", message.subject().unwrap_or("(no subject)"));
//! for part in parts.parts() {
//!     println!("{}: {} bytes", part.header().content_type(), part.body().len());
//! }
//! ```
//!
//! ### Encoding/Decoding
//!
//! ```ignore
//! use mailpost_mime::encoding::{decode_base64, encode_base64, encode_quoted_printable};
//!
//! // Base64
//! let encoded = encode_base64(b"Hello, World!");
//! let decoded = decode_base64(encoded.as_bytes())?;
//!
//! // Quoted-Printable
//! let encoded = encode_quoted_printable("Héllo, Wørld!".as_bytes());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod handler;
mod header;
mod message;
mod part;
mod read;
mod recipient;
mod write;

pub mod encoding;

pub use content_type::{ContentDisposition, ContentType};
pub use encoding::TransferEncoding;
pub use error::{Error, Result};
pub use handler::{LoggingHandler, PartCollector, PartHandler, PartHeader, ReceivedPart};
pub use header::{Headers, field};
pub use message::Message;
pub use part::{Disposition, FilePartSource, Part, PartSource, StringPartSource};
pub use recipient::{Recipient, RecipientKind, format_mailbox, parse_address_list};
pub use write::{WriteOptions, WriteOptionsBuilder};
