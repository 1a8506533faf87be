//! # tuffy-proto
//!
//! The wire format spoken between clients and the Tuffy command host.
//!
//! ## Requests
//!
//! One request per line: a trigger (the configured prefix such as `!`, or
//! the slash form `/`) immediately followed by the command name, then
//! optional free-form arguments.
//!
//! ```rust
//! use tuffy_proto::{Request, Trigger};
//!
//! let req = Request::parse("!calc 5+3*2", "!").unwrap().unwrap();
//! assert_eq!(req.trigger, Trigger::Prefix);
//! assert_eq!(req.name, "calc");
//! assert_eq!(req.args, "5+3*2");
//! ```
//!
//! ## Replies
//!
//! A [`Reply`] is either plain text or an [`Embed`]. Both are flattened to
//! protocol lines with [`Reply::to_lines`].

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod reply;
pub mod request;

pub use error::{ParseError, Result};
pub use reply::{Embed, EmbedField, Reply};
pub use request::{Request, Trigger, MAX_LINE_LEN, SLASH};
