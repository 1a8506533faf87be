//! Request line parsing.
//!
//! Parsing borrows from the input line; nothing is allocated on the happy
//! path.

use crate::error::{ParseError, Result};

/// The slash trigger, always accepted alongside the configured prefix.
pub const SLASH: &str = "/";

/// Longest accepted request line, in bytes.
pub const MAX_LINE_LEN: usize = 2000;

/// How a command was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Invoked with the configured text prefix (`!hello`).
    Prefix,
    /// Invoked in slash form (`/hello`).
    Slash,
}

/// A parsed request borrowing from the original line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    /// How the command was triggered.
    pub trigger: Trigger,
    /// Command name, as typed (match case-insensitively).
    pub name: &'a str,
    /// Everything after the name, trimmed. Empty when absent.
    pub args: &'a str,
}

impl<'a> Request<'a> {
    /// Parse one line.
    ///
    /// Returns `Ok(None)` for blank lines so callers can skip them.
    pub fn parse(line: &'a str, prefix: &str) -> Result<Option<Self>> {
        if line.len() > MAX_LINE_LEN {
            return Err(ParseError::TooLong(line.len()));
        }

        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (trigger, rest) = if !prefix.is_empty() && line.starts_with(prefix) {
            (Trigger::Prefix, &line[prefix.len()..])
        } else if let Some(rest) = line.strip_prefix(SLASH) {
            (Trigger::Slash, rest)
        } else {
            return Err(ParseError::NotACommand);
        };

        let (name, args) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };

        if name.is_empty() {
            return Err(ParseError::EmptyName);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ParseError::InvalidName(name.to_string()));
        }

        Ok(Some(Self {
            trigger,
            name,
            args,
        }))
    }

    /// Command name folded to lowercase for table lookup.
    pub fn key(&self) -> String {
        self.name.to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefix_form() {
        let req = Request::parse("!hello", "!").unwrap().unwrap();
        assert_eq!(req.trigger, Trigger::Prefix);
        assert_eq!(req.name, "hello");
        assert_eq!(req.args, "");
    }

    #[test]
    fn parses_slash_form_with_args() {
        let req = Request::parse("/calc   5 + 3 ", "!").unwrap().unwrap();
        assert_eq!(req.trigger, Trigger::Slash);
        assert_eq!(req.name, "calc");
        assert_eq!(req.args, "5 + 3");
    }

    #[test]
    fn multi_char_prefix() {
        let req = Request::parse("t!ping", "t!").unwrap().unwrap();
        assert_eq!(req.name, "ping");
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(Request::parse("   ", "!").unwrap(), None);
    }

    #[test]
    fn rejects_plain_chat() {
        assert_eq!(Request::parse("hello there", "!"), Err(ParseError::NotACommand));
    }

    #[test]
    fn rejects_empty_and_invalid_names() {
        assert_eq!(Request::parse("!", "!"), Err(ParseError::EmptyName));
        assert_eq!(Request::parse("! hello", "!"), Err(ParseError::EmptyName));
        assert_eq!(
            Request::parse("!he$llo", "!"),
            Err(ParseError::InvalidName("he$llo".to_string()))
        );
    }

    #[test]
    fn rejects_oversized_lines() {
        let line = format!("!calc {}", "1".repeat(MAX_LINE_LEN));
        assert!(matches!(Request::parse(&line, "!"), Err(ParseError::TooLong(_))));
    }

    #[test]
    fn key_is_lowercase() {
        let req = Request::parse("/PiNg", "!").unwrap().unwrap();
        assert_eq!(req.key(), "ping");
    }
}
