//! Error types for request parsing.

use thiserror::Error;

/// Convenience type alias for Results using [`ParseError`].
pub type Result<T, E = ParseError> = std::result::Result<T, E>;

/// Errors produced while parsing a request line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The line does not start with the command prefix or a slash.
    #[error("not a command")]
    NotACommand,

    /// A trigger with no command name after it (e.g. a lone `!`).
    #[error("missing command name")]
    EmptyName,

    /// The command name contains characters outside `[A-Za-z0-9_-]`.
    #[error("invalid command name: {0}")]
    InvalidName(String),

    /// The line exceeds [`crate::request::MAX_LINE_LEN`] bytes.
    #[error("request too long: {0} bytes")]
    TooLong(usize),
}
