//! Captured output domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which child stream a line was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// A single line of child output, without its terminator
///
/// Blank lines are kept as empty text so the log stays a faithful transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub stream: StreamKind,
    pub text: String,
}

impl OutputLine {
    /// Creates a line read from `stream`
    pub fn new(stream: StreamKind, text: impl Into<String>) -> Self {
        Self {
            stream,
            text: text.into(),
        }
    }

    /// Decodes raw bytes read up to (and possibly including) a `\n`
    ///
    /// The terminator and a preceding `\r` are stripped. Invalid UTF-8 is
    /// replaced rather than rejected so no line is ever lost.
    pub fn from_raw(stream: StreamKind, raw: &[u8]) -> Self {
        let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        Self::new(stream, String::from_utf8_lossy(raw))
    }
}
