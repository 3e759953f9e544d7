#![forbid(unsafe_code)]

use std::fmt;

/// Errors surfaced to the host when configuring or starting an observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverError {
    /// Host options could not be parsed.
    InvalidOptions(String),
    /// No target subtree was given and the document has no body.
    NoTarget,
}

impl fmt::Display for ObserverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOptions(msg) => write!(f, "invalid observer options: {msg}"),
            Self::NoTarget => f.write_str("no target element to observe"),
        }
    }
}

impl std::error::Error for ObserverError {}
