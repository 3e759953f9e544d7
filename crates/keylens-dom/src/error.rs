#![forbid(unsafe_code)]

use std::fmt;

/// Structural errors raised while walking the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The node has no parent element at all. Registering such a node is a
    /// caller bug: it was detached before it was handed over.
    NoSuitableParent { node: String },
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuitableParent { node } => {
                write!(f, "no suitable parent found for node {node}")
            }
        }
    }
}

impl std::error::Error for DomError {}
