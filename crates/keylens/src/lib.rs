#![forbid(unsafe_code)]

//! keylens public facade crate.
//!
//! Re-exports the types most hosts need from the internal crates and offers
//! a prelude. A typical headless host looks like this:
//!
//! ```
//! use keylens::prelude::*;
//!
//! let mut dom = MemoryDom::new();
//! let mut observer = Observer::new(ObserverOptions::default());
//! observer.run(&mut dom, None)?;
//!
//! let text = observer.wrap(WrapProps::new("home.title").translation("Welcome"));
//! let body = dom.body_id();
//! let (heading, _) = dom.append_element_with_text(body, "h1", &text);
//! let batch = dom.take_records();
//! observer.handle_mutations(&mut dom, &batch);
//!
//! let positions = observer.find_positions(&dom, &KeyFilter::new(Some("home.title"), None));
//! assert_eq!(positions.len(), 1);
//! assert!(observer.registry().get(&heading).is_some());
//! # Ok::<(), keylens::Error>(())
//! ```

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use keylens_core::{
    DEVTOOLS_ID, HIGHLIGHTER_CLASS, INVISIBLE_CHARACTERS, InvisibleWrapper, KEY_ONLY_ATTRIBUTE,
    KeyDescriptor, KeyFilter, ModifierKey, Modifiers, NsFallback, ObserverError, ObserverOptions,
    PassToParent, RESTRICT_ATTRIBUTE, Unwrapped, WrapProps, ns_fallback,
};

// --- Document re-exports ---------------------------------------------------

pub use keylens_dom::{Dom, DomError, MemoryDom, MutationRecord, NodeId, NodeKind, Point, Rect};

// --- Observer re-exports ---------------------------------------------------

pub use keylens_observer::{
    ClickOutcome, ClickResolution, ElementClick, EventOutcome, HighlightHandle, HighlightState,
    KeyOption, KeyPosition, KeySelector, Observer, PendingKey, TranslationSource, resolve_click,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for keylens hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Configuration or startup failure.
    Observer(ObserverError),
    /// Structural document problem.
    Dom(DomError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Observer(err) => write!(f, "{err}"),
            Self::Dom(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Observer(err) => Some(err),
            Self::Dom(err) => Some(err),
        }
    }
}

impl From<ObserverError> for Error {
    fn from(err: ObserverError) -> Self {
        Self::Observer(err)
    }
}

impl From<DomError> for Error {
    fn from(err: DomError) -> Self {
        Self::Dom(err)
    }
}

/// Standard result type for keylens APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Dom, Error, KeyDescriptor, KeyFilter, MemoryDom, Modifiers, Observer, ObserverOptions,
        Point, Rect, Result, WrapProps,
    };

    pub use crate::{core, dom, observer};
}

pub use keylens_core as core;
pub use keylens_dom as dom;
pub use keylens_observer as observer;
