#![forbid(unsafe_code)]

//! Core vocabulary for keylens.
//!
//! # Role in keylens
//! `keylens-core` owns everything that does not need a document: key
//! descriptors and their matching rule, the invisible key codec that hides key
//! metadata inside rendered text, the observer configuration surface, and the
//! shared error type.
//!
//! # How it fits in the system
//! `keylens-dom` builds the document abstraction on top of these types and
//! `keylens-observer` drives the live binding engine. Nothing here depends on a
//! browser, so the codec can be used by server-side renderers that produce
//! wrapped strings ahead of time.

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod options;

pub use codec::{INVISIBLE_CHARACTERS, InvisibleWrapper, Unwrapped, WrapProps};
pub use descriptor::{KeyDescriptor, KeyFilter, NsFallback, ns_fallback};
pub use error::ObserverError;
pub use options::{
    ElementInfo, ModifierKey, Modifiers, ObserverOptions, PassToParent, TagAttributes,
};

/// Id of the container that hosts the tool's own overlay UI.
///
/// Pointer events inside this subtree are never treated as page content.
pub const DEVTOOLS_ID: &str = "__i18n_dev_tools";

/// z-index used by the tool's dialogs.
pub const DEVTOOLS_Z_INDEX: u32 = 2_147_483_000;

/// Attribute whose value is a bare translation key (no surrounding prose).
pub const KEY_ONLY_ATTRIBUTE: &str = "data-i18n-key-only";

/// Attribute that excludes an element subtree from decoding.
pub const RESTRICT_ATTRIBUTE: &str = "data-i18n-restricted";

/// Class applied to highlight overlay boxes.
pub const HIGHLIGHTER_CLASS: &str = "_i18n-highlighter";
