#![forbid(unsafe_code)]

//! Live DOM binding engine.
//!
//! # Role in keylens
//! `keylens-observer` keeps an up-to-date map from rendered elements to the
//! translation keys that produced their text. The host feeds it mutation
//! batches and input events; it decodes markers, writes plain text back,
//! tracks which element owns which node, and resolves the element under the
//! cursor for highlighting and click-to-inspect.
//!
//! # Primary responsibilities
//! - **Decoding**: [`NodeHandler`] finds marker-carrying text and attribute
//!   nodes; [`Observer`] strips markers and registers the keys.
//! - **Ownership**: [`ElementRegistry`] groups nodes under their owning
//!   element in an [`ElementStore`] and evicts elements that lost every node.
//! - **Input**: [`Resolver`] is a small state machine over the highlight
//!   chord and the element under the cursor; [`ElementHighlighter`] draws
//!   overlays.
//! - **Inspection**: clicks produce an [`ElementClick`]; [`resolve_click`]
//!   turns it into a direct key or a chooser with a [`PendingKey`].
//!
//! Everything is single-threaded and host-driven: no call blocks and the
//! document is always passed in explicitly.

pub mod highlighter;
pub mod meta;
pub mod node_handler;
pub mod observer;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod ui;

pub use highlighter::ElementHighlighter;
pub use meta::{ElementMeta, NodeRecord};
pub use node_handler::NodeHandler;
pub use observer::{ClickOutcome, HighlightHandle, KeyPosition, Observer};
pub use registry::ElementRegistry;
pub use resolver::{
    EventOutcome, HighlightState, Resolver, Transition, chord_active, element_under, transition,
};
pub use store::ElementStore;
pub use ui::{
    ClickResolution, ElementClick, KeyOption, KeySelector, PendingKey, TranslationSource,
    key_options, resolve_click,
};
