#![forbid(unsafe_code)]

//! Browser adapter for keylens.
//!
//! # Role in keylens
//! `keylens-web` is the only crate that touches `web_sys`. It implements
//! [`keylens_dom::Dom`] over the live document, feeds `MutationObserver`
//! batches and window input events into a [`keylens_observer::Observer`],
//! and exports a small JS API through `wasm-bindgen`.
//!
//! The argument and payload conversions in [`bridge`] are plain Rust and
//! are tested natively; everything that needs a browser is compiled only
//! for `wasm32`.

pub mod bridge;

#[cfg(target_arch = "wasm32")]
mod wasm;
#[cfg(target_arch = "wasm32")]
mod web_dom;

pub use bridge::{FilterArgs, click_payload, parse_filter, parse_translations, parse_wrap_props};

#[cfg(target_arch = "wasm32")]
pub use wasm::KeylensWeb;
#[cfg(target_arch = "wasm32")]
pub use web_dom::{WebDom, WebNode};
