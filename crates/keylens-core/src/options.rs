#![forbid(unsafe_code)]

//! Observer configuration.
//!
//! Hosts usually hand options over as JSON (camelCase keys, every field
//! optional). The only setting that cannot travel as JSON is a custom
//! pass-to-parent predicate, which Rust hosts set directly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use serde::Deserialize;

use crate::KEY_ONLY_ATTRIBUTE;
use crate::error::ObserverError;

bitflags! {
    /// Modifier keys held during an input event.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const META  = 0b1000;
    }
}

impl Modifiers {
    /// Build from the four DOM event flags (`ctrlKey`, `altKey`, ...).
    #[must_use]
    pub fn from_event_flags(ctrl: bool, alt: bool, meta: bool, shift: bool) -> Self {
        let mut mods = Self::empty();
        mods.set(Self::CTRL, ctrl);
        mods.set(Self::ALT, alt);
        mods.set(Self::META, meta);
        mods.set(Self::SHIFT, shift);
        mods
    }
}

/// A modifier key name as used in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ModifierKey {
    Control,
    Alt,
    Meta,
    Shift,
}

impl ModifierKey {
    #[must_use]
    pub const fn flag(self) -> Modifiers {
        match self {
            Self::Control => Modifiers::CTRL,
            Self::Alt => Modifiers::ALT,
            Self::Meta => Modifiers::META,
            Self::Shift => Modifiers::SHIFT,
        }
    }
}

/// Watched attribute names per lowercase tag name; `*` applies to every tag.
pub type TagAttributes = BTreeMap<String, Vec<String>>;

/// Snapshot of an ancestor handed to a custom pass-to-parent predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementInfo {
    /// Lowercase tag name.
    pub tag_name: String,
    pub id: Option<String>,
    pub class_name: Option<String>,
}

/// Which ancestors are transparent when grouping nodes into elements.
#[derive(Clone, Deserialize)]
#[serde(from = "PassToParentRepr")]
pub enum PassToParent {
    /// The structural parent is always the owner.
    Disabled,
    /// Skip ancestors whose tag is in the list (case-insensitive).
    Tags(Vec<String>),
    /// Skip ancestors for which the predicate returns true.
    Custom(Rc<dyn Fn(&ElementInfo) -> bool>),
}

impl PassToParent {
    #[must_use]
    pub fn custom(predicate: impl Fn(&ElementInfo) -> bool + 'static) -> Self {
        Self::Custom(Rc::new(predicate))
    }

    fn default_tags() -> Vec<String> {
        vec!["option".to_owned(), "optgroup".to_owned()]
    }
}

impl Default for PassToParent {
    fn default() -> Self {
        Self::Tags(Self::default_tags())
    }
}

impl fmt::Debug for PassToParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Tags(tags) => f.debug_tuple("Tags").field(tags).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PassToParentRepr {
    Flag(bool),
    Tags(Vec<String>),
}

impl From<PassToParentRepr> for PassToParent {
    fn from(repr: PassToParentRepr) -> Self {
        match repr {
            PassToParentRepr::Flag(false) => Self::Disabled,
            PassToParentRepr::Flag(true) => Self::default(),
            PassToParentRepr::Tags(tags) => Self::Tags(tags),
        }
    }
}

/// Everything the observer reads from its host.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObserverOptions {
    pub tag_attributes: TagAttributes,
    pub restricted_elements: Vec<String>,
    pub pass_to_parent: PassToParent,
    pub highlight_keys: Vec<ModifierKey>,
    pub highlight_color: String,
    pub highlight_width: u32,
    pub full_key_encode: bool,
    pub mouse_highlight: bool,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        let mut tag_attributes = TagAttributes::new();
        tag_attributes.insert("textarea".into(), vec!["placeholder".into()]);
        tag_attributes.insert("input".into(), vec!["value".into(), "placeholder".into()]);
        tag_attributes.insert("img".into(), vec!["alt".into()]);
        tag_attributes.insert("*".into(), vec!["aria-label".into(), "title".into()]);
        Self {
            tag_attributes,
            restricted_elements: vec!["script".into(), "style".into()],
            pass_to_parent: PassToParent::default(),
            highlight_keys: vec![ModifierKey::Alt],
            highlight_color: "#ff0000".into(),
            highlight_width: 5,
            full_key_encode: false,
            mouse_highlight: true,
        }
    }
}

impl ObserverOptions {
    /// Parse host options; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ObserverError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|err| ObserverError::InvalidOptions(err.to_string()))
    }

    /// Modifier chord that must be held for highlighting.
    #[must_use]
    pub fn highlight_chord(&self) -> Modifiers {
        self.highlight_keys
            .iter()
            .fold(Modifiers::empty(), |acc, key| acc | key.flag())
    }

    /// Watched attributes for one element, tag-specific entries first.
    #[must_use]
    pub fn attributes_for_tag(&self, tag_name: &str) -> Vec<String> {
        let tag = tag_name.to_ascii_lowercase();
        let specific = self
            .tag_attributes
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(&tag));
        let wildcard = self.tag_attributes.get("*").into_iter();
        let mut out: Vec<String> = Vec::new();
        for attrs in specific.map(|(_, attrs)| attrs).chain(wildcard) {
            for attr in attrs {
                let attr = attr.to_ascii_lowercase();
                if !out.contains(&attr) {
                    out.push(attr);
                }
            }
        }
        out
    }

    /// Every attribute name a mutation feed must report, lowercase.
    #[must_use]
    pub fn monitored_attributes(&self) -> Vec<String> {
        let mut set: BTreeSet<String> = self
            .tag_attributes
            .values()
            .flatten()
            .map(|attr| attr.to_ascii_lowercase())
            .collect();
        set.insert(KEY_ONLY_ATTRIBUTE.to_owned());
        set.into_iter().collect()
    }

    #[must_use]
    pub fn is_restricted_tag(&self, tag_name: &str) -> bool {
        self.restricted_elements
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(tag_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_documented_values() {
        let opts = ObserverOptions::default();
        assert_eq!(opts.highlight_chord(), Modifiers::ALT);
        assert_eq!(opts.highlight_width, 5);
        assert!(opts.is_restricted_tag("SCRIPT"));
        assert!(matches!(opts.pass_to_parent, PassToParent::Tags(ref t) if t.len() == 2));
    }

    #[test]
    fn attributes_for_tag_merges_wildcard() {
        let opts = ObserverOptions::default();
        assert_eq!(
            opts.attributes_for_tag("INPUT"),
            vec!["value", "placeholder", "aria-label", "title"]
        );
        assert_eq!(opts.attributes_for_tag("div"), vec!["aria-label", "title"]);
    }

    #[test]
    fn monitored_attributes_include_key_only_marker() {
        let attrs = ObserverOptions::default().monitored_attributes();
        assert!(attrs.contains(&KEY_ONLY_ATTRIBUTE.to_owned()));
        assert!(attrs.contains(&"alt".to_owned()));
        let mut sorted = attrs.clone();
        sorted.sort();
        assert_eq!(attrs, sorted);
    }

    #[test]
    fn json_options_fill_defaults() {
        let opts = ObserverOptions::from_json(
            r##"{"highlightKeys":["Control","Shift"],"passToParent":false,"highlightColor":"#00f"}"##,
        )
        .expect("valid options");
        assert_eq!(opts.highlight_chord(), Modifiers::CTRL | Modifiers::SHIFT);
        assert!(matches!(opts.pass_to_parent, PassToParent::Disabled));
        assert_eq!(opts.highlight_color, "#00f");
        assert_eq!(opts.highlight_width, 5);

        let tags = ObserverOptions::from_json(r#"{"passToParent":["li"]}"#).expect("tags");
        assert!(matches!(tags.pass_to_parent, PassToParent::Tags(ref t) if t == &["li"]));
        assert!(ObserverOptions::from_json("").is_ok());
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = ObserverOptions::from_json(r#"{"highlightWidth":"wide"}"#).unwrap_err();
        assert!(matches!(err, ObserverError::InvalidOptions(_)));
    }

    #[test]
    fn modifiers_from_event_flags() {
        assert_eq!(
            Modifiers::from_event_flags(true, false, true, false),
            Modifiers::CTRL | Modifiers::META
        );
    }
}
