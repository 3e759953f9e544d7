#![forbid(unsafe_code)]

//! Document abstraction for keylens.
//!
//! Design goals:
//! - **Host-driven**: the engine never owns a document. Every operation takes
//!   the [`Dom`] explicitly, so the same code runs against `web_sys` in a
//!   browser and against [`MemoryDom`] in headless hosts and tests.
//! - **Identity handles**: nodes are opaque, hashable handles. Two distinct
//!   nodes are always distinct keys even when their content is identical.
//! - **Batched mutations**: changes reach the engine as ordered
//!   [`MutationRecord`] batches, mirroring `MutationObserver` delivery.

pub mod error;
pub mod geometry;
pub mod helper;
pub mod memory;

use core::fmt;
use core::hash::Hash;

pub use error::DomError;
pub use geometry::{Point, Rect};
pub use helper::{
    AncestorSearch, DomHelper, MAX_ANCESTOR_DEPTH, element_clickable, element_info, find_ancestor,
    is_in_devtools, is_restricted,
};
pub use memory::{MemoryDom, NodeId};

/// Node categories the engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element,
    Text,
    Attribute,
    Other,
}

/// One entry of a mutation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord<N> {
    /// Text content of `target` changed.
    CharacterData { target: N },
    /// Children of `target` were added and/or removed.
    ChildList {
        target: N,
        added: Vec<N>,
        removed: Vec<N>,
    },
    /// Attribute `name` of element `target` changed, was added, or removed.
    Attributes { target: N, name: String },
}

impl<N> MutationRecord<N> {
    #[must_use]
    pub const fn target(&self) -> &N {
        match self {
            Self::CharacterData { target }
            | Self::ChildList { target, .. }
            | Self::Attributes { target, .. } => target,
        }
    }
}

/// The slice of the DOM the binding engine reads and writes.
///
/// Element-only methods may be called with any node; they return `None`,
/// empty lists, or do nothing for nodes that are not elements.
pub trait Dom {
    type Node: Clone + Eq + Hash + fmt::Debug;

    fn node_kind(&self, node: &Self::Node) -> NodeKind;

    /// Default observation root.
    fn body(&self) -> Option<Self::Node>;

    /// Parent element of an element or text node; owner element of an
    /// attribute node.
    fn parent_element(&self, node: &Self::Node) -> Option<Self::Node>;

    fn child_nodes(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Lowercase tag name.
    fn tag_name(&self, element: &Self::Node) -> Option<String>;

    fn get_attribute(&self, element: &Self::Node, name: &str) -> Option<String>;

    fn attribute_node(&self, element: &Self::Node, name: &str) -> Option<Self::Node>;

    fn attribute_nodes(&self, element: &Self::Node) -> Vec<Self::Node>;

    fn attribute_name(&self, attr: &Self::Node) -> Option<String>;

    /// Text data of a text node, value of an attribute node.
    fn text_content(&self, node: &Self::Node) -> Option<String>;

    fn set_text_content(&mut self, node: &Self::Node, text: &str);

    fn is_connected(&self, node: &Self::Node) -> bool;

    /// Layout rectangle in viewport coordinates.
    fn bounding_client_rect(&self, element: &Self::Node) -> Rect;

    /// Every element under `point`, topmost first.
    fn elements_from_point(&self, point: Point) -> Vec<Self::Node>;

    /// Whether `a` comes before `b` in document order.
    fn precedes(&self, a: &Self::Node, b: &Self::Node) -> bool;

    /// Create a `div` with `class_name` and append it to the body.
    fn create_overlay(&mut self, class_name: &str) -> Option<Self::Node>;

    fn set_style(&mut self, element: &Self::Node, property: &str, value: &str);

    fn remove_node(&mut self, node: &Self::Node);

    fn element_id(&self, element: &Self::Node) -> Option<String> {
        self.get_attribute(element, "id")
    }

    fn has_attribute(&self, element: &Self::Node, name: &str) -> bool {
        self.get_attribute(element, name).is_some()
    }

    /// Descendants of `root` in document order, `root` excluded.
    fn descendants(&self, root: &Self::Node) -> Vec<Self::Node> {
        let mut out = Vec::new();
        let mut stack: Vec<Self::Node> = self.child_nodes(root).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            stack.extend(self.child_nodes(&node).into_iter().rev());
            out.push(node);
        }
        out
    }
}
