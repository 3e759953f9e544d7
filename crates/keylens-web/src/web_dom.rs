#![forbid(unsafe_code)]

//! [`Dom`] over the live browser document.

use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};

use js_sys::{Array, Reflect};
use keylens_dom::{Dom, NodeKind, Point, Rect};
use tracing::warn;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Attr, Document, Element, HtmlElement, Node};

const TARGET: &str = "keylens::web";

/// Expando property carrying a node's identity across JS round trips.
const ID_PROPERTY: &str = "__keylensId";

thread_local! {
    static NEXT_ID: Cell<u32> = const { Cell::new(1) };
}

/// A DOM node with a stable identity.
///
/// Equality and hashing use the id stamped on the JS object, so the same
/// node reached through different JS references is the same key.
#[derive(Clone)]
pub struct WebNode {
    id: u32,
    node: Node,
}

impl WebNode {
    /// Stamp `node` with an id on first sight.
    #[must_use]
    pub fn from_node(node: Node) -> Self {
        let property = JsValue::from_str(ID_PROPERTY);
        let existing = Reflect::get(&node, &property)
            .ok()
            .and_then(|value| value.as_f64());
        let id = match existing {
            Some(id) => id as u32,
            None => {
                let id = NEXT_ID.with(|next| {
                    let id = next.get();
                    next.set(id.wrapping_add(1));
                    id
                });
                if Reflect::set(&node, &property, &JsValue::from_f64(f64::from(id))).is_err() {
                    warn!(target: TARGET, id, "could not stamp node id");
                }
                id
            }
        };
        Self { id, node }
    }

    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub const fn node(&self) -> &Node {
        &self.node
    }

    fn element(&self) -> Option<&Element> {
        self.node.dyn_ref::<Element>()
    }

    fn attr(&self) -> Option<&Attr> {
        self.node.dyn_ref::<Attr>()
    }
}

impl PartialEq for WebNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WebNode {}

impl Hash for WebNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for WebNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WebNode({} {})", self.id, self.node.node_name())
    }
}

/// The page document.
pub struct WebDom {
    document: Document,
}

impl WebDom {
    #[must_use]
    pub const fn new(document: Document) -> Self {
        Self { document }
    }

    /// Document of the current window, if any.
    #[must_use]
    pub fn from_window() -> Option<Self> {
        web_sys::window()?.document().map(Self::new)
    }

    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }
}

fn wrap_all(list: impl IntoIterator<Item = Node>) -> Vec<WebNode> {
    list.into_iter().map(WebNode::from_node).collect()
}

impl Dom for WebDom {
    type Node = WebNode;

    fn node_kind(&self, node: &WebNode) -> NodeKind {
        match node.node.node_type() {
            Node::ELEMENT_NODE => NodeKind::Element,
            Node::TEXT_NODE => NodeKind::Text,
            Node::ATTRIBUTE_NODE => NodeKind::Attribute,
            _ => NodeKind::Other,
        }
    }

    fn body(&self) -> Option<WebNode> {
        let body: Node = self.document.body()?.into();
        Some(WebNode::from_node(body))
    }

    fn parent_element(&self, node: &WebNode) -> Option<WebNode> {
        let parent = match node.attr() {
            Some(attr) => attr.owner_element(),
            None => node.node.parent_element(),
        }?;
        Some(WebNode::from_node(parent.into()))
    }

    fn child_nodes(&self, node: &WebNode) -> Vec<WebNode> {
        let list = node.node.child_nodes();
        wrap_all((0..list.length()).filter_map(|i| list.item(i)))
    }

    fn tag_name(&self, element: &WebNode) -> Option<String> {
        element
            .element()
            .map(|el| el.tag_name().to_ascii_lowercase())
    }

    fn get_attribute(&self, element: &WebNode, name: &str) -> Option<String> {
        element.element()?.get_attribute(name)
    }

    fn attribute_node(&self, element: &WebNode, name: &str) -> Option<WebNode> {
        let attr = element.element()?.get_attribute_node(name)?;
        Some(WebNode::from_node(attr.into()))
    }

    fn attribute_nodes(&self, element: &WebNode) -> Vec<WebNode> {
        let Some(el) = element.element() else {
            return Vec::new();
        };
        let map = el.attributes();
        wrap_all(
            (0..map.length())
                .filter_map(|i| map.item(i))
                .map(Node::from),
        )
    }

    fn attribute_name(&self, attr: &WebNode) -> Option<String> {
        attr.attr().map(Attr::name)
    }

    fn text_content(&self, node: &WebNode) -> Option<String> {
        match node.attr() {
            Some(attr) => Some(attr.value()),
            None => node.node.text_content(),
        }
    }

    fn set_text_content(&mut self, node: &WebNode, text: &str) {
        match node.attr() {
            Some(attr) => attr.set_value(text),
            None => node.node.set_text_content(Some(text)),
        }
    }

    fn is_connected(&self, node: &WebNode) -> bool {
        match node.attr() {
            Some(attr) => attr
                .owner_element()
                .is_some_and(|owner| owner.is_connected()),
            None => node.node.is_connected(),
        }
    }

    fn bounding_client_rect(&self, element: &WebNode) -> Rect {
        element.element().map_or_else(Rect::default, |el| {
            let rect = el.get_bounding_client_rect();
            Rect::new(rect.x(), rect.y(), rect.width(), rect.height())
        })
    }

    fn elements_from_point(&self, point: Point) -> Vec<WebNode> {
        let hits: Array = self
            .document
            .elements_from_point(point.x as f32, point.y as f32);
        wrap_all(
            hits.iter()
                .filter_map(|value| value.dyn_into::<Node>().ok()),
        )
    }

    fn precedes(&self, a: &WebNode, b: &WebNode) -> bool {
        a != b && a.node.compare_document_position(&b.node) & Node::DOCUMENT_POSITION_FOLLOWING != 0
    }

    fn create_overlay(&mut self, class_name: &str) -> Option<WebNode> {
        let overlay = match self.document.create_element("div") {
            Ok(el) => el,
            Err(err) => {
                warn!(target: TARGET, ?err, "overlay creation failed");
                return None;
            }
        };
        overlay.set_class_name(class_name);
        let body = self.document.body()?;
        if let Err(err) = body.append_child(&overlay) {
            warn!(target: TARGET, ?err, "overlay insertion failed");
            return None;
        }
        Some(WebNode::from_node(overlay.into()))
    }

    fn set_style(&mut self, element: &WebNode, property: &str, value: &str) {
        let Some(el) = element.node.dyn_ref::<HtmlElement>() else {
            return;
        };
        if let Err(err) = el.style().set_property(property, value) {
            warn!(target: TARGET, property, ?err, "style update rejected");
        }
    }

    fn remove_node(&mut self, node: &WebNode) {
        if let Some(el) = node.element() {
            el.remove();
            return;
        }
        if let Some(parent) = node.node.parent_node()
            && let Err(err) = parent.remove_child(&node.node)
        {
            warn!(target: TARGET, ?node, ?err, "node removal failed");
        }
    }
}
