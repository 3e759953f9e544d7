#![forbid(unsafe_code)]

//! Candidate discovery: which text and attribute nodes carry markers.

use keylens_core::{InvisibleWrapper, KEY_ONLY_ATTRIBUTE, ObserverOptions};
use keylens_dom::{Dom, NodeKind};

/// Finds decode candidates inside a subtree.
#[derive(Debug, Clone, Copy)]
pub struct NodeHandler<'a> {
    options: &'a ObserverOptions,
}

impl<'a> NodeHandler<'a> {
    #[must_use]
    pub const fn new(options: &'a ObserverOptions) -> Self {
        Self { options }
    }

    /// Text nodes in `node`'s subtree (self included) whose content has a
    /// marker.
    pub fn handle_text<D: Dom>(&self, dom: &D, node: &D::Node) -> Vec<D::Node> {
        subtree(dom, node)
            .into_iter()
            .filter(|n| dom.node_kind(n) == NodeKind::Text && carries_marker(dom, n))
            .collect()
    }

    /// Watched attribute nodes with a marker, on `node` and optionally on
    /// every descendant element.
    pub fn handle_attributes<D: Dom>(
        &self,
        dom: &D,
        node: &D::Node,
        include_children: bool,
    ) -> Vec<D::Node> {
        let elements = if include_children {
            subtree(dom, node)
        } else {
            vec![node.clone()]
        };
        let mut out = Vec::new();
        for element in elements {
            if dom.node_kind(&element) != NodeKind::Element {
                continue;
            }
            let Some(tag) = dom.tag_name(&element) else {
                continue;
            };
            for name in self.options.attributes_for_tag(&tag) {
                if let Some(attr) = dom.attribute_node(&element, &name)
                    && carries_marker(dom, &attr)
                {
                    out.push(attr);
                }
            }
        }
        out
    }

    /// Attribute then text candidates for every node, in input order.
    pub fn handle_child_list<D: Dom>(&self, dom: &D, nodes: &[D::Node]) -> Vec<D::Node> {
        let mut out = Vec::new();
        for node in nodes {
            out.extend(self.handle_attributes(dom, node, true));
            out.extend(self.handle_text(dom, node));
        }
        out
    }

    /// Elements in the subtree that carry the key-only attribute.
    pub fn handle_key_attributes<D: Dom>(&self, dom: &D, node: &D::Node) -> Vec<D::Node> {
        subtree(dom, node)
            .into_iter()
            .filter(|n| {
                dom.node_kind(n) == NodeKind::Element && dom.has_attribute(n, KEY_ONLY_ATTRIBUTE)
            })
            .collect()
    }
}

fn subtree<D: Dom>(dom: &D, node: &D::Node) -> Vec<D::Node> {
    let mut nodes = vec![node.clone()];
    nodes.extend(dom.descendants(node));
    nodes
}

fn carries_marker<D: Dom>(dom: &D, node: &D::Node) -> bool {
    dom.text_content(node)
        .is_some_and(|text| InvisibleWrapper::has_marker(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keylens_core::KeyDescriptor;
    use keylens_dom::MemoryDom;
    use pretty_assertions::assert_eq;

    fn wrapped(key: &str, text: &str) -> String {
        InvisibleWrapper::new(true).wrap_keys(text, &[KeyDescriptor::new(key)])
    }

    #[test]
    fn text_candidates_only_with_markers() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let (_, plain) = dom.append_element_with_text(body, "p", "plain");
        let (div, marked) = dom.append_element_with_text(body, "div", &wrapped("k", "Hi"));
        let options = ObserverOptions::default();
        let handler = NodeHandler::new(&options);
        assert_eq!(handler.handle_text(&dom, &body), vec![marked]);
        assert_eq!(handler.handle_text(&dom, &marked), vec![marked]);
        assert!(handler.handle_text(&dom, &plain).is_empty());
        assert_eq!(handler.handle_text(&dom, &div), vec![marked]);
    }

    #[test]
    fn attribute_candidates_follow_watch_list() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let img = dom.append_element(body, "img");
        let alt = dom.set_attribute(img, "alt", &wrapped("logo", "Logo"));
        dom.set_attribute(img, "data-x", &wrapped("ignored", "x"));
        let div = dom.append_element(body, "div");
        dom.set_attribute(div, "alt", &wrapped("not-watched", "y"));
        let title = dom.set_attribute(div, "title", &wrapped("tip", "Tip"));

        let options = ObserverOptions::default();
        let handler = NodeHandler::new(&options);
        assert_eq!(handler.handle_attributes(&dom, &img, false), vec![alt]);
        assert!(handler.handle_attributes(&dom, &body, false).is_empty());
        assert_eq!(handler.handle_attributes(&dom, &body, true), vec![alt, title]);
    }

    #[test]
    fn child_list_puts_attributes_before_text() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let (p, text) = dom.append_element_with_text(body, "p", &wrapped("body", "B"));
        let title = dom.set_attribute(p, "title", &wrapped("tip", "T"));
        let options = ObserverOptions::default();
        let handler = NodeHandler::new(&options);
        assert_eq!(handler.handle_child_list(&dom, &[p]), vec![title, text]);
    }

    #[test]
    fn key_only_elements_are_found() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let badge = dom.append_element(body, "span");
        dom.set_attribute(badge, KEY_ONLY_ATTRIBUTE, "badge.new");
        dom.append_element(body, "span");
        let options = ObserverOptions::default();
        let handler = NodeHandler::new(&options);
        assert_eq!(handler.handle_key_attributes(&dom, &body), vec![badge]);
    }
}
