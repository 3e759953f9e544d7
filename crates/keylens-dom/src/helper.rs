#![forbid(unsafe_code)]

//! Ancestor navigation: grouping nodes under their owning element and
//! finding tracked ancestors under the pointer.

use keylens_core::{DEVTOOLS_ID, ElementInfo, PassToParent, RESTRICT_ATTRIBUTE};

use crate::{Dom, DomError};

/// Upper bound for every ancestor walk.
pub const MAX_ANCESTOR_DEPTH: usize = 512;

/// Outcome of a bounded ancestor walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AncestorSearch<N> {
    /// First ancestor-or-self accepted by the predicate.
    Found(N),
    /// The walk reached the tool's own UI container.
    Blocked,
    /// Reached the root (or the depth cap) without a match.
    NotFound,
}

/// Resolves the element that owns a text or attribute node.
#[derive(Debug, Clone, Default)]
pub struct DomHelper {
    pass_to_parent: PassToParent,
}

impl DomHelper {
    #[must_use]
    pub fn new(pass_to_parent: PassToParent) -> Self {
        Self { pass_to_parent }
    }

    /// Structural parent of `node`, lifted past transparent ancestors.
    ///
    /// Fails when `node` (or a transparent ancestor that must be skipped) has
    /// no parent element.
    pub fn suitable_parent<D: Dom>(&self, dom: &D, node: &D::Node) -> Result<D::Node, DomError> {
        let mut current = parent_or_error(dom, node)?;
        for _ in 0..MAX_ANCESTOR_DEPTH {
            if !self.is_transparent(dom, &current) {
                return Ok(current);
            }
            current = parent_or_error(dom, &current)?;
        }
        Ok(current)
    }

    fn is_transparent<D: Dom>(&self, dom: &D, element: &D::Node) -> bool {
        match &self.pass_to_parent {
            PassToParent::Disabled => false,
            PassToParent::Tags(tags) => dom
                .tag_name(element)
                .is_some_and(|tag| tags.iter().any(|t| t.eq_ignore_ascii_case(&tag))),
            PassToParent::Custom(predicate) => predicate(&element_info(dom, element)),
        }
    }
}

fn parent_or_error<D: Dom>(dom: &D, node: &D::Node) -> Result<D::Node, DomError> {
    dom.parent_element(node).ok_or_else(|| {
        tracing::error!(
            target: "keylens::dom",
            node = ?node,
            "no suitable parent found for node"
        );
        DomError::NoSuitableParent {
            node: format!("{node:?}"),
        }
    })
}

/// Snapshot used by custom pass-to-parent predicates.
#[must_use]
pub fn element_info<D: Dom>(dom: &D, element: &D::Node) -> ElementInfo {
    ElementInfo {
        tag_name: dom.tag_name(element).unwrap_or_default(),
        id: dom.element_id(element),
        class_name: dom.get_attribute(element, "class"),
    }
}

/// Walk from `start` up through parent elements.
///
/// An element whose id equals `blocker_id` stops the walk with
/// [`AncestorSearch::Blocked`] before the predicate sees it.
pub fn find_ancestor<D, F>(
    dom: &D,
    start: &D::Node,
    blocker_id: &str,
    mut predicate: F,
) -> AncestorSearch<D::Node>
where
    D: Dom,
    F: FnMut(&D::Node) -> bool,
{
    let mut current = Some(start.clone());
    for _ in 0..MAX_ANCESTOR_DEPTH {
        let Some(node) = current else {
            return AncestorSearch::NotFound;
        };
        if dom.element_id(&node).as_deref() == Some(blocker_id) {
            return AncestorSearch::Blocked;
        }
        if predicate(&node) {
            return AncestorSearch::Found(node);
        }
        current = dom.parent_element(&node);
    }
    AncestorSearch::NotFound
}

/// Whether `node` sits inside the tool's own UI container.
#[must_use]
pub fn is_in_devtools<D: Dom>(dom: &D, node: &D::Node) -> bool {
    matches!(
        find_ancestor(dom, node, DEVTOOLS_ID, |_| false),
        AncestorSearch::Blocked
    )
}

/// False when the element or any ancestor is `disabled`.
#[must_use]
pub fn element_clickable<D: Dom>(dom: &D, element: &D::Node) -> bool {
    !any_ancestor_or_self(dom, element, |el| dom.has_attribute(el, "disabled"))
}

/// Restricted elements (by tag, or by the restrict attribute on the element
/// or an ancestor) are never decoded.
#[must_use]
pub fn is_restricted<D: Dom>(dom: &D, element: &D::Node, restricted_tags: &[String]) -> bool {
    let tag_restricted = dom
        .tag_name(element)
        .is_some_and(|tag| restricted_tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)));
    tag_restricted
        || any_ancestor_or_self(dom, element, |el| dom.has_attribute(el, RESTRICT_ATTRIBUTE))
}

fn any_ancestor_or_self<D, F>(dom: &D, start: &D::Node, mut predicate: F) -> bool
where
    D: Dom,
    F: FnMut(&D::Node) -> bool,
{
    let mut current = Some(start.clone());
    for _ in 0..MAX_ANCESTOR_DEPTH {
        let Some(node) = current else {
            return false;
        };
        if predicate(&node) {
            return true;
        }
        current = dom.parent_element(&node);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDom;
    use pretty_assertions::assert_eq;

    #[test]
    fn suitable_parent_is_structural_parent_when_disabled() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let (p, text) = dom.append_element_with_text(body, "p", "hi");
        let helper = DomHelper::new(PassToParent::Disabled);
        assert_eq!(helper.suitable_parent(&dom, &text), Ok(p));
    }

    #[test]
    fn suitable_parent_skips_listed_tags() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let select = dom.append_element(body, "select");
        let group = dom.append_element(select, "OPTGROUP");
        let (_option, text) = dom.append_element_with_text(group, "option", "One");
        let helper = DomHelper::default();
        assert_eq!(helper.suitable_parent(&dom, &text), Ok(select));
    }

    #[test]
    fn suitable_parent_custom_predicate() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let card = dom.append_element(body, "div");
        let span = dom.append_element(card, "span");
        dom.set_attribute(span, "class", "inline");
        let text = dom.append_text(span, "x");
        let helper = DomHelper::new(PassToParent::custom(|info| {
            info.class_name.as_deref() == Some("inline")
        }));
        assert_eq!(helper.suitable_parent(&dom, &text), Ok(card));
    }

    #[test]
    fn attribute_owner_is_parent() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let img = dom.append_element(body, "img");
        let alt = dom.set_attribute(img, "alt", "Logo");
        let helper = DomHelper::new(PassToParent::Disabled);
        assert_eq!(helper.suitable_parent(&dom, &alt), Ok(img));
    }

    #[test]
    fn detached_node_is_a_structural_error() {
        let mut dom = MemoryDom::new();
        let orphan = dom.create_text("lost");
        let helper = DomHelper::default();
        assert!(matches!(
            helper.suitable_parent(&dom, &orphan),
            Err(DomError::NoSuitableParent { .. })
        ));
    }

    #[test]
    fn find_ancestor_reports_blocked_inside_devtools() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let tools = dom.append_element(body, "div");
        dom.set_attribute(tools, "id", DEVTOOLS_ID);
        let button = dom.append_element(tools, "button");
        assert!(is_in_devtools(&dom, &button));
        assert_eq!(
            find_ancestor(&dom, &button, DEVTOOLS_ID, |_| true),
            AncestorSearch::Found(button)
        );
        assert_eq!(
            find_ancestor(&dom, &button, DEVTOOLS_ID, |n| *n == body),
            AncestorSearch::Blocked
        );
        let outside = dom.append_element(body, "p");
        assert!(!is_in_devtools(&dom, &outside));
        assert_eq!(
            find_ancestor(&dom, &outside, DEVTOOLS_ID, |_| false),
            AncestorSearch::NotFound
        );
    }

    #[test]
    fn disabled_ancestor_makes_element_unclickable() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let fieldset = dom.append_element(body, "fieldset");
        let label = dom.append_element(fieldset, "label");
        assert!(element_clickable(&dom, &label));
        dom.set_attribute(fieldset, "disabled", "");
        assert!(!element_clickable(&dom, &label));
    }

    #[test]
    fn restriction_by_tag_and_attribute() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let restricted = vec!["script".to_owned()];
        let script = dom.append_element(body, "script");
        assert!(is_restricted(&dom, &script, &restricted));

        let zone = dom.append_element(body, "section");
        dom.set_attribute(zone, RESTRICT_ATTRIBUTE, "");
        let inner = dom.append_element(zone, "p");
        assert!(is_restricted(&dom, &inner, &restricted));

        let free = dom.append_element(body, "p");
        assert!(!is_restricted(&dom, &free, &restricted));
    }
}
