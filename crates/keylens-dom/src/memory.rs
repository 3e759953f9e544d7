#![forbid(unsafe_code)]

//! In-memory host document.
//!
//! `MemoryDom` is an arena-backed document that behaves like a browser DOM
//! as far as the binding engine can tell: text, element and attribute nodes
//! with identity, layout rectangles set by the host, hit testing, document
//! order, and a mutation queue with `MutationObserver` semantics (records are
//! only produced for targets that are connected to the document).

use std::collections::BTreeMap;

use crate::{Dom, MutationRecord, NodeKind, Point, Rect};

/// Handle of a node inside a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Document,
    Element {
        tag: String,
        attributes: Vec<NodeId>,
        rect: Rect,
        styles: BTreeMap<String, String>,
    },
    Text(String),
    Attribute {
        name: String,
        value: String,
        owner: Option<NodeId>,
    },
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena document with a pending mutation queue.
#[derive(Debug, Clone)]
pub struct MemoryDom {
    slots: Vec<Slot>,
    document: NodeId,
    body: NodeId,
    records: Vec<MutationRecord<NodeId>>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    /// Empty document containing only `<body>`.
    #[must_use]
    pub fn new() -> Self {
        let mut dom = Self {
            slots: Vec::new(),
            document: NodeId(0),
            body: NodeId(0),
            records: Vec::new(),
        };
        dom.document = dom.alloc(NodeData::Document);
        dom.body = dom.create_element("body");
        dom.slots[dom.body.index()].parent = Some(dom.document);
        dom.slots[dom.document.index()].children.push(dom.body);
        dom
    }

    #[must_use]
    pub const fn document_id(&self) -> NodeId {
        self.document
    }

    #[must_use]
    pub const fn body_id(&self) -> NodeId {
        self.body
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(u32::try_from(self.slots.len()).unwrap_or(u32::MAX));
        self.slots.push(Slot {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots.get(id.index())
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Slot> {
        self.slots.get_mut(id.index())
    }

    fn record(&mut self, record: MutationRecord<NodeId>) {
        if self.is_connected(record.target()) {
            self.records.push(record);
        }
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            rect: Rect::default(),
            styles: BTreeMap::new(),
        })
    }

    pub fn create_text(&mut self, data: &str) -> NodeId {
        self.alloc(NodeData::Text(data.to_owned()))
    }

    /// Detach `node` from its parent without recording.
    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.slot_mut(node)?.parent.take()?;
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.retain(|&child| child != node);
        }
        Some(parent)
    }

    /// Append `child` to `parent`, moving it if it already has a parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(old_parent) = self.detach(child) {
            self.record(MutationRecord::ChildList {
                target: old_parent,
                added: Vec::new(),
                removed: vec![child],
            });
        }
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.push(child);
        }
        if let Some(slot) = self.slot_mut(child) {
            slot.parent = Some(parent);
        }
        self.record(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
    }

    /// Detach `node` from its parent. The subtree stays intact.
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.detach(node) {
            self.record(MutationRecord::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![node],
            });
        }
    }

    /// Swap all children of `parent` in one record, the way a virtual-DOM
    /// re-render does.
    pub fn replace_children(&mut self, parent: NodeId, children: &[NodeId]) {
        let removed: Vec<NodeId> = self
            .slot(parent)
            .map(|slot| slot.children.clone())
            .unwrap_or_default();
        for &old in &removed {
            if let Some(slot) = self.slot_mut(old) {
                slot.parent = None;
            }
        }
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.clear();
        }
        for &child in children {
            if let Some(old_parent) = self.detach(child) {
                self.record(MutationRecord::ChildList {
                    target: old_parent,
                    added: Vec::new(),
                    removed: vec![child],
                });
            }
            if let Some(slot) = self.slot_mut(child) {
                slot.parent = Some(parent);
            }
            if let Some(slot) = self.slot_mut(parent) {
                slot.children.push(child);
            }
        }
        self.record(MutationRecord::ChildList {
            target: parent,
            added: children.to_vec(),
            removed,
        });
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let element = self.create_element(tag);
        self.append_child(parent, element);
        element
    }

    pub fn append_text(&mut self, parent: NodeId, data: &str) -> NodeId {
        let text = self.create_text(data);
        self.append_child(parent, text);
        text
    }

    /// Append `<tag>data</tag>` and return `(element, text node)`.
    pub fn append_element_with_text(
        &mut self,
        parent: NodeId,
        tag: &str,
        data: &str,
    ) -> (NodeId, NodeId) {
        let element = self.create_element(tag);
        let text = self.create_text(data);
        self.append_child(element, text);
        self.append_child(parent, element);
        (element, text)
    }

    /// Replace the data of a text node or the value of an attribute node.
    pub fn set_text(&mut self, node: NodeId, data: &str) {
        let record = match self.slot_mut(node).map(|slot| &mut slot.data) {
            Some(NodeData::Text(text)) => {
                data.clone_into(text);
                Some(MutationRecord::CharacterData { target: node })
            }
            Some(NodeData::Attribute { name, value, owner }) => {
                data.clone_into(value);
                owner.map(|owner| MutationRecord::Attributes {
                    target: owner,
                    name: name.clone(),
                })
            }
            _ => None,
        };
        if let Some(record) = record {
            self.record(record);
        }
    }

    fn find_attribute(&self, element: NodeId, name: &str) -> Option<NodeId> {
        let Some(NodeData::Element { attributes, .. }) = self.slot(element).map(|s| &s.data) else {
            return None;
        };
        attributes.iter().copied().find(|&attr| {
            matches!(
                self.slot(attr).map(|s| &s.data),
                Some(NodeData::Attribute { name: n, .. }) if n.eq_ignore_ascii_case(name)
            )
        })
    }

    fn set_attribute_inner(&mut self, element: NodeId, name: &str, value: &str) -> NodeId {
        if let Some(attr) = self.find_attribute(element, name) {
            if let Some(NodeData::Attribute { value: current, .. }) =
                self.slot_mut(attr).map(|s| &mut s.data)
            {
                value.clone_into(current);
            }
            return attr;
        }
        let attr = self.alloc(NodeData::Attribute {
            name: name.to_ascii_lowercase(),
            value: value.to_owned(),
            owner: Some(element),
        });
        if let Some(NodeData::Element { attributes, .. }) =
            self.slot_mut(element).map(|s| &mut s.data)
        {
            attributes.push(attr);
        }
        attr
    }

    /// Set (or create) an attribute and return its attribute node.
    pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> NodeId {
        let attr = self.set_attribute_inner(element, name, value);
        self.record(MutationRecord::Attributes {
            target: element,
            name: name.to_ascii_lowercase(),
        });
        attr
    }

    /// Remove an attribute; the detached attribute node is returned.
    pub fn remove_attribute(&mut self, element: NodeId, name: &str) -> Option<NodeId> {
        let attr = self.find_attribute(element, name)?;
        if let Some(NodeData::Element { attributes, .. }) =
            self.slot_mut(element).map(|s| &mut s.data)
        {
            attributes.retain(|&a| a != attr);
        }
        if let Some(NodeData::Attribute { owner, .. }) = self.slot_mut(attr).map(|s| &mut s.data) {
            *owner = None;
        }
        self.record(MutationRecord::Attributes {
            target: element,
            name: name.to_ascii_lowercase(),
        });
        Some(attr)
    }

    /// Host-side layout: give an element its viewport rectangle.
    pub fn set_rect(&mut self, element: NodeId, rect: Rect) {
        if let Some(NodeData::Element { rect: current, .. }) =
            self.slot_mut(element).map(|s| &mut s.data)
        {
            *current = rect;
        }
    }

    #[must_use]
    pub fn style(&self, element: NodeId, property: &str) -> Option<&str> {
        match self.slot(element).map(|s| &s.data) {
            Some(NodeData::Element { styles, .. }) => styles.get(property).map(String::as_str),
            _ => None,
        }
    }

    /// Data of a text node or value of an attribute node.
    #[must_use]
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.slot(node).map(|s| &s.data) {
            Some(NodeData::Text(text)) => Some(text),
            Some(NodeData::Attribute { value, .. }) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.slot(node).map_or(&[], |s| &s.children)
    }

    /// Drain pending mutation records, oldest first.
    pub fn take_records(&mut self) -> Vec<MutationRecord<NodeId>> {
        std::mem::take(&mut self.records)
    }

    #[must_use]
    pub fn has_pending_records(&self) -> bool {
        !self.records.is_empty()
    }

    fn structural_parent(&self, node: NodeId) -> Option<NodeId> {
        let slot = self.slot(node)?;
        match &slot.data {
            NodeData::Attribute { owner, .. } => *owner,
            _ => slot.parent,
        }
    }

    fn tree_path(&self, node: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(parent) = self.structural_parent(current) {
            // Attribute nodes sort after their owner and before its children.
            let index = self
                .slot(parent)
                .and_then(|s| s.children.iter().position(|&c| c == current))
                .map_or(0, |i| i + 1);
            path.push(index);
            current = parent;
        }
        path.reverse();
        path
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match self.slot(node).map(|s| &s.data) {
            Some(NodeData::Text(text)) => out.push_str(text),
            Some(NodeData::Element { .. } | NodeData::Document) => {
                for &child in self.children(node) {
                    self.collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;

    fn node_kind(&self, node: &NodeId) -> NodeKind {
        match self.slot(*node).map(|s| &s.data) {
            Some(NodeData::Element { .. }) => NodeKind::Element,
            Some(NodeData::Text(_)) => NodeKind::Text,
            Some(NodeData::Attribute { .. }) => NodeKind::Attribute,
            Some(NodeData::Document) | None => NodeKind::Other,
        }
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.body)
    }

    fn parent_element(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.structural_parent(*node)?;
        (self.node_kind(&parent) == NodeKind::Element).then_some(parent)
    }

    fn child_nodes(&self, node: &NodeId) -> Vec<NodeId> {
        self.children(*node).to_vec()
    }

    fn tag_name(&self, element: &NodeId) -> Option<String> {
        match self.slot(*element).map(|s| &s.data) {
            Some(NodeData::Element { tag, .. }) => Some(tag.clone()),
            _ => None,
        }
    }

    fn get_attribute(&self, element: &NodeId, name: &str) -> Option<String> {
        let attr = self.find_attribute(*element, name)?;
        self.text(attr).map(str::to_owned)
    }

    fn attribute_node(&self, element: &NodeId, name: &str) -> Option<NodeId> {
        self.find_attribute(*element, name)
    }

    fn attribute_nodes(&self, element: &NodeId) -> Vec<NodeId> {
        match self.slot(*element).map(|s| &s.data) {
            Some(NodeData::Element { attributes, .. }) => attributes.clone(),
            _ => Vec::new(),
        }
    }

    fn attribute_name(&self, attr: &NodeId) -> Option<String> {
        match self.slot(*attr).map(|s| &s.data) {
            Some(NodeData::Attribute { name, .. }) => Some(name.clone()),
            _ => None,
        }
    }

    fn text_content(&self, node: &NodeId) -> Option<String> {
        match self.slot(*node).map(|s| &s.data) {
            Some(NodeData::Text(text)) => Some(text.clone()),
            Some(NodeData::Attribute { value, .. }) => Some(value.clone()),
            Some(NodeData::Element { .. } | NodeData::Document) => {
                let mut out = String::new();
                self.collect_text(*node, &mut out);
                Some(out)
            }
            None => None,
        }
    }

    fn set_text_content(&mut self, node: &NodeId, text: &str) {
        match self.node_kind(node) {
            NodeKind::Text | NodeKind::Attribute => self.set_text(*node, text),
            NodeKind::Element => {
                let replacement = self.create_text(text);
                self.replace_children(*node, &[replacement]);
            }
            NodeKind::Other => {}
        }
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        let mut current = *node;
        for _ in 0..=self.slots.len() {
            if current == self.document {
                return true;
            }
            match self.structural_parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    fn bounding_client_rect(&self, element: &NodeId) -> Rect {
        match self.slot(*element).map(|s| &s.data) {
            Some(NodeData::Element { rect, .. }) => *rect,
            _ => Rect::default(),
        }
    }

    fn elements_from_point(&self, point: Point) -> Vec<NodeId> {
        // Later nodes paint over earlier ones; descendants over ancestors.
        let mut hits: Vec<NodeId> = self
            .descendants(&self.document)
            .into_iter()
            .filter(|node| self.bounding_client_rect(node).contains(point))
            .collect();
        hits.reverse();
        hits
    }

    fn precedes(&self, a: &NodeId, b: &NodeId) -> bool {
        a != b && self.tree_path(*a) < self.tree_path(*b)
    }

    fn create_overlay(&mut self, class_name: &str) -> Option<NodeId> {
        let overlay = self.create_element("div");
        self.set_attribute_inner(overlay, "class", class_name);
        self.append_child(self.body, overlay);
        Some(overlay)
    }

    fn set_style(&mut self, element: &NodeId, property: &str, value: &str) {
        if let Some(NodeData::Element { styles, .. }) =
            self.slot_mut(*element).map(|s| &mut s.data)
        {
            styles.insert(property.to_owned(), value.to_owned());
        }
    }

    fn remove_node(&mut self, node: &NodeId) {
        self.remove(*node);
    }
}
