#![forbid(unsafe_code)]

//! Per-element metadata.

use keylens_core::KeyDescriptor;

/// One tracked text or attribute node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    /// Content as rendered, markers included.
    pub old_text_content: String,
    /// Decoded keys, left to right.
    pub keys: Vec<KeyDescriptor>,
    /// The node is a key-only attribute whose value is the key itself.
    pub key_attribute_only: bool,
}

impl NodeRecord {
    #[must_use]
    pub fn decoded(old_text_content: impl Into<String>, keys: Vec<KeyDescriptor>) -> Self {
        Self {
            old_text_content: old_text_content.into(),
            keys,
            key_attribute_only: false,
        }
    }

    #[must_use]
    pub fn key_only(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            old_text_content: key.clone(),
            keys: vec![KeyDescriptor::new(key)],
            key_attribute_only: true,
        }
    }
}

/// Metadata for an element that carries at least one decoded key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementMeta<N> {
    pub element: N,
    /// Tracked nodes in registration order.
    pub nodes: Vec<(N, NodeRecord)>,
    /// Highlight overlay, present while highlighted.
    pub overlay: Option<N>,
    /// Hover highlighting is enabled for this element.
    pub highlightable: bool,
    /// Eviction is deferred while set.
    pub prevent_clean: bool,
}

impl<N: Clone + Eq> ElementMeta<N> {
    #[must_use]
    pub fn new(element: N) -> Self {
        Self {
            element,
            nodes: Vec::new(),
            overlay: None,
            highlightable: false,
            prevent_clean: false,
        }
    }

    #[must_use]
    pub fn node(&self, node: &N) -> Option<&NodeRecord> {
        self.nodes.iter().find(|(n, _)| n == node).map(|(_, r)| r)
    }

    /// Insert or replace the record for `node`, keeping its position.
    pub fn insert_node(&mut self, node: N, record: NodeRecord) {
        match self.nodes.iter_mut().find(|(n, _)| *n == node) {
            Some((_, existing)) => *existing = record,
            None => self.nodes.push((node, record)),
        }
    }

    pub fn remove_node(&mut self, node: &N) -> Option<NodeRecord> {
        let index = self.nodes.iter().position(|(n, _)| n == node)?;
        Some(self.nodes.remove(index).1)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Empty and not pinned by the pointer.
    #[must_use]
    pub fn should_evict(&self) -> bool {
        self.nodes.is_empty() && !self.prevent_clean
    }

    /// Every decoded key in node order.
    pub fn keys(&self) -> impl Iterator<Item = &KeyDescriptor> {
        self.nodes.iter().flat_map(|(_, record)| record.keys.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_replaces_in_place() {
        let mut meta = ElementMeta::new(0_u32);
        meta.insert_node(1, NodeRecord::key_only("a"));
        meta.insert_node(2, NodeRecord::key_only("b"));
        meta.insert_node(1, NodeRecord::key_only("c"));
        let keys: Vec<&str> = meta.keys().map(|k| k.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "b"]);
    }

    #[test]
    fn eviction_respects_prevent_clean() {
        let mut meta = ElementMeta::new(0_u32);
        assert!(meta.should_evict());
        meta.prevent_clean = true;
        assert!(!meta.should_evict());
        meta.prevent_clean = false;
        meta.insert_node(3, NodeRecord::decoded("x", Vec::new()));
        assert!(!meta.should_evict());
        assert!(meta.remove_node(&3).is_some());
        assert!(meta.remove_node(&3).is_none());
        assert!(meta.should_evict());
    }
}
