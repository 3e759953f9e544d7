#![forbid(unsafe_code)]

//! Element registry: groups tracked nodes under their owning elements.
//!
//! Every tracked node has exactly one owner. The registry keeps a reverse
//! `node -> element` index so re-registering a node under a new element
//! detaches it from the old one, and so removed nodes can be dropped without
//! scanning every element.

use std::fmt;
use std::hash::Hash;

use ahash::{AHashMap, AHashSet};
use keylens_core::{KEY_ONLY_ATTRIBUTE, KeyFilter, ObserverOptions};
use keylens_dom::{Dom, is_restricted};
use tracing::{debug, trace};

use crate::highlighter::ElementHighlighter;
use crate::meta::{ElementMeta, NodeRecord};
use crate::store::ElementStore;
use crate::ui::{KeyOption, TranslationSource, key_options};

const TARGET: &str = "keylens::registry";

#[derive(Debug, Clone)]
pub struct ElementRegistry<N> {
    store: ElementStore<N>,
    owners: AHashMap<N, N>,
    highlighter: ElementHighlighter,
    restricted_elements: Vec<String>,
    mouse_highlight: bool,
}

impl<N> ElementRegistry<N>
where
    N: Clone + Eq + Hash + fmt::Debug,
{
    #[must_use]
    pub fn new(options: &ObserverOptions) -> Self {
        Self {
            store: ElementStore::new(),
            owners: AHashMap::new(),
            highlighter: ElementHighlighter::from_options(options),
            restricted_elements: options.restricted_elements.clone(),
            mouse_highlight: options.mouse_highlight,
        }
    }

    /// Attach `record` for `node` to `element`.
    ///
    /// Returns false when `element` is restricted. A node already owned by
    /// another element moves to `element`. An element left without nodes
    /// stays until the next [`evict_empty`](Self::evict_empty), which callers
    /// run once per batch.
    pub fn register<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        element: N,
        node: N,
        record: NodeRecord,
    ) -> bool {
        if is_restricted(&*dom, &element, &self.restricted_elements) {
            trace!(target: TARGET, ?element, "refusing restricted element");
            return false;
        }
        if let Some(previous) = self.owners.get(&node)
            && *previous != element
            && let Some(meta) = self.store.get_mut(previous)
        {
            meta.remove_node(&node);
        }

        let meta = self.store.get_or_insert(&element);
        debug!(
            target: TARGET,
            ?element,
            ?node,
            keys = record.keys.len(),
            key_only = record.key_attribute_only,
            "registered node"
        );
        meta.insert_node(node.clone(), record);
        meta.highlightable = self.mouse_highlight;
        self.owners.insert(node, element);
        true
    }

    /// Move a tracked node under `element`, keeping its record.
    pub fn rehome<D: Dom<Node = N>>(&mut self, dom: &mut D, node: &N, element: N) -> bool {
        let Some(record) = self
            .owners
            .get(node)
            .and_then(|owner| self.store.get(owner))
            .and_then(|meta| meta.node(node))
            .cloned()
        else {
            return false;
        };
        self.register(dom, element, node.clone(), record)
    }

    /// Drop removed nodes, and removed elements that are not pinned.
    pub fn cleanup_removed_nodes<D: Dom<Node = N>>(&mut self, dom: &mut D, removed: &AHashSet<N>) {
        for node in removed {
            if let Some(owner) = self.owners.remove(node)
                && let Some(meta) = self.store.get_mut(&owner)
            {
                meta.remove_node(node);
            }
            let pinned = self.store.get(node).is_some_and(|meta| meta.prevent_clean);
            if !pinned && let Some(mut meta) = self.store.take(node) {
                for (tracked, _) in &meta.nodes {
                    self.owners.remove(tracked);
                }
                self.highlighter.unhighlight(dom, &mut meta);
                debug!(target: TARGET, element = ?node, "dropped removed element");
            }
        }
        self.evict_empty(dom);
    }

    /// Drop key-only records whose owner no longer carries the key-only
    /// attribute.
    pub fn cleanup_lingering_key_attributes<D: Dom<Node = N>>(&mut self, dom: &mut D) {
        let mut lingering = Vec::new();
        for meta in self.store.values() {
            for (node, record) in &meta.nodes {
                let still_marked = dom
                    .parent_element(node)
                    .is_some_and(|owner| dom.has_attribute(&owner, KEY_ONLY_ATTRIBUTE));
                if record.key_attribute_only && !still_marked {
                    lingering.push((meta.element.clone(), node.clone()));
                }
            }
        }
        for (element, node) in lingering {
            if let Some(meta) = self.store.get_mut(&element) {
                meta.remove_node(&node);
            }
            self.owners.remove(&node);
            trace!(target: TARGET, ?element, ?node, "dropped lingering key-only record");
        }
        self.evict_empty(dom);
    }

    /// Evict every element with no nodes that is not pinned.
    pub fn evict_empty<D: Dom<Node = N>>(&mut self, dom: &mut D) -> usize {
        let evicted = self.store.drain_where(ElementMeta::should_evict);
        let count = evicted.len();
        for mut meta in evicted {
            self.highlighter.unhighlight(dom, &mut meta);
            debug!(target: TARGET, element = ?meta.element, "evicted empty element");
        }
        count
    }

    /// Elements holding at least one descriptor that matches `filter`.
    #[must_use]
    pub fn find_all(&self, filter: &KeyFilter) -> Vec<N> {
        self.store
            .values()
            .filter(|meta| meta.keys().any(|key| filter.matches_descriptor(key)))
            .map(|meta| meta.element.clone())
            .collect()
    }

    #[must_use]
    pub fn key_options(
        &self,
        element: &N,
        translations: Option<&dyn TranslationSource>,
    ) -> Vec<KeyOption> {
        self.store
            .get(element)
            .map(|meta| key_options(meta, translations))
            .unwrap_or_default()
    }

    pub fn highlight<D: Dom<Node = N>>(&mut self, dom: &mut D, element: &N) -> bool {
        match self.store.get_mut(element) {
            Some(meta) => {
                self.highlighter.highlight(dom, meta);
                true
            }
            None => false,
        }
    }

    pub fn unhighlight<D: Dom<Node = N>>(&mut self, dom: &mut D, element: &N) {
        if let Some(meta) = self.store.get_mut(element) {
            self.highlighter.unhighlight(dom, meta);
        }
    }

    pub fn set_prevent_clean(&mut self, element: &N, prevent_clean: bool) {
        if let Some(meta) = self.store.get_mut(element) {
            meta.prevent_clean = prevent_clean;
        }
    }

    /// Unhighlight and forget every element.
    pub fn stop<D: Dom<Node = N>>(&mut self, dom: &mut D) {
        let dropped = self.store.clear();
        for mut meta in dropped {
            self.highlighter.unhighlight(dom, &mut meta);
        }
        self.owners.clear();
        debug!(target: TARGET, "registry cleared");
    }

    #[must_use]
    pub fn get(&self, element: &N) -> Option<&ElementMeta<N>> {
        self.store.get(element)
    }

    /// Element that currently owns `node`.
    #[must_use]
    pub fn owner_of(&self, node: &N) -> Option<&N> {
        self.owners.get(node)
    }

    #[must_use]
    pub fn is_highlightable(&self, element: &N) -> bool {
        self.store.get(element).is_some_and(|meta| meta.highlightable)
    }

    pub fn for_each(&self, f: impl FnMut(&N, &ElementMeta<N>)) {
        self.store.for_each(f);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
