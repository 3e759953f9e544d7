#![forbid(unsafe_code)]

//! Identity-keyed element metadata store.
//!
//! The store never owns DOM objects: keys are node handles and removing an
//! entry only drops the metadata.

use std::hash::Hash;

use ahash::AHashMap;

use crate::meta::ElementMeta;

#[derive(Debug, Clone)]
pub struct ElementStore<N> {
    entries: AHashMap<N, ElementMeta<N>>,
}

impl<N> Default for ElementStore<N> {
    fn default() -> Self {
        Self {
            entries: AHashMap::new(),
        }
    }
}

impl<N: Clone + Eq + Hash> ElementStore<N> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, element: N, meta: ElementMeta<N>) {
        self.entries.insert(element, meta);
    }

    #[must_use]
    pub fn get(&self, element: &N) -> Option<&ElementMeta<N>> {
        self.entries.get(element)
    }

    pub fn get_mut(&mut self, element: &N) -> Option<&mut ElementMeta<N>> {
        self.entries.get_mut(element)
    }

    /// Get the entry for `element`, creating an empty one.
    pub fn get_or_insert(&mut self, element: &N) -> &mut ElementMeta<N> {
        self.entries
            .entry(element.clone())
            .or_insert_with(|| ElementMeta::new(element.clone()))
    }

    /// Whether an entry existed.
    pub fn remove(&mut self, element: &N) -> bool {
        self.entries.remove(element).is_some()
    }

    pub fn take(&mut self, element: &N) -> Option<ElementMeta<N>> {
        self.entries.remove(element)
    }

    pub fn for_each(&self, mut f: impl FnMut(&N, &ElementMeta<N>)) {
        for (element, meta) in &self.entries {
            f(element, meta);
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &ElementMeta<N>> {
        self.entries.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut ElementMeta<N>> {
        self.entries.values_mut()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&N, &mut ElementMeta<N>) -> bool) {
        self.entries.retain(|element, meta| keep(element, meta));
    }

    /// Remove and return every entry matching `pred`.
    pub fn drain_where(
        &mut self,
        mut pred: impl FnMut(&ElementMeta<N>) -> bool,
    ) -> Vec<ElementMeta<N>> {
        let doomed: Vec<N> = self
            .entries
            .iter()
            .filter(|(_, meta)| pred(meta))
            .map(|(element, _)| element.clone())
            .collect();
        doomed
            .iter()
            .filter_map(|element| self.entries.remove(element))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) -> Vec<ElementMeta<N>> {
        self.entries.drain().map(|(_, meta)| meta).collect()
    }
}
