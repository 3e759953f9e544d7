#![forbid(unsafe_code)]

//! The observer session: initial scan, mutation pipeline, queries, and input
//! routing.

use std::fmt;
use std::hash::Hash;

use ahash::AHashSet;
use keylens_core::{
    InvisibleWrapper, KEY_ONLY_ATTRIBUTE, KeyFilter, Modifiers, ObserverError, ObserverOptions,
    Unwrapped, WrapProps,
};
use keylens_dom::{Dom, DomHelper, MutationRecord, NodeKind, Point, Rect, is_restricted};
use serde::Serialize;
use tracing::{debug, trace};

use crate::meta::{ElementMeta, NodeRecord};
use crate::node_handler::NodeHandler;
use crate::registry::ElementRegistry;
use crate::resolver::{EventOutcome, HighlightState, Resolver};
use crate::ui::{ElementClick, TranslationSource};

const TARGET: &str = "keylens::observer";

/// On-screen position of one matching key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPosition {
    pub position: Rect,
    pub key_name: String,
    /// Primary namespace, empty when the key has none.
    pub key_namespace: String,
}

/// Result of routing a click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickOutcome<N> {
    pub block: bool,
    pub click: Option<ElementClick<N>>,
}

/// Elements highlighted by [`Observer::highlight`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "dropping the handle leaves the elements highlighted"]
pub struct HighlightHandle<N> {
    elements: Vec<N>,
}

impl<N> HighlightHandle<N>
where
    N: Clone + Eq + Hash + fmt::Debug,
{
    #[must_use]
    pub fn elements(&self) -> &[N] {
        &self.elements
    }

    /// Remove the overlays, except on the element currently hovered.
    pub fn unhighlight<D: Dom<Node = N>>(self, observer: &mut Observer<N>, dom: &mut D) {
        for element in &self.elements {
            if observer.resolver.state().highlighted() == Some(element) {
                continue;
            }
            observer.registry.unhighlight(dom, element);
        }
    }
}

/// Live binding engine over one observed subtree.
pub struct Observer<N> {
    options: ObserverOptions,
    wrapper: InvisibleWrapper,
    helper: DomHelper,
    registry: ElementRegistry<N>,
    resolver: Resolver<N>,
    translations: Option<Box<dyn TranslationSource>>,
    target: Option<N>,
}

impl<N: fmt::Debug> fmt::Debug for Observer<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("target", &self.target)
            .field("full_key_encode", &self.options.full_key_encode)
            .finish_non_exhaustive()
    }
}

impl<N> Observer<N>
where
    N: Clone + Eq + Hash + fmt::Debug,
{
    #[must_use]
    pub fn new(options: ObserverOptions) -> Self {
        Self {
            wrapper: InvisibleWrapper::new(options.full_key_encode),
            helper: DomHelper::new(options.pass_to_parent.clone()),
            registry: ElementRegistry::new(&options),
            resolver: Resolver::new(options.highlight_chord()),
            translations: None,
            target: None,
            options,
        }
    }

    #[must_use]
    pub const fn options(&self) -> &ObserverOptions {
        &self.options
    }

    /// Attribute names a mutation feed must report.
    #[must_use]
    pub fn monitored_attributes(&self) -> Vec<String> {
        self.options.monitored_attributes()
    }

    pub fn set_translation_source(&mut self, source: impl TranslationSource + 'static) {
        self.translations = Some(Box::new(source));
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.target.is_some()
    }

    #[must_use]
    pub const fn target(&self) -> Option<&N> {
        self.target.as_ref()
    }

    #[must_use]
    pub const fn registry(&self) -> &ElementRegistry<N> {
        &self.registry
    }

    #[must_use]
    pub const fn highlight_state(&self) -> &HighlightState<N> {
        self.resolver.state()
    }

    /// Start observing `target` (the body when `None`) and decode what is
    /// already rendered. A running session is stopped first.
    pub fn run<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        target: Option<N>,
    ) -> Result<(), ObserverError> {
        if self.is_running() {
            self.stop(dom);
        }
        let target = target.or_else(|| dom.body()).ok_or(ObserverError::NoTarget)?;
        self.registry = ElementRegistry::new(&self.options);
        self.resolver = Resolver::new(self.options.highlight_chord());
        self.target = Some(target.clone());

        let handler = NodeHandler::new(&self.options);
        let key_only = handler.handle_key_attributes(&*dom, &target);
        let candidates = handler.handle_child_list(&*dom, std::slice::from_ref(&target));
        debug!(
            target: TARGET,
            ?target,
            candidates = candidates.len(),
            key_only = key_only.len(),
            "observer started"
        );
        for element in &key_only {
            self.register_key_only(dom, element);
        }
        for node in &candidates {
            self.decode_node(dom, node);
        }
        self.registry.evict_empty(dom);
        Ok(())
    }

    /// End the session: drop highlight state and every element. Idempotent.
    pub fn stop<D: Dom<Node = N>>(&mut self, dom: &mut D) {
        let Some(target) = self.target.take() else {
            trace!(target: TARGET, "stop ignored: not running");
            return;
        };
        self.resolver.stop(dom, &mut self.registry);
        self.registry.stop(dom);
        debug!(target: TARGET, ?target, "observer stopped");
    }

    /// Apply one batch of mutation records.
    pub fn handle_mutations<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        records: &[MutationRecord<N>],
    ) {
        if !self.is_running() {
            trace!(target: TARGET, records = records.len(), "mutations ignored: not running");
            return;
        }
        debug!(target: TARGET, records = records.len(), "mutation batch");

        // Removed subtrees first: later steps must not see stale owners.
        let mut removed = AHashSet::new();
        for record in records {
            if let MutationRecord::ChildList { removed: nodes, .. } = record {
                for node in nodes {
                    collect_subtree(&*dom, node, &mut removed);
                }
            }
        }
        let (moved, detached): (Vec<N>, Vec<N>) =
            removed.into_iter().partition(|node| dom.is_connected(node));
        let detached: AHashSet<N> = detached.into_iter().collect();
        self.registry.cleanup_removed_nodes(dom, &detached);
        for node in &moved {
            if self.registry.owner_of(node).is_none() {
                continue;
            }
            if let Ok(parent) = self.helper.suitable_parent(&*dom, node) {
                self.registry.rehome(dom, node, parent);
            }
        }

        let key_only_touched = records.iter().any(|record| {
            matches!(record, MutationRecord::Attributes { name, .. }
                if name.eq_ignore_ascii_case(KEY_ONLY_ATTRIBUTE))
        });
        if key_only_touched {
            self.registry.cleanup_lingering_key_attributes(dom);
        }

        let handler = NodeHandler::new(&self.options);
        let mut candidates = Vec::new();
        let mut key_only = Vec::new();
        for record in records {
            match record {
                MutationRecord::CharacterData { target } => {
                    candidates.extend(handler.handle_text(&*dom, target));
                }
                MutationRecord::ChildList { target, added, .. } => {
                    key_only.extend(handler.handle_key_attributes(&*dom, target));
                    candidates.extend(handler.handle_child_list(&*dom, added));
                }
                MutationRecord::Attributes { target, name } => {
                    if name.eq_ignore_ascii_case(KEY_ONLY_ATTRIBUTE) {
                        key_only.push(target.clone());
                    } else {
                        candidates.extend(
                            handler
                                .handle_attributes(&*dom, target, false)
                                .into_iter()
                                .filter(|attr| {
                                    dom.attribute_name(attr)
                                        .is_some_and(|n| n.eq_ignore_ascii_case(name))
                                }),
                        );
                    }
                }
            }
        }

        let mut seen = AHashSet::new();
        candidates.retain(|node| {
            !detached.contains(node) && dom.is_connected(node) && seen.insert(node.clone())
        });
        let mut seen = AHashSet::new();
        key_only.retain(|element| dom.is_connected(element) && seen.insert(element.clone()));

        for node in &candidates {
            self.decode_node(dom, node);
        }
        for element in &key_only {
            self.register_key_only(dom, element);
        }
        let evicted = self.registry.evict_empty(dom);
        trace!(
            target: TARGET,
            decoded = candidates.len(),
            evicted,
            tracked = self.registry.len(),
            "batch applied"
        );
    }

    /// Strip markers from `node` and register its keys.
    fn decode_node<D: Dom<Node = N>>(&mut self, dom: &mut D, node: &N) {
        let Some(content) = dom.text_content(node) else {
            return;
        };
        let Some(unwrapped) = self.wrapper.unwrap(&content) else {
            return;
        };
        let restricted = dom
            .parent_element(node)
            .is_some_and(|parent| is_restricted(&*dom, &parent, &self.options.restricted_elements));
        if restricted {
            trace!(target: TARGET, ?node, "restricted node skipped");
            return;
        }
        let Ok(owner) = self.helper.suitable_parent(&*dom, node) else {
            return;
        };
        dom.set_text_content(node, &unwrapped.text);
        if unwrapped.keys.is_empty() {
            return;
        }
        self.registry.register(
            dom,
            owner,
            node.clone(),
            NodeRecord::decoded(content, unwrapped.keys),
        );
    }

    fn register_key_only<D: Dom<Node = N>>(&mut self, dom: &mut D, element: &N) {
        let Some(attr) = dom.attribute_node(element, KEY_ONLY_ATTRIBUTE) else {
            return;
        };
        let Some(key) = dom.text_content(&attr).filter(|key| !key.is_empty()) else {
            return;
        };
        let record = NodeRecord::key_only(key);
        let unchanged = self
            .registry
            .owner_of(&attr)
            .and_then(|owner| self.registry.get(owner))
            .and_then(|meta| meta.node(&attr))
            .is_some_and(|existing| *existing == record);
        if unchanged {
            return;
        }
        if let Ok(owner) = self.helper.suitable_parent(&*dom, &attr) {
            self.registry.register(dom, owner, attr, record);
        }
    }

    /// Wrap a translation with its key. Without a session the translation
    /// is returned unchanged.
    pub fn wrap(&mut self, props: WrapProps) -> String {
        if self.is_running() {
            self.wrapper.wrap(props)
        } else {
            props.translation.unwrap_or_default()
        }
    }

    /// Decode markers from `text`. Without a session, or without markers,
    /// the text comes back unchanged with no keys.
    #[must_use]
    pub fn unwrap(&self, text: &str) -> Unwrapped {
        let plain = || Unwrapped {
            text: text.to_owned(),
            keys: Vec::new(),
        };
        if !self.is_running() {
            return plain();
        }
        self.wrapper.unwrap(text).unwrap_or_else(plain)
    }

    pub fn for_each_element(&self, f: impl FnMut(&N, &ElementMeta<N>)) {
        self.registry.for_each(f);
    }

    /// One entry per matching key, elements in document order.
    pub fn find_positions<D: Dom<Node = N>>(&self, dom: &D, filter: &KeyFilter) -> Vec<KeyPosition> {
        let mut elements: Vec<N> = self
            .registry
            .find_all(filter)
            .into_iter()
            .filter(|element| dom.is_connected(element))
            .collect();
        elements.sort_by(|a, b| {
            if dom.precedes(a, b) {
                std::cmp::Ordering::Less
            } else if dom.precedes(b, a) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });

        let mut positions = Vec::new();
        for element in &elements {
            let Some(meta) = self.registry.get(element) else {
                continue;
            };
            let rect = dom.bounding_client_rect(element);
            for key in meta.keys().filter(|key| filter.matches_descriptor(key)) {
                positions.push(KeyPosition {
                    position: rect,
                    key_name: key.key.clone(),
                    key_namespace: key.primary_namespace().unwrap_or_default().to_owned(),
                });
            }
        }
        positions
    }

    /// Highlight every element carrying a matching key.
    pub fn highlight<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        filter: &KeyFilter,
    ) -> HighlightHandle<N> {
        let elements = self.registry.find_all(filter);
        for element in &elements {
            self.registry.highlight(dom, element);
        }
        HighlightHandle { elements }
    }

    fn routes_input(&self) -> bool {
        self.is_running() && self.options.mouse_highlight
    }

    pub fn pointer_move<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        point: Point,
        held: Modifiers,
    ) -> EventOutcome<N> {
        if !self.routes_input() {
            return EventOutcome::pass();
        }
        self.resolver
            .pointer_move(dom, &mut self.registry, point, held)
    }

    pub fn key_down<D: Dom<Node = N>>(&mut self, dom: &mut D, held: Modifiers) -> EventOutcome<N> {
        if !self.routes_input() {
            return EventOutcome::pass();
        }
        self.resolver.key_down(dom, &mut self.registry, held)
    }

    pub fn key_up<D: Dom<Node = N>>(&mut self, dom: &mut D, held: Modifiers) -> EventOutcome<N> {
        if !self.routes_input() {
            return EventOutcome::pass();
        }
        self.resolver.key_up(dom, &mut self.registry, held)
    }

    pub fn scroll<D: Dom<Node = N>>(&mut self, dom: &mut D) {
        if self.routes_input() {
            self.resolver.scroll(dom, &mut self.registry);
        }
    }

    /// Route a click; a qualifying click carries the element's key options.
    pub fn click<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        point: Point,
        held: Modifiers,
    ) -> ClickOutcome<N> {
        if !self.routes_input() {
            return ClickOutcome {
                block: false,
                click: None,
            };
        }
        let outcome = self.resolver.click(dom, &mut self.registry, point, held);
        let click = outcome.clicked.map(|element| ElementClick {
            options: self
                .registry
                .key_options(&element, self.translations.as_deref()),
            element,
        });
        ClickOutcome {
            block: outcome.block,
            click,
        }
    }

    /// Pointer enter/over/out/leave/down/up.
    pub fn blockable<D: Dom<Node = N>>(
        &mut self,
        dom: &D,
        target: Option<&N>,
        held: Modifiers,
    ) -> EventOutcome<N> {
        if !self.routes_input() {
            return EventOutcome::pass();
        }
        self.resolver.blockable(dom, target, held)
    }

    /// Freeze highlighting while a host dialog is open.
    pub fn suspend_highlight(&mut self) {
        self.resolver.suspend();
    }

    pub fn resume_highlight(&mut self) {
        self.resolver.resume();
    }
}

/// `node`, its descendants, and the attribute nodes of every element among
/// them.
fn collect_subtree<D: Dom>(dom: &D, node: &D::Node, out: &mut AHashSet<D::Node>) {
    let mut nodes = vec![node.clone()];
    nodes.extend(dom.descendants(node));
    for node in nodes {
        if dom.node_kind(&node) == NodeKind::Element {
            out.extend(dom.attribute_nodes(&node));
        }
        out.insert(node);
    }
}
