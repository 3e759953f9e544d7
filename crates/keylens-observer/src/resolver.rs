#![forbid(unsafe_code)]

//! Pointer and keyboard resolver.
//!
//! Decides which tracked element is highlighted from three inputs: the
//! configured modifier chord, the modifiers currently held, and the tracked
//! element under the cursor. The decision itself is the pure [`transition`]
//! function; [`Resolver`] feeds it from input events and applies the result
//! to the registry (pinning, highlighting, unpinning).
//!
//! # State machine
//!
//! ```text
//!            chord held, nothing tracked under cursor
//!   Idle ─────────────────────────────────────────────▶ Armed
//!    ▲  ◀───────── chord released ────────────────────   │
//!    │                                                   │ tracked element
//!    │           chord released / stop                   ▼ under cursor
//!    └──────────────────────────────────────────── Highlighted(el)
//! ```
//!
//! An empty chord never arms: highlighting always requires at least one
//! modifier.

use std::fmt;
use std::hash::Hash;

use keylens_core::{DEVTOOLS_ID, Modifiers};
use keylens_dom::{AncestorSearch, Dom, Point, find_ancestor, is_in_devtools};
use tracing::{debug, trace};

use crate::registry::ElementRegistry;

const TARGET: &str = "keylens::resolver";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightState<N> {
    /// Chord not held.
    Idle,
    /// Chord held, no tracked element under the cursor.
    Armed,
    Highlighted(N),
}

impl<N> HighlightState<N> {
    #[must_use]
    pub const fn highlighted(&self) -> Option<&N> {
        match self {
            Self::Highlighted(element) => Some(element),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Result of one [`transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<N> {
    pub next: HighlightState<N>,
    /// Element that stops being highlighted.
    pub leave: Option<N>,
    /// Element that starts being highlighted.
    pub enter: Option<N>,
}

/// Whether `held` satisfies `chord`.
#[must_use]
pub fn chord_active(chord: Modifiers, held: Modifiers) -> bool {
    !chord.is_empty() && held.contains(chord)
}

/// Next highlight state. Pure: no side effects.
#[must_use]
pub fn transition<N: Clone + Eq>(
    state: &HighlightState<N>,
    chord: Modifiers,
    held: Modifiers,
    under_cursor: Option<N>,
) -> Transition<N> {
    let current = state.highlighted().cloned();
    if !chord_active(chord, held) {
        return Transition {
            next: HighlightState::Idle,
            leave: current,
            enter: None,
        };
    }
    match under_cursor {
        Some(element) if current.as_ref() == Some(&element) => Transition {
            next: HighlightState::Highlighted(element),
            leave: None,
            enter: None,
        },
        Some(element) => Transition {
            next: HighlightState::Highlighted(element.clone()),
            leave: current,
            enter: Some(element),
        },
        None => Transition {
            next: HighlightState::Armed,
            leave: current,
            enter: None,
        },
    }
}

/// What the host must do with the event that was just dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome<N> {
    /// Cancel default handling and stop propagation.
    pub block: bool,
    /// Element selected by a click.
    pub clicked: Option<N>,
}

impl<N> EventOutcome<N> {
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            block: false,
            clicked: None,
        }
    }

    #[must_use]
    pub const fn block() -> Self {
        Self {
            block: true,
            clicked: None,
        }
    }
}

/// Tracked element under `point`, if any.
///
/// The topmost element inside the tool's own UI hides everything below it.
pub fn element_under<D: Dom>(
    dom: &D,
    registry: &ElementRegistry<D::Node>,
    point: Point,
) -> Option<D::Node> {
    for hit in dom.elements_from_point(point) {
        match find_ancestor(dom, &hit, DEVTOOLS_ID, |el| registry.is_highlightable(el)) {
            AncestorSearch::Found(element) => return Some(element),
            AncestorSearch::Blocked => return None,
            AncestorSearch::NotFound => {}
        }
    }
    None
}

#[derive(Debug, Clone)]
pub struct Resolver<N> {
    state: HighlightState<N>,
    chord: Modifiers,
    held: Modifiers,
    cursor: Option<Point>,
    suspended: bool,
    stopped: bool,
}

impl<N> Resolver<N>
where
    N: Clone + Eq + Hash + fmt::Debug,
{
    #[must_use]
    pub fn new(chord: Modifiers) -> Self {
        Self {
            state: HighlightState::Idle,
            chord,
            held: Modifiers::empty(),
            cursor: None,
            suspended: false,
            stopped: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &HighlightState<N> {
        &self.state
    }

    #[must_use]
    pub const fn held(&self) -> Modifiers {
        self.held
    }

    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn is_chord_held(&self) -> bool {
        chord_active(self.chord, self.held)
    }

    /// Adopt the modifier snapshot carried by an event.
    fn reconcile(&mut self, held: Modifiers) {
        if held != self.held {
            trace!(target: TARGET, from = ?self.held, to = ?held, "modifiers reconciled");
            self.held = held;
        }
    }

    fn apply<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        registry: &mut ElementRegistry<N>,
        step: Transition<N>,
    ) {
        if let Some(left) = &step.leave {
            registry.set_prevent_clean(left, false);
            registry.unhighlight(dom, left);
            debug!(target: TARGET, element = ?left, "highlight left");
        }
        if let Some(entered) = &step.enter {
            registry.set_prevent_clean(entered, true);
            registry.highlight(dom, entered);
            debug!(target: TARGET, element = ?entered, "highlight entered");
        }
        self.state = step.next;
        if step.leave.is_some() {
            registry.evict_empty(dom);
        }
    }

    fn recompute<D: Dom<Node = N>>(&mut self, dom: &mut D, registry: &mut ElementRegistry<N>) {
        if self.stopped || self.suspended {
            trace!(target: TARGET, "recompute skipped");
            return;
        }
        let under_cursor = if self.is_chord_held() {
            self.cursor
                .and_then(|point| element_under(&*dom, registry, point))
        } else {
            None
        };
        let step = transition(&self.state, self.chord, self.held, under_cursor);
        self.apply(dom, registry, step);
    }

    pub fn pointer_move<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        registry: &mut ElementRegistry<N>,
        point: Point,
        held: Modifiers,
    ) -> EventOutcome<N> {
        self.cursor = Some(point);
        self.reconcile(held);
        self.recompute(dom, registry);
        EventOutcome::pass()
    }

    pub fn key_down<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        registry: &mut ElementRegistry<N>,
        held: Modifiers,
    ) -> EventOutcome<N> {
        self.reconcile(held);
        self.recompute(dom, registry);
        EventOutcome::pass()
    }

    pub fn key_up<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        registry: &mut ElementRegistry<N>,
        held: Modifiers,
    ) -> EventOutcome<N> {
        self.key_down(dom, registry, held)
    }

    /// Layout moved under a still cursor: refresh the overlay position.
    pub fn scroll<D: Dom<Node = N>>(&mut self, dom: &mut D, registry: &mut ElementRegistry<N>) {
        self.recompute(dom, registry);
        if !self.suspended
            && let Some(element) = self.state.highlighted()
        {
            registry.highlight(dom, element);
        }
    }

    /// A click. The highlight is first brought up to date at the click
    /// point. With the chord held, every click outside the tool's own UI is
    /// blocked, and a click on a tracked element selects it.
    pub fn click<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        registry: &mut ElementRegistry<N>,
        point: Point,
        held: Modifiers,
    ) -> EventOutcome<N> {
        if self.stopped || self.suspended {
            return EventOutcome::pass();
        }
        self.cursor = Some(point);
        self.reconcile(held);
        self.recompute(dom, registry);
        if !self.is_chord_held() {
            return EventOutcome::pass();
        }
        let target = dom.elements_from_point(point).into_iter().next();
        if target.is_some_and(|node| is_in_devtools(&*dom, &node)) {
            return EventOutcome::pass();
        }
        let Some(element) = self.state.highlighted().cloned() else {
            trace!(target: TARGET, ?point, "click blocked without selection");
            return EventOutcome::block();
        };
        debug!(target: TARGET, ?element, "element clicked");
        self.apply(
            dom,
            registry,
            Transition {
                next: HighlightState::Armed,
                leave: Some(element.clone()),
                enter: None,
            },
        );
        EventOutcome {
            block: true,
            clicked: Some(element),
        }
    }

    /// Pointer enter/over/out/leave/down/up: blocked while the chord is held,
    /// unless the event targets the tool's own UI.
    pub fn blockable<D: Dom<Node = N>>(
        &mut self,
        dom: &D,
        target: Option<&N>,
        held: Modifiers,
    ) -> EventOutcome<N> {
        if self.stopped || self.suspended {
            return EventOutcome::pass();
        }
        self.reconcile(held);
        let inside_tool = target.is_some_and(|node| is_in_devtools(dom, node));
        if self.is_chord_held() && !inside_tool {
            EventOutcome::block()
        } else {
            EventOutcome::pass()
        }
    }

    /// Pause recomputation while a host dialog is open.
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    /// Drop highlight state. Idempotent.
    pub fn stop<D: Dom<Node = N>>(&mut self, dom: &mut D, registry: &mut ElementRegistry<N>) {
        if self.stopped {
            return;
        }
        if let Some(element) = self.state.highlighted().cloned() {
            registry.set_prevent_clean(&element, false);
            registry.unhighlight(dom, &element);
        }
        self.state = HighlightState::Idle;
        self.held = Modifiers::empty();
        self.cursor = None;
        self.stopped = true;
        debug!(target: TARGET, "resolver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::NodeRecord;
    use keylens_core::{KeyDescriptor, ObserverOptions};
    use keylens_dom::{MemoryDom, NodeId, Rect};
    use pretty_assertions::assert_eq;

    #[test]
    fn transition_table() {
        let alt = Modifiers::ALT;
        let none = Modifiers::empty();
        let idle: HighlightState<u32> = HighlightState::Idle;

        let t = transition(&idle, alt, none, Some(1));
        assert_eq!(t.next, HighlightState::Idle);
        assert_eq!((t.leave, t.enter), (None, None));

        let t = transition(&idle, alt, alt, None);
        assert_eq!(t.next, HighlightState::Armed);

        let t = transition(&HighlightState::Armed, alt, alt | Modifiers::SHIFT, Some(1));
        assert_eq!(t.next, HighlightState::Highlighted(1));
        assert_eq!((t.leave, t.enter), (None, Some(1)));

        let t = transition(&HighlightState::Highlighted(1), alt, alt, Some(1));
        assert_eq!((t.leave, t.enter), (None, None));

        let t = transition(&HighlightState::Highlighted(1), alt, alt, Some(2));
        assert_eq!(t.next, HighlightState::Highlighted(2));
        assert_eq!((t.leave, t.enter), (Some(1), Some(2)));

        let t = transition(&HighlightState::Highlighted(2), alt, none, Some(2));
        assert_eq!(t.next, HighlightState::Idle);
        assert_eq!(t.leave, Some(2));

        let t = transition(&HighlightState::Highlighted(2), alt, alt, None);
        assert_eq!(t.next, HighlightState::Armed);
        assert_eq!(t.leave, Some(2));
    }

    #[test]
    fn empty_chord_never_arms() {
        let idle: HighlightState<u32> = HighlightState::Idle;
        let t = transition(&idle, Modifiers::empty(), Modifiers::ALT, Some(1));
        assert_eq!(t.next, HighlightState::Idle);
    }

    struct Fixture {
        dom: MemoryDom,
        registry: ElementRegistry<NodeId>,
        resolver: Resolver<NodeId>,
        tracked: NodeId,
    }

    fn fixture() -> Fixture {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let (p, text) = dom.append_element_with_text(body, "p", "Hello");
        dom.set_rect(p, Rect::new(0.0, 0.0, 100.0, 20.0));
        let mut registry = ElementRegistry::new(&ObserverOptions::default());
        registry.register(
            &mut dom,
            p,
            text,
            NodeRecord::decoded("Hello", vec![KeyDescriptor::new("hello")]),
        );
        Fixture {
            dom,
            registry,
            resolver: Resolver::new(Modifiers::ALT),
            tracked: p,
        }
    }

    #[test]
    fn hover_with_chord_pins_and_highlights() {
        let Fixture {
            mut dom,
            mut registry,
            mut resolver,
            tracked,
        } = fixture();
        let inside = Point::new(5.0, 5.0);

        resolver.pointer_move(&mut dom, &mut registry, inside, Modifiers::empty());
        assert_eq!(resolver.state(), &HighlightState::Idle);

        resolver.key_down(&mut dom, &mut registry, Modifiers::ALT);
        assert_eq!(resolver.state(), &HighlightState::Highlighted(tracked));
        let meta = registry.get(&tracked).expect("tracked");
        assert!(meta.prevent_clean);
        assert!(meta.overlay.is_some());

        resolver.key_up(&mut dom, &mut registry, Modifiers::empty());
        assert_eq!(resolver.state(), &HighlightState::Idle);
        let meta = registry.get(&tracked).expect("tracked");
        assert!(!meta.prevent_clean);
        assert!(meta.overlay.is_none());
    }

    #[test]
    fn click_selects_and_unpins() {
        let Fixture {
            mut dom,
            mut registry,
            mut resolver,
            tracked,
        } = fixture();
        let inside = Point::new(5.0, 5.0);
        resolver.pointer_move(&mut dom, &mut registry, inside, Modifiers::ALT);

        let outcome = resolver.click(&mut dom, &mut registry, inside, Modifiers::ALT);
        assert_eq!(
            outcome,
            EventOutcome {
                block: true,
                clicked: Some(tracked),
            }
        );
        assert_eq!(resolver.state(), &HighlightState::Armed);
        assert!(registry.get(&tracked).is_some_and(|m| !m.prevent_clean));

        let outside = Point::new(500.0, 500.0);
        let outcome = resolver.click(&mut dom, &mut registry, outside, Modifiers::ALT);
        assert_eq!(outcome, EventOutcome::block());
        let outcome = resolver.click(&mut dom, &mut registry, outside, Modifiers::empty());
        assert_eq!(outcome, EventOutcome::pass());
    }

    #[test]
    fn chord_click_on_untracked_element_is_blocked() {
        let Fixture {
            mut dom,
            mut registry,
            mut resolver,
            ..
        } = fixture();
        let body = dom.body_id();
        let link = dom.append_element(body, "a");
        dom.set_rect(link, Rect::new(0.0, 100.0, 80.0, 20.0));
        let on_link = Point::new(10.0, 110.0);

        let outcome = resolver.click(&mut dom, &mut registry, on_link, Modifiers::ALT);
        assert_eq!(outcome, EventOutcome::block());
        assert_eq!(resolver.state(), &HighlightState::Armed);

        let tools = dom.append_element(body, "div");
        dom.set_attribute(tools, "id", DEVTOOLS_ID);
        dom.set_rect(tools, Rect::new(0.0, 100.0, 80.0, 20.0));
        let outcome = resolver.click(&mut dom, &mut registry, on_link, Modifiers::ALT);
        assert_eq!(outcome, EventOutcome::pass());
    }

    #[test]
    fn click_selects_element_at_click_point() {
        let Fixture {
            mut dom,
            mut registry,
            mut resolver,
            tracked,
        } = fixture();
        let body = dom.body_id();
        let (other, text) = dom.append_element_with_text(body, "p", "Bye");
        dom.set_rect(other, Rect::new(0.0, 50.0, 100.0, 20.0));
        registry.register(
            &mut dom,
            other,
            text,
            NodeRecord::decoded("Bye", vec![KeyDescriptor::new("bye")]),
        );

        resolver.pointer_move(&mut dom, &mut registry, Point::new(5.0, 5.0), Modifiers::ALT);
        assert_eq!(resolver.state(), &HighlightState::Highlighted(tracked));

        let outcome = resolver.click(&mut dom, &mut registry, Point::new(5.0, 55.0), Modifiers::ALT);
        assert_eq!(
            outcome,
            EventOutcome {
                block: true,
                clicked: Some(other),
            }
        );
        assert!(registry.get(&tracked).is_some_and(|m| m.overlay.is_none() && !m.prevent_clean));
        assert!(registry.get(&other).is_some_and(|m| m.overlay.is_none() && !m.prevent_clean));
    }

    #[test]
    fn blockable_events_respect_chord_and_devtools() {
        let Fixture {
            mut dom,
            mut registry,
            mut resolver,
            tracked,
        } = fixture();
        let body = dom.body_id();
        let tools = dom.append_element(body, "div");
        dom.set_attribute(tools, "id", DEVTOOLS_ID);

        assert!(!resolver.blockable(&dom, Some(&tracked), Modifiers::empty()).block);
        assert!(resolver.blockable(&dom, Some(&tracked), Modifiers::ALT).block);
        assert!(!resolver.blockable(&dom, Some(&tools), Modifiers::ALT).block);

        resolver.stop(&mut dom, &mut registry);
        assert!(!resolver.blockable(&dom, Some(&tracked), Modifiers::ALT).block);
    }

    #[test]
    fn suspended_resolver_does_not_recompute() {
        let Fixture {
            mut dom,
            mut registry,
            mut resolver,
            tracked,
        } = fixture();
        resolver.suspend();
        resolver.pointer_move(&mut dom, &mut registry, Point::new(5.0, 5.0), Modifiers::ALT);
        assert_eq!(resolver.state(), &HighlightState::Idle);
        resolver.resume();
        resolver.scroll(&mut dom, &mut registry);
        assert_eq!(resolver.state(), &HighlightState::Highlighted(tracked));
    }

    #[test]
    fn devtools_overlay_hides_elements_below() {
        let Fixture {
            mut dom,
            mut registry,
            mut resolver,
            ..
        } = fixture();
        let body = dom.body_id();
        let tools = dom.append_element(body, "div");
        dom.set_attribute(tools, "id", DEVTOOLS_ID);
        dom.set_rect(tools, Rect::new(0.0, 0.0, 50.0, 50.0));

        resolver.pointer_move(&mut dom, &mut registry, Point::new(5.0, 5.0), Modifiers::ALT);
        assert_eq!(resolver.state(), &HighlightState::Armed);
        resolver.pointer_move(&mut dom, &mut registry, Point::new(80.0, 5.0), Modifiers::ALT);
        assert!(resolver.state().highlighted().is_some());
    }

    #[test]
    fn stop_is_idempotent() {
        let Fixture {
            mut dom,
            mut registry,
            mut resolver,
            tracked,
        } = fixture();
        resolver.pointer_move(&mut dom, &mut registry, Point::new(5.0, 5.0), Modifiers::ALT);
        resolver.stop(&mut dom, &mut registry);
        resolver.stop(&mut dom, &mut registry);
        assert_eq!(resolver.state(), &HighlightState::Idle);
        assert!(registry.get(&tracked).is_some_and(|m| m.overlay.is_none()));
        resolver.pointer_move(&mut dom, &mut registry, Point::new(5.0, 5.0), Modifiers::ALT);
        assert_eq!(resolver.state(), &HighlightState::Idle);
    }
}
