#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Array, Function};
use keylens_core::{KeyFilter, Modifiers, ObserverOptions};
use keylens_dom::{MutationRecord, Point};
use keylens_observer::{EventOutcome, HighlightHandle, Observer};
use tracing::{debug, trace, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{
    AddEventListenerOptions, Element, Event, EventTarget, KeyboardEvent, MouseEvent,
    MutationObserver, MutationObserverInit, Node,
};

use crate::bridge::{click_payload, parse_filter, parse_translations, parse_wrap_props};
use crate::web_dom::{WebDom, WebNode};

const TARGET: &str = "keylens::web";

/// Pointer events that are swallowed while the chord is held over page
/// content.
const BLOCKABLE_EVENTS: [&str; 6] = [
    "mouseenter",
    "mouseover",
    "mouseout",
    "mouseleave",
    "mousedown",
    "mouseup",
];

fn js_err(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn held_from_mouse(event: &MouseEvent) -> Modifiers {
    Modifiers::from_event_flags(
        event.ctrl_key(),
        event.alt_key(),
        event.meta_key(),
        event.shift_key(),
    )
}

fn held_from_keyboard(event: &KeyboardEvent) -> Modifiers {
    Modifiers::from_event_flags(
        event.ctrl_key(),
        event.alt_key(),
        event.meta_key(),
        event.shift_key(),
    )
}

fn block(event: &Event) {
    event.prevent_default();
    event.stop_immediate_propagation();
}

struct Shared {
    dom: WebDom,
    observer: Observer<WebNode>,
    on_click: Option<Function>,
    highlights: Vec<HighlightHandle<WebNode>>,
}

fn apply(outcome: &EventOutcome<WebNode>, event: &Event) {
    if outcome.block {
        block(event);
    }
}

type Listener = Closure<dyn FnMut(Event)>;

/// Everything installed on the page by `start`, removed again by `stop`.
struct Wiring {
    observer: MutationObserver,
    _on_mutations: Closure<dyn FnMut(Array, MutationObserver)>,
    listeners: Vec<(EventTarget, &'static str, Listener)>,
}

impl Wiring {
    fn teardown(self) {
        self.observer.disconnect();
        for (target, name, listener) in &self.listeners {
            if let Err(err) = target.remove_event_listener_with_callback_and_bool(
                name,
                listener.as_ref().unchecked_ref(),
                true,
            ) {
                warn!(target: TARGET, event = name, ?err, "listener removal failed");
            }
        }
    }
}

fn convert_record(record: &web_sys::MutationRecord) -> Option<MutationRecord<WebNode>> {
    let target = WebNode::from_node(record.target()?);
    let nodes = |list: web_sys::NodeList| {
        (0..list.length())
            .filter_map(|i| list.item(i))
            .map(WebNode::from_node)
            .collect::<Vec<_>>()
    };
    match record.type_().as_str() {
        "characterData" => Some(MutationRecord::CharacterData { target }),
        "childList" => Some(MutationRecord::ChildList {
            target,
            added: nodes(record.added_nodes()),
            removed: nodes(record.removed_nodes()),
        }),
        "attributes" => Some(MutationRecord::Attributes {
            target,
            name: record.attribute_name()?,
        }),
        _ => None,
    }
}

/// Live key binding for the current page.
///
/// JS drives the lifecycle: construct with options, `start` to decode the
/// page and begin observing, `stop` to remove every listener and overlay.
#[wasm_bindgen]
pub struct KeylensWeb {
    shared: Rc<RefCell<Shared>>,
    wiring: Option<Wiring>,
}

#[wasm_bindgen]
impl KeylensWeb {
    /// Create an observer for the current document. `options` is the JSON
    /// options object; omitted fields take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(options: Option<String>) -> Result<KeylensWeb, JsValue> {
        let options = ObserverOptions::from_json(options.as_deref().unwrap_or_default())
            .map_err(js_err)?;
        let dom = WebDom::from_window().ok_or_else(|| JsValue::from_str("no document"))?;
        Ok(Self {
            shared: Rc::new(RefCell::new(Shared {
                dom,
                observer: Observer::new(options),
                on_click: None,
                highlights: Vec::new(),
            })),
            wiring: None,
        })
    }

    /// Decode what is rendered under `target` (the body when omitted) and
    /// keep it up to date. Restarts a running session.
    pub fn start(&mut self, target: Option<Element>) -> Result<(), JsValue> {
        self.stop();
        let (root, attributes) = {
            let mut guard = self.shared.borrow_mut();
            let shared = &mut *guard;
            let target = target.map(|el| WebNode::from_node(el.into()));
            shared
                .observer
                .run(&mut shared.dom, target)
                .map_err(js_err)?;
            let root = shared.observer.target().cloned();
            (root, shared.observer.monitored_attributes())
        };
        let root = root.ok_or_else(|| JsValue::from_str("no target element to observe"))?;

        let shared = Rc::clone(&self.shared);
        let on_mutations = Closure::<dyn FnMut(Array, MutationObserver)>::new(
            move |records: Array, _observer: MutationObserver| {
                let batch: Vec<_> = records
                    .iter()
                    .filter_map(|value| value.dyn_into::<web_sys::MutationRecord>().ok())
                    .filter_map(|record| convert_record(&record))
                    .collect();
                let Ok(mut guard) = shared.try_borrow_mut() else {
                    trace!(target: TARGET, "mutation batch dropped: busy");
                    return;
                };
                let shared = &mut *guard;
                shared.observer.handle_mutations(&mut shared.dom, &batch);
            },
        );
        let observer = MutationObserver::new(on_mutations.as_ref().unchecked_ref())?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        init.set_character_data(true);
        init.set_attributes(true);
        let filter: Array = attributes.iter().map(|name| JsValue::from_str(name)).collect();
        init.set_attribute_filter(&filter);
        observer.observe_with_options(root.node(), &init)?;

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let window: EventTarget = window.into();
        let mut listeners = Vec::new();
        self.listen(&window, "mousemove", true, &mut listeners, |shared, event| {
            if let Some(mouse) = event.dyn_ref::<MouseEvent>() {
                let held = held_from_mouse(mouse);
                let point = Point::new(f64::from(mouse.client_x()), f64::from(mouse.client_y()));
                let outcome = shared.observer.pointer_move(&mut shared.dom, point, held);
                apply(&outcome, event);
            }
        })?;
        self.listen(&window, "keydown", false, &mut listeners, |shared, event| {
            if let Some(key) = event.dyn_ref::<KeyboardEvent>() {
                let held = held_from_keyboard(key);
                let outcome = shared.observer.key_down(&mut shared.dom, held);
                apply(&outcome, event);
            }
        })?;
        self.listen(&window, "keyup", false, &mut listeners, |shared, event| {
            if let Some(key) = event.dyn_ref::<KeyboardEvent>() {
                let held = held_from_keyboard(key);
                let outcome = shared.observer.key_up(&mut shared.dom, held);
                apply(&outcome, event);
            }
        })?;
        self.listen(&window, "scroll", true, &mut listeners, |shared, _event| {
            shared.observer.scroll(&mut shared.dom);
        })?;
        for name in BLOCKABLE_EVENTS {
            self.listen(&window, name, false, &mut listeners, |shared, event| {
                let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
                    return;
                };
                let held = held_from_mouse(mouse);
                let target = event
                    .target()
                    .and_then(|target| target.dyn_into::<Node>().ok())
                    .map(WebNode::from_node);
                let outcome = shared
                    .observer
                    .blockable(&shared.dom, target.as_ref(), held);
                apply(&outcome, event);
            })?;
        }
        listeners.push(self.click_listener(&window)?);

        debug!(
            target: TARGET,
            ?root,
            attributes = attributes.len(),
            listeners = listeners.len(),
            "web observer wired"
        );
        self.wiring = Some(Wiring {
            observer,
            _on_mutations: on_mutations,
            listeners,
        });
        Ok(())
    }

    /// Remove listeners, overlays, and tracked state. Idempotent.
    pub fn stop(&mut self) {
        if let Some(wiring) = self.wiring.take() {
            wiring.teardown();
        }
        let Ok(mut guard) = self.shared.try_borrow_mut() else {
            warn!(target: TARGET, "stop while busy");
            return;
        };
        let shared = &mut *guard;
        shared.highlights.clear();
        shared.observer.stop(&mut shared.dom);
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.shared.borrow().observer.is_running()
    }

    /// Wrap a translation. `props` is `{ key, ns?, translation?, defaultValue? }`.
    pub fn wrap(&self, props: &str) -> Result<String, JsValue> {
        let props = parse_wrap_props(props).map_err(js_err)?;
        Ok(self.shared.borrow_mut().observer.wrap(props))
    }

    /// Decode markers; returns `{ text, keys }` as JSON.
    pub fn unwrap(&self, text: &str) -> Result<String, JsValue> {
        let unwrapped = self.shared.borrow().observer.unwrap(text);
        serde_json::to_string(&unwrapped).map_err(js_err)
    }

    /// On-screen positions of matching keys, in document order, as JSON.
    #[wasm_bindgen(js_name = findPositions)]
    pub fn find_positions(&self, filter: Option<String>) -> Result<String, JsValue> {
        let filter = parse_filter(filter.as_deref().unwrap_or_default()).map_err(js_err)?;
        let shared = self.shared.borrow();
        let positions = shared.observer.find_positions(&shared.dom, &filter);
        serde_json::to_string(&positions).map_err(js_err)
    }

    /// Highlight every element carrying a matching key; returns how many.
    pub fn highlight(&self, filter: Option<String>) -> Result<u32, JsValue> {
        let filter: KeyFilter =
            parse_filter(filter.as_deref().unwrap_or_default()).map_err(js_err)?;
        let mut guard = self.shared.borrow_mut();
        let shared = &mut *guard;
        let handle = shared.observer.highlight(&mut shared.dom, &filter);
        let count = u32::try_from(handle.elements().len()).unwrap_or(u32::MAX);
        shared.highlights.push(handle);
        Ok(count)
    }

    /// Undo every `highlight` call.
    pub fn unhighlight(&self) {
        let mut guard = self.shared.borrow_mut();
        let shared = &mut *guard;
        for handle in std::mem::take(&mut shared.highlights) {
            handle.unhighlight(&mut shared.observer, &mut shared.dom);
        }
    }

    /// Called with the click JSON (`{ options: [...] }`) on each qualifying
    /// click. Pass `undefined` to clear.
    #[wasm_bindgen(js_name = setOnClick)]
    pub fn set_on_click(&self, callback: Option<Function>) {
        self.shared.borrow_mut().on_click = callback;
    }

    /// Translations shown in click payloads: `{ key: text }` or
    /// `{ namespace: { key: text } }`.
    #[wasm_bindgen(js_name = setTranslations)]
    pub fn set_translations(&self, json: &str) -> Result<(), JsValue> {
        let table = parse_translations(json).map_err(js_err)?;
        self.shared
            .borrow_mut()
            .observer
            .set_translation_source(table);
        Ok(())
    }

    #[wasm_bindgen(js_name = suspendHighlight)]
    pub fn suspend_highlight(&self) {
        self.shared.borrow_mut().observer.suspend_highlight();
    }

    #[wasm_bindgen(js_name = resumeHighlight)]
    pub fn resume_highlight(&self) {
        self.shared.borrow_mut().observer.resume_highlight();
    }
}

impl KeylensWeb {
    fn listen(
        &self,
        target: &EventTarget,
        name: &'static str,
        passive: bool,
        listeners: &mut Vec<(EventTarget, &'static str, Listener)>,
        handler: fn(&mut Shared, &Event),
    ) -> Result<(), JsValue> {
        let shared = Rc::clone(&self.shared);
        let listener = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let Ok(mut guard) = shared.try_borrow_mut() else {
                trace!(target: TARGET, event = name, "event ignored: busy");
                return;
            };
            handler(&mut guard, &event);
        });
        Self::add(target, name, passive, &listener)?;
        listeners.push((target.clone(), name, listener));
        Ok(())
    }

    fn click_listener(
        &self,
        target: &EventTarget,
    ) -> Result<(EventTarget, &'static str, Listener), JsValue> {
        let shared = Rc::clone(&self.shared);
        let listener = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
                return;
            };
            // The callback runs after the borrow ends so it may call back in.
            let pending = {
                let Ok(mut guard) = shared.try_borrow_mut() else {
                    return;
                };
                let shared = &mut *guard;
                let held = held_from_mouse(mouse);
                let point = Point::new(f64::from(mouse.client_x()), f64::from(mouse.client_y()));
                let outcome = shared.observer.click(&mut shared.dom, point, held);
                if outcome.block {
                    block(&event);
                }
                outcome
                    .click
                    .map(|click| (shared.on_click.clone(), click_payload(&click.options)))
            };
            let Some((callback, payload)) = pending else {
                return;
            };
            let payload = match payload {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(target: TARGET, %err, "click payload failed");
                    return;
                }
            };
            let Some(callback) = callback else {
                trace!(target: TARGET, "click ignored: no callback");
                return;
            };
            if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(&payload)) {
                warn!(target: TARGET, ?err, "click callback threw");
            }
        });
        Self::add(target, "click", false, &listener)?;
        Ok((target.clone(), "click", listener))
    }

    fn add(
        target: &EventTarget,
        name: &str,
        passive: bool,
        listener: &Listener,
    ) -> Result<(), JsValue> {
        let options = AddEventListenerOptions::new();
        options.set_capture(true);
        options.set_passive(passive);
        target.add_event_listener_with_callback_and_add_event_listener_options(
            name,
            listener.as_ref().unchecked_ref(),
            &options,
        )
    }
}

impl Drop for KeylensWeb {
    fn drop(&mut self) {
        self.stop();
    }
}
