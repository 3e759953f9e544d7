//! End-to-end scenarios against the in-memory document.

use std::collections::BTreeMap;
use std::task::{Context, Poll, Waker};

use keylens::prelude::*;
use keylens::{
    ClickResolution, DEVTOOLS_ID, HIGHLIGHTER_CLASS, HighlightState, InvisibleWrapper, NodeId,
    resolve_click,
};
use pretty_assertions::assert_eq;

fn deliver(dom: &mut MemoryDom, observer: &mut Observer<NodeId>) {
    for _ in 0..4 {
        let batch = dom.take_records();
        if batch.is_empty() {
            return;
        }
        observer.handle_mutations(dom, &batch);
    }
}

struct Page {
    dom: MemoryDom,
    observer: Observer<NodeId>,
    section: NodeId,
    paragraph: NodeId,
    text: NodeId,
}

/// `<section><p>Hello</p></section>` with "Hello" wrapped as `greeting`.
fn greeting_page() -> Page {
    let mut dom = MemoryDom::new();
    let mut observer = Observer::new(ObserverOptions::default());
    let body = dom.body_id();
    let mut wrapper = InvisibleWrapper::new(true);
    let wrapped = wrapper.wrap_keys("Hello", &[KeyDescriptor::new("greeting")]);
    let section = dom.append_element(body, "section");
    let (paragraph, text) = dom.append_element_with_text(section, "p", &wrapped);
    dom.set_rect(section, Rect::new(0.0, 0.0, 400.0, 200.0));
    dom.set_rect(paragraph, Rect::new(20.0, 30.0, 120.0, 18.0));
    dom.take_records();
    observer.run(&mut dom, None).expect("body exists");
    deliver(&mut dom, &mut observer);
    Page {
        dom,
        observer,
        section,
        paragraph,
        text,
    }
}

#[test]
fn initial_scan_tracks_one_element() {
    let page = greeting_page();
    let registry = page.observer.registry();
    assert_eq!(registry.len(), 1);
    let meta = registry.get(&page.paragraph).expect("paragraph tracked");
    assert_eq!(meta.nodes.len(), 1);
    let (node, record) = &meta.nodes[0];
    assert_eq!(*node, page.text);
    assert_eq!(record.keys, vec![KeyDescriptor::new("greeting")]);
    assert_eq!(page.dom.text(page.text), Some("Hello"));
}

#[test]
fn removing_the_subtree_evicts_the_element() {
    let mut page = greeting_page();
    page.dom.remove(page.section);
    deliver(&mut page.dom, &mut page.observer);
    assert!(page.observer.registry().is_empty());
    assert_eq!(page.observer.registry().owner_of(&page.text), None);
}

#[test]
fn removal_is_deferred_while_hovered() {
    let mut page = greeting_page();
    let inside = Point::new(30.0, 35.0);
    page.observer
        .pointer_move(&mut page.dom, inside, Modifiers::ALT);
    page.dom.remove(page.section);
    deliver(&mut page.dom, &mut page.observer);
    assert!(page.observer.registry().get(&page.paragraph).is_some());

    page.observer
        .key_up(&mut page.dom, Modifiers::empty());
    assert!(page.observer.registry().is_empty());
}

#[test]
fn hover_with_chord_highlights_at_the_element_box() {
    let mut page = greeting_page();
    let inside = Point::new(30.0, 35.0);

    page.observer
        .pointer_move(&mut page.dom, inside, Modifiers::empty());
    assert_eq!(page.observer.highlight_state(), &HighlightState::Idle);

    page.observer.key_down(&mut page.dom, Modifiers::ALT);
    assert_eq!(
        page.observer.highlight_state(),
        &HighlightState::Highlighted(page.paragraph)
    );
    let meta = page.observer.registry().get(&page.paragraph).expect("tracked");
    assert!(meta.prevent_clean);
    let overlay = meta.overlay.expect("overlay");
    assert_eq!(
        page.dom.get_attribute(&overlay, "class").as_deref(),
        Some(HIGHLIGHTER_CLASS)
    );
    assert_eq!(page.dom.style(overlay, "top"), Some("25px"));
    assert_eq!(page.dom.style(overlay, "left"), Some("15px"));
    assert_eq!(page.dom.style(overlay, "width"), Some("120px"));
    assert_eq!(page.dom.style(overlay, "height"), Some("18px"));

    // The overlay is the tool's own node; its insertion is not page content.
    deliver(&mut page.dom, &mut page.observer);
    assert_eq!(page.observer.registry().len(), 1);
}

#[test]
fn click_emits_keys_and_releases_the_element() {
    let mut page = greeting_page();
    let inside = Point::new(30.0, 35.0);
    let mut translations = BTreeMap::new();
    translations.insert("greeting".to_owned(), "Hello".to_owned());
    page.observer.set_translation_source(translations);

    page.observer
        .pointer_move(&mut page.dom, inside, Modifiers::ALT);
    let outcome = page.observer.click(&mut page.dom, inside, Modifiers::ALT);
    assert!(outcome.block);
    let click = outcome.click.expect("qualifying click");
    assert_eq!(click.element, page.paragraph);
    assert_eq!(click.options.len(), 1);
    assert_eq!(click.options[0].key, "greeting");
    assert_eq!(click.options[0].translation.as_deref(), Some("Hello"));

    assert_eq!(page.observer.highlight_state(), &HighlightState::Armed);
    let meta = page.observer.registry().get(&page.paragraph).expect("tracked");
    assert!(!meta.prevent_clean);
    assert!(meta.overlay.is_none());

    match resolve_click(click.options) {
        Some(ClickResolution::Single(option)) => assert_eq!(option.key, "greeting"),
        other => panic!("expected a single key, got {other:?}"),
    }
}

#[test]
fn chord_click_on_untracked_link_is_blocked() {
    let mut page = greeting_page();
    let link = page.dom.append_element(page.section, "a");
    page.dom.set_attribute(link, "href", "/elsewhere");
    page.dom.set_rect(link, Rect::new(200.0, 100.0, 60.0, 16.0));
    deliver(&mut page.dom, &mut page.observer);

    let on_link = Point::new(210.0, 105.0);
    let outcome = page.observer.click(&mut page.dom, on_link, Modifiers::ALT);
    assert!(outcome.block);
    assert!(outcome.click.is_none());
    assert_eq!(page.observer.highlight_state(), &HighlightState::Armed);

    let outcome = page
        .observer
        .click(&mut page.dom, on_link, Modifiers::empty());
    assert!(!outcome.block);
}

#[test]
fn click_selects_the_element_under_the_click_not_the_last_hover() {
    let mut page = greeting_page();
    let farewell = page.observer.wrap(WrapProps::new("farewell").translation("Bye"));
    let (second, _) = page
        .dom
        .append_element_with_text(page.section, "p", &farewell);
    page.dom.set_rect(second, Rect::new(20.0, 80.0, 120.0, 18.0));
    deliver(&mut page.dom, &mut page.observer);

    page.observer
        .pointer_move(&mut page.dom, Point::new(30.0, 35.0), Modifiers::ALT);
    assert_eq!(
        page.observer.highlight_state(),
        &HighlightState::Highlighted(page.paragraph)
    );

    let outcome = page
        .observer
        .click(&mut page.dom, Point::new(30.0, 85.0), Modifiers::ALT);
    assert!(outcome.block);
    let click = outcome.click.expect("qualifying click");
    assert_eq!(click.element, second);
    assert_eq!(click.options[0].key, "farewell");

    let first = page.observer.registry().get(&page.paragraph).expect("tracked");
    assert!(first.overlay.is_none());
    assert!(!first.prevent_clean);
}

#[test]
fn merged_siblings_decode_in_order() {
    let mut observer: Observer<NodeId> = Observer::new(ObserverOptions::default());
    let mut dom = MemoryDom::new();
    observer.run(&mut dom, None).expect("body exists");

    let a = observer.wrap(WrapProps::new("k1").translation("a"));
    let b = observer.wrap(WrapProps::new("k2").translation("b"));
    let merged = format!("{a}{b}");
    let unwrapped = observer.unwrap(&merged);
    assert_eq!(unwrapped.text, "ab");
    let keys: Vec<&str> = unwrapped.keys.iter().map(|k| k.key.as_str()).collect();
    assert_eq!(keys, vec!["k1", "k2"]);

    let body = dom.body_id();
    let (p, text) = dom.append_element_with_text(body, "p", &merged);
    deliver(&mut dom, &mut observer);
    assert_eq!(dom.text(text), Some("ab"));
    let positions = observer.find_positions(&dom, &KeyFilter::any());
    let names: Vec<&str> = positions.iter().map(|p| p.key_name.as_str()).collect();
    assert_eq!(names, vec!["k1", "k2"]);
    assert!(observer.registry().get(&p).is_some());
}

#[test]
fn multiple_keys_open_a_chooser() {
    let mut observer: Observer<NodeId> = Observer::new(ObserverOptions::default());
    let mut dom = MemoryDom::new();
    observer.run(&mut dom, None).expect("body exists");
    let body = dom.body_id();
    let title = observer.wrap(WrapProps::new("card.title").translation("Card"));
    let hint = observer.wrap(
        WrapProps::new("card.hint")
            .translation("Hint")
            .namespace("cards"),
    );
    let (card, _) = dom.append_element_with_text(body, "div", &title);
    dom.set_attribute(card, "title", &hint);
    dom.set_rect(card, Rect::new(0.0, 0.0, 50.0, 50.0));
    deliver(&mut dom, &mut observer);

    let point = Point::new(10.0, 10.0);
    observer.pointer_move(&mut dom, point, Modifiers::ALT);
    let click = observer
        .click(&mut dom, point, Modifiers::ALT)
        .click
        .expect("qualifying click");
    let Some(ClickResolution::Choose(selector, mut pending)) = resolve_click(click.options)
    else {
        panic!("expected a chooser");
    };
    let keys: Vec<&str> = selector.options().iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["card.hint", "card.title"]);

    let mut cx = Context::from_waker(Waker::noop());
    assert!(std::pin::Pin::new(&mut pending).poll(&mut cx).is_pending());
    assert!(selector.select(0).is_ok());
    match std::pin::Pin::new(&mut pending).poll(&mut cx) {
        Poll::Ready(option) => {
            assert_eq!(option.key, "card.hint");
            assert_eq!(option.namespace.as_deref(), Some("cards"));
        }
        Poll::Pending => panic!("selection did not resolve"),
    }
}

#[test]
fn find_positions_follow_document_order() {
    let mut observer: Observer<NodeId> = Observer::new(ObserverOptions::default());
    let mut dom = MemoryDom::new();
    observer.run(&mut dom, None).expect("body exists");
    let body = dom.body_id();
    let list = dom.append_element(body, "ul");
    let mut items = Vec::new();
    for (i, key) in ["z.last", "a.first", "m.middle"].iter().enumerate() {
        let text = observer.wrap(WrapProps::new(*key).translation(format!("item {i}")));
        let (li, _) = dom.append_element_with_text(list, "li", &text);
        dom.set_rect(li, Rect::new(0.0, 20.0 * i as f64, 100.0, 20.0));
        items.push(li);
    }
    deliver(&mut dom, &mut observer);

    let positions = observer.find_positions(&dom, &KeyFilter::any());
    let names: Vec<&str> = positions.iter().map(|p| p.key_name.as_str()).collect();
    assert_eq!(names, vec!["z.last", "a.first", "m.middle"]);
    assert_eq!(positions[2].position, Rect::new(0.0, 40.0, 100.0, 20.0));

    let json = serde_json::to_value(&positions[0]).expect("serializable");
    assert_eq!(json["keyName"], "z.last");
    assert_eq!(json["keyNamespace"], "");
    assert_eq!(json["position"]["height"], 20.0);

    let handle = observer.highlight(&mut dom, &KeyFilter::new(Some("a.first"), None));
    assert_eq!(handle.elements(), &[items[1]]);
    let overlay = observer
        .registry()
        .get(&items[1])
        .and_then(|meta| meta.overlay)
        .expect("overlay");
    handle.unhighlight(&mut observer, &mut dom);
    assert!(!dom.is_connected(&overlay));
}

#[test]
fn devtools_ui_is_never_blocked() {
    let mut page = greeting_page();
    let body = page.dom.body_id();
    let tools = page.dom.append_element(body, "div");
    page.dom.set_attribute(tools, "id", DEVTOOLS_ID);
    let button = page.dom.append_element(tools, "button");

    let outcome = page
        .observer
        .blockable(&page.dom, Some(&button), Modifiers::ALT);
    assert!(!outcome.block);
    let outcome = page
        .observer
        .blockable(&page.dom, Some(&page.paragraph), Modifiers::ALT);
    assert!(outcome.block);
}

#[test]
fn options_from_json_drive_the_observer() {
    let options = ObserverOptions::from_json(
        r#"{"highlightKeys":["Control","Shift"],"passToParent":false,"mouseHighlight":true}"#,
    )
    .expect("valid options");
    let mut observer: Observer<NodeId> = Observer::new(options);
    let mut dom = MemoryDom::new();
    observer.run(&mut dom, None).expect("body exists");
    let body = dom.body_id();
    let select = dom.append_element(body, "select");
    let text = observer.wrap(WrapProps::new("opt").translation("One"));
    let (option, _) = dom.append_element_with_text(select, "option", &text);
    dom.set_rect(option, Rect::new(0.0, 0.0, 10.0, 10.0));
    deliver(&mut dom, &mut observer);
    // Pass-to-parent disabled: the option itself owns the text.
    assert!(observer.registry().get(&option).is_some());

    let point = Point::new(1.0, 1.0);
    observer.pointer_move(&mut dom, point, Modifiers::CTRL);
    assert_eq!(observer.highlight_state(), &HighlightState::Idle);
    observer.key_down(&mut dom, Modifiers::CTRL | Modifiers::SHIFT);
    assert_eq!(
        observer.highlight_state(),
        &HighlightState::Highlighted(option)
    );
}
