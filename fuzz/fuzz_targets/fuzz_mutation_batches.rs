#![no_main]

use arbitrary::Arbitrary;
use keylens_core::{InvisibleWrapper, KEY_ONLY_ATTRIBUTE, KeyDescriptor, Modifiers, ObserverOptions};
use keylens_dom::{Dom, MemoryDom, NodeId, Point, Rect};
use keylens_observer::Observer;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    AddWrapped { parent: u8, key: u8 },
    AddElement { parent: u8 },
    Remove { node: u8 },
    Move { node: u8, parent: u8 },
    Rewrite { node: u8, key: Option<u8> },
    Title { element: u8, key: u8 },
    KeyOnly { element: u8, key: u8 },
    ClearKeyOnly { element: u8 },
    Hover { x: u8, y: u8, chord: bool },
    Click { x: u8, y: u8 },
    Flush,
}

fn pick<T: Copy>(items: &[T], idx: u8) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items[usize::from(idx) % items.len()])
    }
}

fuzz_target!(|ops: Vec<Op>| {
    let mut dom = MemoryDom::new();
    let mut observer: Observer<NodeId> = Observer::new(ObserverOptions::default());
    if observer.run(&mut dom, None).is_err() {
        return;
    }
    let mut wrapper = InvisibleWrapper::new(true);
    let body = dom.body_id();
    let mut elements = vec![body];
    let mut texts = Vec::new();

    for op in ops.iter().take(256) {
        match *op {
            Op::AddWrapped { parent, key } => {
                let Some(parent) = pick(&elements, parent) else { continue };
                let text = wrapper.wrap_keys("t", &[KeyDescriptor::new(format!("k{key}"))]);
                texts.push(dom.append_text(parent, &text));
            }
            Op::AddElement { parent } => {
                let Some(parent) = pick(&elements, parent) else { continue };
                let el = dom.append_element(parent, "span");
                let i = elements.len() as f64;
                dom.set_rect(el, Rect::new(i * 3.0, i * 2.0, 40.0, 20.0));
                elements.push(el);
            }
            Op::Remove { node } => {
                if let Some(el) = pick(&elements, node)
                    && el != body
                {
                    dom.remove(el);
                }
            }
            Op::Move { node, parent } => {
                if let (Some(text), Some(parent)) = (pick(&texts, node), pick(&elements, parent))
                    && dom.is_connected(&parent)
                {
                    dom.append_child(parent, text);
                }
            }
            Op::Rewrite { node, key } => {
                let Some(text) = pick(&texts, node) else { continue };
                let content = match key {
                    Some(key) => wrapper.wrap_keys("r", &[KeyDescriptor::new(format!("k{key}"))]),
                    None => "plain".to_owned(),
                };
                dom.set_text(text, &content);
            }
            Op::Title { element, key } => {
                let Some(el) = pick(&elements, element) else { continue };
                let value = wrapper.wrap_keys("title", &[KeyDescriptor::new(format!("t{key}"))]);
                dom.set_attribute(el, "title", &value);
            }
            Op::KeyOnly { element, key } => {
                let Some(el) = pick(&elements, element) else { continue };
                dom.set_attribute(el, KEY_ONLY_ATTRIBUTE, &format!("only{key}"));
            }
            Op::ClearKeyOnly { element } => {
                let Some(el) = pick(&elements, element) else { continue };
                dom.remove_attribute(el, KEY_ONLY_ATTRIBUTE);
            }
            Op::Hover { x, y, chord } => {
                let held = if chord { Modifiers::ALT } else { Modifiers::empty() };
                let point = Point::new(f64::from(x), f64::from(y));
                let _ = observer.pointer_move(&mut dom, point, held);
            }
            Op::Click { x, y } => {
                let point = Point::new(f64::from(x), f64::from(y));
                let _ = observer.click(&mut dom, point, Modifiers::ALT);
            }
            Op::Flush => {
                let batch = dom.take_records();
                observer.handle_mutations(&mut dom, &batch);
            }
        }
    }

    for _ in 0..4 {
        let batch = dom.take_records();
        if batch.is_empty() {
            break;
        }
        observer.handle_mutations(&mut dom, &batch);
    }
    let _ = observer.key_up(&mut dom, Modifiers::empty());

    observer.for_each_element(|element, meta| {
        assert!(
            !meta.nodes.is_empty() || meta.prevent_clean,
            "empty element {element:?} survived"
        );
        for (node, _) in &meta.nodes {
            assert_eq!(observer.registry().owner_of(node), Some(element));
        }
    });

    observer.stop(&mut dom);
    assert!(observer.registry().is_empty());
});
