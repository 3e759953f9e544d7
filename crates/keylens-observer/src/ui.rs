#![forbid(unsafe_code)]

//! Click-to-inspect and key selection.
//!
//! A click on a highlighted element yields an [`ElementClick`] listing every
//! distinct key the element carries. When there is more than one, the host UI
//! shows a chooser and resolves a [`PendingKey`] through its [`KeySelector`].

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::hash::BuildHasher;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use serde::Serialize;

use crate::meta::ElementMeta;

/// Translations shown next to each key in the chooser.
pub trait TranslationSource {
    /// Translation of `key`, looked up in `namespace` when given.
    fn translation(&self, key: &str, namespace: Option<&str>) -> Option<String>;
}

fn lookup<'a>(
    get: impl Fn(&str) -> Option<&'a String>,
    key: &str,
    namespace: Option<&str>,
) -> Option<String> {
    namespace
        .and_then(|ns| get(&format!("{ns}:{key}")))
        .or_else(|| get(key))
        .cloned()
}

/// Keys are either `key` or `namespace:key`.
impl TranslationSource for BTreeMap<String, String> {
    fn translation(&self, key: &str, namespace: Option<&str>) -> Option<String> {
        lookup(|k| self.get(k), key, namespace)
    }
}

impl<S: BuildHasher> TranslationSource for HashMap<String, String, S> {
    fn translation(&self, key: &str, namespace: Option<&str>) -> Option<String> {
        lookup(|k| self.get(k), key, namespace)
    }
}

/// One selectable key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyOption {
    pub key: String,
    pub namespace: Option<String>,
    pub default_value: Option<String>,
    pub translation: Option<String>,
    /// Namespaces after the primary one.
    pub fallback_namespaces: Vec<String>,
}

/// Distinct keys of an element, in node order.
#[must_use]
pub fn key_options<N: Clone + Eq>(
    meta: &ElementMeta<N>,
    translations: Option<&dyn TranslationSource>,
) -> Vec<KeyOption> {
    let mut out: Vec<KeyOption> = Vec::new();
    for descriptor in meta.keys() {
        let namespace = descriptor.primary_namespace().map(str::to_owned);
        if out
            .iter()
            .any(|o| o.key == descriptor.key && o.namespace == namespace)
        {
            continue;
        }
        let translation = translations
            .and_then(|source| source.translation(&descriptor.key, namespace.as_deref()));
        out.push(KeyOption {
            key: descriptor.key.clone(),
            namespace,
            default_value: descriptor.default_value.clone(),
            translation,
            fallback_namespaces: descriptor
                .namespace
                .as_deref()
                .map(|list| list.iter().skip(1).cloned().collect())
                .unwrap_or_default(),
        });
    }
    out
}

/// A qualifying click on a tracked element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementClick<N> {
    pub element: N,
    pub options: Vec<KeyOption>,
}

#[derive(Debug, Default)]
struct Slot {
    value: Option<KeyOption>,
    waker: Option<Waker>,
}

/// Chooser side of a multi-key click.
#[derive(Debug)]
pub struct KeySelector {
    options: Vec<KeyOption>,
    slot: Rc<RefCell<Slot>>,
}

impl KeySelector {
    #[must_use]
    pub fn options(&self) -> &[KeyOption] {
        &self.options
    }

    /// Resolve the pending key with `options()[index]`.
    ///
    /// Returns the selector back when `index` is out of range.
    pub fn select(self, index: usize) -> Result<(), Self> {
        let Some(choice) = self.options.get(index).cloned() else {
            return Err(self);
        };
        let waker = {
            let mut slot = self.slot.borrow_mut();
            slot.value = Some(choice);
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }

    /// Dismiss the chooser. The pending key never resolves.
    pub fn cancel(self) {}
}

/// Future side of a multi-key click; resolves once with the chosen key.
#[derive(Debug)]
pub struct PendingKey {
    slot: Rc<RefCell<Slot>>,
}

impl Future for PendingKey {
    type Output = KeyOption;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<KeyOption> {
        let mut slot = self.slot.borrow_mut();
        match slot.value.take() {
            Some(choice) => Poll::Ready(choice),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[derive(Debug)]
pub enum ClickResolution {
    Single(KeyOption),
    Choose(KeySelector, PendingKey),
}

/// Decide between a direct key and a chooser. `None` for no options.
#[must_use]
pub fn resolve_click(options: Vec<KeyOption>) -> Option<ClickResolution> {
    match options.len() {
        0 => None,
        1 => options.into_iter().next().map(ClickResolution::Single),
        _ => {
            let slot = Rc::new(RefCell::new(Slot::default()));
            Some(ClickResolution::Choose(
                KeySelector {
                    options,
                    slot: Rc::clone(&slot),
                },
                PendingKey { slot },
            ))
        }
    }
}
