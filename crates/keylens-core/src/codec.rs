#![forbid(unsafe_code)]

//! Invisible key codec.
//!
//! Key metadata is appended to rendered text as a run of zero-width
//! characters, so the text displays and lays out exactly like the original.
//!
//! Wire format of one message:
//! - payload bytes (UTF-8), each written as 9 characters: 8 data bits, most
//!   significant first, followed by a continuation bit;
//! - continuation bit `1` means another byte of the same message follows,
//!   `0` marks the last byte;
//! - bit `0` is U+200C (ZWNJ), bit `1` is U+200D (ZWJ).
//!
//! Messages are self-delimiting, so wrapped strings can be concatenated
//! (`wrap(a) + wrap(b)`) and still decode to both keys in order.
//!
//! Decoding never fails. Only maximal runs of at least 9 zero-width characters
//! count as markers; shorter runs stay in the text (emoji joiners). Inside a
//! run, messages are tried at every offset, so joiners that belong to the
//! text on either side of a marker do not shift the framing. Characters of a
//! run outside every decoded message go back to the text when there are
//! fewer than 9 of them. Otherwise they are a damaged marker (truncated,
//! unterminated, invalid UTF-8, unparseable payload) and are dropped.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::{KeyDescriptor, NsFallback};

/// The two zero-width characters used as bit `0` and bit `1`.
pub const INVISIBLE_CHARACTERS: [char; 2] = ['\u{200C}', '\u{200D}'];

/// Characters per encoded byte: 8 data bits plus the continuation bit.
const GROUP_LEN: usize = 9;

/// Text with markers removed plus the keys they carried, left to right.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unwrapped {
    pub text: String,
    pub keys: Vec<KeyDescriptor>,
}

/// Host-facing arguments for [`InvisibleWrapper::wrap`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrapProps {
    pub key: String,
    #[serde(default, alias = "ns")]
    pub namespace: Option<NsFallback>,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
}

impl WrapProps {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }

    #[must_use]
    pub fn namespace(mut self, ns: impl Into<NsFallback>) -> Self {
        self.namespace = Some(ns.into());
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

#[derive(Serialize, Deserialize)]
struct FullPayload {
    #[serde(rename = "k")]
    key: String,
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    namespace: Option<Vec<String>>,
    #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
    default_value: Option<String>,
}

/// Encoder/decoder for invisible key markers.
///
/// In full-key mode the marker carries the whole descriptor as compact JSON.
/// Otherwise it carries an index into this wrapper's message table, which
/// keeps markers short but only decodes through the same wrapper.
#[derive(Debug, Clone, Default)]
pub struct InvisibleWrapper {
    full_key_encode: bool,
    messages: Vec<KeyDescriptor>,
    message_index: HashMap<KeyDescriptor, usize>,
}

impl InvisibleWrapper {
    #[must_use]
    pub fn new(full_key_encode: bool) -> Self {
        Self {
            full_key_encode,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn full_key_encode(&self) -> bool {
        self.full_key_encode
    }

    /// Append the marker for one key to the translation.
    pub fn wrap(&mut self, props: WrapProps) -> String {
        let descriptor = KeyDescriptor {
            key: props.key,
            namespace: props.namespace.map(NsFallback::into_list),
            default_value: props.default_value,
        };
        let text = props.translation.unwrap_or_default();
        self.wrap_keys(&text, std::slice::from_ref(&descriptor))
    }

    /// Append one marker per descriptor, in order.
    pub fn wrap_keys(&mut self, text: &str, keys: &[KeyDescriptor]) -> String {
        let mut out = String::with_capacity(text.len() + keys.len() * 16 * GROUP_LEN * 3);
        out.push_str(text);
        for descriptor in keys {
            let payload = self.payload_for(descriptor);
            encode_message(payload.as_bytes(), &mut out);
        }
        out
    }

    /// Recover keys and plain text. `None` when the text carries no marker.
    #[must_use]
    pub fn unwrap(&self, text: &str) -> Option<Unwrapped> {
        scan(text, |payload| self.decode_payload(payload))
    }

    /// Whether `text` contains at least one marker run.
    #[must_use]
    pub fn has_marker(text: &str) -> bool {
        let mut run = 0usize;
        for ch in text.chars() {
            if is_invisible(ch) {
                run += 1;
                if run >= GROUP_LEN {
                    return true;
                }
            } else {
                run = 0;
            }
        }
        false
    }

    fn payload_for(&mut self, descriptor: &KeyDescriptor) -> String {
        if self.full_key_encode {
            let payload = FullPayload {
                key: descriptor.key.clone(),
                namespace: descriptor.namespace.clone(),
                default_value: descriptor.default_value.clone(),
            };
            // Serializing a struct of strings cannot fail.
            return serde_json::to_string(&payload).unwrap_or_default();
        }
        let index = match self.message_index.get(descriptor) {
            Some(&index) => index,
            None => {
                let index = self.messages.len();
                self.messages.push(descriptor.clone());
                self.message_index.insert(descriptor.clone(), index);
                index
            }
        };
        index.to_string()
    }

    fn decode_payload(&self, bytes: &[u8]) -> Option<KeyDescriptor> {
        let payload = std::str::from_utf8(bytes).ok()?;
        if self.full_key_encode {
            let parsed: FullPayload = serde_json::from_str(payload).ok()?;
            return Some(KeyDescriptor {
                key: parsed.key,
                namespace: parsed.namespace,
                default_value: parsed.default_value,
            });
        }
        let index: usize = payload.parse().ok()?;
        self.messages.get(index).cloned()
    }
}

const fn is_invisible(ch: char) -> bool {
    matches!(ch, '\u{200C}' | '\u{200D}')
}

fn encode_message(payload: &[u8], out: &mut String) {
    let last = payload.len().saturating_sub(1);
    for (i, byte) in payload.iter().enumerate() {
        for shift in (0..8).rev() {
            out.push(INVISIBLE_CHARACTERS[usize::from((byte >> shift) & 1)]);
        }
        out.push(INVISIBLE_CHARACTERS[usize::from(i != last)]);
    }
}

fn scan(text: &str, decode: impl Fn(&[u8]) -> Option<KeyDescriptor>) -> Option<Unwrapped> {
    if !InvisibleWrapper::has_marker(text) {
        return None;
    }
    let mut out = Unwrapped {
        text: String::with_capacity(text.len()),
        keys: Vec::new(),
    };
    let mut run: Vec<u8> = Vec::new();
    for ch in text.chars() {
        if is_invisible(ch) {
            run.push(u8::from(ch == INVISIBLE_CHARACTERS[1]));
        } else {
            flush_run(&mut run, &mut out, &decode);
            out.text.push(ch);
        }
    }
    flush_run(&mut run, &mut out, &decode);
    Some(out)
}

/// One message starting at `start`: complete groups up to the first one
/// whose continuation bit is clear. Returns the payload and the end offset.
fn read_message(run: &[u8], start: usize) -> Option<(Vec<u8>, usize)> {
    let mut payload = Vec::new();
    for (i, group) in run[start..].chunks_exact(GROUP_LEN).enumerate() {
        payload.push(group[..8].iter().fold(0u8, |acc, &bit| (acc << 1) | bit));
        if group[8] == 0 {
            return Some((payload, start + (i + 1) * GROUP_LEN));
        }
    }
    None
}

fn push_bits(text: &mut String, bits: &[u8]) {
    text.extend(bits.iter().map(|&bit| INVISIBLE_CHARACTERS[usize::from(bit)]));
}

/// Split one zero-width run into messages and leftover characters.
///
/// Picks the framing that leaves the fewest characters undecoded. On ties
/// the leftover goes as early as possible, since joiners ending the text
/// before a marker are the common case.
fn flush_run(
    run: &mut Vec<u8>,
    out: &mut Unwrapped,
    decode: &impl Fn(&[u8]) -> Option<KeyDescriptor>,
) {
    if run.len() < GROUP_LEN {
        push_bits(&mut out.text, run);
        run.clear();
        return;
    }
    let len = run.len();
    let mut messages: Vec<Option<(KeyDescriptor, usize)>> = (0..len)
        .map(|pos| {
            let (payload, end) = read_message(run, pos)?;
            decode(&payload).map(|descriptor| (descriptor, end))
        })
        .collect();
    // undecoded[pos]: fewest characters of run[pos..] outside any message.
    let mut undecoded = vec![0usize; len + 1];
    for pos in (0..len).rev() {
        let skip = undecoded[pos + 1] + 1;
        undecoded[pos] = match &messages[pos] {
            Some((_, end)) => skip.min(undecoded[*end]),
            None => skip,
        };
    }
    let mut leftover = Vec::new();
    let mut pos = 0;
    while pos < len {
        if undecoded[pos + 1] + 1 > undecoded[pos]
            && let Some((descriptor, end)) = messages[pos].take()
        {
            out.keys.push(descriptor);
            pos = end;
        } else {
            leftover.push(run[pos]);
            pos += 1;
        }
    }
    if leftover.len() < GROUP_LEN {
        push_bits(&mut out.text, &leftover);
    } else {
        tracing::trace!(
            target: "keylens::codec",
            len = leftover.len(),
            "dropped damaged marker"
        );
    }
    run.clear();
}
