#![forbid(unsafe_code)]

//! JSON arguments and payloads exchanged with JS hosts.

use std::collections::BTreeMap;

use keylens_core::{KeyFilter, NsFallback, ObserverError, WrapProps};
use keylens_observer::KeyOption;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{ key?, ns? }` as passed to `findPositions` and `highlight`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FilterArgs {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default, alias = "namespace")]
    pub ns: Option<NsFallback>,
}

impl From<FilterArgs> for KeyFilter {
    fn from(args: FilterArgs) -> Self {
        KeyFilter::new(args.key.as_deref(), args.ns)
    }
}

fn invalid(err: &serde_json::Error) -> ObserverError {
    ObserverError::InvalidOptions(err.to_string())
}

/// Empty input means "match everything".
pub fn parse_filter(json: &str) -> Result<KeyFilter, ObserverError> {
    if json.trim().is_empty() {
        return Ok(KeyFilter::any());
    }
    serde_json::from_str::<FilterArgs>(json)
        .map(KeyFilter::from)
        .map_err(|err| invalid(&err))
}

pub fn parse_wrap_props(json: &str) -> Result<WrapProps, ObserverError> {
    serde_json::from_str(json).map_err(|err| invalid(&err))
}

/// Flatten a translation table into lookup keys.
///
/// String values at the top level are plain keys. Object values are
/// namespaces: `{"common": {"ok": "OK"}}` yields `common:ok`. Nested
/// objects inside a namespace join their path with `.`.
pub fn parse_translations(json: &str) -> Result<BTreeMap<String, String>, ObserverError> {
    let root: BTreeMap<String, Value> = serde_json::from_str(json).map_err(|err| invalid(&err))?;
    let mut out = BTreeMap::new();
    for (name, value) in root {
        match value {
            Value::String(text) => {
                out.insert(name, text);
            }
            Value::Object(entries) => {
                for (key, value) in entries {
                    flatten_into(&mut out, &name, key, value);
                }
            }
            _ => {}
        }
    }
    Ok(out)
}

fn flatten_into(out: &mut BTreeMap<String, String>, ns: &str, path: String, value: Value) {
    match value {
        Value::String(text) => {
            out.insert(format!("{ns}:{path}"), text);
        }
        Value::Object(entries) => {
            for (key, value) in entries {
                flatten_into(out, ns, format!("{path}.{key}"), value);
            }
        }
        _ => {}
    }
}

#[derive(Serialize)]
struct ClickPayload<'a> {
    options: &'a [KeyOption],
}

/// JSON handed to the host click callback.
pub fn click_payload(options: &[KeyOption]) -> Result<String, ObserverError> {
    serde_json::to_string(&ClickPayload { options }).map_err(|err| invalid(&err))
}
