#![forbid(unsafe_code)]

//! Translation key descriptors and the wildcard matching rule.

use serde::{Deserialize, Serialize};

/// One key recovered from (or embedded into) rendered text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyDescriptor {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl KeyDescriptor {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            namespace: None,
            default_value: None,
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, ns: impl Into<NsFallback>) -> Self {
        self.namespace = Some(ns.into().into_list());
        self
    }

    #[must_use]
    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// First namespace, which is the one the key is defined in. Remaining
    /// entries are fallbacks.
    #[must_use]
    pub fn primary_namespace(&self) -> Option<&str> {
        self.namespace
            .as_deref()
            .and_then(|list| list.first())
            .map(String::as_str)
    }
}

/// Namespace argument accepted from hosts: a single name or a fallback list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NsFallback {
    Single(String),
    List(Vec<String>),
}

impl NsFallback {
    #[must_use]
    pub fn into_list(self) -> Vec<String> {
        match self {
            Self::Single(ns) => vec![ns],
            Self::List(list) => list,
        }
    }
}

impl From<&str> for NsFallback {
    fn from(value: &str) -> Self {
        Self::Single(value.to_owned())
    }
}

impl From<String> for NsFallback {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for NsFallback {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<&[&str]> for NsFallback {
    fn from(value: &[&str]) -> Self {
        Self::List(value.iter().map(|s| (*s).to_owned()).collect())
    }
}

/// Normalize an optional namespace argument into an optional list.
#[must_use]
pub fn ns_fallback(ns: Option<NsFallback>) -> Option<Vec<String>> {
    ns.map(NsFallback::into_list)
}

/// Query side of key matching. `None` fields are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyFilter {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub namespace: Option<Vec<String>>,
}

impl KeyFilter {
    /// Filter that matches every key.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            key: None,
            namespace: None,
        }
    }

    #[must_use]
    pub fn new(key: Option<&str>, ns: Option<NsFallback>) -> Self {
        Self {
            key: key.map(str::to_owned),
            namespace: ns_fallback(ns),
        }
    }

    /// Commutative compatibility check.
    ///
    /// Keys match when either side is a wildcard or both are equal.
    /// Namespaces match when either side is a wildcard or the two lists share
    /// at least one entry.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        let key_matches = match (&self.key, &other.key) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        let ns_matches = match (&self.namespace, &other.namespace) {
            (Some(a), Some(b)) => a.iter().any(|ns| b.contains(ns)),
            _ => true,
        };
        key_matches && ns_matches
    }

    #[must_use]
    pub fn matches_descriptor(&self, descriptor: &KeyDescriptor) -> bool {
        self.matches(&KeyFilter::from(descriptor))
    }
}

impl From<&KeyDescriptor> for KeyFilter {
    fn from(descriptor: &KeyDescriptor) -> Self {
        Self {
            key: Some(descriptor.key.clone()),
            namespace: descriptor.namespace.clone(),
        }
    }
}
