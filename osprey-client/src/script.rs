//! Scripts for update actions.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// A script, given inline or by the id of a stored script.
///
/// A plain inline script without language or parameters serializes as a bare
/// string; everything else serializes as an object.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    code: String,
    stored: bool,
    lang: Option<String>,
    params: BTreeMap<String, Value>,
}

impl Script {
    /// An inline script.
    pub fn inline(source: impl Into<String>) -> Self {
        Self {
            code: source.into(),
            stored: false,
            lang: None,
            params: BTreeMap::new(),
        }
    }

    /// A reference to a stored script.
    pub fn stored(id: impl Into<String>) -> Self {
        Self {
            stored: true,
            ..Self::inline(id)
        }
    }

    /// Set the script language, e.g. `painless`.
    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Add a parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Replace all parameters.
    pub fn params(mut self, params: BTreeMap<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// The source, or the stored script id.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Whether this refers to a stored script.
    pub fn is_stored(&self) -> bool {
        self.stored
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if !self.stored && self.lang.is_none() && self.params.is_empty() {
            return serializer.serialize_str(&self.code);
        }

        let mut map = serializer.serialize_map(None)?;
        if self.stored {
            map.serialize_entry("id", &self.code)?;
        }
        if let Some(lang) = &self.lang {
            map.serialize_entry("lang", lang)?;
        }
        if !self.params.is_empty() {
            map.serialize_entry("params", &self.params)?;
        }
        if !self.stored {
            map.serialize_entry("source", &self.code)?;
        }
        map.end()
    }
}
