//! Document-supplied configuration.
//!
//! A `<config>` element holds `key = value` lines in properties style.
//! The element is removed from the document; the bindings become
//! available to later passes through [`ConfigStore`].

use crate::context::Context;
use crate::element;
use crate::filter::{BlockKind, Filter, KindSet};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct ConfigStore {
    values: BTreeMap<String, String>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Bind `key` to `value` only if the document didn't set it.
    pub fn supply_default(&mut self, key: &str, value: &str) {
        self.values
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    /// Parse properties-style lines: `key = value`, `key: value`, or a
    /// bare key bound to the empty string. `#` and `!` lines are
    /// comments. Malformed input has no failure mode; a line is either
    /// a comment, blank, or a binding.
    pub fn load_properties(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let split = line.find(|c| c == '=' || c == ':');
            let (key, value) = match split {
                Some(at) => (line[..at].trim_end(), line[at + 1..].trim_start()),
                None => (line, ""),
            };
            self.set(key, value);
        }
    }
}

/// Strips `<config>` elements out of prose and loads their bindings.
pub struct ConfigFilter;

impl Filter for ConfigFilter {
    fn kinds(&self) -> KindSet {
        KindSet::TEXT
    }

    fn filter(
        &self,
        prefix: &str,
        body: &mut String,
        suffix: &str,
        _kind: BlockKind,
        ctx: &mut Context,
    ) {
        let rebuilt = element::process("config", true, None, body, ctx, |ctx, _, _, content, _, _| {
            ctx.config.load_properties(content);
            String::new()
        });
        *body = rebuilt;
        body.insert_str(0, prefix);
        body.push_str(suffix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_parsing() {
        let mut store = ConfigStore::new();
        store.load_properties("a = 1\nb:two\nbare\n# comment\n\n! also comment\n");
        assert_eq!(store.value("a"), Some("1"));
        assert_eq!(store.value("b"), Some("two"));
        assert_eq!(store.value("bare"), Some(""));
        assert_eq!(store.value("comment"), None);
    }

    #[test]
    fn defaults_do_not_clobber_document_values() {
        let mut store = ConfigStore::new();
        store.set("k", "doc");
        store.supply_default("k", "dflt");
        store.supply_default("other", "dflt");
        assert_eq!(store.value("k"), Some("doc"));
        assert_eq!(store.value("other"), Some("dflt"));
    }

    #[test]
    fn config_elements_are_removed_and_loaded() {
        let mut ctx = Context::new();
        let mut body = String::from("before \n <config>\nx = 9\n</config>after");
        ConfigFilter.filter("", &mut body, "", BlockKind::Text, &mut ctx);
        assert_eq!(body, "beforeafter");
        assert_eq!(ctx.config.value("x"), Some("9"));
    }
}
