//! Attribute-list parsing for element start tags.
//!
//! Attributes take the `name="value"` form; single quotes work too, and the
//! parser does not care whether the open and close quote match. Names are
//! letters and dashes only.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([a-zA-Z-]+)\s*=\s*["']([^"']*)["']"#).expect("valid regex"));

/// Parsed attributes, sorted by name so rendered output is deterministic.
pub type Attrs = BTreeMap<String, String>;

/// Extract every `name="value"` pair from `argument_list`. If the result
/// has no `class` attribute and `default_class` is a non-empty string,
/// one is added with that value.
pub fn parse(argument_list: &str, default_class: Option<&str>) -> Attrs {
    let mut attrs = Attrs::new();
    for caps in ATTR.captures_iter(argument_list) {
        attrs.insert(caps[1].to_string(), caps[2].to_string());
    }
    if let Some(class) = default_class {
        if !class.is_empty() && !attrs.contains_key("class") {
            attrs.insert("class".to_string(), class.to_string());
        }
    }
    attrs
}

/// Remove the named attributes and render whatever is left as a
/// ` key="value"` list (leading space included, empty when no attributes
/// remain). Used to pass author-supplied attributes through to output tags.
pub fn remove_and_render_rest(attrs: &mut Attrs, remove: &[&str]) -> String {
    for key in remove {
        attrs.remove(*key);
    }
    let mut rendered = String::new();
    for (key, value) in attrs.iter() {
        rendered.push_str(&format!(" {}=\"{}\"", key, value));
    }
    rendered
}
