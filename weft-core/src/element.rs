//! Generic handling of `<name attr="v">body</name>` element pairs.
//!
//! Most built-in filters recognize one element apiece; this module
//! factors out the match-and-replace machinery. The element name is
//! given as a (non-capturing) regex alternation so related spellings
//! like `include|import` share a handler.

use crate::attrs::{self, Attrs};
use crate::context::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Mutex;

static CACHE: Lazy<Mutex<BTreeMap<String, Regex>>> = Lazy::new(|| Mutex::new(BTreeMap::new()));

fn element_regex(name_pattern: &str, strip_leading_space: bool) -> Regex {
    let key = format!("{}/{}", strip_leading_space as u8, name_pattern);
    let mut cache = CACHE.lock().unwrap_or_else(|e| e.into_inner());
    cache
        .entry(key)
        .or_insert_with(|| {
            let lead = if strip_leading_space { r"\s*" } else { "" };
            let pattern = format!(
                r#"(?sm){lead}<\s*({name_pattern})((?:\s*[a-zA-Z_-]+\s*=\s*["'][^"']*["'])*)\s*>(.*?)<\s*/({name_pattern})\s*>"#
            );
            Regex::new(&pattern).expect("element name patterns are static and valid")
        })
        .clone()
}

/// Replace every `<name ...>body</name>` element in `input` with the
/// handler's output. The handler receives the matched tag name, the
/// parsed attributes (seeded with `default_class` when no class is
/// given), the raw body, and the match's start offset for diagnostics.
/// Mismatched open and close tag names are reported and left alone.
pub fn process<F>(
    name_pattern: &str,
    strip_leading_space: bool,
    default_class: Option<&str>,
    input: &str,
    ctx: &mut Context,
    mut handler: F,
) -> String
where
    F: FnMut(&mut Context, &str, &mut Attrs, &str, usize, &str) -> String,
{
    let re = element_regex(name_pattern, strip_leading_space);
    let mut out = String::with_capacity(input.len());
    let mut last_end = 0;
    for caps in re.captures_iter(input) {
        let whole = caps.get(0).expect("group 0 always present");
        let open_name = &caps[1];
        let close_name = &caps[4];
        out.push_str(&input[last_end..whole.start()]);
        last_end = whole.end();

        if open_name != close_name {
            ctx.diags.report_at(
                whole.start(),
                input,
                format!("<{open_name}> closed by </{close_name}>"),
            );
            out.push_str(whole.as_str());
            continue;
        }
        let mut attributes = attrs::parse(&caps[2], default_class);
        let replacement = handler(
            ctx,
            open_name,
            &mut attributes,
            &caps[3],
            whole.start(),
            input,
        );
        out.push_str(&replacement);
    }
    out.push_str(&input[last_end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_element_with_handler_output() {
        let mut ctx = Context::new();
        let out = process("box", false, Some("dflt"), "a<box>inner</box>b", &mut ctx, |_, tag, attrs, body, _, _| {
            assert_eq!(tag, "box");
            assert_eq!(attrs.get("class").map(String::as_str), Some("dflt"));
            format!("[{body}]")
        });
        assert_eq!(out, "a[inner]b");
    }

    #[test]
    fn explicit_class_overrides_default() {
        let mut ctx = Context::new();
        let out = process(
            "box",
            false,
            Some("dflt"),
            r#"<box class="mine">x</box>"#,
            &mut ctx,
            |_, _, attrs, _, _, _| attrs.get("class").cloned().unwrap_or_default(),
        );
        assert_eq!(out, "mine");
    }

    #[test]
    fn leading_space_stripping_is_opt_in() {
        let mut ctx = Context::new();
        let keep = process("e", false, None, "a \n <e>x</e>", &mut ctx, |_, _, _, _, _, _| "R".into());
        assert_eq!(keep, "a \n R");
        let strip = process("e", true, None, "a \n <e>x</e>", &mut ctx, |_, _, _, _, _, _| "R".into());
        assert_eq!(strip, "aR");
    }

    #[test]
    fn alternation_matches_both_spellings() {
        let mut ctx = Context::new();
        let out = process(
            "one|two",
            false,
            None,
            "<one>a</one> <two>b</two>",
            &mut ctx,
            |_, tag, _, body, _, _| format!("{tag}:{body}"),
        );
        assert_eq!(out, "one:a two:b");
    }

    #[test]
    fn mismatched_close_tag_is_reported_and_kept() {
        let mut ctx = Context::new();
        let out = process(
            "one|two",
            false,
            None,
            "<one>a</two>",
            &mut ctx,
            |_, _, _, _, _, _| "R".into(),
        );
        assert_eq!(out, "<one>a</two>");
        assert_eq!(ctx.diags.error_count(), 1);
    }
}
