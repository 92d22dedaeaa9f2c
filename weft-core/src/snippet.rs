//! Inline code snippets: `` `like this` ``.
//!
//! The body is entity-encoded so later passes cannot mistake its
//! contents for markup, then wrapped in `<nobr><code>...</code></nobr>`.
//! The backquote delimiters are consumed, not reattached.

use crate::context::Context;
use crate::filter::{BlockKind, Filter, KindSet};
use crate::textutil;

pub struct SnippetFilter;

impl Filter for SnippetFilter {
    fn kinds(&self) -> KindSet {
        KindSet::SNIPPET
    }

    fn filter(
        &self,
        _prefix: &str,
        body: &mut String,
        _suffix: &str,
        _kind: BlockKind,
        _ctx: &mut Context,
    ) {
        // The throwaway leading space turns a leading tab into three
        // spaces after detabbing instead of a full tab stop.
        let padded = format!(" {body}");
        let detabbed = textutil::detab(&padded, 4);
        let unescaped = detabbed[1..].replace("\\`", "`");

        let mut encoded = String::with_capacity(unescaped.len() * 3);
        encoded.push_str("<nobr><code>");
        for c in unescaped.chars() {
            if c.is_ascii_alphanumeric() {
                encoded.push(c);
            } else if c == ' ' {
                encoded.push_str("&nbsp;");
            } else {
                encoded.push_str(&format!("&#{};", c as u32));
            }
        }
        encoded.push_str("</code></nobr>");
        *body = encoded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(body: &str) -> String {
        let mut ctx = Context::new();
        let mut b = body.to_string();
        SnippetFilter.filter("`", &mut b, "`", BlockKind::Snippet, &mut ctx);
        b
    }

    #[test]
    fn plain_word_is_wrapped_verbatim() {
        assert_eq!(run("x"), "<nobr><code>x</code></nobr>");
    }

    #[test]
    fn markup_characters_become_entities() {
        assert_eq!(
            run("a<b>"),
            "<nobr><code>a&#60;b&#62;</code></nobr>"
        );
    }

    #[test]
    fn spaces_become_nbsp() {
        assert_eq!(run("a b"), "<nobr><code>a&nbsp;b</code></nobr>");
    }

    #[test]
    fn escaped_backquote_is_unescaped_then_encoded() {
        assert_eq!(run(r"\`"), "<nobr><code>&#96;</code></nobr>");
    }

    #[test]
    fn leading_tab_becomes_three_spaces() {
        assert_eq!(
            run("\tx"),
            "<nobr><code>&nbsp;&nbsp;&nbsp;x</code></nobr>"
        );
    }
}
