//! The grab-bag of prose elements: `<head>`, `<note>`, `<endnotes>`,
//! `<index-entry>`, `<index>`, and `<block>`. Nesting any of these
//! inside one another is unsupported.

use crate::attrs;
use crate::context::Context;
use crate::element;
use crate::filter::{BlockKind, Filter, KindSet};

pub struct TagsFilter;

impl Filter for TagsFilter {
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
        // <head> contents are deferred; they get spliced into the real
        // document head when the wrapper assembles the final output.
        let step = element::process("head", false, None, body, ctx, |ctx, _, _, content, _, _| {
            ctx.head_additions.push_str(content);
            String::new()
        });

        let step = element::process(
            "note",
            true,
            Some("weftNote"),
            &step,
            ctx,
            |ctx, _, attributes, content, start, input| {
                let mark = match attributes.get("mark") {
                    Some(m) => {
                        // an explicit numeric mark restarts the count there
                        if let Ok(n) = m.parse::<usize>() {
                            ctx.note_number = n;
                        }
                        m.clone()
                    }
                    None => {
                        ctx.note_number += 1;
                        ctx.note_number.to_string()
                    }
                };
                let note_prefix = attributes.get("prefix").cloned().unwrap_or_default();
                let note_suffix = attributes.get("suffix").cloned().unwrap_or_default();
                let label = attributes.get("label").cloned();
                let rest = attrs::remove_and_render_rest(
                    attributes,
                    &["mark", "label", "suffix", "prefix"],
                );

                match ctx.notes.add(&mark, content, label.as_deref()) {
                    Some(reference) => {
                        format!("<span{rest}>{note_prefix}{reference}{note_suffix}</span>")
                    }
                    None => {
                        ctx.diags.report_at(
                            start,
                            input,
                            format!("Mark specified in <note mark='{mark}'> has already been used."),
                        );
                        String::from("????")
                    }
                }
            },
        );

        // must run after <note> so every queued note is present
        let step = element::process(
            "end[Nn]otes",
            false,
            Some("weftNotes"),
            &step,
            ctx,
            |ctx, _, attributes, content, start, input| {
                let clear = attributes.contains_key("clear");
                let rest = attrs::remove_and_render_rest(attributes, &["clear"]);

                let mut block = format!("<div{rest}>\n{content}");
                if ctx.notes.is_empty() {
                    ctx.diags.report_at(start, input, "No notes to print!");
                } else {
                    block.push_str(&ctx.notes.render_blocks());
                }
                block.push_str("</div>");

                if clear {
                    ctx.notes.clear();
                    ctx.note_number = 0;
                }
                block
            },
        );

        let step = element::process(
            "index-entry",
            true,
            None,
            &step,
            ctx,
            |ctx, _, attributes, content, start, input| match attributes.get("topic") {
                Some(topic) if !topic.trim().is_empty() => {
                    ctx.index.anchor_for_topic(topic, content)
                }
                _ => {
                    ctx.diags
                        .report_at(start, input, "Missing topic name for index entry.");
                    String::new()
                }
            },
        );

        let step = element::process(
            "index",
            false,
            Some("weftIndex"),
            &step,
            ctx,
            |ctx, _, attributes, content, start, input| {
                if ctx.index.is_empty() {
                    ctx.diags.report_at(start, input, "Requested index is empty!");
                    return String::new();
                }
                let rest = attrs::remove_and_render_rest(attributes, &[]);
                ctx.index.render(content, &rest)
            },
        );

        let step = element::process(
            "block",
            false,
            Some("weftBlock"),
            &step,
            ctx,
            |_, _, attributes, content, _, _| {
                let rest = attrs::remove_and_render_rest(attributes, &[]);
                format!(
                    "<blockquote{rest}>\n{}<br>\n</blockquote>",
                    content.trim().replace('\n', "<br>\n")
                )
            },
        );

        *body = step;
        body.insert_str(0, prefix);
        body.push_str(suffix);
    }
}

/// Splice accumulated `<head>` additions into a real head element.
/// Used on the head template, not on document text.
pub fn append_additions_to_head(text_with_head: &str, ctx: &mut Context) -> String {
    let additions = ctx.head_additions.clone();
    element::process("head", false, None, text_with_head, ctx, |_, _, attributes, content, _, _| {
        let rest = attrs::remove_and_render_rest(attributes, &[]);
        format!("<head{rest}>{content}{additions}</head>")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ctx: &mut Context, body: &str) -> String {
        let mut b = body.to_string();
        TagsFilter.filter("", &mut b, "", BlockKind::Text, ctx);
        b
    }

    #[test]
    fn head_contents_are_deferred() {
        let mut ctx = Context::new();
        let out = run(&mut ctx, "a<head><style>x</style></head>b");
        assert_eq!(out, "ab");
        assert_eq!(ctx.head_additions, "<style>x</style>");

        let wrapped = append_additions_to_head("<head><title>t</title></head>", &mut ctx);
        assert_eq!(wrapped, "<head><title>t</title><style>x</style></head>");
    }

    #[test]
    fn notes_get_sequential_marks_and_a_span() {
        let mut ctx = Context::new();
        let out = run(&mut ctx, "one <note>first</note> two <note>second</note>");
        assert!(out.contains("<span class=\"weftNote\">"));
        assert!(out.contains(">1</a>"));
        assert!(out.contains(">2</a>"));
        // leading space before each note is stripped
        assert!(out.contains("one<span"));
        assert_eq!(ctx.notes.len(), 2);
    }

    #[test]
    fn explicit_numeric_mark_restarts_the_count() {
        let mut ctx = Context::new();
        let out = run(&mut ctx, "<note mark=\"7\">a</note>x<note>b</note>");
        assert!(out.contains(">7</a>"));
        assert!(out.contains(">8</a>"));
    }

    #[test]
    fn duplicate_mark_reports_and_substitutes_placeholder() {
        let mut ctx = Context::new();
        let out = run(&mut ctx, "<note mark=\"*\">a</note>x<note mark=\"*\">b</note>");
        assert!(out.ends_with("????"));
        assert_eq!(ctx.diags.error_count(), 1);
    }

    #[test]
    fn endnotes_emit_queued_notes_and_clear_on_request() {
        let mut ctx = Context::new();
        let out = run(
            &mut ctx,
            "<note>body one</note><endnotes clear=\"yes\">Notes:</endnotes>",
        );
        assert!(out.contains("<div class=\"weftNotes\">\nNotes:"));
        assert!(out.contains("body one"));
        assert!(ctx.notes.is_empty());
        assert_eq!(ctx.note_number, 0);
    }

    #[test]
    fn endnotes_with_nothing_queued_is_an_error() {
        let mut ctx = Context::new();
        run(&mut ctx, "<endNotes></endNotes>");
        assert_eq!(ctx.diags.error_count(), 1);
        assert!(ctx.diags.messages()[0].contains("No notes"));
    }

    #[test]
    fn index_entries_and_index_render() {
        let mut ctx = Context::new();
        let out = run(
            &mut ctx,
            "cats here <index-entry topic=\"cats\"></index-entry>\n<index>The Index</index>",
        );
        assert!(out.contains("<a name=\"weftIndex-1-1\"></a>"));
        assert!(out.contains("<div class=\"weftIndex\">\nThe Index"));
        assert!(out.contains("weftTopicLocation"));
    }

    #[test]
    fn index_entry_without_topic_is_an_error() {
        let mut ctx = Context::new();
        run(&mut ctx, "<index-entry></index-entry>");
        assert_eq!(ctx.diags.error_count(), 1);
    }

    #[test]
    fn index_without_entries_reports_and_is_removed() {
        let mut ctx = Context::new();
        let out = run(&mut ctx, "<index>The Index</index>");
        assert_eq!(out, "");
        assert_eq!(ctx.diags.error_count(), 1);
        assert!(ctx.diags.messages()[0].contains("empty"));
    }

    #[test]
    fn block_becomes_a_blockquote_with_line_breaks() {
        let mut ctx = Context::new();
        let out = run(&mut ctx, "<block>line one\nline two</block>");
        assert_eq!(
            out,
            "<blockquote class=\"weftBlock\">\nline one<br>\nline two<br>\n</blockquote>"
        );
    }

    #[test]
    fn blockquote_elements_are_left_alone() {
        let mut ctx = Context::new();
        let out = run(&mut ctx, "<blockquote>q</blockquote>");
        assert_eq!(out, "<blockquote>q</blockquote>");
    }
}
