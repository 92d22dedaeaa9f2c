//! Section, figure, table, and listing numbering, plus the table of
//! contents and `{section x}`-style cross references.
//!
//! `<h0>`..`<h9>` headings drive a positional section-number vector:
//! entering level N bumps slot N and clears every deeper slot. `<h0>`
//! renders as an unnumbered `<h1>` (front matter). A `chapter=`
//! attribute on `<h0>`/`<h1>` overrides the top-level number, with a
//! single letter switching to letter numbering (appendices).

use crate::attrs::{self, Attrs};
use crate::context::Context;
use crate::element;
use crate::filter::{BlockKind, Filter, KindSet};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct TitleState {
    section_numbers: [u32; 10],
    current_level: usize,
    add_section_numbers: bool,
    /// Verbatim chapter override, e.g. chapter="IV".
    chapter_id: Option<String>,
    /// Top-level slot holds a character code instead of a count.
    use_letters: bool,
    listing_number: u32,
    figure_number: u32,
    table_number: u32,
    contents_target: usize,
    toc: String,
    figures: BTreeMap<String, String>,
    tables: BTreeMap<String, String>,
    listings: BTreeMap<String, String>,
    sections: BTreeMap<String, String>,
}

impl Default for TitleState {
    fn default() -> Self {
        Self {
            section_numbers: [0; 10],
            current_level: 0,
            add_section_numbers: true,
            chapter_id: None,
            use_letters: false,
            listing_number: 0,
            figure_number: 0,
            table_number: 0,
            contents_target: 0,
            toc: String::new(),
            figures: BTreeMap::new(),
            tables: BTreeMap::new(),
            listings: BTreeMap::new(),
            sections: BTreeMap::new(),
        }
    }
}

impl TitleState {
    fn chapter_text(&self) -> String {
        if let Some(id) = &self.chapter_id {
            id.clone()
        } else if self.use_letters {
            char::from_u32(self.section_numbers[1])
                .map(String::from)
                .unwrap_or_default()
        } else {
            self.section_numbers[1].to_string()
        }
    }

    fn assemble_section_number(&self) -> String {
        let mut out = self.chapter_text();
        if self.current_level > 1 {
            out.push('.');
        }
        for level in 2..=self.current_level {
            out.push_str(&self.section_numbers[level].to_string());
            if level != self.current_level {
                out.push('.');
            }
        }
        out
    }

    /// Look up the visible identifier ("Listing 2.1") for a label. The
    /// type name only needs a recognizable first letter.
    pub fn identifier_for_label(&self, label: &str, type_name: &str) -> Option<&str> {
        let table = match type_name.chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('l') => &self.listings,
            Some('f') => &self.figures,
            Some('t') => &self.tables,
            Some('s') => &self.sections,
            _ => return None,
        };
        table.get(label).map(String::as_str)
    }
}

pub struct TitlesFilter;

fn number_heading(titles: &mut TitleState, tag: &str, attributes: &mut Attrs, content: &str) -> String {
    let label = attributes.get("label").cloned();
    let level = tag[1..].parse::<usize>().unwrap_or(1);

    if level <= 1 {
        titles.listing_number = 0;
        titles.figure_number = 0;
        titles.table_number = 0;
        titles.add_section_numbers = level != 0;

        titles.chapter_id = attributes.get("chapter").cloned();
        if let Some(chapter) = titles.chapter_id.take() {
            if let Ok(n) = chapter.parse::<u32>() {
                titles.use_letters = false;
                // bumped back to the requested value just below
                titles.section_numbers[1] = n.saturating_sub(1);
            } else if chapter.len() == 1 && chapter.chars().all(|c| c.is_ascii_alphabetic()) {
                titles.use_letters = true;
                titles.section_numbers[1] = chapter.as_bytes()[0] as u32 - 1;
            } else {
                titles.chapter_id = Some(chapter);
            }
        }
    }

    while titles.current_level > level {
        titles.section_numbers[titles.current_level] = 0;
        titles.current_level -= 1;
    }
    titles.current_level = level;
    titles.section_numbers[level] += 1;

    let toc_attr = attributes.get("toc").cloned();
    let rest = attrs::remove_and_render_rest(attributes, &["chapter", "label", "toc"]);

    let toc_target = match &label {
        Some(l) => l.clone(),
        None => {
            let t = format!("weftContents{}", titles.contents_target);
            titles.contents_target += 1;
            t
        }
    };

    let section_number = titles.assemble_section_number();
    let full_head = if titles.add_section_numbers {
        format!("{section_number}. {content}")
    } else {
        content.to_string()
    };

    if let Some(l) = &label {
        titles
            .sections
            .insert(l.clone(), format!("Section {section_number}"));
    }

    let wants_toc = toc_attr
        .and_then(|t| t.chars().next())
        .map(|c| {
            let c = c.to_ascii_lowercase();
            c != 'f' && c != 'n'
        })
        .unwrap_or(true);
    if wants_toc {
        titles.toc.push_str(&format!(
            "<div class=\"weftTocLev{level}\"><a href=\"#{toc_target}\">{}</a></div>\n",
            full_head.trim()
        ));
    }

    let displayed = level.max(1);
    format!(
        "{open}<h{displayed}{rest}>{full_head}</h{displayed}>{close}",
        open = if wants_toc {
            format!("<a name=\"{toc_target}\">")
        } else {
            String::new()
        },
        close = if wants_toc { "</a>" } else { "" },
    )
}

fn number_block_title(titles: &mut TitleState, tag: &str, attributes: &mut Attrs, content: &str) -> String {
    let label = attributes.get("label").cloned();

    let (number, title_type, class) = match tag {
        "listing-title" => {
            titles.listing_number += 1;
            (titles.listing_number, "Listing ", "weftListingTitle")
        }
        "figure-title" => {
            titles.figure_number += 1;
            (titles.figure_number, "Figure ", "weftFigureTitle")
        }
        _ => {
            titles.table_number += 1;
            (titles.table_number, "Table ", "weftTableTitle")
        }
    };

    let mut identifying = String::from(title_type);
    if titles.add_section_numbers && titles.section_numbers[1] > 0 {
        identifying.push_str(&titles.chapter_text());
        identifying.push('.');
    }
    identifying.push_str(&number.to_string());

    let table = match tag {
        "listing-title" => &mut titles.listings,
        "figure-title" => &mut titles.figures,
        _ => &mut titles.tables,
    };
    if let Some(l) = &label {
        table.insert(l.clone(), identifying.clone());
    }

    format!(
        "<div class=\"{class}\"><a name=\"{anchor}\"><span class=\"weftTitle\">{identifying}.</span> {content}</a></div>",
        anchor = label.as_deref().unwrap_or("")
    )
}

impl Filter for TitlesFilter {
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
        // one combined scan so document order drives both the section
        // vector and the per-chapter figure/table/listing counters
        let step = element::process(
            "h[0-9]|(?:listing|figure|table)-title",
            false,
            None,
            body,
            ctx,
            |ctx, tag, attributes, content, _, _| {
                if tag.starts_with('h') {
                    number_heading(&mut ctx.titles, tag, attributes, content)
                } else {
                    number_block_title(&mut ctx.titles, tag, attributes, content)
                }
            },
        );

        *body = step;
        body.insert_str(0, prefix);
        body.push_str(suffix);
    }
}

/// Replaces `<toc>` with the accumulated table of contents. Must run
/// after every heading has been seen.
pub struct TocFilter;

impl Filter for TocFilter {
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
        let step = element::process(
            "toc",
            false,
            Some("weftToc"),
            body,
            ctx,
            |ctx, _, attributes, content, start, input| {
                let rest = attrs::remove_and_render_rest(attributes, &[]);
                if ctx.titles.toc.is_empty() {
                    ctx.diags
                        .report_at(start, input, "Requested table of contents is empty!");
                    return String::new();
                }
                format!(
                    "<div{rest}>\n<div class=\"weftTocTitle\">{content}</div>\n{}</div>",
                    ctx.titles.toc
                )
            },
        );
        *body = step;
        body.insert_str(0, prefix);
        body.push_str(suffix);
    }
}

static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(listing|figure|table|section|note)(-number)?\s+([^\s]*?)(?:\s+([^\}]+?))?\s*\}")
        .expect("valid regex")
});

static IDENTIFYING_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([Ff]igure|[Tt]able|[Ll]isting|[Ss]ection)\s+").expect("valid regex"));

/// Expands `{listing x}`, `{figure-number x}`, `{note x}` and friends
/// into hot links. Runs over both prose and code so references inside
/// listings work too.
pub struct TitleReferenceFilter;

impl Filter for TitleReferenceFilter {
    fn kinds(&self) -> KindSet {
        KindSet::REF
    }

    fn filter(
        &self,
        prefix: &str,
        body: &mut String,
        suffix: &str,
        _kind: BlockKind,
        ctx: &mut Context,
    ) {
        body.insert_str(0, prefix);
        body.push_str(suffix);

        let input = body.clone();
        let mut out = String::with_capacity(input.len());
        let mut last_end = 0;
        for caps in REFERENCE.captures_iter(&input) {
            let whole = caps.get(0).expect("group 0 always present");
            out.push_str(&input[last_end..whole.start()]);
            last_end = whole.end();

            let ref_type = &caps[1];
            let number_only = caps.get(2).is_some();
            let label = &caps[3];
            let visible = caps.get(4).map(|m| m.as_str());

            let mut target = String::from("????");
            let mut identifying = String::from("????");

            if ref_type == "note" {
                match (
                    ctx.notes.mark_for_label(label),
                    ctx.notes.target_for_label(label),
                ) {
                    (Some(mark), Some(note_target)) => {
                        identifying = match visible {
                            Some(v) => v.to_string(),
                            None if number_only => mark.to_string(),
                            None => format!("Note {mark}"),
                        };
                        target = note_target;
                    }
                    _ => {
                        ctx.diags.report(format!(
                            "Can't find <note label=\"{label}\"> for {{note {label}}}"
                        ));
                    }
                }
            } else {
                let found = match visible {
                    Some(v) if !v.is_empty() => Some(v.to_string()),
                    _ => ctx
                        .titles
                        .identifier_for_label(label, ref_type)
                        .map(String::from),
                };
                match found {
                    Some(text) => {
                        identifying = if number_only {
                            IDENTIFYING_WORD.replace_all(&text, "").into_owned()
                        } else {
                            text
                        };
                        target = label.to_string();
                    }
                    None => {
                        let tag = if ref_type.starts_with('s') {
                            "<hN".to_string()
                        } else {
                            format!("<{ref_type}")
                        };
                        ctx.diags.report(format!(
                            "No {tag} label=\"{label}\"> to match {} (or {{ref...}}). Missing title= in <include>?",
                            whole.as_str()
                        ));
                    }
                }
            }

            out.push_str(&format!("<a href=\"#{target}\">{identifying}</a>"));
        }
        out.push_str(&input[last_end..]);
        *body = out;
    }
}
