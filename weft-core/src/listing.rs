//! `<listing>` and `<pre>` code blocks: line numbering, explicit
//! `{=mark}` anchors, scraped declarations, bang comments, and the
//! `{ref x}` / `{line x}` reference family that links back to them.
//!
//! Line numbers continue across blocks that share a `file=` attribute,
//! so a source file discussed in pieces numbers straight through.

use crate::attrs;
use crate::context::Context;
use crate::diag::Diagnostics;
use crate::filter::{BlockKind, Filter, KindSet};
use crate::textutil;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

/// A referenceable location: the line it was found on and the label of
/// the listing that contained it.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub line_number: u32,
    pub label: Option<String>,
}

/// Scope names with the brace depth they were opened at. Closing the
/// brace that matches an entry's depth pops it, which reconstructs
/// qualified names like `Outer.Inner.method` without a real parser.
#[derive(Debug, Default)]
struct ScopeStack {
    entries: Vec<(String, i32)>,
}

impl ScopeStack {
    fn push(&mut self, name: &str, level: i32) {
        self.entries.push((name.to_string(), level));
    }

    fn pop_if_at_level(&mut self, level: i32) {
        if self.entries.last().map(|e| e.1) == Some(level) {
            self.entries.pop();
        }
    }

    fn fully_qualify(&self, member: &str) -> String {
        let mut name = self
            .entries
            .iter()
            .map(|e| e.0.as_str())
            .collect::<Vec<_>>()
            .join(".");
        if !member.is_empty() {
            if !name.is_empty() {
                name.push('.');
            }
            name.push_str(member);
        }
        name
    }
}

#[derive(Debug, Default)]
struct FileInfo {
    last_line: u32,
    stack: ScopeStack,
}

/// Cross-block listing state: the symbol table and per-file numbering.
/// Symbols deliberately persist across blocks and files within a run so
/// later prose can reference any earlier listing.
#[derive(Debug, Default)]
pub struct ListingState {
    symbols: BTreeMap<String, Symbol>,
    files: BTreeMap<String, FileInfo>,
    unnamed: FileInfo,
    brace_depth: i32,
}

impl ListingState {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_symbol(
        &mut self,
        line_number: u32,
        prefix: Option<&str>,
        label: Option<&str>,
        name: &str,
    ) -> String {
        let key = match prefix {
            Some(p) if !p.is_empty() => format!("{p}.{name}"),
            _ => name.to_string(),
        };
        self.symbols.insert(
            key.clone(),
            Symbol {
                line_number,
                label: label.map(String::from),
            },
        );
        key
    }

    pub fn symbol(&self, id: &str) -> Option<&Symbol> {
        self.symbols.get(id)
    }
}

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<\s*(listing|pre)\s*([^>]*)>").expect("valid regex"));
static MARK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!?\{=\s*([a-zA-Z0-9_\.\-/:]+)\}!?").expect("valid regex"));
static THREE_STAR_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*\*\*.*?\*/").expect("valid regex"));
static THREE_SLASH_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new("///.*?\n").expect("valid regex"));
static MARKUP_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*<[^>]*>\s*").expect("valid regex"));

const ACCESS: &str = r"(public|private|protected|/\*\s*package\s*\*/)";
const CLASSIFIER: &str = r"(class|interface|enum)";
const IDENT: &str = r"([a-zA-Z_][a-zA-Z0-9_]*)";

// The declared name is always capture group 3.
static MEMBER_DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"{ACCESS}(.*?\s){IDENT}\s*[\(,;=]")).expect("valid regex"));
static CLASS_WITH_ACCESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"{ACCESS}.*?{CLASSIFIER}\s+{IDENT}(\s*\{{)?")).expect("valid regex")
});
static CLASS_WITHOUT_ACCESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(\s*){CLASSIFIER}\s+{IDENT}(\s*\{{)?")).expect("valid regex")
});

pub const DEFAULT_BANG_COMMENT: &str = "(?://+|#+)!";

pub struct ListingFilter {
    bang_comment: OnceCell<Option<Regex>>,
}

impl ListingFilter {
    pub fn new() -> Self {
        Self {
            bang_comment: OnceCell::new(),
        }
    }

    fn bang_comment(&self, ctx: &mut Context) -> Option<&Regex> {
        self.bang_comment
            .get_or_init(|| {
                ctx.config.supply_default("bangComment", DEFAULT_BANG_COMMENT);
                let value = ctx.config.value("bangComment").unwrap_or(DEFAULT_BANG_COMMENT);
                let pattern = format!(r"^(.*?)\s*(?:{value})\s*(.*?)\s*$");
                match Regex::new(&pattern) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        ctx.diags
                            .report(format!("Bad bangComment pattern \"{value}\": {e}"));
                        None
                    }
                }
            })
            .as_ref()
    }
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of bang-comment handling for one line.
struct BangResult {
    line: String,
    /// False when the line held nothing but the comment; such lines
    /// take no vertical space and are not numbered.
    occupies_space: bool,
}

fn do_bang_comments(
    bang: Option<&Regex>,
    line: &str,
    file: Option<&str>,
    diags: &mut Diagnostics,
) -> BangResult {
    let caps = match bang.and_then(|re| re.captures(line)) {
        Some(c) => c,
        None => {
            return BangResult {
                line: format!("{line}\n"),
                occupies_space: true,
            }
        }
    };

    let content = caps[1].to_string();
    let mut suffix = caps[2].to_string();

    if !suffix.is_empty() {
        if !MARKUP_ONLY.replace_all(&suffix, "").is_empty() {
            diags.report(format!(
                "{}: found non-HTML element to right of the bang comment\n\t[{line}]",
                file.unwrap_or("Standard input")
            ));
        }
        suffix = suffix
            .replace('&', "&#38;")
            .replace('<', "&#60;")
            .replace('>', "&#62;");
    }

    if !content.trim().is_empty() {
        return BangResult {
            line: format!("{content}{suffix}\n"),
            occupies_space: true,
        };
    }

    // Comment-only line: the suffix attaches to the next line instead
    // of occupying one of its own.
    BangResult {
        line: suffix.trim().to_string(),
        occupies_space: false,
    }
}

/// Scan one line for a declaration, returning the anchor annotation.
fn mark_declarations(
    state: &mut ListingState,
    file: &mut FileInfo,
    line: &str,
    line_number: u32,
    prefix: Option<&str>,
    label: Option<&str>,
) -> String {
    state.brace_depth += line.matches('{').count() as i32;

    let mut name: Option<String> = None;
    if let Some(caps) = MEMBER_DEFINITION.captures(line) {
        name = Some(file.stack.fully_qualify(&caps[3]));
    } else {
        let caps = CLASS_WITH_ACCESS
            .captures(line)
            .or_else(|| CLASS_WITHOUT_ACCESS.captures(line));
        if let Some(caps) = caps {
            // the declaration's scope is outside its own open brace
            let level = if caps.get(4).is_some() {
                state.brace_depth - 1
            } else {
                state.brace_depth
            };
            file.stack.push(&caps[3], level);
            name = Some(file.stack.fully_qualify(""));
        }
    }

    let mut annotation = String::new();
    if let Some(name) = name {
        state.add_symbol(line_number, prefix, label, &name);
        annotation = format!("<a name=\"{name}\"></a>");
    }

    for _ in line.matches('}') {
        state.brace_depth -= 1;
        file.stack.pop_if_at_level(state.brace_depth);
    }
    annotation
}

impl Filter for ListingFilter {
    fn kinds(&self) -> KindSet {
        KindSet::CODE
    }

    fn filter(
        &self,
        prefix: &str,
        body: &mut String,
        suffix: &str,
        _kind: BlockKind,
        ctx: &mut Context,
    ) {
        let bang = self.bang_comment(ctx).cloned();

        let mut code = body.trim_start_matches('\n').to_string();
        if code.is_empty() {
            ctx.diags.report("Found <pre> or <listing> with no contents!");
        }

        // Comments are rewritten here rather than by macros because
        // removal changes the line count.
        code = textutil::detab(&code, 4);
        code = THREE_STAR_COMMENT.replace_all(&code, "/**...*/").into_owned();
        code = THREE_SLASH_COMMENT.replace_all(&code, "").into_owned();

        let (start_name, arguments) = match TAG.captures(prefix) {
            Some(caps) => (caps[1].to_string(), caps[2].to_string()),
            None => {
                ctx.diags.report(format!(
                    "Internal error. Expected <listing> or <pre>, found {prefix}"
                ));
                return;
            }
        };
        if !suffix.contains(&start_name) {
            ctx.diags.report(format!(
                "Warning: mismatched listing/pre elements:\n\t{prefix}...{suffix}"
            ));
        }
        let is_listing = start_name.starts_with('l');

        let mut attributes = attrs::parse(&arguments, Some("weftPre"));
        let first_line_attr = attributes.get("first-line").cloned();
        let file_attr = attributes.get("file").cloned();
        let prefix_attr = attributes.get("prefix").cloned();
        let title_attr = attributes.get("title").cloned();
        let mut label_attr = attributes.get("label").cloned();
        let passthrough = attrs::remove_and_render_rest(
            &mut attributes,
            &["file", "label", "prefix", "title", "first-line"],
        );

        if label_attr.is_none() {
            if let Some(file) = &file_attr {
                label_attr = Path::new(file)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
            }
        }

        let mut header = String::new();
        if let Some(mut title) = title_attr {
            if title.trim().is_empty() {
                if file_attr.is_some() {
                    // file names render in italics
                    title = format!("<em>{}</em>", label_attr.as_deref().unwrap_or(""));
                } else {
                    ctx.diags.report(format!(
                        "Need a file=\"...\" when title=\"\" (with an empty argument) is specified:\n\t{prefix}...{suffix}"
                    ));
                }
            }
            header.push_str("<listing-title");
            if let Some(label) = &label_attr {
                header.push_str(&format!(" label=\"{label}\""));
            }
            header.push_str(&format!(">{title}</listing-title>\n"));
        }
        header.push_str(&format!(
            "<div class=\"weft{}Group\">\n",
            if is_listing { "Listing" } else { "Pre" }
        ));

        // Per-file numbering continuation. A block with no file= always
        // restarts at 1.
        let state = &mut ctx.listing;
        let mut file = match &file_attr {
            None => {
                state.unnamed.last_line = 0;
                std::mem::take(&mut state.unnamed)
            }
            Some(name) => state.files.remove(name).unwrap_or_default(),
        };

        if let Some(first) = &first_line_attr {
            match first.parse::<u32>() {
                Ok(n) => file.last_line = n.saturating_sub(1),
                Err(_) => ctx
                    .diags
                    .report(format!("Bad first-line=\"{first}\" attribute; expected a number")),
            }
        }

        let mut processed = format!("<pre{passthrough}>\n");
        let mut annotations = String::new();

        for input_line in code.lines() {
            let mut line = input_line.to_string();

            if let Some(caps) = MARK.captures(&line) {
                let key = ctx.listing.add_symbol(
                    file.last_line + 1,
                    prefix_attr.as_deref(),
                    label_attr.as_deref(),
                    &caps[1],
                );
                line = MARK.replace_all(&line, "").into_owned();
                annotations.push_str(&format!("<a name=\"{key}\"></a>"));
            }

            let result = do_bang_comments(bang.as_ref(), &line, file_attr.as_deref(), &mut ctx.diags);
            if result.occupies_space {
                let line_number = file.last_line + 1;
                annotations.push_str(&mark_declarations(
                    &mut ctx.listing,
                    &mut file,
                    &result.line,
                    line_number,
                    prefix_attr.as_deref(),
                    label_attr.as_deref(),
                ));
                file.last_line += 1;
                if is_listing {
                    annotations.push_str(&file.last_line.to_string());
                }
                annotations.push_str("<br>\n");
            }
            processed.push_str(&result.line);
        }
        processed.push_str("</pre>\n");

        match &file_attr {
            None => ctx.listing.unnamed = file,
            Some(name) => {
                ctx.listing.files.insert(name.clone(), file);
            }
        }

        let mut out = header;
        out.push_str(&format!(
            "<div class=\"weftCodeAnnotations\">\n{annotations}</div>\n"
        ));
        out.push_str(&format!("<div class=\"weftCode\">\n{processed}</div>\n"));
        out.push_str("</div>");
        *body = out;
    }
}

static MEMBER_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{((?:[#:]|line|ref|sref)\s*)([a-zA-Z0-9_\.\-/:]+)\s*(.*?)\s*\}")
        .expect("valid regex")
});

fn short_name_in_code_font(identifier: &str, suffix: &str) -> String {
    let visible = identifier
        .rsplit_once('.')
        .map(|(_, tail)| tail)
        .unwrap_or(identifier);
    format!("<code>{visible}{suffix}</code>")
}

/// Expands `{# x}`, `{line x}`, `{: x}`, `{sref x}`, and `{ref x}`
/// against the listing symbol table.
pub struct ListingReferenceFilter;

impl Filter for ListingReferenceFilter {
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
        for caps in MEMBER_REFERENCE.captures_iter(&input) {
            let whole = caps.get(0).expect("group 0 always present");
            let request = caps[1].chars().next().unwrap_or('#');
            let identifier = &caps[2];
            let extra = &caps[3];

            let symbol = match ctx.listing.symbol(identifier) {
                Some(s) => s.clone(),
                None => {
                    ctx.diags.report_at(
                        whole.start(),
                        &input,
                        format!(
                            "Couldn't find a {{= {identifier}}} or class/field/method definition that matches {}.\n\
                             \tIf the listing has prefix=\"myPrefix\", references take the form myPrefix.{identifier}.",
                            whole.as_str()
                        ),
                    );
                    // leave the unresolved reference in place
                    continue;
                }
            };

            out.push_str(&input[last_end..whole.start()]);
            last_end = whole.end();

            let visible = match request {
                '#' => symbol.line_number.to_string(),
                'l' => format!("line {}", symbol.line_number),
                ':' => short_name_in_code_font(identifier, extra),
                's' => format!(
                    "{} (line {})",
                    short_name_in_code_font(identifier, extra),
                    symbol.line_number
                ),
                _ => {
                    // {ref x}: names the listing too, and builds its own
                    // anchor, so no outer wrapping below.
                    let label = match symbol.label.as_deref().filter(|l| !l.is_empty()) {
                        Some(l) => l.to_string(),
                        None => {
                            ctx.diags.report_at(
                                whole.start(),
                                &input,
                                format!(
                                    "When using {{ref {identifier}}}, the surrounding <listing> must have a label= argument"
                                ),
                            );
                            String::from("????")
                        }
                    };
                    out.push_str(&format!(
                        "{}{extra} ({{listing {label}}}, <a href=\"#{identifier}\">line {}</a>)",
                        short_name_in_code_font(identifier, ""),
                        symbol.line_number
                    ));
                    continue;
                }
            };
            out.push_str(&format!("<a href=\"#{identifier}\">{visible}</a>"));
        }
        out.push_str(&input[last_end..]);
        *body = out;
    }
}
