//! User-definable regex replacement macros.
//!
//! A definition line reads `kind: /pattern/replacement/FLAGS` where
//! `kind:` is one of `code:`, `text:`, or `ref:` (text when omitted),
//! the delimiter is whatever character follows the kind, and `FLAGS`
//! is a `|`-separated list of modifier names. `#` starts a comment
//! (`\#` for a literal hash); a trailing `\` continues the definition
//! on the next line. Replacements may use `$1`-style group references
//! and `%(...)` date variables expanded at application time.

use crate::context::Context;
use crate::diag::Diagnostics;
use crate::element;
use crate::filter::{BlockKind, Filter, KindSet};
use crate::textutil;
use chrono::{Datelike, Local, Timelike};
use once_cell::sync::Lazy;
use regex::{Captures, Regex, RegexBuilder};
use thiserror::Error;

/// Which document regions a macro applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    Text,
    Code,
    Ref,
}

#[derive(Debug, Error)]
enum DefinitionError {
    #[error("badly formed macro definition: {0}")]
    Malformed(String),
    #[error("bad pattern in macro definition: {0}")]
    BadPattern(String),
}

/// One compiled macro.
#[derive(Debug, Clone)]
pub struct Macro {
    pattern: Regex,
    replacement: String,
}

static DATE_VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\\?)%\((timestamp|[mM]onth|[dD]ay|year|hr|min|sec)\)").expect("valid regex")
});

/// Comment to end of line: a `#` at the start, or `##` anywhere.
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"((^#)|(##)).*").expect("valid regex"));

fn expand_date_variables(replacement: &str) -> String {
    let now = Local::now();
    DATE_VARIABLE
        .replace_all(replacement, |caps: &Captures| {
            if &caps[1] == "\\" {
                // escaped; keep the text as written
                return caps[0].to_string();
            }
            match &caps[2] {
                "timestamp" => now.format("%a %b %e %H:%M:%S %Y").to_string(),
                "month" => now.month().to_string(),
                "Month" => now.format("%B").to_string(),
                "day" => now.day().to_string(),
                "Day" => now.format("%A").to_string(),
                "year" => now.year().to_string(),
                "hr" => now.hour().to_string(),
                "min" => now.minute().to_string(),
                "sec" => now.second().to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

impl Macro {
    pub fn apply(&self, input: &str) -> String {
        let replacement = expand_date_variables(&self.replacement);
        self.pattern
            .replace_all(input, replacement.as_str())
            .into_owned()
    }
}

fn unescape_replacement(raw: &str) -> String {
    raw.replace("\\t", "\t")
        .replace("\\b", "\u{8}")
        .replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\f", "\u{c}")
}

fn compile(
    pattern: &str,
    replacement: &str,
    flags: Option<&str>,
    diags: &mut Diagnostics,
) -> Result<Macro, DefinitionError> {
    let mut builder_source = pattern.to_string();
    let mut case_insensitive = false;
    let mut multi_line = false;
    let mut dot_all = false;
    let mut comments = false;

    if let Some(flags) = flags {
        for flag in flags.split('|').map(str::trim).filter(|f| !f.is_empty()) {
            match flag {
                "CASE_INSENSITIVE" => case_insensitive = true,
                "MULTILINE" => multi_line = true,
                "DOTALL" => dot_all = true,
                "COMMENTS" => comments = true,
                "LITERAL" => builder_source = regex::escape(pattern),
                // line-terminator and equivalence tweaks with no effect here
                "UNIX_LINES" | "UNICODE_CASE" | "CANON_EQ" => {}
                other => {
                    diags.report(format!(
                        "Ignoring illegal modifier {other} in macro definition"
                    ));
                }
            }
        }
    }

    let pattern = RegexBuilder::new(&builder_source)
        .case_insensitive(case_insensitive)
        .multi_line(multi_line)
        .dot_matches_new_line(dot_all)
        .ignore_whitespace(comments)
        .build()
        .map_err(|_| DefinitionError::BadPattern(builder_source.clone()))?;

    Ok(Macro {
        pattern,
        replacement: unescape_replacement(replacement),
    })
}

fn parse_line(line: &str, diags: &mut Diagnostics) -> Result<Option<(MacroKind, Macro)>, DefinitionError> {
    let stripped = COMMENT.replace(line, "").replace("\\#", "#");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        return Ok(None);
    }

    let (kind, definition) = if let Some(rest) = stripped.strip_prefix("code:") {
        (MacroKind::Code, rest.trim())
    } else if let Some(rest) = stripped.strip_prefix("text:") {
        (MacroKind::Text, rest.trim())
    } else if let Some(rest) = stripped.strip_prefix("ref:") {
        (MacroKind::Ref, rest.trim())
    } else {
        (MacroKind::Text, stripped)
    };

    let delimiter = match definition.chars().next() {
        Some(c) => c,
        None => return Err(DefinitionError::Malformed(line.to_string())),
    };

    let mut chunks: Vec<&str> = definition.split(delimiter).collect();
    // the deletion form needs a closing delimiter, otherwise any bare
    // word would load as a macro with its first letter as the delimiter
    let closed = chunks.last() == Some(&"");
    while chunks.last() == Some(&"") && chunks.len() > 2 {
        chunks.pop();
    }

    let compiled = match chunks.as_slice() {
        ["", pattern, replacement, flags] => compile(pattern, replacement, Some(flags), diags)?,
        ["", pattern, replacement] => compile(pattern, replacement, None, diags)?,
        ["", pattern] if closed => compile(pattern, "", None, diags)?,
        _ => return Err(DefinitionError::Malformed(line.to_string())),
    };
    Ok(Some((kind, compiled)))
}

/// The three ordered macro lists. Application order within a list is
/// definition order; definitions loaded "at head" run before everything
/// already present.
#[derive(Debug, Default)]
pub struct MacroSet {
    text: Vec<Macro>,
    code: Vec<Macro>,
    refs: Vec<Macro>,
}

/// Built-in code macros: entity-escape markup characters inside code
/// regions so code displays literally. The ampersand must go first.
const BUILT_IN: &str = "\
code: /&/&#38;/
code: /</&#60;/
code: />/&#62;/
";

impl MacroSet {
    /// An empty set plus the built-in code-escape macros.
    pub fn with_built_ins(diags: &mut Diagnostics) -> Self {
        let mut set = Self::default();
        set.load(BUILT_IN, diags);
        set
    }

    fn list_mut(&mut self, kind: MacroKind) -> &mut Vec<Macro> {
        match kind {
            MacroKind::Text => &mut self.text,
            MacroKind::Code => &mut self.code,
            MacroKind::Ref => &mut self.refs,
        }
    }

    pub fn for_kind(&self, kind: MacroKind) -> &[Macro] {
        match kind {
            MacroKind::Text => &self.text,
            MacroKind::Code => &self.code,
            MacroKind::Ref => &self.refs,
        }
    }

    fn parse(source: &str, diags: &mut Diagnostics) -> Self {
        let mut set = Self::default();
        let merged = textutil::merge_continuation_lines(source);
        for (index, line) in merged.lines().enumerate() {
            match parse_line(line, diags) {
                Ok(Some((kind, m))) => set.list_mut(kind).push(m),
                Ok(None) => {}
                Err(e) => diags.report(format!("line {}: {e}", index + 1)),
            }
        }
        set
    }

    /// Append definitions after everything already loaded.
    pub fn load(&mut self, source: &str, diags: &mut Diagnostics) {
        let new = Self::parse(source, diags);
        self.text.extend(new.text);
        self.code.extend(new.code);
        self.refs.extend(new.refs);
    }

    /// Insert definitions ahead of everything already loaded, keeping
    /// their own relative order. Document-embedded macros use this so
    /// they run before file-supplied and built-in ones.
    pub fn load_at_head(&mut self, source: &str, diags: &mut Diagnostics) {
        let new = Self::parse(source, diags);
        self.text.splice(0..0, new.text);
        self.code.splice(0..0, new.code);
        self.refs.splice(0..0, new.refs);
    }

    pub fn apply(&self, kind: MacroKind, body: &mut String) {
        for m in self.for_kind(kind) {
            *body = m.apply(body);
        }
    }
}

/// Applies text macros to prose; also where `<macro>` definition
/// elements are collected and removed from the document.
pub struct TextMacroFilter;

impl Filter for TextMacroFilter {
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
        let rebuilt = element::process("macro", true, None, body, ctx, |ctx, _, _, content, _, _| {
            let Context { macros, diags, .. } = ctx;
            macros.load_at_head(content, diags);
            String::new()
        });
        *body = rebuilt;
        ctx.macros.apply(MacroKind::Text, body);
        body.insert_str(0, prefix);
        body.push_str(suffix);
    }
}

/// Applies code macros inside code regions.
pub struct CodeMacroFilter;

impl Filter for CodeMacroFilter {
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
        ctx.macros.apply(MacroKind::Code, body);
        body.insert_str(0, prefix);
        body.push_str(suffix);
    }
}

/// Applies ref macros everywhere, late in the pipeline.
pub struct RefMacroFilter;

impl Filter for RefMacroFilter {
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
        ctx.macros.apply(MacroKind::Ref, body);
        body.insert_str(0, prefix);
        body.push_str(suffix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(source: &str) -> (MacroSet, Diagnostics) {
        let mut diags = Diagnostics::new();
        let mut set = MacroSet::default();
        set.load(source, &mut diags);
        (set, diags)
    }

    #[test]
    fn simple_text_macro_applies() {
        let (set, diags) = load("/cat/dog/");
        assert_eq!(diags.error_count(), 0);
        let mut body = String::from("a cat sat");
        set.apply(MacroKind::Text, &mut body);
        assert_eq!(body, "a dog sat");
    }

    #[test]
    fn kind_prefix_routes_to_the_right_list() {
        let (set, _) = load("code: /x/y/\nref: /a/b/\n/p/q/");
        assert_eq!(set.for_kind(MacroKind::Code).len(), 1);
        assert_eq!(set.for_kind(MacroKind::Ref).len(), 1);
        assert_eq!(set.for_kind(MacroKind::Text).len(), 1);
    }

    #[test]
    fn two_chunk_form_deletes_matches() {
        let (set, _) = load("/gone/");
        let mut body = String::from("a gone b");
        set.apply(MacroKind::Text, &mut body);
        assert_eq!(body, "a  b");
    }

    #[test]
    fn continuation_lines_join_into_one_definition() {
        let (set, diags) = load("/x \\\n  /y \\\n z/MULTILINE");
        assert_eq!(diags.error_count(), 0, "{}", diags.render());
        assert_eq!(set.for_kind(MacroKind::Text).len(), 1);
        let mut body = String::from("x");
        set.apply(MacroKind::Text, &mut body);
        assert_eq!(body, "yz");
    }

    #[test]
    fn group_references_substitute() {
        let (set, _) = load("/(a+)b/[$1]/");
        let mut body = String::from("aab");
        set.apply(MacroKind::Text, &mut body);
        assert_eq!(body, "[aa]");
    }

    #[test]
    fn flags_are_honored() {
        let (set, _) = load("/^x$/y/MULTILINE\n/CAT/dog/CASE_INSENSITIVE");
        let mut body = String::from("x\ncat");
        set.apply(MacroKind::Text, &mut body);
        assert_eq!(body, "y\ndog");
    }

    #[test]
    fn literal_flag_escapes_metacharacters() {
        let (set, _) = load("/a.b/X/LITERAL");
        let mut body = String::from("a.b aXb");
        set.apply(MacroKind::Text, &mut body);
        assert_eq!(body, "X aXb");
    }

    #[test]
    fn unknown_flag_is_reported_but_macro_still_loads() {
        let (set, diags) = load("/a/b/BOGUS");
        assert_eq!(diags.error_count(), 1);
        assert!(diags.messages()[0].contains("illegal modifier"));
        assert_eq!(set.for_kind(MacroKind::Text).len(), 1);
    }

    #[test]
    fn bad_definitions_are_skipped_with_a_line_number() {
        let (set, diags) = load("/good/g/\nbroken\n/also/fine/");
        assert_eq!(diags.error_count(), 1);
        assert!(diags.messages()[0].contains("line 2"));
        assert_eq!(set.for_kind(MacroKind::Text).len(), 2);
    }

    #[test]
    fn bare_word_is_not_a_deletion_macro() {
        // "broken" must not load with 'b' as its delimiter and start
        // deleting "roken" from prose
        let (set, diags) = load("broken");
        assert_eq!(diags.error_count(), 1);
        assert!(set.for_kind(MacroKind::Text).is_empty());
        let mut body = String::from("a broken b");
        set.apply(MacroKind::Text, &mut body);
        assert_eq!(body, "a broken b");
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let (set, diags) = load("# whole-line comment\n\n/a/b/ ## trailing\n");
        assert_eq!(diags.error_count(), 0);
        assert_eq!(set.for_kind(MacroKind::Text).len(), 1);
    }

    #[test]
    fn escaped_hash_is_a_literal() {
        let (set, _) = load(r"/a/\#/");
        let mut body = String::from("a");
        set.apply(MacroKind::Text, &mut body);
        assert_eq!(body, "#");
    }

    #[test]
    fn head_loaded_macros_run_first() {
        let mut diags = Diagnostics::new();
        let mut set = MacroSet::default();
        set.load("/a/b/", &mut diags);
        set.load_at_head("/a/c/", &mut diags);
        let mut body = String::from("a");
        set.apply(MacroKind::Text, &mut body);
        // the head macro consumes the match before the older one sees it
        assert_eq!(body, "c");
    }

    #[test]
    fn built_ins_escape_code_markup() {
        let mut diags = Diagnostics::new();
        let set = MacroSet::with_built_ins(&mut diags);
        let mut body = String::from("<pre>x</pre> & y");
        set.apply(MacroKind::Code, &mut body);
        assert_eq!(body, "&#60;pre&#62;x&#60;/pre&#62; &#38; y");
    }

    #[test]
    fn escaped_date_variable_stays_literal() {
        let (set, _) = load(r"/a/\%(year)/");
        let mut body = String::from("a");
        set.apply(MacroKind::Text, &mut body);
        assert_eq!(body, r"\%(year)");
    }

    #[test]
    fn year_variable_expands_to_digits() {
        let (set, _) = load("/a/%(year)/");
        let mut body = String::from("a");
        set.apply(MacroKind::Text, &mut body);
        assert_eq!(body.len(), 4);
        assert!(body.chars().all(|c| c.is_ascii_digit()));
    }
}
