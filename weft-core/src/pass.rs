//! One transformation pass over the document.
//!
//! A pass owns an ordered list of filters, partitioned by the block
//! kinds they declare. `process` tokenizes the document, hands each
//! region to the matching filter list, and on success replaces the
//! document with the concatenated results. On failure the document is
//! left exactly as it was.

use crate::context::Context;
use crate::filter::{BlockKind, DefaultFilter, Filter, KindSet};
use crate::token::{TokenKind, TokenStream};
use once_cell::sync::Lazy;
use regex::Regex;

static DEFAULT_TEXT: DefaultFilter = DefaultFilter::new(KindSet::TEXT);
static DEFAULT_CODE: DefaultFilter = DefaultFilter::new(KindSet::CODE);
static DEFAULT_SNIPPET: DefaultFilter = DefaultFilter::new(KindSet::SNIPPET);

/// Strips the comma markers off shorthand code-block lines.
static SHORTHAND_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*,\t?").expect("valid regex"));

pub struct Pass<'a> {
    text: Vec<&'a dyn Filter>,
    code: Vec<&'a dyn Filter>,
    snippet: Vec<&'a dyn Filter>,
}

impl<'a> Pass<'a> {
    /// Partition `filters` by capability. A filter declaring no kinds is
    /// a programming error. Kinds with no filter get the identity.
    pub fn new(filters: &[&'a dyn Filter]) -> Self {
        let mut text: Vec<&dyn Filter> = Vec::new();
        let mut code: Vec<&dyn Filter> = Vec::new();
        let mut snippet: Vec<&dyn Filter> = Vec::new();
        for &f in filters {
            let kinds = f.kinds();
            assert!(!kinds.is_empty(), "filter must declare at least one block kind");
            if kinds.contains(BlockKind::Text) || kinds.contains(BlockKind::Ref) {
                text.push(f);
            }
            if kinds.contains(BlockKind::Code) || kinds.contains(BlockKind::Ref) {
                code.push(f);
            }
            if kinds.contains(BlockKind::Snippet) {
                snippet.push(f);
            }
        }
        if text.is_empty() {
            text.push(&DEFAULT_TEXT);
        }
        if code.is_empty() {
            code.push(&DEFAULT_CODE);
        }
        if snippet.is_empty() {
            snippet.push(&DEFAULT_SNIPPET);
        }
        Self { text, code, snippet }
    }

    /// Run the filters over the evolving body. The first filter is the
    /// one that folds the delimiters in; later filters in the same pass
    /// see the cumulative result and get empty delimiters.
    fn run(
        filters: &[&dyn Filter],
        prefix: &str,
        body: &mut String,
        suffix: &str,
        kind: BlockKind,
        ctx: &mut Context,
    ) {
        let mut first = true;
        for f in filters {
            if first {
                f.filter(prefix, body, suffix, kind, ctx);
                first = false;
            } else {
                f.filter("", body, "", kind, ctx);
            }
        }
    }

    /// Transform `doc` in place. Returns false, leaving `doc` untouched,
    /// when a structural error makes the rest of the pipeline unsafe.
    pub fn process(&self, doc: &mut String, ctx: &mut Context) -> bool {
        let input = doc.clone();
        let mut stream = TokenStream::load(&input, &mut ctx.diags);
        let mut out = String::with_capacity(input.len());

        while let Some(token) = stream.current() {
            match token.kind {
                TokenKind::Text => {
                    let mut body = token.lexeme(&input).to_string();
                    Self::run(&self.text, "", &mut body, "", BlockKind::Text, ctx);
                    out.push_str(&body);
                    stream.advance();
                }

                TokenKind::CommentStart => {
                    if !stream.find_matching_end(TokenKind::CommentEnd, &input, &mut ctx.diags) {
                        return false;
                    }
                    stream.advance();
                }

                TokenKind::Snippet => {
                    let open = token;
                    stream.advance();
                    if !stream.skip_to(TokenKind::Snippet, &input, &mut ctx.diags) {
                        return false;
                    }
                    let close = match stream.current() {
                        Some(t) => t,
                        None => return false,
                    };
                    let mut body = input[open.end..close.start].to_string();
                    if body.contains('\n') {
                        ctx.diags.report_at(
                            open.start,
                            &input,
                            "Code snippets (`code`) must be on a single line; use <pre> for multiline code",
                        );
                        return false;
                    }
                    Self::run(&self.snippet, "`", &mut body, "`", BlockKind::Snippet, ctx);
                    out.push_str(&body);
                    stream.advance();
                }

                TokenKind::PreShorthand => {
                    // The added newline lets one pattern strip every
                    // comma marker, including the first line's.
                    let prefixed = format!("\n{}", token.lexeme(&input));
                    let mut body = SHORTHAND_COMMA.replace_all(&prefixed, "\n").into_owned();
                    Self::run(&self.code, "<pre>", &mut body, "</pre>", BlockKind::Code, ctx);
                    out.push_str(&body);
                    stream.advance();
                }

                TokenKind::PreStart | TokenKind::ListingStart => {
                    let end_kind = if token.kind == TokenKind::PreStart {
                        TokenKind::PreEnd
                    } else {
                        TokenKind::ListingEnd
                    };
                    let open = token;
                    if !stream.find_matching_end(end_kind, &input, &mut ctx.diags) {
                        return false;
                    }
                    let close = match stream.current() {
                        Some(t) => t,
                        None => return false,
                    };
                    let mut body = input[open.end..close.start].to_string();
                    Self::run(
                        &self.code,
                        open.lexeme(&input),
                        &mut body,
                        close.lexeme(&input),
                        BlockKind::Code,
                        ctx,
                    );
                    out.push_str(&body);
                    stream.advance();
                }

                TokenKind::PreEnd | TokenKind::ListingEnd | TokenKind::CommentEnd => {
                    ctx.diags.report_at(
                        token.start,
                        &input,
                        format!("Found {} without matching start element", token.kind.label()),
                    );
                    stream.advance();
                }
            }
        }

        *doc = out;
        true
    }
}
