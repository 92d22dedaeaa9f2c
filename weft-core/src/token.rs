//! Region classification and the token stream.
//!
//! A document is split into a single ordered, gap-free, non-overlapping
//! sequence of tokens: delimiter tokens recognized by fixed regex scans,
//! plus synthesized `Text` tokens covering everything in between. The
//! stream is a forward-only cursor; passes walk it left to right and
//! never rewind.

use crate::diag::Diagnostics;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, VecDeque};

/// The lexical kind of a token. Declaration order is load-bearing: when
/// two recognizers match at the same offset, the kind declared first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenKind {
    /// One or more consecutive lines starting with a comma.
    PreShorthand,
    PreStart,
    PreEnd,
    ListingStart,
    ListingEnd,
    /// Unescaped `<!=`.
    CommentStart,
    /// Unescaped `=!>`.
    CommentEnd,
    /// A single unescaped, non-doubled backquote.
    Snippet,
    /// Synthesized filler between delimiter tokens.
    Text,
}

impl TokenKind {
    /// Display form used in diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            TokenKind::PreShorthand => ", ...",
            TokenKind::PreStart => "<pre...>",
            TokenKind::PreEnd => "</pre>",
            TokenKind::ListingStart => "<listing...>",
            TokenKind::ListingEnd => "</listing>",
            TokenKind::CommentStart => "<!=",
            TokenKind::CommentEnd => "=!>",
            TokenKind::Snippet => "`",
            TokenKind::Text => "...text...",
        }
    }
}

/// A typed span over the original document. Tokens never hold text; the
/// span indexes into the input the stream was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn lexeme<'a>(&self, input: &'a str) -> &'a str {
        &input[self.start..self.end]
    }
}

static PRE_SHORTHAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([\t ]*,.*\n)+").expect("valid regex"));
static PRE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<pre(?:>|\s[^>]*>)").expect("valid regex"));
static PRE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"</pre\s*>").expect("valid regex"));
static LISTING_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<listing(?:>|\s[^>]*>)").expect("valid regex"));
static LISTING_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"</listing\s*>").expect("valid regex"));
static COMMENT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!=").expect("valid regex"));
static COMMENT_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"=!>").expect("valid regex"));

/// Collect candidates for one regex-driven kind, optionally dropping
/// matches directly preceded by a backslash (the escape convention for
/// comment markers).
fn regex_candidates(kind: TokenKind, re: &Regex, input: &str, escapable: bool) -> Vec<Token> {
    re.find_iter(input)
        .filter(|m| {
            !(escapable && m.start() > 0 && input.as_bytes()[m.start() - 1] == b'\\')
        })
        .map(|m| Token {
            kind,
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

/// A backquote opens or closes a snippet only when it is neither escaped
/// nor part of a doubled pair: it must not be preceded by `\` or another
/// backquote and not followed by one, unless it sits at a line boundary.
fn snippet_candidates(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let mut found = Vec::new();
    for i in 0..bytes.len() {
        if bytes[i] != b'`' {
            continue;
        }
        let prev = if i > 0 { Some(bytes[i - 1]) } else { None };
        let next = bytes.get(i + 1).copied();

        let prev_clean = !matches!(prev, Some(b'`') | Some(b'\\'));
        let next_clean = next != Some(b'`');
        let at_line_start = matches!(prev, None | Some(b'\n'));
        let at_line_end = matches!(next, None | Some(b'\n'));

        if (prev_clean && next_clean) || (at_line_start && next_clean) || (prev_clean && at_line_end)
        {
            found.push(Token {
                kind: TokenKind::Snippet,
                start: i,
                end: i + 1,
            });
        }
    }
    found
}

/// A forward-only cursor over the tokenized document.
#[derive(Debug)]
pub struct TokenStream {
    current: Option<Token>,
    tokens: VecDeque<Token>,
}

impl TokenStream {
    /// Tokenize `input`. The resulting stream always covers the entire
    /// input exactly: sorted by start, no gaps, no overlaps.
    pub fn load(input: &str, diags: &mut Diagnostics) -> Self {
        // First-at-an-offset wins, in kind-declaration order.
        let mut by_start: BTreeMap<usize, Token> = BTreeMap::new();
        let scans = [
            regex_candidates(TokenKind::PreShorthand, &PRE_SHORTHAND, input, false),
            regex_candidates(TokenKind::PreStart, &PRE_START, input, false),
            regex_candidates(TokenKind::PreEnd, &PRE_END, input, false),
            regex_candidates(TokenKind::ListingStart, &LISTING_START, input, false),
            regex_candidates(TokenKind::ListingEnd, &LISTING_END, input, false),
            regex_candidates(TokenKind::CommentStart, &COMMENT_START, input, true),
            regex_candidates(TokenKind::CommentEnd, &COMMENT_END, input, true),
            snippet_candidates(input),
        ];
        for token in scans.into_iter().flatten() {
            by_start.entry(token.start).or_insert(token);
        }

        // A shorthand block is atomic: candidates that start inside one
        // are swallowed as plain block content.
        let mut kept: Vec<Token> = Vec::with_capacity(by_start.len());
        let mut last_was_shorthand = false;
        let mut last_end = 0usize;
        for token in by_start.into_values() {
            if last_was_shorthand && token.start < last_end {
                continue;
            }
            last_was_shorthand = token.kind == TokenKind::PreShorthand;
            last_end = token.end;
            kept.push(token);
        }

        // Any remaining overlap means two delimiter constructs genuinely
        // collide; report it and keep the earlier token.
        let mut resolved: Vec<Token> = Vec::with_capacity(kept.len());
        for token in kept {
            if let Some(prev) = resolved.last() {
                if token.start < prev.end {
                    diags.report_at(
                        token.start,
                        input,
                        format!(
                            "Overlapping {} and {} constructs",
                            prev.kind.label(),
                            token.kind.label()
                        ),
                    );
                    continue;
                }
            }
            resolved.push(token);
        }

        // Fill every gap with a Text token so the stream covers the input.
        let mut tokens: VecDeque<Token> = VecDeque::with_capacity(resolved.len() * 2 + 1);
        let mut cursor = 0usize;
        for token in resolved {
            if cursor < token.start {
                tokens.push_back(Token {
                    kind: TokenKind::Text,
                    start: cursor,
                    end: token.start,
                });
            }
            cursor = token.end;
            tokens.push_back(token);
        }
        if cursor < input.len() || tokens.is_empty() {
            tokens.push_back(Token {
                kind: TokenKind::Text,
                start: cursor,
                end: input.len(),
            });
        }

        let current = tokens.pop_front();
        Self { current, tokens }
    }

    pub fn current(&self) -> Option<Token> {
        self.current
    }

    pub fn at_end(&self) -> bool {
        self.current.is_none()
    }

    /// Move to the next token and return it.
    pub fn advance(&mut self) -> Option<Token> {
        self.current = self.tokens.pop_front();
        self.current
    }

    /// True when the current token is of `kind`; false at end of input.
    pub fn matches(&self, kind: TokenKind) -> bool {
        self.current.map(|t| t.kind == kind).unwrap_or(false)
    }

    /// Advance until a token of `kind` is current. Reports a diagnostic
    /// and returns false when end of input is reached first.
    pub fn skip_to(&mut self, kind: TokenKind, input: &str, diags: &mut Diagnostics) -> bool {
        let search_from = self.current.map(|t| t.start).unwrap_or(input.len());
        while !self.at_end() {
            if self.matches(kind) {
                return true;
            }
            self.advance();
        }
        diags.report_at(
            search_from,
            input,
            format!("Could not find {}", kind.label()),
        );
        false
    }

    /// Starting at an open delimiter, advance to the close delimiter that
    /// matches it, counting nested pairs of the same kind by depth. On
    /// exit the stream is positioned at the matching close token. Reports
    /// a diagnostic and returns false when the input ends first.
    pub fn find_matching_end(
        &mut self,
        end: TokenKind,
        input: &str,
        diags: &mut Diagnostics,
    ) -> bool {
        let begin = match self.current {
            Some(t) => t,
            None => return false,
        };
        tracing::trace!(
            "looking for {} to match {} at {}",
            end.label(),
            begin.kind.label(),
            begin.start
        );

        self.advance();
        let mut depth = 0usize;
        loop {
            let token = match self.current {
                Some(t) => t,
                None => {
                    diags.report_at(
                        begin.start,
                        input,
                        format!(
                            "Couldn't find {} to match {}",
                            end.label(),
                            begin.lexeme(input)
                        ),
                    );
                    return false;
                }
            };
            if token.kind == end {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
            } else if token.kind == begin.kind {
                depth += 1;
            }
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(input: &str) -> (TokenStream, Diagnostics) {
        let mut diags = Diagnostics::new();
        let stream = TokenStream::load(input, &mut diags);
        (stream, diags)
    }

    fn drain(mut stream: TokenStream) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(t) = stream.current() {
            tokens.push(t);
            stream.advance();
        }
        tokens
    }

    /// The concatenated lexemes of the stream always reconstruct the
    /// input exactly.
    fn assert_covers(input: &str) {
        let (stream, diags) = load(input);
        let tokens = drain(stream);
        let mut rebuilt = String::new();
        let mut last_end = 0;
        for t in &tokens {
            assert_eq!(t.start, last_end, "gap or overlap before {:?}", t);
            last_end = t.end;
            rebuilt.push_str(t.lexeme(input));
        }
        assert_eq!(rebuilt, input);
        assert_eq!(diags.error_count(), 0, "{}", diags.render());
    }

    #[test]
    fn coverage_is_exact() {
        assert_covers("");
        assert_covers("plain text only");
        assert_covers("a<pre>b</pre>c");
        assert_covers("t0<pre>c0</pre>t1<listing>c1</listing>t2 `c2` t3");
        assert_covers("x<!= hidden =!>y");
        assert_covers(",one\n,two\nafter");
        assert_covers("<listing file=\"f\">\ncode\n</listing>");
    }

    #[test]
    fn empty_input_is_one_text_token() {
        let (stream, _) = load("");
        let tokens = drain(stream);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Text);
    }

    #[test]
    fn pre_tag_with_attributes_is_one_token() {
        let (stream, _) = load("<pre class=\"x\">body</pre>");
        let tokens = drain(stream);
        assert_eq!(tokens[0].kind, TokenKind::PreStart);
        assert_eq!(tokens[0].end, "<pre class=\"x\">".len());
    }

    #[test]
    fn prefix_words_are_not_pre_tags() {
        let (stream, _) = load("<prefix>x</prefix>");
        let tokens = drain(stream);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Text));
    }

    #[test]
    fn escaped_backquote_is_not_a_snippet_delimiter() {
        let (stream, _) = load(r"a \` b");
        let tokens = drain(stream);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Text));
    }

    #[test]
    fn doubled_backquotes_are_literal() {
        let (stream, _) = load("a `` b");
        let tokens = drain(stream);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Text));
    }

    #[test]
    fn single_backquotes_delimit_snippets() {
        let (stream, _) = load("a `x` b");
        let tokens = drain(stream);
        let snippets: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Snippet)
            .collect();
        assert_eq!(snippets.len(), 2);
    }

    #[test]
    fn backquote_at_line_boundary_counts() {
        let (stream, _) = load("`x`\n");
        let tokens = drain(stream);
        assert_eq!(tokens[0].kind, TokenKind::Snippet);
    }

    #[test]
    fn escaped_comment_markers_are_text() {
        let (stream, _) = load(r"a \<!= b \=!> c");
        let tokens = drain(stream);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Text));
    }

    #[test]
    fn shorthand_block_swallows_contained_tokens() {
        // the backquote inside the comma block must not become a token
        let (stream, _) = load(",code `tick` line\nafter");
        let tokens = drain(stream);
        assert_eq!(tokens[0].kind, TokenKind::PreShorthand);
        assert_eq!(tokens[1].kind, TokenKind::Text);
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn genuine_overlap_is_reported() {
        // a backquote inside a <pre> start tag overlaps the tag token
        let mut diags = Diagnostics::new();
        let stream = TokenStream::load("<pre class=\"a`b\">x</pre>", &mut diags);
        drain(stream);
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn skip_to_reports_when_missing() {
        let (mut stream, mut diags) = load("plain");
        assert!(!stream.skip_to(TokenKind::Snippet, "plain", &mut diags));
        assert_eq!(diags.error_count(), 1);
        assert!(diags.messages()[0].contains("Could not find `"));
    }

    #[test]
    fn matching_end_handles_nesting_depth() {
        let input = "<pre>.<pre>x</pre>.</pre>";
        let (mut stream, mut diags) = load(input);
        assert!(stream.matches(TokenKind::PreStart));
        assert!(stream.find_matching_end(TokenKind::PreEnd, input, &mut diags));
        let close = stream.current().unwrap();
        assert_eq!(close.kind, TokenKind::PreEnd);
        // the Nth close, not the first
        assert_eq!(close.start, input.rfind("</pre>").unwrap());
        assert_eq!(diags.error_count(), 0);
    }

    #[test]
    fn two_levels_of_comment_nesting_match_the_last_close() {
        let input = "x<!= a <!= b =!> =!>y";
        let (mut stream, mut diags) = load(input);
        stream.advance(); // past leading text
        assert!(stream.matches(TokenKind::CommentStart));
        assert!(stream.find_matching_end(TokenKind::CommentEnd, input, &mut diags));
        assert_eq!(stream.current().unwrap().start, input.rfind("=!>").unwrap());
    }

    #[test]
    fn unmatched_open_reports_and_fails() {
        let input = "<listing>\nnever closed";
        let (mut stream, mut diags) = load(input);
        assert!(!stream.find_matching_end(TokenKind::ListingEnd, input, &mut diags));
        assert_eq!(diags.error_count(), 1);
        assert!(diags.messages()[0].contains("Couldn't find </listing>"));
    }
}
