//! `<include ...>` and `<import ...>` directives. Both splice a file
//! into the document; `include` additionally wraps the content in a
//! `<listing>` (or `<pre>` when numbering is off) so it renders as
//! code. `from=`/`to=` slice the file by pattern-bounded lines.

use crate::attrs;
use crate::context::Context;
use crate::filter::{BlockKind, Filter, KindSet};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::fs;

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<\s*(include|import)\s+[^>]*>\s*").expect("valid regex"));

const MAX_DEPTH: usize = 32;

fn expand_home(path: &str) -> String {
    match std::env::var("HOME") {
        Ok(home) => path.replace('~', &home),
        Err(_) => path.to_string(),
    }
}

fn is_true(value: &str) -> bool {
    value
        .chars()
        .next()
        .map(|c| c.to_ascii_lowercase() == 't')
        .unwrap_or(false)
}

/// Drop everything before the line containing the first match.
fn slice_from(content: &str, pattern: &Regex, remove_mark: bool, raw: &str) -> Option<String> {
    let found = pattern.find(content)?;
    let line_start = content[..found.start()].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let mut sliced = content[line_start..].to_string();
    if remove_mark {
        if let Ok(marker) = Regex::new(&format!(r"[ \t]*(?:{raw})([ \t]*\n)?")) {
            sliced = marker.replace(&sliced, "").into_owned();
        }
    }
    Some(sliced)
}

/// Drop everything after the line containing the first match.
fn slice_to(content: &str, pattern: &Regex, remove_mark: bool, raw: &str) -> Option<String> {
    let found = pattern.find(content)?;
    let line_end = content[found.end()..]
        .find('\n')
        .map(|i| found.end() + i + 1)
        .unwrap_or(content.len());
    let mut sliced = content[..line_end].to_string();
    if remove_mark {
        if let Ok(marker) = Regex::new(&format!(r"[ \t]*(?:{raw})([ \t]*\n)?")) {
            sliced = marker.replace(&sliced, "").into_owned();
        }
    }
    Some(sliced)
}

pub struct IncludeFilter;

impl IncludeFilter {
    fn expand(&self, input: &str, depth: usize, ctx: &mut Context) -> String {
        let mut out = String::with_capacity(input.len());
        let mut last_end = 0;

        for caps in TAG.captures_iter(input) {
            let whole = caps.get(0).expect("group 0 always present");
            out.push_str(&input[last_end..whole.start()]);
            last_end = whole.end();

            if depth >= MAX_DEPTH {
                ctx.diags.report_at(
                    whole.start(),
                    input,
                    format!("Includes nested too deeply at {}", whole.as_str().trim_end()),
                );
                continue;
            }

            let is_include = &caps[1] == "include";
            let mut arguments = attrs::parse(whole.as_str(), None);

            let file_name = match (arguments.get("src"), arguments.get("href")) {
                (Some(src), _) => Some(expand_home(src)),
                (None, Some(href)) => {
                    let href = expand_home(href);
                    match href.strip_prefix("file://") {
                        Some(path) => Some(path.to_string()),
                        None => {
                            ctx.diags.report_at(
                                whole.start(),
                                input,
                                format!("Only file:// URLs are supported in href=\"{href}\""),
                            );
                            None
                        }
                    }
                }
                (None, None) => {
                    ctx.diags.report_at(
                        whole.start(),
                        input,
                        "No filename specified in href or src.",
                    );
                    None
                }
            };

            let file_name = match file_name {
                Some(f) if !f.is_empty() => f,
                _ => continue,
            };

            let mut content = match fs::read_to_string(&file_name) {
                Ok(c) => c,
                Err(e) => {
                    ctx.diags.report_at(
                        whole.start(),
                        input,
                        format!("Error in {}:\n\t{e}", whole.as_str().trim_end()),
                    );
                    continue;
                }
            };

            let remove_mark = arguments.get("remove-mark").map(|v| is_true(v)).unwrap_or(false);
            let numbers = arguments
                .get("numbers")
                .or_else(|| arguments.get("line-numbers"))
                .map(|v| is_true(v))
                .unwrap_or(true);

            type Slicer = fn(&str, &Regex, bool, &str) -> Option<String>;
            let slicers: [(&str, Slicer); 2] = [("from", slice_from), ("to", slice_to)];
            for (key, slice) in slicers {
                if let Some(raw) = arguments.get(key).cloned() {
                    match RegexBuilder::new(&raw).multi_line(true).build() {
                        Ok(pattern) => match slice(&content, &pattern, remove_mark, &raw) {
                            Some(sliced) => content = sliced,
                            None => ctx.diags.report_at(
                                whole.start(),
                                input,
                                format!("Can't find match for {key}=\"{raw}\""),
                            ),
                        },
                        Err(e) => ctx.diags.report_at(
                            whole.start(),
                            input,
                            format!("Malformed {key}='{raw}' argument: {e}"),
                        ),
                    }
                }
            }

            if is_include {
                arguments.insert("file".to_string(), file_name);
                // the generated element picks its own class from the
                // numbering mode, so no implicit class= here
                let passthrough = attrs::remove_and_render_rest(
                    &mut arguments,
                    &["src", "href", "from", "to", "remove-mark", "numbers", "line-numbers"],
                );
                let element = if numbers { "listing" } else { "pre" };
                content = format!("<{element}{passthrough}>\n{content}</{element}>\n");
            }

            out.push_str(&self.expand(&content, depth + 1, ctx));
        }
        out.push_str(&input[last_end..]);
        out
    }
}

impl Filter for IncludeFilter {
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
        *body = self.expand(body, 0, ctx);
        body.insert_str(0, prefix);
        body.push_str(suffix);
    }
}
