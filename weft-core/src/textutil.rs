//! Small text manipulations shared by several filters.

/// Expand tabs to spaces using fixed tab stops of `width` columns.
/// The column counter resets at every newline.
pub fn detab(input: &str, width: usize) -> String {
    let mut out = String::with_capacity(input.len());
    let mut column = 0usize;
    for c in input.chars() {
        match c {
            '\t' => {
                let pad = width - (column % width);
                for _ in 0..pad {
                    out.push(' ');
                }
                column += pad;
            }
            '\n' => {
                out.push('\n');
                column = 0;
            }
            other => {
                out.push(other);
                column += 1;
            }
        }
    }
    out
}

/// Join lines ending in a backslash with the following line.
///
/// Whitespace before the backslash and leading whitespace on the following
/// line are discarded, so `"a \"` + `"  b"` joins to `"ab"`.
pub fn merge_continuation_lines(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending = String::new();
    for line in input.lines() {
        let joined = if pending.is_empty() {
            line.to_string()
        } else {
            let mut j = std::mem::take(&mut pending);
            j.push_str(line.trim_start());
            j
        };

        let trimmed = joined.trim_end();
        if let Some(stripped) = trimmed.strip_suffix('\\') {
            pending = stripped.trim_end().to_string();
        } else {
            out.push_str(&joined);
            out.push('\n');
        }
    }
    if !pending.is_empty() {
        // final line ended in a continuation with nothing to join
        out.push_str(&pending);
        out.push('\n');
    }
    out
}
