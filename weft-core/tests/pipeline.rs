//! End-to-end runs of the full pass sequence.

use weft_core::Pipeline;

fn expand(input: &str) -> (String, usize) {
    let mut doc = input.to_string();
    let mut pipeline = Pipeline::new();
    let errors = pipeline.expand(&mut doc);
    (doc, errors)
}

#[test]
fn plain_text_passes_through_unchanged() {
    let (out, errors) = expand("hello world\n");
    assert_eq!(out, "hello world\n");
    assert_eq!(errors, 0);
}

#[test]
fn snippets_render_as_inline_code() {
    let (out, errors) = expand("before `x` after\n");
    assert_eq!(errors, 0);
    assert!(out.contains("<nobr><code>x</code></nobr>"));
    assert!(out.starts_with("before "));
    assert!(out.ends_with(" after\n"));
}

#[test]
fn nested_pre_is_swallowed_and_entity_escaped() {
    let (out, errors) = expand("<pre>.<pre>x</pre>.</pre>\n");
    assert_eq!(errors, 0);
    // one generated code block, the inner pair reduced to escaped text
    assert!(out.contains("<pre class=\"weftPre\">"));
    assert!(out.contains("&#60;pre&#62;x&#60;/pre&#62;"));
    assert!(!out.contains("<pre>x</pre>"));
}

#[test]
fn nested_comments_are_fully_elided() {
    let (out, errors) = expand("x<!= a <!= b =!> =!>y");
    assert_eq!(errors, 0);
    assert_eq!(out, "xy");
}

#[test]
fn listing_numbers_continue_across_blocks_sharing_a_file() {
    let (out, errors) = expand(
        "<listing file=\"F.java\">\nA\nB\nC\n</listing>\n\
         <listing file=\"F.java\">\nD\nE\n</listing>\n",
    );
    assert_eq!(errors, 0);
    assert!(out.contains("1<br>\n2<br>\n3<br>"));
    assert!(out.contains("4<br>\n5<br>"));
    assert!(!out.contains("6<br>"));
}

#[test]
fn listing_without_a_file_restarts_numbering() {
    let (out, errors) = expand(
        "<listing>\nA\nB\n</listing>\n<listing>\nC\n</listing>\n",
    );
    assert_eq!(errors, 0);
    assert!(out.contains("1<br>\n2<br>"));
    assert!(!out.contains("3<br>"));
}

#[test]
fn unmatched_listing_reports_and_leaves_the_document_alone() {
    let input = "a\n<listing>\nx\n";
    let (out, errors) = expand(input);
    // the unmatched delimiter is reported once, not re-reported by the
    // trailing entity-unmap pass
    assert_eq!(errors, 1);
    assert_eq!(out, input);
}

#[test]
fn inline_macro_definitions_apply_to_following_text() {
    let (out, errors) = expand("<macro>\n/weekday/Tuesday/\n</macro>\nevery weekday\n");
    assert_eq!(errors, 0);
    assert!(out.contains("every Tuesday"));
    assert!(!out.contains("<macro>"));
}

#[test]
fn macros_never_touch_code_blocks() {
    let (out, errors) = expand(
        "<macro>\n/marker/CHANGED/\n</macro>\nmarker\n<pre>\nmarker\n</pre>\n",
    );
    assert_eq!(errors, 0);
    assert!(out.contains("CHANGED"));
    // the copy inside the code block survives
    assert!(out.contains("marker"));
}

#[test]
fn headings_are_numbered_and_listed_in_the_toc() {
    let (out, errors) = expand("<toc></toc>\n<h1>Intro</h1>\n<h2>Detail</h2>\n");
    assert_eq!(errors, 0);
    assert!(out.contains("1. Intro"));
    assert!(out.contains("1.1. Detail"));
    assert!(out.contains("class=\"weftToc\""));
    assert!(out.contains("weftContents0"));
}

#[test]
fn listing_titles_number_and_cross_reference() {
    let (out, errors) = expand(
        "<listing file=\"F.java\" title=\"Example\" label=\"ex\">\nA\n</listing>\n\
         See {listing ex}.\n",
    );
    assert_eq!(errors, 0);
    assert!(out.contains("Listing 1"));
    assert!(out.contains("href=\"#ex\""));
}

#[test]
fn notes_collect_into_the_end_notes_block() {
    let (out, errors) = expand(
        "Fact.<note>source</note>\n<endNotes></endNotes>\n",
    );
    assert_eq!(errors, 0);
    assert!(out.contains("weftRef-1"));
    assert!(out.contains("weftNote1"));
    assert!(out.contains("source"));
}

#[test]
fn shorthand_comma_blocks_become_code() {
    let (out, errors) = expand("intro\n,\tint x;\n,\tint y;\nafter\n");
    assert_eq!(errors, 0);
    assert!(out.contains("<pre class=\"weftPre\">"));
    assert!(out.contains("int x;"));
    assert!(out.contains("int y;"));
}

#[test]
fn entity_unmapping_restores_escaped_text_outside_code() {
    let (out, errors) = expand("a &#60;b&#62; c\n");
    assert_eq!(errors, 0);
    assert_eq!(out, "a <b> c\n");
}

#[test]
fn escaped_entities_inside_code_stay_escaped() {
    let (out, errors) = expand("<pre>\nif (a < b) x();\n</pre>\n");
    assert_eq!(errors, 0);
    assert!(out.contains("if (a &#60; b) x();"));
}

#[test]
fn include_splices_a_file_through_the_whole_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snippet.java");
    std::fs::write(&path, "int x;\nint y;\n").unwrap();

    let (out, errors) = expand(&format!("<include src=\"{}\">\n", path.display()));
    assert_eq!(errors, 0);
    assert!(out.contains("int x;"));
    assert!(out.contains("1<br>\n2<br>"));
}
