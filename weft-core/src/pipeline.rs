//! The fixed sequence of passes that turns marked-up text into HTML.
//!
//! Order matters. Includes run first so spliced text sees every later
//! pass; configuration is read before anything consults it; code
//! macros run after the listing pass so generated markup inside code
//! blocks gets entity-escaped; entity unmapping runs dead last, over
//! text regions only, so escaped characters inside code stay escaped.

use crate::config::ConfigFilter;
use crate::context::Context;
use crate::entity::EntityUnmapFilter;
use crate::filter::Filter;
use crate::include::IncludeFilter;
use crate::listing::{ListingFilter, ListingReferenceFilter};
use crate::macros::{CodeMacroFilter, RefMacroFilter, TextMacroFilter};
use crate::pass::Pass;
use crate::snippet::SnippetFilter;
use crate::tags::TagsFilter;
use crate::titles::{TitleReferenceFilter, TitlesFilter, TocFilter};

pub struct Pipeline {
    ctx: Context,
    include: IncludeFilter,
    config: ConfigFilter,
    snippets: SnippetFilter,
    text_macros: TextMacroFilter,
    tags: TagsFilter,
    listings: ListingFilter,
    code_macros: CodeMacroFilter,
    titles: TitlesFilter,
    ref_macros: RefMacroFilter,
    listing_refs: ListingReferenceFilter,
    title_refs: TitleReferenceFilter,
    toc: TocFilter,
    unmap: EntityUnmapFilter,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline {
            ctx: Context::new(),
            include: IncludeFilter,
            config: ConfigFilter,
            snippets: SnippetFilter,
            text_macros: TextMacroFilter,
            tags: TagsFilter,
            listings: ListingFilter::new(),
            code_macros: CodeMacroFilter,
            titles: TitlesFilter,
            ref_macros: RefMacroFilter,
            listing_refs: ListingReferenceFilter,
            title_refs: TitleReferenceFilter,
            toc: TocFilter,
            unmap: EntityUnmapFilter,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    /// Run every pass over `doc` in place. Returns the total error
    /// count so far; a failed pass stops the chain (the document holds
    /// the output of the last successful pass, and the trailing entity
    /// unmap is skipped since it would trip over the same structural
    /// error and report it twice).
    pub fn expand(&mut self, doc: &mut String) -> usize {
        let stages: [(&str, &dyn Filter); 12] = [
            ("include", &self.include),
            ("config", &self.config),
            ("snippets", &self.snippets),
            ("text-macros", &self.text_macros),
            ("tags", &self.tags),
            ("listings", &self.listings),
            ("code-macros", &self.code_macros),
            ("titles", &self.titles),
            ("ref-macros", &self.ref_macros),
            ("listing-refs", &self.listing_refs),
            ("title-refs", &self.title_refs),
            ("toc", &self.toc),
        ];
        let mut failed = false;
        for (name, stage) in stages {
            tracing::debug!(pass = name, "running");
            if !Pass::new(&[stage]).process(doc, &mut self.ctx) {
                tracing::warn!(pass = name, "pass failed, stopping the chain");
                failed = true;
                break;
            }
        }
        if !failed {
            Pass::new(&[&self.unmap]).process(doc, &mut self.ctx);
        }
        self.ctx.diags.error_count()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
