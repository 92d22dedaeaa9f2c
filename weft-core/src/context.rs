//! Shared state threaded through every filter in a run.
//!
//! All cross-pass state lives here so a run over one document never
//! leaks into the next; build a fresh `Context` per document (or per
//! batch, when numbering should continue across files).

use crate::config::ConfigStore;
use crate::diag::Diagnostics;
use crate::index::Index;
use crate::listing::ListingState;
use crate::macros::MacroSet;
use crate::notes::NoteSet;
use crate::titles::TitleState;

pub struct Context {
    pub diags: Diagnostics,
    pub config: ConfigStore,
    pub macros: MacroSet,
    pub listing: ListingState,
    pub notes: NoteSet,
    pub titles: TitleState,
    pub index: Index,
    /// Content hoisted out of `<head>` elements, later spliced into the
    /// document's real `<head>` tag.
    pub head_additions: String,
    /// Next automatic end-note mark.
    pub note_number: usize,
}

impl Context {
    pub fn new() -> Self {
        let mut diags = Diagnostics::new();
        let macros = MacroSet::with_built_ins(&mut diags);
        Context {
            diags,
            config: ConfigStore::new(),
            macros,
            listing: ListingState::new(),
            notes: NoteSet::new(),
            titles: TitleState::default(),
            index: Index::new(),
            head_additions: String::new(),
            note_number: 0,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
