//! The filter abstraction shared by every transformation pass.
//!
//! A filter rewrites one block of the document in place. It declares
//! which block kinds it handles; a pass consults that set when deciding
//! which of its filters to run on a given region. Filters hold no
//! per-run state of their own: everything that must survive between
//! calls or between passes lives in [`Context`].

use crate::context::Context;
use std::ops::BitOr;

/// What kind of region a filter is being handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Ordinary prose between delimiters.
    Text,
    /// The contents of a `<pre>`, `<listing>`, or comma-shorthand block.
    Code,
    /// The contents of a single-line backquoted snippet.
    Snippet,
    /// A late reference-resolution sweep over the whole document.
    Ref,
}

/// A small set of [`BlockKind`]s, used to declare filter capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSet(u8);

impl KindSet {
    pub const EMPTY: KindSet = KindSet(0);
    pub const TEXT: KindSet = KindSet(1);
    pub const CODE: KindSet = KindSet(2);
    pub const SNIPPET: KindSet = KindSet(4);
    pub const REF: KindSet = KindSet(8);

    pub fn contains(self, kind: BlockKind) -> bool {
        let bit = match kind {
            BlockKind::Text => Self::TEXT,
            BlockKind::Code => Self::CODE,
            BlockKind::Snippet => Self::SNIPPET,
            BlockKind::Ref => Self::REF,
        };
        self.0 & bit.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for KindSet {
    type Output = KindSet;
    fn bitor(self, rhs: KindSet) -> KindSet {
        KindSet(self.0 | rhs.0)
    }
}

/// One document transformation. `prefix` and `suffix` are the delimiter
/// text surrounding the block; the filter is responsible for folding
/// them into `body`, which becomes the block's replacement outright.
pub trait Filter {
    /// The block kinds this filter applies to.
    fn kinds(&self) -> KindSet;

    fn filter(
        &self,
        prefix: &str,
        body: &mut String,
        suffix: &str,
        kind: BlockKind,
        ctx: &mut Context,
    );
}

/// Identity filter: reattaches the delimiters and changes nothing else.
/// Used wherever a pass has no real filter for a block kind.
pub struct DefaultFilter {
    kinds: KindSet,
}

impl DefaultFilter {
    pub const fn new(kinds: KindSet) -> Self {
        Self { kinds }
    }
}

impl Filter for DefaultFilter {
    fn kinds(&self) -> KindSet {
        self.kinds
    }

    fn filter(
        &self,
        prefix: &str,
        body: &mut String,
        suffix: &str,
        _kind: BlockKind,
        _ctx: &mut Context,
    ) {
        body.insert_str(0, prefix);
        body.push_str(suffix);
    }
}
