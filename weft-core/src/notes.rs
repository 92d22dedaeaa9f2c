//! End notes. A `<note>` element drops an inline reference mark into
//! the prose and queues the note body; an `<endnotes>` element later
//! emits the queued notes in order.

/// One queued note. Ids are assigned sequentially per run.
#[derive(Debug, Clone)]
struct EndNote {
    id: usize,
    mark: String,
    content: String,
}

impl EndNote {
    /// The inline hot link placed where the `<note>` element stood.
    fn reference(&self) -> String {
        format!(
            "<a name=\"weftRef-{id}\" id=\"weftRef-{id}\" href=\"#weftNote{id}\">{mark}</a>",
            id = self.id,
            mark = self.mark
        )
    }

    /// The note block itself, with a back link to the reference.
    fn block(&self) -> String {
        format!(
            concat!(
                "<div class=\"weftNoteGroup\" id=\"weftNote-{id}\">",
                "<div class=\"weftNoteRef\">",
                "<a name=\"weftNote{id}\" href=\"#weftRef-{id}\">{mark}</a>",
                "</div>",
                "<div class=\"weftNoteBody\" id=\"weftNoteBody-{id}\">{content}</div>",
                "</div>\n"
            ),
            id = self.id,
            mark = self.mark,
            content = self.content
        )
    }
}

#[derive(Debug, Default)]
pub struct NoteSet {
    notes: Vec<EndNote>,
    by_label: std::collections::BTreeMap<String, usize>,
    next_id: usize,
}

impl NoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a note and return its inline reference HTML, or None when
    /// the mark has already been used.
    pub fn add(&mut self, mark: &str, content: &str, label: Option<&str>) -> Option<String> {
        if self.notes.iter().any(|n| n.mark == mark) {
            return None;
        }
        self.next_id += 1;
        let note = EndNote {
            id: self.next_id,
            mark: mark.to_string(),
            content: content.to_string(),
        };
        let reference = note.reference();
        if let Some(label) = label.filter(|l| !l.is_empty()) {
            self.by_label.insert(label.to_string(), note.id);
        }
        self.notes.push(note);
        Some(reference)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// All queued note blocks, concatenated in queue order.
    pub fn render_blocks(&self) -> String {
        self.notes.iter().map(EndNote::block).collect()
    }

    pub fn target_for_label(&self, label: &str) -> Option<String> {
        self.by_label.get(label).map(|id| format!("weftNote{id}"))
    }

    pub fn mark_for_label(&self, label: &str) -> Option<&str> {
        let id = self.by_label.get(label)?;
        self.notes
            .iter()
            .find(|n| n.id == *id)
            .map(|n| n.mark.as_str())
    }

    /// Forget everything queued so far. Note ids keep counting up so
    /// anchors from before the clear stay unique.
    pub fn clear(&mut self) {
        self.notes.clear();
        self.by_label.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_and_block_share_an_id() {
        let mut notes = NoteSet::new();
        let reference = notes.add("1", "the body", None).unwrap();
        assert_eq!(
            reference,
            "<a name=\"weftRef-1\" id=\"weftRef-1\" href=\"#weftNote1\">1</a>"
        );
        let blocks = notes.render_blocks();
        assert!(blocks.contains("id=\"weftNote-1\""));
        assert!(blocks.contains(">the body</div>"));
    }

    #[test]
    fn duplicate_mark_is_rejected() {
        let mut notes = NoteSet::new();
        assert!(notes.add("*", "first", None).is_some());
        assert!(notes.add("*", "second", None).is_none());
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn labels_resolve_to_mark_and_target() {
        let mut notes = NoteSet::new();
        notes.add("3", "x", Some("mynote"));
        assert_eq!(notes.target_for_label("mynote").as_deref(), Some("weftNote1"));
        assert_eq!(notes.mark_for_label("mynote"), Some("3"));
        assert_eq!(notes.target_for_label("other"), None);
    }

    #[test]
    fn clear_keeps_ids_monotonic() {
        let mut notes = NoteSet::new();
        notes.add("1", "a", None);
        notes.clear();
        assert!(notes.is_empty());
        let reference = notes.add("1", "b", None).unwrap();
        assert!(reference.contains("weftRef-2"));
    }
}
