use crate::api::Note;
use crate::config::FilterMode;

/// Active tag/category selection over the main note list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    mode: FilterMode,
    tag: Option<String>,
    category: Option<i64>,
}

impl NoteFilter {
    pub fn new(mode: FilterMode) -> Self {
        Self {
            mode,
            tag: None,
            category: None,
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn category(&self) -> Option<i64> {
        self.category
    }

    pub fn is_active(&self) -> bool {
        self.tag.is_some() || self.category.is_some()
    }

    /// `None` (or a blank tag) is "All".
    pub fn select_tag(&mut self, tag: Option<&str>) {
        self.tag = tag
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string);
        if self.mode == FilterMode::Exclusive {
            self.category = None;
        }
    }

    /// Selecting the active category again turns it off.
    pub fn select_category(&mut self, category: Option<i64>) {
        self.category = match category {
            Some(id) if self.category == Some(id) => None,
            other => other,
        };
        if self.mode == FilterMode::Exclusive {
            self.tag = None;
        }
    }

    pub fn clear(&mut self) {
        self.tag = None;
        self.category = None;
    }

    pub(crate) fn forget_category(&mut self, id: i64) {
        if self.category == Some(id) {
            self.category = None;
        }
    }

    pub fn matches(&self, note: &Note) -> bool {
        let tag_match = self.tag.as_deref().map_or(true, |tag| note.has_tag(tag));
        let category_match = self
            .category
            .map_or(true, |id| note.category_id() == Some(id));
        tag_match && category_match
    }

    pub fn apply<'a>(&self, notes: &'a [Note]) -> Vec<&'a Note> {
        notes.iter().filter(|note| self.matches(note)).collect()
    }
}
