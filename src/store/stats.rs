use indexmap::IndexMap;

use crate::api::{Category, Note, TagCount};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryUsage {
    pub name: String,
    pub color: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteStats {
    pub total: usize,
    pub private: usize,
    pub public: usize,
    /// Keyed by category id, in category list order. Unused categories are omitted.
    pub categories: IndexMap<i64, CategoryUsage>,
    pub tags: Vec<TagCount>,
}

impl NoteStats {
    pub fn collect(notes: &[Note], categories: &[Category], tags: &[TagCount]) -> Self {
        let private = notes.iter().filter(|note| note.is_private).count();
        let mut usage = IndexMap::new();
        for category in categories {
            let count = notes
                .iter()
                .filter(|note| note.category_id() == Some(category.id))
                .count();
            if count == 0 {
                continue;
            }
            usage.insert(
                category.id,
                CategoryUsage {
                    name: category.name.clone(),
                    color: category.color.clone(),
                    count,
                },
            );
        }
        Self {
            total: notes.len(),
            private,
            public: notes.len() - private,
            categories: usage,
            tags: tags.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::note;
    use crate::api::CategoryRef;

    #[test]
    fn counts_privacy_and_used_categories() {
        let mut notes = vec![note(1, "a", &[]), note(2, "b", &[]), note(3, "c", &[])];
        notes[0].is_private = true;
        notes[1].category = Some(CategoryRef::Id(2));
        notes[2].category = Some(CategoryRef::Id(2));
        let categories = vec![
            Category {
                id: 1,
                name: "Ideas".into(),
                color: "#50fa7b".into(),
            },
            Category {
                id: 2,
                name: "Todo".into(),
                color: "#f1fa8c".into(),
            },
        ];
        let stats = NoteStats::collect(&notes, &categories, &[]);
        assert_eq!((stats.total, stats.private, stats.public), (3, 1, 2));
        assert_eq!(stats.categories.len(), 1);
        assert_eq!(stats.categories.get(&2).map(|usage| usage.count), Some(2));
    }
}
