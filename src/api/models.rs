use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_CATEGORY_COLOR: &str = "#808080";

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub order: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub share_uuid: Option<Uuid>,
}

impl Note {
    pub fn is_public(&self) -> bool {
        !self.is_private
    }

    pub fn category_id(&self) -> Option<i64> {
        self.category.as_ref().map(CategoryRef::id)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }

    pub fn owner_label(&self) -> &str {
        self.owner.as_deref().unwrap_or("anonymous")
    }
}

/// The notes endpoint returns either the bare category id or the embedded record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Id(i64),
    Embedded(Category),
}

impl CategoryRef {
    pub fn id(&self) -> i64 {
        match self {
            CategoryRef::Id(id) => *id,
            CategoryRef::Embedded(category) => category.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    DEFAULT_CATEGORY_COLOR.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub name: String,
    #[serde(default, alias = "num_times")]
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub is_private: bool,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<i64>,
}

/// Partial update; `None` fields are left out of the PATCH body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "::serde_with::rust::double_option::serialize"
    )]
    pub category: Option<Option<i64>>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.is_private.is_none()
            && self.tags.is_none()
            && self.category.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryDraft {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub key: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShareLink {
    pub share_uuid: Uuid,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OrderUpdate<'a> {
    pub ordered_ids: &'a [i64],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_decodes_null_content_and_embedded_category() {
        let raw = r##"{
            "id": 7,
            "title": "Groceries",
            "content": null,
            "owner": "deniz",
            "tags": ["home"],
            "category": {"id": 3, "name": "Todo", "color": "#f1fa8c"},
            "is_private": true,
            "created_at": "2024-03-01T09:30:00.123456Z"
        }"##;
        let note: Note = serde_json::from_str(raw).expect("decode note");
        assert_eq!(note.content, "");
        assert_eq!(note.category_id(), Some(3));
        assert!(!note.is_public());
        assert!(!note.is_pinned);
        assert_eq!(note.order, 0);
        assert!(note.share_uuid.is_none());
    }

    #[test]
    fn note_decodes_bare_category_id_and_missing_owner() {
        let raw = r#"{"id": 1, "title": "t", "category": 9, "created_at": "2024-03-01T09:30:00Z"}"#;
        let note: Note = serde_json::from_str(raw).expect("decode note");
        assert_eq!(note.category_id(), Some(9));
        assert_eq!(note.owner_label(), "anonymous");
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let patch = NotePatch {
            title: Some("New".into()),
            category: Some(None),
            ..NotePatch::default()
        };
        let json = serde_json::to_value(&patch).expect("encode patch");
        assert_eq!(json, serde_json::json!({"title": "New", "category": null}));
        assert!(NotePatch::default().is_empty());
    }

    #[test]
    fn tag_count_accepts_alias() {
        let tag: TagCount = serde_json::from_str(r#"{"name": "rust", "num_times": 4}"#)
            .expect("decode tag");
        assert_eq!(tag.count, 4);
    }
}
