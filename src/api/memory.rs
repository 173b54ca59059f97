//! In-process note service used by unit tests. Records every call and can be
//! told to fail a given operation with an HTTP status.

use std::collections::HashMap;

use parking_lot::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    ApiError, ApiResult, Category, CategoryDraft, CategoryRef, Credentials, LoginResponse, Note,
    NoteDraft, NotePatch, NotesApi, Registration, ShareLink, TagCount,
};

#[derive(Debug, Default)]
struct MemoryState {
    notes: Vec<Note>,
    trash: Vec<Note>,
    categories: Vec<Category>,
    next_id: i64,
    calls: Vec<String>,
    failures: HashMap<&'static str, u16>,
    order_updates: Vec<Vec<i64>>,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryApi {
    state: Mutex<MemoryState>,
}

pub(crate) fn note(id: i64, title: &str, tags: &[&str]) -> Note {
    Note {
        id,
        title: title.to_string(),
        content: String::new(),
        owner: Some("ada".to_string()),
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        category: None,
        is_private: false,
        is_pinned: false,
        order: 0,
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: None,
        deleted_at: None,
        share_uuid: None,
    }
}

impl MemoryApi {
    pub(crate) fn with_notes(notes: Vec<Note>) -> Self {
        let next_id = notes.iter().map(|note| note.id).max().unwrap_or(0) + 1;
        Self {
            state: Mutex::new(MemoryState {
                notes,
                next_id,
                ..MemoryState::default()
            }),
        }
    }

    pub(crate) fn with_trash(self, trash: Vec<Note>) -> Self {
        {
            let mut state = self.state.lock();
            let max_trash = trash.iter().map(|note| note.id).max().unwrap_or(0);
            state.next_id = state.next_id.max(max_trash + 1);
            state.trash = trash;
        }
        self
    }

    pub(crate) fn with_categories(self, categories: Vec<Category>) -> Self {
        self.state.lock().categories = categories;
        self
    }

    /// Every later call to `op` fails with `status` (401 maps to `Unauthorized`).
    pub(crate) fn fail(&self, op: &'static str, status: u16) {
        self.state.lock().failures.insert(op, status);
    }

    pub(crate) fn recover(&self, op: &'static str) {
        self.state.lock().failures.remove(op);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn call_count(&self, op: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.as_str() == op)
            .count()
    }

    pub(crate) fn order_updates(&self) -> Vec<Vec<i64>> {
        self.state.lock().order_updates.clone()
    }

    pub(crate) fn server_notes(&self) -> Vec<Note> {
        self.state.lock().notes.clone()
    }

    fn enter(&self, op: &'static str) -> ApiResult<parking_lot::MutexGuard<'_, MemoryState>> {
        let mut state = self.state.lock();
        state.calls.push(op.to_string());
        let failure = state.failures.get(op).copied();
        match failure {
            Some(401) => Err(ApiError::Unauthorized),
            Some(status) => Err(ApiError::Status {
                status,
                message: format!("{op} rejected"),
            }),
            None => Ok(state),
        }
    }
}

fn not_found(what: &str, id: i64) -> ApiError {
    ApiError::Status {
        status: 404,
        message: format!("{what} {id} not found"),
    }
}

impl NotesApi for MemoryApi {
    fn list_notes(&self, search: Option<&str>) -> ApiResult<Vec<Note>> {
        let state = self.enter("list_notes")?;
        let term = search.map(str::to_lowercase).unwrap_or_default();
        Ok(state
            .notes
            .iter()
            .filter(|note| {
                term.is_empty()
                    || note.title.to_lowercase().contains(&term)
                    || note.content.to_lowercase().contains(&term)
                    || note.tags.iter().any(|tag| tag.to_lowercase().contains(&term))
            })
            .cloned()
            .collect())
    }

    fn create_note(&self, draft: &NoteDraft) -> ApiResult<Note> {
        let mut state = self.enter("create_note")?;
        let id = state.next_id;
        state.next_id += 1;
        let mut created = note(id, &draft.title, &[]);
        created.content = draft.content.clone();
        created.tags = draft.tags.clone();
        created.is_private = draft.is_private;
        created.category = draft.category.map(CategoryRef::Id);
        state.notes.insert(0, created.clone());
        Ok(created)
    }

    fn update_note(&self, id: i64, patch: &NotePatch) -> ApiResult<Note> {
        let mut state = self.enter("update_note")?;
        let target = state
            .notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or_else(|| not_found("note", id))?;
        if let Some(title) = &patch.title {
            target.title = title.clone();
        }
        if let Some(content) = &patch.content {
            target.content = content.clone();
        }
        if let Some(is_private) = patch.is_private {
            target.is_private = is_private;
        }
        if let Some(tags) = &patch.tags {
            target.tags = tags.clone();
        }
        if let Some(category) = patch.category {
            target.category = category.map(CategoryRef::Id);
        }
        target.updated_at = Some(OffsetDateTime::now_utc());
        Ok(target.clone())
    }

    fn delete_note(&self, id: i64) -> ApiResult<()> {
        let mut state = self.enter("delete_note")?;
        let before = state.notes.len();
        state.notes.retain(|note| note.id != id);
        if state.notes.len() == before {
            return Err(not_found("note", id));
        }
        Ok(())
    }

    fn trash_note(&self, id: i64) -> ApiResult<()> {
        let mut state = self.enter("trash_note")?;
        let index = state
            .notes
            .iter()
            .position(|note| note.id == id)
            .ok_or_else(|| not_found("note", id))?;
        let mut trashed = state.notes.remove(index);
        trashed.deleted_at = Some(OffsetDateTime::now_utc());
        state.trash.insert(0, trashed);
        Ok(())
    }

    fn toggle_pin(&self, id: i64) -> ApiResult<()> {
        let mut state = self.enter("toggle_pin")?;
        let target = state
            .notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or_else(|| not_found("note", id))?;
        target.is_pinned = !target.is_pinned;
        Ok(())
    }

    fn share_note(&self, id: i64) -> ApiResult<ShareLink> {
        let mut state = self.enter("share_note")?;
        let target = state
            .notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or_else(|| not_found("note", id))?;
        let share_uuid = *target.share_uuid.get_or_insert_with(Uuid::new_v4);
        Ok(ShareLink {
            share_uuid,
            url: None,
        })
    }

    fn update_order(&self, ordered_ids: &[i64]) -> ApiResult<()> {
        let mut state = self.enter("update_order")?;
        state.order_updates.push(ordered_ids.to_vec());
        for (position, id) in ordered_ids.iter().enumerate() {
            if let Some(note) = state.notes.iter_mut().find(|note| note.id == *id) {
                note.order = position as i64;
            }
        }
        Ok(())
    }

    fn list_trashed(&self) -> ApiResult<Vec<Note>> {
        let state = self.enter("list_trashed")?;
        Ok(state.trash.clone())
    }

    fn restore_trashed(&self, id: i64) -> ApiResult<()> {
        let mut state = self.enter("restore_trashed")?;
        let index = state
            .trash
            .iter()
            .position(|note| note.id == id)
            .ok_or_else(|| not_found("trashed note", id))?;
        let mut restored = state.trash.remove(index);
        restored.deleted_at = None;
        state.notes.insert(0, restored);
        Ok(())
    }

    fn purge_trashed(&self, id: i64) -> ApiResult<()> {
        let mut state = self.enter("purge_trashed")?;
        let before = state.trash.len();
        state.trash.retain(|note| note.id != id);
        if state.trash.len() == before {
            return Err(not_found("trashed note", id));
        }
        Ok(())
    }

    fn empty_trash(&self) -> ApiResult<()> {
        let mut state = self.enter("empty_trash")?;
        state.trash.clear();
        Ok(())
    }

    fn restore_all_trashed(&self) -> ApiResult<()> {
        let mut state = self.enter("restore_all_trashed")?;
        let mut restored = std::mem::take(&mut state.trash);
        for note in &mut restored {
            note.deleted_at = None;
        }
        restored.append(&mut state.notes);
        state.notes = restored;
        Ok(())
    }

    fn list_categories(&self) -> ApiResult<Vec<Category>> {
        let state = self.enter("list_categories")?;
        Ok(state.categories.clone())
    }

    fn create_category(&self, draft: &CategoryDraft) -> ApiResult<Category> {
        let mut state = self.enter("create_category")?;
        let id = state.categories.iter().map(|cat| cat.id).max().unwrap_or(0) + 1;
        let category = Category {
            id,
            name: draft.name.clone(),
            color: draft.color.clone(),
        };
        state.categories.push(category.clone());
        Ok(category)
    }

    fn update_category(&self, id: i64, draft: &CategoryDraft) -> ApiResult<Category> {
        let mut state = self.enter("update_category")?;
        let target = state
            .categories
            .iter_mut()
            .find(|cat| cat.id == id)
            .ok_or_else(|| not_found("category", id))?;
        target.name = draft.name.clone();
        target.color = draft.color.clone();
        Ok(target.clone())
    }

    fn delete_category(&self, id: i64) -> ApiResult<()> {
        let mut state = self.enter("delete_category")?;
        state.categories.retain(|cat| cat.id != id);
        for note in &mut state.notes {
            if note.category_id() == Some(id) {
                note.category = None;
            }
        }
        Ok(())
    }

    fn list_tags(&self) -> ApiResult<Vec<TagCount>> {
        let state = self.enter("list_tags")?;
        let mut counts: Vec<TagCount> = Vec::new();
        for tag in state.notes.iter().flat_map(|note| note.tags.iter()) {
            match counts.iter_mut().find(|entry| &entry.name == tag) {
                Some(entry) => entry.count += 1,
                None => counts.push(TagCount {
                    name: tag.clone(),
                    count: 1,
                }),
            }
        }
        Ok(counts)
    }

    fn public_note(&self, share_uuid: Uuid) -> ApiResult<Note> {
        let state = self.enter("public_note")?;
        state
            .notes
            .iter()
            .find(|note| note.share_uuid == Some(share_uuid) && !note.is_private)
            .cloned()
            .ok_or(ApiError::Status {
                status: 404,
                message: "shared note not found".into(),
            })
    }

    fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse> {
        let _state = self.enter("login")?;
        Ok(LoginResponse {
            key: format!("token-{}", credentials.username),
            is_staff: credentials.username == "admin",
            username: None,
        })
    }

    fn register(&self, _registration: &Registration) -> ApiResult<()> {
        let _state = self.enter("register")?;
        Ok(())
    }
}
