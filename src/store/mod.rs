use std::time::Instant;

use thiserror::Error;
use time::OffsetDateTime;

use crate::api::{
    ApiError, ApiResult, Category, CategoryDraft, CategoryRef, Note, NoteDraft, NotePatch,
    NotesApi, ShareLink, TagCount,
};
use crate::config::AppConfig;
use crate::search::SearchDebouncer;
use crate::session::SessionHandle;

pub mod filter;
pub mod input;
mod reorder;
pub mod stats;
pub mod trash;

pub use filter::NoteFilter;
pub use stats::{CategoryUsage, NoteStats};
pub use trash::TrashCountdown;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("note title cannot be empty")]
    EmptyTitle,
    #[error("category name cannot be empty")]
    EmptyCategoryName,
    #[error("invalid category color '{0}', expected #rrggbb")]
    InvalidColor(String),
    #[error("nothing to update")]
    EmptyPatch,
    #[error("note {0} not found")]
    UnknownNote(i64),
    #[error("category {0} not found")]
    UnknownCategory(i64),
    #[error("note {0} is pinned and cannot be reordered")]
    PinnedNote(i64),
    #[error("no note is being dragged")]
    NoDrag,
    #[error("session expired, please log in again")]
    SessionExpired,
    #[error(transparent)]
    Api(#[from] ApiError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything an optimistic mutation may touch, captured before it runs.
#[derive(Debug, Clone)]
struct Snapshot {
    notes: Vec<Note>,
    trash: Vec<Note>,
    categories: Vec<Category>,
    filter: NoteFilter,
}

/// In-memory view of the user's notes, kept in sync with the server through
/// optimistic updates that roll back when the request fails.
pub struct NoteStore<A> {
    api: A,
    session: SessionHandle,
    notes: Vec<Note>,
    trash: Vec<Note>,
    categories: Vec<Category>,
    tags: Vec<TagCount>,
    filter: NoteFilter,
    search: SearchDebouncer,
    dragging: Option<i64>,
    retention_days: u32,
    last_error: Option<String>,
    status_message: Option<String>,
}

impl<A: NotesApi> NoteStore<A> {
    pub fn new(api: A, session: SessionHandle, config: &AppConfig) -> Self {
        Self {
            api,
            session,
            notes: Vec::new(),
            trash: Vec::new(),
            categories: Vec::new(),
            tags: Vec::new(),
            filter: NoteFilter::new(config.filter_mode),
            search: SearchDebouncer::new(config.search.debounce_duration()),
            dragging: None,
            retention_days: config.trash.retention_days,
            last_error: None,
            status_message: None,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn trash(&self) -> &[Note] {
        &self.trash
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn tags(&self) -> &[TagCount] {
        &self.tags
    }

    pub fn filter(&self) -> &NoteFilter {
        &self.filter
    }

    pub fn note(&self, id: i64) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn category(&self, id: i64) -> Option<&Category> {
        self.categories.iter().find(|category| category.id == id)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn search_term(&self) -> &str {
        self.search.applied()
    }

    pub fn dragging(&self) -> Option<i64> {
        self.dragging
    }

    /// Main list after the tag/category filter.
    pub fn visible_notes(&self) -> Vec<&Note> {
        self.filter.apply(&self.notes)
    }

    pub fn stats(&self) -> NoteStats {
        NoteStats::collect(&self.notes, &self.categories, &self.tags)
    }

    pub fn trash_countdown(&self, note: &Note, now: OffsetDateTime) -> Option<TrashCountdown> {
        note.deleted_at
            .map(|deleted_at| trash::countdown(deleted_at, self.retention_days, now))
    }

    // ---- loading -------------------------------------------------------

    pub fn reload(&mut self) -> StoreResult<()> {
        let term = self.search.applied().to_string();
        self.load(&term)
    }

    fn load(&mut self, term: &str) -> StoreResult<()> {
        let search = (!term.is_empty()).then_some(term);
        let notes = self.api.list_notes(search);
        let notes = self.guard("loading notes", notes)?;
        let categories = self.api.list_categories();
        let categories = self.guard("loading categories", categories)?;
        let tags = self.api.list_tags();
        let tags = self.guard("loading tags", tags)?;

        self.notes = notes;
        reorder::sort_loaded(&mut self.notes);
        self.categories = categories;
        self.tags = tags;
        self.dragging = None;
        if let Some(id) = self.filter.category() {
            if self.category(id).is_none() {
                self.filter.forget_category(id);
            }
        }
        tracing::debug!(notes = self.notes.len(), search = %term, "notes reloaded");
        Ok(())
    }

    pub fn reload_trash(&mut self) -> StoreResult<()> {
        let trash = self.api.list_trashed();
        self.trash = self.guard("loading trash", trash)?;
        Ok(())
    }

    /// Tag counts are aggregated server-side; a failed refresh keeps the old
    /// ones unless the session has expired.
    pub fn refresh_tags(&mut self) -> StoreResult<()> {
        match self.api.list_tags() {
            Ok(tags) => self.tags = tags,
            Err(ApiError::Unauthorized) => {
                self.expire_session();
                return Err(StoreError::SessionExpired);
            }
            Err(err) => tracing::warn!(%err, "failed to refresh tag counts"),
        }
        Ok(())
    }

    // ---- search & filters ---------------------------------------------

    pub fn set_search_input(&mut self, input: &str, now: Instant) {
        self.search.push(input, now);
    }

    /// Reloads once the debounce delay has passed. Returns whether it reloaded.
    pub fn poll_search(&mut self, now: Instant) -> StoreResult<bool> {
        let Some(term) = self.search.poll(now) else {
            return Ok(false);
        };
        self.apply_search(&term).map(|()| true)
    }

    pub fn flush_search(&mut self) -> StoreResult<bool> {
        let Some(term) = self.search.flush() else {
            return Ok(false);
        };
        self.apply_search(&term).map(|()| true)
    }

    /// The term only counts as applied once the list was loaded with it.
    fn apply_search(&mut self, term: &str) -> StoreResult<()> {
        self.load(term)?;
        self.search.commit(term);
        Ok(())
    }

    pub fn select_tag(&mut self, tag: Option<&str>) {
        self.filter.select_tag(tag);
    }

    pub fn select_category(&mut self, category: Option<i64>) -> StoreResult<()> {
        if let Some(id) = category {
            if self.category(id).is_none() {
                return Err(self.reject(StoreError::UnknownCategory(id)));
            }
        }
        self.filter.select_category(category);
        Ok(())
    }

    // ---- server-confirmed note mutations ------------------------------

    pub fn add_note(&mut self, mut draft: NoteDraft) -> StoreResult<Note> {
        draft.title = draft.title.trim().to_string();
        if draft.title.is_empty() {
            return Err(self.reject(StoreError::EmptyTitle));
        }
        draft.tags = input::normalize_tags(&draft.tags);
        let created = self.api.create_note(&draft);
        let mut created = self.guard("creating note", created)?;
        if created.owner.is_none() {
            created.owner = self.session.current().map(|session| session.username);
        }
        let slot = self.notes.iter().filter(|note| note.is_pinned).count();
        self.notes.insert(slot, created.clone());
        reorder::pin_partition(&mut self.notes);
        self.refresh_tags()?;
        self.succeed(format!("note #{} created", created.id));
        Ok(created)
    }

    pub fn update_note(&mut self, id: i64, mut patch: NotePatch) -> StoreResult<Note> {
        let Some(existing) = self.note(id).cloned() else {
            return Err(self.reject(StoreError::UnknownNote(id)));
        };
        if patch.is_empty() {
            return Err(self.reject(StoreError::EmptyPatch));
        }
        if let Some(title) = patch.title.as_mut() {
            *title = title.trim().to_string();
            if title.is_empty() {
                return Err(self.reject(StoreError::EmptyTitle));
            }
        }
        if let Some(tags) = patch.tags.as_mut() {
            *tags = input::normalize_tags(tags.iter());
        }
        let updated = self.api.update_note(id, &patch);
        let mut updated = self.guard("updating note", updated)?;
        if updated.owner.is_none() {
            updated.owner = existing.owner;
        }
        if let Some(slot) = self.notes.iter_mut().find(|note| note.id == id) {
            *slot = updated.clone();
        }
        reorder::pin_partition(&mut self.notes);
        self.refresh_tags()?;
        self.succeed(format!("note #{id} updated"));
        Ok(updated)
    }

    pub fn share_note(&mut self, id: i64) -> StoreResult<ShareLink> {
        if self.note(id).is_none() {
            return Err(self.reject(StoreError::UnknownNote(id)));
        }
        let link = self.api.share_note(id);
        let link = self.guard("sharing note", link)?;
        if let Some(note) = self.notes.iter_mut().find(|note| note.id == id) {
            note.share_uuid = Some(link.share_uuid);
        }
        self.succeed(format!("note #{id} shared"));
        Ok(link)
    }

    // ---- optimistic note mutations -------------------------------------

    /// Moves a note to the trash. The trash list is only refreshed by `reload_trash`.
    pub fn trash_note(&mut self, id: i64) -> StoreResult<()> {
        let snapshot = self.snapshot();
        if !self.remove_from_notes(id) {
            return Err(self.reject(StoreError::UnknownNote(id)));
        }
        let result = self.api.trash_note(id);
        self.settle(snapshot, "moving note to trash", result)?;
        self.refresh_tags()?;
        self.succeed(format!("note #{id} moved to trash"));
        Ok(())
    }

    /// Deletes a note from the main list without going through the trash.
    pub fn delete_note(&mut self, id: i64) -> StoreResult<()> {
        let snapshot = self.snapshot();
        if !self.remove_from_notes(id) {
            return Err(self.reject(StoreError::UnknownNote(id)));
        }
        let result = self.api.delete_note(id);
        self.settle(snapshot, "deleting note", result)?;
        self.refresh_tags()?;
        self.succeed(format!("note #{id} deleted"));
        Ok(())
    }

    pub fn toggle_pin(&mut self, id: i64) -> StoreResult<bool> {
        let Some(index) = self.notes.iter().position(|note| note.id == id) else {
            return Err(self.reject(StoreError::UnknownNote(id)));
        };
        let snapshot = self.snapshot();
        let pinned = !self.notes[index].is_pinned;
        self.notes[index].is_pinned = pinned;
        if self.dragging == Some(id) {
            self.dragging = None;
        }
        reorder::pin_partition(&mut self.notes);
        let result = self.api.toggle_pin(id);
        self.settle(snapshot, "toggling pin", result)?;
        self.succeed(if pinned {
            format!("note #{id} pinned")
        } else {
            format!("note #{id} unpinned")
        });
        Ok(pinned)
    }

    // ---- drag and drop -------------------------------------------------

    pub fn begin_drag(&mut self, id: i64) -> StoreResult<()> {
        let Some(note) = self.note(id) else {
            return Err(self.reject(StoreError::UnknownNote(id)));
        };
        if note.is_pinned {
            return Err(self.reject(StoreError::PinnedNote(id)));
        }
        self.dragging = Some(id);
        Ok(())
    }

    /// Drops the dragged note onto `target` and persists the full order.
    /// Returns `false` when the drop is a no-op.
    pub fn drop_on(&mut self, target: i64) -> StoreResult<bool> {
        let Some(dragged) = self.dragging else {
            return Err(self.reject(StoreError::NoDrag));
        };
        let Some(target_note) = self.note(target) else {
            return Err(self.reject(StoreError::UnknownNote(target)));
        };
        if target_note.is_pinned {
            return Err(self.reject(StoreError::PinnedNote(target)));
        }
        self.dragging = None;
        if dragged == target {
            return Ok(false);
        }

        let snapshot = self.snapshot();
        if !reorder::move_to_target(&mut self.notes, dragged, target) {
            return Err(self.reject(StoreError::UnknownNote(dragged)));
        }
        reorder::renumber(&mut self.notes);
        let ordered = reorder::ordered_ids(&self.notes);
        let result = self.api.update_order(&ordered);
        self.settle(snapshot, "saving note order", result)?;
        self.succeed("note order saved".to_string());
        Ok(true)
    }

    pub fn move_note(&mut self, dragged: i64, target: i64) -> StoreResult<bool> {
        self.begin_drag(dragged)?;
        let result = self.drop_on(target);
        self.dragging = None;
        result
    }

    // ---- trash ---------------------------------------------------------

    /// Removes the note from the trash list; the main list picks it up on the
    /// next `reload`.
    pub fn restore_note(&mut self, id: i64) -> StoreResult<()> {
        let snapshot = self.snapshot();
        if !self.remove_from_trash(id) {
            return Err(self.reject(StoreError::UnknownNote(id)));
        }
        let result = self.api.restore_trashed(id);
        self.settle(snapshot, "restoring note", result)?;
        self.refresh_tags()?;
        self.succeed(format!("note #{id} restored"));
        Ok(())
    }

    pub fn purge_note(&mut self, id: i64) -> StoreResult<()> {
        let snapshot = self.snapshot();
        if !self.remove_from_trash(id) {
            return Err(self.reject(StoreError::UnknownNote(id)));
        }
        let result = self.api.purge_trashed(id);
        self.settle(snapshot, "deleting note permanently", result)?;
        self.succeed(format!("note #{id} deleted permanently"));
        Ok(())
    }

    pub fn empty_trash(&mut self) -> StoreResult<usize> {
        let snapshot = self.snapshot();
        let purged = std::mem::take(&mut self.trash).len();
        let result = self.api.empty_trash();
        self.settle(snapshot, "emptying trash", result)?;
        self.succeed(format!("{purged} note(s) deleted permanently"));
        Ok(purged)
    }

    pub fn restore_all(&mut self) -> StoreResult<usize> {
        let snapshot = self.snapshot();
        let restored = std::mem::take(&mut self.trash).len();
        let result = self.api.restore_all_trashed();
        self.settle(snapshot, "restoring trash", result)?;
        self.refresh_tags()?;
        self.succeed(format!("{restored} note(s) restored"));
        Ok(restored)
    }

    // ---- categories ----------------------------------------------------

    pub fn create_category(&mut self, name: &str, color: &str) -> StoreResult<Category> {
        let draft = self.category_draft(name, color)?;
        let created = self.api.create_category(&draft);
        let created = self.guard("creating category", created)?;
        self.categories.push(created.clone());
        self.succeed(format!("category '{}' created", created.name));
        Ok(created)
    }

    pub fn update_category(&mut self, id: i64, name: &str, color: &str) -> StoreResult<Category> {
        if self.category(id).is_none() {
            return Err(self.reject(StoreError::UnknownCategory(id)));
        }
        let draft = self.category_draft(name, color)?;
        let updated = self.api.update_category(id, &draft);
        let updated = self.guard("updating category", updated)?;
        if let Some(slot) = self.categories.iter_mut().find(|cat| cat.id == id) {
            *slot = updated.clone();
        }
        for note in &mut self.notes {
            if let Some(CategoryRef::Embedded(embedded)) = note.category.as_mut() {
                if embedded.id == id {
                    *embedded = updated.clone();
                }
            }
        }
        self.succeed(format!("category '{}' updated", updated.name));
        Ok(updated)
    }

    /// Notes in a deleted category become uncategorized, as the server does.
    pub fn delete_category(&mut self, id: i64) -> StoreResult<()> {
        let snapshot = self.snapshot();
        let before = self.categories.len();
        self.categories.retain(|category| category.id != id);
        if self.categories.len() == before {
            return Err(self.reject(StoreError::UnknownCategory(id)));
        }
        for note in &mut self.notes {
            if note.category_id() == Some(id) {
                note.category = None;
            }
        }
        self.filter.forget_category(id);
        let result = self.api.delete_category(id);
        self.settle(snapshot, "deleting category", result)?;
        self.succeed(format!("category #{id} deleted"));
        Ok(())
    }

    // ---- internals -----------------------------------------------------

    fn category_draft(&mut self, name: &str, color: &str) -> StoreResult<CategoryDraft> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.reject(StoreError::EmptyCategoryName));
        }
        let Some(color) = input::normalize_color(color) else {
            return Err(self.reject(StoreError::InvalidColor(color.to_string())));
        };
        Ok(CategoryDraft {
            name: name.to_string(),
            color,
        })
    }

    fn remove_from_notes(&mut self, id: i64) -> bool {
        let before = self.notes.len();
        self.notes.retain(|note| note.id != id);
        if self.dragging == Some(id) {
            self.dragging = None;
        }
        self.notes.len() != before
    }

    fn remove_from_trash(&mut self, id: i64) -> bool {
        let before = self.trash.len();
        self.trash.retain(|note| note.id != id);
        self.trash.len() != before
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            notes: self.notes.clone(),
            trash: self.trash.clone(),
            categories: self.categories.clone(),
            filter: self.filter.clone(),
        }
    }

    fn rollback(&mut self, snapshot: Snapshot) {
        self.notes = snapshot.notes;
        self.trash = snapshot.trash;
        self.categories = snapshot.categories;
        self.filter = snapshot.filter;
    }

    /// Finishes an optimistic mutation: on failure the snapshot is put back.
    fn settle<T>(&mut self, snapshot: Snapshot, action: &str, result: ApiResult<T>) -> StoreResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(%err, action, "rolling back optimistic update");
                self.rollback(snapshot);
                Err(self.fail(action, err))
            }
        }
    }

    /// Finishes a server-confirmed call; local state has not been touched yet.
    fn guard<T>(&mut self, action: &str, result: ApiResult<T>) -> StoreResult<T> {
        result.map_err(|err| self.fail(action, err))
    }

    fn fail(&mut self, action: &str, err: ApiError) -> StoreError {
        if err.is_unauthorized() {
            self.expire_session();
            return StoreError::SessionExpired;
        }
        tracing::error!(%err, action, "request failed");
        self.last_error = Some(format!("{action} failed: {err}"));
        self.status_message = None;
        StoreError::Api(err)
    }

    fn reject(&mut self, err: StoreError) -> StoreError {
        self.last_error = Some(err.to_string());
        self.status_message = None;
        err
    }

    fn succeed(&mut self, message: String) {
        self.last_error = None;
        self.status_message = Some(message);
    }

    /// Forced logout: drop the session and every piece of per-user state.
    fn expire_session(&mut self) {
        self.session.end();
        self.notes.clear();
        self.trash.clear();
        self.categories.clear();
        self.tags.clear();
        self.filter.clear();
        self.dragging = None;
        self.status_message = None;
        self.last_error = Some(StoreError::SessionExpired.to_string());
    }
}
