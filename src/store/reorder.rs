use crate::api::Note;

/// Pinned notes stay ahead of unpinned ones; relative order is otherwise kept.
pub(crate) fn pin_partition(notes: &mut [Note]) {
    notes.sort_by_key(|note| !note.is_pinned);
}

/// Ordering applied to a freshly loaded list: pinned first, then manual order.
pub(crate) fn sort_loaded(notes: &mut [Note]) {
    notes.sort_by_key(|note| (!note.is_pinned, note.order));
}

/// Moves `dragged` into the slot currently held by `target`, shifting the
/// notes in between. Returns `false` when either id is missing.
pub(crate) fn move_to_target(notes: &mut Vec<Note>, dragged: i64, target: i64) -> bool {
    let Some(from) = notes.iter().position(|note| note.id == dragged) else {
        return false;
    };
    let Some(to) = notes.iter().position(|note| note.id == target) else {
        return false;
    };
    let item = notes.remove(from);
    notes.insert(to, item);
    true
}

pub(crate) fn renumber(notes: &mut [Note]) {
    for (position, note) in notes.iter_mut().enumerate() {
        note.order = position as i64;
    }
}

pub(crate) fn ordered_ids(notes: &[Note]) -> Vec<i64> {
    notes.iter().map(|note| note.id).collect()
}
