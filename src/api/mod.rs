use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

mod http;
#[cfg(test)]
pub(crate) mod memory;
pub mod models;

pub use http::HttpClient;
pub use models::{
    Category, CategoryDraft, CategoryRef, Credentials, LoginResponse, Note, NoteDraft, NotePatch,
    Registration, ShareLink, TagCount,
};

const AUTH_FALLBACK_MESSAGE: &str = "request failed";
const MAX_MESSAGE_CHARS: usize = 200;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session expired, please log in again")]
    Unauthorized,
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

/// REST surface of the note service.
pub trait NotesApi {
    fn list_notes(&self, search: Option<&str>) -> ApiResult<Vec<Note>>;
    fn create_note(&self, draft: &NoteDraft) -> ApiResult<Note>;
    fn update_note(&self, id: i64, patch: &NotePatch) -> ApiResult<Note>;
    fn delete_note(&self, id: i64) -> ApiResult<()>;
    fn trash_note(&self, id: i64) -> ApiResult<()>;
    fn toggle_pin(&self, id: i64) -> ApiResult<()>;
    fn share_note(&self, id: i64) -> ApiResult<ShareLink>;
    /// Replaces the manual order with `ordered_ids`, first id first.
    fn update_order(&self, ordered_ids: &[i64]) -> ApiResult<()>;

    fn list_trashed(&self) -> ApiResult<Vec<Note>>;
    fn restore_trashed(&self, id: i64) -> ApiResult<()>;
    fn purge_trashed(&self, id: i64) -> ApiResult<()>;
    fn empty_trash(&self) -> ApiResult<()>;
    fn restore_all_trashed(&self) -> ApiResult<()>;

    fn list_categories(&self) -> ApiResult<Vec<Category>>;
    fn create_category(&self, draft: &CategoryDraft) -> ApiResult<Category>;
    fn update_category(&self, id: i64, draft: &CategoryDraft) -> ApiResult<Category>;
    fn delete_category(&self, id: i64) -> ApiResult<()>;

    fn list_tags(&self) -> ApiResult<Vec<TagCount>>;
    fn public_note(&self, share_uuid: Uuid) -> ApiResult<Note>;

    fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse>;
    fn register(&self, registration: &Registration) -> ApiResult<()>;
}

/// Error text for a failed authenticated request, taken from the raw body.
pub(crate) fn failure_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    truncate_chars(trimmed, MAX_MESSAGE_CHARS)
}

/// Error text for a failed login/registration: `non_field_errors[0]`, else every
/// field message joined by spaces.
pub(crate) fn auth_failure_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return AUTH_FALLBACK_MESSAGE.to_string();
    };
    if let Some(first) = value
        .get("non_field_errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(Value::as_str)
    {
        return first.to_string();
    }
    let Some(fields) = value.as_object() else {
        return AUTH_FALLBACK_MESSAGE.to_string();
    };
    let mut parts = Vec::new();
    for field in fields.values() {
        match field {
            Value::String(message) => parts.push(message.clone()),
            Value::Array(messages) => {
                parts.extend(messages.iter().filter_map(Value::as_str).map(str::to_string))
            }
            _ => {}
        }
    }
    if parts.is_empty() {
        AUTH_FALLBACK_MESSAGE.to_string()
    } else {
        parts.join(" ")
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_message_prefers_non_field_errors() {
        let body = r#"{"non_field_errors": ["Unable to log in with provided credentials."], "password": ["x"]}"#;
        assert_eq!(
            auth_failure_message(body),
            "Unable to log in with provided credentials."
        );
    }

    #[test]
    fn auth_message_flattens_field_errors() {
        let body = r#"{"username": ["A user with that username already exists."], "email": "Enter a valid email address."}"#;
        let message = auth_failure_message(body);
        assert!(message.contains("A user with that username already exists."));
        assert!(message.contains("Enter a valid email address."));
    }

    #[test]
    fn auth_message_falls_back_for_non_json() {
        assert_eq!(auth_failure_message("<html>502</html>"), "request failed");
        assert_eq!(auth_failure_message("{}"), "request failed");
    }

    #[test]
    fn failure_message_truncates_long_bodies() {
        let body = "x".repeat(500);
        let message = failure_message(&body);
        assert_eq!(message.chars().count(), MAX_MESSAGE_CHARS + 1);
        assert_eq!(failure_message("   "), "empty response body");
    }
}
