use parking_lot::Mutex;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, SET_COOKIE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::models::OrderUpdate;
use super::{
    auth_failure_message, failure_message, ApiError, ApiResult, Category, CategoryDraft,
    Credentials, LoginResponse, Note, NoteDraft, NotePatch, NotesApi, Registration, ShareLink,
    TagCount,
};
use crate::config::ApiOptions;
use crate::session::SessionHandle;

const CSRF_COOKIE: &str = "csrftoken";
const CSRF_HEADER: &str = "X-CSRFToken";

/// Blocking HTTP transport that injects the session token on every call.
pub struct HttpClient {
    base_url: String,
    client: Client,
    session: SessionHandle,
    csrf_token: Mutex<Option<String>>,
}

impl HttpClient {
    pub fn new(options: &ApiOptions, session: SessionHandle) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(options.timeout())
            .user_agent(concat!("notes-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: options.base_url.trim_end_matches('/').to_string(),
            client,
            session,
            csrf_token: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let unsafe_method = !matches!(method, Method::GET | Method::HEAD | Method::OPTIONS);
        let mut builder = self
            .client
            .request(method, self.url(path))
            .header(ACCEPT, "application/json");
        if let Some(token) = self.session.token() {
            builder = builder.header(AUTHORIZATION, format!("Token {token}"));
        }
        if unsafe_method {
            if let Some(csrf) = self.csrf_token.lock().clone() {
                builder = builder.header(CSRF_HEADER, csrf);
            }
        }
        builder
    }

    fn execute(&self, builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder.send()?;
        self.capture_csrf(&response);
        let status = response.status();
        tracing::debug!(url = %response.url(), %status, "api response");
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: failure_message(&body),
            });
        }
        Ok(response)
    }

    fn fetch_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let response = self.execute(builder)?;
        let bytes = response.bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn fetch_empty(&self, builder: RequestBuilder) -> ApiResult<()> {
        self.execute(builder).map(drop)
    }

    /// Login and registration report failures as field errors, including 401.
    fn post_auth<P: Serialize>(&self, path: &str, payload: &P) -> ApiResult<Response> {
        let response = self
            .client
            .post(self.url(path))
            .header(ACCEPT, "application/json")
            .json(payload)
            .send()?;
        self.capture_csrf(&response);
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: auth_failure_message(&body),
            });
        }
        Ok(response)
    }

    fn capture_csrf(&self, response: &Response) {
        for header in response.headers().get_all(SET_COOKIE) {
            let Ok(raw) = header.to_str() else {
                continue;
            };
            if let Some(token) = csrf_from_cookie(raw) {
                *self.csrf_token.lock() = Some(token);
            }
        }
    }
}

impl NotesApi for HttpClient {
    fn list_notes(&self, search: Option<&str>) -> ApiResult<Vec<Note>> {
        let mut builder = self.request(Method::GET, "/api/notes/");
        if let Some(term) = search.filter(|term| !term.is_empty()) {
            builder = builder.query(&[("search", term)]);
        }
        self.fetch_json(builder)
    }

    fn create_note(&self, draft: &NoteDraft) -> ApiResult<Note> {
        self.fetch_json(self.request(Method::POST, "/api/notes/").json(draft))
    }

    fn update_note(&self, id: i64, patch: &NotePatch) -> ApiResult<Note> {
        self.fetch_json(
            self.request(Method::PATCH, &format!("/api/notes/{id}/"))
                .json(patch),
        )
    }

    fn delete_note(&self, id: i64) -> ApiResult<()> {
        self.fetch_empty(self.request(Method::DELETE, &format!("/api/notes/{id}/")))
    }

    fn trash_note(&self, id: i64) -> ApiResult<()> {
        self.fetch_empty(self.request(Method::POST, &format!("/api/notes/{id}/trash/")))
    }

    fn toggle_pin(&self, id: i64) -> ApiResult<()> {
        self.fetch_empty(self.request(Method::POST, &format!("/api/notes/{id}/toggle_pin/")))
    }

    fn share_note(&self, id: i64) -> ApiResult<ShareLink> {
        self.fetch_json(self.request(Method::POST, &format!("/api/notes/{id}/share/")))
    }

    fn update_order(&self, ordered_ids: &[i64]) -> ApiResult<()> {
        self.fetch_empty(
            self.request(Method::PUT, "/api/notes/update_order/")
                .json(&OrderUpdate { ordered_ids }),
        )
    }

    fn list_trashed(&self) -> ApiResult<Vec<Note>> {
        self.fetch_json(self.request(Method::GET, "/api/trashed-notes/"))
    }

    fn restore_trashed(&self, id: i64) -> ApiResult<()> {
        self.fetch_empty(self.request(
            Method::POST,
            &format!("/api/trashed-notes/{id}/restore/"),
        ))
    }

    fn purge_trashed(&self, id: i64) -> ApiResult<()> {
        self.fetch_empty(self.request(Method::DELETE, &format!("/api/trashed-notes/{id}/")))
    }

    fn empty_trash(&self) -> ApiResult<()> {
        self.fetch_empty(self.request(Method::DELETE, "/api/trashed-notes/empty-all/"))
    }

    fn restore_all_trashed(&self) -> ApiResult<()> {
        self.fetch_empty(self.request(Method::PUT, "/api/trashed-notes/restore-all/"))
    }

    fn list_categories(&self) -> ApiResult<Vec<Category>> {
        self.fetch_json(self.request(Method::GET, "/api/categories/"))
    }

    fn create_category(&self, draft: &CategoryDraft) -> ApiResult<Category> {
        self.fetch_json(self.request(Method::POST, "/api/categories/").json(draft))
    }

    fn update_category(&self, id: i64, draft: &CategoryDraft) -> ApiResult<Category> {
        self.fetch_json(
            self.request(Method::PATCH, &format!("/api/categories/{id}/"))
                .json(draft),
        )
    }

    fn delete_category(&self, id: i64) -> ApiResult<()> {
        self.fetch_empty(self.request(Method::DELETE, &format!("/api/categories/{id}/")))
    }

    fn list_tags(&self) -> ApiResult<Vec<TagCount>> {
        self.fetch_json(self.request(Method::GET, "/api/tags/"))
    }

    fn public_note(&self, share_uuid: Uuid) -> ApiResult<Note> {
        let builder = self
            .client
            .get(self.url(&format!("/api/public/notes/{share_uuid}/")))
            .header(ACCEPT, "application/json");
        self.fetch_json(builder)
    }

    fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse> {
        let response = self.post_auth("/api/auth/login/", credentials)?;
        let bytes = response.bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn register(&self, registration: &Registration) -> ApiResult<()> {
        self.post_auth("/api/auth/registration/", registration)
            .map(drop)
    }
}

fn csrf_from_cookie(raw: &str) -> Option<String> {
    let pair = raw.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    if name.trim() != CSRF_COOKIE {
        return None;
    }
    let value = value.trim().trim_matches('"');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
