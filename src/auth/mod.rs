use thiserror::Error;

use crate::api::{ApiError, Credentials, NotesApi, Registration};
use crate::session::{Session, SessionHandle};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username (or email) and password are required")]
    MissingCredentials,
    #[error("all fields are required")]
    MissingFields,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.username.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
            || self.password_confirm.is_empty()
        {
            return Err(AuthError::MissingFields);
        }
        if self.password != self.password_confirm {
            return Err(AuthError::PasswordMismatch);
        }
        Ok(())
    }
}

/// Exchanges credentials for a token and starts the session on `handle`.
pub fn login<A: NotesApi>(
    api: &A,
    handle: &SessionHandle,
    form: &LoginForm,
) -> Result<Session, AuthError> {
    form.validate()?;
    let username = form.username.trim().to_string();
    let response = api.login(&Credentials {
        username: username.clone(),
        password: form.password.clone(),
    })?;
    let session = Session {
        token: response.key,
        username: response.username.unwrap_or(username),
        is_admin: response.is_staff,
    };
    handle.begin(session.clone());
    Ok(session)
}

/// Creates the account. The caller still has to log in afterwards.
pub fn register<A: NotesApi>(api: &A, form: &RegisterForm) -> Result<(), AuthError> {
    form.validate()?;
    api.register(&Registration {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        password1: form.password.clone(),
        password2: form.password_confirm.clone(),
    })?;
    Ok(())
}
