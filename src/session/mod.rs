use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::{ConfigPaths, ThemeName};

const TMP_EXTENSION: &str = "json.tmp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Shared view of the logged-in session. The HTTP client reads the token from
/// it; the store ends it when the server answers 401.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionHandle {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    pub fn begin(&self, session: Session) {
        tracing::info!(user = %session.username, "session started");
        *self.inner.write() = Some(session);
    }

    pub fn end(&self) -> Option<Session> {
        let previous = self.inner.write().take();
        if let Some(session) = &previous {
            tracing::info!(user = %session.username, "session ended");
        }
        previous
    }

    pub fn current(&self) -> Option<Session> {
        self.inner.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.read().as_ref().map(|session| session.token.clone())
    }

    pub fn is_active(&self) -> bool {
        self.inner.read().is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Option<ThemeName>,
}

impl Preferences {
    /// Stored choice wins; the configured theme applies until the user picks one.
    pub fn effective_theme(&self, configured: ThemeName) -> ThemeName {
        self.theme.unwrap_or(configured)
    }
}

/// On-disk home of the session token and user preferences.
#[derive(Debug, Clone)]
pub struct SessionStore {
    session_file: PathBuf,
    preferences_file: PathBuf,
}

impl SessionStore {
    pub fn new(paths: &ConfigPaths) -> Self {
        Self {
            session_file: paths.session_file.clone(),
            preferences_file: paths.preferences_file.clone(),
        }
    }

    pub fn load(&self) -> Result<Option<Session>> {
        read_json(&self.session_file)
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        write_json(&self.session_file, session)
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.session_file) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("removing session {}", self.session_file.display())),
        }
    }

    pub fn load_preferences(&self) -> Result<Preferences> {
        Ok(read_json(&self.preferences_file)?.unwrap_or_default())
    }

    pub fn save_preferences(&self, preferences: &Preferences) -> Result<()> {
        write_json(&self.preferences_file, preferences)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };
    let value =
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(value))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).context("serialising state file")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("ensuring state dir {}", parent.display()))?;
    }
    let tmp_path = path.with_extension(TMP_EXTENSION);
    fs::write(&tmp_path, &json)
        .with_context(|| format!("writing temporary state file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("atomically persisting {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> SessionStore {
        let root = temp.path();
        let paths = ConfigPaths::rooted(
            root.join("config"),
            root.join("config/config.toml"),
            root.join("state"),
        );
        SessionStore::new(&paths)
    }

    fn sample() -> Session {
        Session {
            token: "abc".into(),
            username: "ada".into(),
            is_admin: true,
        }
    }

    #[test]
    fn session_round_trips_and_clears() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = store_in(&temp);
        assert_eq!(store.load()?, None);

        store.save(&sample())?;
        assert_eq!(store.load()?, Some(sample()));

        store.clear()?;
        assert_eq!(store.load()?, None);
        store.clear()?;
        Ok(())
    }

    #[test]
    fn preferences_default_to_configured_theme() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = store_in(&temp);
        let prefs = store.load_preferences()?;
        assert_eq!(prefs.effective_theme(ThemeName::Dark), ThemeName::Dark);

        store.save_preferences(&Preferences {
            theme: Some(ThemeName::Light),
        })?;
        let prefs = store.load_preferences()?;
        assert_eq!(prefs.effective_theme(ThemeName::Dark), ThemeName::Light);
        Ok(())
    }

    #[test]
    fn handle_begin_and_end() {
        let handle = SessionHandle::default();
        assert!(!handle.is_active());
        handle.begin(sample());
        assert_eq!(handle.token().as_deref(), Some("abc"));
        let clone = handle.clone();
        assert_eq!(clone.end(), Some(sample()));
        assert!(!handle.is_active());
        assert_eq!(handle.end(), None);
    }
}
