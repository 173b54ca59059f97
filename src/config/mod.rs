use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub mod themes;

pub use themes::ThemeName;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "NotesClient";
const APP_NAME: &str = "notes-client";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load();
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load();
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub state_dir: PathBuf,
    pub session_file: PathBuf,
    pub preferences_file: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("NOTES_CLIENT_CONFIG").ok().map(PathBuf::from);
        let override_state = env::var("NOTES_CLIENT_STATE").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let state_dir = override_state.unwrap_or_else(|| {
            project_dirs
                .state_dir()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| project_dirs.data_dir().join("state"))
        });

        Ok(Self::rooted(config_dir, config_file, state_dir))
    }

    pub fn rooted(config_dir: PathBuf, config_file: PathBuf, state_dir: PathBuf) -> Self {
        Self {
            session_file: state_dir.join("session.json"),
            preferences_file: state_dir.join("preferences.json"),
            config_dir,
            config_file,
            state_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.state_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub theme: ThemeName,
    pub filter_mode: FilterMode,
    pub api: ApiOptions,
    pub search: SearchOptions,
    pub trash: TrashOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            theme: ThemeName::Light,
            filter_mode: FilterMode::Exclusive,
            api: ApiOptions::default(),
            search: SearchOptions::default(),
            trash: TrashOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self) {
        let trimmed = self.api.base_url.trim_end_matches('/');
        if trimmed.len() != self.api.base_url.len() {
            self.api.base_url = trimmed.to_string();
        }
        if self.api.base_url.is_empty() {
            tracing::warn!("empty api.base_url in config, falling back to default");
            self.api.base_url = ApiOptions::default().base_url;
        }
        if self.api.timeout_secs == 0 {
            tracing::warn!("api.timeout_secs of 0 is not allowed, using 30");
            self.api.timeout_secs = 30;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiOptions {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub debounce_ms: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

impl SearchOptions {
    pub fn debounce_duration(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrashOptions {
    /// Server-side purge window used for the countdown label (0 = manual purge only)
    pub retention_days: u32,
}

impl Default for TrashOptions {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

/// How the tag filter and the category filter interact when both are selected.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FilterMode {
    /// Selecting one dimension clears the other.
    #[default]
    Exclusive,
    Combined,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        ConfigPaths::rooted(
            base.join("config"),
            base.join("config/config.toml"),
            base.join("state"),
        )
    }

    #[test]
    fn load_or_init_writes_default_config() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::with_paths(temp_paths(&temp));
        let cfg = loader.load_or_init()?;
        assert!(loader.paths().config_file.exists());
        assert_eq!(cfg.filter_mode, FilterMode::Exclusive);
        assert_eq!(cfg.search.debounce_ms, 500);

        let reloaded = loader.load()?;
        assert_eq!(reloaded.api.base_url, cfg.api.base_url);
        assert_eq!(reloaded.trash.retention_days, 30);
        Ok(())
    }

    #[test]
    fn load_normalizes_base_url_and_reads_filter_mode() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "filter_mode = \"combined\"\ntheme = \"dark\"\n\n[api]\nbase_url = \"https://notes.example.com/\"\ntimeout_secs = 0\n",
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.api.base_url, "https://notes.example.com");
        assert_eq!(cfg.api.timeout_secs, 30);
        assert_eq!(cfg.filter_mode, FilterMode::Combined);
        assert_eq!(cfg.theme, ThemeName::Dark);
        Ok(())
    }

    #[test]
    fn filter_mode_parses_from_cli_strings() {
        assert_eq!("combined".parse::<FilterMode>().ok(), Some(FilterMode::Combined));
        assert_eq!(FilterMode::Exclusive.to_string(), "exclusive");
    }
}
