use std::fs;

use serde::Deserialize;

pub const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub block_writes: bool,
    pub weather_api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/events.db".into(),
            block_writes: false,
            weather_api_key: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    database_url: Option<String>,
    block_writes: Option<bool>,
    weather_api_key: Option<String>,
}

/// Defaults, then `server.toml`, then environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        if let Err(error) = apply_file_settings(&mut settings, &raw) {
            tracing::warn!(file = SETTINGS_FILE, %error, "ignoring unreadable settings file");
        }
    }

    apply_env_settings(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_settings(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.block_writes {
        settings.block_writes = v;
    }
    if let Some(v) = file_cfg.weather_api_key {
        settings.weather_api_key = Some(v);
    }
    Ok(())
}

fn apply_env_settings(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = var("BLOCK_WRITES") {
        settings.block_writes = parse_flag(&v);
    }

    if let Some(v) = var("API_KEY") {
        settings.weather_api_key = Some(v);
    }
    if let Some(v) = var("WEATHER_API_KEY") {
        settings.weather_api_key = Some(v);
    }
    settings.weather_api_key = settings
        .weather_api_key
        .take()
        .filter(|key| !key.trim().is_empty());
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim(), "True" | "true" | "TRUE" | "1")
}

/// Turns a bare path or `sqlite:` path into a `sqlite://` URL.
pub fn prepare_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    let path = raw_database_url
        .strip_prefix("sqlite:")
        .unwrap_or(raw_database_url)
        .replace('\\', "/");
    format!("sqlite://{path}")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
