use std::{fs, path::Path, time::Duration};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use shared::protocol::FieldNames;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "bookshelf.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub debounce_ms: u64,
    pub request_timeout_secs: u64,
    /// Key set for create/update bodies (`en` or `it`).
    pub wire_field_names: FieldNames,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/books".into(),
            debounce_ms: 500,
            request_timeout_secs: 15,
            wire_field_names: FieldNames::English,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    debounce_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    wire_field_names: Option<FieldNames>,
}

impl Settings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parsed collection URL with surrounding whitespace and trailing
    /// slashes removed.
    pub fn base_url(&self) -> Result<Url> {
        parse_base_url(&self.api_base_url)
    }
}

/// Defaults, then `bookshelf.toml` in the working directory, then the
/// process environment.
pub fn load_settings() -> Result<Settings> {
    let mut settings = Settings::default();
    let path = Path::new(DEFAULT_CONFIG_FILE);
    if path.exists() {
        apply_file(&mut settings, path)?;
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let mut settings = Settings::default();
    apply_file(&mut settings, path)?;
    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, path: &Path) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    let file_cfg: FileSettings = toml::from_str(&raw)
        .with_context(|| format!("invalid config file '{}'", path.display()))?;

    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.debounce_ms {
        settings.debounce_ms = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.wire_field_names {
        settings.wire_field_names = v;
    }
    Ok(())
}

pub(crate) fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("APP__DEBOUNCE_MS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.debounce_ms = parsed,
            Err(_) => tracing::warn!(value = %v, "ignoring unparsable APP__DEBOUNCE_MS"),
        }
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = parsed,
            Err(_) => tracing::warn!(value = %v, "ignoring unparsable APP__REQUEST_TIMEOUT_SECS"),
        }
    }

    if let Some(v) = lookup("APP__WIRE_FIELD_NAMES") {
        match v.parse::<FieldNames>() {
            Ok(parsed) => settings.wire_field_names = parsed,
            Err(err) => tracing::warn!(value = %v, %err, "ignoring APP__WIRE_FIELD_NAMES"),
        }
    }
}

pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(anyhow!("api base url must not be empty"));
    }
    let url = Url::parse(trimmed).with_context(|| format!("invalid api base url '{trimmed}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!(
            "api base url must use http or https, got '{}'",
            url.scheme()
        ));
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
