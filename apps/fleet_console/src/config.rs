use std::{collections::HashMap, fs, path::Path};

use anyhow::{bail, Context};
use tracing::warn;
use url::Url;

pub const SETTINGS_FILE: &str = "fleet.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub app_name: String,
    pub user_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            app_name: "agent".into(),
            user_id: "user".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file, then environment variables. The
/// `APP__` spelling wins over the `FLEET_` one when both are set.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("base_url") {
                    settings.base_url = v.clone();
                }
                if let Some(v) = file_cfg.get("app_name") {
                    settings.app_name = v.clone();
                }
                if let Some(v) = file_cfg.get("user_id") {
                    settings.user_id = v.clone();
                }
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable settings file");
            }
        }
    }

    for key in ["FLEET_BASE_URL", "APP__BASE_URL"] {
        if let Some(v) = env(key) {
            settings.base_url = v;
        }
    }
    for key in ["FLEET_APP_NAME", "APP__APP_NAME"] {
        if let Some(v) = env(key) {
            settings.app_name = v;
        }
    }
    for key in ["FLEET_USER_ID", "APP__USER_ID"] {
        if let Some(v) = env(key) {
            settings.user_id = v;
        }
    }

    settings
}

/// Validates the API base URL and strips any trailing slash so resource
/// paths can be appended directly.
pub fn prepare_base_url(raw_base_url: &str) -> anyhow::Result<String> {
    let raw_base_url = raw_base_url.trim();
    if raw_base_url.is_empty() {
        return Ok(Settings::default().base_url);
    }

    let url = Url::parse(raw_base_url)
        .with_context(|| format!("invalid API base url '{raw_base_url}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!(
            "API base url '{raw_base_url}' must use http or https, not '{}'",
            url.scheme()
        );
    }
    if url.query().is_some() || url.fragment().is_some() {
        bail!("API base url '{raw_base_url}' must not carry a query or fragment");
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
