use std::{fs, path::Path, time::Duration};

use grid_core::fetch::Messages;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct ViewerSettings {
    pub server_url: String,
    /// Dashboard component to mount; the first one when unset.
    pub component: Option<String>,
    pub desktop_layout: bool,
    pub request_timeout_ms: u64,
    pub messages: Messages,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            component: None,
            desktop_layout: true,
            request_timeout_ms: 10_000,
            messages: Messages::default(),
        }
    }
}

impl ViewerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    component: Option<String>,
    desktop_layout: Option<bool>,
    request_timeout_ms: Option<u64>,
    messages: Option<Messages>,
}

pub fn load_settings(path: &Path) -> ViewerSettings {
    load_settings_from(path, |key| std::env::var(key).ok())
}

/// Defaults, then the TOML file (if readable), then `DASHGRID_*` variables.
pub(crate) fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ViewerSettings {
    let mut settings = ViewerSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.server_url {
                    settings.server_url = v;
                }
                if let Some(v) = file_cfg.component {
                    settings.component = Some(v);
                }
                if let Some(v) = file_cfg.desktop_layout {
                    settings.desktop_layout = v;
                }
                if let Some(v) = file_cfg.request_timeout_ms {
                    settings.request_timeout_ms = v;
                }
                if let Some(v) = file_cfg.messages {
                    settings.messages = v;
                }
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "ignoring unparsable viewer settings");
            }
        }
    }

    if let Some(v) = env("DASHGRID_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("DASHGRID_COMPONENT") {
        settings.component = Some(v);
    }
    if let Some(v) = env("DASHGRID_DESKTOP_LAYOUT") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.desktop_layout = parsed;
        }
    }
    if let Some(v) = env("DASHGRID_REQUEST_TIMEOUT_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_ms = parsed;
        }
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
