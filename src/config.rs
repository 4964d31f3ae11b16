// AeroDrive client configuration
// Persistent client-side preferences: backend URL override, transport
// mode, cached auth token, last browsed path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::ApiError;

/// Default backend when nothing is configured. The web build of the
/// original frontend derives this from the page origin; the client uses a
/// fixed localhost default like the desktop shell does.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Environment override, checked between the persisted value and the
/// built-in default.
pub const BASE_URL_ENV: &str = "AERODRIVE_API_URL";

/// How authentication travels to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Browser-style cookie session (`credentials: include`).
    #[default]
    CookieSession,
    /// Desktop-shell style: `X-Auth-Token` header with a cached token.
    TokenHeader,
}

/// Persisted client preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prefs {
    /// Explicit backend URL override. `None` means fall through to the
    /// environment and then the built-in default.
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub transport: TransportMode,
    /// Auth token cached after a successful login in token mode.
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Backend path the explorer was last looking at.
    #[serde(default)]
    pub last_path: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Where this config was loaded from; not serialized.
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl Default for Prefs {
    fn default() -> Self {
        Self {
            server_url: None,
            transport: TransportMode::default(),
            auth_token: None,
            username: None,
            last_path: None,
            updated_at: None,
            source: None,
        }
    }
}

/// Path of the default config file.
fn default_config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));
    config_dir.join("aerodrive").join("config.json")
}

impl Prefs {
    /// Load preferences from the default location, falling back to defaults
    /// on any read or parse failure.
    pub fn load() -> Prefs {
        Self::load_from(&default_config_path())
    }

    /// Load preferences from an explicit path (tests point this at a
    /// temp dir).
    pub fn load_from(path: &Path) -> Prefs {
        let mut prefs = if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str::<Prefs>(&content) {
                    Ok(prefs) => prefs,
                    Err(e) => {
                        tracing::warn!("failed to parse config {:?}: {}", path, e);
                        Prefs::default()
                    }
                },
                Err(e) => {
                    tracing::warn!("failed to read config {:?}: {}", path, e);
                    Prefs::default()
                }
            }
        } else {
            Prefs::default()
        };
        prefs.source = Some(path.to_path_buf());
        prefs
    }

    /// Save preferences back to the path they were loaded from.
    pub fn save(&mut self) -> Result<(), String> {
        let path = self.source.clone().unwrap_or_else(default_config_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create config directory: {}", e))?;
        }
        self.updated_at = Some(Utc::now());
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize config: {}", e))?;
        fs::write(&path, content).map_err(|e| format!("failed to write config: {}", e))?;
        tracing::debug!("config saved to {:?}", path);
        Ok(())
    }

    /// Set (or with `None`, clear) the backend URL override. The value is
    /// validated syntactically before it is stored.
    pub fn set_server_url(&mut self, url: Option<String>) -> Result<(), ApiError> {
        if let Some(ref raw) = url {
            validate_base_url(raw)?;
        }
        self.server_url = url;
        Ok(())
    }

    /// Resolve the backend base URL for this session:
    /// persisted override → environment → built-in default. Never fails;
    /// an unparseable override is skipped with a warning.
    pub fn resolve_base_url(&self) -> String {
        if let Some(ref url) = self.server_url {
            if validate_base_url(url).is_ok() {
                return url.trim_end_matches('/').to_string();
            }
            tracing::warn!("ignoring invalid configured server URL: {}", url);
        }
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.is_empty() && validate_base_url(&url).is_ok() {
                return url.trim_end_matches('/').to_string();
            }
        }
        DEFAULT_BASE_URL.to_string()
    }
}

/// Check that a backend URL is well-formed http(s).
pub fn validate_base_url(raw: &str) -> Result<(), ApiError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ApiError::Validation(format!("invalid backend URL '{}': {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ApiError::Validation(format!(
                "unsupported URL scheme '{}', expected http or https",
                other
            )))
        }
    }
    if parsed.host_str().is_none() {
        return Err(ApiError::Validation(format!(
            "backend URL '{}' has no host",
            raw
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefs() {
        let prefs = Prefs::default();
        assert!(prefs.server_url.is_none());
        assert_eq!(prefs.transport, TransportMode::CookieSession);
        assert!(prefs.auth_token.is_none());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut prefs = Prefs::load_from(&path);
        prefs
            .set_server_url(Some("http://files.example.com:8000".into()))
            .unwrap();
        prefs.transport = TransportMode::TokenHeader;
        prefs.auth_token = Some("tok-1".into());
        prefs.last_path = Some("/Images".into());
        prefs.save().unwrap();

        let reloaded = Prefs::load_from(&path);
        assert_eq!(
            reloaded.server_url.as_deref(),
            Some("http://files.example.com:8000")
        );
        assert_eq!(reloaded.transport, TransportMode::TokenHeader);
        assert_eq!(reloaded.auth_token.as_deref(), Some("tok-1"));
        assert_eq!(reloaded.last_path.as_deref(), Some("/Images"));
        assert!(reloaded.updated_at.is_some());
    }

    #[test]
    fn test_set_server_url_rejects_garbage() {
        let mut prefs = Prefs::default();
        assert!(prefs.set_server_url(Some("not a url".into())).is_err());
        assert!(prefs.set_server_url(Some("ftp://host".into())).is_err());
        assert!(prefs.server_url.is_none());
        assert!(prefs
            .set_server_url(Some("https://drive.example.com".into()))
            .is_ok());
    }

    #[test]
    fn test_resolve_prefers_override_and_trims_slash() {
        let mut prefs = Prefs::default();
        prefs.server_url = Some("http://box.local:8000/".into());
        assert_eq!(prefs.resolve_base_url(), "http://box.local:8000");
    }

    #[test]
    fn test_resolve_skips_invalid_override() {
        let mut prefs = Prefs::default();
        prefs.server_url = Some(":::".into());
        assert_eq!(prefs.resolve_base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_parse_failure_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let prefs = Prefs::load_from(&path);
        assert!(prefs.server_url.is_none());
    }
}
