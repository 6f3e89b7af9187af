//! Application configuration loaded from environment variables.
//!
//! Everything except the OAuth client ID has a default suitable for local
//! development against the Vite dev server.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const DEFAULT_SCOPE: &str = "openid email profile";
const DEFAULT_STORAGE_PATH: &str = ".awards-session.json";
const DEFAULT_LIKE_DEBOUNCE_MS: u64 = 300;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// OAuth client ID registered with the identity provider (public)
    pub oauth_client_id: String,
    /// Origin the application is served from; used as the redirect target
    pub app_origin: String,
    /// Authorization endpoint for the implicit grant
    pub oauth_auth_url: String,
    /// Userinfo endpoint used to resolve the profile
    pub oauth_userinfo_url: String,
    /// Space-separated OAuth scopes
    pub oauth_scope: String,
    /// File backing the durable session storage
    pub session_storage_path: PathBuf,
    /// Quiescence window for like aggregation
    pub like_debounce: Duration,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            oauth_client_id: "test_client_id.apps.googleusercontent.com".to_string(),
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            oauth_auth_url: DEFAULT_AUTH_URL.to_string(),
            oauth_userinfo_url: DEFAULT_USERINFO_URL.to_string(),
            oauth_scope: DEFAULT_SCOPE.to_string(),
            session_storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            like_debounce: Duration::from_millis(DEFAULT_LIKE_DEBOUNCE_MS),
            gcp_project_id: "test-project".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let like_debounce_ms = match env::var("LIKE_DEBOUNCE_MS") {
            Ok(v) => v
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid("LIKE_DEBOUNCE_MS", v))?,
            Err(_) => DEFAULT_LIKE_DEBOUNCE_MS,
        };

        Ok(Self {
            oauth_client_id: env::var("OAUTH_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("OAUTH_CLIENT_ID"))?,
            app_origin: env::var("APP_ORIGIN")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_APP_ORIGIN.to_string()),
            oauth_auth_url: env::var("OAUTH_AUTH_URL")
                .unwrap_or_else(|_| DEFAULT_AUTH_URL.to_string()),
            oauth_userinfo_url: env::var("OAUTH_USERINFO_URL")
                .unwrap_or_else(|_| DEFAULT_USERINFO_URL.to_string()),
            oauth_scope: env::var("OAUTH_SCOPE").unwrap_or_else(|_| DEFAULT_SCOPE.to_string()),
            session_storage_path: env::var("SESSION_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE_PATH)),
            like_debounce: Duration::from_millis(like_debounce_ms),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("OAUTH_CLIENT_ID", " test_id ");
        env::set_var("APP_ORIGIN", "https://awards.example.com/");
        env::set_var("LIKE_DEBOUNCE_MS", "250");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.oauth_client_id, "test_id");
        assert_eq!(config.app_origin, "https://awards.example.com");
        assert_eq!(config.like_debounce, Duration::from_millis(250));
        assert_eq!(config.oauth_scope, DEFAULT_SCOPE);

        env::set_var("LIKE_DEBOUNCE_MS", "soon");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("LIKE_DEBOUNCE_MS", _)));

        env::remove_var("LIKE_DEBOUNCE_MS");
        env::remove_var("APP_ORIGIN");
    }

    #[test]
    fn test_default_debounce_window() {
        assert_eq!(Config::default().like_debounce, Duration::from_millis(300));
    }
}
