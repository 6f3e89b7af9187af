// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider client for the OAuth implicit grant.
//!
//! Handles:
//! - Building the authorization (consent) URL
//! - Fetching the user profile with a bearer token

use crate::config::Config;
use crate::error::AppError;
use crate::models::UserProfile;
use serde::Deserialize;
use url::Url;

/// Identity provider client.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    auth_url: String,
    userinfo_url: String,
    client_id: String,
    scope: String,
}

impl IdentityClient {
    /// Create a new identity client from the OAuth settings in `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth_url: config.oauth_auth_url.clone(),
            userinfo_url: config.oauth_userinfo_url.clone(),
            client_id: config.oauth_client_id.clone(),
            scope: config.oauth_scope.clone(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Authorization URL for the implicit grant, returning to `redirect_uri`.
    pub fn authorization_url(&self, redirect_uri: &str) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.auth_url).map_err(|e| {
            AppError::Internal(anyhow::anyhow!(
                "Invalid authorization URL {}: {}",
                self.auth_url,
                e
            ))
        })?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "token")
            .append_pair("scope", &self.scope)
            .append_pair("access_type", "online")
            .append_pair("prompt", "select_account");

        Ok(url)
    }

    /// Get the profile of the user the token was issued to.
    pub async fn get_user_info(&self, access_token: &str) -> Result<UserProfile, AppError> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::IdentityApi(format!("Userinfo request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                return Err(AppError::InvalidToken);
            }

            return Err(AppError::IdentityApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::IdentityApi(format!("JSON parse error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url_parameters() {
        let client = IdentityClient::new(&Config::default());
        let url = client
            .authorization_url("http://localhost:5173")
            .expect("valid URL");

        assert!(url
            .as_str()
            .starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let get = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(
            get("client_id"),
            Some("test_client_id.apps.googleusercontent.com")
        );
        assert_eq!(get("redirect_uri"), Some("http://localhost:5173"));
        assert_eq!(get("response_type"), Some("token"));
        assert_eq!(get("scope"), Some("openid email profile"));
        assert_eq!(get("access_type"), Some("online"));
        assert_eq!(get("prompt"), Some("select_account"));
    }

    #[test]
    fn test_invalid_authorization_endpoint() {
        let config = Config {
            oauth_auth_url: "not a url".to_string(),
            ..Config::default()
        };
        let client = IdentityClient::new(&config);
        assert!(matches!(
            client.authorization_url("http://localhost:5173"),
            Err(AppError::Internal(_))
        ));
    }
}
