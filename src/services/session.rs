// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth implicit-grant session manager.
//!
//! Owns the bearer token and the profile derived from it:
//! - Restoring a persisted session at startup (expired tokens are dropped)
//! - Sending the user to the identity provider
//! - Picking the token out of the redirect fragment
//! - Resolving the profile in the background and notifying observers
//! - Hard logout

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::host::{origin_of, Navigator};
use crate::models::{SessionState, SessionToken, UserProfile};
use crate::services::identity::IdentityClient;
use crate::storage::{SessionStorage, PROFILE_KEY, TOKEN_KEY};
use crate::time_utils::Clock;

/// What a URL fragment turned out to contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectFragment {
    /// Implicit-grant success response.
    Token(SessionToken),
    /// Implicit-grant error response (`error=access_denied`, ...).
    Error(String),
    /// Anything else; most navigations are not OAuth returns.
    NotOAuth,
}

/// Parse an implicit-grant response out of a URL fragment (without the `#`).
///
/// `access_token` and a non-negative integer `expires_in` whose expiry is
/// representable are required; `token_type` defaults to `Bearer` and `scope`
/// to empty.
pub fn parse_redirect_fragment(fragment: &str, received_at: DateTime<Utc>) -> RedirectFragment {
    let params: HashMap<String, String> = url::form_urlencoded::parse(fragment.as_bytes())
        .into_owned()
        .collect();

    if let Some(error) = params.get("error") {
        return RedirectFragment::Error(error.clone());
    }

    let Some(access_token) = params.get("access_token").filter(|t| !t.is_empty()) else {
        return RedirectFragment::NotOAuth;
    };
    let Some(expires_in) = params
        .get("expires_in")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|secs| *secs >= 0)
    else {
        return RedirectFragment::NotOAuth;
    };

    let Some(mut token) = SessionToken::issued(access_token.clone(), expires_in, received_at)
    else {
        return RedirectFragment::NotOAuth;
    };
    if let Some(token_type) = params.get("token_type").filter(|t| !t.is_empty()) {
        token.token_type = token_type.clone();
    }
    if let Some(scope) = params.get("scope") {
        token.scope = scope.clone();
    }

    RedirectFragment::Token(token)
}

type Observer = Arc<dyn Fn(Option<UserProfile>) + Send + Sync>;

#[derive(Default)]
struct ObserverRegistry {
    next_id: AtomicU64,
    observers: DashMap<u64, Observer>,
}

/// Handle for a registered observer.
///
/// Dropping the handle (or calling [`Subscription::unsubscribe`]) removes the
/// observer; [`Subscription::detach`] keeps it for the manager's lifetime.
#[must_use = "dropping a Subscription unsubscribes the observer"]
pub struct Subscription {
    id: u64,
    registry: Weak<ObserverRegistry>,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    pub fn detach(mut self) {
        self.registry = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.observers.remove(&self.id);
        }
    }
}

#[derive(Default)]
struct SessionInner {
    token: Option<SessionToken>,
    profile: Option<UserProfile>,
    restored: bool,
}

/// Process-wide OAuth session.
///
/// Construct one at startup and share it as `Arc<SessionManager>`. It is the
/// only writer of the token/profile pair; everything else reads through the
/// accessors or subscribes.
pub struct SessionManager {
    identity: IdentityClient,
    storage: Arc<dyn SessionStorage>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    inner: RwLock<SessionInner>,
    observers: Arc<ObserverRegistry>,
}

impl SessionManager {
    pub fn new(
        identity: IdentityClient,
        storage: Arc<dyn SessionStorage>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identity,
            storage,
            navigator,
            clock,
            inner: RwLock::new(SessionInner::default()),
            observers: Arc::new(ObserverRegistry::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    // ─── Startup ─────────────────────────────────────────────────────────────

    /// Restore a persisted session. No network I/O.
    ///
    /// A token that has already expired is discarded together with its
    /// profile; a valid token without a stored profile restores into
    /// [`SessionState::TokenPendingProfile`].
    pub fn restore(&self) -> SessionState {
        let token: Option<SessionToken> = self.load(TOKEN_KEY);
        let profile: Option<UserProfile> = self.load(PROFILE_KEY);
        let now = self.clock.now();

        let discard = {
            let mut inner = self.write();
            inner.restored = true;
            match token {
                Some(token) if token.is_valid_at(now) => {
                    inner.token = Some(token);
                    inner.profile = profile;
                    false
                }
                Some(token) => {
                    tracing::info!(
                        expires_at = %token.expires_at,
                        "Persisted token expired, discarding"
                    );
                    inner.token = None;
                    inner.profile = None;
                    true
                }
                None => {
                    inner.token = None;
                    inner.profile = None;
                    profile.is_some()
                }
            }
        };

        if discard {
            self.clear_storage();
        }

        let state = self.state();
        tracing::debug!(?state, "Session restored");
        state
    }

    /// [`restore`](Self::restore) followed by
    /// [`handle_redirect_return`](Self::handle_redirect_return).
    pub fn startup(self: &Arc<Self>) -> Result<Option<JoinHandle<()>>, AppError> {
        self.restore();
        self.handle_redirect_return()
    }

    /// Pick up an implicit-grant token from the current URL fragment.
    ///
    /// On success the token is persisted, the fragment is stripped from the
    /// visible URL and a profile fetch is spawned; its handle is returned so
    /// callers may await it, but nothing requires them to. Returns `Ok(None)`
    /// when the URL is not an OAuth return. Must run inside a tokio runtime.
    pub fn handle_redirect_return(
        self: &Arc<Self>,
    ) -> Result<Option<JoinHandle<()>>, AppError> {
        if !self.read().restored {
            return Err(AppError::NotRestored);
        }

        let mut url = self.navigator.current_url();
        let Some(fragment) = url.fragment() else {
            return Ok(None);
        };

        let now = self.clock.now();
        let token = match parse_redirect_fragment(fragment, now) {
            RedirectFragment::Token(token) if token.is_valid_at(now) => token,
            RedirectFragment::Token(token) => {
                tracing::warn!(
                    expires_at = %token.expires_at,
                    "Redirect carried an already expired token, ignoring"
                );
                return Ok(None);
            }
            RedirectFragment::Error(error) => {
                tracing::warn!(error = %error, "Identity provider returned an error");
                return Ok(None);
            }
            RedirectFragment::NotOAuth => return Ok(None),
        };

        self.persist(TOKEN_KEY, &token);
        if let Err(e) = self.storage.remove(PROFILE_KEY) {
            tracing::warn!(error = %e, "Failed to clear stale profile");
        }
        {
            let mut inner = self.write();
            inner.token = Some(token.clone());
            inner.profile = None;
        }

        url.set_fragment(None);
        self.navigator.replace_url(&url);

        tracing::info!(
            expires_at = %token.expires_at,
            scope = %token.scope,
            "OAuth token received from redirect"
        );

        let manager = Arc::clone(self);
        let access_token = token.access_token;
        Ok(Some(tokio::spawn(async move {
            manager.fetch_profile(&access_token).await;
        })))
    }

    // ─── Login / Logout ──────────────────────────────────────────────────────

    /// Navigate to the identity provider's consent page.
    ///
    /// The redirect target is the origin of the current URL.
    pub fn login(&self) -> Result<(), AppError> {
        let redirect_uri = origin_of(&self.navigator.current_url());
        let auth_url = self.identity.authorization_url(&redirect_uri)?;

        tracing::info!(
            client_id = %self.identity.client_id(),
            redirect_uri = %redirect_uri,
            "Starting OAuth flow, redirecting to identity provider"
        );

        self.navigator.navigate(&auth_url);
        Ok(())
    }

    /// Drop the session everywhere and reload the application.
    pub fn logout(&self) {
        {
            let mut inner = self.write();
            inner.token = None;
            inner.profile = None;
        }
        self.clear_storage();

        tracing::info!("Logged out, reloading");
        self.notify(None);
        self.navigator.reload();
    }

    // ─── Profile ─────────────────────────────────────────────────────────────

    /// Resolve the profile for `access_token` and notify observers.
    ///
    /// Failures are logged and leave the session profile-less; there is no
    /// retry. A result that arrives after the session changed is discarded.
    pub async fn fetch_profile(&self, access_token: &str) -> Option<UserProfile> {
        let profile = match self.identity.get_user_info(access_token).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(error = %e, "Profile fetch failed, session stays without profile");
                return None;
            }
        };

        let current = {
            let mut inner = self.write();
            let current = inner
                .token
                .as_ref()
                .is_some_and(|t| t.access_token == access_token);
            if current {
                inner.profile = Some(profile.clone());
            }
            current
        };

        if !current {
            tracing::debug!("Session changed during profile fetch, discarding profile");
            return None;
        }

        self.persist(PROFILE_KEY, &profile);
        tracing::info!(user_id = %profile.id, "Profile resolved");
        self.notify(Some(profile.clone()));
        Some(profile)
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    /// Token present and not expired.
    pub fn is_authenticated(&self) -> bool {
        let now = self.clock.now();
        self.read()
            .token
            .as_ref()
            .is_some_and(|t| t.is_valid_at(now))
    }

    /// The bearer token, if the session is authenticated.
    pub fn access_token(&self) -> Option<String> {
        let now = self.clock.now();
        self.read()
            .token
            .as_ref()
            .filter(|t| t.is_valid_at(now))
            .map(|t| t.access_token.clone())
    }

    /// The profile, if the session holds a valid token and it has resolved.
    pub fn profile(&self) -> Option<UserProfile> {
        let now = self.clock.now();
        let inner = self.read();
        match &inner.token {
            Some(token) if token.is_valid_at(now) => inner.profile.clone(),
            _ => None,
        }
    }

    pub fn state(&self) -> SessionState {
        let now = self.clock.now();
        let inner = self.read();
        match &inner.token {
            Some(token) if token.is_valid_at(now) => {
                if inner.profile.is_some() {
                    SessionState::Authenticated
                } else {
                    SessionState::TokenPendingProfile
                }
            }
            _ => SessionState::Unauthenticated,
        }
    }

    /// Discard the session if its token has expired.
    ///
    /// Returns `true` if something was discarded; observers are told `None`.
    pub fn expire_if_needed(&self) -> bool {
        let now = self.clock.now();
        let expired = {
            let mut inner = self.write();
            let expired = inner.token.as_ref().is_some_and(|t| !t.is_valid_at(now));
            if expired {
                inner.token = None;
                inner.profile = None;
            }
            expired
        };

        if expired {
            self.clear_storage();
            tracing::info!("Session token expired, discarded");
            self.notify(None);
        }
        expired
    }

    // ─── Observers ───────────────────────────────────────────────────────────

    /// Register `observer` for profile changes (resolved, logout, expiry).
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(Option<UserProfile>) + Send + Sync + 'static,
    {
        let id = self.observers.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.observers.insert(id, Arc::new(observer));
        Subscription {
            id,
            registry: Arc::downgrade(&self.observers),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.observers.len()
    }

    fn notify(&self, profile: Option<UserProfile>) {
        // Snapshot first so observers may subscribe/unsubscribe re-entrantly.
        let observers: Vec<Observer> = self
            .observers
            .observers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for observer in observers {
            observer(profile.clone());
        }
    }

    // ─── Storage Helpers ─────────────────────────────────────────────────────

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.storage.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read session storage");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Unreadable session entry, removing");
                if let Err(e) = self.storage.remove(key) {
                    tracing::warn!(key, error = %e, "Failed to remove session entry");
                }
                None
            }
        }
    }

    fn persist<T: Serialize>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(|e| AppError::Storage(e.to_string()))
            .and_then(|json| self.storage.set(key, &json));

        if let Err(e) = result {
            tracing::error!(key, error = %e, "Failed to persist session entry");
        }
    }

    fn clear_storage(&self) {
        for key in [TOKEN_KEY, PROFILE_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!(key, error = %e, "Failed to remove session entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 19, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_full_token_fragment() {
        let parsed = parse_redirect_fragment(
            "access_token=abc&expires_in=3600&token_type=Bearer&scope=openid",
            t0(),
        );
        let RedirectFragment::Token(token) = parsed else {
            panic!("expected token, got {parsed:?}");
        };
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_at, t0() + Duration::seconds(3600));
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.scope, "openid");
    }

    #[test]
    fn test_parse_decodes_percent_encoded_scope() {
        let parsed = parse_redirect_fragment(
            "access_token=ya29.x&expires_in=3599&scope=email%20profile%20openid",
            t0(),
        );
        let RedirectFragment::Token(token) = parsed else {
            panic!("expected token");
        };
        assert_eq!(token.scope, "email profile openid");
        assert_eq!(token.token_type, "Bearer");
    }

    #[test]
    fn test_parse_rejects_incomplete_fragments() {
        for fragment in [
            "",
            "section-2",
            "access_token=abc",
            "expires_in=3600",
            "access_token=&expires_in=3600",
            "access_token=abc&expires_in=soon",
            "access_token=abc&expires_in=-5",
            "access_token=abc&expires_in=99999999999999999",
            "access_token=abc&expires_in=9000000000000",
        ] {
            assert_eq!(
                parse_redirect_fragment(fragment, t0()),
                RedirectFragment::NotOAuth,
                "fragment {fragment:?}"
            );
        }
    }

    #[test]
    fn test_parse_error_response() {
        assert_eq!(
            parse_redirect_fragment("error=access_denied&state=x", t0()),
            RedirectFragment::Error("access_denied".to_string())
        );
    }
}
