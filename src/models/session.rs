// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session token and user profile models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// OAuth bearer session obtained from an implicit-grant redirect.
///
/// Persisted as JSON under [`crate::storage::TOKEN_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionToken {
    /// Opaque bearer credential
    pub access_token: String,
    /// Absolute expiry, computed at receipt from `expires_in`
    pub expires_at: DateTime<Utc>,
    /// Granted scopes (passthrough)
    #[serde(default)]
    pub scope: String,
    /// Token type (passthrough, normally "Bearer")
    #[serde(default)]
    pub token_type: String,
}

impl SessionToken {
    /// Build a token received at `received_at` that lives for `expires_in_secs`.
    ///
    /// Returns `None` when the expiry is not representable.
    pub fn issued(
        access_token: impl Into<String>,
        expires_in_secs: i64,
        received_at: DateTime<Utc>,
    ) -> Option<Self> {
        let expires_at = Duration::try_seconds(expires_in_secs)
            .and_then(|lifetime| received_at.checked_add_signed(lifetime))?;

        Some(Self {
            access_token: access_token.into(),
            expires_at,
            scope: String::new(),
            token_type: "Bearer".to_string(),
        })
    }

    /// A token is usable strictly before its expiry instant.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Identity resolved from the userinfo endpoint.
///
/// Accepts both the persisted field names and the provider's OIDC claim
/// names (`sub`, `name`, `picture`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserProfile {
    #[serde(alias = "sub")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "name")]
    pub display_name: String,
    #[serde(default, alias = "picture")]
    pub avatar_url: Option<String>,
}

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No usable token.
    Unauthenticated,
    /// Valid token, profile not (yet) resolved.
    TokenPendingProfile,
    /// Valid token and profile.
    Authenticated,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_token_valid_until_expiry_instant() {
        let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();
        let token = SessionToken::issued("abc", 3600, t0).unwrap();

        assert!(token.is_valid_at(t0));
        assert!(token.is_valid_at(t0 + Duration::seconds(3599)));
        assert!(!token.is_valid_at(t0 + Duration::seconds(3600)));
        assert!(!token.is_valid_at(t0 + Duration::days(1)));
    }

    #[test]
    fn test_unrepresentable_expiry_is_rejected() {
        let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();

        assert!(SessionToken::issued("abc", i64::MAX, t0).is_none());
        assert!(SessionToken::issued("abc", 99_999_999_999_999_999, t0).is_none());
        // In range for a duration, but past the last representable instant.
        assert!(SessionToken::issued("abc", 9_000_000_000_000, t0).is_none());
    }

    #[test]
    fn test_profile_from_userinfo_claims() {
        let json = r#"{
            "sub": "1098765",
            "email": "ada@example.com",
            "email_verified": true,
            "name": "Ada Lovelace",
            "picture": "https://lh3.example.com/a.png"
        }"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();

        assert_eq!(profile.id, "1098765");
        assert_eq!(profile.display_name, "Ada Lovelace");
        assert_eq!(
            profile.avatar_url.as_deref(),
            Some("https://lh3.example.com/a.png")
        );
    }

    #[test]
    fn test_profile_persisted_form_reloads() {
        let profile = UserProfile {
            id: "42".to_string(),
            email: "grace@example.com".to_string(),
            display_name: "Grace".to_string(),
            avatar_url: None,
        };
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("\"display_name\""));

        let back: UserProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }
}
