// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Like tallies (debounced aggregator flushes)
//! - Prediction ballots

use async_trait::async_trait;

use crate::db::collections;
use crate::error::AppError;
use crate::models::{LikeTally, PredictionBallot};
use crate::services::aggregator::CountSink;
use crate::time_utils::format_utc_rfc3339;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator rejects real credentials; use an unauthenticated connection.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Like Tallies ────────────────────────────────────────────

    /// Get the like tally for a nominee.
    pub async fn get_like_tally(&self, target_id: &str) -> Result<Option<LikeTally>, AppError> {
        let doc_id = urlencoding::encode(target_id).into_owned();
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::LIKE_TALLIES)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Add `count` likes to a nominee's tally.
    ///
    /// Read-modify-write inside a transaction, so concurrent flushes from
    /// different clients add up instead of overwriting each other.
    pub async fn increment_like_count(
        &self,
        target_id: &str,
        count: u64,
    ) -> Result<u64, AppError> {
        if target_id.is_empty() {
            return Err(AppError::BadRequest("empty like target".to_string()));
        }
        let doc_id = urlencoding::encode(target_id).into_owned();
        let now = format_utc_rfc3339(chrono::Utc::now());

        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Read within the transaction window to register for conflict detection
        let current: Option<LikeTally> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::LIKE_TALLIES)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read tally in transaction: {}", e))
            })?;

        let mut tally = current.unwrap_or_else(|| LikeTally {
            target_id: target_id.to_string(),
            ..LikeTally::default()
        });
        tally.add(count, &now);

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::LIKE_TALLIES)
            .document_id(&doc_id)
            .object(&tally)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add tally to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(target_id, count, total = tally.count, "Like tally updated");
        Ok(tally.count)
    }

    // ─── Prediction Ballots ──────────────────────────────────────

    /// Store a voter's ballot, replacing any earlier one.
    ///
    /// Invalid ballots are rejected with [`AppError::BadRequest`] before any
    /// I/O. Every storage failure surfaces as a retryable
    /// [`AppError::Database`]; nothing is kept aside locally.
    pub async fn submit_prediction(&self, ballot: &PredictionBallot) -> Result<(), AppError> {
        ballot.check()?;

        let mut ballot = ballot.clone();
        ballot.submitted_at = format_utc_rfc3339(chrono::Utc::now());

        let doc_id = urlencoding::encode(&ballot.voter_id).into_owned();
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PREDICTIONS)
            .document_id(&doc_id)
            .object(&ballot)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(
            voter_id = %ballot.voter_id,
            picks = ballot.picks.len(),
            "Prediction ballot stored"
        );
        Ok(())
    }

    /// Get a voter's ballot.
    pub async fn get_prediction(
        &self,
        voter_id: &str,
    ) -> Result<Option<PredictionBallot>, AppError> {
        let doc_id = urlencoding::encode(voter_id).into_owned();
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PREDICTIONS)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[async_trait]
impl CountSink for FirestoreDb {
    async fn record_count(&self, target_id: &str, count: u64) -> Result<(), AppError> {
        self.increment_like_count(target_id, count).await.map(|_| ())
    }
}
